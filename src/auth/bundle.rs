//! Credential bundle types
//!
//! A bundle is a session token (or several, one per workspace) paired with the
//! platform-wide `d` cookie. The cookie is shared across workspaces; tokens are
//! scoped to one workspace each.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::security::SecureString;

/// Per-workspace token metadata, keyed by workspace URL in [`WorkspaceAuth`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDetails {
    /// Session token (`xoxc-...`)
    pub token: SecureString,
    /// Workspace display name, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Team id reported by `auth.test`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    /// User id reported by `auth.test`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl TokenDetails {
    /// Creates token details holding only the token
    pub fn new(token: impl Into<SecureString>) -> Self {
        Self {
            token: token.into(),
            name: None,
            team_id: None,
            user_id: None,
        }
    }

    /// Sets the workspace display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Sets the team id
    pub fn with_team_id(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    /// Sets the user id
    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }
}

/// Multi-workspace bundle: one token per workspace URL, one shared cookie
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkspaceAuth {
    /// Token details keyed by workspace URL
    pub tokens: BTreeMap<String, TokenDetails>,
    /// The `d` cookie (`xoxd-...`)
    #[serde(default)]
    pub cookie: SecureString,
}

impl WorkspaceAuth {
    /// Creates an empty bundle around a cookie
    pub fn new(cookie: impl Into<SecureString>) -> Self {
        Self {
            tokens: BTreeMap::new(),
            cookie: cookie.into(),
        }
    }

    /// Adds (or replaces) the token details for a workspace URL
    pub fn with_workspace(mut self, url: impl Into<String>, details: TokenDetails) -> Self {
        self.tokens.insert(url.into(), details);
        self
    }
}

/// Legacy single-workspace bundle
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LegacyAuth {
    /// Session token (`xoxc-...`)
    #[serde(default)]
    pub token: SecureString,
    /// The `d` cookie (`xoxd-...`)
    #[serde(default)]
    pub cookie: SecureString,
}

impl LegacyAuth {
    /// Creates a legacy bundle
    pub fn new(token: impl Into<SecureString>, cookie: impl Into<SecureString>) -> Self {
        Self {
            token: token.into(),
            cookie: cookie.into(),
        }
    }
}

/// A token-and-cookie bundle in either of its two shapes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthBundle {
    /// `{tokens: {url: details}, cookie}`
    Workspaces(WorkspaceAuth),
    /// `{token, cookie}`
    Legacy(LegacyAuth),
}

impl AuthBundle {
    /// The shared cookie
    pub fn cookie(&self) -> &SecureString {
        match self {
            Self::Workspaces(auth) => &auth.cookie,
            Self::Legacy(auth) => &auth.cookie,
        }
    }

    /// Every token in the bundle, in workspace URL order
    pub fn tokens(&self) -> Vec<&SecureString> {
        match self {
            Self::Workspaces(auth) => auth.tokens.values().map(|d| &d.token).collect(),
            Self::Legacy(auth) => vec![&auth.token],
        }
    }

    /// Picks the token to authenticate with
    ///
    /// Uses the token stored for `workspace` when present, otherwise the first
    /// token in URL order.
    pub fn token_for(&self, workspace: Option<&str>) -> Option<&SecureString> {
        match self {
            Self::Legacy(auth) => Some(&auth.token),
            Self::Workspaces(auth) => workspace
                .and_then(|w| {
                    auth.tokens
                        .iter()
                        .find(|(url, _)| workspace_matches(url, w))
                        .map(|(_, d)| &d.token)
                })
                .or_else(|| auth.tokens.values().next().map(|d| &d.token)),
        }
    }

    /// Converts to the multi-workspace shape
    ///
    /// A legacy token is filed under `workspace_url`.
    pub fn into_workspaces(self, workspace_url: &str) -> WorkspaceAuth {
        match self {
            Self::Workspaces(auth) => auth,
            Self::Legacy(LegacyAuth { token, cookie }) => {
                WorkspaceAuth::new(cookie).with_workspace(workspace_url, TokenDetails::new(token))
            }
        }
    }
}

impl From<WorkspaceAuth> for AuthBundle {
    fn from(auth: WorkspaceAuth) -> Self {
        Self::Workspaces(auth)
    }
}

impl From<LegacyAuth> for AuthBundle {
    fn from(auth: LegacyAuth) -> Self {
        Self::Legacy(auth)
    }
}

/// Compares a stored workspace URL with a user-supplied workspace
///
/// Accepts the full URL or the bare subdomain (`acme` for
/// `https://acme.slack.com/`).
pub fn workspace_matches(url: &str, workspace: &str) -> bool {
    let normalize = |s: &str| {
        s.trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_ascii_lowercase()
    };
    let url = normalize(url);
    let workspace = normalize(workspace);
    url == workspace || url.split('.').next() == Some(workspace.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_multi_workspace() {
        let json = r#"{
            "tokens": {"https://acme.slack.com/": {"token": "xoxc-1", "name": "Acme"}},
            "cookie": "xoxd-c"
        }"#;
        let bundle: AuthBundle = serde_json::from_str(json).unwrap();

        let AuthBundle::Workspaces(auth) = &bundle else {
            panic!("expected multi-workspace form");
        };
        assert_eq!(auth.tokens.len(), 1);
        assert_eq!(
            auth.tokens["https://acme.slack.com/"].name.as_deref(),
            Some("Acme")
        );
        assert_eq!(bundle.cookie(), &SecureString::from("xoxd-c"));
    }

    #[test]
    fn test_deserialize_legacy() {
        let bundle: AuthBundle =
            serde_json::from_str(r#"{"token": "xoxc-1", "cookie": "xoxd-c"}"#).unwrap();
        assert!(matches!(bundle, AuthBundle::Legacy(_)));
        assert_eq!(bundle.tokens(), vec![&SecureString::from("xoxc-1")]);
    }

    #[test]
    fn test_token_details_skip_empty_fields() {
        let json = serde_json::to_string(&TokenDetails::new("xoxc-1")).unwrap();
        assert_eq!(json, r#"{"token":"xoxc-1"}"#);
    }

    #[test]
    fn test_token_for_prefers_requested_workspace() {
        let bundle = AuthBundle::from(
            WorkspaceAuth::new("xoxd-c")
                .with_workspace("https://alpha.slack.com/", TokenDetails::new("xoxc-a"))
                .with_workspace("https://beta.slack.com/", TokenDetails::new("xoxc-b")),
        );

        assert_eq!(bundle.token_for(Some("beta")).unwrap().as_str(), "xoxc-b");
        assert_eq!(
            bundle.token_for(Some("https://beta.slack.com")).unwrap().as_str(),
            "xoxc-b"
        );
        assert_eq!(bundle.token_for(Some("gamma")).unwrap().as_str(), "xoxc-a");
        assert_eq!(bundle.token_for(None).unwrap().as_str(), "xoxc-a");
    }

    #[test]
    fn test_into_workspaces_files_legacy_token() {
        let auth = AuthBundle::from(LegacyAuth::new("xoxc-1", "xoxd-c"))
            .into_workspaces("https://acme.slack.com/");

        assert_eq!(auth.cookie.as_str(), "xoxd-c");
        assert_eq!(
            auth.tokens["https://acme.slack.com/"].token.as_str(),
            "xoxc-1"
        );
    }

    #[test]
    fn test_workspace_matches() {
        assert!(workspace_matches("https://acme.slack.com/", "acme"));
        assert!(workspace_matches("https://acme.slack.com/", "ACME.slack.com"));
        assert!(!workspace_matches("https://acme.slack.com/", "other"));
    }
}
