//! Slack Web API response types

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when calling the Slack Web API
#[derive(Debug, Error)]
pub enum SlackError {
    /// Network error during the request
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {body}")]
    Http {
        /// Status code
        status: u16,
        /// Response body, possibly truncated
        body: String,
    },

    /// The API answered `ok: false`
    #[error("Slack API error: {0}")]
    Api(String),

    /// The response body did not have the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Credentials cannot be placed in an HTTP header
    #[error("Invalid header value: {0}")]
    InvalidHeader(#[from] reqwest::header::InvalidHeaderValue),
}

/// `auth.test` response
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AuthTestResponse {
    /// Whether the call succeeded
    pub ok: bool,
    /// Error code when `ok` is false
    #[serde(default)]
    pub error: Option<String>,
    /// Workspace URL (`https://acme.slack.com/`)
    #[serde(default)]
    pub url: Option<String>,
    /// Workspace name
    #[serde(default)]
    pub team: Option<String>,
    /// User handle
    #[serde(default)]
    pub user: Option<String>,
    /// Team id
    #[serde(default)]
    pub team_id: Option<String>,
    /// User id
    #[serde(default)]
    pub user_id: Option<String>,
}

/// Identity confirmed by a successful `auth.test`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct AuthIdentity {
    /// User handle
    pub user: Option<String>,
    /// User id
    pub user_id: Option<String>,
    /// Workspace name
    pub team: Option<String>,
    /// Team id
    pub team_id: Option<String>,
    /// Workspace URL
    pub url: Option<String>,
}

impl AuthIdentity {
    /// Creates an empty identity
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the user handle
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    /// Sets the workspace name
    pub fn with_team(mut self, team: impl Into<String>) -> Self {
        self.team = Some(team.into());
        self
    }

    /// Sets the workspace URL
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl From<AuthTestResponse> for AuthIdentity {
    fn from(resp: AuthTestResponse) -> Self {
        Self {
            user: resp.user,
            user_id: resp.user_id,
            team: resp.team,
            team_id: resp.team_id,
            url: resp.url,
        }
    }
}

/// Profile block of a Slack user
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Default)]
pub struct UserProfile {
    /// Display name
    #[serde(default)]
    pub display_name: Option<String>,
    /// Full name
    #[serde(default)]
    pub real_name: Option<String>,
    /// Title
    #[serde(default)]
    pub title: Option<String>,
    /// Email, when the token may see it
    #[serde(default)]
    pub email: Option<String>,
}

/// A Slack user as returned by `users.info`
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct SlackUser {
    /// User id
    pub id: String,
    /// Handle
    #[serde(default)]
    pub name: Option<String>,
    /// Full name
    #[serde(default)]
    pub real_name: Option<String>,
    /// IANA timezone
    #[serde(default)]
    pub tz: Option<String>,
    /// Whether the user is a bot
    #[serde(default)]
    pub is_bot: bool,
    /// Whether the account is deactivated
    #[serde(default)]
    pub deleted: bool,
    /// Profile fields
    #[serde(default)]
    pub profile: UserProfile,
}

impl SlackUser {
    /// Best name to show for this user
    pub fn display_name(&self) -> &str {
        [
            self.profile.display_name.as_deref(),
            self.real_name.as_deref(),
            self.profile.real_name.as_deref(),
            self.name.as_deref(),
        ]
        .into_iter()
        .flatten()
        .find(|s| !s.is_empty())
        .unwrap_or(&self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_test_response_minimal() {
        let resp: AuthTestResponse = serde_json::from_str(r#"{"ok": true}"#).unwrap();
        assert!(resp.ok);
        assert!(resp.team.is_none());
    }

    #[test]
    fn test_identity_from_auth_test() {
        let resp: AuthTestResponse = serde_json::from_str(
            r#"{"ok": true, "url": "https://acme.slack.com/", "team": "Acme",
                "user": "jane", "team_id": "T1", "user_id": "U1"}"#,
        )
        .unwrap();

        let identity = AuthIdentity::from(resp);
        assert_eq!(
            identity,
            AuthIdentity {
                user: Some("jane".into()),
                user_id: Some("U1".into()),
                team: Some("Acme".into()),
                team_id: Some("T1".into()),
                url: Some("https://acme.slack.com/".into()),
            }
        );
    }

    #[test]
    fn test_user_display_name_fallbacks() {
        let mut user: SlackUser = serde_json::from_str(r#"{"id": "U1"}"#).unwrap();
        assert_eq!(user.display_name(), "U1");

        user.name = Some("jane".into());
        assert_eq!(user.display_name(), "jane");

        user.profile.display_name = Some(String::new());
        user.real_name = Some("Jane Doe".into());
        assert_eq!(user.display_name(), "Jane Doe");
    }
}
