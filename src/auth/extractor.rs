//! Credential sources
//!
//! Produces a raw token and cookie pair for `setup`. Whatever a source
//! returns is untrusted: it goes through format validation before any
//! network call or persistence.

use async_trait::async_trait;
use thiserror::Error;

use super::bundle::{AuthBundle, LegacyAuth};
use crate::security::SecureString;

/// Environment variable holding the session token
pub const TOKEN_ENV: &str = "SLACK_TOKEN";

/// Environment variable holding the `d` cookie
pub const COOKIE_ENV: &str = "SLACK_COOKIE";

/// Name of the Slack session cookie
pub const SESSION_COOKIE_NAME: &str = "d";

/// Errors that can occur while acquiring credentials
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No source provided this value
    #[error("{0} not provided")]
    Missing(&'static str),
}

/// Whatever one source could find; either half may be missing
#[derive(Debug, Clone, Default)]
pub struct PartialCredentials {
    pub token: Option<SecureString>,
    pub cookie: Option<SecureString>,
}

/// An extracted, not yet validated token and cookie
#[derive(Debug, Clone)]
pub struct RawCredentials {
    /// Session token as found
    pub token: SecureString,
    /// Cookie value as found, with or without a leading `d=`
    pub cookie: SecureString,
}

impl RawCredentials {
    /// Builds a legacy bundle, trimming whitespace and a pasted `d=` prefix
    pub fn into_bundle(self) -> AuthBundle {
        let token = self.token.trim().to_string();
        let cookie = self.cookie.trim();
        let cookie = cookie
            .strip_prefix(&format!("{}=", SESSION_COOKIE_NAME))
            .unwrap_or(cookie)
            .trim_end_matches(';')
            .to_string();

        AuthBundle::Legacy(LegacyAuth::new(token, cookie))
    }
}

/// Formats the session cookie for the HTTP `Cookie` header
///
/// ```
/// use slackline_lib::auth::cookie_header;
///
/// assert_eq!(cookie_header("xoxd-abc"), "d=xoxd-abc");
/// ```
pub fn cookie_header(cookie: &str) -> String {
    format!("{}={}", SESSION_COOKIE_NAME, cookie)
}

/// Anything that can hand over a token, a cookie or both
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Human-readable name for logs
    fn name(&self) -> &'static str;

    /// Produces whatever values this source has
    async fn extract(&self) -> Result<PartialCredentials, ExtractError>;
}

/// Values given explicitly, e.g. on the command line
pub struct ExplicitSource {
    token: Option<SecureString>,
    cookie: Option<SecureString>,
}

impl ExplicitSource {
    /// Creates a source from optional values
    pub fn new(token: Option<String>, cookie: Option<String>) -> Self {
        Self {
            token: token.map(SecureString::new),
            cookie: cookie.map(SecureString::new),
        }
    }
}

#[async_trait]
impl CredentialSource for ExplicitSource {
    fn name(&self) -> &'static str {
        "arguments"
    }

    async fn extract(&self) -> Result<PartialCredentials, ExtractError> {
        Ok(PartialCredentials {
            token: self.token.clone(),
            cookie: self.cookie.clone(),
        })
    }
}

/// Values read from [`TOKEN_ENV`] and [`COOKIE_ENV`]
pub struct EnvSource;

#[async_trait]
impl CredentialSource for EnvSource {
    fn name(&self) -> &'static str {
        "environment"
    }

    async fn extract(&self) -> Result<PartialCredentials, ExtractError> {
        Ok(PartialCredentials {
            token: std::env::var(TOKEN_ENV).ok().map(SecureString::new),
            cookie: std::env::var(COOKIE_ENV).ok().map(SecureString::new),
        })
    }
}

/// Fills the token and the cookie each from the first source that has it
///
/// A source that fails is logged and skipped.
pub async fn extract_first(
    sources: &[&dyn CredentialSource],
) -> Result<RawCredentials, ExtractError> {
    let mut token = None;
    let mut cookie = None;

    for source in sources {
        if token.is_some() && cookie.is_some() {
            break;
        }
        let found = match source.extract().await {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!("No credentials from {}: {}", source.name(), e);
                continue;
            }
        };
        if token.is_none() {
            if let Some(value) = found.token {
                tracing::info!("Using token from {}", source.name());
                token = Some(value);
            }
        }
        if cookie.is_none() {
            if let Some(value) = found.cookie {
                tracing::info!("Using cookie from {}", source.name());
                cookie = Some(value);
            }
        }
    }

    Ok(RawCredentials {
        token: token.ok_or(ExtractError::Missing("token"))?,
        cookie: cookie.ok_or(ExtractError::Missing("cookie"))?,
    })
}
