//! Credential validation
//!
//! Two stages: a local structural check on the token and cookie prefixes,
//! then a live `auth.test` round-trip. A bundle that fails either stage is
//! never persisted.

use thiserror::Error;

use super::bundle::AuthBundle;
use crate::context::AppContext;
use crate::security::SecureString;
use crate::slack::{AuthIdentity, SlackClient, SlackClientConfig, SlackError};

/// Prefix every session token carries
pub const TOKEN_PREFIX: &str = "xoxc-";

/// Prefix every `d` cookie value carries
pub const COOKIE_PREFIX: &str = "xoxd-";

/// Structural problems with a bundle
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FormatError {
    /// No token, or an empty one
    #[error("token is missing or empty")]
    MissingToken,

    /// No cookie, or an empty one
    #[error("cookie is missing or empty")]
    MissingCookie,

    /// Token without the session token prefix
    #[error("token must start with \"{TOKEN_PREFIX}\", got \"{0}\"")]
    InvalidTokenPrefix(String),

    /// Cookie without the cookie prefix
    #[error("cookie must start with \"{COOKIE_PREFIX}\", got \"{0}\"")]
    InvalidCookiePrefix(String),
}

/// Errors from validating a bundle
#[derive(Debug, Error)]
pub enum AuthError {
    /// The bundle failed the structural check
    #[error("Invalid credentials: {0}")]
    Format(#[from] FormatError),

    /// The live check failed, whatever the reason
    #[error("Credential validation against Slack failed")]
    RemoteValidation(#[source] SlackError),
}

/// Checks that every token and the cookie are present and well-formed
pub fn validate_format(bundle: &AuthBundle) -> Result<(), FormatError> {
    let tokens = bundle.tokens();
    if tokens.is_empty() || tokens.iter().any(|t| t.is_blank()) {
        return Err(FormatError::MissingToken);
    }
    if bundle.cookie().is_blank() {
        return Err(FormatError::MissingCookie);
    }

    if let Some(token) = tokens.iter().find(|t| !t.starts_with(TOKEN_PREFIX)) {
        return Err(FormatError::InvalidTokenPrefix(token.to_string()));
    }
    if !bundle.cookie().starts_with(COOKIE_PREFIX) {
        return Err(FormatError::InvalidCookiePrefix(bundle.cookie().to_string()));
    }

    Ok(())
}

/// Validates the bundle against Slack and records the identity in `ctx`
///
/// Runs [`validate_format`] first; no request is made for a malformed
/// bundle. The token used is the one stored for `ctx.workspace` when there is
/// one, else the first. On success the identity is written to the context and
/// the workspace is filled in from the response only if it was unset.
pub async fn validate_with_remote(
    bundle: &AuthBundle,
    config: &SlackClientConfig,
    ctx: &mut AppContext,
) -> Result<AuthIdentity, AuthError> {
    validate_format(bundle)?;

    let token: &SecureString = bundle
        .token_for(ctx.workspace.as_deref())
        .ok_or(FormatError::MissingToken)?;

    let identity = remote_identity(token, bundle.cookie(), config)
        .await
        .map_err(|e| {
            tracing::warn!("Remote credential check failed: {}", e);
            AuthError::RemoteValidation(e)
        })?;

    tracing::info!(
        "Authenticated as {} in {}",
        identity.user.as_deref().unwrap_or("<unknown user>"),
        identity.team.as_deref().unwrap_or("<unknown team>")
    );

    if ctx.workspace.is_none() {
        ctx.workspace = identity.url.clone().or_else(|| identity.team.clone());
    }
    ctx.set_identity(identity.clone());

    Ok(identity)
}

async fn remote_identity(
    token: &str,
    cookie: &str,
    config: &SlackClientConfig,
) -> Result<AuthIdentity, SlackError> {
    let client = SlackClient::new(token, cookie, config)?;
    let response = client.auth_test().await?;
    Ok(response.into())
}
