//! CLI command handlers
//!
//! Each handler takes the shared [`AppState`] and the per-run
//! [`AppContext`], and reports failures with `anyhow` context so the binary
//! can print one readable chain.

use std::fmt;

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};
use serde::Serialize;

use crate::auth::{
    extract_first, validate_with_remote, AuthBundle, CredentialSource, EnvSource,
    ExplicitSource, SecureStore,
};
use crate::cache::CacheStore;
use crate::config::AppConfig;
use crate::context::AppContext;
use crate::mcp::{McpServer, ToolContext};
use crate::security::Sanitizer;
use crate::slack::{AuthIdentity, SlackClient};

/// Long-lived collaborators shared by the commands
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub store: SecureStore,
    pub cache: CacheStore,
}

impl AppState {
    /// Creates state backed by the OS keyring and the default cache path
    pub fn new(config: AppConfig) -> Result<Self> {
        let cache = config
            .cache_store()
            .context("Could not locate the cache directory")?;
        Ok(Self {
            config,
            store: SecureStore::new(),
            cache,
        })
    }

    /// Creates state from explicit parts
    pub fn with_parts(config: AppConfig, store: SecureStore, cache: CacheStore) -> Self {
        Self {
            config,
            store,
            cache,
        }
    }
}

// ============================================================================
// Setup / Logout
// ============================================================================

/// Acquires, validates and stores credentials
///
/// `token` and `cookie` take precedence over the environment. Tokens already
/// stored for other workspaces are kept when the cookie is unchanged.
pub async fn setup(
    state: &AppState,
    ctx: &mut AppContext,
    token: Option<String>,
    cookie: Option<String>,
) -> Result<AuthIdentity> {
    let explicit = ExplicitSource::new(token, cookie);
    let sources: [&dyn CredentialSource; 2] = [&explicit, &EnvSource];
    let raw = extract_first(&sources)
        .await
        .context("No credentials found; pass --token and --cookie or set SLACK_TOKEN and SLACK_COOKIE")?;

    let bundle = raw.into_bundle();
    let identity = validate_with_remote(&bundle, &state.config.client_config(), ctx)
        .await
        .context("Credentials were rejected")?;

    let url = identity
        .url
        .clone()
        .or_else(|| ctx.workspace.clone())
        .context("Slack did not report a workspace URL; pass --workspace")?;

    let mut auth = bundle.into_workspaces(&url);
    if let Some(details) = auth.tokens.get_mut(&url) {
        details.name = identity.team.clone();
        details.team_id = identity.team_id.clone();
        details.user_id = identity.user_id.clone();
    }

    match state.store.get_stored_auth().await {
        Ok(Some(existing)) if existing.cookie == auth.cookie => {
            for (other, details) in existing.tokens {
                auth.tokens.entry(other).or_insert(details);
            }
        }
        Ok(Some(_)) => {
            tracing::info!("Cookie changed, replacing stored workspaces");
            state
                .store
                .clear_stored_auth()
                .await
                .context("Failed to remove old credentials")?;
        }
        Ok(None) => {}
        Err(e) => tracing::warn!("Could not read existing credentials: {}", e),
    }

    state
        .store
        .store_auth(&auth)
        .await
        .context("Failed to save credentials to the OS keyring")?;

    Ok(identity)
}

/// Removes stored credentials and the cache
pub async fn logout(state: &AppState) -> Result<()> {
    state
        .store
        .clear_stored_auth()
        .await
        .context("Failed to remove credentials from the OS keyring")?;
    state
        .cache
        .clear()
        .await
        .context("Failed to remove the cache file")?;
    Ok(())
}

/// Removes the cache file
pub async fn cache_clear(state: &AppState) -> Result<()> {
    state
        .cache
        .clear()
        .await
        .with_context(|| format!("Failed to remove {}", state.cache.path().display()))
}

// ============================================================================
// Authenticated run
// ============================================================================

/// Reads stored credentials and checks them against Slack
///
/// Returns `None` when nothing is stored. On success the context carries the
/// identity and the returned client uses the selected workspace's token.
pub async fn authenticate(state: &AppState, ctx: &mut AppContext) -> Result<Option<SlackClient>> {
    let Some(auth) = state
        .store
        .get_stored_auth()
        .await
        .context("Failed to read credentials from the OS keyring")?
    else {
        return Ok(None);
    };

    let bundle = AuthBundle::from(auth);
    let client_config = state.config.client_config();

    validate_with_remote(&bundle, &client_config, ctx)
        .await
        .context("Stored credentials were rejected; run `slackline setup` again")?;

    let token = bundle
        .token_for(ctx.workspace.as_deref())
        .context("No token stored for this workspace")?;
    let client = SlackClient::new(token, bundle.cookie(), &client_config)
        .context("Failed to create the Slack client")?;

    Ok(Some(client))
}

/// Runs the tool server on stdio until the client goes away
pub async fn serve(state: &AppState, mut ctx: AppContext) -> Result<()> {
    let client = authenticate(state, &mut ctx).await?;
    if client.is_none() {
        tracing::warn!("No stored credentials; Slack tools are unavailable until `slackline setup`");
    }

    state.cache.load(&mut ctx).await;

    let mut tools = ToolContext::new(ctx, state.cache.clone());
    if let Some(client) = client {
        tools = tools.with_slack(client);
    }

    McpServer::new(tools)
        .run_stdio()
        .await
        .context("Tool server failed")
}

// ============================================================================
// Status
// ============================================================================

/// What `status` prints
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    /// Stored workspace URLs with masked tokens
    pub workspaces: Vec<(String, String)>,
    /// Identity from the live check, when it succeeded
    pub identity: Option<AuthIdentity>,
    /// Why the live check failed
    pub error: Option<String>,
    /// Entities in the cache
    pub cached_entities: usize,
    /// Epoch millis of the last cache write; 0 when empty
    pub cache_updated: i64,
}

impl fmt::Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.workspaces.is_empty() {
            writeln!(f, "Credentials: none stored")?;
        } else {
            writeln!(f, "Credentials:")?;
            for (url, token) in &self.workspaces {
                writeln!(f, "  {} ({})", url, token)?;
            }
        }

        match (&self.identity, &self.error) {
            (Some(identity), _) => writeln!(
                f,
                "Signed in as {} in {}",
                identity.user.as_deref().unwrap_or("?"),
                identity.team.as_deref().unwrap_or("?")
            )?,
            (None, Some(error)) => writeln!(f, "Live check failed: {}", error)?,
            (None, None) => writeln!(f, "Not signed in")?,
        }

        if self.cache_updated == 0 {
            write!(f, "Cache: empty")
        } else {
            let updated = Utc
                .timestamp_millis_opt(self.cache_updated)
                .single()
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| self.cache_updated.to_string());
            write!(f, "Cache: {} entities, updated {}", self.cached_entities, updated)
        }
    }
}

/// Reports stored credentials, the live identity and the cache state
pub async fn status(state: &AppState, ctx: &mut AppContext) -> Result<StatusReport> {
    let stored = state
        .store
        .get_stored_auth()
        .await
        .context("Failed to read credentials from the OS keyring")?;

    let workspaces = stored
        .iter()
        .flat_map(|auth| auth.tokens.iter())
        .map(|(url, details)| (url.clone(), Sanitizer::sanitize_token(&details.token)))
        .collect();

    let error = match authenticate(state, ctx).await {
        Ok(_) => None,
        Err(e) => Some(format!("{:#}", e)),
    };

    let envelope = state.cache.load(ctx).await;
    let (cached_entities, cache_updated) = (envelope.entities.len(), envelope.last_updated);

    Ok(StatusReport {
        workspaces,
        identity: ctx.identity().cloned(),
        error,
        cached_entities,
        cache_updated,
    })
}
