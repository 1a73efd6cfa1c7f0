//! Credential persistence in the OS secret vault
//!
//! Every workspace token is stored under its workspace URL and the shared
//! cookie under the reserved `__cookie__` account, all inside one service
//! namespace. Values are JSON-encoded.

use std::sync::Arc;

use thiserror::Error;

use super::bundle::{TokenDetails, WorkspaceAuth};
use super::vault::{KeyringVault, SecretVault, VaultError};
use crate::security::SecureString;

/// Service namespace used in the OS vault
pub const SERVICE_NAME: &str = "Slackline";

/// Reserved account key holding the cookie
pub const COOKIE_ACCOUNT: &str = "__cookie__";

/// Errors that can occur during secure storage operations
#[derive(Debug, Error)]
pub enum SecureStoreError {
    /// Vault operation failed
    #[error("Vault error: {0}")]
    Vault(#[from] VaultError),

    /// A value could not be encoded for storage
    #[error("Invalid data format: {0}")]
    InvalidFormat(#[from] serde_json::Error),
}

/// Secure storage for Slack credentials
///
/// # Example
///
/// ```no_run
/// use slackline_lib::auth::{SecureStore, TokenDetails, WorkspaceAuth};
///
/// # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
/// let store = SecureStore::new();
///
/// let auth = WorkspaceAuth::new("xoxd-cookie")
///     .with_workspace("https://acme.slack.com/", TokenDetails::new("xoxc-token"));
/// store.store_auth(&auth).await?;
///
/// let restored = store.get_stored_auth().await?;
/// assert_eq!(restored, Some(auth));
///
/// store.clear_stored_auth().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SecureStore {
    vault: Arc<dyn SecretVault>,
}

impl SecureStore {
    /// Creates a store backed by the OS keyring under [`SERVICE_NAME`]
    pub fn new() -> Self {
        Self::with_vault(Arc::new(KeyringVault::new(SERVICE_NAME)))
    }

    /// Creates a store over any vault backend
    ///
    /// Useful for testing or separating different credential sets.
    pub fn with_vault(vault: Arc<dyn SecretVault>) -> Self {
        Self { vault }
    }

    /// Writes every workspace token and the cookie
    ///
    /// Entries are written one by one; if a write fails, the entries already
    /// written stay in the vault.
    pub async fn store_auth(&self, auth: &WorkspaceAuth) -> Result<(), SecureStoreError> {
        for (url, details) in &auth.tokens {
            let encoded = SecureString::new(serde_json::to_string(details)?);
            self.vault.set(url, &encoded).await?;
            tracing::debug!("Stored token for workspace {}", url);
        }

        let cookie = SecureString::new(serde_json::to_string(&auth.cookie)?);
        self.vault.set(COOKIE_ACCOUNT, &cookie).await?;

        tracing::info!("Stored credentials for {} workspace(s)", auth.tokens.len());
        Ok(())
    }

    /// Reads every entry back into a bundle
    ///
    /// Entries that fail to parse are skipped. Returns `None` unless at least
    /// one token and the cookie are present.
    pub async fn get_stored_auth(&self) -> Result<Option<WorkspaceAuth>, SecureStoreError> {
        let mut auth = WorkspaceAuth::default();
        let mut cookie = None;

        for account in self.vault.accounts().await? {
            let Some(raw) = self.vault.get(&account).await? else {
                tracing::debug!("Vault entry {} vanished during enumeration", account);
                continue;
            };
            let raw = SecureString::new(raw);

            if account == COOKIE_ACCOUNT {
                match serde_json::from_str::<SecureString>(&raw) {
                    Ok(value) => cookie = Some(value),
                    Err(e) => tracing::warn!("Skipping corrupt cookie entry: {}", e),
                }
            } else {
                match serde_json::from_str::<TokenDetails>(&raw) {
                    Ok(details) => {
                        auth.tokens.insert(account, details);
                    }
                    Err(e) => tracing::warn!("Skipping corrupt token entry for {}: {}", account, e),
                }
            }
        }

        let has_cookie = cookie.is_some();
        match cookie {
            Some(cookie) if !auth.tokens.is_empty() => {
                auth.cookie = cookie;
                Ok(Some(auth))
            }
            _ => {
                tracing::debug!(
                    "Stored credentials incomplete ({} token(s), cookie present: {})",
                    auth.tokens.len(),
                    has_cookie
                );
                Ok(None)
            }
        }
    }

    /// Deletes every entry in the namespace
    ///
    /// Only entries the vault can enumerate are deleted. When its index is
    /// unreadable the remaining entries are left behind and a warning is
    /// logged.
    pub async fn clear_stored_auth(&self) -> Result<(), SecureStoreError> {
        if !self.vault.is_enumerable().await? {
            tracing::warn!(
                "Credential index is unreadable; entries it listed cannot be removed and stay in the keyring"
            );
        }

        let accounts = self.vault.accounts().await?;
        for account in &accounts {
            self.vault.delete(account).await?;
        }
        tracing::info!("Cleared {} stored credential entries", accounts.len());
        Ok(())
    }
}

impl Default for SecureStore {
    fn default() -> Self {
        Self::new()
    }
}
