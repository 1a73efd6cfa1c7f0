//! Secret vault backends
//!
//! A vault holds `(account, secret)` pairs inside one service namespace.
//! [`KeyringVault`] talks to the OS credential store (Keychain, Credential
//! Manager, Secret Service) through the keyring crate; [`MemoryVault`] keeps
//! everything in process and backs the tests.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use keyring::credential::{CredentialBuilder, CredentialBuilderApi};
use keyring::Entry;
use thiserror::Error;
use tokio::sync::RwLock;

/// Account name of the keyring index entry
const INDEX_ACCOUNT: &str = "__index__";

/// Errors that can occur during vault operations
#[derive(Debug, Error)]
pub enum VaultError {
    /// Keyring operation failed
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    /// Index entry could not be encoded
    #[error("Vault index error: {0}")]
    Index(#[from] serde_json::Error),

    /// Blocking keyring task panicked or was cancelled
    #[error("Vault task failed: {0}")]
    Task(String),
}

/// Key-value secret storage scoped to one service namespace
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SecretVault: Send + Sync {
    /// Writes a secret, replacing any previous value
    async fn set(&self, account: &str, secret: &str) -> Result<(), VaultError>;

    /// Reads a secret; `None` when the account does not exist
    async fn get(&self, account: &str) -> Result<Option<String>, VaultError>;

    /// Deletes a secret; `Ok(false)` when it did not exist
    async fn delete(&self, account: &str) -> Result<bool, VaultError>;

    /// Lists every account in the namespace
    async fn accounts(&self) -> Result<Vec<String>, VaultError>;

    /// Whether [`accounts`](Self::accounts) can see every stored entry
    async fn is_enumerable(&self) -> Result<bool, VaultError>;
}

/// Vault backed by the OS credential store
///
/// OS keyrings cannot enumerate credentials by service, so the vault keeps a
/// JSON list of its account names in a reserved `__index__` entry and updates
/// it on every write and delete.
///
/// A corrupt index reads as empty. The accounts it listed stay in the
/// keyring but can no longer be enumerated or cleared through the vault.
#[derive(Debug, Clone)]
pub struct KeyringVault {
    service: String,
    builder: Option<Arc<CredentialBuilder>>,
}

impl KeyringVault {
    /// Creates a vault for the given service namespace
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            builder: None,
        }
    }

    /// Creates a vault whose entries come from `builder` instead of the
    /// platform default store
    pub fn with_credential_builder(
        service: impl Into<String>,
        builder: Arc<CredentialBuilder>,
    ) -> Self {
        Self {
            service: service.into(),
            builder: Some(builder),
        }
    }

    /// Returns the service namespace
    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, account: &str) -> Result<Entry, VaultError> {
        match &self.builder {
            Some(builder) => Ok(Entry::new_with_credential(builder.build(
                None,
                &self.service,
                account,
            )?)),
            None => Ok(Entry::new(&self.service, account)?),
        }
    }

    fn read_password(&self, account: &str) -> Result<Option<String>, VaultError> {
        match self.entry(account)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(VaultError::Keyring(e)),
        }
    }

    fn read_index(&self) -> Result<Vec<String>, VaultError> {
        Ok(self
            .read_password(INDEX_ACCOUNT)?
            .map(|raw| decode_index(&raw))
            .unwrap_or_default())
    }

    fn write_index(&self, accounts: &[String]) -> Result<(), VaultError> {
        let entry = self.entry(INDEX_ACCOUNT)?;
        if accounts.is_empty() {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
                Err(e) => Err(VaultError::Keyring(e)),
            }
        } else {
            entry.set_password(&serde_json::to_string(accounts)?)?;
            Ok(())
        }
    }

    fn set_blocking(&self, account: &str, secret: &str) -> Result<(), VaultError> {
        self.entry(account)?.set_password(secret)?;

        let mut index = self.read_index()?;
        if !index.iter().any(|a| a == account) {
            index.push(account.to_string());
            self.write_index(&index)?;
        }
        Ok(())
    }

    fn delete_blocking(&self, account: &str) -> Result<bool, VaultError> {
        let deleted = match self.entry(account)?.delete_credential() {
            Ok(()) => true,
            Err(keyring::Error::NoEntry) => false,
            Err(e) => return Err(VaultError::Keyring(e)),
        };

        let mut index = self.read_index()?;
        let before = index.len();
        index.retain(|a| a != account);
        if index.len() != before {
            self.write_index(&index)?;
        }
        Ok(deleted)
    }

    /// Runs a keyring call on the blocking pool
    async fn blocking<T, F>(&self, f: F) -> Result<T, VaultError>
    where
        T: Send + 'static,
        F: FnOnce(KeyringVault) -> Result<T, VaultError> + Send + 'static,
    {
        let vault = self.clone();
        tokio::task::spawn_blocking(move || f(vault))
            .await
            .map_err(|e| VaultError::Task(e.to_string()))?
    }
}

#[async_trait]
impl SecretVault for KeyringVault {
    async fn set(&self, account: &str, secret: &str) -> Result<(), VaultError> {
        let account = account.to_string();
        let secret = zeroize::Zeroizing::new(secret.to_string());
        self.blocking(move |vault| vault.set_blocking(&account, &secret))
            .await
    }

    async fn get(&self, account: &str) -> Result<Option<String>, VaultError> {
        let account = account.to_string();
        self.blocking(move |vault| vault.read_password(&account)).await
    }

    async fn delete(&self, account: &str) -> Result<bool, VaultError> {
        let account = account.to_string();
        self.blocking(move |vault| vault.delete_blocking(&account))
            .await
    }

    async fn accounts(&self) -> Result<Vec<String>, VaultError> {
        self.blocking(|vault| vault.read_index()).await
    }

    async fn is_enumerable(&self) -> Result<bool, VaultError> {
        self.blocking(|vault| {
            Ok(vault
                .read_password(INDEX_ACCOUNT)?
                .map_or(true, |raw| serde_json::from_str::<Vec<String>>(&raw).is_ok()))
        })
        .await
    }
}

/// Parses the keyring index, dropping the reserved index account
///
/// A corrupt index is treated as empty: the entries it listed can no longer
/// be enumerated, but reading and writing individual accounts still works.
fn decode_index(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(mut accounts) => {
            accounts.retain(|a| a != INDEX_ACCOUNT);
            accounts.dedup();
            accounts
        }
        Err(e) => {
            tracing::warn!("Ignoring corrupt keyring index: {}", e);
            Vec::new()
        }
    }
}

/// In-process vault
#[derive(Debug, Default)]
pub struct MemoryVault {
    entries: RwLock<BTreeMap<String, String>>,
}

impl MemoryVault {
    /// Creates an empty in-memory vault
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SecretVault for MemoryVault {
    async fn set(&self, account: &str, secret: &str) -> Result<(), VaultError> {
        self.entries
            .write()
            .await
            .insert(account.to_string(), secret.to_string());
        Ok(())
    }

    async fn get(&self, account: &str) -> Result<Option<String>, VaultError> {
        Ok(self.entries.read().await.get(account).cloned())
    }

    async fn delete(&self, account: &str) -> Result<bool, VaultError> {
        Ok(self.entries.write().await.remove(account).is_some())
    }

    async fn accounts(&self) -> Result<Vec<String>, VaultError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }

    async fn is_enumerable(&self) -> Result<bool, VaultError> {
        Ok(true)
    }
}
