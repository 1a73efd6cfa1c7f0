//! Authentication module - credential bundles, validation and secure storage
//!
//! Credentials are kept in the OS keyring:
//! - macOS Keychain, Windows Credential Manager, Linux Secret Service (with
//!   the kernel keyring as a cache in front of it)
//! - one entry per workspace token plus one for the shared `d` cookie
//!
//! Nothing reaches the keyring without passing [`validate_format`] and
//! [`validate_with_remote`] first.

mod bundle;
mod extractor;
mod secure_store;
mod validator;
pub mod vault;

pub use bundle::{workspace_matches, AuthBundle, LegacyAuth, TokenDetails, WorkspaceAuth};
pub use extractor::{
    cookie_header, extract_first, CredentialSource, EnvSource, ExplicitSource, ExtractError,
    PartialCredentials, RawCredentials, COOKIE_ENV, TOKEN_ENV,
};
pub use secure_store::{SecureStore, SecureStoreError, COOKIE_ACCOUNT, SERVICE_NAME};
pub use validator::{
    validate_format, validate_with_remote, AuthError, FormatError, COOKIE_PREFIX, TOKEN_PREFIX,
};
pub use vault::{KeyringVault, MemoryVault, SecretVault, VaultError};
