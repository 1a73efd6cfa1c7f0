//! Security module - secret handling and log sanitization
//!
//! - Zeroize-on-drop strings for tokens and cookies
//! - Masking of credentials before they reach the logs

mod sanitizer;
mod secure_string;

pub use sanitizer::Sanitizer;
pub use secure_string::SecureString;
