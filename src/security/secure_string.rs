//! Secret strings that zero their memory on drop
//!
//! Session tokens and cookies are long-lived credentials. They travel through
//! the process inside [`SecureString`], which never prints its content and
//! serializes transparently as a plain JSON string.

use std::fmt;
use std::ops::Deref;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use zeroize::Zeroize;

/// A string that securely clears its memory when dropped
///
/// # Example
///
/// ```
/// use slackline_lib::security::SecureString;
///
/// let token = SecureString::from("xoxc-1234");
/// assert!(token.starts_with("xoxc-"));
/// assert!(!format!("{:?}", token).contains("1234"));
/// ```
#[derive(Clone, Default)]
pub struct SecureString {
    inner: String,
}

impl SecureString {
    /// Wraps an owned string without copying it
    pub fn new(s: String) -> Self {
        Self { inner: s }
    }

    /// Returns the secret as a slice
    pub fn as_str(&self) -> &str {
        &self.inner
    }

    /// Returns true if the secret is empty or whitespace only
    pub fn is_blank(&self) -> bool {
        self.inner.trim().is_empty()
    }
}

impl Drop for SecureString {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

impl Zeroize for SecureString {
    fn zeroize(&mut self) {
        self.inner.zeroize();
    }
}

impl Deref for SecureString {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl AsRef<str> for SecureString {
    fn as_ref(&self) -> &str {
        &self.inner
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

impl fmt::Debug for SecureString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SecureString")
            .field("len", &self.inner.len())
            .field("content", &"[REDACTED]")
            .finish()
    }
}

impl PartialEq for SecureString {
    fn eq(&self, other: &Self) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.inner.as_bytes())
    }
}

impl Eq for SecureString {}

impl PartialEq<&str> for SecureString {
    fn eq(&self, other: &&str) -> bool {
        constant_time_eq(self.inner.as_bytes(), other.as_bytes())
    }
}

impl Serialize for SecureString {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.inner)
    }
}

impl<'de> Deserialize<'de> for SecureString {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Constant-time byte comparison
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_is_redacted() {
        let secret = SecureString::from("xoxd-super-secret");
        let debug_output = format!("{:?}", secret);
        assert!(!debug_output.contains("super-secret"));
        assert!(debug_output.contains("REDACTED"));
    }

    #[test]
    fn test_serializes_as_plain_string() {
        let secret = SecureString::from("xoxc-abc");
        assert_eq!(serde_json::to_string(&secret).unwrap(), "\"xoxc-abc\"");

        let back: SecureString = serde_json::from_str("\"xoxc-abc\"").unwrap();
        assert_eq!(back, secret);
    }

    #[test]
    fn test_is_blank() {
        assert!(SecureString::default().is_blank());
        assert!(SecureString::from("   ").is_blank());
        assert!(!SecureString::from("x").is_blank());
    }

    #[test]
    fn test_equality() {
        let a = SecureString::from("same");
        assert_eq!(a, SecureString::from("same"));
        assert_ne!(a, SecureString::from("different"));
        assert!(a == "same");
    }

    #[test]
    fn test_constant_time_eq_different_lengths() {
        assert!(!constant_time_eq(b"short", b"longer string"));
        assert!(constant_time_eq(b"hello", b"hello"));
    }

    #[test]
    fn test_zeroize() {
        let mut secret = SecureString::from("secret");
        secret.zeroize();
        assert!(secret.is_empty());
    }
}
