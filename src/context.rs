//! Per-run process context
//!
//! Built once from the command line, then filled in as the run progresses:
//! the validator attaches the identity and the cache store attaches the
//! envelope. It is passed around explicitly and never stored globally.

use crate::cache::CacheEnvelope;
use crate::slack::AuthIdentity;

/// State shared by the steps of a single run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AppContext {
    /// Selected workspace, from `--workspace`, config, or `auth.test`
    pub workspace: Option<String>,
    /// Whether `--debug` was given
    pub debug: bool,
    identity: Option<AuthIdentity>,
    cache: Option<CacheEnvelope>,
}

impl AppContext {
    /// Creates a context with nothing attached
    pub fn new(workspace: Option<String>, debug: bool) -> Self {
        Self {
            workspace,
            debug,
            ..Default::default()
        }
    }

    /// Identity confirmed by the last successful remote validation
    pub fn identity(&self) -> Option<&AuthIdentity> {
        self.identity.as_ref()
    }

    pub fn set_identity(&mut self, identity: AuthIdentity) {
        self.identity = Some(identity);
    }

    /// Attached cache envelope
    pub fn cache(&self) -> Option<&CacheEnvelope> {
        self.cache.as_ref()
    }

    pub fn cache_mut(&mut self) -> Option<&mut CacheEnvelope> {
        self.cache.as_mut()
    }

    /// Attaches `envelope`, replacing any previous one
    pub fn attach_cache(&mut self, envelope: CacheEnvelope) -> &mut CacheEnvelope {
        self.cache.insert(envelope)
    }

    pub(crate) fn take_cache(&mut self) -> Option<CacheEnvelope> {
        self.cache.take()
    }

    /// Whether remote validation has succeeded in this run
    pub fn is_authenticated(&self) -> bool {
        self.identity.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_context_is_empty() {
        let ctx = AppContext::new(Some("acme".into()), true);
        assert_eq!(ctx.workspace.as_deref(), Some("acme"));
        assert!(ctx.debug);
        assert!(!ctx.is_authenticated());
        assert!(ctx.cache().is_none());
    }

    #[test]
    fn test_attach_identity_and_cache() {
        let mut ctx = AppContext::default();
        ctx.set_identity(AuthIdentity::new().with_user("jane"));
        ctx.attach_cache(CacheEnvelope::default());

        assert!(ctx.is_authenticated());
        assert_eq!(ctx.identity().and_then(|i| i.user.as_deref()), Some("jane"));

        if let Some(envelope) = ctx.cache_mut() {
            envelope.insert_entity("U1", serde_json::json!({"id": "U1"}));
        }
        assert!(ctx.cache().is_some_and(|e| e.entities.contains_key("U1")));
    }
}
