//! Local result cache
//!
//! A single JSON document on disk holding entities fetched from Slack. It is
//! read at most once per run into the [`AppContext`], mutated in memory by
//! the tools and written back with an explicit [`CacheStore::save`].
//!
//! A document is only used while it is younger than the TTL. A
//! `lastUpdated` of 0 means "never filled" and is never compared against the
//! clock.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::context::AppContext;

/// Envelope version written by this build
pub const CACHE_VERSION: u32 = 1;

/// Default time-to-live
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache file name inside the config directory
pub const CACHE_FILE_NAME: &str = "cache.json";

/// Errors from writing the cache
#[derive(Debug, Error)]
pub enum CacheError {
    /// Filesystem failure
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The envelope could not be encoded
    #[error("Cache encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// On-disk cache document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEnvelope {
    /// Format version, kept as found whatever its JSON type
    pub version: serde_json::Value,
    /// Cached entities by id
    pub entities: BTreeMap<String, serde_json::Value>,
    /// Epoch millis of the last write; 0 when never filled
    #[serde(rename = "lastUpdated")]
    pub last_updated: i64,
}

impl Default for CacheEnvelope {
    fn default() -> Self {
        Self {
            version: CACHE_VERSION.into(),
            entities: BTreeMap::new(),
            last_updated: 0,
        }
    }
}

impl CacheEnvelope {
    /// Whether this envelope may be used at `now_ms`
    pub fn is_fresh(&self, now_ms: i64, ttl: Duration) -> bool {
        if self.last_updated == 0 {
            return false;
        }
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        now_ms.saturating_sub(self.last_updated) < ttl_ms
    }

    /// Looks up a cached entity
    pub fn entity(&self, id: &str) -> Option<&serde_json::Value> {
        self.entities.get(id)
    }

    /// Stores an entity and stamps the envelope with the current time
    pub fn insert_entity(&mut self, id: impl Into<String>, entity: serde_json::Value) {
        self.entities.insert(id.into(), entity);
        self.last_updated = now_millis();
    }
}

/// Current time in epoch millis
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Reads and writes the cache file
#[derive(Debug, Clone)]
pub struct CacheStore {
    path: PathBuf,
    ttl: Duration,
}

impl CacheStore {
    /// Creates a store for the file at `path`
    pub fn new(path: impl Into<PathBuf>, ttl: Duration) -> Self {
        Self {
            path: path.into(),
            ttl,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Returns the context's envelope, reading the file on first use
    ///
    /// Never fails: a missing, unreadable, corrupt, unfilled or stale file
    /// yields the default envelope.
    pub async fn load<'a>(&self, ctx: &'a mut AppContext) -> &'a mut CacheEnvelope {
        self.load_at(ctx, now_millis()).await
    }

    /// [`load`](Self::load) with an explicit clock
    pub async fn load_at<'a>(&self, ctx: &'a mut AppContext, now_ms: i64) -> &'a mut CacheEnvelope {
        let envelope = match ctx.take_cache() {
            Some(envelope) => envelope,
            None => self.read(now_ms).await,
        };
        ctx.attach_cache(envelope)
    }

    async fn read(&self, now_ms: i64) -> CacheEnvelope {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No cache file at {}", self.path.display());
                return CacheEnvelope::default();
            }
            Err(e) => {
                tracing::warn!("Could not read cache {}: {}", self.path.display(), e);
                return CacheEnvelope::default();
            }
        };

        let envelope: CacheEnvelope = match serde_json::from_slice(&content) {
            Ok(envelope) => envelope,
            Err(e) => {
                tracing::warn!("Discarding corrupt cache {}: {}", self.path.display(), e);
                return CacheEnvelope::default();
            }
        };

        if !envelope.is_fresh(now_ms, self.ttl) {
            tracing::debug!("Cache is empty or stale (lastUpdated {})", envelope.last_updated);
            return CacheEnvelope::default();
        }

        tracing::debug!("Loaded {} cached entities", envelope.entities.len());
        envelope
    }

    /// Writes the context's envelope, if any, replacing the file atomically
    pub async fn save(&self, ctx: &AppContext) -> Result<(), CacheError> {
        let Some(envelope) = ctx.cache() else {
            return Ok(());
        };

        let content = serde_json::to_vec(envelope)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &content).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(
            "Saved {} cached entities to {}",
            envelope.entities.len(),
            self.path.display()
        );
        Ok(())
    }

    /// Removes the cache file; succeeds when there is none
    pub async fn clear(&self) -> Result<(), CacheError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| CACHE_FILE_NAME.into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    const NOW: i64 = 1_700_000_000_000;
    const TTL_MS: i64 = 60 * 60 * 1000;

    fn store_in(dir: &TempDir) -> CacheStore {
        CacheStore::new(dir.path().join("slackline").join(CACHE_FILE_NAME), DEFAULT_TTL)
    }

    fn envelope_at(last_updated: i64) -> CacheEnvelope {
        CacheEnvelope {
            version: json!(7),
            entities: BTreeMap::from([("U1".to_string(), json!({"id": "U1", "name": "jane"}))]),
            last_updated,
        }
    }

    async fn write_envelope(store: &CacheStore, envelope: &CacheEnvelope) {
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), serde_json::to_vec(envelope).unwrap())
            .await
            .unwrap();
    }

    #[test]
    fn test_default_envelope_shape() {
        let json = serde_json::to_value(CacheEnvelope::default()).unwrap();
        assert_eq!(json, json!({"version": 1, "entities": {}, "lastUpdated": 0}));
    }

    #[test]
    fn test_sentinel_is_never_fresh() {
        let envelope = CacheEnvelope::default();
        assert!(!envelope.is_fresh(0, DEFAULT_TTL));
        assert!(!envelope.is_fresh(NOW, DEFAULT_TTL));
    }

    #[test]
    fn test_insert_entity_stamps_time() {
        let mut envelope = CacheEnvelope::default();
        envelope.insert_entity("U1", json!({"id": "U1"}));
        assert!(envelope.last_updated > 0);
        assert_eq!(envelope.entity("U1"), Some(&json!({"id": "U1"})));
    }

    #[tokio::test]
    async fn test_load_fresh_now() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let envelope = envelope_at(NOW);
        write_envelope(&store, &envelope).await;

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, envelope);
    }

    #[tokio::test]
    async fn test_load_keeps_unknown_versions() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        for version in [json!(-1), json!(u64::MAX), json!("2.0-beta")] {
            let envelope = CacheEnvelope {
                version: version.clone(),
                ..envelope_at(NOW)
            };
            write_envelope(&store, &envelope).await;

            let mut ctx = AppContext::default();
            let loaded = store.load_at(&mut ctx, NOW).await;
            assert_eq!(loaded.version, version);
            assert_eq!(loaded.entities.len(), 1);
            assert_eq!(loaded.last_updated, NOW);
        }
    }

    #[tokio::test]
    async fn test_load_half_ttl() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let envelope = envelope_at(NOW - TTL_MS / 2);
        write_envelope(&store, &envelope).await;

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, envelope);
    }

    #[tokio::test]
    async fn test_load_stale_returns_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_envelope(&store, &envelope_at(NOW - TTL_MS * 2)).await;

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, CacheEnvelope::default());
    }

    #[tokio::test]
    async fn test_load_exactly_ttl_is_stale() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_envelope(&store, &envelope_at(NOW - TTL_MS)).await;

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, CacheEnvelope::default());
    }

    #[tokio::test]
    async fn test_load_sentinel_returns_default() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_envelope(&store, &envelope_at(0)).await;

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, CacheEnvelope::default());
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, CacheEnvelope::default());
        assert!(ctx.cache().is_some());
    }

    #[tokio::test]
    async fn test_load_unreadable_path() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        // A directory where the file should be makes the read itself fail
        tokio::fs::create_dir_all(store.path()).await.unwrap();

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, CacheEnvelope::default());
    }

    #[tokio::test]
    async fn test_load_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        tokio::fs::create_dir_all(store.path().parent().unwrap())
            .await
            .unwrap();
        tokio::fs::write(store.path(), b"{\"version\": ").await.unwrap();

        let mut ctx = AppContext::default();
        assert_eq!(*store.load_at(&mut ctx, NOW).await, CacheEnvelope::default());
    }

    #[tokio::test]
    async fn test_load_reuses_attached_envelope() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut ctx = AppContext::default();
        ctx.attach_cache(envelope_at(NOW));
        write_envelope(&store, &envelope_at(NOW - 5)).await;

        assert_eq!(store.load_at(&mut ctx, NOW).await.last_updated, NOW);
    }

    #[tokio::test]
    async fn test_save_without_envelope_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        store.save(&AppContext::default()).await.unwrap();
        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn test_save_writes_exact_envelope() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let envelope = envelope_at(NOW);

        let mut ctx = AppContext::default();
        ctx.attach_cache(envelope.clone());
        store.save(&ctx).await.unwrap();

        let written = tokio::fs::read(store.path()).await.unwrap();
        assert_eq!(written, serde_json::to_vec(&envelope).unwrap());
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn test_save_then_load_in_new_run() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let mut first = AppContext::default();
        store
            .load(&mut first)
            .await
            .insert_entity("U1", json!({"id": "U1"}));
        store.save(&first).await.unwrap();

        let mut second = AppContext::default();
        let envelope = store.load(&mut second).await;
        assert!(envelope.entity("U1").is_some());
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        write_envelope(&store, &envelope_at(NOW)).await;

        store.clear().await.unwrap();
        store.clear().await.unwrap();
        assert!(!store.path().exists());
    }
}
