//! Context snapshot cache behind an explicit collaborator interface.
//!
//! Keyed by canonicalized phone identifier. The cache holds a derived
//! read-model, never the source of truth: writes are last-write-wins and
//! concurrent misses for the same key are allowed to race.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::context::PatientContext;

#[async_trait]
pub trait ContextCache: Send + Sync {
    /// Returns the cached snapshot if present and within TTL.
    async fn get(&self, key: &str) -> Option<PatientContext>;

    async fn set(&self, key: &str, value: PatientContext, ttl: Duration);

    /// Drop the entry for a key. Mutating components call this before their
    /// mutation is considered complete.
    async fn invalidate(&self, key: &str);
}

struct CacheEntry {
    value: PatientContext,
    expires_at: Instant,
}

/// Process-local cache with lazy expiry.
pub struct InMemoryContextCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryContextCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryContextCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContextCache for InMemoryContextCache {
    async fn get(&self, key: &str) -> Option<PatientContext> {
        let entries = self.entries.read().await;
        let entry = entries.get(key)?;
        if entry.expires_at <= Instant::now() {
            // Expired entries are overwritten by the next set(); no eager purge.
            return None;
        }
        Some(entry.value.clone())
    }

    async fn set(&self, key: &str, value: PatientContext, ttl: Duration) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    async fn invalidate(&self, key: &str) {
        let mut entries = self.entries.write().await;
        entries.remove(key);
    }
}
