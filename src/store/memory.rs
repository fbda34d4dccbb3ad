//! In-memory status store
//!
//! TTL-aware map used by tests and single-node deployments. Expiry is
//! enforced lazily on read plus an opportunistic sweep on write, which keeps
//! the structure simple while matching the visible semantics of an external
//! cache: an expired record is indistinguishable from an absent one.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::store::error::StoreResult;
use crate::store::StatusStore;

/// A stored value with its expiration deadline
#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Instant,
}

impl Entry {
    fn live(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// In-memory [`StatusStore`] implementation
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Entry>>>,
    locks: Arc<RwLock<HashMap<String, Instant>>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live (unexpired) entries, for tests and health reporting
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .read()
            .await
            .values()
            .filter(|e| e.live(now))
            .count()
    }

    /// Whether the store holds no live entries
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drop expired entries. Called opportunistically on writes.
    async fn sweep(&self) {
        let now = Instant::now();
        self.entries.write().await.retain(|_, e| e.live(now));
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let now = Instant::now();
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|e| e.live(now))
            .map(|e| e.value.clone()))
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()> {
        self.sweep().await;
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().await.insert(key.to_string(), entry);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|k, _| !k.starts_with(prefix));
        Ok((before - entries.len()) as u64)
    }

    async fn try_lock(&self, key: &str, ttl: Duration) -> StoreResult<bool> {
        let now = Instant::now();
        let mut locks = self.locks.write().await;
        if let Some(deadline) = locks.get(key) {
            if *deadline > now {
                return Ok(false);
            }
        }
        locks.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn unlock(&self, key: &str) -> StoreResult<()> {
        self.locks.write().await.remove(key);
        Ok(())
    }
}
