//! Shared status store
//!
//! Scroll sessions persist per-slice cursor state in a shared key-value
//! store so that successive rounds (and successive gateway instances behind
//! a load balancer) observe the same session. The store is injected as a
//! trait object rather than reached through a singleton, so tests and
//! single-node deployments substitute the in-memory implementation.
//!
//! Every record carries a TTL tied to the scroll window: abandoned sessions
//! self-expire, and the next request with the same session key simply starts
//! a fresh session.

pub mod error;
pub mod memory;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;

use async_trait::async_trait;
use std::time::Duration;

/// Key-value store holding scroll session state
///
/// Writes are atomic per key; overlapping writers for the same key resolve
/// last-writer-wins. Single-flight across whole sessions is layered on top
/// via [`StatusStore::try_lock`], not baked into individual operations.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Fetch a value; `None` when absent or expired
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a value with the given time-to-live
    async fn set(&self, key: &str, value: String, ttl: Duration) -> StoreResult<()>;

    /// Delete a single key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> StoreResult<()>;

    /// Delete every key under a prefix, returning how many were removed
    async fn delete_prefix(&self, prefix: &str) -> StoreResult<u64>;

    /// Acquire an advisory lock; returns false when already held
    async fn try_lock(&self, key: &str, ttl: Duration) -> StoreResult<bool>;

    /// Release an advisory lock taken with [`StatusStore::try_lock`]
    async fn unlock(&self, key: &str) -> StoreResult<()>;
}
