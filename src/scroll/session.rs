//! Scroll session lifecycle
//!
//! A session is the continuation state for one (query, user) pair across
//! rounds. The session key is derived from the normalized query body plus
//! the caller identity, so a client replaying the same body keeps scrolling
//! the same session while any semantic change starts a new one.
//!
//! The session itself is a view over the shared status store: slice records
//! are loaded lazily during slice selection, mutated through explicit update
//! calls, and persisted with a TTL equal to the scroll window so abandoned
//! sessions self-expire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::query::{QueryTs, TableId};
use crate::scroll::error::{ScrollError, ScrollResult};
use crate::scroll::status::{advance, SliceAddr, SliceOutcome, SliceState, SliceStatus};
use crate::backend::StorageType;
use crate::store::StatusStore;

/// Namespace prefix for session state keys
pub const SESSION_KEY_PREFIX: &str = "scroll:session:";
/// Namespace prefix for session single-flight locks
pub const SESSION_LOCK_PREFIX: &str = "scroll:lock:";

/// Derive the session key for a query body and caller identity
///
/// The query serializes deterministically with `clear_cache` excluded, so
/// byte-identical normalized payloads from the same caller map to the same
/// key. The digest bounds key length regardless of query size.
pub fn derive_session_key(query: &QueryTs, identity: &str) -> ScrollResult<String> {
    let payload = serde_json::to_string(query)?;

    let mut hasher = Sha256::new();
    hasher.update(payload.as_bytes());
    hasher.update(b"|");
    hasher.update(identity.as_bytes());
    let digest = hasher.finalize();

    Ok(format!("{}{:x}", SESSION_KEY_PREFIX, digest))
}

/// Lock key guarding single-flight for a session
pub fn lock_key(session_key: &str) -> String {
    let suffix = session_key
        .strip_prefix(SESSION_KEY_PREFIX)
        .unwrap_or(session_key);
    format!("{}{}", SESSION_LOCK_PREFIX, suffix)
}

/// Persisted session envelope: bookkeeping, not slice state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMeta {
    /// When the session was first created
    pub created_at: DateTime<Utc>,
    /// Last round start
    pub last_access_at: DateTime<Utc>,
    /// Number of orchestrated rounds so far
    pub round: u64,
    /// Parallel slice count the session was created with
    pub slice_max: usize,
    /// Page size per slice per round
    pub limit: usize,
}

/// One eligible slice as handed to the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct Slice {
    /// Where the slice lives
    pub addr: SliceAddr,
    /// Continuation cursor; `None` for a slice that has not started
    pub cursor: Option<String>,
}

/// The scroll session: slice allocation, rotation on failure, completion
/// detection
pub struct ScrollSession {
    key: String,
    /// Parallel slice count
    pub slice_max: usize,
    /// Page size per slice per round
    pub limit: usize,
    /// Backend cursor TTL; also the store record TTL
    pub window: Duration,
    failure_ceiling: u32,
    store: Arc<dyn StatusStore>,
    slices: HashMap<SliceAddr, SliceStatus>,
    meta: SessionMeta,
}

impl ScrollSession {
    /// Load the session for `key`, creating it if absent or expired
    pub async fn load_or_create(
        store: Arc<dyn StatusStore>,
        key: &str,
        slice_max: usize,
        limit: usize,
        window: Duration,
        failure_ceiling: u32,
    ) -> ScrollResult<Self> {
        let meta_key = Self::meta_key(key);
        let meta = match store.get(&meta_key).await? {
            Some(raw) => serde_json::from_str(&raw)?,
            None => {
                let now = Utc::now();
                SessionMeta {
                    created_at: now,
                    last_access_at: now,
                    round: 0,
                    slice_max,
                    limit,
                }
            }
        };

        Ok(Self {
            key: key.to_string(),
            slice_max,
            limit,
            window,
            failure_ceiling,
            store,
            slices: HashMap::new(),
            meta,
        })
    }

    /// Destroy all persisted state for a session key
    pub async fn destroy(store: &dyn StatusStore, key: &str) -> ScrollResult<u64> {
        let removed = store.delete_prefix(key).await?;
        if removed > 0 {
            tracing::debug!(session = %key, removed, "destroyed scroll session");
        }
        Ok(removed)
    }

    /// The session key this session was loaded under
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Session bookkeeping
    pub fn meta(&self) -> &SessionMeta {
        &self.meta
    }

    fn meta_key(key: &str) -> String {
        format!("{}:meta", key)
    }

    fn slice_key(&self, addr: &SliceAddr) -> String {
        format!("{}:{}", self.key, addr.status_key())
    }

    /// Select the eligible slices for one table/backend combination
    ///
    /// Initializes absent records as pending and returns only pending
    /// slices. Idempotent: without intervening updates, repeated calls
    /// return the same set. The set can only shrink over the session's
    /// lifetime as slices stop or complete.
    pub async fn make_slices(
        &mut self,
        storage_type: StorageType,
        connect: &str,
        table_id: &TableId,
    ) -> ScrollResult<Vec<Slice>> {
        let mut eligible = Vec::with_capacity(self.slice_max);

        for slice_index in 0..self.slice_max {
            let addr = SliceAddr {
                storage_type,
                connect: connect.to_string(),
                table_id: table_id.clone(),
                slice_index,
            };

            let status = self.load_slice(&addr).await?;
            if status.status == SliceState::Pending {
                let cursor = if status.cursor.is_empty() {
                    None
                } else {
                    Some(status.cursor.clone())
                };
                eligible.push(Slice { addr, cursor });
            }
        }

        Ok(eligible)
    }

    /// Record the outcome of an Elasticsearch scroll sub-query
    pub async fn update_scroll_id(
        &mut self,
        connect: &str,
        table_id: &TableId,
        slice_index: usize,
        outcome: SliceOutcome,
    ) -> ScrollResult<SliceState> {
        let addr = SliceAddr {
            storage_type: StorageType::Elasticsearch,
            connect: connect.to_string(),
            table_id: table_id.clone(),
            slice_index,
        };
        self.apply_outcome(addr, outcome).await
    }

    /// Record the outcome of a Doris-style cursor sub-query
    pub async fn update_cursor(
        &mut self,
        connect: &str,
        table_id: &TableId,
        slice_index: usize,
        outcome: SliceOutcome,
    ) -> ScrollResult<SliceState> {
        let addr = SliceAddr {
            storage_type: StorageType::Doris,
            connect: connect.to_string(),
            table_id: table_id.clone(),
            slice_index,
        };
        self.apply_outcome(addr, outcome).await
    }

    /// Apply the retry policy to one slice and persist the result
    ///
    /// Updates on terminal slices are no-ops; a stopped slice never comes
    /// back within a session.
    pub async fn apply_outcome(
        &mut self,
        addr: SliceAddr,
        outcome: SliceOutcome,
    ) -> ScrollResult<SliceState> {
        let current = self.load_slice(&addr).await?;
        if current.is_terminal() {
            return Ok(current.status);
        }

        let next = advance(&current, &outcome, self.failure_ceiling);
        if next.status == SliceState::Stop {
            tracing::warn!(
                slice = %addr.status_key(),
                failures = next.failure_count,
                "slice exhausted its failure budget, excluding from session"
            );
        }

        self.persist_slice(&addr, &next).await?;
        let state = next.status;
        self.slices.insert(addr, next);
        Ok(state)
    }

    /// Whether every tracked slice has reached a terminal state
    ///
    /// A session with no tracked slices is trivially settled: there is
    /// nothing left (or nothing at all) to deliver.
    pub fn all_settled(&self) -> bool {
        self.slices.values().all(|s| s.is_terminal())
    }

    /// Cursors currently live per (table, connect), for response options
    pub fn live_cursors(&self) -> HashMap<(TableId, String), Vec<String>> {
        let mut cursors: HashMap<(TableId, String), Vec<String>> = HashMap::new();
        let mut addrs: Vec<&SliceAddr> = self.slices.keys().collect();
        addrs.sort_by_key(|a| (a.table_id.clone(), a.connect.clone(), a.slice_index));

        for addr in addrs {
            let status = &self.slices[addr];
            if !status.cursor.is_empty() {
                cursors
                    .entry((addr.table_id.clone(), addr.connect.clone()))
                    .or_default()
                    .push(status.cursor.clone());
            }
        }
        cursors
    }

    /// Close out a round: bump the counter and refresh the envelope TTL
    pub async fn touch(&mut self) -> ScrollResult<()> {
        self.meta.round += 1;
        self.meta.last_access_at = Utc::now();
        let raw = serde_json::to_string(&self.meta)?;
        self.store
            .set(&Self::meta_key(&self.key), raw, self.window)
            .await?;
        Ok(())
    }

    async fn load_slice(&mut self, addr: &SliceAddr) -> ScrollResult<SliceStatus> {
        if let Some(status) = self.slices.get(addr) {
            return Ok(status.clone());
        }

        let key = self.slice_key(addr);
        let status = match self.store.get(&key).await? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| ScrollError::Serialization(format!("slice record {}: {}", key, e)))?,
            None => {
                let fresh = SliceStatus::new();
                self.persist_slice(addr, &fresh).await?;
                fresh
            }
        };

        self.slices.insert(addr.clone(), status.clone());
        Ok(status)
    }

    async fn persist_slice(&self, addr: &SliceAddr, status: &SliceStatus) -> ScrollResult<()> {
        let raw = serde_json::to_string(status)?;
        self.store
            .set(&self.slice_key(addr), raw, self.window)
            .await?;
        Ok(())
    }
}
