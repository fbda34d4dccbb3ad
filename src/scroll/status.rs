//! Per-slice status records and the retry policy
//!
//! Every slice of a scroll session carries a small persisted record: the
//! backend continuation cursor, a status, and a failure counter. The retry
//! policy is a pure function over that record, kept separate from storage
//! and orchestration so it can be tested exhaustively.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::backend::StorageType;
use crate::query::TableId;

/// Default number of failed attempts before a slice is abandoned
pub const DEFAULT_FAILURE_CEILING: u32 = 3;

/// Lifecycle state of one slice
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SliceState {
    /// Eligible for the next round
    Pending,
    /// Failure budget exhausted; permanently excluded from this session
    Stop,
    /// Backend reported no more data
    Completed,
}

impl SliceState {
    /// Terminal states are never selected again within a session
    pub fn is_terminal(&self) -> bool {
        matches!(self, SliceState::Stop | SliceState::Completed)
    }
}

impl fmt::Display for SliceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SliceState::Pending => write!(f, "pending"),
            SliceState::Stop => write!(f, "stop"),
            SliceState::Completed => write!(f, "completed"),
        }
    }
}

/// Persisted status record for one slice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SliceStatus {
    /// Backend continuation token; empty means not started or exhausted
    pub cursor: String,
    /// Current lifecycle state
    pub status: SliceState,
    /// Consecutive failed attempts
    pub failure_count: u32,
}

impl SliceStatus {
    /// A fresh, never-queried slice
    pub fn new() -> Self {
        Self {
            cursor: String::new(),
            status: SliceState::Pending,
            failure_count: 0,
        }
    }

    /// Whether the slice can never run again in this session
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

impl Default for SliceStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Address of one slice within a session
///
/// A session may span several table/backend combinations; each combination
/// tracks its own `slice_max` cursors independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SliceAddr {
    /// Storage system serving the slice
    pub storage_type: StorageType,
    /// Backend instance address
    pub connect: String,
    /// Result table the slice belongs to
    pub table_id: TableId,
    /// Slice index in `[0, slice_max)`
    pub slice_index: usize,
}

impl SliceAddr {
    /// Key of this slice's status record, scoped under the session namespace
    /// by the caller
    pub fn status_key(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.storage_type, self.connect, self.table_id, self.slice_index
        )
    }
}

/// Classified outcome of one slice sub-query
#[derive(Debug, Clone, PartialEq)]
pub enum SliceOutcome {
    /// The backend delivered data and a continuation cursor
    Data {
        /// Cursor for the next round
        cursor: String,
    },
    /// The backend reported no more data
    Empty,
    /// The sub-query failed
    Failed,
}

/// Apply the retry policy to one status record
///
/// Terminal records are absorbing: any further outcome leaves them
/// unchanged. A success resets the failure counter; the `ceiling`-th failure
/// moves the slice to [`SliceState::Stop`].
pub fn advance(current: &SliceStatus, outcome: &SliceOutcome, ceiling: u32) -> SliceStatus {
    if current.is_terminal() {
        return current.clone();
    }

    match outcome {
        SliceOutcome::Data { cursor } => SliceStatus {
            cursor: cursor.clone(),
            status: SliceState::Pending,
            failure_count: 0,
        },
        SliceOutcome::Empty => SliceStatus {
            cursor: String::new(),
            status: SliceState::Completed,
            failure_count: current.failure_count,
        },
        SliceOutcome::Failed => {
            let failure_count = current.failure_count + 1;
            let status = if failure_count >= ceiling {
                SliceState::Stop
            } else {
                SliceState::Pending
            };
            SliceStatus {
                cursor: current.cursor.clone(),
                status,
                failure_count,
            }
        }
    }
}
