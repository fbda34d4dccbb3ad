//! Backend storage drivers
//!
//! Each supported storage system implements [`SliceBackend`]: execute one
//! sub-query for one slice of a scrolled export, returning the page of rows,
//! a continuation cursor, and the backend-reported total. An empty returned
//! cursor with no error means the slice is exhausted.
//!
//! The [`TableRouter`] resolves result-table ids to concrete backend
//! instances; tables it does not know about resolve to nothing, which the
//! scroll engine treats as an empty successful result rather than an error.

pub mod doris;
pub mod elastic;
pub mod error;
pub mod rows;

pub use doris::DorisBackend;
pub use elastic::ElasticBackend;
pub use error::{BackendError, BackendResult};
pub use rows::{row_from_object, FieldValue, Row};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::query::{TableId, TimeRange};

/// Storage systems the gateway can route a table to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageType {
    /// Elasticsearch, paginated via the scroll API with sliced scrolls
    Elasticsearch,
    /// Doris-style SQL store, paginated via LIMIT/OFFSET cursors
    Doris,
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageType::Elasticsearch => write!(f, "elasticsearch"),
            StorageType::Doris => write!(f, "doris"),
        }
    }
}

impl StorageType {
    /// Parse from the wire/config representation
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "elasticsearch" | "es" => Some(Self::Elasticsearch),
            "doris" => Some(Self::Doris),
            _ => None,
        }
    }
}

/// A result table resolved to a concrete backend instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableTarget {
    /// Table id this target serves
    pub table_id: TableId,
    /// Which driver talks to it
    pub storage_type: StorageType,
    /// Backend base URL, e.g. `http://127.0.0.1:9200`
    pub connect: String,
    /// Physical database/index name on the backend
    pub db: String,
}

/// One slice's worth of work for a backend driver
#[derive(Debug, Clone)]
pub struct SliceQueryRequest {
    /// Resolved table target
    pub target: TableTarget,
    /// Continuation cursor from the previous round; `None` starts fresh
    pub cursor: Option<String>,
    /// Which slice of the partitioned scroll this is
    pub slice_index: usize,
    /// Total number of slices the scroll is partitioned into
    pub slice_max: usize,
    /// Page size for this slice this round
    pub limit: usize,
    /// Backend-side cursor keep-alive
    pub window: Duration,
    /// Time range being exported
    pub time_range: TimeRange,
    /// Equality filters (field -> value)
    pub filters: BTreeMap<String, String>,
}

/// A backend driver's answer for one slice sub-query
#[derive(Debug, Clone, Default)]
pub struct SliceReply {
    /// Rows delivered this round
    pub rows: Vec<Row>,
    /// Continuation cursor; empty signals the slice is exhausted
    pub cursor: String,
    /// Backend-reported total hits for the slice's partition. Backends may
    /// report more than the page actually delivered.
    pub total: i64,
}

/// Driver interface for one storage system
#[async_trait]
pub trait SliceBackend: Send + Sync + fmt::Debug {
    /// Which storage type this driver serves
    fn storage_type(&self) -> StorageType;

    /// Execute one sub-query for one slice
    async fn execute_slice_query(&self, request: &SliceQueryRequest) -> BackendResult<SliceReply>;
}

/// Maps table ids to backend instances
///
/// In production this is fed from service discovery; tests and single-node
/// deployments populate it from configuration.
#[derive(Debug, Default)]
pub struct TableRouter {
    routes: RwLock<HashMap<TableId, TableTarget>>,
}

impl TableRouter {
    /// Create an empty router
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a route
    pub async fn add(&self, target: TableTarget) {
        self.routes
            .write()
            .await
            .insert(target.table_id.clone(), target);
    }

    /// Resolve a table id; `None` for tables the router does not know
    pub async fn resolve(&self, table_id: &TableId) -> Option<TableTarget> {
        self.routes.read().await.get(table_id).cloned()
    }

    /// Number of registered routes
    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    /// Whether no routes are registered
    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }
}

/// Registry of driver instances keyed by storage type
#[derive(Default)]
pub struct BackendRegistry {
    backends: HashMap<StorageType, Arc<dyn SliceBackend>>,
}

impl BackendRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver for its storage type
    pub fn register(&mut self, backend: Arc<dyn SliceBackend>) {
        self.backends.insert(backend.storage_type(), backend);
    }

    /// Look up the driver for a storage type
    pub fn get(&self, storage_type: StorageType) -> BackendResult<Arc<dyn SliceBackend>> {
        self.backends
            .get(&storage_type)
            .cloned()
            .ok_or_else(|| BackendError::UnsupportedStorage(storage_type.to_string()))
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("storage_types", &self.backends.keys().collect::<Vec<_>>())
            .finish()
    }
}
