//! # Tidegate
//!
//! Unified time-series query gateway: one HTTP surface over heterogeneous
//! storage backends, with scroll-based distributed pagination for large
//! raw-data exports.
//!
//! ## Features
//!
//! - **Sliced scrolls**: exports are partitioned into independently
//!   cursored slices queried in parallel
//! - **Round-driven pagination**: one HTTP call executes one round; the
//!   client polls until `done`
//! - **Failure budgets**: a failing slice retries across rounds and is
//!   excluded once it exhausts its budget, without failing the export
//! - **Pluggable backends**: Elasticsearch scroll and Doris-style cursor
//!   drivers behind one driver trait
//! - **Shared sessions**: slice state lives in a pluggable status store so
//!   any gateway instance can continue a session
//!
//! ## Modules
//!
//! - [`scroll`]: session, slice retry policy, and round orchestration
//! - [`store`]: shared status store trait and in-memory implementation
//! - [`backend`]: backend drivers and table routing
//! - [`query`]: structured query request model
//! - [`api`]: REST API server with Axum
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tidegate::backend::{BackendRegistry, ElasticBackend, StorageType, TableRouter, TableTarget};
//! use tidegate::query::{QueryRef, QueryTs, TableId};
//! use tidegate::scroll::{ScrollConfig, ScrollOrchestrator};
//! use tidegate::store::MemoryStore;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(MemoryStore::new());
//!     let router = Arc::new(TableRouter::new());
//!     router
//!         .add(TableTarget {
//!             table_id: TableId::new("result_table.es"),
//!             storage_type: StorageType::Elasticsearch,
//!             connect: "http://127.0.0.1:9200".to_string(),
//!             db: "es_index".to_string(),
//!         })
//!         .await;
//!
//!     let mut backends = BackendRegistry::new();
//!     backends.register(Arc::new(ElasticBackend::new(std::time::Duration::from_secs(30))));
//!
//!     let orchestrator = ScrollOrchestrator::new(
//!         store,
//!         router,
//!         Arc::new(backends),
//!         ScrollConfig::default(),
//!     );
//!
//!     let query = QueryTs {
//!         space_uid: "space_1".to_string(),
//!         query_list: vec![QueryRef::table("result_table.es")],
//!         start: "1723594000".to_string(),
//!         end: "1723595000".to_string(),
//!         limit: 10,
//!         scroll: "9m".to_string(),
//!         slice_max: Some(3),
//!         clear_cache: false,
//!         timezone: String::new(),
//!     };
//!
//!     // Poll rounds until the session reports done.
//!     loop {
//!         let round = orchestrator.query_raw_with_scroll(&query, "exporter").await?;
//!         println!("round {}: {} rows", round.session.round, round.list.len());
//!         if round.done {
//!             break;
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod backend;
pub mod config;
pub mod query;
pub mod scroll;
pub mod store;

// Re-export top-level types for convenience
pub use scroll::{
    derive_session_key, ResultTableOption, ResultTableOptions, RoundResult, ScrollConfig,
    ScrollError, ScrollOrchestrator, ScrollResult, ScrollSession, SessionInfo, SliceOutcome,
    SliceState, SliceStatus, DEFAULT_FAILURE_CEILING,
};

pub use store::{MemoryStore, StatusStore, StoreError, StoreResult};

pub use backend::{
    BackendError, BackendRegistry, BackendResult, DorisBackend, ElasticBackend, FieldValue, Row,
    SliceBackend, SliceQueryRequest, SliceReply, StorageType, TableRouter, TableTarget,
};

pub use query::{QueryError, QueryRef, QueryResult, QueryTs, TableId, TimeRange};

pub use api::{build_router, serve, ApiConfig, ApiError, AppState};

pub use config::{
    Config, ConfigError, LoggingConfig, ScrollConfig as ConfigScrollConfig, TableRouteConfig,
};
