//! Scroll round orchestration
//!
//! One HTTP call is one round: the orchestrator resolves (or creates) the
//! scroll session, asks it for the currently eligible slices across every
//! routed table, fans the sub-queries out to the backend drivers with
//! bounded concurrency, records each slice's outcome, and aggregates the
//! delivered pages.
//!
//! Retry across rounds is driven by the caller re-invoking the endpoint;
//! the engine never loops internally.

use futures_util::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use crate::backend::{
    BackendRegistry, BackendResult, Row, SliceBackend, SliceQueryRequest, SliceReply, StorageType,
    TableRouter,
};
use crate::query::{QueryTs, TableId};
use crate::scroll::error::ScrollResult;
use crate::scroll::session::{derive_session_key, ScrollSession};
use crate::scroll::status::{SliceAddr, SliceOutcome, DEFAULT_FAILURE_CEILING};

/// Tunables for the scroll engine
#[derive(Debug, Clone)]
pub struct ScrollConfig {
    /// Default number of parallel slices when the request does not say
    pub slice_max: usize,
    /// Default page size per slice per round
    pub limit: usize,
    /// Failed attempts before a slice is abandoned
    pub failure_ceiling: u32,
    /// Scroll window when the request does not carry one
    pub default_window: Duration,
    /// Maximum concurrent backend sub-queries per round
    pub fanout_concurrency: usize,
    /// TTL of the per-session single-flight lock taken by the HTTP layer
    pub lock_ttl: Duration,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            slice_max: 3,
            limit: 100,
            failure_ceiling: DEFAULT_FAILURE_CEILING,
            default_window: Duration::from_secs(300),
            fanout_concurrency: 8,
            lock_ttl: Duration::from_secs(60),
        }
    }
}

/// Per-(table, connect) continuation info returned to the client
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultTableOption {
    /// Live continuation cursors, in slice order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scroll_ids: Vec<String>,
}

/// Options keyed by `"{table_id}|{connect}"`
pub type ResultTableOptions = BTreeMap<String, ResultTableOption>;

/// Key for one entry in [`ResultTableOptions`]
pub fn option_key(table_id: &TableId, connect: &str) -> String {
    format!("{}|{}", table_id, connect)
}

/// Session bookkeeping echoed in the response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Rounds orchestrated so far, including this one
    pub round: u64,
    /// Parallel slice count
    pub slice_max: usize,
    /// Page size per slice per round
    pub limit: usize,
    /// `"running"` while any slice is pending, `"done"` afterwards
    pub status: String,
}

/// Aggregated result of one round
#[derive(Debug, Clone)]
pub struct RoundResult {
    /// Sum of backend-reported hit counts across slices (may exceed the
    /// number of rows delivered)
    pub total: i64,
    /// Rows delivered this round; unordered between slices
    pub list: Vec<Row>,
    /// Continuation info per (table, connect)
    pub result_table_options: ResultTableOptions,
    /// True when every slice across every target is stop/completed
    pub done: bool,
    /// Session bookkeeping
    pub session: SessionInfo,
}

/// Executes scroll rounds against the routed backends
pub struct ScrollOrchestrator {
    store: Arc<dyn crate::store::StatusStore>,
    router: Arc<TableRouter>,
    backends: Arc<BackendRegistry>,
    config: ScrollConfig,
}

impl ScrollOrchestrator {
    /// Create an orchestrator over the given store, router, and drivers
    pub fn new(
        store: Arc<dyn crate::store::StatusStore>,
        router: Arc<TableRouter>,
        backends: Arc<BackendRegistry>,
        config: ScrollConfig,
    ) -> Self {
        Self {
            store,
            router,
            backends,
            config,
        }
    }

    /// The engine tunables this orchestrator runs with
    pub fn config(&self) -> &ScrollConfig {
        &self.config
    }

    /// Derive the session key for a request (used by the HTTP layer for
    /// single-flight locking)
    pub fn session_key(&self, query: &QueryTs, identity: &str) -> ScrollResult<String> {
        derive_session_key(query, identity)
    }

    /// Execute one round of a paginated raw-data query
    pub async fn query_raw_with_scroll(
        &self,
        query: &QueryTs,
        identity: &str,
    ) -> ScrollResult<RoundResult> {
        query.validate()?;
        let time_range = query.time_range()?;
        let window = query.scroll_window(self.config.default_window)?;
        let limit = if query.limit > 0 {
            query.limit
        } else {
            self.config.limit
        };
        let slice_max = query.slice_max.unwrap_or(self.config.slice_max).max(1);

        let session_key = derive_session_key(query, identity)?;

        // A cache clear must happen before slice selection so the round
        // below runs against fresh slices and fresh cursors.
        if query.clear_cache {
            ScrollSession::destroy(&*self.store, &session_key).await?;
        }

        let mut session = ScrollSession::load_or_create(
            Arc::clone(&self.store),
            &session_key,
            slice_max,
            limit,
            window,
            self.config.failure_ceiling,
        )
        .await?;

        // Resolve targets. Unknown tables contribute nothing; a routed
        // storage type with no registered driver is a deployment problem
        // and fails the request.
        let mut resolved = Vec::new();
        for query_ref in &query.query_list {
            match self.router.resolve(&query_ref.table_id).await {
                Some(target) => {
                    let driver = self.backends.get(target.storage_type)?;
                    resolved.push((query_ref, target, driver));
                }
                None => {
                    tracing::warn!(table = %query_ref.table_id, "no route for table, skipping");
                }
            }
        }

        let mut jobs: Vec<(SliceAddr, SliceQueryRequest, Arc<dyn SliceBackend>)> = Vec::new();
        for (query_ref, target, driver) in &resolved {
            let slices = session
                .make_slices(target.storage_type, &target.connect, &target.table_id)
                .await?;
            for slice in slices {
                let request = SliceQueryRequest {
                    target: target.clone(),
                    cursor: slice.cursor,
                    slice_index: slice.addr.slice_index,
                    slice_max,
                    limit,
                    window,
                    time_range,
                    filters: query_ref.filters.clone(),
                };
                jobs.push((slice.addr, request, Arc::clone(driver)));
            }
        }

        if jobs.is_empty() {
            // Steady-state terminal case: nothing eligible anywhere.
            session.touch().await?;
            let done = session.all_settled();
            return Ok(self.finish(&session, 0, Vec::new(), done));
        }

        let concurrency = self.config.fanout_concurrency.max(1);
        type SliceJobFuture =
            Pin<Box<dyn Future<Output = (SliceAddr, BackendResult<SliceReply>)> + Send>>;
        let mut job_futures: Vec<SliceJobFuture> = Vec::with_capacity(jobs.len());
        for (addr, request, driver) in jobs {
            job_futures.push(Box::pin(async move {
                let reply = driver.execute_slice_query(&request).await;
                (addr, reply)
            }));
        }
        let outcomes: Vec<(SliceAddr, BackendResult<SliceReply>)> = stream::iter(job_futures)
            .buffer_unordered(concurrency)
            .collect()
            .await;

        let mut total: i64 = 0;
        let mut list: Vec<Row> = Vec::new();
        for (addr, reply) in outcomes {
            let outcome = match reply {
                Ok(reply) => {
                    total += reply.total;
                    list.extend(reply.rows);
                    if reply.cursor.is_empty() {
                        SliceOutcome::Empty
                    } else {
                        SliceOutcome::Data {
                            cursor: reply.cursor,
                        }
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        slice = %addr.status_key(),
                        %error,
                        "slice sub-query failed, counting against its budget"
                    );
                    SliceOutcome::Failed
                }
            };

            match addr.storage_type {
                StorageType::Elasticsearch => {
                    session
                        .update_scroll_id(&addr.connect, &addr.table_id, addr.slice_index, outcome)
                        .await?;
                }
                StorageType::Doris => {
                    session
                        .update_cursor(&addr.connect, &addr.table_id, addr.slice_index, outcome)
                        .await?;
                }
            }
        }

        session.touch().await?;
        let done = session.all_settled();
        tracing::debug!(
            session = %session.key(),
            round = session.meta().round,
            total,
            rows = list.len(),
            done,
            "scroll round finished"
        );

        Ok(self.finish(&session, total, list, done))
    }

    fn finish(&self, session: &ScrollSession, total: i64, list: Vec<Row>, done: bool) -> RoundResult {
        let mut options = ResultTableOptions::new();
        for ((table_id, connect), scroll_ids) in session.live_cursors() {
            options.insert(
                option_key(&table_id, &connect),
                ResultTableOption { scroll_ids },
            );
        }

        RoundResult {
            total,
            list,
            result_table_options: options,
            done,
            session: SessionInfo {
                round: session.meta().round,
                slice_max: session.slice_max,
                limit: session.limit,
                status: if done { "done" } else { "running" }.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, FieldValue, TableTarget};
    use crate::query::QueryRef;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Scripted backend: replies keyed by (slice index, cursor), every call
    /// recorded for assertions on slice selection.
    #[derive(Debug)]
    struct MockBackend {
        storage_type: StorageType,
        replies: Mutex<HashMap<(usize, Option<String>), Result<SliceReply, String>>>,
        calls: Mutex<Vec<(usize, Option<String>)>>,
    }

    impl MockBackend {
        fn new(storage_type: StorageType) -> Self {
            Self {
                storage_type,
                replies: Mutex::new(HashMap::new()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn script(
            &self,
            slice_index: usize,
            cursor: Option<&str>,
            reply: Result<SliceReply, String>,
        ) {
            self.replies
                .lock()
                .unwrap()
                .insert((slice_index, cursor.map(String::from)), reply);
        }

        fn calls(&self) -> Vec<(usize, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }

        fn reset_calls(&self) {
            self.calls.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl SliceBackend for MockBackend {
        fn storage_type(&self) -> StorageType {
            self.storage_type
        }

        async fn execute_slice_query(
            &self,
            request: &SliceQueryRequest,
        ) -> BackendResult<SliceReply> {
            let key = (request.slice_index, request.cursor.clone());
            self.calls.lock().unwrap().push(key.clone());
            match self.replies.lock().unwrap().get(&key) {
                Some(Ok(reply)) => Ok(reply.clone()),
                Some(Err(message)) => Err(BackendError::Backend(message.clone())),
                None => Err(BackendError::Backend(format!(
                    "unscripted call: slice {} cursor {:?}",
                    key.0, key.1
                ))),
            }
        }
    }

    fn data_reply(row_value: &str, cursor: &str, total: i64) -> Result<SliceReply, String> {
        let mut row = Row::new();
        row.insert(
            "data".to_string(),
            FieldValue::String(row_value.to_string()),
        );
        Ok(SliceReply {
            rows: vec![row],
            cursor: cursor.to_string(),
            total,
        })
    }

    fn empty_reply() -> Result<SliceReply, String> {
        Ok(SliceReply::default())
    }

    fn sample_query(table: &str) -> QueryTs {
        QueryTs {
            space_uid: "space_1".to_string(),
            query_list: vec![QueryRef::table(table)],
            start: "1723594000".to_string(),
            end: "1723595000".to_string(),
            limit: 10,
            scroll: "9m".to_string(),
            slice_max: Some(3),
            clear_cache: false,
            timezone: "Asia/Shanghai".to_string(),
        }
    }

    fn es_target(table: &str) -> TableTarget {
        TableTarget {
            table_id: TableId::new(table),
            storage_type: StorageType::Elasticsearch,
            connect: "http://127.0.0.1:9200".to_string(),
            db: "es_index".to_string(),
        }
    }

    async fn orchestrator_with(
        backend: Arc<MockBackend>,
        table: &str,
    ) -> (ScrollOrchestrator, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let router = Arc::new(TableRouter::new());
        router.add(es_target(table)).await;

        let mut registry = BackendRegistry::new();
        registry.register(backend);

        let orchestrator = ScrollOrchestrator::new(
            Arc::clone(&store) as Arc<dyn crate::store::StatusStore>,
            router,
            Arc::new(registry),
            ScrollConfig::default(),
        );
        (orchestrator, store)
    }

    #[tokio::test]
    async fn test_full_scroll_flow_until_done() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        for slice in 0..3 {
            backend.script(
                slice,
                None,
                data_reply(&format!("r1_s{}", slice), &format!("c{}_1", slice), 1),
            );
            backend.script(
                slice,
                Some(&format!("c{}_1", slice)),
                data_reply(&format!("r2_s{}", slice), &format!("c{}_2", slice), 1),
            );
            backend.script(slice, Some(&format!("c{}_2", slice)), empty_reply());
        }

        let (orchestrator, _store) = orchestrator_with(Arc::clone(&backend), "result_table.es").await;
        let query = sample_query("result_table.es");

        // Round 1: fresh scrolls, one row per slice.
        let round1 = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert_eq!(round1.total, 3);
        assert_eq!(round1.list.len(), 3);
        assert!(!round1.done);
        assert_eq!(round1.session.round, 1);
        assert_eq!(round1.session.status, "running");
        let options = round1
            .result_table_options
            .get("result_table.es|http://127.0.0.1:9200")
            .unwrap();
        assert_eq!(options.scroll_ids, vec!["c0_1", "c1_1", "c2_1"]);

        // Round 2: continuations.
        let round2 = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert_eq!(round2.total, 3);
        assert!(!round2.done);

        // Round 3: every slice reports exhaustion.
        let round3 = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert_eq!(round3.total, 0);
        assert!(round3.list.is_empty());
        assert!(round3.done);
        assert_eq!(round3.session.status, "done");

        // Round 4: steady-state terminal, no backend traffic.
        backend.reset_calls();
        let round4 = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert_eq!(round4.total, 0);
        assert!(round4.done);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_table_is_empty_success() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        let (orchestrator, _store) = orchestrator_with(backend, "result_table.es").await;

        let query = sample_query("result_table.missing");
        let round = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();

        assert_eq!(round.total, 0);
        assert!(round.list.is_empty());
        assert!(round.result_table_options.is_empty());
        assert!(round.done);
    }

    #[tokio::test]
    async fn test_empty_query_list_is_an_error() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        let (orchestrator, _store) = orchestrator_with(backend, "result_table.es").await;

        let mut query = sample_query("result_table.es");
        query.query_list.clear();

        let err = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::scroll::ScrollError::Query(_)));
    }

    #[tokio::test]
    async fn test_missing_driver_is_an_error() {
        // Router knows the table but no driver serves Doris.
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        let store = Arc::new(MemoryStore::new());
        let router = Arc::new(TableRouter::new());
        router
            .add(TableTarget {
                table_id: TableId::new("result_table.doris"),
                storage_type: StorageType::Doris,
                connect: "http://127.0.0.1:8030".to_string(),
                db: "doris_db".to_string(),
            })
            .await;
        let mut registry = BackendRegistry::new();
        registry.register(backend);

        let orchestrator = ScrollOrchestrator::new(
            store as Arc<dyn crate::store::StatusStore>,
            router,
            Arc::new(registry),
            ScrollConfig::default(),
        );

        let err = orchestrator
            .query_raw_with_scroll(&sample_query("result_table.doris"), "user")
            .await
            .unwrap_err();
        assert!(matches!(err, crate::scroll::ScrollError::Backend(_)));
    }

    #[tokio::test]
    async fn test_slice_failure_is_absorbed_and_eventually_excluded() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        // Slice 0 always fails; slices 1 and 2 keep producing data.
        backend.script(0, None, Err("all shards failed".to_string()));
        for slice in 1..3 {
            backend.script(
                slice,
                None,
                data_reply(&format!("r_s{}", slice), &format!("c{}", slice), 1),
            );
            backend.script(
                slice,
                Some(&format!("c{}", slice)),
                data_reply(&format!("r_s{}", slice), &format!("c{}", slice), 1),
            );
        }

        let (orchestrator, _store) = orchestrator_with(Arc::clone(&backend), "result_table.es").await;
        let query = sample_query("result_table.es");

        // Three rounds: slice 0 burns its whole failure budget, the round
        // itself keeps succeeding on the other slices' data.
        for _ in 0..3 {
            let round = orchestrator
                .query_raw_with_scroll(&query, "user")
                .await
                .unwrap();
            assert_eq!(round.total, 2);
            assert_eq!(round.list.len(), 2);
            assert!(!round.done);
        }

        // Round 4: slice 0 is stopped and no longer queried.
        backend.reset_calls();
        let round = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert_eq!(round.total, 2);
        let queried: Vec<usize> = backend.calls().iter().map(|(i, _)| *i).collect();
        assert!(!queried.contains(&0));
        assert_eq!(queried.len(), 2);
    }

    #[tokio::test]
    async fn test_all_slices_empty_first_round_completes_session() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        for slice in 0..3 {
            backend.script(slice, None, empty_reply());
        }

        let (orchestrator, _store) = orchestrator_with(Arc::clone(&backend), "result_table.es").await;
        let query = sample_query("result_table.es");

        let round1 = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert!(round1.done);
        assert_eq!(round1.total, 0);

        // Round 2 finds no eligible slices and stays done.
        backend.reset_calls();
        let round2 = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert!(round2.done);
        assert!(backend.calls().is_empty());
    }

    #[tokio::test]
    async fn test_clear_cache_restarts_a_stopped_session() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        for slice in 0..3 {
            backend.script(slice, None, Err("boom".to_string()));
        }

        let (orchestrator, _store) = orchestrator_with(Arc::clone(&backend), "result_table.es").await;
        let mut query = sample_query("result_table.es");

        // Burn every slice's failure budget.
        for _ in 0..3 {
            orchestrator
                .query_raw_with_scroll(&query, "user")
                .await
                .unwrap();
        }
        backend.reset_calls();
        let stalled = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert!(stalled.done, "all slices stopped counts as settled");
        assert!(backend.calls().is_empty());

        // Clear cache: all three slices run fresh again.
        for slice in 0..3 {
            backend.script(
                slice,
                None,
                data_reply(&format!("fresh_s{}", slice), "", 1),
            );
        }
        query.clear_cache = true;
        backend.reset_calls();
        let restarted = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert_eq!(backend.calls().len(), 3);
        assert_eq!(restarted.total, 3);
        assert_eq!(restarted.session.round, 1, "fresh session restarts counting");
    }

    #[tokio::test]
    async fn test_data_with_cleared_cursor_still_delivers_rows() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        // Every slice returns a final page: data, but no continuation.
        for slice in 0..3 {
            backend.script(slice, None, data_reply(&format!("s{}", slice), "", 1));
        }

        let (orchestrator, _store) = orchestrator_with(Arc::clone(&backend), "result_table.es").await;
        let round = orchestrator
            .query_raw_with_scroll(&sample_query("result_table.es"), "user")
            .await
            .unwrap();

        assert_eq!(round.list.len(), 3);
        assert_eq!(round.total, 3);
        assert!(round.done, "cleared cursors complete every slice");
    }

    #[tokio::test]
    async fn test_mixed_backends_in_one_request() {
        let es = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        let doris = Arc::new(MockBackend::new(StorageType::Doris));
        for slice in 0..3 {
            es.script(slice, None, data_reply(&format!("es_{}", slice), "", 1));
            doris.script(slice, None, data_reply(&format!("doris_{}", slice), "", 2));
        }

        let store = Arc::new(MemoryStore::new());
        let router = Arc::new(TableRouter::new());
        router.add(es_target("result_table.es")).await;
        router
            .add(TableTarget {
                table_id: TableId::new("result_table.doris"),
                storage_type: StorageType::Doris,
                connect: "http://127.0.0.1:8030".to_string(),
                db: "doris_db".to_string(),
            })
            .await;

        let mut registry = BackendRegistry::new();
        registry.register(Arc::clone(&es) as Arc<dyn SliceBackend>);
        registry.register(Arc::clone(&doris) as Arc<dyn SliceBackend>);

        let orchestrator = ScrollOrchestrator::new(
            store as Arc<dyn crate::store::StatusStore>,
            router,
            Arc::new(registry),
            ScrollConfig::default(),
        );

        let mut query = sample_query("result_table.es");
        query
            .query_list
            .push(QueryRef::table("result_table.doris"));

        let round = orchestrator
            .query_raw_with_scroll(&query, "user")
            .await
            .unwrap();
        assert_eq!(round.list.len(), 6);
        assert_eq!(round.total, 3 + 6);
        assert!(round.done);
        assert_eq!(es.calls().len(), 3);
        assert_eq!(doris.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_sessions_are_isolated_per_identity() {
        let backend = Arc::new(MockBackend::new(StorageType::Elasticsearch));
        for slice in 0..3 {
            backend.script(slice, None, data_reply(&format!("s{}", slice), "", 1));
        }

        let (orchestrator, _store) = orchestrator_with(Arc::clone(&backend), "result_table.es").await;
        let query = sample_query("result_table.es");

        let first = orchestrator
            .query_raw_with_scroll(&query, "user_a")
            .await
            .unwrap();
        assert!(first.done);

        // A different user starts its own session and queries fresh.
        backend.reset_calls();
        let second = orchestrator
            .query_raw_with_scroll(&query, "user_b")
            .await
            .unwrap();
        assert_eq!(backend.calls().len(), 3);
        assert_eq!(second.session.round, 1);
    }
}
