//! Raw query routes
//!
//! Endpoint for scroll-paginated raw-data export.
//!
//! - POST /query/raw_with_scroll - Execute one scroll round
//!
//! The client polls this endpoint with the same body until `done` is true.
//! Each call is one round; single-flight per session is enforced here with
//! an advisory lock in the status store, so overlapping rounds for the same
//! session are rejected rather than racing each other's cursors.

use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::dto::RawQueryResponse;
use crate::api::error::{ApiError, ApiResult};
use crate::api::state::AppState;
use crate::query::QueryTs;
use crate::scroll::lock_key;

/// Header carrying the authenticated caller identity, set by the auth proxy
/// in front of the gateway
pub const USER_HEADER: &str = "x-remote-user";

/// Identity used when the header is absent (direct access in dev setups)
pub const ANONYMOUS_USER: &str = "anonymous";

/// POST /query/raw_with_scroll
///
/// Execute one round of a scroll-paginated raw query.
pub async fn raw_with_scroll(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(query): Json<QueryTs>,
) -> ApiResult<Json<RawQueryResponse>> {
    let identity = headers
        .get(USER_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(ANONYMOUS_USER)
        .to_string();
    let trace_id = Uuid::new_v4().to_string();

    query.validate()?;

    let session_key = state.orchestrator.session_key(&query, &identity)?;
    let lock = lock_key(&session_key);
    let lock_ttl = state.orchestrator.config().lock_ttl;

    if !state.store.try_lock(&lock, lock_ttl).await? {
        return Err(ApiError::Conflict(
            "a round for this scroll session is already in flight".to_string(),
        ));
    }

    let result = state.orchestrator.query_raw_with_scroll(&query, &identity).await;
    let unlock_result = state.store.unlock(&lock).await;

    let round = result?;
    unlock_result?;

    tracing::info!(
        trace_id = %trace_id,
        user = %identity,
        total = round.total,
        rows = round.list.len(),
        round = round.session.round,
        done = round.done,
        "scroll round served"
    );

    Ok(Json(RawQueryResponse {
        trace_id,
        total: round.total,
        list: round.list,
        result_table_options: round.result_table_options,
        done: round.done,
        session: round.session,
    }))
}
