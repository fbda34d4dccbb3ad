//! Data Transfer Objects
//!
//! Response types for the API endpoints. The request body of the scroll
//! endpoint is [`crate::query::QueryTs`] itself; it deserializes straight
//! from the wire.

use serde::Serialize;

use crate::backend::Row;
use crate::scroll::{ResultTableOptions, SessionInfo};

/// Response of `POST /query/raw_with_scroll`
#[derive(Debug, Serialize)]
pub struct RawQueryResponse {
    /// Correlates the response with server logs
    pub trace_id: String,
    /// Sum of backend-reported hit counts across slices this round
    pub total: i64,
    /// Rows delivered this round
    pub list: Vec<Row>,
    /// Continuation info per (table, connect)
    pub result_table_options: ResultTableOptions,
    /// True when the session has nothing more to deliver; the client stops
    /// polling on this
    pub done: bool,
    /// Session bookkeeping
    pub session: SessionInfo,
}

/// Response of `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall status: "healthy" or "unhealthy"
    pub status: String,
    /// Status store health: "ok" or "error"
    pub store: String,
    /// Seconds since the server started
    pub uptime_seconds: u64,
    /// Server version
    pub version: String,
}
