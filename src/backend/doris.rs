//! Doris-style cursor backend
//!
//! Drives a paginated export against a Doris-style SQL store reached over
//! HTTP. The store has no server-side scroll, so the continuation cursor is
//! the next row offset, encoded as a decimal string.
//!
//! Slices partition the offset space in strides: slice `i` starts at
//! `i * limit` and advances by `slice_max * limit` each round, so parallel
//! slices cover disjoint pages without coordination. A page shorter than
//! `limit` means the slice has run off the end of the result set.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::rows::{row_from_object, Row};
use crate::backend::{SliceBackend, SliceQueryRequest, SliceReply, StorageType};

/// Default row time field used in the WHERE clause
pub const DEFAULT_TIME_FIELD: &str = "timestamp";

/// Doris-style SQL driver
#[derive(Debug)]
pub struct DorisBackend {
    client: Client,
    time_field: String,
}

impl DorisBackend {
    /// Create a driver with the given per-request timeout
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_default();

        Self {
            client,
            time_field: DEFAULT_TIME_FIELD.to_string(),
        }
    }

    /// Override the row time field used in the WHERE clause
    pub fn with_time_field(mut self, field: impl Into<String>) -> Self {
        self.time_field = field.into();
        self
    }
}

#[async_trait]
impl SliceBackend for DorisBackend {
    fn storage_type(&self) -> StorageType {
        StorageType::Doris
    }

    async fn execute_slice_query(&self, request: &SliceQueryRequest) -> BackendResult<SliceReply> {
        let offset = decode_offset(request)?;
        let sql = build_sql(request, &self.time_field, offset);

        let url = format!("{}/query", request.target.connect);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "sql": sql }))
            .send()
            .await?;
        let body = response.text().await?;

        parse_query_response(&body, request, offset)
    }
}

/// Resolve the offset for this round from the stored cursor
fn decode_offset(request: &SliceQueryRequest) -> BackendResult<u64> {
    match &request.cursor {
        Some(cursor) => cursor
            .parse::<u64>()
            .map_err(|_| BackendError::Decode(format!("invalid offset cursor: {}", cursor))),
        None => Ok((request.slice_index * request.limit) as u64),
    }
}

/// Build the paged SELECT for one slice round
fn build_sql(request: &SliceQueryRequest, time_field: &str, offset: u64) -> String {
    // Backends store row timestamps in milliseconds.
    let start_ms = request.time_range.start * 1000;
    let end_ms = request.time_range.end * 1000;

    let mut sql = format!(
        "SELECT * FROM `{}` WHERE `{}` >= {} AND `{}` < {}",
        request.target.db, time_field, start_ms, time_field, end_ms
    );

    for (field, value) in &request.filters {
        sql.push_str(&format!(" AND `{}` = '{}'", field, value.replace('\'', "''")));
    }

    sql.push_str(&format!(" LIMIT {}", request.limit));
    if offset > 0 {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    sql
}

#[derive(Debug, Deserialize)]
struct DorisResponse {
    #[serde(default)]
    result: bool,
    #[serde(default)]
    message: String,
    #[serde(default)]
    data: Option<DorisData>,
}

#[derive(Debug, Deserialize)]
struct DorisData {
    #[serde(default)]
    list: Vec<Value>,
    #[serde(default)]
    total_records: i64,
}

/// Decode a query response and derive the continuation cursor
fn parse_query_response(
    body: &str,
    request: &SliceQueryRequest,
    offset: u64,
) -> BackendResult<SliceReply> {
    let response: DorisResponse = serde_json::from_str(body)?;

    if !response.result {
        return Err(BackendError::Backend(response.message));
    }

    let data = response.data.unwrap_or(DorisData {
        list: Vec::new(),
        total_records: 0,
    });

    let rows: Vec<Row> = data
        .list
        .into_iter()
        .filter_map(|v| match v {
            Value::Object(map) => Some(row_from_object(map)),
            _ => None,
        })
        .collect();

    // A short page means this slice ran off the end of the result set.
    let cursor = if rows.len() < request.limit {
        String::new()
    } else {
        let stride = (request.slice_max.max(1) * request.limit) as u64;
        (offset + stride).to_string()
    };

    Ok(SliceReply {
        rows,
        cursor,
        total: data.total_records,
    })
}
