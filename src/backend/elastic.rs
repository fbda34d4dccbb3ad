//! Elasticsearch slice backend
//!
//! Drives a sliced scroll export against an Elasticsearch cluster:
//!
//! - Fresh slices open a scroll with `POST {connect}/{index}/_search?scroll=N`
//!   carrying a `slice: {id, max}` block and `sort: ["_doc"]` (doc order is
//!   the cheapest stable order for a full export).
//! - Continuations go through `POST {connect}/_search/scroll` with the stored
//!   scroll id.
//! - An empty `_scroll_id` or an empty hit page signals exhaustion.
//!
//! The HTTP plumbing is kept apart from body building and response parsing
//! so the wire formats are testable without a cluster.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

use crate::backend::error::{BackendError, BackendResult};
use crate::backend::rows::{row_from_object, Row};
use crate::backend::{SliceBackend, SliceQueryRequest, SliceReply, StorageType};

/// Default document time field used in range filters
pub const DEFAULT_TIME_FIELD: &str = "timestamp";

/// Elasticsearch driver
#[derive(Debug)]
pub struct ElasticBackend {
    client: Client,
    time_field: String,
}

impl ElasticBackend {
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

    /// Override the document time field used in range filters
    pub fn with_time_field(mut self, field: impl Into<String>) -> Self {
        self.time_field = field.into();
        self
    }

    async fn search(&self, request: &SliceQueryRequest) -> BackendResult<String> {
        let window = format_window(request.window);

        let (url, body) = match &request.cursor {
            Some(scroll_id) => (
                format!("{}/_search/scroll", request.target.connect),
                json!({ "scroll": window, "scroll_id": scroll_id }),
            ),
            None => (
                format!(
                    "{}/{}/_search?scroll={}",
                    request.target.connect, request.target.db, window
                ),
                build_search_body(request, &self.time_field),
            ),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        Ok(response.text().await?)
    }
}

#[async_trait]
impl SliceBackend for ElasticBackend {
    fn storage_type(&self) -> StorageType {
        StorageType::Elasticsearch
    }

    async fn execute_slice_query(&self, request: &SliceQueryRequest) -> BackendResult<SliceReply> {
        let body = self.search(request).await?;
        parse_search_response(&body)
    }
}

/// Build the initial sliced search body
fn build_search_body(request: &SliceQueryRequest, time_field: &str) -> Value {
    let range = json!({
        "range": {
            time_field: {
                "from": request.time_range.start,
                "to": request.time_range.end,
                "format": "epoch_second",
                "include_lower": true,
                "include_upper": true,
            }
        }
    });

    let filter = if request.filters.is_empty() {
        range
    } else {
        let mut clauses = vec![range];
        for (field, value) in &request.filters {
            clauses.push(json!({ "term": { field: value } }));
        }
        Value::Array(clauses)
    };

    let mut body = json!({
        "query": { "bool": { "filter": filter } },
        "size": request.limit,
        "sort": ["_doc"],
    });

    // Slicing needs at least two partitions; a single-slice scroll is a
    // plain scroll.
    if request.slice_max > 1 {
        body["slice"] = json!({ "id": request.slice_index, "max": request.slice_max });
    }

    body
}

/// Render a scroll keep-alive for the ES wire format
fn format_window(window: Duration) -> String {
    format!("{}s", window.as_secs())
}

#[derive(Debug, Deserialize)]
struct EsResponse {
    #[serde(rename = "_scroll_id", default)]
    scroll_id: Option<String>,
    #[serde(default)]
    hits: Option<EsHits>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct EsHits {
    #[serde(default)]
    total: Option<EsTotal>,
    #[serde(default)]
    hits: Vec<EsHit>,
}

#[derive(Debug, Deserialize)]
struct EsTotal {
    #[serde(default)]
    value: i64,
}

#[derive(Debug, Deserialize)]
struct EsHit {
    #[serde(rename = "_source", default)]
    source: Option<serde_json::Map<String, Value>>,
}

/// Decode a search or scroll response into a slice reply
fn parse_search_response(body: &str) -> BackendResult<SliceReply> {
    let response: EsResponse = serde_json::from_str(body)?;

    if let Some(error) = response.error {
        return Err(BackendError::Backend(error.to_string()));
    }

    let hits = response.hits.unwrap_or(EsHits {
        total: None,
        hits: Vec::new(),
    });

    let rows: Vec<Row> = hits
        .hits
        .into_iter()
        .filter_map(|h| h.source)
        .map(row_from_object)
        .collect();

    let cursor = if rows.is_empty() {
        // ES keeps returning the last scroll id on an exhausted scroll;
        // an empty page means there is nothing left to continue to.
        String::new()
    } else {
        response.scroll_id.unwrap_or_default()
    };

    Ok(SliceReply {
        rows,
        cursor,
        total: hits.total.map(|t| t.value).unwrap_or(0),
    })
}
