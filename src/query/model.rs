//! Structured query request model
//!
//! `QueryTs` is the JSON body accepted by the raw-query endpoints. It names
//! a set of result tables to read, a time range, and the scroll parameters
//! that drive paginated export (window, slice count, page size).
//!
//! Serialization of `QueryTs` is deterministic (struct declaration order,
//! sorted filter maps) because the serialized form feeds session-key
//! derivation. `clear_cache` is deliberately excluded from serialization so
//! toggling it never changes the session identity.

use chrono::DateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::query::error::{QueryError, QueryResult};

/// Identifier of a result table, e.g. `"result_table.es"`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TableId(pub String);

impl TableId {
    /// Create a table id from anything string-like
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw table id string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for TableId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One table target inside a `QueryTs` request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRef {
    /// Result table to read
    pub table_id: TableId,
    /// Optional single field restriction
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    /// Equality filters (field -> value), passed through to the backend.
    /// BTreeMap keeps serialization order stable for key derivation.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl QueryRef {
    /// Create a target for a table with no filters
    pub fn table(table_id: impl Into<TableId>) -> Self {
        Self {
            table_id: table_id.into(),
            field_name: None,
            filters: BTreeMap::new(),
        }
    }

    /// Add an equality filter
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(field.into(), value.into());
        self
    }
}

/// Structured time-series query request
///
/// Field order matters: the serialized form is hashed into the scroll
/// session key, so reordering fields changes session identity for all
/// in-flight scrolls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryTs {
    /// Space the request is scoped to
    #[serde(default)]
    pub space_uid: String,
    /// Table targets to query
    pub query_list: Vec<QueryRef>,
    /// Start of the time range (epoch seconds or RFC 3339)
    #[serde(default)]
    pub start: String,
    /// End of the time range (epoch seconds or RFC 3339)
    #[serde(default)]
    pub end: String,
    /// Page size per slice per round
    #[serde(default)]
    pub limit: usize,
    /// Scroll keep-alive window, e.g. `"9m"`; empty means the server default
    #[serde(default)]
    pub scroll: String,
    /// Number of parallel slices; `None` means the server default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slice_max: Option<usize>,
    /// Destroy any existing scroll session for this query before running.
    /// Never serialized: toggling it must not change the session key.
    #[serde(default, skip_serializing)]
    pub clear_cache: bool,
    /// IANA timezone name used for display formatting downstream
    #[serde(default)]
    pub timezone: String,
}

impl QueryTs {
    /// Structural validation: a request with no targets is a
    /// misconfiguration, not an empty result.
    pub fn validate(&self) -> QueryResult<()> {
        if self.query_list.is_empty() {
            return Err(QueryError::Validation(
                "query_list cannot be empty".to_string(),
            ));
        }
        for query in &self.query_list {
            if query.table_id.as_str().is_empty() {
                return Err(QueryError::Validation(
                    "table_id cannot be empty".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Resolve the requested time range in epoch seconds
    pub fn time_range(&self) -> QueryResult<TimeRange> {
        let start = parse_timestamp(&self.start)?;
        let end = parse_timestamp(&self.end)?;
        TimeRange::new(start, end)
    }

    /// Resolve the scroll window, falling back to `default` when unset
    pub fn scroll_window(&self, default: Duration) -> QueryResult<Duration> {
        if self.scroll.is_empty() {
            return Ok(default);
        }
        parse_window(&self.scroll)
    }
}

/// Inclusive time range in epoch seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    /// Range start, epoch seconds
    pub start: i64,
    /// Range end, epoch seconds
    pub end: i64,
}

impl TimeRange {
    /// Create a range, rejecting `start >= end`
    pub fn new(start: i64, end: i64) -> QueryResult<Self> {
        if start >= end {
            return Err(QueryError::InvalidTimeRange);
        }
        Ok(Self { start, end })
    }
}

/// Parse a timestamp string as epoch seconds
///
/// Accepts raw epoch seconds (the common wire form) or RFC 3339.
pub fn parse_timestamp(s: &str) -> QueryResult<i64> {
    if let Ok(ts) = s.parse::<i64>() {
        return Ok(ts);
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.timestamp());
    }

    Err(QueryError::Timestamp(s.to_string()))
}

/// Parse a Go-style duration string like `"9m"`, `"30s"`, `"1h"`
pub fn parse_window(s: &str) -> QueryResult<Duration> {
    let re = Regex::new(r"^(\d+)([smhd])$").map_err(|_| QueryError::Window(s.to_string()))?;

    let caps = re
        .captures(s)
        .ok_or_else(|| QueryError::Window(s.to_string()))?;

    let amount: u64 = caps[1]
        .parse()
        .map_err(|_| QueryError::Window(s.to_string()))?;

    let secs = match &caps[2] {
        "s" => amount,
        "m" => amount * 60,
        "h" => amount * 3600,
        "d" => amount * 24 * 3600,
        _ => return Err(QueryError::Window(s.to_string())),
    };

    Ok(Duration::from_secs(secs))
}
