//! Query request model
//!
//! The structured `QueryTs` request accepted by the gateway's query
//! endpoints: table targets, time range, and scroll parameters. Parsing of
//! the query into backend-specific statements happens in the backend
//! drivers; this module only models and validates the request.

pub mod error;
pub mod model;

pub use error::{QueryError, QueryResult};
pub use model::{parse_timestamp, parse_window, QueryRef, QueryTs, TableId, TimeRange};
