//! API route handlers

pub mod health;
pub mod raw_query;
