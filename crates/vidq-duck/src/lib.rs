//! Read-only query execution against the video analytics store
//!
//! Manages:
//! - the read-only guard every query passes before reaching storage
//! - DuckDB connections (one short-lived clone per execution)
//! - execution timeouts
//! - result shaping into [`RawResult`]

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub mod executor;
pub mod guard;
pub mod seed;
pub mod store;

pub use executor::QueryExecutor;
pub use guard::{is_aggregate, sanitize, UnsafeQueryError, ALLOWED_TABLES};
pub use seed::{count_records, ensure_schema, seed_from_json, seed_from_path, SeedError, SeedReport};
pub use store::{DuckStore, QueryStore};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Database error: {0}")]
    Database(#[from] duckdb::Error),

    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    #[error("Connection unavailable: {0}")]
    Connection(String),

    #[error("Execution interrupted: {0}")]
    Interrupted(String),

    #[error("Malformed result: {0}")]
    Malformed(String),
}

/// Anything `QueryExecutor::execute` can fail with
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Unsafe(#[from] UnsafeQueryError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// A single cell
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i128),
    Float(f64),
    Decimal(BigDecimal),
    Text(String),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Int(i) => write!(f, "{}", i),
            Value::Float(x) => write!(f, "{}", x),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Text(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Timestamp(ts) => write!(f, "{}", ts.format("%Y-%m-%d %H:%M:%S")),
        }
    }
}

/// Tabular result as returned by storage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl Rows {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Result shape decided once at the executor boundary
#[derive(Debug, Clone, PartialEq)]
pub enum RawResult {
    /// Single row, single column (or an aggregate over nothing, as 0)
    Scalar(Value),
    /// Zero rows from a non-aggregate query
    Empty,
    /// Anything wider or longer than one cell
    Rows(Rows),
}
