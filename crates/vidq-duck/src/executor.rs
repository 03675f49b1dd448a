//! Executor - guards, runs and shapes a single query

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

use crate::guard::{self, ALLOWED_TABLES};
use crate::{ExecutionError, QueryError, QueryStore, RawResult, Rows, Value};

pub struct QueryExecutor {
    store: Arc<dyn QueryStore>,
    allowed_tables: Vec<String>,
    timeout: Duration,
}

impl QueryExecutor {
    pub fn new(store: Arc<dyn QueryStore>) -> Self {
        Self {
            store,
            allowed_tables: ALLOWED_TABLES.iter().map(|t| t.to_string()).collect(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_allowed_tables<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.allowed_tables = tables.into_iter().map(Into::into).collect();
        self
    }

    /// Check, run and shape one query
    pub async fn execute(&self, query: &str) -> Result<RawResult, QueryError> {
        // 1. Read-only guard, independent of who produced the text
        let sql = guard::sanitize(query, &self.allowed_tables)?;

        // 2. Run with a deadline
        debug!(%sql, "executing query");
        let rows = match tokio::time::timeout(self.timeout, self.store.fetch(&sql)).await {
            Ok(Ok(rows)) => rows,
            Ok(Err(e)) => {
                error!(%sql, error = %e, "query execution failed");
                return Err(e.into());
            }
            Err(_) => {
                error!(%sql, timeout = ?self.timeout, "query timed out");
                return Err(ExecutionError::Timeout(self.timeout).into());
            }
        };

        // 3. Decide the result shape once
        let shaped = shape(&sql, rows)?;
        debug!(%sql, result = ?shaped, "query finished");
        Ok(shaped)
    }
}

/// Map storage rows onto [`RawResult`]
///
/// Aggregates over no rows (zero rows, or a single NULL cell as `SUM` yields)
/// are 0; a non-aggregate with no rows is [`RawResult::Empty`].
pub fn shape(sql: &str, rows: Rows) -> Result<RawResult, ExecutionError> {
    if rows.rows.iter().any(|r| r.len() != rows.columns.len()) {
        return Err(ExecutionError::Malformed(format!(
            "row width does not match {} columns",
            rows.columns.len()
        )));
    }

    let aggregate = guard::is_aggregate(sql);

    if rows.rows.is_empty() {
        return Ok(if aggregate {
            RawResult::Scalar(Value::Int(0))
        } else {
            RawResult::Empty
        });
    }

    if rows.rows.len() == 1 && rows.columns.len() == 1 {
        let value = rows.rows.into_iter().next().and_then(|r| r.into_iter().next());
        return Ok(match value {
            Some(Value::Null) | None if aggregate => RawResult::Scalar(Value::Int(0)),
            Some(value) => RawResult::Scalar(value),
            None => RawResult::Empty,
        });
    }

    Ok(RawResult::Rows(rows))
}
