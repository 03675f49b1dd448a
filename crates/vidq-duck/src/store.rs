//! Storage collaborator: runs one read-only statement, returns rows

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{DateTime, NaiveDate};
use duckdb::types::{TimeUnit, ValueRef};
use duckdb::{Config, Connection};
use std::path::Path;
use std::str::FromStr;
use std::sync::Mutex;

use crate::{ExecutionError, Rows, Value};

/// Executes a single already-checked statement
#[async_trait]
pub trait QueryStore: Send + Sync {
    async fn fetch(&self, sql: &str) -> Result<Rows, ExecutionError>;
}

/// DuckDB-backed store
///
/// Holds one base connection; each execution works on its own clone, which
/// shares the database but is dropped as soon as the statement completes.
pub struct DuckStore {
    base: Mutex<Connection>,
}

impl DuckStore {
    /// Open a database file; queries cannot touch other files or extensions
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ExecutionError> {
        Ok(Self::from_connection(Connection::open_with_flags(path, sealed_config()?)?))
    }

    pub fn open_in_memory() -> Result<Self, ExecutionError> {
        Ok(Self::from_connection(Connection::open_in_memory_with_flags(
            sealed_config()?,
        )?))
    }

    pub fn from_connection(conn: Connection) -> Self {
        Self {
            base: Mutex::new(conn),
        }
    }

    /// Fresh connection to the same database
    pub fn connect(&self) -> Result<Connection, ExecutionError> {
        let base = self
            .base
            .lock()
            .map_err(|_| ExecutionError::Connection("base connection lock poisoned".to_string()))?;
        Ok(base.try_clone()?)
    }
}

fn sealed_config() -> Result<Config, ExecutionError> {
    Ok(Config::default().enable_external_access(false)?)
}

#[async_trait]
impl QueryStore for DuckStore {
    async fn fetch(&self, sql: &str) -> Result<Rows, ExecutionError> {
        let conn = self.connect()?;
        let sql = sql.to_string();

        // DuckDB calls block; keep them off the async workers
        tokio::task::spawn_blocking(move || query_rows(&conn, &sql))
            .await
            .map_err(|e| ExecutionError::Interrupted(e.to_string()))?
    }
}

fn query_rows(conn: &Connection, sql: &str) -> Result<Rows, ExecutionError> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query([])?;

    let columns: Vec<String> = rows
        .as_ref()
        .map(|stmt| stmt.column_names())
        .unwrap_or_default();

    let mut result = Rows {
        columns,
        rows: Vec::new(),
    };

    while let Some(row) = rows.next()? {
        let mut values = Vec::with_capacity(result.columns.len());
        for i in 0..result.columns.len() {
            values.push(convert(row.get_ref(i)?)?);
        }
        result.rows.push(values);
    }

    Ok(result)
}

/// Convert a DuckDB cell into a [`Value`]
fn convert(value: ValueRef<'_>) -> Result<Value, ExecutionError> {
    let value = match value {
        ValueRef::Null => Value::Null,
        ValueRef::Boolean(b) => Value::Bool(b),
        ValueRef::TinyInt(i) => Value::Int(i.into()),
        ValueRef::SmallInt(i) => Value::Int(i.into()),
        ValueRef::Int(i) => Value::Int(i.into()),
        ValueRef::BigInt(i) => Value::Int(i.into()),
        ValueRef::HugeInt(i) => Value::Int(i),
        ValueRef::UTinyInt(i) => Value::Int(i.into()),
        ValueRef::USmallInt(i) => Value::Int(i.into()),
        ValueRef::UInt(i) => Value::Int(i.into()),
        ValueRef::UBigInt(i) => Value::Int(i.into()),
        ValueRef::Float(f) => Value::Float(f.into()),
        ValueRef::Double(f) => Value::Float(f),
        ValueRef::Decimal(d) => {
            let text = d.to_string();
            Value::Decimal(
                BigDecimal::from_str(&text)
                    .map_err(|e| ExecutionError::Malformed(format!("decimal {}: {}", text, e)))?,
            )
        }
        ValueRef::Text(bytes) => Value::Text(String::from_utf8_lossy(bytes).to_string()),
        ValueRef::Date32(days) => {
            // DuckDB dates count days from 1970-01-01
            let date = NaiveDate::from_num_days_from_ce_opt(days + 719_163)
                .ok_or_else(|| ExecutionError::Malformed(format!("date out of range: {}", days)))?;
            Value::Date(date)
        }
        ValueRef::Timestamp(unit, raw) => {
            let micros = match unit {
                TimeUnit::Second => raw.saturating_mul(1_000_000),
                TimeUnit::Millisecond => raw.saturating_mul(1_000),
                TimeUnit::Microsecond => raw,
                TimeUnit::Nanosecond => raw / 1_000,
            };
            let ts = DateTime::from_timestamp_micros(micros)
                .ok_or_else(|| ExecutionError::Malformed(format!("timestamp out of range: {}", raw)))?;
            Value::Timestamp(ts.naive_utc())
        }
        ValueRef::Blob(b) => Value::Text(format!("<blob {} bytes>", b.len())),
        other => Value::Text(format!("{:?}", other)),
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_database() {
        let store = DuckStore::open_in_memory().unwrap();
        store
            .connect()
            .unwrap()
            .execute_batch("CREATE TABLE t (n BIGINT); INSERT INTO t VALUES (1), (2);")
            .unwrap();

        let rows = store.fetch("SELECT n FROM t ORDER BY n").await.unwrap();
        assert_eq!(rows.columns, vec!["n".to_string()]);
        assert_eq!(rows.rows, vec![vec![Value::Int(1)], vec![Value::Int(2)]]);
    }

    #[tokio::test]
    async fn test_converts_common_types() {
        let store = DuckStore::open_in_memory().unwrap();

        let rows = store
            .fetch(
                "SELECT 12.50::DECIMAL(10,2) AS d, 1.5::DOUBLE AS f, 'x' AS s, \
                 DATE '2025-11-28' AS day, TIMESTAMP '2025-11-28 10:00:00' AS ts, NULL AS n",
            )
            .await
            .unwrap();

        let row = &rows.rows[0];
        assert_eq!(row[0], Value::Decimal(BigDecimal::from_str("12.50").unwrap()));
        assert_eq!(row[1], Value::Float(1.5));
        assert_eq!(row[2], Value::Text("x".to_string()));
        assert_eq!(row[3].to_string(), "2025-11-28");
        assert_eq!(row[4].to_string(), "2025-11-28 10:00:00");
        assert_eq!(row[5], Value::Null);
    }

    #[tokio::test]
    async fn test_file_scans_are_disabled() {
        let path = std::env::temp_dir().join(format!("vidq_store_{}.csv", uuid::Uuid::new_v4()));
        std::fs::write(&path, "secret\nhunter2\n").unwrap();

        let store = DuckStore::open_in_memory().unwrap();
        for sql in [
            format!("SELECT * FROM '{}'", path.display()),
            format!("SELECT * FROM read_csv('{}')", path.display()),
        ] {
            let result = store.fetch(&sql).await;
            assert!(
                matches!(result, Err(ExecutionError::Database(_))),
                "file readable through: {}",
                sql
            );
        }

        std::fs::remove_file(path).ok();
    }

    #[tokio::test]
    async fn test_database_error_surfaces() {
        let store = DuckStore::open_in_memory().unwrap();
        let err = store.fetch("SELECT * FROM missing_table").await.unwrap_err();
        assert!(matches!(err, ExecutionError::Database(_)));
    }
}
