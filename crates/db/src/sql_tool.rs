//! Executes model-generated SQL against the configured store.
//!
//! Every call opens its own connection, runs the statement inside a
//! transaction, commits, and closes the connection whatever happened. Failures
//! never escape: they come back as [`SqlOutcome::Failed`] so callers can tell
//! "no rows" apart from "the statement did not run".

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use courtside_core::config::DatabaseConfig;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Map, Value};
use sqlx::postgres::{PgRow, Postgres};
use sqlx::{Column, Connection, Row, TypeInfo};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::connection::{connect, DbConnection, DbError};

pub type Record = Map<String, Value>;

#[derive(Clone, Debug, PartialEq)]
pub enum SqlOutcome {
    Rows(Vec<Record>),
    Failed { reason: String },
}

impl SqlOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed { reason: reason.into() }
    }

    /// Rows of a successful run; empty for a failure.
    pub fn rows(&self) -> &[Record] {
        match self {
            Self::Rows(rows) => rows,
            Self::Failed { .. } => &[],
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            Self::Rows(_) => None,
            Self::Failed { reason } => Some(reason),
        }
    }

    /// Payload handed back to the model as the tool result.
    pub fn to_tool_output(&self) -> Value {
        match self {
            Self::Rows(rows) => json!({ "rows": rows }),
            Self::Failed { reason } => json!({ "rows": [], "error": reason }),
        }
    }
}

#[async_trait]
pub trait SqlExecutor: Send + Sync {
    async fn run_sql(&self, query: &str) -> SqlOutcome;
}

pub struct PgSqlExecutor {
    database_url: SecretString,
    connect_timeout_secs: u64,
    statement_timeout_secs: u64,
    read_only: bool,
}

impl PgSqlExecutor {
    pub fn new(database: &DatabaseConfig) -> Self {
        Self {
            database_url: database.url.clone(),
            connect_timeout_secs: database.connect_timeout_secs,
            statement_timeout_secs: database.statement_timeout_secs,
            read_only: !database.allow_writes,
        }
    }

    async fn execute(&self, query: &str) -> Result<Vec<Record>, DbError> {
        let mut connection =
            connect(self.database_url.expose_secret(), self.connect_timeout_secs).await?;

        let result = self.execute_in_transaction(&mut connection, query).await;

        if let Err(error) = connection.close().await {
            warn!(
                event_name = "db.sql_tool.close_failed",
                error = %error,
                "failed to close sql tool connection"
            );
        }

        result
    }

    async fn execute_in_transaction(
        &self,
        connection: &mut DbConnection,
        query: &str,
    ) -> Result<Vec<Record>, DbError> {
        let mut transaction = connection.begin().await?;

        if self.read_only {
            sqlx::query("SET TRANSACTION READ ONLY").execute(&mut *transaction).await?;
        }
        let timeout_ms = self.statement_timeout_secs.saturating_mul(1000);
        sqlx::query(&format!("SET LOCAL statement_timeout = {timeout_ms}"))
            .execute(&mut *transaction)
            .await?;

        let rows = tokio::time::timeout(
            Duration::from_secs(self.statement_timeout_secs.max(1)),
            sqlx::query(query).fetch_all(&mut *transaction),
        )
        .await
        .map_err(|_| DbError::Timeout {
            operation: "sql statement",
            secs: self.statement_timeout_secs,
        })??;

        transaction.commit().await?;

        Ok(rows.iter().map(row_to_record).collect())
    }
}

#[async_trait]
impl SqlExecutor for PgSqlExecutor {
    async fn run_sql(&self, query: &str) -> SqlOutcome {
        match self.execute(query).await {
            Ok(rows) => {
                debug!(
                    event_name = "db.sql_tool.executed",
                    row_count = rows.len(),
                    read_only = self.read_only,
                    "sql tool statement executed"
                );
                SqlOutcome::Rows(rows)
            }
            Err(error) => {
                warn!(
                    event_name = "db.sql_tool.failed",
                    error = %error,
                    "sql tool statement failed"
                );
                SqlOutcome::failed(error.to_string())
            }
        }
    }
}

pub fn row_to_record(row: &PgRow) -> Record {
    let mut record = Map::new();
    for column in row.columns() {
        let value = decode_column(row, column.ordinal(), column.type_info().name());
        record.insert(column.name().to_string(), value);
    }
    record
}

fn decode_column(row: &PgRow, index: usize, type_name: &str) -> Value {
    match type_name {
        "BOOL" => decode_with::<bool, _>(row, index, Value::Bool),
        "INT2" => decode_with::<i16, _>(row, index, Value::from),
        "INT4" => decode_with::<i32, _>(row, index, Value::from),
        "INT8" => decode_with::<i64, _>(row, index, Value::from),
        "FLOAT4" => decode_with::<f32, _>(row, index, |value| Value::from(f64::from(value))),
        "FLOAT8" => decode_with::<f64, _>(row, index, Value::from),
        "NUMERIC" => decode_with::<Decimal, _>(row, index, |value| Value::String(value.to_string())),
        "TEXT" | "VARCHAR" | "BPCHAR" | "CHAR" | "NAME" => {
            decode_with::<String, _>(row, index, Value::String)
        }
        "DATE" => decode_with::<NaiveDate, _>(row, index, |value| {
            Value::String(value.format("%Y-%m-%d").to_string())
        }),
        "TIME" => decode_with::<NaiveTime, _>(row, index, |value| {
            Value::String(value.format("%H:%M:%S").to_string())
        }),
        "TIMESTAMP" => decode_with::<NaiveDateTime, _>(row, index, |value| {
            Value::String(value.format("%Y-%m-%dT%H:%M:%S").to_string())
        }),
        "TIMESTAMPTZ" => {
            decode_with::<DateTime<Utc>, _>(row, index, |value| Value::String(value.to_rfc3339()))
        }
        "JSON" | "JSONB" => decode_with::<Value, _>(row, index, |value| value),
        "UUID" => decode_with::<Uuid, _>(row, index, |value| Value::String(value.to_string())),
        // Enums and other text-encoded types.
        _ => match row.try_get_unchecked::<Option<String>, _>(index) {
            Ok(Some(value)) => Value::String(value),
            Ok(None) | Err(_) => Value::Null,
        },
    }
}

fn decode_with<'r, T, F>(row: &'r PgRow, index: usize, render: F) -> Value
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
    F: FnOnce(T) -> Value,
{
    match row.try_get::<Option<T>, _>(index) {
        Ok(Some(value)) => render(value),
        Ok(None) | Err(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use std::env;

    use courtside_core::config::DatabaseConfig;
    use serde_json::{json, Map, Value};

    use super::{PgSqlExecutor, SqlExecutor, SqlOutcome};

    fn database_config(url: &str) -> DatabaseConfig {
        DatabaseConfig {
            url: url.to_string().into(),
            connect_timeout_secs: 2,
            statement_timeout_secs: 5,
            allow_writes: false,
        }
    }

    #[test]
    fn failed_outcome_is_empty_but_distinguishable() {
        let failed = SqlOutcome::failed("relation \"athlete_batches\" does not exist");
        let empty = SqlOutcome::Rows(Vec::new());

        assert!(failed.rows().is_empty());
        assert!(empty.rows().is_empty());
        assert!(failed.is_failure());
        assert!(!empty.is_failure());
        assert_eq!(failed.failure_reason(), Some("relation \"athlete_batches\" does not exist"));
        assert_eq!(empty.failure_reason(), None);
    }

    #[test]
    fn tool_output_carries_rows_or_error() {
        let mut record = Map::new();
        record.insert("batch_name".to_string(), Value::String("Morning Sprint".to_string()));
        let rows = SqlOutcome::Rows(vec![record]);
        assert_eq!(rows.to_tool_output(), json!({ "rows": [{ "batch_name": "Morning Sprint" }] }));

        let failed = SqlOutcome::failed("statement timed out");
        assert_eq!(failed.to_tool_output(), json!({ "rows": [], "error": "statement timed out" }));
    }

    #[tokio::test]
    async fn unreachable_database_returns_empty_failure() {
        let executor = PgSqlExecutor::new(&database_config(
            "postgres://courtside@127.0.0.1:1/courtside",
        ));

        let outcome = executor.run_sql("SELECT * FROM athlete_batches").await;

        assert!(outcome.rows().is_empty());
        assert!(outcome.is_failure());
    }

    // Runs only when a scratch PostgreSQL is available.
    #[tokio::test]
    async fn decodes_common_column_types_against_live_database() {
        let Ok(url) = env::var("COURTSIDE_TEST_DATABASE_URL") else {
            return;
        };
        let executor = PgSqlExecutor::new(&database_config(&url));

        let outcome = executor
            .run_sql(
                "SELECT 1::int4 AS id, 'Morning Sprint'::text AS batch_name, \
                 DATE '2024-05-01' AS date, TIME '07:30:00' AS start_time, \
                 NULL::int4 AS coach_id, true AS open",
            )
            .await;

        assert!(!outcome.is_failure(), "unexpected failure: {:?}", outcome.failure_reason());
        let rows = outcome.rows();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["batch_name"], json!("Morning Sprint"));
        assert_eq!(rows[0]["date"], json!("2024-05-01"));
        assert_eq!(rows[0]["start_time"], json!("07:30:00"));
        assert_eq!(rows[0]["coach_id"], Value::Null);
        assert_eq!(rows[0]["open"], json!(true));
    }

    #[tokio::test]
    async fn read_only_transaction_rejects_writes_against_live_database() {
        let Ok(url) = env::var("COURTSIDE_TEST_DATABASE_URL") else {
            return;
        };
        let executor = PgSqlExecutor::new(&database_config(&url));

        let outcome = executor.run_sql("CREATE TEMP TABLE scratch (id int4)").await;

        assert!(outcome.is_failure());
    }
}
