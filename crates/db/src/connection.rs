use std::str::FromStr;
use std::time::Duration;

use sqlx::postgres::{PgConnectOptions, PgConnection};
use sqlx::Connection;
use thiserror::Error;

pub type DbConnection = PgConnection;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("{operation} timed out after {secs}s")]
    Timeout { operation: &'static str, secs: u64 },
}

/// Opens a dedicated connection. Callers own it and must close it.
pub async fn connect(database_url: &str, timeout_secs: u64) -> Result<DbConnection, DbError> {
    let options = PgConnectOptions::from_str(database_url)?;
    let timeout_secs = timeout_secs.max(1);

    tokio::time::timeout(Duration::from_secs(timeout_secs), PgConnection::connect_with(&options))
        .await
        .map_err(|_| DbError::Timeout { operation: "database connect", secs: timeout_secs })?
        .map_err(DbError::from)
}

/// Round-trips `SELECT 1` on a fresh connection.
pub async fn ping(database_url: &str, timeout_secs: u64) -> Result<(), DbError> {
    let mut connection = connect(database_url, timeout_secs).await?;
    let result = sqlx::query_scalar::<_, i32>("SELECT 1").fetch_one(&mut connection).await;
    connection.close().await?;
    result.map(|_| ()).map_err(DbError::from)
}

#[cfg(test)]
mod tests {
    use super::{connect, ping, DbError};

    #[tokio::test]
    async fn malformed_url_is_a_database_error() {
        let result = connect("not a url", 1).await;
        assert!(matches!(result, Err(DbError::Database(_))));
    }

    #[tokio::test]
    async fn unreachable_server_fails_ping() {
        let result = ping("postgres://courtside@127.0.0.1:1/courtside", 2).await;
        assert!(result.is_err());
    }
}
