pub mod connection;
pub mod sql_tool;

pub use connection::{connect, ping, DbConnection, DbError};
pub use sql_tool::{PgSqlExecutor, Record, SqlExecutor, SqlOutcome};
