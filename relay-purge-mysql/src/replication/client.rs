use std::fmt;

use sqlx::{FromRow, MySqlPool};

/// Query returning the replication status of the server, one row per replication channel.
const REPLICA_STATUS_QUERY: &str = "SHOW SLAVE STATUS";

/// Query returning the current global value of `relay_log_purge`.
const RELAY_LOG_PURGE_QUERY: &str = "SELECT @@global.relay_log_purge AS Value";

/// Query returning the effective grants of the session user.
const GRANTS_QUERY: &str = "SHOW GRANTS FOR CURRENT_USER()";

/// Administrative statements that mutate server state during a purge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdminStatement {
    /// Rotates the relay log without writing the statement to the binary log.
    FlushRelayLogs,
    /// Sets the global `relay_log_purge` variable to 1.
    EnableRelayLogPurge,
    /// Sets the global `relay_log_purge` variable to 0.
    DisableRelayLogPurge,
}

impl AdminStatement {
    pub fn as_sql(&self) -> &'static str {
        match self {
            AdminStatement::FlushRelayLogs => "FLUSH NO_WRITE_TO_BINLOG RELAY LOGS",
            AdminStatement::EnableRelayLogPurge => "SET GLOBAL relay_log_purge = 1",
            AdminStatement::DisableRelayLogPurge => "SET GLOBAL relay_log_purge = 0",
        }
    }
}

impl fmt::Display for AdminStatement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Replication thread columns of a `SHOW SLAVE STATUS` row.
///
/// Only the columns consulted by the health checks are decoded, the remaining columns of the row
/// are ignored.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct ReplicaStatusRow {
    #[sqlx(rename = "Slave_IO_Running")]
    pub slave_io_running: String,
    #[sqlx(rename = "Slave_SQL_Running")]
    pub slave_sql_running: String,
}

impl ReplicaStatusRow {
    pub fn new(slave_io_running: impl Into<String>, slave_sql_running: impl Into<String>) -> Self {
        Self {
            slave_io_running: slave_io_running.into(),
            slave_sql_running: slave_sql_running.into(),
        }
    }
}

/// Access to the administrative queries and statements needed to purge relay logs.
///
/// Implementations must not retry failed operations, every error is reported to the caller as is.
#[async_trait::async_trait]
pub trait AdminClient: Send + Sync {
    /// Returns every row of `SHOW SLAVE STATUS`. An empty vector means the server is not a replica.
    async fn fetch_replica_status(&self) -> Result<Vec<ReplicaStatusRow>, sqlx::Error>;

    /// Returns the raw global value of `relay_log_purge`.
    async fn fetch_relay_log_purge(&self) -> Result<i64, sqlx::Error>;

    /// Returns the grant lines of the current user.
    async fn fetch_grants(&self) -> Result<Vec<String>, sqlx::Error>;

    /// Executes a statement that does not return rows.
    async fn execute(&self, statement: AdminStatement) -> Result<(), sqlx::Error>;
}

/// [`AdminClient`] backed by a MySQL connection pool.
#[derive(Debug, Clone)]
pub struct MySqlAdminClient {
    pool: MySqlPool,
}

impl MySqlAdminClient {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl AdminClient for MySqlAdminClient {
    async fn fetch_replica_status(&self) -> Result<Vec<ReplicaStatusRow>, sqlx::Error> {
        sqlx::query_as::<_, ReplicaStatusRow>(REPLICA_STATUS_QUERY)
            .fetch_all(&self.pool)
            .await
    }

    async fn fetch_relay_log_purge(&self) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(RELAY_LOG_PURGE_QUERY)
            .fetch_one(&self.pool)
            .await
    }

    async fn fetch_grants(&self) -> Result<Vec<String>, sqlx::Error> {
        sqlx::query_scalar::<_, String>(GRANTS_QUERY)
            .fetch_all(&self.pool)
            .await
    }

    async fn execute(&self, statement: AdminStatement) -> Result<(), sqlx::Error> {
        // Administrative statements go through the text protocol since not all of them can be
        // prepared.
        sqlx::raw_sql(statement.as_sql())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_statement_sql() {
        assert_eq!(
            AdminStatement::FlushRelayLogs.to_string(),
            "FLUSH NO_WRITE_TO_BINLOG RELAY LOGS"
        );
        assert_eq!(
            AdminStatement::EnableRelayLogPurge.to_string(),
            "SET GLOBAL relay_log_purge = 1"
        );
        assert_eq!(
            AdminStatement::DisableRelayLogPurge.to_string(),
            "SET GLOBAL relay_log_purge = 0"
        );
    }
}
