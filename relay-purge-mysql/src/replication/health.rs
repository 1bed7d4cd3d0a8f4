//! Replica health checks.
//!
//! Every check queries the server again. Replication state can change between two checks of the
//! same purge, so results are never cached.

use crate::replication::client::{AdminClient, ReplicaStatusRow};

/// Value reported by `SHOW SLAVE STATUS` for a running replication thread.
const THREAD_RUNNING: &str = "Yes";

/// Replication state of the target server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplicaState {
    /// The server has no replication configured.
    NotReplica,
    /// The server is a replica but its IO thread, SQL thread, or both are not running.
    ThreadsStopped,
    /// The server is a replica with both the IO and the SQL thread running.
    Running,
}

impl ReplicaState {
    /// Derives the replica state from the rows of `SHOW SLAVE STATUS`.
    ///
    /// Every row must report both threads as running, a single stopped channel is enough to
    /// consider the replica stopped.
    pub fn from_rows(rows: &[ReplicaStatusRow]) -> Self {
        if rows.is_empty() {
            return ReplicaState::NotReplica;
        }

        let all_running = rows.iter().all(|row| {
            row.slave_io_running == THREAD_RUNNING && row.slave_sql_running == THREAD_RUNNING
        });

        if all_running {
            ReplicaState::Running
        } else {
            ReplicaState::ThreadsStopped
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self, ReplicaState::Running)
    }
}

/// Returns the current [`ReplicaState`] of the server.
pub async fn replica_state<C>(client: &C) -> Result<ReplicaState, sqlx::Error>
where
    C: AdminClient + ?Sized,
{
    let rows = client.fetch_replica_status().await?;

    Ok(ReplicaState::from_rows(&rows))
}

/// Returns true if automatic relay-log purging is enabled globally.
pub async fn relay_log_purge_enabled<C>(client: &C) -> Result<bool, sqlx::Error>
where
    C: AdminClient + ?Sized,
{
    let value = client.fetch_relay_log_purge().await?;

    Ok(value == 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_rows_is_not_replica() {
        assert_eq!(ReplicaState::from_rows(&[]), ReplicaState::NotReplica);
    }

    #[test]
    fn test_both_threads_running() {
        let rows = [ReplicaStatusRow::new("Yes", "Yes")];
        assert_eq!(ReplicaState::from_rows(&rows), ReplicaState::Running);
        assert!(ReplicaState::from_rows(&rows).is_running());
    }

    #[test]
    fn test_stopped_threads() {
        for (io, sql) in [("No", "Yes"), ("Yes", "No"), ("No", "No"), ("Connecting", "Yes")] {
            let rows = [ReplicaStatusRow::new(io, sql)];
            assert_eq!(
                ReplicaState::from_rows(&rows),
                ReplicaState::ThreadsStopped,
                "io={io} sql={sql}"
            );
        }
    }

    #[test]
    fn test_any_stopped_channel_stops_replica() {
        let rows = [
            ReplicaStatusRow::new("Yes", "Yes"),
            ReplicaStatusRow::new("Yes", "No"),
        ];
        assert_eq!(ReplicaState::from_rows(&rows), ReplicaState::ThreadsStopped);
    }
}
