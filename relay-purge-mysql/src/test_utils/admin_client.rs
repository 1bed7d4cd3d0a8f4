use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use crate::replication::client::{AdminClient, AdminStatement, ReplicaStatusRow};

/// Operation recorded by [`FakeAdminClient`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminCall {
    FetchReplicaStatus,
    FetchRelayLogPurge,
    FetchGrants,
    Execute(AdminStatement),
}

type ReplicaStatusResponse = Result<Vec<ReplicaStatusRow>, String>;

#[derive(Debug)]
struct Inner {
    /// Responses to `SHOW SLAVE STATUS`, consumed in order. The last one is repeated.
    replica_status: VecDeque<ReplicaStatusResponse>,
    relay_log_purge: i64,
    relay_log_purge_history: Vec<i64>,
    grants: Vec<String>,
    failing_statements: HashSet<AdminStatement>,
    /// Statements failing only on their n-th execution, counted from 1.
    failing_occurrences: HashSet<(AdminStatement, usize)>,
    stalled_statements: HashSet<AdminStatement>,
    calls: Vec<AdminCall>,
}

/// In-memory [`AdminClient`] that simulates a replica and records every operation.
///
/// Executing [`AdminStatement::EnableRelayLogPurge`] and [`AdminStatement::DisableRelayLogPurge`]
/// updates the simulated `relay_log_purge` value, which can be inspected after a run.
#[derive(Debug, Clone)]
pub struct FakeAdminClient {
    inner: Arc<Mutex<Inner>>,
}

impl FakeAdminClient {
    /// Creates a replica with both replication threads running and `relay_log_purge` disabled.
    pub fn healthy_replica() -> Self {
        Self::with_replica_status(vec![ReplicaStatusRow::new("Yes", "Yes")])
    }

    /// Creates a server without replication configured.
    pub fn not_replica() -> Self {
        Self::with_replica_status(vec![])
    }

    pub fn with_replica_status(rows: Vec<ReplicaStatusRow>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                replica_status: VecDeque::from([Ok(rows)]),
                relay_log_purge: 0,
                relay_log_purge_history: vec![],
                grants: vec![],
                failing_statements: HashSet::new(),
                failing_occurrences: HashSet::new(),
                stalled_statements: HashSet::new(),
                calls: vec![],
            })),
        }
    }

    /// Queues the rows returned by the next `SHOW SLAVE STATUS` after the current ones.
    pub fn then_replica_status(self, rows: Vec<ReplicaStatusRow>) -> Self {
        self.lock().replica_status.push_back(Ok(rows));
        self
    }

    /// Queues a failure of the next `SHOW SLAVE STATUS` after the current responses.
    pub fn then_replica_status_error(self, message: impl Into<String>) -> Self {
        self.lock().replica_status.push_back(Err(message.into()));
        self
    }

    /// Makes the first `SHOW SLAVE STATUS` fail.
    pub fn failing_replica_status(message: impl Into<String>) -> Self {
        let client = Self::not_replica();
        client.lock().replica_status = VecDeque::from([Err(message.into())]);
        client
    }

    pub fn with_relay_log_purge(self, value: i64) -> Self {
        self.lock().relay_log_purge = value;
        self
    }

    pub fn with_grants<I, S>(self, grants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lock().grants = grants.into_iter().map(Into::into).collect();
        self
    }

    /// Makes every execution of `statement` fail.
    pub fn failing_statement(self, statement: AdminStatement) -> Self {
        self.lock().failing_statements.insert(statement);
        self
    }

    /// Makes only the `occurrence`-th execution of `statement` fail, counted from 1.
    pub fn failing_statement_at(self, statement: AdminStatement, occurrence: usize) -> Self {
        self.lock()
            .failing_occurrences
            .insert((statement, occurrence));
        self
    }

    /// Makes every execution of `statement` hang for a long time before succeeding.
    pub fn stalled_statement(self, statement: AdminStatement) -> Self {
        self.lock().stalled_statements.insert(statement);
        self
    }

    pub fn calls(&self) -> Vec<AdminCall> {
        self.lock().calls.clone()
    }

    /// Returns the statements that were executed, including failed ones.
    pub fn executed_statements(&self) -> Vec<AdminStatement> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                AdminCall::Execute(statement) => Some(*statement),
                _ => None,
            })
            .collect()
    }

    pub fn count_calls(&self, call: AdminCall) -> usize {
        self.lock().calls.iter().filter(|c| **c == call).count()
    }

    /// Returns the current simulated value of `relay_log_purge`.
    pub fn relay_log_purge(&self) -> i64 {
        self.lock().relay_log_purge
    }

    /// Returns every value successfully written to `relay_log_purge`, in order.
    pub fn relay_log_purge_history(&self) -> Vec<i64> {
        self.lock().relay_log_purge_history.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }
}

#[async_trait::async_trait]
impl AdminClient for FakeAdminClient {
    async fn fetch_replica_status(&self) -> Result<Vec<ReplicaStatusRow>, sqlx::Error> {
        let mut inner = self.lock();
        inner.calls.push(AdminCall::FetchReplicaStatus);

        let response = if inner.replica_status.len() > 1 {
            inner.replica_status.pop_front()
        } else {
            inner.replica_status.front().cloned()
        };

        match response {
            Some(Ok(rows)) => Ok(rows),
            Some(Err(message)) => Err(sqlx::Error::Protocol(message)),
            None => Ok(vec![]),
        }
    }

    async fn fetch_relay_log_purge(&self) -> Result<i64, sqlx::Error> {
        let mut inner = self.lock();
        inner.calls.push(AdminCall::FetchRelayLogPurge);

        Ok(inner.relay_log_purge)
    }

    async fn fetch_grants(&self) -> Result<Vec<String>, sqlx::Error> {
        let mut inner = self.lock();
        inner.calls.push(AdminCall::FetchGrants);

        Ok(inner.grants.clone())
    }

    async fn execute(&self, statement: AdminStatement) -> Result<(), sqlx::Error> {
        let (stalled, occurrence) = {
            let mut inner = self.lock();
            inner.calls.push(AdminCall::Execute(statement));
            let occurrence = inner
                .calls
                .iter()
                .filter(|call| **call == AdminCall::Execute(statement))
                .count();

            (inner.stalled_statements.contains(&statement), occurrence)
        };

        if stalled {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }

        let mut inner = self.lock();
        if inner.failing_statements.contains(&statement)
            || inner.failing_occurrences.contains(&(statement, occurrence))
        {
            return Err(sqlx::Error::Protocol(format!("failed to execute `{statement}`")));
        }

        let value = match statement {
            AdminStatement::EnableRelayLogPurge => Some(1),
            AdminStatement::DisableRelayLogPurge => Some(0),
            AdminStatement::FlushRelayLogs => None,
        };
        if let Some(value) = value {
            inner.relay_log_purge = value;
            inner.relay_log_purge_history.push(value);
        }

        Ok(())
    }
}
