//! Relay-log purge sequence.
//!
//! The sequence runs through the following stages, stopping at the first failure:
//!
//! 1. Pre-check: the server must be a replica with both replication threads running and
//!    `relay_log_purge` must be disabled.
//! 2. First flush of the relay logs.
//! 3. Delay, letting readers of the old relay logs finish.
//! 4. Post-check of the replication threads.
//! 5. `relay_log_purge` is enabled, relay logs are flushed again and the server is given a short
//!    settle period to purge them. Any failure here rolls `relay_log_purge` back to 0.
//! 6. Restore of `relay_log_purge` to 0.
//!
//! In dry-run mode every check runs but statements mutating the server are only logged.

use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};

use crate::concurrency::shutdown::{ShutdownRx, wait_for_shutdown};
use crate::error::{PurgeError, PurgeResult, PurgeStage};
use crate::replication::client::{AdminClient, AdminStatement};
use crate::replication::grants;
use crate::replication::health::{ReplicaState, relay_log_purge_enabled, replica_state};

/// Time given to the server to purge relay logs after the second flush.
pub const SETTLE_DURATION: Duration = Duration::from_secs(3);

/// Upper bound for the compensating reset of `relay_log_purge`.
pub const ROLLBACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Settings of a single purge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeSettings {
    /// Wait between the first flush and the post-check.
    pub delay: Duration,
    /// When true, statements mutating the server are logged instead of executed.
    pub dry_run: bool,
}

/// Reason for which a purge finished without doing anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotReplica,
    ReplicationThreadsStopped,
}

/// Successful result of a purge run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PurgeOutcome {
    /// Relay logs were purged, or would have been in dry-run mode.
    Completed,
    /// The server was not in a state where purging applies.
    Skipped(SkipReason),
}

/// Marks that `relay_log_purge` may be set to 1 on the server.
///
/// It is created right before the flag is enabled and must be consumed either by the restore
/// stage or by a rollback.
#[must_use]
#[derive(Debug)]
struct EnabledRelayLogPurge(());

#[derive(Debug)]
enum PurgeState {
    PreCheck,
    FirstFlush,
    Delay,
    PostCheck,
    SecondFlushAndSettle,
    Restore(EnabledRelayLogPurge),
    Done,
    Skipped(SkipReason),
}

/// Drives the relay-log purge sequence against a single server.
#[derive(Debug)]
pub struct Purger<C> {
    client: C,
    settings: PurgeSettings,
    shutdown_rx: ShutdownRx,
}

impl<C> Purger<C>
where
    C: AdminClient,
{
    pub fn new(client: C, settings: PurgeSettings, shutdown_rx: ShutdownRx) -> Self {
        Self {
            client,
            settings,
            shutdown_rx,
        }
    }

    /// Returns true if the session user holds the privileges needed to purge relay logs.
    pub async fn has_purge_privilege(&self) -> PurgeResult<bool> {
        self.cancellable(
            PurgeStage::PrivilegeCheck,
            grants::has_purge_privilege(&self.client),
        )
        .await
    }

    /// Runs the purge sequence.
    ///
    /// Servers that are not replicas or whose replication threads are not running are skipped
    /// without error.
    pub async fn purge(&self) -> PurgeResult<PurgeOutcome> {
        let mut state = PurgeState::PreCheck;

        loop {
            debug!(?state, "entering purge state");

            state = match state {
                PurgeState::PreCheck => self.pre_check().await?,
                PurgeState::FirstFlush => self.first_flush().await?,
                PurgeState::Delay => self.delay().await?,
                PurgeState::PostCheck => self.post_check().await?,
                PurgeState::SecondFlushAndSettle => self.second_flush_and_settle().await?,
                PurgeState::Restore(enabled) => self.restore(enabled).await?,
                PurgeState::Done => return Ok(PurgeOutcome::Completed),
                PurgeState::Skipped(reason) => return Ok(PurgeOutcome::Skipped(reason)),
            };
        }
    }

    async fn pre_check(&self) -> PurgeResult<PurgeState> {
        let stage = PurgeStage::PreCheck;

        match self.cancellable(stage, replica_state(&self.client)).await? {
            ReplicaState::NotReplica => {
                info!("target server is not a replica, nothing to purge");
                return Ok(PurgeState::Skipped(SkipReason::NotReplica));
            }
            ReplicaState::ThreadsStopped => {
                info!("SQL or IO thread is not running, nothing to purge");
                return Ok(PurgeState::Skipped(SkipReason::ReplicationThreadsStopped));
            }
            ReplicaState::Running => {}
        }

        if self
            .cancellable(stage, relay_log_purge_enabled(&self.client))
            .await?
        {
            return Err(PurgeError::RelayLogPurgeEnabled);
        }

        Ok(PurgeState::FirstFlush)
    }

    async fn first_flush(&self) -> PurgeResult<PurgeState> {
        self.execute(PurgeStage::FirstFlush, AdminStatement::FlushRelayLogs)
            .await?;

        Ok(PurgeState::Delay)
    }

    async fn delay(&self) -> PurgeResult<PurgeState> {
        debug!(delay_secs = self.settings.delay.as_secs(), "waiting before post-check");
        self.wait(PurgeStage::Delay, self.settings.delay).await?;

        Ok(PurgeState::PostCheck)
    }

    async fn post_check(&self) -> PurgeResult<PurgeState> {
        debug!("checking SQL and IO thread state");
        let state = self
            .cancellable(PurgeStage::PostCheck, replica_state(&self.client))
            .await?;

        if !state.is_running() {
            return Err(PurgeError::ReplicationStopped);
        }

        Ok(PurgeState::SecondFlushAndSettle)
    }

    async fn second_flush_and_settle(&self) -> PurgeResult<PurgeState> {
        let stage = PurgeStage::SecondFlushAndSettle;

        // A failed or cancelled write may still have been applied by the server, so the flag is
        // considered enabled before the statement is sent.
        let enabled = EnabledRelayLogPurge(());

        let result = async {
            self.execute(stage, AdminStatement::EnableRelayLogPurge)
                .await?;
            self.execute(stage, AdminStatement::FlushRelayLogs).await?;

            debug!(settle_secs = SETTLE_DURATION.as_secs(), "waiting for relay logs to be purged");
            self.wait(stage, SETTLE_DURATION).await
        }
        .await;

        match result {
            Ok(()) => Ok(PurgeState::Restore(enabled)),
            Err(err) => {
                self.rollback(enabled).await;
                Err(err)
            }
        }
    }

    /// Sets `relay_log_purge` back to 0.
    ///
    /// The statement is not raced against shutdown since it returns the server to its original
    /// state. A failure is returned as is and leaves the flag enabled.
    async fn restore(&self, _enabled: EnabledRelayLogPurge) -> PurgeResult<PurgeState> {
        let statement = AdminStatement::DisableRelayLogPurge;

        if self.settings.dry_run {
            info!(%statement, "dry-run, would execute statement");
            return Ok(PurgeState::Done);
        }

        debug!(%statement, "executing statement");
        self.client
            .execute(statement)
            .await
            .map_err(PurgeError::query(PurgeStage::Restore))?;

        Ok(PurgeState::Done)
    }

    /// Tries once to set `relay_log_purge` back to 0 after a failure.
    ///
    /// The attempt is bounded by [`ROLLBACK_TIMEOUT`] and ignores shutdown signals, which may be
    /// the cause of the failure. Its outcome is only logged.
    async fn rollback(&self, _enabled: EnabledRelayLogPurge) {
        if self.settings.dry_run {
            debug!("dry-run, nothing to roll back");
            return;
        }

        info!("rolling back relay_log_purge");

        match timeout(
            ROLLBACK_TIMEOUT,
            self.client.execute(AdminStatement::DisableRelayLogPurge),
        )
        .await
        {
            Ok(Ok(())) => info!("relay_log_purge rollback completed"),
            Ok(Err(err)) => warn!(error = %err, "relay_log_purge rollback failed"),
            Err(_) => warn!(
                timeout_ms = ROLLBACK_TIMEOUT.as_millis() as u64,
                "relay_log_purge rollback timed out"
            ),
        }
    }

    /// Executes a mutating statement, or only logs it in dry-run mode.
    async fn execute(&self, stage: PurgeStage, statement: AdminStatement) -> PurgeResult<()> {
        if self.settings.dry_run {
            info!(%statement, "dry-run, would execute statement");
            return Ok(());
        }

        debug!(%statement, "executing statement");
        self.cancellable(stage, self.client.execute(statement))
            .await
    }

    /// Waits for `duration` unless shutdown is signalled first.
    async fn wait(&self, stage: PurgeStage, duration: Duration) -> PurgeResult<()> {
        tokio::select! {
            biased;

            _ = wait_for_shutdown(&self.shutdown_rx) => {
                info!(%stage, "shutdown signal received during wait");
                Err(PurgeError::Cancelled { stage })
            }
            _ = sleep(duration) => Ok(()),
        }
    }

    /// Runs a database operation, abandoning it if shutdown is signalled first.
    ///
    /// Abandoning drops the in-flight query, whether the server stops executing it depends on the
    /// driver.
    async fn cancellable<T, F>(&self, stage: PurgeStage, operation: F) -> PurgeResult<T>
    where
        F: Future<Output = Result<T, sqlx::Error>>,
    {
        tokio::select! {
            biased;

            _ = wait_for_shutdown(&self.shutdown_rx) => {
                info!(%stage, "shutdown signal received during query");
                Err(PurgeError::Cancelled { stage })
            }
            result = operation => result.map_err(PurgeError::query(stage)),
        }
    }
}
