//! Error types returned by the purge sequence.

use std::fmt;

use thiserror::Error;

/// Result type for purge operations.
pub type PurgeResult<T> = Result<T, PurgeError>;

/// Stage of the purge sequence in which an operation ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PurgeStage {
    PrivilegeCheck,
    PreCheck,
    FirstFlush,
    Delay,
    PostCheck,
    SecondFlushAndSettle,
    Restore,
}

impl fmt::Display for PurgeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PurgeStage::PrivilegeCheck => "privilege check",
            PurgeStage::PreCheck => "pre-check",
            PurgeStage::FirstFlush => "first flush",
            PurgeStage::Delay => "delay",
            PurgeStage::PostCheck => "post-check",
            PurgeStage::SecondFlushAndSettle => "second flush and settle",
            PurgeStage::Restore => "restore",
        };

        f.write_str(name)
    }
}

/// Errors that end a purge run.
#[derive(Debug, Error)]
pub enum PurgeError {
    /// A query or statement failed, including failures to decode its result.
    #[error("query failed during {stage}: {source}")]
    Query {
        stage: PurgeStage,
        #[source]
        source: sqlx::Error,
    },

    /// `relay_log_purge` was already enabled before the purge started.
    #[error("relay_log_purge is enabled")]
    RelayLogPurgeEnabled,

    /// Replication threads stopped between the first flush and the post-check.
    #[error("replication appears to have stopped: SQL or IO thread is not running")]
    ReplicationStopped,

    /// The purge was cancelled by a shutdown signal.
    #[error("purge cancelled during {stage}")]
    Cancelled { stage: PurgeStage },
}

impl PurgeError {
    pub(crate) fn query(stage: PurgeStage) -> impl FnOnce(sqlx::Error) -> PurgeError {
        move |source| PurgeError::Query { stage, source }
    }

    /// Returns the stage that failed, if the error is tied to one.
    pub fn stage(&self) -> Option<PurgeStage> {
        match self {
            PurgeError::Query { stage, .. } | PurgeError::Cancelled { stage } => Some(*stage),
            PurgeError::RelayLogPurgeEnabled => Some(PurgeStage::PreCheck),
            PurgeError::ReplicationStopped => Some(PurgeStage::PostCheck),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, PurgeError::Cancelled { .. })
    }
}
