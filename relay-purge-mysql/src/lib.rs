//! Relay-log purging for MySQL replicas.
//!
//! This crate inspects replica health and grants through an [`replication::client::AdminClient`]
//! and drives the [`purger::Purger`] sequence that temporarily enables `relay_log_purge`,
//! flushes relay logs and restores the original setting.

pub mod concurrency;
pub mod error;
pub mod purger;
pub mod replication;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
