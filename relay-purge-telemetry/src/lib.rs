//! Logging setup shared by the relay-purge binary and tests.

pub mod tracing;
