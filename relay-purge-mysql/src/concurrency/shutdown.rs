//! Shutdown signalling between the process and the purge sequence.
//!
//! The sender side is held by whoever owns the process lifecycle (for example the signal handler
//! of the binary), while the [`Purger`](crate::purger::Purger) holds a receiver and races its waits
//! and queries against it.

use std::future::{Future, pending};
use std::sync::Arc;

use tokio::sync::watch;

/// Receiver side of the shutdown channel.
pub type ShutdownRx = watch::Receiver<()>;

/// Transmitter side of the shutdown channel.
///
/// Cloning a [`ShutdownTx`] shares the same underlying channel, so any clone can trigger the
/// shutdown observed by every receiver.
#[derive(Debug, Clone)]
pub struct ShutdownTx(Arc<watch::Sender<()>>);

impl ShutdownTx {
    /// Signals shutdown to all receivers.
    ///
    /// Returns an error if no receiver is alive anymore.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Creates a new receiver that observes shutdown signals sent after this call.
    pub fn subscribe(&self) -> ShutdownRx {
        self.0.subscribe()
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(Arc::new(tx)), rx)
}

/// Resolves once shutdown has been signalled on the channel of `shutdown_rx`.
///
/// The receiver is cloned so that the caller's receiver keeps its view of the channel, which means
/// a shutdown that has already been sent is observed by every later call. If all senders were
/// dropped without signalling, shutdown can never happen and the returned future stays pending.
pub async fn wait_for_shutdown(shutdown_rx: &ShutdownRx) {
    let mut shutdown_rx = shutdown_rx.clone();
    if shutdown_rx.changed().await.is_err() {
        pending::<()>().await;
    }
}

/// Drives `future` to completion unless shutdown is signalled first, in which case `None` is
/// returned and `future` is dropped.
pub async fn run_until_shutdown<F>(shutdown_rx: &ShutdownRx, future: F) -> Option<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;

        _ = wait_for_shutdown(shutdown_rx) => None,
        output = future => Some(output),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::timeout;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn shutdown_is_observed_by_subscribers() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let subscribed_rx = shutdown_tx.subscribe();

        shutdown_tx.shutdown().unwrap();

        timeout(Duration::from_secs(1), wait_for_shutdown(&shutdown_rx))
            .await
            .unwrap();
        timeout(Duration::from_secs(1), wait_for_shutdown(&subscribed_rx))
            .await
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_already_sent_is_observed_repeatedly() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        shutdown_tx.shutdown().unwrap();

        for _ in 0..3 {
            timeout(Duration::from_secs(1), wait_for_shutdown(&shutdown_rx))
                .await
                .unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_sender_never_signals_shutdown() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        drop(shutdown_tx);

        let result = timeout(Duration::from_secs(10), wait_for_shutdown(&shutdown_rx)).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn no_shutdown_keeps_waiting() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let result = timeout(Duration::from_secs(10), wait_for_shutdown(&shutdown_rx)).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_shutdown_returns_output_without_shutdown() {
        let (_shutdown_tx, shutdown_rx) = create_shutdown_channel();

        let output = run_until_shutdown(&shutdown_rx, async { 42 }).await;
        assert_eq!(output, Some(42));
    }

    #[tokio::test(start_paused = true)]
    async fn run_until_shutdown_abandons_future_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(2)).await;
            shutdown_tx.shutdown().unwrap();
        });

        let start = tokio::time::Instant::now();
        let output = run_until_shutdown(
            &shutdown_rx,
            tokio::time::sleep(Duration::from_secs(3600)),
        )
        .await;

        assert_eq!(output, None);
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(3));
    }
}
