use std::time::Duration;

use anyhow::{Context, bail};
use relay_purge_config::PurgeConfig;
use relay_purge_mysql::concurrency::shutdown::{
    ShutdownRx, ShutdownTx, create_shutdown_channel, run_until_shutdown,
};
use relay_purge_mysql::purger::{PurgeOutcome, PurgeSettings, Purger};
use relay_purge_mysql::replication::client::{AdminClient, MySqlAdminClient};
use sqlx::MySqlPool;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use tokio::signal::unix::{Signal, SignalKind, signal};
use tracing::{info, warn};

/// Signals that abort a running purge.
struct ShutdownSignals {
    hangup: Signal,
    interrupt: Signal,
    terminate: Signal,
    quit: Signal,
}

impl ShutdownSignals {
    fn register() -> std::io::Result<Self> {
        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            interrupt: signal(SignalKind::interrupt())?,
            terminate: signal(SignalKind::terminate())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Waits for the next signal and returns its name.
    async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.hangup.recv() => "SIGHUP",
            _ = self.interrupt.recv() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

/// Forwards the first received signal to the purge as a shutdown.
async fn forward_shutdown_signal(mut signals: ShutdownSignals, shutdown_tx: ShutdownTx) {
    let signal_name = signals.recv().await;
    info!(signal = signal_name, "got signal, shutting down purge");

    if let Err(err) = shutdown_tx.shutdown() {
        warn!(error = ?err, "failed to send shutdown signal");
    }
}

/// Runs the relay-log purge described by `config` until it completes or a signal aborts it.
pub async fn start_purge_with_config(config: PurgeConfig) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = create_shutdown_channel();

    let signals = ShutdownSignals::register().context("failed to register signal handlers")?;
    let signal_handle = tokio::spawn(forward_shutdown_signal(signals, shutdown_tx));

    let result = purge_relay_logs(&config, shutdown_rx).await;

    // The signal task is still waiting if the purge finished on its own.
    signal_handle.abort();
    let _ = signal_handle.await;

    result?;

    if config.dry_run {
        warn!("Dry-run have finished. Please specify --go if you want to purge relay-log");
    }

    Ok(())
}

/// Connections of the admin pool.
///
/// A statement abandoned on shutdown keeps its connection busy until the server answers, so the
/// rollback needs a second one.
const ADMIN_POOL_MAX_CONNECTIONS: u32 = 2;

fn admin_pool_options() -> MySqlPoolOptions {
    MySqlPoolOptions::new().max_connections(ADMIN_POOL_MAX_CONNECTIONS)
}

/// Connects to the target server unless shutdown is signalled first.
async fn connect_admin_pool(
    options: MySqlConnectOptions,
    shutdown_rx: &ShutdownRx,
) -> anyhow::Result<MySqlPool> {
    let Some(pool) =
        run_until_shutdown(shutdown_rx, admin_pool_options().connect_with(options)).await
    else {
        bail!("purge cancelled while connecting to the target server");
    };

    pool.context("failed to connect to the target server")
}

async fn purge_relay_logs(config: &PurgeConfig, shutdown_rx: ShutdownRx) -> anyhow::Result<()> {
    if config.dry_run {
        info!("dry-run mode");
    }
    info!("purge relay-log started");

    let pool = connect_admin_pool(config.connect_options(), &shutdown_rx).await?;

    let settings = PurgeSettings {
        delay: Duration::from_secs(config.purge_delay_seconds),
        dry_run: config.dry_run,
    };
    let purger = Purger::new(MySqlAdminClient::new(pool.clone()), settings, shutdown_rx);

    let result = run_purger(&purger).await;
    pool.close().await;

    result
}

async fn run_purger<C: AdminClient>(purger: &Purger<C>) -> anyhow::Result<()> {
    if !purger.has_purge_privilege().await? {
        bail!("the user doesn't have purge privilege");
    }
    info!("purge privilege OK");

    let outcome = match purger.purge().await {
        Ok(outcome) => outcome,
        Err(err) => {
            if err.is_cancelled() {
                warn!(stage = ?err.stage(), "relay-log purging interrupted by signal");
            }
            return Err(err.into());
        }
    };

    match outcome {
        PurgeOutcome::Completed => info!("relay-log purging operations succeeded"),
        PurgeOutcome::Skipped(reason) => {
            info!(?reason, "relay-log purging operations succeeded")
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use relay_purge_mysql::replication::client::AdminStatement;
    use relay_purge_mysql::test_utils::admin_client::FakeAdminClient;
    use relay_purge_telemetry::tracing::init_test_tracing;

    use super::*;

    const ALL_PRIVILEGES: &str = "GRANT ALL PRIVILEGES ON *.* TO `root`@`%`";

    fn create_purger(client: &FakeAdminClient) -> (Purger<FakeAdminClient>, ShutdownTx) {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let settings = PurgeSettings {
            delay: Duration::ZERO,
            dry_run: false,
        };

        (
            Purger::new(client.clone(), settings, shutdown_rx),
            shutdown_tx,
        )
    }

    #[test]
    fn test_admin_pool_leaves_a_connection_for_rollback() {
        assert!(admin_pool_options().get_max_connections() >= 2);
    }

    #[tokio::test]
    async fn test_connect_is_abandoned_on_shutdown() {
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        shutdown_tx.shutdown().unwrap();

        // Documentation address, never reachable.
        let options = MySqlConnectOptions::new().host("192.0.2.1").port(3306);
        let err = connect_admin_pool(options, &shutdown_rx).await.unwrap_err();

        assert!(err.to_string().contains("cancelled while connecting"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_skipped_purge_succeeds() {
        init_test_tracing();

        let client = FakeAdminClient::not_replica().with_grants([ALL_PRIVILEGES]);
        let (purger, _shutdown_tx) = create_purger(&client);

        run_purger(&purger).await.unwrap();
        assert!(client.executed_statements().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_purge_succeeds() {
        init_test_tracing();

        let client = FakeAdminClient::healthy_replica().with_grants([ALL_PRIVILEGES]);
        let (purger, _shutdown_tx) = create_purger(&client);

        run_purger(&purger).await.unwrap();
        assert_eq!(client.relay_log_purge_history(), vec![1, 0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_privilege_aborts_before_purge() {
        init_test_tracing();

        let client = FakeAdminClient::healthy_replica()
            .with_grants(["GRANT SELECT ON `app`.* TO `app`@`%`"]);
        let (purger, _shutdown_tx) = create_purger(&client);

        let err = run_purger(&purger).await.unwrap_err();

        assert_eq!(err.to_string(), "the user doesn't have purge privilege");
        assert!(client.executed_statements().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_failure_is_returned() {
        init_test_tracing();

        let client = FakeAdminClient::healthy_replica()
            .with_grants([ALL_PRIVILEGES])
            .failing_statement(AdminStatement::FlushRelayLogs);
        let (purger, _shutdown_tx) = create_purger(&client);

        let err = run_purger(&purger).await.unwrap_err();

        assert!(err.to_string().starts_with("query failed during first flush"));
    }
}
