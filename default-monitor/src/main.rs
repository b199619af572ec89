//! Default monitor service
//!
//! With `ledger_url` set the monitor polls a `lending-node`. Otherwise it
//! hosts the ledger itself and serves the node API on `ledger.http.bind_addr`
//! so borrowers and lenders can still submit while it holds the RocksDB lock.

use anyhow::{Context, Result};
use default_monitor::{
    Config, DefaultMonitor, LocalLedgerClient, Metrics, MonitorScheduler, ProtocolClient,
    RemoteLedgerClient,
};
use lending_core::{server, Ledger, SystemClock};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Default monitor starting...");

    let config = match std::env::var("MONITOR_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("loading config from environment")?,
    };
    let oracle = config
        .load_oracle_keypair()
        .context("loading oracle keypair")?;

    let (client, hosted) = match &config.ledger_url {
        Some(url) => {
            info!(%url, "Polling remote lending node");
            let client: Arc<dyn ProtocolClient> =
                Arc::new(RemoteLedgerClient::new(url.clone(), config.http_timeout())?);
            (client, None)
        }
        None => {
            let ledger = Arc::new(
                Ledger::open_with_clock(config.ledger.clone(), Arc::new(SystemClock))
                    .await
                    .context("opening ledger")?,
            );
            let (api, addr) = server::bind(ledger.clone()).context("binding node API")?;
            let api_handle = api.handle();
            let api_task = tokio::spawn(api);
            info!(%addr, "Hosting ledger and node API");

            let client: Arc<dyn ProtocolClient> = Arc::new(LocalLedgerClient::new(ledger.clone()));
            (client, Some((ledger, api_handle, api_task)))
        }
    };

    let metrics = Metrics::new()?;
    let monitor = Arc::new(DefaultMonitor::new(
        client,
        oracle,
        config.grace_period_secs,
        Arc::new(SystemClock),
        metrics.clone(),
    ));

    info!(
        service = %config.service_name,
        interval_secs = config.poll_interval_secs,
        grace_period_secs = config.grace_period_secs,
        "Default monitor initialized"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler = MonitorScheduler::new(monitor, config.poll_interval());
    let mut task = tokio::spawn(async move { scheduler.start(shutdown_rx).await });

    let outcome = tokio::select! {
        _ = shutdown_signal() => {
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            task.await?
        }
        joined = &mut task => joined?,
    };

    match &outcome {
        Ok(cycles) => info!(cycles, "Scheduler finished"),
        Err(e) => error!(error = %e, "Scheduler failed"),
    }

    if config.metrics_enabled {
        info!(metrics = %metrics.render()?, "Final metrics");
    }

    if let Some((ledger, api_handle, api_task)) = hosted {
        api_handle.stop(true).await;
        if let Err(e) = api_task.await? {
            error!(error = %e, "Node API failed");
        }
        ledger.shutdown().await?;
    }
    info!("Default monitor stopped");
    outcome.map(|_| ()).context("default monitor")
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(tracing::Level::INFO.into());

    if std::env::var("LOG_FORMAT").map_or(false, |f| f == "json") {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
