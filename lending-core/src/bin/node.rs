//! Lending node binary: owns the ledger directory and serves the node API

use anyhow::{Context, Result};
use lending_core::{server, Config, Ledger};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting lending node");

    let config = match std::env::var("LENDING_CONFIG") {
        Ok(path) => Config::from_file(&path).with_context(|| format!("loading {}", path))?,
        Err(_) => Config::from_env().context("loading config from environment")?,
    };

    let ledger = Arc::new(Ledger::open(config).await.context("opening ledger")?);
    info!(data_dir = %ledger.config().data_dir.display(), "Ledger opened");

    let (server, addr) = server::bind(ledger.clone()).context("binding node API")?;
    let handle = server.handle();
    let mut task = tokio::spawn(server);
    info!(%addr, "Lending node ready");

    let served = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
            handle.stop(true).await;
            task.await?
        }
        joined = &mut task => joined?,
    };
    if let Err(e) = &served {
        error!(error = %e, "Node API failed");
    }

    ledger.shutdown().await?;
    info!("Lending node stopped");
    served.context("node API")
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
