//! DriveLedger - Main Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use pipeline::startup::{build_pipeline, build_source};
use pipeline::status::{self, StatusState};
use pipeline::{init_logging, PipelineConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Parser)]
#[command(name = "driveledger", version, about = "Real-time vehicle fault attestation")]
struct CliArgs {
    /// Configuration file (TOML)
    #[arg(short, long, env = "DRIVELEDGER_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let config = PipelineConfig::load(args.config.as_deref()).context("configuration")?;
    init_logging(&config.logging)?;

    info!("=== DriveLedger v{} ===", env!("CARGO_PKG_VERSION"));

    let mut pipeline = build_pipeline(&config).await.context("startup integrity check")?;
    let mut source = build_source(&config);

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, initiating shutdown...");
        shutdown.cancel();
    });

    let status_task = match &config.status.bind {
        Some(bind) => {
            let metrics = match PrometheusBuilder::new().install_recorder() {
                Ok(handle) => Some(handle),
                Err(e) => {
                    warn!("Metrics exporter unavailable: {}", e);
                    None
                }
            };
            let listener = tokio::net::TcpListener::bind(bind)
                .await
                .with_context(|| format!("binding status API to {}", bind))?;
            let state = Arc::new(StatusState::new(pipeline.stats(), metrics));
            Some(tokio::spawn(status::serve(listener, state, cancel.clone())))
        }
        None => None,
    };

    let result = pipeline.run(&mut source, cancel.clone()).await;
    cancel.cancel();

    if let Some(task) = status_task {
        match task.await {
            Ok(Err(e)) => error!("Status API error: {}", e),
            Err(e) => error!("Status API task failed: {}", e),
            Ok(Ok(())) => {}
        }
    }

    let stats = result.context("pipeline stopped on an integrity fault")?;
    info!(
        "Exiting: {} attestations persisted across {} windows",
        stats.attestations_persisted, stats.windows_flushed
    );
    Ok(())
}
