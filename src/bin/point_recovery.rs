//! # Point Recovery Consumer
//!
//! Standalone binary that consumes failed point deductions from pgmq and replays the
//! ones that never reached the ledger.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default configuration (config/point_recovery.toml if present)
//! cargo run --bin point-recovery
//!
//! # Run with a specific environment and endpoint
//! POINT_RECOVERY_ENV=production \
//! POINT_RECOVERY__HTTP__BASE_URL=http://point-api:8080 \
//! cargo run --release --bin point-recovery
//! ```

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};

use point_recovery::client::PointApiClient;
use point_recovery::config::ConfigLoader;
use point_recovery::logging;
use point_recovery::messaging::PgmqClient;
use point_recovery::recovery::{RecoveryConsumer, RecoveryPipeline};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logging::init_structured_logging();

    info!("🚀 Starting Point Recovery Consumer...");
    info!("   Version: {}", env!("CARGO_PKG_VERSION"));
    info!(
        "   Build Mode: {}",
        if cfg!(debug_assertions) {
            "Debug"
        } else {
            "Release"
        }
    );
    info!("   Environment: {}", logging::get_environment());

    let config = ConfigLoader::load()?;
    info!(config = %config.sanitized(), "Configuration loaded");

    let client = Arc::new(PointApiClient::new(&config.http)?);

    let queue_name = config.consumer.queue_name();
    let broker = PgmqClient::connect(&config.queue, &queue_name, config.consumer.commit_mode).await?;
    broker.ensure_queue().await?;

    let pipeline = RecoveryPipeline::from_config(&config, client.clone(), client)?;
    let consumer = RecoveryConsumer::new(Arc::new(broker), pipeline, config.consumer.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let consumer_handle = tokio::spawn(consumer.run(shutdown_rx));

    info!(
        topic = %config.consumer.topic,
        queue = %queue_name,
        consumer_group = %config.consumer.consumer_group,
        "🎉 Recovery consumer running"
    );
    info!("   Press Ctrl+C to shutdown gracefully");

    shutdown_signal().await;

    info!("🛑 Shutdown signal received, finishing in-flight message...");
    if shutdown_tx.send(true).is_err() {
        error!("Consumer loop exited before shutdown was requested");
    }

    let stats = consumer_handle.await?;
    info!(
        received = stats.received,
        committed = stats.committed,
        skipped = stats.skipped,
        commit_failures = stats.commit_failures,
        receive_failures = stats.receive_failures,
        "👋 Point Recovery Consumer shutdown complete"
    );

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
