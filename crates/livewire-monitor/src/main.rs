//! # Livewire Monitor
//!
//! Replays a telemetry event feed into a live entity store and reports
//! entities as they come online and time out.
//!
//! ## Usage
//!
//! ```bash
//! # Read events from stdin
//! robot-bridge | livewire
//!
//! # Read events from a recorded feed
//! LIVEWIRE_FEED=session.ndjson livewire
//!
//! # Run with custom config
//! LIVEWIRE_CONFIG=/path/to/livewire.toml livewire
//! ```

mod config;
mod feed;
mod metrics;
mod report;

use anyhow::Result;
use std::sync::Arc;
use tenvis_livewire_core::LiveEntityStore;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "livewire=info,tenvis_livewire_core=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = config::Config::load()?;

    info!(
        "Starting Livewire monitor with a {:?} grace period",
        config.grace_period()
    );

    // Initialize metrics
    metrics::init_metrics();
    if config.metrics.enabled {
        if let Err(e) = metrics::start_metrics_server(config.metrics.port) {
            error!("Failed to start metrics server: {}", e);
        }
    }

    let store = Arc::new(LiveEntityStore::with_config(config.store_config())?);
    let _subscription = store.subscribe(metrics::record_notification);
    let reporter = tokio::spawn(report::run(Arc::downgrade(&store), store.events()));

    let source = feed::open(&config).await?;
    let session = async {
        let stats = feed::replay(source, &store).await?;
        info!(
            applied = stats.applied,
            rejected = stats.rejected,
            "Feed finished"
        );

        if config.feed.drain_on_eof {
            info!("Waiting for live entities to expire");
            feed::drain(&store).await;
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::select! {
        result = session => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted"),
    }

    let removed = store.shutdown();
    reporter.abort();
    info!(removed, "Livewire monitor stopped");

    Ok(())
}
