//! Event feed replay.
//!
//! A feed is newline-delimited JSON, one inbound event per line. Blank lines
//! are skipped; lines that fail to decode or apply are logged, counted, and
//! skipped.

use crate::config::Config;
use crate::metrics;
use anyhow::{Context, Result};
use tenvis_livewire_core::{InboundEvent, LiveEntityStore};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

/// Replay statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FeedStats {
    /// Lines applied to the store.
    pub applied: usize,
    /// Lines rejected.
    pub rejected: usize,
}

/// Open the configured feed.
///
/// # Errors
///
/// Returns an error if the feed file cannot be opened.
pub async fn open(config: &Config) -> Result<Box<dyn AsyncBufRead + Unpin + Send>> {
    match config.feed_path() {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open feed: {}", path.display()))?;
            info!("Reading feed from {}", path.display());
            Ok(Box::new(BufReader::new(file)))
        }
        None => {
            info!("Reading feed from stdin");
            Ok(Box::new(BufReader::new(tokio::io::stdin())))
        }
    }
}

/// Apply every event of a feed to the store.
///
/// # Errors
///
/// Returns an error if reading the feed fails.
pub async fn replay<R>(reader: R, store: &LiveEntityStore) -> Result<FeedStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();
    let mut line_number = 0usize;

    while let Some(line) = lines.next_line().await.context("Failed to read feed")? {
        line_number += 1;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: InboundEvent = match serde_json::from_str(line) {
            Ok(event) => event,
            Err(e) => {
                warn!(line = line_number, error = %e, "Skipping undecodable feed line");
                metrics::record_feed_error("decode");
                stats.rejected += 1;
                continue;
            }
        };

        match store.dispatch(event) {
            Ok(()) => stats.applied += 1,
            Err(e) => {
                warn!(line = line_number, error = %e, "Skipping rejected feed line");
                metrics::record_feed_error("rejected");
                stats.rejected += 1;
            }
        }
    }

    debug!(applied = stats.applied, rejected = stats.rejected, "Feed exhausted");
    Ok(stats)
}

/// Wait until every live entity has expired.
pub async fn drain(store: &LiveEntityStore) {
    let mut rx = store.events();

    while !store.is_empty() {
        match rx.recv().await {
            Ok(_) | Err(RecvError::Lagged(_)) => {}
            Err(RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tenvis_livewire_core::{Category, EntityId, EntityKind};

    const FEED: &str = r#"
{"type":"UPDATE_ENTITY_SCALAR","id":"m1","value":0.5}
{"type":"UPDATE_ENTITY_STRUCT","entity":{"id":4,"kind":"SENSOR_SCALAR","value":21.5}}

not json at all
{"type":"UPDATE_ENTITY_SCALAR","value":0.1}
{"type":"RENAME_ENTITY","category":"motors","id":"ghost","name":"ghost"}
{"type":"RENAME_ENTITY","category":"peripherals","id":4,"name":"thermometer"}
"#;

    #[tokio::test(start_paused = true)]
    async fn test_replay_applies_and_rejects() {
        let store = LiveEntityStore::new().unwrap();

        let stats = replay(FEED.as_bytes(), &store).await.unwrap();
        assert_eq!(
            stats,
            FeedStats {
                applied: 3,
                rejected: 3,
            }
        );

        let motor = store.get(Category::Motors, &EntityId::new("m1").unwrap()).unwrap();
        assert_eq!(motor.kind, EntityKind::MotorScalar);

        let sensor = store.get(Category::Peripherals, &EntityId::from(4)).unwrap();
        assert_eq!(sensor.kind, EntityKind::SensorScalar);
        assert_eq!(sensor.name.as_deref(), Some("thermometer"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_waits_for_expiry() {
        let store = LiveEntityStore::new().unwrap();
        replay(FEED.as_bytes(), &store).await.unwrap();
        assert!(!store.is_empty());

        let start = tokio::time::Instant::now();
        drain(&store).await;

        assert!(store.is_empty());
        assert_eq!(start.elapsed(), Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_returns_immediately_when_empty() {
        let store = LiveEntityStore::new().unwrap();
        drain(&store).await;
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_open_missing_feed() {
        let config: Config = toml::from_str("[feed]\npath = \"/nonexistent/feed.ndjson\"").unwrap();
        assert!(open(&config).await.is_err());
    }
}
