//! Live set reporting.
//!
//! Follows the store's change events, logging entities as they come and go
//! and keeping the live entity gauges current.

use crate::metrics;
use std::sync::Weak;
use tenvis_livewire_core::{Category, LiveEntityStore, StoreEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, trace, warn};

/// Report store changes until the store is dropped.
pub async fn run(store: Weak<LiveEntityStore>, mut events: broadcast::Receiver<StoreEvent>) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                warn!(skipped, "Reporter lagged behind store events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        let Some(store) = store.upgrade() else {
            break;
        };
        report(&store, &event);
    }

    debug!("Reporter stopped");
}

fn report(store: &LiveEntityStore, event: &StoreEvent) {
    metrics::record_event(event);
    for category in Category::ALL {
        metrics::set_live_entities(category, store.len(category));
    }

    let stats = store.stats();
    match event {
        StoreEvent::Updated {
            category,
            id,
            created: true,
        } => {
            info!(
                category = %category,
                entity = %id,
                motors = stats.motors,
                peripherals = stats.peripherals,
                "Entity online"
            );
        }
        StoreEvent::Updated { category, id, .. } => {
            trace!(category = %category, entity = %id, "Entity refreshed");
        }
        StoreEvent::Renamed { category, id, name } => {
            info!(category = %category, entity = %id, name = %name, "Entity renamed");
        }
        StoreEvent::Expired { category, id } => {
            info!(
                category = %category,
                entity = %id,
                motors = stats.motors,
                peripherals = stats.peripherals,
                "Entity offline"
            );
        }
        StoreEvent::Cleared { removed } => {
            info!(removed, "Live set cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use tenvis_livewire_core::EntityId;

    #[tokio::test(start_paused = true)]
    async fn test_reporter_stops_with_store() {
        let store = Arc::new(LiveEntityStore::new().unwrap());
        let reporter = tokio::spawn(run(Arc::downgrade(&store), store.events()));

        store.update_entity(Category::Motors, EntityId::from(1), None, json!(0.5));
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(store.is_empty());

        drop(store);
        tokio::time::timeout(Duration::from_secs(1), reporter)
            .await
            .expect("reporter should stop once the store is gone")
            .unwrap();
    }
}
