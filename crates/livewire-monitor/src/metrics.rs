//! Metrics collection and export for Livewire.
//!
//! Uses the `metrics` crate for instrumentation and exports
//! to Prometheus format.

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tenvis_livewire_core::{Category, StoreEvent};
use tracing::info;

/// Metric names.
pub mod names {
    pub const UPDATES_TOTAL: &str = "livewire_updates_total";
    pub const RENAMES_TOTAL: &str = "livewire_renames_total";
    pub const EXPIRATIONS_TOTAL: &str = "livewire_expirations_total";
    pub const NOTIFICATIONS_TOTAL: &str = "livewire_notifications_total";
    pub const FEED_ERRORS_TOTAL: &str = "livewire_feed_errors_total";
    pub const LIVE_ENTITIES: &str = "livewire_live_entities";
}

/// Initialize the metrics system.
pub fn init_metrics() {
    metrics::describe_counter!(names::UPDATES_TOTAL, "Total number of entity updates");
    metrics::describe_counter!(names::RENAMES_TOTAL, "Total number of entity renames");
    metrics::describe_counter!(
        names::EXPIRATIONS_TOTAL,
        "Total number of entities evicted after their grace period"
    );
    metrics::describe_counter!(
        names::NOTIFICATIONS_TOTAL,
        "Total number of change notifications delivered"
    );
    metrics::describe_counter!(names::FEED_ERRORS_TOTAL, "Total number of rejected feed lines");
    metrics::describe_gauge!(names::LIVE_ENTITIES, "Current number of live entities");

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the server cannot be started.
pub fn start_metrics_server(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}

/// Record a store change event.
pub fn record_event(event: &StoreEvent) {
    match event {
        StoreEvent::Updated { category, .. } => {
            counter!(names::UPDATES_TOTAL, "category" => category.as_str()).increment(1);
        }
        StoreEvent::Renamed { .. } => {
            counter!(names::RENAMES_TOTAL).increment(1);
        }
        StoreEvent::Expired { category, .. } => {
            counter!(names::EXPIRATIONS_TOTAL, "category" => category.as_str()).increment(1);
        }
        StoreEvent::Cleared { .. } => {}
    }
}

/// Record a delivered change notification.
pub fn record_notification() {
    counter!(names::NOTIFICATIONS_TOTAL).increment(1);
}

/// Update the live entity count of a category.
pub fn set_live_entities(category: Category, count: usize) {
    gauge!(names::LIVE_ENTITIES, "category" => category.as_str()).set(count as f64);
}

/// Record a rejected feed line.
pub fn record_feed_error(error_type: &'static str) {
    counter!(names::FEED_ERRORS_TOTAL, "type" => error_type).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use tenvis_livewire_core::EntityId;

    #[test]
    fn test_record_without_recorder() {
        // No recorder installed: every call is a no-op and must not panic.
        init_metrics();
        record_event(&StoreEvent::Expired {
            category: Category::Motors,
            id: EntityId::from(1),
        });
        record_notification();
        set_live_entities(Category::Peripherals, 3);
        record_feed_error("decode");
    }
}
