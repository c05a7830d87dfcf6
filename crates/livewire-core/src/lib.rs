//! # livewire-core
//!
//! Liveness-based in-memory registry for streaming telemetry entities.
//!
//! This crate provides the building blocks:
//!
//! - **Entity** - Identifiers, categories, kinds, and snapshot copies
//! - **Store** - The [`LiveEntityStore`] with per-entity expiry timers
//! - **Event** - Typed inbound events and outbound change events
//! - **Listener** - Synchronous change callbacks
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────────┐     ┌─────────────┐
//! │ InboundEvent│────▶│ LiveEntityStore │────▶│  Listeners  │
//! └─────────────┘     └─────────────────┘     └─────────────┘
//!                        │            ▲
//!                        ▼            │
//!                     ┌─────────────────┐
//!                     │     Reapers     │
//!                     └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use tenvis_livewire_core::{Category, EntityId, LiveEntityStore};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tenvis_livewire_core::StoreError> {
//! let store = LiveEntityStore::new()?;
//! let _subscription = store.subscribe(|| println!("entities changed"));
//!
//! store.update_entity(Category::Motors, EntityId::new("m1")?, None, json!(0.5));
//! assert_eq!(store.motors().len(), 1);
//! # Ok(())
//! # }
//! ```

pub mod entity;
pub mod event;
pub mod listener;
mod reaper;
pub mod store;

pub use entity::{Category, Entity, EntityId, EntityKind};
pub use event::{EntityUpdate, InboundEvent, StoreEvent};
pub use listener::{Listener, ListenerId};
pub use store::{LiveEntityStore, StoreConfig, StoreError, StoreStats, Subscription};
