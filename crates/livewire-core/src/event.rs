//! Inbound and outbound event types.
//!
//! Inbound events are already-decoded requests from the transport layer.
//! Outbound [`StoreEvent`]s describe what changed and are broadcast to async
//! consumers alongside the synchronous listener fan-out.

use crate::entity::{Category, EntityId, EntityKind};
use serde::{Deserialize, Serialize};

/// A structured entity update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    /// Entity identifier.
    pub id: EntityId,
    /// Peripheral type tag.
    pub kind: EntityKind,
    /// Reported reading.
    pub value: serde_json::Value,
}

/// An event consumed by [`LiveEntityStore::dispatch`](crate::LiveEntityStore::dispatch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InboundEvent {
    /// Scalar motor reading.
    UpdateEntityScalar {
        /// Motor identifier.
        id: EntityId,
        /// Reported reading.
        value: f64,
    },

    /// Full peripheral reading with its type tag.
    UpdateEntityStruct {
        /// The reported entity.
        entity: EntityUpdate,
    },

    /// Assign a display name to a live entity.
    RenameEntity {
        /// Category the entity lives in.
        category: Category,
        /// Entity identifier.
        id: EntityId,
        /// New display name.
        name: String,
    },
}

impl InboundEvent {
    /// Get the category this event targets.
    #[must_use]
    pub fn category(&self) -> Category {
        match self {
            Self::UpdateEntityScalar { .. } => Category::Motors,
            Self::UpdateEntityStruct { .. } => Category::Peripherals,
            Self::RenameEntity { category, .. } => *category,
        }
    }

    /// Get the identifier this event targets.
    #[must_use]
    pub fn id(&self) -> &EntityId {
        match self {
            Self::UpdateEntityScalar { id, .. } | Self::RenameEntity { id, .. } => id,
            Self::UpdateEntityStruct { entity } => &entity.id,
        }
    }
}

/// A change applied to the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// An entity was created or refreshed.
    Updated {
        category: Category,
        id: EntityId,
        /// `true` when the entity was not live before this update.
        created: bool,
    },

    /// A live entity received a display name.
    Renamed {
        category: Category,
        id: EntityId,
        name: String,
    },

    /// An entity's grace period elapsed without an update.
    Expired { category: Category, id: EntityId },

    /// The store was shut down and every live entity dropped.
    Cleared { removed: usize },
}
