//! The live entity store.
//!
//! Holds the latest value per entity, forgets entities that stop reporting
//! within the grace period, and notifies listeners on every change.

use crate::entity::{Category, Entity, EntityId, EntityKind};
use crate::event::{InboundEvent, StoreEvent};
use crate::listener::{Listener, ListenerId, ListenerSet};
use crate::reaper::Reaper;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

/// Default time an entity stays live after its last update.
pub const DEFAULT_GRACE_PERIOD: Duration = Duration::from_millis(1000);

/// Default capacity of the change event broadcast channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Invalid entity identifier.
    #[error("Invalid entity id: {0}")]
    InvalidEntityId(&'static str),

    /// Category name outside the recognized set.
    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    /// Entity is not live in the given category.
    #[error("Entity not found: {category}/{id}")]
    NotFound { category: Category, id: EntityId },

    /// No tokio runtime to drive expiry timers.
    #[error("No tokio runtime available for expiry timers")]
    NoRuntime,
}

/// Store configuration.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Time an entity stays live after its last update.
    pub grace_period: Duration,
    /// Change event broadcast capacity.
    pub event_capacity: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            grace_period: DEFAULT_GRACE_PERIOD,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

/// A live entity and the timer that will evict it.
struct EntityRecord {
    kind: EntityKind,
    value: serde_json::Value,
    reaper: Reaper,
}

/// Live entities and display names of one category.
#[derive(Default)]
struct Table {
    entities: DashMap<EntityId, EntityRecord>,
    names: DashMap<EntityId, String>,
}

impl Table {
    fn entity(&self, id: &EntityId, record: &EntityRecord) -> Entity {
        Entity {
            id: id.clone(),
            kind: record.kind,
            value: record.value.clone(),
            name: self.names.get(id).map(|name| name.value().clone()),
        }
    }
}

struct Inner {
    config: StoreConfig,
    runtime: Handle,
    /// Indexed by [`Category::index`].
    tables: [Table; 2],
    /// Serializes every mutation together with its listener fan-out.
    mutation: Mutex<()>,
    generation: AtomicU64,
    listeners: ListenerSet,
    events: broadcast::Sender<StoreEvent>,
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, ()> {
        self.mutation.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn table(&self, category: Category) -> &Table {
        &self.tables[category.index()]
    }

    /// Publish the change event, then run the listeners.
    ///
    /// The event goes out first so a panicking listener cannot swallow it.
    fn notify(&self, event: StoreEvent) {
        // Sending fails only when nobody is listening for events.
        let _ = self.events.send(event);
        self.listeners.notify();
    }

    fn spawn_reaper(self: &Arc<Self>, category: Category, id: EntityId) -> Reaper {
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::downgrade(self);

        Reaper::spawn(
            &self.runtime,
            self.config.grace_period,
            generation,
            move || {
                if let Some(inner) = inner.upgrade() {
                    inner.expire(category, &id, generation);
                }
            },
        )
    }

    /// Evict an entity whose timer fired, unless it was refreshed meanwhile.
    fn expire(&self, category: Category, id: &EntityId, generation: u64) {
        let _guard = self.lock();

        let removed = self
            .table(category)
            .entities
            .remove_if(id, |_, record| record.reaper.generation() == generation);

        if let Some((id, _record)) = removed {
            debug!(category = %category, entity = %id, "Entity expired");
            self.notify(StoreEvent::Expired { category, id });
        }
    }

    fn unsubscribe(&self, listener_id: ListenerId) {
        // Waiting for the mutation lock guarantees no fan-out is in flight.
        let _guard = self.lock();
        if self.listeners.remove(listener_id) {
            debug!(listener = listener_id, "Listener unsubscribed");
        }
    }
}

/// A liveness-based registry of telemetry entities.
///
/// Every update (re)starts the entity's expiry timer; an entity that receives
/// no update for the grace period is evicted. Listeners are notified
/// synchronously after every update, rename, and expiry.
///
/// Mutations and their notifications are serialized: a listener always sees
/// the state produced by the change it is being told about. Listeners may
/// read the store but must not mutate it or unsubscribe from inside their
/// callback.
pub struct LiveEntityStore {
    inner: Arc<Inner>,
}

impl LiveEntityStore {
    /// Create a store with default configuration on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] when called outside a tokio runtime.
    pub fn new() -> Result<Self, StoreError> {
        Self::with_config(StoreConfig::default())
    }

    /// Create a store with custom configuration on the current runtime.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRuntime`] when called outside a tokio runtime.
    pub fn with_config(config: StoreConfig) -> Result<Self, StoreError> {
        let runtime = Handle::try_current().map_err(|_| StoreError::NoRuntime)?;
        Ok(Self::with_runtime(config, runtime))
    }

    /// Create a store whose expiry timers run on the given runtime.
    #[must_use]
    pub fn with_runtime(config: StoreConfig, runtime: Handle) -> Self {
        info!("Creating live entity store with config: {:?}", config);
        let (events, _) = broadcast::channel(config.event_capacity.max(1));

        Self {
            inner: Arc::new(Inner {
                config,
                runtime,
                tables: Default::default(),
                mutation: Mutex::new(()),
                generation: AtomicU64::new(0),
                listeners: ListenerSet::new(),
                events,
            }),
        }
    }

    /// Get the store configuration.
    #[must_use]
    pub fn config(&self) -> &StoreConfig {
        &self.inner.config
    }

    /// Record a reading for an entity.
    ///
    /// Creates the entity if it is not live, otherwise replaces its value and,
    /// when `kind` is given, its kind. The expiry timer restarts from now and
    /// every listener is notified once, even if the value is unchanged.
    pub fn update_entity(
        &self,
        category: Category,
        id: EntityId,
        kind: Option<EntityKind>,
        value: serde_json::Value,
    ) {
        self.upsert(category, id, kind, true, value);
    }

    /// Create or refresh an entity. `kind` applies on creation, and on
    /// refresh only when `replace_kind` is set.
    fn upsert(
        &self,
        category: Category,
        id: EntityId,
        kind: Option<EntityKind>,
        replace_kind: bool,
        value: serde_json::Value,
    ) {
        let inner = &self.inner;
        let _guard = inner.lock();
        let reaper = inner.spawn_reaper(category, id.clone());

        let created = match inner.table(category).entities.entry(id.clone()) {
            Entry::Occupied(mut entry) => {
                let record = entry.get_mut();
                if let Some(kind) = kind.filter(|_| replace_kind) {
                    record.kind = kind;
                }
                record.value = value;
                // Replacing the reaper drops (and aborts) the previous timer.
                record.reaper = reaper;
                false
            }
            Entry::Vacant(entry) => {
                entry.insert(EntityRecord {
                    kind: kind.unwrap_or_else(|| category.default_kind()),
                    value,
                    reaper,
                });
                true
            }
        };

        if created {
            debug!(category = %category, entity = %id, "Entity created");
        } else {
            trace!(category = %category, entity = %id, "Entity refreshed");
        }

        inner.notify(StoreEvent::Updated {
            category,
            id,
            created,
        });
    }

    /// Assign a display name to a live entity.
    ///
    /// Does not refresh the entity's expiry timer. The name is kept after the
    /// entity expires and shows up again if it comes back.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the entity is not live in
    /// `category`; listeners are not notified in that case.
    pub fn rename_entity(
        &self,
        category: Category,
        id: EntityId,
        name: impl Into<String>,
    ) -> Result<(), StoreError> {
        let inner = &self.inner;
        let _guard = inner.lock();
        let table = inner.table(category);

        if !table.entities.contains_key(&id) {
            return Err(StoreError::NotFound { category, id });
        }

        let name = name.into();
        table.names.insert(id.clone(), name.clone());
        debug!(category = %category, entity = %id, name = %name, "Entity renamed");

        inner.notify(StoreEvent::Renamed { category, id, name });
        Ok(())
    }

    /// Apply an inbound event.
    ///
    /// Scalar updates land in [`Category::Motors`], struct updates in
    /// [`Category::Peripherals`]. A struct update's kind is taken when the
    /// peripheral comes online; refreshes only replace the value.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] when renaming an entity that is not
    /// live.
    pub fn dispatch(&self, event: InboundEvent) -> Result<(), StoreError> {
        match event {
            InboundEvent::UpdateEntityScalar { id, value } => {
                self.update_entity(Category::Motors, id, None, serde_json::Value::from(value));
            }
            InboundEvent::UpdateEntityStruct { entity } => {
                self.upsert(
                    Category::Peripherals,
                    entity.id,
                    Some(entity.kind),
                    false,
                    entity.value,
                );
            }
            InboundEvent::RenameEntity { category, id, name } => {
                self.rename_entity(category, id, name)?;
            }
        }
        Ok(())
    }

    /// Get copies of every live entity in a category, in no particular order.
    #[must_use]
    pub fn snapshot(&self, category: Category) -> Vec<Entity> {
        let table = self.inner.table(category);
        table
            .entities
            .iter()
            .map(|entry| table.entity(entry.key(), entry.value()))
            .collect()
    }

    /// Get copies of every live motor.
    #[must_use]
    pub fn motors(&self) -> Vec<Entity> {
        self.snapshot(Category::Motors)
    }

    /// Get copies of every live peripheral.
    #[must_use]
    pub fn peripherals(&self) -> Vec<Entity> {
        self.snapshot(Category::Peripherals)
    }

    /// Get a copy of one live entity.
    #[must_use]
    pub fn get(&self, category: Category, id: &EntityId) -> Option<Entity> {
        let table = self.inner.table(category);
        table
            .entities
            .get(id)
            .map(|record| table.entity(id, record.value()))
    }

    /// Check if an entity is live.
    #[must_use]
    pub fn is_live(&self, category: Category, id: &EntityId) -> bool {
        self.inner.table(category).entities.contains_key(id)
    }

    /// Get the number of live entities in a category.
    #[must_use]
    pub fn len(&self, category: Category) -> usize {
        self.inner.table(category).entities.len()
    }

    /// Check if no entity is live in any category.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        Category::ALL.iter().all(|category| self.len(*category) == 0)
    }

    /// Register a change listener.
    ///
    /// The listener stays registered until the returned [`Subscription`] is
    /// unsubscribed or dropped.
    pub fn subscribe(&self, listener: impl Listener + 'static) -> Subscription {
        let id = self.inner.listeners.insert(Arc::new(listener));
        debug!(listener = id, "Listener subscribed");

        Subscription {
            id,
            inner: Arc::downgrade(&self.inner),
            active: true,
        }
    }

    /// Get the number of registered listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Receive typed change events.
    ///
    /// Returns a receiver for events produced *after* this call.
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<StoreEvent> {
        self.inner.events.subscribe()
    }

    /// Drop every live entity and cancel its timer.
    ///
    /// Names are forgotten as well. Listeners are notified once if anything
    /// was removed. Returns the number of entities removed.
    pub fn shutdown(&self) -> usize {
        let inner = &self.inner;
        let _guard = inner.lock();

        let mut removed = 0;
        for table in &inner.tables {
            removed += table.entities.len();
            table.entities.clear();
            table.names.clear();
        }

        if removed > 0 {
            info!(removed, "Live entity store cleared");
            inner.notify(StoreEvent::Cleared { removed });
        }
        removed
    }

    /// Get store statistics.
    #[must_use]
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            motors: self.len(Category::Motors),
            peripherals: self.len(Category::Peripherals),
            listeners: self.listener_count(),
        }
    }
}

/// Store statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of live motors.
    pub motors: usize,
    /// Number of live peripherals.
    pub peripherals: usize,
    /// Number of registered listeners.
    pub listeners: usize,
}

/// Handle to a registered listener.
///
/// Once [`unsubscribe`](Self::unsubscribe) returns, or the handle is dropped,
/// the listener is never invoked again.
#[must_use = "dropping a Subscription unsubscribes its listener"]
pub struct Subscription {
    id: ListenerId,
    inner: Weak<Inner>,
    active: bool,
}

impl Subscription {
    /// Get the listener identifier.
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Unregister the listener.
    ///
    /// Waits for an in-flight notification to finish, so it must not be called
    /// from inside a listener.
    pub fn unsubscribe(mut self) {
        self.detach();
    }

    fn detach(&mut self) {
        if !std::mem::replace(&mut self.active, false) {
            return;
        }
        if let Some(inner) = self.inner.upgrade() {
            inner.unsubscribe(self.id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.detach();
    }
}
