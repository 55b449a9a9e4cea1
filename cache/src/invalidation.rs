//! Entity lifecycle events and the listeners that keep the cache honest.
//!
//! The persistence layer publishes an [`EntityEvent`] after it commits a
//! change; listeners react by deleting stale entries so the next reader
//! reloads from the source of record.

use crate::keys::KeyKind;
use crate::store::KeyValueStore;

use core::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

/// What happened to an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
  Persisted,
  Updated,
  Removed,
}

/// A committed change to one entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityEvent {
  /// The scalar kind the entity is cached under.
  pub kind: KeyKind,
  pub id: i64,
  pub change: ChangeKind,
}

impl EntityEvent {
  pub fn new(kind: KeyKind, id: i64, change: ChangeKind) -> Self {
    Self { kind, id, change }
  }
}

/// A trait for listening to entity changes.
///
/// Listeners run synchronously on the publishing thread and must not block
/// on anything but the store.
pub trait InvalidationListener: Send + Sync {
  fn on_event(&self, event: &EntityEvent);
}

/// A registry of listeners that every event is fanned out to, in
/// registration order.
#[derive(Default)]
pub struct InvalidationBus {
  listeners: RwLock<Vec<Arc<dyn InvalidationListener>>>,
}

impl fmt::Debug for InvalidationBus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("InvalidationBus")
      .field("listeners", &self.listeners.read().len())
      .finish()
  }
}

impl InvalidationBus {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register(&self, listener: Arc<dyn InvalidationListener>) {
    self.listeners.write().push(listener);
  }

  pub fn len(&self) -> usize {
    self.listeners.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.listeners.read().is_empty()
  }

  pub fn publish(&self, event: &EntityEvent) {
    // Snapshot so a listener may register others without deadlocking.
    let listeners: Vec<_> = self.listeners.read().iter().cloned().collect();
    trace!(?event, listeners = listeners.len(), "publishing entity event");
    for listener in listeners {
      listener.on_event(event);
    }
  }
}

/// Deletes the cached entity when it is updated or removed.
///
/// Persisting a new entity needs no invalidation: nothing can have cached it.
pub struct DeleteOnChange {
  store: Arc<dyn KeyValueStore>,
  kinds: Vec<KeyKind>,
}

impl fmt::Debug for DeleteOnChange {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("DeleteOnChange")
      .field("kinds", &self.kinds)
      .finish_non_exhaustive()
  }
}

impl DeleteOnChange {
  /// Reacts to events for any of `kinds`.
  pub fn new(store: Arc<dyn KeyValueStore>, kinds: Vec<KeyKind>) -> Self {
    Self { store, kinds }
  }
}

impl InvalidationListener for DeleteOnChange {
  fn on_event(&self, event: &EntityEvent) {
    if !self.kinds.contains(&event.kind) {
      return;
    }
    match event.change {
      ChangeKind::Persisted => {}
      ChangeKind::Updated | ChangeKind::Removed => {
        let key = event.kind.key(&event.id);
        debug!(key = %key, change = ?event.change, "invalidating cached entity");
        self.store.delete(&key);
      }
    }
  }
}

/// Purges a removed entity's id from the lists it was fanned out to.
///
/// `lists_for` names the list keys that may hold the id.
pub struct PurgeFromLists<F> {
  store: Arc<dyn KeyValueStore>,
  kind: KeyKind,
  lists_for: F,
}

impl<F> fmt::Debug for PurgeFromLists<F> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PurgeFromLists")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

impl<F> PurgeFromLists<F>
where
  F: Fn(i64) -> Vec<String> + Send + Sync,
{
  pub fn new(store: Arc<dyn KeyValueStore>, kind: KeyKind, lists_for: F) -> Self {
    Self {
      store,
      kind,
      lists_for,
    }
  }
}

impl<F> InvalidationListener for PurgeFromLists<F>
where
  F: Fn(i64) -> Vec<String> + Send + Sync,
{
  fn on_event(&self, event: &EntityEvent) {
    if event.kind != self.kind || event.change != ChangeKind::Removed {
      return;
    }
    let keys = (self.lists_for)(event.id);
    debug!(id = event.id, lists = keys.len(), "purging removed id from lists");
    self.store.remove_from_lists(&keys, &[event.id]);
  }
}
