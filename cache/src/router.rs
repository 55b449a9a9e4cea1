//! Round-robin routing over replicated stores.

use crate::error::BuildError;
use crate::store::KeyValueStore;

use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;

/// Hands out "the next" element of a fixed collection.
pub trait Rotator<T>: Send + Sync {
  fn next(&self) -> &T;
}

/// Cycles through its elements in order, wrapping around. Lock-free.
pub struct RoundRobin<T> {
  items: Box<[T]>,
  cursor: CachePadded<AtomicUsize>,
}

impl<T> RoundRobin<T> {
  pub fn new(items: Vec<T>) -> Result<Self, BuildError> {
    if items.is_empty() {
      return Err(BuildError::NoStores);
    }
    Ok(Self {
      items: items.into_boxed_slice(),
      cursor: CachePadded::new(AtomicUsize::new(0)),
    })
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }
}

impl<T: Send + Sync> Rotator<T> for RoundRobin<T> {
  #[inline]
  fn next(&self) -> &T {
    let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.items.len();
    &self.items[index]
  }
}

impl<T> fmt::Debug for RoundRobin<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RoundRobin")
      .field("len", &self.items.len())
      .field("cursor", &self.cursor.load(Ordering::Relaxed))
      .finish()
  }
}

type SharedStore = Arc<dyn KeyValueStore>;

/// A [`KeyValueStore`] that spreads calls across several replicas.
///
/// Reads and writes rotate independently: every call goes to exactly one
/// replica, picked by the read rotator or the write rotator. Nothing keeps
/// replicas in sync, so a read may not see a write made through this router
/// a moment earlier.
///
/// The list bound is reported by a fixed primary replica so asking for it
/// does not disturb the rotation.
pub struct ReplicatedStore {
  primary: SharedStore,
  reads: Box<dyn Rotator<SharedStore>>,
  writes: Box<dyn Rotator<SharedStore>>,
}

impl fmt::Debug for ReplicatedStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ReplicatedStore").finish_non_exhaustive()
  }
}

impl ReplicatedStore {
  /// Round-robins reads and writes over the same replicas.
  /// The first store is the primary.
  pub fn round_robin(stores: Vec<SharedStore>) -> Result<Self, BuildError> {
    let primary = stores.first().cloned().ok_or(BuildError::NoStores)?;
    let reads = RoundRobin::new(stores.clone())?;
    let writes = RoundRobin::new(stores)?;
    Ok(Self::with_rotators(primary, Box::new(reads), Box::new(writes)))
  }

  pub fn with_rotators(
    primary: SharedStore,
    reads: Box<dyn Rotator<SharedStore>>,
    writes: Box<dyn Rotator<SharedStore>>,
  ) -> Self {
    Self {
      primary,
      reads,
      writes,
    }
  }

  #[inline]
  fn reader(&self) -> &dyn KeyValueStore {
    self.reads.next().as_ref()
  }

  #[inline]
  fn writer(&self) -> &dyn KeyValueStore {
    self.writes.next().as_ref()
  }
}

impl KeyValueStore for ReplicatedStore {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    self.reader().get(key)
  }

  fn get_list(&self, key: &str) -> Option<Vec<i64>> {
    self.reader().get_list(key)
  }

  fn get_list_bounded(&self, key: &str, max: usize) -> Option<Vec<i64>> {
    self.reader().get_list_bounded(key, max)
  }

  fn get_set(&self, key: &str) -> Option<HashSet<i64>> {
    self.reader().get_set(key)
  }

  fn multi_get(&self, keys: &[String]) -> HashMap<String, Vec<u8>> {
    self.reader().multi_get(keys)
  }

  fn multi_get_list(&self, keys: &[String]) -> HashMap<String, Vec<i64>> {
    self.reader().multi_get_list(keys)
  }

  fn multi_get_set(&self, keys: &[String]) -> HashMap<String, HashSet<i64>> {
    self.reader().multi_get_set(keys)
  }

  fn set(&self, key: &str, value: Option<&[u8]>) {
    self.writer().set(key, value)
  }

  fn set_list(&self, key: &str, ids: &[i64]) {
    self.writer().set_list(key, ids)
  }

  fn init_list(&self, key: &str, ids: &[i64]) -> bool {
    self.writer().init_list(key, ids)
  }

  fn set_set(&self, key: &str, ids: &HashSet<i64>) {
    self.writer().set_set(key, ids)
  }

  fn set_list_cas(&self, key: &str, ids: &[i64]) -> Option<Vec<i64>> {
    self.writer().set_list_cas(key, ids)
  }

  fn delete(&self, key: &str) {
    self.writer().delete(key)
  }

  fn delete_list(&self, key: &str) {
    self.writer().delete_list(key)
  }

  fn add_to_top_of_list(&self, key: &str, ids: &[i64]) {
    self.writer().add_to_top_of_list(key, ids)
  }

  fn remove_from_list(&self, key: &str, id: i64) {
    self.writer().remove_from_list(key, id)
  }

  fn remove_from_lists(&self, keys: &[String], ids: &[i64]) {
    self.writer().remove_from_lists(keys, ids)
  }

  fn add_to_set(&self, key: &str, id: i64) -> Option<HashSet<i64>> {
    self.writer().add_to_set(key, id)
  }

  fn remove_from_set(&self, key: &str, id: i64) {
    self.writer().remove_from_set(key, id)
  }

  // Follows the read rotation.
  fn clear(&self) {
    self.reader().clear()
  }

  fn max_list_size(&self) -> usize {
    self.primary.max_list_size()
  }
}
