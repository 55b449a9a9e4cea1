use crate::backend::CasBackend;
use crate::codec::{decode_ids, decode_set, Item, ValueKind};
use crate::error::{CacheError, Result};
use crate::memory::MemoryBackend;
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::mutator::{CasMutator, CasSettings};
use crate::store::KeyValueStore;

use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::Ordering;
use std::time::Duration;

use tracing::{error, info, trace, warn};

/// Memcached's longest relative expiration: 30 days.
pub const MAX_EXPIRATION: Duration = Duration::from_secs(60 * 60 * 24 * 30);

pub const DEFAULT_MAX_LIST_SIZE: usize = 10_000;

/// A [`KeyValueStore`] over any [`CasBackend`].
///
/// Lists and sets are stored packed and every mutation goes through the
/// compare-and-swap loop, so concurrent writers on one key never lose each
/// other's updates. Backend failures are logged here and never reach callers.
pub struct AtomicStore<B> {
  backend: B,
  pub(crate) max_list_size: usize,
  pub(crate) expiration: Duration,
  pub(crate) cas: CasSettings,
  metrics: Metrics,
}

/// The in-process store.
pub type MemoryStore = AtomicStore<MemoryBackend>;

impl<B> fmt::Debug for AtomicStore<B> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AtomicStore")
      .field("max_list_size", &self.max_list_size)
      .field("expiration", &self.expiration)
      .field("cas", &self.cas)
      .finish_non_exhaustive()
  }
}

impl<B: CasBackend> AtomicStore<B> {
  /// Wraps `backend` with default settings. Use `StoreBuilder` to tune them.
  pub fn new(backend: B) -> Self {
    Self::with_settings(backend, DEFAULT_MAX_LIST_SIZE, MAX_EXPIRATION, CasSettings::default())
  }

  pub(crate) fn with_settings(
    backend: B,
    max_list_size: usize,
    expiration: Duration,
    cas: CasSettings,
  ) -> Self {
    Self {
      backend,
      max_list_size,
      expiration,
      cas,
      metrics: Metrics::new(),
    }
  }

  /// Direct access to the backend, bypassing every typed rule.
  pub fn backend(&self) -> &B {
    &self.backend
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  fn mutator(&self) -> CasMutator<'_, B> {
    CasMutator::new(&self.backend, self.cas, self.expiration, &self.metrics)
  }

  /// Logs a failed backend call and turns it into `None`.
  fn degrade<T>(&self, op: &'static str, key: &str, result: Result<T>) -> Option<T> {
    match result {
      Ok(value) => Some(value),
      Err(err) => {
        match &err {
          CacheError::Codec(_) | CacheError::Serialization(_) => {
            Metrics::bump(&self.metrics.decode_failures)
          }
          CacheError::CasExhausted { .. } | CacheError::CasTimeout { .. } => {}
          _ => Metrics::bump(&self.metrics.store_failures),
        }
        error!(op, key = %key, error = %err, "cache operation failed, degrading");
        None
      }
    }
  }

  fn read(&self, key: &str) -> Option<Item> {
    self.degrade("get", key, self.backend.get(key)).flatten()
  }

  fn write(&self, op: &'static str, key: &str, item: &Item) {
    if self
      .degrade(op, key, self.backend.set(key, item, self.expiration))
      .is_some()
    {
      Metrics::bump(&self.metrics.writes);
    }
  }

  fn bulk_read(&self, keys: &[String]) -> HashMap<String, Item> {
    let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let found = self
      .degrade("multi_get", "<bulk>", self.backend.multi_get(&refs))
      .unwrap_or_default();
    let hits = found.len() as u64;
    self.metrics.hits.fetch_add(hits, Ordering::Relaxed);
    self
      .metrics
      .misses
      .fetch_add((keys.len() as u64).saturating_sub(hits), Ordering::Relaxed);
    found
  }

  /// Decodes `item` as `expected`; a mismatch or malformed payload is logged
  /// and read as absent.
  fn decode<T>(
    &self,
    key: &str,
    item: &Item,
    expected: ValueKind,
    decode: fn(&[u8]) -> Result<T>,
  ) -> Option<T> {
    match expect_kind(item, expected).and_then(|bytes| decode(bytes)) {
      Ok(value) => Some(value),
      Err(err) => {
        Metrics::bump(&self.metrics.decode_failures);
        warn!(key = %key, error = %err, "cached value has the wrong shape, treating as absent");
        None
      }
    }
  }

  fn decode_list(&self, key: &str, item: &Item) -> Option<Vec<i64>> {
    self.decode(key, item, ValueKind::List, decode_ids)
  }

  fn decode_set(&self, key: &str, item: &Item) -> Option<HashSet<i64>> {
    self.decode(key, item, ValueKind::Set, decode_set)
  }
}

fn expect_kind(item: &Item, expected: ValueKind) -> Result<&[u8]> {
  if item.kind == expected {
    Ok(&item.bytes)
  } else {
    Err(CacheError::Codec(format!(
      "expected a {:?} value, found {:?}",
      expected, item.kind
    )))
  }
}

fn current_list(item: &Item) -> Result<Vec<i64>> {
  decode_ids(expect_kind(item, ValueKind::List)?)
}

fn current_set(item: &Item) -> Result<HashSet<i64>> {
  decode_set(expect_kind(item, ValueKind::Set)?)
}

impl<B: CasBackend> KeyValueStore for AtomicStore<B> {
  fn get(&self, key: &str) -> Option<Vec<u8>> {
    trace!(key = %key, "get");
    let value = self.read(key).and_then(|item| {
      self.decode(key, &item, ValueKind::Scalar, |bytes| Ok(bytes.to_vec()))
    });
    self.metrics.record_lookup(value.is_some());
    value
  }

  fn get_list_bounded(&self, key: &str, max: usize) -> Option<Vec<i64>> {
    trace!(key = %key, max, "get_list");
    let mut ids = match self.read(key).and_then(|item| self.decode_list(key, &item)) {
      Some(ids) => ids,
      None => {
        self.metrics.record_lookup(false);
        return None;
      }
    };
    self.metrics.record_lookup(true);

    if ids.len() > max {
      let kept = max.saturating_sub(1);
      info!(key = %key, len = ids.len(), max, kept, "trimming oversized list on read");
      // Trim whatever is current, so a prepend that raced this read survives.
      let result = self.mutator().mutate(key, None, |current| {
        let mut list = current_list(current)?;
        if list.len() > max {
          list.truncate(kept);
        }
        Ok(Item::list(&list))
      });
      match self.degrade("trim_list", key, result) {
        Some(Some(mutated)) => {
          Metrics::bump(&self.metrics.trims);
          Metrics::bump(&self.metrics.writes);
          if let Some(stored) = self.decode_list(key, &mutated.stored) {
            ids = stored;
          }
        }
        // Deleted since the read, or the swap gave up: return the read, trimmed.
        Some(None) | None => ids.truncate(kept),
      }
    }
    Some(ids)
  }

  fn get_set(&self, key: &str) -> Option<HashSet<i64>> {
    trace!(key = %key, "get_set");
    let set = self.read(key).and_then(|item| self.decode_set(key, &item));
    self.metrics.record_lookup(set.is_some());
    set
  }

  fn multi_get(&self, keys: &[String]) -> HashMap<String, Vec<u8>> {
    trace!(count = keys.len(), "multi_get");
    self
      .bulk_read(keys)
      .into_iter()
      .filter_map(|(key, item)| {
        let bytes = self.decode(&key, &item, ValueKind::Scalar, |b| Ok(b.to_vec()))?;
        Some((key, bytes))
      })
      .collect()
  }

  fn multi_get_list(&self, keys: &[String]) -> HashMap<String, Vec<i64>> {
    trace!(count = keys.len(), "multi_get_list");
    self
      .bulk_read(keys)
      .into_iter()
      .filter_map(|(key, item)| {
        let ids = self.decode_list(&key, &item)?;
        Some((key, ids))
      })
      .collect()
  }

  fn multi_get_set(&self, keys: &[String]) -> HashMap<String, HashSet<i64>> {
    trace!(count = keys.len(), "multi_get_set");
    self
      .bulk_read(keys)
      .into_iter()
      .filter_map(|(key, item)| {
        let ids = self.decode_set(&key, &item)?;
        Some((key, ids))
      })
      .collect()
  }

  fn set(&self, key: &str, value: Option<&[u8]>) {
    match value {
      Some(bytes) => {
        trace!(key = %key, len = bytes.len(), "set");
        self.write("set", key, &Item::scalar(bytes.to_vec()));
      }
      None => {
        warn!(key = %key, "set called with no value, deleting instead");
        self.delete(key);
      }
    }
  }

  fn set_list(&self, key: &str, ids: &[i64]) {
    trace!(key = %key, len = ids.len(), "set_list");
    self.write("set_list", key, &Item::list(ids));
  }

  fn init_list(&self, key: &str, ids: &[i64]) -> bool {
    trace!(key = %key, len = ids.len(), "init_list");
    let created = self
      .degrade("init_list", key, self.backend.add(key, &Item::list(ids), self.expiration))
      .unwrap_or(false);
    if created {
      Metrics::bump(&self.metrics.writes);
    }
    created
  }

  fn set_set(&self, key: &str, ids: &HashSet<i64>) {
    trace!(key = %key, len = ids.len(), "set_set");
    self.write("set_set", key, &Item::set(ids));
  }

  fn set_list_cas(&self, key: &str, ids: &[i64]) -> Option<Vec<i64>> {
    trace!(key = %key, len = ids.len(), "set_list_cas");
    let replacement = Item::list(ids);
    let mutated = self.degrade(
      "set_list_cas",
      key,
      self
        .mutator()
        .mutate(key, Some(&replacement), |_| Ok(replacement.clone())),
    )?;
    Metrics::bump(&self.metrics.writes);

    let previous = match mutated.and_then(|m| m.previous) {
      Some(item) => item,
      None => return Some(Vec::new()),
    };
    match current_list(&previous) {
      Ok(ids) => Some(ids),
      Err(err) => {
        Metrics::bump(&self.metrics.decode_failures);
        error!(key = %key, error = %err, "swapped out a value that was not a list");
        Some(Vec::new())
      }
    }
  }

  fn delete(&self, key: &str) {
    trace!(key = %key, "delete");
    if self.degrade("delete", key, self.backend.delete(key)).is_some() {
      Metrics::bump(&self.metrics.deletes);
    }
  }

  fn delete_list(&self, key: &str) {
    // The list marker lives in the item's flags and goes with the key.
    self.delete(key);
  }

  fn add_to_top_of_list(&self, key: &str, ids: &[i64]) {
    trace!(key = %key, len = ids.len(), "add_to_top_of_list");
    if ids.is_empty() {
      return;
    }
    let max = self.max_list_size;
    let result = self.mutator().mutate(key, None, |current| {
      let existing = current_list(current)?;
      let mut next = Vec::with_capacity((ids.len() + existing.len()).min(max));
      next.extend_from_slice(ids);
      next.extend(existing);
      next.truncate(max);
      Ok(Item::list(&next))
    });
    match self.degrade("add_to_top_of_list", key, result) {
      Some(Some(_)) => Metrics::bump(&self.metrics.writes),
      Some(None) => trace!(key = %key, "list not cached, prepend skipped"),
      None => {}
    }
  }

  fn remove_from_list(&self, key: &str, id: i64) {
    trace!(key = %key, id, "remove_from_list");
    let result = self.mutator().mutate(key, None, |current| {
      let mut list = current_list(current)?;
      if let Some(index) = list.iter().position(|&x| x == id) {
        list.remove(index);
      }
      Ok(Item::list(&list))
    });
    if let Some(Some(_)) = self.degrade("remove_from_list", key, result) {
      Metrics::bump(&self.metrics.writes);
    }
  }

  fn remove_from_lists(&self, keys: &[String], ids: &[i64]) {
    trace!(keys = keys.len(), ids = ids.len(), "remove_from_lists");
    if ids.is_empty() {
      return;
    }
    let doomed: HashSet<i64> = ids.iter().copied().collect();
    for key in keys {
      let result = self.mutator().mutate(key, None, |current| {
        let mut list = current_list(current)?;
        list.retain(|id| !doomed.contains(id));
        Ok(Item::list(&list))
      });
      if let Some(Some(_)) = self.degrade("remove_from_lists", key, result) {
        Metrics::bump(&self.metrics.writes);
      }
    }
  }

  fn add_to_set(&self, key: &str, id: i64) -> Option<HashSet<i64>> {
    trace!(key = %key, id, "add_to_set");
    let result = self.mutator().mutate(key, None, |current| {
      let mut set = current_set(current)?;
      set.insert(id);
      Ok(Item::set(&set))
    });
    let mutated = self.degrade("add_to_set", key, result).flatten()?;
    Metrics::bump(&self.metrics.writes);
    self.decode_set(key, &mutated.stored)
  }

  fn remove_from_set(&self, key: &str, id: i64) {
    trace!(key = %key, id, "remove_from_set");
    let result = self.mutator().mutate(key, None, |current| {
      let mut set = current_set(current)?;
      set.remove(&id);
      Ok(Item::set(&set))
    });
    if let Some(Some(_)) = self.degrade("remove_from_set", key, result) {
      Metrics::bump(&self.metrics.writes);
    }
  }

  fn clear(&self) {
    warn!("clearing every cached key");
    let _ = self.degrade("clear", "*", self.backend.flush());
  }

  fn max_list_size(&self) -> usize {
    self.max_list_size
  }
}
