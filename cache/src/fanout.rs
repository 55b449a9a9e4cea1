//! Buffered fan-out of new activity ids into denormalized stream lists.
//!
//! Posting only prepends to a shared buffer. A periodic drain swaps the
//! buffer for an empty list and prepends each drained id to every stream
//! list it belongs in, one batch per list.

use crate::keys::KeyKind;
use crate::store::KeyValueStore;

use core::fmt;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

/// What one drain did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
  /// Ids taken out of the buffer, duplicates included.
  pub drained: usize,
  /// Distinct stream lists prepended to.
  pub lists_touched: usize,
}

/// The activity buffer living under the global buffered-activities key.
pub struct ActivityBuffer {
  store: Arc<dyn KeyValueStore>,
  key: String,
}

impl fmt::Debug for ActivityBuffer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ActivityBuffer")
      .field("key", &self.key)
      .finish_non_exhaustive()
  }
}

impl ActivityBuffer {
  pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
    Self {
      store,
      key: KeyKind::BufferedActivities.global_key(),
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  /// Creates the empty buffer if it is not cached yet, leaving an existing
  /// one untouched. Meant for startup: pushes are dropped until the buffer
  /// exists. Returns `true` when this call created it.
  pub fn ensure(&self) -> bool {
    self.store.init_list(&self.key, &[])
  }

  /// Queues a newly posted activity for fan-out.
  pub fn push(&self, activity_id: i64) {
    self.store.add_to_top_of_list(&self.key, &[activity_id]);
  }

  /// Empties the buffer and prepends each id to the lists `route` names for
  /// it. Ids keep their buffer order (newest first) within every list.
  ///
  /// Returns `None` when the buffer could not be swapped out.
  pub fn drain<F>(&self, route: F) -> Option<DrainReport>
  where
    F: Fn(i64) -> Vec<String>,
  {
    let ids = self.store.set_list_cas(&self.key, &[])?;

    let mut order: Vec<String> = Vec::new();
    let mut by_list: HashMap<String, Vec<i64>> = HashMap::new();
    for &id in &ids {
      for list_key in route(id) {
        let batch = by_list.entry(list_key.clone()).or_insert_with(|| {
          order.push(list_key);
          Vec::new()
        });
        batch.push(id);
      }
    }

    for list_key in &order {
      if let Some(batch) = by_list.get(list_key) {
        debug!(key = %list_key, count = batch.len(), "fanning out buffered ids");
        self.store.add_to_top_of_list(list_key, batch);
      }
    }

    let report = DrainReport {
      drained: ids.len(),
      lists_touched: order.len(),
    };
    info!(
      drained = report.drained,
      lists = report.lists_touched,
      "drained activity buffer"
    );
    Some(report)
  }

  /// Removes one activity id from every list it may have been fanned out to.
  pub fn purge(&self, activity_id: i64, list_keys: &[String]) {
    self.store.remove_from_lists(list_keys, &[activity_id]);
  }
}
