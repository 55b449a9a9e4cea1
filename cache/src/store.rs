use std::collections::{HashMap, HashSet};

/// The typed key-value contract every cache consumer talks to.
///
/// Operations are atomic per key. None of them report failure: a store that
/// cannot be reached, a value that cannot be decoded, or a compare-and-swap
/// that never wins all degrade to "absent" on reads and "no change" on
/// writes, and are logged. The authoritative source stays the fallback.
///
/// An absent key means "not cached yet". A cached empty list or set is a
/// real value and reads back as `Some` of an empty collection.
pub trait KeyValueStore: Send + Sync {
  /// Reads a scalar value.
  fn get(&self, key: &str) -> Option<Vec<u8>>;

  /// Reads an id list, trimming it if it grew past the store's list bound.
  fn get_list(&self, key: &str) -> Option<Vec<i64>> {
    self.get_list_bounded(key, self.max_list_size())
  }

  /// Reads an id list. A stored list longer than `max` is cut down to its
  /// first `max - 1` ids, written back, and the cut list is returned.
  fn get_list_bounded(&self, key: &str, max: usize) -> Option<Vec<i64>>;

  fn get_set(&self, key: &str) -> Option<HashSet<i64>>;

  /// Bulk scalar read. Only present scalar keys appear in the result; list
  /// and set keys must go through the typed bulk reads.
  fn multi_get(&self, keys: &[String]) -> HashMap<String, Vec<u8>>;

  /// Bulk list read. Undecodable keys are left out like absent ones.
  fn multi_get_list(&self, keys: &[String]) -> HashMap<String, Vec<i64>>;

  fn multi_get_set(&self, keys: &[String]) -> HashMap<String, HashSet<i64>>;

  /// Writes a scalar. `None` deletes the key instead of caching a null.
  fn set(&self, key: &str, value: Option<&[u8]>);

  /// Overwrites an id list unconditionally.
  fn set_list(&self, key: &str, ids: &[i64]);

  /// Stores `ids` only if nothing is cached under `key`. Returns `true` when
  /// this call created the list.
  fn init_list(&self, key: &str, ids: &[i64]) -> bool;

  fn set_set(&self, key: &str, ids: &HashSet<i64>);

  /// Swaps in `ids` and returns what was stored immediately before, verbatim.
  ///
  /// An absent key yields an empty previous list (and `ids` is stored).
  /// `None` means the store could not be reached and nothing changed.
  fn set_list_cas(&self, key: &str, ids: &[i64]) -> Option<Vec<i64>>;

  fn delete(&self, key: &str);

  /// Deletes a list key, together with the marker that gave it list
  /// semantics, so a later scalar `set` reads back cleanly.
  fn delete_list(&self, key: &str);

  /// Prepends `ids` (in the given order) to an existing list and drops tail
  /// ids past the list bound. Never creates the list.
  fn add_to_top_of_list(&self, key: &str, ids: &[i64]);

  /// Removes the first occurrence of `id` from one list. Later duplicates
  /// stay.
  fn remove_from_list(&self, key: &str, id: i64);

  /// Removes every id in `ids` from every list in `keys`. Absent keys and
  /// ids not in a given list are skipped without affecting the other keys.
  fn remove_from_lists(&self, keys: &[String], ids: &[i64]);

  /// Adds `id` to an existing set and returns the resulting set, or `None`
  /// if the set is not cached.
  fn add_to_set(&self, key: &str, id: i64) -> Option<HashSet<i64>>;

  /// Removes `id` from an existing set. An absent set stays absent.
  fn remove_from_set(&self, key: &str, id: i64);

  /// Wipes every key. Administrative and test use only.
  fn clear(&self);

  /// The bound applied to lists on prepend and by [`KeyValueStore::get_list`].
  fn max_list_size(&self) -> usize;
}
