mod common;

use common::memory_store;

use pretty_assertions::assert_eq;
use std::collections::HashSet;
use stream_cache::{CasBackend, Item, KeyKind, KeyValueStore};

fn set_of(ids: &[i64]) -> HashSet<i64> {
  ids.iter().copied().collect()
}

#[test]
fn test_set_none_is_delete() {
  let store = memory_store(100);
  store.set("Per:1", Some(&b"ada"[..]));
  assert_eq!(store.get("Per:1"), Some(b"ada".to_vec()));

  store.set("Per:1", None);
  assert_eq!(store.get("Per:1"), None);

  store.set("Per:2", Some(&b"bob"[..]));
  store.delete("Per:2");
  assert_eq!(store.get("Per:2"), None);

  let metrics = store.metrics();
  assert_eq!(metrics.deletes, 2);
}

#[test]
fn test_get_list_trims_to_one_below_max_and_persists() {
  let store = memory_store(100);
  store.set_list("Fwr:7", &[10, 9, 8, 7, 6, 5]);

  let read = store.get_list_bounded("Fwr:7", 4);
  assert_eq!(read, Some(vec![10, 9, 8]));

  // The raw stored value is already the trimmed one.
  let raw = store.backend().get("Fwr:7").unwrap().unwrap();
  assert_eq!(raw, Item::list(&[10, 9, 8]));
  assert_eq!(store.metrics().trims, 1);
}

#[test]
fn test_get_list_within_bound_is_untouched() {
  let store = memory_store(100);
  store.set_list("Fwr:7", &[3, 2, 1]);
  assert_eq!(store.get_list_bounded("Fwr:7", 3), Some(vec![3, 2, 1]));
  assert_eq!(store.metrics().trims, 0);
}

#[test]
fn test_get_list_uses_store_bound_by_default() {
  let store = memory_store(3);
  store.set_list("Fwr:8", &[5, 4, 3, 2]);
  assert_eq!(store.get_list("Fwr:8"), Some(vec![5, 4]));
}

#[test]
fn test_set_list_cas_returns_exact_previous_contents() {
  let store = memory_store(100);
  store.set_list("BufAct", &[5, 3, 3, 1]);

  let drained = store.set_list_cas("BufAct", &[]);
  assert_eq!(drained, Some(vec![5, 3, 3, 1]));
  assert_eq!(store.get_list("BufAct"), Some(vec![]));
}

#[test]
fn test_set_list_cas_on_absent_key_stores_and_returns_empty() {
  let store = memory_store(100);
  assert_eq!(store.set_list_cas("BufAct", &[4, 2]), Some(vec![]));
  assert_eq!(store.get_list("BufAct"), Some(vec![4, 2]));
}

#[test]
fn test_remove_from_lists_is_per_key_independent() {
  let store = memory_store(100);
  store.set_list("A", &[7, 8]);
  store.set_list("B", &[9]);

  store.remove_from_lists(&["A".to_string(), "B".to_string(), "C".to_string()], &[7]);

  assert_eq!(store.get_list("A"), Some(vec![8]));
  assert_eq!(store.get_list("B"), Some(vec![9]));
  assert_eq!(store.get_list("C"), None);
}

#[test]
fn test_remove_from_list_removes_first_occurrence_only() {
  let store = memory_store(100);
  store.set_list("A", &[7, 3, 7, 1]);
  store.remove_from_list("A", 7);
  assert_eq!(store.get_list("A"), Some(vec![3, 7, 1]));

  store.remove_from_list("A", 42);
  assert_eq!(store.get_list("A"), Some(vec![3, 7, 1]));
  store.remove_from_list("missing", 7);
  assert_eq!(store.get_list("missing"), None);
}

#[test]
fn test_remove_from_lists_removes_every_occurrence() {
  let store = memory_store(100);
  store.set_list("A", &[7, 3, 7, 1]);
  store.remove_from_lists(&["A".to_string()], &[7]);
  assert_eq!(store.get_list("A"), Some(vec![3, 1]));
}

#[test]
fn test_add_to_top_of_list_never_creates() {
  let store = memory_store(100);
  store.add_to_top_of_list("CmpFwg:1", &[42]);
  assert_eq!(store.get_list("CmpFwg:1"), None);
  assert!(store.backend().get("CmpFwg:1").unwrap().is_none());
}

#[test]
fn test_add_to_top_of_list_prepends_in_order_and_bounds_tail() {
  let store = memory_store(5);
  store.set_list("CmpFwg:1", &[4, 3, 2, 1]);

  store.add_to_top_of_list("CmpFwg:1", &[6, 5]);
  assert_eq!(
    store.backend().get("CmpFwg:1").unwrap().unwrap(),
    Item::list(&[6, 5, 4, 3, 2])
  );
}

#[test]
fn test_add_to_top_of_empty_list() {
  let store = memory_store(5);
  store.set_list("CmpFwg:2", &[]);
  store.add_to_top_of_list("CmpFwg:2", &[1]);
  assert_eq!(store.get_list("CmpFwg:2"), Some(vec![1]));
}

#[test]
fn test_cached_empty_is_not_absent() {
  let store = memory_store(100);
  let key = KeyKind::FollowersByPerson.key(&42i64);

  assert_eq!(store.get_set(&key), None);
  store.set_set(&key, &HashSet::new());
  assert_eq!(store.get_set(&key), Some(HashSet::new()));

  store.set_list("Fwr:list", &[]);
  assert_eq!(store.get_list("Fwr:list"), Some(vec![]));
}

#[test]
fn test_add_to_set_merges_and_does_not_create() {
  let store = memory_store(100);
  assert_eq!(store.add_to_set("PrvGrpCrd:1", 5), None);
  assert_eq!(store.get_set("PrvGrpCrd:1"), None);

  store.set_set("PrvGrpCrd:1", &set_of(&[1, 2]));
  let result = store.add_to_set("PrvGrpCrd:1", 2);
  assert_eq!(result, Some(set_of(&[1, 2])));
  let result = store.add_to_set("PrvGrpCrd:1", 3);
  assert_eq!(result, Some(set_of(&[1, 2, 3])));
}

#[test]
fn test_remove_from_set() {
  let store = memory_store(100);
  store.remove_from_set("PrvGrpCrd:9", 1);
  assert_eq!(store.get_set("PrvGrpCrd:9"), None);

  store.set_set("PrvGrpCrd:9", &set_of(&[1, 2]));
  store.remove_from_set("PrvGrpCrd:9", 1);
  store.remove_from_set("PrvGrpCrd:9", 77);
  assert_eq!(store.get_set("PrvGrpCrd:9"), Some(set_of(&[2])));
}

#[test]
fn test_delete_list_allows_scalar_reuse() {
  let store = memory_store(100);
  store.set_list("Per:5", &[1, 2, 3]);
  // Reading a list as a scalar is a miss, not garbage.
  assert_eq!(store.get("Per:5"), None);

  store.delete_list("Per:5");
  store.set("Per:5", Some(&b"x"[..]));
  assert_eq!(store.get("Per:5"), Some(b"x".to_vec()));
  assert_eq!(store.get_list("Per:5"), None);
}

#[test]
fn test_multi_get_returns_only_present_scalars() {
  let store = memory_store(100);
  store.set("Act:1", Some(&b"one"[..]));
  store.set("Act:2", Some(&b"two"[..]));
  store.set_list("Act:3", &[1]);

  let keys: Vec<String> = (1..=4).map(|i| format!("Act:{}", i)).collect();
  let found = store.multi_get(&keys);
  assert_eq!(found.len(), 2);
  assert_eq!(found["Act:1"], b"one".to_vec());
  assert_eq!(found["Act:2"], b"two".to_vec());
}

#[test]
fn test_multi_get_list_skips_scalars_and_missing() {
  let store = memory_store(100);
  store.set_list("Fwr:1", &[3, 2]);
  store.set_list("Fwr:2", &[]);
  store.set("Fwr:3", Some(&b"not a list"[..]));

  let keys: Vec<String> = (1..=4).map(|i| format!("Fwr:{}", i)).collect();
  let found = store.multi_get_list(&keys);
  assert_eq!(found.len(), 2);
  assert_eq!(found["Fwr:1"], vec![3, 2]);
  assert_eq!(found["Fwr:2"], Vec::<i64>::new());
  assert_eq!(store.metrics().decode_failures, 1);
}

#[test]
fn test_clear_wipes_everything() {
  let store = memory_store(100);
  store.set("a", Some(&b"1"[..]));
  store.set_list("b", &[1]);
  store.clear();
  assert_eq!(store.get("a"), None);
  assert_eq!(store.get_list("b"), None);
}

#[test]
fn test_metrics_track_hits_and_misses() {
  let store = memory_store(100);
  store.set("a", Some(&b"1"[..]));
  store.get("a");
  store.get("missing");
  store.get_list("missing");

  let metrics = store.metrics();
  assert_eq!(metrics.hits, 1);
  assert_eq!(metrics.misses, 2);
  assert!(metrics.writes >= 1);
}
