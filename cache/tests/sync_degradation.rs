mod common;

use common::{prepend_raw, ContendedBackend, DownBackend, Interleave, InterleavingBackend};

use pretty_assertions::assert_eq;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::sync::Arc;
use stream_cache::{ActivityBuffer, AtomicStore, CasBackend, Item, KeyValueStore, StoreBuilder};

#[test]
fn test_unreachable_store_reads_as_absent_and_never_panics() {
  let store = AtomicStore::new(DownBackend);

  assert_eq!(store.get("Per:1"), None);
  assert_eq!(store.get_list("Fwr:1"), None);
  assert_eq!(store.get_set("PrvGrpCrd:1"), None);
  assert!(store.multi_get(&["Act:1".to_string()]).is_empty());
  assert!(store.multi_get_list(&["Fwr:1".to_string()]).is_empty());

  store.set("Per:1", Some(&b"x"[..]));
  store.set_list("Fwr:1", &[1]);
  store.add_to_top_of_list("Fwr:1", &[2]);
  store.remove_from_lists(&["Fwr:1".to_string()], &[1]);
  store.delete("Per:1");
  store.clear();

  // Unreachable is the one case the drain reports as None.
  assert_eq!(store.set_list_cas("BufAct", &[]), None);
  assert_eq!(store.add_to_set("PrvGrpCrd:1", 1), None);

  let metrics = store.metrics();
  assert!(metrics.store_failures >= 10);
  assert_eq!(metrics.writes, 0);
}

#[test]
fn test_cas_gives_up_after_max_attempts() {
  let backend = ContendedBackend::new();
  backend
    .inner
    .set("CmpFwg:1", &Item::list(&[1]), Duration::ZERO)
    .unwrap();

  let store = StoreBuilder::new()
    .cas_max_attempts(5)
    .build(backend)
    .unwrap();

  store.add_to_top_of_list("CmpFwg:1", &[2]);

  // No visible change, and exactly the allowed number of attempts.
  assert_eq!(store.get_list("CmpFwg:1"), Some(vec![1]));
  assert_eq!(store.backend().cas_calls.load(Ordering::SeqCst), 5);
  let metrics = store.metrics();
  assert_eq!(metrics.cas_failures, 1);
  assert_eq!(metrics.cas_retries, 4);
}

#[test]
fn test_cas_gives_up_after_timeout() {
  let backend = ContendedBackend::new();
  backend
    .inner
    .set("BufAct", &Item::list(&[3, 2]), Duration::ZERO)
    .unwrap();

  let store = StoreBuilder::new()
    .cas_max_attempts(u32::MAX)
    .cas_timeout(Duration::from_millis(20))
    .build(backend)
    .unwrap();

  assert_eq!(store.set_list_cas("BufAct", &[]), None);
  assert_eq!(store.get_list("BufAct"), Some(vec![3, 2]));
  assert_eq!(store.metrics().cas_failures, 1);
}

#[test]
fn test_builder_rejects_invalid_settings() {
  use stream_cache::BuildError;

  assert_eq!(
    StoreBuilder::new().max_list_size(0).build_memory().unwrap_err(),
    BuildError::ZeroMaxListSize
  );
  assert_eq!(
    StoreBuilder::new().shards(0).build_memory().unwrap_err(),
    BuildError::ZeroShards
  );
  assert_eq!(
    StoreBuilder::new().cas_max_attempts(0).build(DownBackend).unwrap_err(),
    BuildError::ZeroCasAttempts
  );
}

#[test]
fn test_trim_on_read_keeps_a_racing_prepend() {
  let backend = InterleavingBackend::new(Interleave::AfterFirstGet, |inner| {
    prepend_raw(inner, "CmpFwg:1", 99)
  });
  backend
    .inner
    .set("CmpFwg:1", &Item::list(&[5, 4, 3, 2, 1]), Duration::ZERO)
    .unwrap();
  let store = AtomicStore::new(backend);

  let read = store.get_list_bounded("CmpFwg:1", 4);

  assert_eq!(read, Some(vec![99, 5, 4]));
  let raw = store.backend().inner.get("CmpFwg:1").unwrap().unwrap();
  assert_eq!(raw, Item::list(&[99, 5, 4]));
  assert_eq!(store.metrics().trims, 1);
}

#[test]
fn test_ensure_keeps_a_buffer_created_concurrently() {
  let backend = InterleavingBackend::new(Interleave::BeforeFirstAdd, |inner| {
    assert!(inner.add("BufAct", &Item::list(&[7]), Duration::ZERO).unwrap());
  });
  let store = Arc::new(AtomicStore::new(backend));
  let buffer = ActivityBuffer::new(Arc::clone(&store) as Arc<dyn KeyValueStore>);

  assert!(!buffer.ensure());
  assert_eq!(store.get_list("BufAct"), Some(vec![7]));
}

#[test]
fn test_init_list_only_creates_absent_lists() {
  let store = AtomicStore::new(stream_cache::MemoryBackend::new(1));
  assert!(store.init_list("Fwr:1", &[3, 2]));
  assert!(!store.init_list("Fwr:1", &[9]));
  assert_eq!(store.get_list("Fwr:1"), Some(vec![3, 2]));

  let down = AtomicStore::new(DownBackend);
  assert!(!down.init_list("Fwr:1", &[]));
}
