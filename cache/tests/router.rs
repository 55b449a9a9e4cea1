mod common;

use common::{as_dyn, shared_store};

use pretty_assertions::assert_eq;
use std::sync::Arc;
use stream_cache::{BuildError, KeyValueStore, MemoryStore, ReplicatedStore, RoundRobin, Rotator};

fn replicas(n: usize) -> Vec<Arc<MemoryStore>> {
  (0..n).map(|_| shared_store(100)).collect()
}

fn router_over(replicas: &[Arc<MemoryStore>]) -> ReplicatedStore {
  ReplicatedStore::round_robin(replicas.iter().map(as_dyn).collect()).unwrap()
}

#[test]
fn test_round_robin_cycles_and_wraps() {
  let rr = RoundRobin::new(vec!["a", "b", "c"]).unwrap();
  let picked: Vec<&str> = (0..7).map(|_| *rr.next()).collect();
  assert_eq!(picked, vec!["a", "b", "c", "a", "b", "c", "a"]);
  assert_eq!(rr.len(), 3);
}

#[test]
fn test_round_robin_rejects_empty() {
  assert_eq!(RoundRobin::<u8>::new(Vec::new()).unwrap_err(), BuildError::NoStores);
  assert!(ReplicatedStore::round_robin(Vec::new()).is_err());
}

#[test]
fn test_writes_rotate_across_replicas() {
  let replicas = replicas(3);
  let router = router_over(&replicas);

  for i in 0..6 {
    router.set(&format!("Per:{}", i), Some(&b"x"[..]));
  }

  for (index, replica) in replicas.iter().enumerate() {
    let held: Vec<i64> = (0..6)
      .filter(|i| replica.get(&format!("Per:{}", i)).is_some())
      .collect();
    assert_eq!(held, vec![index as i64, index as i64 + 3]);
  }
}

#[test]
fn test_reads_rotate_independently_of_writes() {
  let replicas = replicas(2);
  replicas[0].set("Per:1", Some(&b"zero"[..]));
  replicas[1].set("Per:1", Some(&b"one"[..]));
  let router = router_over(&replicas);

  // Writes do not advance the read rotation.
  router.set("Per:2", Some(&b"w"[..]));
  router.set("Per:3", Some(&b"w"[..]));
  router.set("Per:4", Some(&b"w"[..]));

  assert_eq!(router.get("Per:1"), Some(b"zero".to_vec()));
  assert_eq!(router.get("Per:1"), Some(b"one".to_vec()));
  assert_eq!(router.get("Per:1"), Some(b"zero".to_vec()));
}

#[test]
fn test_list_mutations_go_through_write_rotation() {
  let replicas = replicas(2);
  replicas[0].set_list("CmpFwg:1", &[1]);
  replicas[1].set_list("CmpFwg:1", &[1]);
  let router = router_over(&replicas);

  router.add_to_top_of_list("CmpFwg:1", &[2]);
  router.add_to_top_of_list("CmpFwg:1", &[3]);
  router.add_to_top_of_list("CmpFwg:1", &[4]);

  assert_eq!(replicas[0].get_list("CmpFwg:1"), Some(vec![4, 2, 1]));
  assert_eq!(replicas[1].get_list("CmpFwg:1"), Some(vec![3, 1]));
}

#[test]
fn test_clear_follows_read_rotation() {
  let replicas = replicas(2);
  replicas[0].set("a", Some(&b"1"[..]));
  replicas[1].set("a", Some(&b"1"[..]));
  let router = router_over(&replicas);

  router.clear();
  assert_eq!(replicas[0].get("a"), None);
  assert_eq!(replicas[1].get("a"), Some(b"1".to_vec()));
}

#[test]
fn test_router_is_a_store() {
  let replicas = replicas(1);
  let router: Arc<dyn KeyValueStore> = Arc::new(router_over(&replicas));
  router.set_list("Fwr:1", &[2, 1]);
  assert_eq!(router.set_list_cas("Fwr:1", &[]), Some(vec![2, 1]));
  assert_eq!(router.max_list_size(), 100);
}

#[test]
fn test_list_bound_does_not_advance_reads() {
  let replicas = replicas(2);
  replicas[0].set("Per:1", Some(&b"zero"[..]));
  replicas[1].set("Per:1", Some(&b"one"[..]));
  let router = router_over(&replicas);

  for _ in 0..3 {
    assert_eq!(router.max_list_size(), 100);
  }
  assert_eq!(router.get("Per:1"), Some(b"zero".to_vec()));
  assert_eq!(router.get("Per:1"), Some(b"one".to_vec()));
}

#[test]
fn test_init_list_goes_through_write_rotation() {
  let replicas = replicas(2);
  let router = router_over(&replicas);

  assert!(router.init_list("BufAct", &[1]));
  assert!(router.init_list("BufAct", &[2]));
  assert!(!router.init_list("BufAct", &[3]));
  assert_eq!(replicas[0].get_list("BufAct"), Some(vec![1]));
  assert_eq!(replicas[1].get_list("BufAct"), Some(vec![2]));
}
