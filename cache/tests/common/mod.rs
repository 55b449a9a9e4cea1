#![allow(dead_code)]

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use stream_cache::{
  CacheError, CasBackend, CasOutcome, CasToken, Item, KeyValueStore, MemoryBackend, MemoryStore,
  Result, StoreBuilder,
};

// Helper to build an in-memory store with a given list bound.
pub fn memory_store(max_list_size: usize) -> MemoryStore {
  StoreBuilder::new()
    .shards(4)
    .max_list_size(max_list_size)
    .build_memory()
    .unwrap()
}

pub fn shared_store(max_list_size: usize) -> Arc<MemoryStore> {
  Arc::new(memory_store(max_list_size))
}

pub fn as_dyn(store: &Arc<MemoryStore>) -> Arc<dyn KeyValueStore> {
  Arc::clone(store) as Arc<dyn KeyValueStore>
}

// A backend whose every call fails as if the server were unreachable.
pub struct DownBackend;

fn down<T>() -> Result<T> {
  Err(CacheError::Io(io::Error::new(
    io::ErrorKind::ConnectionRefused,
    "store is down",
  )))
}

impl CasBackend for DownBackend {
  fn get(&self, _key: &str) -> Result<Option<Item>> {
    down()
  }
  fn gets(&self, _key: &str) -> Result<Option<(Item, CasToken)>> {
    down()
  }
  fn multi_get(&self, _keys: &[&str]) -> Result<HashMap<String, Item>> {
    down()
  }
  fn set(&self, _key: &str, _item: &Item, _expiration: Duration) -> Result<()> {
    down()
  }
  fn add(&self, _key: &str, _item: &Item, _expiration: Duration) -> Result<bool> {
    down()
  }
  fn cas(&self, _key: &str, _item: &Item, _token: CasToken, _expiration: Duration) -> Result<CasOutcome> {
    down()
  }
  fn delete(&self, _key: &str) -> Result<bool> {
    down()
  }
  fn flush(&self) -> Result<()> {
    down()
  }
}

// Wraps a memory backend but makes every cas lose the race.
pub struct ContendedBackend {
  pub inner: MemoryBackend,
  pub cas_calls: AtomicUsize,
}

impl ContendedBackend {
  pub fn new() -> Self {
    Self {
      inner: MemoryBackend::new(1),
      cas_calls: AtomicUsize::new(0),
    }
  }
}

impl CasBackend for ContendedBackend {
  fn get(&self, key: &str) -> Result<Option<Item>> {
    self.inner.get(key)
  }
  fn gets(&self, key: &str) -> Result<Option<(Item, CasToken)>> {
    self.inner.gets(key)
  }
  fn multi_get(&self, keys: &[&str]) -> Result<HashMap<String, Item>> {
    self.inner.multi_get(keys)
  }
  fn set(&self, key: &str, item: &Item, expiration: Duration) -> Result<()> {
    self.inner.set(key, item, expiration)
  }
  fn add(&self, key: &str, item: &Item, expiration: Duration) -> Result<bool> {
    self.inner.add(key, item, expiration)
  }
  fn cas(&self, _key: &str, _item: &Item, _token: CasToken, _expiration: Duration) -> Result<CasOutcome> {
    self.cas_calls.fetch_add(1, Ordering::SeqCst);
    Ok(CasOutcome::Exists)
  }
  fn delete(&self, key: &str) -> Result<bool> {
    self.inner.delete(key)
  }
  fn flush(&self) -> Result<()> {
    self.inner.flush()
  }
}

// When another writer's action lands relative to this store's calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interleave {
  AfterFirstGet,
  BeforeFirstAdd,
}

// Wraps a memory backend and runs `action` against it once, at the chosen
// point, as if a second process had written in between.
pub struct InterleavingBackend {
  pub inner: MemoryBackend,
  at: Interleave,
  fired: AtomicBool,
  action: Box<dyn Fn(&MemoryBackend) + Send + Sync>,
}

impl InterleavingBackend {
  pub fn new<F>(at: Interleave, action: F) -> Self
  where
    F: Fn(&MemoryBackend) + Send + Sync + 'static,
  {
    Self {
      inner: MemoryBackend::new(1),
      at,
      fired: AtomicBool::new(false),
      action: Box::new(action),
    }
  }

  fn fire(&self, point: Interleave) {
    if self.at == point && !self.fired.swap(true, Ordering::SeqCst) {
      (self.action)(&self.inner);
    }
  }
}

impl CasBackend for InterleavingBackend {
  fn get(&self, key: &str) -> Result<Option<Item>> {
    let result = self.inner.get(key);
    self.fire(Interleave::AfterFirstGet);
    result
  }
  fn gets(&self, key: &str) -> Result<Option<(Item, CasToken)>> {
    self.inner.gets(key)
  }
  fn multi_get(&self, keys: &[&str]) -> Result<HashMap<String, Item>> {
    self.inner.multi_get(keys)
  }
  fn set(&self, key: &str, item: &Item, expiration: Duration) -> Result<()> {
    self.inner.set(key, item, expiration)
  }
  fn add(&self, key: &str, item: &Item, expiration: Duration) -> Result<bool> {
    self.fire(Interleave::BeforeFirstAdd);
    self.inner.add(key, item, expiration)
  }
  fn cas(&self, key: &str, item: &Item, token: CasToken, expiration: Duration) -> Result<CasOutcome> {
    self.inner.cas(key, item, token, expiration)
  }
  fn delete(&self, key: &str) -> Result<bool> {
    self.inner.delete(key)
  }
  fn flush(&self) -> Result<()> {
    self.inner.flush()
  }
}

// Prepends `id` straight through the backend's own CAS, the way a second
// process would.
pub fn prepend_raw(backend: &MemoryBackend, key: &str, id: i64) {
  let (item, token) = backend.gets(key).unwrap().unwrap();
  let mut ids = stream_cache::codec::decode_ids(&item.bytes).unwrap();
  ids.insert(0, id);
  let outcome = backend.cas(key, &Item::list(&ids), token, Duration::ZERO).unwrap();
  assert_eq!(outcome, CasOutcome::Stored);
}
