use crate::backend::{CasBackend, CasOutcome, CasToken};
use crate::codec::Item;
use crate::error::Result;

use core::fmt;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

/// A helper function to hash a key using a `BuildHasher`.
#[inline]
fn hash_key<K: Hash + ?Sized, H: BuildHasher>(hasher: &H, key: &K) -> u64 {
  let mut state = hasher.build_hasher();
  key.hash(&mut state);
  state.finish()
}

struct Slot {
  item: Item,
  cas: u64,
  expires_at: Option<Instant>,
}

impl Slot {
  #[inline]
  fn is_live(&self, now: Instant) -> bool {
    self.expires_at.map_or(true, |at| now < at)
  }
}

type Shard<H> = RwLock<HashMap<String, Slot, H>>;

/// An in-process [`CasBackend`] partitioned into independently locked shards.
///
/// CAS tokens come from one process-wide counter, so a token can never be
/// reused for a different write. Expired items are dropped lazily on access.
/// A zero expiration means the item never expires.
pub struct MemoryBackend<H = ahash::RandomState> {
  shards: Box<[CachePadded<Shard<H>>]>,
  hasher: H,
  next_cas: CachePadded<AtomicU64>,
}

impl<H> fmt::Debug for MemoryBackend<H> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemoryBackend")
      .field("num_shards", &self.shards.len())
      .finish()
  }
}

impl MemoryBackend {
  pub fn new(num_shards: usize) -> Self {
    Self::with_hasher(num_shards, ahash::RandomState::new())
  }
}

impl<H> MemoryBackend<H>
where
  H: BuildHasher + Clone,
{
  /// Creates a backend with `num_shards` shards. Callers validate that it is
  /// non-zero (see `StoreBuilder`).
  pub fn with_hasher(num_shards: usize, hasher: H) -> Self {
    let mut shards = Vec::with_capacity(num_shards.max(1));
    for _ in 0..num_shards.max(1) {
      shards.push(CachePadded::new(RwLock::new(HashMap::with_hasher(
        hasher.clone(),
      ))));
    }

    Self {
      shards: shards.into_boxed_slice(),
      hasher,
      next_cas: CachePadded::new(AtomicU64::new(1)),
    }
  }

  #[inline]
  fn shard(&self, key: &str) -> &Shard<H> {
    let index = hash_key(&self.hasher, key) as usize % self.shards.len();
    &self.shards[index]
  }

  #[inline]
  fn issue_cas(&self) -> u64 {
    self.next_cas.fetch_add(1, Ordering::Relaxed)
  }

  fn slot(&self, item: &Item, expiration: Duration) -> Slot {
    Slot {
      item: item.clone(),
      cas: self.issue_cas(),
      expires_at: if expiration.is_zero() {
        None
      } else {
        Instant::now().checked_add(expiration)
      },
    }
  }

  /// Number of live items across all shards.
  pub fn len(&self) -> usize {
    let now = Instant::now();
    self
      .shards
      .iter()
      .map(|shard| shard.read().values().filter(|s| s.is_live(now)).count())
      .sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl<H> CasBackend for MemoryBackend<H>
where
  H: BuildHasher + Clone + Send + Sync,
{
  fn get(&self, key: &str) -> Result<Option<Item>> {
    Ok(self.gets(key)?.map(|(item, _)| item))
  }

  fn gets(&self, key: &str) -> Result<Option<(Item, CasToken)>> {
    let now = Instant::now();
    let shard = self.shard(key);
    {
      let guard = shard.read();
      match guard.get(key) {
        None => return Ok(None),
        Some(slot) if slot.is_live(now) => {
          return Ok(Some((slot.item.clone(), CasToken(slot.cas))));
        }
        Some(_) => {}
      }
    }
    let mut guard = shard.write();
    if guard.get(key).map_or(false, |slot| !slot.is_live(now)) {
      guard.remove(key);
    }
    Ok(None)
  }

  fn multi_get(&self, keys: &[&str]) -> Result<HashMap<String, Item>> {
    let mut found = HashMap::with_capacity(keys.len());
    for key in keys {
      if let Some(item) = self.get(key)? {
        found.insert((*key).to_string(), item);
      }
    }
    Ok(found)
  }

  fn set(&self, key: &str, item: &Item, expiration: Duration) -> Result<()> {
    let slot = self.slot(item, expiration);
    self.shard(key).write().insert(key.to_string(), slot);
    Ok(())
  }

  fn add(&self, key: &str, item: &Item, expiration: Duration) -> Result<bool> {
    let now = Instant::now();
    let mut guard = self.shard(key).write();
    if guard.get(key).map_or(false, |slot| slot.is_live(now)) {
      return Ok(false);
    }
    let slot = self.slot(item, expiration);
    guard.insert(key.to_string(), slot);
    Ok(true)
  }

  fn cas(&self, key: &str, item: &Item, token: CasToken, expiration: Duration) -> Result<CasOutcome> {
    let now = Instant::now();
    let mut guard = self.shard(key).write();
    match guard.get(key) {
      Some(slot) if slot.is_live(now) => {
        if slot.cas != token.0 {
          return Ok(CasOutcome::Exists);
        }
      }
      _ => return Ok(CasOutcome::NotFound),
    }
    let slot = self.slot(item, expiration);
    guard.insert(key.to_string(), slot);
    Ok(CasOutcome::Stored)
  }

  fn delete(&self, key: &str) -> Result<bool> {
    let now = Instant::now();
    let removed = self.shard(key).write().remove(key);
    Ok(removed.map_or(false, |slot| slot.is_live(now)))
  }

  fn flush(&self) -> Result<()> {
    for shard in self.shards.iter() {
      shard.write().clear();
    }
    Ok(())
  }
}
