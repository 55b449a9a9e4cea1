//! Bulk reads that report what they could not find.
//!
//! A fetcher resolves as much of a batch as the store holds and hands back
//! the rest as a residual request for the authoritative source. The caller
//! writes the source's answer back with a [`RefreshStrategy`].
//!
//! [`RefreshStrategy`]: crate::refresh::RefreshStrategy

use crate::codec::ValueCodec;
use crate::collider::ListCollider;
use crate::error::Result;
use crate::keys::{KeyKind, KeySuffix};
use crate::store::KeyValueStore;

use core::fmt;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{error, trace, warn};

/// Data found so far plus whatever is still missing.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialMapperResponse<Req, Resp> {
  pub found: Resp,
  pub residual: Option<Req>,
}

impl<Req, Resp> PartialMapperResponse<Req, Resp> {
  pub fn complete(found: Resp) -> Self {
    Self {
      found,
      residual: None,
    }
  }

  pub fn partial(found: Resp, residual: Req) -> Self {
    Self {
      found,
      residual: Some(residual),
    }
  }

  /// True when nothing is left to fetch from the authoritative source.
  pub fn is_complete(&self) -> bool {
    self.residual.is_none()
  }
}

/// How one kind of entry is bulk-read from and written to a store.
pub trait EntryShape: Send + Sync {
  type Value: Clone;

  /// Reads `keys`. Keys that are absent or undecodable are left out.
  fn read_many(&self, store: &dyn KeyValueStore, keys: &[String]) -> HashMap<String, Self::Value>;

  fn write(&self, store: &dyn KeyValueStore, key: &str, value: &Self::Value);
}

/// Scalar entries encoded with a [`ValueCodec`].
#[derive(Debug, Clone, Default)]
pub struct ScalarShape<C> {
  codec: C,
}

impl<C> ScalarShape<C> {
  pub fn new(codec: C) -> Self {
    Self { codec }
  }
}

impl<C> EntryShape for ScalarShape<C>
where
  C: ValueCodec,
  C::Value: Clone,
{
  type Value = C::Value;

  fn read_many(&self, store: &dyn KeyValueStore, keys: &[String]) -> HashMap<String, C::Value> {
    store
      .multi_get(keys)
      .into_iter()
      .filter_map(|(key, bytes)| match self.codec.decode(&bytes) {
        Ok(value) => Some((key, value)),
        Err(err) => {
          warn!(key = %key, error = %err, "undecodable scalar, treating as missing");
          None
        }
      })
      .collect()
  }

  fn write(&self, store: &dyn KeyValueStore, key: &str, value: &C::Value) {
    match self.codec.encode(value) {
      Ok(bytes) => store.set(key, Some(bytes.as_slice())),
      Err(err) => error!(key = %key, error = %err, "could not encode value for cache"),
    }
  }
}

/// Ordered id lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListShape;

impl EntryShape for ListShape {
  type Value = Vec<i64>;

  fn read_many(&self, store: &dyn KeyValueStore, keys: &[String]) -> HashMap<String, Vec<i64>> {
    store.multi_get_list(keys)
  }

  fn write(&self, store: &dyn KeyValueStore, key: &str, value: &Vec<i64>) {
    store.set_list(key, value)
  }
}

/// Unordered id sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetShape;

impl EntryShape for SetShape {
  type Value = HashSet<i64>;

  fn read_many(&self, store: &dyn KeyValueStore, keys: &[String]) -> HashMap<String, HashSet<i64>> {
    store.multi_get_set(keys)
  }

  fn write(&self, store: &dyn KeyValueStore, key: &str, value: &HashSet<i64>) {
    store.set_set(key, value)
  }
}

/// Found `(suffix, value)` pairs, and the suffixes still to fetch.
pub type FetchResponse<K, V> = PartialMapperResponse<Vec<K>, Vec<(K, V)>>;

/// Resolves a batch of suffixes of one kind in a single bulk read.
pub struct PartialResultFetcher<S> {
  store: Arc<dyn KeyValueStore>,
  kind: KeyKind,
  shape: S,
}

impl<S> fmt::Debug for PartialResultFetcher<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PartialResultFetcher")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

impl<S: EntryShape> PartialResultFetcher<S> {
  pub fn new(store: Arc<dyn KeyValueStore>, kind: KeyKind, shape: S) -> Self {
    Self { store, kind, shape }
  }

  pub fn kind(&self) -> KeyKind {
    self.kind
  }

  /// Looks up every suffix. Found pairs and missing suffixes both keep the
  /// request order, and every requested suffix lands in exactly one of them.
  pub fn fetch<K>(&self, suffixes: &[K]) -> FetchResponse<K, S::Value>
  where
    K: KeySuffix + Clone,
  {
    let keys: Vec<String> = suffixes.iter().map(|s| self.kind.key(s)).collect();
    let hits = self.shape.read_many(self.store.as_ref(), &keys);
    trace!(kind = %self.kind, requested = keys.len(), found = hits.len(), "partial fetch");

    let mut found = Vec::with_capacity(hits.len());
    let mut missing = Vec::new();
    for (suffix, key) in suffixes.iter().zip(&keys) {
      match hits.get(key) {
        Some(value) => found.push((suffix.clone(), value.clone())),
        None => missing.push(suffix.clone()),
      }
    }

    if missing.is_empty() {
      PartialMapperResponse::complete(found)
    } else {
      PartialMapperResponse::partial(found, missing)
    }
  }

  /// Looks up a single suffix.
  pub fn fetch_one<K: KeySuffix + ?Sized>(&self, suffix: &K) -> Option<S::Value> {
    let key = self.kind.key(suffix);
    self
      .shape
      .read_many(self.store.as_ref(), std::slice::from_ref(&key))
      .remove(&key)
  }
}

/// One element of a mixed-kind batch, with its kind already resolved.
pub type KindedSuffix<K> = (KeyKind, K);

/// Resolves a batch whose elements name their own kind by tag.
pub struct MixedKindFetcher<S> {
  store: Arc<dyn KeyValueStore>,
  shape: S,
}

impl<S> fmt::Debug for MixedKindFetcher<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MixedKindFetcher").finish_non_exhaustive()
  }
}

impl<S: EntryShape> MixedKindFetcher<S> {
  pub fn new(store: Arc<dyn KeyValueStore>, shape: S) -> Self {
    Self { store, shape }
  }

  /// Resolves `(tag, suffix)` pairs. Any unknown tag fails the whole batch
  /// before the store is touched.
  pub fn fetch<T, K>(
    &self,
    batch: &[(T, K)],
  ) -> Result<PartialMapperResponse<Vec<KindedSuffix<K>>, Vec<(KindedSuffix<K>, S::Value)>>>
  where
    T: AsRef<str>,
    K: KeySuffix + Clone,
  {
    let mut kinded = Vec::with_capacity(batch.len());
    for (tag, suffix) in batch {
      kinded.push((KeyKind::from_tag(tag.as_ref())?, suffix.clone()));
    }

    let keys: Vec<String> = kinded.iter().map(|(kind, s)| kind.key(s)).collect();
    let hits = self.shape.read_many(self.store.as_ref(), &keys);

    let mut found = Vec::with_capacity(hits.len());
    let mut missing = Vec::new();
    for (entry, key) in kinded.into_iter().zip(&keys) {
      match hits.get(key) {
        Some(value) => found.push((entry, value.clone())),
        None => missing.push(entry),
      }
    }

    Ok(if missing.is_empty() {
      PartialMapperResponse::complete(found)
    } else {
      PartialMapperResponse::partial(found, missing)
    })
  }
}

/// Reads several id lists and folds them into one bounded list.
pub struct CollidingListFetcher<C> {
  store: Arc<dyn KeyValueStore>,
  kind: KeyKind,
  collider: C,
  max_results: usize,
}

impl<C> fmt::Debug for CollidingListFetcher<C> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CollidingListFetcher")
      .field("kind", &self.kind)
      .field("max_results", &self.max_results)
      .finish_non_exhaustive()
  }
}

impl<C: ListCollider> CollidingListFetcher<C> {
  pub fn new(store: Arc<dyn KeyValueStore>, kind: KeyKind, collider: C, max_results: usize) -> Self {
    Self {
      store,
      kind,
      collider,
      max_results,
    }
  }

  /// Collides every cached list in request order. Suffixes whose list is not
  /// cached form the residual.
  pub fn fetch<K>(&self, suffixes: &[K]) -> PartialMapperResponse<Vec<K>, Vec<i64>>
  where
    K: KeySuffix + Clone,
  {
    let keys: Vec<String> = suffixes.iter().map(|s| self.kind.key(s)).collect();
    let mut lists = self.store.multi_get_list(&keys);

    let mut merged: Option<Vec<i64>> = None;
    let mut missing = Vec::new();
    for (suffix, key) in suffixes.iter().zip(&keys) {
      match lists.remove(key) {
        Some(list) => {
          merged = Some(match merged {
            None => list,
            Some(acc) => self.collider.collide(&acc, &list, self.max_results),
          });
        }
        None => missing.push(suffix.clone()),
      }
    }

    let mut found = merged.unwrap_or_default();
    found.truncate(self.max_results);
    if missing.is_empty() {
      PartialMapperResponse::complete(found)
    } else {
      PartialMapperResponse::partial(found, missing)
    }
  }
}
