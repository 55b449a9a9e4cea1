//! Write-back of authoritative results after a cache miss.
//!
//! Every strategy only overwrites, so refreshing twice with the same
//! arguments leaves the store exactly as refreshing once.

use crate::error::{CacheError, Result};
use crate::keys::{KeyKind, KeySuffix};
use crate::partial::EntryShape;
use crate::store::KeyValueStore;

use core::fmt;
use std::sync::Arc;

use tracing::{error, trace};

/// Populates the cache from `(request, authoritative result)`.
///
/// Errors are reserved for malformed calls; store trouble is absorbed by the
/// store itself.
pub trait RefreshStrategy<Req: ?Sized, Resp: ?Sized>: Send + Sync {
  fn refresh(&self, request: &Req, response: &Resp) -> Result<()>;
}

/// Writes one value under the key of one suffix.
pub struct ScalarRefresh<S> {
  store: Arc<dyn KeyValueStore>,
  kind: KeyKind,
  shape: S,
}

impl<S> fmt::Debug for ScalarRefresh<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ScalarRefresh")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

impl<S: EntryShape> ScalarRefresh<S> {
  pub fn new(store: Arc<dyn KeyValueStore>, kind: KeyKind, shape: S) -> Self {
    Self { store, kind, shape }
  }
}

impl<S, K> RefreshStrategy<K, S::Value> for ScalarRefresh<S>
where
  S: EntryShape,
  K: KeySuffix + ?Sized,
{
  fn refresh(&self, request: &K, response: &S::Value) -> Result<()> {
    let key = self.kind.key(request);
    trace!(key = %key, "refresh");
    self.shape.write(self.store.as_ref(), &key, response);
    Ok(())
  }
}

/// Writes `response[i]` under the key of `request[i]`.
///
/// Callers must keep the two sides aligned, using placeholder values (for
/// instance an empty list) for entries the source had nothing for. Slices of
/// different lengths are rejected before anything is written.
pub struct KeyedRefresh<S> {
  store: Arc<dyn KeyValueStore>,
  kind: KeyKind,
  shape: S,
}

impl<S> fmt::Debug for KeyedRefresh<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("KeyedRefresh")
      .field("kind", &self.kind)
      .finish_non_exhaustive()
  }
}

impl<S: EntryShape> KeyedRefresh<S> {
  pub fn new(store: Arc<dyn KeyValueStore>, kind: KeyKind, shape: S) -> Self {
    Self { store, kind, shape }
  }

  fn write_all<'a, K, I>(&self, pairs: I)
  where
    K: KeySuffix + 'a,
    S::Value: 'a,
    I: IntoIterator<Item = (&'a K, &'a S::Value)>,
  {
    for (suffix, value) in pairs {
      let key = self.kind.key(suffix);
      self.shape.write(self.store.as_ref(), &key, value);
    }
  }
}

impl<S, K> RefreshStrategy<[K], [S::Value]> for KeyedRefresh<S>
where
  S: EntryShape,
  K: KeySuffix,
{
  fn refresh(&self, request: &[K], response: &[S::Value]) -> Result<()> {
    if request.len() != response.len() {
      error!(
        kind = %self.kind,
        requests = request.len(),
        results = response.len(),
        "keyed refresh with misaligned request and response"
      );
      return Err(CacheError::PositionalMismatch {
        requests: request.len(),
        results: response.len(),
      });
    }
    trace!(kind = %self.kind, count = request.len(), "keyed refresh");
    self.write_all(request.iter().zip(response));
    Ok(())
  }
}

/// The form fetchers and chained mappers produce: each value already carries
/// its suffix, so the request only scopes the call.
impl<S, K> RefreshStrategy<Vec<K>, Vec<(K, S::Value)>> for KeyedRefresh<S>
where
  S: EntryShape,
  K: KeySuffix,
{
  fn refresh(&self, _request: &Vec<K>, response: &Vec<(K, S::Value)>) -> Result<()> {
    trace!(kind = %self.kind, count = response.len(), "keyed refresh");
    self.write_all(response.iter().map(|(k, v)| (k, v)));
    Ok(())
  }
}

/// Runs several strategies in order.
///
/// A failing child does not stop the ones after it; the first error is
/// returned once all of them have run.
pub struct MultiRefresh<Req: ?Sized, Resp: ?Sized> {
  children: Vec<Box<dyn RefreshStrategy<Req, Resp>>>,
}

impl<Req: ?Sized, Resp: ?Sized> fmt::Debug for MultiRefresh<Req, Resp> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MultiRefresh")
      .field("children", &self.children.len())
      .finish()
  }
}

impl<Req: ?Sized, Resp: ?Sized> Default for MultiRefresh<Req, Resp> {
  fn default() -> Self {
    Self {
      children: Vec::new(),
    }
  }
}

impl<Req: ?Sized, Resp: ?Sized> MultiRefresh<Req, Resp> {
  pub fn new(children: Vec<Box<dyn RefreshStrategy<Req, Resp>>>) -> Self {
    Self { children }
  }

  pub fn with<R>(mut self, child: R) -> Self
  where
    R: RefreshStrategy<Req, Resp> + 'static,
  {
    self.children.push(Box::new(child));
    self
  }
}

impl<Req: ?Sized, Resp: ?Sized> RefreshStrategy<Req, Resp> for MultiRefresh<Req, Resp> {
  fn refresh(&self, request: &Req, response: &Resp) -> Result<()> {
    let mut first_error = None;
    for (index, child) in self.children.iter().enumerate() {
      if let Err(err) = child.refresh(request, response) {
        error!(child = index, error = %err, "refresh child failed");
        first_error.get_or_insert(err);
      }
    }
    match first_error {
      Some(err) => Err(err),
      None => Ok(()),
    }
  }
}

/// Writes nothing. For read paths with no cache entry to repopulate.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpRefresh;

impl<Req: ?Sized, Resp: ?Sized> RefreshStrategy<Req, Resp> for NoOpRefresh {
  fn refresh(&self, _request: &Req, _response: &Resp) -> Result<()> {
    Ok(())
  }
}
