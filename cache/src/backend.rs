use crate::codec::Item;
use crate::error::Result;

use std::collections::HashMap;
use std::time::Duration;

/// An opaque compare-and-swap token handed out by [`CasBackend::gets`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CasToken(pub u64);

/// The result of a [`CasBackend::cas`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CasOutcome {
  /// The new value was written.
  Stored,
  /// Another writer changed the value since the token was issued.
  Exists,
  /// The key disappeared since the token was issued.
  NotFound,
}

/// The single-key atomic primitives a backing store must offer.
///
/// Every method is one blocking round-trip. Implementations must be safe to
/// share across request threads.
pub trait CasBackend: Send + Sync {
  fn get(&self, key: &str) -> Result<Option<Item>>;

  /// Reads a value together with the token a later `cas` must present.
  fn gets(&self, key: &str) -> Result<Option<(Item, CasToken)>>;

  /// Reads many keys in one call. Absent keys are left out of the map.
  fn multi_get(&self, keys: &[&str]) -> Result<HashMap<String, Item>>;

  fn set(&self, key: &str, item: &Item, expiration: Duration) -> Result<()>;

  /// Stores only if the key is absent. Returns whether it stored.
  fn add(&self, key: &str, item: &Item, expiration: Duration) -> Result<bool>;

  fn cas(&self, key: &str, item: &Item, token: CasToken, expiration: Duration) -> Result<CasOutcome>;

  /// Removes a key. Returns whether it existed.
  fn delete(&self, key: &str) -> Result<bool>;

  fn flush(&self) -> Result<()>;
}

impl<B: CasBackend + ?Sized> CasBackend for std::sync::Arc<B> {
  fn get(&self, key: &str) -> Result<Option<Item>> {
    (**self).get(key)
  }

  fn gets(&self, key: &str) -> Result<Option<(Item, CasToken)>> {
    (**self).gets(key)
  }

  fn multi_get(&self, keys: &[&str]) -> Result<HashMap<String, Item>> {
    (**self).multi_get(keys)
  }

  fn set(&self, key: &str, item: &Item, expiration: Duration) -> Result<()> {
    (**self).set(key, item, expiration)
  }

  fn add(&self, key: &str, item: &Item, expiration: Duration) -> Result<bool> {
    (**self).add(key, item, expiration)
  }

  fn cas(&self, key: &str, item: &Item, token: CasToken, expiration: Duration) -> Result<CasOutcome> {
    (**self).cas(key, item, token, expiration)
  }

  fn delete(&self, key: &str) -> Result<bool> {
    (**self).delete(key)
  }

  fn flush(&self) -> Result<()> {
    (**self).flush()
  }
}
