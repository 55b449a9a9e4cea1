use crate::atomic::{AtomicStore, MemoryStore, DEFAULT_MAX_LIST_SIZE, MAX_EXPIRATION};
use crate::backend::CasBackend;
use crate::config::CacheConfig;
use crate::error::BuildError;
use crate::memory::MemoryBackend;
use crate::mutator::CasSettings;

use core::fmt;
use std::time::Duration;

/// A builder for [`AtomicStore`] instances.
#[derive(Clone)]
pub struct StoreBuilder {
  pub(crate) max_list_size: usize,
  pub(crate) expiration: Duration,
  pub(crate) shards: usize,
  pub(crate) cas: CasSettings,
}

impl fmt::Debug for StoreBuilder {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("StoreBuilder")
      .field("max_list_size", &self.max_list_size)
      .field("expiration", &self.expiration)
      .field("shards", &self.shards)
      .field("cas_max_attempts", &self.cas.max_attempts)
      .field("cas_timeout", &self.cas.timeout)
      .finish()
  }
}

impl Default for StoreBuilder {
  fn default() -> Self {
    Self {
      max_list_size: DEFAULT_MAX_LIST_SIZE,
      expiration: MAX_EXPIRATION,
      shards: 16,
      cas: CasSettings::default(),
    }
  }
}

impl StoreBuilder {
  pub fn new() -> Self {
    Self::default()
  }

  /// Seeds a builder from a loaded configuration.
  pub fn from_config(config: &CacheConfig) -> Self {
    Self {
      max_list_size: config.max_list_size,
      expiration: config.expiration,
      shards: config.shards,
      cas: CasSettings {
        max_attempts: config.cas.max_attempts,
        timeout: config.cas.timeout,
      },
    }
  }

  /// Sets the bound applied to lists on prepend and on default reads.
  pub fn max_list_size(mut self, max_list_size: usize) -> Self {
    self.max_list_size = max_list_size;
    self
  }

  /// Sets the expiration written with every item. Capped at 30 days; zero
  /// means "never expire".
  pub fn expiration(mut self, expiration: Duration) -> Self {
    self.expiration = expiration.min(MAX_EXPIRATION);
    self
  }

  /// Sets the number of shards of the in-memory backend.
  pub fn shards(mut self, shards: usize) -> Self {
    self.shards = shards;
    self
  }

  pub fn cas_max_attempts(mut self, attempts: u32) -> Self {
    self.cas.max_attempts = attempts;
    self
  }

  pub fn cas_timeout(mut self, timeout: Duration) -> Self {
    self.cas.timeout = timeout;
    self
  }

  fn validate(&self) -> Result<(), BuildError> {
    if self.max_list_size == 0 {
      return Err(BuildError::ZeroMaxListSize);
    }
    if self.cas.max_attempts == 0 {
      return Err(BuildError::ZeroCasAttempts);
    }
    Ok(())
  }

  /// Builds a store over the in-process sharded backend.
  pub fn build_memory(self) -> Result<MemoryStore, BuildError> {
    if self.shards == 0 {
      return Err(BuildError::ZeroShards);
    }
    let backend = MemoryBackend::new(self.shards);
    self.build(backend)
  }

  /// Builds a store over any backend, such as a memcached client.
  pub fn build<B: CasBackend>(self, backend: B) -> Result<AtomicStore<B>, BuildError> {
    self.validate()?;
    Ok(AtomicStore::with_settings(
      backend,
      self.max_list_size,
      self.expiration,
      self.cas,
    ))
  }
}
