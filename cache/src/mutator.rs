use crate::backend::{CasBackend, CasOutcome};
use crate::codec::Item;
use crate::error::{CacheError, Result};
use crate::metrics::Metrics;

use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};

use crossbeam_utils::Backoff;

/// Settings for the optimistic read/compute/swap loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CasSettings {
  pub max_attempts: u32,
  pub timeout: Duration,
}

impl Default for CasSettings {
  fn default() -> Self {
    Self {
      max_attempts: 64,
      timeout: Duration::from_secs(1),
    }
  }
}

/// Drives `gets` / `cas` against a backend until a mutation wins.
///
/// The mutation closure receives the currently stored item and returns the
/// replacement. It may run several times when writers interleave, so it must
/// depend on nothing but its argument.
pub(crate) struct CasMutator<'a, B: ?Sized> {
  backend: &'a B,
  settings: CasSettings,
  expiration: Duration,
  metrics: &'a Metrics,
}

impl<'a, B: CasBackend + ?Sized> CasMutator<'a, B> {
  pub(crate) fn new(
    backend: &'a B,
    settings: CasSettings,
    expiration: Duration,
    metrics: &'a Metrics,
  ) -> Self {
    Self {
      backend,
      settings,
      expiration,
      metrics,
    }
  }

  /// Applies `mutation` to the item stored under `key`.
  ///
  /// When the key is absent, `initial` (if any) is added as-is and returned;
  /// with no initial value nothing is written and `Ok(None)` comes back.
  /// Otherwise returns `(previous, stored)`.
  pub(crate) fn mutate<F>(
    &self,
    key: &str,
    initial: Option<&Item>,
    mut mutation: F,
  ) -> Result<Option<Mutated>>
  where
    F: FnMut(&Item) -> Result<Item>,
  {
    let started = Instant::now();
    let backoff = Backoff::new();
    let mut attempts = 0u32;

    loop {
      if attempts >= self.settings.max_attempts {
        self.metrics.cas_failures.fetch_add(1, Ordering::Relaxed);
        return Err(CacheError::CasExhausted {
          key: key.to_string(),
          attempts,
        });
      }
      let elapsed = started.elapsed();
      if attempts > 0 && elapsed >= self.settings.timeout {
        self.metrics.cas_failures.fetch_add(1, Ordering::Relaxed);
        return Err(CacheError::CasTimeout {
          key: key.to_string(),
          elapsed,
        });
      }
      if attempts > 0 {
        self.metrics.cas_retries.fetch_add(1, Ordering::Relaxed);
        backoff.snooze();
      }
      attempts += 1;

      match self.backend.gets(key)? {
        None => match initial {
          None => return Ok(None),
          Some(item) => {
            if self.backend.add(key, item, self.expiration)? {
              return Ok(Some(Mutated {
                previous: None,
                stored: item.clone(),
              }));
            }
            // Someone else created it first; go round and mutate theirs.
          }
        },
        Some((current, token)) => {
          let next = mutation(&current)?;
          match self.backend.cas(key, &next, token, self.expiration)? {
            CasOutcome::Stored => {
              return Ok(Some(Mutated {
                previous: Some(current),
                stored: next,
              }));
            }
            CasOutcome::Exists | CasOutcome::NotFound => {
              tracing::trace!(key = %key, attempts, "cas lost race, retrying");
            }
          }
        }
      }
    }
  }
}

/// What a successful mutation replaced and wrote.
#[derive(Debug, Clone)]
pub(crate) struct Mutated {
  pub previous: Option<Item>,
  pub stored: Item,
}
