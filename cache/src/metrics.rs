use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// A thread-safe, internal metrics collector for a store.
/// All fields are atomic to allow for lock-free updates.
#[derive(Debug)]
pub struct Metrics {
  // --- Hit/Miss Ratios ---
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  // --- Throughput ---
  pub(crate) writes: CachePadded<AtomicU64>,
  pub(crate) deletes: CachePadded<AtomicU64>,

  // --- Compare-and-swap ---
  pub(crate) cas_retries: CachePadded<AtomicU64>,
  pub(crate) cas_failures: CachePadded<AtomicU64>,

  // --- Degraded operations ---
  pub(crate) decode_failures: CachePadded<AtomicU64>,
  pub(crate) store_failures: CachePadded<AtomicU64>,
  pub(crate) trims: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      writes: CachePadded::new(AtomicU64::new(0)),
      deletes: CachePadded::new(AtomicU64::new(0)),
      cas_retries: CachePadded::new(AtomicU64::new(0)),
      cas_failures: CachePadded::new(AtomicU64::new(0)),
      decode_failures: CachePadded::new(AtomicU64::new(0)),
      store_failures: CachePadded::new(AtomicU64::new(0)),
      trims: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record_lookup(&self, hit: bool) {
    if hit {
      self.hits.fetch_add(1, Ordering::Relaxed);
    } else {
      self.misses.fetch_add(1, Ordering::Relaxed);
    }
  }

  #[inline]
  pub(crate) fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot of the current metrics.
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      writes: self.writes.load(Ordering::Relaxed),
      deletes: self.deletes.load(Ordering::Relaxed),
      cas_retries: self.cas_retries.load(Ordering::Relaxed),
      cas_failures: self.cas_failures.load(Ordering::Relaxed),
      decode_failures: self.decode_failures.load(Ordering::Relaxed),
      store_failures: self.store_failures.load(Ordering::Relaxed),
      trims: self.trims.load(Ordering::Relaxed),
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time, public-facing snapshot of a store's metrics.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Reads that found a decodable value.
  pub hits: u64,
  /// Reads that found nothing, or something undecodable.
  pub misses: u64,
  /// The hit ratio (hits / (hits + misses)).
  pub hit_ratio: f64,
  /// Successful writes, including list and set mutations.
  pub writes: u64,
  /// Explicit deletes, including `set(key, None)`.
  pub deletes: u64,
  /// CAS attempts that lost a race and went round again.
  pub cas_retries: u64,
  /// Mutations abandoned after exhausting attempts or time.
  pub cas_failures: u64,
  /// Stored values that could not be decoded as the requested shape.
  pub decode_failures: u64,
  /// Operations that failed at the transport level.
  pub store_failures: u64,
  /// Oversized lists trimmed on read.
  pub trims: u64,
  /// The number of seconds the store has been running.
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("writes", &self.writes)
      .field("deletes", &self.deletes)
      .field("cas_retries", &self.cas_retries)
      .field("cas_failures", &self.cas_failures)
      .field("decode_failures", &self.decode_failures)
      .field("store_failures", &self.store_failures)
      .field("trims", &self.trims)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
