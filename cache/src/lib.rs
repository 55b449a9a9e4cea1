//! A consistency layer for distributed id-list and id-set caches.
//!
//! # Features
//! - **Typed store contract**: [`KeyValueStore`] separates scalars, bounded
//!   id lists and id sets, and never lets cache trouble reach callers.
//! - **Lock-free list mutation**: prepend, remove and replace-and-return run
//!   as compare-and-swap loops over single-key atomic primitives.
//! - **Partial results**: fetchers return what the cache holds plus the
//!   residual request; refresh strategies write authoritative results back.
//! - **Chained sources**: [`ChainedMapper`] falls through cache to source and
//!   refills the cache on the way back.
//! - **Replication**: [`ReplicatedStore`] rotates reads and writes
//!   independently across replicas.
//! - **Observability**: structured `tracing` events and per-store metrics.

// Public modules that form the API
pub mod atomic;
pub mod backend;
pub mod builder;
pub mod chain;
pub mod codec;
pub mod collider;
pub mod config;
pub mod error;
pub mod fanout;
pub mod invalidation;
pub mod keys;
pub mod memory;
pub mod metrics;
pub mod partial;
pub mod refresh;
pub mod router;
pub mod store;

// Internal, crate-only modules
mod mutator;

// Re-export the primary user-facing types for convenience
pub use atomic::{AtomicStore, MemoryStore};
pub use backend::{CasBackend, CasOutcome, CasToken};
pub use builder::StoreBuilder;
pub use chain::{ChainedMapper, DataSource, DomainMapper, MergeResults, SourceFn};
pub use codec::{Item, JsonCodec, RawCodec, ValueCodec, ValueKind};
pub use collider::{InterpolationListCollider, ListCollider, UnionListCollider};
pub use config::CacheConfig;
pub use error::{BuildError, CacheError, Result};
pub use fanout::{ActivityBuffer, DrainReport};
pub use invalidation::{
  ChangeKind, DeleteOnChange, EntityEvent, InvalidationBus, InvalidationListener, PurgeFromLists,
};
pub use keys::{CacheKey, KeyKind, KeySuffix};
pub use memory::MemoryBackend;
pub use metrics::MetricsSnapshot;
pub use mutator::CasSettings;
pub use partial::{
  CollidingListFetcher, EntryShape, ListShape, MixedKindFetcher, PartialMapperResponse,
  PartialResultFetcher, ScalarShape, SetShape,
};
pub use refresh::{KeyedRefresh, MultiRefresh, NoOpRefresh, RefreshStrategy, ScalarRefresh};
pub use router::{ReplicatedStore, RoundRobin, Rotator};
pub use store::KeyValueStore;
