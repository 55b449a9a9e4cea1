//! A blocking memcached text-protocol client for `stream_cache`.
//!
//! [`MemcachedBackend`] implements the core's `CasBackend`, so
//! `AtomicStore<MemcachedBackend>` is a memcached-backed `KeyValueStore`:
//!
//! ```no_run
//! use stream_cache::{KeyValueStore, StoreBuilder};
//! use stream_cache_memcached::{ConnectOptions, MemcachedBackend};
//!
//! let backend = MemcachedBackend::new(vec!["127.0.0.1:11211"], ConnectOptions::default()).unwrap();
//! let store = StoreBuilder::new().build(backend).unwrap();
//! store.set_list("Fwr:42", &[7, 5, 3]);
//! ```

pub mod client;
pub mod error;
pub mod protocol;

mod connection;

pub use client::MemcachedBackend;
pub use connection::ConnectOptions;
pub use error::{Error, Result};

/// The memcached-backed store.
pub type MemcachedStore = stream_cache::AtomicStore<MemcachedBackend>;
