use crate::connection::{ConnectOptions, Pool};
use crate::error::{Error, Result};
use crate::protocol::{Reply, Request, Storage, Value};

use core::fmt;
use std::collections::HashMap;
use std::time::Duration;

use stream_cache::atomic::MAX_EXPIRATION;
use stream_cache::config::MemcachedConfig;
use stream_cache::{CasBackend, CasOutcome, CasToken, Item, ValueKind};
use tracing::{trace, warn};

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// FNV-1a, so every process maps a key to the same server.
#[inline]
fn fnv1a(key: &str) -> u64 {
  key
    .bytes()
    .fold(FNV_OFFSET, |hash, b| (hash ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// Relative expiration in whole seconds; zero means never.
fn exptime(expiration: Duration) -> u32 {
  if expiration.is_zero() {
    return 0;
  }
  let capped = expiration.min(MAX_EXPIRATION);
  let secs = capped.as_secs() + u64::from(capped.subsec_nanos() > 0);
  secs as u32
}

fn into_item(value: Value) -> Result<Item> {
  let kind = ValueKind::from_flags(value.flags)
    .map_err(|e| Error::Protocol(format!("'{}': {}", value.key, e)))?;
  Ok(Item {
    kind,
    bytes: value.data,
  })
}

fn unexpected(reply: Reply) -> Error {
  Error::Protocol(format!("unexpected reply {:?}", reply))
}

/// A [`CasBackend`] over one or more memcached servers.
///
/// Keys are spread over the servers by a stable hash. Item kinds travel in
/// the memcached `flags` field.
pub struct MemcachedBackend {
  servers: Vec<Pool>,
}

impl fmt::Debug for MemcachedBackend {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MemcachedBackend")
      .field(
        "servers",
        &self.servers.iter().map(Pool::addr).collect::<Vec<_>>(),
      )
      .finish()
  }
}

impl MemcachedBackend {
  /// Creates a client; connections are opened lazily.
  pub fn new<S: Into<String>>(servers: Vec<S>, options: ConnectOptions) -> Result<Self> {
    if servers.is_empty() {
      return Err(Error::NoServers);
    }
    let servers = servers
      .into_iter()
      .map(|addr| Pool::new(addr.into(), options))
      .collect();
    Ok(Self { servers })
  }

  pub fn from_config(config: &MemcachedConfig) -> Result<Self> {
    let options = ConnectOptions {
      connect_timeout: config.connect_timeout,
      io_timeout: config.io_timeout,
      pool_size: config.pool_size,
    };
    Self::new(config.servers.clone(), options)
  }

  fn server_index(&self, key: &str) -> usize {
    (fnv1a(key) % self.servers.len() as u64) as usize
  }

  fn server(&self, key: &str) -> &Pool {
    &self.servers[self.server_index(key)]
  }

  /// Asks every server for its version string.
  pub fn versions(&self) -> Result<Vec<String>> {
    self
      .servers
      .iter()
      .map(|pool| match pool.request(&Request::Version)? {
        Reply::Version(v) => Ok(v),
        other => Err(unexpected(other)),
      })
      .collect()
  }

  fn retrieve(&self, key: &str, with_cas: bool) -> Result<Option<Value>> {
    let keys = [key];
    let request = if with_cas {
      Request::Gets { keys: &keys }
    } else {
      Request::Get { keys: &keys }
    };
    match self.server(key).request(&request)? {
      Reply::Values(values) => Ok(values.into_iter().find(|v| v.key == key)),
      other => Err(unexpected(other)),
    }
  }

  fn store(&self, request: Request<'_>, key: &str) -> Result<Reply> {
    self.server(key).request(&request)
  }
}

fn storage<'a>(key: &'a str, item: &'a Item, expiration: Duration) -> Storage<'a> {
  Storage {
    key,
    flags: item.kind.flags(),
    exptime: exptime(expiration),
    data: &item.bytes,
  }
}

impl CasBackend for MemcachedBackend {
  fn get(&self, key: &str) -> stream_cache::Result<Option<Item>> {
    trace!(key = %key, "memcached get");
    Ok(self.retrieve(key, false)?.map(into_item).transpose()?)
  }

  fn gets(&self, key: &str) -> stream_cache::Result<Option<(Item, CasToken)>> {
    let value = match self.retrieve(key, true)? {
      Some(value) => value,
      None => return Ok(None),
    };
    let cas = value
      .cas
      .ok_or_else(|| Error::Protocol(format!("gets reply for '{}' had no cas unique", key)))?;
    Ok(Some((into_item(value)?, CasToken(cas))))
  }

  fn multi_get(&self, keys: &[&str]) -> stream_cache::Result<HashMap<String, Item>> {
    let mut by_server: Vec<Vec<&str>> = vec![Vec::new(); self.servers.len()];
    for key in keys {
      by_server[self.server_index(key)].push(*key);
    }

    let mut found = HashMap::with_capacity(keys.len());
    for (pool, batch) in self.servers.iter().zip(&by_server) {
      if batch.is_empty() {
        continue;
      }
      let values = match pool.request(&Request::Get { keys: batch })? {
        Reply::Values(values) => values,
        other => return Err(unexpected(other).into()),
      };
      for value in values {
        let key = value.key.clone();
        match into_item(value) {
          Ok(item) => {
            found.insert(key, item);
          }
          Err(err) => warn!(key = %key, error = %err, "skipping item with unknown flags"),
        }
      }
    }
    Ok(found)
  }

  fn set(&self, key: &str, item: &Item, expiration: Duration) -> stream_cache::Result<()> {
    match self.store(Request::Set(storage(key, item, expiration)), key)? {
      Reply::Stored => Ok(()),
      other => Err(unexpected(other).into()),
    }
  }

  fn add(&self, key: &str, item: &Item, expiration: Duration) -> stream_cache::Result<bool> {
    match self.store(Request::Add(storage(key, item, expiration)), key)? {
      Reply::Stored => Ok(true),
      Reply::NotStored => Ok(false),
      other => Err(unexpected(other).into()),
    }
  }

  fn cas(
    &self,
    key: &str,
    item: &Item,
    token: CasToken,
    expiration: Duration,
  ) -> stream_cache::Result<CasOutcome> {
    let request = Request::Cas {
      storage: storage(key, item, expiration),
      unique: token.0,
    };
    match self.store(request, key)? {
      Reply::Stored => Ok(CasOutcome::Stored),
      Reply::Exists => Ok(CasOutcome::Exists),
      Reply::NotFound => Ok(CasOutcome::NotFound),
      other => Err(unexpected(other).into()),
    }
  }

  fn delete(&self, key: &str) -> stream_cache::Result<bool> {
    match self.store(Request::Delete { key }, key)? {
      Reply::Deleted => Ok(true),
      Reply::NotFound => Ok(false),
      other => Err(unexpected(other).into()),
    }
  }

  fn flush(&self) -> stream_cache::Result<()> {
    for pool in &self.servers {
      match pool.request(&Request::FlushAll)? {
        Reply::Ok => {}
        other => return Err(unexpected(other).into()),
      }
    }
    Ok(())
  }
}
