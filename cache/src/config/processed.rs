use crate::atomic::MAX_EXPIRATION;
use crate::config::raw::{CasConfigRaw, ConfigRaw, MemcachedConfigRaw};
use crate::error::{CacheError, Result};

use std::time::Duration;

/// Validated store configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
  pub max_list_size: usize,
  pub expiration: Duration,
  pub shards: usize,
  pub cas: CasConfig,
  pub memcached: MemcachedConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CasConfig {
  pub max_attempts: u32,
  pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MemcachedConfig {
  pub servers: Vec<String>,
  pub connect_timeout: Duration,
  pub io_timeout: Duration,
  pub pool_size: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_list_size: 10_000,
      expiration: MAX_EXPIRATION,
      shards: 16,
      cas: CasConfig {
        max_attempts: 64,
        timeout: Duration::from_secs(1),
      },
      memcached: MemcachedConfig {
        servers: vec!["127.0.0.1:11211".to_string()],
        connect_timeout: Duration::from_secs(1),
        io_timeout: Duration::from_secs(1),
        pool_size: 4,
      },
    }
  }
}

// --- Conversion and Validation Logic ---

/// Processes the raw, deserialized configuration into a validated representation.
pub fn process_raw_config(raw: ConfigRaw) -> Result<CacheConfig> {
  if raw.max_list_size == 0 {
    return Err(invalid("max_list_size", "must be at least 1".to_string()));
  }
  if raw.shards == 0 {
    return Err(invalid("shards", "must be at least 1".to_string()));
  }

  let expiration = parse_duration(&raw.expiration, "expiration")?;
  if expiration > MAX_EXPIRATION {
    return Err(invalid(
      "expiration",
      format!("'{}' exceeds the 30 day maximum", raw.expiration),
    ));
  }

  Ok(CacheConfig {
    max_list_size: raw.max_list_size,
    expiration,
    shards: raw.shards,
    cas: process_cas(raw.cas)?,
    memcached: process_memcached(raw.memcached)?,
  })
}

fn process_cas(raw: CasConfigRaw) -> Result<CasConfig> {
  if raw.max_attempts == 0 {
    return Err(invalid("cas.max_attempts", "must be at least 1".to_string()));
  }
  Ok(CasConfig {
    max_attempts: raw.max_attempts,
    timeout: parse_duration(&raw.timeout, "cas.timeout")?,
  })
}

fn process_memcached(raw: MemcachedConfigRaw) -> Result<MemcachedConfig> {
  if raw.servers.is_empty() {
    return Err(invalid(
      "memcached.servers",
      "at least one server address is required".to_string(),
    ));
  }
  for (i, server) in raw.servers.iter().enumerate() {
    if server.trim().is_empty() || !server.contains(':') {
      return Err(invalid(
        &format!("memcached.servers[{}]", i),
        format!("'{}' is not a host:port address", server),
      ));
    }
  }
  if raw.pool_size == 0 {
    return Err(invalid("memcached.pool_size", "must be at least 1".to_string()));
  }
  Ok(MemcachedConfig {
    servers: raw.servers,
    connect_timeout: parse_duration(&raw.connect_timeout, "memcached.connect_timeout")?,
    io_timeout: parse_duration(&raw.io_timeout, "memcached.io_timeout")?,
    pool_size: raw.pool_size,
  })
}

/// Parses a human duration such as "250ms" or "30days".
pub(crate) fn parse_duration(value: &str, field: &str) -> Result<Duration> {
  humantime::parse_duration(value.trim())
    .map_err(|e| invalid(field, format!("Invalid duration '{}': {}", value, e)))
}

fn invalid(field: &str, message: String) -> CacheError {
  CacheError::InvalidConfigValue {
    field: field.to_string(),
    message,
  }
}
