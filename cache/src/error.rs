use std::fmt;
use std::time::Duration;

use thiserror::Error;

/// The main error type for `stream_cache`.
///
/// Store operations themselves never surface these to callers: transport and
/// decoding failures are logged and degrade to a miss or a no-op. Only the
/// programming errors (`UnknownKind`, `PositionalMismatch`) and configuration
/// problems propagate.
#[derive(Debug, Error)]
pub enum CacheError {
  #[error("Malformed cached value: {0}")]
  Codec(String),

  #[error("Failed to (de)serialize cached value: {0}")]
  Serialization(#[from] serde_json::Error),

  #[error("Store transport error: {0}")]
  Io(#[from] std::io::Error),

  #[error("Unexpected store reply: {0}")]
  Protocol(String),

  #[error("Compare-and-swap on '{key}' gave up after {attempts} attempts")]
  CasExhausted { key: String, attempts: u32 },

  #[error("Compare-and-swap on '{key}' timed out after {elapsed:?}")]
  CasTimeout { key: String, elapsed: Duration },

  #[error("Unknown entity kind tag '{0}'")]
  UnknownKind(String),

  #[error("Keyed refresh got {results} results for {requests} requests")]
  PositionalMismatch { requests: usize, results: usize },

  #[error("Configuration file not found: {0}")]
  ConfigNotFound(String),

  #[error("Failed to read configuration file: {0}")]
  ConfigRead(String),

  #[error("Failed to parse configuration: {0}")]
  ConfigParse(String),

  #[error("Invalid configuration value for '{field}': {message}")]
  InvalidConfigValue { field: String, message: String },
}

impl CacheError {
  /// Returns true for errors that mean the caller built a bad request.
  ///
  /// These must abort the operation: carrying on would write a value under
  /// the wrong key.
  pub fn is_programming_error(&self) -> bool {
    matches!(
      self,
      CacheError::UnknownKind(_) | CacheError::PositionalMismatch { .. }
    )
  }
}

/// A specialized `Result` type for `stream_cache` operations.
pub type Result<T, E = CacheError> = std::result::Result<T, E>;

/// Errors that can occur when building a store or router.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// Lists must be allowed to hold at least one id.
  ZeroMaxListSize,
  /// The in-memory backend was configured with zero shards.
  ZeroShards,
  /// The compare-and-swap loop must be allowed at least one attempt.
  ZeroCasAttempts,
  /// A replicated router needs at least one store to rotate over.
  NoStores,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::ZeroMaxListSize => write!(f, "max list size cannot be zero"),
      BuildError::ZeroShards => write!(f, "shard count cannot be zero"),
      BuildError::ZeroCasAttempts => write!(f, "cas max attempts cannot be zero"),
      BuildError::NoStores => write!(f, "a replicated store needs at least one replica"),
    }
  }
}

impl std::error::Error for BuildError {}
