use stream_cache::CacheError;
use thiserror::Error;

/// Errors raised by the memcached client.
#[derive(Debug, Error)]
pub enum Error {
  #[error("I/O error talking to memcached: {0}")]
  Io(#[from] std::io::Error),

  #[error("Malformed reply from memcached: {0}")]
  Protocol(String),

  #[error("memcached rejected the request: {0}")]
  Server(String),

  #[error("Invalid memcached key '{0}'")]
  InvalidKey(String),

  #[error("No memcached servers configured")]
  NoServers,
}

/// A specialized `Result` type for memcached operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<Error> for CacheError {
  fn from(err: Error) -> Self {
    match err {
      Error::Io(io) => CacheError::Io(io),
      other => CacheError::Protocol(other.to_string()),
    }
  }
}
