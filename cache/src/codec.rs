//! Wire encodings for cached values.
//!
//! Id lists and id sets are stored as packed arrays of big-endian `i64`s so
//! they can be rewritten atomically and stay readable by any client that
//! knows the layout. Scalars go through a [`ValueCodec`].

use crate::error::{CacheError, Result};

use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Width of one packed id.
pub const ID_WIDTH: usize = 8;

/// The shape of a stored item, persisted alongside it (memcached `flags`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
  Scalar,
  List,
  Set,
}

impl ValueKind {
  pub fn flags(self) -> u32 {
    match self {
      ValueKind::Scalar => 0,
      ValueKind::List => 1,
      ValueKind::Set => 2,
    }
  }

  pub fn from_flags(flags: u32) -> Result<Self> {
    match flags {
      0 => Ok(ValueKind::Scalar),
      1 => Ok(ValueKind::List),
      2 => Ok(ValueKind::Set),
      other => Err(CacheError::Codec(format!("unknown value flags {}", other))),
    }
  }
}

/// Raw stored bytes together with their kind.
#[derive(Clone, PartialEq, Eq)]
pub struct Item {
  pub kind: ValueKind,
  pub bytes: Vec<u8>,
}

impl Item {
  pub fn scalar(bytes: Vec<u8>) -> Self {
    Self {
      kind: ValueKind::Scalar,
      bytes,
    }
  }

  pub fn list(ids: &[i64]) -> Self {
    Self {
      kind: ValueKind::List,
      bytes: encode_ids(ids),
    }
  }

  pub fn set(ids: &HashSet<i64>) -> Self {
    Self {
      kind: ValueKind::Set,
      bytes: encode_set(ids),
    }
  }
}

impl fmt::Debug for Item {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Item")
      .field("kind", &self.kind)
      .field("len", &self.bytes.len())
      .finish()
  }
}

/// Packs ids in order, 8 big-endian bytes each, no header.
pub fn encode_ids(ids: &[i64]) -> Vec<u8> {
  let mut out = Vec::with_capacity(ids.len() * ID_WIDTH);
  for id in ids {
    out.extend_from_slice(&id.to_be_bytes());
  }
  out
}

/// Unpacks a byte string written by [`encode_ids`].
pub fn decode_ids(bytes: &[u8]) -> Result<Vec<i64>> {
  if bytes.len() % ID_WIDTH != 0 {
    return Err(CacheError::Codec(format!(
      "packed id list length {} is not a multiple of {}",
      bytes.len(),
      ID_WIDTH
    )));
  }
  let ids = bytes
    .chunks_exact(ID_WIDTH)
    .map(|chunk| {
      let mut buf = [0u8; ID_WIDTH];
      buf.copy_from_slice(chunk);
      i64::from_be_bytes(buf)
    })
    .collect();
  Ok(ids)
}

/// Sets are packed like lists, sorted ascending so equal sets encode equally.
pub fn encode_set(ids: &HashSet<i64>) -> Vec<u8> {
  let mut sorted: Vec<i64> = ids.iter().copied().collect();
  sorted.sort_unstable();
  encode_ids(&sorted)
}

pub fn decode_set(bytes: &[u8]) -> Result<HashSet<i64>> {
  Ok(decode_ids(bytes)?.into_iter().collect())
}

/// Converts a scalar value to and from its stored bytes.
pub trait ValueCodec: Send + Sync {
  type Value;

  fn encode(&self, value: &Self::Value) -> Result<Vec<u8>>;

  fn decode(&self, bytes: &[u8]) -> Result<Self::Value>;
}

/// Stores scalar DTOs as JSON documents.
pub struct JsonCodec<T> {
  _marker: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
  pub fn new() -> Self {
    Self {
      _marker: PhantomData,
    }
  }
}

impl<T> Default for JsonCodec<T> {
  fn default() -> Self {
    Self::new()
  }
}

impl<T> Clone for JsonCodec<T> {
  fn clone(&self) -> Self {
    Self::new()
  }
}

impl<T> fmt::Debug for JsonCodec<T> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("JsonCodec")
  }
}

impl<T> ValueCodec for JsonCodec<T>
where
  T: Serialize + DeserializeOwned,
{
  type Value = T;

  fn encode(&self, value: &T) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(value)?)
  }

  fn decode(&self, bytes: &[u8]) -> Result<T> {
    Ok(serde_json::from_slice(bytes)?)
  }
}

/// Passes opaque bytes through untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawCodec;

impl ValueCodec for RawCodec {
  type Value = Vec<u8>;

  fn encode(&self, value: &Vec<u8>) -> Result<Vec<u8>> {
    Ok(value.clone())
  }

  fn decode(&self, bytes: &[u8]) -> Result<Vec<u8>> {
    Ok(bytes.to_vec())
  }
}
