//! Memcached ASCII protocol: request encoding and reply parsing.

use crate::error::{Error, Result};

use std::io::{BufRead, Read, Write};

/// Longest key memcached accepts.
pub const MAX_KEY_LENGTH: usize = 250;

/// Largest data block accepted in a reply. Memcached's default item limit is
/// 1 MiB; this leaves room for servers started with a raised `-I`.
pub const MAX_VALUE_LENGTH: usize = 128 * 1024 * 1024;

/// A request in the text protocol.
#[derive(Debug, Clone)]
pub enum Request<'a> {
  /// `get <key>*\r\n`
  Get { keys: &'a [&'a str] },
  /// `gets <key>*\r\n`, replies carry CAS uniques
  Gets { keys: &'a [&'a str] },
  /// `set <key> <flags> <exptime> <bytes>\r\n<data>\r\n`
  Set(Storage<'a>),
  /// `add ...`, stores only when absent
  Add(Storage<'a>),
  /// `cas <key> <flags> <exptime> <bytes> <cas unique>\r\n<data>\r\n`
  Cas { storage: Storage<'a>, unique: u64 },
  /// `delete <key>\r\n`
  Delete { key: &'a str },
  /// `flush_all\r\n`
  FlushAll,
  /// `version\r\n`
  Version,
}

/// The common part of the storage commands.
#[derive(Debug, Clone, Copy)]
pub struct Storage<'a> {
  pub key: &'a str,
  pub flags: u32,
  pub exptime: u32,
  pub data: &'a [u8],
}

impl<'a> Request<'a> {
  /// Appends the wire form of this request to `buf`.
  pub fn encode(&self, buf: &mut Vec<u8>) -> Result<()> {
    match self {
      Request::Get { keys } => encode_retrieval(buf, "get", keys),
      Request::Gets { keys } => encode_retrieval(buf, "gets", keys),
      Request::Set(storage) => encode_storage(buf, "set", storage, None),
      Request::Add(storage) => encode_storage(buf, "add", storage, None),
      Request::Cas { storage, unique } => encode_storage(buf, "cas", storage, Some(*unique)),
      Request::Delete { key } => {
        validate_key(key)?;
        write!(buf, "delete {}\r\n", key)?;
        Ok(())
      }
      Request::FlushAll => {
        buf.extend_from_slice(b"flush_all\r\n");
        Ok(())
      }
      Request::Version => {
        buf.extend_from_slice(b"version\r\n");
        Ok(())
      }
    }
  }

  /// Whether the reply is a `VALUE ... END` block.
  pub fn expects_values(&self) -> bool {
    matches!(self, Request::Get { .. } | Request::Gets { .. })
  }
}

/// Rejects keys memcached would refuse or misparse.
pub fn validate_key(key: &str) -> Result<()> {
  if key.is_empty()
    || key.len() > MAX_KEY_LENGTH
    || key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control())
  {
    return Err(Error::InvalidKey(key.to_string()));
  }
  Ok(())
}

fn encode_retrieval(buf: &mut Vec<u8>, verb: &str, keys: &[&str]) -> Result<()> {
  buf.extend_from_slice(verb.as_bytes());
  for key in keys {
    validate_key(key)?;
    buf.push(b' ');
    buf.extend_from_slice(key.as_bytes());
  }
  buf.extend_from_slice(b"\r\n");
  Ok(())
}

fn encode_storage(buf: &mut Vec<u8>, verb: &str, s: &Storage<'_>, unique: Option<u64>) -> Result<()> {
  validate_key(s.key)?;
  write!(buf, "{} {} {} {} {}", verb, s.key, s.flags, s.exptime, s.data.len())?;
  if let Some(unique) = unique {
    write!(buf, " {}", unique)?;
  }
  buf.extend_from_slice(b"\r\n");
  buf.extend_from_slice(s.data);
  buf.extend_from_slice(b"\r\n");
  Ok(())
}

/// One item of a `VALUE` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Value {
  pub key: String,
  pub flags: u32,
  pub cas: Option<u64>,
  pub data: Vec<u8>,
}

/// A parsed server reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
  Values(Vec<Value>),
  Stored,
  NotStored,
  Exists,
  NotFound,
  Deleted,
  Ok,
  Version(String),
}

/// Reads one full reply. `values` selects `VALUE ... END` parsing.
pub fn read_reply<R: BufRead>(reader: &mut R, values: bool) -> Result<Reply> {
  if values {
    return read_values(reader);
  }
  let line = read_line(reader)?;
  parse_status(&line)
}

fn read_line<R: BufRead>(reader: &mut R) -> Result<String> {
  let mut line = String::new();
  let read = reader.read_line(&mut line)?;
  if read == 0 {
    return Err(Error::Protocol("connection closed mid-reply".to_string()));
  }
  if !line.ends_with("\r\n") {
    return Err(Error::Protocol(format!("unterminated line {:?}", line)));
  }
  line.truncate(line.len() - 2);
  Ok(line)
}

fn parse_status(line: &str) -> Result<Reply> {
  match line {
    "STORED" => Ok(Reply::Stored),
    "NOT_STORED" => Ok(Reply::NotStored),
    "EXISTS" => Ok(Reply::Exists),
    "NOT_FOUND" => Ok(Reply::NotFound),
    "DELETED" => Ok(Reply::Deleted),
    "OK" => Ok(Reply::Ok),
    "ERROR" => Err(Error::Server("ERROR".to_string())),
    _ => {
      if let Some(version) = line.strip_prefix("VERSION ") {
        Ok(Reply::Version(version.to_string()))
      } else if line.starts_with("CLIENT_ERROR") || line.starts_with("SERVER_ERROR") {
        Err(Error::Server(line.to_string()))
      } else {
        Err(Error::Protocol(format!("unexpected reply {:?}", line)))
      }
    }
  }
}

fn read_values<R: BufRead>(reader: &mut R) -> Result<Reply> {
  let mut values = Vec::new();
  loop {
    let line = read_line(reader)?;
    if line == "END" {
      return Ok(Reply::Values(values));
    }
    let header = match line.strip_prefix("VALUE ") {
      Some(header) => header,
      None => {
        // Surfaces SERVER_ERROR and friends as such.
        let reply = parse_status(&line)?;
        return Err(Error::Protocol(format!(
          "expected VALUE or END, got {:?}",
          reply
        )));
      }
    };

    let mut parts = header.split(' ');
    let key = parts.next().unwrap_or_default().to_string();
    let flags = parse_number::<u32>(parts.next(), "flags")?;
    let len = parse_number::<usize>(parts.next(), "bytes")?;
    let cas = match parts.next() {
      Some(raw) => Some(parse_number::<u64>(Some(raw), "cas unique")?),
      None => None,
    };

    let block = match len.checked_add(2) {
      Some(block) if len <= MAX_VALUE_LENGTH => block,
      _ => {
        return Err(Error::Protocol(format!(
          "value for '{}' claims {} bytes, limit is {}",
          key, len, MAX_VALUE_LENGTH
        )))
      }
    };
    let mut data = vec![0u8; block];
    reader.read_exact(&mut data)?;
    if &data[len..] != b"\r\n" {
      return Err(Error::Protocol(format!("data block for '{}' not terminated", key)));
    }
    data.truncate(len);
    values.push(Value {
      key,
      flags,
      cas,
      data,
    });
  }
}

fn parse_number<T: std::str::FromStr>(raw: Option<&str>, field: &str) -> Result<T> {
  raw
    .and_then(|s| s.parse().ok())
    .ok_or_else(|| Error::Protocol(format!("bad {} in VALUE line: {:?}", field, raw)))
}
