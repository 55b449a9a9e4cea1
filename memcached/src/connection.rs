use crate::error::{Error, Result};
use crate::protocol::{read_reply, Reply, Request};

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, warn};

/// Socket settings shared by every connection to every server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectOptions {
  pub connect_timeout: Duration,
  pub io_timeout: Duration,
  pub pool_size: usize,
}

impl Default for ConnectOptions {
  fn default() -> Self {
    Self {
      connect_timeout: Duration::from_secs(1),
      io_timeout: Duration::from_secs(1),
      pool_size: 4,
    }
  }
}

/// One blocking connection to one server.
pub(crate) struct Connection {
  reader: BufReader<TcpStream>,
  writer: TcpStream,
  buf: Vec<u8>,
}

impl Connection {
  pub(crate) fn open(addr: &str, options: &ConnectOptions) -> Result<Self> {
    let mut last_err = None;
    for socket in addr.to_socket_addrs()? {
      match TcpStream::connect_timeout(&socket, options.connect_timeout) {
        Ok(stream) => {
          stream.set_read_timeout(Some(options.io_timeout))?;
          stream.set_write_timeout(Some(options.io_timeout))?;
          stream.set_nodelay(true)?;
          let writer = stream.try_clone()?;
          debug!(addr = %addr, "connected to memcached");
          return Ok(Self {
            reader: BufReader::new(stream),
            writer,
            buf: Vec::with_capacity(256),
          });
        }
        Err(err) => last_err = Some(err),
      }
    }
    Err(match last_err {
      Some(err) => Error::Io(err),
      None => Error::Protocol(format!("'{}' resolved to no addresses", addr)),
    })
  }

  pub(crate) fn request(&mut self, request: &Request<'_>) -> Result<Reply> {
    self.buf.clear();
    request.encode(&mut self.buf)?;
    self.writer.write_all(&self.buf)?;
    self.writer.flush()?;
    read_reply(&mut self.reader, request.expects_values())
  }
}

/// Idle connections to one server.
///
/// A connection is handed back only after a clean round-trip; anything that
/// failed mid-request may have unread bytes on the wire and is dropped.
pub(crate) struct Pool {
  addr: String,
  options: ConnectOptions,
  idle: Mutex<Vec<Connection>>,
}

impl Pool {
  pub(crate) fn new(addr: String, options: ConnectOptions) -> Self {
    Self {
      addr,
      options,
      idle: Mutex::new(Vec::with_capacity(options.pool_size)),
    }
  }

  pub(crate) fn addr(&self) -> &str {
    &self.addr
  }

  pub(crate) fn request(&self, request: &Request<'_>) -> Result<Reply> {
    let pooled = self.idle.lock().pop();
    let mut conn = match pooled {
      Some(conn) => conn,
      None => Connection::open(&self.addr, &self.options)?,
    };

    match conn.request(request) {
      Ok(reply) => {
        let mut idle = self.idle.lock();
        if idle.len() < self.options.pool_size {
          idle.push(conn);
        }
        Ok(reply)
      }
      Err(err @ Error::InvalidKey(_)) => {
        // Rejected before anything was written.
        self.idle.lock().push(conn);
        Err(err)
      }
      Err(err) => {
        warn!(addr = %self.addr, error = %err, "dropping memcached connection");
        Err(err)
      }
    }
  }
}
