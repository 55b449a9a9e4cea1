use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

struct Entry {
  flags: u32,
  data: Vec<u8>,
  cas: u64,
}

#[derive(Default)]
struct State {
  items: Mutex<HashMap<String, Entry>>,
  next_cas: AtomicU64,
}

/// A tiny in-process memcached speaking just enough of the text protocol.
/// Expiration is accepted and ignored.
pub struct FakeMemcached {
  pub addr: String,
}

impl FakeMemcached {
  pub fn start() -> Self {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap().to_string();
    let state = Arc::new(State::default());
    thread::spawn(move || {
      for stream in listener.incoming() {
        let Ok(stream) = stream else { break };
        let state = Arc::clone(&state);
        thread::spawn(move || serve(stream, &state));
      }
    });
    Self { addr }
  }
}

fn serve(stream: TcpStream, state: &State) {
  let mut writer = stream.try_clone().unwrap();
  let mut reader = BufReader::new(stream);
  loop {
    let mut line = String::new();
    match reader.read_line(&mut line) {
      Ok(0) | Err(_) => return,
      Ok(_) => {}
    }
    let parts: Vec<&str> = line.trim_end().split(' ').collect();
    let reply = match parts[0] {
      "get" | "gets" => {
        let items = state.items.lock();
        let mut out = Vec::new();
        for key in &parts[1..] {
          if let Some(e) = items.get(*key) {
            if parts[0] == "gets" {
              write!(out, "VALUE {} {} {} {}\r\n", key, e.flags, e.data.len(), e.cas).unwrap();
            } else {
              write!(out, "VALUE {} {} {}\r\n", key, e.flags, e.data.len()).unwrap();
            }
            out.extend_from_slice(&e.data);
            out.extend_from_slice(b"\r\n");
          }
        }
        out.extend_from_slice(b"END\r\n");
        out
      }
      "set" | "add" | "cas" => {
        let key = parts[1].to_string();
        let flags: u32 = parts[2].parse().unwrap();
        let len: usize = parts[4].parse().unwrap();
        let mut data = vec![0u8; len + 2];
        reader.read_exact(&mut data).unwrap();
        data.truncate(len);
        let cas = state.next_cas.fetch_add(1, Ordering::Relaxed) + 1;
        let mut items = state.items.lock();
        let status = match parts[0] {
          "set" => "STORED",
          "add" if items.contains_key(&key) => "NOT_STORED",
          "add" => "STORED",
          _ => {
            let unique: u64 = parts[5].parse().unwrap();
            match items.get(&key) {
              None => "NOT_FOUND",
              Some(e) if e.cas != unique => "EXISTS",
              Some(_) => "STORED",
            }
          }
        };
        if status == "STORED" {
          items.insert(key, Entry { flags, data, cas });
        }
        format!("{}\r\n", status).into_bytes()
      }
      "delete" => {
        let removed = state.items.lock().remove(parts[1]).is_some();
        if removed {
          b"DELETED\r\n".to_vec()
        } else {
          b"NOT_FOUND\r\n".to_vec()
        }
      }
      "flush_all" => {
        state.items.lock().clear();
        b"OK\r\n".to_vec()
      }
      "version" => b"VERSION 1.6.0-fake\r\n".to_vec(),
      _ => b"ERROR\r\n".to_vec(),
    };
    if writer.write_all(&reply).is_err() {
      return;
    }
  }
}
