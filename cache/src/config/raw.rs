use serde::Deserialize;

// --- Top Level Config ---
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ConfigRaw {
  #[serde(default = "default_max_list_size")]
  pub max_list_size: usize,
  #[serde(default = "default_expiration")]
  pub expiration: String,
  #[serde(default = "default_shards")]
  pub shards: usize,
  #[serde(default)]
  pub cas: CasConfigRaw,
  #[serde(default)]
  pub memcached: MemcachedConfigRaw,
}

impl Default for ConfigRaw {
  fn default() -> Self {
    Self {
      max_list_size: default_max_list_size(),
      expiration: default_expiration(),
      shards: default_shards(),
      cas: CasConfigRaw::default(),
      memcached: MemcachedConfigRaw::default(),
    }
  }
}

fn default_max_list_size() -> usize {
  10_000
}

fn default_expiration() -> String {
  "30days".to_string()
}

fn default_shards() -> usize {
  16
}

// --- Compare-and-swap loop ---
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CasConfigRaw {
  #[serde(default = "default_cas_attempts")]
  pub max_attempts: u32,
  #[serde(default = "default_one_second")]
  pub timeout: String,
}

impl Default for CasConfigRaw {
  fn default() -> Self {
    Self {
      max_attempts: default_cas_attempts(),
      timeout: default_one_second(),
    }
  }
}

fn default_cas_attempts() -> u32 {
  64
}

fn default_one_second() -> String {
  "1s".to_string()
}

// --- Memcached servers ---
#[derive(Debug, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct MemcachedConfigRaw {
  #[serde(default = "default_servers")]
  pub servers: Vec<String>,
  #[serde(default = "default_one_second")]
  pub connect_timeout: String,
  #[serde(default = "default_one_second")]
  pub io_timeout: String,
  #[serde(default = "default_pool_size")]
  pub pool_size: usize,
}

impl Default for MemcachedConfigRaw {
  fn default() -> Self {
    Self {
      servers: default_servers(),
      connect_timeout: default_one_second(),
      io_timeout: default_one_second(),
      pool_size: default_pool_size(),
    }
  }
}

fn default_servers() -> Vec<String> {
  vec!["127.0.0.1:11211".to_string()]
}

fn default_pool_size() -> usize {
  4
}
