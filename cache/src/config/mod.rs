//! Store configuration, read from YAML or JSON.
//!
//! Files are deserialized into the `raw` structs first and then validated
//! into a [`CacheConfig`].

pub mod processed;
pub mod raw;

pub use processed::{CacheConfig, CasConfig, MemcachedConfig};

use crate::config::raw::ConfigRaw;
use crate::error::{CacheError, Result};

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_BASE_NAME: &str = "stream_cache";
const DEFAULT_CONFIG_EXTENSION: &str = "yaml";

/// Finds the configuration file based on an optional environment suffix.
///
/// Looks for `stream_cache.<env>.yaml`, then `stream_cache.yaml`, in `dir`.
/// The environment comes from the argument, then `STREAM_CACHE_ENV`, then
/// `APP_ENV`.
pub fn find_config_file(dir: &Path, environment_suffix: Option<&str>) -> Result<PathBuf> {
  let base_name = DEFAULT_CONFIG_BASE_NAME;
  let extension = DEFAULT_CONFIG_EXTENSION;

  let env_from_var = environment_suffix
    .map(|s| s.to_string())
    .or_else(|| env::var("STREAM_CACHE_ENV").ok())
    .or_else(|| env::var("APP_ENV").ok());

  let mut files_to_check: Vec<String> = Vec::new();
  if let Some(env_str) = &env_from_var {
    if !env_str.is_empty() {
      files_to_check.push(format!("{}.{}.{}", base_name, env_str, extension));
    }
  }
  files_to_check.push(format!("{}.{}", base_name, extension));

  for file_name in &files_to_check {
    let path = dir.join(file_name);
    if path.is_file() {
      return Ok(path);
    }
  }

  Err(CacheError::ConfigNotFound(format!(
    "Searched for: {:?} in {:?}. Provide a config file or check STREAM_CACHE_ENV/APP_ENV.",
    files_to_check, dir
  )))
}

/// Loads and validates a configuration file. `.json` files are parsed as
/// JSON, anything else as YAML.
pub fn load_config(path: &Path) -> Result<CacheConfig> {
  let contents = fs::read_to_string(path)
    .map_err(|e| CacheError::ConfigRead(format!("{}: {}", path.display(), e)))?;
  let is_json = path
    .extension()
    .map_or(false, |ext| ext.eq_ignore_ascii_case("json"));
  if is_json {
    from_json_str(&contents)
  } else {
    from_yaml_str(&contents)
  }
}

pub fn from_yaml_str(contents: &str) -> Result<CacheConfig> {
  let raw: ConfigRaw =
    serde_yaml::from_str(contents).map_err(|e| CacheError::ConfigParse(e.to_string()))?;
  processed::process_raw_config(raw)
}

pub fn from_json_str(contents: &str) -> Result<CacheConfig> {
  let raw: ConfigRaw =
    serde_json::from_str(contents).map_err(|e| CacheError::ConfigParse(e.to_string()))?;
  processed::process_raw_config(raw)
}
