use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Data-layer configuration: API endpoint plus client and cache defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DataLayerConfig {
  #[serde(default)]
  pub api: ApiConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL all relative request paths resolve against
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-attempt timeout
  #[serde(default = "default_timeout_ms")]
  pub timeout_ms: u64,
  /// Default retry budget for the request client (attempts = retries + 1)
  #[serde(default = "default_retries")]
  pub retries: u32,
  /// Base delay for exponential backoff between attempts
  #[serde(default = "default_retry_delay_ms")]
  pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// Maximum number of entries held at once
  #[serde(default = "default_max_size")]
  pub max_size: usize,
  /// TTL applied when a `set` doesn't specify one
  #[serde(default = "default_ttl_ms")]
  pub default_ttl_ms: u64,
  /// Periodic sweep interval; coarser than typical TTLs
  #[serde(default = "default_sweep_interval_ms")]
  pub sweep_interval_ms: u64,
}

fn default_base_url() -> String {
  "http://localhost:8080/api/".to_string()
}

fn default_timeout_ms() -> u64 {
  10_000
}

fn default_retries() -> u32 {
  2
}

fn default_retry_delay_ms() -> u64 {
  300
}

fn default_max_size() -> usize {
  200
}

fn default_ttl_ms() -> u64 {
  30_000
}

fn default_sweep_interval_ms() -> u64 {
  60_000
}

impl Default for ApiConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_ms: default_timeout_ms(),
      retries: default_retries(),
      retry_delay_ms: default_retry_delay_ms(),
    }
  }
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      max_size: default_max_size(),
      default_ttl_ms: default_ttl_ms(),
      sweep_interval_ms: default_sweep_interval_ms(),
    }
  }
}

impl DataLayerConfig {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./dashfetch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/dashfetch/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/dashfetch/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("dashfetch.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("dashfetch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self> {
    let config: DataLayerConfig = serde_yaml::from_str(contents)?;
    Ok(config)
  }

  /// Get the API token from environment variables.
  ///
  /// Checks DASHFETCH_API_TOKEN first, then API_TOKEN as fallback.
  pub fn api_token_from_env() -> Result<String> {
    std::env::var("DASHFETCH_API_TOKEN")
      .or_else(|_| std::env::var("API_TOKEN"))
      .map_err(|_| {
        eyre!("API token not found. Set DASHFETCH_API_TOKEN or API_TOKEN environment variable.")
      })
  }
}
