use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

/// Environment variable that overrides `server.url`
pub const URL_ENV: &str = "LICDECK_URL";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub server: ServerConfig,
  #[serde(default)]
  pub refresh: RefreshConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Custom title for header (defaults to the server host if not set)
  pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_url")]
  pub url: String,
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
  #[serde(default = "default_retry_attempts")]
  pub retry_attempts: u32,
  /// Retry 4xx responses like any other status error
  #[serde(default = "default_true")]
  pub retry_client_errors: bool,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      url: default_url(),
      timeout_secs: default_timeout_secs(),
      retry_attempts: default_retry_attempts(),
      retry_client_errors: true,
    }
  }
}

impl ServerConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

/// Auto-refresh intervals for the live tabs
#[derive(Debug, Clone, Deserialize)]
pub struct RefreshConfig {
  #[serde(default = "default_dashboard_secs")]
  pub dashboard_secs: u64,
  #[serde(default = "default_control_secs")]
  pub control_secs: u64,
}

impl Default for RefreshConfig {
  fn default() -> Self {
    Self {
      dashboard_secs: default_dashboard_secs(),
      control_secs: default_control_secs(),
    }
  }
}

impl RefreshConfig {
  pub fn dashboard(&self) -> Duration {
    Duration::from_secs(self.dashboard_secs.max(1))
  }

  pub fn control(&self) -> Duration {
    Duration::from_secs(self.control_secs.max(1))
  }
}

/// Lifetimes of cached server lists
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  #[serde(default = "default_modules_ttl_secs")]
  pub modules_ttl_secs: u64,
  #[serde(default = "default_license_types_ttl_secs")]
  pub license_types_ttl_secs: u64,
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      modules_ttl_secs: default_modules_ttl_secs(),
      license_types_ttl_secs: default_license_types_ttl_secs(),
      sweep_interval_secs: default_sweep_interval_secs(),
    }
  }
}

impl CacheConfig {
  pub fn modules_ttl(&self) -> Duration {
    Duration::from_secs(self.modules_ttl_secs)
  }

  pub fn license_types_ttl(&self) -> Duration {
    Duration::from_secs(self.license_types_ttl_secs)
  }

  pub fn sweep_interval(&self) -> Duration {
    Duration::from_secs(self.sweep_interval_secs.max(1))
  }
}

fn default_url() -> String {
  "http://localhost:8000".to_string()
}

fn default_timeout_secs() -> u64 {
  30
}

fn default_retry_attempts() -> u32 {
  3
}

fn default_true() -> bool {
  true
}

fn default_dashboard_secs() -> u64 {
  30
}

fn default_control_secs() -> u64 {
  60
}

fn default_modules_ttl_secs() -> u64 {
  300
}

fn default_license_types_ttl_secs() -> u64 {
  600
}

fn default_sweep_interval_secs() -> u64 {
  300
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./licdeck.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/licdeck/config.yaml
  ///
  /// Without a file the built-in defaults are used. `LICDECK_URL` overrides
  /// the server URL either way.
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

    let config = match path {
      Some(p) => {
        info!(path = %p.display(), "loading config");
        Self::load_from_path(&p)?
      }
      None => {
        info!("no config file found, using defaults");
        Config::default()
      }
    };

    Ok(config.with_url_override(std::env::var(URL_ENV).ok()))
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("licdeck.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("licdeck").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Replace the server URL when an override is given
  pub fn with_url_override(mut self, url: Option<String>) -> Self {
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
      self.server.url = url;
    }
    self
  }

  /// Header title: configured title, or the server's host
  pub fn display_title(&self) -> String {
    match &self.title {
      Some(title) => title.clone(),
      None => url::Url::parse(&self.server.url)
        .ok()
        .and_then(|u| {
          let host = u.host_str()?.to_string();
          Some(match u.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host,
          })
        })
        .unwrap_or_else(|| self.server.url.clone()),
    }
  }
}
