use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::{FreshnessPolicy, ResourceKind};

/// Env var holding the session token; wins over the stored one.
pub const TOKEN_ENV: &str = "CDIR_TOKEN";

const MIN_DEBOUNCE_MS: u64 = 500;
const MAX_DEBOUNCE_MS: u64 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub blog: BlogConfig,
  pub backend: BackendConfig,
  #[serde(default)]
  pub feed: FeedConfig,
  #[serde(default)]
  pub cache: CacheConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BlogConfig {
  /// CMS base URL; the REST prefix is appended
  pub url: String,
  #[serde(default = "default_per_page")]
  pub per_page: u32,
  /// Only list posts of this category
  pub category: Option<u64>,
}

fn default_per_page() -> u32 {
  10
}

#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
  /// Serves the contacts and video endpoints
  pub url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
  #[serde(default = "default_debounce_ms")]
  pub debounce_ms: u64,
}

fn default_debounce_ms() -> u64 {
  800
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      debounce_ms: default_debounce_ms(),
    }
  }
}

impl FeedConfig {
  /// Load-more debounce, clamped to 500..=1000 ms.
  pub fn debounce(&self) -> Duration {
    Duration::from_millis(self.debounce_ms.clamp(MIN_DEBOUNCE_MS, MAX_DEBOUNCE_MS))
  }
}

/// Optional TTL overrides, in minutes.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  pub contacts_ttl_minutes: Option<u64>,
  pub posts_ttl_minutes: Option<u64>,
  pub videos_ttl_minutes: Option<u64>,
}

impl CacheConfig {
  /// The policy for `kind`: the override when set and valid, else the default.
  pub fn policy(&self, kind: ResourceKind) -> FreshnessPolicy {
    let minutes = match kind {
      ResourceKind::Contacts => self.contacts_ttl_minutes,
      ResourceKind::Posts => self.posts_ttl_minutes,
      ResourceKind::Videos => self.videos_ttl_minutes,
    };
    minutes
      .and_then(FreshnessPolicy::from_minutes)
      .unwrap_or_else(|| kind.default_policy())
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./cdir.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/cdir/config.yaml
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
        "No configuration file found. Create one at ~/.config/cdir/config.yaml\n\
                 See cdir.example.yaml for the format."
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("cdir.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("cdir").join("config.yaml");
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

  fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    if config.blog.per_page == 0 {
      return Err(eyre!("blog.per_page must be at least 1"));
    }
    Ok(config)
  }

  /// Get the session token from the environment, if set and non-blank.
  pub fn get_token() -> Option<String> {
    std::env::var(TOKEN_ENV)
      .ok()
      .filter(|t| !t.trim().is_empty())
  }
}
