//! Server configuration, deserialised from `config.toml` layered with
//! `RESTOCK_*` environment variables.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use restock_core::NotifierConfig;
use serde::Deserialize;

/// Runtime server configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  pub host:                String,
  pub port:                u16,
  pub store_path:          PathBuf,
  #[serde(default = "default_channel")]
  pub default_channel:     String,
  pub admin_username:      String,
  pub admin_password_hash: String,
  #[serde(default = "default_bus_capacity")]
  pub bus_capacity:        usize,
  #[serde(default)]
  pub notifier:            NotifierConfig,
}

fn default_channel() -> String { "default".into() }

fn default_bus_capacity() -> usize { restock_notify::bus::DEFAULT_CAPACITY }

fn environment() -> config::Environment {
  config::Environment::with_prefix("RESTOCK")
    .prefix_separator("_")
    .separator("__")
}

impl ServerConfig {
  /// Read `path` (optional) and the environment. Top-level keys take a
  /// single underscore after the prefix (`RESTOCK_PORT=8080`); nested keys
  /// use a double underscore (`RESTOCK_NOTIFIER__ENABLE_EMAIL=false`).
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::load_with(path, environment())
  }

  fn load_with(path: &Path, env: config::Environment) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(env)
      .build()
      .context("failed to read config file")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  /// `store_path` with a leading `~` expanded.
  pub fn resolved_store_path(&self) -> PathBuf {
    let s = self.store_path.to_string_lossy();
    if let Some(rest) = s.strip_prefix("~/")
      && let Ok(home) = std::env::var("HOME")
    {
      return PathBuf::from(home).join(rest);
    }
    self.store_path.clone()
  }
}
