//! [`ServerConfig`] and its loading from `tally.toml` plus `TALLY_*`
//! environment variables.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::{Context as _, bail};
use serde::Deserialize;
use tally_core::engagement::{DEFAULT_VIEW_COOLDOWN_SECS, default_view_cooldown};
use tally_store_sqlite::{RetryPolicy, StorePolicy};

/// Prefix for environment overrides, e.g. `TALLY_PORT=8080`.
pub const ENV_PREFIX: &str = "TALLY";

/// Runtime server configuration. Every key is optional.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
  pub host:                      String,
  pub port:                      u16,
  pub store_path:                PathBuf,
  /// Seconds before a repeat view from the same identity counts again.
  pub view_cooldown_secs:        u64,
  pub spotlight_ttl_secs:        u64,
  pub spotlight_sweep_secs:      u64,
  /// Extra attempts after a transient database failure.
  pub retries:                   u32,
  pub retry_base_delay_ms:       u64,
  /// Delete view facts older than this many days. Unset keeps them forever.
  pub view_retention_days:       Option<u64>,
  pub maintenance_interval_secs: u64,
}

impl Default for ServerConfig {
  fn default() -> Self {
    let retry = RetryPolicy::default();
    Self {
      host:                      "127.0.0.1".to_string(),
      port:                      8080,
      store_path:                PathBuf::from("tally.db"),
      view_cooldown_secs:        DEFAULT_VIEW_COOLDOWN_SECS.unsigned_abs(),
      spotlight_ttl_secs:        tally_spotlight::DEFAULT_TTL.as_secs(),
      spotlight_sweep_secs:      tally_spotlight::DEFAULT_SWEEP_INTERVAL.as_secs(),
      retries:                   retry.retries,
      retry_base_delay_ms:       u64::try_from(retry.base_delay.as_millis())
        .unwrap_or(u64::MAX),
      view_retention_days:       None,
      maintenance_interval_secs: 3600,
    }
  }
}

impl ServerConfig {
  /// Read `path` (if it exists), apply `TALLY_*` overrides, and validate.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix(ENV_PREFIX).try_parsing(true))
      .build()
      .context("failed to read config file")?;

    let cfg: ServerConfig = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    cfg.validate()?;
    Ok(cfg)
  }

  pub fn validate(&self) -> anyhow::Result<()> {
    if self.spotlight_ttl_secs == 0 {
      bail!("spotlight_ttl_secs must be positive");
    }
    if self.spotlight_sweep_secs == 0 {
      bail!("spotlight_sweep_secs must be positive");
    }
    if self.maintenance_interval_secs == 0 {
      bail!("maintenance_interval_secs must be positive");
    }
    if cooldown_from_secs(self.view_cooldown_secs).is_none() {
      bail!("view_cooldown_secs is out of range");
    }
    Ok(())
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  /// `store_path` with a leading `~` expanded to the home directory.
  pub fn store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }

  pub fn view_cooldown(&self) -> chrono::Duration {
    cooldown_from_secs(self.view_cooldown_secs).unwrap_or_else(default_view_cooldown)
  }

  pub fn store_policy(&self) -> StorePolicy {
    StorePolicy {
      view_cooldown: self.view_cooldown(),
      retry:         RetryPolicy {
        retries:    self.retries,
        base_delay: Duration::from_millis(self.retry_base_delay_ms),
      },
    }
  }

  pub fn spotlight_ttl(&self) -> Duration { Duration::from_secs(self.spotlight_ttl_secs) }

  pub fn spotlight_sweep(&self) -> Duration {
    Duration::from_secs(self.spotlight_sweep_secs)
  }

  pub fn maintenance_interval(&self) -> Duration {
    Duration::from_secs(self.maintenance_interval_secs)
  }

  /// How long view facts are kept, if purging is enabled.
  ///
  /// Never shorter than the cooldown: purging a fact inside its cooldown
  /// would let the same viewer count again early.
  pub fn view_retention(&self) -> Option<chrono::Duration> {
    let days = self.view_retention_days?;
    let requested = i64::try_from(days).ok().and_then(chrono::Duration::try_days)?;
    let cooldown = self.view_cooldown();
    if requested < cooldown {
      tracing::warn!(
        view_retention_days = days,
        view_cooldown_secs = self.view_cooldown_secs,
        "view retention shorter than the cooldown, using the cooldown"
      );
      return Some(cooldown);
    }
    Some(requested)
  }
}

fn cooldown_from_secs(secs: u64) -> Option<chrono::Duration> {
  i64::try_from(secs).ok().and_then(chrono::Duration::try_seconds)
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
