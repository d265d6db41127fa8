//! Layered settings: built-in defaults, then `hnsync.toml` (or `--config`),
//! then `HNSYNC_*` environment variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `HNSYNC_RETRY__MAX_RETRIES=5`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use anyhow::Context as _;
use hnsync_client::{ClientConfig, DEFAULT_BASE_URL, FeedConfig};
use hnsync_core::{ItemId, sink::KidsPolicy};
use hnsync_pipeline::{PipelineConfig, RetryConfig};
use serde::Deserialize;

pub const DEFAULT_CONFIG_FILE: &str = "hnsync.toml";
const ENV_PREFIX: &str = "HNSYNC";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
  pub base_url:             String,
  pub request_timeout_secs: u64,
  pub batch_size:           usize,
  pub workers:              usize,
  pub safety_offset:        ItemId,
  pub floor_id:             ItemId,
  pub live_chunk:           usize,
  pub kids:                 KidsPolicy,
  pub retry:                RetryConfig,
  pub feed:                 FeedSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FeedSettings {
  pub reconnect_initial_ms: u64,
  pub reconnect_max_ms:     u64,
}

impl Default for Settings {
  fn default() -> Self {
    let pipeline = PipelineConfig::default();
    Self {
      base_url:             DEFAULT_BASE_URL.to_string(),
      request_timeout_secs: 30,
      batch_size:           pipeline.batch_size,
      workers:              pipeline.workers,
      safety_offset:        pipeline.safety_offset,
      floor_id:             pipeline.floor_id,
      live_chunk:           pipeline.live_chunk,
      kids:                 pipeline.kids,
      retry:                pipeline.retry,
      feed:                 FeedSettings::default(),
    }
  }
}

impl Default for FeedSettings {
  fn default() -> Self {
    Self { reconnect_initial_ms: 1_000, reconnect_max_ms: 60_000 }
  }
}

impl Settings {
  /// Load settings. An explicit `path` must exist; the default file is
  /// optional.
  pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
    let file = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

    config::Config::builder()
      .add_source(config::File::from(file.clone()).required(path.is_some()))
      .add_source(
        config::Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()
      .with_context(|| format!("failed to read configuration from {}", file.display()))?
      .try_deserialize()
      .context("failed to deserialise configuration")
  }

  pub fn pipeline(&self) -> PipelineConfig {
    PipelineConfig {
      batch_size:    self.batch_size,
      workers:       self.workers,
      safety_offset: self.safety_offset,
      floor_id:      self.floor_id,
      live_chunk:    self.live_chunk,
      kids:          self.kids,
      retry:         self.retry.clone(),
    }
  }

  pub fn client(&self) -> ClientConfig {
    ClientConfig {
      base_url: self.base_url.clone(),
      timeout:  Duration::from_secs(self.request_timeout_secs),
    }
  }

  pub fn feed(&self) -> FeedConfig {
    FeedConfig {
      reconnect_initial: Duration::from_millis(self.feed.reconnect_initial_ms),
      reconnect_max:     Duration::from_millis(self.feed.reconnect_max_ms),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_without_a_file() {
    let settings = Settings::load(None).unwrap();
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.batch_size, 512);
    assert_eq!(settings.safety_offset, 100_000);
    assert_eq!(settings.retry.max_retries, 3);
    assert_eq!(settings.feed().reconnect_max, Duration::from_secs(60));
  }

  #[test]
  fn file_overrides_only_what_it_names() {
    let path = std::env::temp_dir().join(format!("hnsync-config-{}.toml", std::process::id()));
    std::fs::write(
      &path,
      "workers = 16\nkids = \"additive\"\n\n[retry]\nmax_retries = 0\n",
    )
    .unwrap();

    let settings = Settings::load(Some(&path)).unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(settings.workers, 16);
    assert_eq!(settings.kids, KidsPolicy::Additive);
    assert_eq!(settings.retry.max_retries, 0);
    assert_eq!(settings.retry.min_delay_ms, 250);
    assert_eq!(settings.batch_size, 512);

    let pipeline = settings.pipeline();
    assert_eq!(pipeline.workers, 16);
    assert_eq!(pipeline.retry, RetryConfig { max_retries: 0, ..RetryConfig::default() });
  }

  #[test]
  fn explicit_missing_file_is_an_error() {
    assert!(Settings::load(Some(Path::new("/nonexistent/hnsync.toml"))).is_err());
  }
}
