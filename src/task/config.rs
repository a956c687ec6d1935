//! Task tuning: commit-hook cadence and idle polling.
//!
//! Loaded from JSON (all fields optional) and overridable from the environment:
//!
//! - `STREAMS_COMMIT_INTERVAL_MS`: period of the processors' commit hook; `0` disables it.
//! - `STREAMS_IDLE_BACKOFF_MS`: pause after a source reports nothing available.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::ConfigError;

pub const COMMIT_INTERVAL_ENV: &str = "STREAMS_COMMIT_INTERVAL_MS";
pub const IDLE_BACKOFF_ENV: &str = "STREAMS_IDLE_BACKOFF_MS";

/// Settings for a [crate::Task].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
  /// Milliseconds between calls to every processor's `commit` hook; `0` disables them.
  pub commit_interval_ms: u64,
  /// Milliseconds a pump waits after its source reports nothing available.
  pub idle_backoff_ms: u64,
}

impl Default for TaskConfig {
  fn default() -> Self {
    Self {
      commit_interval_ms: 1000,
      idle_backoff_ms: 10,
    }
  }
}

impl TaskConfig {
  pub fn commit_interval(&self) -> Option<Duration> {
    (self.commit_interval_ms > 0).then(|| Duration::from_millis(self.commit_interval_ms))
  }

  pub fn idle_backoff(&self) -> Duration {
    Duration::from_millis(self.idle_backoff_ms)
  }

  pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
    Ok(serde_json::from_str(json)?)
  }

  #[instrument(level = "trace")]
  pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
    let bytes = std::fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
  }

  /// Applies `STREAMS_*` environment overrides.
  pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
    self.with_overrides(|var| std::env::var(var).ok())
  }

  pub(crate) fn with_overrides(
    mut self,
    lookup: impl Fn(&str) -> Option<String>,
  ) -> Result<Self, ConfigError> {
    if let Some(ms) = parse_override(COMMIT_INTERVAL_ENV, &lookup)? {
      self.commit_interval_ms = ms;
    }
    if let Some(ms) = parse_override(IDLE_BACKOFF_ENV, &lookup)? {
      self.idle_backoff_ms = ms;
    }
    Ok(self)
  }
}

fn parse_override(
  var: &str,
  lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Option<u64>, ConfigError> {
  let Some(value) = lookup(var) else {
    return Ok(None);
  };
  value
    .trim()
    .parse()
    .map(Some)
    .map_err(|_| ConfigError::InvalidEnv {
      var: var.to_string(),
      value,
    })
}
