//! Velin Config
//!
//! Runtime settings for the workflow system: the document service API key
//! and base URL, the execution wall-clock budget, and the polling windows
//! for file ingestion and document analysis.
//!
//! Settings are loaded from environment variables. The API key is the only
//! mandatory value; its absence is a startup-time configuration error, not
//! something discovered on the first call.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// Default base URL for the document-intelligence service.
pub const DEFAULT_BASE_URL: &str = "https://paradigm.lighton.ai";

/// Default wall-clock budget for one workflow execution.
pub const DEFAULT_EXECUTION_TIMEOUT_SECS: u64 = 1800;

/// Errors raised while loading or validating settings.
#[derive(Debug, Error)]
pub enum ConfigError {
  /// The document service API key is not configured.
  #[error("VELIN_API_KEY is required but not set")]
  MissingApiKey,

  /// An environment variable held a value that could not be parsed.
  #[error("invalid value for {var}: {message}")]
  Invalid { var: String, message: String },
}

/// A bounded polling window: how long to keep polling and how long to
/// sleep between polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollWindow {
  pub max_wait_secs: u64,
  pub interval_secs: u64,
}

impl PollWindow {
  pub fn max_wait(&self) -> Duration {
    Duration::from_secs(self.max_wait_secs)
  }

  pub fn interval(&self) -> Duration {
    Duration::from_secs(self.interval_secs)
  }
}

/// Application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
  /// API key for the document-intelligence service.
  pub api_key: String,
  /// Base URL of the document-intelligence service.
  pub base_url: String,
  /// Wall-clock budget for one workflow execution, in seconds.
  pub execution_timeout_secs: u64,
  /// Polling window for file ingestion (upload -> embedded).
  pub ingest_poll: PollWindow,
  /// Polling window for long-running document analysis jobs.
  pub analysis_poll: PollWindow,
}

impl Settings {
  /// Build settings with defaults for everything but the API key.
  pub fn new(api_key: impl Into<String>) -> Self {
    Self {
      api_key: api_key.into(),
      base_url: DEFAULT_BASE_URL.to_string(),
      execution_timeout_secs: DEFAULT_EXECUTION_TIMEOUT_SECS,
      // Ingestion usually settles in seconds; analysis jobs take longer
      // per poll, so they get a wider interval.
      ingest_poll: PollWindow {
        max_wait_secs: 300,
        interval_secs: 2,
      },
      analysis_poll: PollWindow {
        max_wait_secs: 300,
        interval_secs: 5,
      },
    }
  }

  /// Load settings from the environment.
  ///
  /// `VELIN_API_KEY` is mandatory. `VELIN_BASE_URL`,
  /// `VELIN_EXECUTION_TIMEOUT_SECS`, `VELIN_INGEST_MAX_WAIT_SECS`,
  /// `VELIN_INGEST_POLL_INTERVAL_SECS`, `VELIN_ANALYSIS_MAX_WAIT_SECS` and
  /// `VELIN_ANALYSIS_POLL_INTERVAL_SECS` override the defaults.
  pub fn from_env() -> Result<Self, ConfigError> {
    let api_key = env::var("VELIN_API_KEY")
      .ok()
      .filter(|v| !v.trim().is_empty())
      .ok_or(ConfigError::MissingApiKey)?;

    let mut settings = Settings::new(api_key);

    if let Ok(base_url) = env::var("VELIN_BASE_URL") {
      if !base_url.trim().is_empty() {
        settings.base_url = base_url;
      }
    }

    settings.execution_timeout_secs =
      env_secs("VELIN_EXECUTION_TIMEOUT_SECS", settings.execution_timeout_secs)?;
    settings.ingest_poll.max_wait_secs =
      env_secs("VELIN_INGEST_MAX_WAIT_SECS", settings.ingest_poll.max_wait_secs)?;
    settings.ingest_poll.interval_secs =
      env_secs("VELIN_INGEST_POLL_INTERVAL_SECS", settings.ingest_poll.interval_secs)?;
    settings.analysis_poll.max_wait_secs =
      env_secs("VELIN_ANALYSIS_MAX_WAIT_SECS", settings.analysis_poll.max_wait_secs)?;
    settings.analysis_poll.interval_secs =
      env_secs("VELIN_ANALYSIS_POLL_INTERVAL_SECS", settings.analysis_poll.interval_secs)?;

    settings.validate()?;
    Ok(settings)
  }

  /// Validate that the settings are usable.
  pub fn validate(&self) -> Result<(), ConfigError> {
    if self.api_key.trim().is_empty() {
      return Err(ConfigError::MissingApiKey);
    }
    Url::parse(&self.base_url).map_err(|e| ConfigError::Invalid {
      var: "VELIN_BASE_URL".to_string(),
      message: e.to_string(),
    })?;
    Ok(())
  }

  pub fn execution_timeout(&self) -> Duration {
    Duration::from_secs(self.execution_timeout_secs)
  }
}

fn env_secs(var: &str, default: u64) -> Result<u64, ConfigError> {
  match env::var(var) {
    Ok(value) if !value.trim().is_empty() => {
      value.trim().parse::<u64>().map_err(|e| ConfigError::Invalid {
        var: var.to_string(),
        message: e.to_string(),
      })
    }
    _ => Ok(default),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn defaults_are_applied() {
    let settings = Settings::new("sk-test");
    assert_eq!(settings.base_url, DEFAULT_BASE_URL);
    assert_eq!(settings.execution_timeout_secs, 1800);
    assert_eq!(settings.ingest_poll.interval_secs, 2);
    assert_eq!(settings.analysis_poll.interval_secs, 5);
    assert!(settings.validate().is_ok());
  }

  #[test]
  fn empty_api_key_fails_validation() {
    let settings = Settings::new("   ");
    assert!(matches!(settings.validate(), Err(ConfigError::MissingApiKey)));
  }

  #[test]
  fn bad_base_url_fails_validation() {
    let mut settings = Settings::new("sk-test");
    settings.base_url = "not a url".to_string();
    assert!(matches!(settings.validate(), Err(ConfigError::Invalid { .. })));
  }
}
