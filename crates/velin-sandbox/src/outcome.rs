//! Execution outcomes.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Terminal state of a sandboxed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScriptStatus {
  /// The entry function returned; `report` holds its value.
  Completed,
  /// The generated code raised an error; `error` holds the description.
  Failed,
  /// The wall-clock budget was spent before the entry function returned.
  TimedOut,
}

/// The result of one sandboxed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptOutcome {
  pub status: ScriptStatus,
  /// The report returned by the entry function. Set iff completed.
  pub report: Option<String>,
  /// Error description with a truncated traceback. Set iff failed or
  /// timed out.
  pub error: Option<String>,
  /// Everything the generated code printed, in order.
  pub output: String,
  /// Wall-clock time spent in the Running phase.
  #[serde(with = "duration_secs")]
  pub elapsed: Duration,
}

impl ScriptOutcome {
  pub fn is_completed(&self) -> bool {
    self.status == ScriptStatus::Completed
  }
}

mod duration_secs {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64())
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
    let secs = f64::deserialize(deserializer)?;
    Ok(Duration::from_secs_f64(secs.max(0.0)))
  }
}
