use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One execution request: the user's free-text input plus the remote file
/// ids attached to this run.
///
/// `attached_file_ids` is handed to the generated code exactly as given.
/// Ordering may encode document roles (e.g. the first file is the primary
/// document), so it is never reordered or deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
  pub user_input: String,
  #[serde(default)]
  pub attached_file_ids: Vec<i64>,
}

/// Status of a workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
  Running,
  Completed,
  Failed,
  Timeout,
}

impl ExecutionStatus {
  pub fn is_terminal(&self) -> bool {
    !matches!(self, ExecutionStatus::Running)
  }
}

/// The finalized outcome of one workflow execution.
///
/// Created with status `running` when the execution starts and finalized
/// exactly once: `result` is set iff the run completed, `error` iff it
/// failed or timed out. The two are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
  pub execution_id: String,
  pub workflow_id: String,
  pub status: ExecutionStatus,
  pub result: Option<String>,
  pub error: Option<String>,
  pub execution_time_seconds: f64,
  pub started_at: DateTime<Utc>,
  pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionRecord {
  /// Create a record for an execution that has just started.
  pub fn started(workflow_id: impl Into<String>) -> Self {
    Self {
      execution_id: uuid::Uuid::new_v4().to_string(),
      workflow_id: workflow_id.into(),
      status: ExecutionStatus::Running,
      result: None,
      error: None,
      execution_time_seconds: 0.0,
      started_at: Utc::now(),
      finished_at: None,
    }
  }

  /// Finalize as completed with the produced report.
  pub fn mark_completed(&mut self, result: impl Into<String>, elapsed_seconds: f64) {
    self.status = ExecutionStatus::Completed;
    self.result = Some(result.into());
    self.error = None;
    self.finalize(elapsed_seconds);
  }

  /// Finalize as failed with the error description.
  pub fn mark_failed(&mut self, error: impl Into<String>, elapsed_seconds: f64) {
    self.status = ExecutionStatus::Failed;
    self.result = None;
    self.error = Some(error.into());
    self.finalize(elapsed_seconds);
  }

  /// Finalize as timed out.
  pub fn mark_timed_out(&mut self, error: impl Into<String>, elapsed_seconds: f64) {
    self.status = ExecutionStatus::Timeout;
    self.result = None;
    self.error = Some(error.into());
    self.finalize(elapsed_seconds);
  }

  fn finalize(&mut self, elapsed_seconds: f64) {
    self.execution_time_seconds = elapsed_seconds;
    self.finished_at = Some(Utc::now());
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn result_and_error_are_mutually_exclusive() {
    let mut record = ExecutionRecord::started("wf-1");
    assert_eq!(record.status, ExecutionStatus::Running);
    assert!(record.result.is_none() && record.error.is_none());

    record.mark_completed("report", 1.5);
    assert_eq!(record.status, ExecutionStatus::Completed);
    assert!(record.result.is_some() && record.error.is_none());

    let mut record = ExecutionRecord::started("wf-1");
    record.mark_failed("boom", 0.2);
    assert_eq!(record.status, ExecutionStatus::Failed);
    assert!(record.result.is_none() && record.error.is_some());

    let mut record = ExecutionRecord::started("wf-1");
    record.mark_timed_out("exceeded 10s", 10.0);
    assert_eq!(record.status, ExecutionStatus::Timeout);
    assert!(record.result.is_none() && record.error.is_some());
    assert!(record.finished_at.is_some());
  }

  #[test]
  fn timeout_is_distinguishable_from_failure() {
    let mut timed_out = ExecutionRecord::started("wf-1");
    timed_out.mark_timed_out("exceeded budget", 30.0);
    let mut failed = ExecutionRecord::started("wf-1");
    failed.mark_failed("exceeded budget", 30.0);
    assert_ne!(timed_out.status, failed.status);
  }
}
