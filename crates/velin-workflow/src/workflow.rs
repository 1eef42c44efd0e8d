use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Status of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
  /// Created but code generation has not produced runnable code yet.
  Draft,
  /// Code generation succeeded; the workflow can be executed.
  Ready,
  /// Code generation failed; see `error`.
  Failed,
}

/// A named, generated piece of workflow code plus its description.
///
/// Workflows are immutable once ready except for regeneration, which
/// replaces the code and bumps `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
  pub id: String,
  pub name: String,
  pub description: String,
  pub code: String,
  pub status: WorkflowStatus,
  pub error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}

impl Workflow {
  /// Create a workflow that has no generated code yet.
  pub fn draft(name: impl Into<String>, description: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      name: name.into(),
      description: description.into(),
      code: String::new(),
      status: WorkflowStatus::Draft,
      error: None,
      created_at: now,
      updated_at: now,
    }
  }

  /// Create a workflow whose code generation succeeded.
  pub fn ready(name: impl Into<String>, description: impl Into<String>, code: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      name: name.into(),
      description: description.into(),
      code: code.into(),
      status: WorkflowStatus::Ready,
      error: None,
      created_at: now,
      updated_at: now,
    }
  }

  /// Create a workflow whose code generation failed.
  pub fn failed(name: impl Into<String>, description: impl Into<String>, error: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: uuid::Uuid::new_v4().to_string(),
      name: name.into(),
      description: description.into(),
      code: String::new(),
      status: WorkflowStatus::Failed,
      error: Some(error.into()),
      created_at: now,
      updated_at: now,
    }
  }

  /// Replace the generated code after a successful regeneration.
  pub fn replace_code(&mut self, code: impl Into<String>) {
    self.code = code.into();
    self.status = WorkflowStatus::Ready;
    self.error = None;
    self.updated_at = Utc::now();
  }

  /// Record a failed regeneration. The previous code is discarded.
  pub fn mark_generation_failed(&mut self, error: impl Into<String>) {
    self.code = String::new();
    self.status = WorkflowStatus::Failed;
    self.error = Some(error.into());
    self.updated_at = Utc::now();
  }

  pub fn is_ready(&self) -> bool {
    self.status == WorkflowStatus::Ready
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn ready_workflow_has_code_and_no_error() {
    let wf = Workflow::ready("invoices", "extract totals", "function execute_workflow(i) end");
    assert_eq!(wf.status, WorkflowStatus::Ready);
    assert!(wf.error.is_none());
    assert!(wf.is_ready());
  }

  #[test]
  fn replace_code_bumps_updated_at_and_clears_error() {
    let mut wf = Workflow::failed("invoices", "extract totals", "model returned garbage");
    assert!(!wf.is_ready());

    let before = wf.updated_at;
    wf.replace_code("function execute_workflow(i) return i end");

    assert_eq!(wf.status, WorkflowStatus::Ready);
    assert!(wf.error.is_none());
    assert!(wf.updated_at >= before);
  }
}
