//! Error types for the coordinator.

use thiserror::Error;
use velin_workflow::WorkflowStatus;

/// Errors raised by the coordinator.
///
/// Execution failures and timeouts are not errors here; they are
/// described in the returned record. These variants cover precondition
/// violations and collaborator failures only.
#[derive(Debug, Error)]
pub enum RunnerError {
  /// The workflow is not in the `ready` state.
  #[error("workflow {workflow_id} is not ready for execution (status: {status:?})")]
  NotReady {
    workflow_id: String,
    status: WorkflowStatus,
  },

  /// The workflow does not exist in the store (or has expired).
  #[error("workflow {0} not found")]
  WorkflowNotFound(String),

  /// The settings are unusable.
  #[error(transparent)]
  Config(#[from] velin_config::ConfigError),

  /// The document client could not be constructed.
  #[error("failed to construct document client: {0}")]
  Client(#[from] velin_client::ClientError),

  /// The storage collaborator failed.
  #[error("storage error: {0}")]
  Store(#[from] velin_store::Error),
}
