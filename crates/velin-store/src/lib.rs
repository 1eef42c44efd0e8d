//! Velin Store
//!
//! This crate provides the storage trait for workflows and execution
//! records, plus the in-memory implementation. External stores (a
//! key-value service, a database) implement the same trait behind the
//! same get/set semantics; entries carry a time-to-live and expired
//! entries behave as absent.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;
use velin_workflow::{ExecutionRecord, Workflow};

/// Error type for storage operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
  /// The requested record was not found (or has expired).
  #[error("not found: {0}")]
  NotFound(String),

  /// The backing store failed.
  #[error("storage error: {0}")]
  Backend(String),
}

/// Storage trait for workflows and execution records.
///
/// Implementations must be safe for concurrent use; callers never hold
/// locks across calls.
#[async_trait]
pub trait Store: Send + Sync {
  /// Store a workflow, replacing any previous version.
  async fn put_workflow(&self, workflow: &Workflow) -> Result<(), Error>;

  /// Get a workflow by id.
  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, Error>;

  /// Store an execution record, replacing any previous version.
  async fn put_execution(&self, record: &ExecutionRecord) -> Result<(), Error>;

  /// Get an execution record by id.
  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error>;
}
