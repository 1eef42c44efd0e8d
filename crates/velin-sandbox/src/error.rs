//! Error types for sandbox execution.

use thiserror::Error;

/// Host-side errors: the run could not be started at all.
///
/// Failures of the generated code itself (runtime errors, timeouts) are
/// not errors at this level; they are reported in the
/// [`ScriptOutcome`](crate::ScriptOutcome) so the caller always receives a
/// definite result for a run that entered the Running phase.
#[derive(Debug, Error)]
pub enum SandboxError {
  /// The generated code does not parse. Not retryable as-is; the
  /// workflow needs to be regenerated.
  #[error("generated code failed to compile: {message}")]
  Compile { message: String },

  /// The generated code exceeds the size limit.
  #[error("generated code is {size} bytes, over the {limit} byte limit")]
  CodeTooLarge { size: usize, limit: usize },

  /// The restricted environment could not be constructed.
  #[error("failed to build execution environment: {message}")]
  Environment { message: String },

  /// The run was cancelled before or while executing.
  #[error("execution cancelled")]
  Cancelled,
}
