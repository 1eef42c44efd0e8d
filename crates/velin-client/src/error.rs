//! Error types for document service operations.

use thiserror::Error;

/// Errors reported by the document service client.
#[derive(Debug, Error)]
pub enum ClientError {
  /// The base URL could not be parsed or joined with an endpoint path.
  #[error("invalid base url: {0}")]
  BaseUrl(#[from] url::ParseError),

  /// The request itself failed (connection, TLS, body decoding).
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The service answered with a non-success status on a single-shot call.
  #[error("service error {status}: {body}")]
  Transport { status: u16, body: String },

  /// The service does not know the given file id.
  #[error("file {file_id} not found")]
  NotFound { file_id: i64 },

  /// File ingestion ended in a terminal error state.
  #[error("file {file_id} processing failed with status '{status}'")]
  Processing { file_id: i64, status: String },

  /// An analysis job ended in a terminal failure state.
  #[error("analysis job {job_id} failed with status '{status}'")]
  Analysis { job_id: String, status: String },

  /// A bounded wait ran out of budget before the operation settled.
  #[error("timed out after {waited_secs}s waiting for {what}")]
  Timeout { what: String, waited_secs: u64 },

  /// The service answered 2xx but the body did not have the expected shape.
  #[error("unexpected response: {message}")]
  InvalidResponse { message: String },
}

impl ClientError {
  /// Whether this error is a polling deadline expiry (service slow), as
  /// opposed to the service rejecting or failing the request.
  pub fn is_timeout(&self) -> bool {
    matches!(self, ClientError::Timeout { .. })
  }
}
