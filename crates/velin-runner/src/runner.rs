//! Coordinator implementation.

use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use velin_client::{DocumentClient, PollSchedule};
use velin_config::Settings;
use velin_sandbox::{SandboxConfig, SandboxError, ScriptExecutor, ScriptStatus};
use velin_store::Store;
use velin_workflow::{ExecutionRecord, ExecutionRequest, Workflow};

use crate::error::RunnerError;

/// Coordinates one workflow execution end-to-end.
pub struct Runner {
  settings: Settings,
  executor: ScriptExecutor,
}

impl Runner {
  /// Create a runner. Settings are validated up front: a missing API
  /// key is a construction-time error, not a per-call one.
  pub fn new(settings: Settings) -> Result<Self, RunnerError> {
    settings.validate()?;
    let executor = ScriptExecutor::new(SandboxConfig {
      timeout: settings.execution_timeout(),
      ..SandboxConfig::default()
    });
    Ok(Self { settings, executor })
  }

  /// Execute a workflow against the given request.
  ///
  /// Always returns a finalized record for a workflow that was ready:
  /// `completed` with the report, `failed` with the error, or `timeout`.
  /// Only a not-ready workflow raises.
  #[instrument(
    name = "workflow_execute",
    skip(self, workflow, request, cancel),
    fields(workflow_id = %workflow.id)
  )]
  pub async fn execute(
    &self,
    workflow: &Workflow,
    request: &ExecutionRequest,
    cancel: CancellationToken,
  ) -> Result<ExecutionRecord, RunnerError> {
    if !workflow.is_ready() {
      return Err(RunnerError::NotReady {
        workflow_id: workflow.id.clone(),
        status: workflow.status,
      });
    }

    let mut record = ExecutionRecord::started(&workflow.id);
    info!(
      execution_id = %record.execution_id,
      attached_files = request.attached_file_ids.len(),
      "execution_started"
    );

    // One client per execution; nothing logical is shared across runs.
    let client = self.build_client()?;

    let started = Instant::now();
    let result = self
      .executor
      .execute(&workflow.code, request, client, cancel)
      .await;
    let elapsed = started.elapsed().as_secs_f64();

    match result {
      Ok(outcome) => match outcome.status {
        ScriptStatus::Completed => {
          record.mark_completed(outcome.report.unwrap_or_default(), elapsed);
        }
        ScriptStatus::Failed => {
          record.mark_failed(
            outcome.error.unwrap_or_else(|| "execution failed".to_string()),
            elapsed,
          );
        }
        ScriptStatus::TimedOut => {
          record.mark_timed_out(
            outcome.error.unwrap_or_else(|| "execution timed out".to_string()),
            elapsed,
          );
        }
      },
      Err(SandboxError::Cancelled) => {
        record.mark_failed("execution cancelled", elapsed);
      }
      Err(e) => {
        record.mark_failed(e.to_string(), elapsed);
      }
    }

    match record.status {
      velin_workflow::ExecutionStatus::Completed => {
        info!(execution_id = %record.execution_id, elapsed_secs = elapsed, "execution_completed");
      }
      _ => {
        error!(
          execution_id = %record.execution_id,
          status = ?record.status,
          error = record.error.as_deref().unwrap_or(""),
          "execution_failed"
        );
      }
    }

    Ok(record)
  }

  /// Resolve a workflow from the store, execute it, and persist the
  /// finalized record.
  pub async fn execute_stored(
    &self,
    store: &dyn Store,
    workflow_id: &str,
    request: &ExecutionRequest,
    cancel: CancellationToken,
  ) -> Result<ExecutionRecord, RunnerError> {
    let workflow = store.get_workflow(workflow_id).await.map_err(|e| match e {
      velin_store::Error::NotFound(_) => RunnerError::WorkflowNotFound(workflow_id.to_string()),
      other => RunnerError::Store(other),
    })?;

    let record = self.execute(&workflow, request, cancel).await?;
    store.put_execution(&record).await?;
    Ok(record)
  }

  /// Delete remote files created for a single execution.
  ///
  /// Best-effort resource hygiene: runs on success and failure paths
  /// alike. Already-deleted files are fine; other failures are logged and
  /// skipped, never raised. Returns how many files were actually deleted.
  pub async fn cleanup_files(&self, file_ids: &[i64]) -> usize {
    if file_ids.is_empty() {
      return 0;
    }
    let client = match self.build_client() {
      Ok(client) => client,
      Err(e) => {
        warn!(error = %e, "cleanup_client_unavailable");
        return 0;
      }
    };

    let mut deleted = 0;
    for &file_id in file_ids {
      match client.delete_file(file_id).await {
        Ok(true) => deleted += 1,
        Ok(false) => {}
        Err(e) => warn!(file_id, error = %e, "scratch_file_delete_failed"),
      }
    }
    info!(requested = file_ids.len(), deleted, "cleanup_finished");
    deleted
  }

  fn build_client(&self) -> Result<DocumentClient, RunnerError> {
    let client = DocumentClient::new(self.settings.api_key.as_str(), &self.settings.base_url)?
      .with_ingest_schedule(PollSchedule::new(
        self.settings.ingest_poll.max_wait(),
        self.settings.ingest_poll.interval(),
      ))
      .with_analysis_schedule(PollSchedule::new(
        self.settings.analysis_poll.max_wait(),
        self.settings.analysis_poll.interval(),
      ));
    Ok(client)
  }

  /// The configured execution budget.
  pub fn execution_timeout(&self) -> Duration {
    self.settings.execution_timeout()
  }
}
