//! Document service client implementation.

use std::sync::Arc;

use reqwest::multipart;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::error::ClientError;
use crate::poll::{poll_until, PollSchedule, PollState, Sleeper, TokioSleeper};
use crate::types::{FileInfo, RemoteFile, SearchOutcome};

/// Primary search tool.
pub const DEFAULT_SEARCH_TOOL: &str = "DocumentSearch";

/// Fallback search tool. Analyzes documents as images, which is more
/// robust for scanned documents, complex tables, and poor OCR quality.
pub const DEFAULT_FALLBACK_TOOL: &str = "VisionDocumentSearch";

/// Default model for plain chat completions.
pub const DEFAULT_CHAT_MODEL: &str = "alfred-4.2";

/// File statuses that mean "ingested and searchable".
const READY_FILE_STATUSES: &[&str] = &["embedded", "ready", "completed", "complete", "indexed", "success"];

/// File statuses that mean ingestion failed for good.
const FAILED_FILE_STATUSES: &[&str] = &["error", "failed"];

/// Analysis job statuses that mean the job finished successfully.
const ANALYSIS_DONE_STATUSES: &[&str] = &["completed", "complete", "finished", "success"];

/// Analysis job statuses that mean the job failed for good. Anything not
/// in this list or in `ANALYSIS_DONE_STATUSES` is treated as still
/// running; the service's vocabulary for in-progress states is not
/// exhaustively known.
const ANALYSIS_FAILED_STATUSES: &[&str] = &["failed", "error"];

/// Answers containing one of these read as "the search found nothing".
const UNANSWERED_INDICATORS: &[&str] = &["not found", "no information", "cannot find", "unable to", "n/a"];

const MAX_ERROR_BODY_CHARS: usize = 500;

/// Where an uploaded file is visible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileVisibility {
  #[default]
  Private,
  Company,
}

impl FileVisibility {
  pub fn as_str(&self) -> &'static str {
    match self {
      FileVisibility::Private => "private",
      FileVisibility::Company => "company",
    }
  }
}

/// Options for [`DocumentClient::search`].
#[derive(Debug, Clone)]
pub struct SearchOptions {
  /// Restrict the search to these files.
  pub file_ids: Option<Vec<i64>>,
  pub workspace_ids: Option<Vec<i64>>,
  pub model: Option<String>,
  /// Override the primary tool.
  pub tool: Option<String>,
  pub company_scope: bool,
  pub private_scope: bool,
  pub private: bool,
}

impl Default for SearchOptions {
  fn default() -> Self {
    Self {
      file_ids: None,
      workspace_ids: None,
      model: None,
      tool: None,
      company_scope: false,
      private_scope: true,
      private: true,
    }
  }
}

/// Options for [`DocumentClient::analyze`].
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
  pub model: Option<String>,
  /// Override the client's analysis polling schedule.
  pub schedule: Option<PollSchedule>,
}

/// Options for [`DocumentClient::chat`].
#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
  pub model: Option<String>,
  pub system_prompt: Option<String>,
}

/// Filter over already-ingested chunks.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChunkFilter {
  #[serde(skip_serializing_if = "Option::is_none")]
  pub file_ids: Option<Vec<i64>>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub metadata: Option<serde_json::Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub limit: Option<u32>,
}

/// Semantic query over already-ingested chunks.
#[derive(Debug, Clone, Default)]
pub struct ChunkQuery {
  pub file_ids: Option<Vec<i64>>,
  pub top_k: Option<u32>,
}

/// Async client for the document-intelligence service.
///
/// One instance is constructed per workflow execution and discarded
/// afterwards; no logical state is shared across executions.
pub struct DocumentClient {
  http: reqwest::Client,
  base_url: Url,
  api_key: String,
  fallback_tool: Option<String>,
  ingest_schedule: PollSchedule,
  analysis_schedule: PollSchedule,
  sleeper: Arc<dyn Sleeper>,
}

impl DocumentClient {
  /// Create a client for the service at `base_url`.
  pub fn new(api_key: impl Into<String>, base_url: &str) -> Result<Self, ClientError> {
    Ok(Self {
      http: reqwest::Client::new(),
      base_url: Url::parse(base_url)?,
      api_key: api_key.into(),
      fallback_tool: Some(DEFAULT_FALLBACK_TOOL.to_string()),
      ingest_schedule: PollSchedule::INGEST,
      analysis_schedule: PollSchedule::ANALYSIS,
      sleeper: Arc::new(TokioSleeper),
    })
  }

  /// Replace the search fallback tool. `None` disables the fallback.
  pub fn with_fallback_tool(mut self, tool: Option<String>) -> Self {
    self.fallback_tool = tool;
    self
  }

  pub fn with_ingest_schedule(mut self, schedule: PollSchedule) -> Self {
    self.ingest_schedule = schedule;
    self
  }

  pub fn with_analysis_schedule(mut self, schedule: PollSchedule) -> Self {
    self.analysis_schedule = schedule;
    self
  }

  /// Replace the sleep dependency used between polls.
  pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
    self.sleeper = sleeper;
    self
  }

  pub fn ingest_schedule(&self) -> PollSchedule {
    self.ingest_schedule
  }

  pub fn analysis_schedule(&self) -> PollSchedule {
    self.analysis_schedule
  }

  /// Upload a file for ingestion. Not retried: upload is not known to be
  /// idempotent on the service side.
  pub async fn upload(
    &self,
    file_bytes: Vec<u8>,
    filename: &str,
    visibility: FileVisibility,
  ) -> Result<RemoteFile, ClientError> {
    info!(filename = %filename, bytes = file_bytes.len(), "file_upload_started");

    let part = multipart::Part::bytes(file_bytes).file_name(filename.to_string());
    let form = multipart::Form::new()
      .part("file", part)
      .text("collection_type", visibility.as_str());

    let response = self
      .http
      .post(self.endpoint("/api/v2/files")?)
      .bearer_auth(&self.api_key)
      .multipart(form)
      .send()
      .await?;

    let file: RemoteFile = expect_json(response).await?;
    info!(file_id = file.id, status = %file.status, "file_upload_completed");
    Ok(file)
  }

  /// Fetch metadata for a stored file.
  pub async fn file_info(&self, file_id: i64, include_content: bool) -> Result<FileInfo, ClientError> {
    let mut url = self.endpoint(&format!("/api/v2/files/{}", file_id))?;
    if include_content {
      url.query_pairs_mut().append_pair("include_content", "true");
    }

    let response = self
      .http
      .get(url)
      .bearer_auth(&self.api_key)
      .send()
      .await?;

    if response.status().as_u16() == 404 {
      return Err(ClientError::NotFound { file_id });
    }
    expect_json(response).await
  }

  /// Fetch the processing status of a stored file.
  pub async fn file_status(&self, file_id: i64) -> Result<String, ClientError> {
    Ok(self.file_info(file_id, false).await?.status)
  }

  /// Wait until a file is ingested and searchable, using the client's
  /// ingestion schedule. Returns the terminal status string.
  pub async fn wait_until_ready(&self, file_id: i64) -> Result<String, ClientError> {
    self.wait_until_ready_with(file_id, self.ingest_schedule).await
  }

  /// Like [`wait_until_ready`](Self::wait_until_ready) with an explicit schedule.
  pub async fn wait_until_ready_with(
    &self,
    file_id: i64,
    schedule: PollSchedule,
  ) -> Result<String, ClientError> {
    let client = self;
    let status = poll_until(
      &format!("file {} ingestion", file_id),
      schedule,
      self.sleeper.as_ref(),
      move || async move {
        let status = client.file_status(file_id).await?;
        let lowered = status.to_lowercase();
        if READY_FILE_STATUSES.contains(&lowered.as_str()) {
          return Ok(PollState::Settled(status));
        }
        if FAILED_FILE_STATUSES.contains(&lowered.as_str()) {
          return Err(ClientError::Processing { file_id, status });
        }
        info!(file_id, status = %status, "file_not_ready_yet");
        Ok(PollState::Pending)
      },
    )
    .await?;

    info!(file_id, status = %status, "file_ready");
    Ok(status)
  }

  /// Search through documents.
  ///
  /// If the answer comes back empty or negative and a fallback tool is
  /// configured, a single retry with the fallback tool is issued before
  /// giving up.
  pub async fn search(&self, query: &str, opts: &SearchOptions) -> Result<SearchOutcome, ClientError> {
    let primary_tool = opts.tool.as_deref().unwrap_or(DEFAULT_SEARCH_TOOL);
    let outcome = self.search_once(query, primary_tool, opts).await?;

    if !looks_unanswered(&outcome) {
      return Ok(outcome);
    }

    let fallback = match self.fallback_tool.as_deref() {
      Some(tool) if tool != primary_tool => tool,
      _ => return Ok(outcome),
    };

    warn!(tool = %fallback, "search_unanswered_retrying_with_fallback");
    self.search_once(query, fallback, opts).await
  }

  async fn search_once(
    &self,
    query: &str,
    tool: &str,
    opts: &SearchOptions,
  ) -> Result<SearchOutcome, ClientError> {
    #[derive(Serialize)]
    struct SearchRequest<'a> {
      query: &'a str,
      tool: &'a str,
      company_scope: bool,
      private_scope: bool,
      private: bool,
      #[serde(skip_serializing_if = "Option::is_none")]
      file_ids: Option<&'a [i64]>,
      #[serde(skip_serializing_if = "Option::is_none")]
      workspace_ids: Option<&'a [i64]>,
      #[serde(skip_serializing_if = "Option::is_none")]
      model: Option<&'a str>,
    }

    info!(tool = %tool, query_len = query.len(), "document_search_started");

    let response = self
      .http
      .post(self.endpoint("/api/v2/chat/document-search")?)
      .bearer_auth(&self.api_key)
      .json(&SearchRequest {
        query,
        tool,
        company_scope: opts.company_scope,
        private_scope: opts.private_scope,
        private: opts.private,
        file_ids: opts.file_ids.as_deref(),
        workspace_ids: opts.workspace_ids.as_deref(),
        model: opts.model.as_deref(),
      })
      .send()
      .await?;

    let outcome: SearchOutcome = expect_json(response).await?;
    info!(
      tool = %tool,
      documents = outcome.documents.len(),
      answer_len = outcome.answer.len(),
      "document_search_completed"
    );
    Ok(outcome)
  }

  /// Run a document analysis job and wait for its result.
  ///
  /// Starts the job, then polls the result endpoint on the analysis
  /// schedule until the job reaches a terminal state or the budget is
  /// spent. Unrecognized status strings are treated as still-running.
  pub async fn analyze(
    &self,
    query: &str,
    document_ids: &[i64],
    opts: &AnalyzeOptions,
  ) -> Result<String, ClientError> {
    let job_id = self.start_analysis(query, document_ids, opts.model.as_deref()).await?;
    let schedule = opts.schedule.unwrap_or(self.analysis_schedule);

    let client = self;
    let job = job_id.as_str();
    let report = poll_until(
      &format!("analysis job {}", job_id),
      schedule,
      self.sleeper.as_ref(),
      move || async move { client.check_analysis(job).await },
    )
    .await?;

    info!(job_id = %job_id, report_len = report.len(), "analysis_completed");
    Ok(report)
  }

  async fn start_analysis(
    &self,
    query: &str,
    document_ids: &[i64],
    model: Option<&str>,
  ) -> Result<String, ClientError> {
    #[derive(Serialize)]
    struct AnalysisRequest<'a> {
      query: &'a str,
      document_ids: &'a [i64],
      #[serde(skip_serializing_if = "Option::is_none")]
      model: Option<&'a str>,
    }

    info!(documents = document_ids.len(), query_len = query.len(), "analysis_started");

    let response = self
      .http
      .post(self.endpoint("/api/v2/chat/document-analysis")?)
      .bearer_auth(&self.api_key)
      .json(&AnalysisRequest {
        query,
        document_ids,
        model,
      })
      .send()
      .await?;

    let body: serde_json::Value = expect_json(response).await?;
    let job_id = match body.get("chat_response_id") {
      Some(serde_json::Value::Number(n)) => n.to_string(),
      Some(serde_json::Value::String(s)) if !s.is_empty() => s.clone(),
      _ => {
        return Err(ClientError::InvalidResponse {
          message: "analysis start returned no chat_response_id".to_string(),
        });
      }
    };

    info!(job_id = %job_id, "analysis_job_created");
    Ok(job_id)
  }

  /// One poll of the analysis result endpoint.
  async fn check_analysis(&self, job_id: &str) -> Result<PollState<String>, ClientError> {
    #[derive(serde::Deserialize)]
    struct AnalysisStatus {
      #[serde(default)]
      status: String,
      #[serde(default)]
      result: Option<String>,
      #[serde(default)]
      detailed_analysis: Option<String>,
    }

    let response = self
      .http
      .get(self.endpoint(&format!("/api/v2/chat/document-analysis/{}", job_id))?)
      .bearer_auth(&self.api_key)
      .send()
      .await?;

    // 404 here means the result is not materialized yet, not a bad id.
    if response.status().as_u16() == 404 {
      return Ok(PollState::Pending);
    }

    let status: AnalysisStatus = expect_json(response).await?;
    let lowered = status.status.to_lowercase();

    if ANALYSIS_DONE_STATUSES.contains(&lowered.as_str()) {
      let report = status
        .result
        .or(status.detailed_analysis)
        .unwrap_or_else(|| "Analysis completed but no result was returned".to_string());
      return Ok(PollState::Settled(report));
    }
    if ANALYSIS_FAILED_STATUSES.contains(&lowered.as_str()) {
      return Err(ClientError::Analysis {
        job_id: job_id.to_string(),
        status: status.status,
      });
    }

    info!(job_id = %job_id, status = %status.status, "analysis_still_running");
    Ok(PollState::Pending)
  }

  /// Stateless chat completion.
  pub async fn chat(&self, prompt: &str, opts: &ChatOptions) -> Result<String, ClientError> {
    #[derive(Serialize)]
    struct Message<'a> {
      role: &'a str,
      content: &'a str,
    }

    #[derive(Serialize)]
    struct ChatRequest<'a> {
      model: &'a str,
      messages: Vec<Message<'a>>,
    }

    #[derive(serde::Deserialize)]
    struct ChatResponse {
      choices: Vec<Choice>,
    }

    #[derive(serde::Deserialize)]
    struct Choice {
      message: ChoiceMessage,
    }

    #[derive(serde::Deserialize)]
    struct ChoiceMessage {
      content: String,
    }

    let mut messages = Vec::new();
    if let Some(system) = opts.system_prompt.as_deref() {
      messages.push(Message {
        role: "system",
        content: system,
      });
    }
    messages.push(Message {
      role: "user",
      content: prompt,
    });

    let response = self
      .http
      .post(self.endpoint("/api/v2/chat/completions")?)
      .bearer_auth(&self.api_key)
      .json(&ChatRequest {
        model: opts.model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL),
        messages,
      })
      .send()
      .await?;

    let mut body: ChatResponse = expect_json(response).await?;
    if body.choices.is_empty() {
      return Err(ClientError::InvalidResponse {
        message: "chat completion returned no choices".to_string(),
      });
    }
    Ok(body.choices.remove(0).message.content)
  }

  /// Filter already-ingested chunks by file and metadata. Pass-through:
  /// the response shape is returned as-is.
  pub async fn filter_chunks(&self, filter: &ChunkFilter) -> Result<serde_json::Value, ClientError> {
    let response = self
      .http
      .post(self.endpoint("/api/v2/chunks/filter")?)
      .bearer_auth(&self.api_key)
      .json(filter)
      .send()
      .await?;
    expect_json(response).await
  }

  /// Semantic query over already-ingested chunks. Pass-through.
  pub async fn query_chunks(&self, query: &str, opts: &ChunkQuery) -> Result<serde_json::Value, ClientError> {
    #[derive(Serialize)]
    struct ChunkQueryRequest<'a> {
      query: &'a str,
      #[serde(skip_serializing_if = "Option::is_none")]
      file_ids: Option<&'a [i64]>,
      #[serde(skip_serializing_if = "Option::is_none")]
      top_k: Option<u32>,
    }

    let response = self
      .http
      .post(self.endpoint("/api/v2/chunks/query")?)
      .bearer_auth(&self.api_key)
      .json(&ChunkQueryRequest {
        query,
        file_ids: opts.file_ids.as_deref(),
        top_k: opts.top_k,
      })
      .send()
      .await?;
    expect_json(response).await
  }

  /// Delete a stored file. Returns `false` if the file was already gone.
  pub async fn delete_file(&self, file_id: i64) -> Result<bool, ClientError> {
    let response = self
      .http
      .delete(self.endpoint(&format!("/api/v2/files/{}", file_id))?)
      .bearer_auth(&self.api_key)
      .send()
      .await?;

    let status = response.status();
    if status.is_success() {
      info!(file_id, "file_deleted");
      return Ok(true);
    }
    if status.as_u16() == 404 {
      warn!(file_id, "file_already_gone");
      return Ok(false);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Transport {
      status: status.as_u16(),
      body: truncate(body),
    })
  }

  fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
    Ok(self.base_url.join(path)?)
  }
}

/// Whether a search outcome reads as "nothing found".
fn looks_unanswered(outcome: &SearchOutcome) -> bool {
  let answer = outcome.answer.trim();
  if answer.is_empty() || outcome.documents.is_empty() {
    return true;
  }
  let lowered = answer.to_lowercase();
  UNANSWERED_INDICATORS
    .iter()
    .any(|indicator| lowered.contains(indicator))
}

/// Decode a 2xx response body, or surface the status and body as a
/// transport error.
async fn expect_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
  let status = response.status();
  if status.is_success() {
    return Ok(response.json().await?);
  }
  let body = response.text().await.unwrap_or_default();
  Err(ClientError::Transport {
    status: status.as_u16(),
    body: truncate(body),
  })
}

fn truncate(body: String) -> String {
  if body.chars().count() <= MAX_ERROR_BODY_CHARS {
    return body;
  }
  body.chars().take(MAX_ERROR_BODY_CHARS).collect::<String>() + "..."
}

#[cfg(test)]
mod tests {
  use super::*;

  fn outcome(answer: &str, documents: usize) -> SearchOutcome {
    SearchOutcome {
      answer: answer.to_string(),
      documents: (0..documents).map(|_| Default::default()).collect(),
    }
  }

  #[test]
  fn unanswered_detection() {
    assert!(looks_unanswered(&outcome("", 3)));
    assert!(looks_unanswered(&outcome("The total is 42.", 0)));
    assert!(looks_unanswered(&outcome("The value was Not Found in the document.", 2)));
    assert!(looks_unanswered(&outcome("N/A", 2)));
    assert!(!looks_unanswered(&outcome("The total is 42.", 2)));
  }

  #[test]
  fn truncate_keeps_short_bodies() {
    assert_eq!(truncate("short".to_string()), "short");
    let long = "x".repeat(600);
    let truncated = truncate(long);
    assert!(truncated.ends_with("..."));
    assert_eq!(truncated.chars().count(), MAX_ERROR_BODY_CHARS + 3);
  }
}
