//! Integration tests for the document client against a mock service.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockito::Matcher;
use serde_json::json;
use velin_client::{
  AnalyzeOptions, ChatOptions, ChunkQuery, ClientError, DocumentClient, FileVisibility,
  PollSchedule, SearchOptions, Sleeper,
};

/// Returns immediately so polling tests don't wait for real time.
struct NoopSleeper;

#[async_trait]
impl Sleeper for NoopSleeper {
  async fn sleep(&self, _duration: Duration) {}
}

fn client_for(server: &mockito::ServerGuard) -> DocumentClient {
  DocumentClient::new("test-key", &server.url())
    .expect("client should build")
    .with_sleeper(Arc::new(NoopSleeper))
}

#[tokio::test]
async fn upload_returns_the_remote_file() {
  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("POST", "/api/v2/files")
    .match_header("authorization", "Bearer test-key")
    .with_status(201)
    .with_body(json!({"id": 123, "filename": "invoice.pdf", "status": "uploading"}).to_string())
    .expect(1)
    .create_async()
    .await;

  let client = client_for(&server);
  let file = client
    .upload(b"hello".to_vec(), "invoice.pdf", FileVisibility::Private)
    .await
    .expect("upload should succeed");

  assert_eq!(file.id, 123);
  assert_eq!(file.status, "uploading");
  mock.assert_async().await;
}

#[tokio::test]
async fn upload_surfaces_non_2xx_as_transport_error() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("POST", "/api/v2/files")
    .with_status(500)
    .with_body("internal error")
    .create_async()
    .await;

  let client = client_for(&server);
  let err = client
    .upload(b"hello".to_vec(), "invoice.pdf", FileVisibility::Private)
    .await
    .expect_err("upload should fail");

  assert!(matches!(err, ClientError::Transport { status: 500, .. }));
}

#[tokio::test]
async fn file_info_maps_404_to_not_found() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("GET", "/api/v2/files/42")
    .with_status(404)
    .create_async()
    .await;

  let client = client_for(&server);
  let err = client.file_info(42, false).await.expect_err("should be missing");

  assert!(matches!(err, ClientError::NotFound { file_id: 42 }));
}

#[tokio::test]
async fn file_status_is_idempotent_across_reads() {
  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("GET", "/api/v2/files/7")
    .with_status(200)
    .with_body(json!({"id": 7, "filename": "a.pdf", "status": "embedded"}).to_string())
    .expect(2)
    .create_async()
    .await;

  let client = client_for(&server);
  let first = client.file_status(7).await.expect("first read");
  let second = client.file_status(7).await.expect("second read");

  assert_eq!(first, second);
  assert_eq!(first, "embedded");
  mock.assert_async().await;
}

#[tokio::test]
async fn wait_until_ready_settles_on_an_embedded_file() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("GET", "/api/v2/files/7")
    .with_status(200)
    .with_body(json!({"id": 7, "status": "embedded"}).to_string())
    .create_async()
    .await;

  let client = client_for(&server);
  let status = client.wait_until_ready(7).await.expect("should settle");
  assert_eq!(status, "embedded");
}

#[tokio::test]
async fn wait_until_ready_with_zero_budget_times_out_after_one_check() {
  let mut server = mockito::Server::new_async().await;
  let mock = server
    .mock("GET", "/api/v2/files/7")
    .with_status(200)
    .with_body(json!({"id": 7, "status": "embedding"}).to_string())
    .expect(1)
    .create_async()
    .await;

  let client = client_for(&server);
  let err = client
    .wait_until_ready_with(7, PollSchedule::new(Duration::ZERO, Duration::from_secs(2)))
    .await
    .expect_err("should time out");

  assert!(err.is_timeout());
  mock.assert_async().await;
}

#[tokio::test]
async fn wait_until_ready_fails_on_terminal_error_status() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("GET", "/api/v2/files/7")
    .with_status(200)
    .with_body(json!({"id": 7, "status": "error"}).to_string())
    .create_async()
    .await;

  let client = client_for(&server);
  let err = client.wait_until_ready(7).await.expect_err("should fail");

  assert!(matches!(err, ClientError::Processing { file_id: 7, .. }));
}

#[tokio::test]
async fn search_returns_the_primary_answer_without_fallback() {
  let mut server = mockito::Server::new_async().await;
  let primary = server
    .mock("POST", "/api/v2/chat/document-search")
    .match_body(Matcher::PartialJson(json!({"tool": "DocumentSearch"})))
    .with_status(200)
    .with_body(
      json!({"answer": "The total is 42.", "documents": [{"id": 1, "title": "invoice"}]})
        .to_string(),
    )
    .expect(1)
    .create_async()
    .await;
  let fallback = server
    .mock("POST", "/api/v2/chat/document-search")
    .match_body(Matcher::PartialJson(json!({"tool": "VisionDocumentSearch"})))
    .expect(0)
    .create_async()
    .await;

  let client = client_for(&server);
  let outcome = client
    .search("what is the total?", &SearchOptions::default())
    .await
    .expect("search should succeed");

  assert_eq!(outcome.answer, "The total is 42.");
  primary.assert_async().await;
  fallback.assert_async().await;
}

#[tokio::test]
async fn unanswered_search_retries_exactly_once_with_the_fallback_tool() {
  let mut server = mockito::Server::new_async().await;
  let primary = server
    .mock("POST", "/api/v2/chat/document-search")
    .match_body(Matcher::PartialJson(json!({"tool": "DocumentSearch"})))
    .with_status(200)
    .with_body(json!({"answer": "Not found in the documents.", "documents": []}).to_string())
    .expect(1)
    .create_async()
    .await;
  let fallback = server
    .mock("POST", "/api/v2/chat/document-search")
    .match_body(Matcher::PartialJson(json!({"tool": "VisionDocumentSearch"})))
    .with_status(200)
    .with_body(
      json!({"answer": "The total is 42.", "documents": [{"id": 1}]}).to_string(),
    )
    .expect(1)
    .create_async()
    .await;

  let client = client_for(&server);
  let outcome = client
    .search("what is the total?", &SearchOptions::default())
    .await
    .expect("search should succeed");

  assert_eq!(outcome.answer, "The total is 42.");
  primary.assert_async().await;
  fallback.assert_async().await;
}

#[tokio::test]
async fn unanswered_search_without_fallback_returns_the_primary_outcome() {
  let mut server = mockito::Server::new_async().await;
  let primary = server
    .mock("POST", "/api/v2/chat/document-search")
    .with_status(200)
    .with_body(json!({"answer": "", "documents": []}).to_string())
    .expect(1)
    .create_async()
    .await;

  let client = client_for(&server).with_fallback_tool(None);
  let outcome = client
    .search("anything", &SearchOptions::default())
    .await
    .expect("search should succeed");

  assert_eq!(outcome.answer, "");
  primary.assert_async().await;
}

#[tokio::test]
async fn analyze_polls_until_the_job_completes() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("POST", "/api/v2/chat/document-analysis")
    .match_body(Matcher::PartialJson(json!({"document_ids": [1, 2]})))
    .with_status(200)
    .with_body(json!({"chat_response_id": 99}).to_string())
    .create_async()
    .await;
  server
    .mock("GET", "/api/v2/chat/document-analysis/99")
    .with_status(200)
    .with_body(json!({"status": "Completed", "result": "X"}).to_string())
    .create_async()
    .await;

  let client = client_for(&server);
  let report = client
    .analyze("analyze these", &[1, 2], &AnalyzeOptions::default())
    .await
    .expect("analysis should succeed");

  assert_eq!(report, "X");
}

#[tokio::test]
async fn analyze_surfaces_terminal_failure_statuses() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("POST", "/api/v2/chat/document-analysis")
    .with_status(200)
    .with_body(json!({"chat_response_id": 99}).to_string())
    .create_async()
    .await;
  server
    .mock("GET", "/api/v2/chat/document-analysis/99")
    .with_status(200)
    .with_body(json!({"status": "failed"}).to_string())
    .create_async()
    .await;

  let client = client_for(&server);
  let err = client
    .analyze("analyze these", &[1], &AnalyzeOptions::default())
    .await
    .expect_err("analysis should fail");

  assert!(matches!(err, ClientError::Analysis { .. }));
}

#[tokio::test]
async fn analyze_treats_a_missing_job_id_as_invalid() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("POST", "/api/v2/chat/document-analysis")
    .with_status(200)
    .with_body(json!({}).to_string())
    .create_async()
    .await;

  let client = client_for(&server);
  let err = client
    .analyze("analyze these", &[1], &AnalyzeOptions::default())
    .await
    .expect_err("analysis should fail");

  assert!(matches!(err, ClientError::InvalidResponse { .. }));
}

#[tokio::test]
async fn chat_returns_the_first_choice_content() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("POST", "/api/v2/chat/completions")
    .match_body(Matcher::PartialJson(json!({"model": "alfred-4.2"})))
    .with_status(200)
    .with_body(
      json!({"choices": [{"message": {"content": "hello back"}}]}).to_string(),
    )
    .create_async()
    .await;

  let client = client_for(&server);
  let answer = client
    .chat("hello", &ChatOptions::default())
    .await
    .expect("chat should succeed");

  assert_eq!(answer, "hello back");
}

#[tokio::test]
async fn query_chunks_passes_the_response_through() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("POST", "/api/v2/chunks/query")
    .with_status(200)
    .with_body(json!({"chunks": [{"text": "chunk one"}]}).to_string())
    .create_async()
    .await;

  let client = client_for(&server);
  let value = client
    .query_chunks("find this", &ChunkQuery::default())
    .await
    .expect("query should succeed");

  assert_eq!(value["chunks"][0]["text"], "chunk one");
}

#[tokio::test]
async fn delete_file_treats_404_as_already_gone() {
  let mut server = mockito::Server::new_async().await;
  server
    .mock("DELETE", "/api/v2/files/5")
    .with_status(200)
    .with_body("{}")
    .create_async()
    .await;
  server
    .mock("DELETE", "/api/v2/files/6")
    .with_status(404)
    .create_async()
    .await;

  let client = client_for(&server);
  assert!(client.delete_file(5).await.expect("delete should succeed"));
  assert!(!client.delete_file(6).await.expect("404 is not an error"));
}
