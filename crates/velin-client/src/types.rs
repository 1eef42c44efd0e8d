//! Wire types for the document service.

use serde::{Deserialize, Serialize};

/// A file stored by the document service, as returned by upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteFile {
  #[serde(alias = "file_id")]
  pub id: i64,
  #[serde(default)]
  pub filename: Option<String>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub bytes: Option<u64>,
}

/// Metadata for a stored file, optionally including extracted content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileInfo {
  pub id: i64,
  #[serde(default)]
  pub filename: Option<String>,
  #[serde(default)]
  pub status: String,
  #[serde(default)]
  pub purpose: Option<String>,
  #[serde(default)]
  pub created_at: Option<i64>,
  #[serde(default)]
  pub content: Option<String>,
}

/// Result of a document search: the answer plus the documents it cites.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
  #[serde(default)]
  pub answer: String,
  #[serde(default)]
  pub documents: Vec<Citation>,
}

/// A document cited by a search answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Citation {
  #[serde(default)]
  pub id: Option<i64>,
  #[serde(default)]
  pub title: Option<String>,
  #[serde(default)]
  pub chunks: Vec<serde_json::Value>,
}
