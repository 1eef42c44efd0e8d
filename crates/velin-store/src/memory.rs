//! In-memory store with per-entry expiry.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use velin_workflow::{ExecutionRecord, Workflow};

use crate::{Error, Store};

/// Default entry lifetime.
const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

struct Entry<T> {
  stored_at: Instant,
  value: T,
}

/// In-memory [`Store`] implementation.
///
/// Entries expire `ttl` after their last write; reads of expired entries
/// report [`Error::NotFound`] and drop the entry.
pub struct MemoryStore {
  ttl: Duration,
  workflows: Mutex<HashMap<String, Entry<Workflow>>>,
  executions: Mutex<HashMap<String, Entry<ExecutionRecord>>>,
}

impl MemoryStore {
  /// Create a store with the default 24-hour expiry.
  pub fn new() -> Self {
    Self::with_ttl(DEFAULT_TTL)
  }

  pub fn with_ttl(ttl: Duration) -> Self {
    Self {
      ttl,
      workflows: Mutex::new(HashMap::new()),
      executions: Mutex::new(HashMap::new()),
    }
  }

  fn put<T>(map: &Mutex<HashMap<String, Entry<T>>>, key: String, value: T) {
    let mut map = map.lock().unwrap_or_else(|e| e.into_inner());
    map.insert(
      key,
      Entry {
        stored_at: Instant::now(),
        value,
      },
    );
  }

  fn get<T: Clone>(
    &self,
    map: &Mutex<HashMap<String, Entry<T>>>,
    key: &str,
  ) -> Result<T, Error> {
    let mut map = map.lock().unwrap_or_else(|e| e.into_inner());
    match map.get(key) {
      Some(entry) if entry.stored_at.elapsed() < self.ttl => Ok(entry.value.clone()),
      Some(_) => {
        map.remove(key);
        Err(Error::NotFound(key.to_string()))
      }
      None => Err(Error::NotFound(key.to_string())),
    }
  }
}

impl Default for MemoryStore {
  fn default() -> Self {
    Self::new()
  }
}

#[async_trait]
impl Store for MemoryStore {
  async fn put_workflow(&self, workflow: &Workflow) -> Result<(), Error> {
    Self::put(&self.workflows, workflow.id.clone(), workflow.clone());
    Ok(())
  }

  async fn get_workflow(&self, workflow_id: &str) -> Result<Workflow, Error> {
    self.get(&self.workflows, workflow_id)
  }

  async fn put_execution(&self, record: &ExecutionRecord) -> Result<(), Error> {
    Self::put(&self.executions, record.execution_id.clone(), record.clone());
    Ok(())
  }

  async fn get_execution(&self, execution_id: &str) -> Result<ExecutionRecord, Error> {
    self.get(&self.executions, execution_id)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[tokio::test]
  async fn put_then_get_round_trips() {
    let store = MemoryStore::new();
    let workflow = Workflow::ready("w", "d", "code");

    store.put_workflow(&workflow).await.unwrap();
    let loaded = store.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(loaded, workflow);
  }

  #[tokio::test]
  async fn missing_keys_report_not_found() {
    let store = MemoryStore::new();
    assert!(matches!(
      store.get_workflow("nope").await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn expired_entries_behave_as_absent() {
    let store = MemoryStore::with_ttl(Duration::ZERO);
    let record = ExecutionRecord::started("wf-1");

    store.put_execution(&record).await.unwrap();
    assert!(matches!(
      store.get_execution(&record.execution_id).await,
      Err(Error::NotFound(_))
    ));
  }

  #[tokio::test]
  async fn rewriting_resets_the_clock() {
    let store = MemoryStore::new();
    let mut workflow = Workflow::ready("w", "d", "v1");
    store.put_workflow(&workflow).await.unwrap();

    workflow.replace_code("v2");
    store.put_workflow(&workflow).await.unwrap();

    let loaded = store.get_workflow(&workflow.id).await.unwrap();
    assert_eq!(loaded.code, "v2");
  }
}
