//! Code generation boundary.
//!
//! Turning a natural-language description into workflow code is an
//! external concern (an LLM behind some API). This module only defines
//! the seam and the workflow bookkeeping around it.

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};
use velin_workflow::Workflow;

/// Errors from a code generator.
#[derive(Debug, Error)]
pub enum GenerateError {
  #[error("code generation failed: {0}")]
  Failed(String),
}

/// Produces workflow code from a description. Consumed as a black box.
#[async_trait]
pub trait CodeGenerator: Send + Sync {
  async fn generate(
    &self,
    description: &str,
    context: Option<&serde_json::Value>,
  ) -> Result<String, GenerateError>;
}

/// Create a workflow from a description.
///
/// A generation failure still produces a workflow (status `failed` with
/// the error recorded) so the caller can show it and offer regeneration.
pub async fn create_workflow(
  generator: &dyn CodeGenerator,
  name: &str,
  description: &str,
  context: Option<&serde_json::Value>,
) -> Workflow {
  let mut workflow = Workflow::draft(name, description);
  match generator.generate(description, context).await {
    Ok(code) => {
      workflow.replace_code(code);
      info!(workflow_id = %workflow.id, "workflow_generated");
    }
    Err(e) => {
      workflow.mark_generation_failed(e.to_string());
      warn!(workflow_id = %workflow.id, error = %e, "workflow_generation_failed");
    }
  }
  workflow
}

/// Regenerate a workflow's code in place, bumping its status either way.
pub async fn regenerate_workflow(generator: &dyn CodeGenerator, workflow: &mut Workflow) {
  match generator.generate(&workflow.description, None).await {
    Ok(code) => {
      workflow.replace_code(code);
      info!(workflow_id = %workflow.id, "workflow_regenerated");
    }
    Err(e) => {
      workflow.mark_generation_failed(e.to_string());
      warn!(workflow_id = %workflow.id, error = %e, "workflow_regeneration_failed");
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct FixedGenerator(Result<&'static str, &'static str>);

  #[async_trait]
  impl CodeGenerator for FixedGenerator {
    async fn generate(
      &self,
      _description: &str,
      _context: Option<&serde_json::Value>,
    ) -> Result<String, GenerateError> {
      match self.0 {
        Ok(code) => Ok(code.to_string()),
        Err(message) => Err(GenerateError::Failed(message.to_string())),
      }
    }
  }

  #[tokio::test]
  async fn successful_generation_yields_a_ready_workflow() {
    let generator = FixedGenerator(Ok("function execute_workflow(i) return i end"));
    let workflow = create_workflow(&generator, "echo", "echo the input", None).await;
    assert!(workflow.is_ready());
    assert!(workflow.code.contains("execute_workflow"));
  }

  #[tokio::test]
  async fn failed_generation_yields_a_failed_workflow() {
    let generator = FixedGenerator(Err("model unavailable"));
    let workflow = create_workflow(&generator, "echo", "echo the input", None).await;
    assert!(!workflow.is_ready());
    assert!(workflow.error.as_deref().unwrap_or("").contains("model unavailable"));
  }

  #[tokio::test]
  async fn regeneration_replaces_code_on_a_failed_workflow() {
    let mut workflow = Workflow::failed("echo", "echo the input", "first try failed");
    let generator = FixedGenerator(Ok("function execute_workflow(i) return i end"));
    regenerate_workflow(&generator, &mut workflow).await;
    assert!(workflow.is_ready());
    assert!(workflow.error.is_none());
  }
}
