//! Velin Workflow
//!
//! Core types shared across the workspace: a [`Workflow`] is a piece of
//! generated code plus the natural-language description it was generated
//! from; an [`ExecutionRecord`] describes one run of that code against
//! specific inputs.

mod record;
mod workflow;

pub use record::{ExecutionRecord, ExecutionRequest, ExecutionStatus};
pub use workflow::{Workflow, WorkflowStatus};
