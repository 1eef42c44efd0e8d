//! Velin Runner
//!
//! The execution lifecycle coordinator: glue between an inbound execution
//! request and the sandbox. It owns API-key sourcing, constructs one
//! document client per execution, measures elapsed wall-clock time, and
//! finalizes exactly one [`ExecutionRecord`](velin_workflow::ExecutionRecord)
//! per run. It never raises on a failed or timed-out execution, only on
//! violated preconditions.

mod error;
mod generate;
mod runner;

pub use error::RunnerError;
pub use generate::{create_workflow, regenerate_workflow, CodeGenerator, GenerateError};
pub use runner::Runner;
