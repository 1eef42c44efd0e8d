//! Script executor implementation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mlua::{Lua, LuaOptions, LuaSerdeExt, StdLib, Value};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use velin_client::DocumentClient;
use velin_workflow::ExecutionRequest;

use crate::bindings::ScriptClient;
use crate::env::build_environment;
use crate::error::SandboxError;
use crate::outcome::{ScriptOutcome, ScriptStatus};

/// Name of the entry function generated code must define.
pub const ENTRY_FUNCTION: &str = "execute_workflow";

/// Configuration for the script executor.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
  /// Wall-clock budget for one run. Analysis jobs legitimately take
  /// minutes, so the default is generous; the polling loops carry their
  /// own tighter deadlines and this is only the backstop.
  pub timeout: Duration,
  /// Maximum size of generated code in bytes.
  pub max_code_bytes: usize,
  /// Maximum length of a reported error description, traceback included.
  pub max_error_chars: usize,
}

impl Default for SandboxConfig {
  fn default() -> Self {
    Self {
      timeout: Duration::from_secs(1800),
      max_code_bytes: 64 * 1024,
      max_error_chars: 2000,
    }
  }
}

/// Executes generated workflow code in a fresh, restricted Lua VM.
///
/// Each run walks Pending -> Compiling -> Running -> terminal exactly
/// once; there are no retries at this level.
pub struct ScriptExecutor {
  config: SandboxConfig,
}

impl ScriptExecutor {
  pub fn new(config: SandboxConfig) -> Self {
    Self { config }
  }

  /// Run one piece of generated code against one set of inputs.
  ///
  /// Host-side problems (oversized or unparseable code, cancellation)
  /// are `Err`; once the code starts running, the result is always an
  /// `Ok(ScriptOutcome)`. Runtime errors and timeouts are contained and
  /// described there, never propagated.
  #[instrument(name = "script_execute", skip_all, fields(code_len = code.len()))]
  pub async fn execute(
    &self,
    code: &str,
    request: &ExecutionRequest,
    client: DocumentClient,
    cancel: CancellationToken,
  ) -> Result<ScriptOutcome, SandboxError> {
    if code.len() > self.config.max_code_bytes {
      return Err(SandboxError::CodeTooLarge {
        size: code.len(),
        limit: self.config.max_code_bytes,
      });
    }
    if cancel.is_cancelled() {
      return Err(SandboxError::Cancelled);
    }

    // One fresh VM per run: no state outlives an execution. Only the
    // string, table, and math libraries are loaded; everything else in
    // the namespace is filtered in build_environment.
    let lua = Lua::new_with(
      StdLib::STRING | StdLib::TABLE | StdLib::MATH | StdLib::COROUTINE,
      LuaOptions::default(),
    )
      .map_err(|e| SandboxError::Environment {
        message: e.to_string(),
      })?;

    let output = build_environment(&lua, request).map_err(|e| SandboxError::Environment {
      message: e.to_string(),
    })?;

    let script_client = lua
      .create_userdata(ScriptClient::new(Arc::new(client)))
      .map_err(|e| SandboxError::Environment {
        message: e.to_string(),
      })?;
    lua
      .globals()
      .set("client", script_client)
      .map_err(|e| SandboxError::Environment {
        message: e.to_string(),
      })?;

    // Compiling: a syntax error is reported without entering Running.
    let chunk = lua
      .load(code)
      .set_name("workflow")
      .into_function()
      .map_err(|e| SandboxError::Compile {
        message: e.to_string(),
      })?;

    info!(attached_files = request.attached_file_ids.len(), "script_started");
    let started = Instant::now();

    let user_input = request.user_input.clone();
    let run = async {
      // Top-level statements run first and define the entry function.
      chunk.call_async::<()>(()).await?;
      let entry: mlua::Function = lua.globals().get(ENTRY_FUNCTION).map_err(|_| {
        mlua::Error::RuntimeError(format!(
          "generated code does not define a '{}' function",
          ENTRY_FUNCTION
        ))
      })?;
      entry.call_async::<Value>(user_input).await
    };

    let result = tokio::select! {
      _ = cancel.cancelled() => {
        warn!("script_cancelled");
        return Err(SandboxError::Cancelled);
      }
      result = tokio::time::timeout(self.config.timeout, run) => result,
    };

    let elapsed = started.elapsed();
    let outcome = match result {
      // The timer won the race; the entry-function future has been
      // dropped, which cancels any in-flight service call with it.
      Err(_) => {
        warn!(elapsed_secs = elapsed.as_secs_f64(), "script_timed_out");
        ScriptOutcome {
          status: ScriptStatus::TimedOut,
          report: None,
          error: Some(format!(
            "execution exceeded the {}s wall-clock budget",
            self.config.timeout.as_secs()
          )),
          output: output.take(),
          elapsed,
        }
      }
      Ok(Ok(value)) => {
        let report = coerce_report(&lua, value);
        info!(
          elapsed_secs = elapsed.as_secs_f64(),
          report_len = report.len(),
          "script_completed"
        );
        ScriptOutcome {
          status: ScriptStatus::Completed,
          report: Some(report),
          error: None,
          output: output.take(),
          elapsed,
        }
      }
      Ok(Err(e)) => {
        let message = truncate_error(&e.to_string(), self.config.max_error_chars);
        error!(elapsed_secs = elapsed.as_secs_f64(), error = %message, "script_failed");
        ScriptOutcome {
          status: ScriptStatus::Failed,
          report: None,
          error: Some(message),
          output: output.take(),
          elapsed,
        }
      }
    };

    Ok(outcome)
  }
}

/// The entry function is expected to return a string report; anything
/// else is coerced to a textual representation (tables as JSON).
fn coerce_report(lua: &Lua, value: Value) -> String {
  match value {
    Value::Nil => String::new(),
    Value::String(s) => s.to_string_lossy().to_string(),
    Value::Boolean(b) => b.to_string(),
    Value::Integer(i) => i.to_string(),
    Value::Number(n) => n.to_string(),
    Value::Table(_) => match lua.from_value::<serde_json::Value>(value) {
      Ok(json) => serde_json::to_string_pretty(&json).unwrap_or_else(|_| "table".to_string()),
      Err(_) => "table".to_string(),
    },
    other => other.type_name().to_string(),
  }
}

fn truncate_error(message: &str, max_chars: usize) -> String {
  if message.chars().count() <= max_chars {
    return message.to_string();
  }
  let truncated: String = message.chars().take(max_chars).collect();
  truncated + " [truncated]"
}
