//! Restricted execution environment.
//!
//! The VM is created with only the string, table, and math libraries; the
//! base globals Lua installs on top of that are then filtered against
//! [`ALLOWED_GLOBALS`]. Anything not in the list (`load`, `dofile`,
//! `collectgarbage`, metatable access, and so on) is removed before
//! generated code is loaded, so it is unreachable by construction rather
//! than by best-effort blocking.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use mlua::{Lua, Value, Variadic};
use velin_workflow::ExecutionRequest;

/// The closed set of globals reachable from generated code. `print` and
/// `sleep` are our own implementations; the rest are the stock Lua
/// functions and the string/table/math libraries. `coroutine` is retained
/// because the async client bindings are driven through it by the runtime.
pub const ALLOWED_GLOBALS: &[&str] = &[
  "_VERSION",
  "assert",
  "coroutine",
  "error",
  "ipairs",
  "math",
  "next",
  "pairs",
  "pcall",
  "print",
  "select",
  "sleep",
  "string",
  "table",
  "tonumber",
  "tostring",
  "type",
  "xpcall",
];

/// Upper bound on a single injected sleep, so generated code cannot park
/// itself past any reasonable execution budget.
const MAX_SLEEP_SECS: f64 = 86_400.0;

/// Buffer collecting everything the generated code prints.
#[derive(Clone, Default)]
pub(crate) struct CapturedOutput {
  buffer: Arc<Mutex<String>>,
}

impl CapturedOutput {
  pub(crate) fn push_line(&self, line: &str) {
    let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
    buffer.push_str(line);
    buffer.push('\n');
  }

  pub(crate) fn take(&self) -> String {
    let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
    std::mem::take(&mut *buffer)
  }
}

/// Install the capturing `print` and the async `sleep`, scrub every global
/// not on the allow-list, and inject the run's inputs.
///
/// The injected values (`user_input`, `attached_file_ids`, and the
/// `client` userdata added by the caller) are not part of
/// [`ALLOWED_GLOBALS`]: they are per-run capabilities, not language
/// surface.
pub(crate) fn build_environment(
  lua: &Lua,
  request: &ExecutionRequest,
) -> mlua::Result<CapturedOutput> {
  let globals = lua.globals();
  let output = CapturedOutput::default();

  let print_output = output.clone();
  let print = lua.create_function(move |_, args: Variadic<Value>| {
    let mut line = String::new();
    for (i, value) in args.iter().enumerate() {
      if i > 0 {
        line.push('\t');
      }
      line.push_str(&display_value(value));
    }
    print_output.push_line(&line);
    Ok(())
  })?;
  globals.set("print", print)?;

  let sleep = lua.create_async_function(|_, seconds: f64| async move {
    let seconds = if seconds.is_finite() {
      seconds.clamp(0.0, MAX_SLEEP_SECS)
    } else {
      0.0
    };
    tokio::time::sleep(Duration::from_secs_f64(seconds)).await;
    Ok(())
  })?;
  globals.set("sleep", sleep)?;

  // Collect first, then remove: the table cannot be mutated mid-iteration.
  let mut doomed = Vec::new();
  for pair in globals.clone().pairs::<Value, Value>() {
    let (key, _) = pair?;
    if let Value::String(name) = key {
      let name = name.to_string_lossy().to_string();
      if !ALLOWED_GLOBALS.contains(&name.as_str()) {
        doomed.push(name);
      }
    }
  }
  for name in doomed {
    globals.raw_set(name, Value::Nil)?;
  }

  globals.set("user_input", request.user_input.as_str())?;
  let file_ids = lua.create_sequence_from(request.attached_file_ids.iter().copied())?;
  globals.set("attached_file_ids", file_ids)?;

  Ok(output)
}

fn display_value(value: &Value) -> String {
  match value {
    Value::Nil => "nil".to_string(),
    Value::Boolean(b) => b.to_string(),
    Value::Integer(i) => i.to_string(),
    Value::Number(n) => n.to_string(),
    Value::String(s) => s.to_string_lossy().to_string(),
    other => other.type_name().to_string(),
  }
}
