//! Velin Sandbox
//!
//! Runs one piece of generated workflow code, exactly once, against one set
//! of inputs, with containment. Generated code is Lua; each run gets a
//! fresh VM whose global namespace is reduced to a closed allow-list, with
//! the document service client and the run's inputs injected as the only
//! capabilities.
//!
//! Every run is subject to three independent controls: the allow-listed
//! namespace (no filesystem, process, or code-loading reach), the
//! wall-clock timeout (external API latency is unbounded), and the error
//! boundary (no failure in generated code ever propagates past the
//! executor).

mod bindings;
mod env;
mod error;
mod executor;
mod outcome;

pub use bindings::ScriptClient;
pub use env::ALLOWED_GLOBALS;
pub use error::SandboxError;
pub use executor::{ScriptExecutor, SandboxConfig, ENTRY_FUNCTION};
pub use outcome::{ScriptOutcome, ScriptStatus};
