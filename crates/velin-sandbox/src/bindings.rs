//! Lua bindings for the document service client.
//!
//! The client is exposed to generated code as a single `client` userdata
//! with async methods. Every method suspends at the HTTP boundary, so
//! concurrent executions interleave without blocking the runtime, and
//! every service error surfaces as a normal Lua error that generated code
//! may `pcall` and fall back on.

use std::sync::Arc;
use std::time::Duration;

use mlua::{Lua, LuaSerdeExt, Table, UserData, UserDataMethods, Value};
use serde::Deserialize;
use velin_client::{
  AnalyzeOptions, ChatOptions, ChunkFilter, ChunkQuery, DocumentClient, FileVisibility,
  PollSchedule, SearchOptions,
};

/// The `client` userdata injected into every run.
pub struct ScriptClient {
  inner: Arc<DocumentClient>,
}

impl ScriptClient {
  pub fn new(client: Arc<DocumentClient>) -> Self {
    Self { inner: client }
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaSearchOpts {
  file_ids: Option<Vec<i64>>,
  workspace_ids: Option<Vec<i64>>,
  model: Option<String>,
  tool: Option<String>,
}

impl LuaSearchOpts {
  fn into_options(self) -> SearchOptions {
    SearchOptions {
      file_ids: self.file_ids,
      workspace_ids: self.workspace_ids,
      model: self.model,
      tool: self.tool,
      ..SearchOptions::default()
    }
  }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaAnalyzeOpts {
  model: Option<String>,
  max_wait_seconds: Option<u64>,
  poll_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaWaitOpts {
  max_wait_seconds: Option<u64>,
  poll_interval_seconds: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaChatOpts {
  model: Option<String>,
  system_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaUploadOpts {
  visibility: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaFileInfoOpts {
  include_content: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaChunkFilterOpts {
  file_ids: Option<Vec<i64>>,
  metadata: Option<serde_json::Value>,
  limit: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LuaChunkQueryOpts {
  file_ids: Option<Vec<i64>>,
  top_k: Option<u32>,
}

fn opts_from<T>(lua: &Lua, table: Option<Table>) -> mlua::Result<T>
where
  T: Default + serde::de::DeserializeOwned,
{
  match table {
    Some(table) => lua.from_value(Value::Table(table)),
    None => Ok(T::default()),
  }
}

fn schedule_override(
  default: PollSchedule,
  max_wait_seconds: Option<u64>,
  poll_interval_seconds: Option<u64>,
) -> PollSchedule {
  PollSchedule::new(
    max_wait_seconds.map(Duration::from_secs).unwrap_or(default.max_wait),
    poll_interval_seconds.map(Duration::from_secs).unwrap_or(default.interval),
  )
}

impl UserData for ScriptClient {
  fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
    methods.add_async_method(
      "search",
      |lua, this, (query, opts): (String, Option<Table>)| async move {
        let opts: LuaSearchOpts = opts_from(&lua, opts)?;
        let client = this.inner.clone();
        let outcome = client
          .search(&query, &opts.into_options())
          .await
          .map_err(mlua::Error::external)?;
        lua.to_value(&outcome)
      },
    );

    methods.add_async_method(
      "analyze",
      |lua, this, (query, document_ids, opts): (String, Vec<i64>, Option<Table>)| async move {
        let lua_opts: LuaAnalyzeOpts = opts_from(&lua, opts)?;
        let client = this.inner.clone();
        let schedule = schedule_override(
          client.analysis_schedule(),
          lua_opts.max_wait_seconds,
          lua_opts.poll_interval_seconds,
        );
        let report = client
          .analyze(
            &query,
            &document_ids,
            &AnalyzeOptions {
              model: lua_opts.model,
              schedule: Some(schedule),
            },
          )
          .await
          .map_err(mlua::Error::external)?;
        Ok(report)
      },
    );

    methods.add_async_method(
      "chat",
      |lua, this, (prompt, opts): (String, Option<Table>)| async move {
        let opts: LuaChatOpts = opts_from(&lua, opts)?;
        let client = this.inner.clone();
        let answer = client
          .chat(
            &prompt,
            &ChatOptions {
              model: opts.model,
              system_prompt: opts.system_prompt,
            },
          )
          .await
          .map_err(mlua::Error::external)?;
        Ok(answer)
      },
    );

    methods.add_async_method(
      "upload",
      |lua, this, (contents, filename, opts): (mlua::String, String, Option<Table>)| async move {
        let opts: LuaUploadOpts = opts_from(&lua, opts)?;
        let visibility = match opts.visibility.as_deref() {
          Some("company") => FileVisibility::Company,
          _ => FileVisibility::Private,
        };
        let bytes = contents.as_bytes().to_vec();
        let client = this.inner.clone();
        let file = client
          .upload(bytes, &filename, visibility)
          .await
          .map_err(mlua::Error::external)?;
        lua.to_value(&file)
      },
    );

    methods.add_async_method(
      "file_info",
      |lua, this, (file_id, opts): (i64, Option<Table>)| async move {
        let opts: LuaFileInfoOpts = opts_from(&lua, opts)?;
        let client = this.inner.clone();
        let info = client
          .file_info(file_id, opts.include_content)
          .await
          .map_err(mlua::Error::external)?;
        lua.to_value(&info)
      },
    );

    methods.add_async_method("file_status", |_, this, file_id: i64| async move {
      let client = this.inner.clone();
      client.file_status(file_id).await.map_err(mlua::Error::external)
    });

    methods.add_async_method(
      "wait_until_ready",
      |lua, this, (file_id, opts): (i64, Option<Table>)| async move {
        let opts: LuaWaitOpts = opts_from(&lua, opts)?;
        let client = this.inner.clone();
        let schedule = schedule_override(
          client.ingest_schedule(),
          opts.max_wait_seconds,
          opts.poll_interval_seconds,
        );
        client
          .wait_until_ready_with(file_id, schedule)
          .await
          .map_err(mlua::Error::external)
      },
    );

    methods.add_async_method(
      "filter_chunks",
      |lua, this, opts: Option<Table>| async move {
        let opts: LuaChunkFilterOpts = opts_from(&lua, opts)?;
        let client = this.inner.clone();
        let chunks = client
          .filter_chunks(&ChunkFilter {
            file_ids: opts.file_ids,
            metadata: opts.metadata,
            limit: opts.limit,
          })
          .await
          .map_err(mlua::Error::external)?;
        lua.to_value(&chunks)
      },
    );

    methods.add_async_method(
      "query_chunks",
      |lua, this, (query, opts): (String, Option<Table>)| async move {
        let opts: LuaChunkQueryOpts = opts_from(&lua, opts)?;
        let client = this.inner.clone();
        let chunks = client
          .query_chunks(
            &query,
            &ChunkQuery {
              file_ids: opts.file_ids,
              top_k: opts.top_k,
            },
          )
          .await
          .map_err(mlua::Error::external)?;
        lua.to_value(&chunks)
      },
    );

    methods.add_async_method("delete_file", |_, this, file_id: i64| async move {
      let client = this.inner.clone();
      client.delete_file(file_id).await.map_err(mlua::Error::external)
    });
  }
}
