use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use velin_client::{DocumentClient, FileVisibility, PollSchedule};
use velin_config::Settings;
use velin_runner::Runner;
use velin_workflow::{ExecutionRequest, Workflow};

/// Velin - runs generated document workflows in a sandbox
#[derive(Parser)]
#[command(name = "velin")]
#[command(version, about, long_about = None)]
struct Cli {
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Execute a workflow code file against the given input
  Run {
    /// Path to the workflow code file (Lua)
    code_file: PathBuf,

    /// Free-text input for the workflow
    #[arg(long, default_value = "")]
    input: String,

    /// Remote file ids to attach, in order (e.g. --file-ids 5,3,9)
    #[arg(long, value_delimiter = ',')]
    file_ids: Vec<i64>,

    /// Delete the attached files from the service after the run,
    /// whether it succeeded or not
    #[arg(long)]
    delete_after: bool,
  },

  /// Upload a local file to the document service and wait until it is
  /// ingested
  Upload {
    /// Path to the file to upload
    path: PathBuf,

    /// Where the file is visible: private or company
    #[arg(long, default_value = "private")]
    visibility: String,
  },
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
    .with_writer(std::io::stderr)
    .init();

  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Run {
      code_file,
      input,
      file_ids,
      delete_after,
    }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(run_workflow(code_file, input, file_ids, delete_after))?;
    }
    Some(Commands::Upload { path, visibility }) => {
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(upload_file(path, visibility))?;
    }
    None => {
      println!("velin - use --help to see available commands");
    }
  }

  Ok(())
}

async fn run_workflow(
  code_file: PathBuf,
  input: String,
  file_ids: Vec<i64>,
  delete_after: bool,
) -> Result<()> {
  let settings = Settings::from_env().context("failed to load settings from the environment")?;

  let code = tokio::fs::read_to_string(&code_file)
    .await
    .with_context(|| format!("failed to read code file: {}", code_file.display()))?;

  let name = code_file
    .file_stem()
    .map(|stem| stem.to_string_lossy().to_string())
    .unwrap_or_else(|| "workflow".to_string());
  let workflow = Workflow::ready(name, String::new(), code);

  let request = ExecutionRequest {
    user_input: input,
    attached_file_ids: file_ids.clone(),
  };

  let runner = Runner::new(settings).context("failed to construct the runner")?;
  let record = runner
    .execute(&workflow, &request, CancellationToken::new())
    .await
    .context("execution could not be started")?;

  // Scratch files are removed on success and failure alike.
  if delete_after {
    runner.cleanup_files(&file_ids).await;
  }

  println!("{}", serde_json::to_string_pretty(&record)?);
  Ok(())
}

async fn upload_file(path: PathBuf, visibility: String) -> Result<()> {
  let settings = Settings::from_env().context("failed to load settings from the environment")?;

  let bytes = tokio::fs::read(&path)
    .await
    .with_context(|| format!("failed to read file: {}", path.display()))?;
  let filename = path
    .file_name()
    .map(|name| name.to_string_lossy().to_string())
    .unwrap_or_else(|| "upload.bin".to_string());

  let visibility = match visibility.as_str() {
    "company" => FileVisibility::Company,
    _ => FileVisibility::Private,
  };

  let client = DocumentClient::new(settings.api_key.as_str(), &settings.base_url)
    .context("failed to construct the document client")?
    .with_ingest_schedule(PollSchedule::new(
      settings.ingest_poll.max_wait(),
      settings.ingest_poll.interval(),
    ));

  let file = client
    .upload(bytes, &filename, visibility)
    .await
    .context("upload failed")?;
  eprintln!("uploaded file {} (status: {})", file.id, file.status);

  let status = client
    .wait_until_ready(file.id)
    .await
    .context("file did not become ready")?;

  println!("{}", serde_json::json!({ "id": file.id, "status": status }));
  Ok(())
}
