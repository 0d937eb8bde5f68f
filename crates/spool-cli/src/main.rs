mod logging;
mod sessions;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use spool_core::{
    BatchError, BatchEvent, BatchEventKind, BatchId, BatchOptions, BatchScheduler, BatchState,
    BuildError, SchedulerConfig,
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};

use crate::logging::LogFormat;
use crate::sessions::{NarrateOperation, Session, SessionRepository};

/// Narrate a batch of sessions and stream the batch events as JSON lines.
#[derive(Debug, Parser)]
#[command(name = "spool-cli", version)]
struct Args {
    /// TOML file with scheduler settings; defaults apply when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// Fail every N-th operation call.
    #[arg(long)]
    fail_every: Option<u32>,

    /// Attempts per session, first attempt included.
    #[arg(long)]
    retries: Option<u32>,

    /// Leave this session out of the repository so its lookup fails.
    #[arg(long = "unknown", value_name = "SESSION_ID")]
    unknown: Vec<String>,

    #[arg(long)]
    label: Option<String>,

    #[arg(required = true, value_name = "SESSION_ID")]
    sessions: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to initialise logging: {0}")]
    Logging(#[from] tracing_subscriber::util::TryInitError),

    #[error("failed to read config {path}: {source}")]
    ReadConfig {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    ParseConfig {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid config {path}: {source}")]
    InvalidConfig {
        path: PathBuf,
        source: BatchError,
    },

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Batch(#[from] BatchError),

    #[error("failed to encode output: {0}")]
    Encode(#[from] serde_json::Error),
}

fn load_config(path: Option<&Path>) -> Result<SchedulerConfig, CliError> {
    let Some(path) = path else {
        return Ok(SchedulerConfig::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|source| CliError::ReadConfig {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(path, &raw)
}

fn parse_config(path: &Path, raw: &str) -> Result<SchedulerConfig, CliError> {
    let config: SchedulerConfig = toml::from_str(raw).map_err(|source| CliError::ParseConfig {
        path: path.to_path_buf(),
        source,
    })?;
    config.validate().map_err(|source| CliError::InvalidConfig {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(config)
}

/// Print events as JSON lines until the batch reports its final state.
async fn print_events(mut rx: broadcast::Receiver<BatchEvent>, batch_id: BatchId) {
    loop {
        match rx.recv().await {
            Ok(event) => {
                let last = event.batch_id() == batch_id
                    && matches!(
                        event.kind(),
                        BatchEventKind::Completed | BatchEventKind::Cancelled
                    );
                match serde_json::to_string(&event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => warn!(error = %err, "could not encode event"),
                }
                if last {
                    return;
                }
            }
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "event printer fell behind"),
            Err(RecvError::Closed) => return,
        }
    }
}

async fn run(args: Args) -> Result<BatchState, CliError> {
    let config = load_config(args.config.as_deref())?;
    info!(config = %serde_json::to_string(&config)?, "scheduler config in effect");

    let repository = Arc::new(SessionRepository::new());
    for id in args.sessions.iter().filter(|id| !args.unknown.contains(*id)) {
        repository.save(Session::new(id.as_str())).await;
    }
    info!(seeded = repository.len().await, "session repository ready");

    let narrate = NarrateOperation::new(Arc::clone(&repository), args.fail_every);
    let scheduler = BatchScheduler::builder()
        .config(config)
        .register("narrate", Arc::new(narrate))?
        .expect_operations(&["narrate"])
        .build()?;

    let mut options = BatchOptions::default();
    if let Some(retries) = args.retries {
        options = options.with_max_attempts(retries);
    }
    if let Some(label) = args.label {
        options = options.with_label(label);
    }

    let rx = scheduler.subscribe();
    let job = scheduler.create(args.sessions, "narrate", options).await?;
    let printer = tokio::spawn(print_events(rx, job.batch_id));

    let summary = scheduler.start_registered(job.batch_id).await?.wait().await?;
    if let Err(err) = printer.await {
        warn!(error = %err, "event printer stopped");
    }

    let view = scheduler.get_job(job.batch_id).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(summary.state)
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    if let Err(err) = logging::init(args.log_format) {
        eprintln!("{}", CliError::from(err));
        return ExitCode::FAILURE;
    }

    match run(args).await {
        Ok(BatchState::Completed) => ExitCode::SUCCESS,
        Ok(state) => {
            warn!(%state, "batch did not complete cleanly");
            ExitCode::from(2)
        }
        Err(err) => {
            error!(error = %err, "spool-cli failed");
            ExitCode::FAILURE
        }
    }
}
