use crate::backend::{Backend, BackendClient};
use crate::model::{ClientConfig, ProcessAction};
use crate::orchestrator::{drive, read_upload, AutopilotPlan, AutopilotReport, UploadSource};
use crate::storage::{default_results_dir, ResultStore};
use crate::text_summary::{build_text_summary, RunSummary, SnapshotSummary};
use crate::workflow::{Step, WorkflowController};
use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "bluree",
    version,
    about = "Find a person in a photo and blur or sticker them out"
)]
pub struct Cli {
    /// Base URL of the Bluree backend
    #[arg(
        long,
        global = true,
        env = "BLUREE_BASE_URL",
        default_value = "http://localhost:5123"
    )]
    pub base_url: String,

    /// Overall timeout for each request
    #[arg(long, global = true, default_value = "30s")]
    pub timeout: humantime::Duration,

    /// Connection timeout
    #[arg(long, global = true, default_value = "5s")]
    pub connect_timeout: humantime::Duration,

    /// Directory for saved results (defaults to the user data directory)
    #[arg(long, global = true)]
    pub results_dir: Option<PathBuf>,

    /// Write logs to this file (the only way to get logs from the TUI)
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Interactive wizard (default)
    Tui,
    /// Run the whole workflow unattended
    Run(RunArgs),
    /// Print the server's current workflow state
    State {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Download the processed image
    Result {
        /// Where to write the image (defaults to a timestamped file)
        #[arg(long, short)]
        output: Option<PathBuf>,
    },
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Scene photo to search in
    #[arg(long)]
    pub scene: PathBuf,

    /// Photo of the person to find
    #[arg(long)]
    pub person: PathBuf,

    /// What to do with the matched person
    #[arg(long, value_enum, default_value_t = ProcessAction::Blur)]
    pub action: ProcessAction,

    /// Accept the first candidate scoring strictly above this (0.0 - 1.0)
    #[arg(long, default_value_t = 0.65, value_parser = parse_score)]
    pub min_score: f64,

    /// Give up after this many candidates
    #[arg(long, default_value_t = 20)]
    pub max_rounds: usize,

    /// Where to write the processed image
    #[arg(long, short)]
    pub output: Option<PathBuf>,

    /// Print a JSON summary on stdout
    #[arg(long)]
    pub json: bool,
}

fn parse_score(s: &str) -> Result<f64, String> {
    let v: f64 = s.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&v) {
        Ok(v)
    } else {
        Err(format!("{v} is outside 0.0..=1.0"))
    }
}

impl Cli {
    /// Whether this invocation takes over the terminal.
    pub fn is_interactive(&self) -> bool {
        matches!(self.command, None | Some(Command::Tui))
    }
}

/// Build a `ClientConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> ClientConfig {
    ClientConfig {
        base_url: args.base_url.clone(),
        request_timeout: Duration::from(args.timeout),
        connect_timeout: Duration::from(args.connect_timeout),
        ..ClientConfig::default()
    }
}

pub fn build_store(args: &Cli) -> ResultStore {
    ResultStore::new(
        args.results_dir
            .clone()
            .unwrap_or_else(default_results_dir),
    )
}

pub async fn run(args: Cli) -> Result<()> {
    match args.command.clone() {
        None | Some(Command::Tui) => {
            #[cfg(feature = "tui")]
            {
                crate::tui::run(args).await
            }
            #[cfg(not(feature = "tui"))]
            {
                bail!("built without the `tui` feature; use `bluree run` instead")
            }
        }
        Some(Command::Run(run_args)) => run_scripted(&args, run_args).await,
        Some(Command::State { json }) => run_state(&args, json).await,
        Some(Command::Result { output }) => run_result(&args, output.as_deref()).await,
    }
}

async fn run_scripted(args: &Cli, run_args: RunArgs) -> Result<()> {
    let client = BackendClient::new(&build_config(args))?;
    let store = build_store(args);
    let (out_tx, out_handle) = spawn_output_writer();

    let ((scene_name, scene_bytes), (person_name, person_bytes)) = futures::try_join!(
        read_upload(&run_args.scene),
        read_upload(&run_args.person)
    )?;
    let plan = AutopilotPlan {
        scene: UploadSource {
            file_name: scene_name,
            bytes: scene_bytes,
        },
        person: UploadSource {
            file_name: person_name,
            bytes: person_bytes,
        },
        action: run_args.action,
        min_score: run_args.min_score,
        max_rounds: run_args.max_rounds,
    };

    let mut controller = WorkflowController::new(client);
    let progress_tx = out_tx.clone();
    let outcome = drive(&mut controller, plan, |line| {
        let _ = progress_tx.send(OutputLine::Stderr(line));
    })
    .await;

    let result = outcome.and_then(|report| report_run(&store, &run_args, &report, &out_tx));

    drop(progress_tx);
    drop(out_tx);
    let _ = out_handle.await;
    result
}

/// Save the processed image and print the run summary. A run that ends
/// without a match is an error.
fn report_run(
    store: &ResultStore,
    run_args: &RunArgs,
    report: &AutopilotReport,
    out_tx: &mpsc::UnboundedSender<OutputLine>,
) -> Result<()> {
    let saved_to = match report.result.as_ref() {
        Some(bytes) => Some(
            store
                .save("result", bytes, run_args.output.as_deref())
                .context("failed to save result")?,
        ),
        None => None,
    };
    let summary = RunSummary::new(report, saved_to);
    if run_args.json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&summary)?));
    } else {
        for line in summary.lines() {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    if report.final_step == Step::NoMatchFound {
        bail!("person not found");
    }
    Ok(())
}

async fn run_state(args: &Cli, json: bool) -> Result<()> {
    let client = BackendClient::new(&build_config(args))?;
    let snapshot = client
        .fetch_snapshot()
        .await
        .context("failed to fetch state")?;
    let summary = SnapshotSummary::new(&snapshot);

    let (out_tx, out_handle) = spawn_output_writer();
    if json {
        let _ = out_tx.send(OutputLine::Stdout(serde_json::to_string_pretty(&summary)?));
    } else {
        for line in build_text_summary(&summary).lines {
            let _ = out_tx.send(OutputLine::Stdout(line));
        }
    }
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}

async fn run_result(args: &Cli, output: Option<&Path>) -> Result<()> {
    let client = BackendClient::new(&build_config(args))?;
    let bytes = client
        .fetch_result()
        .await
        .context("result fetch failed")?;
    let path = build_store(args)
        .save("result", &bytes, output)
        .context("failed to save result")?;

    let (out_tx, out_handle) = spawn_output_writer();
    let _ = out_tx.send(OutputLine::Stdout(format!("Saved: {}", path.display())));
    drop(out_tx);
    let _ = out_handle.await;
    Ok(())
}
