use crate::demo::{render_outcome, run_demo, DemoArgs};
use crate::infra::{build_storage, LogMailer};
use crate::server;
use clap::{Args, Parser, Subcommand};
use form_filer::config::{AppConfig, ArchiveConfig, RoutingConfig};
use form_filer::error::AppError;
use form_filer::telemetry;
use form_filer::workflows::archive::FolderReclassifier;
use form_filer::workflows::intake::{SubmissionEvent, SubmissionOrchestrator, SubmissionOutcome};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(
    name = "Form Filer",
    about = "File form submissions into named folders and keep the archive sorted",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP service (default command)
    Serve(ServeArgs),
    /// Process one submission event read from a JSON file
    Process(ProcessArgs),
    /// Sort submission folders into year/month/category folders
    Reclassify(ReclassifyArgs),
    /// Run an end-to-end demo against in-memory storage
    Demo(DemoArgs),
}

#[derive(Args, Debug, Default)]
pub(crate) struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    pub(crate) host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    pub(crate) port: Option<u16>,
    /// Ignore Drive credentials and keep files in process memory
    #[arg(long)]
    pub(crate) in_memory: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ProcessArgs {
    /// Path to the submission event JSON
    #[arg(long)]
    pub(crate) submission: PathBuf,
    /// Ignore Drive credentials and keep files in process memory
    #[arg(long)]
    pub(crate) in_memory: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReclassifyArgs {
    /// Compute the plan without creating or moving folders
    #[arg(long)]
    pub(crate) dry_run: bool,
    /// Write the planned or performed moves to this CSV file
    #[arg(long)]
    pub(crate) report: Option<PathBuf>,
}

pub(crate) async fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let command = cli
        .command
        .unwrap_or_else(|| Command::Serve(ServeArgs::default()));

    match command {
        Command::Serve(args) => server::run(args).await,
        Command::Process(args) => run_process(args).await,
        Command::Reclassify(args) => run_reclassify(args).await,
        Command::Demo(args) => run_demo(args),
    }
}

async fn run_process(args: ProcessArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let routing = RoutingConfig::load()?;

    let raw = std::fs::read_to_string(&args.submission)?;
    let event = SubmissionEvent::from_json(&raw)?;

    let storage = build_storage(&config, args.in_memory).await?;
    let orchestrator = SubmissionOrchestrator::new(storage, Arc::new(LogMailer), routing);

    let outcome = tokio::task::spawn_blocking(move || orchestrator.process(&event)).await?;
    render_outcome(&outcome);

    match outcome {
        SubmissionOutcome::Fatal(report) => Err(AppError::Aborted(report.message)),
        _ => Ok(()),
    }
}

async fn run_reclassify(args: ReclassifyArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;
    let archive = ArchiveConfig::from_env()?;

    let storage = build_storage(&config, false).await?;
    let dry_run = args.dry_run;
    let report = tokio::task::spawn_blocking(move || {
        FolderReclassifier::new(&*storage, &archive)
            .dry_run(dry_run)
            .run()
    })
    .await??;

    if let Some(path) = args.report {
        let file = std::fs::File::create(&path)?;
        report.write_csv(file)?;
        println!("Report written to {}", path.display());
    }

    println!(
        "{} {} folder(s), {} failed, {} already filed ({} visited)",
        if dry_run { "Planned" } else { "Moved" },
        report.moves.len() - report.failures(),
        report.failures(),
        report.already_filed,
        report.visited
    );
    Ok(())
}
