#![forbid(unsafe_code)]

//! `coslowdown`: pairwise co-execution benchmark binary.
//!
//! Loads the benchmark configuration, measures solo baselines for every
//! workload, then co-locates every pair of workloads and reports their
//! co-slowdown.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

use coslowdown::cache::ResctrlAllocator;
use coslowdown::config::BenchConfig;
use coslowdown::mode::LaunchMode;
use coslowdown::orchestrator::launcher::ShellLauncher;
use coslowdown::orchestrator::session_manager::SessionOrchestrator;
use coslowdown::report::reference::REFERENCE_FILE;
use coslowdown::report::{ReferenceTable, ReportWriter};
use coslowdown::stats::RuntimeStats;
use coslowdown::{AppError, Result};

#[derive(Debug, Copy, Clone, Eq, PartialEq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Parser)]
#[command(name = "coslowdown", about = "Pairwise co-execution benchmark", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the output directory from the config file.
    #[arg(long)]
    output_dir: Option<PathBuf>,

    /// Override how workloads are pinned to their CPU sets.
    #[arg(long, value_enum)]
    launch_mode: Option<LaunchMode>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Run every workload alone and store the solo baselines.
    Solo,
    /// Run every pair of workloads and report co-slowdown.
    Pairs,
    /// Solo baselines followed by all pairs (default).
    All,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("coslowdown bootstrap");

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| AppError::Config(format!("failed to build tokio runtime: {err}")))?
        .block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = BenchConfig::load_from_path(&args.config)?;
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(mode) = args.launch_mode {
        config.launch_mode = mode;
    }
    info!(
        workloads = config.workloads.len(),
        min_runs = config.min_runs,
        tolerance = config.variance_tolerance,
        "configuration loaded"
    );

    // ── Build collaborators ─────────────────────────────
    let writer = ReportWriter::new(&config.output_dir, config.cache.enabled)?;
    let launcher = ShellLauncher::new(config.launch_mode, &config.threads, &config.output_dir);
    let mut orchestrator = SessionOrchestrator::new(Arc::new(launcher));
    if config.cache.enabled {
        let allocator =
            ResctrlAllocator::new(&config.cache.resctrl_root).with_cache_id(config.cache.cache_id);
        orchestrator = orchestrator.with_cache_allocator(Arc::new(allocator));
    }

    let command = args.command.unwrap_or(Command::All);
    let bench = run_bench(&config, &orchestrator, &writer, command);

    tokio::select! {
        result = bench => {
            if let Err(err) = &result {
                error!(%err, "benchmark failed");
            }
            result
        }
        () = shutdown_signal() => {
            info!("shutdown signal received, abandoning running session");
            Ok(())
        }
    }
}

async fn run_bench(
    config: &BenchConfig,
    orchestrator: &SessionOrchestrator,
    writer: &ReportWriter,
    command: Command,
) -> Result<()> {
    let reference_path = writer.output_dir().join(REFERENCE_FILE);
    let mut references = ReferenceTable::load(&reference_path)?;

    if matches!(command, Command::Solo | Command::All) {
        for index in 0..config.workloads.len() {
            let session = config.solo_session(index)?;
            let outcome = orchestrator.run_session(&session).await?;
            for (workload, report) in session.workloads().iter().zip(&outcome.reports) {
                let stats = RuntimeStats::from_durations(&report.samples);
                references.insert(&workload.command, stats, &workload.cpu_set);
            }
            references.save(&reference_path)?;
            print_summaries(writer, &writer.record(&session, &outcome, &references)?);
        }
    }

    if matches!(command, Command::Pairs | Command::All) {
        if references.is_empty() {
            info!("no solo baselines stored; co-slowdown will be reported as missing");
        }
        for (first, second) in config.pairs() {
            let session = config.pair_session(first, second)?;
            let outcome = orchestrator.run_session(&session).await?;
            print_summaries(writer, &writer.record(&session, &outcome, &references)?);
        }
    }

    info!("benchmark complete");
    Ok(())
}

fn print_summaries(writer: &ReportWriter, summaries: &[coslowdown::report::WorkloadSummary]) {
    for summary in summaries {
        println!("{}", summary.console_line(writer.cache_enabled()));
    }
    println!();
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {}
                    _ = sigterm.recv() => {}
                }
            }
            Err(err) => {
                tracing::warn!(%err, "failed to register SIGTERM handler, using ctrl-c only");
                let _ = ctrl_c.await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(err) = ctrl_c.await {
            tracing::error!(%err, "ctrl-c signal handler failed");
        }
    }
}

fn init_tracing(log_format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = fmt().with_env_filter(env_filter).with_writer(std::io::stderr);

    match log_format {
        LogFormat::Text => subscriber
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
        LogFormat::Json => subscriber
            .json()
            .try_init()
            .map_err(|err| AppError::Config(format!("failed to init tracing: {err}")))?,
    }

    Ok(())
}
