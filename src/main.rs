//! vigilant - monitoring dashboard client with a cancellable threat scan.
//!
//! Usage:
//!   vigilant scan FILE...        Scan individual files
//!   vigilant scan-dir DIR        Scan every file below a directory
//!   vigilant watch               Stream host metrics
//!   vigilant ask MESSAGE...      Ask the dashboard assistant
//!   vigilant --help              Show help

use std::path::PathBuf;
use std::sync::Arc;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::{Context, Result, eyre};
use humansize::{BINARY, format_size};
use itertools::Itertools;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use vigilant_client::{AssistantReply, HttpBackend};
use vigilant_core::{
    ClientConfig, FileHandle, FileOutcome, MetricSample, MetricsBuffer, ScanResult,
};
use vigilant_scan::{ScanSessionManager, SessionOutcome, SessionProgress};

#[derive(Parser)]
#[command(
    name = "vigilant",
    version,
    about = "Monitoring dashboard client",
    long_about = "vigilant talks to a vigilant dashboard server: submit files for \
                  threat analysis, follow the scan's progress, watch host metrics \
                  and ask the assistant."
)]
struct Cli {
    /// Server base URL (overrides config file and VIGILANT_URL)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Path to a config file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan individual files
    Scan {
        /// Files to scan
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Scan every file below a directory
    ScanDir {
        /// Directory to scan
        dir: PathBuf,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Poll host metrics and show window averages
    Watch {
        /// Stop after this many samples (runs until Ctrl-C if omitted)
        #[arg(short = 'n', long)]
        samples: Option<usize>,
    },

    /// Send a message to the assistant
    Ask {
        /// Message text
        #[arg(required = true)]
        message: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

enum ScanTarget {
    Files(Vec<PathBuf>),
    Directory(PathBuf),
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let config = load_config(&cli)?;

    match cli.command {
        Command::Scan { files, format } => run_scan(config, ScanTarget::Files(files), format).await,
        Command::ScanDir { dir, format } => {
            run_scan(config, ScanTarget::Directory(dir), format).await
        }
        Command::Watch { samples } => run_watch(config, samples).await,
        Command::Ask { message } => run_ask(config, &message.iter().join(" ")).await,
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolve configuration: explicit file or discovered file, then the
/// environment, then `--url`.
fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)
            .wrap_err_with(|| format!("Invalid config {}", path.display()))?
            .with_env_overrides(),
        None => ClientConfig::discover().wrap_err("Invalid config")?,
    };
    if let Some(url) = &cli.url {
        config.base_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

/// Run one scan session to completion, aborting on Ctrl-C.
async fn run_scan(config: ClientConfig, target: ScanTarget, format: OutputFormat) -> Result<()> {
    let backend = Arc::new(HttpBackend::new(config.clone())?);
    let manager = ScanSessionManager::new(backend, &config);

    manager.with_selection(|selection| -> Result<()> {
        match target {
            ScanTarget::Files(paths) => {
                let files: Vec<FileHandle> = paths
                    .iter()
                    .map(FileHandle::from_path)
                    .collect::<Result<_, _>>()
                    .wrap_err("Invalid selection")?;
                selection.set_files(files);
            }
            ScanTarget::Directory(dir) => {
                selection
                    .set_directory_from_path(&dir)
                    .wrap_err_with(|| format!("Cannot read {}", dir.display()))?;
            }
        }
        let total: u64 = selection.files().map(|f| f.size).sum();
        eprintln!(
            "Scanning {} files ({})...",
            selection.len(),
            format_size(total, BINARY)
        );
        Ok(())
    })?;

    let handle = manager.start_scan()?;
    let id = handle.id();
    let mut progress = handle.progress();
    let wait = handle.wait();
    tokio::pin!(wait);

    let mut aborting = false;
    let outcome = loop {
        tokio::select! {
            outcome = &mut wait => break outcome,
            changed = progress.changed() => {
                if changed.is_err() {
                    break (&mut wait).await;
                }
                print_progress(&progress.borrow_and_update());
            }
            signal = tokio::signal::ctrl_c(), if !aborting => {
                signal.wrap_err("Cannot listen for Ctrl-C")?;
                aborting = true;
                eprintln!("Aborting scan...");
                manager.abort_session(id);
            }
        }
    };

    if let Some(note) = manager.latest_notification() {
        eprintln!("{}: {}", note.title, note.message);
    }

    match outcome {
        SessionOutcome::Completed { results, summary } => {
            let threshold = manager.threat_threshold();
            match format {
                OutputFormat::Text => print_results(&results, threshold),
                OutputFormat::Json => {
                    let report = serde_json::json!({
                        "session": id.to_string(),
                        "summary": summary,
                        "results": results,
                    });
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
            }
            Ok(())
        }
        SessionOutcome::Aborted => Ok(()),
        SessionOutcome::Failed { message } => Err(eyre!("Scan failed: {message}")),
    }
}

fn print_progress(progress: &SessionProgress) {
    if progress.updates == 0 {
        return;
    }
    eprintln!(
        "{}  {}  {:.1}s  {:.1} files/s",
        progress.status_line(),
        progress.current_file,
        progress.elapsed.as_secs_f64(),
        progress.files_per_second()
    );
}

fn print_results(results: &[ScanResult], threshold: u8) {
    for result in results {
        match &result.outcome {
            FileOutcome::Error(error) => {
                println!("  {:<40} {:>5}  {}", result.filename, "ERROR", error);
            }
            FileOutcome::Analyzed(report) => {
                let marker = if report.is_threat(threshold) { "!" } else { " " };
                println!(
                    "{marker} {:<40} {:>5}  {:<8} {}",
                    result.filename,
                    report.threat_score.map_or_else(|| "-".to_string(), |s| s.to_string()),
                    report.threat_level,
                    report.indicators.iter().join("; ")
                );
            }
        }
    }
}

/// Poll metrics into the ring buffer and print each sample with window stats.
async fn run_watch(config: ClientConfig, samples: Option<usize>) -> Result<()> {
    let backend = HttpBackend::new(config.clone())?;
    let mut buffer = MetricsBuffer::new(config.metrics_capacity);
    let mut ticker = tokio::time::interval(config.metrics_interval());
    let mut taken = 0;

    while samples.is_none_or(|limit| taken < limit) {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => break,
        }
        taken += 1;

        let snapshot = match backend.current_metrics().await {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(error = %err, "metrics poll failed");
                continue;
            }
        };
        buffer.push(MetricSample::from_snapshot(&snapshot));

        if let Some(stats) = buffer.stats() {
            println!(
                "{}  cpu {:5.1}% (avg {:5.1}, peak {:5.1})  mem {:5.1}% (avg {:5.1}, peak {:5.1})  disk {:5.1}%  health {:3.0}",
                stats.current.timestamp.format("%H:%M:%S"),
                stats.current.cpu_percent,
                stats.avg_cpu,
                stats.peak_cpu,
                stats.current.memory_percent,
                stats.avg_memory,
                stats.peak_memory,
                snapshot.disk.percent,
                snapshot.health_score()
            );
        }
    }

    Ok(())
}

async fn run_ask(config: ClientConfig, message: &str) -> Result<()> {
    let backend = HttpBackend::new(config.clone())?;
    match backend.ask_assistant(message).await? {
        AssistantReply::Answer(text) => println!("{text}"),
        AssistantReply::TimedOut => eprintln!(
            "The assistant did not answer within {}s",
            config.assistant_timeout_secs
        ),
    }
    Ok(())
}
