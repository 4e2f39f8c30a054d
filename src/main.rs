//! stalescan - find large directory trees that nobody has touched in a long time.
//!
//! Usage:
//!   stalescan [PATH]                       Scan with the defaults (180d, 10g)
//!   stalescan /data --older-than 1y        Age threshold
//!   stalescan /data --min-size 500g        Size threshold
//!   stalescan /data --workers 8            Spread top-level directories over threads
//!   stalescan /data --html report.html     Also write an HTML report
//!   stalescan --help                       Show help

mod report;
mod units;

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;
use std::thread;
use std::time::Duration;

use clap::{ArgAction, Parser, ValueEnum};
use color_eyre::eyre::{Result, WrapErr};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, error, info};
use tracing_subscriber::EnvFilter;

use stalescan_core::{ScanConfig, SortOrder, TimeBasis};
use stalescan_scan::{ScanEngine, ScanProgress};

use crate::report::{render_json, render_text, write_html};
use crate::units::{parse_duration, parse_size};

const EXIT_MATCHES: u8 = 0;
const EXIT_NO_MATCHES: u8 = 1;
const EXIT_FATAL: u8 = 2;
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(
    name = "stalescan",
    version,
    about = "Find large directories that have not been touched in a long time",
    long_about = "stalescan walks a directory tree once and reports the shallowest \
                  directories whose total size is at least --min-size and whose \
                  newest file is older than --older-than.\n\n\
                  Exit status: 0 when something matched, 1 when nothing matched, \
                  2 on a fatal error, 130 when interrupted."
)]
struct Cli {
    /// Root directory to scan
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Age threshold, e.g. 90d, 12w, 1y (no unit means days)
    #[arg(long, value_name = "DURATION", default_value = "180d", value_parser = parse_duration)]
    older_than: Duration,

    /// Minimum directory size, e.g. 500g, 1.5tb, 200gb
    #[arg(long, value_name = "SIZE", default_value = "10g", value_parser = parse_size)]
    min_size: u64,

    /// Which timestamp decides recency: mtime, atime or ctime
    #[arg(long, value_name = "BASIS", default_value = "mtime")]
    time_basis: TimeBasis,

    /// Number of worker threads for top-level subtrees
    #[arg(short, long, default_value = "1")]
    workers: usize,

    /// Follow symlinks (cycle detection enabled, single worker only)
    #[arg(long)]
    follow_symlinks: bool,

    /// Do not cross filesystem boundaries
    #[arg(long)]
    one_filesystem: bool,

    /// Sort results by size, age or path
    #[arg(long, value_name = "ORDER", default_value = "size")]
    sort: SortOrder,

    /// Write an HTML report to the given path
    #[arg(long, value_name = "PATH")]
    html: Option<PathBuf>,

    /// Output format for stdout
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Maximum number of error samples kept in the report
    #[arg(long, value_name = "N", default_value = "200")]
    error_limit: usize,

    /// More log output (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> ExitCode {
    if let Err(e) = color_eyre::install() {
        eprintln!("Warning: could not install error reporter: {e}");
    }

    let cli = Cli::parse();
    setup_logging(cli.verbose, cli.quiet);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{:#}", e);
            eprintln!("Error: {:?}", e);
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    let config = ScanConfig::builder()
        .root(cli.path.clone())
        .min_size(cli.min_size)
        .max_age(cli.older_than)
        .time_basis(cli.time_basis)
        .follow_symlinks(cli.follow_symlinks)
        .one_filesystem(cli.one_filesystem)
        .workers(cli.workers)
        .error_limit(cli.error_limit)
        .build()
        .wrap_err("Invalid configuration")?;

    let engine = ScanEngine::new();

    // Setup signal handler for graceful shutdown
    let stop = engine.stop_flag();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupt received, finishing up...");
        stop.store(true, Ordering::SeqCst);
    })
    .wrap_err("Failed to set signal handler")?;

    let mut progress_rx = engine.subscribe();
    let progress = thread::spawn(move || {
        loop {
            match progress_rx.blocking_recv() {
                Ok(snapshot) => log_progress(&snapshot),
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    });

    info!(
        root = %config.root.display(),
        older_than_days = config.max_age.as_secs() / 86_400,
        min_size = config.min_size,
        workers = config.workers,
        "starting scan"
    );
    let scanned = engine.scan(&config);

    // Dropping the engine closes the progress channel.
    drop(engine);
    if progress.join().is_err() {
        debug!("progress logger exited abnormally");
    }

    let mut result = scanned.wrap_err("Scan failed")?;
    cli.sort.sort(&mut result.matches);

    let mut stdout = io::stdout().lock();
    match cli.format {
        OutputFormat::Text => render_text(&result, &mut stdout).wrap_err("Failed to write report")?,
        OutputFormat::Json => render_json(&result, &mut stdout).wrap_err("Failed to write report")?,
    }

    if let Some(html_path) = &cli.html {
        write_html(&result, html_path).wrap_err_with(|| {
            format!("Failed to write HTML report to {}", html_path.display())
        })?;
        if !cli.quiet {
            eprintln!("HTML report written to {}", html_path.display());
        }
    }

    Ok(if result.interrupted {
        EXIT_INTERRUPTED
    } else if result.has_matches() {
        EXIT_MATCHES
    } else {
        EXIT_NO_MATCHES
    })
}

fn log_progress(snapshot: &ScanProgress) {
    debug!(
        files = snapshot.files_scanned,
        dirs = snapshot.dirs_scanned,
        bytes = snapshot.bytes_scanned,
        errors = snapshot.errors_count,
        files_per_sec = snapshot.files_per_second() as u64,
        path = %snapshot.current_path.display(),
        "scan progress"
    );
}

/// Logs go to stderr so that `--format json` output stays clean.
/// `RUST_LOG` takes precedence over the verbosity flags.
fn setup_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("stalescan={level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
