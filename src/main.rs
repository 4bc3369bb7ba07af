//! diskusage: per-directory disk usage report.
//!
//! Thin binary entry point. All scanning logic lives in `diskusage-core`.

use anyhow::Context;
use clap::Parser;
use crossbeam_channel::RecvTimeoutError;
use diskusage_core::report::write_csv;
use diskusage_core::scanner::start_scan;
use diskusage_core::{DirectoryScanner, ScanConfig};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Report the directories holding the most bytes directly beneath them.
///
/// Each directory's total counts only the files it contains itself, not
/// the files in its subdirectories.
#[derive(Parser, Debug)]
#[command(name = "diskusage", version, about, long_about = None)]
struct Cli {
    /// Directory to scan.
    path: PathBuf,

    /// Number of directories to list. Zero or negative prints only the summary line.
    #[arg(short = 'n', long, default_value_t = 10, allow_negative_numbers = true)]
    top: i64,

    /// Worker threads (0 = one per logical CPU).
    #[arg(short = 't', long, default_value_t = 0)]
    threads: usize,

    /// Print the report as JSON instead of text.
    #[arg(long)]
    json: bool,

    /// Also write every scanned directory to this CSV file.
    #[arg(long, value_name = "FILE")]
    csv: Option<PathBuf>,

    /// Stop scanning after this many seconds and report what was found.
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log every directory descended into.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log warnings and errors.
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so the report on stdout stays machine-readable.
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else if cli.quiet {
        tracing::Level::WARN
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let config = ScanConfig::new(&cli.path).threads(cli.threads);
    let scanner = Arc::new(
        DirectoryScanner::new(config)
            .with_context(|| format!("cannot scan {}", cli.path.display()))?,
    );

    let handle = start_scan(Arc::clone(&scanner)).context("failed to start scanner thread")?;

    let mut deadline = cli
        .timeout
        .map(|secs| Instant::now() + Duration::from_secs(secs));
    loop {
        let event = match deadline {
            Some(at) => handle.events.recv_deadline(at),
            None => handle
                .events
                .recv()
                .map_err(|_| RecvTimeoutError::Disconnected),
        };
        match event {
            Ok(event) if event.is_terminal() => break,
            Ok(_) => {}
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Timeout reached with {} directories recorded, stopping scan",
                    scanner.current_entry_count()
                );
                handle.cancel();
                deadline = None;
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    let outcome = handle
        .join()
        .context("scanner thread panicked before finishing")?;
    if outcome.cancelled {
        warn!("Scan was stopped early; totals are partial");
    }

    let count = usize::try_from(cli.top).unwrap_or(0);
    let report = scanner.get_report(count);
    if cli.json {
        println!("{}", report.to_json().context("failed to serialise report")?);
    } else {
        print!("{report}");
    }

    if let Some(path) = &cli.csv {
        let file = File::create(path)
            .with_context(|| format!("cannot create {}", path.display()))?;
        write_csv(&scanner.snapshot(), BufWriter::new(file))
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!("Wrote {} directories to {}", report.directory_count, path.display());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn negative_top_is_accepted() {
        let cli = Cli::try_parse_from(["diskusage", "--top", "-3", "/tmp"]).unwrap();
        assert_eq!(cli.top, -3);
        assert_eq!(usize::try_from(cli.top).unwrap_or(0), 0);
    }

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["diskusage", "/data"]).unwrap();
        assert_eq!(cli.top, 10);
        assert_eq!(cli.threads, 0);
        assert!(!cli.json);
        assert!(cli.csv.is_none());
        assert!(cli.timeout.is_none());
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        assert!(Cli::try_parse_from(["diskusage", "-v", "-q", "/data"]).is_err());
    }
}
