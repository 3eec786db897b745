//! Command-line interface for canary-sweep
//!
//! Parses flags with clap, layers them over the file/env configuration and
//! runs the scan on a blocking thread so Ctrl-C can be observed meanwhile.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

mod output;

pub use output::Output;

use crate::config::{ConfigLoader, ConfigOverrides};
use crate::report;
use crate::scanner::{self, CancelFlag};

/// Exit status of a run interrupted by Ctrl-C
const EXIT_CANCELLED: u8 = 130;

/// Find and remove canary tokens from documents
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// File or directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Remove found tokens from the files (originals kept as <file>.bak)
    #[arg(short = 'f', long)]
    pub remove: bool,

    /// With --remove, show what would be removed without writing anything
    #[arg(long)]
    pub dry_run: bool,

    /// Number of worker threads (0 = auto)
    #[arg(short, long, value_name = "N")]
    pub workers: Option<usize>,

    /// Additional domains to ignore (comma-separated or multiple -i flags)
    #[arg(short = 'i', long = "ignore-domain", value_name = "DOMAIN", value_delimiter = ',')]
    pub ignore_domains: Vec<String>,

    /// Drop the configured ignore list before adding --ignore-domain values
    #[arg(long)]
    pub no_default_ignores: bool,

    /// Where to write the JSON report
    #[arg(short, long, value_name = "FILE")]
    pub report: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Print nothing except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// Skip the startup banner
    #[arg(long)]
    pub no_banner: bool,
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            remove: self.remove.then_some(true),
            dry_run: self.dry_run.then_some(true),
            workers: self.workers,
            extra_ignored_domains: self.ignore_domains.clone(),
            clear_default_ignores: self.no_default_ignores,
            report_path: self.report.clone(),
        }
    }

    pub async fn run(self) -> Result<ExitCode> {
        setup_logging(self.verbose, self.quiet);
        let output = Output::new(self.verbose > 0, self.quiet);

        if !self.no_banner {
            output.banner();
        }

        let mut config = ConfigLoader::load(self.config.as_deref())?.extract()?;
        config.apply_overrides(&self.overrides());
        let options = config.to_scan_options();

        if options.dry_run && !options.remove {
            output.warning("--dry-run has no effect without --remove");
        }
        output.verbose(&format!("Ignoring domains: {}", options.ignored_domains.join(", ")));
        output.info(&format!("Scanning {}", self.path.display()));

        let cancel = CancelFlag::new();
        let signal_task = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("Interrupted, finishing files already in progress");
                    cancel.cancel();
                }
            })
        };

        let path = self.path.clone();
        let scan_cancel = cancel.clone();
        let result = tokio::task::spawn_blocking(move || scanner::scan(&path, &options, &scan_cancel))
            .await
            .context("Scan task failed")?;
        signal_task.abort();

        let mut final_report = result?;

        if config.report.sort_by_path {
            report::sort_by_path(&mut final_report);
        }
        report::write_json(&final_report, &config.report.path, config.report.pretty)?;

        output.report_summary(&final_report);
        output.success(&format!("Report written to {}", config.report.path.display()));

        if final_report.cancelled {
            output.warning("Scan cancelled before every file was processed");
            return Ok(ExitCode::from(EXIT_CANCELLED));
        }
        Ok(ExitCode::SUCCESS)
    }
}

/// Filter for the given flags when `RUST_LOG` is not set
fn default_filter(verbose: u8, quiet: bool) -> tracing_subscriber::EnvFilter {
    if quiet {
        // Per-file errors still reach stderr
        return tracing_subscriber::EnvFilter::new("error");
    }
    match verbose {
        0 => tracing_subscriber::EnvFilter::new("warn"),
        1 => tracing_subscriber::EnvFilter::new("info,ignore=warn"),
        2 => tracing_subscriber::EnvFilter::new("debug,ignore=warn"),
        _ => tracing_subscriber::EnvFilter::new("trace"),
    }
}

/// Install the tracing subscriber; `RUST_LOG` wins over `-v` and `-q`
fn setup_logging(verbose: u8, quiet: bool) {
    let filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(verbose, quiet));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_flags_become_overrides() {
        let cli = Cli::parse_from([
            "canary-sweep",
            "-f",
            "-w",
            "4",
            "-i",
            "a.com,b.com",
            "-i",
            "c.com",
            "-r",
            "out.json",
            "docs",
        ]);
        let overrides = cli.overrides();

        assert_eq!(cli.path, PathBuf::from("docs"));
        assert_eq!(overrides.remove, Some(true));
        assert_eq!(overrides.dry_run, None);
        assert_eq!(overrides.workers, Some(4));
        assert_eq!(overrides.extra_ignored_domains, vec!["a.com", "b.com", "c.com"]);
        assert_eq!(overrides.report_path, Some(PathBuf::from("out.json")));
    }

    #[test]
    fn test_quiet_keeps_error_logs() {
        assert_eq!(default_filter(0, true).to_string(), "error");
        assert_eq!(default_filter(3, true).to_string(), "error");
        assert_eq!(default_filter(0, false).to_string(), "warn");
    }

    #[test]
    fn test_verbose_counts() {
        let cli = Cli::parse_from(["canary-sweep", "-vvv", "."]);
        assert_eq!(cli.verbose, 3);
        assert!(!cli.overrides().clear_default_ignores);
    }
}
