//! Styled terminal output for the canary-sweep binary
//!
//! Diagnostics go through `tracing`; this is only the human-facing summary.

use console::style;

use crate::scanner::FinalReport;

/// Output handler for consistent CLI formatting
pub struct Output {
    verbose: bool,
    quiet: bool,
}

impl Output {
    pub fn new(verbose: bool, quiet: bool) -> Self {
        Self { verbose, quiet }
    }

    pub fn banner(&self) {
        if !self.quiet {
            println!(
                "{} {}",
                style("canary-sweep").bold().cyan(),
                style(format!("v{}", crate::VERSION)).dim()
            );
            println!("{}", style("Canary token detection and removal").dim());
            self.separator();
        }
    }

    pub fn success(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("✔").green(), message);
        }
    }

    pub fn warning(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("⚠").yellow(), message);
        }
    }

    pub fn info(&self, message: &str) {
        if !self.quiet {
            println!("{} {}", style("ℹ").blue(), message);
        }
    }

    /// Only printed with `-v`
    pub fn verbose(&self, message: &str) {
        if self.verbose && !self.quiet {
            println!("{} {}", style("ℹ").dim(), style(message).dim());
        }
    }

    pub fn header(&self, title: &str) {
        if !self.quiet {
            println!("\n{}", style(title).bold().underlined());
        }
    }

    pub fn list_item(&self, item: &str) {
        if !self.quiet {
            println!("    {} {}", style("•").cyan(), item);
        }
    }

    pub fn separator(&self) {
        if !self.quiet {
            println!("{}", style("─".repeat(50)).dim());
        }
    }

    pub fn summary_stats(&self, label: &str, value: usize) {
        if !self.quiet {
            println!("  {:<18} {}", style(label).dim(), style(value.to_string()).bold());
        }
    }

    /// Suspicious files with their URLs, then the counts
    pub fn report_summary(&self, report: &FinalReport) {
        let suspicious: Vec<_> = report.reports.iter().filter(|r| r.suspicious).collect();
        if !suspicious.is_empty() {
            self.header("Suspicious files");
            for result in suspicious {
                self.warning(&result.file_path);
                for url in &result.found_urls {
                    self.list_item(&style(url).yellow().to_string());
                }
            }
        }

        self.header("Summary");
        self.summary_stats("Total files", report.summary.total_files);
        self.summary_stats("Suspicious files", report.summary.suspicious_files);
        self.summary_stats("Normal files", report.summary.normal_files);
    }
}
