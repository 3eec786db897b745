//! Configuration management for canary-sweep
//!
//! Settings are layered with figment (see [`core`]) and extracted into the
//! typed [`CanaryConfig`]. The scanner itself never reads configuration; it
//! receives a [`ScanOptions`] value built from this struct.

pub mod core;
pub mod smart_load;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::scanner::ScanOptions;

pub use self::core::{ConfigLoader, ConfigSources};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CanaryConfig {
    pub scanner: ScannerConfig,
    pub remediation: RemediationConfig,
    pub report: ReportConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Substrings that mark a URL as benign
    pub ignored_domains: Vec<String>,

    /// Worker threads (0 = auto)
    pub workers: usize,

    /// Follow symbolic links while walking directories
    pub follow_symlinks: bool,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            ignored_domains: default_ignored_domains(),
            workers: 0,
            follow_symlinks: false,
        }
    }
}

/// Office/XML namespace hosts present in virtually every document
pub fn default_ignored_domains() -> Vec<String> {
    ["schemas.openxmlformats.org", "schemas.microsoft.com", "purl.org", "w3.org"]
        .into_iter()
        .map(String::from)
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemediationConfig {
    /// Strip found tokens from files
    pub remove: bool,

    /// Compute removals without touching any file
    pub dry_run: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub path: PathBuf,
    pub pretty: bool,
    pub sort_by_path: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("report.json"),
            pretty: true,
            sort_by_path: false,
        }
    }
}

/// Values given on the command line; `None` leaves the layered value alone
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub remove: Option<bool>,
    pub dry_run: Option<bool>,
    pub workers: Option<usize>,
    pub extra_ignored_domains: Vec<String>,
    pub clear_default_ignores: bool,
    pub report_path: Option<PathBuf>,
}

impl CanaryConfig {
    /// Apply command-line values on top of everything else
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(remove) = overrides.remove {
            self.remediation.remove = remove;
        }
        if let Some(dry_run) = overrides.dry_run {
            self.remediation.dry_run = dry_run;
        }
        if let Some(workers) = overrides.workers {
            self.scanner.workers = workers;
        }
        if overrides.clear_default_ignores {
            self.scanner.ignored_domains.clear();
        }
        for domain in &overrides.extra_ignored_domains {
            if !self.scanner.ignored_domains.contains(domain) {
                self.scanner.ignored_domains.push(domain.clone());
            }
        }
        if let Some(path) = &overrides.report_path {
            self.report.path = path.clone();
        }
    }

    /// The explicit options value handed to the scanner
    pub fn to_scan_options(&self) -> ScanOptions {
        ScanOptions {
            ignored_domains: self.scanner.ignored_domains.clone(),
            remove: self.remediation.remove,
            dry_run: self.remediation.dry_run,
            workers: self.scanner.workers,
            follow_symlinks: self.scanner.follow_symlinks,
        }
    }
}
