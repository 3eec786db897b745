//! # canary-sweep
//!
//! Finds canary tokens (tracking URLs planted to detect when a document is
//! opened) in PDFs, Office/zip archives and text files, and optionally
//! removes them in place.
//!
//! ## Quick Start
//!
//! ```bash
//! # Report suspicious files under ./downloads into report.json
//! canary-sweep ./downloads
//!
//! # See what removal would change, then do it
//! canary-sweep --remove --dry-run ./downloads
//! canary-sweep --remove ./downloads
//! ```
//!
//! The library entry point is [`scanner::scan`], which takes an explicit
//! [`scanner::ScanOptions`] value and returns a [`scanner::FinalReport`].

pub mod cli;
pub mod config;
pub mod parallel;
pub mod report;
pub mod scanner;

pub use cli::{Cli, Output};
pub use config::CanaryConfig;

/// Result type alias for canary-sweep operations
pub type Result<T> = anyhow::Result<T>;

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const PKG_NAME: &str = env!("CARGO_PKG_NAME");
