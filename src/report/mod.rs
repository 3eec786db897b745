//! Aggregation of per-file results and JSON persistence of the final report

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::scanner::{FinalReport, ScanResult, Summary};

/// Accumulates results as workers finish them
#[derive(Debug, Default)]
pub struct ReportAggregator {
    reports: Vec<ScanResult>,
    summary: Summary,
}

impl ReportAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, result: ScanResult) {
        self.summary.total_files += 1;
        if result.suspicious {
            self.summary.suspicious_files += 1;
        } else {
            self.summary.normal_files += 1;
        }
        self.reports.push(result);
    }

    pub fn finish(self, cancelled: bool) -> FinalReport {
        FinalReport {
            reports: self.reports,
            summary: self.summary,
            cancelled,
        }
    }
}

/// Order reports by file path instead of completion order
pub fn sort_by_path(report: &mut FinalReport) {
    report.reports.sort_by(|a, b| a.file_path.cmp(&b.file_path));
}

pub fn to_json(report: &FinalReport, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(report)
    } else {
        serde_json::to_string(report)
    };
    json.context("Failed to serialize report")
}

/// Write the report to `path` as JSON
pub fn write_json(report: &FinalReport, path: &Path, pretty: bool) -> Result<()> {
    let json = to_json(report, pretty)?;
    fs::write(path, json).with_context(|| format!("Failed to write report file: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "Report written");
    Ok(())
}
