use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use std::time::Instant;

use super::directory::discover;
use super::formats::{FormatHandler, HandlerContext, handler_for};
use super::types::{CancelFlag, FileState, FinalReport, ScanError, ScanOptions, ScanResult, ScanTarget};
use crate::parallel::{ParallelConfig, ParallelProcessor};
use crate::report::ReportAggregator;

/// Scan `path` (a file or a directory tree) for canary tokens.
///
/// Only whole-run problems are returned as errors: a missing root or a tree
/// that cannot be walked. Every discovered file gets exactly one entry in the
/// report, whatever happened to it.
pub fn scan(path: &Path, options: &ScanOptions, cancel: &CancelFlag) -> Result<FinalReport, ScanError> {
    let start_time = Instant::now();
    let targets = discover(path, options.follow_symlinks)?;
    let ctx = HandlerContext::new(options);

    tracing::info!(
        root = %path.display(),
        files = targets.len(),
        mode = ?ctx.mode,
        "Scanning for canary tokens"
    );

    let processor = ParallelProcessor::new(ParallelConfig {
        workers: options.workers,
        ..ParallelConfig::default()
    });
    let processed = processor
        .process(targets, |target| scan_target(&target, &ctx), cancel)
        .map_err(|e| ScanError::Pool(e.to_string()))?;

    let mut aggregator = ReportAggregator::new();
    for result in processed.results {
        aggregator.push(result);
    }
    let report = aggregator.finish(processed.cancelled);

    tracing::info!(
        total = report.summary.total_files,
        suspicious = report.summary.suspicious_files,
        normal = report.summary.normal_files,
        cancelled = report.cancelled,
        elapsed_ms = start_time.elapsed().as_millis() as u64,
        "Scan finished"
    );

    Ok(report)
}

/// Scan a single target on the current thread.
///
/// A panicking handler is contained here so it cannot take down a worker.
pub fn scan_target(target: &ScanTarget, ctx: &HandlerContext) -> ScanResult {
    run_handler(handler_for(target.format), target, ctx)
}

fn run_handler(handler: &dyn FormatHandler, target: &ScanTarget, ctx: &HandlerContext) -> ScanResult {
    let outcome = match panic::catch_unwind(AssertUnwindSafe(|| handler.scan(target, ctx))) {
        Ok(outcome) => outcome,
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            tracing::error!("{} handler panicked on {}: {}", handler.name(), target.path.display(), reason);
            return ScanResult::clean(target);
        }
    };

    let result = ScanResult::new(target, &outcome.tokens);
    if result.suspicious {
        tracing::info!("The file {} is suspicious. URLs found: {:?}", result.file_path, result.found_urls);
        if outcome.state == FileState::RemediationFailed {
            tracing::warn!("Tokens in {} were detected but could not be removed", result.file_path);
        }
    } else {
        tracing::debug!("The file {} seems normal.", result.file_path);
    }

    result
}
