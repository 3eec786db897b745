//! Format handlers and the extension dispatcher
//!
//! Every handler follows the same per-file sequence:
//!
//! ```text
//! Extract → Match → Clean
//!                 → (remove, !dry_run) Backup → Rewrite → Persist → Remediated | RemediationFailed
//!                 → (remove, dry_run)  Rewrite (in memory only)  → WouldRemediate
//!                 → (!remove)                                      Suspicious
//! ```
//!
//! Extraction failures end in `Unreadable` and report no tokens. A failed
//! backup is logged and the rewrite still goes ahead.

mod archive;
mod pdf;
mod text;

pub use archive::ArchiveHandler;
pub use pdf::PdfHandler;
pub use text::TextHandler;

use anyhow::Result;
use std::path::PathBuf;

use super::patterns::{IgnorePolicy, TokenMatcher, UrlPattern};
use super::remediate;
use super::types::{FileFormat, FileState, Outcome, RemediationMode, ScanOptions, ScanTarget, TokenMatch};

/// Per-run state shared by all handlers
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub mode: RemediationMode,
    pub pdf_matcher: TokenMatcher,
    pub loose_matcher: TokenMatcher,
    /// Parent of per-archive scratch directories; the system temp dir when unset
    pub scratch_root: Option<PathBuf>,
}

impl HandlerContext {
    pub fn new(options: &ScanOptions) -> Self {
        let policy = IgnorePolicy::new(&options.ignored_domains);
        tracing::debug!(domains = ?policy.domains(), "Active ignore list");
        Self {
            mode: options.remediation_mode(),
            pdf_matcher: TokenMatcher::new(UrlPattern::Pdf, policy.clone()),
            loose_matcher: TokenMatcher::new(UrlPattern::Loose, policy),
            scratch_root: None,
        }
    }

    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }
}

/// Scan one file of a known format and optionally strip what was found
pub trait FormatHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn scan(&self, target: &ScanTarget, ctx: &HandlerContext) -> Outcome;
}

/// Handler for every extension nobody claims
#[derive(Debug, Default)]
pub struct NoOpHandler;

impl FormatHandler for NoOpHandler {
    fn name(&self) -> &'static str {
        "none"
    }

    fn scan(&self, _target: &ScanTarget, _ctx: &HandlerContext) -> Outcome {
        Outcome::clean()
    }
}

static PDF: PdfHandler = PdfHandler;
static ARCHIVE: ArchiveHandler = ArchiveHandler;
static TEXT: TextHandler = TextHandler;
static NOOP: NoOpHandler = NoOpHandler;

/// Maps a file format to the handler responsible for it
pub fn handler_for(format: FileFormat) -> &'static dyn FormatHandler {
    match format {
        FileFormat::Pdf => &PDF,
        FileFormat::Archive => &ARCHIVE,
        FileFormat::Text => &TEXT,
        FileFormat::Unsupported => &NOOP,
    }
}

/// Drive the remediation half of the state machine once tokens are known.
///
/// `rewrite` builds the cleaned file contents; it is only invoked when the
/// mode asks for it.
pub(crate) fn settle<F>(target: &ScanTarget, mode: RemediationMode, tokens: Vec<TokenMatch>, rewrite: F) -> Outcome
where
    F: FnOnce(&[TokenMatch]) -> Result<Vec<u8>>,
{
    if tokens.is_empty() {
        return Outcome::clean();
    }

    let path = &target.path;
    match mode {
        RemediationMode::Off => Outcome::found(tokens, FileState::Suspicious),
        RemediationMode::DryRun => match rewrite(&tokens) {
            Ok(bytes) => {
                tracing::info!(
                    file = %path.display(),
                    tokens = remediate::distinct_tokens(&tokens).len(),
                    bytes_before = target.size,
                    bytes_after = bytes.len(),
                    "Dry run: would remove canary tokens"
                );
                Outcome::found(tokens, FileState::WouldRemediate)
            }
            Err(e) => {
                tracing::error!("Dry run could not rewrite {}: {:#}", path.display(), e);
                Outcome::found(tokens, FileState::RemediationFailed)
            }
        },
        RemediationMode::Apply => {
            // Best effort; the error has already been logged.
            let _ = remediate::backup(path);

            match rewrite(&tokens).and_then(|bytes| remediate::persist(path, &bytes)) {
                Ok(()) => {
                    tracing::info!(file = %path.display(), "Removed canary tokens");
                    Outcome::found(tokens, FileState::Remediated)
                }
                Err(e) => {
                    tracing::error!("Error remediating {}: {:#}", path.display(), e);
                    Outcome::found(tokens, FileState::RemediationFailed)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn target_for(path: PathBuf) -> ScanTarget {
        let size = fs::metadata(&path).map(|m| m.len()).unwrap_or(0);
        ScanTarget::new(path, size)
    }

    #[test]
    fn test_dispatch_by_format() {
        assert_eq!(handler_for(FileFormat::Pdf).name(), "pdf");
        assert_eq!(handler_for(FileFormat::Archive).name(), "archive");
        assert_eq!(handler_for(FileFormat::Text).name(), "text");
        assert_eq!(handler_for(FileFormat::Unsupported).name(), "none");
    }

    #[test]
    fn test_noop_never_finds_anything() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("image.jpg");
        fs::write(&file, b"http://canary.test/in-a-jpg").unwrap();

        let ctx = HandlerContext::new(&ScanOptions::default());
        let outcome = handler_for(FileFormat::Unsupported).scan(&target_for(file), &ctx);
        assert!(outcome.tokens.is_empty());
        assert_eq!(outcome.state, FileState::Clean);
    }

    #[test]
    fn test_settle_apply_keeps_tokens_when_rewrite_fails() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("doc.txt");
        fs::write(&file, b"http://canary.test/x").unwrap();

        let outcome = settle(
            &target_for(file.clone()),
            RemediationMode::Apply,
            vec![TokenMatch::new("http://canary.test/x")],
            |_| Err(anyhow::anyhow!("disk full")),
        );
        assert_eq!(outcome.state, FileState::RemediationFailed);
        assert_eq!(outcome.tokens.len(), 1);
        assert_eq!(fs::read(&file).unwrap(), b"http://canary.test/x");
    }

    #[test]
    fn test_settle_off_never_rewrites() {
        let target = ScanTarget::new(PathBuf::from("unused.txt"), 0);
        let outcome = settle(
            &target,
            RemediationMode::Off,
            vec![TokenMatch::new("http://canary.test/x")],
            |_| panic!("rewrite must not run"),
        );
        assert_eq!(outcome.state, FileState::Suspicious);
    }
}
