use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Container family a file belongs to, decided purely from its extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileFormat {
    Pdf,
    Archive,
    Text,
    Unsupported,
}

impl FileFormat {
    /// Classify a path by its extension.
    ///
    /// Matching is case-sensitive: `report.PDF` is `Unsupported`.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("pdf") => FileFormat::Pdf,
            Some("zip" | "docx" | "xlsx" | "pptx") => FileFormat::Archive,
            Some("txt" | "html") => FileFormat::Text,
            _ => FileFormat::Unsupported,
        }
    }
}

/// A discovered file waiting to be scanned
#[derive(Debug, Clone)]
pub struct ScanTarget {
    pub path: PathBuf,
    pub size: u64,
    pub format: FileFormat,
}

impl ScanTarget {
    pub fn new(path: PathBuf, size: u64) -> Self {
        let format = FileFormat::from_path(&path);
        Self { path, size, format }
    }
}

/// A literal URL found in a payload.
///
/// Kept as raw bytes so removal hits exactly what was matched, even when the
/// surrounding payload is not valid UTF-8.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TokenMatch(Vec<u8>);

impl TokenMatch {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_url_string(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }
}

impl fmt::Display for TokenMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

/// Per-file entry of the final report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanResult {
    pub file_path: String,
    pub suspicious: bool,
    pub found_urls: Vec<String>,
    pub file_size: u64,
    /// RFC-3339 timestamp taken when this file finished
    pub processed_at: String,
}

impl ScanResult {
    pub fn new(target: &ScanTarget, tokens: &[TokenMatch]) -> Self {
        let found_urls: Vec<String> = tokens.iter().map(TokenMatch::to_url_string).collect();
        Self {
            file_path: target.path.to_string_lossy().into_owned(),
            suspicious: !found_urls.is_empty(),
            found_urls,
            file_size: target.size,
            processed_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Result for a file nothing could be determined about
    pub fn clean(target: &ScanTarget) -> Self {
        Self::new(target, &[])
    }
}

/// Aggregate counts over all results of a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total_files: usize,
    pub suspicious_files: usize,
    pub normal_files: usize,
}

/// The single artifact a run hands back to its caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalReport {
    pub reports: Vec<ScanResult>,
    pub summary: Summary,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub cancelled: bool,
}

/// Run-wide settings threaded down to every handler
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub ignored_domains: Vec<String>,
    pub remove: bool,
    pub dry_run: bool,
    /// Worker threads; 0 derives the count from available CPUs
    pub workers: usize,
    pub follow_symlinks: bool,
}

impl ScanOptions {
    pub fn remediation_mode(&self) -> RemediationMode {
        match (self.remove, self.dry_run) {
            (false, _) => RemediationMode::Off,
            (true, true) => RemediationMode::DryRun,
            (true, false) => RemediationMode::Apply,
        }
    }
}

/// What a handler is allowed to do once tokens are found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationMode {
    Off,
    DryRun,
    Apply,
}

/// Where a single file ended up after its handler ran
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Clean,
    Suspicious,
    WouldRemediate,
    Remediated,
    RemediationFailed,
    Unreadable,
}

/// Tokens plus final state returned by a format handler
#[derive(Debug, Clone)]
pub struct Outcome {
    pub tokens: Vec<TokenMatch>,
    pub state: FileState,
}

impl Outcome {
    pub fn clean() -> Self {
        Self {
            tokens: Vec::new(),
            state: FileState::Clean,
        }
    }

    pub fn unreadable() -> Self {
        Self {
            tokens: Vec::new(),
            state: FileState::Unreadable,
        }
    }

    pub fn found(tokens: Vec<TokenMatch>, state: FileState) -> Self {
        if tokens.is_empty() {
            return Self::clean();
        }
        Self { tokens, state }
    }
}

/// Shared flag that stops new files from being dispatched
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Fatal errors that abort a whole run
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("path {0} does not exist")]
    RootNotFound(PathBuf),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: ignore::Error,
    },

    #[error("worker pool failed: {0}")]
    Pool(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(FileFormat::from_path(Path::new("a/b.pdf")), FileFormat::Pdf);
        assert_eq!(FileFormat::from_path(Path::new("memo.docx")), FileFormat::Archive);
        assert_eq!(FileFormat::from_path(Path::new("sheet.xlsx")), FileFormat::Archive);
        assert_eq!(FileFormat::from_path(Path::new("deck.pptx")), FileFormat::Archive);
        assert_eq!(FileFormat::from_path(Path::new("bundle.zip")), FileFormat::Archive);
        assert_eq!(FileFormat::from_path(Path::new("notes.txt")), FileFormat::Text);
        assert_eq!(FileFormat::from_path(Path::new("page.html")), FileFormat::Text);
        assert_eq!(FileFormat::from_path(Path::new("photo.jpg")), FileFormat::Unsupported);
        assert_eq!(FileFormat::from_path(Path::new("Makefile")), FileFormat::Unsupported);
        assert_eq!(FileFormat::from_path(Path::new("SCAN.PDF")), FileFormat::Unsupported);
    }

    #[test]
    fn test_remediation_mode() {
        let mut options = ScanOptions::default();
        assert_eq!(options.remediation_mode(), RemediationMode::Off);
        options.dry_run = true;
        assert_eq!(options.remediation_mode(), RemediationMode::Off);
        options.remove = true;
        assert_eq!(options.remediation_mode(), RemediationMode::DryRun);
        options.dry_run = false;
        assert_eq!(options.remediation_mode(), RemediationMode::Apply);
    }

    #[test]
    fn test_result_suspicious_follows_tokens() {
        let target = ScanTarget::new(PathBuf::from("x.txt"), 12);
        let result = ScanResult::new(&target, &[TokenMatch::new("http://a.example/1")]);
        assert!(result.suspicious);
        assert_eq!(result.found_urls, vec!["http://a.example/1".to_string()]);
        assert_eq!(result.file_size, 12);
        assert!(chrono::DateTime::parse_from_rfc3339(&result.processed_at).is_ok());

        let clean = ScanResult::clean(&target);
        assert!(!clean.suspicious);
        assert!(clean.found_urls.is_empty());
    }

    #[test]
    fn test_cancelled_flag_only_serialized_when_set() {
        let report = FinalReport::default();
        let json = serde_json::to_value(&report).unwrap();
        assert!(json.get("cancelled").is_none());
        assert!(json.get("reports").is_some());
        assert_eq!(json["summary"]["total_files"], 0);

        let report = FinalReport {
            cancelled: true,
            ..FinalReport::default()
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["cancelled"], true);
    }

    #[test]
    fn test_cancel_flag_is_shared() {
        let flag = CancelFlag::new();
        let clone = flag.clone();
        assert!(!flag.is_cancelled());
        clone.cancel();
        assert!(flag.is_cancelled());
    }
}
