pub mod core;
pub mod directory;
pub mod formats;
pub mod patterns;
pub mod remediate;
pub mod types;

// Re-export main types for easier access
pub use self::core::{scan, scan_target};
pub use formats::{FormatHandler, HandlerContext, handler_for};
pub use patterns::{IgnorePolicy, TokenMatcher, UrlPattern};
pub use types::{
    CancelFlag, FileFormat, FileState, FinalReport, Outcome, RemediationMode, ScanError, ScanOptions, ScanResult,
    ScanTarget, Summary, TokenMatch,
};
