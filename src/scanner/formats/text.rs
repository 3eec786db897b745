use anyhow::Context;
use std::fs;

use super::{FormatHandler, HandlerContext, settle};
use crate::scanner::remediate::strip_tokens;
use crate::scanner::types::{Outcome, ScanTarget};

/// Plain text and HTML: the whole file is one payload
#[derive(Debug, Default)]
pub struct TextHandler;

impl FormatHandler for TextHandler {
    fn name(&self) -> &'static str {
        "text"
    }

    fn scan(&self, target: &ScanTarget, ctx: &HandlerContext) -> Outcome {
        let content = match fs::read(&target.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Error reading text file {}: {}", target.path.display(), e);
                return Outcome::unreadable();
            }
        };

        let tokens = ctx.loose_matcher.find(&content);
        settle(target, ctx.mode, tokens, |tokens| {
            let cleaned = strip_tokens(&content, tokens)
                .with_context(|| format!("Failed to strip tokens from {}", target.path.display()))?;
            Ok(cleaned.into_owned())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::remediate::backup_path;
    use crate::scanner::types::{FileState, ScanOptions};
    use std::path::Path;
    use tempfile::TempDir;

    fn scan_file(path: &Path, options: &ScanOptions) -> Outcome {
        let size = fs::metadata(path).map(|m| m.len()).unwrap_or(0);
        let target = ScanTarget::new(path.to_path_buf(), size);
        TextHandler.scan(&target, &HandlerContext::new(options))
    }

    #[test]
    fn test_finds_token_in_text() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("note.txt");
        fs::write(&file, "Visit http://tracker.example.com/abc123 now").unwrap();

        let outcome = scan_file(&file, &ScanOptions::default());
        assert_eq!(outcome.tokens.len(), 1);
        assert_eq!(outcome.tokens[0].to_url_string(), "http://tracker.example.com/abc123");
        assert_eq!(outcome.state, FileState::Suspicious);
    }

    #[test]
    fn test_apply_removes_tokens_and_backs_up() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("page.html");
        let original = "<p>https://t.example/a</p>\n<p>https://t.example/a</p>\n";
        fs::write(&file, original).unwrap();

        let options = ScanOptions {
            remove: true,
            ..ScanOptions::default()
        };
        let outcome = scan_file(&file, &options);
        assert_eq!(outcome.state, FileState::Remediated);
        assert_eq!(outcome.tokens.len(), 2);

        // The loose pattern swallows the closing tag together with the URL.
        assert_eq!(fs::read_to_string(&file).unwrap(), "<p>\n<p>\n");
        assert_eq!(fs::read_to_string(backup_path(&file)).unwrap(), original);
    }

    #[test]
    fn test_dry_run_touches_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("note.txt");
        fs::write(&file, "see http://canary.test/1").unwrap();

        let options = ScanOptions {
            remove: true,
            dry_run: true,
            ..ScanOptions::default()
        };
        let outcome = scan_file(&file, &options);
        assert_eq!(outcome.state, FileState::WouldRemediate);
        assert_eq!(fs::read_to_string(&file).unwrap(), "see http://canary.test/1");
        assert!(!backup_path(&file).exists());
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let temp_dir = TempDir::new().unwrap();
        let outcome = scan_file(&temp_dir.path().join("gone.txt"), &ScanOptions::default());
        assert_eq!(outcome.state, FileState::Unreadable);
        assert!(outcome.tokens.is_empty());
    }
}
