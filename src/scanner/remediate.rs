//! Token removal and safe persistence of rewritten files
//!
//! Nothing in here decides *whether* a file should be touched; handlers check
//! the [`RemediationMode`](super::types::RemediationMode) first and only call
//! [`backup`] and [`persist`] in `Apply` mode.

use aho_corasick::{AhoCorasick, MatchKind};
use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::types::TokenMatch;

/// Distinct tokens in first-seen order
pub fn distinct_tokens(tokens: &[TokenMatch]) -> Vec<&TokenMatch> {
    let mut seen = std::collections::HashSet::new();
    tokens.iter().filter(|t| seen.insert(t.as_bytes())).collect()
}

/// Remove every occurrence of every token from `payload`.
///
/// All tokens are removed in one leftmost-longest pass: where two tokens start
/// at the same offset the longer one wins, so a short token that prefixes a
/// longer one can never leave the longer one's tail behind. Text produced by a
/// removal is not rescanned.
pub fn strip_tokens<'a>(payload: &'a [u8], tokens: &[TokenMatch]) -> Result<Cow<'a, [u8]>> {
    let needles: Vec<&[u8]> = distinct_tokens(tokens)
        .into_iter()
        .map(TokenMatch::as_bytes)
        .filter(|t| !t.is_empty())
        .collect();
    if needles.is_empty() {
        return Ok(Cow::Borrowed(payload));
    }

    let automaton = AhoCorasick::builder()
        .match_kind(MatchKind::LeftmostLongest)
        .build(&needles)
        .context("Failed to build token automaton")?;

    if !automaton.is_match(payload) {
        return Ok(Cow::Borrowed(payload));
    }

    let empty = vec![Vec::<u8>::new(); needles.len()];
    Ok(Cow::Owned(automaton.replace_all_bytes(payload, &empty)))
}

/// Sibling path the original is copied to before a destructive write
pub fn backup_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".bak");
    PathBuf::from(name)
}

/// Copy `path` to `<path>.bak`, logging on failure.
///
/// Callers continue with remediation whatever this returns.
pub fn backup(path: &Path) -> Result<PathBuf> {
    let destination = backup_path(path);
    match fs::copy(path, &destination) {
        Ok(_) => {
            tracing::debug!(original = %path.display(), backup = %destination.display(), "Backup created");
            Ok(destination)
        }
        Err(e) => {
            tracing::error!("Error creating backup for {}: {}", path.display(), e);
            Err(e).with_context(|| format!("Failed to back up {}", path.display()))
        }
    }
}

/// Atomically replace the file at `path` with `bytes`.
///
/// The data goes to a temporary file in the same directory first, is synced,
/// and then renamed over the original, so readers see either the old or the
/// new content. The original permissions are carried over. A symlink is
/// resolved first so the file it points to is replaced, not the link.
pub fn persist(path: &Path, bytes: &[u8]) -> Result<()> {
    let resolved = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let path = resolved.as_path();
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::Builder::new()
        .prefix(".canary-sweep.")
        .suffix(".tmp")
        .tempfile_in(parent)
        .with_context(|| format!("Failed to create temporary file next to {}", path.display()))?;

    tmp.write_all(bytes)
        .with_context(|| format!("Failed to write temporary file for {}", path.display()))?;
    tmp.flush()?;
    tmp.as_file().sync_all()?;

    if let Ok(metadata) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), metadata.permissions())
            .with_context(|| format!("Failed to copy permissions of {}", path.display()))?;
    }

    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to replace {}", path.display()))?;

    Ok(())
}
