use ignore::WalkBuilder;
use std::path::Path;

use super::types::{ScanError, ScanTarget};

/// Collect every regular file under `root`.
///
/// Unlike a source-tree walk nothing is filtered: hidden files, VCS
/// directories and git-ignored paths are all returned. A single file root
/// yields exactly one target. Any walk error aborts discovery.
pub fn discover(root: &Path, follow_symlinks: bool) -> Result<Vec<ScanTarget>, ScanError> {
    let metadata = std::fs::metadata(root).map_err(|_| ScanError::RootNotFound(root.to_path_buf()))?;

    if !metadata.is_dir() {
        return Ok(vec![ScanTarget::new(root.to_path_buf(), metadata.len())]);
    }

    let walker = WalkBuilder::new(root)
        .standard_filters(false)
        .follow_links(follow_symlinks)
        .build();

    let mut targets = Vec::new();
    for entry in walker {
        let entry = entry.map_err(|source| ScanError::Walk {
            path: root.to_path_buf(),
            source,
        })?;

        let Some(file_type) = entry.file_type() else {
            continue;
        };

        let size = if file_type.is_file() {
            match entry.metadata() {
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    tracing::debug!("Could not stat {}: {}", entry.path().display(), e);
                    0
                }
            }
        } else if file_type.is_symlink() {
            // Only reached when links are not followed. Links to files are
            // listed like any other file; links to directories are not descended.
            match std::fs::metadata(entry.path()) {
                Ok(metadata) if metadata.is_dir() => continue,
                Ok(metadata) => metadata.len(),
                Err(e) => {
                    tracing::debug!("Dangling symlink {}: {}", entry.path().display(), e);
                    0
                }
            }
        } else {
            continue;
        };
        targets.push(ScanTarget::new(entry.into_path(), size));
    }

    targets.sort_by(|a, b| a.path.cmp(&b.path));
    tracing::debug!(root = %root.display(), files = targets.len(), "Discovery finished");
    Ok(targets)
}
