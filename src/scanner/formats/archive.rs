use anyhow::{Context, Result};
use std::borrow::Cow;
use std::fs::{self, File};
use std::io::{self, BufReader, Cursor, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::{FormatHandler, HandlerContext, settle};
use crate::scanner::patterns::TokenMatcher;
use crate::scanner::remediate::strip_tokens;
use crate::scanner::types::{Outcome, ScanTarget, TokenMatch};

/// Where an extracted entry's bytes live until the archive is rebuilt
#[derive(Debug)]
enum EntryData {
    Scratch(PathBuf),
    /// Names that would escape the scratch directory are never written to disk
    Memory(Vec<u8>),
}

impl EntryData {
    fn read(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            EntryData::Scratch(path) => Ok(Cow::Owned(
                fs::read(path).with_context(|| format!("Failed to read extracted file {}", path.display()))?,
            )),
            EntryData::Memory(bytes) => Ok(Cow::Borrowed(bytes)),
        }
    }
}

/// A regular entry that carried tokens
#[derive(Debug)]
struct DirtyEntry {
    index: usize,
    name: String,
    data: EntryData,
    tokens: Vec<TokenMatch>,
}

type Archive = ZipArchive<BufReader<File>>;

fn open_archive(path: &Path) -> Result<Archive> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    ZipArchive::new(BufReader::new(file)).with_context(|| format!("Failed to read zip structure of {}", path.display()))
}

/// Extract entry `index` into the scratch directory and return its location
fn extract_entry(archive: &mut Archive, index: usize, scratch: &Path) -> Result<Option<(String, EntryData)>> {
    let mut entry = archive.by_index(index).context("Failed to open entry")?;
    if entry.is_dir() {
        return Ok(None);
    }

    let name = entry.name().to_string();
    let data = match entry.enclosed_name() {
        Some(relative) => {
            // Entry names may repeat inside one archive; the index keeps them apart.
            let destination = scratch.join(index.to_string()).join(relative);
            if let Some(parent) = destination.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory {}", parent.display()))?;
            }
            let mut out = File::create(&destination)
                .with_context(|| format!("Failed to create {}", destination.display()))?;
            io::copy(&mut entry, &mut out).with_context(|| format!("Failed to extract {}", name))?;
            EntryData::Scratch(destination)
        }
        None => {
            tracing::warn!(entry = %name, "Entry name escapes the archive root, scanning it in memory");
            let mut bytes = Vec::new();
            io::copy(&mut entry, &mut bytes).with_context(|| format!("Failed to extract {}", name))?;
            EntryData::Memory(bytes)
        }
    };

    Ok(Some((name, data)))
}

fn scan_entries(archive: &mut Archive, scratch: &Path, matcher: &TokenMatcher, archive_path: &Path) -> Vec<DirtyEntry> {
    let mut dirty = Vec::new();

    for index in 0..archive.len() {
        let (name, data) = match extract_entry(archive, index, scratch) {
            Ok(Some(extracted)) => extracted,
            Ok(None) => continue,
            Err(e) => {
                tracing::error!("Error extracting entry {} of {}: {:#}", index, archive_path.display(), e);
                continue;
            }
        };

        let tokens = match data.read() {
            Ok(payload) => matcher.find(&payload),
            Err(e) => {
                tracing::error!("Error reading entry {} of {}: {:#}", name, archive_path.display(), e);
                continue;
            }
        };

        if !tokens.is_empty() {
            tracing::debug!(archive = %archive_path.display(), entry = %name, tokens = tokens.len(), "Tokens in entry");
            dirty.push(DirtyEntry { index, name, data, tokens });
        }
    }

    dirty
}

/// Options for a rewritten entry, carried over from the original
fn options_for(archive: &mut Archive, index: usize, size: usize) -> Result<SimpleFileOptions> {
    let original = archive.by_index_raw(index)?;

    let method = match original.compression() {
        CompressionMethod::Stored => CompressionMethod::Stored,
        _ => CompressionMethod::Deflated,
    };
    let mut options = SimpleFileOptions::default()
        .compression_method(method)
        .large_file(size as u64 >= u32::MAX as u64);
    if let Some(modified) = original.last_modified() {
        options = options.last_modified_time(modified);
    }
    if let Some(mode) = original.unix_mode() {
        options = options.unix_permissions(mode);
    }

    Ok(options)
}

/// Build a new container: dirty entries are stripped and re-compressed,
/// everything else is copied without decompressing
fn rebuild(path: &Path, dirty: &[DirtyEntry]) -> Result<Vec<u8>> {
    let mut archive = open_archive(path)?;
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for index in 0..archive.len() {
        match dirty.iter().find(|entry| entry.index == index) {
            Some(entry) => {
                let content = entry.data.read()?;
                let cleaned = strip_tokens(&content, &entry.tokens)?;
                let options = options_for(&mut archive, index, cleaned.len())?;

                writer
                    .start_file(entry.name.clone(), options)
                    .with_context(|| format!("Failed to start entry {}", entry.name))?;
                writer.write_all(&cleaned)?;
            }
            None => {
                let raw = archive.by_index_raw(index)?;
                writer.raw_copy_file(raw).context("Failed to copy entry")?;
            }
        }
    }

    Ok(writer.finish()?.into_inner())
}

/// Zip containers, including Office Open XML documents
#[derive(Debug, Default)]
pub struct ArchiveHandler;

impl FormatHandler for ArchiveHandler {
    fn name(&self) -> &'static str {
        "archive"
    }

    fn scan(&self, target: &ScanTarget, ctx: &HandlerContext) -> Outcome {
        let path = &target.path;

        let mut builder = tempfile::Builder::new();
        builder.prefix("canary-sweep-");
        let scratch = match &ctx.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        let scratch = match scratch {
            Ok(dir) => dir,
            Err(e) => {
                tracing::error!("Error creating temporary directory for {}: {}", path.display(), e);
                return Outcome::unreadable();
            }
        };

        let mut archive = match open_archive(path) {
            Ok(archive) => archive,
            Err(e) => {
                tracing::error!("Error opening zip file {}: {:#}", path.display(), e);
                return Outcome::unreadable();
            }
        };

        let dirty = scan_entries(&mut archive, scratch.path(), &ctx.loose_matcher, path);
        drop(archive);

        let tokens: Vec<TokenMatch> = dirty.iter().flat_map(|entry| entry.tokens.iter().cloned()).collect();
        let outcome = settle(target, ctx.mode, tokens, |_| rebuild(path, &dirty));

        close_scratch(scratch, path);
        outcome
    }
}

fn close_scratch(scratch: TempDir, path: &Path) {
    let location = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        tracing::warn!("Failed to remove scratch directory {} for {}: {}", location.display(), path.display(), e);
    }
}
