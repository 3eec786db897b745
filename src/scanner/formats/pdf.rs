use anyhow::{Context, Result};
use flate2::Compression;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use lazy_static::lazy_static;
use regex::bytes::Regex;
use std::borrow::Cow;
use std::fs;
use std::io::{Read, Write};
use std::ops::Range;

use super::{FormatHandler, HandlerContext, settle};
use crate::scanner::remediate::strip_tokens;
use crate::scanner::types::{Outcome, ScanTarget, TokenMatch};

lazy_static! {
    /// `stream` EOL data [EOL] `endstream`; group 1 is the encoded data
    static ref STREAM: Regex = Regex::new(r"(?s-u)stream(?:\r\n|\r|\n)(.*?)(?:\r\n|\r|\n)?endstream")
        .expect("stream pattern is valid");

    /// Direct `/Length N` entries; group 2 is set for indirect `N G R` references
    static ref LENGTH: Regex = Regex::new(r"(?-u)/Length\s+(\d+)(\s+\d+\s+R)?")
        .expect("length pattern is valid");
}

/// Byte positions of one stream inside the raw PDF
#[derive(Debug, Clone)]
struct StreamSpan {
    keyword_start: usize,
    data: Range<usize>,
}

fn find_streams(content: &[u8]) -> Vec<StreamSpan> {
    STREAM
        .captures_iter(content)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let data = caps.get(1)?;
            Some(StreamSpan {
                keyword_start: whole.start(),
                data: data.range(),
            })
        })
        .collect()
}

/// Zlib-inflate a stream; anything that is not valid zlib yields `None`
fn inflate(data: &[u8]) -> Option<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).ok()?;
    Some(decoded)
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Rewrite the last direct `/Length` in a stream's dictionary region
fn patch_length(region: &[u8], new_len: usize) -> Cow<'_, [u8]> {
    let Some(caps) = LENGTH.captures_iter(region).last() else {
        return Cow::Borrowed(region);
    };
    if caps.get(2).is_some() {
        // Indirect length object; it lives elsewhere in the file.
        return Cow::Borrowed(region);
    }
    let Some(digits) = caps.get(1) else {
        return Cow::Borrowed(region);
    };

    let mut patched = Vec::with_capacity(region.len() + 8);
    patched.extend_from_slice(&region[..digits.start()]);
    patched.extend_from_slice(new_len.to_string().as_bytes());
    patched.extend_from_slice(&region[digits.end()..]);
    Cow::Owned(patched)
}

/// Strip tokens from every compressed stream that carries them, then from
/// any literal occurrences left in the raw bytes
fn rewrite(content: &[u8], streams: &[StreamSpan], tokens: &[TokenMatch]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(content.len());
    let mut cursor = 0;

    for span in streams {
        let Some(decoded) = inflate(&content[span.data.clone()]) else {
            continue;
        };
        let cleaned = strip_tokens(&decoded, tokens)?;
        if matches!(cleaned, Cow::Borrowed(_)) {
            continue;
        }

        let encoded = deflate(&cleaned).context("Failed to re-compress PDF stream")?;
        out.extend_from_slice(&patch_length(&content[cursor..span.keyword_start], encoded.len()));
        out.extend_from_slice(&content[span.keyword_start..span.data.start]);
        out.extend_from_slice(&encoded);
        cursor = span.data.end;
    }
    out.extend_from_slice(&content[cursor..]);

    Ok(strip_tokens(&out, tokens)?.into_owned())
}

/// PDF documents: every deflated `stream` is one payload
#[derive(Debug, Default)]
pub struct PdfHandler;

impl FormatHandler for PdfHandler {
    fn name(&self) -> &'static str {
        "pdf"
    }

    fn scan(&self, target: &ScanTarget, ctx: &HandlerContext) -> Outcome {
        let content = match fs::read(&target.path) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("Error reading PDF file {}: {}", target.path.display(), e);
                return Outcome::unreadable();
            }
        };

        let streams = find_streams(&content);
        let mut tokens = Vec::new();
        let mut inflated = 0usize;
        for span in &streams {
            match inflate(&content[span.data.clone()]) {
                Some(decoded) => {
                    inflated += 1;
                    tokens.extend(ctx.pdf_matcher.find(&decoded));
                }
                None => tracing::trace!(
                    file = %target.path.display(),
                    offset = span.data.start,
                    "Skipping stream that does not inflate"
                ),
            }
        }
        tracing::debug!(
            file = %target.path.display(),
            streams = streams.len(),
            inflated,
            "PDF streams examined"
        );

        settle(target, ctx.mode, tokens, |tokens| rewrite(&content, &streams, tokens))
    }
}
