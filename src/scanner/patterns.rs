use aho_corasick::AhoCorasick;
use lazy_static::lazy_static;
use regex::bytes::Regex;

use super::types::TokenMatch;

lazy_static! {
    /// URLs inside decompressed PDF streams end at any character that cannot
    /// appear unescaped in a URI
    static ref PDF_URL: Regex = Regex::new(r#"(?-u)https?://[^\s<>"'{}|\\^`]+"#)
        .expect("PDF URL pattern is valid");

    /// Archive entries and plain text only stop at whitespace
    static ref LOOSE_URL: Regex = Regex::new(r"(?-u)https?://\S+")
        .expect("loose URL pattern is valid");
}

/// Which URL grammar to apply to a payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlPattern {
    Pdf,
    Loose,
}

impl UrlPattern {
    fn regex(self) -> &'static Regex {
        match self {
            UrlPattern::Pdf => &PDF_URL,
            UrlPattern::Loose => &LOOSE_URL,
        }
    }
}

/// Domains whose URLs are never reported or removed.
///
/// An entry matches when it occurs anywhere in the URL, so `example.com`
/// also suppresses `cdn.example.com` and `http://x.test/?r=example.com`.
#[derive(Debug, Clone, Default)]
pub struct IgnorePolicy {
    domains: Vec<String>,
    automaton: Option<AhoCorasick>,
}

impl IgnorePolicy {
    pub fn new<I, S>(domains: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let domains: Vec<String> = domains
            .into_iter()
            .map(|d| d.as_ref().trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let automaton = if domains.is_empty() {
            None
        } else {
            match AhoCorasick::new(&domains) {
                Ok(ac) => Some(ac),
                Err(e) => {
                    tracing::warn!("Could not build ignore automaton, falling back to linear search: {}", e);
                    None
                }
            }
        };

        Self { domains, automaton }
    }

    pub fn domains(&self) -> &[String] {
        &self.domains
    }

    pub fn is_ignored(&self, url: &[u8]) -> bool {
        match &self.automaton {
            Some(ac) => ac.is_match(url),
            None => self
                .domains
                .iter()
                .any(|d| contains(url, d.as_bytes())),
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}

/// Finds canary-token URLs in byte payloads
#[derive(Debug, Clone)]
pub struct TokenMatcher {
    pattern: UrlPattern,
    policy: IgnorePolicy,
}

impl TokenMatcher {
    pub fn new(pattern: UrlPattern, policy: IgnorePolicy) -> Self {
        Self { pattern, policy }
    }

    /// Every non-ignored URL in first-seen order, duplicates included
    pub fn find(&self, payload: &[u8]) -> Vec<TokenMatch> {
        self.pattern
            .regex()
            .find_iter(payload)
            .map(|m| m.as_bytes())
            .filter(|url| !self.policy.is_ignored(url))
            .map(TokenMatch::new)
            .collect()
    }
}
