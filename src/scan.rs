//! Candidate scanner: pure text analysis of a fetched document.
//!
//! Applies a fixed priority order of pattern matchers to an HTML document
//! or script blob and returns possible video source references in discovery
//! order:
//!
//! 1. Markup attributes (`iframe`/`source`/`video`/`embed` `src`/`data-src`)
//! 2. Known embed-trigger function calls in inline scripts and `onclick`
//!    handlers
//! 3. Known streaming-host anchors
//! 4. Generic URL-shaped regex restricted to media extensions and embed
//!    path segments
//!
//! A deny-list removes ad/analytics/social hosts, and duplicates collapse
//! to the first occurrence. No network I/O happens here.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};

use crate::model::{normalize_url, Candidate, CandidateOrigin};
use crate::rules::SiteRules;

/// What kind of text is being scanned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Html,
    Script,
}

/// File extensions accepted by the generic URL matcher.
const MEDIA_EXTENSIONS: &[&str] = &[".m3u8", ".mp4", ".mkv", ".webm", ".ts", ".mpd"];

/// Embed path segments accepted by the generic URL matcher.
const EMBED_SEGMENTS: &[&str] = &["/embed/", "/e/", "/v/"];

/// Generic URL-shaped matcher.
static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s"'<>()\\]+"#).expect("url regex"));

/// `src`/`data-src` assignments inside script blobs.
static SCRIPT_SRC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)(?:src|data-src)\s*=\s*["']([^"']+)["']"#).expect("script src regex")
});

static IFRAME_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe, source, video, embed").expect("markup selector"));
static ONCLICK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("[onclick]").expect("onclick selector"));
static SCRIPT_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("script").expect("script selector"));
static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("anchor selector"));

/// Scans documents and script blobs for candidate source references.
pub struct Scanner {
    call_re: Regex,
    deny_hosts: Vec<String>,
    anchor_hints: Vec<String>,
}

impl Scanner {
    /// Scanner with the built-in rule set.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rules(&SiteRules::default())
    }

    /// Scanner configured from site rules: extended call vocabulary,
    /// deny-list, and anchor host hints.
    #[must_use]
    pub fn with_rules(rules: &SiteRules) -> Self {
        // Longest names first so the readable form survives review; the
        // regex engine matches correctly either way.
        let mut vocab = rules.call_vocabulary();
        vocab.sort_by_key(|name| std::cmp::Reverse(name.len()));
        let alternation = vocab
            .iter()
            .map(|name| regex::escape(name))
            .collect::<Vec<_>>()
            .join("|");
        let call_re = Regex::new(&format!(r#"(?:{alternation})\s*\(\s*['"]([^'"]+)['"]"#))
            .expect("call vocabulary regex");

        Self {
            call_re,
            deny_hosts: rules.deny_hosts.clone(),
            anchor_hints: rules.host_hints.clone(),
        }
    }

    /// Scan `content` and return candidates in discovery order, deduplicated
    /// by normalized URL (first occurrence kept), deny-listed hosts removed.
    #[must_use]
    pub fn scan(&self, content: &str, kind: ContentKind) -> Vec<Candidate> {
        let mut found: Vec<Candidate> = Vec::new();

        match kind {
            ContentKind::Html => self.scan_html(content, &mut found),
            ContentKind::Script => self.scan_script(content, &mut found),
        }

        // Generic URL regex over the raw text, lowest priority.
        for m in URL_RE.find_iter(content) {
            let url = m.as_str().trim_end_matches(['"', '\'', ',', ';']);
            if is_media_or_embed_url(url) {
                found.push(Candidate::new(url, CandidateOrigin::RegexMined));
            }
        }

        self.filter_and_dedupe(found)
    }

    fn scan_html(&self, content: &str, found: &mut Vec<Candidate>) {
        let document = Html::parse_document(content);

        // (a) explicit markup attributes
        for element in document.select(&IFRAME_SELECTOR) {
            let attrs = element.value();
            for name in ["src", "data-src"] {
                if let Some(raw) = attrs.attr(name) {
                    if let Some(url) = usable_reference(raw) {
                        found.push(Candidate::new(url, CandidateOrigin::IframeSrc));
                    }
                }
            }
        }

        // (b) embed-trigger calls: inline scripts, then onclick handlers
        for script in document.select(&SCRIPT_SELECTOR) {
            let text: String = script.text().collect();
            for caps in self.call_re.captures_iter(&text) {
                if let Some(url) = caps.get(1).and_then(|m| usable_reference(m.as_str())) {
                    found.push(Candidate::new(url, CandidateOrigin::ScriptCall));
                }
            }
        }
        for element in document.select(&ONCLICK_SELECTOR) {
            let Some(handler) = element.value().attr("onclick") else {
                continue;
            };
            for caps in self.call_re.captures_iter(handler) {
                if let Some(url) = caps.get(1).and_then(|m| usable_reference(m.as_str())) {
                    found.push(Candidate::new(url, CandidateOrigin::Onclick));
                }
            }
        }

        // Known streaming-host anchors (server list pages link them directly)
        if !self.anchor_hints.is_empty() {
            for anchor in document.select(&ANCHOR_SELECTOR) {
                let Some(href) = anchor.value().attr("href") else {
                    continue;
                };
                if self.anchor_hints.iter().any(|hint| href.contains(hint)) {
                    if let Some(url) = usable_reference(href) {
                        found.push(Candidate::new(url, CandidateOrigin::RegexMined));
                    }
                }
            }
        }
    }

    fn scan_script(&self, content: &str, found: &mut Vec<Candidate>) {
        for caps in SCRIPT_SRC_RE.captures_iter(content) {
            if let Some(url) = caps.get(1).and_then(|m| usable_reference(m.as_str())) {
                found.push(Candidate::new(url, CandidateOrigin::IframeSrc));
            }
        }
        for caps in self.call_re.captures_iter(content) {
            if let Some(url) = caps.get(1).and_then(|m| usable_reference(m.as_str())) {
                found.push(Candidate::new(url, CandidateOrigin::ScriptCall));
            }
        }
    }

    fn filter_and_dedupe(&self, found: Vec<Candidate>) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        found
            .into_iter()
            .filter(|c| !self.is_denied(&c.raw_url))
            .filter(|c| seen.insert(normalize_url(&c.raw_url)))
            .collect()
    }

    /// Deny-list check against the URL's host (substring fallback for
    /// unparseable references).
    fn is_denied(&self, raw_url: &str) -> bool {
        let host = url::Url::parse(raw_url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string));
        match host {
            Some(host) => self.deny_hosts.iter().any(|d| host.contains(d)),
            None => self.deny_hosts.iter().any(|d| raw_url.contains(d)),
        }
    }
}

impl Default for Scanner {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a raw markup reference into something followable: resolve
/// protocol-relative `//host` to `https://host`, keep absolute URLs and
/// rooted paths, drop fragments/`javascript:`/empty values.
fn usable_reference(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.starts_with('#')
        || trimmed.starts_with("javascript:")
        || trimmed.starts_with("data:")
        || trimmed.starts_with("about:")
    {
        return None;
    }
    if let Some(rest) = trimmed.strip_prefix("//") {
        return Some(format!("https://{rest}"));
    }
    Some(trimmed.to_string())
}

/// Generic-regex acceptance: allow-listed media extension or known embed
/// path segment.
fn is_media_or_embed_url(url: &str) -> bool {
    is_direct_media_url(url) || has_embed_segment(url)
}

/// Returns `true` when the URL path ends in an allow-listed container
/// extension, i.e. it is itself playable rather than an embed page.
pub(crate) fn is_direct_media_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    MEDIA_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

/// Returns `true` when the URL path contains a known embed segment.
pub(crate) fn has_embed_segment(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    EMBED_SEGMENTS.iter().any(|seg| path.contains(seg))
}
