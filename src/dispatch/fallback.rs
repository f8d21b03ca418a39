//! Generic decode-and-mine fallback.
//!
//! Last stop for a candidate no specific strategy claimed: fetch the embed
//! page and squeeze it -- unpack a packed player script if present, peel
//! `atob` layers, and mine player-setup assignments (`file:`, `source:`,
//! `var src =`) plus literal media URLs.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;

use super::Strategy;
use crate::decode::{decode_atob_calls, looks_packed, unpack};
use crate::decode::layered::{clean_mined_url, looks_like_url};
use crate::error::BranchFailure;
use crate::fetch::FetchClient;
use crate::model::{normalize_url, Candidate, FetchContext, Quality, StreamDescriptor};
use crate::rules::SiteRules;
use crate::scan::{has_embed_segment, is_direct_media_url, ContentKind, Scanner};

/// Player-setup assignments that carry a file URL.
static FILE_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:file|source|src)\s*:\s*["']([^"']+)["']"#).expect("file assignment regex")
});

static VAR_ASSIGN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"var\s+(?:src|url)\s*=\s*["']([^"']+)["']"#).expect("var assignment regex")
});

/// Resolution label embedded in a URL path (`.../720p/...`, `...-1080p...`).
static URL_QUALITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{3,4})p").expect("url quality regex"));

pub struct FallbackStrategy {
    client: Arc<FetchClient>,
    rules: Arc<SiteRules>,
    scanner: Scanner,
}

impl FallbackStrategy {
    pub fn new(client: Arc<FetchClient>, rules: Arc<SiteRules>) -> Self {
        let scanner = Scanner::with_rules(&rules);
        Self {
            client,
            rules,
            scanner,
        }
    }

    /// Mine every decodable URL out of a fetched embed body, in priority
    /// order: unpacked player script, atob layers, player assignments,
    /// literal media URLs.
    fn mine_body(&self, body: &str) -> Vec<String> {
        let mut urls: Vec<String> = Vec::new();

        if looks_packed(body) {
            if let Some(unpacked) = unpack(body) {
                for caps in FILE_ASSIGN_RE.captures_iter(&unpacked) {
                    if let Some(m) = caps.get(1) {
                        urls.push(clean_mined_url(m.as_str()));
                    }
                }
                for candidate in self.scanner.scan(&unpacked, ContentKind::Script) {
                    urls.push(candidate.raw_url);
                }
            }
        }

        urls.extend(decode_atob_calls(body));

        for re in [&*FILE_ASSIGN_RE, &*VAR_ASSIGN_RE] {
            for caps in re.captures_iter(body) {
                if let Some(m) = caps.get(1) {
                    let cleaned = clean_mined_url(m.as_str());
                    if looks_like_url(&cleaned) {
                        urls.push(cleaned);
                    }
                }
            }
        }

        for candidate in self.scanner.scan(body, ContentKind::Script) {
            urls.push(candidate.raw_url);
        }

        urls.retain(|u| u.starts_with("http"));
        let mut seen = std::collections::HashSet::new();
        urls.retain(|u| seen.insert(normalize_url(u)));
        urls
    }

    fn descriptor_for(&self, url: String, referer: &str) -> StreamDescriptor {
        let quality = URL_QUALITY_RE
            .captures(&url)
            .and_then(|caps| caps.get(1))
            .map_or(Quality::Unknown, |m| Quality::from_label(m.as_str()));
        StreamDescriptor::new(host_label(&url), url)
            .with_quality(quality)
            .with_referer(referer.to_string())
    }
}

#[async_trait]
impl Strategy for FallbackStrategy {
    fn name(&self) -> &'static str {
        "fallback"
    }

    /// Direct media URLs, embed paths, and configured host hints. Plain
    /// page URLs stay with the chain resolver.
    fn matches(&self, candidate: &Candidate) -> bool {
        let url = &candidate.raw_url;
        is_direct_media_url(url)
            || has_embed_segment(url)
            || self.rules.host_hints.iter().any(|h| url.contains(h))
    }

    async fn run(
        &self,
        candidate: &Candidate,
        ctx: &FetchContext,
    ) -> Result<Vec<StreamDescriptor>, BranchFailure> {
        // A directly playable URL needs no further fetching.
        if is_direct_media_url(&candidate.raw_url) {
            return Ok(vec![
                self.descriptor_for(candidate.raw_url.clone(), &ctx.url)
            ]);
        }

        let embed_ctx = FetchContext::new(candidate.raw_url.clone()).with_referer(ctx.url.clone());
        let page = self
            .client
            .get(&embed_ctx)
            .await
            .map_err(|e| BranchFailure::Fetch {
                url: candidate.raw_url.clone(),
                reason: e.to_string(),
            })?;

        let descriptors = self
            .mine_body(&page.body)
            .into_iter()
            .map(|url| self.descriptor_for(url, &candidate.raw_url))
            .collect();
        Ok(descriptors)
    }
}

/// Short source label from a URL host.
fn host_label(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "direct".to_string())
}
