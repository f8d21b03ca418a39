//! Chain resolver: bounded iframe/redirect traversal.
//!
//! Starting from a locator URL, fetch, scan, and either hand the candidate
//! set to dispatch (something matched a strategy) or follow the page's
//! single dominant embed reference one level deeper. A per-call visited set
//! guarantees no URL is fetched twice, and a depth bound caps pathological
//! nesting. Every way a traversal can end is data, not an error.

use std::collections::HashSet;

use tracing::{debug, instrument};

use crate::dispatch::StrategyTable;
use crate::error::BranchFailure;
use crate::fetch::FetchClient;
use crate::model::{normalize_url, Candidate, CandidateOrigin, FetchContext};
use crate::scan::{ContentKind, Scanner};

/// Default bound on chain depth.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// How one traversal ended.
#[derive(Debug)]
pub enum ChainOutcome {
    /// At least one candidate matched a strategy; dispatch from here.
    Candidates {
        candidates: Vec<Candidate>,
        ctx: FetchContext,
    },
    /// The branch died; resolution continues with whatever other branches
    /// produced (usually nothing).
    DeadEnd(BranchFailure),
}

/// Walks an embed chain until candidates become dispatchable.
pub struct ChainResolver<'a> {
    client: &'a FetchClient,
    scanner: &'a Scanner,
    table: &'a StrategyTable,
    max_depth: usize,
}

impl<'a> ChainResolver<'a> {
    pub fn new(client: &'a FetchClient, scanner: &'a Scanner, table: &'a StrategyTable) -> Self {
        Self {
            client,
            scanner,
            table,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Follow the chain from `ctx` until a hand-off or a dead end.
    #[instrument(skip(self, ctx), fields(start = %ctx.url))]
    pub async fn follow(&self, mut ctx: FetchContext) -> ChainOutcome {
        let mut visited: HashSet<String> = HashSet::new();

        for depth in 0..=self.max_depth {
            if !visited.insert(normalize_url(&ctx.url)) {
                debug!(url = %ctx.url, "cycle detected");
                return ChainOutcome::DeadEnd(BranchFailure::CycleDetected {
                    url: ctx.url.clone(),
                });
            }

            let page = match self.client.get(&ctx).await {
                Ok(page) => page,
                Err(err) => {
                    debug!(url = %ctx.url, "hop fetch failed: {err}");
                    return ChainOutcome::DeadEnd(BranchFailure::Fetch {
                        url: ctx.url.clone(),
                        reason: err.to_string(),
                    });
                }
            };

            // Redirects count as visits too; a later hop back to the final
            // URL would otherwise sneak around the cycle guard.
            visited.insert(normalize_url(&page.final_url));

            let candidates =
                absolutize(self.scanner.scan(&page.body, ContentKind::Html), &page.final_url);

            if candidates.iter().any(|c| self.table.is_dispatchable(c)) {
                debug!(depth, count = candidates.len(), "handing off to dispatch");
                return ChainOutcome::Candidates { candidates, ctx };
            }

            match dominant_embed(&candidates) {
                Some(next_url) if depth < self.max_depth => {
                    if visited.contains(&normalize_url(next_url)) {
                        debug!(url = %next_url, "next hop already visited");
                        return ChainOutcome::DeadEnd(BranchFailure::CycleDetected {
                            url: next_url.to_string(),
                        });
                    }
                    debug!(depth, next = %next_url, "following dominant embed");
                    ctx = ctx.next_hop(next_url.to_string());
                }
                Some(_) => break,
                None => {
                    debug!(depth, "no next hop");
                    return ChainOutcome::DeadEnd(BranchFailure::NoCandidates);
                }
            }
        }

        ChainOutcome::DeadEnd(BranchFailure::DepthExceeded {
            depth: self.max_depth,
        })
    }
}

/// The single dominant embedding reference, if the page has exactly one
/// iframe-origin candidate.
fn dominant_embed(candidates: &[Candidate]) -> Option<&str> {
    let mut iframes = candidates
        .iter()
        .filter(|c| c.origin == CandidateOrigin::IframeSrc);
    match (iframes.next(), iframes.next()) {
        (Some(only), None) => Some(&only.raw_url),
        _ => None,
    }
}

/// Resolve relative candidate URLs against the page they came from;
/// references that cannot be absolutized are dropped.
fn absolutize(candidates: Vec<Candidate>, base_url: &str) -> Vec<Candidate> {
    let base = url::Url::parse(base_url).ok();
    candidates
        .into_iter()
        .filter_map(|mut c| {
            if c.raw_url.starts_with("http://") || c.raw_url.starts_with("https://") {
                return Some(c);
            }
            let base = base.as_ref()?;
            let joined = base.join(&c.raw_url).ok()?;
            c.raw_url = joined.to_string();
            Some(c)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CandidateOrigin;

    fn candidate(url: &str, origin: CandidateOrigin) -> Candidate {
        Candidate::new(url, origin)
    }

    #[test]
    fn dominant_embed_requires_exactly_one_iframe() {
        let one = vec![candidate("https://a/page", CandidateOrigin::IframeSrc)];
        assert_eq!(dominant_embed(&one), Some("https://a/page"));

        let two = vec![
            candidate("https://a/1", CandidateOrigin::IframeSrc),
            candidate("https://a/2", CandidateOrigin::IframeSrc),
        ];
        assert_eq!(dominant_embed(&two), None);

        let mixed = vec![
            candidate("https://a/1", CandidateOrigin::IframeSrc),
            candidate("https://a/2", CandidateOrigin::ScriptCall),
        ];
        assert_eq!(dominant_embed(&mixed), Some("https://a/1"));
    }

    #[test]
    fn absolutize_joins_relative_refs() {
        let out = absolutize(
            vec![candidate("/player/abc", CandidateOrigin::IframeSrc)],
            "https://site.example/title/ep1",
        );
        assert_eq!(out[0].raw_url, "https://site.example/player/abc");
    }

    #[test]
    fn absolutize_keeps_absolute_refs() {
        let out = absolutize(
            vec![candidate("https://other.example/e/x", CandidateOrigin::IframeSrc)],
            "https://site.example/title",
        );
        assert_eq!(out[0].raw_url, "https://other.example/e/x");
    }

    #[test]
    fn absolutize_drops_unjoinable_refs() {
        let out = absolutize(
            vec![candidate("/player/abc", CandidateOrigin::IframeSrc)],
            "not a url",
        );
        assert!(out.is_empty());
    }
}
