//! Public entry point: one locator in, deduplicated descriptors out.
//!
//! [`Resolver`] wires the pipeline together: the chain resolver walks the
//! embed chain, the strategy table dispatches every candidate it hands
//! over (independent candidates concurrently), and the aggregator collapses
//! the combined output. Everything that can go wrong mid-pipeline is
//! absorbed; the caller sees descriptors or an empty list.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, instrument};

use crate::aggregate::aggregate;
use crate::chain::{ChainOutcome, ChainResolver, DEFAULT_MAX_DEPTH};
use crate::dispatch::{ExtractorDelegate, NoDelegate, StrategyTable};
use crate::error::ResolveError;
use crate::fetch::{FetchClient, FetchError};
use crate::model::{normalize_url, Candidate, FetchContext, StreamDescriptor, SubtitleSink};
use crate::rules::{MirrorRotation, SiteRules};
use crate::scan::Scanner;

/// Configures and builds a [`Resolver`].
pub struct ResolverBuilder {
    rules: SiteRules,
    delegate: Arc<dyn ExtractorDelegate>,
    subtitle_sink: Option<SubtitleSink>,
    rotation: Option<Arc<MirrorRotation>>,
    max_depth: usize,
    timeout: Duration,
}

impl Default for ResolverBuilder {
    fn default() -> Self {
        Self {
            rules: SiteRules::default(),
            delegate: Arc::new(NoDelegate),
            subtitle_sink: None,
            rotation: None,
            max_depth: DEFAULT_MAX_DEPTH,
            timeout: Duration::from_secs(15),
        }
    }
}

impl ResolverBuilder {
    #[must_use]
    pub fn rules(mut self, rules: SiteRules) -> Self {
        self.rules = rules;
        self
    }

    #[must_use]
    pub fn delegate(mut self, delegate: Arc<dyn ExtractorDelegate>) -> Self {
        self.delegate = delegate;
        self
    }

    #[must_use]
    pub fn subtitle_sink(mut self, sink: SubtitleSink) -> Self {
        self.subtitle_sink = Some(sink);
        self
    }

    /// Caller-owned mirror rotation consulted by the playback-API strategy.
    #[must_use]
    pub fn mirror_rotation(mut self, rotation: Arc<MirrorRotation>) -> Self {
        self.rotation = Some(rotation);
        self
    }

    #[must_use]
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Uniform per-fetch timeout applied to every hop.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<Resolver, FetchError> {
        let client = Arc::new(FetchClient::with_timeout(self.timeout)?);
        let rules = Arc::new(self.rules);
        let scanner = Scanner::with_rules(&rules);
        let table = StrategyTable::new(
            Arc::clone(&client),
            Arc::clone(&rules),
            self.delegate,
            self.subtitle_sink,
            self.rotation,
        );
        Ok(Resolver {
            client,
            rules,
            scanner,
            table,
            max_depth: self.max_depth,
        })
    }
}

/// The stream source resolution pipeline.
pub struct Resolver {
    client: Arc<FetchClient>,
    rules: Arc<SiteRules>,
    scanner: Scanner,
    table: StrategyTable,
    max_depth: usize,
}

impl Resolver {
    #[must_use]
    pub fn builder() -> ResolverBuilder {
        ResolverBuilder::default()
    }

    /// Build a resolver with defaults: built-in rules, no delegate.
    pub fn new() -> Result<Self, FetchError> {
        Self::builder().build()
    }

    /// Resolve an opaque locator into playable stream descriptors.
    ///
    /// Zero descriptors is the normal "nothing playable found" outcome.
    /// The only error is an unusable locator; mid-pipeline failures are
    /// absorbed per branch.
    #[instrument(skip(self), fields(locator = %locator))]
    pub async fn resolve(
        &self,
        locator: &str,
        referer_hint: Option<&str>,
    ) -> Result<Vec<StreamDescriptor>, ResolveError> {
        let locator = locator.trim();
        if locator.is_empty() || !locator.starts_with("http") {
            return Err(ResolveError::InvalidLocator(locator.to_string()));
        }

        let mut ctx = FetchContext::new(locator);
        if let Some(referer) = referer_hint {
            ctx.referer = Some(referer.to_string());
        }

        let chain = ChainResolver::new(&self.client, &self.scanner, &self.table)
            .with_max_depth(self.max_depth);

        let (candidates, ctx) = match chain.follow(ctx).await {
            ChainOutcome::Candidates { candidates, ctx } => (candidates, ctx),
            ChainOutcome::DeadEnd(failure) => {
                debug!("chain ended without candidates: {failure}");
                return Ok(Vec::new());
            }
        };

        let dispatchable = self.prepare_candidates(candidates);
        if dispatchable.is_empty() {
            return Ok(Vec::new());
        }

        // Independent candidates fan out concurrently; each task owns its
        // result list and the merge happens here.
        let batches = futures::future::join_all(
            dispatchable
                .iter()
                .map(|candidate| self.table.dispatch(candidate, &ctx)),
        )
        .await;

        Ok(aggregate(batches.into_iter().flatten().collect()))
    }

    /// Dead-mirror rewrites, re-dedup (rewrites can merge candidates), and
    /// the dispatchability filter.
    fn prepare_candidates(&self, candidates: Vec<Candidate>) -> Vec<Candidate> {
        let mut seen = std::collections::HashSet::new();
        candidates
            .into_iter()
            .map(|mut c| {
                c.raw_url = self.rules.apply_rewrites(&c.raw_url);
                c
            })
            .filter(|c| seen.insert(normalize_url(&c.raw_url)))
            .filter(|c| self.table.is_dispatchable(c))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_locator_is_invalid() {
        let resolver = Resolver::new().unwrap();
        let err = resolver.resolve("   ", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidLocator(_)));
    }

    #[tokio::test]
    async fn bare_id_locator_is_invalid() {
        let resolver = Resolver::new().unwrap();
        let err = resolver.resolve("abc123", None).await.unwrap_err();
        assert!(matches!(err, ResolveError::InvalidLocator(_)));
    }
}
