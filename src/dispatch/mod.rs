//! Strategy dispatch: candidate URL → handling strategy → descriptors.
//!
//! # Architecture
//!
//! - [`Strategy`]: async trait one handling strategy implements
//! - [`StrategyTable`]: ordered table, first matching strategy that yields
//!   results wins for that candidate
//!
//! Priority order is fixed: the sealed playback API, then delegation to an
//! external extractor, then the generic decode-and-mine fallback. Dispatch
//! of one candidate never short-circuits the rest of the candidate set --
//! the pipeline accumulates across candidates.

pub mod delegate;
pub mod fallback;
pub mod playback_api;

use std::sync::Arc;

use async_trait::async_trait;

pub use delegate::{DelegateStrategy, ExtractorDelegate, NoDelegate};
pub use fallback::FallbackStrategy;
pub use playback_api::PlaybackApiStrategy;

use crate::error::BranchFailure;
use crate::fetch::FetchClient;
use crate::model::{Candidate, FetchContext, StreamDescriptor, SubtitleSink};
use crate::rules::{MirrorRotation, SiteRules};

/// One way of turning a candidate into stream descriptors.
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Short lowercase strategy name for logging.
    fn name(&self) -> &'static str;

    /// Returns `true` if this strategy knows how to handle the candidate.
    fn matches(&self, candidate: &Candidate) -> bool;

    /// Attempt the candidate. An empty vec means "handled but nothing
    /// found"; an error is a branch failure the table absorbs.
    async fn run(
        &self,
        candidate: &Candidate,
        ctx: &FetchContext,
    ) -> Result<Vec<StreamDescriptor>, BranchFailure>;
}

/// Ordered strategy table. Strategies are tried in priority order; the
/// first one producing at least one descriptor wins for that candidate.
pub struct StrategyTable {
    strategies: Vec<Box<dyn Strategy>>,
}

impl StrategyTable {
    /// Build the standard table: playback API, delegate, generic fallback.
    #[must_use]
    pub fn new(
        client: Arc<FetchClient>,
        rules: Arc<SiteRules>,
        delegate: Arc<dyn ExtractorDelegate>,
        subtitle_sink: Option<SubtitleSink>,
        rotation: Option<Arc<MirrorRotation>>,
    ) -> Self {
        let strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(PlaybackApiStrategy::new(
                Arc::clone(&client),
                Arc::clone(&rules),
                subtitle_sink.clone(),
                rotation,
            )),
            Box::new(DelegateStrategy::new(delegate, Arc::clone(&rules))),
            Box::new(FallbackStrategy::new(client, rules)),
        ];
        Self { strategies }
    }

    /// Returns `true` if any strategy would take this candidate. The chain
    /// resolver uses this to decide between handing off and hopping deeper.
    #[must_use]
    pub fn is_dispatchable(&self, candidate: &Candidate) -> bool {
        self.strategies.iter().any(|s| s.matches(candidate))
    }

    /// Try strategies in priority order until one yields results.
    ///
    /// Branch failures are logged and absorbed; the worst case is an empty
    /// vec, which the caller treats as "this candidate led nowhere".
    pub async fn dispatch(
        &self,
        candidate: &Candidate,
        ctx: &FetchContext,
    ) -> Vec<StreamDescriptor> {
        for strategy in &self.strategies {
            if !strategy.matches(candidate) {
                continue;
            }
            tracing::debug!(
                strategy = strategy.name(),
                url = %candidate.raw_url,
                "trying strategy"
            );
            match strategy.run(candidate, ctx).await {
                Ok(descriptors) if !descriptors.is_empty() => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        count = descriptors.len(),
                        "strategy produced descriptors"
                    );
                    return descriptors;
                }
                Ok(_) => {}
                Err(failure) => {
                    tracing::debug!(
                        strategy = strategy.name(),
                        url = %candidate.raw_url,
                        "strategy failed: {failure}"
                    );
                }
            }
        }
        Vec::new()
    }
}
