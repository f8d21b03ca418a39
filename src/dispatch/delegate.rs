//! Delegation to an external third-party extractor.
//!
//! The host application usually ships a battery of specialized resolvers
//! for well-known streaming hosts. The pipeline treats that battery as an
//! opaque, best-effort capability behind [`ExtractorDelegate`]: hand over a
//! URL and a referer, maybe get descriptors back.

use std::sync::Arc;

use async_trait::async_trait;

use super::Strategy;
use crate::error::BranchFailure;
use crate::model::{Candidate, FetchContext, StreamDescriptor};
use crate::rules::SiteRules;
use crate::scan::has_embed_segment;

/// External extractor capability, injected by the caller.
#[async_trait]
pub trait ExtractorDelegate: Send + Sync {
    /// Resolve `url` with a specialized extractor. `None` (or an empty vec)
    /// means the delegate had nothing for this host.
    async fn extract(&self, url: &str, referer: Option<&str>) -> Option<Vec<StreamDescriptor>>;
}

/// Default delegate for callers without an extractor battery.
pub struct NoDelegate;

#[async_trait]
impl ExtractorDelegate for NoDelegate {
    async fn extract(&self, _url: &str, _referer: Option<&str>) -> Option<Vec<StreamDescriptor>> {
        None
    }
}

/// Strategy wrapper handing matching candidates to the delegate.
pub struct DelegateStrategy {
    delegate: Arc<dyn ExtractorDelegate>,
    rules: Arc<SiteRules>,
}

impl DelegateStrategy {
    pub fn new(delegate: Arc<dyn ExtractorDelegate>, rules: Arc<SiteRules>) -> Self {
        Self { delegate, rules }
    }
}

#[async_trait]
impl Strategy for DelegateStrategy {
    fn name(&self) -> &'static str {
        "delegate"
    }

    /// Configured delegate hosts, plus any embed-path URL -- the delegate
    /// battery is the first stop for unrecognized embeds.
    fn matches(&self, candidate: &Candidate) -> bool {
        let url = &candidate.raw_url;
        self.rules.delegate_hosts.iter().any(|h| url.contains(h)) || has_embed_segment(url)
    }

    async fn run(
        &self,
        candidate: &Candidate,
        ctx: &FetchContext,
    ) -> Result<Vec<StreamDescriptor>, BranchFailure> {
        // The page that embedded the candidate is the referer the target
        // host expects.
        let descriptors = self
            .delegate
            .extract(&candidate.raw_url, Some(&ctx.url))
            .await
            .unwrap_or_default();
        Ok(descriptors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CandidateOrigin;

    #[test]
    fn no_delegate_yields_nothing() {
        tokio_test::block_on(async {
            let strategy =
                DelegateStrategy::new(Arc::new(NoDelegate), Arc::new(SiteRules::default()));
            let candidate = Candidate::new("https://host.example/e/abc", CandidateOrigin::IframeSrc);
            let ctx = FetchContext::new("https://site.example/page");
            let out = strategy.run(&candidate, &ctx).await.unwrap();
            assert!(out.is_empty());
        });
    }

    #[test]
    fn matches_configured_hosts_without_embed_path() {
        let rules = SiteRules {
            delegate_hosts: vec!["streamwish".into()],
            ..SiteRules::default()
        };
        let strategy = DelegateStrategy::new(Arc::new(NoDelegate), Arc::new(rules));
        let hosted = Candidate::new(
            "https://streamwish.to/player/abc",
            CandidateOrigin::IframeSrc,
        );
        let other = Candidate::new("https://other.example/player/abc", CandidateOrigin::IframeSrc);
        assert!(strategy.matches(&hosted));
        assert!(!strategy.matches(&other));
    }
}
