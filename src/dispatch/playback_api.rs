//! Sealed playback API strategy.
//!
//! Some embed hosts serve their source list through a small JSON API
//! instead of markup: `/api/videos/{id}/embed/details` names the embed
//! frame, `/api/videos/{id}/embed/playback` returns the sealed (split-key
//! AES-GCM) source list. This strategy drives that exchange and decrypts
//! the result.

use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::Strategy;
use crate::decode::{open_sealed, SealedPayload};
use crate::error::BranchFailure;
use crate::fetch::FetchClient;
use crate::model::{
    Candidate, FetchContext, Quality, StreamDescriptor, SubtitleSink, SubtitleTrack,
};
use crate::rules::{MirrorRotation, SiteRules};

/// Embed id segment: `/e/{id}`, `/v/{id}`, or `/d/{id}`.
static EMBED_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:e|v|d)/([A-Za-z0-9]+)").expect("embed id regex"));

#[derive(Debug, Deserialize)]
struct DetailsResponse {
    embed_frame_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaybackResponse {
    playback: Option<SealedPayload>,
}

pub struct PlaybackApiStrategy {
    client: Arc<FetchClient>,
    rules: Arc<SiteRules>,
    subtitle_sink: Option<SubtitleSink>,
    rotation: Option<Arc<MirrorRotation>>,
}

impl PlaybackApiStrategy {
    pub fn new(
        client: Arc<FetchClient>,
        rules: Arc<SiteRules>,
        subtitle_sink: Option<SubtitleSink>,
        rotation: Option<Arc<MirrorRotation>>,
    ) -> Self {
        Self {
            client,
            rules,
            subtitle_sink,
            rotation,
        }
    }

    /// API bases to try: the candidate's own origin first (or the rotated
    /// mirror when a rotation is injected), then the remaining mirrors.
    fn api_bases(&self, candidate_base: &str) -> Vec<String> {
        let mut bases = vec![candidate_base.to_string()];
        let mirrors = &self.rules.api_mirrors;
        if mirrors.is_empty() {
            return bases;
        }
        let start = self
            .rotation
            .as_ref()
            .map_or(0, |r| r.current(mirrors.len()));
        for i in 0..mirrors.len() {
            let mirror = &mirrors[(start + i) % mirrors.len()];
            bases.push(format!("https://{mirror}"));
        }
        bases
    }

    async fn fetch_json<T: for<'de> Deserialize<'de>>(
        &self,
        ctx: &FetchContext,
    ) -> Result<T, BranchFailure> {
        let page = self
            .client
            .get(ctx)
            .await
            .map_err(|e| BranchFailure::Fetch {
                url: ctx.url.clone(),
                reason: e.to_string(),
            })?;
        serde_json::from_str(&page.body)
            .map_err(|e| BranchFailure::Decode(crate::error::DecodeError::Json(e)))
    }

    fn descriptors_from_sources(
        &self,
        sources: crate::decode::PlaybackSources,
        candidate: &Candidate,
        host: &str,
    ) -> Vec<StreamDescriptor> {
        let subtitles: Vec<SubtitleTrack> = sources
            .tracks
            .iter()
            .filter(|t| t.kind.as_deref() != Some("thumbnails"))
            .map(|t| SubtitleTrack {
                url: t.file.clone(),
                label: t.label.clone().unwrap_or_default(),
            })
            .filter(|t| !t.is_placeholder())
            .collect();

        if let Some(sink) = &self.subtitle_sink {
            for track in &subtitles {
                sink(track.clone());
            }
        }

        sources
            .sources
            .into_iter()
            .map(|source| {
                let quality = source
                    .label
                    .as_deref()
                    .map_or(Quality::Unknown, Quality::from_label);
                let mut descriptor = StreamDescriptor::new(host, source.url)
                    .with_quality(quality)
                    .with_referer(candidate.raw_url.clone());
                descriptor.subtitle_tracks = subtitles.clone();
                descriptor
            })
            .collect()
    }
}

#[async_trait]
impl Strategy for PlaybackApiStrategy {
    fn name(&self) -> &'static str {
        "playback-api"
    }

    fn matches(&self, candidate: &Candidate) -> bool {
        let url = &candidate.raw_url;
        self.rules.api_hosts.iter().any(|h| url.contains(h)) && EMBED_ID_RE.is_match(url)
    }

    async fn run(
        &self,
        candidate: &Candidate,
        ctx: &FetchContext,
    ) -> Result<Vec<StreamDescriptor>, BranchFailure> {
        let url = &candidate.raw_url;
        let caps = EMBED_ID_RE
            .captures(url)
            .ok_or(BranchFailure::NoCandidates)?;
        let (Some(id_match), Some(id_group)) = (caps.get(0), caps.get(1)) else {
            return Err(BranchFailure::NoCandidates);
        };
        let video_id = id_group.as_str();
        let candidate_base = &url[..id_match.start()];

        // Details: resolves the embed frame the playback call must cite.
        let mut details: Option<(String, DetailsResponse)> = None;
        let mut last_failure = BranchFailure::NoCandidates;
        for base in self.api_bases(candidate_base) {
            let details_url = format!("{base}/api/videos/{video_id}/embed/details");
            let details_ctx = FetchContext::new(&details_url).with_referer(ctx.url.clone());
            match self.fetch_json::<DetailsResponse>(&details_ctx).await {
                Ok(response) => {
                    details = Some((base, response));
                    break;
                }
                Err(failure) => {
                    tracing::debug!(url = %details_url, "details fetch failed: {failure}");
                    if let Some(rotation) = &self.rotation {
                        rotation.advance();
                    }
                    last_failure = failure;
                }
            }
        }
        let Some((base, details)) = details else {
            return Err(last_failure);
        };

        let embed_frame = details.embed_frame_url.unwrap_or_else(|| url.clone());
        // The playback endpoint lives wherever the embed frame points.
        let playback_domain = embed_frame
            .split("/api/")
            .next()
            .filter(|s| s.starts_with("http"))
            .unwrap_or(&base)
            .trim_end_matches('/')
            .to_string();
        let playback_url = format!("{playback_domain}/api/videos/{video_id}/embed/playback");

        let mut playback_ctx = FetchContext::new(&playback_url).with_referer(embed_frame.clone());
        playback_ctx
            .extra_headers
            .push(("X-Embed-Parent".to_string(), url.clone()));

        let playback: PlaybackResponse = self.fetch_json(&playback_ctx).await?;
        let sealed = playback.playback.ok_or(BranchFailure::NoCandidates)?;
        let sources = open_sealed(&sealed)?;

        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "playback-api".to_string());
        Ok(self.descriptors_from_sources(sources, candidate, &host))
    }
}
