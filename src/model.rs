//! Core data model for the resolution pipeline.
//!
//! A [`Candidate`] is a discovered, not-yet-verified reference to a possible
//! video source; a [`StreamDescriptor`] is the pipeline's output unit: a
//! playable stream with quality, referer, and subtitle metadata.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// Where a candidate URL was discovered inside a document.
///
/// Origins are listed in scanner priority order; candidates from
/// higher-priority origins are emitted first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CandidateOrigin {
    /// `iframe`/`source`/`embed` element `src` or `data-src` attribute.
    IframeSrc,
    /// Known embed-trigger function call inside an inline script.
    ScriptCall,
    /// Known embed-trigger function call inside an `onclick` handler.
    Onclick,
    /// Generic URL-shaped regex match.
    RegexMined,
}

/// A discovered, not-yet-verified reference to a possible video source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// The URL as found, protocol-relative references already resolved.
    pub raw_url: String,
    /// Discovery origin, significant for ordering.
    pub origin: CandidateOrigin,
}

impl Candidate {
    pub fn new(raw_url: impl Into<String>, origin: CandidateOrigin) -> Self {
        Self {
            raw_url: raw_url.into(),
            origin,
        }
    }
}

/// Request context carried across one chain hop.
///
/// The referer of hop N+1 is the URL of hop N unless explicitly overridden.
#[derive(Debug, Clone)]
pub struct FetchContext {
    /// Target URL for this hop.
    pub url: String,
    /// Referer sent with the request.
    pub referer: Option<String>,
    /// Additional headers (name, value) for this hop.
    pub extra_headers: Vec<(String, String)>,
}

impl FetchContext {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: None,
            extra_headers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }

    /// Context for the next hop: the current URL becomes the referer.
    #[must_use]
    pub fn next_hop(&self, url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            referer: Some(self.url.clone()),
            extra_headers: self.extra_headers.clone(),
        }
    }
}

/// Stream quality, ordinal where known.
///
/// `Unknown` sorts last; an unparseable but present label is preserved
/// verbatim in [`Quality::Label`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Quality {
    Unknown,
    P240,
    P360,
    P480,
    P720,
    P1080,
    Label(String),
}

impl Quality {
    /// Parse a quality from an embedded resolution label like `"720p"`,
    /// `"1080"`, or `"HD 720"`. Unparseable input yields `Unknown`.
    #[must_use]
    pub fn from_label(label: &str) -> Self {
        let digits: String = label
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(char::is_ascii_digit)
            .collect();
        match digits.as_str() {
            "240" => Self::P240,
            "360" => Self::P360,
            "480" => Self::P480,
            "720" => Self::P720,
            "1080" => Self::P1080,
            "" => {
                let trimmed = label.trim();
                if trimmed.is_empty() {
                    Self::Unknown
                } else {
                    Self::Label(trimmed.to_string())
                }
            }
            other => Self::Label(format!("{other}p")),
        }
    }

    /// Ordinal rank for sorting; higher is better, `Unknown` is 0.
    #[must_use]
    pub fn rank(&self) -> u32 {
        match self {
            Self::Unknown => 0,
            Self::P240 => 240,
            Self::P360 => 360,
            Self::P480 => 480,
            Self::P720 => 720,
            Self::P1080 => 1080,
            Self::Label(label) => {
                let digits: String = label
                    .chars()
                    .skip_while(|c| !c.is_ascii_digit())
                    .take_while(char::is_ascii_digit)
                    .collect();
                digits.parse().unwrap_or(1)
            }
        }
    }
}

/// A subtitle track discovered alongside a stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    pub url: String,
    pub label: String,
}

impl SubtitleTrack {
    /// Placeholder entries some embeds ship ("upload captions" and friends)
    /// carry no real track and are dropped before reaching the sink.
    #[must_use]
    pub fn is_placeholder(&self) -> bool {
        let lower = self.label.to_lowercase();
        lower.contains("upload") || lower.contains("caption request") || self.url.trim().is_empty()
    }
}

/// Side channel the pipeline pushes subtitle tracks into as they are found,
/// independent of the returned descriptor list.
pub type SubtitleSink = Arc<dyn Fn(SubtitleTrack) + Send + Sync>;

/// A final, playable stream with metadata. The pipeline's output unit.
///
/// Uniqueness key within one resolution call is the normalized
/// [`playback_url`](Self::playback_url).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Short source identifier (e.g. the strategy or host that produced it).
    pub source_name: String,
    /// Human-readable name shown to the user.
    pub display_name: String,
    /// Directly playable URL.
    pub playback_url: String,
    /// Inferred or declared quality.
    pub quality: Quality,
    /// Whether the URL is a multi-rendition manifest (HLS/DASH).
    pub is_adaptive: bool,
    /// Referer required for playback, if any.
    pub referer: Option<String>,
    /// Extra headers required for playback.
    pub extra_headers: Vec<(String, String)>,
    /// Subtitle tracks attached to this stream.
    pub subtitle_tracks: Vec<SubtitleTrack>,
}

impl StreamDescriptor {
    pub fn new(source_name: impl Into<String>, playback_url: impl Into<String>) -> Self {
        let source_name = source_name.into();
        let playback_url = playback_url.into();
        let is_adaptive = is_adaptive_url(&playback_url);
        Self {
            display_name: source_name.clone(),
            source_name,
            playback_url,
            quality: Quality::Unknown,
            is_adaptive,
            referer: None,
            extra_headers: Vec::new(),
            subtitle_tracks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    #[must_use]
    pub fn with_referer(mut self, referer: impl Into<String>) -> Self {
        self.referer = Some(referer.into());
        self
    }
}

/// Returns `true` for multi-rendition manifest URLs (HLS/DASH).
#[must_use]
pub fn is_adaptive_url(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_lowercase();
    path.ends_with(".m3u8") || path.ends_with(".mpd") || path.contains(".m3u8")
}

/// Normalize a URL into the form used as a dedup/visited key:
/// trimmed, trailing slash dropped, lowercased.
///
/// Paths are technically case-sensitive, but mirror hosts in the wild vary
/// casing freely for the same resource, so the key is case-insensitive.
#[must_use]
pub fn normalize_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_lowercase()
}
