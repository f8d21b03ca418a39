//! Result aggregation: dedupe, quality inference, ordering.
//!
//! The last stage of the pipeline. Descriptors accumulated across all
//! candidates are collapsed by normalized playback URL, qualities are
//! inferred from embedded resolution labels when a strategy left them
//! unknown, and the result is ordered best-first with `Unknown` last.
//! An empty input is an empty output -- the normal "nothing playable"
//! outcome, never an error.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{is_adaptive_url, normalize_url, Quality, StreamDescriptor};

/// Resolution label inside a playback URL or display name.
static LABEL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{3,4})p").expect("label regex"));

/// Deduplicate, infer missing qualities, flag adaptive manifests, and sort
/// best-first. First occurrence wins on duplicates, preserving the
/// scanner's confidence ordering.
#[must_use]
pub fn aggregate(descriptors: Vec<StreamDescriptor>) -> Vec<StreamDescriptor> {
    let mut seen = HashSet::new();
    let mut out: Vec<StreamDescriptor> = descriptors
        .into_iter()
        .filter(|d| seen.insert(normalize_url(&d.playback_url)))
        .map(finalize)
        .collect();

    // Stable: equal-quality descriptors keep discovery order.
    out.sort_by_key(|d| std::cmp::Reverse(d.quality.rank()));
    out
}

/// Fill in what the producing strategy left unknown.
fn finalize(mut descriptor: StreamDescriptor) -> StreamDescriptor {
    if descriptor.quality == Quality::Unknown {
        if let Some(label) = LABEL_RE
            .captures(&descriptor.playback_url)
            .and_then(|caps| caps.get(1))
        {
            descriptor.quality = Quality::from_label(label.as_str());
        }
    }
    if !descriptor.is_adaptive {
        descriptor.is_adaptive = is_adaptive_url(&descriptor.playback_url);
    }
    descriptor
}
