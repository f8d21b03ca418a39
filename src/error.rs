//! Error taxonomy for the resolution pipeline.
//!
//! Almost everything that goes wrong during resolution is a *local* outcome:
//! a decoder that produced nothing, a hop that timed out, a cycle in an
//! iframe chain. Those are [`BranchFailure`] values absorbed inside the
//! pipeline -- the caller only ever observes an empty result set. The sole
//! externally visible error, [`ResolveError`], covers caller misuse.

use thiserror::Error;

/// A decoder could not produce valid output. Always recoverable: the
/// dispatcher proceeds to the next strategy or candidate.
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Packed-script signature absent or malformed.
    #[error("packed script signature not found or malformed")]
    Packed,

    /// A base64 round failed to decode.
    #[error("base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Authenticated decryption failed its integrity check.
    #[error("authenticated decryption failed")]
    Cipher,

    /// Decrypted plaintext was not the expected JSON shape.
    #[error("unexpected payload shape: {0}")]
    Json(#[from] serde_json::Error),

    /// Key fragments or IV had an unusable length.
    #[error("key or iv fragments malformed")]
    KeyShape,

    /// Decoded bytes were not valid UTF-8.
    #[error("decoded payload is not valid utf-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// A branch of the resolution (one candidate, one traversal path) died.
///
/// Branch failures never abort the overall resolution; remaining candidates
/// keep going and the worst case is an empty result set.
#[derive(Debug, Error)]
pub enum BranchFailure {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// Network failure on a hop, after one retry.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// The next hop was already visited in this resolution call.
    #[error("cycle detected at {url}")]
    CycleDetected { url: String },

    /// The iframe/redirect chain exceeded the depth bound.
    #[error("chain depth exceeded ({depth} hops)")]
    DepthExceeded { depth: usize },

    /// Nothing dispatchable was found along this branch.
    #[error("no candidates found")]
    NoCandidates,
}

/// The only error surfaced to callers of [`crate::Resolver::resolve`].
///
/// "Nothing playable found" is *not* an error -- it is `Ok(vec![])`.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The locator cannot start a resolution (empty, or not a fetchable URL).
    #[error("locator is not usable: {0:?}")]
    InvalidLocator(String),
}
