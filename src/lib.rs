//! `streamsift` - Stream source resolution pipeline
//!
//! # Features
//!
//! - **Candidate scanning**: ordered pattern matchers over HTML and scripts
//!   (iframe attributes, embed-trigger calls, URL mining, deny-list)
//! - **Payload decoding**: packed-script unpacking, layered string ciphers,
//!   split-key AES-GCM playback payloads
//! - **Chain resolution**: bounded iframe/redirect following with cycle
//!   detection
//! - **Strategy dispatch**: priority-ordered table (playback API, external
//!   extractor delegation, generic fallback), first success wins per
//!   candidate
//! - **Aggregation**: dedup by normalized playback URL, quality ranking
//!
//! # Example
//!
//! ```rust,no_run
//! use streamsift::Resolver;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = Resolver::new()?;
//!     let streams = resolver
//!         .resolve("https://example.com/title/episode-1", None)
//!         .await?;
//!     for stream in streams {
//!         println!("{} {:?}", stream.playback_url, stream.quality);
//!     }
//!     Ok(())
//! }
//! ```

pub mod aggregate;
pub mod chain;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod fetch;
pub mod model;
pub mod resolve;
pub mod rules;
pub mod scan;

pub use aggregate::aggregate as aggregate_descriptors;
pub use chain::{ChainOutcome, ChainResolver, DEFAULT_MAX_DEPTH};
pub use dispatch::{ExtractorDelegate, NoDelegate, Strategy, StrategyTable};
pub use error::{BranchFailure, DecodeError, ResolveError};
pub use fetch::{FetchClient, FetchError, FetchedPage};
pub use model::{
    Candidate, CandidateOrigin, FetchContext, Quality, StreamDescriptor, SubtitleSink,
    SubtitleTrack,
};
pub use resolve::{Resolver, ResolverBuilder};
pub use rules::{HostRewrite, MirrorRotation, SiteRules};
pub use scan::{ContentKind, Scanner};

/// Version of streamsift
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
