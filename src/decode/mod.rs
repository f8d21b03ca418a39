//! Stateless payload decoders.
//!
//! Three independent capabilities, selected by the caller based on content
//! shape:
//!
//! - [`unpack`]: reverses the `eval(function(p,a,c,k,e,d)...)` string
//!   substitution packer
//! - [`layered`]: peels repeated rounds of base64 / keyed-shift encoding
//! - [`sealed`]: split-key AES-GCM authenticated decryption of playback
//!   API payloads
//!
//! All decoders are pure functions: same input, same output, no I/O.
//! "Nothing decodable here" is an expected outcome, not an error.

pub mod layered;
pub mod sealed;
pub mod unpack;

pub use layered::{decode_atob_calls, decode_layers};
pub use sealed::{open_sealed, PlaybackSources, SealedPayload};
pub use unpack::{looks_packed, unpack};
