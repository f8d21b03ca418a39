//! Split-key AES-GCM decryption of playback API payloads.
//!
//! The playback endpoint returns its source list sealed: an IV, a
//! ciphertext, and the AES key split into two fragments, each URL-safe
//! base64 without padding. The real key is the concatenation of the
//! fragments. Authenticated decryption either fully succeeds or the whole
//! payload is discarded -- there is no partial plaintext.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};
use base64::engine::general_purpose::URL_SAFE;
use base64::Engine as _;
use serde::Deserialize;

use super::layered::pad_base64;
use crate::error::DecodeError;

/// GCM nonce length the playback APIs use.
const NONCE_LEN: usize = 12;

/// The sealed playback payload as returned by the API.
#[derive(Debug, Clone, Deserialize)]
pub struct SealedPayload {
    /// Base64 initialization vector (96-bit nonce).
    pub iv: String,
    /// Base64 ciphertext with appended 128-bit tag.
    pub payload: String,
    /// Exactly two base64 key fragments; the key is their concatenation.
    pub key_parts: Vec<String>,
}

/// Decrypted source list.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSources {
    #[serde(default)]
    pub sources: Vec<PlaybackSource>,
    #[serde(default)]
    pub tracks: Vec<PlaybackTrack>,
}

/// One playable source entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackSource {
    pub url: String,
    #[serde(default)]
    pub label: Option<String>,
}

/// One subtitle track entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PlaybackTrack {
    pub file: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub kind: Option<String>,
}

/// Open a sealed payload and parse the plaintext JSON source list.
///
/// Any integrity failure, malformed field, or unexpected plaintext shape
/// yields a [`DecodeError`]; partial results are never returned.
pub fn open_sealed(sealed: &SealedPayload) -> Result<PlaybackSources, DecodeError> {
    if sealed.key_parts.len() != 2 {
        return Err(DecodeError::KeyShape);
    }

    let iv = decode_field(&sealed.iv)?;
    let ciphertext = decode_field(&sealed.payload)?;
    let mut key = decode_field(&sealed.key_parts[0])?;
    key.extend(decode_field(&sealed.key_parts[1])?);

    if iv.len() != NONCE_LEN {
        return Err(DecodeError::KeyShape);
    }
    let nonce = Nonce::from_slice(&iv);

    let plaintext = match key.len() {
        16 => Aes128Gcm::new_from_slice(&key)
            .map_err(|_| DecodeError::KeyShape)?
            .decrypt(nonce, ciphertext.as_ref()),
        32 => Aes256Gcm::new_from_slice(&key)
            .map_err(|_| DecodeError::KeyShape)?
            .decrypt(nonce, ciphertext.as_ref()),
        _ => return Err(DecodeError::KeyShape),
    }
    .map_err(|_| DecodeError::Cipher)?;

    let text = String::from_utf8(plaintext)?;
    Ok(serde_json::from_str(&text)?)
}

/// Decode a URL-safe base64 field, tolerating stripped padding.
fn decode_field(field: &str) -> Result<Vec<u8>, DecodeError> {
    Ok(URL_SAFE.decode(pad_base64(field.trim()))?)
}
