//! Layered string cipher decoder.
//!
//! Embed hosts hide file URLs behind repeated rounds of cheap reversible
//! transforms: base64 (often URL-safe, often unpadded), and a per-character
//! shift whose amount rides along as a numeric suffix. Decoding peels rounds
//! until the text looks like a URL, up to a fixed bound.

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine as _;
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum decode rounds before giving up on a string.
const MAX_ROUNDS: usize = 5;

/// `atob("...")` call sites inside inline scripts.
static ATOB_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"atob\(["']([^"']+)["']\)"#).expect("atob regex"));

/// Returns `true` once decoded text plausibly is (or contains) a media URL.
#[must_use]
pub fn looks_like_url(s: &str) -> bool {
    s.contains("http")
        || [".m3u8", ".mp4", ".mkv", ".webm"]
            .iter()
            .any(|ext| s.contains(ext))
}

/// Decode up to [`MAX_ROUNDS`] layers, stopping early once the text looks
/// like a URL. A failed round terminates the loop and the best decode so
/// far is returned; `None` means not even one round succeeded.
#[must_use]
pub fn decode_layers(input: &str) -> Option<String> {
    let mut current = input.trim().to_string();
    let mut best: Option<String> = None;

    for _ in 0..MAX_ROUNDS {
        let Some(decoded) = decode_round(&current) else {
            break;
        };
        if looks_like_url(&decoded) {
            return Some(clean_mined_url(&decoded));
        }
        best = Some(decoded.clone());
        current = decoded.trim().to_string();
    }

    best
}

/// Find every `atob("...")` argument in a script and return the ones that
/// decode to URL-looking text.
#[must_use]
pub fn decode_atob_calls(script: &str) -> Vec<String> {
    ATOB_RE
        .captures_iter(script)
        .filter_map(|caps| caps.get(1))
        .filter_map(|m| decode_layers(m.as_str()))
        .filter(|decoded| looks_like_url(decoded))
        .collect()
}

/// One decode round: keyed shift when the string carries a numeric `:N`
/// suffix, base64 otherwise.
fn decode_round(s: &str) -> Option<String> {
    if let Some(shifted) = decode_shift_suffixed(s) {
        return Some(shifted);
    }
    decode_base64_text(s)
}

/// Reverse a per-character Caesar-style shift keyed by a numeric suffix:
/// `"iuuq;00ipt):1"` → shift every char down by 1.
fn decode_shift_suffixed(s: &str) -> Option<String> {
    let (body, suffix) = s.rsplit_once(':')?;
    if body.is_empty() || suffix.is_empty() || !suffix.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    let shift: u32 = suffix.parse().ok()?;
    if shift == 0 || shift > 25 {
        return None;
    }
    body.chars()
        .map(|c| {
            let code = c as u32;
            code.checked_sub(shift).and_then(char::from_u32)
        })
        .collect()
}

/// Base64-decode `s` into text, padding first and accepting both the
/// URL-safe and standard alphabets. Binary output is rejected.
fn decode_base64_text(s: &str) -> Option<String> {
    let padded = pad_base64(s.trim());
    let bytes = URL_SAFE
        .decode(&padded)
        .or_else(|_| STANDARD.decode(&padded))
        .ok()?;
    let text = String::from_utf8(bytes).ok()?;
    if text.chars().all(|c| !c.is_control() || c.is_ascii_whitespace()) {
        Some(text)
    } else {
        None
    }
}

/// Pad a base64 string out to a multiple of four, as the playback APIs
/// strip padding before transmission.
pub(crate) fn pad_base64(s: &str) -> String {
    let mut padded = s.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    padded
}

/// Strip JSON escapes and stray quoting from a mined URL.
#[must_use]
pub fn clean_mined_url(raw: &str) -> String {
    raw.replace("\\/", "/")
        .replace("\\\"", "")
        .trim_matches(|c| c == '"' || c == '\'' || c == ' ')
        .to_string()
}
