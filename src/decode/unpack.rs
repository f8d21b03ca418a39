//! Packed-JavaScript unpacker.
//!
//! Reverses Dean Edwards' `p,a,c,k,e,d` packer: the payload is a template
//! whose alphanumeric tokens are base-N indices into a `|`-separated
//! dictionary. Widely used by embed hosts to hide the player setup call
//! that carries the real file URL.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

/// Matches the packer call and captures (payload, radix, count, dictionary).
static PACKED_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?s)eval\(function\(p,a,c,k,e,[dr]\).*?\}\s*\(\s*'(.*)'\s*,\s*(\d+)\s*,\s*(\d+)\s*,\s*'(.*?)'\s*\.split\('\|'\)",
    )
    .expect("packed-script regex")
});

static WORD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[0-9A-Za-z]+\b").expect("token regex"));

/// Cheap signature check, used to decide whether running the full
/// unpacker is worthwhile.
#[must_use]
pub fn looks_packed(script: &str) -> bool {
    script.contains("eval(function(p,a,c,k,e")
}

/// Reverse the packing scheme and return the original script text.
///
/// Returns `None` when the signature is absent or malformed -- for the
/// pipeline this is the ordinary "not packed" case, not a failure.
#[must_use]
pub fn unpack(script: &str) -> Option<String> {
    let caps = PACKED_RE.captures(script)?;

    let payload = caps
        .get(1)?
        .as_str()
        .replace("\\'", "'")
        .replace("\\\\", "\\");
    let radix: u32 = caps.get(2)?.as_str().parse().ok()?;
    let count: usize = caps.get(3)?.as_str().parse().ok()?;
    let dictionary: Vec<&str> = caps.get(4)?.as_str().split('|').collect();

    if radix < 2 || count == 0 {
        return None;
    }

    let unpacked = WORD_RE.replace_all(&payload, |token: &Captures<'_>| {
        let word = token.get(0).map_or("", |m| m.as_str());
        match unbase(word, radix) {
            Some(index) => match dictionary.get(index) {
                Some(entry) if !entry.is_empty() => (*entry).to_string(),
                _ => word.to_string(),
            },
            None => word.to_string(),
        }
    });

    Some(unpacked.into_owned())
}

/// Decode a packer token: standard radix up to 36, the packer's own
/// `0-9a-zA-Z` base-62 alphabet above that.
fn unbase(token: &str, radix: u32) -> Option<usize> {
    if token.is_empty() {
        return None;
    }
    if radix <= 36 {
        return usize::from_str_radix(token, radix).ok();
    }
    let mut value: usize = 0;
    for ch in token.chars() {
        let digit = match ch {
            '0'..='9' => ch as usize - '0' as usize,
            'a'..='z' => ch as usize - 'a' as usize + 10,
            'A'..='Z' => ch as usize - 'A' as usize + 36,
            _ => return None,
        };
        if digit >= radix as usize {
            return None;
        }
        value = value.checked_mul(radix as usize)?.checked_add(digit)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PACKED_FIXTURE: &str = r"eval(function(p,a,c,k,e,d){e=function(c){return c.toString(36)};if(!''.replace(/^/,String)){while(c--){d[c.toString(a)]=k[c]||c.toString(a)}k=[function(e){return d[e]}];e=function(){return'\\w+'};c=1};while(c--){if(k[c]){p=p.replace(new RegExp('\\b'+e(c)+'\\b','g'),k[c])}}return p}('0 1=\'2://3.4/5.6\'',7,7,'var|file|https|cdn|example|video|m3u8'.split('|'),0,{}))";

    #[test]
    fn unpacks_simple_fixture() {
        let out = unpack(PACKED_FIXTURE).expect("fixture should unpack");
        assert_eq!(out, "var file='https://cdn.example/video.m3u8'");
    }

    #[test]
    fn signature_check_matches_fixture() {
        assert!(looks_packed(PACKED_FIXTURE));
        assert!(!looks_packed("var x = 1;"));
    }

    #[test]
    fn missing_signature_yields_none() {
        assert!(unpack("console.log('hello')").is_none());
    }

    #[test]
    fn malformed_packer_yields_none() {
        // Signature present but the argument tuple is truncated.
        let broken = "eval(function(p,a,c,k,e,d){return p}('payload'";
        assert!(unpack(broken).is_none());
    }

    #[test]
    fn unbase_handles_both_alphabets() {
        assert_eq!(unbase("10", 36), Some(36));
        assert_eq!(unbase("z", 36), Some(35));
        assert_eq!(unbase("A", 62), Some(36));
        assert_eq!(unbase("!", 62), None);
    }

    #[test]
    fn unknown_tokens_pass_through() {
        // Token 9 is out of range for a 2-entry dictionary; it must survive
        // unchanged rather than panic.
        let packed =
            r"eval(function(p,a,c,k,e,d){return p}('0 1 9',10,2,'alpha|beta'.split('|'),0,{}))";
        let out = unpack(packed).expect("should unpack");
        assert_eq!(out, "alpha beta 9");
    }
}
