//! Charset decoding for body parts and encoded words.
//!
//! Labels are resolved through the `charset` crate, which covers the WHATWG
//! encoding labels plus UTF-7. Decoding never fails: malformed sequences
//! become U+FFFD, and a label nobody knows falls back to UTF-8 or Latin-1.

use std::borrow::Cow;

use ::charset::Charset;

/// Resolves a MIME charset label, ignoring case, whitespace and quotes.
#[must_use]
pub fn lookup(label: &str) -> Option<Charset> {
    let label = label.trim().trim_matches('"').trim();
    Charset::for_label(label.as_bytes())
}

/// Decodes bytes with the given charset label.
///
/// Without a label, or with one that does not resolve, valid UTF-8 is taken
/// as is and anything else is read as Latin-1.
#[must_use]
pub fn decode(bytes: &[u8], label: Option<&str>) -> String {
    match label.and_then(lookup) {
        Some(charset) => charset.decode_without_bom_handling(bytes).0.into_owned(),
        None => fallback(bytes).into_owned(),
    }
}

fn fallback(bytes: &[u8]) -> Cow<'_, str> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => ::charset::decode_latin1(bytes),
    }
}
