//! Transfer and header decoding.
//!
//! Supports Base64, Quoted-Printable, and RFC 2047 encoded words.

use base64::Engine;
use base64::alphabet;
use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};

use crate::charset;
use crate::error::{Error, Result};

/// Base64 engine that accepts both padded and unpadded input.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decodes Base64 data, ignoring embedded whitespace and line breaks.
///
/// # Errors
///
/// Returns an error if the input is not valid Base64.
pub fn decode_base64(data: &[u8]) -> Result<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .iter()
        .copied()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    LENIENT_BASE64.decode(cleaned).map_err(Into::into)
}

/// Decodes Quoted-Printable data (RFC 2045).
///
/// Soft line breaks are removed. A malformed `=` escape is kept literally.
#[must_use]
pub fn decode_quoted_printable(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;

    while i < data.len() {
        let byte = data[i];
        if byte != b'=' {
            out.push(byte);
            i += 1;
            continue;
        }

        match &data[i + 1..] {
            [b'\r', b'\n', ..] => i += 3,
            [b'\n', ..] => i += 2,
            [hi, lo, ..] if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit() => {
                out.push((hex_value(*hi) << 4) | hex_value(*lo));
                i += 3;
            }
            _ => {
                out.push(b'=');
                i += 1;
            }
        }
    }

    out
}

const fn hex_value(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        _ => b - b'A' + 10,
    }
}

/// A parsed `=?charset?encoding?text?=` token.
struct EncodedWord<'a> {
    charset: &'a str,
    encoding: &'a str,
    text: &'a str,
}

impl<'a> EncodedWord<'a> {
    /// Parses an encoded word at the start of `s`, returning it and the
    /// number of bytes it spans.
    fn parse(s: &'a str) -> Option<(Self, usize)> {
        let inner = s.strip_prefix("=?")?;
        let (charset, after) = inner.split_once('?')?;
        let (encoding, after) = after.split_once('?')?;
        let end = after.find("?=")?;
        let text = &after[..end];

        if charset.is_empty()
            || charset.contains(char::is_whitespace)
            || encoding.len() != 1
            || text.contains(char::is_whitespace)
        {
            return None;
        }

        let consumed = 2 + charset.len() + 1 + encoding.len() + 1 + end + 2;
        Some((
            Self {
                charset,
                encoding,
                text,
            },
            consumed,
        ))
    }

    fn decode(&self) -> Result<String> {
        let bytes = match self.encoding {
            "B" | "b" => decode_base64(self.text.as_bytes())?,
            "Q" | "q" => decode_quoted_printable(self.text.replace('_', " ").as_bytes()),
            other => {
                return Err(Error::InvalidEncoding(format!(
                    "unknown encoded-word encoding: {other}"
                )));
            }
        };

        // RFC 2231 language suffix: `utf-8*en`
        let label = self.charset.split('*').next().unwrap_or(self.charset);
        Ok(charset::decode(&bytes, Some(label)))
    }
}

/// Decodes every RFC 2047 encoded word in a header value.
///
/// Whitespace between two adjacent encoded words is dropped; text that is
/// not an encoded word passes through unchanged.
///
/// # Errors
///
/// Returns an error if an encoded word has an invalid payload.
pub fn decode_rfc2047(value: &str) -> Result<String> {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    let mut after_word = false;

    while let Some(start) = rest.find("=?") {
        let (before, candidate) = rest.split_at(start);

        if let Some((word, consumed)) = EncodedWord::parse(candidate) {
            if !(after_word && before.chars().all(char::is_whitespace)) {
                out.push_str(before);
            }
            out.push_str(&word.decode()?);
            rest = &candidate[consumed..];
            after_word = true;
        } else {
            out.push_str(before);
            out.push_str("=?");
            rest = &candidate[2..];
            after_word = false;
        }
    }

    out.push_str(rest);
    Ok(out)
}
