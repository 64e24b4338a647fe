//! Tolerant JSON extraction from free-text model replies.
//!
//! Models wrap JSON in markdown fences, emit escaped newlines outside of
//! strings, and use `\x` escapes JSON does not know. [`extract_json`] undoes
//! those before parsing and falls back to the first balanced object.

use serde_json::{Map, Value};

const FENCE_OPEN: &str = "```json";
const FENCE_CLOSE: &str = "```";

/// Extracts a JSON object from a model reply.
///
/// Returns `None`, with a logged diagnostic, when no object can be
/// recovered. Never panics.
#[must_use]
pub fn extract_json(text: &str) -> Option<Map<String, Value>> {
    let candidate = fenced_block(text).unwrap_or_else(|| text.trim());
    let cleaned = unescape(candidate)?;

    match serde_json::from_str::<Value>(&cleaned) {
        Ok(Value::Object(map)) => Some(map),
        Ok(other) => {
            tracing::warn!(kind = json_kind(&other), "Model reply is JSON but not an object");
            None
        }
        Err(e) => {
            let recovered = first_object(&cleaned)
                .and_then(|object| serde_json::from_str::<Map<String, Value>>(object).ok());
            if recovered.is_some() {
                tracing::debug!("Recovered JSON object embedded in model reply");
            } else {
                tracing::warn!(error = %e, "Model reply is not valid JSON");
            }
            recovered
        }
    }
}

/// Inner content of the first ```` ```json ```` block, if any.
fn fenced_block(text: &str) -> Option<&str> {
    let start = text.find(FENCE_OPEN)? + FENCE_OPEN.len();
    let rest = &text[start..];
    let inner = rest.find(FENCE_CLOSE).map_or(rest, |end| &rest[..end]);
    Some(inner.trim())
}

/// Rewrites backslash escapes so the text parses as strict JSON.
///
/// `\n`, `\r` and `\t` become spaces. `\uXXXX` and `\xXX` are decoded unless
/// the character would need escaping inside a JSON string, in which case a
/// `\u00XX` escape is kept. Returns `None` on an unpaired surrogate.
fn unescape(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            i += 1;
            continue;
        }
        out.push_str(&input[copied..i]);

        let consumed = match bytes.get(i + 1) {
            Some(b'n' | b'r' | b't') => {
                out.push(' ');
                2
            }
            Some(b'\\') => {
                out.push_str("\\\\");
                2
            }
            Some(b'u') => match hex_at(input, i + 2, 4) {
                Some(unit) => {
                    let (c, consumed) = decode_utf16_escape(input, i, unit)?;
                    if needs_escape(c) {
                        out.push_str(&input[i..i + consumed]);
                    } else {
                        out.push(c);
                    }
                    consumed
                }
                None => {
                    out.push_str("\\u");
                    2
                }
            },
            Some(b'x') => match hex_at(input, i + 2, 2) {
                Some(byte) => {
                    // Latin-1: every byte value is a valid scalar.
                    let c = char::from_u32(byte).unwrap_or(char::REPLACEMENT_CHARACTER);
                    if needs_escape(c) {
                        out.push_str(&format!("\\u{byte:04x}"));
                    } else {
                        out.push(c);
                    }
                    4
                }
                None => {
                    out.push_str("\\x");
                    2
                }
            },
            _ => {
                out.push('\\');
                1
            }
        };

        i += consumed;
        copied = i;
    }

    out.push_str(&input[copied..]);
    Some(out)
}

/// Decodes the `\uXXXX` at `at` (value `unit`), pairing surrogates.
fn decode_utf16_escape(input: &str, at: usize, unit: u32) -> Option<(char, usize)> {
    match unit {
        0xD800..=0xDBFF => {
            let low = input
                .get(at + 6..at + 8)
                .filter(|marker| *marker == "\\u")
                .and_then(|_| hex_at(input, at + 8, 4))
                .filter(|low| (0xDC00..=0xDFFF).contains(low));
            let Some(low) = low else {
                tracing::warn!(unit, "Unpaired high surrogate in model reply");
                return None;
            };
            let combined = 0x10000 + ((unit - 0xD800) << 10) + (low - 0xDC00);
            char::from_u32(combined).map(|c| (c, 12))
        }
        0xDC00..=0xDFFF => {
            tracing::warn!(unit, "Unpaired low surrogate in model reply");
            None
        }
        _ => char::from_u32(unit).map(|c| (c, 6)),
    }
}

fn hex_at(input: &str, start: usize, len: usize) -> Option<u32> {
    let digits = input.get(start..start + len)?;
    if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

fn needs_escape(c: char) -> bool {
    c == '"' || c == '\\' || c.is_control()
}

/// First balanced `{...}` in `text`, skipping braces inside strings.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

const fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
