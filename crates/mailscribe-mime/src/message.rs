//! MIME message structure.
//!
//! A message is a tree of [`Part`]s. Multipart bodies are split on their
//! boundary into children; an encapsulated `message/rfc822` body becomes a
//! single child. Everything else is a leaf whose body is kept raw until
//! [`Part::decode_body`] is called.

use std::fmt;

use crate::charset;
use crate::content_type::ContentType;
use crate::encoding::{decode_base64, decode_quoted_printable};
use crate::error::Result;
use crate::header::Headers;

/// Nesting limit; deeper containers are kept as opaque leaves.
const MAX_DEPTH: usize = 16;

/// Transfer encoding types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// 7-bit ASCII.
    SevenBit,
    /// 8-bit data.
    EightBit,
    /// Base64 encoding.
    Base64,
    /// Quoted-Printable encoding.
    QuotedPrintable,
    /// Binary (no encoding).
    Binary,
}

impl TransferEncoding {
    /// Parses a `Content-Transfer-Encoding` value; unknown values are 7bit.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "8bit" => Self::EightBit,
            "base64" => Self::Base64,
            "quoted-printable" => Self::QuotedPrintable,
            "binary" => Self::Binary,
            _ => Self::SevenBit,
        }
    }
}

impl fmt::Display for TransferEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SevenBit => write!(f, "7bit"),
            Self::EightBit => write!(f, "8bit"),
            Self::Base64 => write!(f, "base64"),
            Self::QuotedPrintable => write!(f, "quoted-printable"),
            Self::Binary => write!(f, "binary"),
        }
    }
}

/// One node of the MIME tree.
#[derive(Debug, Clone)]
pub struct Part {
    /// Part headers.
    pub headers: Headers,
    /// Raw body as transferred.
    pub body: Vec<u8>,
    /// Child parts of a container.
    pub children: Vec<Part>,
}

impl Part {
    fn parse(raw: &[u8], depth: usize) -> Self {
        let (header_bytes, body) = split_headers_body(raw);
        let headers = Headers::parse(&String::from_utf8_lossy(header_bytes));
        let mut part = Self {
            headers,
            body: body.to_vec(),
            children: Vec::new(),
        };

        if depth >= MAX_DEPTH {
            return part;
        }

        let content_type = part.content_type();
        if content_type.is_multipart() {
            if let Some(boundary) = content_type.boundary() {
                part.children = split_multipart(body, boundary)
                    .into_iter()
                    .map(|chunk| Self::parse(chunk, depth + 1))
                    .collect();
            }
        } else if content_type.is_message() {
            part.children = vec![Self::parse(body, depth + 1)];
        }

        part
    }

    /// Content type, `text/plain` when absent or malformed.
    #[must_use]
    pub fn content_type(&self) -> ContentType {
        self.headers
            .get("content-type")
            .and_then(|value| ContentType::parse(value).ok())
            .unwrap_or_default()
    }

    /// Transfer encoding, 7bit when absent.
    #[must_use]
    pub fn transfer_encoding(&self) -> TransferEncoding {
        self.headers
            .get("content-transfer-encoding")
            .map_or(TransferEncoding::SevenBit, TransferEncoding::parse)
    }

    /// True for container parts (`multipart/*` and `message/rfc822`).
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        let content_type = self.content_type();
        content_type.is_multipart() || content_type.is_message()
    }

    /// True when `Content-Disposition` marks the part as an attachment.
    #[must_use]
    pub fn is_attachment(&self) -> bool {
        self.headers
            .get("content-disposition")
            .is_some_and(|value| value.to_lowercase().contains("attachment"))
    }

    /// Decodes the body according to the transfer encoding.
    ///
    /// # Errors
    ///
    /// Returns an error if the Base64 payload is invalid.
    pub fn decode_body(&self) -> Result<Vec<u8>> {
        match self.transfer_encoding() {
            TransferEncoding::Base64 => decode_base64(&self.body),
            TransferEncoding::QuotedPrintable => Ok(decode_quoted_printable(&self.body)),
            _ => Ok(self.body.clone()),
        }
    }

    /// Decodes the body to text using the declared charset (UTF-8 if none).
    ///
    /// # Errors
    ///
    /// Returns an error if the transfer-encoded payload is invalid.
    pub fn decode_text(&self) -> Result<String> {
        let bytes = self.decode_body()?;
        let content_type = self.content_type();
        Ok(charset::decode(&bytes, content_type.charset()))
    }
}

/// A parsed message: the root part plus header convenience accessors.
#[derive(Debug, Clone)]
pub struct Message {
    root: Part,
}

impl Message {
    /// Parses raw RFC 822 bytes. Parsing is lenient and never fails;
    /// problems surface when a part is decoded.
    #[must_use]
    pub fn parse(raw: &[u8]) -> Self {
        Self {
            root: Part::parse(raw, 0),
        }
    }

    /// Top-level headers.
    #[must_use]
    pub const fn headers(&self) -> &Headers {
        &self.root.headers
    }

    /// Top-level header with encoded words decoded.
    ///
    /// # Errors
    ///
    /// Returns an error if an encoded word cannot be decoded.
    pub fn decoded_header(&self, name: &str) -> Result<Option<String>> {
        self.root.headers.get_decoded(name)
    }

    /// The root part.
    #[must_use]
    pub const fn root(&self) -> &Part {
        &self.root
    }

    /// True if the root is a container.
    #[must_use]
    pub fn is_multipart(&self) -> bool {
        self.root.is_multipart()
    }

    /// Depth-first, pre-order walk over every part, the root included.
    #[must_use]
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![&self.root],
        }
    }
}

/// Iterator returned by [`Message::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    stack: Vec<&'a Part>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Part;

    fn next(&mut self) -> Option<Self::Item> {
        let part = self.stack.pop()?;
        self.stack.extend(part.children.iter().rev());
        Some(part)
    }
}

/// Splits at the first empty line. A part that starts with an empty line
/// has no headers; one with no empty line is all headers.
fn split_headers_body(raw: &[u8]) -> (&[u8], &[u8]) {
    if let Some(body) = raw.strip_prefix(b"\r\n").or_else(|| raw.strip_prefix(b"\n")) {
        return (&[][..], body);
    }

    let crlf = find(raw, b"\r\n\r\n").map(|i| (i, i + 4));
    let lf = find(raw, b"\n\n").map(|i| (i, i + 2));

    let split = match (crlf, lf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    };

    split.map_or((raw, &[][..]), |(end, start)| (&raw[..end], &raw[start..]))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

/// Splits a multipart body into the chunks between boundary lines.
///
/// The line break before a delimiter belongs to the delimiter. The preamble
/// and epilogue are dropped; a missing close delimiter keeps the last chunk.
fn split_multipart<'a>(body: &'a [u8], boundary: &str) -> Vec<&'a [u8]> {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();

    let mut chunks = Vec::new();
    let mut start: Option<usize> = None;
    let mut pos = 0;

    while pos < body.len() {
        let newline = body[pos..].iter().position(|&b| b == b'\n');
        let (line, next) = match newline {
            Some(i) => (&body[pos..pos + i], pos + i + 1),
            None => (&body[pos..], body.len()),
        };

        if let Some(rest) = line.trim_ascii_end().strip_prefix(delimiter) {
            let closing = rest == b"--";
            if rest.is_empty() || closing {
                if let Some(s) = start {
                    chunks.push(strip_line_break(&body[s..pos]));
                }
                if closing {
                    return chunks;
                }
                start = Some(next);
            }
        }

        pos = next;
    }

    if let Some(s) = start.filter(|&s| s < body.len()) {
        chunks.push(&body[s..]);
    }
    chunks
}

fn strip_line_break(chunk: &[u8]) -> &[u8] {
    chunk
        .strip_suffix(b"\r\n")
        .or_else(|| chunk.strip_suffix(b"\n"))
        .unwrap_or(chunk)
}
