//! IMAP response parser.
//!
//! Parses the subset of RFC 3501 responses the reader relies on: tagged
//! completion, status responses, `SEARCH`, `EXISTS` and `FETCH` with
//! `RFC822`/`FLAGS` items. Anything else is kept as [`UntaggedResponse::Other`].

use crate::types::{SeqNum, Status};
use crate::{Error, Result};

/// A parsed IMAP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Tagged response (command completion).
    Tagged {
        /// The command tag.
        tag: String,
        /// Completion status.
        status: Status,
        /// Human-readable text, including any response code.
        text: String,
    },
    /// Untagged response (server data).
    Untagged(UntaggedResponse),
    /// Continuation request.
    Continuation(String),
}

/// Untagged server data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE text`
    Status {
        /// Status keyword.
        status: Status,
        /// Text after the keyword.
        text: String,
    },
    /// `* SEARCH 1 2 3`
    Search(Vec<SeqNum>),
    /// `* n EXISTS`
    Exists(u32),
    /// `* n FETCH (...)`
    Fetch {
        /// Message sequence number.
        seq: SeqNum,
        /// Full message bytes when `RFC822` was returned and not NIL.
        rfc822: Option<Vec<u8>>,
    },
    /// Any other untagged line.
    Other(String),
}

/// Parses one complete response (as framed by
/// [`FramedStream::read_response`](crate::FramedStream::read_response)).
pub fn parse(input: &[u8]) -> Result<Response> {
    let mut cursor = Cursor::new(input);

    if cursor.eat(b"* ") {
        return parse_untagged(&mut cursor);
    }
    if cursor.eat(b"+") {
        cursor.eat(b" ");
        return Ok(Response::Continuation(cursor.rest_of_line()));
    }

    let tag = cursor.atom()?;
    cursor.expect(b' ')?;
    let keyword = cursor.atom()?;
    let status = Status::parse(&keyword)
        .ok_or_else(|| cursor.error(format!("unknown status {keyword}")))?;
    cursor.eat(b" ");

    Ok(Response::Tagged {
        tag,
        status,
        text: cursor.rest_of_line(),
    })
}

fn parse_untagged(cursor: &mut Cursor<'_>) -> Result<Response> {
    if cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
        let n = cursor.number()?;
        cursor.expect(b' ')?;
        let keyword = cursor.atom()?.to_ascii_uppercase();

        let untagged = match keyword.as_str() {
            "EXISTS" => UntaggedResponse::Exists(n),
            "FETCH" => {
                let seq = SeqNum::new(n).ok_or_else(|| cursor.error("sequence number 0"))?;
                cursor.expect(b' ')?;
                parse_fetch(cursor, seq)?
            }
            _ => UntaggedResponse::Other(format!("{n} {keyword} {}", cursor.rest_of_line())),
        };
        return Ok(Response::Untagged(untagged));
    }

    let keyword = cursor.atom()?;
    let upper = keyword.to_ascii_uppercase();

    if let Some(status) = Status::parse(&upper) {
        cursor.eat(b" ");
        return Ok(Response::Untagged(UntaggedResponse::Status {
            status,
            text: cursor.rest_of_line(),
        }));
    }

    if upper == "SEARCH" {
        let mut ids = Vec::new();
        while cursor.eat(b" ") {
            if cursor.peek().is_some_and(|b| b.is_ascii_digit()) {
                let n = cursor.number()?;
                if let Some(seq) = SeqNum::new(n) {
                    ids.push(seq);
                }
            }
        }
        return Ok(Response::Untagged(UntaggedResponse::Search(ids)));
    }

    Ok(Response::Untagged(UntaggedResponse::Other(format!(
        "{keyword} {}",
        cursor.rest_of_line()
    ))))
}

fn parse_fetch(cursor: &mut Cursor<'_>, seq: SeqNum) -> Result<UntaggedResponse> {
    cursor.expect(b'(')?;

    let mut rfc822 = None;

    loop {
        cursor.skip_spaces();
        if cursor.eat(b")") {
            break;
        }

        let name = cursor.item_name()?.to_ascii_uppercase();
        cursor.skip_spaces();

        match name.as_str() {
            "RFC822" | "BODY[]" => rfc822 = cursor.nstring()?,
            _ => cursor.skip_value()?,
        }
    }

    Ok(UntaggedResponse::Fetch { seq, rfc822 })
}

/// Byte cursor over a single response.
struct Cursor<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    const fn new(input: &'a [u8]) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::Parse {
            position: self.pos,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn eat(&mut self, expected: &[u8]) -> bool {
        if self.input[self.pos..].starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, byte: u8) -> Result<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(format!("expected '{}'", byte as char)))
        }
    }

    fn skip_spaces(&mut self) {
        while self.peek() == Some(b' ') {
            self.pos += 1;
        }
    }

    fn take_while(&mut self, pred: impl Fn(u8) -> bool) -> &'a [u8] {
        let start = self.pos;
        while self.peek().is_some_and(&pred) {
            self.pos += 1;
        }
        &self.input[start..self.pos]
    }

    fn atom(&mut self) -> Result<String> {
        let bytes = self.take_while(|b| !matches!(b, b' ' | b'(' | b')' | b'\r' | b'\n'));
        if bytes.is_empty() {
            return Err(self.error("expected atom"));
        }
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }

    /// Reads a fetch item name, which may carry a `[section]` suffix.
    fn item_name(&mut self) -> Result<String> {
        let mut name = self.atom()?;
        if name.contains('[') && !name.contains(']') {
            let rest = self.take_while(|b| b != b']');
            name.push_str(&String::from_utf8_lossy(rest));
            self.expect(b']')?;
            name.push(']');
        }
        Ok(name)
    }

    fn number(&mut self) -> Result<u32> {
        let digits = self.take_while(|b| b.is_ascii_digit());
        std::str::from_utf8(digits)
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| self.error("expected number"))
    }

    fn rest_of_line(&mut self) -> String {
        let bytes = self.take_while(|b| b != b'\r' && b != b'\n');
        String::from_utf8_lossy(bytes).into_owned()
    }

    /// Reads NIL, a quoted string or a literal.
    fn nstring(&mut self) -> Result<Option<Vec<u8>>> {
        match self.peek() {
            Some(b'{') => self.literal().map(Some),
            Some(b'"') => self.quoted().map(Some),
            _ => {
                let atom = self.atom()?;
                if atom.eq_ignore_ascii_case("NIL") {
                    Ok(None)
                } else {
                    Err(self.error(format!("expected string, got {atom}")))
                }
            }
        }
    }

    fn literal(&mut self) -> Result<Vec<u8>> {
        self.expect(b'{')?;
        let len = self.number()? as usize;
        self.eat(b"+");
        self.expect(b'}')?;
        if !self.eat(b"\r\n") {
            return Err(self.error("expected CRLF after literal length"));
        }
        let end = self.pos + len;
        if end > self.input.len() {
            return Err(self.error("literal exceeds response"));
        }
        let data = self.input[self.pos..end].to_vec();
        self.pos = end;
        Ok(data)
    }

    fn quoted(&mut self) -> Result<Vec<u8>> {
        self.expect(b'"')?;
        let mut data = Vec::new();
        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    return Ok(data);
                }
                Some(b'\\') => {
                    self.pos += 1;
                    if let Some(b) = self.peek() {
                        data.push(b);
                        self.pos += 1;
                    }
                }
                Some(b) => {
                    data.push(b);
                    self.pos += 1;
                }
                None => return Err(self.error("unterminated quoted string")),
            }
        }
    }

    /// Skips one fetch value: a parenthesized list, string, literal or atom.
    fn skip_value(&mut self) -> Result<()> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                loop {
                    self.skip_spaces();
                    if self.eat(b")") {
                        return Ok(());
                    }
                    if self.peek().is_none() {
                        return Err(self.error("unterminated list"));
                    }
                    self.skip_value()?;
                }
            }
            Some(b'{') => self.literal().map(drop),
            Some(b'"') => self.quoted().map(drop),
            _ => self.atom().map(drop),
        }
    }
}
