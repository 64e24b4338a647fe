//! IMAP commands and their wire serialization.

use std::fmt;

use crate::types::{Flag, SeqNum};

/// Tag generator for IMAP commands.
///
/// Generates sequential tags in the format "A0000", "A0001", etc.
#[derive(Debug, Clone)]
pub struct TagGenerator {
    counter: u32,
    prefix: char,
}

impl TagGenerator {
    /// Creates a new tag generator with the given prefix.
    #[must_use]
    pub const fn new(prefix: char) -> Self {
        Self { counter: 0, prefix }
    }

    /// Generates the next tag.
    pub fn next(&mut self) -> String {
        let tag = format!("{}{:04}", self.prefix, self.counter);
        self.counter = self.counter.wrapping_add(1);
        tag
    }
}

impl Default for TagGenerator {
    fn default() -> Self {
        Self::new('A')
    }
}

/// Search criteria supported by the reader.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchCriteria {
    /// Every message in the mailbox.
    All,
    /// Messages without the `\Seen` flag.
    Unseen,
}

impl SearchCriteria {
    /// Returns the wire keyword.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "ALL",
            Self::Unseen => "UNSEEN",
        }
    }
}

/// Flag modification for STORE.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreAction {
    /// `-FLAGS`
    RemoveFlags(Vec<Flag>),
}

/// An IMAP command.
#[derive(Clone, PartialEq, Eq)]
pub enum Command {
    /// LOGIN with plaintext credentials (only sent over TLS).
    Login {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// SELECT a mailbox.
    Select {
        /// Mailbox name.
        mailbox: String,
    },
    /// SEARCH with a single criterion.
    Search(SearchCriteria),
    /// FETCH the full RFC 822 message.
    FetchRfc822(SeqNum),
    /// STORE flags on one message.
    Store {
        /// Target message.
        seq: SeqNum,
        /// Flag change.
        action: StoreAction,
    },
    /// CLOSE the selected mailbox.
    Close,
    /// LOGOUT.
    Logout,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Login { username, .. } => f
                .debug_struct("Login")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Self::Select { mailbox } => f.debug_struct("Select").field("mailbox", mailbox).finish(),
            Self::Search(criteria) => f.debug_tuple("Search").field(criteria).finish(),
            Self::FetchRfc822(seq) => f.debug_tuple("FetchRfc822").field(seq).finish(),
            Self::Store { seq, action } => f
                .debug_struct("Store")
                .field("seq", seq)
                .field("action", action)
                .finish(),
            Self::Close => f.write_str("Close"),
            Self::Logout => f.write_str("Logout"),
        }
    }
}

impl Command {
    /// Serializes the command with the given tag, including the trailing CRLF.
    #[must_use]
    pub fn serialize(&self, tag: &str) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(tag.as_bytes());
        buf.push(b' ');

        match self {
            Self::Login { username, password } => {
                buf.extend_from_slice(b"LOGIN ");
                write_astring(&mut buf, username);
                buf.push(b' ');
                write_astring(&mut buf, password);
            }
            Self::Select { mailbox } => {
                buf.extend_from_slice(b"SELECT ");
                write_astring(&mut buf, mailbox);
            }
            Self::Search(criteria) => {
                buf.extend_from_slice(b"SEARCH ");
                buf.extend_from_slice(criteria.as_str().as_bytes());
            }
            Self::FetchRfc822(seq) => {
                buf.extend_from_slice(format!("FETCH {seq} (RFC822)").as_bytes());
            }
            Self::Store { seq, action } => {
                let StoreAction::RemoveFlags(flags) = action;
                let flags = flags.iter().map(Flag::as_str).collect::<Vec<_>>().join(" ");
                buf.extend_from_slice(format!("STORE {seq} -FLAGS ({flags})").as_bytes());
            }
            Self::Close => buf.extend_from_slice(b"CLOSE"),
            Self::Logout => buf.extend_from_slice(b"LOGOUT"),
        }

        buf.extend_from_slice(b"\r\n");
        buf
    }
}

/// Writes an astring (atom or quoted string).
fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Returns true if the byte cannot appear in an atom.
const fn needs_quoting(b: u8) -> bool {
    matches!(b, b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']') || b < 0x20 || b == 0x7F
}
