//! # mailscribe-mime
//!
//! MIME parsing for messages fetched as raw RFC 822 bytes.
//!
//! ## Features
//!
//! - **Headers**: folded header lines, case-insensitive lookup
//! - **Encoded words**: RFC 2047 `B` and `Q` words, adjacent words joined
//! - **Transfer encodings**: Base64 and Quoted-Printable
//! - **Charsets**: every WHATWG label plus UTF-7, lossy on bad input
//! - **Multipart**: nested part tree with a depth-first walk
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailscribe_mime::Message;
//!
//! let raw = b"Subject: =?utf-8?B?SMOpbGxv?=\r\n\
//!             Content-Type: text/plain\r\n\
//!             \r\n\
//!             Hello, World!";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.decoded_header("subject")?.as_deref(), Some("Héllo"));
//!
//! for part in message.walk() {
//!     if !part.is_multipart() && !part.is_attachment() {
//!         println!("{}", part.decode_text()?);
//!     }
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod content_type;
mod error;
mod header;
mod message;

pub mod charset;
pub mod encoding;

pub use content_type::ContentType;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding, Walk};
