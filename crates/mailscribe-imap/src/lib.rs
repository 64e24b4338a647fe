//! # mailscribe-imap
//!
//! A small async IMAP4rev1 client covering what a mailbox reader needs:
//! LOGIN, SELECT, SEARCH, FETCH of whole messages, flag STORE, CLOSE and
//! LOGOUT over an implicit-TLS connection.
//!
//! ## Quick Start
//!
//! ```ignore
//! use mailscribe_imap::{Client, Config, SearchCriteria, StoreAction, Flag};
//!
//! #[tokio::main]
//! async fn main() -> mailscribe_imap::Result<()> {
//!     let config = Config::new("imap.example.com");
//!     let stream = mailscribe_imap::connection::connect(&config).await?;
//!     let client = Client::from_stream(stream).await?;
//!
//!     let client = client.login("user@example.com", "password").await?;
//!     let (mut client, exists) = client.select("INBOX").await?;
//!     println!("{exists} messages");
//!
//!     for seq in client.search(SearchCriteria::Unseen).await? {
//!         if let Some(raw) = client.fetch_rfc822(seq).await? {
//!             println!("{} bytes", raw.len());
//!         }
//!     }
//!
//!     let client = client.close().await?;
//!     client.logout().await
//! }
//! ```
//!
//! ## Connection States
//!
//! ```text
//! NotAuthenticated ── login() ──→ Authenticated ── select() ──→ Selected
//!                                        ↑                          │
//!                                        └──────── close() ─────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod command;
pub mod connection;
mod error;
pub mod parser;
pub mod types;

pub use command::{Command, SearchCriteria, StoreAction, TagGenerator};
pub use connection::{
    Authenticated, Client, Config, FramedStream, ImapStream, NotAuthenticated, Selected,
};
pub use error::{Error, Result};
pub use parser::{Response, UntaggedResponse};
pub use types::{Flag, SeqNum, Status};
