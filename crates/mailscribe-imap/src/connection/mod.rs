//! IMAP connection management.
//!
//! - Configuration (host, port, timeouts)
//! - TLS stream
//! - Framed I/O with literal support
//! - Type-state client

mod client;
mod config;
mod framed;
mod stream;

pub use client::{Authenticated, Client, NotAuthenticated, Selected};
pub use config::{Config, DEFAULT_PORT};
pub use framed::FramedStream;
pub use stream::{ImapStream, connect, create_tls_connector};
