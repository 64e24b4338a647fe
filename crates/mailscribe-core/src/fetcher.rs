//! Mailbox reading.
//!
//! One fetch is one IMAP session: connect, log in, select, search, fetch
//! each message, then close and log out. Once the mailbox is selected the
//! session is always closed, whatever happened while reading.

use mailscribe_imap::connection::{self, Selected};
use mailscribe_imap::{Client, Flag, SearchCriteria, StoreAction};
use mailscribe_mime::Message;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, error, info, warn};

use crate::config::{FetchMode, MailConfig};
use crate::error::{Error, Result};
use crate::model::MessageRecord;
use crate::report::{Skipped, Stage};

/// Messages read in one session.
#[derive(Debug, Default)]
pub struct FetchBatch {
    /// Decoded messages, in mailbox order.
    pub records: Vec<MessageRecord>,
    /// Messages that could not be decoded.
    pub skipped: Vec<Skipped>,
    /// Why the session failed, if it did; `records` is then empty.
    pub failure: Option<String>,
}

impl FetchBatch {
    /// Pairs each record with its position in the search results.
    ///
    /// Positions taken by fetch skips are passed over, so a record's
    /// position matches the numbering of [`Skipped::index`].
    pub fn positioned(&self) -> impl Iterator<Item = (usize, &MessageRecord)> {
        let mut taken: Vec<usize> = self
            .skipped
            .iter()
            .filter(|skip| skip.stage == Stage::Fetch)
            .map(|skip| skip.index)
            .collect();
        taken.sort_unstable();
        (0..)
            .filter(move |position| taken.binary_search(position).is_err())
            .zip(&self.records)
    }

    fn failed(error: &Error) -> Self {
        Self {
            failure: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Reads the configured mailbox. Never fails: a session error is logged and
/// returned as an empty batch with [`FetchBatch::failure`] set.
pub async fn fetch(config: &MailConfig, mode: FetchMode) -> FetchBatch {
    match fetch_session(config, mode).await {
        Ok(batch) => batch,
        Err(e) => {
            error!(host = %config.host, mailbox = %config.mailbox, error = %e, "Fetch failed");
            FetchBatch::failed(&e)
        }
    }
}

async fn fetch_session(config: &MailConfig, mode: FetchMode) -> Result<FetchBatch> {
    let imap = mailscribe_imap::Config::new(config.host.clone())
        .with_port(config.port)
        .with_connect_timeout(config.connect_timeout)
        .with_io_timeout(config.io_timeout);

    info!("Connecting to {}:{}", config.host, config.port);
    let stream = connection::connect(&imap)
        .await
        .map_err(|e| Error::Connection(e.to_string()))?;

    read_mailbox(stream, config, mode).await
}

/// Runs a fetch session over an already connected stream.
///
/// # Errors
///
/// Returns [`Error::Connection`] for a bad greeting, [`Error::Auth`] when
/// the login is rejected and [`Error::Imap`] for later failures.
pub async fn read_mailbox<S>(stream: S, config: &MailConfig, mode: FetchMode) -> Result<FetchBatch>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let client = Client::from_stream(stream)
        .await
        .map_err(|e| Error::Connection(e.to_string()))?
        .with_io_timeout(config.io_timeout);

    let client = client
        .login(&config.username, &config.password)
        .await
        .map_err(|e| {
            if e.is_rejection() {
                Error::Auth(e.to_string())
            } else {
                Error::Imap(e)
            }
        })?;
    debug!(user = %config.username, "Logged in");

    let (mut client, exists) = client.select(&config.mailbox).await?;
    info!(mailbox = %config.mailbox, exists, "Selected mailbox");

    let outcome = read_selected(&mut client, mode).await;

    match client.close().await {
        Ok(client) => {
            if let Err(e) = client.logout().await {
                warn!(error = %e, "LOGOUT failed");
            }
        }
        Err(e) => warn!(error = %e, "CLOSE failed"),
    }

    outcome
}

async fn read_selected<S>(client: &mut Client<S, Selected>, mode: FetchMode) -> Result<FetchBatch>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let criteria = match mode {
        FetchMode::All => SearchCriteria::All,
        FetchMode::Unseen => SearchCriteria::Unseen,
    };
    let ids = client.search(criteria).await?;
    info!(count = ids.len(), mode = mode.as_str(), "Found messages");

    let mut batch = FetchBatch::default();
    for (index, seq) in ids.into_iter().enumerate() {
        match client.fetch_rfc822(seq).await? {
            Some(raw) => match parse_message(&raw) {
                Ok(record) => {
                    debug!(%seq, subject = %record.subject, "Fetched message");
                    batch.records.push(record);
                }
                Err(e) => {
                    warn!(%seq, error = %e, "Skipping undecodable message");
                    batch.skipped.push(Skipped {
                        index,
                        subject: raw_subject(&raw),
                        stage: Stage::Fetch,
                        reason: e.to_string(),
                    });
                }
            },
            None => {
                warn!(%seq, "Server sent no message body");
                batch.skipped.push(Skipped {
                    index,
                    subject: None,
                    stage: Stage::Fetch,
                    reason: format!("no RFC822 data for message {seq}"),
                });
            }
        }

        if mode == FetchMode::All {
            client
                .store(seq, StoreAction::RemoveFlags(vec![Flag::Seen]))
                .await?;
        }
    }

    Ok(batch)
}

/// Builds a [`MessageRecord`] from raw RFC 822 bytes.
///
/// Multipart messages take the first inline, non-container part that decodes
/// to text; the body is empty if there is none.
///
/// # Errors
///
/// Returns [`Error::Decode`] if an encoded-word header or a single-part
/// body has an invalid transfer encoding.
pub fn parse_message(raw: &[u8]) -> Result<MessageRecord> {
    let message = Message::parse(raw);

    let body = if message.is_multipart() {
        first_text_part(&message)
    } else {
        message.root().decode_text()?
    };

    Ok(MessageRecord {
        to: message.decoded_header("to")?.unwrap_or_default(),
        from: message.decoded_header("from")?.unwrap_or_default(),
        cc: message.decoded_header("cc")?,
        bcc: message.decoded_header("bcc")?,
        subject: message.decoded_header("subject")?.unwrap_or_default(),
        body,
    })
}

fn first_text_part(message: &Message) -> String {
    message
        .walk()
        .filter(|part| !part.is_multipart() && !part.is_attachment())
        .find_map(|part| match part.decode_text() {
            Ok(text) => Some(text),
            Err(e) => {
                debug!(content_type = %part.content_type(), error = %e, "Skipping part");
                None
            }
        })
        .unwrap_or_default()
}

fn raw_subject(raw: &[u8]) -> Option<String> {
    Message::parse(raw)
        .headers()
        .get("subject")
        .map(str::to_string)
}
