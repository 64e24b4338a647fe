//! Type-state IMAP client connection.
//!
//! The connection states are:
//!
//! - `NotAuthenticated`: after the greeting
//! - `Authenticated`: after a successful LOGIN
//! - `Selected`: after a successful SELECT
//!
//! Each state only exposes the commands valid in it.

use std::marker::PhantomData;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

use super::framed::FramedStream;
use crate::command::{Command, SearchCriteria, StoreAction, TagGenerator};
use crate::parser::{self, Response, UntaggedResponse};
use crate::types::{SeqNum, Status};
use crate::{Error, Result};

/// Initial state after the server greeting.
#[derive(Debug, Clone, Copy)]
pub struct NotAuthenticated;

/// State after successful authentication.
#[derive(Debug, Clone, Copy)]
pub struct Authenticated;

/// State with a mailbox selected.
#[derive(Debug, Clone, Copy)]
pub struct Selected;

/// IMAP client connection with type-state.
pub struct Client<S, State> {
    stream: FramedStream<S>,
    tag_gen: TagGenerator,
    io_timeout: Duration,
    _state: PhantomData<State>,
}

impl<S, State> std::fmt::Debug for Client<S, State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("tag_gen", &self.tag_gen)
            .field("io_timeout", &self.io_timeout)
            .finish_non_exhaustive()
    }
}

impl<S, State> Client<S, State>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    fn into_state<Next>(self) -> Client<S, Next> {
        Client {
            stream: self.stream,
            tag_gen: self.tag_gen,
            io_timeout: self.io_timeout,
            _state: PhantomData,
        }
    }

    /// Sends a command and collects every response up to its tagged
    /// completion, failing unless the completion is OK.
    async fn execute(&mut self, command: &Command) -> Result<Vec<Response>> {
        let tag = self.tag_gen.next();
        debug!(%tag, ?command, "sending");
        self.stream.write_command(&command.serialize(&tag)).await?;

        let timeout = self.io_timeout;
        tokio::time::timeout(timeout, self.read_until_tagged(&tag))
            .await
            .map_err(|_| Error::Timeout(timeout))?
    }

    async fn read_until_tagged(&mut self, tag: &str) -> Result<Vec<Response>> {
        let mut responses = Vec::new();

        loop {
            let raw = self.stream.read_response().await?;
            let response = parser::parse(&raw)?;

            if let Response::Tagged {
                tag: ref resp_tag,
                status,
                ref text,
            } = response
                && resp_tag == tag
            {
                return match status {
                    Status::Ok | Status::PreAuth => Ok(responses),
                    Status::No => Err(Error::No(text.clone())),
                    Status::Bad => Err(Error::Bad(text.clone())),
                    Status::Bye => Err(Error::Bye(text.clone())),
                };
            }

            responses.push(response);
        }
    }

    /// Sets the bound on each command round trip.
    #[must_use]
    pub const fn with_io_timeout(mut self, timeout: Duration) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Gracefully disconnects from the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the LOGOUT command cannot be written.
    pub async fn logout(mut self) -> Result<()> {
        match self.execute(&Command::Logout).await {
            // The server may close the stream right after BYE.
            Ok(_) | Err(Error::Io(_) | Error::Bye(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

impl<S> Client<S, NotAuthenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a client from a connected stream by reading the greeting.
    ///
    /// # Errors
    ///
    /// Returns an error if the greeting cannot be read or the server sent BYE.
    pub async fn from_stream(stream: S) -> Result<Self> {
        let mut framed = FramedStream::new(stream);

        let greeting = framed.read_response().await?;
        match parser::parse(&greeting)? {
            Response::Untagged(UntaggedResponse::Status {
                status: Status::Bye,
                text,
            }) => return Err(Error::Bye(text)),
            Response::Untagged(UntaggedResponse::Status { .. }) => {}
            other => {
                return Err(Error::Protocol(format!("unexpected greeting: {other:?}")));
            }
        }

        Ok(Self {
            stream: framed,
            tag_gen: TagGenerator::default(),
            io_timeout: Duration::from_secs(60),
            _state: PhantomData,
        })
    }

    /// Authenticates with LOGIN.
    ///
    /// # Errors
    ///
    /// Returns [`Error::No`] when the server rejects the credentials.
    pub async fn login(mut self, username: &str, password: &str) -> Result<Client<S, Authenticated>> {
        self.execute(&Command::Login {
            username: username.to_string(),
            password: password.to_string(),
        })
        .await?;

        Ok(self.into_state())
    }
}

impl<S> Client<S, Authenticated>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Selects a mailbox, returning the selected client and the message count.
    ///
    /// # Errors
    ///
    /// Returns an error if the mailbox does not exist or cannot be opened.
    pub async fn select(mut self, mailbox: &str) -> Result<(Client<S, Selected>, u32)> {
        let responses = self
            .execute(&Command::Select {
                mailbox: mailbox.to_string(),
            })
            .await?;

        let exists = responses
            .iter()
            .find_map(|r| match r {
                Response::Untagged(UntaggedResponse::Exists(n)) => Some(*n),
                _ => None,
            })
            .unwrap_or(0);

        Ok((self.into_state(), exists))
    }
}

impl<S> Client<S, Selected>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Searches the selected mailbox.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn search(&mut self, criteria: SearchCriteria) -> Result<Vec<SeqNum>> {
        let responses = self.execute(&Command::Search(criteria)).await?;

        Ok(responses
            .into_iter()
            .filter_map(|r| match r {
                Response::Untagged(UntaggedResponse::Search(ids)) => Some(ids),
                _ => None,
            })
            .flatten()
            .collect())
    }

    /// Fetches the full RFC 822 message. Returns `None` if the server sent
    /// no body for that sequence number.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn fetch_rfc822(&mut self, seq: SeqNum) -> Result<Option<Vec<u8>>> {
        let responses = self.execute(&Command::FetchRfc822(seq)).await?;

        Ok(responses.into_iter().find_map(|r| match r {
            Response::Untagged(UntaggedResponse::Fetch {
                seq: fetched,
                rfc822,
                ..
            }) if fetched == seq => rfc822,
            _ => None,
        }))
    }

    /// Modifies the flags of one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn store(&mut self, seq: SeqNum, action: StoreAction) -> Result<()> {
        self.execute(&Command::Store { seq, action }).await.map(drop)
    }

    /// Closes the mailbox and returns to the authenticated state.
    ///
    /// # Errors
    ///
    /// Returns an error if the command fails.
    pub async fn close(mut self) -> Result<Client<S, Authenticated>> {
        self.execute(&Command::Close).await?;
        Ok(self.into_state())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use tokio_test::io::Builder;

    use super::*;
    use crate::types::Flag;

    #[tokio::test]
    async fn test_greeting_bye_is_error() {
        let mock = Builder::new().read(b"* BYE too many connections\r\n").build();
        let err = Client::from_stream(mock).await.unwrap_err();
        assert!(matches!(err, Error::Bye(text) if text == "too many connections"));
    }

    #[tokio::test]
    async fn test_login_rejected() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user wrong\r\n")
            .read(b"A0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let err = client.login("user", "wrong").await.unwrap_err();
        assert!(err.is_rejection());
    }

    #[tokio::test]
    async fn test_select_search_fetch_store_close() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGIN user pass\r\n")
            .read(b"A0000 OK logged in\r\n")
            .write(b"A0001 SELECT INBOX\r\n")
            .read(b"* 2 EXISTS\r\n* 0 RECENT\r\nA0001 OK [READ-WRITE] done\r\n")
            .write(b"A0002 SEARCH ALL\r\n")
            .read(b"* SEARCH 1 2\r\nA0002 OK done\r\n")
            .write(b"A0003 FETCH 2 (RFC822)\r\n")
            .read(b"* 2 FETCH (RFC822 {5}\r\nhello)\r\nA0003 OK done\r\n")
            .write(b"A0004 STORE 2 -FLAGS (\\Seen)\r\n")
            .read(b"* 2 FETCH (FLAGS ())\r\nA0004 OK done\r\n")
            .write(b"A0005 CLOSE\r\n")
            .read(b"A0005 OK closed\r\n")
            .write(b"A0006 LOGOUT\r\n")
            .read(b"* BYE bye\r\nA0006 OK done\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        let client = client.login("user", "pass").await.unwrap();
        let (mut client, exists) = client.select("INBOX").await.unwrap();
        assert_eq!(exists, 2);

        let ids = client.search(SearchCriteria::All).await.unwrap();
        assert_eq!(ids.len(), 2);

        let body = client.fetch_rfc822(ids[1]).await.unwrap();
        assert_eq!(body.as_deref(), Some(&b"hello"[..]));

        client
            .store(ids[1], StoreAction::RemoveFlags(vec![Flag::Seen]))
            .await
            .unwrap();

        let client = client.close().await.unwrap();
        client.logout().await.unwrap();
    }

    #[tokio::test]
    async fn test_logout_tolerates_closed_stream() {
        let mock = Builder::new()
            .read(b"* OK ready\r\n")
            .write(b"A0000 LOGOUT\r\n")
            .read(b"* BYE bye\r\n")
            .build();

        let client = Client::from_stream(mock).await.unwrap();
        client.logout().await.unwrap();
    }
}
