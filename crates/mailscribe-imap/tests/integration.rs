//! Integration tests for the IMAP client.
//!
//! A scripted stream plays the server side; everything the client writes is
//! captured so the command sequence can be checked afterwards.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailscribe_imap::{Client, Error, Flag, SearchCriteria, StoreAction};

/// Stream that replays a canned server transcript.
struct ScriptedStream {
    responses: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedStream {
    fn new(responses: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let stream = Self {
            responses: Cursor::new(responses.to_vec()),
            sent: Arc::clone(&sent),
        };
        (stream, sent)
    }
}

impl AsyncRead for ScriptedStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.responses.position()).unwrap();
        let data = self.responses.get_ref();

        if pos >= data.len() {
            return Poll::Ready(Ok(()));
        }

        let to_read = (data.len() - pos).min(buf.remaining());
        buf.put_slice(&data[pos..pos + to_read]);
        self.responses.set_position((pos + to_read) as u64);

        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        self.sent.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn sent_lines(sent: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    String::from_utf8(sent.lock().unwrap().clone())
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

const MESSAGE: &[u8] = b"From: a@example.com\r\nTo: b@example.com\r\nSubject: Hi\r\n\r\nHello\r\n";

fn fetch_response(seq: u32, tag: &str) -> Vec<u8> {
    let mut out = format!("* {seq} FETCH (RFC822 {{{}}}\r\n", MESSAGE.len()).into_bytes();
    out.extend_from_slice(MESSAGE);
    out.extend_from_slice(format!(" FLAGS (\\Seen))\r\n{tag} OK FETCH completed\r\n").as_bytes());
    out
}

#[tokio::test]
async fn test_unseen_session() {
    let mut script = b"* OK [CAPABILITY IMAP4rev1] ready\r\n\
        A0000 OK LOGIN completed\r\n\
        * 3 EXISTS\r\n* FLAGS (\\Seen \\Answered)\r\nA0001 OK [READ-WRITE] SELECT completed\r\n\
        * SEARCH 3\r\nA0002 OK SEARCH completed\r\n"
        .to_vec();
    script.extend_from_slice(&fetch_response(3, "A0003"));
    script.extend_from_slice(b"A0004 OK CLOSE completed\r\n* BYE logging out\r\nA0005 OK LOGOUT completed\r\n");

    let (stream, sent) = ScriptedStream::new(&script);

    let client = Client::from_stream(stream).await.unwrap();
    let client = client.login("user@example.com", "secret").await.unwrap();
    let (mut client, exists) = client.select("INBOX").await.unwrap();
    assert_eq!(exists, 3);

    let ids = client.search(SearchCriteria::Unseen).await.unwrap();
    assert_eq!(ids.iter().map(|s| s.get()).collect::<Vec<_>>(), vec![3]);

    let raw = client.fetch_rfc822(ids[0]).await.unwrap().unwrap();
    assert_eq!(raw, MESSAGE);

    let client = client.close().await.unwrap();
    client.logout().await.unwrap();

    assert_eq!(
        sent_lines(&sent),
        vec![
            "A0000 LOGIN user@example.com secret",
            "A0001 SELECT INBOX",
            "A0002 SEARCH UNSEEN",
            "A0003 FETCH 3 (RFC822)",
            "A0004 CLOSE",
            "A0005 LOGOUT",
        ]
    );
}

#[tokio::test]
async fn test_replay_session_clears_seen() {
    let mut script = b"* OK ready\r\n\
        A0000 OK LOGIN completed\r\n\
        * 1 EXISTS\r\nA0001 OK SELECT completed\r\n\
        * SEARCH 1\r\nA0002 OK SEARCH completed\r\n"
        .to_vec();
    script.extend_from_slice(&fetch_response(1, "A0003"));
    script.extend_from_slice(b"* 1 FETCH (FLAGS ())\r\nA0004 OK STORE completed\r\n");

    let (stream, sent) = ScriptedStream::new(&script);

    let client = Client::from_stream(stream).await.unwrap();
    let client = client.login("user", "pass word").await.unwrap();
    let (mut client, _) = client.select("INBOX").await.unwrap();

    let ids = client.search(SearchCriteria::All).await.unwrap();
    for seq in ids {
        assert!(client.fetch_rfc822(seq).await.unwrap().is_some());
        client
            .store(seq, StoreAction::RemoveFlags(vec![Flag::Seen]))
            .await
            .unwrap();
    }

    let lines = sent_lines(&sent);
    assert_eq!(lines[0], "A0000 LOGIN user \"pass word\"");
    assert_eq!(lines[2], "A0002 SEARCH ALL");
    assert_eq!(lines[4], "A0004 STORE 1 -FLAGS (\\Seen)");
}

#[tokio::test]
async fn test_select_missing_mailbox() {
    let script = b"* OK ready\r\n\
        A0000 OK LOGIN completed\r\n\
        A0001 NO [NONEXISTENT] Unknown Mailbox: Archive\r\n";
    let (stream, _) = ScriptedStream::new(script);

    let client = Client::from_stream(stream).await.unwrap();
    let client = client.login("user", "pass").await.unwrap();
    let err = client.select("Archive").await.unwrap_err();

    assert!(matches!(err, Error::No(ref text) if text.contains("Unknown Mailbox")));
}

#[tokio::test]
async fn test_connection_dropped_mid_command() {
    let script = b"* OK ready\r\nA0000 OK LOGIN completed\r\n* 1 EXISTS\r\n";
    let (stream, _) = ScriptedStream::new(script);

    let client = Client::from_stream(stream).await.unwrap();
    let client = client.login("user", "pass").await.unwrap();
    let err = client.select("INBOX").await.unwrap_err();

    assert!(matches!(err, Error::Io(_)));
}
