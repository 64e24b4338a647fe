//! Fetch sessions against a scripted IMAP server.

#![allow(clippy::unwrap_used)]

use std::io::{self, Cursor};
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

use mailscribe_core::fetcher::read_mailbox;
use mailscribe_core::{Error, FetchMode, MailConfig, Stage, fetch};

/// Plays back a server transcript and records what the client sends.
struct ScriptedServer {
    transcript: Cursor<Vec<u8>>,
    sent: Arc<Mutex<Vec<u8>>>,
}

impl ScriptedServer {
    fn new(transcript: Vec<u8>) -> (Self, Arc<Mutex<Vec<u8>>>) {
        let sent = Arc::new(Mutex::new(Vec::new()));
        let server = Self {
            transcript: Cursor::new(transcript),
            sent: Arc::clone(&sent),
        };
        (server, sent)
    }
}

impl AsyncRead for ScriptedServer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let pos = usize::try_from(self.transcript.position()).unwrap();
        let data = self.transcript.get_ref();
        let n = data.len().saturating_sub(pos).min(buf.remaining());
        buf.put_slice(&data[pos..pos + n]);
        self.transcript.set_position((pos + n) as u64);
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for ScriptedServer {
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

fn commands(sent: &Arc<Mutex<Vec<u8>>>) -> Vec<String> {
    String::from_utf8(sent.lock().unwrap().clone())
        .unwrap()
        .lines()
        .filter_map(|line| line.split_once(' ').map(|(_, rest)| rest.to_string()))
        .collect()
}

fn config() -> MailConfig {
    let mut config = MailConfig::new("imap.example.com", "me@example.com", "secret");
    config.io_timeout = Duration::from_secs(5);
    config
}

fn fetch_reply(seq: u32, tag: &str, message: &[u8]) -> Vec<u8> {
    let mut out = format!("* {seq} FETCH (RFC822 {{{}}}\r\n", message.len()).into_bytes();
    out.extend_from_slice(message);
    out.extend_from_slice(format!(")\r\n{tag} OK FETCH completed\r\n").as_bytes());
    out
}

const LOGGED_IN: &[u8] = b"* OK IMAP4rev1 ready\r\nA0000 OK LOGIN completed\r\n";

const INVOICE: &[u8] = b"From: billing@acme.test\r\nTo: me@example.com\r\n\
    Subject: Invoice 42\r\n\r\nPlease pay.\r\n";

const BROKEN: &[u8] = b"From: x@example.com\r\nTo: me@example.com\r\nSubject: Broken\r\n\
    Content-Transfer-Encoding: base64\r\n\r\n!!!!\r\n";

#[tokio::test]
async fn test_unseen_session_reads_and_skips() {
    let mut script = LOGGED_IN.to_vec();
    script.extend_from_slice(b"* 2 EXISTS\r\nA0001 OK SELECT completed\r\n");
    script.extend_from_slice(b"* SEARCH 1 2\r\nA0002 OK SEARCH completed\r\n");
    script.extend_from_slice(&fetch_reply(1, "A0003", INVOICE));
    script.extend_from_slice(&fetch_reply(2, "A0004", BROKEN));
    script.extend_from_slice(b"A0005 OK CLOSE completed\r\n* BYE bye\r\nA0006 OK LOGOUT completed\r\n");

    let (server, sent) = ScriptedServer::new(script);
    let batch = read_mailbox(server, &config(), FetchMode::Unseen).await.unwrap();

    assert_eq!(batch.records.len(), 1);
    assert_eq!(batch.records[0].subject, "Invoice 42");
    assert_eq!(batch.records[0].body, "Please pay.\r\n");
    assert_eq!(batch.skipped.len(), 1);
    assert_eq!(batch.skipped[0].index, 1);
    assert_eq!(batch.skipped[0].stage, Stage::Fetch);
    assert_eq!(batch.skipped[0].subject.as_deref(), Some("Broken"));
    assert!(batch.failure.is_none());

    assert_eq!(
        commands(&sent),
        vec![
            "LOGIN me@example.com secret",
            "SELECT INBOX",
            "SEARCH UNSEEN",
            "FETCH 1 (RFC822)",
            "FETCH 2 (RFC822)",
            "CLOSE",
            "LOGOUT",
        ]
    );
}

#[tokio::test]
async fn test_all_mode_clears_seen_flag() {
    let mut script = LOGGED_IN.to_vec();
    script.extend_from_slice(b"* 1 EXISTS\r\nA0001 OK SELECT completed\r\n");
    script.extend_from_slice(b"* SEARCH 1\r\nA0002 OK SEARCH completed\r\n");
    script.extend_from_slice(&fetch_reply(1, "A0003", INVOICE));
    script.extend_from_slice(b"* 1 FETCH (FLAGS ())\r\nA0004 OK STORE completed\r\n");
    script.extend_from_slice(b"A0005 OK CLOSE completed\r\nA0006 OK LOGOUT completed\r\n");

    let (server, sent) = ScriptedServer::new(script);
    let batch = read_mailbox(server, &config(), FetchMode::All).await.unwrap();

    assert_eq!(batch.records.len(), 1);
    let commands = commands(&sent);
    assert_eq!(commands[2], "SEARCH ALL");
    assert_eq!(commands[4], "STORE 1 -FLAGS (\\Seen)");
    assert_eq!(&commands[5..], ["CLOSE", "LOGOUT"]);
}

#[tokio::test]
async fn test_fetch_failure_still_closes_session() {
    let mut script = LOGGED_IN.to_vec();
    script.extend_from_slice(b"* 1 EXISTS\r\nA0001 OK SELECT completed\r\n");
    script.extend_from_slice(b"* SEARCH 1\r\nA0002 OK SEARCH completed\r\n");
    script.extend_from_slice(b"A0003 NO FETCH failed: message expunged\r\n");
    script.extend_from_slice(b"A0004 OK CLOSE completed\r\nA0005 OK LOGOUT completed\r\n");

    let (server, sent) = ScriptedServer::new(script);
    let err = read_mailbox(server, &config(), FetchMode::Unseen).await.unwrap_err();

    assert!(matches!(err, Error::Imap(_)));
    let commands = commands(&sent);
    assert_eq!(&commands[commands.len() - 2..], ["CLOSE", "LOGOUT"]);
}

#[tokio::test]
async fn test_rejected_login_is_auth_error() {
    let script = b"* OK ready\r\nA0000 NO [AUTHENTICATIONFAILED] Invalid credentials\r\n".to_vec();
    let (server, sent) = ScriptedServer::new(script);

    let err = read_mailbox(server, &config(), FetchMode::Unseen).await.unwrap_err();

    assert!(matches!(err, Error::Auth(ref text) if text.contains("Invalid credentials")));
    assert_eq!(commands(&sent), vec!["LOGIN me@example.com secret"]);
}

#[tokio::test]
async fn test_bye_greeting_is_connection_error() {
    let (server, _) = ScriptedServer::new(b"* BYE server shutting down\r\n".to_vec());
    let err = read_mailbox(server, &config(), FetchMode::Unseen).await.unwrap_err();
    assert!(matches!(err, Error::Connection(_)));
}

#[tokio::test]
async fn test_missing_mailbox_sends_nothing_after_select() {
    let mut script = LOGGED_IN.to_vec();
    script.extend_from_slice(b"A0001 NO Mailbox does not exist\r\n");
    let (server, sent) = ScriptedServer::new(script);

    let mut config = config();
    config.mailbox = "Archive".to_string();
    let err = read_mailbox(server, &config, FetchMode::Unseen).await.unwrap_err();

    assert!(matches!(err, Error::Imap(_)));
    assert_eq!(commands(&sent).last().map(String::as_str), Some("SELECT Archive"));
}

#[tokio::test]
async fn test_unreachable_server_yields_failed_batch() {
    let mut config = MailConfig::new("127.0.0.1", "me", "secret");
    config.port = 1;
    config.connect_timeout = Duration::from_secs(5);

    let batch = fetch(&config, FetchMode::Unseen).await;

    assert!(batch.records.is_empty());
    assert!(batch.skipped.is_empty());
    assert!(batch.failure.unwrap().starts_with("Connection failed"));
}
