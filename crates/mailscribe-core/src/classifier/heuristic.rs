//! Regex-based call detection.
//!
//! A message whose subject mentions a meeting, call or invite becomes a
//! [`CallRecord`] with details scraped from the body. Anything else passes
//! through as an untagged [`ProcessedEmail`].

use std::sync::OnceLock;

use regex::Regex;

use crate::model::{CallRecord, Classified, MessageRecord, NOT_AVAILABLE, ProcessedEmail, Record};

/// Subject keywords marking a call (matched case-insensitively as substrings).
const CALL_KEYWORDS: [&str; 3] = ["meeting", "call", "invite"];

#[allow(clippy::expect_used)]
fn compiled(pattern: &str) -> Regex {
    Regex::new(pattern).expect("pattern is a valid literal")
}

fn re_call_time() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compiled(r"(?i)\b\d{1,2}:\d{2}\s?(?:AM|PM)?\b"))
}

fn re_url() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compiled(r"https?://\S+"))
}

fn re_email() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compiled(r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}"))
}

fn re_agenda() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compiled(r"(?i)agenda[:\-][ \t]*([^\r\n]*)"))
}

fn re_client() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| compiled(r"(?i)client[:\-][ \t]*([^\r\n]*)"))
}

/// Stateless classifier using [`classify_message`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl HeuristicClassifier {
    /// Classifies one message.
    #[must_use]
    pub fn classify(&self, record: &MessageRecord) -> Classified {
        classify_message(record)
    }
}

/// True if the subject marks the message as a call.
#[must_use]
pub fn is_call_subject(subject: &str) -> bool {
    let subject = subject.to_lowercase();
    CALL_KEYWORDS.iter().any(|keyword| subject.contains(keyword))
}

/// Splits messages into calls and regular emails.
#[must_use]
pub fn classify_message(record: &MessageRecord) -> Classified {
    if !is_call_subject(&record.subject) {
        return Record::Email(ProcessedEmail::from_message(record));
    }

    let body = record.body.as_str();
    let mut call = CallRecord::new(&record.subject, &record.from);

    if let Some(m) = re_call_time().find(body) {
        call.call_time = m.as_str().trim_end().to_string();
    }
    if let Some(m) = re_url().find(body) {
        call.meet_url = m.as_str().to_string();
    }

    let attendees: Vec<String> = re_email()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect();
    if !attendees.is_empty() {
        call.attendees = attendees;
    }

    call.agenda = marker_text(re_agenda(), body);
    call.client_name = marker_text(re_client(), body);

    Record::Call(call)
}

/// Rest of the line after the first marker, or `N/A` when missing or blank.
fn marker_text(re: &Regex, body: &str) -> String {
    re.captures(body)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .filter(|text| !text.is_empty())
        .unwrap_or(NOT_AVAILABLE)
        .to_string()
}
