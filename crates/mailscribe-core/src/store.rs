//! Flat-file record store.
//!
//! Each record is appended as a fixed-layout text block to
//! `<output_dir>/<stem>.txt`, where the stem is the sanitized subject.
//! Replies and forwards share a file when thread normalization is on.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::config::StoreConfig;
use crate::error::{Error, Result};
use crate::model::{CallRecord, NOT_AVAILABLE, ProcessedEmail, Record};

/// Separator written after every record.
const RULE_WIDTH: usize = 80;

/// Characters that may not appear in a file name.
const ILLEGAL: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*', '\r', '\n'];

/// Reply and forward markers stripped by thread normalization.
const THREAD_PREFIXES: [&str; 3] = ["re:", "fwd:", "fw:"];

/// Longest stem kept, in bytes, leaving room for the extension.
const MAX_STEM_BYTES: usize = 200;

/// Outcome of [`Store::persist`].
#[derive(Debug, Default)]
pub struct StoreReport {
    /// Files written to, in record order.
    pub stored: Vec<PathBuf>,
    /// Records that were not written, by batch index.
    pub failures: Vec<(usize, Error)>,
}

/// Appends records to per-subject text files.
#[derive(Debug, Clone)]
pub struct Store {
    output_dir: PathBuf,
    thread_normalize: bool,
}

impl Store {
    /// Creates a store writing under `config.output_dir`.
    #[must_use]
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            output_dir: config.output_dir.clone(),
            thread_normalize: config.thread_normalize,
        }
    }

    /// Directory receiving the files.
    #[must_use]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Writes every record, continuing past failures.
    pub fn persist(&self, records: &[Record]) -> StoreReport {
        let mut report = StoreReport::default();
        for (index, record) in records.iter().enumerate() {
            match self.persist_at(index, record) {
                Ok(path) => report.stored.push(path),
                Err(e) => {
                    tracing::warn!(index, error = %e, "Skipping record");
                    report.failures.push((index, e));
                }
            }
        }
        report
    }

    /// Writes a single record.
    ///
    /// # Errors
    ///
    /// See [`Store::persist_at`].
    pub fn persist_one(&self, record: &Record) -> Result<PathBuf> {
        self.persist_at(0, record)
    }

    /// Writes the record at position `index` of a batch.
    ///
    /// The index only matters for records without a subject, which are
    /// filed as `No_Subject_<index + 1>`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for an email with no sender, recipient
    /// or body, and [`Error::Filesystem`] if the file cannot be written.
    pub fn persist_at(&self, index: usize, record: &Record) -> Result<PathBuf> {
        validate(record)?;

        let stem = file_stem(record.subject(), index, self.thread_normalize);
        let path = self.output_dir.join(format!("{stem}.txt"));
        let block = render(record);

        fs::create_dir_all(&self.output_dir).map_err(|source| Error::Filesystem {
            path: self.output_dir.clone(),
            source,
        })?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| Error::Filesystem {
                path: path.clone(),
                source,
            })?;
        file.write_all(block.as_bytes())
            .map_err(|source| Error::Filesystem {
                path: path.clone(),
                source,
            })?;

        tracing::info!(path = %path.display(), "Stored record");
        Ok(path)
    }
}

/// An email is unusable only when it has no sender, no recipient and no
/// body. A missing address alone is rendered as `N/A`.
fn validate(record: &Record) -> Result<()> {
    match record {
        Record::Email(email)
            if [&email.from, &email.to, &email.body]
                .iter()
                .all(|field| field.trim().is_empty()) =>
        {
            Err(Error::Validation(
                "email has no sender, recipient or body".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

fn or_not_available(value: &str) -> &str {
    if value.trim().is_empty() {
        NOT_AVAILABLE
    } else {
        value
    }
}

/// File stem for a record: normalized, sanitized subject or a numbered
/// fallback.
#[must_use]
pub fn file_stem(subject: Option<&str>, index: usize, thread_normalize: bool) -> String {
    let subject = subject.unwrap_or_default();
    let subject = if thread_normalize {
        normalize_thread(subject)
    } else {
        subject
    };

    let stem = sanitize(subject);
    if stem.is_empty() {
        format!("No_Subject_{}", index + 1)
    } else {
        stem
    }
}

/// Strips leading `Re:`, `Fwd:` and `FW:` markers, case-insensitively.
#[must_use]
pub fn normalize_thread(subject: &str) -> &str {
    let mut rest = subject.trim_start();
    'strip: loop {
        for prefix in THREAD_PREFIXES {
            let matches = rest
                .get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix));
            if matches {
                rest = rest[prefix.len()..].trim_start();
                continue 'strip;
            }
        }
        return rest;
    }
}

/// Replaces characters that are illegal in file names with `_` and trims.
///
/// Idempotent.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if ILLEGAL.contains(&c) { '_' } else { c })
        .collect();
    let trimmed = replaced.trim();

    let mut end = trimmed.len().min(MAX_STEM_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].trim_end().to_string()
}

fn render(record: &Record) -> String {
    match record {
        Record::Email(email) => render_email(email),
        Record::Call(call) => render_call(call),
    }
}

fn render_email(email: &ProcessedEmail) -> String {
    let tags: Vec<&str> = email.tags.iter().map(|tag| tag.as_str()).collect();
    let body = email.body.replace(['\r', '\n'], " ");
    format!(
        "To: {}\nFrom: {}\nCC: {}\nBCC: {}\nSubject: {}\nTags: {}\nBody:\n{}\n{}\n",
        or_not_available(&email.to),
        or_not_available(&email.from),
        email.cc.as_deref().map_or(NOT_AVAILABLE, or_not_available),
        email.bcc.as_deref().map_or(NOT_AVAILABLE, or_not_available),
        email.subject.as_deref().unwrap_or_default(),
        tags.join(", "),
        body,
        "-".repeat(RULE_WIDTH),
    )
}

fn render_call(call: &CallRecord) -> String {
    format!(
        "Subject: {}\nFrom: {}\nAttendees: {}\nClient: {}\nCall Time: {}\nAgenda: {}\nMeet URL: {}\n{}\n",
        call.subject,
        call.from,
        call.attendees.join(", "),
        call.client_name,
        call.call_time,
        call.agenda,
        call.meet_url,
        "-".repeat(RULE_WIDTH),
    )
}
