//! Records flowing through the pipeline.
//!
//! The fetcher produces [`MessageRecord`]s. A classifier turns each one into
//! a [`Record`]: either a [`ProcessedEmail`] or, for meeting-like messages on
//! the heuristic path, a [`CallRecord`]. The store persists records.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Placeholder written for absent values.
pub const NOT_AVAILABLE: &str = "N/A";

/// One fetched message with decoded headers and body text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MessageRecord {
    /// Decoded `To` header.
    pub to: String,
    /// Decoded `From` header.
    pub from: String,
    /// Decoded `Cc` header.
    #[serde(serialize_with = "or_not_available")]
    pub cc: Option<String>,
    /// Decoded `Bcc` header.
    #[serde(serialize_with = "or_not_available")]
    pub bcc: Option<String>,
    /// Decoded `Subject` header.
    pub subject: String,
    /// First inline text part.
    pub body: String,
}

fn or_not_available<S: Serializer>(value: &Option<String>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(value.as_deref().unwrap_or(NOT_AVAILABLE))
}

/// Details extracted from a meeting or call message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CallRecord {
    /// Subject of the originating message.
    pub subject: String,
    /// Sender of the originating message.
    pub from: String,
    /// Every email address found in the body, in order.
    pub attendees: Vec<String>,
    /// Text after a `client:` marker.
    pub client_name: String,
    /// First `H:MM` time, with AM/PM when present.
    pub call_time: String,
    /// Text after an `agenda:` marker.
    pub agenda: String,
    /// First URL in the body.
    pub meet_url: String,
}

impl CallRecord {
    /// Creates a record with every extracted field set to `N/A`.
    #[must_use]
    pub fn new(subject: impl Into<String>, from: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            from: from.into(),
            attendees: vec![NOT_AVAILABLE.to_string()],
            client_name: NOT_AVAILABLE.to_string(),
            call_time: NOT_AVAILABLE.to_string(),
            agenda: NOT_AVAILABLE.to_string(),
            meet_url: NOT_AVAILABLE.to_string(),
        }
    }
}

/// Closed vocabulary of content tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tag {
    /// Invoice.
    Invoice,
    /// Order Confirmation.
    OrderConfirmation,
    /// Payments.
    Payments,
    /// Meeting Invite/Calendar Invite.
    MeetingInvite,
    /// Meeting Update.
    MeetingUpdate,
    /// Newsletter.
    Newsletter,
    /// Promotional / Marketing / Advertisement.
    Promotional,
    /// Support Ticket Confirmation.
    SupportTicketConfirmation,
    /// Support Ticket Update.
    SupportTicketUpdate,
    /// Banking.
    Banking,
    /// Travel.
    Travel,
    /// Health/Medical.
    Health,
    /// Event/Registration.
    Event,
    /// Approval Request.
    ApprovalRequest,
    /// Approval Confirmation.
    ApprovalConfirmation,
    /// Urgent/High priority.
    Urgent,
    /// For review.
    ForReview,
    /// Project Update.
    ProjectUpdate,
    /// Internal Announcement.
    InternalAnnouncement,
    /// Report.
    Report,
    /// Expense Report.
    ExpenseReport,
    /// IT Notification.
    ItNotification,
    /// HR.
    Hr,
}

impl Tag {
    /// Every tag, in vocabulary order.
    pub const ALL: [Self; 23] = [
        Self::Invoice,
        Self::OrderConfirmation,
        Self::Payments,
        Self::MeetingInvite,
        Self::MeetingUpdate,
        Self::Newsletter,
        Self::Promotional,
        Self::SupportTicketConfirmation,
        Self::SupportTicketUpdate,
        Self::Banking,
        Self::Travel,
        Self::Health,
        Self::Event,
        Self::ApprovalRequest,
        Self::ApprovalConfirmation,
        Self::Urgent,
        Self::ForReview,
        Self::ProjectUpdate,
        Self::InternalAnnouncement,
        Self::Report,
        Self::ExpenseReport,
        Self::ItNotification,
        Self::Hr,
    ];

    /// Label as shown to the model and written to disk.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Invoice => "Invoice",
            Self::OrderConfirmation => "Order Confirmation",
            Self::Payments => "Payments",
            Self::MeetingInvite => "Meeting Invite/Calendar Invite",
            Self::MeetingUpdate => "Meeting Update",
            Self::Newsletter => "Newsletter",
            Self::Promotional => "Promotional / Marketing / Advertisement",
            Self::SupportTicketConfirmation => "Support Ticket Confirmation",
            Self::SupportTicketUpdate => "Support Ticket Update",
            Self::Banking => "Banking",
            Self::Travel => "Travel",
            Self::Health => "Health/Medical",
            Self::Event => "Event/Registration",
            Self::ApprovalRequest => "Approval Request",
            Self::ApprovalConfirmation => "Approval Confirmation",
            Self::Urgent => "Urgent/High priority",
            Self::ForReview => "For review",
            Self::ProjectUpdate => "Project Update",
            Self::InternalAnnouncement => "Internal Announcement",
            Self::Report => "Report",
            Self::ExpenseReport => "Expense Report",
            Self::ItNotification => "IT Notification",
            Self::Hr => "HR",
        }
    }

    /// Matches a label case-insensitively, ignoring surrounding whitespace
    /// and quotes.
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        let label = label.trim().trim_matches(|c| c == '"' || c == '\'').trim();
        if label.eq_ignore_ascii_case("Internal Anouncement") {
            return Some(Self::InternalAnnouncement);
        }
        Self::ALL
            .into_iter()
            .find(|tag| tag.as_str().eq_ignore_ascii_case(label))
    }

    /// The vocabulary as one comma-separated line.
    #[must_use]
    pub fn vocabulary() -> String {
        Self::ALL.map(Self::as_str).join(", ")
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Tag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A message as summarized by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedEmail {
    /// Recipients.
    #[serde(default, deserialize_with = "string_or_null")]
    pub to: String,
    /// Sender.
    #[serde(default, deserialize_with = "string_or_null")]
    pub from: String,
    /// Carbon-copy recipients.
    #[serde(default)]
    pub cc: Option<String>,
    /// Blind carbon-copy recipients.
    #[serde(default)]
    pub bcc: Option<String>,
    /// Subject line.
    #[serde(default)]
    pub subject: Option<String>,
    /// Body text, HTML converted to plain text.
    #[serde(default, deserialize_with = "string_or_null")]
    pub body: String,
    /// Tags from the closed vocabulary.
    #[serde(default, deserialize_with = "deserialize_tags")]
    pub tags: Vec<Tag>,
}

impl ProcessedEmail {
    /// Carries a fetched message over unchanged, with no tags.
    #[must_use]
    pub fn from_message(record: &MessageRecord) -> Self {
        Self {
            to: record.to.clone(),
            from: record.from.clone(),
            cc: record.cc.clone(),
            bcc: record.bcc.clone(),
            subject: Some(record.subject.clone()),
            body: record.body.clone(),
            tags: Vec::new(),
        }
    }
}

fn string_or_null<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Tags arrive as a JSON list or as one comma-separated string.
#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    List(Vec<String>),
    Joined(String),
}

fn deserialize_tags<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Tag>, D::Error> {
    let labels = match Option::<TagList>::deserialize(deserializer)? {
        Some(TagList::List(labels)) => labels,
        Some(TagList::Joined(joined)) => joined.split(',').map(str::to_string).collect(),
        None => Vec::new(),
    };

    let mut tags = Vec::new();
    for label in &labels {
        match Tag::parse(label) {
            Some(tag) if !tags.contains(&tag) => tags.push(tag),
            Some(_) => {}
            None if label.trim().is_empty() => {}
            None => tracing::debug!(label = %label, "dropping tag outside the vocabulary"),
        }
    }
    Ok(tags)
}

/// What a classifier produces and the store persists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A regular message.
    Email(ProcessedEmail),
    /// A meeting or call.
    Call(CallRecord),
}

/// Classifier output; identical to what the store accepts.
pub type Classified = Record;

impl Record {
    /// Subject used to name the output file.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        match self {
            Self::Email(email) => email.subject.as_deref(),
            Self::Call(call) => Some(call.subject.as_str()),
        }
    }

    /// True for call records.
    #[must_use]
    pub const fn is_call(&self) -> bool {
        matches!(self, Self::Call(_))
    }
}
