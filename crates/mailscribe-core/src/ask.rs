//! Free-form questions about fetched mail.

use crate::error::Result;
use crate::llm::LanguageModel;
use crate::model::MessageRecord;

/// Stand-in for the message list when there is nothing to show.
pub const NO_EMAILS: &str = "No new emails found.";

/// Renders messages as `From`/`Subject`/`Body` blocks separated by blank lines.
#[must_use]
pub fn format_messages(records: &[MessageRecord]) -> String {
    if records.is_empty() {
        return NO_EMAILS.to_string();
    }
    records
        .iter()
        .map(|r| format!("From: {}\nSubject: {}\nBody: {}", r.from, r.subject, r.body))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the question prompt.
///
/// Both values are inserted in one pass, so text in the question is never
/// read as a placeholder.
#[must_use]
pub fn build_prompt(records: &[MessageRecord], question: &str) -> String {
    format!(
        "You answer questions about a set of emails.
Read the emails below and answer the question. Format the answer for easy reading.

Question: {question}

Emails:
{emails}
",
        question = question.trim(),
        emails = format_messages(records),
    )
}

/// Asks `model` a question about `records` and returns its answer.
///
/// # Errors
///
/// Returns the backend's error if the model call fails.
pub async fn ask<M: LanguageModel>(
    model: &M,
    records: &[MessageRecord],
    question: &str,
) -> Result<String> {
    tracing::info!(messages = records.len(), "Asking model about fetched mail");
    let answer = model.generate(&build_prompt(records, question)).await?;
    Ok(answer.trim().to_string())
}
