//! Language-model extraction into [`ProcessedEmail`].

use serde_json::{Value, json};

use crate::error::{Error, Result};
use crate::llm::LanguageModel;
use crate::model::{Classified, MessageRecord, ProcessedEmail, Record, Tag};
use crate::response::extract_json;

const EMAIL_DATA: &str = "{email_data}";
const TAG_VOCABULARY: &str = "{tag_vocabulary}";

const PROMPT_TEMPLATE: &str = r#"You turn a raw email into a JSON summary.

Return exactly one JSON object with these keys:
- "to": recipients, as "Display Name <address>" where a name is known, otherwise the address
- "from": the sender, same format as "to"
- "cc": carbon-copy recipients in the same format, or null if there are none
- "bcc": blind carbon-copy recipients in the same format, or null if there are none
- "subject": the subject line, unchanged
- "body": the message text, unchanged, except that HTML is converted to plain text or markdown
- "tags": a list of zero or more labels taken only from this list: {tag_vocabulary}

Do not invent facts, do not summarize the body, and do not add keys.

Email:
{email_data}
"#;

/// Builds the extraction prompt for one message.
///
/// # Errors
///
/// Returns an error if the record cannot be serialized.
pub fn build_prompt(record: &MessageRecord) -> Result<String> {
    let email_data = serde_json::to_string_pretty(record)?;
    Ok(PROMPT_TEMPLATE
        .replace(TAG_VOCABULARY, &Tag::vocabulary())
        .replace(EMAIL_DATA, &email_data))
}

/// JSON Schema for a [`ProcessedEmail`], tags restricted to the vocabulary.
#[must_use]
pub fn processed_email_schema() -> Value {
    let tags: Vec<&str> = Tag::ALL.iter().map(|tag| tag.as_str()).collect();
    json!({
        "type": "object",
        "properties": {
            "to": { "type": "string" },
            "from": { "type": "string" },
            "cc": { "type": ["string", "null"] },
            "bcc": { "type": ["string", "null"] },
            "subject": { "type": "string" },
            "body": { "type": "string" },
            "tags": {
                "type": "array",
                "items": { "type": "string", "enum": tags }
            }
        },
        "required": ["to", "from", "cc", "bcc", "subject", "body", "tags"]
    })
}

/// Classifier that asks a language model for a [`ProcessedEmail`].
#[derive(Debug, Clone)]
pub struct ModelClassifier<M> {
    model: M,
    structured: bool,
}

impl<M: LanguageModel> ModelClassifier<M> {
    /// Wraps `model`; `structured` selects schema-constrained replies.
    pub const fn new(model: M, structured: bool) -> Self {
        Self { model, structured }
    }

    /// The wrapped model.
    pub const fn model(&self) -> &M {
        &self.model
    }

    /// Sends one message to the model and parses the reply.
    ///
    /// # Errors
    ///
    /// Returns a transport or model error from the backend, or
    /// [`Error::Parse`] if the reply is not the expected JSON.
    pub async fn classify(&self, record: &MessageRecord) -> Result<Classified> {
        let prompt = build_prompt(record)?;

        let email: ProcessedEmail = if self.structured {
            let reply = self
                .model
                .generate_structured(&prompt, &processed_email_schema())
                .await?;
            serde_json::from_str(reply.trim())
                .map_err(|e| Error::Parse(format!("structured reply does not match: {e}")))?
        } else {
            let reply = self.model.generate(&prompt).await?;
            let object = extract_json(&reply)
                .ok_or_else(|| Error::Parse("reply contains no JSON object".to_string()))?;
            serde_json::from_value(Value::Object(object))
                .map_err(|e| Error::Parse(format!("reply object has the wrong shape: {e}")))?
        };

        tracing::debug!(
            subject = email.subject.as_deref().unwrap_or_default(),
            tags = email.tags.len(),
            "Model classified message"
        );
        Ok(Record::Email(email))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    /// Model returning a fixed reply and recording what it was asked.
    struct Canned {
        reply: Option<String>,
        calls: Mutex<Vec<(String, bool)>>,
    }

    impl Canned {
        fn new(reply: &str) -> Self {
            Self {
                reply: Some(reply.to_string()),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                reply: None,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn answer(&self, prompt: &str, structured: bool) -> Result<String> {
            self.calls.lock().unwrap().push((prompt.to_string(), structured));
            self.reply.clone().ok_or_else(|| Error::Model {
                status: 503,
                message: "overloaded".to_string(),
            })
        }
    }

    impl LanguageModel for Canned {
        async fn generate(&self, prompt: &str) -> Result<String> {
            self.answer(prompt, false)
        }

        async fn generate_structured(&self, prompt: &str, _schema: &Value) -> Result<String> {
            self.answer(prompt, true)
        }
    }

    fn message() -> MessageRecord {
        MessageRecord {
            to: "me@example.com".to_string(),
            from: "Billing <billing@acme.test>".to_string(),
            cc: None,
            bcc: None,
            subject: "Invoice #981".to_string(),
            body: "<p>Your invoice is attached.</p>".to_string(),
        }
    }

    fn email(classified: Classified) -> ProcessedEmail {
        match classified {
            Record::Email(email) => email,
            Record::Call(_) => panic!("model classifier never produces calls"),
        }
    }

    #[test]
    fn test_prompt_embeds_message_and_vocabulary() {
        let prompt = build_prompt(&message()).unwrap();
        assert!(prompt.contains("\"subject\": \"Invoice #981\""));
        assert!(prompt.contains("\"cc\": \"N/A\""));
        assert!(prompt.contains("Meeting Invite/Calendar Invite"));
        assert!(!prompt.contains(EMAIL_DATA));
        assert!(!prompt.contains(TAG_VOCABULARY));
    }

    #[test]
    fn test_schema_enumerates_tags() {
        let schema = processed_email_schema();
        let tags = schema["properties"]["tags"]["items"]["enum"].as_array().unwrap();
        assert_eq!(tags.len(), Tag::ALL.len());
        assert_eq!(tags[0], "Invoice");
    }

    #[tokio::test]
    async fn test_free_text_reply() {
        let model = Canned::new(
            "```json\n{\"to\": \"me@example.com\", \"from\": \"Billing <billing@acme.test>\", \
             \"cc\": null, \"bcc\": null, \"subject\": \"Invoice #981\", \
             \"body\": \"Your invoice is attached.\", \"tags\": [\"Invoice\", \"Payments\"]}\n```",
        );
        let classifier = ModelClassifier::new(model, false);

        let email = email(classifier.classify(&message()).await.unwrap());
        assert_eq!(email.subject.as_deref(), Some("Invoice #981"));
        assert_eq!(email.body, "Your invoice is attached.");
        assert_eq!(email.tags, vec![Tag::Invoice, Tag::Payments]);

        let calls = classifier.model().calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert!(!calls[0].1);
    }

    #[tokio::test]
    async fn test_structured_reply() {
        let model = Canned::new(
            r#"{"to": "a", "from": "b", "cc": null, "bcc": null, "subject": "s", "body": "x", "tags": []}"#,
        );
        let classifier = ModelClassifier::new(model, true);

        let email = email(classifier.classify(&message()).await.unwrap());
        assert_eq!(email.from, "b");
        assert!(email.tags.is_empty());
        assert!(classifier.model().calls.lock().unwrap()[0].1);
    }

    #[tokio::test]
    async fn test_unparseable_reply_is_parse_error() {
        let classifier = ModelClassifier::new(Canned::new("I cannot help with that."), false);
        assert!(matches!(
            classifier.classify(&message()).await,
            Err(Error::Parse(_))
        ));

        let classifier = ModelClassifier::new(Canned::new("```json\n{\"tags\": 5}\n```"), false);
        assert!(matches!(
            classifier.classify(&message()).await,
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_structured_garbage_is_parse_error() {
        let classifier = ModelClassifier::new(Canned::new("not json"), true);
        assert!(matches!(
            classifier.classify(&message()).await,
            Err(Error::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_backend_error_propagates() {
        let classifier = ModelClassifier::new(Canned::failing(), false);
        assert!(matches!(
            classifier.classify(&message()).await,
            Err(Error::Model { status: 503, .. })
        ));
    }
}
