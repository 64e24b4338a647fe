//! Gemini `generateContent` client.

use std::fmt;

use reqwest::Client;
use serde_json::{Map, Value, json};

use super::{LanguageModel, model_error};
use crate::config::ModelConfig;
use crate::error::{Error, Result};

/// Client for the Gemini REST API.
#[derive(Clone)]
pub struct Gemini {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
}

impl fmt::Debug for Gemini {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gemini")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("api_key", &"[REDACTED]")
            .finish_non_exhaustive()
    }
}

impl Gemini {
    /// Creates a client using the configured key, model and timeout.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] without an API key, or an HTTP error if the
    /// client cannot be built.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::Config("GEMINI_API_KEY is not set".to_string()))?;
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, &config.base_url, &config.model, api_key))
    }

    /// Creates a client around an existing [`reqwest::Client`].
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, model: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Model name sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, prompt: &str, schema: Option<&Value>) -> Result<String> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );
        let mut body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });
        if let Some(schema) = schema {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": gemini_schema(schema),
            });
        }

        tracing::debug!(
            model = %self.model,
            structured = schema.is_some(),
            prompt_len = prompt.len(),
            "Sending generateContent request to Gemini"
        );

        // Key goes in a header so it never shows up in a logged URL.
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(model_error(response).await);
        }

        let reply: Value = response.json().await?;
        reply
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::Model {
                status: status.as_u16(),
                message: "reply has no candidate text".to_string(),
            })
    }
}

impl LanguageModel for Gemini {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.request(prompt, None).await
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<String> {
        self.request(prompt, Some(schema)).await
    }
}

/// Translates JSON Schema to Gemini's OpenAPI subset.
///
/// Type names are uppercased, `["string", "null"]` becomes a nullable
/// `STRING`, and keywords Gemini rejects are dropped.
fn gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(object) => {
            let mut out = Map::new();
            for (key, value) in object {
                match (key.as_str(), value) {
                    ("additionalProperties" | "$schema" | "title", _) => {}
                    ("type", Value::String(name)) => {
                        out.insert(key.clone(), Value::String(name.to_uppercase()));
                    }
                    ("type", Value::Array(names)) => {
                        let mut nullable = false;
                        for name in names.iter().filter_map(Value::as_str) {
                            if name == "null" {
                                nullable = true;
                            } else {
                                out.insert(key.clone(), Value::String(name.to_uppercase()));
                            }
                        }
                        if nullable {
                            out.insert("nullable".to_string(), Value::Bool(true));
                        }
                    }
                    _ => {
                        out.insert(key.clone(), gemini_schema(value));
                    }
                }
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(gemini_schema).collect()),
        other => other.clone(),
    }
}
