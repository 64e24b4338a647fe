//! Ollama `/api/generate` client.

use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{LanguageModel, model_error};
use crate::config::ModelConfig;
use crate::error::Result;

/// Non-streaming client for a local Ollama server.
#[derive(Debug, Clone)]
pub struct Ollama {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl Ollama {
    /// Creates a client using the configured endpoint, model and timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self::with_client(client, &config.base_url, &config.model))
    }

    /// Creates a client around an existing [`reqwest::Client`].
    #[must_use]
    pub fn with_client(client: Client, base_url: &str, model: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
        }
    }

    /// Model name sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn request(&self, prompt: &str, format: Option<&Value>) -> Result<String> {
        let url = format!("{}/api/generate", self.base_url);
        let mut body = json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
        });
        if let Some(schema) = format {
            body["format"] = schema.clone();
        }

        tracing::debug!(
            model = %self.model,
            structured = format.is_some(),
            prompt_len = prompt.len(),
            "Sending generate request to Ollama"
        );

        let response = self.client.post(&url).json(&body).send().await?;
        if !response.status().is_success() {
            return Err(model_error(response).await);
        }

        let reply: GenerateResponse = response.json().await?;
        tracing::debug!(reply_len = reply.response.len(), "Ollama replied");
        Ok(reply.response)
    }
}

impl LanguageModel for Ollama {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.request(prompt, None).await
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<String> {
        self.request(prompt, Some(schema)).await
    }
}
