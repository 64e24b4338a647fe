//! Language-model backends.
//!
//! [`LanguageModel`] is the seam the classifier and the ask command program
//! against. [`Backend`] picks a concrete provider from [`ModelConfig`].

mod gemini;
mod ollama;

use std::future::Future;

pub use gemini::Gemini;
pub use ollama::Ollama;
use serde_json::Value;

use crate::config::{ModelConfig, Provider};
use crate::error::Result;

/// A text-in, text-out model.
pub trait LanguageModel: Send + Sync {
    /// Returns the model's free-form reply to `prompt`.
    fn generate(&self, prompt: &str) -> impl Future<Output = Result<String>> + Send;

    /// Returns a reply constrained to JSON matching `schema`.
    ///
    /// The schema is plain JSON Schema; backends translate it to their own
    /// dialect.
    fn generate_structured(
        &self,
        prompt: &str,
        schema: &Value,
    ) -> impl Future<Output = Result<String>> + Send;
}

/// The configured provider.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Local Ollama server.
    Ollama(Ollama),
    /// Google Gemini.
    Gemini(Gemini),
}

impl Backend {
    /// Builds the backend named by `config.provider`.
    ///
    /// # Errors
    ///
    /// Returns an error if Gemini is selected without an API key or the HTTP
    /// client cannot be built.
    pub fn from_config(config: &ModelConfig) -> Result<Self> {
        tracing::debug!(
            provider = ?config.provider,
            model = %config.model,
            structured = config.structured,
            "Creating model backend"
        );
        match config.provider {
            Provider::Ollama => Ok(Self::Ollama(Ollama::new(config)?)),
            Provider::Gemini => Ok(Self::Gemini(Gemini::new(config)?)),
        }
    }

    /// Model name sent with each request.
    #[must_use]
    pub fn model(&self) -> &str {
        match self {
            Self::Ollama(ollama) => ollama.model(),
            Self::Gemini(gemini) => gemini.model(),
        }
    }
}

impl LanguageModel for Backend {
    async fn generate(&self, prompt: &str) -> Result<String> {
        match self {
            Self::Ollama(ollama) => ollama.generate(prompt).await,
            Self::Gemini(gemini) => gemini.generate(prompt).await,
        }
    }

    async fn generate_structured(&self, prompt: &str, schema: &Value) -> Result<String> {
        match self {
            Self::Ollama(ollama) => ollama.generate_structured(prompt, schema).await,
            Self::Gemini(gemini) => gemini.generate_structured(prompt, schema).await,
        }
    }
}

/// Reads the error body of a failed reply, keeping the status.
async fn model_error(response: reqwest::Response) -> crate::Error {
    let status = response.status().as_u16();
    let message = response
        .text()
        .await
        .unwrap_or_else(|e| format!("<unreadable body: {e}>"));
    crate::Error::Model { status, message }
}

/// One-shot HTTP server for backend tests.
#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod test_server {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// A client that never routes through a proxy from the environment.
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    /// Serves one canned reply and returns the raw request it received.
    pub async fn serve_once(status: u16, body: &str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let body = body.to_string();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = socket.read(&mut chunk).await.unwrap();
                assert!(n > 0, "client closed before sending headers");
                request.extend_from_slice(&chunk[..n]);
                if let Some(pos) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&request[..header_end]).to_string();
            let content_length = head
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);

            while request.len() < header_end + content_length {
                let n = socket.read(&mut chunk).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&chunk[..n]);
            }

            let reply = format!(
                "HTTP/1.1 {status} Canned\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(reply.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;

            String::from_utf8_lossy(&request).to_string()
        });

        (format!("http://{addr}"), handle)
    }

    /// JSON body of a captured request.
    pub fn json_body(request: &str) -> serde_json::Value {
        let (_, body) = request.split_once("\r\n\r\n").unwrap();
        serde_json::from_str(body).unwrap()
    }
}
