//! Process configuration.
//!
//! Everything is read once at start-up from environment variables (after an
//! optional `.env` file) and then passed down by reference.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Default Ollama endpoint.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Gemini REST endpoint.
pub const GEMINI_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model for Ollama.
pub const DEFAULT_OLLAMA_MODEL: &str = "gemma3";

/// Default model for Gemini.
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.0-flash";

/// Which messages a fetch reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Every message; the seen flag is cleared again after reading.
    All,
    /// Unread messages only.
    #[default]
    Unseen,
}

impl FetchMode {
    /// Configuration string representation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Unseen => "unseen",
        }
    }
}

impl FromStr for FetchMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(Self::All),
            "unseen" | "unread" => Ok(Self::Unseen),
            other => Err(Error::Config(format!(
                "FETCH_MODE must be `all` or `unseen`, got `{other}`"
            ))),
        }
    }
}

/// Which classifier the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierKind {
    /// Regex heuristics, no external calls.
    Heuristic,
    /// Language-model extraction.
    #[default]
    Model,
}

impl FromStr for ClassifierKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "heuristic" | "regex" => Ok(Self::Heuristic),
            "model" | "llm" => Ok(Self::Model),
            other => Err(Error::Config(format!(
                "CLASSIFIER must be `heuristic` or `model`, got `{other}`"
            ))),
        }
    }
}

/// Language-model provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    /// Local Ollama server.
    #[default]
    Ollama,
    /// Google Gemini API.
    Gemini,
}

impl Provider {
    /// Model used when `MODEL_NAME` is not set.
    #[must_use]
    pub const fn default_model(self) -> &'static str {
        match self {
            Self::Ollama => DEFAULT_OLLAMA_MODEL,
            Self::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }

    /// Whether schema-constrained output is on unless configured otherwise.
    #[must_use]
    pub const fn structured_by_default(self) -> bool {
        matches!(self, Self::Gemini)
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(Self::Ollama),
            "gemini" | "google" => Ok(Self::Gemini),
            other => Err(Error::Config(format!(
                "LLM_PROVIDER must be `ollama` or `gemini`, got `{other}`"
            ))),
        }
    }
}

/// IMAP account settings.
#[derive(Clone)]
pub struct MailConfig {
    /// Server hostname.
    pub host: String,
    /// Server port (implicit TLS).
    pub port: u16,
    /// Login name.
    pub username: String,
    /// Login password.
    pub password: String,
    /// Mailbox to read.
    pub mailbox: String,
    /// Bound on connect plus TLS handshake.
    pub connect_timeout: Duration,
    /// Bound on each IMAP command.
    pub io_timeout: Duration,
}

impl MailConfig {
    /// Creates settings with the default port, mailbox and timeouts.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            host: host.into(),
            port: mailscribe_imap::connection::DEFAULT_PORT,
            username: username.into(),
            password: password.into(),
            mailbox: "INBOX".to_string(),
            connect_timeout: Duration::from_secs(30),
            io_timeout: Duration::from_secs(60),
        }
    }
}

impl fmt::Debug for MailConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("mailbox", &self.mailbox)
            .field("connect_timeout", &self.connect_timeout)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

/// Language-model settings.
#[derive(Clone)]
pub struct ModelConfig {
    /// Backend provider.
    pub provider: Provider,
    /// Model name.
    pub model: String,
    /// API key (Gemini).
    pub api_key: Option<String>,
    /// Endpoint base URL.
    pub base_url: String,
    /// Ask the backend for schema-constrained JSON.
    pub structured: bool,
    /// Bound on one model call.
    pub timeout: Duration,
}

impl ModelConfig {
    /// Settings for a local Ollama model with provider defaults.
    #[must_use]
    pub fn ollama() -> Self {
        Self {
            provider: Provider::Ollama,
            model: Provider::Ollama.default_model().to_string(),
            api_key: None,
            base_url: DEFAULT_OLLAMA_URL.to_string(),
            structured: false,
            timeout: Duration::from_secs(300),
        }
    }

    /// Settings for Gemini with provider defaults.
    #[must_use]
    pub fn gemini(api_key: impl Into<String>) -> Self {
        Self {
            provider: Provider::Gemini,
            model: Provider::Gemini.default_model().to_string(),
            api_key: Some(api_key.into()),
            base_url: GEMINI_URL.to_string(),
            structured: true,
            timeout: Duration::from_secs(120),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("provider", &self.provider)
            .field("model", &self.model)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("structured", &self.structured)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Directory receiving the per-subject files.
    pub output_dir: PathBuf,
    /// Strip `Re:`/`Fwd:` prefixes so a thread shares one file.
    pub thread_normalize: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("parsed_emails"),
            thread_normalize: true,
        }
    }
}

/// Full process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// IMAP account.
    pub mail: MailConfig,
    /// Which messages to read.
    pub fetch_mode: FetchMode,
    /// Which classifier to run.
    pub classifier: ClassifierKind,
    /// Model backend.
    pub model: ModelConfig,
    /// Output location.
    pub store: StoreConfig,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value is invalid.
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or a
    /// value is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| get(key).ok_or_else(|| Error::Config(format!("{key} is not set")));

        let mut mail = MailConfig::new(
            required("IMAP_HOST")?,
            required("EMAIL_USER")?,
            required("EMAIL_PASSWORD")?,
        );
        if let Some(port) = get("IMAP_PORT") {
            mail.port = port
                .trim()
                .parse()
                .map_err(|_| Error::Config(format!("IMAP_PORT must be a port number, got `{port}`")))?;
        }
        if let Some(mailbox) = get("IMAP_MAILBOX") {
            mail.mailbox = mailbox;
        }

        let fetch_mode = get("FETCH_MODE").map_or(Ok(FetchMode::default()), |v| v.parse())?;
        let classifier = get("CLASSIFIER").map_or(Ok(ClassifierKind::default()), |v| v.parse())?;
        let provider = get("LLM_PROVIDER").map_or(Ok(Provider::default()), |v| v.parse())?;

        let mut model = match provider {
            Provider::Ollama => {
                let mut model = ModelConfig::ollama();
                if let Some(url) = get("OLLAMA_HOST") {
                    model.base_url = url;
                }
                model
            }
            Provider::Gemini => ModelConfig::gemini(required("GEMINI_API_KEY")?),
        };
        if let Some(name) = get("MODEL_NAME") {
            model.model = name;
        }
        model.structured = get("STRUCTURED_OUTPUT")
            .map_or(Ok(provider.structured_by_default()), |v| {
                parse_bool("STRUCTURED_OUTPUT", &v)
            })?;

        let mut store = StoreConfig::default();
        if let Some(dir) = get("OUTPUT_DIR") {
            store.output_dir = PathBuf::from(dir);
        }
        if let Some(flag) = get("THREAD_NORMALIZE") {
            store.thread_normalize = parse_bool("THREAD_NORMALIZE", &flag)?;
        }

        Ok(Self {
            mail,
            fetch_mode,
            classifier,
            model,
            store,
        })
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::Config(format!("{key} must be true or false, got `{other}`"))),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const BASE: [(&str, &str); 3] = [
        ("IMAP_HOST", "imap.example.com"),
        ("EMAIL_USER", "me@example.com"),
        ("EMAIL_PASSWORD", "hunter2"),
    ];

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup(&BASE)).unwrap();

        assert_eq!(config.mail.port, 993);
        assert_eq!(config.mail.mailbox, "INBOX");
        assert_eq!(config.fetch_mode, FetchMode::Unseen);
        assert_eq!(config.classifier, ClassifierKind::Model);
        assert_eq!(config.model.provider, Provider::Ollama);
        assert_eq!(config.model.model, "gemma3");
        assert_eq!(config.model.base_url, DEFAULT_OLLAMA_URL);
        assert!(!config.model.structured);
        assert_eq!(config.store.output_dir, PathBuf::from("parsed_emails"));
        assert!(config.store.thread_normalize);
    }

    #[test]
    fn test_missing_required() {
        let err = Config::from_lookup(lookup(&BASE[..2])).unwrap_err();
        assert!(err.to_string().contains("EMAIL_PASSWORD"));
    }

    #[test]
    fn test_non_numeric_port_rejected() {
        let mut pairs = BASE.to_vec();
        pairs.push(("IMAP_PORT", "imaps"));
        assert!(matches!(
            Config::from_lookup(lookup(&pairs)),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_gemini_requires_key() {
        let mut pairs = BASE.to_vec();
        pairs.push(("LLM_PROVIDER", "gemini"));
        assert!(Config::from_lookup(lookup(&pairs)).is_err());

        pairs.push(("GEMINI_API_KEY", "key"));
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        assert_eq!(config.model.model, "gemini-2.0-flash");
        assert!(config.model.structured);
    }

    #[test]
    fn test_overrides() {
        let mut pairs = BASE.to_vec();
        pairs.extend([
            ("IMAP_PORT", "1993"),
            ("IMAP_MAILBOX", "Archive"),
            ("FETCH_MODE", "ALL"),
            ("CLASSIFIER", "heuristic"),
            ("MODEL_NAME", "llama3.2"),
            ("OLLAMA_HOST", "http://gpu-box:11434"),
            ("STRUCTURED_OUTPUT", "yes"),
            ("OUTPUT_DIR", "/tmp/out"),
            ("THREAD_NORMALIZE", "false"),
        ]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();

        assert_eq!(config.mail.port, 1993);
        assert_eq!(config.mail.mailbox, "Archive");
        assert_eq!(config.fetch_mode, FetchMode::All);
        assert_eq!(config.classifier, ClassifierKind::Heuristic);
        assert_eq!(config.model.model, "llama3.2");
        assert_eq!(config.model.base_url, "http://gpu-box:11434");
        assert!(config.model.structured);
        assert_eq!(config.store.output_dir, PathBuf::from("/tmp/out"));
        assert!(!config.store.thread_normalize);
    }

    #[test]
    fn test_invalid_enum_values() {
        for (key, value) in [
            ("FETCH_MODE", "recent"),
            ("CLASSIFIER", "magic"),
            ("LLM_PROVIDER", "openai"),
            ("THREAD_NORMALIZE", "maybe"),
        ] {
            let mut pairs = BASE.to_vec();
            pairs.push((key, value));
            assert!(
                matches!(Config::from_lookup(lookup(&pairs)), Err(Error::Config(_))),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut pairs = BASE.to_vec();
        pairs.extend([("LLM_PROVIDER", "gemini"), ("GEMINI_API_KEY", "sk-secret")]);
        let config = Config::from_lookup(lookup(&pairs)).unwrap();
        let debug = format!("{config:?}");

        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("sk-secret"));
    }
}
