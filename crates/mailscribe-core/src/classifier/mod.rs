//! Message classification.
//!
//! Two strategies share one entry point:
//! - [`HeuristicClassifier`]: regex call detection, no external calls
//! - [`ModelClassifier`]: language-model extraction with tags

mod heuristic;
mod model;

pub use heuristic::{HeuristicClassifier, classify_message, is_call_subject};
pub use model::{ModelClassifier, build_prompt, processed_email_schema};

use crate::config::{ClassifierKind, Config};
use crate::error::Result;
use crate::llm::{Backend, LanguageModel};
use crate::model::{Classified, MessageRecord};

/// The classifier chosen by configuration.
#[derive(Debug, Clone)]
pub enum Classifier<M = Backend> {
    /// Regex heuristics.
    Heuristic(HeuristicClassifier),
    /// Language-model extraction.
    Model(ModelClassifier<M>),
}

impl Classifier {
    /// Builds the configured classifier, creating the model backend if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the model backend cannot be created.
    pub fn from_config(config: &Config) -> Result<Self> {
        match config.classifier {
            ClassifierKind::Heuristic => Ok(Self::Heuristic(HeuristicClassifier)),
            ClassifierKind::Model => {
                let backend = Backend::from_config(&config.model)?;
                Ok(Self::Model(ModelClassifier::new(
                    backend,
                    config.model.structured,
                )))
            }
        }
    }
}

impl<M: LanguageModel> Classifier<M> {
    /// Short name for logs.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Heuristic(_) => "heuristic",
            Self::Model(_) => "model",
        }
    }

    /// Classifies one message.
    ///
    /// # Errors
    ///
    /// The heuristic path never fails. The model path returns backend and
    /// parse errors.
    pub async fn classify(&self, record: &MessageRecord) -> Result<Classified> {
        match self {
            Self::Heuristic(heuristic) => Ok(heuristic.classify(record)),
            Self::Model(model) => model.classify(record).await,
        }
    }
}
