//! # mailscribe-core
//!
//! The mailscribe pipeline: fetch mail over IMAP, classify each message with
//! regex heuristics or a language model, and append the results to
//! per-subject text files.
//!
//! This crate provides:
//! - Configuration from the environment ([`Config`])
//! - The record types flowing through the pipeline ([`model`])
//! - A scoped IMAP fetch session ([`fetcher`])
//! - Heuristic and model-backed classifiers ([`classifier`])
//! - Ollama and Gemini backends ([`llm`])
//! - Tolerant JSON extraction from model replies ([`response`])
//! - The flat-file store ([`store`])
//! - Question answering over fetched mail ([`ask`])
//! - The end-to-end run with its report ([`pipeline`], [`report`])

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod ask;
pub mod classifier;
pub mod config;
mod error;
pub mod fetcher;
pub mod llm;
pub mod model;
pub mod pipeline;
pub mod report;
pub mod response;
pub mod store;

pub use classifier::{Classifier, HeuristicClassifier, ModelClassifier};
pub use config::{
    ClassifierKind, Config, FetchMode, MailConfig, ModelConfig, Provider, StoreConfig,
};
pub use error::{Error, Result};
pub use fetcher::{FetchBatch, fetch};
pub use llm::{Backend, Gemini, LanguageModel, Ollama};
pub use model::{CallRecord, Classified, MessageRecord, ProcessedEmail, Record, Tag};
pub use report::{RunReport, Skipped, Stage};
pub use response::extract_json;
pub use store::{Store, StoreReport};
