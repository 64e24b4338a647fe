//! End-to-end run: fetch, classify, store.

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::classifier::Classifier;
use crate::config::Config;
use crate::error::Result;
use crate::fetcher::{self, FetchBatch};
use crate::llm::LanguageModel;
use crate::report::{RunReport, Skipped, Stage};
use crate::store::Store;

/// Runs the whole pipeline once.
///
/// # Errors
///
/// Fails only if the classifier cannot be built. Fetch, classification and
/// store failures are recorded in the report instead.
pub async fn run(config: &Config) -> Result<RunReport> {
    let started_at = Utc::now();
    let classifier = Classifier::from_config(config)?;
    let store = Store::new(&config.store);

    info!(
        classifier = classifier.name(),
        mode = config.fetch_mode.as_str(),
        output = %store.output_dir().display(),
        "Starting run"
    );

    let batch = fetcher::fetch(&config.mail, config.fetch_mode).await;
    Ok(process(&batch, &classifier, &store, started_at).await)
}

/// Classifies and stores a fetched batch, one message at a time.
///
/// A message that fails to classify or store is recorded as skipped and the
/// rest of the batch continues.
pub async fn process<M: LanguageModel>(
    batch: &FetchBatch,
    classifier: &Classifier<M>,
    store: &Store,
    started_at: DateTime<Utc>,
) -> RunReport {
    let mut report = RunReport::new(started_at);
    report.fetched = batch.records.len();
    report.fetch_failure.clone_from(&batch.failure);
    report.skipped.clone_from(&batch.skipped);

    for (index, record) in batch.positioned() {
        let classified = match classifier.classify(record).await {
            Ok(classified) => classified,
            Err(e) => {
                warn!(index, subject = %record.subject, error = %e, "Classification failed, skipping message");
                report.skipped.push(Skipped {
                    index,
                    subject: Some(record.subject.clone()),
                    stage: Stage::Classify,
                    reason: e.to_string(),
                });
                continue;
            }
        };

        match store.persist_at(index, &classified) {
            Ok(_) if classified.is_call() => report.calls_stored += 1,
            Ok(_) => report.emails_stored += 1,
            Err(e) => {
                warn!(index, error = %e, "Store failed, skipping message");
                report.skipped.push(Skipped {
                    index,
                    subject: classified.subject().map(str::to_string),
                    stage: Stage::Store,
                    reason: e.to_string(),
                });
            }
        }
    }

    report.finished_at = Utc::now();
    info!(
        fetched = report.fetched,
        emails = report.emails_stored,
        calls = report.calls_stored,
        skipped = report.skipped.len(),
        fetch_failed = report.fetch_failure.is_some(),
        "Run finished"
    );
    report
}
