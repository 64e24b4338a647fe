//! `mailscribe-ask` - answer a question about unread mail.
//!
//! Reads the question from stdin, fetches unread messages, and prints the
//! model's answer.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::io::{self, BufRead, Write};

use anyhow::{Context, bail};
use mailscribe_core::{Backend, Config, FetchMode, ask, fetch};
use tracing::warn;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailscribe=info,mailscribe_core=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    let backend = Backend::from_config(&config.model).context("could not create model backend")?;

    print!("Ask question: ");
    io::stdout().flush()?;
    let mut question = String::new();
    io::stdin().lock().read_line(&mut question)?;
    if question.trim().is_empty() {
        bail!("no question given");
    }

    let batch = fetch(&config.mail, FetchMode::Unseen).await;
    if let Some(failure) = &batch.failure {
        warn!("Answering without mail: {failure}");
    }

    let answer = ask::ask(&backend, &batch.records, &question)
        .await
        .context("model call failed")?;
    println!("{answer}");
    Ok(())
}
