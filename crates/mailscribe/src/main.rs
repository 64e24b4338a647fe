//! `mailscribe` - fetch mail, classify each message, append it to a
//! per-subject text file.
//!
//! Configuration comes from the environment (and `.env`). The run report is
//! printed to stdout; logs go to stderr and follow `RUST_LOG`.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

use std::process::ExitCode;

use anyhow::Context;
use mailscribe_core::{Config, pipeline};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailscribe=info,mailscribe_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::from_env().context("invalid configuration")?;
    info!(
        host = %config.mail.host,
        mailbox = %config.mail.mailbox,
        provider = ?config.model.provider,
        "Starting mailscribe"
    );

    let report = pipeline::run(&config)
        .await
        .context("could not start the pipeline")?;
    println!("{report}");

    Ok(if report.fetch_failure.is_some() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
