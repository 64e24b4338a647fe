//! Outcome of one pipeline run.

use std::fmt;

use chrono::{DateTime, Utc};

/// Pipeline stage at which a message was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Fetching or decoding.
    Fetch,
    /// Classification.
    Classify,
    /// Writing to disk.
    Store,
}

impl Stage {
    /// Lowercase name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Classify => "classify",
            Self::Store => "store",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message that did not make it to disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skipped {
    /// Position of the message in the mailbox search results, whichever
    /// stage dropped it.
    pub index: usize,
    /// Subject, when it was known.
    pub subject: Option<String>,
    /// Where it failed.
    pub stage: Stage,
    /// Error text.
    pub reason: String,
}

/// Counts and failures from one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// When the run began.
    pub started_at: DateTime<Utc>,
    /// When the run ended.
    pub finished_at: DateTime<Utc>,
    /// Messages fetched and decoded.
    pub fetched: usize,
    /// Email records written.
    pub emails_stored: usize,
    /// Call records written.
    pub calls_stored: usize,
    /// Messages dropped along the way.
    pub skipped: Vec<Skipped>,
    /// Why the fetch failed as a whole, if it did.
    pub fetch_failure: Option<String>,
}

impl RunReport {
    /// An empty report starting at `started_at`.
    #[must_use]
    pub const fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            fetched: 0,
            emails_stored: 0,
            calls_stored: 0,
            skipped: Vec::new(),
            fetch_failure: None,
        }
    }

    /// Records written in total.
    #[must_use]
    pub const fn stored(&self) -> usize {
        self.emails_stored + self.calls_stored
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let elapsed = self.finished_at - self.started_at;
        writeln!(
            f,
            "Run {} ({:.1}s)",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC"),
            elapsed.as_seconds_f64()
        )?;
        if let Some(failure) = &self.fetch_failure {
            writeln!(f, "  fetch failed: {failure}")?;
        }
        writeln!(f, "  fetched: {}", self.fetched)?;
        writeln!(
            f,
            "  stored:  {} ({} emails, {} calls)",
            self.stored(),
            self.emails_stored,
            self.calls_stored
        )?;
        write!(f, "  skipped: {}", self.skipped.len())?;
        for skipped in &self.skipped {
            write!(
                f,
                "\n    #{} [{}] {}: {}",
                skipped.index + 1,
                skipped.stage,
                skipped.subject.as_deref().unwrap_or("(no subject)"),
                skipped.reason
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    #[test]
    fn test_display() {
        let start = Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap();
        let mut report = RunReport::new(start);
        report.finished_at = start + Duration::milliseconds(2500);
        report.fetched = 3;
        report.emails_stored = 1;
        report.calls_stored = 1;
        report.skipped.push(Skipped {
            index: 2,
            subject: Some("Broken".to_string()),
            stage: Stage::Classify,
            reason: "Parse error: no JSON".to_string(),
        });

        let text = report.to_string();
        assert!(text.starts_with("Run 2025-03-01 09:00:00 UTC (2.5s)"));
        assert!(text.contains("stored:  2 (1 emails, 1 calls)"));
        assert!(text.contains("#3 [classify] Broken: Parse error: no JSON"));
    }

    #[test]
    fn test_fetch_failure_shown() {
        let mut report = RunReport::new(Utc::now());
        assert!(!report.to_string().contains("fetch failed"));
        report.fetch_failure = Some("Connection failed: refused".to_string());
        assert!(report.to_string().contains("fetch failed: Connection failed: refused"));
    }
}
