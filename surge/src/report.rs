use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::PathBuf;

use crate::error::ReportError;

/// The final record of a benchmark run.
///
/// A `BenchResult` is produced once by [`crate::Benchmark::run`], fully
/// populated, and never modified afterwards. It is plain data: turning it into
/// bytes and sending them somewhere is the job of a [`Reporter`].
///
/// `pass` is `true` only when the run reached its deadline without a fatal
/// error; in every other case `score` is `0` and `message` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchResult {
    pub job_id: String,
    pub ip_addrs: String,
    pub pass: bool,
    pub score: i64,
    pub message: String,
    pub errors: Vec<String>,
    pub logs: Vec<String>,
    pub load_level: i64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl BenchResult {
    /// A failed result with a zero score.
    pub(crate) fn failed(
        start_time: DateTime<Utc>,
        message: impl Into<String>,
        errors: Vec<String>,
    ) -> Self {
        Self {
            job_id: String::new(),
            ip_addrs: String::new(),
            pass: false,
            score: 0,
            message: message.into(),
            errors,
            logs: Vec::new(),
            load_level: 0,
            start_time,
            end_time: Utc::now(),
        }
    }

    /// Attach the job metadata the caller knows about.
    pub fn with_job(mut self, job_id: impl Into<String>, ip_addrs: impl Into<String>) -> Self {
        self.job_id = job_id.into();
        self.ip_addrs = ip_addrs.into();
        self
    }

    pub fn to_json(&self) -> Result<String, ReportError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// A [`Reporter`] sends a [`BenchResult`] somewhere: the terminal, a file,
/// a portal.
///
/// # Example
/// ```rust
/// use surge::{error::ReportError, report::{BenchResult, Reporter}};
///
/// struct Discard;
///
/// impl Reporter for Discard {
///     async fn report(&self, _: &BenchResult) -> Result<(), ReportError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Reporter {
    fn report(&self, result: &BenchResult) -> impl Future<Output = Result<(), ReportError>>;
}

/// Prints the result as a single JSON line on stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutReporter;

impl Reporter for StdoutReporter {
    async fn report(&self, result: &BenchResult) -> Result<(), ReportError> {
        println!("{}", result.to_json()?);
        Ok(())
    }
}

/// Writes the result as JSON to `path`, replacing any existing file.
#[derive(Debug, Clone)]
pub struct JsonFileReporter {
    pub path: PathBuf,
}

impl JsonFileReporter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Reporter for JsonFileReporter {
    async fn report(&self, result: &BenchResult) -> Result<(), ReportError> {
        tokio::fs::write(&self.path, result.to_json()?).await?;
        tracing::info!("Result json saved to {}", self.path.display());
        Ok(())
    }
}
