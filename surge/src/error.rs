//! Error types shared by the benchmark engine and the operations it drives.
//!
//! Two layers exist:
//!
//! - [`CheckError`] is what a check or load operation returns. It carries a
//!   human-readable message and an optional *fatal* tag. The engine never
//!   inspects the message, only the tag.
//! - [`BenchError`] is the engine's own taxonomy. It tells the orchestrator
//!   whether a run must be aborted and what the final report should say.

use thiserror::Error;

/// Error returned by a check or load operation.
///
/// Non-fatal errors are absorbed by the engine (continuous validation waits a
/// penalty interval, load workers stop). A fatal error raised during
/// continuous validation aborts the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CheckError {
    message: String,
    fatal: bool,
}

impl CheckError {
    /// A recoverable error: a validation mismatch, a timeout, a bad status.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: false,
        }
    }

    /// An error that must stop the benchmark immediately.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fatal: true,
        }
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors raised by the engine itself.
#[derive(Debug, Error)]
pub enum BenchError {
    /// The one-time initialization request to the target failed.
    #[error("initialization request failed: {reason}")]
    Initialize { reason: String },

    /// A check failed during the pre-test gate. No load was started.
    #[error("pre-test check `{name}` failed: {source}")]
    Gate { name: String, source: CheckError },

    /// A check marked its failure as fatal during continuous validation.
    #[error("check `{name}` failed during load: {source}")]
    FatalValidation { name: String, source: CheckError },

    /// The load pool was started without any registered load function.
    #[error("no load functions registered")]
    EmptyLoadRegistry,

    /// A load function was registered with a weight of zero.
    #[error("load function `{name}` registered with weight 0")]
    InvalidWeight { name: String },
}

/// Failures while emitting a [`crate::report::BenchResult`].
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize bench result: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write bench result: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fatal_tag_is_preserved() {
        assert!(!CheckError::new("status 500").is_fatal());
        assert!(CheckError::fatal("data lost").is_fatal());
    }

    #[test]
    fn gate_error_cites_check_name() {
        let err = BenchError::Gate {
            name: "CheckLogin".into(),
            source: CheckError::new("status 403"),
        };
        assert_eq!(err.to_string(), "pre-test check `CheckLogin` failed: status 403");
    }
}
