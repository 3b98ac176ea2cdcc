//! Signal board: the most recent error and the most recent slow response.
//!
//! Each channel is a single slot. A new report overwrites the previous one, so
//! only recency is kept. The escalation controller reads both slots once per
//! tick and refuses to raise the load level while either is fresher than its
//! window.
//!
//! Once [`SignalBoard::guard`] is enabled, reports become no-ops. The
//! controller does this on shutdown so that late failures from draining
//! workers cannot leak into the final diagnostics.

use std::sync::{
    Mutex, PoisonError,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use tokio::time::Instant;

use crate::error::CheckError;

/// The last reported error and when it was observed.
#[derive(Debug, Clone)]
pub struct ErrorSignal {
    pub error: Option<CheckError>,
    pub observed_at: Instant,
}

/// The last path reported as slow and when it was observed.
#[derive(Debug, Clone)]
pub struct SlowPathSignal {
    pub path: Option<String>,
    pub observed_at: Instant,
}

/// Thread-safe, run-scoped record of recent error and latency signals.
#[derive(Debug)]
pub struct SignalBoard {
    last_error: Mutex<ErrorSignal>,
    last_slow_path: Mutex<SlowPathSignal>,
    guarded: AtomicBool,
}

impl Default for SignalBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalBoard {
    pub fn new() -> Self {
        let now = Instant::now();
        Self {
            last_error: Mutex::new(ErrorSignal {
                error: None,
                observed_at: now,
            }),
            last_slow_path: Mutex::new(SlowPathSignal {
                path: None,
                observed_at: now,
            }),
            guarded: AtomicBool::new(false),
        }
    }

    /// Record `err` as the latest error. Returns `false` if the board is guarded.
    pub fn report_error(&self, err: &CheckError) -> bool {
        if self.is_guarded() {
            return false;
        }
        let mut slot = self.last_error.lock().unwrap_or_else(PoisonError::into_inner);
        slot.error = Some(err.clone());
        slot.observed_at = Instant::now();
        true
    }

    /// Record `path` as the latest slow response. Returns `false` if the board is guarded.
    pub fn report_slow_path(&self, path: impl Into<String>) -> bool {
        if self.is_guarded() {
            return false;
        }
        let mut slot = self
            .last_slow_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        slot.path = Some(path.into());
        slot.observed_at = Instant::now();
        true
    }

    pub fn last_error(&self) -> ErrorSignal {
        self.last_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn last_slow_path(&self) -> SlowPathSignal {
        self.last_slow_path
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop (or resume) accepting reports.
    pub fn guard(&self, enable: bool) {
        self.guarded.store(enable, Ordering::SeqCst);
    }

    pub fn is_guarded(&self) -> bool {
        self.guarded.load(Ordering::SeqCst)
    }
}

impl ErrorSignal {
    /// The error, if one was observed less than `window` before `now`.
    pub fn recent(&self, now: Instant, window: Duration) -> Option<&CheckError> {
        self.error
            .as_ref()
            .filter(|_| now.saturating_duration_since(self.observed_at) < window)
    }
}

impl SlowPathSignal {
    /// The path, if one was observed less than `window` before `now`.
    pub fn recent(&self, now: Instant, window: Duration) -> Option<&str> {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .filter(|_| now.saturating_duration_since(self.observed_at) < window)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_board_has_no_signals() {
        let board = SignalBoard::new();
        assert!(board.last_error().error.is_none());
        assert!(board.last_slow_path().path.is_none());
    }

    #[test]
    fn latest_report_wins() {
        let board = SignalBoard::new();
        board.report_error(&CheckError::new("first"));
        board.report_error(&CheckError::new("second"));
        board.report_slow_path("GET /a");
        board.report_slow_path("GET /b");

        assert_eq!(board.last_error().error.unwrap().message(), "second");
        assert_eq!(board.last_slow_path().path.as_deref(), Some("GET /b"));
    }

    #[test]
    fn guarded_board_ignores_reports() {
        let board = SignalBoard::new();
        board.report_error(&CheckError::new("before"));
        board.report_slow_path("/before");
        let error_before = board.last_error();
        let slow_before = board.last_slow_path();

        board.guard(true);
        assert!(!board.report_error(&CheckError::new("after")));
        assert!(!board.report_slow_path("/after"));

        let error_after = board.last_error();
        let slow_after = board.last_slow_path();
        assert_eq!(error_after.error, error_before.error);
        assert_eq!(error_after.observed_at, error_before.observed_at);
        assert_eq!(slow_after.path, slow_before.path);
        assert_eq!(slow_after.observed_at, slow_before.observed_at);
    }

    #[tokio::test(start_paused = true)]
    async fn signals_expire_after_window() {
        let board = SignalBoard::new();
        let window = Duration::from_secs(5);
        board.report_error(&CheckError::new("boom"));
        board.report_slow_path("/slow");

        tokio::time::advance(Duration::from_secs(4)).await;
        let now = Instant::now();
        assert!(board.last_error().recent(now, window).is_some());
        assert_eq!(board.last_slow_path().recent(now, window), Some("/slow"));

        tokio::time::advance(Duration::from_secs(1)).await;
        let now = Instant::now();
        assert!(board.last_error().recent(now, window).is_none());
        assert!(board.last_slow_path().recent(now, window).is_none());
    }

    #[test]
    fn concurrent_reports_are_safe() {
        let board = std::sync::Arc::new(SignalBoard::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let board = board.clone();
                std::thread::spawn(move || {
                    for j in 0..100 {
                        board.report_error(&CheckError::new(format!("{i}-{j}")));
                        board.report_slow_path(format!("/{i}/{j}"));
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert!(board.last_error().error.is_some());
        assert!(board.last_slow_path().path.is_some());
    }
}
