//! Run-scoped context handed to every check and load operation.
//!
//! A [`RunContext`] bundles the shutdown signal with handles to the run's
//! shared collaborators (signal board, counters, error journal). Cloning is
//! cheap; every spawned task gets its own clone.
//!
//! Cancellation is cooperative: nothing in the engine interrupts an operation
//! that is already running. Loops poll [`RunContext::is_cancelled`] at their
//! well-defined points, and long-running operations may await
//! [`RunContext::cancelled`] to return early.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch::{Receiver, Sender, channel};
use tokio::time::Instant;

use crate::counter::Counters;
use crate::error::CheckError;
use crate::journal::ErrorJournal;
use crate::signal::SignalBoard;

#[derive(Clone, Debug)]
pub struct RunContext {
    shutdown: Receiver<bool>,
    deadline: Instant,
    signals: Arc<SignalBoard>,
    counters: Arc<Counters>,
    journal: Arc<ErrorJournal>,
}

/// Owner side of the shutdown signal.
#[derive(Clone, Debug)]
pub struct Shutdown {
    tx: Arc<Sender<bool>>,
}

impl Shutdown {
    /// Cancel the run. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl RunContext {
    /// Create a context for a run ending at `deadline` with fresh collaborators.
    pub fn new(deadline: Instant) -> (Self, Shutdown) {
        Self::with_collaborators(
            deadline,
            Arc::new(SignalBoard::new()),
            Arc::new(Counters::new()),
            Arc::new(ErrorJournal::new()),
        )
    }

    pub fn with_collaborators(
        deadline: Instant,
        signals: Arc<SignalBoard>,
        counters: Arc<Counters>,
        journal: Arc<ErrorJournal>,
    ) -> (Self, Shutdown) {
        let (tx, rx) = channel(false);
        (
            Self {
                shutdown: rx,
                deadline,
                signals,
                counters,
                journal,
            },
            Shutdown { tx: Arc::new(tx) },
        )
    }

    pub fn is_cancelled(&self) -> bool {
        *self.shutdown.borrow()
    }

    /// Resolves once the run is cancelled (or the shutdown owner is gone).
    pub async fn cancelled(&self) {
        let mut rx = self.shutdown.clone();
        let _ = rx.wait_for(|b| *b).await;
    }

    pub fn deadline(&self) -> Instant {
        self.deadline
    }

    /// Time left until the deadline, zero once it has passed.
    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn signals(&self) -> &Arc<SignalBoard> {
        &self.signals
    }

    pub fn counters(&self) -> &Arc<Counters> {
        &self.counters
    }

    pub fn journal(&self) -> &Arc<ErrorJournal> {
        &self.journal
    }

    /// Record an error on the signal board and, unless the board is guarded,
    /// in the journal.
    pub fn report_error(&self, err: &CheckError) {
        if self.signals.report_error(err) {
            self.journal.push(err.to_string());
        }
    }

    /// Record a response that exceeded the caller's latency threshold.
    pub fn report_slow_path(&self, path: impl Into<String>) {
        self.signals.report_slow_path(path);
    }
}
