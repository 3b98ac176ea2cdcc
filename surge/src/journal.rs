//! Ordered log of error messages reported during a run.
//!
//! The signal board only keeps the latest error; the journal keeps the
//! sequence so the final report can list what went wrong. It is capped to
//! keep a badly broken target from growing it without bound.

use std::sync::{Mutex, PoisonError};

/// Maximum number of messages retained.
pub const MAX_JOURNAL_ENTRIES: usize = 100;

#[derive(Debug, Default)]
pub struct ErrorJournal {
    entries: Mutex<Vec<String>>,
}

impl ErrorJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a message; silently dropped once the cap is reached.
    pub fn push(&self, message: impl Into<String>) {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if entries.len() < MAX_JOURNAL_ENTRIES {
            entries.push(message.into());
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_insertion_order_up_to_cap() {
        let journal = ErrorJournal::new();
        for i in 0..MAX_JOURNAL_ENTRIES + 10 {
            journal.push(format!("error {i}"));
        }
        let entries = journal.entries();
        assert_eq!(entries.len(), MAX_JOURNAL_ENTRIES);
        assert_eq!(entries[0], "error 0");
        assert_eq!(entries[MAX_JOURNAL_ENTRIES - 1], format!("error {}", MAX_JOURNAL_ENTRIES - 1));
    }
}
