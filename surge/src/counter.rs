//! Named request counters.
//!
//! Operations bump a counter per request they make, keyed by free-form
//! strings such as `GET|/channel/1` or `staticfile-304`. The engine only reads
//! them back at the end of a run to compute the score.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
pub struct Counters {
    counts: Mutex<HashMap<String, i64>>,
}

impl Counters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&self, key: impl Into<String>) {
        self.add(key, 1);
    }

    pub fn add(&self, key: impl Into<String>, n: i64) {
        let mut counts = self.counts.lock().unwrap_or_else(PoisonError::into_inner);
        *counts.entry(key.into()).or_insert(0) += n;
    }

    /// Count for an exact key, zero when never incremented.
    pub fn get(&self, key: &str) -> i64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .copied()
            .unwrap_or(0)
    }

    /// Sum of every counter whose key starts with `prefix`.
    pub fn sum_prefix(&self, prefix: &str) -> i64 {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(_, v)| *v)
            .sum()
    }

    /// Point-in-time copy of all counters, ordered by key.
    pub fn snapshot(&self) -> BTreeMap<String, i64> {
        self.counts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn missing_key_reads_zero() {
        let c = Counters::new();
        assert_eq!(c.get("GET|/"), 0);
        assert_eq!(c.sum_prefix("GET|/"), 0);
    }

    #[test]
    fn prefix_sum_only_matches_prefix() {
        let c = Counters::new();
        c.increment("GET|/");
        c.add("GET|/fetch", 3);
        c.add("POST|/message", 2);
        c.increment("xGET|/");

        assert_eq!(c.sum_prefix("GET|/"), 4);
        assert_eq!(c.sum_prefix("GET|/fetch"), 3);
        assert_eq!(c.sum_prefix("POST|/"), 2);
        assert_eq!(c.snapshot().len(), 4);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let c = Arc::new(Counters::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || {
                    for _ in 0..1000 {
                        c.increment("GET|/");
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(c.get("GET|/"), 4000);
    }
}
