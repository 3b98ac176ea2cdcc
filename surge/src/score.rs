//! Final score computation and the end-of-run counter summary.
//!
//! ```text
//! score = 1 * (get - fetch - not_modified)
//!       + 3 * post
//!       + 1 * message
//!       + not_modified / 100
//! ```
//!
//! Plain GETs earn one point each. Cached GETs (`fetch`, static `304`s) are
//! taken out of that count; `304`s still earn one point per hundred. POSTs
//! are weighted three times, and the message counter adds one point per
//! message retrieved.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::counter::Counters;

/// Counter keys and prefixes the score and summary read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRules {
    pub get_prefix: String,
    pub fetch_prefix: String,
    pub post_prefix: String,
    pub message_prefix: String,
    pub not_modified_key: String,
    /// Key prefixes collapsed into `<prefix>*` in the summary.
    pub collapse_prefixes: Vec<String>,
    /// Key prefixes listed under "request counts" in the summary.
    pub request_prefixes: Vec<String>,
}

impl Default for ScoreRules {
    fn default() -> Self {
        Self {
            get_prefix: "GET|/".into(),
            fetch_prefix: "GET|/fetch".into(),
            post_prefix: "POST|/".into(),
            message_prefix: "get-message-count".into(),
            not_modified_key: "staticfile-304".into(),
            collapse_prefixes: [
                "GET|/history/",
                "GET|/message?",
                "GET|/icons/",
                "GET|/channel/",
                "GET|/profile/",
                "SKIP|/icons/",
            ]
            .map(String::from)
            .to_vec(),
            request_prefixes: vec!["GET|".into(), "POST|".into()],
        }
    }
}

/// Counter totals feeding the score formula.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreInputs {
    pub get: i64,
    pub fetch: i64,
    pub post: i64,
    pub message: i64,
    pub not_modified: i64,
}

impl ScoreInputs {
    pub fn collect(counters: &Counters, rules: &ScoreRules) -> Self {
        Self {
            get: counters.sum_prefix(&rules.get_prefix),
            fetch: counters.sum_prefix(&rules.fetch_prefix),
            post: counters.sum_prefix(&rules.post_prefix),
            message: counters.sum_prefix(&rules.message_prefix),
            not_modified: counters.get(&rules.not_modified_key),
        }
    }

    pub fn score(&self) -> i64 {
        (self.get - self.fetch - self.not_modified)
            + 3 * self.post
            + self.message
            + self.not_modified / 100
    }
}

/// Counter totals grouped for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterSummary {
    /// Request keys, highest count first.
    pub requests: Vec<(String, i64)>,
    /// Everything else, highest count first.
    pub others: Vec<(String, i64)>,
}

impl CounterSummary {
    pub fn from_snapshot(snapshot: &BTreeMap<String, i64>, rules: &ScoreRules) -> Self {
        let mut grouped: BTreeMap<String, i64> = BTreeMap::new();
        for (key, count) in snapshot {
            let key = rules
                .collapse_prefixes
                .iter()
                .find(|p| key.starts_with(p.as_str()))
                .map(|p| format!("{p}*"))
                .unwrap_or_else(|| key.clone());
            *grouped.entry(key).or_insert(0) += count;
        }

        let mut sorted: Vec<(String, i64)> = grouped.into_iter().collect();
        // stable sort keeps keys alphabetical within equal counts
        sorted.sort_by(|a, b| b.1.cmp(&a.1));

        let (requests, others) = sorted.into_iter().partition(|(key, _)| {
            rules
                .request_prefixes
                .iter()
                .any(|p| key.starts_with(p.as_str()))
        });
        Self { requests, others }
    }

    pub fn log(&self) {
        tracing::info!("----- Request counts -----");
        for (key, count) in &self.requests {
            tracing::info!("{key} {count}");
        }
        tracing::info!("----- Other counts -----");
        for (key, count) in &self.others {
            tracing::info!("{key} {count}");
        }
        tracing::info!("--------------------------");
    }
}
