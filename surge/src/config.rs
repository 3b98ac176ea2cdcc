use std::time::Duration;

use rand::{Rng, SeedableRng, rngs::StdRng};
use typed_builder::TypedBuilder;

use crate::score::ScoreRules;

/// Administrative controls and tuning knobs for one benchmark run.
///
/// # Tuning knobs
/// - `duration`: wall-clock length of the load phase, measured from the start
///   of the pre-test gate.
/// - `initial_workers` / `initial_bursts`: the baseline load level, started
///   before the escalation controller's first tick.
/// - `level_up_bursts`: how many burst sets each successful escalation spawns.
/// - `tick` / `signal_window`: escalation cadence and how long an error or
///   slow response keeps blocking escalation.
/// - `validation_penalty`: pause after a non-fatal check failure.
/// - `drain_timeout`: how long in-flight operations may keep running after the
///   deadline before they are aborted.
#[derive(Debug, Clone, TypedBuilder)]
pub struct BenchConfig {
    #[builder(default = Duration::from_secs(60))]
    pub duration: Duration,
    /// Keep the load at its baseline level for the whole run.
    #[builder(default)]
    pub no_level_up: bool,
    /// Stop after the pre-test gate.
    #[builder(default)]
    pub pre_test_only: bool,
    #[builder(default = 10)]
    pub initial_workers: usize,
    #[builder(default = 1)]
    pub initial_bursts: usize,
    #[builder(default = 5)]
    pub level_up_bursts: usize,
    #[builder(default = Duration::from_secs(1))]
    pub tick: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub signal_window: Duration,
    #[builder(default = Duration::from_millis(500))]
    pub validation_penalty: Duration,
    #[builder(default = Duration::from_secs(5))]
    pub drain_timeout: Duration,
    /// Seed for every random choice the engine makes. `None` draws from entropy.
    #[builder(default, setter(strip_option))]
    pub seed: Option<u64>,
    #[builder(default)]
    pub score_rules: ScoreRules,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl BenchConfig {
    /// Root random source for a run, seeded from `seed` when set.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_rng(&mut rand::rng()),
        }
    }
}

/// Independent child generator drawn from `parent`.
pub(crate) fn fork_rng(parent: &mut StdRng) -> StdRng {
    StdRng::seed_from_u64(parent.random())
}
