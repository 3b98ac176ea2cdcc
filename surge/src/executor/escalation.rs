use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use typed_builder::TypedBuilder;

use super::pool::LoadPool;
use crate::context::RunContext;
use crate::error::CheckError;
use crate::signal::SignalBoard;

/// Counter key incremented on every successful escalation.
pub const LEVEL_UP_KEY: &str = "load-level-up";

/// Outcome of a single escalation tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// An error was reported inside the signal window.
    WithholdError(CheckError),
    /// A slow response was reported inside the signal window.
    WithholdSlowPath(String),
    Escalate,
}

/// Pure decision step: errors take priority over slow paths.
pub fn decide(signals: &SignalBoard, now: Instant, window: Duration) -> Decision {
    if let Some(err) = signals.last_error().recent(now, window) {
        return Decision::WithholdError(err.clone());
    }
    if let Some(path) = signals.last_slow_path().recent(now, window) {
        return Decision::WithholdSlowPath(path.to_string());
    }
    Decision::Escalate
}

/// What the controller leaves behind once the run is over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EscalationOutcome {
    /// Number of successful escalations.
    pub level: u64,
    /// Human-readable, timestamped record of every decision.
    pub logs: Vec<String>,
}

/// Once-per-tick loop that raises the load level while the target is healthy.
///
/// The baseline level (initial workers and bursts) is started by the caller;
/// the controller only adds to it. The level never decreases.
///
/// When the run is cancelled the controller guards the signal board, so
/// nothing reported by draining tasks can affect the final diagnostics.
#[derive(TypedBuilder)]
pub struct EscalationController<S> {
    pool: Arc<LoadPool<S>>,
    #[builder(default = Duration::from_secs(1))]
    tick: Duration,
    #[builder(default = Duration::from_secs(5))]
    window: Duration,
    #[builder(default = 5)]
    bursts_per_level: usize,
    #[builder(default)]
    disabled: bool,
}

impl<S: Send + Sync + 'static> EscalationController<S> {
    pub async fn run(self, ctx: RunContext) -> EscalationOutcome {
        let mut outcome = EscalationOutcome::default();
        let mut beat = interval_at(Instant::now() + self.tick, self.tick);
        beat.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            // cancellation wins over a tick that is ready at the same instant
            tokio::select! {
                biased;
                _ = ctx.cancelled() => {
                    // the run is over: stop collecting signals from here on
                    ctx.signals().guard(true);
                    tracing::info!("Escalation stopped at level {}", outcome.level);
                    return outcome;
                }
                _ = beat.tick() => {
                    if self.disabled {
                        continue;
                    }
                    self.step(&ctx, &mut outcome);
                }
            }
        }
    }

    fn step(&self, ctx: &RunContext, outcome: &mut EscalationOutcome) {
        let now = Instant::now();
        let stamp = Local::now().format("%m/%d %H:%M:%S");

        match decide(ctx.signals(), now, self.window) {
            Decision::WithholdError(err) => {
                tracing::warn!("Cannot increase load level. Reason: recent error: {err}");
                outcome
                    .logs
                    .push(format!("{stamp} Load level not raised due to an error. {err}"));
            }
            Decision::WithholdSlowPath(path) => {
                tracing::warn!("Cannot increase load level. Reason: slow path {path}");
                outcome.logs.push(format!(
                    "{stamp} Load level not raised due to slow responses. {path}"
                ));
            }
            Decision::Escalate => {
                outcome.level += 1;
                outcome.logs.push(format!("{stamp} Load level increased."));
                ctx.counters().increment(LEVEL_UP_KEY);
                tracing::info!("Increase load level to {}.", outcome.level);
                self.pool.level_up(self.bursts_per_level);
            }
        }
    }
}
