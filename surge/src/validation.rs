//! Check sequencer.
//!
//! Checks run in two modes:
//!
//! - **pre-test**: every check once, in registration order, before any load
//!   starts. The first error of any kind fails the gate.
//! - **continuous**: while the run is active, repeated passes over all checks,
//!   each pass in a fresh random order. Fatal errors abort the run; other
//!   errors cost a fixed penalty pause so a failing check cannot be used to
//!   skip validation work and free capacity for scored traffic.
//!
//! Cancellation is observed before each check starts. A check that is
//! already running always finishes, but an error it returns after the run
//! was cancelled is dropped: a run that reached its deadline still passes.

use std::sync::Arc;
use std::time::Duration;

use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};
use tokio::time::Instant;

use crate::context::RunContext;
use crate::error::BenchError;
use crate::registry::BenchFn;

pub struct Validator<S> {
    checks: Vec<BenchFn<S>>,
    penalty: Duration,
    rng: StdRng,
}

impl<S: Send + Sync + 'static> Validator<S> {
    pub fn new(checks: Vec<BenchFn<S>>, penalty: Duration, rng: StdRng) -> Self {
        Self {
            checks,
            penalty,
            rng,
        }
    }

    /// Deterministic validator, for tests and reproducible runs.
    pub fn seeded(checks: Vec<BenchFn<S>>, penalty: Duration, seed: u64) -> Self {
        Self::new(checks, penalty, StdRng::seed_from_u64(seed))
    }

    /// Run every check once, in order. Any error fails the gate.
    pub async fn pre_test(&self, ctx: &RunContext, state: &Arc<S>) -> Result<(), BenchError> {
        for check in &self.checks {
            let started = Instant::now();
            let res = check.call(ctx.clone(), state.clone()).await;
            tracing::debug!("{} {:?}", check.name(), started.elapsed());
            if let Err(err) = res {
                ctx.report_error(&err);
                return Err(BenchError::Gate {
                    name: check.name().to_string(),
                    source: err,
                });
            }
        }
        Ok(())
    }

    /// A fresh random order over all check indices.
    pub fn permutation(&mut self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.checks.len()).collect();
        order.shuffle(&mut self.rng);
        order
    }

    /// One pass over all checks in random order.
    ///
    /// Returns early without error when the run is cancelled.
    pub async fn validate_pass(
        &mut self,
        ctx: &RunContext,
        state: &Arc<S>,
    ) -> Result<(), BenchError> {
        for i in self.permutation() {
            if ctx.is_cancelled() {
                return Ok(());
            }

            let check = &self.checks[i];
            let started = Instant::now();
            let res = check.call(ctx.clone(), state.clone()).await;
            tracing::debug!("{} {:?}", check.name(), started.elapsed());

            let Err(err) = res else {
                continue;
            };
            // the run already reached its deadline; a late failure cannot fail it
            if ctx.is_cancelled() {
                tracing::debug!("Ignoring {} failure after cancellation: {err}", check.name());
                return Ok(());
            }
            ctx.report_error(&err);
            if err.is_fatal() {
                tracing::error!("Fatal error in {}: {err}", check.name());
                return Err(BenchError::FatalValidation {
                    name: check.name().to_string(),
                    source: err,
                });
            }

            tracing::warn!("Check {} failed: {err}", check.name());
            tokio::select! {
                _ = tokio::time::sleep(self.penalty) => {}
                _ = ctx.cancelled() => {}
            }
        }
        Ok(())
    }

    /// Keep validating until the run is cancelled or a check fails fatally.
    pub async fn run(&mut self, ctx: &RunContext, state: &Arc<S>) -> Result<(), BenchError> {
        if self.checks.is_empty() {
            ctx.cancelled().await;
            return Ok(());
        }

        let mut passes = 0u64;
        while !ctx.is_cancelled() {
            self.validate_pass(ctx, state).await?;
            passes += 1;
            tokio::task::yield_now().await;
        }
        tracing::info!("Validation finished after {passes} passes");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use crate::registry::Registry;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn tracing_registry(n: usize, trace: &Trace) -> Registry<()> {
        let mut registry = Registry::new();
        for i in 0..n {
            let trace = trace.clone();
            let name = format!("check-{i}");
            registry.register_check(name.clone(), move |_, _| {
                let trace = trace.clone();
                let name = name.clone();
                async move {
                    trace.lock().unwrap().push(name);
                    Ok(())
                }
            });
        }
        registry
    }

    #[tokio::test]
    async fn pre_test_runs_in_order() {
        let trace = Trace::default();
        let registry = tracing_registry(4, &trace);
        let validator = Validator::seeded(registry.checks().to_vec(), Duration::ZERO, 1);
        let (ctx, _shutdown) = RunContext::new(Instant::now());

        validator.pre_test(&ctx, &Arc::new(())).await.unwrap();
        assert_eq!(
            *trace.lock().unwrap(),
            ["check-0", "check-1", "check-2", "check-3"]
        );
    }

    #[tokio::test]
    async fn pre_test_stops_at_first_error() {
        let trace = Trace::default();
        let mut registry = tracing_registry(1, &trace);
        registry.register_check("broken", |_, _| async { Err(CheckError::new("status 500")) });
        let later = trace.clone();
        registry.register_check("never", move |_, _| {
            let later = later.clone();
            async move {
                later.lock().unwrap().push("never".into());
                Ok(())
            }
        });
        let validator = Validator::seeded(registry.checks().to_vec(), Duration::ZERO, 1);
        let (ctx, _shutdown) = RunContext::new(Instant::now());

        let err = validator.pre_test(&ctx, &Arc::new(())).await.unwrap_err();
        assert!(matches!(err, BenchError::Gate { ref name, .. } if name == "broken"));
        assert_eq!(*trace.lock().unwrap(), ["check-0"]);
    }

    #[tokio::test]
    async fn every_pass_visits_every_check_once() {
        let trace = Trace::default();
        let registry = tracing_registry(6, &trace);
        let mut validator = Validator::seeded(registry.checks().to_vec(), Duration::ZERO, 11);
        let (ctx, _shutdown) = RunContext::new(Instant::now());
        let state = Arc::new(());

        let mut orders = Vec::new();
        for _ in 0..200 {
            trace.lock().unwrap().clear();
            validator.validate_pass(&ctx, &state).await.unwrap();
            let mut order = trace.lock().unwrap().clone();
            orders.push(order.clone());
            order.sort();
            assert_eq!(
                order,
                ["check-0", "check-1", "check-2", "check-3", "check-4", "check-5"]
            );
        }

        // 720 orders are possible; consecutive repeats should be rare
        let repeats = orders.windows(2).filter(|w| w[0] == w[1]).count();
        assert!(repeats < 5, "{repeats} consecutive identical passes");
    }

    #[tokio::test(start_paused = true)]
    async fn non_fatal_error_costs_penalty() {
        let mut registry = Registry::<()>::new();
        registry.register_check("flaky", |_, _| async { Err(CheckError::new("mismatch")) });
        let mut validator =
            Validator::seeded(registry.checks().to_vec(), Duration::from_millis(500), 1);
        let (ctx, _shutdown) = RunContext::new(Instant::now() + Duration::from_secs(60));

        let started = Instant::now();
        validator.validate_pass(&ctx, &Arc::new(())).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_millis(500));
        assert_eq!(ctx.journal().entries(), ["mismatch"]);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_aborts() {
        let mut registry = Registry::<()>::new();
        registry.register_check("ok", |_, _| async { Ok(()) });
        registry.register_check("lost-data", |_, _| async {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Err(CheckError::fatal("message disappeared"))
        });
        let mut validator = Validator::seeded(registry.checks().to_vec(), Duration::ZERO, 5);
        let (ctx, _shutdown) = RunContext::new(Instant::now() + Duration::from_secs(60));

        let err = validator.run(&ctx, &Arc::new(())).await.unwrap_err();
        assert!(matches!(err, BenchError::FatalValidation { ref name, .. } if name == "lost-data"));
    }

    #[tokio::test(start_paused = true)]
    async fn run_stops_on_cancellation() {
        let mut registry = Registry::<()>::new();
        registry.register_check("slow", |_, _| async {
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok(())
        });
        let mut validator = Validator::seeded(registry.checks().to_vec(), Duration::ZERO, 5);
        let (ctx, shutdown) = RunContext::new(Instant::now() + Duration::from_secs(1));

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1000)).await;
            shutdown.trigger();
        });
        let started = Instant::now();
        validator.run(&ctx, &Arc::new(())).await.unwrap();
        trigger.await.unwrap();

        // the check running at the deadline completes before the loop exits
        assert_eq!(started.elapsed(), Duration::from_millis(1200));
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_after_cancellation_is_ignored() {
        let mut registry = Registry::<()>::new();
        registry.register_check("straddling", |_, _| async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Err(CheckError::fatal("late fatal"))
        });
        let mut validator = Validator::seeded(registry.checks().to_vec(), Duration::ZERO, 5);
        let (ctx, shutdown) = RunContext::new(Instant::now() + Duration::from_secs(3));

        let trigger = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(3)).await;
            shutdown.trigger();
        });
        validator.run(&ctx, &Arc::new(())).await.unwrap();
        trigger.await.unwrap();

        assert!(ctx.journal().entries().is_empty());
        assert!(ctx.signals().last_error().error.is_none());
    }

    #[tokio::test]
    async fn empty_checks_wait_for_cancellation() {
        let mut validator = Validator::<()>::seeded(Vec::new(), Duration::ZERO, 5);
        let (ctx, shutdown) = RunContext::new(Instant::now());
        shutdown.trigger();
        validator.run(&ctx, &Arc::new(())).await.unwrap();
    }
}
