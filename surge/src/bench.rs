use std::sync::Arc;

use chrono::Utc;
use tokio::time::Instant;

use crate::config::{BenchConfig, fork_rng};
use crate::context::RunContext;
use crate::counter::Counters;
use crate::error::BenchError;
use crate::executor::{EscalationController, EscalationOutcome, LEVEL_UP_KEY, LoadPool};
use crate::init::{Initializer, NoInit};
use crate::journal::ErrorJournal;
use crate::registry::Registry;
use crate::report::BenchResult;
use crate::score::{CounterSummary, ScoreInputs};
use crate::signal::SignalBoard;
use crate::validation::Validator;

/// One benchmark run: the registered operations, the shared state they work
/// on, and the controls that shape the run.
///
/// [`Benchmark::run`] drives the whole sequence:
///
/// 1. initialize the target;
/// 2. run every check once (the gate);
/// 3. start the baseline load and the escalation controller, and validate
///    continuously until the deadline or a fatal check failure;
/// 4. cancel everything, guard the signal board, drain the pool, and score.
///
/// Every `Benchmark` owns fresh counters and a fresh signal board, so several
/// runs can coexist in one process.
pub struct Benchmark<S, I = NoInit> {
    registry: Registry<S>,
    state: Arc<S>,
    config: BenchConfig,
    initializer: I,
    counters: Arc<Counters>,
    signals: Arc<SignalBoard>,
    journal: Arc<ErrorJournal>,
}

impl<S: Send + Sync + 'static> Benchmark<S, NoInit> {
    pub fn new(registry: Registry<S>, state: impl Into<Arc<S>>) -> Self {
        Self {
            registry,
            state: state.into(),
            config: BenchConfig::default(),
            initializer: NoInit,
            counters: Arc::new(Counters::new()),
            signals: Arc::new(SignalBoard::new()),
            journal: Arc::new(ErrorJournal::new()),
        }
    }
}

impl<S, I> Benchmark<S, I>
where
    S: Send + Sync + 'static,
    I: Initializer,
{
    pub fn config(mut self, config: BenchConfig) -> Self {
        self.config = config;
        self
    }

    pub fn initializer<J: Initializer>(self, initializer: J) -> Benchmark<S, J> {
        Benchmark {
            registry: self.registry,
            state: self.state,
            config: self.config,
            initializer,
            counters: self.counters,
            signals: self.signals,
            journal: self.journal,
        }
    }

    /// Counters the operations of this run write to.
    pub fn counters(&self) -> Arc<Counters> {
        self.counters.clone()
    }

    pub fn signals(&self) -> Arc<SignalBoard> {
        self.signals.clone()
    }

    pub async fn run(self) -> BenchResult {
        let start_time = Utc::now();
        let Self {
            registry,
            state,
            config,
            initializer,
            counters,
            signals,
            journal,
        } = self;

        tracing::info!("Initializing target...");
        if let Err(err) = initializer.initialize().await {
            tracing::error!("{err}");
            return BenchResult::failed(start_time, err.to_string(), journal.entries());
        }

        let deadline = Instant::now() + config.duration;
        let (ctx, shutdown) = RunContext::with_collaborators(deadline, signals, counters, journal);
        let timer = {
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                tokio::time::sleep_until(deadline).await;
                tracing::info!("Deadline reached");
                shutdown.trigger();
            })
        };

        let mut rng = config.rng();
        let mut validator = Validator::new(
            registry.checks().to_vec(),
            config.validation_penalty,
            fork_rng(&mut rng),
        );

        tracing::info!("Running pre-test...");
        if let Err(err) = validator.pre_test(&ctx, &state).await {
            tracing::error!("{err}");
            timer.abort();
            shutdown.trigger();
            ctx.signals().guard(true);
            return BenchResult::failed(
                start_time,
                format!("validation before load failed: {err}"),
                ctx.journal().entries(),
            );
        }
        tracing::info!("Pre-test done");

        if config.pre_test_only {
            timer.abort();
            shutdown.trigger();
            ctx.signals().guard(true);
            return BenchResult::failed(start_time, "pre-test passed", ctx.journal().entries());
        }

        let pool = Arc::new(LoadPool::new(
            ctx.clone(),
            state.clone(),
            registry.loads().clone(),
            registry.level_up_loads().clone(),
            fork_rng(&mut rng),
        ));
        if let Err(err) = pool.start(config.initial_workers) {
            tracing::error!("{err}");
            timer.abort();
            shutdown.trigger();
            ctx.signals().guard(true);
            return BenchResult::failed(
                start_time,
                format!("load could not start: {err}"),
                ctx.journal().entries(),
            );
        }
        pool.level_up(config.initial_bursts);

        let escalation = tokio::spawn(
            EscalationController::builder()
                .pool(pool.clone())
                .tick(config.tick)
                .window(config.signal_window)
                .bursts_per_level(config.level_up_bursts)
                .disabled(config.no_level_up)
                .build()
                .run(ctx.clone()),
        );

        tracing::info!("Running validation...");
        let validation = validator.run(&ctx, &state).await;
        shutdown.trigger();
        timer.abort();

        let outcome = match escalation.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Escalation task failed: {e}");
                ctx.signals().guard(true);
                EscalationOutcome::default()
            }
        };
        pool.drain(config.drain_timeout).await;
        tracing::info!("Validation done");

        let mut result = finish(start_time, &ctx, &config, validation);
        result.logs = outcome.logs;
        result
    }
}

fn finish(
    start_time: chrono::DateTime<Utc>,
    ctx: &RunContext,
    config: &BenchConfig,
    validation: Result<(), BenchError>,
) -> BenchResult {
    let errors = ctx.journal().entries();
    let load_level = ctx.counters().get(LEVEL_UP_KEY);

    if let Err(err) = validation {
        let mut result = BenchResult::failed(
            start_time,
            format!("validation during load failed: {err}"),
            errors,
        );
        result.load_level = load_level;
        return result;
    }

    let rules = &config.score_rules;
    CounterSummary::from_snapshot(&ctx.counters().snapshot(), rules).log();

    let inputs = ScoreInputs::collect(ctx.counters(), rules);
    let score = inputs.score();
    tracing::info!(
        get = inputs.get,
        fetch = inputs.fetch,
        post = inputs.post,
        message = inputs.message,
        not_modified = inputs.not_modified,
        score,
        "Run scored"
    );

    BenchResult {
        job_id: String::new(),
        ip_addrs: String::new(),
        pass: true,
        score,
        message: "ok".into(),
        errors,
        logs: Vec::new(),
        load_level,
        start_time,
        end_time: Utc::now(),
    }
}
