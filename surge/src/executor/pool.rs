use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicUsize, Ordering},
};
use std::time::Duration;

use futures::future::join_all;
use rand::rngs::StdRng;
use tokio::task::JoinHandle;

use crate::config::fork_rng;
use crate::context::RunContext;
use crate::error::BenchError;
use crate::registry::WeightedSet;

/// Pool of sustained load workers plus the level-up bursts spawned on top.
///
/// - Each worker repeatedly picks a weighted-random load function and awaits
///   it. The first error stops that worker only; the pool never restarts it.
/// - Workers check for cancellation before every pick. An in-flight call is
///   never interrupted by the pool itself.
/// - [`LoadPool::level_up`] spawns one-shot invocations of every level-up
///   entry. Their results are reported to the run context but otherwise
///   ignored.
///
/// Every spawned task is tracked so [`LoadPool::drain`] can wait for them
/// after the run, and so tests can count what was started.
pub struct LoadPool<S> {
    ctx: RunContext,
    state: Arc<S>,
    loads: Arc<WeightedSet<S>>,
    level_up_loads: WeightedSet<S>,
    rng: Mutex<StdRng>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    workers_spawned: AtomicUsize,
    bursts_spawned: AtomicUsize,
}

impl<S: Send + Sync + 'static> LoadPool<S> {
    pub fn new(
        ctx: RunContext,
        state: Arc<S>,
        loads: WeightedSet<S>,
        level_up_loads: WeightedSet<S>,
        rng: StdRng,
    ) -> Self {
        Self {
            ctx,
            state,
            loads: Arc::new(loads),
            level_up_loads,
            rng: Mutex::new(rng),
            handles: Mutex::new(Vec::new()),
            workers_spawned: AtomicUsize::new(0),
            bursts_spawned: AtomicUsize::new(0),
        }
    }

    /// Spawn `workers` sustained load workers.
    ///
    /// Fails without spawning anything when no load function is registered.
    pub fn start(&self, workers: usize) -> Result<(), BenchError> {
        if self.loads.is_empty() {
            return Err(BenchError::EmptyLoadRegistry);
        }

        tracing::info!("Spawning {workers} load workers...");
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        for _ in 0..workers {
            let id = self.workers_spawned.fetch_add(1, Ordering::Relaxed);
            let rng = self.fork_rng();
            handles.push(tokio::spawn(run_worker(
                id,
                self.ctx.clone(),
                self.state.clone(),
                self.loads.clone(),
                rng,
            )));
        }
        Ok(())
    }

    /// Spawn `n` one-shot invocations of every level-up entry.
    pub fn level_up(&self, n: usize) {
        let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());

        for _ in 0..n {
            for f in self.level_up_loads.entries() {
                let f = f.clone();
                let ctx = self.ctx.clone();
                let state = self.state.clone();
                self.bursts_spawned.fetch_add(1, Ordering::Relaxed);
                handles.push(tokio::spawn(async move {
                    if let Err(err) = f.call(ctx.clone(), state).await {
                        tracing::debug!("Level-up load {} failed: {err}", f.name());
                        ctx.report_error(&err);
                    }
                }));
            }
        }
    }

    /// Total sustained workers spawned so far.
    pub fn workers_spawned(&self) -> usize {
        self.workers_spawned.load(Ordering::Relaxed)
    }

    /// Total level-up invocations spawned so far.
    pub fn bursts_spawned(&self) -> usize {
        self.bursts_spawned.load(Ordering::Relaxed)
    }

    /// Wait up to `grace` for every tracked task, then abort the rest.
    ///
    /// Returns the number of tasks that had to be aborted.
    pub async fn drain(&self, grace: Duration) -> usize {
        let mut handles =
            std::mem::take(&mut *self.handles.lock().unwrap_or_else(PoisonError::into_inner));
        tracing::info!("Draining {} load tasks...", handles.len());

        let joined = tokio::time::timeout(grace, join_all(handles.iter_mut())).await;
        match joined {
            Ok(results) => {
                for res in results {
                    if let Err(e) = res {
                        tracing::error!("Load task panicked with error: {e}");
                    }
                }
                0
            }
            Err(_) => {
                let stragglers = handles.iter().filter(|h| !h.is_finished()).count();
                tracing::warn!("Aborting {stragglers} load tasks still running after {grace:?}");
                handles.iter().for_each(JoinHandle::abort);
                stragglers
            }
        }
    }

    fn fork_rng(&self) -> StdRng {
        fork_rng(&mut self.rng.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

async fn run_worker<S: Send + Sync + 'static>(
    id: usize,
    ctx: RunContext,
    state: Arc<S>,
    loads: Arc<WeightedSet<S>>,
    mut rng: StdRng,
) {
    tracing::debug!("Worker {id} started.");
    loop {
        if ctx.is_cancelled() {
            break;
        }
        let Some(f) = loads.choose(&mut rng) else {
            break;
        };
        if let Err(err) = f.call(ctx.clone(), state.clone()).await {
            tracing::debug!("Worker {id} stopped by {}: {err}", f.name());
            ctx.report_error(&err);
            break;
        }
        // Operations that resolve without awaiting must not starve the runtime.
        tokio::task::yield_now().await;
    }
    tracing::debug!("Worker {id} shutting down.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CheckError;
    use crate::registry::Registry;
    use rand::SeedableRng;
    use tokio::time::Instant;

    fn pool_for(registry: &Registry<()>, ctx: RunContext) -> LoadPool<()> {
        LoadPool::new(
            ctx,
            Arc::new(()),
            registry.loads().clone(),
            registry.level_up_loads().clone(),
            StdRng::seed_from_u64(1),
        )
    }

    fn counting_registry() -> Registry<()> {
        let mut registry = Registry::new();
        registry
            .register_load(1, "tick", |ctx: RunContext, _| async move {
                ctx.counters().increment("GET|/tick");
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            })
            .unwrap();
        registry
            .register_level_up_load(2, "burst", |ctx: RunContext, _| async move {
                ctx.counters().increment("GET|/burst");
                Ok(())
            })
            .unwrap();
        registry
    }

    #[tokio::test]
    async fn empty_registry_fails_fast() {
        let registry = Registry::<()>::new();
        let (ctx, _shutdown) = RunContext::new(Instant::now());
        let pool = pool_for(&registry, ctx);

        assert!(matches!(pool.start(10), Err(BenchError::EmptyLoadRegistry)));
        assert_eq!(pool.workers_spawned(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn workers_run_until_cancelled() {
        let registry = counting_registry();
        let (ctx, shutdown) = RunContext::new(Instant::now() + Duration::from_secs(1));
        let pool = pool_for(&registry, ctx.clone());

        pool.start(4).unwrap();
        assert_eq!(pool.workers_spawned(), 4);

        tokio::time::sleep(Duration::from_secs(1)).await;
        shutdown.trigger();
        assert_eq!(pool.drain(Duration::from_secs(1)).await, 0);

        let calls = ctx.counters().get("GET|/tick");
        // four workers, one call every 10ms for one second
        assert!((360..=410).contains(&calls), "calls = {calls}");
    }

    #[tokio::test(start_paused = true)]
    async fn failing_worker_stops_alone() {
        let mut registry = Registry::<()>::new();
        registry
            .register_load(1, "fails", |_, _| async {
                Err::<(), _>(CheckError::new("status 500"))
            })
            .unwrap();
        let (ctx, shutdown) = RunContext::new(Instant::now() + Duration::from_secs(1));
        let pool = pool_for(&registry, ctx.clone());

        pool.start(3).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(pool.drain(Duration::from_millis(10)).await, 0);
        assert!(!shutdown.is_triggered());
        assert_eq!(
            ctx.signals().last_error().error,
            Some(CheckError::new("status 500"))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn level_up_spawns_every_entry_n_times() {
        let registry = counting_registry();
        let (ctx, _shutdown) = RunContext::new(Instant::now() + Duration::from_secs(1));
        let pool = pool_for(&registry, ctx.clone());

        pool.level_up(5);
        assert_eq!(pool.bursts_spawned(), 10);
        assert_eq!(pool.workers_spawned(), 0);

        pool.drain(Duration::from_secs(1)).await;
        assert_eq!(ctx.counters().get("GET|/burst"), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn drain_aborts_stuck_calls() {
        let mut registry = Registry::<()>::new();
        registry
            .register_load(1, "hangs", |_, _| async {
                std::future::pending::<()>().await;
                Ok(())
            })
            .unwrap();
        let (ctx, shutdown) = RunContext::new(Instant::now());
        let pool = pool_for(&registry, ctx);

        pool.start(2).unwrap();
        tokio::task::yield_now().await;
        shutdown.trigger();
        assert_eq!(pool.drain(Duration::from_millis(50)).await, 2);
    }
}
