//! Registry of check and load operations.
//!
//! A [`BenchFn`] is a named async operation over a [`RunContext`] and the
//! shared state `S`. The registry keeps three independent lists:
//!
//! - **checks**, run by the validation sequencer;
//! - **loads**, picked at random by the sustained load workers;
//! - **level-up loads**, spawned in bursts whenever the load level rises.
//!
//! Weighted selection is done by replication: a function registered with
//! weight `w` appears `w` times in its list, so a uniform pick over the list
//! selects it with probability proportional to `w`.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use rand::Rng;

use crate::context::RunContext;
use crate::error::{BenchError, CheckError};

/// Boxed future returned by a [`BenchFn`].
pub type BenchFuture = Pin<Box<dyn Future<Output = Result<(), CheckError>> + Send>>;

type BoxedOp<S> = dyn Fn(RunContext, Arc<S>) -> BenchFuture + Send + Sync;

/// A named, immutable check or load operation.
pub struct BenchFn<S> {
    name: Arc<str>,
    op: Arc<BoxedOp<S>>,
}

impl<S> Clone for BenchFn<S> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            op: self.op.clone(),
        }
    }
}

impl<S> fmt::Debug for BenchFn<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchFn").field("name", &self.name).finish()
    }
}

impl<S: Send + Sync + 'static> BenchFn<S> {
    pub fn new<F, Fut>(name: impl Into<Arc<str>>, op: F) -> Self
    where
        F: Fn(RunContext, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
    {
        Self {
            name: name.into(),
            op: Arc::new(move |ctx: RunContext, state: Arc<S>| -> BenchFuture {
                Box::pin(op(ctx, state))
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Start one invocation of the operation.
    pub fn call(&self, ctx: RunContext, state: Arc<S>) -> BenchFuture {
        (self.op)(ctx, state)
    }
}

/// Flat list where each function is replicated by its weight.
#[derive(Debug)]
pub struct WeightedSet<S> {
    entries: Vec<BenchFn<S>>,
}

impl<S> Default for WeightedSet<S> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<S> Clone for WeightedSet<S> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<S> WeightedSet<S> {
    fn insert(&mut self, weight: usize, f: BenchFn<S>) {
        self.entries.extend(std::iter::repeat_n(f, weight));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[BenchFn<S>] {
        &self.entries
    }

    /// Number of entries registered under `name`.
    pub fn count_named(&self, name: &str) -> usize {
        self.entries.iter().filter(|f| &*f.name == name).count()
    }

    /// Uniform pick over the replicated entries, `None` when empty.
    pub fn choose<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&BenchFn<S>> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(rng.random_range(0..self.entries.len()))
    }
}

/// All operations known to a benchmark. Filled before the run starts.
#[derive(Debug)]
pub struct Registry<S> {
    checks: Vec<BenchFn<S>>,
    loads: WeightedSet<S>,
    level_up_loads: WeightedSet<S>,
}

impl<S> Default for Registry<S> {
    fn default() -> Self {
        Self {
            checks: Vec::new(),
            loads: WeightedSet::default(),
            level_up_loads: WeightedSet::default(),
        }
    }
}

impl<S: Send + Sync + 'static> Registry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a check. Checks run once each, in this order, during the pre-test gate.
    pub fn register_check<F, Fut>(&mut self, name: impl Into<Arc<str>>, op: F) -> &mut Self
    where
        F: Fn(RunContext, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
    {
        self.checks.push(BenchFn::new(name, op));
        self
    }

    /// Append a sustained load function `weight` times.
    pub fn register_load<F, Fut>(
        &mut self,
        weight: usize,
        name: impl Into<Arc<str>>,
        op: F,
    ) -> Result<&mut Self, BenchError>
    where
        F: Fn(RunContext, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
    {
        let f = weighted(weight, name, op)?;
        self.loads.insert(weight, f);
        Ok(self)
    }

    /// Append a burst function `weight` times; each level-up spawns every entry.
    pub fn register_level_up_load<F, Fut>(
        &mut self,
        weight: usize,
        name: impl Into<Arc<str>>,
        op: F,
    ) -> Result<&mut Self, BenchError>
    where
        F: Fn(RunContext, Arc<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
    {
        let f = weighted(weight, name, op)?;
        self.level_up_loads.insert(weight, f);
        Ok(self)
    }
}

impl<S> Registry<S> {
    pub fn checks(&self) -> &[BenchFn<S>] {
        &self.checks
    }

    pub fn loads(&self) -> &WeightedSet<S> {
        &self.loads
    }

    pub fn level_up_loads(&self) -> &WeightedSet<S> {
        &self.level_up_loads
    }
}

fn weighted<S, F, Fut>(
    weight: usize,
    name: impl Into<Arc<str>>,
    op: F,
) -> Result<BenchFn<S>, BenchError>
where
    S: Send + Sync + 'static,
    F: Fn(RunContext, Arc<S>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CheckError>> + Send + 'static,
{
    let name = name.into();
    if weight == 0 {
        return Err(BenchError::InvalidWeight {
            name: name.to_string(),
        });
    }
    Ok(BenchFn::new(name, op))
}
