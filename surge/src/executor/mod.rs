//! Executor: load generation and its adaptive escalation
//!
//! Load is generated by two cooperating parts:
//!
//! - [`LoadPool`]: sustained workers, each looping over weighted-random load
//!   functions, plus one-shot *bursts* of level-up functions.
//! - [`EscalationController`]: a once-per-tick loop that reads the signal
//!   board and asks the pool for another round of bursts whenever neither an
//!   error nor a slow response was reported within the signal window.
//!
//! # High-level flow
//! 1. The orchestrator starts the baseline: `initial_workers` sustained
//!    workers and `initial_bursts` burst sets.
//! 2. The controller is spawned. On every tick it either withholds
//!    escalation (and logs why) or raises the level by one and spawns
//!    `bursts_per_level` burst sets.
//! 3. When the run is cancelled the controller guards the signal board and
//!    returns its [`EscalationOutcome`]. The orchestrator then drains the pool.
//!
//! # Escalation window
//! A tick escalates only if the newest error and the newest slow path are
//! both older than `window`:
//!
//! ```text
//! error_recent = last_error.is_some() && now - error_at < window
//! slow_recent  = last_slow.is_some()  && now - slow_at  < window
//! escalate     = !error_recent && !slow_recent
//! ```
//!
//! With the defaults (1 s tick, 5 s window) a single transient failure blocks
//! five consecutive ticks, after which escalation resumes at one level per
//! second.
//!
//! # Cancellation
//! Workers and the controller observe the run's shutdown signal at the top of
//! each iteration or tick. Nothing interrupts an operation in flight; the
//! orchestrator bounds the tail with [`LoadPool::drain`].
pub mod escalation;
pub mod pool;

pub use escalation::{Decision, EscalationController, EscalationOutcome, LEVEL_UP_KEY, decide};
pub use pool::LoadPool;
