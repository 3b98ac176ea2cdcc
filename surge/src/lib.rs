//! Surge: a timed load-benchmark orchestrator.
//!
//! Surge checks that a target web service behaves correctly, then pushes
//! escalating concurrent traffic at it while re-checking correctness the whole
//! time, and finally scores the run from the traffic counters collected along
//! the way.
//!
//! The library does not speak HTTP to the target itself. You register small
//! async operations and surge decides when, how often and how concurrently they
//! run.
//!
//! # Architecture
//!
//! - [`Registry`]: named check and weighted load operations. A load registered
//!   with weight `w` is picked `w` times as often as one with weight `1`.
//! - [`SignalBoard`]: most recent error and most recent slow response, each
//!   timestamped. Guarded once the run ends.
//! - [`validation::Validator`]: runs every check once as a gate, then keeps
//!   running them in random order while the load is on.
//! - [`executor::LoadPool`]: sustained load workers plus level-up bursts.
//! - [`executor::EscalationController`]: once per tick, raises the load level
//!   unless the signal board saw an error or a slow response recently.
//! - [`score`]: turns the counters into the final score.
//! - [`Benchmark`]: glue that ties everything together and produces a
//!   [`BenchResult`].
//!
//! # Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use surge::{BenchConfig, Benchmark, CheckError, Registry};
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut registry = Registry::<()>::new();
//!     registry.register_check("CheckIndex", |_, _| async { Ok(()) });
//!     registry
//!         .register_load(3, "LoadIndex", |ctx, _| async move {
//!             ctx.counters().increment("GET|/");
//!             tokio::time::sleep(Duration::from_millis(10)).await;
//!             Ok::<_, CheckError>(())
//!         })
//!         .unwrap();
//!
//!     let result = Benchmark::new(registry, ())
//!         .config(
//!             BenchConfig::builder()
//!                 .duration(Duration::from_millis(200))
//!                 .build(),
//!         )
//!         .run()
//!         .await;
//!
//!     assert!(result.pass);
//!     assert!(result.score > 0);
//! }
//! ```
//!
//! # Feature flags
//!
//! - `http`: enables [`init::HttpInitializer`], which resets the target with
//!   `GET /initialize` before the gate. (Enabled by default)

/// Orchestration of a whole run
pub mod bench;
/// Run controls
pub mod config;
/// Per-run cancellation and shared collaborators
pub mod context;
/// Traffic counters
pub mod counter;
pub mod error;
/// Load workers and escalation
pub mod executor;
/// Target initialization
pub mod init;
pub mod journal;
/// Check and load registration
pub mod registry;
/// Run results and Reporters
pub mod report;
/// Score computation
pub mod score;
/// Recent error and slow-response tracking
pub mod signal;
/// Pre-test gate and continuous validation
pub mod validation;

pub use bench::Benchmark;
pub use config::BenchConfig;
pub use context::{RunContext, Shutdown};
pub use counter::Counters;
pub use error::{BenchError, CheckError};
pub use init::Initializer;
pub use registry::{BenchFn, Registry};
pub use report::{BenchResult, Reporter};
pub use signal::SignalBoard;
