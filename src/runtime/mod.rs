//! Runtime orchestrator.
//!
//! Wires streaming sources into a [`DynamicProblem`](crate::problem::DynamicProblem),
//! runs the algorithm on a blocking thread and fans its published fronts
//! out to consumers. Start and stop are ordered:
//!
//! | Stage | Start | Stop |
//! |-------|-------|------|
//! | 1 | consumers attached | sources cancelled and awaited |
//! | 2 | sources spawned | algorithm cancelled and awaited |
//! | 3 | algorithm started | consumer queues drained |
//!
//! # Example
//!
//! ```ignore
//! let mut runtime = DynamicRuntime::new(algorithm, RuntimeConfig::default());
//! runtime.add_source(RandomMatrixUpdates::new(100, 7), SourceConfig::every(Duration::from_secs(5)));
//! runtime.add_consumer(Arc::new(FrontLogger::new()));
//! let outcome = runtime.start()?.wait().await?;
//! ```

mod config;
mod orchestrator;

pub use config::RuntimeConfig;
pub use orchestrator::{DynamicRuntime, RunOutcome, RunningRuntime};
