//! Dynamic multi-objective optimization runtime.
//!
//! Optimizes problems whose parameters keep changing while the search runs.
//! Streaming sources feed observed data into a problem; a multi-objective
//! evolutionary algorithm notices each change, restarts according to a
//! policy and keeps publishing its current non-dominated front to result
//! consumers.
//!
//! ```text
//! StreamingSource ──records──► DynamicProblem ◄──evaluate── DynamicAlgorithm
//!                  (EventChannel)                                  │
//!                                                        fronts (EventChannel)
//!                                                                  ▼
//!                                                   ConsumerSet ──► Consume impls
//! ```
//!
//! - [`problem`]: the user-implemented [`ProblemModel`](problem::ProblemModel)
//!   and its versioned [`DynamicProblem`](problem::DynamicProblem) wrapper
//! - [`algorithm`]: NSGA-II and MOCell with change detection and restart
//!   policies
//! - [`operators`]: selection, comparison and permutation operators
//! - [`ranking`]: non-dominated sorting and crowding distance
//! - [`channel`]: synchronous fan-out with fault isolation
//! - [`source`]: periodic record producers on the tokio runtime
//! - [`consumer`]: asynchronous result consumers with bounded queues
//! - [`runtime`]: ordered start and stop of all components
//! - [`tsp`]: bi-objective TSP with streaming edge updates
//!
//! # Architecture
//!
//! The algorithm loop is synchronous and runs on a blocking thread; sources
//! and consumers are tokio tasks. The problem is the only state shared
//! between them, and it is replaced atomically rather than mutated, so an
//! evaluation always sees one consistent parameter snapshot.

pub mod algorithm;
pub mod channel;
pub mod consumer;
pub mod error;
pub mod observed;
pub mod operators;
pub mod problem;
pub mod ranking;
pub mod runtime;
pub mod source;
pub mod tsp;
