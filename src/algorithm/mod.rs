//! Dynamic multi-objective evolutionary algorithm.
//!
//! A population-based search that never assumes its problem is fixed. Each
//! generation it checks the problem's pending-change flag; on a change the
//! population is invalidated and rebuilt according to a [`RestartPolicy`],
//! then the search goes on with the same budget.
//!
//! # Key Types
//!
//! - [`DynamicConfig`]: population size, budget, restart policy, publish cadence
//! - [`DynamicAlgorithmBuilder`]: wires operators and validates the config
//! - [`DynamicAlgorithm`]: the loop; [`run`](DynamicAlgorithm::run) blocks
//! - [`Candidate`]: population member with objectives and evaluation version
//! - [`RunReport`]: counters and final front
//!
//! # Variants
//!
//! - [`Variant::Nsga2`]: generational, elitist truncation by rank and crowding
//! - [`Variant::MoCell`]: cellular, C9 neighbourhood, crowding archive

mod archive;
mod builder;
mod candidate;
mod config;
mod runner;

pub use builder::DynamicAlgorithmBuilder;
pub use candidate::Candidate;
pub use config::{DynamicConfig, PublishScope, RestartPolicy, Variant};
pub use runner::{AlgorithmState, DynamicAlgorithm, FrontChannel, Phase, RunReport, Termination};
