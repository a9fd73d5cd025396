//! Bi-objective travelling salesman problem with streaming edge updates.
//!
//! - [`TspInstance`]: TSPLIB `EUC_2D` parser
//! - [`MultiobjectiveTsp`]: tour length under a distance and a cost matrix
//! - [`RandomMatrixUpdates`]: source of random [`MatrixUpdate`] batches
//!
//! ```ignore
//! let problem = Arc::new(MultiobjectiveTsp::from_files("kroA100.tsp", "kroB100.tsp")?);
//! let updates = RandomMatrixUpdates::new(problem.model().cities(), 7);
//! ```

mod instance;
mod problem;
mod source;

pub use instance::{Matrix, TspInstance};
pub use problem::{MatrixUpdate, MultiobjectiveTsp, TspMatrices, TspObjective};
pub use source::RandomMatrixUpdates;
