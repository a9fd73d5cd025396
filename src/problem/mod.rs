//! Dynamic problem abstraction.
//!
//! - [`ProblemModel`]: problem-specific, stateless evaluation and update logic
//! - [`DynamicProblem`]: holds the changing parameters, absorbs observed
//!   records and exposes the pending-change flag to the algorithm

mod dynamic;
mod model;

pub use dynamic::{DynamicProblem, ParamsSnapshot};
pub use model::ProblemModel;
