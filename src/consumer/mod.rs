//! Result consumers.
//!
//! A consumer receives every solution set the algorithm publishes, on its
//! own tokio task behind its own bounded queue. A slow, failing or
//! panicking consumer never stalls the algorithm or the other consumers.
//!
//! - [`Consume`]: the extension point
//! - [`ConsumerSet`]: fan-out, one queue and one worker per consumer
//! - [`LatestFront`]: keeps the most recent set, queryable and watchable
//! - [`DirectoryOutput`]: writes `FUN{n}.tsv` / `VAR{n}.tsv` per set
//! - [`FrontLogger`]: logs a summary line per set

mod directory;
mod latest;
mod logger;
mod set;

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ConsumerError;
use crate::observed::AlgorithmObservedData;

pub use directory::DirectoryOutput;
pub use latest::LatestFront;
pub use logger::FrontLogger;
pub use set::{ConsumerSet, ConsumerStats};

/// Contract for result consumers.
///
/// Called from a consumer-dedicated worker task, one snapshot at a time, in
/// publish order. The snapshot is shared with the other consumers and is
/// immutable.
#[async_trait]
pub trait Consume<S: Send + Sync + 'static>: Send + Sync + 'static {
    /// Handles one published solution set.
    async fn on_data(&self, data: Arc<AlgorithmObservedData<S>>) -> Result<(), ConsumerError>;

    /// Human-readable name (for logs and stats).
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Preferred capacity of this consumer's queue.
    ///
    /// On overflow, snapshots for this consumer are **dropped** (warn).
    fn queue_capacity(&self) -> usize {
        1024
    }
}
