//! Data flowing over the runtime's channels.
//!
//! - [`ObservedRecord`]: one timestamped snapshot of external data, produced
//!   by a streaming source and consumed by a dynamic problem.
//! - [`AlgorithmObservedData`]: one published solution set, produced by the
//!   dynamic algorithm and consumed by result consumers.
//!
//! Both are immutable once built: fields are private and exposed through
//! accessors.

use chrono::{DateTime, Utc};

use crate::algorithm::Candidate;

/// Immutable, timestamped snapshot of externally changing data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObservedRecord<T> {
    sequence: u64,
    timestamp: DateTime<Utc>,
    data: T,
}

impl<T> ObservedRecord<T> {
    /// Wraps `data` with the current time.
    pub fn new(sequence: u64, data: T) -> Self {
        Self::at(sequence, Utc::now(), data)
    }

    /// Wraps `data` with an explicit timestamp.
    pub fn at(sequence: u64, timestamp: DateTime<Utc>, data: T) -> Self {
        Self {
            sequence,
            timestamp,
            data,
        }
    }

    /// Position of this record in its source's stream, starting at 1.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// When the record was created.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// The payload.
    pub fn data(&self) -> &T {
        &self.data
    }

    /// Consumes the record, returning the payload.
    pub fn into_data(self) -> T {
        self.data
    }
}

/// Snapshot of the algorithm's current solution set.
///
/// Consumers receive it behind an `Arc`; nothing in it can be mutated after
/// publication.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AlgorithmObservedData<S> {
    generation: usize,
    evaluations: u64,
    problem_version: u64,
    changes_detected: u64,
    timestamp: DateTime<Utc>,
    solutions: Vec<Candidate<S>>,
}

impl<S> AlgorithmObservedData<S> {
    pub(crate) fn new(
        generation: usize,
        evaluations: u64,
        problem_version: u64,
        changes_detected: u64,
        solutions: Vec<Candidate<S>>,
    ) -> Self {
        Self {
            generation,
            evaluations,
            problem_version,
            changes_detected,
            timestamp: Utc::now(),
            solutions,
        }
    }

    /// Generation after which this snapshot was taken.
    pub fn generation(&self) -> usize {
        self.generation
    }

    /// Evaluations spent so far.
    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    /// Problem version the published objectives were computed against.
    pub fn problem_version(&self) -> u64 {
        self.problem_version
    }

    /// Number of problem changes the algorithm has reacted to so far.
    pub fn changes_detected(&self) -> u64 {
        self.changes_detected
    }

    /// When the snapshot was taken.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Published solutions with their objectives.
    pub fn solutions(&self) -> &[Candidate<S>] {
        &self.solutions
    }

    /// Number of published solutions.
    pub fn len(&self) -> usize {
        self.solutions.len()
    }

    /// Whether nothing was published.
    pub fn is_empty(&self) -> bool {
        self.solutions.is_empty()
    }

    /// Objective vectors of the published solutions.
    pub fn objectives(&self) -> impl Iterator<Item = &[f64]> + '_ {
        self.solutions.iter().map(|c| c.objectives())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_accessors() {
        let ts = Utc::now();
        let rec = ObservedRecord::at(3, ts, vec![1.0, 2.0]);
        assert_eq!(rec.sequence(), 3);
        assert_eq!(rec.timestamp(), ts);
        assert_eq!(rec.data(), &vec![1.0, 2.0]);
        assert_eq!(rec.into_data(), vec![1.0, 2.0]);
    }

    #[test]
    fn test_observed_data_objectives() {
        let mut a = Candidate::new(0u8);
        a.set_evaluation(Ok(vec![1.0, 2.0]), 1);
        let mut b = Candidate::new(1u8);
        b.set_evaluation(Ok(vec![2.0, 1.0]), 1);

        let data = AlgorithmObservedData::new(4, 500, 1, 0, vec![a, b]);
        assert_eq!(data.generation(), 4);
        assert_eq!(data.evaluations(), 500);
        assert_eq!(data.len(), 2);
        let objs: Vec<&[f64]> = data.objectives().collect();
        assert_eq!(objs, vec![&[1.0, 2.0][..], &[2.0, 1.0][..]]);
    }
}
