//! Bounded non-dominated archive.

use super::Candidate;
use crate::ranking::{crowding_distance, dominance, Dominance};

/// Non-dominated set of bounded size.
///
/// When full, the member with the smallest crowding distance is evicted, so
/// the boundary points of the front are always kept.
#[derive(Debug, Clone)]
pub(crate) struct CrowdingArchive<S> {
    capacity: usize,
    members: Vec<Candidate<S>>,
}

impl<S: Clone> CrowdingArchive<S> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            members: Vec::with_capacity(capacity + 1),
        }
    }

    pub(crate) fn members(&self) -> &[Candidate<S>] {
        &self.members
    }

    pub(crate) fn clear(&mut self) {
        self.members.clear();
    }

    /// Offers a copy of `candidate`. Returns `true` if it is in the archive
    /// afterwards.
    ///
    /// Infeasible candidates and candidates dominated by (or equal to) a
    /// member are refused; members dominated by the newcomer are dropped.
    pub(crate) fn offer(&mut self, candidate: &Candidate<S>) -> bool {
        if !candidate.is_feasible() {
            return false;
        }
        let objs = candidate.objectives();
        let mut refused = false;
        self.members.retain(|m| {
            if refused {
                return true;
            }
            match dominance(m.objectives(), objs) {
                Dominance::Left => {
                    refused = true;
                    true
                }
                Dominance::Right => false,
                Dominance::Neither => {
                    refused = m.objectives() == objs;
                    true
                }
            }
        });
        if refused {
            return false;
        }

        self.members.push(candidate.clone());
        if self.members.len() <= self.capacity {
            return true;
        }

        let objectives: Vec<&[f64]> = self.members.iter().map(|m| m.objectives()).collect();
        let distances = crowding_distance(&objectives);
        let evict = distances
            .iter()
            .enumerate()
            .min_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(i, _)| i)
            .unwrap_or(self.members.len() - 1);
        let newcomer = self.members.len() - 1;
        self.members.remove(evict);
        evict != newcomer
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EvaluationError;

    fn cand(objs: &[f64]) -> Candidate<u8> {
        let mut c = Candidate::new(0);
        c.set_evaluation(Ok(objs.to_vec()), 0);
        c
    }

    #[test]
    fn test_dominated_offer_is_refused() {
        let mut archive = CrowdingArchive::new(10);
        assert!(archive.offer(&cand(&[1.0, 1.0])));
        assert!(!archive.offer(&cand(&[2.0, 2.0])));
        assert!(!archive.offer(&cand(&[1.0, 1.0])), "duplicates are refused");
        assert_eq!(archive.members().len(), 1);
    }

    #[test]
    fn test_dominating_offer_evicts_members() {
        let mut archive = CrowdingArchive::new(10);
        archive.offer(&cand(&[2.0, 3.0]));
        archive.offer(&cand(&[3.0, 2.0]));
        assert!(archive.offer(&cand(&[1.0, 1.0])));
        assert_eq!(archive.members().len(), 1);
    }

    #[test]
    fn test_infeasible_is_refused() {
        let mut archive = CrowdingArchive::new(10);
        let mut c = cand(&[1.0, 1.0]);
        c.set_evaluation(Err(EvaluationError::Failed("x".into())), 0);
        assert!(!archive.offer(&c));
    }

    #[test]
    fn test_capacity_keeps_extremes() {
        let mut archive = CrowdingArchive::new(3);
        for &(a, b) in &[(0.0, 10.0), (10.0, 0.0), (5.0, 5.0), (4.0, 6.0)] {
            archive.offer(&cand(&[a, b]));
        }
        assert_eq!(archive.members().len(), 3);
        let objs: Vec<&[f64]> = archive.members().iter().map(|m| m.objectives()).collect();
        assert!(objs.contains(&[0.0, 10.0].as_slice()));
        assert!(objs.contains(&[10.0, 0.0].as_slice()));
    }

    #[test]
    fn test_clear() {
        let mut archive = CrowdingArchive::new(3);
        archive.offer(&cand(&[1.0, 2.0]));
        archive.clear();
        assert!(archive.members().is_empty());
    }
}
