use std::cmp::Ordering;

use crate::tensornetwork::NodeIndex;

/// Struct to store contraction candidate information when searching for a contraction path.
///
/// Candidates are ordered such that a [`BinaryHeap`](std::collections::BinaryHeap) pops the
/// cheapest one first: lowest `flop_cost`, then lowest `size_cost`, then smallest ids.
#[derive(Clone, Debug)]
pub(crate) struct Candidate {
    pub(crate) flop_cost: f64,
    pub(crate) size_cost: f64,
    pub(crate) parent_ids: (NodeIndex, NodeIndex),
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate {}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .flop_cost
            .total_cmp(&self.flop_cost)
            .then_with(|| other.size_cost.total_cmp(&self.size_cost))
            .then_with(|| other.parent_ids.cmp(&self.parent_ids))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
