use std::collections::BinaryHeap;

use itertools::Itertools;
use log::trace;
use rustc_hash::FxHashMap;

use crate::contractionpath::candidates::Candidate;
use crate::contractionpath::contraction_cost::result_size;
use crate::contractionpath::paths::{ContractionHeuristic, Proposal};
use crate::contractionpath::SimplePath;
use crate::tensornetwork::TensorNetwork;

/// A heuristic that explores possible pair contractions in a depth-first manner, pruning
/// branches that are more expensive than the best complete path found so far, or more
/// than `cutoff_flops_factor` times as expensive as the best partial path with the same
/// number of remaining nodes. A Rust adaption of the `branch` approach of `opt_einsum`,
/// found at <https://github.com/dgasmith/opt_einsum>.
///
/// Declines networks with more than `max_nodes` live nodes.
#[derive(Debug, Clone)]
pub struct BranchBound {
    max_nodes: usize,
    nbranch: Option<usize>,
    cutoff_flops_factor: f64,
}

impl Default for BranchBound {
    fn default() -> Self {
        Self {
            max_nodes: 8,
            nbranch: Some(3),
            cutoff_flops_factor: 4.,
        }
    }
}

/// Mutable state of a single search.
#[derive(Debug, Default)]
struct SearchState {
    best_flops: f64,
    best_size: f64,
    best_path: Option<SimplePath>,
    best_progress: FxHashMap<usize, f64>,
}

impl BranchBound {
    /// Creates a search over at most `max_nodes` nodes that follows the `nbranch`
    /// cheapest candidates per step (all if `None`).
    pub fn new(max_nodes: usize, nbranch: Option<usize>, cutoff_flops_factor: f64) -> Self {
        assert!(nbranch != Some(0), "At least one branch must be explored");
        assert!(cutoff_flops_factor >= 1., "The cutoff factor must be at least 1");
        Self {
            max_nodes,
            nbranch,
            cutoff_flops_factor,
        }
    }

    fn assess_candidate(
        &self,
        shape: &TensorNetwork,
        pair: (usize, usize),
        flops: f64,
        size: f64,
        remaining: usize,
        state: &mut SearchState,
    ) -> Option<Candidate> {
        let (a, b) = pair;
        let current_flops = flops + shape.contraction_cost(a, b);
        let current_size = size.max(result_size(shape, a, b));

        if current_flops > state.best_flops && current_size > state.best_size {
            return None;
        }
        let best_flops = *state.best_progress.entry(remaining).or_insert(current_flops);
        if current_flops < best_flops {
            state.best_progress.insert(remaining, current_flops);
        } else if current_flops > self.cutoff_flops_factor * best_flops {
            return None;
        }

        Some(Candidate {
            flop_cost: current_flops,
            size_cost: current_size,
            parent_ids: pair,
        })
    }

    fn branch_iterate(
        &self,
        shape: &TensorNetwork,
        path: &mut SimplePath,
        flops: f64,
        size: f64,
        state: &mut SearchState,
    ) {
        let remaining = shape.live_nodes().collect_vec();
        if remaining.len() <= 1 {
            if flops < state.best_flops {
                state.best_flops = flops;
                state.best_size = size;
                state.best_path = Some(path.clone());
            }
            return;
        }

        let pairs = remaining.iter().copied().tuple_combinations().collect_vec();
        let connected = pairs
            .iter()
            .copied()
            .filter(|&(a, b)| shape.node(a).links_to(b))
            .collect_vec();
        let pairs = if connected.is_empty() { pairs } else { connected };

        let mut candidates = BinaryHeap::new();
        for pair in pairs {
            if let Some(candidate) =
                self.assess_candidate(shape, pair, flops, size, remaining.len(), state)
            {
                candidates.push(candidate);
            }
        }

        let mut explored = 0;
        while self.nbranch.map_or(true, |n| explored < n) {
            let Some(Candidate {
                flop_cost,
                size_cost,
                parent_ids: (a, b),
            }) = candidates.pop()
            else {
                break;
            };
            explored += 1;
            let mut next = shape.clone();
            next.contract(a, b);
            path.push((a, b));
            self.branch_iterate(&next, path, flop_cost, size_cost, state);
            path.pop();
        }
    }
}

impl ContractionHeuristic for BranchBound {
    fn name(&self) -> &'static str {
        "branch-bound"
    }

    fn propose(&self, tn: &TensorNetwork) -> Option<Proposal> {
        let live = tn.live_nodes().count();
        if live > self.max_nodes {
            trace!(live, max_nodes = self.max_nodes; "Too many nodes for branch and bound");
            return None;
        }
        let shape = tn.stripped_subnet(|_| true);
        let mut state = SearchState {
            best_flops: f64::INFINITY,
            best_size: f64::INFINITY,
            ..Default::default()
        };
        self.branch_iterate(&shape, &mut Vec::new(), 0., 0., &mut state);

        let path = state.best_path?;
        Some(Proposal {
            cost: state.best_flops,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::contractionpath::contraction_cost::contract_path_cost;
    use crate::contractionpath::paths::greedy::{Greedy, GreedyScore};
    use crate::contractionpath::paths::tests::{check_proposal, setup_ring};
    use crate::path;
    use crate::tensornetwork::dense::DenseTensor;
    use crate::tensornetwork::indexed::create_tensor_network;

    #[test]
    fn test_branchbound_finds_optimum() {
        // a[i, j] b[j, k] c[k, l] d[l, m]: contracting the outer pairs first is optimal
        let tn = create_tensor_network(
            vec![
                (DenseTensor::ones(&[2, 10]).into(), vec![0, 1]),
                (DenseTensor::ones(&[10, 10]).into(), vec![1, 2]),
                (DenseTensor::ones(&[10, 10]).into(), vec![2, 3]),
                (DenseTensor::ones(&[10, 2]).into(), vec![3, 4]),
            ],
            &[0, 4],
        )
        .stripped_subnet(|_| true);
        let proposal = BranchBound::new(8, None, 100.).propose(&tn).unwrap();
        check_proposal(&tn, &proposal);
        // (0, 1) and (2, 3) cost 200 each, the final contraction 40
        assert_eq!(proposal.cost, 440.);
        assert!(proposal.cost <= contract_path_cost(&tn, &path![(1, 2), (0, 1), (0, 3)]));
    }

    #[test]
    fn test_branchbound_not_worse_than_greedy() {
        let tn = setup_ring();
        let exhaustive = BranchBound::new(8, None, f64::INFINITY).propose(&tn).unwrap();
        check_proposal(&tn, &exhaustive);
        let greedy = Greedy::new(GreedyScore::Cost).propose(&tn).unwrap();
        assert!(exhaustive.cost <= greedy.cost);
    }

    #[test]
    fn test_branchbound_declines_large_networks() {
        let tn = setup_ring();
        assert!(BranchBound::new(4, Some(3), 4.).propose(&tn).is_none());
        assert!(BranchBound::new(5, Some(1), 4.).propose(&tn).is_some());
    }

    #[test]
    #[should_panic(expected = "At least one branch must be explored")]
    fn test_zero_branches() {
        BranchBound::new(8, Some(0), 4.);
    }
}
