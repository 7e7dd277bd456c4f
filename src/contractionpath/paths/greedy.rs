use std::collections::BinaryHeap;

use itertools::Itertools;
use log::trace;

use crate::contractionpath::candidates::Candidate;
use crate::contractionpath::contraction_cost::contract_size_nodes;
use crate::contractionpath::paths::{ContractionHeuristic, Proposal};
use crate::tensornetwork::{NodeIndex, TensorNetwork};

/// The quantity a [`Greedy`] search minimizes in each step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GreedyScore {
    /// Number of multiplications of the contraction.
    Cost,
    /// Size of the result minus the sizes of both inputs.
    Memory,
}

/// A heuristic that repeatedly contracts the pair with the best score. Only pairs that
/// share a link are considered, unless no such pair is left.
#[derive(Debug, Clone)]
pub struct Greedy {
    score: GreedyScore,
}

impl Greedy {
    pub fn new(score: GreedyScore) -> Self {
        Self { score }
    }

    fn candidate(&self, tn: &TensorNetwork, a: NodeIndex, b: NodeIndex) -> Candidate {
        let flops = tn.contraction_cost(a, b);
        let memory = contract_size_nodes(tn, a, b);
        let (flop_cost, size_cost) = match self.score {
            GreedyScore::Cost => (flops, memory),
            GreedyScore::Memory => (memory, flops),
        };
        Candidate {
            flop_cost,
            size_cost,
            parent_ids: (a, b),
        }
    }
}

impl ContractionHeuristic for Greedy {
    fn name(&self) -> &'static str {
        match self.score {
            GreedyScore::Cost => "greedy-cost",
            GreedyScore::Memory => "greedy-memory",
        }
    }

    fn propose(&self, tn: &TensorNetwork) -> Option<Proposal> {
        let mut shape = tn.stripped_subnet(|_| true);
        let mut path = Vec::new();
        let mut cost = 0.0;
        loop {
            let live = shape.live_nodes().collect_vec();
            if live.len() < 2 {
                break;
            }
            let pairs = live.iter().copied().tuple_combinations().collect_vec();
            let mut queue = pairs
                .iter()
                .filter(|&&(a, b)| shape.node(a).links_to(b))
                .map(|&(a, b)| self.candidate(&shape, a, b))
                .collect::<BinaryHeap<_>>();
            if queue.is_empty() {
                queue = pairs
                    .iter()
                    .map(|&(a, b)| self.candidate(&shape, a, b))
                    .collect();
            }
            let Some(Candidate { parent_ids: (a, b), .. }) = queue.pop() else {
                break;
            };
            trace!(a, b; "Greedy step");
            cost += shape.contraction_cost(a, b);
            shape.contract(a, b);
            path.push((a, b));
        }
        Some(Proposal { cost, path })
    }
}
