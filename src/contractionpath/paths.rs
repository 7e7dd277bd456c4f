//! Contraction order heuristics.
//!
//! A heuristic looks at a payload-free network and proposes an ordered list of pairwise
//! contractions together with the estimated cost of executing it. The heuristics a
//! network may use are collected in a [`ContractionConfig`].

use std::fmt::Debug;

use crate::contractionpath::SimplePath;
use crate::tensornetwork::TensorNetwork;

pub mod branchbound;
pub mod greedy;
pub mod left_to_right;

use branchbound::BranchBound;
use greedy::{Greedy, GreedyScore};
use left_to_right::LeftToRight;

/// A contraction order together with its estimated cost.
#[derive(Debug, Clone, PartialEq)]
pub struct Proposal {
    /// Summed cost of all pairwise contractions of `path`.
    pub cost: f64,
    /// Pairwise contractions in replace-left format.
    pub path: SimplePath,
}

/// Finds a contraction order that contracts all live nodes of a network into one.
pub trait ContractionHeuristic: Debug + Send + Sync {
    /// Name used in log output.
    fn name(&self) -> &'static str;

    /// Proposes an order for contracting all live nodes of `tn` into a single node, or
    /// `None` if the heuristic does not apply. `tn` carries no payloads.
    fn propose(&self, tn: &TensorNetwork) -> Option<Proposal>;
}

/// Ordered collection of the heuristics that are tried when contracting more than three
/// nodes. The proposal with the lowest cost wins; on equal cost, the earlier heuristic.
#[derive(Debug)]
pub struct ContractionConfig {
    heuristics: Vec<Box<dyn ContractionHeuristic>>,
}

impl ContractionConfig {
    /// Creates a configuration that tries exactly `heuristics`, in order.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::contractionpath::paths::ContractionConfig;
    /// # use tncompress::contractionpath::paths::left_to_right::LeftToRight;
    /// let config = ContractionConfig::new(vec![Box::new(LeftToRight)]);
    /// assert_eq!(config.heuristics().len(), 1);
    /// ```
    pub fn new(heuristics: Vec<Box<dyn ContractionHeuristic>>) -> Self {
        Self { heuristics }
    }

    #[inline]
    pub fn heuristics(&self) -> &[Box<dyn ContractionHeuristic>] {
        &self.heuristics
    }

    /// Appends a heuristic that is tried after the existing ones.
    pub fn push(&mut self, heuristic: Box<dyn ContractionHeuristic>) {
        self.heuristics.push(heuristic);
    }
}

impl Default for ContractionConfig {
    fn default() -> Self {
        Self::new(vec![
            Box::new(Greedy::new(GreedyScore::Cost)),
            Box::new(Greedy::new(GreedyScore::Memory)),
            Box::new(BranchBound::default()),
            Box::new(LeftToRight),
        ])
    }
}
