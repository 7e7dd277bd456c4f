//! Tensors represented as graphs of smaller tensors.
//!
//! A [`TensorNetwork`] stores its nodes in an arena addressed by [`NodeIndex`]. Links
//! refer to other nodes by index and position, so every modification of a link has to
//! be mirrored on the other end (or in the external index list). Contractions leave
//! erased slots behind; [`TensorNetwork::sanitize`] removes them and is the only
//! operation that renumbers nodes.

use std::ops::{DivAssign, MulAssign};
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, trace};

use crate::contractionpath::paths::ContractionConfig;
use crate::tensornetwork::dense::multi_index;
use crate::tensornetwork::indexed::IndexedNetwork;
use crate::tensornetwork::link::Link;
use crate::tensornetwork::node::TensorNode;
use crate::tensornetwork::tensordata::TensorData;

pub mod contraction;
pub mod dense;
pub mod export;
pub mod factorization;
pub mod indexed;
pub mod link;
pub mod node;
pub mod rounding;
pub mod sparse;
pub mod subnetwork;
pub mod tensordata;

/// Index of a node in a [`TensorNetwork`].
pub type NodeIndex = usize;

/// A tensor given as a network of nodes connected by contraction edges.
#[derive(Debug, Clone)]
pub struct TensorNetwork {
    pub(crate) nodes: Vec<TensorNode>,
    /// For every external index, the node mode that carries it.
    pub(crate) external_links: Vec<Link>,
    pub(crate) dimensions: Vec<usize>,
    pub(crate) config: Arc<ContractionConfig>,
}

impl TensorNetwork {
    /// Creates a network of a single node holding `tensor`, with all modes external.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::tensornetwork::{TensorNetwork, dense::DenseTensor};
    /// let tn = TensorNetwork::from_tensor(DenseTensor::ones(&[2, 3]));
    /// assert_eq!(tn.degree(), 2);
    /// assert_eq!(tn.dimensions(), &[2, 3]);
    /// assert_eq!(tn.entry(&[1, 2]), 1.0);
    /// ```
    pub fn from_tensor(tensor: impl Into<TensorData>) -> Self {
        let tensor = tensor.into();
        let dimensions = tensor.dimensions().to_vec();
        let neighbors = dimensions
            .iter()
            .enumerate()
            .map(|(i, &d)| Link::external(i, d))
            .collect();
        let external_links = dimensions
            .iter()
            .enumerate()
            .map(|(i, &d)| Link::internal(0, i, d))
            .collect();
        Self {
            nodes: vec![TensorNode::new(tensor, neighbors)],
            external_links,
            dimensions,
            config: Arc::default(),
        }
    }

    /// Creates a network of degree zero holding `value`.
    pub fn scalar(value: f64) -> Self {
        Self::from_tensor(TensorData::scalar(value))
    }

    /// Assembles a network from its parts. The dimensions are taken from `external_links`.
    ///
    /// # Panics
    /// Panics if the parts do not form a valid network.
    pub fn from_parts(nodes: Vec<TensorNode>, external_links: Vec<Link>) -> Self {
        let dimensions = external_links.iter().map(|l| l.dimension).collect();
        let tn = Self {
            nodes,
            external_links,
            dimensions,
            config: Arc::default(),
        };
        tn.require_valid_network();
        tn
    }

    /// Replaces the contraction heuristics used by this network (and its future copies).
    #[must_use]
    pub fn with_config(mut self, config: Arc<ContractionConfig>) -> Self {
        self.config = config;
        self
    }

    /// Replaces the contraction heuristics in place.
    pub fn set_config(&mut self, config: Arc<ContractionConfig>) {
        self.config = config;
    }

    #[inline]
    pub fn config(&self) -> &Arc<ContractionConfig> {
        &self.config
    }

    /// The number of external indices.
    #[inline]
    pub fn degree(&self) -> usize {
        self.dimensions.len()
    }

    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    /// All node slots, including erased ones.
    #[inline]
    pub fn nodes(&self) -> &[TensorNode] {
        &self.nodes
    }

    #[inline]
    pub fn node(&self, id: NodeIndex) -> &TensorNode {
        &self.nodes[id]
    }

    #[inline]
    pub fn external_links(&self) -> &[Link] {
        &self.external_links
    }

    /// Ids of all nodes that are not erased.
    pub fn live_nodes(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| !n.erased)
            .map(|(i, _)| i)
    }

    /// Total number of stored payload entries.
    pub fn datasize(&self) -> usize {
        self.nodes
            .iter()
            .filter_map(|n| n.tensor.as_deref())
            .map(|t| match t {
                TensorData::Dense(d) => d.size(),
                TensorData::Sparse(s) => s.nnz(),
            })
            .sum()
    }

    /// Replaces the payload of node `id` by a payload of the same dimensions.
    pub fn replace_tensor(&mut self, id: NodeIndex, tensor: TensorData) {
        let node = &self.nodes[id];
        assert!(!node.erased, "Node {id} is erased");
        assert!(
            node.neighbors
                .iter()
                .map(|l| l.dimension)
                .eq(tensor.dimensions().iter().copied()),
            "Payload dimensions {:?} do not match node {id}",
            tensor.dimensions()
        );
        self.nodes[id].set_tensor(tensor);
    }

    /// Checks all structural invariants, including that erased slots are empty.
    ///
    /// # Panics
    /// Panics on the first violated invariant.
    pub fn require_valid_network(&self) {
        self.require_valid_network_with(true);
    }

    /// Like [`Self::require_valid_network`], but erased slots may keep links. Used on
    /// intermediate networks whose erased slots have not been cleaned up.
    #[cfg(not(feature = "trusted"))]
    pub(crate) fn require_valid_network_with(&self, check_erased: bool) {
        assert_eq!(
            self.external_links.len(),
            self.dimensions.len(),
            "External link count does not match the degree"
        );
        assert!(!self.nodes.is_empty(), "A network needs at least one node");

        for (n, el) in self.external_links.iter().enumerate() {
            assert!(el.other < self.nodes.len(), "External link {n} points to missing node");
            assert!(el.dimension > 0, "External link {n} has dimension zero");
            assert_eq!(el.dimension, self.dimensions[n], "External link {n} has wrong dimension");
            assert!(!el.external, "External link {n} is flagged external");
            let node = &self.nodes[el.other];
            assert!(!node.erased, "External link {n} points to erased node {}", el.other);
            assert!(
                el.index_position < node.degree(),
                "External link {n} points to missing mode"
            );
            let back = &node.neighbors[el.index_position];
            assert!(back.external, "Node mode of external link {n} is not external");
            assert_eq!(back.index_position, n, "Back position of external link {n} is wrong");
            assert_eq!(back.dimension, el.dimension, "External link {n} dimension mismatch");
        }

        for (n, node) in self.nodes.iter().enumerate() {
            if node.erased && check_erased {
                assert!(
                    node.neighbors.is_empty() && node.tensor.is_none(),
                    "Erased node {n} still holds links or data"
                );
            }
            if let Some(tensor) = &node.tensor {
                assert_eq!(
                    node.degree(),
                    tensor.degree(),
                    "Degree of node {n} does not match its payload"
                );
            }
            for (i, el) in node.neighbors.iter().enumerate() {
                assert!(el.dimension > 0, "Link {i} of node {n} has dimension zero");
                if let Some(tensor) = &node.tensor {
                    assert_eq!(
                        el.dimension,
                        tensor.dimensions()[i],
                        "Link {i} of node {n} does not match the payload dimension"
                    );
                }
                if el.external {
                    assert!(
                        el.index_position < self.external_links.len(),
                        "Link {i} of node {n} points to missing external index"
                    );
                    let back = &self.external_links[el.index_position];
                    assert!(
                        back.other == n && back.index_position == i,
                        "External index {} does not point back to node {n} mode {i}",
                        el.index_position
                    );
                } else {
                    assert!(
                        el.other < self.nodes.len(),
                        "Link {i} of node {n} points to missing node"
                    );
                    let other = &self.nodes[el.other];
                    assert!(
                        !other.erased || !check_erased,
                        "Link {i} of node {n} points to erased node {}",
                        el.other
                    );
                    assert!(
                        el.index_position < other.degree(),
                        "Link {i} of node {n} points to missing mode"
                    );
                    let back = &other.neighbors[el.index_position];
                    assert!(
                        back.links(n) && back.index_position == i,
                        "Link {i} of node {n} is not mirrored by node {}",
                        el.other
                    );
                    assert_eq!(
                        back.dimension, el.dimension,
                        "Link {i} of node {n} has a dimension mismatch"
                    );
                }
            }
        }
    }

    #[cfg(feature = "trusted")]
    #[inline]
    pub(crate) fn require_valid_network_with(&self, _check_erased: bool) {}

    /// Exchanges the external indices `i` and `j` without touching any payload.
    pub fn swap_external_links(&mut self, i: usize, j: usize) {
        let li = self.external_links[i];
        let lj = self.external_links[j];
        self.nodes[li.other].neighbors[li.index_position].index_position = j;
        self.nodes[lj.other].neighbors[lj.index_position].index_position = i;
        self.external_links.swap(i, j);
        self.dimensions.swap(i, j);
    }

    /// Appends the nodes and external indices of `other`. No links are created.
    pub fn add_network(&mut self, other: TensorNetwork) {
        let node_offset = self.nodes.len();
        let external_offset = self.external_links.len();

        self.dimensions.extend(other.dimensions);
        self.external_links
            .extend(other.external_links.into_iter().map(|mut l| {
                l.other += node_offset;
                l
            }));
        self.nodes.extend(other.nodes.into_iter().map(|mut node| {
            for link in &mut node.neighbors {
                if link.external {
                    link.index_position += external_offset;
                } else {
                    link.other += node_offset;
                }
            }
            node
        }));
        self.require_valid_network_with(false);
    }

    /// Contracts all nodes and returns the payload, with modes in external index order.
    pub fn fully_contracted_tensor(&self) -> TensorData {
        self.require_valid_network_with(false);
        let mut tn = self.clone();
        let live = tn.live_nodes().collect_vec();
        let Some(result) = tn.contract_nodes(live) else {
            unreachable!("a valid network has at least one live node")
        };
        let node = &tn.nodes[result];
        let shuffle = node
            .neighbors
            .iter()
            .map(|l| {
                assert!(l.external, "Internal Error: contraction left an internal link");
                l.index_position
            })
            .collect_vec();
        node.tensor().reshuffle(&shuffle)
    }

    /// Returns the entry at the multi-index `positions`.
    ///
    /// # Panics
    /// Panics if the number of positions does not match the degree or a position is out
    /// of range.
    pub fn entry(&self, positions: &[usize]) -> f64 {
        self.require_valid_network_with(false);
        assert_eq!(
            positions.len(),
            self.degree(),
            "Index count mismatch: got {} positions for a network of degree {}",
            positions.len(),
            self.degree()
        );
        for (mode, (&position, &dimension)) in positions.iter().zip(&self.dimensions).enumerate() {
            assert!(
                position < dimension,
                "Position {position} out of range for mode {mode} of dimension {dimension}"
            );
        }

        let mut partial = self.clone();
        for id in 0..partial.nodes.len() {
            if !partial.nodes[id].erased && partial.nodes[id].links_to(id) {
                partial.trace_out_self_links(id);
            }
        }
        partial.external_links.clear();
        partial.dimensions.clear();

        for id in 0..partial.nodes.len() {
            if partial.nodes[id].erased {
                continue;
            }
            let node = &mut partial.nodes[id];
            for i in (0..node.neighbors.len()).rev() {
                let link = node.neighbors[i];
                if link.external {
                    let fixed = node.tensor().fix_slate(i, positions[link.index_position]);
                    node.set_tensor(fixed);
                }
            }
            node.neighbors.retain(|l| !l.external);

            for i in 0..partial.nodes[id].neighbors.len() {
                let link = partial.nodes[id].neighbors[i];
                partial.nodes[link.other].neighbors[link.index_position].index_position = i;
            }
        }

        partial.contract_unconnected_subnetworks();
        assert_eq!(partial.nodes.len(), 1, "Internal Error: network did not collapse");
        partial.nodes[0].tensor().get(&[])
    }

    /// Returns the entry at the row-major linear `position`.
    pub fn entry_linear(&self, position: usize) -> f64 {
        let size = self.dimensions.iter().product::<usize>();
        assert!(position < size, "Position {position} out of range for size {size}");
        self.entry(&multi_index(&self.dimensions, position))
    }

    /// Removes the external index `mode` by fixing it to `position`.
    pub fn fix_slate(&mut self, mode: usize, position: usize) {
        self.require_valid_network_with(false);
        assert!(mode < self.degree(), "Mode {mode} exceeds the degree {}", self.degree());
        assert!(
            position < self.dimensions[mode],
            "Position {position} out of range for mode {mode} of dimension {}",
            self.dimensions[mode]
        );
        trace!(mode, position; "Fixing slate");

        let Link {
            other: id,
            index_position: slot,
            ..
        } = self.external_links[mode];

        let fixed = self.nodes[id].tensor().fix_slate(slot, position);
        self.nodes[id].set_tensor(fixed);

        for i in slot + 1..self.nodes[id].neighbors.len() {
            let link = self.nodes[id].neighbors[i];
            if link.external {
                self.external_links[link.index_position].index_position -= 1;
            } else {
                self.nodes[link.other].neighbors[link.index_position].index_position -= 1;
            }
        }
        self.nodes[id].neighbors.remove(slot);

        for i in mode + 1..self.external_links.len() {
            let link = self.external_links[i];
            self.nodes[link.other].neighbors[link.index_position].index_position -= 1;
        }
        self.external_links.remove(mode);
        self.dimensions.remove(mode);

        self.contract_unconnected_subnetworks();
    }

    /// Evaluates many entries. Tuples sharing a prefix reuse the partially fixed networks,
    /// so sorted or clustered queries are cheap. Values are returned in the given order.
    pub fn measure(&self, positions: &[Vec<usize>]) -> Vec<f64> {
        let degree = self.degree();
        let order = (0..positions.len())
            .sorted_by(|&a, &b| positions[a].cmp(&positions[b]))
            .collect_vec();

        let mut base = self.clone();
        base.reduce_representation();
        let mut stack = Vec::with_capacity(degree + 1);
        stack.push(base);

        let mut values = vec![0.0; positions.len()];
        let mut previous: Option<&[usize]> = None;
        for m in order {
            let current = positions[m].as_slice();
            assert_eq!(current.len(), degree, "Measurement {m} has wrong length");
            let common = previous.map_or(0, |prev| {
                prev.iter().zip(current).take_while(|(a, b)| a == b).count()
            });
            stack.truncate(common + 1);
            for &position in &current[common..] {
                let Some(top) = stack.last() else {
                    unreachable!("the stack always holds the base network")
                };
                let mut next = top.clone();
                next.fix_slate(0, position);
                next.reduce_representation();
                stack.push(next);
            }
            values[m] = stack[degree].entry(&[]);
            previous = Some(current);
        }
        debug!(count = positions.len(); "Measured entries");
        values
    }

    /// Multiplies the represented tensor by `factor`.
    pub fn scale(&mut self, factor: f64) {
        let Some(id) = self.nodes.iter().position(|n| !n.erased && n.has_tensor()) else {
            panic!("Cannot scale a network without payloads")
        };
        self.nodes[id].tensor_mut().scale(factor);
    }

    /// Divides the represented tensor by `divisor`.
    pub fn divide(&mut self, divisor: f64) {
        self.scale(divisor.recip());
    }

    /// The Frobenius norm of the represented tensor.
    pub fn frob_norm(&self) -> f64 {
        let legs = (0..self.degree()).collect_vec();
        let lhs = IndexedNetwork::new(self.clone(), legs.clone());
        let rhs = IndexedNetwork::new(self.clone(), legs);
        (lhs * rhs).evaluate(&[]).get(&[]).max(0.0).sqrt()
    }
}

impl MulAssign<f64> for TensorNetwork {
    fn mul_assign(&mut self, rhs: f64) {
        self.scale(rhs);
    }
}

impl DivAssign<f64> for TensorNetwork {
    fn div_assign(&mut self, rhs: f64) {
        self.divide(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::assert_approx_eq;
    use rand::{rngs::StdRng, SeedableRng};

    use crate::contractionpath::paths::{left_to_right::LeftToRight, ContractionHeuristic};
    use crate::random::{random_dense, random_tensor_train};
    use crate::tensornetwork::dense::DenseTensor;

    #[test]
    fn test_from_tensor_roundtrip() {
        let mut rng = StdRng::seed_from_u64(1);
        let tensor = random_dense(&[2, 3, 4], &mut rng);
        let tn = TensorNetwork::from_tensor(tensor.clone());
        tn.require_valid_network();
        assert_approx_eq!(
            &TensorData,
            &tn.fully_contracted_tensor(),
            &TensorData::Dense(tensor.clone())
        );
        assert_approx_eq!(f64, tn.entry(&[1, 2, 3]), tensor.get(&[1, 2, 3]));
        assert_approx_eq!(f64, tn.entry_linear(23), tensor.get(&[1, 2, 3]));
    }

    #[test]
    fn test_scalar_network() {
        let tn = TensorNetwork::scalar(2.5);
        assert_eq!(tn.degree(), 0);
        assert_approx_eq!(f64, tn.entry(&[]), 2.5);
        assert_approx_eq!(f64, tn.entry_linear(0), 2.5);
    }

    #[test]
    #[should_panic(expected = "Index count mismatch")]
    fn test_entry_wrong_count() {
        TensorNetwork::from_tensor(DenseTensor::ones(&[2, 2])).entry(&[0]);
    }

    #[test]
    #[should_panic(expected = "Position 2 out of range for mode 1 of dimension 2")]
    fn test_entry_out_of_range() {
        TensorNetwork::from_tensor(DenseTensor::ones(&[2, 2])).entry(&[0, 2]);
    }

    #[test]
    fn test_swap_external_links() {
        let tensor = DenseTensor::from_vec(&[2, 3], (0..6).map(f64::from).collect());
        let mut tn = TensorNetwork::from_tensor(tensor.clone());
        tn.swap_external_links(0, 1);
        tn.require_valid_network();
        assert_eq!(tn.dimensions(), &[3, 2]);
        assert_approx_eq!(f64, tn.entry(&[2, 1]), tensor.get(&[1, 2]));
        assert_approx_eq!(
            &TensorData,
            &tn.fully_contracted_tensor(),
            &TensorData::Dense(tensor.reshuffle(&[1, 0]))
        );
    }

    #[test]
    fn test_fix_slate_on_train() {
        let mut rng = StdRng::seed_from_u64(8);
        let tn = random_tensor_train(&[2, 3, 2], &[2, 2], &mut rng);
        let full = tn.fully_contracted_tensor();
        let mut fixed = tn.clone();
        fixed.fix_slate(1, 2);
        fixed.require_valid_network();
        assert_eq!(fixed.dimensions(), &[2, 2]);
        for i in 0..2 {
            for k in 0..2 {
                assert_approx_eq!(f64, fixed.entry(&[i, k]), full.get(&[i, 2, k]), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_measure_keeps_caller_order() {
        let mut rng = StdRng::seed_from_u64(3);
        let tn = random_tensor_train(&[2, 2, 3], &[3, 2], &mut rng);
        let positions = vec![
            vec![1, 1, 2],
            vec![0, 0, 0],
            vec![1, 0, 2],
            vec![1, 1, 2],
            vec![0, 1, 1],
        ];
        let values = tn.measure(&positions);
        assert_eq!(values.len(), positions.len());
        for (value, position) in values.iter().zip(&positions) {
            assert_approx_eq!(f64, *value, tn.entry(position), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_scale_and_norm() {
        let tensor = DenseTensor::from_vec(&[2, 2], vec![1., 2., 3., 4.]);
        let mut tn = TensorNetwork::from_tensor(tensor.clone());
        assert_approx_eq!(f64, tn.frob_norm(), tensor.frob_norm(), epsilon = 1e-12);
        tn *= 2.0;
        assert_approx_eq!(f64, tn.entry(&[1, 1]), 8.0);
        tn /= 4.0;
        assert_approx_eq!(f64, tn.entry(&[1, 0]), 1.5);
    }

    #[test]
    fn test_copies_share_payloads_until_written() {
        let tn = TensorNetwork::from_tensor(DenseTensor::ones(&[2]));
        let mut copy = tn.clone();
        copy.scale(3.0);
        assert_approx_eq!(f64, tn.entry(&[0]), 1.0);
        assert_approx_eq!(f64, copy.entry(&[0]), 3.0);
        assert!(Arc::ptr_eq(tn.config(), copy.config()));
    }

    #[test]
    fn test_set_config_applies_to_later_copies() {
        let mut tn = TensorNetwork::from_tensor(DenseTensor::ones(&[2]));
        let heuristics: Vec<Box<dyn ContractionHeuristic>> = vec![Box::new(LeftToRight)];
        let config = Arc::new(ContractionConfig::new(heuristics));
        tn.set_config(config.clone());
        assert!(Arc::ptr_eq(tn.config(), &config));
        assert!(Arc::ptr_eq(tn.clone().config(), &config));
        assert_eq!(tn.config().heuristics().len(), 1);
    }

    #[test]
    fn test_add_network_is_outer_product() {
        let mut tn = TensorNetwork::from_tensor(DenseTensor::from_vec(&[2], vec![1., 2.]));
        tn.add_network(TensorNetwork::from_tensor(DenseTensor::from_vec(&[3], vec![1., 10., 100.])));
        tn.require_valid_network();
        assert_eq!(tn.dimensions(), &[2, 3]);
        assert_approx_eq!(f64, tn.entry(&[1, 2]), 200.0);
        assert_eq!(tn.datasize(), 5);
    }

    #[test]
    #[cfg(not(feature = "trusted"))]
    #[should_panic(expected = "is not mirrored")]
    fn test_invalid_parts_rejected() {
        let a = TensorNode::new(
            TensorData::Dense(DenseTensor::ones(&[2])),
            vec![Link::internal(1, 0, 2)],
        );
        let b = TensorNode::new(
            TensorData::Dense(DenseTensor::ones(&[2, 2])),
            vec![Link::internal(0, 0, 2), Link::internal(0, 0, 2)],
        );
        TensorNetwork::from_parts(vec![a, b], Vec::new());
    }
}
