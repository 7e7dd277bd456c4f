//! Contraction expressions on labeled external indices.
//!
//! Every external index of an [`IndexedNetwork`] carries a label. Multiplying two
//! indexed networks joins them and links all indices that share a label.

use std::ops::Mul;

use itertools::Itertools;

use crate::tensornetwork::{tensordata::TensorData, TensorNetwork};

/// Label of an external index.
pub type EdgeIndex = usize;

/// A tensor network whose external indices are labeled.
#[derive(Debug, Clone)]
pub struct IndexedNetwork {
    network: TensorNetwork,
    legs: Vec<EdgeIndex>,
}

impl IndexedNetwork {
    /// Labels the external indices of `network`. A label given twice links the two
    /// indices, which traces over them.
    pub fn new(network: TensorNetwork, legs: Vec<EdgeIndex>) -> Self {
        assert_eq!(
            legs.len(),
            network.degree(),
            "Got {} labels for a network of degree {}",
            legs.len(),
            network.degree()
        );
        let mut indexed = Self { network, legs };
        indexed.link_traces();
        indexed
    }

    /// Labels the modes of a single payload.
    pub fn from_tensor(tensor: impl Into<TensorData>, legs: Vec<EdgeIndex>) -> Self {
        Self::new(TensorNetwork::from_tensor(tensor), legs)
    }

    #[inline]
    pub fn network(&self) -> &TensorNetwork {
        &self.network
    }

    #[inline]
    pub fn legs(&self) -> &[EdgeIndex] {
        &self.legs
    }

    pub fn into_parts(self) -> (TensorNetwork, Vec<EdgeIndex>) {
        (self.network, self.legs)
    }

    /// Links every pair of external indices that share a label.
    ///
    /// # Panics
    /// Panics if a label occurs more than twice or the linked dimensions differ.
    fn link_legs(&mut self) {
        let tn = &mut self.network;
        let mut i = 0;
        while i < self.legs.len() {
            let leg = self.legs[i];
            let Some(j) = (i + 1..self.legs.len()).find(|&j| self.legs[j] == leg) else {
                i += 1;
                continue;
            };
            assert!(
                self.legs[j + 1..].iter().all(|&l| l != leg),
                "Index {leg} occurs more than twice"
            );
            let first = tn.external_links[i];
            let second = tn.external_links[j];
            assert_eq!(
                first.dimension, second.dimension,
                "Dimensions of the linked index {leg} do not coincide"
            );
            tn.nodes[first.other].neighbors[first.index_position] = second;
            tn.nodes[second.other].neighbors[second.index_position] = first;

            tn.external_links.remove(j);
            tn.external_links.remove(i);
            tn.dimensions.remove(j);
            tn.dimensions.remove(i);
            self.legs.remove(j);
            self.legs.remove(i);
            for k in i..tn.external_links.len() {
                let shift = if k + 1 < j { 1 } else { 2 };
                let link = tn.external_links[k];
                tn.nodes[link.other].neighbors[link.index_position].index_position -= shift;
            }
        }
        tn.require_valid_network_with(false);
    }

    /// Links shared labels, then contracts the parts that are no longer reachable from an
    /// external index.
    fn link_traces(&mut self) {
        self.link_legs();
        self.network.contract_unconnected_subnetworks();
    }

    /// Reorders the external indices to the label order `legs`.
    ///
    /// # Panics
    /// Panics if `legs` is not a permutation of the current labels.
    pub fn reorder(mut self, legs: &[EdgeIndex]) -> TensorNetwork {
        assert_eq!(
            legs.len(),
            self.legs.len(),
            "Label count mismatch: {legs:?} vs {:?}",
            self.legs
        );
        for (i, &leg) in legs.iter().enumerate() {
            if self.legs[i] == leg {
                continue;
            }
            let Some(j) = (i + 1..self.legs.len()).find(|&j| self.legs[j] == leg) else {
                panic!("Index {leg} is not a free index of {:?}", self.legs)
            };
            self.legs.swap(i, j);
            self.network.swap_external_links(i, j);
        }
        self.network
    }

    /// Fully contracts the network into a payload with modes in the label order `legs`.
    pub fn evaluate(self, legs: &[EdgeIndex]) -> TensorData {
        self.reorder(legs).fully_contracted_tensor()
    }
}

impl Mul for IndexedNetwork {
    type Output = IndexedNetwork;

    fn mul(mut self, rhs: Self) -> Self::Output {
        self.network.add_network(rhs.network);
        self.legs.extend(rhs.legs);
        self.link_traces();
        self
    }
}

/// Builds a network with one node per `(payload, labels)` pair. Labels occurring twice
/// become internal links; the remaining labels become the external indices, in the
/// order given by `output`. Node `i` holds the `i`-th payload.
///
/// # Examples
/// ```
/// # use tncompress::tensornetwork::dense::DenseTensor;
/// # use tncompress::tensornetwork::indexed::create_tensor_network;
/// let tn = create_tensor_network(
///     vec![
///         (DenseTensor::ones(&[2, 3]).into(), vec![0, 1]),
///         (DenseTensor::ones(&[3]).into(), vec![1]),
///     ],
///     &[0],
/// );
/// assert_eq!(tn.nodes().len(), 2);
/// assert_eq!(tn.entry(&[1]), 3.0);
/// ```
pub fn create_tensor_network(
    tensors: Vec<(TensorData, Vec<EdgeIndex>)>,
    output: &[EdgeIndex],
) -> TensorNetwork {
    let mut pieces = tensors.into_iter();
    let Some((tensor, legs)) = pieces.next() else {
        panic!("A network needs at least one tensor")
    };
    let mut network = TensorNetwork::from_tensor(tensor);
    let mut all_legs = legs;
    for (tensor, legs) in pieces {
        network.add_network(TensorNetwork::from_tensor(tensor));
        all_legs.extend(legs);
    }
    assert_eq!(all_legs.len(), network.degree(), "Label count does not match the degrees");

    let mut indexed = IndexedNetwork {
        network,
        legs: all_legs,
    };
    indexed.link_legs();
    assert!(
        indexed.legs.iter().sorted().eq(output.iter().sorted()),
        "Output {output:?} does not match the open indices {:?}",
        indexed.legs
    );
    indexed.reorder(output)
}
