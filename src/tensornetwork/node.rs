use std::sync::Arc;

use crate::tensornetwork::{link::Link, tensordata::TensorData, NodeIndex};

/// A vertex of a tensor network: one link per mode and, usually, a payload.
///
/// Payloads are reference counted so that copies of a network share them until one
/// of the copies modifies a payload.
#[derive(Debug, Clone)]
pub struct TensorNode {
    pub(crate) tensor: Option<Arc<TensorData>>,
    pub(crate) neighbors: Vec<Link>,
    pub(crate) erased: bool,
}

impl TensorNode {
    /// Creates a node holding `tensor`.
    ///
    /// # Panics
    /// Panics if the link dimensions do not match the payload dimensions.
    pub fn new(tensor: TensorData, neighbors: Vec<Link>) -> Self {
        assert_eq!(
            tensor.degree(),
            neighbors.len(),
            "Node degree does not match the payload degree"
        );
        for (mode, (link, &dimension)) in neighbors.iter().zip(tensor.dimensions()).enumerate() {
            assert_eq!(
                link.dimension, dimension,
                "Link dimension does not match payload dimension at mode {mode}"
            );
        }
        Self {
            tensor: Some(Arc::new(tensor)),
            neighbors,
            erased: false,
        }
    }

    /// Creates a node without payload. Only its shape takes part in contractions.
    pub fn structural(neighbors: Vec<Link>) -> Self {
        Self {
            tensor: None,
            neighbors,
            erased: false,
        }
    }

    /// An erased slot.
    pub(crate) fn placeholder() -> Self {
        Self {
            tensor: None,
            neighbors: Vec::new(),
            erased: true,
        }
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.neighbors.len()
    }

    #[inline]
    pub fn neighbors(&self) -> &[Link] {
        &self.neighbors
    }

    #[inline]
    pub fn is_erased(&self) -> bool {
        self.erased
    }

    #[inline]
    pub fn has_tensor(&self) -> bool {
        self.tensor.is_some()
    }

    /// Product of all mode dimensions.
    pub fn size(&self) -> usize {
        self.neighbors.iter().map(|l| l.dimension).product()
    }

    /// Returns the payload.
    ///
    /// # Panics
    /// Panics if the node is structural.
    pub fn tensor(&self) -> &TensorData {
        self.tensor
            .as_deref()
            .unwrap_or_else(|| panic!("Structural node has no payload"))
    }

    /// Returns the payload for modification, copying it first if it is shared.
    pub(crate) fn tensor_mut(&mut self) -> &mut TensorData {
        Arc::make_mut(
            self.tensor
                .as_mut()
                .unwrap_or_else(|| panic!("Structural node has no payload")),
        )
    }

    pub(crate) fn set_tensor(&mut self, tensor: TensorData) {
        self.tensor = Some(Arc::new(tensor));
    }

    /// Returns whether any mode is linked to `node`.
    pub fn links_to(&self, node: NodeIndex) -> bool {
        self.neighbors.iter().any(|l| l.links(node))
    }

    /// Marks the node as removed.
    pub(crate) fn erase(&mut self) {
        self.tensor = None;
        self.neighbors.clear();
        self.erased = true;
    }

    /// A copy with the same links but without payload.
    pub(crate) fn stripped_copy(&self) -> Self {
        Self {
            tensor: None,
            neighbors: self.neighbors.clone(),
            erased: self.erased,
        }
    }
}
