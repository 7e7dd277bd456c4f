use serde::{Deserialize, Serialize};

use crate::tensornetwork::NodeIndex;

/// One endpoint of an edge of a [`TensorNetwork`](crate::tensornetwork::TensorNetwork).
///
/// An internal link names the node on the other end of the edge and the position of
/// the matching link in that node's neighbor list. An external link instead names
/// its position in the external index list of the network. The same type is used for
/// the entries of that list, where `other` and `index_position` locate the node mode
/// that carries the external index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Link {
    /// The node on the other end. Unused for external links.
    pub other: NodeIndex,
    /// Position in the other node's neighbor list, or in the external index list.
    pub index_position: usize,
    /// Size of the mode.
    pub dimension: usize,
    pub external: bool,
}

impl Link {
    #[inline]
    pub fn new(other: NodeIndex, index_position: usize, dimension: usize, external: bool) -> Self {
        Self {
            other,
            index_position,
            dimension,
            external,
        }
    }

    /// A link to mode `index_position` of node `other`.
    #[inline]
    pub fn internal(other: NodeIndex, index_position: usize, dimension: usize) -> Self {
        Self::new(other, index_position, dimension, false)
    }

    /// A link to the external index at `index_position`.
    #[inline]
    pub fn external(index_position: usize, dimension: usize) -> Self {
        Self::new(usize::MAX, index_position, dimension, true)
    }

    /// Returns whether this link ends at `node`.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::tensornetwork::link::Link;
    /// assert!(Link::internal(3, 0, 2).links(3));
    /// assert!(!Link::internal(3, 0, 2).links(1));
    /// assert!(!Link::external(3, 2).links(3));
    /// ```
    #[inline]
    pub fn links(&self, node: NodeIndex) -> bool {
        !self.external && self.other == node
    }
}
