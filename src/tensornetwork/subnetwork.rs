//! Induced subnetworks, collapsing of detached parts and compaction of node slots.

use std::collections::BTreeSet;

use itertools::Itertools;
use log::{debug, trace};

use crate::tensornetwork::{link::Link, node::TensorNode, NodeIndex, TensorNetwork};

impl TensorNetwork {
    /// Returns a payload-free copy restricted to the nodes selected by `predicate`.
    ///
    /// Node indices are preserved; unselected nodes become erased slots. Links to
    /// unselected nodes become external indices, appended after the remaining original
    /// external indices.
    pub fn stripped_subnet(&self, predicate: impl Fn(NodeIndex) -> bool) -> TensorNetwork {
        let mut subnet = TensorNetwork {
            nodes: vec![TensorNode::placeholder(); self.nodes.len()],
            external_links: self.external_links.clone(),
            dimensions: self.dimensions.clone(),
            config: self.config.clone(),
        };

        for (id, node) in self.nodes.iter().enumerate() {
            if !predicate(id) {
                continue;
            }
            subnet.nodes[id] = node.stripped_copy();
            for i in 0..node.neighbors.len() {
                let link = node.neighbors[i];
                if !link.external && !predicate(link.other) {
                    let position = subnet.external_links.len();
                    subnet.nodes[id].neighbors[i] = Link::external(position, link.dimension);
                    subnet.external_links.push(Link::internal(id, i, link.dimension));
                    subnet.dimensions.push(link.dimension);
                }
            }
        }

        // Drop original external indices that belong to unselected nodes
        let mut correction = 0;
        let mut kept_links = Vec::with_capacity(subnet.external_links.len());
        let mut kept_dimensions = Vec::with_capacity(subnet.external_links.len());
        for (link, dimension) in subnet.external_links.iter().zip(&subnet.dimensions) {
            if predicate(link.other) {
                subnet.nodes[link.other].neighbors[link.index_position].index_position -= correction;
                kept_links.push(*link);
                kept_dimensions.push(*dimension);
            } else {
                correction += 1;
            }
        }
        subnet.external_links = kept_links;
        subnet.dimensions = kept_dimensions;

        subnet.require_valid_network_with(false);
        subnet
    }

    /// Contracts every node that cannot be reached from an external index into a scalar
    /// and multiplies it into a remaining node. A network without external indices
    /// collapses into a single node holding that scalar.
    ///
    /// Erased slots are removed, so node indices may change.
    pub fn contract_unconnected_subnetworks(&mut self) {
        self.require_valid_network_with(false);
        let keep_final_node = self.degree() == 0;

        let mut seen = vec![false; self.nodes.len()];
        let mut stack = self.external_links.iter().map(|l| l.other).collect_vec();
        while let Some(id) = stack.pop() {
            if seen[id] {
                continue;
            }
            seen[id] = true;
            stack.extend(
                self.nodes[id]
                    .neighbors
                    .iter()
                    .filter(|l| !l.external && !seen[l.other])
                    .map(|l| l.other),
            );
        }

        let detached = (0..self.nodes.len())
            .filter(|&id| !seen[id] && !self.nodes[id].erased)
            .collect::<BTreeSet<_>>();
        if !detached.is_empty() {
            trace!(count = detached.len(); "Contracting detached nodes");
            let Some(scalar_node) = self.contract_nodes(detached) else {
                unreachable!("the detached set is not empty")
            };
            assert_eq!(
                self.nodes[scalar_node].degree(),
                0,
                "Internal Error: detached part did not contract to a scalar"
            );

            if !keep_final_node {
                let Some(target) = (0..self.nodes.len())
                    .find(|&id| id != scalar_node && !self.nodes[id].erased)
                else {
                    panic!("Internal Error: no node left to absorb the detached scalar")
                };
                if self.nodes[scalar_node].has_tensor() && self.nodes[target].has_tensor() {
                    let factor = self.nodes[scalar_node].tensor().get(&[]);
                    self.nodes[target].tensor_mut().scale(factor);
                }
                self.nodes[scalar_node].erase();
            }
        }

        self.sanitize();
        assert!(
            !keep_final_node || self.nodes.len() == 1,
            "Internal Error: scalar network kept {} nodes",
            self.nodes.len()
        );
    }

    /// Contracts neighboring nodes whenever this does not increase the size of the
    /// representation, i.e. whenever the squared size of their shared bond is at least
    /// the size of one of them. Erased slots are removed afterwards.
    pub fn reduce_representation(&mut self) {
        self.require_valid_network_with(false);
        let mut shape = self.stripped_subnet(|_| true);
        let mut groups = vec![BTreeSet::new(); self.nodes.len()];

        let mut id = 0;
        while id < shape.nodes.len() {
            if shape.nodes[id].erased {
                id += 1;
                continue;
            }
            let neighbor = shape.nodes[id]
                .neighbors
                .iter()
                .filter(|l| !l.external && l.other != id)
                .map(|l| l.other)
                .find(|&other| {
                    let bond = shape.nodes[id]
                        .neighbors
                        .iter()
                        .filter(|l| l.links(other))
                        .map(|l| l.dimension)
                        .product::<usize>();
                    let squared = bond.saturating_mul(bond);
                    squared >= shape.nodes[id].size() || squared >= shape.nodes[other].size()
                });

            let Some(other) = neighbor else {
                id += 1;
                continue;
            };
            if groups[id].is_empty() {
                groups[id].insert(id);
            }
            let absorbed = std::mem::take(&mut groups[other]);
            if absorbed.is_empty() {
                groups[id].insert(other);
            } else {
                groups[id].extend(absorbed);
            }
            shape.contract(id, other);
            // revisit the merged node
        }

        let mut merged = 0;
        for group in groups.into_iter().filter(|g| g.len() > 1) {
            merged += group.len() - 1;
            self.contract_nodes(group);
        }
        debug!(merged; "Reduced representation");

        self.sanitize();
        self.require_valid_network();
    }

    /// Removes erased slots and renumbers the remaining nodes in order.
    pub fn sanitize(&mut self) {
        let mut mapping = vec![usize::MAX; self.nodes.len()];
        let mut next = 0;
        for (id, node) in self.nodes.iter().enumerate() {
            if !node.erased {
                mapping[id] = next;
                next += 1;
            }
        }
        if next == self.nodes.len() {
            return;
        }
        self.reshuffle_nodes(|id| mapping[id]);
    }

    /// Moves every node `id` to `f(id)` and rewrites all links. Erased slots are dropped.
    ///
    /// # Panics
    /// Panics if `f` maps two live nodes to the same index.
    pub fn reshuffle_nodes(&mut self, f: impl Fn(NodeIndex) -> NodeIndex) {
        for link in &mut self.external_links {
            link.other = f(link.other);
        }

        let live = self.nodes.iter().filter(|n| !n.erased).count();
        let mut nodes: Vec<Option<TensorNode>> = vec![None; live];
        for (id, mut node) in std::mem::take(&mut self.nodes).into_iter().enumerate() {
            if node.erased {
                continue;
            }
            for link in node.neighbors.iter_mut().filter(|l| !l.external) {
                link.other = f(link.other);
            }
            let target = f(id);
            assert!(
                target < live && nodes[target].is_none(),
                "Node {id} cannot be moved to {target}"
            );
            nodes[target] = Some(node);
        }
        self.nodes = nodes.into_iter().flatten().collect();
        if self.nodes.is_empty() {
            self.nodes.push(TensorNode::placeholder());
        }
        self.require_valid_network_with(false);
    }
}
