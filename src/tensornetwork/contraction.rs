//! Functionality to contract nodes of tensor networks.

use std::collections::BTreeSet;
use std::sync::Arc;

use itertools::Itertools;
use log::{debug, trace};

use crate::contractionpath::{validate_path, SimplePathRef};
use crate::contractionpath::paths::Proposal;
use crate::tensornetwork::{tensordata::TensorData, NodeIndex, TensorNetwork};

/// Returns whether the sorted `positions` form a block at the front or the back of a
/// node with `degree` modes.
fn is_separated(positions: &[usize], degree: usize) -> bool {
    let Some(&first) = positions.first() else {
        return true;
    };
    let contiguous = positions.windows(2).all(|w| w[1] == w[0] + 1);
    contiguous && (first == 0 || first + positions.len() == degree)
}

impl TensorNetwork {
    /// Estimated number of multiplications of contracting node `a` with node `b`.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::tensornetwork::{TensorNetwork, dense::DenseTensor};
    /// # use tncompress::tensornetwork::indexed::create_tensor_network;
    /// // a[i, j] b[j, k]
    /// let tn = create_tensor_network(
    ///     vec![
    ///         (DenseTensor::ones(&[2, 3]).into(), vec![0, 1]),
    ///         (DenseTensor::ones(&[3, 4]).into(), vec![1, 2]),
    ///     ],
    ///     &[0, 2],
    /// );
    /// assert_eq!(tn.contraction_cost(0, 1), 24.0);
    /// ```
    pub fn contraction_cost(&self, a: NodeIndex, b: NodeIndex) -> f64 {
        let node_a = &self.nodes[a];
        let size_a = node_a.neighbors.iter().map(|l| l.dimension as f64).product::<f64>();
        if a == b {
            return size_a;
        }
        self.nodes[b]
            .neighbors
            .iter()
            .filter(|l| !l.links(a))
            .fold(size_a, |cost, l| cost * l.dimension as f64)
    }

    /// Sums over all links of node `id` that point back to the node itself.
    pub fn trace_out_self_links(&mut self, id: NodeIndex) {
        let neighbors = std::mem::take(&mut self.nodes[id].neighbors);
        let mut pairs = Vec::new();
        let mut kept = Vec::with_capacity(neighbors.len());
        let mut correction = 0;
        for (i, link) in neighbors.iter().enumerate() {
            if link.links(id) {
                if link.index_position > i {
                    pairs.push((i, link.index_position));
                }
                correction += 1;
            } else {
                if link.external {
                    self.external_links[link.index_position].index_position -= correction;
                } else {
                    self.nodes[link.other].neighbors[link.index_position].index_position -=
                        correction;
                }
                kept.push(*link);
            }
        }
        if pairs.is_empty() {
            self.nodes[id].neighbors = neighbors;
            return;
        }

        trace!(id, pairs:?; "Tracing out self links");
        self.nodes[id].neighbors = kept;
        if self.nodes[id].has_tensor() {
            let traced = self.nodes[id].tensor().trace(&pairs);
            self.nodes[id].set_tensor(traced);
        }
        self.require_valid_network_with(false);
    }

    /// Permutes the modes of node `id`. `shuffle[d]` is the new position of mode `d`.
    pub(crate) fn reshuffle_node(&mut self, id: NodeIndex, shuffle: &[usize]) {
        let old = std::mem::take(&mut self.nodes[id].neighbors);
        let mut neighbors = old.clone();
        for (d, &target) in shuffle.iter().enumerate() {
            neighbors[target] = old[d];
            if old[d].links(id) {
                neighbors[target].index_position = shuffle[old[d].index_position];
            }
        }
        for (position, link) in neighbors.iter().enumerate() {
            if link.external {
                self.external_links[link.index_position].index_position = position;
            } else if link.other != id {
                self.nodes[link.other].neighbors[link.index_position].index_position = position;
            }
        }
        self.nodes[id].neighbors = neighbors;
        if self.nodes[id].has_tensor() {
            let shuffled = self.nodes[id].tensor().reshuffle(shuffle);
            self.nodes[id].set_tensor(shuffled);
        }
    }

    /// Brings the modes shared by `a` and `b` into blocks at the ends of both nodes, in the
    /// same order. Only nodes whose layout does not allow this already are permuted.
    fn arrange_for_contraction(&mut self, a: NodeIndex, b: NodeIndex) {
        let shared_a = self.nodes[a]
            .neighbors
            .iter()
            .positions(|l| l.links(b))
            .collect_vec();
        if shared_a.is_empty() {
            return;
        }
        let partner = shared_a
            .iter()
            .map(|&i| self.nodes[a].neighbors[i].index_position)
            .collect_vec();
        let same_order = partner.windows(2).all(|w| w[0] < w[1]);
        let separated_a = is_separated(&shared_a, self.nodes[a].degree());
        let separated_b = is_separated(
            &partner.iter().copied().sorted().collect_vec(),
            self.nodes[b].degree(),
        );

        let (mut permute_a, mut permute_b) = (!separated_a, !separated_b);
        if separated_a && separated_b && !same_order {
            if self.nodes[a].size() < self.nodes[b].size() {
                permute_a = true;
            } else {
                permute_b = true;
            }
        }

        if permute_a {
            // free modes first, then the shared block
            let degree = self.nodes[a].degree();
            let mut shuffle = vec![0; degree];
            let mut next = 0;
            for (d, link) in self.nodes[a].neighbors.iter().enumerate() {
                if !link.links(b) {
                    shuffle[d] = next;
                    next += 1;
                }
            }
            if permute_b {
                for &d in &shared_a {
                    shuffle[d] = next;
                    next += 1;
                }
            } else {
                for link in self.nodes[b].neighbors.iter().filter(|l| l.links(a)) {
                    shuffle[link.index_position] = next;
                    next += 1;
                }
            }
            trace!(id = a, shuffle:?; "Permuting node for contraction");
            self.reshuffle_node(a, &shuffle);
        }

        if permute_b {
            // shared block first, in the order of a
            let degree = self.nodes[b].degree();
            let mut shuffle = vec![0; degree];
            let mut next = 0;
            for link in self.nodes[a].neighbors.iter().filter(|l| l.links(b)) {
                shuffle[link.index_position] = next;
                next += 1;
            }
            for (d, link) in self.nodes[b].neighbors.iter().enumerate() {
                if !link.links(a) {
                    shuffle[d] = next;
                    next += 1;
                }
            }
            trace!(id = b, shuffle:?; "Permuting node for contraction");
            self.reshuffle_node(b, &shuffle);
        }
    }

    /// Contracts node `b` into node `a`. Node `b` is erased afterwards; its slot keeps
    /// its index until [`TensorNetwork::sanitize`] is called.
    ///
    /// If neither node holds a payload, only the links are merged.
    ///
    /// # Panics
    /// Panics if either node is erased, or if exactly one of them holds a payload.
    pub fn contract(&mut self, a: NodeIndex, b: NodeIndex) {
        assert!(!self.nodes[a].erased, "Node {a} was already contracted");
        assert!(!self.nodes[b].erased, "Node {b} was already contracted");
        if self.nodes[a].links_to(a) {
            self.trace_out_self_links(a);
        }
        if a == b {
            return;
        }
        if self.nodes[b].links_to(b) {
            self.trace_out_self_links(b);
        }
        debug!(a, b; "Contracting nodes");

        let tensor = match (self.nodes[a].has_tensor(), self.nodes[b].has_tensor()) {
            (false, false) => None,
            (true, true) => {
                self.arrange_for_contraction(a, b);
                let node_a = &self.nodes[a];
                let node_b = &self.nodes[b];
                let shared = node_a.neighbors.iter().filter(|l| l.links(b)).count();
                let trans_a = node_a.neighbors.first().is_some_and(|l| l.links(b))
                    && !node_a.neighbors.last().is_some_and(|l| l.links(b));
                let trans_b = !node_b.neighbors.first().is_some_and(|l| l.links(a))
                    && node_b.neighbors.last().is_some_and(|l| l.links(a));
                Some(TensorData::contract(
                    node_a.tensor(),
                    trans_a,
                    node_b.tensor(),
                    trans_b,
                    shared,
                ))
            }
            _ => panic!("Internal Error: cannot contract node {a} with node {b}, only one holds a payload"),
        };

        let neighbors = self.nodes[a]
            .neighbors
            .iter()
            .filter(|l| !l.links(b))
            .chain(self.nodes[b].neighbors.iter().filter(|l| !l.links(a)))
            .copied()
            .collect_vec();
        for (position, link) in neighbors.iter().enumerate() {
            if link.external {
                let external = &mut self.external_links[link.index_position];
                external.other = a;
                external.index_position = position;
            } else {
                let remote = &mut self.nodes[link.other].neighbors[link.index_position];
                remote.other = a;
                remote.index_position = position;
            }
        }

        self.nodes[a].neighbors = neighbors;
        self.nodes[a].tensor = tensor.map(Arc::new);
        self.nodes[b].erase();
        self.require_valid_network_with(false);
    }

    /// Contracts the set of nodes `ids` into one node and returns its index, or `None`
    /// for an empty set. Up to three nodes are contracted in the optimal order; larger
    /// sets follow the cheapest proposal of the configured heuristics.
    pub fn contract_nodes(&mut self, ids: impl IntoIterator<Item = NodeIndex>) -> Option<NodeIndex> {
        let ids: BTreeSet<NodeIndex> = ids.into_iter().collect();
        for &id in &ids {
            assert!(!self.nodes[id].erased, "Node {id} was already contracted");
            if self.nodes[id].links_to(id) {
                self.trace_out_self_links(id);
            }
        }

        match ids.len() {
            0 => None,
            1 => ids.first().copied(),
            2 => {
                let Some((a, b)) = ids.iter().copied().collect_tuple() else {
                    unreachable!()
                };
                self.contract(a, b);
                Some(a)
            }
            3 => {
                let Some((a, b, c)) = ids.iter().copied().collect_tuple() else {
                    unreachable!()
                };
                Some(self.contract_three(a, b, c))
            }
            _ => Some(self.contract_with_heuristics(&ids)),
        }
    }

    /// Contracts three nodes in the cheapest of the three possible orders. Returns `a`.
    fn contract_three(&mut self, a: NodeIndex, b: NodeIndex, c: NodeIndex) -> NodeIndex {
        let (mut sa, mut sb, mut sc) = (1.0, 1.0, 1.0);
        let (mut sab, mut sbc, mut sac) = (1.0, 1.0, 1.0);
        for link in &self.nodes[a].neighbors {
            let dimension = link.dimension as f64;
            if link.links(b) {
                sab *= dimension;
            } else if link.links(c) {
                sac *= dimension;
            } else {
                sa *= dimension;
            }
        }
        for link in &self.nodes[b].neighbors {
            let dimension = link.dimension as f64;
            if link.links(c) {
                sbc *= dimension;
            } else if !link.links(a) {
                sb *= dimension;
            }
        }
        for link in &self.nodes[c].neighbors {
            if !link.links(a) && !link.links(b) {
                sc *= link.dimension as f64;
            }
        }

        let cost_ab = sa * sb * sac * sbc * (sab + sc);
        let cost_ac = sa * sc * sab * sbc * (sac + sb);
        let cost_bc = sb * sc * sab * sac * (sbc + sa);

        if cost_ab <= cost_ac && cost_ab <= cost_bc {
            debug!(a, b, c, cost = cost_ab; "Contracting a with b first");
            self.contract(a, b);
            self.contract(a, c);
        } else if cost_ac <= cost_bc {
            debug!(a, b, c, cost = cost_ac; "Contracting a with c first");
            self.contract(a, c);
            self.contract(a, b);
        } else {
            debug!(a, b, c, cost = cost_bc; "Contracting b with c first");
            self.contract(b, c);
            self.contract(a, b);
        }
        a
    }

    /// Contracts `ids` following the cheapest proposal of the configured heuristics.
    fn contract_with_heuristics(&mut self, ids: &BTreeSet<NodeIndex>) -> NodeIndex {
        let subnet = self.stripped_subnet(|id| ids.contains(&id));
        let config = Arc::clone(&self.config);

        let mut best: Option<(Proposal, &'static str)> = None;
        for heuristic in config.heuristics() {
            let Some(proposal) = heuristic.propose(&subnet) else {
                trace!(heuristic = heuristic.name(); "Heuristic declined");
                continue;
            };
            trace!(heuristic = heuristic.name(), cost = proposal.cost; "Heuristic proposal");
            if best.as_ref().map_or(true, |(b, _)| proposal.cost < b.cost) {
                best = Some((proposal, heuristic.name()));
            }
        }
        let Some((proposal, name)) = best else {
            panic!("Internal Error: no contraction heuristic proposed an order for {ids:?}")
        };
        debug!(heuristic = name, cost = proposal.cost, nodes = ids.len(); "Chose contraction order");

        let Some(result) = self.contract_path(&proposal.path) else {
            panic!("Internal Error: heuristic {name} proposed an empty path for {ids:?}")
        };
        result
    }

    /// Executes a path of pairwise contractions in replace-left format. Returns the node
    /// that holds the result of the last contraction.
    pub fn contract_path(&mut self, path: SimplePathRef) -> Option<NodeIndex> {
        validate_path(path);
        for &(a, b) in path {
            self.contract(a, b);
        }
        path.last().map(|&(a, _)| a)
    }
}
