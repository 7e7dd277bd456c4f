//! Rank truncation of single edges and movement of the orthogonality center.

use itertools::Itertools;
use log::debug;

use crate::tensornetwork::dense::DenseTensor;
use crate::tensornetwork::factorization::{qc, qr, svd, TruncationOptions};
use crate::tensornetwork::{tensordata::TensorData, NodeIndex, TensorNetwork};

/// Returns the shuffle that moves mode `from` to position `to`, keeping the relative
/// order of all other modes.
fn move_mode(degree: usize, from: usize, to: usize) -> Vec<usize> {
    let mut order = (0..degree).filter(|&d| d != from).collect_vec();
    order.insert(to, from);
    let mut shuffle = vec![0; degree];
    for (new, &old) in order.iter().enumerate() {
        shuffle[old] = new;
    }
    shuffle
}

/// Widens the bond of a factorization `frame [rest.., k]`, `core [k, cols..]` to `rank`
/// with zero columns in the frame and zero rows in the core. The product is unchanged.
fn pad_bond(frame: DenseTensor, core: DenseTensor, rank: usize) -> (DenseTensor, DenseTensor) {
    let bond = core.dimensions()[0];
    if bond >= rank {
        return (frame, core);
    }
    let mut frame_dims = frame.dimensions().to_vec();
    let last = frame_dims.len() - 1;
    frame_dims[last] = rank;
    let frame_data = frame
        .data()
        .chunks(bond)
        .flat_map(|row| row.iter().copied().chain(std::iter::repeat(0.0).take(rank - bond)))
        .collect_vec();

    let mut core_dims = core.dimensions().to_vec();
    core_dims[0] = rank;
    let mut core_data = core.data().to_vec();
    core_data.resize(core.size() / bond * rank, 0.0);
    (
        DenseTensor::from_vec(&frame_dims, frame_data),
        DenseTensor::from_vec(&core_dims, core_data),
    )
}

impl TensorNetwork {
    /// Returns the positions of the single link between `a` and `b` in both nodes.
    ///
    /// # Panics
    /// Panics unless the nodes share exactly one link.
    fn common_edge(&self, a: NodeIndex, b: NodeIndex) -> (usize, usize) {
        assert_ne!(a, b, "A node shares no edge with itself");
        let mut shared = self.nodes[a].neighbors.iter().positions(|l| l.links(b));
        match (shared.next(), shared.next()) {
            (Some(position), None) => (position, self.nodes[a].neighbors[position].index_position),
            (None, _) => panic!("Nodes {a} and {b} share no link"),
            (Some(_), Some(_)) => panic!("Nodes {a} and {b} share more than one link"),
        }
    }

    fn set_edge_dimension(&mut self, a: NodeIndex, position_a: usize, b: NodeIndex, position_b: usize, dimension: usize) {
        self.nodes[a].neighbors[position_a].dimension = dimension;
        self.nodes[b].neighbors[position_b].dimension = dimension;
    }

    /// Truncates the rank of the edge between `a` and `b` with a singular value
    /// decomposition. Both payloads are replaced and the edge takes the new rank.
    ///
    /// If one of the nodes is larger than the squared rank, both are first reduced to
    /// small cores with QR decompositions, so the SVD only acts on a square matrix of
    /// the current rank.
    ///
    /// # Panics
    /// Panics unless the nodes share exactly one link.
    pub fn round_edge(&mut self, a: NodeIndex, b: NodeIndex, options: &TruncationOptions) {
        self.require_valid_network_with(false);
        let (position_a, position_b) = self.common_edge(a, b);
        let tensor_a = self.nodes[a].tensor().to_dense();
        let tensor_b = self.nodes[b].tensor().to_dense();
        let (degree_a, degree_b) = (tensor_a.degree(), tensor_b.degree());
        let rank = tensor_a.dimensions()[position_a];

        // a as [rest.., bond] and b as [bond, rest..]
        let matrix_a = tensor_a.reshuffle(&move_mode(degree_a, position_a, degree_a - 1));
        let squared = rank.saturating_mul(rank);

        let (left, right) = if tensor_a.size() > squared || tensor_b.size() > squared {
            let (frame_a, core_a) = qr(&matrix_a, degree_a - 1);
            let matrix_b_t = tensor_b.reshuffle(&move_mode(degree_b, position_b, degree_b - 1));
            let (frame_b, core_b) = qr(&matrix_b_t, degree_b - 1);
            // core_a [k_a, bond] and core_b [k_b, bond]
            let core = DenseTensor::contract(&core_a, false, &core_b, true, 1);
            let (u, vt) = svd(&core, 1, options).absorb_right();
            (
                DenseTensor::contract(&frame_a, false, &u, false, 1),
                DenseTensor::contract(&vt, false, &frame_b, true, 1),
            )
        } else {
            let matrix_b = tensor_b.reshuffle(&move_mode(degree_b, position_b, 0));
            let product = DenseTensor::contract(&matrix_a, false, &matrix_b, false, 1);
            svd(&product, degree_a - 1, options).absorb_right()
        };

        let new_rank = right.dimensions()[0];
        debug!(a, b, rank, new_rank; "Rounded edge");
        let left = left.reshuffle(&move_mode(degree_a, degree_a - 1, position_a));
        let right = right.reshuffle(&move_mode(degree_b, 0, position_b));
        self.nodes[a].set_tensor(TensorData::Dense(left));
        self.nodes[b].set_tensor(TensorData::Dense(right));
        self.set_edge_dimension(a, position_a, b, position_b, new_rank);
        self.require_valid_network_with(false);
    }

    /// Moves the orthogonality center from `a` to `b`: `a` is replaced by the orthogonal
    /// factor of a QR decomposition along the shared edge and the remainder is absorbed
    /// into `b`. With `allow_rank_reduction` a rank-revealing factorization is used and
    /// the edge may shrink to the numerical rank.
    ///
    /// The represented tensor does not change. Without rank reduction the edge keeps its
    /// dimension; if `a` has fewer entries than `rank²` the frame gets zero columns.
    ///
    /// # Panics
    /// Panics unless the nodes share exactly one link.
    pub fn transfer_core(&mut self, a: NodeIndex, b: NodeIndex, allow_rank_reduction: bool) {
        self.require_valid_network_with(false);
        let (position_a, position_b) = self.common_edge(a, b);
        let tensor_a = self.nodes[a].tensor().to_dense();
        let tensor_b = self.nodes[b].tensor().to_dense();
        let (degree_a, degree_b) = (tensor_a.degree(), tensor_b.degree());

        let matrix_a = tensor_a.reshuffle(&move_mode(degree_a, position_a, degree_a - 1));
        let rank = tensor_a.dimensions()[position_a];
        let (frame, core) = if allow_rank_reduction {
            qc(&matrix_a, degree_a - 1)
        } else {
            let (frame, core) = qr(&matrix_a, degree_a - 1);
            pad_bond(frame, core, rank)
        };
        let matrix_b = tensor_b.reshuffle(&move_mode(degree_b, position_b, 0));
        let right = DenseTensor::contract(&core, false, &matrix_b, false, 1);

        let new_rank = core.dimensions()[0];
        debug!(a, b, rank, new_rank; "Transferred core");
        let left = frame.reshuffle(&move_mode(degree_a, degree_a - 1, position_a));
        let right = right.reshuffle(&move_mode(degree_b, 0, position_b));
        self.nodes[a].set_tensor(TensorData::Dense(left));
        self.nodes[b].set_tensor(TensorData::Dense(right));
        self.set_edge_dimension(a, position_a, b, position_b, new_rank);
        self.require_valid_network_with(false);
    }
}
