use float_cmp::{ApproxEq, F64Margin};
use serde::{Deserialize, Serialize};

use crate::tensornetwork::dense::DenseTensor;
use crate::tensornetwork::sparse::{
    contract_dense_sparse, contract_sparse_dense, contract_sparse_sparse, SparseTensor,
};

/// The numeric payload of a tensor network node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TensorData {
    /// All entries are stored, row-major.
    Dense(DenseTensor),
    /// Only nonzero entries are stored.
    Sparse(SparseTensor),
}

impl TensorData {
    /// Creates a dense payload from raw (flat, row-major) data.
    #[must_use]
    pub fn new_from_data(dimensions: &[usize], data: Vec<f64>) -> Self {
        Self::Dense(DenseTensor::from_vec(dimensions, data))
    }

    /// Creates a dense payload of degree zero.
    #[must_use]
    pub fn scalar(value: f64) -> Self {
        Self::Dense(DenseTensor::scalar(value))
    }

    pub fn dimensions(&self) -> &[usize] {
        match self {
            TensorData::Dense(tensor) => tensor.dimensions(),
            TensorData::Sparse(tensor) => tensor.dimensions(),
        }
    }

    pub fn degree(&self) -> usize {
        self.dimensions().len()
    }

    /// The number of (possibly implicit) entries.
    pub fn size(&self) -> usize {
        self.dimensions().iter().product()
    }

    pub fn is_sparse(&self) -> bool {
        matches!(self, TensorData::Sparse(_))
    }

    /// Returns the entry at the multi-index `positions`.
    pub fn get(&self, positions: &[usize]) -> f64 {
        match self {
            TensorData::Dense(tensor) => tensor.get(positions),
            TensorData::Sparse(tensor) => tensor.get(positions),
        }
    }

    /// Returns a dense copy of the payload.
    pub fn to_dense(&self) -> DenseTensor {
        match self {
            TensorData::Dense(tensor) => tensor.clone(),
            TensorData::Sparse(tensor) => tensor.to_dense(),
        }
    }

    /// Consumes the payload and returns the dense tensor.
    pub fn into_dense(self) -> DenseTensor {
        match self {
            TensorData::Dense(tensor) => tensor,
            TensorData::Sparse(tensor) => tensor.to_dense(),
        }
    }

    /// Permutes the modes. `shuffle[d]` is the new position of mode `d`.
    #[must_use]
    pub fn reshuffle(&self, shuffle: &[usize]) -> Self {
        match self {
            TensorData::Dense(tensor) => TensorData::Dense(tensor.reshuffle(shuffle)),
            TensorData::Sparse(tensor) => TensorData::Sparse(tensor.reshuffle(shuffle)),
        }
    }

    /// Fixes `mode` to `position`, removing the mode.
    #[must_use]
    pub fn fix_slate(&self, mode: usize, position: usize) -> Self {
        match self {
            TensorData::Dense(tensor) => TensorData::Dense(tensor.fix_slate(mode, position)),
            TensorData::Sparse(tensor) => TensorData::Sparse(tensor.fix_slate(mode, position)),
        }
    }

    /// Sums over the diagonals of the given mode pairs.
    #[must_use]
    pub fn trace(&self, pairs: &[(usize, usize)]) -> Self {
        match self {
            TensorData::Dense(tensor) => TensorData::Dense(tensor.trace(pairs)),
            TensorData::Sparse(tensor) => TensorData::Sparse(tensor.trace(pairs)),
        }
    }

    /// Contracts two payloads, see [`DenseTensor::contract`] for the mode layout. Only the
    /// contraction of two sparse payloads stays sparse.
    #[must_use]
    pub fn contract(
        lhs: &Self,
        lhs_trans: bool,
        rhs: &Self,
        rhs_trans: bool,
        shared_modes: usize,
    ) -> Self {
        match (lhs, rhs) {
            (TensorData::Dense(l), TensorData::Dense(r)) => {
                TensorData::Dense(DenseTensor::contract(l, lhs_trans, r, rhs_trans, shared_modes))
            }
            (TensorData::Sparse(l), TensorData::Dense(r)) => {
                TensorData::Dense(contract_sparse_dense(l, lhs_trans, r, rhs_trans, shared_modes))
            }
            (TensorData::Dense(l), TensorData::Sparse(r)) => {
                TensorData::Dense(contract_dense_sparse(l, lhs_trans, r, rhs_trans, shared_modes))
            }
            (TensorData::Sparse(l), TensorData::Sparse(r)) => TensorData::Sparse(
                contract_sparse_sparse(l, lhs_trans, r, rhs_trans, shared_modes),
            ),
        }
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        match self {
            TensorData::Dense(tensor) => tensor.scale(factor),
            TensorData::Sparse(tensor) => tensor.scale(factor),
        }
    }

    pub fn frob_norm(&self) -> f64 {
        match self {
            TensorData::Dense(tensor) => tensor.frob_norm(),
            TensorData::Sparse(tensor) => tensor.frob_norm(),
        }
    }
}

impl From<DenseTensor> for TensorData {
    fn from(value: DenseTensor) -> Self {
        TensorData::Dense(value)
    }
}

impl From<SparseTensor> for TensorData {
    fn from(value: SparseTensor) -> Self {
        TensorData::Sparse(value)
    }
}

impl ApproxEq for &TensorData {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        let margin = margin.into();
        match (self, other) {
            (TensorData::Dense(l0), TensorData::Dense(r0)) => l0.approx_eq(r0, margin),
            (TensorData::Sparse(l0), TensorData::Sparse(r0)) => {
                l0.dimensions() == r0.dimensions()
                    && l0
                        .entries()
                        .chain(r0.entries())
                        .all(|(p, _)| {
                            let positions = crate::tensornetwork::dense::multi_index(l0.dimensions(), p);
                            l0.get(&positions).approx_eq(r0.get(&positions), margin)
                        })
            }
            (l0, r0) => l0.to_dense().approx_eq(&r0.to_dense(), margin),
        }
    }
}

#[cfg(test)]
mod tests {
    use float_cmp::assert_approx_eq;

    use super::*;

    #[test]
    #[should_panic(expected = "assertion failed: `(left approx_eq right)`")]
    fn eq_different_dimensions() {
        let t1 = TensorData::new_from_data(&[2, 2], vec![1., 2., 3., 4.]);
        let t2 = TensorData::new_from_data(&[4], vec![1., 2., 3., 4.]);
        assert_approx_eq!(&TensorData, &t1, &t2);
    }

    #[test]
    #[should_panic(expected = "assertion failed: `(left approx_eq right)`")]
    fn eq_different_data() {
        let t1 = TensorData::new_from_data(&[2], vec![1., 2.]);
        let t2 = TensorData::new_from_data(&[2], vec![1., 2.5]);
        assert_approx_eq!(&TensorData, &t1, &t2);
    }

    #[test]
    fn eq_dense_and_sparse() {
        let dense = DenseTensor::from_vec(&[2, 2], vec![0., 1., 0., -3.]);
        let sparse = SparseTensor::from_dense(&dense);
        assert_eq!(sparse.nnz(), 2);
        assert_approx_eq!(&TensorData, &dense.into(), &sparse.into());
    }

    #[test]
    fn contract_mixed_storage() {
        let a = DenseTensor::from_vec(&[2, 3], vec![1., 0., 2., 0., 3., 0.]);
        let b = DenseTensor::from_vec(&[3], vec![1., 2., 3.]);
        let expected = TensorData::new_from_data(&[2], vec![7., 6.]);

        let sparse_a = TensorData::Sparse(SparseTensor::from_dense(&a));
        let sparse_b = TensorData::Sparse(SparseTensor::from_dense(&b));
        let dense_a = TensorData::Dense(a);
        let dense_b = TensorData::Dense(b);

        for (lhs, rhs) in [
            (&dense_a, &dense_b),
            (&sparse_a, &dense_b),
            (&dense_a, &sparse_b),
            (&sparse_a, &sparse_b),
        ] {
            let result = TensorData::contract(lhs, false, rhs, false, 1);
            assert_eq!(result.is_sparse(), lhs.is_sparse() && rhs.is_sparse());
            assert_approx_eq!(&TensorData, &result, &expected);
        }
    }
}
