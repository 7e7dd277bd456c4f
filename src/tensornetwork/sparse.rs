//! Sparse tensors stored as an ordered map from linear position to value.

use std::collections::BTreeMap;
use std::ops::{AddAssign, MulAssign, SubAssign};

use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::tensornetwork::dense::{
    linear_position, multi_index, strides, ContractionShape, DenseTensor,
};

/// A sparse tensor of `f64` values. Positions are row-major, as for [`DenseTensor`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SparseTensor {
    dimensions: Vec<usize>,
    entries: BTreeMap<usize, f64>,
}

impl SparseTensor {
    /// Creates an all-zero tensor of the given `dimensions`.
    pub fn new(dimensions: &[usize]) -> Self {
        assert!(
            dimensions.iter().all(|&d| d > 0),
            "Dimensions must be positive, got {dimensions:?}"
        );
        Self {
            dimensions: dimensions.to_vec(),
            entries: BTreeMap::new(),
        }
    }

    /// Creates a tensor from `(linear position, value)` pairs. Repeated positions are summed.
    pub fn from_entries(dimensions: &[usize], entries: impl IntoIterator<Item = (usize, f64)>) -> Self {
        let mut tensor = Self::new(dimensions);
        let size = tensor.size();
        for (position, value) in entries {
            assert!(position < size, "Position {position} out of range for size {size}");
            *tensor.entries.entry(position).or_default() += value;
        }
        tensor
    }

    /// Stores all nonzero entries of `dense`.
    pub fn from_dense(dense: &DenseTensor) -> Self {
        Self {
            dimensions: dense.dimensions().to_vec(),
            entries: dense
                .data()
                .iter()
                .enumerate()
                .filter(|(_, &v)| v != 0.0)
                .map(|(p, &v)| (p, v))
                .collect(),
        }
    }

    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.dimensions.len()
    }

    /// The number of elements the tensor would have if it were dense.
    pub fn size(&self) -> usize {
        self.dimensions.iter().product()
    }

    /// The number of stored entries.
    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn entries(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.entries.iter().map(|(&p, &v)| (p, v))
    }

    pub fn get(&self, positions: &[usize]) -> f64 {
        let position = linear_position(&self.dimensions, positions);
        self.entries.get(&position).copied().unwrap_or_default()
    }

    pub fn set(&mut self, positions: &[usize], value: f64) {
        let position = linear_position(&self.dimensions, positions);
        if value == 0.0 {
            self.entries.remove(&position);
        } else {
            self.entries.insert(position, value);
        }
    }

    pub fn to_dense(&self) -> DenseTensor {
        let mut data = vec![0.0; self.size()];
        for (&p, &v) in &self.entries {
            data[p] = v;
        }
        DenseTensor::from_vec(&self.dimensions, data)
    }

    /// Permutes the modes. `shuffle[d]` is the new position of mode `d`.
    pub fn reshuffle(&self, shuffle: &[usize]) -> Self {
        let degree = self.degree();
        assert_eq!(shuffle.len(), degree, "Shuffle has wrong length");
        assert!(
            shuffle.iter().sorted().copied().eq(0..degree),
            "{shuffle:?} is not a permutation"
        );
        let mut dimensions = vec![0; degree];
        for (d, &target) in shuffle.iter().enumerate() {
            dimensions[target] = self.dimensions[d];
        }
        let new_strides = strides(&dimensions);

        let entries = self
            .entries
            .iter()
            .map(|(&p, &v)| {
                let index = multi_index(&self.dimensions, p);
                let target = index
                    .iter()
                    .zip(shuffle)
                    .map(|(&i, &s)| i * new_strides[s])
                    .sum::<usize>();
                (target, v)
            })
            .collect();
        Self { dimensions, entries }
    }

    /// Fixes `mode` to `position`, removing the mode.
    pub fn fix_slate(&self, mode: usize, position: usize) -> Self {
        assert!(mode < self.degree(), "Cannot fix mode {mode} of a tensor of degree {}", self.degree());
        let dimension = self.dimensions[mode];
        assert!(
            position < dimension,
            "Slate position {position} out of range for mode {mode} of dimension {dimension}"
        );
        let inner = self.dimensions[mode + 1..].iter().product::<usize>();

        let entries = self
            .entries
            .iter()
            .filter(|(&p, _)| (p / inner) % dimension == position)
            .map(|(&p, &v)| ((p / inner / dimension) * inner + p % inner, v))
            .collect();
        let mut dimensions = self.dimensions.clone();
        dimensions.remove(mode);
        Self { dimensions, entries }
    }

    /// Sums over the diagonal of every mode pair in `pairs`.
    pub fn trace(&self, pairs: &[(usize, usize)]) -> Self {
        let degree = self.degree();
        let traced = pairs.iter().flat_map(|&(a, b)| [a, b]).collect_vec();
        assert!(
            traced.iter().all(|&m| m < degree) && traced.iter().all_unique(),
            "Invalid trace pairs {pairs:?} for a tensor of degree {degree}"
        );
        for &(a, b) in pairs {
            assert_eq!(
                self.dimensions[a], self.dimensions[b],
                "Traced modes {a} and {b} have different dimensions"
            );
        }
        let kept = (0..degree).filter(|m| !traced.contains(m)).collect_vec();
        let dimensions = kept.iter().map(|&m| self.dimensions[m]).collect_vec();
        let result_strides = strides(&dimensions);

        let mut result = Self::new(&dimensions);
        for (&p, &v) in &self.entries {
            let index = multi_index(&self.dimensions, p);
            if pairs.iter().all(|&(a, b)| index[a] == index[b]) {
                let target = kept
                    .iter()
                    .zip(&result_strides)
                    .map(|(&m, &s)| index[m] * s)
                    .sum::<usize>();
                *result.entries.entry(target).or_default() += v;
            }
        }
        result
    }

    pub fn scale(&mut self, factor: f64) {
        self.entries.values_mut().for_each(|v| *v *= factor);
    }

    pub fn frob_norm(&self) -> f64 {
        self.entries.values().map(|v| v * v).sum::<f64>().sqrt()
    }
}

/// Splits a linear position of the left operand into its (free, shared) row and column.
fn lhs_coordinates(position: usize, shape: &ContractionShape, trans: bool) -> (usize, usize) {
    if trans {
        (position % shape.left, position / shape.left)
    } else {
        (position / shape.shared, position % shape.shared)
    }
}

/// Splits a linear position of the right operand into its (shared, free) row and column.
fn rhs_coordinates(position: usize, shape: &ContractionShape, trans: bool) -> (usize, usize) {
    if trans {
        (position % shape.shared, position / shape.shared)
    } else {
        (position / shape.right, position % shape.right)
    }
}

/// Contracts a sparse left operand with a dense right operand into a dense result.
pub fn contract_sparse_dense(
    lhs: &SparseTensor,
    lhs_trans: bool,
    rhs: &DenseTensor,
    rhs_trans: bool,
    shared_modes: usize,
) -> DenseTensor {
    let shape = ContractionShape::new(
        &lhs.dimensions,
        lhs_trans,
        rhs.dimensions(),
        rhs_trans,
        shared_modes,
    );
    let rhs_data = rhs.data();
    let mut data = vec![0.0; shape.left * shape.right];
    for (p, v) in lhs.entries() {
        let (i, k) = lhs_coordinates(p, &shape, lhs_trans);
        let row = &mut data[i * shape.right..(i + 1) * shape.right];
        for (j, target) in row.iter_mut().enumerate() {
            let r = if rhs_trans {
                rhs_data[j * shape.shared + k]
            } else {
                rhs_data[k * shape.right + j]
            };
            *target += v * r;
        }
    }
    DenseTensor::from_vec(&shape.dimensions, data)
}

/// Contracts a dense left operand with a sparse right operand into a dense result.
pub fn contract_dense_sparse(
    lhs: &DenseTensor,
    lhs_trans: bool,
    rhs: &SparseTensor,
    rhs_trans: bool,
    shared_modes: usize,
) -> DenseTensor {
    let shape = ContractionShape::new(
        lhs.dimensions(),
        lhs_trans,
        &rhs.dimensions,
        rhs_trans,
        shared_modes,
    );
    let lhs_data = lhs.data();
    let mut data = vec![0.0; shape.left * shape.right];
    for (p, v) in rhs.entries() {
        let (k, j) = rhs_coordinates(p, &shape, rhs_trans);
        for i in 0..shape.left {
            let l = if lhs_trans {
                lhs_data[k * shape.left + i]
            } else {
                lhs_data[i * shape.shared + k]
            };
            data[i * shape.right + j] += l * v;
        }
    }
    DenseTensor::from_vec(&shape.dimensions, data)
}

/// Contracts two sparse operands. Entries are joined on the shared position.
pub fn contract_sparse_sparse(
    lhs: &SparseTensor,
    lhs_trans: bool,
    rhs: &SparseTensor,
    rhs_trans: bool,
    shared_modes: usize,
) -> SparseTensor {
    let shape = ContractionShape::new(
        &lhs.dimensions,
        lhs_trans,
        &rhs.dimensions,
        rhs_trans,
        shared_modes,
    );
    let mut by_shared: FxHashMap<usize, Vec<(usize, f64)>> = FxHashMap::default();
    for (p, v) in rhs.entries() {
        let (k, j) = rhs_coordinates(p, &shape, rhs_trans);
        by_shared.entry(k).or_default().push((j, v));
    }

    let mut result = SparseTensor::new(&shape.dimensions);
    for (p, v) in lhs.entries() {
        let (i, k) = lhs_coordinates(p, &shape, lhs_trans);
        if let Some(row) = by_shared.get(&k) {
            for &(j, w) in row {
                *result.entries.entry(i * shape.right + j).or_default() += v * w;
            }
        }
    }
    result.entries.retain(|_, v| *v != 0.0);
    result
}

impl AddAssign<&SparseTensor> for SparseTensor {
    fn add_assign(&mut self, rhs: &SparseTensor) {
        assert_eq!(self.dimensions, rhs.dimensions, "Dimension mismatch");
        for (&p, &v) in &rhs.entries {
            *self.entries.entry(p).or_default() += v;
        }
    }
}

impl SubAssign<&SparseTensor> for SparseTensor {
    fn sub_assign(&mut self, rhs: &SparseTensor) {
        assert_eq!(self.dimensions, rhs.dimensions, "Dimension mismatch");
        for (&p, &v) in &rhs.entries {
            *self.entries.entry(p).or_default() -= v;
        }
    }
}

impl MulAssign<f64> for SparseTensor {
    fn mul_assign(&mut self, rhs: f64) {
        self.scale(rhs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::assert_approx_eq;

    fn sample() -> SparseTensor {
        // 2 x 3 x 2 with a handful of entries
        let mut tensor = SparseTensor::new(&[2, 3, 2]);
        tensor.set(&[0, 0, 1], 1.5);
        tensor.set(&[0, 2, 0], -2.0);
        tensor.set(&[1, 1, 1], 3.0);
        tensor.set(&[1, 2, 1], 4.0);
        tensor
    }

    #[test]
    fn test_set_zero_removes_entry() {
        let mut tensor = sample();
        assert_eq!(tensor.nnz(), 4);
        tensor.set(&[1, 1, 1], 0.0);
        assert_eq!(tensor.nnz(), 3);
        assert_eq!(tensor.get(&[1, 1, 1]), 0.0);
    }

    #[test]
    fn test_reshuffle_matches_dense() {
        let tensor = sample();
        let shuffle = [1, 2, 0];
        assert_eq!(
            tensor.reshuffle(&shuffle).to_dense(),
            tensor.to_dense().reshuffle(&shuffle)
        );
    }

    #[test]
    fn test_fix_slate_matches_dense() {
        let tensor = sample();
        for mode in 0..3 {
            assert_eq!(
                tensor.fix_slate(mode, 1).to_dense(),
                tensor.to_dense().fix_slate(mode, 1)
            );
        }
    }

    #[test]
    fn test_trace_matches_dense() {
        let mut tensor = SparseTensor::new(&[2, 3, 2]);
        tensor.set(&[0, 1, 0], 1.0);
        tensor.set(&[1, 2, 1], 2.0);
        tensor.set(&[1, 0, 0], 5.0);
        assert_eq!(tensor.trace(&[(0, 2)]).to_dense(), tensor.to_dense().trace(&[(0, 2)]));
    }

    #[test]
    fn test_mixed_contractions_match_dense() {
        // [3, 2, 2] with the shared mode of dimension 3 in front
        let lhs = sample().reshuffle(&[1, 0, 2]);
        let rhs = SparseTensor::from_entries(&[3, 2, 4], [(0, 1.0), (5, 2.0), (9, -1.0), (22, 0.5)]);
        let reference = DenseTensor::contract(&lhs.to_dense(), true, &rhs.to_dense(), false, 1);
        assert_eq!(reference.dimensions(), &[2, 2, 2, 4]);

        assert_approx_eq!(
            &DenseTensor,
            &contract_sparse_dense(&lhs, true, &rhs.to_dense(), false, 1),
            &reference
        );
        assert_approx_eq!(
            &DenseTensor,
            &contract_dense_sparse(&lhs.to_dense(), true, &rhs, false, 1),
            &reference
        );
        assert_approx_eq!(
            &DenseTensor,
            &contract_sparse_sparse(&lhs, true, &rhs, false, 1).to_dense(),
            &reference
        );
    }

    #[test]
    fn test_transposed_right_operand() {
        let lhs = sample();
        let rhs = SparseTensor::from_entries(&[5, 2, 3], [(1, 1.0), (6, 2.0), (17, -3.0), (29, 1.0)]);
        let reference = DenseTensor::contract(&lhs.to_dense(), true, &rhs.to_dense(), true, 2);
        assert_eq!(reference.dimensions(), &[2, 5]);
        assert_approx_eq!(
            &DenseTensor,
            &contract_dense_sparse(&lhs.to_dense(), true, &rhs, true, 2),
            &reference
        );
        assert_approx_eq!(
            &DenseTensor,
            &contract_sparse_sparse(&lhs, true, &rhs, true, 2).to_dense(),
            &reference
        );
    }

    #[test]
    fn test_norm_and_arithmetic() {
        let mut tensor = sample();
        assert_approx_eq!(f64, tensor.frob_norm(), tensor.to_dense().frob_norm());
        let copy = tensor.clone();
        tensor += &copy;
        tensor *= 0.5;
        assert_eq!(tensor, copy);
        tensor -= &copy;
        assert_approx_eq!(f64, tensor.frob_norm(), 0.0);
    }
}
