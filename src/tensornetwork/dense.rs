//! Dense, row-major tensors. The last mode is the fastest running one.

use std::ops::{AddAssign, MulAssign, SubAssign};

use float_cmp::{ApproxEq, F64Margin};
use itertools::Itertools;
use nalgebra::DMatrix;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Number of elements from which reductions run in parallel.
const PARALLEL_THRESHOLD: usize = 1 << 14;

/// A dense tensor of `f64` values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenseTensor {
    dimensions: Vec<usize>,
    data: Vec<f64>,
}

/// Returns the row-major strides of a tensor with the given `dimensions`.
pub(crate) fn strides(dimensions: &[usize]) -> Vec<usize> {
    let mut strides = vec![1; dimensions.len()];
    for d in (0..dimensions.len().saturating_sub(1)).rev() {
        strides[d] = strides[d + 1] * dimensions[d + 1];
    }
    strides
}

/// Returns the row-major linear position of the multi-index `positions`.
///
/// # Panics
/// Panics if the number of positions does not match the degree or a position is out of range.
pub(crate) fn linear_position(dimensions: &[usize], positions: &[usize]) -> usize {
    assert_eq!(
        positions.len(),
        dimensions.len(),
        "Index count mismatch: got {} positions for a tensor of degree {}",
        positions.len(),
        dimensions.len()
    );
    positions
        .iter()
        .zip(dimensions)
        .enumerate()
        .fold(0, |acc, (mode, (&position, &dimension))| {
            assert!(
                position < dimension,
                "Position {position} out of range for mode {mode} of dimension {dimension}"
            );
            acc * dimension + position
        })
}

/// Decodes a row-major linear `position` into a multi-index.
pub(crate) fn multi_index(dimensions: &[usize], mut position: usize) -> Vec<usize> {
    let mut index = vec![0; dimensions.len()];
    for d in (0..dimensions.len()).rev() {
        index[d] = position % dimensions[d];
        position /= dimensions[d];
    }
    index
}

/// Shape of a batched contraction, see [`DenseTensor::contract`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ContractionShape {
    /// Combined size of the free modes of the left operand.
    pub(crate) left: usize,
    /// Combined size of the shared modes.
    pub(crate) shared: usize,
    /// Combined size of the free modes of the right operand.
    pub(crate) right: usize,
    /// Dimensions of the result.
    pub(crate) dimensions: Vec<usize>,
}

impl ContractionShape {
    pub(crate) fn new(
        lhs: &[usize],
        lhs_trans: bool,
        rhs: &[usize],
        rhs_trans: bool,
        shared_modes: usize,
    ) -> Self {
        assert!(
            shared_modes <= lhs.len() && shared_modes <= rhs.len(),
            "Cannot contract {shared_modes} modes of tensors with degrees {} and {}",
            lhs.len(),
            rhs.len()
        );
        let (lhs_free, lhs_shared) = if lhs_trans {
            let (shared, free) = lhs.split_at(shared_modes);
            (free, shared)
        } else {
            lhs.split_at(lhs.len() - shared_modes)
        };
        let (rhs_shared, rhs_free) = if rhs_trans {
            let (free, shared) = rhs.split_at(rhs.len() - shared_modes);
            (shared, free)
        } else {
            rhs.split_at(shared_modes)
        };
        assert_eq!(
            lhs_shared, rhs_shared,
            "Dimensions of the contracted modes do not coincide"
        );

        Self {
            left: lhs_free.iter().product(),
            shared: lhs_shared.iter().product(),
            right: rhs_free.iter().product(),
            dimensions: lhs_free.iter().chain(rhs_free).copied().collect(),
        }
    }
}

impl DenseTensor {
    /// Creates a tensor of the given `dimensions` filled with zeros.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::tensornetwork::dense::DenseTensor;
    /// let tensor = DenseTensor::new(&[2, 3]);
    /// assert_eq!(tensor.size(), 6);
    /// assert_eq!(tensor.get(&[1, 2]), 0.0);
    /// ```
    pub fn new(dimensions: &[usize]) -> Self {
        assert!(
            dimensions.iter().all(|&d| d > 0),
            "Dimensions must be positive, got {dimensions:?}"
        );
        let size = dimensions.iter().product();
        Self {
            dimensions: dimensions.to_vec(),
            data: vec![0.0; size],
        }
    }

    /// Creates a tensor from row-major `data`.
    pub fn from_vec(dimensions: &[usize], data: Vec<f64>) -> Self {
        assert!(
            dimensions.iter().all(|&d| d > 0),
            "Dimensions must be positive, got {dimensions:?}"
        );
        assert_eq!(
            data.len(),
            dimensions.iter().product::<usize>(),
            "Data length does not match dimensions {dimensions:?}"
        );
        Self {
            dimensions: dimensions.to_vec(),
            data,
        }
    }

    /// Creates a tensor of degree zero.
    pub fn scalar(value: f64) -> Self {
        Self {
            dimensions: Vec::new(),
            data: vec![value],
        }
    }

    /// Creates a tensor of the given `dimensions` filled with ones.
    pub fn ones(dimensions: &[usize]) -> Self {
        let mut tensor = Self::new(dimensions);
        tensor.data.fill(1.0);
        tensor
    }

    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dimensions
    }

    #[inline]
    pub fn degree(&self) -> usize {
        self.dimensions.len()
    }

    /// The number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn data(&self) -> &[f64] {
        &self.data
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }

    /// Returns the entry at the multi-index `positions`.
    pub fn get(&self, positions: &[usize]) -> f64 {
        self.data[linear_position(&self.dimensions, positions)]
    }

    /// Sets the entry at the multi-index `positions`.
    pub fn set(&mut self, positions: &[usize], value: f64) {
        let position = linear_position(&self.dimensions, positions);
        self.data[position] = value;
    }

    /// Permutes the modes of the tensor. `shuffle[d]` is the new position of mode `d`.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::tensornetwork::dense::DenseTensor;
    /// let tensor = DenseTensor::from_vec(&[2, 3], vec![1., 2., 3., 4., 5., 6.]);
    /// let transposed = tensor.reshuffle(&[1, 0]);
    /// assert_eq!(transposed.dimensions(), &[3, 2]);
    /// assert_eq!(transposed.get(&[2, 1]), 6.);
    /// assert_eq!(transposed.get(&[1, 0]), 2.);
    /// ```
    pub fn reshuffle(&self, shuffle: &[usize]) -> Self {
        let degree = self.degree();
        assert_eq!(shuffle.len(), degree, "Shuffle has wrong length");
        assert!(
            shuffle.iter().sorted().copied().eq(0..degree),
            "{shuffle:?} is not a permutation"
        );
        if shuffle.iter().enumerate().all(|(d, &s)| d == s) {
            return self.clone();
        }

        let mut dimensions = vec![0; degree];
        for (d, &target) in shuffle.iter().enumerate() {
            dimensions[target] = self.dimensions[d];
        }
        let new_strides = strides(&dimensions);
        let target_strides = shuffle.iter().map(|&s| new_strides[s]).collect_vec();

        let mut data = vec![0.0; self.size()];
        let mut index = vec![0; degree];
        let mut target = 0;
        for &value in &self.data {
            data[target] = value;
            for d in (0..degree).rev() {
                index[d] += 1;
                target += target_strides[d];
                if index[d] < self.dimensions[d] {
                    break;
                }
                target -= target_strides[d] * self.dimensions[d];
                index[d] = 0;
            }
        }

        Self { dimensions, data }
    }

    /// Fixes `mode` to `position`, removing the mode from the tensor.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::tensornetwork::dense::DenseTensor;
    /// let tensor = DenseTensor::from_vec(&[2, 3], vec![1., 2., 3., 4., 5., 6.]);
    /// let column = tensor.fix_slate(1, 2);
    /// assert_eq!(column.dimensions(), &[2]);
    /// assert_eq!(column.data(), &[3., 6.]);
    /// ```
    pub fn fix_slate(&self, mode: usize, position: usize) -> Self {
        assert!(
            mode < self.degree(),
            "Cannot fix mode {mode} of a tensor of degree {}",
            self.degree()
        );
        let dimension = self.dimensions[mode];
        assert!(
            position < dimension,
            "Slate position {position} out of range for mode {mode} of dimension {dimension}"
        );

        let outer = self.dimensions[..mode].iter().product::<usize>();
        let inner = self.dimensions[mode + 1..].iter().product::<usize>();
        let mut data = Vec::with_capacity(outer * inner);
        for o in 0..outer {
            let start = (o * dimension + position) * inner;
            data.extend_from_slice(&self.data[start..start + inner]);
        }

        let mut dimensions = self.dimensions.clone();
        dimensions.remove(mode);
        Self { dimensions, data }
    }

    /// Sums over the diagonal of every mode pair in `pairs`. The remaining modes keep
    /// their relative order.
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
        if pairs.is_empty() {
            return self.clone();
        }

        let kept = (0..degree).filter(|m| !traced.contains(m)).collect_vec();
        let dimensions = kept.iter().map(|&m| self.dimensions[m]).collect_vec();
        let result_strides = strides(&dimensions);
        let mut target_strides = vec![0; degree];
        for (new, &old) in kept.iter().enumerate() {
            target_strides[old] = result_strides[new];
        }

        let mut data = vec![0.0; dimensions.iter().product()];
        let mut index = vec![0; degree];
        let mut target = 0;
        for &value in &self.data {
            if pairs.iter().all(|&(a, b)| index[a] == index[b]) {
                data[target] += value;
            }
            for d in (0..degree).rev() {
                index[d] += 1;
                target += target_strides[d];
                if index[d] < self.dimensions[d] {
                    break;
                }
                target -= target_strides[d] * self.dimensions[d];
                index[d] = 0;
            }
        }

        Self { dimensions, data }
    }

    /// Contracts the last (or, if `lhs_trans`, the first) `shared_modes` modes of `lhs` with the
    /// first (or, if `rhs_trans`, the last) `shared_modes` modes of `rhs`. The result carries the
    /// free modes of `lhs` followed by the free modes of `rhs`.
    ///
    /// # Examples
    /// ```
    /// # use tncompress::tensornetwork::dense::DenseTensor;
    /// let a = DenseTensor::from_vec(&[2, 2], vec![1., 2., 3., 4.]);
    /// let b = DenseTensor::from_vec(&[2], vec![1., 1.]);
    /// let ab = DenseTensor::contract(&a, false, &b, false, 1);
    /// assert_eq!(ab.data(), &[3., 7.]);
    /// let ba = DenseTensor::contract(&a, true, &b, false, 1);
    /// assert_eq!(ba.data(), &[4., 6.]);
    /// ```
    pub fn contract(
        lhs: &Self,
        lhs_trans: bool,
        rhs: &Self,
        rhs_trans: bool,
        shared_modes: usize,
    ) -> Self {
        let shape = ContractionShape::new(
            &lhs.dimensions,
            lhs_trans,
            &rhs.dimensions,
            rhs_trans,
            shared_modes,
        );
        let left = if lhs_trans {
            DMatrix::from_row_slice(shape.shared, shape.left, &lhs.data).transpose()
        } else {
            DMatrix::from_row_slice(shape.left, shape.shared, &lhs.data)
        };
        let right = if rhs_trans {
            DMatrix::from_row_slice(shape.right, shape.shared, &rhs.data).transpose()
        } else {
            DMatrix::from_row_slice(shape.shared, shape.right, &rhs.data)
        };
        let product = left * right;
        Self::from_matrix(&product, shape.dimensions)
    }

    /// Returns the number of rows and columns when the first `split` modes are
    /// treated as rows.
    pub fn matricize(&self, split: usize) -> (usize, usize) {
        assert!(split <= self.degree(), "Split {split} exceeds degree");
        (
            self.dimensions[..split].iter().product(),
            self.dimensions[split..].iter().product(),
        )
    }

    pub(crate) fn to_matrix(&self, split: usize) -> DMatrix<f64> {
        let (rows, cols) = self.matricize(split);
        DMatrix::from_row_slice(rows, cols, &self.data)
    }

    pub(crate) fn from_matrix(matrix: &DMatrix<f64>, dimensions: Vec<usize>) -> Self {
        // The column-major storage of the transpose is the row-major storage of the matrix.
        let data = matrix.transpose().as_slice().to_vec();
        Self::from_vec(&dimensions, data)
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        self.data.iter_mut().for_each(|x| *x *= factor);
    }

    /// Sum of the elementwise products of two tensors of equal dimensions.
    pub fn dot(&self, other: &Self) -> f64 {
        assert_eq!(self.dimensions, other.dimensions, "Dimension mismatch");
        if self.size() >= PARALLEL_THRESHOLD {
            self.data
                .par_iter()
                .zip(other.data.par_iter())
                .map(|(a, b)| a * b)
                .sum()
        } else {
            self.data.iter().zip(&other.data).map(|(a, b)| a * b).sum()
        }
    }

    /// The Frobenius norm.
    pub fn frob_norm(&self) -> f64 {
        self.dot(self).sqrt()
    }
}

impl AddAssign<&DenseTensor> for DenseTensor {
    fn add_assign(&mut self, rhs: &DenseTensor) {
        assert_eq!(self.dimensions, rhs.dimensions, "Dimension mismatch");
        self.data.iter_mut().zip(&rhs.data).for_each(|(a, b)| *a += b);
    }
}

impl SubAssign<&DenseTensor> for DenseTensor {
    fn sub_assign(&mut self, rhs: &DenseTensor) {
        assert_eq!(self.dimensions, rhs.dimensions, "Dimension mismatch");
        self.data.iter_mut().zip(&rhs.data).for_each(|(a, b)| *a -= b);
    }
}

impl MulAssign<f64> for DenseTensor {
    fn mul_assign(&mut self, rhs: f64) {
        self.scale(rhs);
    }
}

impl ApproxEq for &DenseTensor {
    type Margin = F64Margin;

    fn approx_eq<M: Into<Self::Margin>>(self, other: Self, margin: M) -> bool {
        let margin = margin.into();
        self.dimensions == other.dimensions
            && self
                .data
                .iter()
                .zip(&other.data)
                .all(|(a, b)| a.approx_eq(*b, margin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use float_cmp::assert_approx_eq;

    fn iota(dimensions: &[usize]) -> DenseTensor {
        let size = dimensions.iter().product::<usize>();
        DenseTensor::from_vec(dimensions, (0..size).map(|x| x as f64).collect())
    }

    #[test]
    fn test_linear_position() {
        assert_eq!(linear_position(&[2, 3, 4], &[1, 2, 3]), 23);
        assert_eq!(multi_index(&[2, 3, 4], 23), vec![1, 2, 3]);
        assert_eq!(linear_position(&[], &[]), 0);
    }

    #[test]
    #[should_panic(expected = "Position 3 out of range for mode 1 of dimension 3")]
    fn test_linear_position_out_of_range() {
        linear_position(&[2, 3], &[0, 3]);
    }

    #[test]
    fn test_reshuffle_three_modes() {
        let tensor = iota(&[2, 3, 4]);
        // mode 0 -> 2, mode 1 -> 0, mode 2 -> 1
        let shuffled = tensor.reshuffle(&[2, 0, 1]);
        assert_eq!(shuffled.dimensions(), &[3, 4, 2]);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    assert_eq!(shuffled.get(&[j, k, i]), tensor.get(&[i, j, k]));
                }
            }
        }
    }

    #[test]
    fn test_fix_slate_middle() {
        let tensor = iota(&[2, 3, 2]);
        let fixed = tensor.fix_slate(1, 1);
        assert_eq!(fixed.dimensions(), &[2, 2]);
        assert_eq!(fixed.data(), &[2., 3., 8., 9.]);
    }

    #[test]
    fn test_trace() {
        let tensor = iota(&[2, 3, 3, 2]);
        let traced = tensor.trace(&[(1, 2)]);
        assert_eq!(traced.dimensions(), &[2, 2]);
        for i in 0..2 {
            for l in 0..2 {
                let expected = (0..3).map(|k| tensor.get(&[i, k, k, l])).sum::<f64>();
                assert_approx_eq!(f64, traced.get(&[i, l]), expected);
            }
        }
    }

    #[test]
    fn test_full_trace_to_scalar() {
        let tensor = iota(&[3, 3]);
        let traced = tensor.trace(&[(0, 1)]);
        assert_eq!(traced.degree(), 0);
        assert_approx_eq!(f64, traced.get(&[]), 0. + 4. + 8.);
    }

    #[test]
    fn test_contract_transposed_variants() {
        // a[i, k] and b[k, j]
        let a = iota(&[2, 3]);
        let b = iota(&[3, 4]);
        let reference = DenseTensor::contract(&a, false, &b, false, 1);
        assert_eq!(reference.dimensions(), &[2, 4]);
        for i in 0..2 {
            for j in 0..4 {
                let expected = (0..3).map(|k| a.get(&[i, k]) * b.get(&[k, j])).sum::<f64>();
                assert_approx_eq!(f64, reference.get(&[i, j]), expected);
            }
        }

        let a_t = a.reshuffle(&[1, 0]);
        let b_t = b.reshuffle(&[1, 0]);
        assert_approx_eq!(
            &DenseTensor,
            &DenseTensor::contract(&a_t, true, &b_t, true, 1),
            &reference
        );
        assert_approx_eq!(
            &DenseTensor,
            &DenseTensor::contract(&a_t, true, &b, false, 1),
            &reference
        );
    }

    #[test]
    fn test_outer_product() {
        let a = DenseTensor::from_vec(&[2], vec![1., 2.]);
        let b = DenseTensor::from_vec(&[3], vec![1., 10., 100.]);
        let ab = DenseTensor::contract(&a, false, &b, false, 0);
        assert_eq!(ab.dimensions(), &[2, 3]);
        assert_eq!(ab.data(), &[1., 10., 100., 2., 20., 200.]);
    }

    #[test]
    #[should_panic(expected = "Dimensions of the contracted modes do not coincide")]
    fn test_contract_dimension_mismatch() {
        DenseTensor::contract(&iota(&[2, 3]), false, &iota(&[2, 3]), false, 1);
    }

    #[test]
    fn test_arithmetic_and_norm() {
        let mut a = iota(&[2, 2]);
        let b = DenseTensor::ones(&[2, 2]);
        a += &b;
        assert_eq!(a.data(), &[1., 2., 3., 4.]);
        a -= &b;
        a *= 2.0;
        assert_eq!(a.data(), &[0., 2., 4., 6.]);
        assert_approx_eq!(f64, a.frob_norm(), 56f64.sqrt());
    }

    #[test]
    fn test_parallel_dot_matches_serial() {
        let a = DenseTensor::ones(&[PARALLEL_THRESHOLD + 3]);
        assert_approx_eq!(f64, a.dot(&a), (PARALLEL_THRESHOLD + 3) as f64);
    }
}
