//! Orthogonal factorizations of matricized tensors.
//!
//! Every routine treats the first `split` modes of a tensor as rows and the
//! remaining modes as columns. The new bond mode is appended to the left factor
//! and prepended to the right factor.

use itertools::Itertools;
use log::trace;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::tensornetwork::dense::DenseTensor;

/// Parameters of a truncated singular value decomposition.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TruncationOptions {
    /// Maximal number of kept singular values.
    pub max_rank: usize,
    /// Singular values below `eps` times the largest one are dropped.
    pub eps: f64,
    /// Subtracted from every singular value before truncation.
    pub soft_threshold: f64,
    /// Keep the leading triplet even if every singular value is truncated.
    pub prevent_zero: bool,
}

impl Default for TruncationOptions {
    fn default() -> Self {
        Self {
            max_rank: usize::MAX,
            eps: 0.0,
            soft_threshold: 0.0,
            prevent_zero: true,
        }
    }
}

impl TruncationOptions {
    #[must_use]
    pub fn with_max_rank(mut self, max_rank: usize) -> Self {
        assert!(max_rank > 0, "Maximal rank must be positive");
        self.max_rank = max_rank;
        self
    }

    #[must_use]
    pub fn with_eps(mut self, eps: f64) -> Self {
        assert!((0.0..1.0).contains(&eps), "Relative epsilon must lie in [0, 1)");
        self.eps = eps;
        self
    }

    #[must_use]
    pub fn with_soft_threshold(mut self, soft_threshold: f64) -> Self {
        assert!(soft_threshold >= 0.0, "Soft threshold must not be negative");
        self.soft_threshold = soft_threshold;
        self
    }

    #[must_use]
    pub fn with_prevent_zero(mut self, prevent_zero: bool) -> Self {
        self.prevent_zero = prevent_zero;
        self
    }
}

/// The factors of a (truncated) singular value decomposition.
#[derive(Debug, Clone)]
pub struct SvdResult {
    /// Left singular vectors, modes `[rows.., rank]`.
    pub u: DenseTensor,
    /// Singular values in descending order.
    pub singular_values: Vec<f64>,
    /// Right singular vectors, modes `[rank, cols..]`.
    pub vt: DenseTensor,
}

impl SvdResult {
    /// The number of kept singular values.
    pub fn rank(&self) -> usize {
        self.singular_values.len()
    }

    /// Folds the singular values into the right factor.
    pub fn absorb_right(self) -> (DenseTensor, DenseTensor) {
        let Self {
            u,
            singular_values,
            mut vt,
        } = self;
        scale_leading_mode(&mut vt, &singular_values);
        (u, vt)
    }
}

/// Multiplies every slice of the first mode by the matching factor.
fn scale_leading_mode(tensor: &mut DenseTensor, factors: &[f64]) {
    let stride = tensor.size() / factors.len();
    for (slice, &factor) in tensor.data_mut().chunks_mut(stride).zip(factors) {
        slice.iter_mut().for_each(|x| *x *= factor);
    }
}

fn split_dimensions(tensor: &DenseTensor, split: usize) -> (Vec<usize>, Vec<usize>) {
    let (rows, cols) = tensor.dimensions().split_at(split);
    (rows.to_vec(), cols.to_vec())
}

fn with_bond(mut modes: Vec<usize>, bond: usize, front: bool) -> Vec<usize> {
    if front {
        modes.insert(0, bond);
    } else {
        modes.push(bond);
    }
    modes
}

/// Thin QR decomposition. The bond has dimension `min(rows, cols)`.
///
/// # Examples
/// ```
/// # use tncompress::tensornetwork::dense::DenseTensor;
/// # use tncompress::tensornetwork::factorization::qr;
/// let tensor = DenseTensor::from_vec(&[3, 2], vec![1., 2., 3., 4., 5., 6.]);
/// let (q, r) = qr(&tensor, 1);
/// assert_eq!(q.dimensions(), &[3, 2]);
/// assert_eq!(r.dimensions(), &[2, 2]);
/// ```
pub fn qr(tensor: &DenseTensor, split: usize) -> (DenseTensor, DenseTensor) {
    let (row_modes, col_modes) = split_dimensions(tensor, split);
    let decomposition = tensor.to_matrix(split).qr();
    let q = decomposition.q();
    let r = decomposition.r();
    let rank = q.ncols();
    (
        DenseTensor::from_matrix(&q, with_bond(row_modes, rank, false)),
        DenseTensor::from_matrix(&r, with_bond(col_modes, rank, true)),
    )
}

/// Rank-revealing orthogonal factorization `tensor = Q C` where `Q` has orthonormal
/// columns. The bond dimension is the numerical rank of the matricization (at least 1).
pub fn qc(tensor: &DenseTensor, split: usize) -> (DenseTensor, DenseTensor) {
    let (row_modes, col_modes) = split_dimensions(tensor, split);
    let matrix = tensor.to_matrix(split);
    let (rows, cols) = matrix.shape();
    let (u, singular_values, vt) = sorted_svd(matrix);

    let tolerance =
        f64::EPSILON * singular_values.first().copied().unwrap_or_default() * rows.max(cols) as f64;
    let rank = singular_values
        .iter()
        .take_while(|&&s| s > tolerance)
        .count()
        .max(1);
    trace!(rows, cols, rank; "Rank revealing factorization");

    let q = u.columns(0, rank).into_owned();
    let mut core = vt.rows(0, rank).into_owned();
    for (mut row, &s) in core.row_iter_mut().zip(&singular_values) {
        row *= s;
    }
    (
        DenseTensor::from_matrix(&q, with_bond(row_modes, rank, false)),
        DenseTensor::from_matrix(&core, with_bond(col_modes, rank, true)),
    )
}

/// Computes a full thin SVD with the singular values sorted in descending order.
fn sorted_svd(matrix: DMatrix<f64>) -> (DMatrix<f64>, Vec<f64>, DMatrix<f64>) {
    let svd = matrix.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        unreachable!("singular vectors were requested")
    };
    let order = (0..svd.singular_values.len())
        .sorted_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]))
        .collect_vec();
    let singular_values = order.iter().map(|&i| svd.singular_values[i]).collect_vec();
    let u = DMatrix::from_fn(u.nrows(), order.len(), |i, c| u[(i, order[c])]);
    let v_t = DMatrix::from_fn(order.len(), v_t.ncols(), |c, j| v_t[(order[c], j)]);
    (u, singular_values, v_t)
}

/// Decides how many singular values survive and which values they take.
fn truncate(singular_values: &[f64], options: &TruncationOptions) -> Vec<f64> {
    let thresholded = singular_values
        .iter()
        .map(|&s| (s - options.soft_threshold).max(0.0))
        .collect_vec();
    let largest = thresholded.first().copied().unwrap_or_default();
    let kept = thresholded
        .iter()
        .take(options.max_rank)
        .take_while(|&&s| s > 0.0 && s >= options.eps * largest)
        .copied()
        .collect_vec();
    if !kept.is_empty() {
        kept
    } else if options.prevent_zero {
        vec![singular_values.first().copied().unwrap_or_default()]
    } else {
        vec![0.0]
    }
}

/// Truncated singular value decomposition.
///
/// If no singular value survives truncation, a single triplet is kept so the bond stays
/// valid: with `prevent_zero` it carries the leading singular value, otherwise zero.
///
/// # Examples
/// ```
/// # use tncompress::tensornetwork::dense::DenseTensor;
/// # use tncompress::tensornetwork::factorization::{svd, TruncationOptions};
/// let tensor = DenseTensor::from_vec(&[2, 2], vec![3., 0., 0., 1.]);
/// let result = svd(&tensor, 1, &TruncationOptions::default().with_max_rank(1));
/// assert_eq!(result.singular_values, vec![3.]);
/// assert_eq!(result.u.dimensions(), &[2, 1]);
/// assert_eq!(result.vt.dimensions(), &[1, 2]);
/// ```
pub fn svd(tensor: &DenseTensor, split: usize, options: &TruncationOptions) -> SvdResult {
    let (row_modes, col_modes) = split_dimensions(tensor, split);
    let (u, all_values, vt) = sorted_svd(tensor.to_matrix(split));
    let singular_values = truncate(&all_values, options);
    let rank = singular_values.len();
    trace!(full_rank = all_values.len(), rank; "Truncated singular value decomposition");

    SvdResult {
        u: DenseTensor::from_matrix(
            &u.columns(0, rank).into_owned(),
            with_bond(row_modes, rank, false),
        ),
        singular_values,
        vt: DenseTensor::from_matrix(
            &vt.rows(0, rank).into_owned(),
            with_bond(col_modes, rank, true),
        ),
    }
}
