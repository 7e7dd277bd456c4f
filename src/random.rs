//! Random payloads and networks for tests and benchmarks.

use itertools::Itertools;
use rand::distributions::Uniform;
use rand::seq::index;
use rand::Rng;

use crate::tensornetwork::dense::DenseTensor;
use crate::tensornetwork::link::Link;
use crate::tensornetwork::node::TensorNode;
use crate::tensornetwork::sparse::SparseTensor;
use crate::tensornetwork::TensorNetwork;

/// Generates a dense tensor with entries drawn uniformly from `[-1, 1)`.
///
/// # Examples
/// ```
/// # use tncompress::random::random_dense;
/// let tensor = random_dense(&[5, 4, 3], &mut rand::thread_rng());
/// assert!(tensor.data().iter().all(|x| (-1.0..1.0).contains(x)));
/// ```
pub fn random_dense<R>(dims: &[usize], rng: &mut R) -> DenseTensor
where
    R: Rng + ?Sized,
{
    let size = dims.iter().product::<usize>();
    let distribution = Uniform::new(-1.0, 1.0);
    let data = (0..size).map(|_| rng.sample(distribution)).collect_vec();
    DenseTensor::from_vec(dims, data)
}

/// Generates a sparse tensor in which a fraction `density` of the entries is set to a
/// value drawn uniformly from `[-1, 1)`.
///
/// # Examples
/// ```
/// # use tncompress::random::random_sparse;
/// let tensor = random_sparse(&[10, 10], 0.25, &mut rand::thread_rng());
/// assert!(tensor.nnz() <= 25);
/// ```
pub fn random_sparse<R>(dims: &[usize], density: f64, rng: &mut R) -> SparseTensor
where
    R: Rng + ?Sized,
{
    assert!((0.0..=1.0).contains(&density), "Density must be in [0, 1], got {density}");
    let size = dims.iter().product::<usize>();
    let nnz = (density * size as f64).round() as usize;
    let distribution = Uniform::new(-1.0, 1.0);
    let positions = index::sample(rng, size, nnz).into_vec();
    let entries = positions
        .into_iter()
        .map(|position| (position, rng.sample(distribution)))
        .collect_vec();
    SparseTensor::from_entries(dims, entries)
}

/// Generates a tensor train (matrix product state) with random dense cores. Core `k` has
/// the modes `[left bond, physical, right bond]`, where the first core has no left and
/// the last core no right bond. External index `k` is the physical mode of core `k`.
///
/// # Examples
/// ```
/// # use tncompress::random::random_tensor_train;
/// let tn = random_tensor_train(&[2, 3, 4], &[5, 6], &mut rand::thread_rng());
/// assert_eq!(tn.dimensions(), &[2, 3, 4]);
/// assert_eq!(tn.node(1).tensor().dimensions(), &[5, 3, 6]);
/// ```
pub fn random_tensor_train<R>(physical: &[usize], ranks: &[usize], rng: &mut R) -> TensorNetwork
where
    R: Rng + ?Sized,
{
    assert!(!physical.is_empty(), "A tensor train needs at least one core");
    assert_eq!(
        ranks.len() + 1,
        physical.len(),
        "A tensor train with {} cores needs {} ranks",
        physical.len(),
        physical.len() - 1
    );
    let last = physical.len() - 1;
    let physical_position = |k: usize| usize::from(k > 0);
    let right_position = |k: usize| physical_position(k) + 1;

    let mut nodes = Vec::with_capacity(physical.len());
    let mut external_links = Vec::with_capacity(physical.len());
    for (k, &dimension) in physical.iter().enumerate() {
        let mut dims = Vec::with_capacity(3);
        let mut neighbors = Vec::with_capacity(3);
        if k > 0 {
            dims.push(ranks[k - 1]);
            neighbors.push(Link::internal(k - 1, right_position(k - 1), ranks[k - 1]));
        }
        dims.push(dimension);
        neighbors.push(Link::external(k, dimension));
        if k < last {
            dims.push(ranks[k]);
            neighbors.push(Link::internal(k + 1, 0, ranks[k]));
        }
        nodes.push(TensorNode::new(random_dense(&dims, rng).into(), neighbors));
        external_links.push(Link::internal(k, physical_position(k), dimension));
    }
    TensorNetwork::from_parts(nodes, external_links)
}
