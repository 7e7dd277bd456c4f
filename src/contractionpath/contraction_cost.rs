//! Different methods to compute the computational and memory cost of contractions
//! and contraction paths.

use crate::contractionpath::SimplePathRef;
use crate::tensornetwork::{NodeIndex, TensorNetwork};

/// Returns the number of entries of the node that results from contracting `a` and `b`.
///
/// # Examples
/// ```
/// # use tncompress::tensornetwork::dense::DenseTensor;
/// # use tncompress::tensornetwork::indexed::create_tensor_network;
/// # use tncompress::contractionpath::contraction_cost::result_size;
/// let tn = create_tensor_network(
///     vec![
///         (DenseTensor::ones(&[5, 7, 9]).into(), vec![0, 1, 2]),
///         (DenseTensor::ones(&[9, 11, 13]).into(), vec![2, 3, 4]),
///     ],
///     &[0, 1, 3, 4],
/// );
/// assert_eq!(result_size(&tn, 0, 1), 5005.);
/// ```
pub fn result_size(tn: &TensorNetwork, a: NodeIndex, b: NodeIndex) -> f64 {
    let node_a = tn.node(a);
    let node_b = tn.node(b);
    node_a
        .neighbors()
        .iter()
        .filter(|l| !l.links(b))
        .chain(node_b.neighbors().iter().filter(|l| !l.links(a)))
        .map(|l| l.dimension as f64)
        .product()
}

/// Returns the change in stored entries when contracting `a` and `b`: the size of the
/// result minus the sizes of both inputs.
///
/// # Examples
/// ```
/// # use tncompress::tensornetwork::dense::DenseTensor;
/// # use tncompress::tensornetwork::indexed::create_tensor_network;
/// # use tncompress::contractionpath::contraction_cost::contract_size_nodes;
/// let tn = create_tensor_network(
///     vec![
///         (DenseTensor::ones(&[5, 7, 9]).into(), vec![0, 1, 2]),   // 315 entries
///         (DenseTensor::ones(&[9, 11, 13]).into(), vec![2, 3, 4]), // 1287 entries
///     ],
///     &[0, 1, 3, 4],
/// );
/// // result has 5005 entries
/// assert_eq!(contract_size_nodes(&tn, 0, 1), 3403.);
/// ```
pub fn contract_size_nodes(tn: &TensorNetwork, a: NodeIndex, b: NodeIndex) -> f64 {
    result_size(tn, a, b) - tn.node(a).size() as f64 - tn.node(b).size() as f64
}

/// Returns the summed contraction cost of executing `path` on `tn`. The network itself is
/// not modified; the path is replayed on a payload-free copy.
///
/// # Examples
/// ```
/// # use tncompress::tensornetwork::dense::DenseTensor;
/// # use tncompress::tensornetwork::indexed::create_tensor_network;
/// # use tncompress::contractionpath::contraction_cost::contract_path_cost;
/// # use tncompress::path;
/// let tn = create_tensor_network(
///     vec![
///         (DenseTensor::ones(&[2, 3]).into(), vec![0, 1]),
///         (DenseTensor::ones(&[3, 4]).into(), vec![1, 2]),
///         (DenseTensor::ones(&[4, 5]).into(), vec![2, 3]),
///     ],
///     &[0, 3],
/// );
/// // 2*3*4 for the first and 2*4*5 for the second contraction
/// assert_eq!(contract_path_cost(&tn, &path![(0, 1), (0, 2)]), 64.);
/// ```
pub fn contract_path_cost(tn: &TensorNetwork, path: SimplePathRef) -> f64 {
    let mut shape = tn.stripped_subnet(|_| true);
    let mut cost = 0.0;
    for &(a, b) in path {
        cost += shape.contraction_cost(a, b);
        shape.contract(a, b);
    }
    cost
}

/// Returns the size of the largest intermediate node created by `path` on `tn`.
pub fn contract_path_max_size(tn: &TensorNetwork, path: SimplePathRef) -> f64 {
    let mut shape = tn.stripped_subnet(|_| true);
    let mut max_size = 0f64;
    for &(a, b) in path {
        max_size = max_size.max(result_size(&shape, a, b));
        shape.contract(a, b);
    }
    max_size
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::path;
    use crate::tensornetwork::dense::DenseTensor;
    use crate::tensornetwork::indexed::create_tensor_network;

    fn setup_simple() -> TensorNetwork {
        create_tensor_network(
            vec![
                (DenseTensor::ones(&[5, 2, 6]).into(), vec![4, 3, 2]),
                (DenseTensor::ones(&[5, 3, 8]).into(), vec![4, 0, 1]),
                (DenseTensor::ones(&[2, 7]).into(), vec![3, 5]),
            ],
            &[0, 1, 2, 5],
        )
    }

    #[test]
    fn test_contract_path_cost() {
        let tn = setup_simple();
        // (0, 1): 60 * 24, (0, 2): 288 * 7
        assert_eq!(contract_path_cost(&tn, &path![(0, 1), (0, 2)]), 1440. + 2016.);
        // (0, 2): 60 * 7, (0, 1): 210 * 24
        assert_eq!(contract_path_cost(&tn, &path![(0, 2), (0, 1)]), 420. + 5040.);
    }

    #[test]
    fn test_contract_path_max_size() {
        let tn = setup_simple();
        // intermediates [2, 6, 3, 8] and [6, 3, 8, 7]
        assert_eq!(contract_path_max_size(&tn, &path![(0, 1), (0, 2)]), 1008.);
        // intermediates [5, 6, 7] and [6, 7, 3, 8]
        assert_eq!(contract_path_max_size(&tn, &path![(0, 2), (0, 1)]), 1008.);
        assert_eq!(contract_path_max_size(&tn, &path![(1, 2)]), 1680.);
    }

    #[test]
    fn test_cost_does_not_modify() {
        let tn = setup_simple();
        contract_path_cost(&tn, &path![(0, 1), (0, 2)]);
        assert_eq!(tn.live_nodes().count(), 3);
        assert!(tn.node(0).has_tensor());
    }
}
