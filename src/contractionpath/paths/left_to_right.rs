use itertools::Itertools;

use crate::contractionpath::paths::{ContractionHeuristic, Proposal};
use crate::tensornetwork::TensorNetwork;

/// Contracts every live node into the one with the smallest id, in ascending order.
/// Applies to every network.
#[derive(Debug, Clone, Copy, Default)]
pub struct LeftToRight;

impl ContractionHeuristic for LeftToRight {
    fn name(&self) -> &'static str {
        "left-to-right"
    }

    fn propose(&self, tn: &TensorNetwork) -> Option<Proposal> {
        let mut shape = tn.stripped_subnet(|_| true);
        let live = shape.live_nodes().collect_vec();
        let Some((&first, rest)) = live.split_first() else {
            return Some(Proposal {
                cost: 0.,
                path: Vec::new(),
            });
        };
        let mut cost = 0.;
        let mut path = Vec::with_capacity(rest.len());
        for &other in rest {
            cost += shape.contraction_cost(first, other);
            shape.contract(first, other);
            path.push((first, other));
        }
        Some(Proposal { cost, path })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::path;
    use crate::tensornetwork::dense::DenseTensor;
    use crate::tensornetwork::indexed::create_tensor_network;

    #[test]
    fn test_left_to_right() {
        let tn = create_tensor_network(
            vec![
                (DenseTensor::ones(&[2, 3]).into(), vec![0, 1]),
                (DenseTensor::ones(&[3, 4]).into(), vec![1, 2]),
                (DenseTensor::ones(&[4, 5]).into(), vec![2, 3]),
            ],
            &[0, 3],
        );
        let mut subnet = tn.stripped_subnet(|_| true);
        subnet.contract(1, 2);
        let proposal = LeftToRight.propose(&subnet).unwrap();
        assert_eq!(proposal.path, path![(0, 1)]);
        // a[2, 3] with the merged node [3, 5]
        assert_eq!(proposal.cost, 30.);
    }
}
