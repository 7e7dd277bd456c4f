use std::sync::Arc;

use float_cmp::assert_approx_eq;
use itertools::Itertools;
use rand::{rngs::StdRng, SeedableRng};
use tncompress::{
    contractionpath::paths::{
        branchbound::BranchBound,
        greedy::{Greedy, GreedyScore},
        left_to_right::LeftToRight,
        ContractionConfig, ContractionHeuristic,
    },
    path,
    random::{random_dense, random_sparse, random_tensor_train},
    tensornetwork::{
        dense::DenseTensor,
        factorization::TruncationOptions,
        indexed::{create_tensor_network, IndexedNetwork},
        link::Link,
        node::TensorNode,
        tensordata::TensorData,
        TensorNetwork,
    },
};

fn setup_chain(rng: &mut StdRng) -> TensorNetwork {
    create_tensor_network(
        vec![
            (random_dense(&[2, 3], rng).into(), vec![0, 1]),
            (random_dense(&[3, 4, 2], rng).into(), vec![1, 2, 3]),
            (random_dense(&[4, 5], rng).into(), vec![2, 4]),
        ],
        &[0, 3, 4],
    )
}

fn difference_norm(lhs: &TensorNetwork, rhs: &TensorNetwork) -> f64 {
    let mut difference = lhs.fully_contracted_tensor().into_dense();
    difference -= &rhs.fully_contracted_tensor().into_dense();
    difference.frob_norm()
}

#[test]
fn test_chain_contraction_orders_agree() {
    let mut rng = StdRng::seed_from_u64(21);
    let tn = setup_chain(&mut rng);
    let results = [
        path![(0, 1), (0, 2)],
        path![(1, 2), (0, 1)],
        path![(0, 2), (0, 1)],
    ]
    .iter()
    .map(|path| {
        let mut copy = tn.clone();
        let root = copy.contract_path(path).unwrap();
        assert_eq!(copy.live_nodes().collect_vec(), vec![root]);
        copy.fully_contracted_tensor()
    })
    .collect_vec();

    let mut planned = tn.clone();
    planned.contract_nodes([0, 1, 2]);
    let expected = planned.fully_contracted_tensor();
    assert_eq!(expected.dimensions(), &[2, 2, 5]);
    for result in &results {
        assert_approx_eq!(&TensorData, result, &expected, epsilon = 1e-12);
    }
}

#[test]
fn test_self_loop_is_traced() {
    // t[i, k, k] with the last two modes linked to each other
    let mut rng = StdRng::seed_from_u64(22);
    let tensor = random_dense(&[2, 3, 3], &mut rng);
    let node = TensorNode::new(
        tensor.clone().into(),
        vec![
            Link::external(0, 2),
            Link::internal(0, 2, 3),
            Link::internal(0, 1, 3),
        ],
    );
    let mut tn = TensorNetwork::from_parts(vec![node], vec![Link::internal(0, 0, 2)]);
    tn.trace_out_self_links(0);
    tn.require_valid_network();
    assert_eq!(tn.node(0).degree(), 1);
    for i in 0..2 {
        let expected = (0..3).map(|k| tensor.get(&[i, k, k])).sum::<f64>();
        assert_approx_eq!(f64, tn.entry(&[i]), expected, epsilon = 1e-12);
    }
}

#[test]
fn test_disjoint_scalars_are_absorbed() {
    let a = DenseTensor::from_vec(&[2], vec![1., 2.]);
    let b = DenseTensor::from_vec(&[2], vec![3., -4.]);
    let c = DenseTensor::from_vec(&[3], vec![1., 2., 3.]);
    let mut tn = create_tensor_network(
        vec![(a.into(), vec![0]), (b.into(), vec![0]), (c.into(), vec![1])],
        &[1],
    );
    assert_eq!(tn.nodes().len(), 3);
    tn.contract_unconnected_subnetworks();
    tn.require_valid_network();
    assert_eq!(tn.nodes().len(), 1);
    assert_eq!(
        tn.measure(&[vec![0], vec![1], vec![2]]),
        vec![-5., -10., -15.]
    );
}

#[test]
fn test_frob_norm_of_single_payload() {
    let mut rng = StdRng::seed_from_u64(23);
    let tensor = random_dense(&[3, 4, 5], &mut rng);
    let tn = TensorNetwork::from_tensor(tensor.clone());
    assert_approx_eq!(f64, tn.frob_norm(), tensor.frob_norm(), epsilon = 1e-12);
}

#[test]
fn test_frob_norm_of_tensor_train() {
    let mut rng = StdRng::seed_from_u64(24);
    let tn = random_tensor_train(&[2, 3, 2, 3], &[3, 4, 3], &mut rng);
    let full = tn.fully_contracted_tensor();
    assert_approx_eq!(f64, tn.frob_norm(), full.frob_norm(), epsilon = 1e-10);
}

#[test]
fn test_rounding_sweep() {
    let mut rng = StdRng::seed_from_u64(25);
    let mut tn = random_tensor_train(&[3, 3, 3, 3, 3], &[3, 9, 9, 3], &mut rng);
    // orthogonal cores around the rounded edge
    tn.transfer_core(0, 1, false);
    tn.transfer_core(4, 3, false);
    tn.transfer_core(3, 2, false);
    let reference = tn.clone();

    let mut errors = Vec::new();
    for max_rank in (1..=9).rev() {
        let mut rounded = reference.clone();
        rounded.round_edge(2, 1, &TruncationOptions::default().with_max_rank(max_rank));
        rounded.require_valid_network();
        let bond = rounded.node(1).neighbors()[2];
        assert!(bond.links(2));
        assert!(bond.dimension <= max_rank);
        errors.push(difference_norm(&rounded, &reference));
    }
    assert_approx_eq!(f64, errors[0], 0.0, epsilon = 1e-10);
    assert!(errors.windows(2).all(|w| w[0] <= w[1] + 1e-10), "{errors:?}");
}

#[test]
fn test_transfer_core_back_and_forth() {
    let mut rng = StdRng::seed_from_u64(26);
    let tn = random_tensor_train(&[2, 3, 4], &[5, 5], &mut rng);
    let mut moved = tn.clone();
    moved.transfer_core(0, 1, false);
    moved.transfer_core(1, 2, true);
    moved.transfer_core(2, 1, false);
    moved.transfer_core(1, 0, true);
    moved.require_valid_network();
    // only the rank revealing moves shrink a bond
    assert_eq!(moved.node(0).neighbors()[1].dimension, 2);
    assert_eq!(moved.node(2).neighbors()[0].dimension, 5);
    assert_approx_eq!(f64, difference_norm(&moved, &tn), 0.0, epsilon = 1e-10);
}

#[test]
fn test_every_heuristic_gives_the_same_tensor() {
    let mut rng = StdRng::seed_from_u64(27);
    let tn = random_tensor_train(&[2, 2, 2, 2, 2, 2], &[2, 3, 4, 3, 2], &mut rng);
    let mut reference = tn.clone();
    reference.contract_path(&path![(0, 1), (0, 2), (0, 3), (0, 4), (0, 5)]);
    let expected = reference.fully_contracted_tensor();

    let heuristics: Vec<Box<dyn ContractionHeuristic>> = vec![
        Box::new(Greedy::new(GreedyScore::Cost)),
        Box::new(Greedy::new(GreedyScore::Memory)),
        Box::new(BranchBound::default()),
        Box::new(LeftToRight),
    ];
    for heuristic in heuristics {
        let name = heuristic.name();
        let config = Arc::new(ContractionConfig::new(vec![heuristic]));
        let mut copy = tn.clone().with_config(config);
        let root = copy.contract_nodes(0..6).unwrap();
        assert_eq!(copy.live_nodes().collect_vec(), vec![root], "{name}");
        assert_approx_eq!(
            &TensorData,
            &copy.fully_contracted_tensor(),
            &expected,
            epsilon = 1e-10
        );
    }
}

#[test]
fn test_partial_contraction_keeps_entries() {
    let mut rng = StdRng::seed_from_u64(28);
    let tn = random_tensor_train(&[2, 3, 2, 3, 2], &[2, 3, 3, 2], &mut rng);
    let positions = (0..2)
        .cartesian_product(0..3)
        .map(|(i, j)| vec![i, j, 1, j, i])
        .collect_vec();
    let expected = tn.measure(&positions);

    let mut partial = tn.clone();
    partial.contract_nodes([1, 2, 3]);
    partial.sanitize();
    assert_eq!(partial.nodes().len(), 3);
    for (value, reference) in partial.measure(&positions).iter().zip(&expected) {
        assert_approx_eq!(f64, *value, *reference, epsilon = 1e-12);
    }
}

#[test]
fn test_sparse_payloads() {
    let mut rng = StdRng::seed_from_u64(29);
    let a = random_sparse(&[3, 4], 0.5, &mut rng);
    let b = random_dense(&[4, 5], &mut rng);
    let c = random_sparse(&[5, 3], 0.4, &mut rng);
    let sparse = create_tensor_network(
        vec![
            (a.clone().into(), vec![0, 1]),
            (b.clone().into(), vec![1, 2]),
            (c.clone().into(), vec![2, 3]),
        ],
        &[0, 3],
    );
    let dense = create_tensor_network(
        vec![
            (a.to_dense().into(), vec![0, 1]),
            (b.into(), vec![1, 2]),
            (c.to_dense().into(), vec![2, 3]),
        ],
        &[0, 3],
    );
    assert!(sparse.node(0).tensor().is_sparse());
    assert_approx_eq!(
        &TensorData,
        &sparse.fully_contracted_tensor(),
        &dense.fully_contracted_tensor(),
        epsilon = 1e-12
    );
    assert_approx_eq!(f64, sparse.frob_norm(), dense.frob_norm(), epsilon = 1e-12);
}

#[test]
fn test_indexed_expression() {
    // trace(A B) as an indexed expression
    let mut rng = StdRng::seed_from_u64(30);
    let a = random_dense(&[3, 4], &mut rng);
    let b = random_dense(&[4, 3], &mut rng);
    let expected = (0..3)
        .cartesian_product(0..4)
        .map(|(i, k)| a.get(&[i, k]) * b.get(&[k, i]))
        .sum::<f64>();
    let product =
        IndexedNetwork::from_tensor(a, vec![0, 1]) * IndexedNetwork::from_tensor(b, vec![1, 0]);
    assert!(product.legs().is_empty());
    assert_approx_eq!(f64, product.evaluate(&[]).get(&[]), expected, epsilon = 1e-12);
}

#[test]
fn test_reduce_representation_of_rounded_train() {
    let mut rng = StdRng::seed_from_u64(31);
    let mut tn = random_tensor_train(&[2, 2, 2, 2], &[4, 4, 4], &mut rng);
    let reference = tn.clone();
    for i in 0..3 {
        tn.round_edge(i, i + 1, &TruncationOptions::default());
    }
    // the outer bonds collapse to the physical dimension
    assert_eq!(tn.node(0).neighbors()[1].dimension, 2);
    tn.reduce_representation();
    assert!(tn.nodes().len() < 4);
    assert_approx_eq!(f64, difference_norm(&tn, &reference), 0.0, epsilon = 1e-10);
}
