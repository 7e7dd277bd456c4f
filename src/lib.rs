//! Tensor networks with pairwise contraction, contraction order planning and
//! truncation of bond dimensions.

pub mod contractionpath;
pub mod random;
pub mod tensornetwork;
