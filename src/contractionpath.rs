//! Contraction paths and the heuristics that find them.

use crate::tensornetwork::NodeIndex;

mod candidates;
pub mod contraction_cost;
pub mod paths;

/// A simple, flat contraction path in replace-left format: the result of contracting
/// `(a, b)` is stored in `a`, and `b` must not appear afterwards. If you only need a
/// reference, prefer [`SimplePathRef`].
pub type SimplePath = Vec<(NodeIndex, NodeIndex)>;

/// Reference to a [`SimplePath`].
pub type SimplePathRef<'a> = &'a [(NodeIndex, NodeIndex)];

/// Macro to create contraction paths, assuming the left node is replaced in each
/// contraction.
///
/// # Examples
/// ```
/// # use tncompress::path;
/// # use tncompress::contractionpath::SimplePath;
/// let contraction_path: SimplePath = path![(0, 1), (0, 2), (0, 3)];
/// assert_eq!(contraction_path.len(), 3);
/// assert!(path![].is_empty());
/// ```
#[macro_export]
macro_rules! path {
    [] => {
        $crate::contractionpath::SimplePath::new()
    };
    [$( ($t0:expr, $t1:expr) ),+ $(,)?] => {
        vec![$( ($t0, $t1) ),+]
    };
}

/// Checks that no node is used after it has been contracted into another one.
///
/// # Panics
/// Panics on the first node that is used after being contracted.
pub(crate) fn validate_path(path: SimplePathRef) {
    let mut contracted = Vec::<NodeIndex>::new();
    for (u, v) in path {
        assert!(
            !contracted.contains(u) && !contracted.contains(v),
            "Contracting already contracted tensors: {u:?}, {v:?}, path: {path:?}"
        );
        assert_ne!(u, v, "Cannot contract node {u} with itself, path: {path:?}");
        contracted.push(*v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::path;

    #[test]
    fn test_path_macro() {
        let path: SimplePath = path![(0, 1), (0, 2), (3, 0),];
        assert_eq!(path, vec![(0, 1), (0, 2), (3, 0)]);
        validate_path(&path);
    }

    #[test]
    #[should_panic(expected = "Contracting already contracted tensors: 1, 2, path: [(0, 1), (1, 2)]")]
    fn test_validate_paths() {
        let invalid_path = path![(0, 1), (1, 2)];
        validate_path(&invalid_path);
    }

    #[test]
    #[should_panic(expected = "Contracting already contracted tensors: 0, 1, path: [(2, 1), (0, 1)]")]
    fn test_validate_paths_right() {
        validate_path(&path![(2, 1), (0, 1)]);
    }
}
