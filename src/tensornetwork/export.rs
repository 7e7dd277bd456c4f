//! Graphviz export of the network structure.

use std::fmt::Write;

use crate::tensornetwork::TensorNetwork;

impl TensorNetwork {
    /// Returns a Graphviz (`dot`) description of the network. Live nodes are records
    /// with one port per mode, external indices are diamonds named by their position and
    /// edges are labeled with their dimension.
    pub fn to_dot(&self) -> String {
        let mut dot = String::new();
        self.write_dot(&mut dot)
            .expect("Writing into a String cannot fail");
        dot
    }

    fn write_dot(&self, out: &mut impl Write) -> std::fmt::Result {
        writeln!(out, "graph G {{")?;
        writeln!(out, "graph [mclimit=1000, maxiter=1000, overlap = false, splines = true]")?;

        for (i, node) in self.nodes.iter().enumerate() {
            if node.erased {
                writeln!(
                    out,
                    "\tN{i} [label=\"N{i}\", shape=circle, fixedsize=shape, height=0.45];"
                )?;
                continue;
            }

            let degree = node.degree();
            let label = if degree == 0 {
                format!("N{i}")
            } else {
                (0..degree)
                    .map(|k| {
                        if k == degree / 2 {
                            format!("<i{k}> N{i}")
                        } else {
                            format!("<i{k}> ")
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("| ")
            };
            writeln!(
                out,
                "\tN{i} [label=\"{label}\", shape=record, fixedsize=shape, height=0.45, style=\"rounded,filled\"];"
            )?;

            for (j, link) in node.neighbors.iter().enumerate() {
                if link.external {
                    writeln!(
                        out,
                        "\t{} [shape=diamond, fixedsize=shape, height=0.38, width=0.38, style=filled];",
                        link.index_position
                    )?;
                    writeln!(
                        out,
                        "\tN{i}:i{j} -- {} [len=1, label=\"{}\"];",
                        link.index_position, link.dimension
                    )?;
                } else if link.other < i || (link.other == i && j < link.index_position) {
                    writeln!(
                        out,
                        "\tN{i}:i{j} -- N{}:i{} [label=\"{}\"];",
                        link.other, link.index_position, link.dimension
                    )?;
                }
            }
        }
        writeln!(out, "}}")
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use crate::random::random_tensor_train;

    #[test]
    fn test_dot_lists_every_edge_once() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut tn = random_tensor_train(&[2, 3, 2], &[4, 5], &mut rng);
        let dot = tn.to_dot();
        assert!(dot.starts_with("graph G {"));
        assert!(dot.trim_end().ends_with('}'));
        assert!(dot.contains("\tN1:i0 -- N0:i1 [label=\"4\"];"));
        assert!(dot.contains("\tN2:i0 -- N1:i2 [label=\"5\"];"));
        assert!(dot.contains("\tN1:i1 -- 1 [len=1, label=\"3\"];"));
        assert_eq!(dot.matches(" -- ").count(), 5);

        tn.contract(0, 1);
        let dot = tn.to_dot();
        assert!(dot.contains("\tN1 [label=\"N1\", shape=circle"));
    }
}
