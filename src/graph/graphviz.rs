//! Graphviz (DOT) export of the compiled graph.
//!
//! Passes are rectangles, resource versions are ellipses; culled elements
//! are dashed. Read edges are plain, write edges bold, and aliases show up
//! as labeled re-wiring arrows. Export between `compile()` and `execute()`
//! to see culling and refcount results; execution resets the graph.

use std::io::{self, Write};

use crate::graph::FrameGraph;

impl FrameGraph {
    /// Write the graph as Graphviz DOT.
    pub fn export_graphviz(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out, "digraph framegraph {{")?;
        writeln!(out, "rankdir = LR")?;
        writeln!(out, "node [fontname=\"helvetica\", fontsize=10]")?;
        writeln!(out)?;

        for (index, pass) in self.passes.iter().enumerate() {
            let style = if pass.is_culled() { "dashed" } else { "filled" };
            let color = if pass.side_effect {
                "darkorange"
            } else {
                "orange"
            };
            writeln!(
                out,
                "\"P{}\" [label=\"{}\\nrefs: {}\", shape=rectangle, style={}, fillcolor={}]",
                index, pass.name, pass.ref_count, style, color,
            )?;
        }
        writeln!(out)?;

        for (index, node) in self.nodes.iter().enumerate() {
            let base = self.entries[node.entry].base();
            let imported = if base.imported { ", imported" } else { "" };
            let style = if node.is_culled() { "dashed" } else { "solid" };
            writeln!(
                out,
                "\"R{}\" [label=\"{} v{}\\nid: {}{}\", shape=ellipse, style={}]",
                index, base.name, node.version, base.id, imported, style,
            )?;
        }
        writeln!(out)?;

        for (index, pass) in self.passes.iter().enumerate() {
            for write in &pass.writes {
                writeln!(out, "\"P{}\" -> \"R{}\" [style=bold]", index, write.index())?;
            }
            for read in &pass.reads {
                writeln!(out, "\"R{}\" -> \"P{}\"", read.index(), index)?;
            }
        }

        if !self.aliases.is_empty() {
            writeln!(out)?;
            for alias in &self.aliases {
                writeln!(
                    out,
                    "\"R{}\" -> \"R{}\" [label=\"moved to\", style=dashed, constraint=false]",
                    alias.from.index(),
                    alias.to.index(),
                )?;
            }
        }

        writeln!(out, "}}")
    }
}
