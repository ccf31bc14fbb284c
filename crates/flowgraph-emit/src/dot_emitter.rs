use crate::config::EmitterConfig;
use crate::emitter::{block_kind_name, EmitContext, EmitHelper, EmitResult, Emitter};
use flowgraph_core::{Block, BlockKind, ControlFlowGraph, EdgeSlot};
use std::io::Write;

/// Graphviz rendering. Only reachable blocks are drawn.
pub struct DotEmitter {
    config: EmitterConfig,
}

impl DotEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self { config }
    }

    fn node_attributes(&self, graph: &ControlFlowGraph, block: &Block) -> String {
        let mut label = format!("{} ({})\\l", block.id, block_kind_name(block.kind()));
        if self.config.verbosity.should_print_nodes() {
            for node in block.nodes() {
                let mut line = graph.describe_node(*node);
                if self.config.verbosity.should_print_ids() {
                    line = format!("{}: {}", node, line);
                }
                if self.config.verbosity.should_print_types() {
                    if let Some(n) = graph.node(*node) {
                        line.push_str(&format!(" : {}", n.ty));
                    }
                }
                label.push_str(&escape(&line));
                label.push_str("\\l");
            }
        }
        let shape = match block.kind() {
            BlockKind::Special(_) => "shape=oval",
            BlockKind::Regular => "shape=rectangle",
            BlockKind::Conditional => "shape=polygon, sides=8",
            BlockKind::Exception => "shape=rectangle, style=dashed",
        };
        format!("{}, label=\"{}\"", shape, label)
    }

    fn edge_attributes(&self, block: &Block, slot: &EdgeSlot) -> Option<String> {
        match slot {
            EdgeSlot::Successor => None,
            EdgeSlot::Then | EdgeSlot::Else => Some(format!("label=\"{} {}\"", slot, block.flow_rule(slot))),
            EdgeSlot::Exceptional(cause) => {
                let label = if self.config.show_exception_types {
                    escape(&cause.simple_name())
                } else {
                    "exception".to_string()
                };
                Some(format!("label=\"{}\", style=dashed", label))
            }
        }
    }
}

impl Emitter for DotEmitter {
    type Item = ControlFlowGraph;

    fn emit<W: Write>(&self, graph: &ControlFlowGraph, writer: &mut W, context: &mut EmitContext) -> EmitResult {
        let blocks: Vec<&Block> = graph.all_blocks().into_iter().filter_map(|id| graph.block(id)).collect();
        EmitHelper::write_braced(writer, context, "digraph cfg", |w, c| {
            EmitHelper::write_comment(w, c, &graph.underlying_ast().to_string())?;
            EmitHelper::write_line(w, c, "node [fontname=\"monospace\"];")?;
            for block in &blocks {
                let line = format!("{} [{}];", block.id, self.node_attributes(graph, block));
                EmitHelper::write_line(w, c, &line)?;
            }
            for block in &blocks {
                for (slot, target) in block.edges() {
                    let line = match self.edge_attributes(block, &slot) {
                        Some(attributes) => format!("{} -> {} [{}];", block.id, target, attributes),
                        None => format!("{} -> {};", block.id, target),
                    };
                    EmitHelper::write_line(w, c, &line)?;
                }
            }
            Ok(())
        })
    }
}

/// Escapes text for a double-quoted DOT string whose lines are broken with `\l`.
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '"' => escaped.push_str("\\\""),
            '\n' => escaped.push_str("\\l"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_quotes_and_backslashes() {
        assert_eq!(escape(r#"log("a\b")"#), r#"log(\"a\\b\")"#);
    }

    #[test]
    fn test_escape_leaves_braces_alone() {
        assert_eq!(escape("new int[]{1, 2}"), "new int[]{1, 2}");
    }

    #[test]
    fn test_escape_newlines_become_left_justified_breaks() {
        assert_eq!(escape("one\ntwo"), "one\\ltwo");
    }
}
