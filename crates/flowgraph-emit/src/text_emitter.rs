use crate::config::EmitterConfig;
use crate::emitter::{block_kind_name, EmitContext, EmitHelper, EmitResult, Emitter};
use colored::Color;
use flowgraph_core::{Block, BlockId, BlockKind, ControlFlowGraph, EdgeSlot, FlowRule, NodeId, NodeKind};
use std::io::Write;

/// Block-by-block listing in breadth-first order from the entry block.
pub struct TextEmitter {
    config: EmitterConfig,
}

impl TextEmitter {
    pub fn new(config: EmitterConfig) -> Self {
        Self { config }
    }

    fn emit_block<W: Write>(
        &self,
        graph: &ControlFlowGraph,
        block: &Block,
        writer: &mut W,
        context: &mut EmitContext,
    ) -> EmitResult {
        let mut header = format!("{} ({})", block.id, block_kind_name(block.kind()));
        if !block.predecessors.is_empty() {
            let preds: Vec<String> = block.predecessors.iter().map(BlockId::to_string).collect();
            header.push_str(&format!(" <- {}", preds.join(", ")));
        }
        EmitHelper::write_tinted(writer, context, &header, Color::Cyan)?;

        context.indent();
        if self.config.verbosity.should_print_nodes() {
            for node in block.nodes() {
                self.emit_node(graph, *node, writer, context)?;
            }
        }
        for (slot, target) in block.edges() {
            self.emit_edge(graph, block, &slot, target, writer, context)?;
        }
        context.dedent();
        Ok(())
    }

    fn emit_node<W: Write>(
        &self,
        graph: &ControlFlowGraph,
        id: NodeId,
        writer: &mut W,
        context: &EmitContext,
    ) -> EmitResult {
        let Some(node) = graph.node(id) else {
            return EmitHelper::write_line(writer, context, &format!("<missing {}>", id));
        };
        let verbosity = self.config.verbosity;
        let mut line = graph.describe_node(id);
        if verbosity.should_print_ids() {
            line = format!("{}: {}", id, line);
        }
        if verbosity.should_print_types() {
            line.push_str(&format!(" : {}", node.ty));
        }
        if verbosity.should_print_tree_ids() {
            if let Some(tree) = node.tree {
                line.push_str(&format!(" [{}]", tree));
            }
            if !node.in_source {
                line.push_str(" (synthetic)");
            }
        }
        match node.kind {
            NodeKind::Marker { .. } => EmitHelper::write_tinted(writer, context, &line, Color::Green),
            _ => EmitHelper::write_line(writer, context, &line),
        }
    }

    fn emit_edge<W: Write>(
        &self,
        graph: &ControlFlowGraph,
        block: &Block,
        slot: &EdgeSlot,
        target: BlockId,
        writer: &mut W,
        context: &EmitContext,
    ) -> EmitResult {
        let mut line = match slot {
            EdgeSlot::Successor => format!("-> {}", target),
            EdgeSlot::Then | EdgeSlot::Else => format!("{} -> {}", slot, target),
            EdgeSlot::Exceptional(_) if !self.config.show_exception_types => format!("exception -> {}", target),
            EdgeSlot::Exceptional(cause) => format!("{} -> {}", cause.simple_name(), target),
        };
        if let Some(kind @ BlockKind::Special(_)) = graph.block(target).map(Block::kind) {
            line.push_str(&format!(" ({})", block_kind_name(kind)));
        }
        let rule = block.flow_rule(slot);
        let shows_rule = match slot {
            EdgeSlot::Then | EdgeSlot::Else => true,
            EdgeSlot::Successor => rule != FlowRule::EachToEach,
            EdgeSlot::Exceptional(_) => false,
        };
        if shows_rule {
            line.push_str(&format!(" [{}]", rule));
        }
        match slot {
            EdgeSlot::Exceptional(_) => EmitHelper::write_tinted(writer, context, &line, Color::Red),
            _ => EmitHelper::write_line(writer, context, &line),
        }
    }
}

impl Emitter for TextEmitter {
    type Item = ControlFlowGraph;

    fn emit<W: Write>(&self, graph: &ControlFlowGraph, writer: &mut W, context: &mut EmitContext) -> EmitResult {
        EmitHelper::write_section(writer, context, &graph.underlying_ast().to_string())?;
        for id in graph.all_blocks() {
            if let Some(block) = graph.block(id) {
                self.emit_block(graph, block, writer, context)?;
            }
        }
        Ok(())
    }

    fn new_context(&self) -> EmitContext {
        EmitContext::new().with_colors(self.config.use_colors)
    }
}
