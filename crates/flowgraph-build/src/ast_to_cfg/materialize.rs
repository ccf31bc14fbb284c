/*! Phase two: cut the extended-node sequence into blocks.
 *
 * The sequence is walked once. Plain nodes fill the current regular block, a leader starts a new
 * one, and every jump or throwing operation ends it. Jump targets may lie ahead of the walk, so
 * edges are first recorded as missing and wired once every sequence index has a block.
 */

use super::errors::{BuildError, Result};
use super::extended::{ExtendedKind, Label, PhaseOneResult};
use flowgraph_core::{BlockId, ControlFlowGraph, EdgeSlot, TypeRef};
use std::collections::HashMap;
use tracing::debug;

/// Where a label leads before blocks are known.
#[derive(Debug, Clone, Copy)]
enum Target {
    Index(usize),
    Block(BlockId),
}

struct LabelResolver<'r> {
    bindings: &'r HashMap<Label, usize>,
    regular_exit: (Label, BlockId),
    exceptional_exit: (Label, BlockId),
}

impl LabelResolver<'_> {
    fn resolve(&self, label: Label) -> Result<Target> {
        if label == self.regular_exit.0 {
            return Ok(Target::Block(self.regular_exit.1));
        }
        if label == self.exceptional_exit.0 {
            return Ok(Target::Block(self.exceptional_exit.1));
        }
        self.bindings
            .get(&label)
            .map(|index| Target::Index(*index))
            .ok_or(BuildError::UnboundLabel(label))
    }
}

pub fn materialize(phase_one: PhaseOneResult) -> Result<ControlFlowGraph> {
    let PhaseOneResult {
        underlying,
        nodes,
        sequence,
        bindings,
        leaders,
        lookups,
        regular_exit,
        exceptional_exit,
    } = phase_one;

    let mut graph = ControlFlowGraph::new(underlying, nodes, lookups);
    let exit_block = graph.exceptional_exit_block();
    let resolver = LabelResolver {
        bindings: &bindings,
        regular_exit: (regular_exit, graph.regular_exit_block()),
        exceptional_exit: (exceptional_exit, exit_block),
    };

    let mut placed: Vec<Option<BlockId>> = vec![None; sequence.len()];
    let mut missing: Vec<(BlockId, EdgeSlot, Target)> = vec![(graph.entry_block(), EdgeSlot::Successor, Target::Index(0))];
    let mut missing_exceptional: Vec<(BlockId, TypeRef, Label)> = Vec::new();

    let mut block = graph.add_regular_block();
    for (index, ext) in sequence.iter().enumerate() {
        // Jumps to this index must not pick up the nodes already in the current block.
        if leaders.contains(&index) && !matches!(ext.kind, ExtendedKind::ThrowingOp { .. }) {
            let next = graph.add_regular_block();
            graph.set_successor(block, EdgeSlot::Successor, next)?;
            block = next;
        }

        match &ext.kind {
            ExtendedKind::Plain(node) => {
                graph.append_node(block, *node)?;
                placed[index] = Some(block);
                if ext.terminates {
                    graph.set_successor(block, EdgeSlot::Successor, exit_block)?;
                    block = graph.add_regular_block();
                }
            }
            ExtendedKind::Branch {
                then_label,
                else_label,
                then_rule,
                else_rule,
            } => {
                placed[index] = Some(block);
                let conditional = graph.add_conditional_block(*then_rule, *else_rule);
                graph.set_successor(block, EdgeSlot::Successor, conditional)?;
                missing.push((conditional, EdgeSlot::Then, resolver.resolve(*then_label)?));
                missing.push((conditional, EdgeSlot::Else, resolver.resolve(*else_label)?));
                block = graph.add_regular_block();
            }
            ExtendedKind::Goto(label) => {
                placed[index] = Some(block);
                missing.push((block, EdgeSlot::Successor, resolver.resolve(*label)?));
                block = graph.add_regular_block();
            }
            ExtendedKind::ThrowingOp { node, causes } => {
                let exception_block = graph.add_exception_block(*node)?;
                placed[index] = Some(exception_block);
                graph.set_successor(block, EdgeSlot::Successor, exception_block)?;
                // A terminating operation leaves only through its exceptional edges.
                if !ext.terminates {
                    missing.push((exception_block, EdgeSlot::Successor, Target::Index(index + 1)));
                }
                for (cause, labels) in causes {
                    for label in labels {
                        missing_exceptional.push((exception_block, cause.clone(), *label));
                    }
                }
                block = graph.add_regular_block();
            }
        }
    }

    let lookup = |target: Target| -> Result<BlockId> {
        match target {
            Target::Block(block) => Ok(block),
            Target::Index(index) => placed
                .get(index)
                .copied()
                .flatten()
                .ok_or(BuildError::UnplacedIndex(index)),
        }
    };
    let edges = missing.len() + missing_exceptional.len();
    for (from, slot, target) in missing {
        graph.set_successor(from, slot, lookup(target)?)?;
    }
    for (from, cause, label) in missing_exceptional {
        let target = lookup(resolver.resolve(label)?)?;
        graph.set_successor(from, EdgeSlot::Exceptional(cause), target)?;
    }

    debug!(
        sequence = sequence.len(),
        leaders = leaders.len(),
        deferred_edges = edges,
        "phase two finished"
    );
    Ok(graph)
}
