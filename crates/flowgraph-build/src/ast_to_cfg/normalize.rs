/*! Phase three: shrink the graph without changing any path through it.
 *
 * Phase two leaves stale links from unreachable blocks, empty regular blocks at every label and
 * block boundaries that no jump needs. Three passes remove them in order: prune unreachable
 * predecessors, splice out runs of empty blocks, then merge straight-line pairs of regular blocks.
 *
 * A conditional whose two successors coincide is deliberately kept. Each edge carries its own
 * flow rule, and collapsing the block would drop one of them.
 */

use super::errors::Result;
use flowgraph_core::{Block, BlockId, ControlFlowGraph, EdgeSlot};
use indexmap::IndexSet;
use std::collections::HashSet;
use tracing::{debug, trace};

pub fn normalize(graph: &mut ControlFlowGraph) -> Result<()> {
    let pruned = prune_unreachable(graph)?;
    let elided = elide_empty_blocks(graph)?;
    let merged = merge_consecutive_blocks(graph)?;
    debug!(pruned, elided, merged, "phase three finished");
    Ok(())
}

/// Detaches every unreachable block from the reachable part of the graph. The blocks and their
/// nodes stay allocated so lookups of dead code still resolve.
fn prune_unreachable(graph: &mut ControlFlowGraph) -> Result<usize> {
    let reachable: HashSet<BlockId> = graph.all_blocks().into_iter().collect();
    let mut pruned = 0;
    for id in graph.block_ids() {
        if reachable.contains(&id) || graph.block(id).map_or(true, Block::is_special) {
            continue;
        }
        graph.clear_successors(id)?;
        pruned += 1;
    }
    Ok(pruned)
}

/// Splices every run of empty regular blocks out of the graph.
fn elide_empty_blocks(graph: &mut ControlFlowGraph) -> Result<usize> {
    let mut dont_visit: HashSet<BlockId> = HashSet::new();
    let mut removed = 0;
    for id in graph.all_blocks() {
        if dont_visit.contains(&id) {
            continue;
        }
        let Some(block) = graph.block(id) else {
            continue;
        };
        if !block.is_empty_regular() || block.successor().is_none() {
            continue;
        }

        let mut empty: IndexSet<BlockId> = IndexSet::new();
        collect_empty_predecessors(graph, id, &mut empty);

        let mut succ = match graph.block(id).and_then(Block::successor) {
            Some(succ) => succ,
            None => continue,
        };
        loop {
            if empty.contains(&succ) {
                break;
            }
            let Some(next) = graph.block(succ) else {
                break;
            };
            if !next.is_empty_regular() {
                break;
            }
            let Some(after) = next.successor() else {
                break;
            };
            collect_empty_predecessors(graph, succ, &mut empty);
            succ = after;
        }

        // Every edge from outside the run into it, as (block, slot, old target).
        let mut holders: Vec<(BlockId, EdgeSlot, BlockId)> = Vec::new();
        for member in &empty {
            for pred in graph.predecessors(*member) {
                if empty.contains(&pred) {
                    continue;
                }
                let Some(pred_block) = graph.block(pred) else {
                    continue;
                };
                for (slot, target) in pred_block.edges() {
                    let held = holders.iter().any(|(b, s, t)| *b == pred && *s == slot && *t == target);
                    if target == *member && !held {
                        holders.push((pred, slot, target));
                    }
                }
            }
        }

        trace!(
            run = ?empty.iter().map(|b| b.0).collect::<Vec<_>>(),
            successor = %succ,
            holders = holders.len(),
            "eliding empty blocks"
        );
        for (pred, slot, old) in &holders {
            dont_visit.insert(*pred);
            if *old != succ {
                graph.redirect_edge(*pred, slot, *old, succ)?;
            }
        }
        // A run that loops back on itself keeps one block as the self-loop.
        if empty.contains(&succ) {
            graph.set_successor(succ, EdgeSlot::Successor, succ)?;
        }
        for member in &empty {
            dont_visit.insert(*member);
            if *member != succ {
                graph.remove_block(*member)?;
                removed += 1;
            }
        }
    }
    Ok(removed)
}

/// Adds `start` and, transitively, every empty regular predecessor to `empty`.
fn collect_empty_predecessors(graph: &ControlFlowGraph, start: BlockId, empty: &mut IndexSet<BlockId>) {
    let mut stack = vec![start];
    while let Some(current) = stack.pop() {
        if !empty.insert(current) {
            continue;
        }
        for pred in graph.predecessors(current) {
            if graph.block(pred).is_some_and(Block::is_empty_regular) && !empty.contains(&pred) {
                stack.push(pred);
            }
        }
    }
}

/// Appends a regular block to its regular predecessor when that predecessor is the only way in.
fn merge_consecutive_blocks(graph: &mut ControlFlowGraph) -> Result<usize> {
    let mut merged = 0;
    for id in graph.all_blocks() {
        loop {
            let Some(block) = graph.block(id) else {
                break;
            };
            if !block.is_regular() {
                break;
            }
            let Some(succ) = block.successor() else {
                break;
            };
            let Some(succ_block) = graph.block(succ) else {
                break;
            };
            if succ == id || !succ_block.is_regular() || succ_block.predecessors.len() != 1 {
                break;
            }
            let Some(after) = succ_block.successor() else {
                break;
            };

            trace!(into = %id, from = %succ, "merging blocks");
            graph.move_nodes(succ, id)?;
            graph.set_successor(id, EdgeSlot::Successor, after)?;
            graph.remove_block(succ)?;
            merged += 1;
        }
    }
    Ok(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::{AstLookups, FlowRule, NodeArena, NodeId, NodeKind, TreeId, TypeRef, UnderlyingAst};
    use pretty_assertions::assert_eq;

    fn graph_with_nodes(count: usize) -> ControlFlowGraph {
        let mut nodes = NodeArena::new();
        for i in 0..count {
            nodes.alloc(
                NodeKind::LocalVariable { name: format!("v{}", i) },
                None,
                TypeRef::int(),
            );
        }
        ControlFlowGraph::new(UnderlyingAst::Arbitrary { code: TreeId(0) }, nodes, AstLookups::default())
    }

    fn link(graph: &mut ControlFlowGraph, from: BlockId, to: BlockId) {
        graph.set_successor(from, EdgeSlot::Successor, to).unwrap();
    }

    #[test]
    fn test_empty_chain_is_spliced_out() {
        let mut graph = graph_with_nodes(1);
        let entry = graph.entry_block();
        let exit = graph.regular_exit_block();
        let a = graph.add_regular_block();
        let b = graph.add_regular_block();
        let c = graph.add_regular_block();
        graph.append_node(c, NodeId(0)).unwrap();
        link(&mut graph, entry, a);
        link(&mut graph, a, b);
        link(&mut graph, b, c);
        link(&mut graph, c, exit);

        normalize(&mut graph).unwrap();

        assert!(graph.block(a).is_none());
        assert!(graph.block(b).is_none());
        assert_eq!(graph.successors(entry), vec![c]);
        assert_eq!(graph.predecessors(c), vec![entry]);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_empty_cycle_keeps_one_self_loop() {
        let mut graph = graph_with_nodes(1);
        let entry = graph.entry_block();
        let x = graph.add_regular_block();
        let a = graph.add_regular_block();
        let b = graph.add_regular_block();
        graph.append_node(x, NodeId(0)).unwrap();
        link(&mut graph, entry, x);
        link(&mut graph, x, a);
        link(&mut graph, a, b);
        link(&mut graph, b, a);

        normalize(&mut graph).unwrap();

        let survivor = graph.block(x).unwrap().successor().unwrap();
        assert!(survivor == a || survivor == b);
        assert_eq!(graph.block(survivor).unwrap().successor(), Some(survivor));
        assert_eq!(graph.all_blocks().len(), 3);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_straight_line_blocks_merge() {
        let mut graph = graph_with_nodes(3);
        let entry = graph.entry_block();
        let exit = graph.regular_exit_block();
        let a = graph.add_regular_block();
        let b = graph.add_regular_block();
        let c = graph.add_regular_block();
        graph.append_node(a, NodeId(0)).unwrap();
        graph.append_node(b, NodeId(1)).unwrap();
        graph.append_node(c, NodeId(2)).unwrap();
        link(&mut graph, entry, a);
        link(&mut graph, a, b);
        link(&mut graph, b, c);
        link(&mut graph, c, exit);

        normalize(&mut graph).unwrap();

        let merged = graph.block(a).unwrap();
        assert_eq!(merged.nodes(), &[NodeId(0), NodeId(1), NodeId(2)]);
        assert_eq!(merged.successor(), Some(exit));
        assert_eq!(graph.block_of(NodeId(2)), Some(a));
        assert!(graph.block(b).is_none());
        assert!(graph.block(c).is_none());
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_join_point_is_not_merged() {
        let mut graph = graph_with_nodes(3);
        let entry = graph.entry_block();
        let exit = graph.regular_exit_block();
        let cond = graph.add_conditional_block(FlowRule::EachToEach, FlowRule::EachToEach);
        let then_block = graph.add_regular_block();
        let join = graph.add_regular_block();
        graph.append_node(then_block, NodeId(0)).unwrap();
        graph.append_node(join, NodeId(1)).unwrap();
        link(&mut graph, entry, cond);
        graph.set_successor(cond, EdgeSlot::Then, then_block).unwrap();
        graph.set_successor(cond, EdgeSlot::Else, join).unwrap();
        link(&mut graph, then_block, join);
        link(&mut graph, join, exit);

        normalize(&mut graph).unwrap();

        assert_eq!(graph.block(then_block).unwrap().nodes(), &[NodeId(0)]);
        assert_eq!(graph.predecessors(join).len(), 2);
    }

    #[test]
    fn test_conditional_with_one_target_is_kept() {
        let mut graph = graph_with_nodes(1);
        let entry = graph.entry_block();
        let exit = graph.regular_exit_block();
        let cond = graph.add_conditional_block(FlowRule::ThenToThen, FlowRule::EachToEach);
        let empty = graph.add_regular_block();
        let body = graph.add_regular_block();
        graph.append_node(body, NodeId(0)).unwrap();
        link(&mut graph, entry, cond);
        graph.set_successor(cond, EdgeSlot::Then, empty).unwrap();
        graph.set_successor(cond, EdgeSlot::Else, body).unwrap();
        link(&mut graph, empty, body);
        link(&mut graph, body, exit);

        normalize(&mut graph).unwrap();

        let block = graph.block(cond).unwrap();
        assert_eq!(block.edges(), vec![(EdgeSlot::Then, body), (EdgeSlot::Else, body)]);
        assert_eq!(block.flow_rule(&EdgeSlot::Then), FlowRule::ThenToThen);
        assert_eq!(graph.predecessors(body), vec![cond]);
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_unreachable_block_is_detached_but_kept() {
        let mut graph = graph_with_nodes(2);
        let entry = graph.entry_block();
        let exit = graph.regular_exit_block();
        let live = graph.add_regular_block();
        let dead = graph.add_regular_block();
        graph.append_node(live, NodeId(0)).unwrap();
        graph.append_node(dead, NodeId(1)).unwrap();
        link(&mut graph, entry, live);
        link(&mut graph, live, exit);
        link(&mut graph, dead, live);

        normalize(&mut graph).unwrap();

        assert_eq!(graph.predecessors(live), vec![entry]);
        assert!(graph.block(dead).unwrap().successors().is_empty());
        assert_eq!(graph.block_of(NodeId(1)), Some(dead));
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_exceptional_edge_into_empty_block_is_redirected() {
        let mut graph = graph_with_nodes(2);
        let entry = graph.entry_block();
        let exit = graph.regular_exit_block();
        let before = graph.add_regular_block();
        let exc = graph.add_exception_block(NodeId(0)).unwrap();
        let after = graph.add_regular_block();
        let empty = graph.add_regular_block();
        let handler = graph.add_regular_block();
        graph.append_node(handler, NodeId(1)).unwrap();
        link(&mut graph, entry, before);
        link(&mut graph, before, exc);
        link(&mut graph, exc, after);
        link(&mut graph, after, exit);
        let npe = TypeRef::class("java.lang.NullPointerException");
        graph
            .set_successor(exc, EdgeSlot::Exceptional(npe.clone()), empty)
            .unwrap();
        link(&mut graph, empty, handler);
        link(&mut graph, handler, exit);

        normalize(&mut graph).unwrap();

        let targets = graph.block(exc).unwrap().exceptional_successors().unwrap();
        assert_eq!(targets[&npe].iter().copied().collect::<Vec<_>>(), vec![handler]);
        assert!(graph.block(empty).is_none());
        assert_eq!(graph.successors(entry), vec![exc]);
        assert_eq!(graph.block(exc).unwrap().successor(), Some(exit));
        graph.check_invariants().unwrap();
    }

    #[test]
    fn test_conditional_with_identical_targets_is_not_collapsed() {
        let mut graph = graph_with_nodes(2);
        let entry = graph.entry_block();
        let exit = graph.regular_exit_block();
        let before = graph.add_regular_block();
        let cond = graph.add_conditional_block(FlowRule::ElseToElse, FlowRule::ThenToThen);
        let body = graph.add_regular_block();
        graph.append_node(before, NodeId(0)).unwrap();
        graph.append_node(body, NodeId(1)).unwrap();
        link(&mut graph, entry, before);
        link(&mut graph, before, cond);
        graph.set_successor(cond, EdgeSlot::Then, body).unwrap();
        graph.set_successor(cond, EdgeSlot::Else, body).unwrap();
        link(&mut graph, body, exit);

        normalize(&mut graph).unwrap();

        let block = graph.block(cond).unwrap();
        assert_eq!(block.edges(), vec![(EdgeSlot::Then, body), (EdgeSlot::Else, body)]);
        assert_eq!(block.flow_rule(&EdgeSlot::Then), FlowRule::ElseToElse);
        assert_eq!(block.flow_rule(&EdgeSlot::Else), FlowRule::ThenToThen);
        assert_eq!(graph.block(before).unwrap().nodes(), &[NodeId(0)]);
        assert_eq!(graph.block(body).unwrap().nodes(), &[NodeId(1)]);
        assert_eq!(graph.predecessors(body), vec![cond]);
        assert_eq!(graph.all_blocks(), vec![entry, before, cond, body, exit]);
        graph.check_invariants().unwrap();
    }
}
