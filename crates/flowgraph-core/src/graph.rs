/*! The finished control-flow graph and the mutation API used to build it.
 *
 * A graph is only useful to an analysis if its links can be trusted in both directions. Every
 * edge mutation here goes through one place that updates the successor slot and the target's
 * predecessor set together, so builders never touch predecessor sets directly.
 */

use crate::ast::{TreeId, UnderlyingAst};
use crate::block::{Block, BlockContent, BlockId, BlockKind, EdgeSlot, FlowRule, SpecialKind};
use crate::node::{Node, NodeArena, NodeId};
use crate::types::TypeRef;
use crate::{CfgError, Result};
use indexmap::{IndexMap, IndexSet};
use std::collections::VecDeque;

/// AST-facing side tables collected while lowering one body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AstLookups {
    /// Tree to the nodes it produced before conversions.
    pub tree_lookup: IndexMap<TreeId, IndexSet<NodeId>>,
    /// Tree to the conversion nodes (boxing, widening, ...) applied to its value.
    pub converted_lookup: IndexMap<TreeId, IndexSet<NodeId>>,
    /// Increment/decrement tree to the synthetic `x = x + 1` assignment modelling it.
    pub unary_assign: IndexMap<TreeId, NodeId>,
    pub return_nodes: Vec<NodeId>,
    pub declared_classes: Vec<TreeId>,
    pub declared_lambdas: Vec<TreeId>,
}

#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    blocks: Vec<Option<Block>>,
    nodes: NodeArena,
    node_blocks: Vec<Option<BlockId>>,
    entry: BlockId,
    regular_exit: BlockId,
    exceptional_exit: BlockId,
    lookups: AstLookups,
    underlying: UnderlyingAst,
}

impl ControlFlowGraph {
    /// Creates a graph holding only the three special blocks.
    pub fn new(underlying: UnderlyingAst, nodes: NodeArena, lookups: AstLookups) -> Self {
        let node_blocks = vec![None; nodes.len()];
        let mut graph = Self {
            blocks: Vec::new(),
            nodes,
            node_blocks,
            entry: BlockId(0),
            regular_exit: BlockId(0),
            exceptional_exit: BlockId(0),
            lookups,
            underlying,
        };
        graph.entry = graph.add_special(SpecialKind::Entry);
        graph.regular_exit = graph.add_special(SpecialKind::RegularExit);
        graph.exceptional_exit = graph.add_special(SpecialKind::ExceptionalExit);
        graph
    }

    fn push_block(&mut self, content: BlockContent) -> BlockId {
        let id = BlockId(self.blocks.len() as u32);
        self.blocks.push(Some(Block::new(id, content)));
        id
    }

    fn add_special(&mut self, kind: SpecialKind) -> BlockId {
        self.push_block(BlockContent::Special {
            kind,
            successor: None,
        })
    }

    pub fn add_regular_block(&mut self) -> BlockId {
        self.push_block(BlockContent::Regular {
            nodes: Vec::new(),
            successor: None,
            flow_rule: FlowRule::EachToEach,
        })
    }

    pub fn add_conditional_block(&mut self, then_rule: FlowRule, else_rule: FlowRule) -> BlockId {
        self.push_block(BlockContent::Conditional {
            then_successor: None,
            else_successor: None,
            then_rule,
            else_rule,
        })
    }

    pub fn add_exception_block(&mut self, node: NodeId) -> Result<BlockId> {
        self.check_node(node)?;
        let id = self.push_block(BlockContent::Exception {
            node,
            successor: None,
            exceptional: IndexMap::new(),
        });
        self.node_blocks[node.0 as usize] = Some(id);
        Ok(id)
    }

    fn check_node(&self, node: NodeId) -> Result<()> {
        if (node.0 as usize) < self.node_blocks.len() {
            Ok(())
        } else {
            Err(CfgError::UnknownNode(node))
        }
    }

    fn block_mut(&mut self, id: BlockId) -> Result<&mut Block> {
        self.blocks
            .get_mut(id.0 as usize)
            .and_then(Option::as_mut)
            .ok_or(CfgError::UnknownBlock(id))
    }

    fn live(&self, id: BlockId) -> Result<&Block> {
        self.block(id).ok_or(CfgError::UnknownBlock(id))
    }

    pub fn append_node(&mut self, block: BlockId, node: NodeId) -> Result<()> {
        self.check_node(node)?;
        match &mut self.block_mut(block)?.content {
            BlockContent::Regular { nodes, .. } => nodes.push(node),
            _ => return Err(CfgError::WrongBlockKind { block, expected: "regular" }),
        }
        self.node_blocks[node.0 as usize] = Some(block);
        Ok(())
    }

    /// Points `slot` of `from` at `to`. Single-target slots are overwritten; an exceptional
    /// slot gains `to` as one more target for its cause.
    pub fn set_successor(&mut self, from: BlockId, slot: EdgeSlot, to: BlockId) -> Result<()> {
        self.live(to)?;
        let previous = {
            let block = self.block_mut(from)?;
            let previous = match (&mut block.content, &slot) {
                (
                    BlockContent::Special { successor, .. }
                    | BlockContent::Regular { successor, .. }
                    | BlockContent::Exception { successor, .. },
                    EdgeSlot::Successor,
                ) => successor.replace(to),
                (BlockContent::Conditional { then_successor, .. }, EdgeSlot::Then) => {
                    then_successor.replace(to)
                }
                (BlockContent::Conditional { else_successor, .. }, EdgeSlot::Else) => {
                    else_successor.replace(to)
                }
                (BlockContent::Exception { exceptional, .. }, EdgeSlot::Exceptional(cause)) => {
                    exceptional.entry(cause.clone()).or_default().insert(to);
                    None
                }
                _ => return Err(CfgError::InvalidEdge { block: from, slot: slot.to_string() }),
            };
            previous
        };
        self.block_mut(to)?.predecessors.insert(from);
        if let Some(old) = previous {
            self.unlink_if_unused(from, old)?;
        }
        Ok(())
    }

    /// Rewrites the edge `slot` of `from` that currently targets `old` so it targets `new`.
    /// For an exceptional slot only `old` is replaced; other targets of the cause remain.
    pub fn redirect_edge(&mut self, from: BlockId, slot: &EdgeSlot, old: BlockId, new: BlockId) -> Result<()> {
        match slot {
            EdgeSlot::Exceptional(cause) => {
                self.live(new)?;
                {
                    let block = self.block_mut(from)?;
                    let BlockContent::Exception { exceptional, .. } = &mut block.content else {
                        return Err(CfgError::InvalidEdge { block: from, slot: slot.to_string() });
                    };
                    let targets = exceptional.get_mut(cause).ok_or_else(|| CfgError::InvalidEdge {
                        block: from,
                        slot: slot.to_string(),
                    })?;
                    let rebuilt: IndexSet<BlockId> = targets
                        .iter()
                        .map(|t| if *t == old { new } else { *t })
                        .collect();
                    *targets = rebuilt;
                }
                self.block_mut(new)?.predecessors.insert(from);
                self.unlink_if_unused(from, old)
            }
            _ => self.set_successor(from, slot.clone(), new),
        }
    }

    fn unlink_if_unused(&mut self, from: BlockId, target: BlockId) -> Result<()> {
        let still_linked = self.live(from)?.successors().contains(&target);
        if !still_linked {
            if let Some(Some(block)) = self.blocks.get_mut(target.0 as usize) {
                block.predecessors.shift_remove(&from);
            }
        }
        Ok(())
    }

    /// Removes every outgoing edge of `block`, updating the targets' predecessor sets.
    pub fn clear_successors(&mut self, block: BlockId) -> Result<()> {
        let targets = self.live(block)?.successors();
        match &mut self.block_mut(block)?.content {
            BlockContent::Special { successor, .. } | BlockContent::Regular { successor, .. } => {
                *successor = None;
            }
            BlockContent::Conditional {
                then_successor,
                else_successor,
                ..
            } => {
                *then_successor = None;
                *else_successor = None;
            }
            BlockContent::Exception {
                successor,
                exceptional,
                ..
            } => {
                *successor = None;
                exceptional.clear();
            }
        }
        for target in targets {
            if let Some(Some(t)) = self.blocks.get_mut(target.0 as usize) {
                t.predecessors.shift_remove(&block);
            }
        }
        Ok(())
    }

    /// Deletes a block that no other block links to any more. Its own outgoing links are
    /// dropped from the targets' predecessor sets.
    pub fn remove_block(&mut self, id: BlockId) -> Result<Block> {
        if [self.entry, self.regular_exit, self.exceptional_exit].contains(&id) {
            return Err(CfgError::SpecialBlockRemoval(id));
        }
        self.clear_successors(id)?;
        let block = self
            .blocks
            .get_mut(id.0 as usize)
            .and_then(Option::take)
            .ok_or(CfgError::UnknownBlock(id))?;
        Ok(block)
    }

    /// Moves all nodes of regular block `from` to the end of regular block `into`.
    pub fn move_nodes(&mut self, from: BlockId, into: BlockId) -> Result<()> {
        let moved = match &mut self.block_mut(from)?.content {
            BlockContent::Regular { nodes, .. } => std::mem::take(nodes),
            _ => return Err(CfgError::WrongBlockKind { block: from, expected: "regular" }),
        };
        for node in &moved {
            self.node_blocks[node.0 as usize] = Some(into);
        }
        match &mut self.block_mut(into)?.content {
            BlockContent::Regular { nodes, .. } => nodes.extend(moved),
            _ => return Err(CfgError::WrongBlockKind { block: into, expected: "regular" }),
        }
        Ok(())
    }

    pub fn entry_block(&self) -> BlockId {
        self.entry
    }

    pub fn regular_exit_block(&self) -> BlockId {
        self.regular_exit
    }

    pub fn exceptional_exit_block(&self) -> BlockId {
        self.exceptional_exit
    }

    pub fn block(&self, id: BlockId) -> Option<&Block> {
        self.blocks.get(id.0 as usize).and_then(Option::as_ref)
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    pub fn block_of(&self, node: NodeId) -> Option<BlockId> {
        self.node_blocks.get(node.0 as usize).copied().flatten()
    }

    pub fn describe_node(&self, node: NodeId) -> String {
        self.nodes.describe(node)
    }

    /// Every live block, reachable or not, in creation order.
    pub fn block_ids(&self) -> Vec<BlockId> {
        self.blocks.iter().flatten().map(|b| b.id).collect()
    }

    pub fn successors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id).map(Block::successors).unwrap_or_default()
    }

    pub fn predecessors(&self, id: BlockId) -> Vec<BlockId> {
        self.block(id)
            .map(|b| b.predecessors.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Blocks reachable from the entry block in breadth-first order, following every edge kind.
    pub fn all_blocks(&self) -> Vec<BlockId> {
        self.all_blocks_ignoring(|_| false)
    }

    /// Like [`all_blocks`](Self::all_blocks) but skips exceptional edges whose cause
    /// `ignore` accepts.
    pub fn all_blocks_ignoring(&self, ignore: impl Fn(&TypeRef) -> bool) -> Vec<BlockId> {
        let mut visited = IndexSet::new();
        let mut queue = VecDeque::from([self.entry]);
        while let Some(current) = queue.pop_front() {
            if !visited.insert(current) {
                continue;
            }
            let Some(block) = self.block(current) else {
                continue;
            };
            for (slot, target) in block.edges() {
                if let EdgeSlot::Exceptional(cause) = &slot {
                    if ignore(cause) {
                        continue;
                    }
                }
                if !visited.contains(&target) {
                    queue.push_back(target);
                }
            }
        }
        visited.into_iter().collect()
    }

    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.all_nodes_ignoring(|_| false)
    }

    pub fn all_nodes_ignoring(&self, ignore: impl Fn(&TypeRef) -> bool) -> Vec<NodeId> {
        self.all_blocks_ignoring(ignore)
            .into_iter()
            .filter_map(|id| self.block(id))
            .flat_map(|b| b.nodes().iter().copied())
            .collect()
    }

    /// Reachable blocks in reverse postorder; each block appears once.
    pub fn depth_first_ordered_blocks(&self) -> Vec<BlockId> {
        let mut visited = IndexSet::new();
        let mut postorder = Vec::new();
        let mut stack: Vec<(BlockId, Vec<BlockId>, usize)> = Vec::new();
        visited.insert(self.entry);
        stack.push((self.entry, self.successors(self.entry), 0));
        while let Some((block, succs, next)) = stack.last_mut() {
            if let Some(&succ) = succs.get(*next) {
                *next += 1;
                if visited.insert(succ) {
                    let succ_succs = self.successors(succ);
                    stack.push((succ, succ_succs, 0));
                }
            } else {
                postorder.push(*block);
                stack.pop();
            }
        }
        postorder.reverse();
        postorder
    }

    /// Nodes for `tree`, preferring the post-conversion nodes.
    pub fn nodes_for_tree(&self, tree: TreeId) -> Option<&IndexSet<NodeId>> {
        self.lookups
            .converted_lookup
            .get(&tree)
            .or_else(|| self.lookups.tree_lookup.get(&tree))
    }

    pub fn tree_lookup(&self) -> &IndexMap<TreeId, IndexSet<NodeId>> {
        &self.lookups.tree_lookup
    }

    pub fn converted_lookup(&self) -> &IndexMap<TreeId, IndexSet<NodeId>> {
        &self.lookups.converted_lookup
    }

    pub fn unary_assign_node(&self, tree: TreeId) -> Option<NodeId> {
        self.lookups.unary_assign.get(&tree).copied()
    }

    pub fn return_nodes(&self) -> &[NodeId] {
        &self.lookups.return_nodes
    }

    pub fn declared_classes(&self) -> &[TreeId] {
        &self.lookups.declared_classes
    }

    pub fn declared_lambdas(&self) -> &[TreeId] {
        &self.lookups.declared_lambdas
    }

    pub fn underlying_ast(&self) -> &UnderlyingAst {
        &self.underlying
    }

    /// Counts reachable blocks by kind.
    pub fn block_kind_counts(&self) -> IndexMap<BlockKind, usize> {
        let mut counts = IndexMap::new();
        for id in self.all_blocks() {
            if let Some(block) = self.block(id) {
                *counts.entry(block.kind()).or_insert(0) += 1;
            }
        }
        counts
    }

    pub fn check_invariants(&self) -> Result<()> {
        let specials: Vec<&Block> = self.blocks.iter().flatten().filter(|b| b.is_special()).collect();
        for (kind, id) in [
            (SpecialKind::Entry, self.entry),
            (SpecialKind::RegularExit, self.regular_exit),
            (SpecialKind::ExceptionalExit, self.exceptional_exit),
        ] {
            let count = specials
                .iter()
                .filter(|b| b.kind() == BlockKind::Special(kind))
                .count();
            if count != 1 || self.block(id).map(Block::kind) != Some(BlockKind::Special(kind)) {
                return Err(CfgError::SpecialBlockCount { kind, count });
            }
        }
        if let Some(pred) = self.live(self.entry)?.predecessors.first() {
            return Err(CfgError::EntryHasPredecessor(*pred));
        }

        for id in self.all_blocks() {
            let block = self.live(id)?;
            for node in block.nodes() {
                let owner = self.block_of(*node);
                if owner != Some(id) {
                    return Err(CfgError::NodeBlockMismatch {
                        node: *node,
                        block: id,
                        recorded: owner,
                    });
                }
            }
            for succ in block.successors() {
                let linked = self.block(succ).is_some_and(|s| s.predecessors.contains(&id));
                if !linked {
                    return Err(CfgError::MissingPredecessor { block: id, successor: succ });
                }
            }
            for pred in &block.predecessors {
                let linked = self.block(*pred).is_some_and(|p| p.successors().contains(&id));
                if !linked {
                    return Err(CfgError::MissingSuccessor { block: id, predecessor: *pred });
                }
            }
        }

        let mapped = self
            .lookups
            .tree_lookup
            .iter()
            .chain(&self.lookups.converted_lookup)
            .flat_map(|(tree, nodes)| nodes.iter().map(move |n| (*tree, *n)));
        let unary = self.lookups.unary_assign.iter().map(|(tree, n)| (*tree, *n));
        for (tree, node) in mapped.chain(unary) {
            let placed = self
                .block_of(node)
                .and_then(|b| self.block(b))
                .is_some_and(|b| b.nodes().contains(&node));
            if !placed {
                return Err(CfgError::UnplacedNode { tree, node });
            }
        }
        Ok(())
    }
}
