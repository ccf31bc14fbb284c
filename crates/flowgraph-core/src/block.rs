use crate::node::NodeId;
use crate::types::TypeRef;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpecialKind {
    Entry,
    RegularExit,
    ExceptionalExit,
}

/// How analysis state travels along an edge leaving a conditional. Recorded for the
/// downstream dataflow engine; the builder never interprets it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowRule {
    #[default]
    EachToEach,
    ThenToBoth,
    ElseToBoth,
    ThenToThen,
    ElseToElse,
}

impl fmt::Display for FlowRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FlowRule::EachToEach => "EACH_TO_EACH",
            FlowRule::ThenToBoth => "THEN_TO_BOTH",
            FlowRule::ElseToBoth => "ELSE_TO_BOTH",
            FlowRule::ThenToThen => "THEN_TO_THEN",
            FlowRule::ElseToElse => "ELSE_TO_ELSE",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    Special(SpecialKind),
    Regular,
    Conditional,
    Exception,
}

/// Names one outgoing edge of a block, so the edge can be rewritten without knowing the
/// block's variant at the call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EdgeSlot {
    Successor,
    Then,
    Else,
    Exceptional(TypeRef),
}

impl fmt::Display for EdgeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EdgeSlot::Successor => write!(f, "successor"),
            EdgeSlot::Then => write!(f, "then"),
            EdgeSlot::Else => write!(f, "else"),
            EdgeSlot::Exceptional(cause) => write!(f, "{}", cause.simple_name()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockContent {
    Special {
        kind: SpecialKind,
        successor: Option<BlockId>,
    },
    Regular {
        nodes: Vec<NodeId>,
        successor: Option<BlockId>,
        flow_rule: FlowRule,
    },
    Conditional {
        then_successor: Option<BlockId>,
        else_successor: Option<BlockId>,
        then_rule: FlowRule,
        else_rule: FlowRule,
    },
    /// Holds exactly one throwing operation.
    Exception {
        node: NodeId,
        successor: Option<BlockId>,
        exceptional: IndexMap<TypeRef, IndexSet<BlockId>>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub id: BlockId,
    pub predecessors: IndexSet<BlockId>,
    pub content: BlockContent,
}

impl Block {
    pub fn new(id: BlockId, content: BlockContent) -> Self {
        Self {
            id,
            predecessors: IndexSet::new(),
            content,
        }
    }

    pub fn kind(&self) -> BlockKind {
        match &self.content {
            BlockContent::Special { kind, .. } => BlockKind::Special(*kind),
            BlockContent::Regular { .. } => BlockKind::Regular,
            BlockContent::Conditional { .. } => BlockKind::Conditional,
            BlockContent::Exception { .. } => BlockKind::Exception,
        }
    }

    pub fn is_regular(&self) -> bool {
        matches!(self.content, BlockContent::Regular { .. })
    }

    pub fn is_special(&self) -> bool {
        matches!(self.content, BlockContent::Special { .. })
    }

    pub fn nodes(&self) -> &[NodeId] {
        match &self.content {
            BlockContent::Regular { nodes, .. } => nodes,
            BlockContent::Exception { node, .. } => std::slice::from_ref(node),
            _ => &[],
        }
    }

    /// Regular blocks with no operations; the only kind normalization removes.
    pub fn is_empty_regular(&self) -> bool {
        matches!(&self.content, BlockContent::Regular { nodes, .. } if nodes.is_empty())
    }

    /// Every outgoing edge in a stable order: normal successor, then/else, then exceptional
    /// edges in cause insertion order.
    pub fn edges(&self) -> Vec<(EdgeSlot, BlockId)> {
        let mut edges = Vec::new();
        match &self.content {
            BlockContent::Special { successor, .. } | BlockContent::Regular { successor, .. } => {
                edges.extend(successor.map(|s| (EdgeSlot::Successor, s)));
            }
            BlockContent::Conditional {
                then_successor,
                else_successor,
                ..
            } => {
                edges.extend(then_successor.map(|s| (EdgeSlot::Then, s)));
                edges.extend(else_successor.map(|s| (EdgeSlot::Else, s)));
            }
            BlockContent::Exception {
                successor,
                exceptional,
                ..
            } => {
                edges.extend(successor.map(|s| (EdgeSlot::Successor, s)));
                for (cause, targets) in exceptional {
                    for target in targets {
                        edges.push((EdgeSlot::Exceptional(cause.clone()), *target));
                    }
                }
            }
        }
        edges
    }

    /// Distinct successor blocks in edge order.
    pub fn successors(&self) -> Vec<BlockId> {
        let mut seen = IndexSet::new();
        for (_, target) in self.edges() {
            seen.insert(target);
        }
        seen.into_iter().collect()
    }

    /// Single-target successor of a regular, special or exception block.
    pub fn successor(&self) -> Option<BlockId> {
        match &self.content {
            BlockContent::Special { successor, .. }
            | BlockContent::Regular { successor, .. }
            | BlockContent::Exception { successor, .. } => *successor,
            BlockContent::Conditional { .. } => None,
        }
    }

    pub fn exceptional_successors(&self) -> Option<&IndexMap<TypeRef, IndexSet<BlockId>>> {
        match &self.content {
            BlockContent::Exception { exceptional, .. } => Some(exceptional),
            _ => None,
        }
    }

    pub fn flow_rule(&self, slot: &EdgeSlot) -> FlowRule {
        match (&self.content, slot) {
            (BlockContent::Regular { flow_rule, .. }, EdgeSlot::Successor) => *flow_rule,
            (BlockContent::Conditional { then_rule, .. }, EdgeSlot::Then) => *then_rule,
            (BlockContent::Conditional { else_rule, .. }, EdgeSlot::Else) => *else_rule,
            _ => FlowRule::EachToEach,
        }
    }
}
