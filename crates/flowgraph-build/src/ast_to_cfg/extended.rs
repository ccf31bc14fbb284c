use flowgraph_core::{AstLookups, FlowRule, NodeArena, NodeId, TypeRef, UnderlyingAst};
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Forward reference to a position in the extended-node sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Label(u32);

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct LabelGen {
    next: u32,
}

impl LabelGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fresh(&mut self) -> Label {
        let label = Label(self.next);
        self.next += 1;
        label
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtendedKind {
    Plain(NodeId),
    /// An operation that may throw; each cause maps to every label control may reach.
    ThrowingOp {
        node: NodeId,
        causes: IndexMap<TypeRef, IndexSet<Label>>,
    },
    Goto(Label),
    Branch {
        then_label: Label,
        else_label: Label,
        then_rule: FlowRule,
        else_rule: FlowRule,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedNode {
    pub kind: ExtendedKind,
    /// Control never returns normally from this node.
    pub terminates: bool,
}

impl ExtendedNode {
    pub fn plain(node: NodeId) -> Self {
        Self {
            kind: ExtendedKind::Plain(node),
            terminates: false,
        }
    }

    pub fn throwing(node: NodeId, causes: IndexMap<TypeRef, IndexSet<Label>>) -> Self {
        Self {
            kind: ExtendedKind::ThrowingOp { node, causes },
            terminates: false,
        }
    }

    pub fn goto(label: Label) -> Self {
        Self {
            kind: ExtendedKind::Goto(label),
            terminates: false,
        }
    }

    pub fn branch(then_label: Label, else_label: Label) -> Self {
        Self::branch_with_rules(then_label, else_label, FlowRule::EachToEach, FlowRule::EachToEach)
    }

    pub fn branch_with_rules(
        then_label: Label,
        else_label: Label,
        then_rule: FlowRule,
        else_rule: FlowRule,
    ) -> Self {
        Self {
            kind: ExtendedKind::Branch {
                then_label,
                else_label,
                then_rule,
                else_rule,
            },
            terminates: false,
        }
    }

    pub fn node(&self) -> Option<NodeId> {
        match &self.kind {
            ExtendedKind::Plain(node) | ExtendedKind::ThrowingOp { node, .. } => Some(*node),
            ExtendedKind::Goto(_) | ExtendedKind::Branch { .. } => None,
        }
    }
}

/// Everything phase one hands to phase two.
#[derive(Debug)]
pub struct PhaseOneResult {
    pub underlying: UnderlyingAst,
    pub nodes: NodeArena,
    pub sequence: Vec<ExtendedNode>,
    pub bindings: HashMap<Label, usize>,
    pub leaders: BTreeSet<usize>,
    pub lookups: AstLookups,
    pub regular_exit: Label,
    pub exceptional_exit: Label,
}

impl fmt::Display for PhaseOneResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut labels_at: HashMap<usize, Vec<Label>> = HashMap::new();
        for (label, index) in &self.bindings {
            labels_at.entry(*index).or_default().push(*label);
        }
        for (index, ext) in self.sequence.iter().enumerate() {
            if let Some(labels) = labels_at.get_mut(&index) {
                labels.sort();
                for label in labels.iter() {
                    writeln!(f, "{}:", label)?;
                }
            }
            let mark = if self.leaders.contains(&index) { "*" } else { " " };
            match &ext.kind {
                ExtendedKind::Plain(node) => {
                    writeln!(f, "{}{:4}: {}", mark, index, self.nodes.describe(*node))?
                }
                ExtendedKind::ThrowingOp { node, causes } => {
                    let routes: Vec<String> = causes
                        .iter()
                        .map(|(cause, labels)| {
                            let labels: Vec<String> = labels.iter().map(Label::to_string).collect();
                            format!("{} -> {}", cause.simple_name(), labels.join(","))
                        })
                        .collect();
                    writeln!(
                        f,
                        "{}{:4}: {} throws [{}]",
                        mark,
                        index,
                        self.nodes.describe(*node),
                        routes.join("; ")
                    )?
                }
                ExtendedKind::Goto(label) => writeln!(f, "{}{:4}: goto {}", mark, index, label)?,
                ExtendedKind::Branch {
                    then_label,
                    else_label,
                    ..
                } => writeln!(
                    f,
                    "{}{:4}: branch {} / {}",
                    mark, index, then_label, else_label
                )?,
            }
        }
        Ok(())
    }
}
