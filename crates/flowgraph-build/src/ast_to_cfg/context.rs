use super::errors::{BuildError, Result};
use super::extended::{ExtendedKind, ExtendedNode, Label, LabelGen, PhaseOneResult};
use super::try_stack::{LabelScope, TryFinallyScopeCell, TryStack};
use flowgraph_core::{
    AstLookups, BuilderConfig, NodeArena, NodeId, NodeKind, SyntaxTree, Tree, TreeId, TreeKind,
    TypeOracle, TypeRef, UnderlyingAst, WellKnown,
};
use indexmap::{IndexMap, IndexSet};
use std::collections::{BTreeSet, HashMap};

/// Phase-one state: the growing sequence plus every scope the walk needs to place jumps.
pub(crate) struct Translator<'a> {
    pub(super) ast: &'a SyntaxTree,
    pub(super) oracle: &'a dyn TypeOracle,
    pub(super) config: &'a BuilderConfig,

    pub(super) nodes: NodeArena,
    pub(super) sequence: Vec<ExtendedNode>,
    pub(super) bindings: HashMap<Label, usize>,
    pub(super) leaders: BTreeSet<usize>,
    pub(super) lookups: AstLookups,
    pub(super) labels: LabelGen,

    pub(super) regular_exit: Label,
    pub(super) exceptional_exit: Label,
    pub(super) try_stack: TryStack,
    pub(super) return_target: TryFinallyScopeCell,
    pub(super) break_target: Option<TryFinallyScopeCell>,
    pub(super) continue_target: Option<TryFinallyScopeCell>,
    pub(super) break_labels: LabelScope,
    pub(super) continue_labels: LabelScope,

    /// Operand tree to the parenthesized tree wrapping it.
    pub(super) paren_parents: HashMap<TreeId, TreeId>,
    /// Name of the labeled statement whose body is about to be translated.
    pub(super) enclosing_label: Option<String>,
    pub(super) assertions_variable: Option<String>,
    uid: u32,
}

impl<'a> Translator<'a> {
    pub fn new(ast: &'a SyntaxTree, oracle: &'a dyn TypeOracle, config: &'a BuilderConfig) -> Self {
        let mut labels = LabelGen::new();
        let regular_exit = labels.fresh();
        let exceptional_exit = labels.fresh();
        Self {
            ast,
            oracle,
            config,
            nodes: NodeArena::new(),
            sequence: Vec::new(),
            bindings: HashMap::new(),
            leaders: BTreeSet::new(),
            lookups: AstLookups::default(),
            labels,
            regular_exit,
            exceptional_exit,
            try_stack: TryStack::new(exceptional_exit),
            return_target: TryFinallyScopeCell::with_label(regular_exit),
            break_target: None,
            continue_target: None,
            break_labels: LabelScope::plain(),
            continue_labels: LabelScope::plain(),
            paren_parents: HashMap::new(),
            enclosing_label: None,
            assertions_variable: None,
            uid: 0,
        }
    }

    pub fn process(mut self, underlying: UnderlyingAst) -> Result<PhaseOneResult> {
        match &underlying {
            UnderlyingAst::Method { body, .. } => self.translate_statement(*body)?,
            UnderlyingAst::Arbitrary { code } => {
                if self.tree(*code)?.kind.is_statement() {
                    self.translate_statement(*code)?;
                } else {
                    self.translate_expr(*code)?;
                }
            }
            UnderlyingAst::Lambda { lambda } => {
                let tree = self.tree(*lambda)?;
                let TreeKind::Lambda { body, .. } = &tree.kind else {
                    return Err(self.unexpected(tree, "as the root of a lambda graph"));
                };
                let body = *body;
                if self.tree(body)?.kind.is_statement() {
                    self.translate_statement(body)?;
                } else {
                    let result = self.translate_expr(body)?;
                    let ty = self.type_of(body)?;
                    let node = self.alloc(NodeKind::LambdaResult { result }, Some(body), ty);
                    self.extend_with_node(node);
                }
            }
        }
        self.extend_with_goto(self.regular_exit);

        Ok(PhaseOneResult {
            underlying,
            nodes: self.nodes,
            sequence: self.sequence,
            bindings: self.bindings,
            leaders: self.leaders,
            lookups: self.lookups,
            regular_exit: self.regular_exit,
            exceptional_exit: self.exceptional_exit,
        })
    }

    pub(super) fn tree(&self, id: TreeId) -> Result<&'a Tree> {
        Ok(self.ast.tree(id)?)
    }

    pub(super) fn type_of(&self, id: TreeId) -> Result<TypeRef> {
        Ok(self.tree(id)?.ty.clone())
    }

    pub(super) fn unexpected(&self, tree: &Tree, context: &str) -> BuildError {
        BuildError::UnexpectedTree {
            tree: tree.id,
            kind: tree.kind.name(),
            context: context.to_string(),
        }
    }

    pub(super) fn fresh_label(&mut self) -> Label {
        self.labels.fresh()
    }

    /// Unique name for a synthetic variable, e.g. `iter#num3`.
    pub(super) fn unique_name(&mut self, prefix: &str) -> String {
        let name = format!("{}#num{}", prefix, self.uid);
        self.uid += 1;
        name
    }

    pub(super) fn well_known(&self, which: WellKnown) -> TypeRef {
        self.oracle.well_known(which)
    }

    pub(super) fn node_type(&self, node: NodeId) -> TypeRef {
        self.nodes
            .get(node)
            .map(|n| n.ty.clone())
            .unwrap_or(TypeRef::Void)
    }

    pub(super) fn node_tree(&self, node: NodeId) -> Option<TreeId> {
        self.nodes.get(node).and_then(|n| n.tree)
    }

    pub(super) fn node_kind(&self, node: NodeId) -> Option<&NodeKind> {
        self.nodes.get(node).map(|n| &n.kind)
    }

    pub(super) fn alloc(&mut self, kind: NodeKind, tree: Option<TreeId>, ty: TypeRef) -> NodeId {
        self.nodes.alloc(kind, tree, ty)
    }

    /// Allocates a node that has no counterpart in the source text.
    pub(super) fn synthetic(&mut self, kind: NodeKind, tree: Option<TreeId>, ty: TypeRef) -> NodeId {
        let id = self.nodes.alloc(kind, tree, ty);
        if let Some(node) = self.nodes.get_mut(id) {
            node.in_source = false;
        }
        id
    }

    pub(super) fn mark_lvalue(&mut self, node: NodeId) {
        if let Some(node) = self.nodes.get_mut(node) {
            node.lvalue = true;
        }
    }

    fn add_to_lookup(&mut self, node: NodeId) {
        let Some(tree) = self.node_tree(node) else {
            return;
        };
        self.lookups.tree_lookup.entry(tree).or_default().insert(node);
        let mut current = tree;
        while let Some(parent) = self.paren_parents.get(&current).copied() {
            self.lookups.tree_lookup.entry(parent).or_default().insert(node);
            current = parent;
        }
    }

    pub(super) fn add_to_converted_lookup(&mut self, tree: Option<TreeId>, node: NodeId) {
        if let Some(tree) = tree {
            self.lookups.converted_lookup.entry(tree).or_default().insert(node);
        }
    }

    pub(super) fn extend(&mut self, ext: ExtendedNode) -> usize {
        self.sequence.push(ext);
        self.sequence.len() - 1
    }

    pub(super) fn extend_with_node(&mut self, node: NodeId) -> NodeId {
        self.add_to_lookup(node);
        self.extend(ExtendedNode::plain(node));
        node
    }

    fn routes(&self, causes: &[TypeRef]) -> IndexMap<TypeRef, IndexSet<Label>> {
        let mut routes = IndexMap::new();
        for cause in causes {
            let labels = self.try_stack.possible_labels(cause, self.oracle);
            routes.insert(cause.clone(), labels);
        }
        routes
    }

    /// Appends a throwing operation and returns its sequence index.
    pub(super) fn extend_with_exceptions(&mut self, node: NodeId, causes: &[TypeRef]) -> usize {
        self.add_to_lookup(node);
        let routes = self.routes(causes);
        self.extend(ExtendedNode::throwing(node, routes))
    }

    /// Appends a throwing operation after which control never continues normally.
    pub(super) fn extend_with_terminating(&mut self, node: NodeId, causes: &[TypeRef]) {
        let index = self.extend_with_exceptions(node, causes);
        self.sequence[index].terminates = true;
    }

    pub(super) fn extend_with_goto(&mut self, label: Label) {
        self.extend(ExtendedNode::goto(label));
    }

    pub(super) fn extend_with_branch(&mut self, then_label: Label, else_label: Label) {
        self.extend(ExtendedNode::branch(then_label, else_label));
    }

    /// Binds `label` to the position of the next appended node.
    pub(super) fn bind_label(&mut self, label: Label) -> Result<()> {
        let index = self.sequence.len();
        if self.bindings.insert(label, index).is_some() {
            return Err(BuildError::DuplicateLabel(label));
        }
        self.leaders.insert(index);
        Ok(())
    }

    /// Inserts `ext` right after the node `pred` was emitted with, shifting every later binding
    /// and leader. Falls back to appending when `pred` was never emitted.
    fn insert_after(&mut self, ext: ExtendedNode, pred: NodeId) {
        let position = self
            .sequence
            .iter()
            .position(|e| e.node() == Some(pred))
            .map(|i| i + 1);
        let Some(at) = position else {
            self.extend(ext);
            return;
        };
        self.sequence.insert(at, ext);
        for index in self.bindings.values_mut() {
            if *index >= at {
                *index += 1;
            }
        }
        self.leaders = self
            .leaders
            .iter()
            .map(|&i| if i >= at { i + 1 } else { i })
            .collect();
    }

    pub(super) fn insert_node_after(&mut self, node: NodeId, pred: NodeId) -> NodeId {
        self.add_to_lookup(node);
        self.insert_after(ExtendedNode::plain(node), pred);
        node
    }

    pub(super) fn insert_throwing_after(&mut self, node: NodeId, causes: &[TypeRef], pred: NodeId) -> NodeId {
        self.add_to_lookup(node);
        let routes = self.routes(causes);
        self.insert_after(ExtendedNode::throwing(node, routes), pred);
        node
    }

    /// True if any throwing operation emitted so far may reach `label`.
    pub(super) fn is_exception_target(&self, label: Label) -> bool {
        self.sequence.iter().any(|ext| match &ext.kind {
            ExtendedKind::ThrowingOp { causes, .. } => {
                causes.values().any(|labels| labels.contains(&label))
            }
            _ => false,
        })
    }
}
