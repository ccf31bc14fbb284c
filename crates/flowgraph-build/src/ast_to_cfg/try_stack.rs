/*! Exception routing and early-exit redirection through `try` scopes.
 *
 * A thrown exception does not go to one place: it may be caught by one of several handlers, pass
 * through a `finally`, or leave the body entirely. `TryStack` answers "where can this type go from
 * here" from the static nesting alone. The scope cell and scope map redirect `return`, `break` and
 * `continue` into a copy of the enclosing `finally` body, recording which exits were actually used.
 */

use super::errors::{BuildError, Result};
use super::extended::{Label, LabelGen};
use flowgraph_core::{TypeOracle, TypeRef};
use indexmap::{IndexMap, IndexSet};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub enum TryFrame {
    /// Catch clauses in source order.
    Catch { clauses: Vec<(TypeRef, Label)> },
    /// Every exception passes through the `finally` body at `label`.
    Finally { label: Label },
}

impl TryFrame {
    /// Adds the labels this frame may route `thrown` to. Returns true once the exception is
    /// certainly handled, meaning no outer frame can see it.
    fn possible_labels(&self, thrown: &TypeRef, oracle: &dyn TypeOracle, labels: &mut IndexSet<Label>) -> bool {
        match self {
            TryFrame::Finally { label } => {
                labels.insert(*label);
                true
            }
            TryFrame::Catch { clauses } => {
                for (caught, label) in clauses {
                    let alternatives = match caught {
                        TypeRef::Union { alternatives } => alternatives.as_slice(),
                        single => std::slice::from_ref(single),
                    };
                    let mut can_apply = false;
                    for alternative in alternatives {
                        if oracle.is_subtype(thrown, alternative) {
                            labels.insert(*label);
                            return true;
                        }
                        if oracle.is_subtype(alternative, thrown) {
                            can_apply = true;
                        }
                    }
                    if can_apply {
                        labels.insert(*label);
                    }
                }
                false
            }
        }
    }
}

/// Innermost-first stack of try frames plus the label used when nothing catches.
#[derive(Debug, Clone)]
pub struct TryStack {
    exit: Label,
    frames: Vec<TryFrame>,
}

impl TryStack {
    pub fn new(exit: Label) -> Self {
        Self {
            exit,
            frames: Vec::new(),
        }
    }

    pub fn push_frame(&mut self, frame: TryFrame) {
        self.frames.push(frame);
    }

    pub fn pop_frame(&mut self) -> Option<TryFrame> {
        self.frames.pop()
    }

    /// Ordered, non-empty set of labels `thrown` may transfer control to.
    pub fn possible_labels(&self, thrown: &TypeRef, oracle: &dyn TypeOracle) -> IndexSet<Label> {
        let thrown = thrown.resolve_bound();
        let mut labels = IndexSet::new();
        for frame in self.frames.iter().rev() {
            if frame.possible_labels(thrown, oracle, &mut labels) {
                return labels;
            }
        }
        labels.insert(self.exit);
        labels
    }
}

/// Lazily allocated jump target for `return`, `break` or `continue` inside a `try` with a
/// `finally`. Remembers whether any jump used it.
#[derive(Debug, Clone, Default)]
pub struct TryFinallyScopeCell {
    label: Option<Label>,
    accessed: bool,
}

impl TryFinallyScopeCell {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_label(label: Label) -> Self {
        Self {
            label: Some(label),
            accessed: false,
        }
    }

    pub fn access_label(&mut self, labels: &mut LabelGen) -> Label {
        self.accessed = true;
        *self.label.get_or_insert_with(|| labels.fresh())
    }

    pub fn peek_label(&self) -> Option<Label> {
        self.label
    }

    pub fn was_accessed(&self) -> bool {
        self.accessed
    }
}

/// Named break or continue targets.
///
/// Outside any `try`/`finally` it is a plain lookup. Inside one, names bound within the protected
/// region resolve as usual; any other name gets a fresh label that is remembered, so the caller
/// can emit a `finally` copy that continues to the real target.
#[derive(Debug, Clone)]
pub enum LabelScope {
    Plain(HashMap<String, Label>),
    TryFinally {
        bound: HashMap<String, Label>,
        accessed: IndexMap<String, Label>,
    },
}

impl LabelScope {
    pub fn plain() -> Self {
        LabelScope::Plain(HashMap::new())
    }

    pub fn try_finally() -> Self {
        LabelScope::TryFinally {
            bound: HashMap::new(),
            accessed: IndexMap::new(),
        }
    }

    pub fn bind(&mut self, name: &str, label: Label) {
        match self {
            LabelScope::Plain(map) | LabelScope::TryFinally { bound: map, .. } => {
                map.insert(name.to_string(), label);
            }
        }
    }

    pub fn unbind(&mut self, name: &str) {
        match self {
            LabelScope::Plain(map) | LabelScope::TryFinally { bound: map, .. } => {
                map.remove(name);
            }
        }
    }

    pub fn get(&mut self, name: &str, labels: &mut LabelGen) -> Result<Label> {
        match self {
            LabelScope::Plain(map) => map
                .get(name)
                .copied()
                .ok_or_else(|| BuildError::NoJumpTarget(format!("label '{}'", name))),
            LabelScope::TryFinally { bound, accessed } => {
                if let Some(label) = bound.get(name) {
                    return Ok(*label);
                }
                Ok(*accessed
                    .entry(name.to_string())
                    .or_insert_with(|| labels.fresh()))
            }
        }
    }

    /// Names resolved through the try/finally indirection, in first-use order.
    pub fn accessed_names(&self) -> Vec<(String, Label)> {
        match self {
            LabelScope::Plain(_) => Vec::new(),
            LabelScope::TryFinally { accessed, .. } => accessed
                .iter()
                .map(|(name, label)| (name.clone(), *label))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::ClassHierarchy;
    use pretty_assertions::assert_eq;

    fn ty(name: &str) -> TypeRef {
        TypeRef::class(name)
    }

    #[test]
    fn test_empty_stack_routes_to_exit() {
        let mut gen = LabelGen::new();
        let exit = gen.fresh();
        let stack = TryStack::new(exit);
        let oracle = ClassHierarchy::new();
        let labels = stack.possible_labels(&ty("java.lang.NullPointerException"), &oracle);
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec![exit]);
    }

    #[test]
    fn test_definite_catch_stops_search() {
        let mut gen = LabelGen::new();
        let exit = gen.fresh();
        let outer = gen.fresh();
        let inner = gen.fresh();
        let mut stack = TryStack::new(exit);
        stack.push_frame(TryFrame::Catch {
            clauses: vec![(ty("java.lang.Exception"), outer)],
        });
        stack.push_frame(TryFrame::Catch {
            clauses: vec![(ty("java.lang.RuntimeException"), inner)],
        });
        let oracle = ClassHierarchy::new();
        let labels = stack.possible_labels(&ty("java.lang.ArithmeticException"), &oracle);
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec![inner]);
    }

    #[test]
    fn test_possible_catch_accumulates() {
        let mut gen = LabelGen::new();
        let exit = gen.fresh();
        let npe = gen.fresh();
        let io = gen.fresh();
        let mut stack = TryStack::new(exit);
        stack.push_frame(TryFrame::Catch {
            clauses: vec![
                (ty("java.lang.NullPointerException"), npe),
                (ty("java.io.IOException"), io),
            ],
        });
        let oracle = ClassHierarchy::new();
        let labels = stack.possible_labels(&ty("java.lang.Throwable"), &oracle);
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec![npe, io, exit]);
    }

    #[test]
    fn test_union_catch_and_finally() {
        let mut gen = LabelGen::new();
        let exit = gen.fresh();
        let fin = gen.fresh();
        let multi = gen.fresh();
        let mut stack = TryStack::new(exit);
        stack.push_frame(TryFrame::Finally { label: fin });
        stack.push_frame(TryFrame::Catch {
            clauses: vec![(
                TypeRef::union(vec![ty("java.io.IOException"), ty("java.lang.ArithmeticException")]),
                multi,
            )],
        });
        let oracle = ClassHierarchy::new();
        let caught = stack.possible_labels(&ty("java.lang.ArithmeticException"), &oracle);
        assert_eq!(caught.into_iter().collect::<Vec<_>>(), vec![multi]);
        let uncaught = stack.possible_labels(&ty("java.lang.ClassCastException"), &oracle);
        assert_eq!(uncaught.into_iter().collect::<Vec<_>>(), vec![fin]);
    }

    #[test]
    fn test_type_variable_uses_bound() {
        let mut gen = LabelGen::new();
        let exit = gen.fresh();
        let handler = gen.fresh();
        let mut stack = TryStack::new(exit);
        stack.push_frame(TryFrame::Catch {
            clauses: vec![(ty("java.io.IOException"), handler)],
        });
        let oracle = ClassHierarchy::new();
        let thrown = TypeRef::type_var("E", ty("java.io.FileNotFoundException"));
        let labels = stack.possible_labels(&thrown, &oracle);
        assert_eq!(labels.into_iter().collect::<Vec<_>>(), vec![handler]);
    }

    #[test]
    fn test_routing_is_deterministic() {
        let mut gen = LabelGen::new();
        let exit = gen.fresh();
        let mut stack = TryStack::new(exit);
        let a = gen.fresh();
        let b = gen.fresh();
        let fin = gen.fresh();
        stack.push_frame(TryFrame::Finally { label: fin });
        stack.push_frame(TryFrame::Catch {
            clauses: vec![(ty("java.lang.IllegalStateException"), a), (ty("java.io.IOException"), b)],
        });
        let oracle = ClassHierarchy::new();
        let first = stack.possible_labels(&ty("java.lang.Exception"), &oracle);
        for _ in 0..10 {
            assert_eq!(stack.possible_labels(&ty("java.lang.Exception"), &oracle), first);
        }
        assert_eq!(first.into_iter().collect::<Vec<_>>(), vec![a, b, fin]);
    }

    #[test]
    fn test_scope_cell_is_lazy() {
        let mut gen = LabelGen::new();
        let mut cell = TryFinallyScopeCell::new();
        assert!(!cell.was_accessed());
        assert_eq!(cell.peek_label(), None);
        let label = cell.access_label(&mut gen);
        assert!(cell.was_accessed());
        assert_eq!(cell.access_label(&mut gen), label);
        assert_eq!(cell.peek_label(), Some(label));
    }

    #[test]
    fn test_scope_map_tracks_outer_names() {
        let mut gen = LabelGen::new();
        let inner = gen.fresh();
        let mut scope = LabelScope::try_finally();
        scope.bind("inner", inner);
        assert_eq!(scope.get("inner", &mut gen).unwrap(), inner);
        let outer = scope.get("outer", &mut gen).unwrap();
        assert_eq!(scope.get("outer", &mut gen).unwrap(), outer);
        assert_eq!(scope.accessed_names(), vec![("outer".to_string(), outer)]);

        let mut plain = LabelScope::plain();
        assert!(plain.get("missing", &mut gen).is_err());
    }
}
