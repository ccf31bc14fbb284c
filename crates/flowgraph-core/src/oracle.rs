/*! Type queries the builder asks while lowering.
 *
 * Conversions and exception routing hinge on subtype questions the tree alone cannot answer.
 * `TypeOracle` is the read-only seam to whatever type checker produced the tree; `ClassHierarchy`
 * is a self-contained implementation over a table of declared supertypes, good enough for tools
 * and tests that hand the builder a serialized tree.
 */

use crate::ast::MethodSig;
use crate::types::{PrimitiveKind, TypeRef, OBJECT};
use crate::Result;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Well-known classes the builder routes implicit exceptions to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WellKnown {
    Object,
    String,
    Throwable,
    NullPointer,
    Arithmetic,
    ArrayIndexOutOfBounds,
    ClassCast,
    AssertionError,
    Iterable,
    Iterator,
}

impl WellKnown {
    pub fn class_name(self) -> &'static str {
        match self {
            WellKnown::Object => OBJECT,
            WellKnown::String => crate::types::STRING,
            WellKnown::Throwable => "java.lang.Throwable",
            WellKnown::NullPointer => "java.lang.NullPointerException",
            WellKnown::Arithmetic => "java.lang.ArithmeticException",
            WellKnown::ArrayIndexOutOfBounds => "java.lang.ArrayIndexOutOfBoundsException",
            WellKnown::ClassCast => "java.lang.ClassCastException",
            WellKnown::AssertionError => "java.lang.AssertionError",
            WellKnown::Iterable => "java.lang.Iterable",
            WellKnown::Iterator => "java.util.Iterator",
        }
    }
}

pub trait TypeOracle {
    fn is_subtype(&self, sub: &TypeRef, sup: &TypeRef) -> bool;

    fn is_same_type(&self, a: &TypeRef, b: &TypeRef) -> bool {
        a == b
    }

    /// Assignment compatibility: subtyping plus boxing and unboxing.
    fn is_assignable(&self, from: &TypeRef, to: &TypeRef) -> bool {
        if self.is_subtype(from, to) {
            return true;
        }
        if let Some(kind) = from.as_primitive() {
            return to.is_reference() && self.is_subtype(&self.boxed_type(kind), to);
        }
        match (self.unboxed_type(from), to.as_primitive()) {
            (Some(unboxed), Some(target)) => unboxed.widens_to(target),
            _ => false,
        }
    }

    fn boxed_type(&self, kind: PrimitiveKind) -> TypeRef {
        TypeRef::class(kind.boxed_name())
    }

    fn unboxed_type(&self, ty: &TypeRef) -> Option<PrimitiveKind> {
        ty.boxed_primitive()
    }

    fn well_known(&self, which: WellKnown) -> TypeRef {
        TypeRef::class(which.class_name())
    }

    /// Declared checked exceptions of a call target, including those of overridden methods.
    fn thrown_types(&self, method: &MethodSig) -> Vec<TypeRef> {
        method.throws.clone()
    }

    fn terminates_execution(&self, method: &MethodSig) -> bool {
        method.terminates
    }
}

/// Class table mapping each class to its direct supertypes. Every class is implicitly a
/// subtype of `java.lang.Object`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassHierarchy {
    #[serde(default)]
    supertypes: IndexMap<String, Vec<String>>,
}

impl ClassHierarchy {
    /// An empty table except for `java.lang.Object`.
    pub fn empty() -> Self {
        let mut supertypes = IndexMap::new();
        supertypes.insert(OBJECT.to_string(), Vec::new());
        Self { supertypes }
    }

    /// Preloaded with the core language classes.
    pub fn new() -> Self {
        let mut hierarchy = Self::empty();
        let core: &[(&str, &[&str])] = &[
            ("java.lang.Throwable", &[]),
            ("java.lang.Exception", &["java.lang.Throwable"]),
            ("java.lang.Error", &["java.lang.Throwable"]),
            ("java.lang.RuntimeException", &["java.lang.Exception"]),
            ("java.lang.AssertionError", &["java.lang.Error"]),
            ("java.lang.NullPointerException", &["java.lang.RuntimeException"]),
            ("java.lang.ArithmeticException", &["java.lang.RuntimeException"]),
            ("java.lang.ClassCastException", &["java.lang.RuntimeException"]),
            ("java.lang.IllegalArgumentException", &["java.lang.RuntimeException"]),
            ("java.lang.IllegalStateException", &["java.lang.RuntimeException"]),
            ("java.lang.IndexOutOfBoundsException", &["java.lang.RuntimeException"]),
            (
                "java.lang.ArrayIndexOutOfBoundsException",
                &["java.lang.IndexOutOfBoundsException"],
            ),
            ("java.io.IOException", &["java.lang.Exception"]),
            ("java.io.FileNotFoundException", &["java.io.IOException"]),
            ("java.lang.CharSequence", &[]),
            ("java.lang.Comparable", &[]),
            ("java.io.Serializable", &[]),
            ("java.lang.Cloneable", &[]),
            (
                "java.lang.String",
                &["java.lang.CharSequence", "java.lang.Comparable", "java.io.Serializable"],
            ),
            ("java.lang.Number", &["java.io.Serializable"]),
            ("java.lang.Boolean", &["java.io.Serializable", "java.lang.Comparable"]),
            ("java.lang.Character", &["java.io.Serializable", "java.lang.Comparable"]),
            ("java.lang.Byte", &["java.lang.Number", "java.lang.Comparable"]),
            ("java.lang.Short", &["java.lang.Number", "java.lang.Comparable"]),
            ("java.lang.Integer", &["java.lang.Number", "java.lang.Comparable"]),
            ("java.lang.Long", &["java.lang.Number", "java.lang.Comparable"]),
            ("java.lang.Float", &["java.lang.Number", "java.lang.Comparable"]),
            ("java.lang.Double", &["java.lang.Number", "java.lang.Comparable"]),
            ("java.lang.Iterable", &[]),
            ("java.util.Iterator", &[]),
            ("java.util.Collection", &["java.lang.Iterable"]),
            ("java.util.List", &["java.util.Collection"]),
            ("java.util.Set", &["java.util.Collection"]),
            ("java.util.ArrayList", &["java.util.List"]),
        ];
        for (name, supers) in core {
            hierarchy.declare_class(name, supers.iter().copied());
        }
        hierarchy
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let mut hierarchy: ClassHierarchy = serde_json::from_str(json)?;
        hierarchy
            .supertypes
            .entry(OBJECT.to_string())
            .or_default();
        Ok(hierarchy)
    }

    pub fn declare_class<'a>(&mut self, name: &str, supertypes: impl IntoIterator<Item = &'a str>) {
        let entry = self.supertypes.entry(name.to_string()).or_default();
        for sup in supertypes {
            if !entry.iter().any(|s| s == sup) {
                entry.push(sup.to_string());
            }
        }
    }

    /// Merges another table into this one; declarations from `other` extend existing entries.
    pub fn extend(&mut self, other: &ClassHierarchy) {
        for (name, supers) in &other.supertypes {
            self.declare_class(name, supers.iter().map(String::as_str));
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.supertypes.contains_key(name)
    }

    pub fn is_class_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup || sup == OBJECT {
            return true;
        }
        let mut seen = IndexSet::new();
        let mut queue = VecDeque::from([sub]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current) {
                continue;
            }
            if current == sup {
                return true;
            }
            if let Some(parents) = self.supertypes.get(current) {
                queue.extend(parents.iter().map(String::as_str));
            }
        }
        false
    }
}

impl Default for ClassHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeOracle for ClassHierarchy {
    fn is_subtype(&self, sub: &TypeRef, sup: &TypeRef) -> bool {
        if sub == sup {
            return true;
        }
        match (sub, sup) {
            (TypeRef::Primitive { kind: a }, TypeRef::Primitive { kind: b }) => a.widens_to(*b),
            (TypeRef::Primitive { .. }, _) | (_, TypeRef::Primitive { .. }) => false,
            (TypeRef::Void, _) | (_, TypeRef::Void) => false,
            (TypeRef::Null, _) => sup.is_reference(),
            (TypeRef::Union { alternatives }, _) => {
                alternatives.iter().all(|alt| self.is_subtype(alt, sup))
            }
            (_, TypeRef::Union { alternatives }) => {
                alternatives.iter().any(|alt| self.is_subtype(sub, alt))
            }
            (TypeRef::TypeVar { bound, .. }, _) => self.is_subtype(bound, sup),
            (_, TypeRef::TypeVar { .. }) => false,
            (TypeRef::Class { name: a, .. }, TypeRef::Class { name: b, .. }) => {
                self.is_class_subtype(a, b)
            }
            (TypeRef::Array { element: a }, TypeRef::Array { element: b }) => {
                if a.is_primitive() || b.is_primitive() {
                    a == b
                } else {
                    self.is_subtype(a, b)
                }
            }
            (TypeRef::Array { .. }, TypeRef::Class { name, .. }) => matches!(
                name.as_str(),
                OBJECT | "java.lang.Cloneable" | "java.io.Serializable"
            ),
            (TypeRef::Class { .. }, TypeRef::Array { .. }) => false,
            (_, TypeRef::Null) => false,
        }
    }
}
