use crate::ast::{BinaryOp, Literal, TreeId, UnaryOp};
use crate::types::TypeRef;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// One operation in a basic block. Operands are earlier nodes in evaluation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub tree: Option<TreeId>,
    pub ty: TypeRef,
    /// False for nodes synthesized by lowering (conversions, loop temporaries, markers).
    pub in_source: bool,
    pub lvalue: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    Literal {
        value: Literal,
    },
    LocalVariable {
        name: String,
    },
    VariableDeclaration {
        name: String,
    },
    FieldAccess {
        receiver: NodeId,
        field: String,
        is_static: bool,
    },
    ArrayAccess {
        array: NodeId,
        index: NodeId,
    },
    MethodAccess {
        receiver: NodeId,
        method: String,
    },
    MethodInvocation {
        target: NodeId,
        args: Vec<NodeId>,
    },
    ObjectCreation {
        class_name: NodeId,
        args: Vec<NodeId>,
        enclosing: Option<NodeId>,
        body: Option<NodeId>,
    },
    ArrayCreation {
        dimensions: Vec<NodeId>,
        initializers: Vec<NodeId>,
    },
    Assignment {
        target: NodeId,
        value: NodeId,
    },
    StringConcatenateAssignment {
        target: NodeId,
        value: NodeId,
    },
    /// Arithmetic, shift, comparison, bitwise and short-circuit operators. Integral `/` and `%`
    /// are told apart from floating ones by the node type.
    Binary {
        op: BinaryOp,
        left: NodeId,
        right: NodeId,
    },
    StringConcatenate {
        left: NodeId,
        right: NodeId,
    },
    Unary {
        op: UnaryOp,
        operand: NodeId,
    },
    Ternary {
        cond: NodeId,
        then_operand: NodeId,
        else_operand: NodeId,
    },
    TypeCast {
        operand: NodeId,
    },
    InstanceOf {
        operand: NodeId,
        test: TypeRef,
    },
    WideningConversion {
        operand: NodeId,
    },
    NarrowingConversion {
        operand: NodeId,
    },
    StringConversion {
        operand: NodeId,
    },
    Case {
        selector: NodeId,
        guard: NodeId,
    },
    Return {
        result: NodeId,
    },
    Throw {
        exception: NodeId,
    },
    AssertionError {
        condition: NodeId,
        detail: Option<NodeId>,
    },
    SynchronizedStart {
        lock: NodeId,
    },
    SynchronizedEnd {
        lock: NodeId,
    },
    Marker {
        message: String,
    },
    ClassName,
    PackageName {
        name: String,
    },
    This {
        implicit: bool,
    },
    Super,
    ClassDeclaration {
        name: String,
    },
    FunctionalInterface,
    LambdaResult {
        result: NodeId,
    },
}

impl NodeKind {
    pub fn operands(&self) -> Vec<NodeId> {
        match self {
            NodeKind::FieldAccess { receiver, .. } | NodeKind::MethodAccess { receiver, .. } => {
                vec![*receiver]
            }
            NodeKind::ArrayAccess { array, index } => vec![*array, *index],
            NodeKind::MethodInvocation { target, args } => {
                let mut ops = vec![*target];
                ops.extend(args);
                ops
            }
            NodeKind::ObjectCreation {
                class_name,
                args,
                enclosing,
                body,
            } => {
                let mut ops: Vec<NodeId> = enclosing.iter().copied().collect();
                ops.push(*class_name);
                ops.extend(args);
                ops.extend(body);
                ops
            }
            NodeKind::ArrayCreation {
                dimensions,
                initializers,
            } => dimensions.iter().chain(initializers).copied().collect(),
            NodeKind::Assignment { target, value }
            | NodeKind::StringConcatenateAssignment { target, value } => vec![*target, *value],
            NodeKind::Binary { left, right, .. } | NodeKind::StringConcatenate { left, right } => {
                vec![*left, *right]
            }
            NodeKind::Ternary {
                cond,
                then_operand,
                else_operand,
            } => vec![*cond, *then_operand, *else_operand],
            NodeKind::Unary { operand, .. }
            | NodeKind::TypeCast { operand }
            | NodeKind::InstanceOf { operand, .. }
            | NodeKind::WideningConversion { operand }
            | NodeKind::NarrowingConversion { operand }
            | NodeKind::StringConversion { operand } => vec![*operand],
            NodeKind::Case { selector, guard } => vec![*selector, *guard],
            NodeKind::Return { result } | NodeKind::LambdaResult { result } => vec![*result],
            NodeKind::Throw { exception } => vec![*exception],
            NodeKind::AssertionError { condition, detail } => {
                let mut ops = vec![*condition];
                ops.extend(detail);
                ops
            }
            NodeKind::SynchronizedStart { lock } | NodeKind::SynchronizedEnd { lock } => {
                vec![*lock]
            }
            NodeKind::Literal { .. }
            | NodeKind::LocalVariable { .. }
            | NodeKind::VariableDeclaration { .. }
            | NodeKind::Marker { .. }
            | NodeKind::ClassName
            | NodeKind::PackageName { .. }
            | NodeKind::This { .. }
            | NodeKind::Super
            | NodeKind::ClassDeclaration { .. }
            | NodeKind::FunctionalInterface => Vec::new(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Literal { .. } => "Literal",
            NodeKind::LocalVariable { .. } => "LocalVariable",
            NodeKind::VariableDeclaration { .. } => "VariableDeclaration",
            NodeKind::FieldAccess { .. } => "FieldAccess",
            NodeKind::ArrayAccess { .. } => "ArrayAccess",
            NodeKind::MethodAccess { .. } => "MethodAccess",
            NodeKind::MethodInvocation { .. } => "MethodInvocation",
            NodeKind::ObjectCreation { .. } => "ObjectCreation",
            NodeKind::ArrayCreation { .. } => "ArrayCreation",
            NodeKind::Assignment { .. } => "Assignment",
            NodeKind::StringConcatenateAssignment { .. } => "StringConcatenateAssignment",
            NodeKind::Binary { .. } => "Binary",
            NodeKind::StringConcatenate { .. } => "StringConcatenate",
            NodeKind::Unary { .. } => "Unary",
            NodeKind::Ternary { .. } => "Ternary",
            NodeKind::TypeCast { .. } => "TypeCast",
            NodeKind::InstanceOf { .. } => "InstanceOf",
            NodeKind::WideningConversion { .. } => "WideningConversion",
            NodeKind::NarrowingConversion { .. } => "NarrowingConversion",
            NodeKind::StringConversion { .. } => "StringConversion",
            NodeKind::Case { .. } => "Case",
            NodeKind::Return { .. } => "Return",
            NodeKind::Throw { .. } => "Throw",
            NodeKind::AssertionError { .. } => "AssertionError",
            NodeKind::SynchronizedStart { .. } => "SynchronizedStart",
            NodeKind::SynchronizedEnd { .. } => "SynchronizedEnd",
            NodeKind::Marker { .. } => "Marker",
            NodeKind::ClassName => "ClassName",
            NodeKind::PackageName { .. } => "PackageName",
            NodeKind::This { .. } => "This",
            NodeKind::Super => "Super",
            NodeKind::ClassDeclaration { .. } => "ClassDeclaration",
            NodeKind::FunctionalInterface => "FunctionalInterface",
            NodeKind::LambdaResult { .. } => "LambdaResult",
        }
    }
}

/// Owns every node produced for one body, indexed by `NodeId`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeArena {
    nodes: Vec<Node>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alloc(&mut self, kind: NodeKind, tree: Option<TreeId>, ty: TypeRef) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node {
            id,
            kind,
            tree,
            ty,
            in_source: true,
            lvalue: false,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0 as usize)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.nodes.get_mut(id.0 as usize)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// Renders a node with its operands expanded, e.g. `(a + b)` or `x.foo(1)`.
    pub fn describe(&self, id: NodeId) -> String {
        self.describe_depth(id, 0)
    }

    fn describe_depth(&self, id: NodeId, depth: usize) -> String {
        let Some(node) = self.get(id) else {
            return format!("<{}>", id);
        };
        if depth > 6 {
            return "...".to_string();
        }
        let d = |n: &NodeId| self.describe_depth(*n, depth + 1);
        match &node.kind {
            NodeKind::Literal { value } => value.to_string(),
            NodeKind::LocalVariable { name } => name.clone(),
            NodeKind::VariableDeclaration { name } => format!("{} {}", node.ty.simple_name(), name),
            NodeKind::FieldAccess { receiver, field, .. } => format!("{}.{}", d(receiver), field),
            NodeKind::ArrayAccess { array, index } => format!("{}[{}]", d(array), d(index)),
            NodeKind::MethodAccess { receiver, method } => format!("{}.{}", d(receiver), method),
            NodeKind::MethodInvocation { target, args } => {
                let args: Vec<String> = args.iter().map(d).collect();
                format!("{}({})", d(target), args.join(", "))
            }
            NodeKind::ObjectCreation { args, body, .. } => {
                let args: Vec<String> = args.iter().map(d).collect();
                let body = if body.is_some() { " { ... }" } else { "" };
                format!("new {}({}){}", node.ty.simple_name(), args.join(", "), body)
            }
            NodeKind::ArrayCreation {
                dimensions,
                initializers,
            } => {
                let dims: Vec<String> = dimensions.iter().map(d).collect();
                let inits: Vec<String> = initializers.iter().map(d).collect();
                format!(
                    "new {}[{}]{{{}}}",
                    node.ty
                        .element_type()
                        .map(TypeRef::simple_name)
                        .unwrap_or_default(),
                    dims.join(", "),
                    inits.join(", ")
                )
            }
            NodeKind::Assignment { target, value } => format!("{} = {}", d(target), d(value)),
            NodeKind::StringConcatenateAssignment { target, value } => {
                format!("{} += {}", d(target), d(value))
            }
            NodeKind::Binary { op, left, right } => {
                format!("({} {} {})", d(left), op.symbol(), d(right))
            }
            NodeKind::StringConcatenate { left, right } => format!("({} + {})", d(left), d(right)),
            NodeKind::Unary { op, operand } => format!("{}{}", op.symbol(), d(operand)),
            NodeKind::Ternary {
                cond,
                then_operand,
                else_operand,
            } => format!("({} ? {} : {})", d(cond), d(then_operand), d(else_operand)),
            NodeKind::TypeCast { operand } => {
                format!("({}) {}", node.ty.simple_name(), d(operand))
            }
            NodeKind::InstanceOf { operand, test } => {
                format!("({} instanceof {})", d(operand), test.simple_name())
            }
            NodeKind::WideningConversion { operand } => {
                format!("WideningConversion({}, {})", d(operand), node.ty.simple_name())
            }
            NodeKind::NarrowingConversion { operand } => {
                format!("NarrowingConversion({}, {})", d(operand), node.ty.simple_name())
            }
            NodeKind::StringConversion { operand } => format!("StringConversion({})", d(operand)),
            NodeKind::Case { selector, guard } => format!("case {} == {}", d(guard), d(selector)),
            NodeKind::Return { result } => format!("return {}", d(result)),
            NodeKind::Throw { exception } => format!("throw {}", d(exception)),
            NodeKind::AssertionError { condition, detail } => match detail {
                Some(detail) => format!("AssertionError(assert {} : {})", d(condition), d(detail)),
                None => format!("AssertionError(assert {})", d(condition)),
            },
            NodeKind::SynchronizedStart { lock } => format!("synchronized ({}) start", d(lock)),
            NodeKind::SynchronizedEnd { lock } => format!("synchronized ({}) end", d(lock)),
            NodeKind::Marker { message } => format!("marker ({})", message),
            NodeKind::ClassName => node.ty.simple_name(),
            NodeKind::PackageName { name } => name.clone(),
            NodeKind::This { .. } => "this".to_string(),
            NodeKind::Super => "super".to_string(),
            NodeKind::ClassDeclaration { name } => format!("class {}", name),
            NodeKind::FunctionalInterface => format!("{} (functional)", node.ty.simple_name()),
            NodeKind::LambdaResult { result } => format!("-> {}", d(result)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_nested_operands() {
        let mut arena = NodeArena::new();
        let a = arena.alloc(
            NodeKind::LocalVariable { name: "a".into() },
            None,
            TypeRef::int(),
        );
        let b = arena.alloc(
            NodeKind::Literal {
                value: Literal::Int(2),
            },
            None,
            TypeRef::int(),
        );
        let sum = arena.alloc(
            NodeKind::Binary {
                op: BinaryOp::Add,
                left: a,
                right: b,
            },
            None,
            TypeRef::int(),
        );
        assert_eq!(arena.describe(sum), "(a + 2)");
        assert_eq!(arena.get(sum).unwrap().kind.operands(), vec![a, b]);
    }
}
