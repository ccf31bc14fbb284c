/*! Typed syntax trees consumed by the builder.
 *
 * Lowering needs every expression's type and every name's resolution up front. The tree here is
 * already parsed and attributed: each `Tree` carries its static type, identifiers carry the
 * symbol they resolve to, and call sites carry the signature they bind to.
 */

mod builder;

pub use builder::AstBuilder;

use crate::types::TypeRef;
use crate::{CfgError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeId(pub u32);

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tree{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub id: TreeId,
    #[serde(flatten)]
    pub kind: TreeKind,
    #[serde(default = "void_type")]
    pub ty: TypeRef,
}

fn void_type() -> TypeRef {
    TypeRef::Void
}

/// Arena of trees. `trees[i].id` is always `TreeId(i)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyntaxTree {
    trees: Vec<Tree>,
}

impl SyntaxTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, kind: TreeKind, ty: TypeRef) -> TreeId {
        let id = TreeId(self.trees.len() as u32);
        self.trees.push(Tree { id, kind, ty });
        id
    }

    pub fn get(&self, id: TreeId) -> Option<&Tree> {
        self.trees.get(id.0 as usize).filter(|t| t.id == id)
    }

    pub fn tree(&self, id: TreeId) -> Result<&Tree> {
        self.get(id).ok_or(CfgError::UnknownTree(id))
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tree> {
        self.trees.iter()
    }

    /// Checks the arena numbering after deserialization.
    pub fn validate(&self) -> Result<()> {
        for (index, tree) in self.trees.iter().enumerate() {
            if tree.id.0 as usize != index {
                return Err(CfgError::UnknownTree(tree.id));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "value_kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Char(char),
    Boolean(bool),
    String(String),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Long(v) => write!(f, "{}L", v),
            Literal::Float(v) => write!(f, "{}f", v),
            Literal::Double(v) => write!(f, "{}", v),
            Literal::Char(c) => write!(f, "'{}'", c.escape_default()),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::String(s) => write!(f, "\"{}\"", s.escape_default()),
            Literal::Null => write!(f, "null"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Mul,
    Div,
    Rem,
    Add,
    Sub,
    Shl,
    Shr,
    UShr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

impl BinaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Shl => "<<",
            BinaryOp::Shr => ">>",
            BinaryOp::UShr => ">>>",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::BitAnd => "&",
            BinaryOp::BitOr => "|",
            BinaryOp::BitXor => "^",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Plus,
    Minus,
    BitNot,
    Not,
    PreInc,
    PreDec,
    PostInc,
    PostDec,
}

impl UnaryOp {
    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Plus => "+",
            UnaryOp::Minus => "-",
            UnaryOp::BitNot => "~",
            UnaryOp::Not => "!",
            UnaryOp::PreInc | UnaryOp::PostInc => "++",
            UnaryOp::PreDec | UnaryOp::PostDec => "--",
        }
    }

    pub fn is_postfix(self) -> bool {
        matches!(self, UnaryOp::PostInc | UnaryOp::PostDec)
    }

    pub fn is_increment(self) -> bool {
        matches!(self, UnaryOp::PreInc | UnaryOp::PostInc)
    }
}

/// What a name resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "symbol", rename_all = "snake_case")]
pub enum Symbol {
    Local,
    Field {
        owner: TypeRef,
        #[serde(default)]
        is_static: bool,
    },
    Class,
    Package,
    This,
    Super,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodSig {
    pub name: String,
    pub owner: TypeRef,
    #[serde(default)]
    pub params: Vec<TypeRef>,
    #[serde(default = "void_type")]
    pub return_type: TypeRef,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_varargs: bool,
    #[serde(default)]
    pub throws: Vec<TypeRef>,
    /// Calls to this method never return normally (e.g. `System.exit`).
    #[serde(default)]
    pub terminates: bool,
}

impl MethodSig {
    pub fn new(name: impl Into<String>, owner: TypeRef) -> Self {
        Self {
            name: name.into(),
            owner,
            params: Vec::new(),
            return_type: TypeRef::Void,
            is_static: false,
            is_varargs: false,
            throws: Vec::new(),
            terminates: false,
        }
    }

    pub fn with_params(mut self, params: Vec<TypeRef>) -> Self {
        self.params = params;
        self
    }

    pub fn returning(mut self, ty: TypeRef) -> Self {
        self.return_type = ty;
        self
    }

    pub fn with_throws(mut self, throws: Vec<TypeRef>) -> Self {
        self.throws = throws;
        self
    }

    pub fn static_method(mut self) -> Self {
        self.is_static = true;
        self
    }

    pub fn varargs(mut self) -> Self {
        self.is_varargs = true;
        self
    }

    pub fn terminating(mut self) -> Self {
        self.terminates = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeKind {
    Block {
        statements: Vec<TreeId>,
    },
    ExpressionStatement {
        expr: TreeId,
    },
    /// Local variable, parameter, or field with optional initializer. The tree's type is the
    /// declared type.
    Variable {
        name: String,
        #[serde(default)]
        init: Option<TreeId>,
        #[serde(default)]
        field_of: Option<TypeRef>,
    },
    If {
        cond: TreeId,
        then_branch: TreeId,
        #[serde(default)]
        else_branch: Option<TreeId>,
    },
    While {
        cond: TreeId,
        body: TreeId,
    },
    DoWhile {
        body: TreeId,
        cond: TreeId,
    },
    For {
        #[serde(default)]
        init: Vec<TreeId>,
        #[serde(default)]
        cond: Option<TreeId>,
        #[serde(default)]
        update: Vec<TreeId>,
        body: TreeId,
    },
    EnhancedFor {
        variable: TreeId,
        iterable: TreeId,
        body: TreeId,
    },
    Labeled {
        label: String,
        body: TreeId,
    },
    Break {
        #[serde(default)]
        label: Option<String>,
    },
    Continue {
        #[serde(default)]
        label: Option<String>,
    },
    Return {
        #[serde(default)]
        expr: Option<TreeId>,
    },
    Throw {
        expr: TreeId,
    },
    Try {
        #[serde(default)]
        resources: Vec<TreeId>,
        body: TreeId,
        #[serde(default)]
        catches: Vec<TreeId>,
        #[serde(default)]
        finally: Option<TreeId>,
    },
    /// The caught type is the parameter tree's type, possibly a union.
    Catch {
        param: TreeId,
        body: TreeId,
    },
    Switch {
        selector: TreeId,
        cases: Vec<TreeId>,
    },
    /// `expr` is `None` for the `default` case.
    Case {
        #[serde(default)]
        expr: Option<TreeId>,
        statements: Vec<TreeId>,
    },
    Synchronized {
        lock: TreeId,
        body: TreeId,
    },
    Assert {
        cond: TreeId,
        #[serde(default)]
        detail: Option<TreeId>,
    },
    Empty,
    ClassDecl {
        name: String,
    },

    Literal {
        literal: Literal,
    },
    Identifier {
        name: String,
        #[serde(flatten)]
        symbol: Symbol,
    },
    MemberSelect {
        expr: TreeId,
        name: String,
        #[serde(flatten)]
        symbol: Symbol,
    },
    ArrayAccess {
        array: TreeId,
        index: TreeId,
    },
    /// `receiver` is `None` for an unqualified call.
    MethodInvocation {
        #[serde(default)]
        receiver: Option<TreeId>,
        method: MethodSig,
        #[serde(default)]
        args: Vec<TreeId>,
    },
    NewClass {
        #[serde(default)]
        enclosing: Option<TreeId>,
        constructor: MethodSig,
        #[serde(default)]
        args: Vec<TreeId>,
        #[serde(default)]
        body: Option<TreeId>,
    },
    NewArray {
        #[serde(default)]
        dimensions: Vec<TreeId>,
        #[serde(default)]
        initializers: Vec<TreeId>,
    },
    Assignment {
        target: TreeId,
        value: TreeId,
    },
    CompoundAssignment {
        op: BinaryOp,
        target: TreeId,
        value: TreeId,
    },
    Binary {
        op: BinaryOp,
        left: TreeId,
        right: TreeId,
    },
    Unary {
        op: UnaryOp,
        operand: TreeId,
    },
    Conditional {
        cond: TreeId,
        then_expr: TreeId,
        else_expr: TreeId,
    },
    TypeCast {
        expr: TreeId,
    },
    InstanceOf {
        expr: TreeId,
        test: TypeRef,
    },
    Parenthesized {
        expr: TreeId,
    },
    Lambda {
        #[serde(default)]
        params: Vec<TreeId>,
        body: TreeId,
    },
    MemberReference {
        qualifier: TreeId,
        name: String,
    },
    Erroneous,
}

impl TreeKind {
    pub fn name(&self) -> &'static str {
        match self {
            TreeKind::Block { .. } => "block",
            TreeKind::ExpressionStatement { .. } => "expression statement",
            TreeKind::Variable { .. } => "variable",
            TreeKind::If { .. } => "if",
            TreeKind::While { .. } => "while",
            TreeKind::DoWhile { .. } => "do-while",
            TreeKind::For { .. } => "for",
            TreeKind::EnhancedFor { .. } => "enhanced for",
            TreeKind::Labeled { .. } => "labeled statement",
            TreeKind::Break { .. } => "break",
            TreeKind::Continue { .. } => "continue",
            TreeKind::Return { .. } => "return",
            TreeKind::Throw { .. } => "throw",
            TreeKind::Try { .. } => "try",
            TreeKind::Catch { .. } => "catch",
            TreeKind::Switch { .. } => "switch",
            TreeKind::Case { .. } => "case",
            TreeKind::Synchronized { .. } => "synchronized",
            TreeKind::Assert { .. } => "assert",
            TreeKind::Empty => "empty statement",
            TreeKind::ClassDecl { .. } => "class declaration",
            TreeKind::Literal { .. } => "literal",
            TreeKind::Identifier { .. } => "identifier",
            TreeKind::MemberSelect { .. } => "member select",
            TreeKind::ArrayAccess { .. } => "array access",
            TreeKind::MethodInvocation { .. } => "method invocation",
            TreeKind::NewClass { .. } => "object creation",
            TreeKind::NewArray { .. } => "array creation",
            TreeKind::Assignment { .. } => "assignment",
            TreeKind::CompoundAssignment { .. } => "compound assignment",
            TreeKind::Binary { .. } => "binary",
            TreeKind::Unary { .. } => "unary",
            TreeKind::Conditional { .. } => "conditional expression",
            TreeKind::TypeCast { .. } => "type cast",
            TreeKind::InstanceOf { .. } => "instanceof",
            TreeKind::Parenthesized { .. } => "parenthesized",
            TreeKind::Lambda { .. } => "lambda",
            TreeKind::MemberReference { .. } => "member reference",
            TreeKind::Erroneous => "erroneous",
        }
    }

    /// Statement kinds; everything else yields a value.
    pub fn is_statement(&self) -> bool {
        matches!(
            self,
            TreeKind::Block { .. }
                | TreeKind::ExpressionStatement { .. }
                | TreeKind::Variable { .. }
                | TreeKind::If { .. }
                | TreeKind::While { .. }
                | TreeKind::DoWhile { .. }
                | TreeKind::For { .. }
                | TreeKind::EnhancedFor { .. }
                | TreeKind::Labeled { .. }
                | TreeKind::Break { .. }
                | TreeKind::Continue { .. }
                | TreeKind::Return { .. }
                | TreeKind::Throw { .. }
                | TreeKind::Try { .. }
                | TreeKind::Catch { .. }
                | TreeKind::Switch { .. }
                | TreeKind::Case { .. }
                | TreeKind::Synchronized { .. }
                | TreeKind::Assert { .. }
                | TreeKind::Empty
                | TreeKind::ClassDecl { .. }
        )
    }
}

/// Which tree a graph was built for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum UnderlyingAst {
    Method {
        name: String,
        owner: TypeRef,
        body: TreeId,
    },
    Lambda {
        lambda: TreeId,
    },
    /// A field initializer, initializer block, or standalone statement.
    Arbitrary {
        code: TreeId,
    },
}

impl UnderlyingAst {
    pub fn root(&self) -> TreeId {
        match self {
            UnderlyingAst::Method { body, .. } => *body,
            UnderlyingAst::Lambda { lambda } => *lambda,
            UnderlyingAst::Arbitrary { code } => *code,
        }
    }
}

impl fmt::Display for UnderlyingAst {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnderlyingAst::Method { name, owner, .. } => {
                write!(f, "method {}.{}", owner.simple_name(), name)
            }
            UnderlyingAst::Lambda { lambda } => write!(f, "lambda {}", lambda),
            UnderlyingAst::Arbitrary { code } => write!(f, "code {}", code),
        }
    }
}
