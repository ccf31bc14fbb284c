use super::{BinaryOp, Literal, MethodSig, Symbol, SyntaxTree, TreeId, TreeKind, UnaryOp};
use crate::types::{PrimitiveKind, TypeRef};

/// Fluent constructor for attributed trees. Expression types are supplied by the caller
/// where they cannot be read off an operand.
#[derive(Debug, Default)]
pub struct AstBuilder {
    ast: SyntaxTree,
}

impl AstBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn finish(self) -> SyntaxTree {
        self.ast
    }

    pub fn ast(&self) -> &SyntaxTree {
        &self.ast
    }

    pub fn add(&mut self, kind: TreeKind, ty: TypeRef) -> TreeId {
        self.ast.add(kind, ty)
    }

    pub fn type_of(&self, id: TreeId) -> TypeRef {
        self.ast
            .get(id)
            .map(|t| t.ty.clone())
            .unwrap_or(TypeRef::Void)
    }

    pub fn literal(&mut self, literal: Literal) -> TreeId {
        let ty = match &literal {
            Literal::Int(_) => TypeRef::int(),
            Literal::Long(_) => TypeRef::long(),
            Literal::Float(_) => TypeRef::primitive(PrimitiveKind::Float),
            Literal::Double(_) => TypeRef::double(),
            Literal::Char(_) => TypeRef::primitive(PrimitiveKind::Char),
            Literal::Boolean(_) => TypeRef::boolean(),
            Literal::String(_) => TypeRef::string(),
            Literal::Null => TypeRef::Null,
        };
        self.add(TreeKind::Literal { literal }, ty)
    }

    pub fn int(&mut self, value: i32) -> TreeId {
        self.literal(Literal::Int(value))
    }

    pub fn boolean(&mut self, value: bool) -> TreeId {
        self.literal(Literal::Boolean(value))
    }

    pub fn string(&mut self, value: &str) -> TreeId {
        self.literal(Literal::String(value.to_string()))
    }

    pub fn null(&mut self) -> TreeId {
        self.literal(Literal::Null)
    }

    pub fn local(&mut self, name: &str, ty: TypeRef) -> TreeId {
        self.ident(name, Symbol::Local, ty)
    }

    pub fn ident(&mut self, name: &str, symbol: Symbol, ty: TypeRef) -> TreeId {
        self.add(
            TreeKind::Identifier {
                name: name.to_string(),
                symbol,
            },
            ty,
        )
    }

    pub fn field(&mut self, name: &str, owner: TypeRef, is_static: bool, ty: TypeRef) -> TreeId {
        self.ident(name, Symbol::Field { owner, is_static }, ty)
    }

    pub fn this(&mut self, ty: TypeRef) -> TreeId {
        self.ident("this", Symbol::This, ty)
    }

    pub fn class_ref(&mut self, ty: TypeRef) -> TreeId {
        let name = ty.simple_name();
        self.ident(&name, Symbol::Class, ty)
    }

    pub fn select(&mut self, expr: TreeId, name: &str, symbol: Symbol, ty: TypeRef) -> TreeId {
        self.add(
            TreeKind::MemberSelect {
                expr,
                name: name.to_string(),
                symbol,
            },
            ty,
        )
    }

    pub fn binary(&mut self, op: BinaryOp, left: TreeId, right: TreeId, ty: TypeRef) -> TreeId {
        self.add(TreeKind::Binary { op, left, right }, ty)
    }

    pub fn unary(&mut self, op: UnaryOp, operand: TreeId, ty: TypeRef) -> TreeId {
        self.add(TreeKind::Unary { op, operand }, ty)
    }

    pub fn assign(&mut self, target: TreeId, value: TreeId) -> TreeId {
        let ty = self.type_of(target);
        self.add(TreeKind::Assignment { target, value }, ty)
    }

    pub fn compound_assign(&mut self, op: BinaryOp, target: TreeId, value: TreeId) -> TreeId {
        let ty = self.type_of(target);
        self.add(TreeKind::CompoundAssignment { op, target, value }, ty)
    }

    pub fn call(&mut self, receiver: Option<TreeId>, method: MethodSig, args: Vec<TreeId>) -> TreeId {
        let ty = method.return_type.clone();
        self.add(
            TreeKind::MethodInvocation {
                receiver,
                method,
                args,
            },
            ty,
        )
    }

    pub fn new_class(
        &mut self,
        ty: TypeRef,
        constructor: MethodSig,
        args: Vec<TreeId>,
        body: Option<TreeId>,
    ) -> TreeId {
        self.add(
            TreeKind::NewClass {
                enclosing: None,
                constructor,
                args,
                body,
            },
            ty,
        )
    }

    pub fn new_array(&mut self, ty: TypeRef, dimensions: Vec<TreeId>, initializers: Vec<TreeId>) -> TreeId {
        self.add(
            TreeKind::NewArray {
                dimensions,
                initializers,
            },
            ty,
        )
    }

    pub fn array_access(&mut self, array: TreeId, index: TreeId) -> TreeId {
        let ty = self
            .type_of(array)
            .element_type()
            .cloned()
            .unwrap_or(TypeRef::Void);
        self.add(TreeKind::ArrayAccess { array, index }, ty)
    }

    pub fn conditional(&mut self, cond: TreeId, then_expr: TreeId, else_expr: TreeId, ty: TypeRef) -> TreeId {
        self.add(
            TreeKind::Conditional {
                cond,
                then_expr,
                else_expr,
            },
            ty,
        )
    }

    pub fn cast(&mut self, ty: TypeRef, expr: TreeId) -> TreeId {
        self.add(TreeKind::TypeCast { expr }, ty)
    }

    pub fn instance_of(&mut self, expr: TreeId, test: TypeRef) -> TreeId {
        self.add(TreeKind::InstanceOf { expr, test }, TypeRef::boolean())
    }

    pub fn paren(&mut self, expr: TreeId) -> TreeId {
        let ty = self.type_of(expr);
        self.add(TreeKind::Parenthesized { expr }, ty)
    }

    pub fn lambda(&mut self, params: Vec<TreeId>, body: TreeId, ty: TypeRef) -> TreeId {
        self.add(TreeKind::Lambda { params, body }, ty)
    }

    pub fn member_ref(&mut self, qualifier: TreeId, name: &str, ty: TypeRef) -> TreeId {
        self.add(
            TreeKind::MemberReference {
                qualifier,
                name: name.to_string(),
            },
            ty,
        )
    }

    pub fn expr_stmt(&mut self, expr: TreeId) -> TreeId {
        self.add(TreeKind::ExpressionStatement { expr }, TypeRef::Void)
    }

    /// `target = value;` as a statement.
    pub fn assign_stmt(&mut self, target: TreeId, value: TreeId) -> TreeId {
        let assign = self.assign(target, value);
        self.expr_stmt(assign)
    }

    pub fn var(&mut self, name: &str, ty: TypeRef, init: Option<TreeId>) -> TreeId {
        self.add(
            TreeKind::Variable {
                name: name.to_string(),
                init,
                field_of: None,
            },
            ty,
        )
    }

    pub fn field_decl(&mut self, name: &str, owner: TypeRef, ty: TypeRef, init: Option<TreeId>) -> TreeId {
        self.add(
            TreeKind::Variable {
                name: name.to_string(),
                init,
                field_of: Some(owner),
            },
            ty,
        )
    }

    pub fn block(&mut self, statements: Vec<TreeId>) -> TreeId {
        self.add(TreeKind::Block { statements }, TypeRef::Void)
    }

    pub fn if_(&mut self, cond: TreeId, then_branch: TreeId, else_branch: Option<TreeId>) -> TreeId {
        self.add(
            TreeKind::If {
                cond,
                then_branch,
                else_branch,
            },
            TypeRef::Void,
        )
    }

    pub fn while_(&mut self, cond: TreeId, body: TreeId) -> TreeId {
        self.add(TreeKind::While { cond, body }, TypeRef::Void)
    }

    pub fn do_while(&mut self, body: TreeId, cond: TreeId) -> TreeId {
        self.add(TreeKind::DoWhile { body, cond }, TypeRef::Void)
    }

    pub fn for_(&mut self, init: Vec<TreeId>, cond: Option<TreeId>, update: Vec<TreeId>, body: TreeId) -> TreeId {
        self.add(
            TreeKind::For {
                init,
                cond,
                update,
                body,
            },
            TypeRef::Void,
        )
    }

    pub fn for_each(&mut self, variable: TreeId, iterable: TreeId, body: TreeId) -> TreeId {
        self.add(
            TreeKind::EnhancedFor {
                variable,
                iterable,
                body,
            },
            TypeRef::Void,
        )
    }

    pub fn labeled(&mut self, label: &str, body: TreeId) -> TreeId {
        self.add(
            TreeKind::Labeled {
                label: label.to_string(),
                body,
            },
            TypeRef::Void,
        )
    }

    pub fn break_(&mut self, label: Option<&str>) -> TreeId {
        self.add(
            TreeKind::Break {
                label: label.map(str::to_string),
            },
            TypeRef::Void,
        )
    }

    pub fn continue_(&mut self, label: Option<&str>) -> TreeId {
        self.add(
            TreeKind::Continue {
                label: label.map(str::to_string),
            },
            TypeRef::Void,
        )
    }

    pub fn return_(&mut self, expr: Option<TreeId>) -> TreeId {
        self.add(TreeKind::Return { expr }, TypeRef::Void)
    }

    pub fn throw(&mut self, expr: TreeId) -> TreeId {
        self.add(TreeKind::Throw { expr }, TypeRef::Void)
    }

    pub fn try_(&mut self, body: TreeId, catches: Vec<TreeId>, finally: Option<TreeId>) -> TreeId {
        self.add(
            TreeKind::Try {
                resources: Vec::new(),
                body,
                catches,
                finally,
            },
            TypeRef::Void,
        )
    }

    pub fn catch(&mut self, name: &str, caught: TypeRef, body: TreeId) -> TreeId {
        let param = self.var(name, caught, None);
        self.add(TreeKind::Catch { param, body }, TypeRef::Void)
    }

    pub fn switch(&mut self, selector: TreeId, cases: Vec<TreeId>) -> TreeId {
        self.add(TreeKind::Switch { selector, cases }, TypeRef::Void)
    }

    pub fn case(&mut self, expr: Option<TreeId>, statements: Vec<TreeId>) -> TreeId {
        self.add(TreeKind::Case { expr, statements }, TypeRef::Void)
    }

    pub fn synchronized(&mut self, lock: TreeId, body: TreeId) -> TreeId {
        self.add(TreeKind::Synchronized { lock, body }, TypeRef::Void)
    }

    pub fn assert(&mut self, cond: TreeId, detail: Option<TreeId>) -> TreeId {
        self.add(TreeKind::Assert { cond, detail }, TypeRef::Void)
    }

    pub fn empty(&mut self) -> TreeId {
        self.add(TreeKind::Empty, TypeRef::Void)
    }

    pub fn class_decl(&mut self, name: &str) -> TreeId {
        self.add(
            TreeKind::ClassDecl {
                name: name.to_string(),
            },
            TypeRef::class(name),
        )
    }
}
