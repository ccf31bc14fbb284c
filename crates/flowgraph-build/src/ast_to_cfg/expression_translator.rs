use super::context::Translator;
use super::errors::{BuildError, Result};
use super::extended::ExtendedNode;
use flowgraph_core::{
    BinaryOp, FlowRule, Literal, MethodSig, NodeId, NodeKind, Symbol, Tree, TreeId, TreeKind,
    TypeRef, UnaryOp, WellKnown,
};
use indexmap::IndexSet;

impl<'a> Translator<'a> {
    /// Emits the nodes computing `id` and returns the node holding its value.
    pub(super) fn translate_expr(&mut self, id: TreeId) -> Result<NodeId> {
        let tree = self.tree(id)?;
        let ty = tree.ty.clone();
        match &tree.kind {
            TreeKind::Literal { literal } => {
                let node = self.alloc(NodeKind::Literal { value: literal.clone() }, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            TreeKind::Identifier { name, symbol } => self.translate_identifier(tree, name, symbol),
            TreeKind::MemberSelect { expr, name, symbol } => {
                self.translate_member_select(tree, *expr, name, symbol)
            }
            TreeKind::ArrayAccess { array, index } => {
                let array = self.translate_expr(*array)?;
                let index = self.translate_expr(*index)?;
                let index = self.unary_numeric_promotion(index);
                let node = self.alloc(NodeKind::ArrayAccess { array, index }, Some(id), ty);
                let causes = [
                    self.well_known(WellKnown::ArrayIndexOutOfBounds),
                    self.well_known(WellKnown::NullPointer),
                ];
                self.extend_with_exceptions(node, &causes);
                Ok(node)
            }
            TreeKind::MethodInvocation {
                receiver,
                method,
                args,
            } => self.translate_method_invocation(id, ty, *receiver, method, args),
            TreeKind::NewClass {
                enclosing,
                constructor,
                args,
                body,
            } => self.translate_new_class(id, ty, *enclosing, constructor, args, *body),
            TreeKind::NewArray {
                dimensions,
                initializers,
            } => {
                let element = ty.element_type().cloned().ok_or_else(|| {
                    BuildError::InvalidType(format!("array creation {} has type {}", id, ty.simple_name()))
                })?;
                let mut dims = Vec::with_capacity(dimensions.len());
                for dim in dimensions {
                    let value = self.translate_expr(*dim)?;
                    dims.push(self.unary_numeric_promotion(value));
                }
                let mut inits = Vec::with_capacity(initializers.len());
                for init in initializers {
                    let value = self.translate_expr(*init)?;
                    inits.push(self.assign_convert(value, &element));
                }
                let node = self.alloc(
                    NodeKind::ArrayCreation {
                        dimensions: dims,
                        initializers: inits,
                    },
                    Some(id),
                    ty,
                );
                Ok(self.extend_with_node(node))
            }
            TreeKind::Assignment { target, value } => self.translate_assignment_expr(id, *target, *value),
            TreeKind::CompoundAssignment { op, target, value } => {
                self.translate_compound_assignment(id, *op, *target, *value)
            }
            TreeKind::Binary { op, left, right } => self.translate_binary(id, ty, *op, *left, *right),
            TreeKind::Unary { op, operand } => self.translate_unary(id, ty, *op, *operand),
            TreeKind::Conditional {
                cond,
                then_expr,
                else_expr,
            } => {
                let true_start = self.fresh_label();
                let false_start = self.fresh_label();
                let merge = self.fresh_label();

                let cond = self.translate_expr(*cond)?;
                let cond = self.unbox(cond);
                self.extend_with_branch(true_start, false_start);

                self.bind_label(true_start)?;
                let then_operand = self.translate_expr(*then_expr)?;
                let then_operand = self.conditional_expr_promotion(then_operand, &ty)?;
                self.extend_with_goto(merge);

                self.bind_label(false_start)?;
                let else_operand = self.translate_expr(*else_expr)?;
                let else_operand = self.conditional_expr_promotion(else_operand, &ty)?;

                self.bind_label(merge)?;
                let node = self.alloc(
                    NodeKind::Ternary {
                        cond,
                        then_operand,
                        else_operand,
                    },
                    Some(id),
                    ty,
                );
                Ok(self.extend_with_node(node))
            }
            TreeKind::TypeCast { expr } => {
                let operand = self.translate_expr(*expr)?;
                let node = self.alloc(NodeKind::TypeCast { operand }, Some(id), ty);
                let class_cast = self.well_known(WellKnown::ClassCast);
                self.extend_with_exceptions(node, &[class_cast]);
                Ok(node)
            }
            TreeKind::InstanceOf { expr, test } => {
                let operand = self.translate_expr(*expr)?;
                let node = self.alloc(
                    NodeKind::InstanceOf {
                        operand,
                        test: test.clone(),
                    },
                    Some(id),
                    ty,
                );
                Ok(self.extend_with_node(node))
            }
            TreeKind::Parenthesized { expr } => {
                self.paren_parents.insert(*expr, id);
                self.translate_expr(*expr)
            }
            TreeKind::Lambda { .. } => {
                self.lookups.declared_lambdas.push(id);
                let node = self.alloc(NodeKind::FunctionalInterface, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            TreeKind::MemberReference { qualifier, .. } => {
                self.translate_expr(*qualifier)?;
                let node = self.alloc(NodeKind::FunctionalInterface, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            TreeKind::Erroneous => Err(self.unexpected(tree, "in the input")),
            _ => Err(self.unexpected(tree, "in expression position")),
        }
    }

    /// Receiver of an unqualified member: the class for statics, implicit `this` otherwise.
    fn implicit_receiver(&mut self, owner: &TypeRef, is_static: bool) -> NodeId {
        let kind = if is_static {
            NodeKind::ClassName
        } else {
            NodeKind::This { implicit: true }
        };
        let node = self.synthetic(kind, None, owner.clone());
        self.extend_with_node(node)
    }

    fn is_this(&self, node: NodeId) -> bool {
        matches!(self.node_kind(node), Some(NodeKind::This { .. }))
    }

    fn translate_identifier(&mut self, tree: &Tree, name: &str, symbol: &Symbol) -> Result<NodeId> {
        let id = tree.id;
        let ty = tree.ty.clone();
        let kind = match symbol {
            Symbol::Field { owner, is_static } => {
                let receiver = self.implicit_receiver(owner, *is_static);
                NodeKind::FieldAccess {
                    receiver,
                    field: name.to_string(),
                    is_static: *is_static,
                }
            }
            Symbol::Local => NodeKind::LocalVariable { name: name.to_string() },
            Symbol::This => NodeKind::This { implicit: false },
            Symbol::Super => NodeKind::Super,
            Symbol::Class => NodeKind::ClassName,
            Symbol::Package => NodeKind::PackageName { name: name.to_string() },
        };
        let node = self.alloc(kind, Some(id), ty);
        Ok(self.extend_with_node(node))
    }

    fn translate_member_select(
        &mut self,
        tree: &Tree,
        expr: TreeId,
        name: &str,
        symbol: &Symbol,
    ) -> Result<NodeId> {
        let id = tree.id;
        let ty = tree.ty.clone();
        let receiver = self.translate_expr(expr)?;
        match symbol {
            Symbol::Field { is_static, .. } => {
                let node = self.alloc(
                    NodeKind::FieldAccess {
                        receiver,
                        field: name.to_string(),
                        is_static: *is_static,
                    },
                    Some(id),
                    ty,
                );
                self.extend_field_access(node, receiver, *is_static);
                Ok(node)
            }
            Symbol::Class => {
                let node = self.alloc(NodeKind::ClassName, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            Symbol::Package => {
                let qualified = match self.node_kind(receiver) {
                    Some(NodeKind::PackageName { name: prefix }) => format!("{}.{}", prefix, name),
                    _ => name.to_string(),
                };
                let node = self.alloc(NodeKind::PackageName { name: qualified }, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            Symbol::This => {
                let node = self.alloc(NodeKind::This { implicit: false }, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            Symbol::Super => {
                let node = self.alloc(NodeKind::Super, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            Symbol::Local => Err(self.unexpected(tree, "selecting a local variable")),
        }
    }

    /// A field read through anything but `this` or a class may dereference null.
    fn extend_field_access(&mut self, node: NodeId, receiver: NodeId, is_static: bool) {
        if is_static || self.is_this(receiver) {
            self.extend_with_node(node);
        } else {
            let npe = self.well_known(WellKnown::NullPointer);
            self.extend_with_exceptions(node, &[npe]);
        }
    }

    fn translate_method_invocation(
        &mut self,
        id: TreeId,
        ty: TypeRef,
        receiver: Option<TreeId>,
        method: &MethodSig,
        args: &[TreeId],
    ) -> Result<NodeId> {
        let receiver = match receiver {
            Some(receiver) => self.translate_expr(receiver)?,
            None => self.implicit_receiver(&method.owner, method.is_static),
        };
        let access = self.alloc(
            NodeKind::MethodAccess {
                receiver,
                method: method.name.clone(),
            },
            None,
            method.return_type.clone(),
        );
        if method.is_static || self.is_this(receiver) {
            self.extend_with_node(access);
        } else {
            let npe = self.well_known(WellKnown::NullPointer);
            self.extend_with_exceptions(access, &[npe]);
        }

        let args = self.convert_call_arguments(id, method, args)?;
        let node = self.alloc(NodeKind::MethodInvocation { target: access, args }, Some(id), ty);
        let causes = self.call_causes(method);
        if self.oracle.terminates_execution(method) {
            self.extend_with_terminating(node, &causes);
        } else {
            self.extend_with_exceptions(node, &causes);
        }
        Ok(node)
    }

    /// Declared exceptions of a call target plus the throwable every call may raise.
    fn call_causes(&self, method: &MethodSig) -> Vec<TypeRef> {
        let mut causes: IndexSet<TypeRef> = self.oracle.thrown_types(method).into_iter().collect();
        causes.insert(self.well_known(WellKnown::Throwable));
        causes.into_iter().collect()
    }

    fn translate_new_class(
        &mut self,
        id: TreeId,
        ty: TypeRef,
        enclosing: Option<TreeId>,
        constructor: &MethodSig,
        args: &[TreeId],
        body: Option<TreeId>,
    ) -> Result<NodeId> {
        let enclosing = enclosing.map(|e| self.translate_expr(e)).transpose()?;
        let args = self.convert_call_arguments(id, constructor, args)?;
        let class_name = self.alloc(NodeKind::ClassName, None, ty.clone());
        self.extend_with_node(class_name);
        let body = match body {
            Some(body) => {
                let tree = self.tree(body)?;
                Some(self.translate_class_declaration(tree)?)
            }
            None => None,
        };
        let node = self.alloc(
            NodeKind::ObjectCreation {
                class_name,
                args,
                enclosing,
                body,
            },
            Some(id),
            ty,
        );
        let causes = self.call_causes(constructor);
        self.extend_with_exceptions(node, &causes);
        Ok(node)
    }

    /// Records a nested class without lowering its members.
    pub(super) fn translate_class_declaration(&mut self, tree: &Tree) -> Result<NodeId> {
        let TreeKind::ClassDecl { name } = &tree.kind else {
            return Err(self.unexpected(tree, "as a class body"));
        };
        self.lookups.declared_classes.push(tree.id);
        let node = self.alloc(
            NodeKind::ClassDeclaration { name: name.clone() },
            Some(tree.id),
            tree.ty.clone(),
        );
        Ok(self.extend_with_node(node))
    }

    /// Owner, staticness, explicit receiver and name if `target` names a field.
    fn field_target(&self, target: &'a Tree) -> Option<(TypeRef, bool, Option<TreeId>, &'a str)> {
        match &target.kind {
            TreeKind::Identifier {
                name,
                symbol: Symbol::Field { owner, is_static },
            } => Some((owner.clone(), *is_static, None, name.as_str())),
            TreeKind::MemberSelect {
                expr,
                name,
                symbol: Symbol::Field { owner, is_static },
            } => Some((owner.clone(), *is_static, Some(*expr), name.as_str())),
            _ => None,
        }
    }

    fn translate_assignment_expr(&mut self, id: TreeId, target: TreeId, value: TreeId) -> Result<NodeId> {
        let target_tree = self.tree(target)?;
        let target_type = target_tree.ty.clone();
        if let Some((owner, is_static, receiver, field)) = self.field_target(target_tree) {
            let receiver = match receiver {
                Some(receiver) => self.translate_expr(receiver)?,
                None => self.implicit_receiver(&owner, is_static),
            };
            let value = self.translate_expr(value)?;
            let value = self.assign_convert(value, &target_type);
            let access = self.alloc(
                NodeKind::FieldAccess {
                    receiver,
                    field: field.to_string(),
                    is_static,
                },
                Some(target),
                target_type.clone(),
            );
            self.mark_lvalue(access);
            self.extend_field_access(access, receiver, is_static);
            let node = self.alloc(NodeKind::Assignment { target: access, value }, Some(id), target_type);
            return Ok(self.extend_with_node(node));
        }

        let target = self.translate_expr(target)?;
        self.mark_lvalue(target);
        let value = self.translate_expr(value)?;
        Ok(self.translate_assignment(Some(id), target, value))
    }

    /// `target = value` after assignment conversion of `value`.
    pub(super) fn translate_assignment(&mut self, tree: Option<TreeId>, target: NodeId, value: NodeId) -> NodeId {
        self.mark_lvalue(target);
        let target_type = self.node_type(target);
        let value = self.assign_convert(value, &target_type);
        let node = self.alloc(NodeKind::Assignment { target, value }, tree, target_type);
        if tree.is_none() {
            if let Some(n) = self.nodes.get_mut(node) {
                n.in_source = false;
            }
        }
        self.extend_with_node(node)
    }

    fn integral_division(&self, op: BinaryOp, ty: &TypeRef) -> bool {
        matches!(op, BinaryOp::Div | BinaryOp::Rem) && ty.is_integral()
    }

    /// Emits a binary operation, as a throwing operation for integral division.
    fn extend_binary(&mut self, node: NodeId, op: BinaryOp, ty: &TypeRef) -> NodeId {
        if self.integral_division(op, ty) {
            let arithmetic = self.well_known(WellKnown::Arithmetic);
            self.extend_with_exceptions(node, &[arithmetic]);
            node
        } else {
            self.extend_with_node(node)
        }
    }

    /// `E1 op= E2` becomes `E1 = (T)(E1 op E2)`.
    fn translate_compound_assignment(
        &mut self,
        id: TreeId,
        op: BinaryOp,
        target: TreeId,
        value: TreeId,
    ) -> Result<NodeId> {
        let left_type = self.type_of(target)?;
        let right_type = self.type_of(value)?;
        let target = self.translate_expr(target)?;
        let value = self.translate_expr(value)?;

        let operation = match op {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem => {
                let promoted = self.binary_promoted_type(&left_type, &right_type)?;
                let left = self.binary_numeric_promotion(target, &promoted);
                let right = self.binary_numeric_promotion(value, &promoted);
                let node = self.synthetic(NodeKind::Binary { op, left, right }, None, promoted.clone());
                self.extend_binary(node, op, &promoted)
            }
            BinaryOp::Add | BinaryOp::Sub => {
                if left_type.is_string() || right_type.is_string() {
                    if op != BinaryOp::Add {
                        return Err(BuildError::InvalidType(format!(
                            "string operand of compound '{}' at {}",
                            op.symbol(),
                            id
                        )));
                    }
                    let left = self.string_conversion(target);
                    let right = self.string_conversion(value);
                    let node = self.alloc(
                        NodeKind::StringConcatenateAssignment {
                            target: left,
                            value: right,
                        },
                        Some(id),
                        left_type,
                    );
                    return Ok(self.extend_with_node(node));
                }
                let promoted = self.binary_promoted_type(&left_type, &right_type)?;
                let left = self.binary_numeric_promotion(target, &promoted);
                let right = self.binary_numeric_promotion(value, &promoted);
                let node = self.synthetic(NodeKind::Binary { op, left, right }, None, promoted);
                self.extend_with_node(node)
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => {
                let left = self.unary_numeric_promotion(target);
                let right = self.unary_numeric_promotion(value);
                let ty = self.node_type(left);
                let node = self.synthetic(NodeKind::Binary { op, left, right }, None, ty);
                self.extend_with_node(node)
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                let (left, right) = if self.is_numeric_or_boxed(&left_type) && self.is_numeric_or_boxed(&right_type) {
                    let promoted = self.binary_promoted_type(&left_type, &right_type)?;
                    (
                        self.binary_numeric_promotion(target, &promoted),
                        self.binary_numeric_promotion(value, &promoted),
                    )
                } else if self.is_boolean_or_boxed(&left_type) && self.is_boolean_or_boxed(&right_type) {
                    (self.unbox(target), self.unbox(value))
                } else {
                    return Err(BuildError::InvalidType(format!(
                        "operands of compound '{}' at {} are {} and {}",
                        op.symbol(),
                        id,
                        left_type.simple_name(),
                        right_type.simple_name()
                    )));
                };
                let node = self.synthetic(NodeKind::Binary { op, left, right }, None, left_type.clone());
                self.extend_with_node(node)
            }
            _ => {
                return Err(BuildError::InvalidType(format!(
                    "'{}' is not a compound assignment operator",
                    op.symbol()
                )))
            }
        };

        let cast = self.synthetic(NodeKind::TypeCast { operand: operation }, None, left_type.clone());
        self.extend_with_node(cast);
        self.mark_lvalue(target);
        let node = self.alloc(NodeKind::Assignment { target, value: cast }, Some(id), left_type);
        Ok(self.extend_with_node(node))
    }

    fn translate_binary(
        &mut self,
        id: TreeId,
        ty: TypeRef,
        op: BinaryOp,
        left: TreeId,
        right: TreeId,
    ) -> Result<NodeId> {
        let left_type = self.type_of(left)?;
        let right_type = self.type_of(right)?;

        let (left, right) = match op {
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Rem | BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let promoted = self.binary_promoted_type(&left_type, &right_type)?;
                let l = self.translate_expr(left)?;
                let l = self.binary_numeric_promotion(l, &promoted);
                let r = self.translate_expr(right)?;
                (l, self.binary_numeric_promotion(r, &promoted))
            }
            BinaryOp::Add | BinaryOp::Sub => {
                if op == BinaryOp::Add && (left_type.is_string() || right_type.is_string()) {
                    let l = self.translate_expr(left)?;
                    let l = self.string_conversion(l);
                    let r = self.translate_expr(right)?;
                    let r = self.string_conversion(r);
                    let node = self.alloc(NodeKind::StringConcatenate { left: l, right: r }, Some(id), ty);
                    return Ok(self.extend_with_node(node));
                }
                let promoted = self.binary_promoted_type(&left_type, &right_type)?;
                let l = self.translate_expr(left)?;
                let l = self.binary_numeric_promotion(l, &promoted);
                let r = self.translate_expr(right)?;
                (l, self.binary_numeric_promotion(r, &promoted))
            }
            BinaryOp::Shl | BinaryOp::Shr | BinaryOp::UShr => {
                let l = self.translate_expr(left)?;
                let l = self.unary_numeric_promotion(l);
                let r = self.translate_expr(right)?;
                (l, self.unary_numeric_promotion(r))
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                let l = self.translate_expr(left)?;
                let r = self.translate_expr(right)?;
                let both_boxed = self.oracle.unboxed_type(&left_type).is_some()
                    && self.oracle.unboxed_type(&right_type).is_some();
                if both_boxed {
                    (l, r)
                } else if self.is_numeric_or_boxed(&left_type) && self.is_numeric_or_boxed(&right_type) {
                    let promoted = self.binary_promoted_type(&left_type, &right_type)?;
                    (
                        self.binary_numeric_promotion(l, &promoted),
                        self.binary_numeric_promotion(r, &promoted),
                    )
                } else if self.is_boolean_or_boxed(&left_type) && self.is_boolean_or_boxed(&right_type) {
                    (self.unbox(l), self.unbox(r))
                } else {
                    (l, r)
                }
            }
            BinaryOp::BitAnd | BinaryOp::BitOr | BinaryOp::BitXor => {
                if self.is_numeric_or_boxed(&left_type) && self.is_numeric_or_boxed(&right_type) {
                    let promoted = self.binary_promoted_type(&left_type, &right_type)?;
                    let l = self.translate_expr(left)?;
                    let l = self.binary_numeric_promotion(l, &promoted);
                    let r = self.translate_expr(right)?;
                    (l, self.binary_numeric_promotion(r, &promoted))
                } else {
                    let l = self.translate_expr(left)?;
                    let l = self.unbox(l);
                    let r = self.translate_expr(right)?;
                    (l, self.unbox(r))
                }
            }
            BinaryOp::And | BinaryOp::Or => {
                return self.translate_short_circuit(id, ty, op, left, right);
            }
        };

        let node = self.alloc(NodeKind::Binary { op, left, right }, Some(id), ty.clone());
        Ok(self.extend_binary(node, op, &ty))
    }

    /// `a && b` evaluates `b` only on the true edge of `a`; the false edge skips to the result.
    fn translate_short_circuit(
        &mut self,
        id: TreeId,
        ty: TypeRef,
        op: BinaryOp,
        left: TreeId,
        right: TreeId,
    ) -> Result<NodeId> {
        let right_start = self.fresh_label();
        let short_circuit = self.fresh_label();

        let left = self.translate_expr(left)?;
        let branch = if op == BinaryOp::And {
            ExtendedNode::branch_with_rules(right_start, short_circuit, FlowRule::EachToEach, FlowRule::ElseToElse)
        } else {
            ExtendedNode::branch_with_rules(short_circuit, right_start, FlowRule::ThenToThen, FlowRule::EachToEach)
        };
        self.extend(branch);

        self.bind_label(right_start)?;
        let right = self.translate_expr(right)?;

        self.bind_label(short_circuit)?;
        let node = self.alloc(NodeKind::Binary { op, left, right }, Some(id), ty);
        Ok(self.extend_with_node(node))
    }

    fn translate_unary(&mut self, id: TreeId, ty: TypeRef, op: UnaryOp, operand: TreeId) -> Result<NodeId> {
        match op {
            UnaryOp::Plus | UnaryOp::Minus | UnaryOp::BitNot => {
                let operand = self.translate_expr(operand)?;
                let operand = self.unary_numeric_promotion(operand);
                let node = self.alloc(NodeKind::Unary { op, operand }, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            UnaryOp::Not => {
                let operand = self.translate_expr(operand)?;
                let operand = self.unbox(operand);
                let node = self.alloc(NodeKind::Unary { op, operand }, Some(id), ty);
                Ok(self.extend_with_node(node))
            }
            UnaryOp::PreInc | UnaryOp::PreDec | UnaryOp::PostInc | UnaryOp::PostDec => {
                let expr = self.translate_expr(operand)?;
                if !op.is_postfix() {
                    let assign = self.increment_or_decrement(Some(id), expr, op.is_increment())?;
                    self.lookups.unary_assign.insert(id, assign);
                    return Ok(assign);
                }

                // The old value is saved before the update and is the expression's result.
                let expr_type = self.node_type(expr);
                let name = self.unique_name("tempPostfix");
                let decl = self.synthetic(NodeKind::VariableDeclaration { name: name.clone() }, None, expr_type.clone());
                self.extend_with_node(decl);
                let temp = self.synthetic(NodeKind::LocalVariable { name: name.clone() }, None, expr_type.clone());
                self.extend_with_node(temp);
                self.mark_lvalue(temp);
                let store = self.synthetic(NodeKind::Assignment { target: temp, value: expr }, Some(id), expr_type.clone());
                self.extend_with_node(store);
                let assign = self.increment_or_decrement(None, expr, op.is_increment())?;
                self.lookups.unary_assign.insert(id, assign);
                let result = self.synthetic(NodeKind::LocalVariable { name }, None, expr_type);
                Ok(self.extend_with_node(result))
            }
        }
    }

    /// Builds `expr = (T)(expr ± 1)`; conversions are inserted right after their operands.
    fn increment_or_decrement(&mut self, tree: Option<TreeId>, expr: NodeId, increment: bool) -> Result<NodeId> {
        let expr_type = self.node_type(expr);
        let promoted = self.binary_promoted_type(&expr_type, &TypeRef::int())?;
        let left = self.binary_numeric_promotion(expr, &promoted);
        let one = self.synthetic(NodeKind::Literal { value: Literal::Int(1) }, None, TypeRef::int());
        self.extend_with_node(one);
        let right = self.binary_numeric_promotion(one, &promoted);
        let op = if increment { BinaryOp::Add } else { BinaryOp::Sub };
        let operation = self.synthetic(NodeKind::Binary { op, left, right }, None, promoted);
        self.extend_with_node(operation);
        let value = self.narrow_and_box(operation, &expr_type);
        self.mark_lvalue(expr);
        let assign = self.synthetic(NodeKind::Assignment { target: expr, value }, tree, expr_type);
        Ok(self.extend_with_node(assign))
    }
}
