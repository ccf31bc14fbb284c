/*! Implicit conversions as explicit nodes.
 *
 * Boxing, unboxing, widening, narrowing and string conversion never change the node that produced
 * a value. Each one becomes a separate node inserted right after the value's producer, so an
 * unboxing that may dereference null gets its own exceptional edge.
 */

use super::context::Translator;
use super::errors::{BuildError, Result};
use flowgraph_core::{MethodSig, NodeId, NodeKind, PrimitiveKind, TreeId, TypeRef, WellKnown};

impl<'a> Translator<'a> {
    /// Primitive kind of `ty`, looking through boxed classes.
    pub(super) fn unboxed_kind(&self, ty: &TypeRef) -> Option<PrimitiveKind> {
        ty.as_primitive().or_else(|| self.oracle.unboxed_type(ty))
    }

    pub(super) fn is_numeric_or_boxed(&self, ty: &TypeRef) -> bool {
        self.unboxed_kind(ty).is_some_and(PrimitiveKind::is_numeric)
    }

    pub(super) fn is_boolean_or_boxed(&self, ty: &TypeRef) -> bool {
        self.unboxed_kind(ty) == Some(PrimitiveKind::Boolean)
    }

    fn is_boxed(&self, ty: &TypeRef) -> bool {
        !ty.is_primitive() && self.oracle.unboxed_type(ty).is_some()
    }

    fn convert(&mut self, kind: NodeKind, from: NodeId, ty: TypeRef) -> NodeId {
        let tree = self.node_tree(from);
        let node = self.synthetic(kind, tree, ty);
        self.add_to_converted_lookup(tree, node);
        self.insert_node_after(node, from)
    }

    /// `Integer.valueOf(node)` for a primitive `node`; other nodes pass through.
    pub(super) fn box_value(&mut self, node: NodeId) -> NodeId {
        let Some(kind) = self.node_type(node).as_primitive() else {
            return node;
        };
        let boxed = self.oracle.boxed_type(kind);
        let tree = self.node_tree(node);
        let class_name = self.synthetic(NodeKind::ClassName, None, boxed.clone());
        self.insert_node_after(class_name, node);
        let access = self.synthetic(
            NodeKind::MethodAccess {
                receiver: class_name,
                method: "valueOf".to_string(),
            },
            None,
            boxed.clone(),
        );
        self.insert_node_after(access, class_name);
        let call = self.synthetic(
            NodeKind::MethodInvocation {
                target: access,
                args: vec![node],
            },
            tree,
            boxed,
        );
        self.add_to_converted_lookup(tree, call);
        let throwable = self.well_known(WellKnown::Throwable);
        self.insert_throwing_after(call, &[throwable], access)
    }

    /// `node.intValue()` for a boxed `node`. The access may throw on null.
    pub(super) fn unbox(&mut self, node: NodeId) -> NodeId {
        let ty = self.node_type(node);
        if ty.is_primitive() {
            return node;
        }
        let Some(kind) = self.oracle.unboxed_type(&ty) else {
            return node;
        };
        let primitive = TypeRef::primitive(kind);
        let tree = self.node_tree(node);
        let access = self.synthetic(
            NodeKind::MethodAccess {
                receiver: node,
                method: format!("{}Value", kind.name()),
            },
            None,
            primitive.clone(),
        );
        let npe = self.well_known(WellKnown::NullPointer);
        self.insert_throwing_after(access, &[npe], node);
        let call = self.synthetic(
            NodeKind::MethodInvocation {
                target: access,
                args: Vec::new(),
            },
            tree,
            primitive,
        );
        self.add_to_converted_lookup(tree, call);
        let throwable = self.well_known(WellKnown::Throwable);
        self.insert_throwing_after(call, &[throwable], access)
    }

    pub(super) fn string_conversion(&mut self, node: NodeId) -> NodeId {
        if self.node_type(node).is_string() {
            return node;
        }
        self.convert(NodeKind::StringConversion { operand: node }, node, TypeRef::string())
    }

    pub(super) fn unary_numeric_promotion(&mut self, node: NodeId) -> NodeId {
        let node = self.unbox(node);
        match self.node_type(node).as_primitive() {
            Some(PrimitiveKind::Byte | PrimitiveKind::Char | PrimitiveKind::Short) => {
                self.convert(NodeKind::WideningConversion { operand: node }, node, TypeRef::int())
            }
            _ => node,
        }
    }

    /// Type both operands of a binary numeric operator are promoted to.
    pub(super) fn binary_promoted_type(&self, left: &TypeRef, right: &TypeRef) -> Result<TypeRef> {
        match (self.unboxed_kind(left), self.unboxed_kind(right)) {
            (Some(l), Some(r)) if l.is_numeric() && r.is_numeric() => {
                Ok(TypeRef::primitive(PrimitiveKind::promote(l, r)))
            }
            _ => Err(BuildError::InvalidType(format!(
                "no numeric promotion for {} and {}",
                left.simple_name(),
                right.simple_name()
            ))),
        }
    }

    pub(super) fn binary_numeric_promotion(&mut self, node: NodeId, promoted: &TypeRef) -> NodeId {
        let node = self.unbox(node);
        if self.node_type(node) == *promoted {
            return node;
        }
        self.convert(NodeKind::WideningConversion { operand: node }, node, promoted.clone())
    }

    fn widen(&mut self, node: NodeId, dest: &TypeRef) -> NodeId {
        let ty = self.node_type(node);
        if ty != *dest && ty.is_primitive() && self.oracle.is_subtype(&ty, dest) {
            self.convert(NodeKind::WideningConversion { operand: node }, node, dest.clone())
        } else {
            node
        }
    }

    fn narrow(&mut self, node: NodeId, dest: &TypeRef) -> NodeId {
        let ty = self.node_type(node);
        if ty != *dest && dest.is_primitive() && self.oracle.is_subtype(dest, &ty) {
            self.convert(NodeKind::NarrowingConversion { operand: node }, node, dest.clone())
        } else {
            node
        }
    }

    /// Narrows to `dest`, boxing afterwards when `dest` is a boxed class.
    pub(super) fn narrow_and_box(&mut self, node: NodeId, dest: &TypeRef) -> NodeId {
        match self.oracle.unboxed_type(dest) {
            Some(kind) if self.is_boxed(dest) => {
                let narrowed = self.narrow(node, &TypeRef::primitive(kind));
                self.box_value(narrowed)
            }
            _ => self.narrow(node, dest),
        }
    }

    /// Constant narrowing is only implicit for literals assigned to byte, short or char.
    fn conversion_requires_narrowing(&self, var_type: &TypeRef, node: NodeId) -> bool {
        let narrow_target = matches!(
            self.unboxed_kind(var_type),
            Some(PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Char)
        );
        narrow_target && matches!(self.node_kind(node), Some(NodeKind::Literal { .. }))
    }

    fn common_convert(&mut self, node: NodeId, var_type: &TypeRef, allow_narrowing: bool) -> NodeId {
        let node_type = self.node_type(node);
        if self.oracle.is_same_type(&node_type, var_type) {
            return node;
        }
        let is_subtype = self.oracle.is_subtype(&node_type, var_type);

        if node_type.is_numeric() && var_type.is_numeric() && is_subtype {
            return self.widen(node, var_type);
        }
        if node_type.is_reference() && var_type.is_reference() && is_subtype {
            return node;
        }
        if node_type.is_primitive() && var_type.is_reference() {
            if allow_narrowing && self.conversion_requires_narrowing(var_type, node) {
                return self.narrow_and_box(node, var_type);
            }
            return self.box_value(node);
        }
        if self.is_boxed(&node_type) && var_type.is_primitive() {
            let unboxed = self.unbox(node);
            return self.widen(unboxed, var_type);
        }
        if node_type.is_primitive()
            && var_type.is_primitive()
            && allow_narrowing
            && self.conversion_requires_narrowing(var_type, node)
        {
            return self.narrow(node, var_type);
        }
        node
    }

    /// Assignment context: like invocation conversion, plus constant narrowing.
    pub(super) fn assign_convert(&mut self, node: NodeId, var_type: &TypeRef) -> NodeId {
        self.common_convert(node, var_type, true)
    }

    pub(super) fn method_invocation_convert(&mut self, node: NodeId, param_type: &TypeRef) -> NodeId {
        self.common_convert(node, param_type, false)
    }

    /// Translates and converts call arguments in order. A variable-arity call whose arguments
    /// do not already end in a matching array gets its trailing arguments packed into a
    /// synthetic array creation.
    pub(super) fn convert_call_arguments(
        &mut self,
        call: TreeId,
        method: &MethodSig,
        actuals: &[TreeId],
    ) -> Result<Vec<NodeId>> {
        let formals = &method.params;
        if !method.is_varargs {
            if formals.len() != actuals.len() {
                return Err(BuildError::ArityMismatch {
                    tree: call,
                    expected: formals.len(),
                    found: actuals.len(),
                });
            }
            return self.convert_fixed_arguments(formals, actuals);
        }

        let Some((last_formal, fixed_formals)) = formals.split_last() else {
            return Err(BuildError::InvalidVarargs(format!(
                "{} is variable-arity but declares no parameters",
                method.name
            )));
        };
        if actuals.len() == formals.len() {
            let last_actual = self.type_of(actuals[actuals.len() - 1])?;
            if self.oracle.is_assignable(&last_actual, last_formal) {
                return self.convert_fixed_arguments(formals, actuals);
            }
        }

        let Some(element) = last_formal.element_type().cloned() else {
            return Err(BuildError::InvalidVarargs(format!(
                "last parameter of {} is {}, not an array",
                method.name,
                last_formal.simple_name()
            )));
        };
        if actuals.len() < fixed_formals.len() {
            return Err(BuildError::ArityMismatch {
                tree: call,
                expected: fixed_formals.len(),
                found: actuals.len(),
            });
        }
        let (fixed_actuals, variadic) = actuals.split_at(fixed_formals.len());
        let mut converted = self.convert_fixed_arguments(fixed_formals, fixed_actuals)?;
        let mut initializers = Vec::with_capacity(variadic.len());
        for actual in variadic {
            let value = self.translate_expr(*actual)?;
            initializers.push(self.assign_convert(value, &element));
        }
        let array = self.synthetic(
            NodeKind::ArrayCreation {
                dimensions: Vec::new(),
                initializers,
            },
            None,
            last_formal.clone(),
        );
        converted.push(self.extend_with_node(array));
        Ok(converted)
    }

    fn convert_fixed_arguments(&mut self, formals: &[TypeRef], actuals: &[TreeId]) -> Result<Vec<NodeId>> {
        let mut converted = Vec::with_capacity(actuals.len());
        for (formal, actual) in formals.iter().zip(actuals) {
            let value = self.translate_expr(*actual)?;
            converted.push(self.method_invocation_convert(value, formal));
        }
        Ok(converted)
    }

    /// Promotes one arm of a conditional expression to the expression's type.
    pub(super) fn conditional_expr_promotion(&mut self, node: NodeId, dest: &TypeRef) -> Result<NodeId> {
        let node_type = self.node_type(node);
        if self.oracle.is_same_type(&node_type, dest) {
            return Ok(node);
        }
        if node_type.is_primitive() && self.is_boxed(dest) {
            return Ok(self.box_value(node));
        }

        let node_kind = self.unboxed_kind(&node_type);
        let dest_kind = self.unboxed_kind(dest);
        if let (Some(n), Some(d)) = (node_kind, dest_kind) {
            if n.is_numeric() && d.is_numeric() {
                let dest_primitive = dest.as_primitive();
                if n == PrimitiveKind::Byte && dest_primitive == Some(PrimitiveKind::Short) {
                    let unboxed = self.unbox(node);
                    return Ok(self.widen(unboxed, dest));
                }
                if matches!(
                    dest_primitive,
                    Some(PrimitiveKind::Byte | PrimitiveKind::Char | PrimitiveKind::Short)
                ) {
                    if self.is_boxed(&node_type) {
                        return Ok(self.unbox(node));
                    }
                    if n == PrimitiveKind::Int {
                        return Ok(self.narrow(node, dest));
                    }
                }
                let promoted = self.binary_promoted_type(&node_type, dest)?;
                return Ok(self.binary_numeric_promotion(node, &promoted));
            }
        }

        if node_type.is_primitive() && matches!(dest, TypeRef::Class { .. } | TypeRef::Union { .. }) {
            return Ok(self.box_value(node));
        }
        Ok(node)
    }
}
