use super::context::Translator;
use super::errors::{BuildError, Result};
use super::extended::Label;
use super::try_stack::{LabelScope, TryFinallyScopeCell, TryFrame};
use flowgraph_core::{
    AssertionMode, BinaryOp, Literal, NodeId, NodeKind, Tree, TreeId, TreeKind, TypeRef, WellKnown,
};
use std::mem;
use tracing::trace;

/// Break and continue targets active before a loop or switch replaced them.
struct SavedTargets {
    break_target: Option<TryFinallyScopeCell>,
    continue_target: Option<TryFinallyScopeCell>,
}

impl<'a> Translator<'a> {
    pub(super) fn translate_statement(&mut self, id: TreeId) -> Result<()> {
        let tree = self.tree(id)?;
        // Only the direct body of a labeled statement sees its label.
        let parent_label = self.enclosing_label.take();
        match &tree.kind {
            TreeKind::Block { statements } => {
                for statement in statements {
                    self.translate_statement(*statement)?;
                }
                Ok(())
            }
            TreeKind::ExpressionStatement { expr } => {
                self.translate_expr(*expr)?;
                Ok(())
            }
            TreeKind::Variable { name, init, field_of } => {
                self.translate_variable(tree, name, *init, field_of.as_ref())
            }
            TreeKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.translate_if(*cond, *then_branch, *else_branch),
            TreeKind::While { cond, body } => self.translate_while(parent_label, *cond, *body),
            TreeKind::DoWhile { body, cond } => self.translate_do_while(parent_label, *body, *cond),
            TreeKind::For {
                init,
                cond,
                update,
                body,
            } => self.translate_for(parent_label, init, *cond, update, *body),
            TreeKind::EnhancedFor {
                variable,
                iterable,
                body,
            } => self.translate_enhanced_for(parent_label, *variable, *iterable, *body),
            TreeKind::Labeled { label, body } => self.translate_labeled(label, *body),
            TreeKind::Break { label } => {
                let target = match label {
                    Some(name) => self.break_labels.get(name, &mut self.labels)?,
                    None => self
                        .break_target
                        .as_mut()
                        .ok_or_else(|| BuildError::NoJumpTarget(format!("break at {}", id)))?
                        .access_label(&mut self.labels),
                };
                self.extend_with_goto(target);
                Ok(())
            }
            TreeKind::Continue { label } => {
                let target = match label {
                    Some(name) => self.continue_labels.get(name, &mut self.labels)?,
                    None => self
                        .continue_target
                        .as_mut()
                        .ok_or_else(|| BuildError::NoJumpTarget(format!("continue at {}", id)))?
                        .access_label(&mut self.labels),
                };
                self.extend_with_goto(target);
                Ok(())
            }
            TreeKind::Return { expr } => {
                if let Some(expr) = expr {
                    let result = self.translate_expr(*expr)?;
                    let ty = self.node_type(result);
                    let node = self.alloc(NodeKind::Return { result }, Some(id), ty);
                    self.lookups.return_nodes.push(node);
                    self.extend_with_node(node);
                }
                let target = self.return_target.access_label(&mut self.labels);
                self.extend_with_goto(target);
                Ok(())
            }
            TreeKind::Throw { expr } => {
                let exception = self.translate_expr(*expr)?;
                let thrown = self.node_type(exception);
                let node = self.alloc(NodeKind::Throw { exception }, Some(id), thrown.clone());
                self.extend_with_terminating(node, &[thrown]);
                Ok(())
            }
            TreeKind::Try {
                resources,
                body,
                catches,
                finally,
            } => self.translate_try(id, resources, *body, catches, *finally),
            TreeKind::Switch { selector, cases } => self.translate_switch(id, *selector, cases),
            TreeKind::Synchronized { lock, body } => {
                let lock = self.translate_expr(*lock)?;
                let start = self.alloc(NodeKind::SynchronizedStart { lock }, Some(id), TypeRef::Void);
                self.extend_with_node(start);
                self.translate_statement(*body)?;
                let end = self.alloc(NodeKind::SynchronizedEnd { lock }, Some(id), TypeRef::Void);
                self.extend_with_node(end);
                Ok(())
            }
            TreeKind::Assert { cond, detail } => self.translate_assert(id, *cond, *detail),
            TreeKind::Empty => Ok(()),
            TreeKind::ClassDecl { .. } => {
                self.translate_class_declaration(tree)?;
                Ok(())
            }
            TreeKind::Case { .. } => Err(self.unexpected(tree, "outside a switch")),
            TreeKind::Catch { .. } => Err(self.unexpected(tree, "outside a try")),
            TreeKind::Erroneous => Err(self.unexpected(tree, "in the input")),
            _ => Err(self.unexpected(tree, "in statement position")),
        }
    }

    fn marker(&mut self, tree: TreeId, message: String) -> NodeId {
        let node = self.synthetic(NodeKind::Marker { message }, Some(tree), TypeRef::Void);
        self.extend_with_node(node)
    }

    fn install_loop_targets(&mut self, break_label: Label, continue_label: Label) -> SavedTargets {
        SavedTargets {
            break_target: self
                .break_target
                .replace(TryFinallyScopeCell::with_label(break_label)),
            continue_target: self
                .continue_target
                .replace(TryFinallyScopeCell::with_label(continue_label)),
        }
    }

    fn restore_targets(&mut self, saved: SavedTargets) {
        self.break_target = saved.break_target;
        self.continue_target = saved.continue_target;
    }

    /// A labeled loop continues at the label's continue target.
    fn loop_continue_label(&mut self, parent_label: Option<String>) -> Result<Label> {
        match parent_label {
            Some(name) => self.continue_labels.get(&name, &mut self.labels),
            None => Ok(self.fresh_label()),
        }
    }

    fn translate_condition(&mut self, cond: TreeId) -> Result<NodeId> {
        let node = self.translate_expr(cond)?;
        Ok(self.unbox(node))
    }

    fn translate_variable(
        &mut self,
        tree: &Tree,
        name: &str,
        init: Option<TreeId>,
        field_of: Option<&TypeRef>,
    ) -> Result<()> {
        let id = tree.id;
        let ty = tree.ty.clone();
        if let Some(owner) = field_of {
            // A field initializer assigns through the implicit receiver.
            let Some(init) = init else {
                return Ok(());
            };
            let receiver = self.synthetic(NodeKind::This { implicit: true }, None, owner.clone());
            let target = self.alloc(
                NodeKind::FieldAccess {
                    receiver,
                    field: name.to_string(),
                    is_static: false,
                },
                Some(id),
                ty,
            );
            let value = self.translate_expr(init)?;
            self.translate_assignment(Some(id), target, value);
            return Ok(());
        }

        let decl = self.alloc(NodeKind::VariableDeclaration { name: name.to_string() }, Some(id), ty.clone());
        self.extend_with_node(decl);
        if let Some(init) = init {
            let target = self.alloc(NodeKind::LocalVariable { name: name.to_string() }, Some(id), ty);
            let value = self.translate_expr(init)?;
            self.translate_assignment(Some(id), target, value);
        }
        Ok(())
    }

    fn translate_if(&mut self, cond: TreeId, then_branch: TreeId, else_branch: Option<TreeId>) -> Result<()> {
        let then_entry = self.fresh_label();
        let else_entry = self.fresh_label();
        let end = self.fresh_label();

        self.translate_condition(cond)?;
        self.extend_with_branch(then_entry, else_entry);

        self.bind_label(then_entry)?;
        self.translate_statement(then_branch)?;
        self.extend_with_goto(end);

        self.bind_label(else_entry)?;
        if let Some(else_branch) = else_branch {
            self.translate_statement(else_branch)?;
        }
        self.bind_label(end)
    }

    fn is_constant_true(&self, cond: TreeId) -> Result<bool> {
        let mut current = self.tree(cond)?;
        while let TreeKind::Parenthesized { expr } = &current.kind {
            current = self.tree(*expr)?;
        }
        Ok(matches!(
            current.kind,
            TreeKind::Literal {
                literal: Literal::Boolean(true)
            }
        ))
    }

    fn translate_while(&mut self, parent_label: Option<String>, cond: TreeId, body: TreeId) -> Result<()> {
        let loop_entry = self.fresh_label();
        let loop_exit = self.fresh_label();
        let condition_start = self.loop_continue_label(parent_label)?;
        let saved = self.install_loop_targets(loop_exit, condition_start);

        self.bind_label(condition_start)?;
        let constant_true = self.is_constant_true(cond)?;
        self.translate_condition(cond)?;
        if !constant_true {
            self.extend_with_branch(loop_entry, loop_exit);
        }

        self.bind_label(loop_entry)?;
        self.translate_statement(body)?;
        self.extend_with_goto(if constant_true { loop_entry } else { condition_start });

        self.bind_label(loop_exit)?;
        self.restore_targets(saved);
        Ok(())
    }

    fn translate_do_while(&mut self, parent_label: Option<String>, body: TreeId, cond: TreeId) -> Result<()> {
        let loop_entry = self.fresh_label();
        let loop_exit = self.fresh_label();
        let condition_start = self.loop_continue_label(parent_label)?;
        let saved = self.install_loop_targets(loop_exit, condition_start);

        self.bind_label(loop_entry)?;
        self.translate_statement(body)?;

        self.bind_label(condition_start)?;
        self.translate_condition(cond)?;
        self.extend_with_branch(loop_entry, loop_exit);

        self.bind_label(loop_exit)?;
        self.restore_targets(saved);
        Ok(())
    }

    fn translate_for(
        &mut self,
        parent_label: Option<String>,
        init: &[TreeId],
        cond: Option<TreeId>,
        update: &[TreeId],
        body: TreeId,
    ) -> Result<()> {
        let condition_start = self.fresh_label();
        let loop_entry = self.fresh_label();
        let loop_exit = self.fresh_label();
        let update_start = self.loop_continue_label(parent_label)?;
        let saved = self.install_loop_targets(loop_exit, update_start);

        for statement in init {
            self.translate_statement(*statement)?;
        }

        self.bind_label(condition_start)?;
        if let Some(cond) = cond {
            self.translate_condition(cond)?;
            self.extend_with_branch(loop_entry, loop_exit);
        }

        self.bind_label(loop_entry)?;
        self.translate_statement(body)?;

        self.bind_label(update_start)?;
        for statement in update {
            self.translate_statement(*statement)?;
        }
        self.extend_with_goto(condition_start);

        self.bind_label(loop_exit)?;
        self.restore_targets(saved);
        Ok(())
    }

    fn synthetic_local(&mut self, name: &str, ty: &TypeRef) -> NodeId {
        let node = self.synthetic(NodeKind::LocalVariable { name: name.to_string() }, None, ty.clone());
        self.extend_with_node(node)
    }

    fn synthetic_declaration(&mut self, name: &str, ty: &TypeRef) {
        let node = self.synthetic(NodeKind::VariableDeclaration { name: name.to_string() }, None, ty.clone());
        self.extend_with_node(node);
    }

    /// Call of a no-argument method on `receiver`, e.g. `iter.hasNext()`.
    fn synthetic_call(&mut self, receiver: NodeId, method: &str, ty: TypeRef) -> NodeId {
        let access = self.synthetic(
            NodeKind::MethodAccess {
                receiver,
                method: method.to_string(),
            },
            None,
            ty.clone(),
        );
        self.extend_with_node(access);
        let call = self.synthetic(
            NodeKind::MethodInvocation {
                target: access,
                args: Vec::new(),
            },
            None,
            ty,
        );
        self.extend_with_node(call)
    }

    fn translate_enhanced_for(
        &mut self,
        parent_label: Option<String>,
        variable: TreeId,
        iterable: TreeId,
        body: TreeId,
    ) -> Result<()> {
        let variable_tree = self.tree(variable)?;
        let TreeKind::Variable { name: variable_name, .. } = &variable_tree.kind else {
            return Err(self.unexpected(variable_tree, "as an enhanced-for variable"));
        };
        let variable_type = variable_tree.ty.clone();
        let iterable_type = self.type_of(iterable)?;

        let condition_start = self.fresh_label();
        let loop_entry = self.fresh_label();
        let loop_exit = self.fresh_label();
        let update_start = self.loop_continue_label(parent_label)?;
        let saved = self.install_loop_targets(loop_exit, update_start);

        let iterable_class = self.well_known(WellKnown::Iterable);
        let counter = if self.oracle.is_subtype(iterable_type.resolve_bound(), &iterable_class) {
            let element_type = match iterable_type.resolve_bound() {
                TypeRef::Class { args, .. } if args.len() == 1 => args[0].clone(),
                _ => self.well_known(WellKnown::Object),
            };
            let iterator_type = match self.well_known(WellKnown::Iterator) {
                TypeRef::Class { name, .. } => TypeRef::generic(name, vec![element_type.clone()]),
                other => other,
            };

            let iterator = self.unique_name("iter");
            self.synthetic_declaration(&iterator, &iterator_type);
            let collection = self.translate_expr(iterable)?;
            let init = self.synthetic_call(collection, "iterator", iterator_type.clone());
            let target = self.synthetic(NodeKind::LocalVariable { name: iterator.clone() }, None, iterator_type.clone());
            self.translate_assignment(None, target, init);

            self.bind_label(condition_start)?;
            let receiver = self.synthetic_local(&iterator, &iterator_type);
            self.synthetic_call(receiver, "hasNext", TypeRef::boolean());
            self.extend_with_branch(loop_entry, loop_exit);

            self.bind_label(loop_entry)?;
            let decl = self.alloc(
                NodeKind::VariableDeclaration {
                    name: variable_name.clone(),
                },
                Some(variable),
                variable_type.clone(),
            );
            self.extend_with_node(decl);
            let receiver = self.synthetic_local(&iterator, &iterator_type);
            let next = self.synthetic_call(receiver, "next", element_type);
            let target = self.alloc(
                NodeKind::LocalVariable {
                    name: variable_name.clone(),
                },
                Some(variable),
                variable_type,
            );
            self.translate_assignment(Some(variable), target, next);
            None
        } else {
            let element_type = iterable_type.element_type().cloned().ok_or_else(|| {
                BuildError::InvalidType(format!(
                    "enhanced for over {} which is neither iterable nor an array",
                    iterable_type.simple_name()
                ))
            })?;

            let array = self.unique_name("array");
            self.synthetic_declaration(&array, &iterable_type);
            let value = self.translate_expr(iterable)?;
            let target = self.synthetic(NodeKind::LocalVariable { name: array.clone() }, None, iterable_type.clone());
            self.translate_assignment(None, target, value);

            let index = self.unique_name("index");
            let int = TypeRef::int();
            self.synthetic_declaration(&index, &int);
            let zero = self.synthetic(NodeKind::Literal { value: Literal::Int(0) }, None, int.clone());
            self.extend_with_node(zero);
            let target = self.synthetic(NodeKind::LocalVariable { name: index.clone() }, None, int.clone());
            self.translate_assignment(None, target, zero);

            self.bind_label(condition_start)?;
            let left = self.synthetic_local(&index, &int);
            let receiver = self.synthetic_local(&array, &iterable_type);
            let length = self.synthetic(
                NodeKind::FieldAccess {
                    receiver,
                    field: "length".to_string(),
                    is_static: false,
                },
                None,
                int.clone(),
            );
            self.extend_with_node(length);
            let test = self.synthetic(
                NodeKind::Binary {
                    op: BinaryOp::Lt,
                    left,
                    right: length,
                },
                None,
                TypeRef::boolean(),
            );
            self.extend_with_node(test);
            self.extend_with_branch(loop_entry, loop_exit);

            self.bind_label(loop_entry)?;
            let decl = self.alloc(
                NodeKind::VariableDeclaration {
                    name: variable_name.clone(),
                },
                Some(variable),
                variable_type.clone(),
            );
            self.extend_with_node(decl);
            let array_node = self.synthetic_local(&array, &iterable_type);
            let index_node = self.synthetic_local(&index, &int);
            let access = self.synthetic(
                NodeKind::ArrayAccess {
                    array: array_node,
                    index: index_node,
                },
                None,
                element_type,
            );
            let causes = [
                self.well_known(WellKnown::NullPointer),
                self.well_known(WellKnown::ArrayIndexOutOfBounds),
            ];
            self.extend_with_exceptions(access, &causes);
            let target = self.alloc(
                NodeKind::LocalVariable {
                    name: variable_name.clone(),
                },
                Some(variable),
                variable_type,
            );
            self.translate_assignment(Some(variable), target, access);
            Some(index)
        };

        self.translate_statement(body)?;
        self.bind_label(update_start)?;
        if let Some(index) = counter {
            let int = TypeRef::int();
            let current = self.synthetic_local(&index, &int);
            let one = self.synthetic(NodeKind::Literal { value: Literal::Int(1) }, None, int.clone());
            self.extend_with_node(one);
            let sum = self.synthetic(
                NodeKind::Binary {
                    op: BinaryOp::Add,
                    left: current,
                    right: one,
                },
                None,
                int,
            );
            self.extend_with_node(sum);
            self.translate_assignment(None, current, sum);
        }
        self.extend_with_goto(condition_start);

        self.bind_label(loop_exit)?;
        self.restore_targets(saved);
        Ok(())
    }

    fn translate_labeled(&mut self, name: &str, body: TreeId) -> Result<()> {
        let break_label = self.fresh_label();
        let continue_label = self.fresh_label();
        self.break_labels.bind(name, break_label);
        self.continue_labels.bind(name, continue_label);

        self.enclosing_label = Some(name.to_string());
        self.translate_statement(body)?;
        self.enclosing_label = None;

        self.bind_label(break_label)?;
        self.break_labels.unbind(name);
        self.continue_labels.unbind(name);
        Ok(())
    }

    /// Evaluates the selector once into a temporary, then tests each case in order. The
    /// default case is tested last but its body keeps its source position for fall-through.
    fn translate_switch(&mut self, id: TreeId, selector: TreeId, cases: &[TreeId]) -> Result<()> {
        let break_label = self.fresh_label();
        let saved_break = self
            .break_target
            .replace(TryFinallyScopeCell::with_label(break_label));

        let mut body_labels: Vec<Label> = cases.iter().map(|_| self.labels.fresh()).collect();
        body_labels.push(break_label);

        let selector_type = self.type_of(selector)?;
        let name = self.unique_name("switch");
        self.synthetic_declaration(&name, &selector_type);
        let variable = self.synthetic_local(&name, &selector_type);
        self.mark_lvalue(variable);
        let value = self.translate_expr(selector)?;
        let value = self.unbox(value);
        let assign = self.synthetic(NodeKind::Assignment { target: variable, value }, None, selector_type);
        self.extend_with_node(assign);
        self.marker(id, format!("start of switch statement #{}", id.0));

        let mut default = None;
        for (index, case) in cases.iter().enumerate() {
            let case_tree = self.tree(*case)?;
            match &case_tree.kind {
                TreeKind::Case { expr: None, .. } => default = Some(index),
                TreeKind::Case { .. } => self.translate_case(assign, case_tree, &body_labels, index)?,
                _ => return Err(self.unexpected(case_tree, "as a switch case")),
            }
        }
        if let Some(index) = default {
            let case_tree = self.tree(cases[index])?;
            self.translate_case(assign, case_tree, &body_labels, index)?;
        }

        self.bind_label(break_label)?;
        self.break_target = saved_break;
        self.marker(id, format!("end of switch statement #{}", id.0));
        Ok(())
    }

    fn translate_case(&mut self, selector: NodeId, case: &Tree, body_labels: &[Label], index: usize) -> Result<()> {
        let TreeKind::Case { expr, statements } = &case.kind else {
            return Err(self.unexpected(case, "as a switch case"));
        };
        let this_body = body_labels[index];
        let next_body = body_labels[index + 1];
        let next_case = self.fresh_label();

        if let Some(expr) = expr {
            let guard = self.translate_expr(*expr)?;
            let test = self.alloc(NodeKind::Case { selector, guard }, Some(case.id), TypeRef::boolean());
            self.extend_with_node(test);
            self.extend_with_branch(this_body, next_case);
        }

        self.bind_label(this_body)?;
        for statement in statements {
            self.translate_statement(*statement)?;
        }
        self.extend_with_goto(next_body);
        self.bind_label(next_case)
    }

    fn translate_assert(&mut self, id: TreeId, cond: TreeId, detail: Option<TreeId>) -> Result<()> {
        match self.config.assertions {
            AssertionMode::Disabled => Ok(()),
            AssertionMode::Enabled => self.translate_assert_enabled(id, cond, detail),
            AssertionMode::Runtime => {
                let name = match &self.assertions_variable {
                    Some(name) => name.clone(),
                    None => {
                        let name = self.unique_name("assertionsEnabled");
                        self.assertions_variable = Some(name.clone());
                        name
                    }
                };
                self.synthetic_local(&name, &TypeRef::boolean());
                let assertions_on = self.fresh_label();
                let assertions_off = self.fresh_label();
                self.extend_with_branch(assertions_on, assertions_off);
                self.bind_label(assertions_on)?;
                self.translate_assert_enabled(id, cond, detail)?;
                self.bind_label(assertions_off)
            }
        }
    }

    fn translate_assert_enabled(&mut self, id: TreeId, cond: TreeId, detail: Option<TreeId>) -> Result<()> {
        let assert_end = self.fresh_label();
        let else_entry = self.fresh_label();

        let condition = self.translate_condition(cond)?;
        self.extend_with_branch(assert_end, else_entry);

        self.bind_label(else_entry)?;
        let detail = detail.map(|d| self.translate_expr(d)).transpose()?;
        let error_type = self.well_known(WellKnown::AssertionError);
        let error = self.alloc(NodeKind::AssertionError { condition, detail }, Some(id), error_type.clone());
        self.extend_with_node(error);
        let throw = self.synthetic(NodeKind::Throw { exception: error }, None, error_type.clone());
        self.extend_with_terminating(throw, &[error_type]);

        self.bind_label(assert_end)
    }

    fn translate_try(
        &mut self,
        id: TreeId,
        resources: &[TreeId],
        body: TreeId,
        catches: &[TreeId],
        finally: Option<TreeId>,
    ) -> Result<()> {
        self.marker(id, format!("start of try statement #{}", id.0));

        let mut clauses = Vec::with_capacity(catches.len());
        for catch in catches {
            let catch_tree = self.tree(*catch)?;
            let TreeKind::Catch { param, .. } = &catch_tree.kind else {
                return Err(self.unexpected(catch_tree, "as a catch clause"));
            };
            clauses.push((self.type_of(*param)?, self.labels.fresh()));
        }

        let done = self.fresh_label();
        let finally_labels = match finally {
            Some(_) => {
                let finally_entry = self.fresh_label();
                let exceptional_finally = self.fresh_label();
                self.try_stack.push_frame(TryFrame::Finally {
                    label: exceptional_finally,
                });
                Some((finally_entry, exceptional_finally))
            }
            None => None,
        };
        let after_region = finally_labels.map(|(entry, _)| entry).unwrap_or(done);

        // Early exits from the protected region detour through fresh cells so each one that
        // is used gets its own copy of the finally body.
        let saved = finally_labels.map(|_| SavedExits {
            return_target: mem::take(&mut self.return_target),
            break_target: mem::replace(&mut self.break_target, Some(TryFinallyScopeCell::new())),
            continue_target: mem::replace(&mut self.continue_target, Some(TryFinallyScopeCell::new())),
            break_labels: mem::replace(&mut self.break_labels, LabelScope::try_finally()),
            continue_labels: mem::replace(&mut self.continue_labels, LabelScope::try_finally()),
        });

        self.try_stack.push_frame(TryFrame::Catch {
            clauses: clauses.clone(),
        });
        for resource in resources {
            if self.tree(*resource)?.kind.is_statement() {
                self.translate_statement(*resource)?;
            } else {
                self.translate_expr(*resource)?;
            }
        }
        self.marker(id, format!("start of try block #{}", id.0));
        self.translate_statement(body)?;
        self.marker(id, format!("end of try block #{}", id.0));
        self.extend_with_goto(after_region);
        self.try_stack.pop_frame();

        for (catch, (caught, label)) in catches.iter().zip(&clauses) {
            let catch_tree = self.tree(*catch)?;
            let TreeKind::Catch { param, body } = &catch_tree.kind else {
                return Err(self.unexpected(catch_tree, "as a catch clause"));
            };
            self.bind_label(*label)?;
            self.marker(id, format!("start of catch block for {} #{}", caught.simple_name(), id.0));
            self.translate_statement(*param)?;
            self.translate_statement(*body)?;
            self.marker(id, format!("end of catch block for {} #{}", caught.simple_name(), id.0));
            self.extend_with_goto(after_region);
        }

        if let (Some(finally), Some((finally_entry, exceptional_finally)), Some(saved)) =
            (finally, finally_labels, saved)
        {
            self.try_stack.pop_frame();

            self.bind_label(finally_entry)?;
            self.marker(id, format!("start of finally block #{}", id.0));
            self.translate_statement(finally)?;
            self.marker(id, format!("end of finally block #{}", id.0));
            self.extend_with_goto(done);

            if self.is_exception_target(exceptional_finally) {
                trace!(try_tree = %id, "replicating finally for the exceptional path");
                self.bind_label(exceptional_finally)?;
                self.marker(id, format!("start of finally block for Throwable #{}", id.0));
                self.translate_statement(finally)?;
                let end = self.synthetic(
                    NodeKind::Marker {
                        message: format!("end of finally block for Throwable #{}", id.0),
                    },
                    Some(id),
                    TypeRef::Void,
                );
                let throwable = self.well_known(WellKnown::Throwable);
                self.extend_with_terminating(end, &[throwable]);
            }

            self.replay_finally_exits(id, finally, saved)?;
        }

        self.bind_label(done)
    }

    /// Restores the outer jump targets and emits one copy of the finally body for every kind
    /// of early exit the protected region used, each continuing to the real target.
    fn replay_finally_exits(&mut self, id: TreeId, finally: TreeId, saved: SavedExits) -> Result<()> {
        let return_cell = mem::replace(&mut self.return_target, saved.return_target);
        let break_cell = mem::replace(&mut self.break_target, saved.break_target);
        let continue_cell = mem::replace(&mut self.continue_target, saved.continue_target);
        let break_scope = mem::replace(&mut self.break_labels, saved.break_labels);
        let continue_scope = mem::replace(&mut self.continue_labels, saved.continue_labels);

        if let Some(label) = accessed_label(Some(&return_cell)) {
            let target = self.return_target.access_label(&mut self.labels);
            self.replicate_finally(id, finally, label, "return", target)?;
        }

        if let Some(label) = accessed_label(break_cell.as_ref()) {
            let target = self
                .break_target
                .as_mut()
                .ok_or_else(|| BuildError::NoJumpTarget(format!("break through finally of {}", id)))?
                .access_label(&mut self.labels);
            self.replicate_finally(id, finally, label, "break", target)?;
        }

        if let Some(label) = accessed_label(continue_cell.as_ref()) {
            let target = self
                .continue_target
                .as_mut()
                .ok_or_else(|| BuildError::NoJumpTarget(format!("continue through finally of {}", id)))?
                .access_label(&mut self.labels);
            self.replicate_finally(id, finally, label, "continue", target)?;
        }

        for (name, label) in break_scope.accessed_names() {
            let target = self.break_labels.get(&name, &mut self.labels)?;
            self.replicate_finally(id, finally, label, &format!("break label {}", name), target)?;
        }
        for (name, label) in continue_scope.accessed_names() {
            let target = self.continue_labels.get(&name, &mut self.labels)?;
            self.replicate_finally(id, finally, label, &format!("continue label {}", name), target)?;
        }
        Ok(())
    }

    fn replicate_finally(&mut self, id: TreeId, finally: TreeId, entry: Label, exit: &str, target: Label) -> Result<()> {
        trace!(try_tree = %id, exit, "replicating finally for early exit");
        self.bind_label(entry)?;
        self.marker(id, format!("start of finally block for {} #{}", exit, id.0));
        self.translate_statement(finally)?;
        self.marker(id, format!("end of finally block for {} #{}", exit, id.0));
        self.extend_with_goto(target);
        Ok(())
    }
}

/// Jump targets in effect outside a try with a finally.
struct SavedExits {
    return_target: TryFinallyScopeCell,
    break_target: Option<TryFinallyScopeCell>,
    continue_target: Option<TryFinallyScopeCell>,
    break_labels: LabelScope,
    continue_labels: LabelScope,
}

fn accessed_label(cell: Option<&TryFinallyScopeCell>) -> Option<Label> {
    cell.filter(|c| c.was_accessed()).and_then(TryFinallyScopeCell::peek_label)
}
