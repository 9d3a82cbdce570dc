//! Bidirectional type inference.
//!
//! Runs in phases over the whole unit:
//!
//! 1. link every call to its callee's function type (caller
//!    registration),
//! 2. push programmer-supplied types down into initializers,
//!    collapsing weak literal types they touch,
//! 3. infer declaration types from initializers,
//! 4. resolve still-weak declarations from the expressions that use
//!    them,
//! 5. infer declaration types from assignments in the enclosing body,
//! 6. infer parameter types (annotation, body assignments, body
//!    expressions, registered callers -- defaulting to `any`),
//! 7. per-node finishing: expression typing by merge, return-type
//!    computation, weak-literal resolution against enclosing context,
//!    and rewriting `null`-bearing unions into nullable types.
//!
//! Weak types never survive this pass except as `any`.

use lil_core::{
    Diagnostic, Document, FlowControlCallKind, FnArg, FunctionCallKind, NodeId, NodeKind,
    SelectorKind, Ty, TyKind,
};

use crate::helpers::{class_field_named, class_method_named, fn_arg_name, fn_arg_ty};
use crate::visitor::Pass;

#[derive(Default)]
pub struct TypeGuesser {
    errors: Vec<Diagnostic>,
}

impl TypeGuesser {
    pub fn new() -> TypeGuesser {
        TypeGuesser::default()
    }

    fn error(&mut self, doc: &Document, node: NodeId, message: impl Into<String>) {
        let loc = doc.tree.node(node).loc.clone();
        self.errors.push(Diagnostic::new(message, &loc));
    }

    // -----------------------------------------------------------------
    // Phase 1: caller registration
    // -----------------------------------------------------------------

    fn connect_calls_with_decls(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            let (kind, name) = match doc.tree.kind(node) {
                NodeKind::FunctionCall { kind, name, .. } => (*kind, name.clone()),
                _ => continue,
            };
            let target = match kind {
                FunctionCallKind::None => doc
                    .tree
                    .parent(node)
                    .and_then(|p| doc.find_node_for_name(&name, p)),
                FunctionCallKind::ValuePath => {
                    let vp = doc.tree.parent(node);
                    vp.and_then(|vp| self.value_path_method_decl(doc, vp, &name))
                }
                _ => None,
            };
            let Some(target) = target else {
                continue;
            };
            let already = doc
                .tree
                .ty(target)
                .map(|ty| ty.callers().contains(&node))
                .unwrap_or(true);
            if already {
                continue;
            }
            if let Some(ty) = doc.tree.node_mut(target).ty.as_mut() {
                if ty.is_function() {
                    ty.add_caller(node);
                }
            }
        }
    }

    /// The method declaration a value-path call resolves to.
    fn value_path_method_decl(&self, doc: &Document, vp: NodeId, name: &str) -> Option<NodeId> {
        let class = self.value_path_class(doc, vp)?;
        class_method_named(doc, class, name)
    }

    /// The class the subject of a value path belongs to.
    fn value_path_class(&self, doc: &Document, vp: NodeId) -> Option<NodeId> {
        let segments = doc.tree.children(vp);
        let first = *segments.first()?;
        match doc.tree.kind(first) {
            NodeKind::VarName { name } => {
                let decl = doc.find_node_for_name(&name.clone(), vp)?;
                let ty = doc.tree.ty(decl)?;
                if ty.is_object() {
                    doc.find_class(&ty.name)
                } else {
                    None
                }
            }
            NodeKind::Selector {
                kind: SelectorKind::SelfSelector | SelectorKind::ThisSelector,
                ..
            } => doc.tree.enclosing_class(vp),
            _ => None,
        }
    }

    // -----------------------------------------------------------------
    // Phase 2: strong type propagation
    // -----------------------------------------------------------------

    fn propagate_strong_types(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if !matches!(doc.tree.kind(node), NodeKind::VarDecl { .. }) {
                continue;
            }
            let Some(ty) = doc.tree.ty(node).cloned() else {
                continue;
            };
            if ty.is_function() {
                continue;
            }
            let inits: Vec<NodeId> = match doc.tree.kind(node) {
                NodeKind::VarDecl { init_vals, .. } => init_vals.clone(),
                _ => continue,
            };
            for init in inits {
                self.propagate_strong_type(doc, init, &ty);
            }
        }
    }

    fn propagate_strong_type(&mut self, doc: &mut Document, node: NodeId, ty: &Ty) {
        match doc.tree.kind(node).clone() {
            NodeKind::NumberLiteral { .. } => {
                match doc.tree.ty(node) {
                    None => doc.tree.set_ty(node, Some(ty.clone())),
                    Some(num_ty) if num_ty.is_weak() => {
                        if let Some(merged) = Ty::merge(Some(num_ty), Some(ty)) {
                            doc.tree.set_ty(node, Some(merged));
                        }
                    }
                    Some(_) => {}
                }
            }
            NodeKind::Expression { lhs, rhs, .. } => {
                doc.tree.set_ty(node, Some(ty.clone()));
                if let Some(lhs) = lhs {
                    self.propagate_strong_type(doc, lhs, ty);
                }
                if let Some(rhs) = rhs {
                    self.propagate_strong_type(doc, rhs, ty);
                }
            }
            _ => {}
        }
    }

    // -----------------------------------------------------------------
    // Phase 3: declaration types from initializers
    // -----------------------------------------------------------------

    fn types_from_init_vals(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if !matches!(doc.tree.kind(node), NodeKind::VarDecl { .. }) {
                continue;
            }
            if doc.tree.ty(node).is_some() {
                continue;
            }
            let Some(init) = crate::helpers::var_decl_first_init(doc, node) else {
                continue;
            };
            if let Some(ty) = self.node_ty(doc, init) {
                doc.tree.set_ty(node, Some(ty));
            }
        }
    }

    // -----------------------------------------------------------------
    // Phase 4: weak declarations resolved from their uses
    // -----------------------------------------------------------------

    fn resolve_weak_var_decls(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            let name = match doc.tree.kind(node) {
                NodeKind::VarDecl { name, .. } => name.clone(),
                _ => continue,
            };
            let Some(ty) = doc.tree.ty(node) else {
                continue;
            };
            if !ty.is_weak() {
                continue;
            }
            let ty = ty.clone();
            let Some(fd) = doc.tree.enclosing_function(node) else {
                continue;
            };
            let body: Vec<NodeId> = match doc.tree.kind(fd) {
                NodeKind::FunctionDecl { body, .. } => body.clone(),
                _ => continue,
            };
            let Some(usage_ty) = self.type_from_expressions(doc, &body, &name) else {
                continue;
            };
            if let Some(merged) = Ty::merge(Some(&ty), Some(&usage_ty)) {
                if !merged.is_weak() {
                    doc.tree.set_ty(node, Some(merged.clone()));
                    let inits: Vec<NodeId> = match doc.tree.kind(node) {
                        NodeKind::VarDecl { init_vals, .. } => init_vals.clone(),
                        _ => Vec::new(),
                    };
                    for init in inits {
                        self.propagate_strong_type(doc, init, &merged);
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------
    // Phase 5: declaration types from assignments
    // -----------------------------------------------------------------

    fn types_from_assignments(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            let (name, has_inits) = match doc.tree.kind(node) {
                NodeKind::VarDecl {
                    name, init_vals, ..
                } => (name.clone(), !init_vals.is_empty()),
                _ => continue,
            };
            if has_inits || doc.tree.ty(node).is_some() {
                continue;
            }
            let Some(fd) = doc.tree.enclosing_function(node) else {
                continue;
            };
            let body: Vec<NodeId> = match doc.tree.kind(fd) {
                NodeKind::FunctionDecl { body, .. } => body.clone(),
                _ => continue,
            };
            if let Some(ty) = self.type_from_body_assignments(doc, &body, &name) {
                doc.tree.set_ty(node, Some(ty));
            }
        }
    }

    // -----------------------------------------------------------------
    // Phase 6: parameter types
    // -----------------------------------------------------------------

    fn types_for_arguments(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if !matches!(doc.tree.kind(node), NodeKind::FunctionDecl { .. }) {
                continue;
            }
            let Some(fn_ty) = doc.tree.ty(node).cloned() else {
                continue;
            };
            if !fn_ty.is_function() {
                self.error(doc, node, "function declaration carries a non-function type");
                continue;
            }
            for (idx, arg) in fn_ty.fn_args().iter().enumerate() {
                let FnArg::Decl(vd) = arg else {
                    continue;
                };
                if doc.tree.ty(*vd).is_some() {
                    continue;
                }
                let ty = self.type_for_arg(doc, *vd, node, idx);
                doc.tree.set_ty(*vd, Some(ty));
            }
        }
    }

    fn type_for_arg(&mut self, doc: &Document, vd: NodeId, fd: NodeId, idx: usize) -> Ty {
        let name = match doc.tree.kind(vd) {
            NodeKind::VarDecl { name, .. } => name.clone(),
            _ => return Ty::make("any"),
        };
        let body: Vec<NodeId> = match doc.tree.kind(fd) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => Vec::new(),
        };
        if let Some(ty) = self.type_from_body_assignments(doc, &body, &name) {
            return ty;
        }
        if let Some(ty) = self.type_from_function_calls(doc, &body, &name) {
            return ty;
        }
        if let Some(ty) = self.type_from_expressions(doc, &body, &name) {
            return ty;
        }
        // Callers register on the declaration the call resolves to,
        // which for a named function is the wrapping VarDecl.
        let mut callers: Vec<NodeId> = doc
            .tree
            .ty(fd)
            .map(|ty| ty.callers().to_vec())
            .unwrap_or_default();
        if let Some(wrapper) = doc.tree.parent(fd) {
            if matches!(doc.tree.kind(wrapper), NodeKind::VarDecl { .. }) {
                if let Some(ty) = doc.tree.ty(wrapper) {
                    callers.extend(ty.callers());
                }
            }
        }
        if let Some(ty) = self.type_from_callers(doc, &callers, &name, idx) {
            return ty;
        }
        Ty::make("any")
    }

    /// First assignment in the body whose subject names `name` and
    /// whose value has a known type.
    fn type_from_body_assignments(
        &mut self,
        doc: &Document,
        body: &[NodeId],
        name: &str,
    ) -> Option<Ty> {
        for node in body {
            match doc.tree.kind(*node) {
                NodeKind::Assignment {
                    subject: Some(subject),
                    value: Some(value),
                } => {
                    if self.subject_names(doc, *subject, name) {
                        if let Some(ty) = self.node_ty(doc, *value) {
                            return Some(ty);
                        }
                    }
                }
                NodeKind::FlowControl { then, els, .. } => {
                    let nested: Vec<NodeId> =
                        then.iter().chain(els.iter()).copied().collect();
                    if let Some(ty) = self.type_from_body_assignments(doc, &nested, name) {
                        return Some(ty);
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn subject_names(&self, doc: &Document, subject: NodeId, name: &str) -> bool {
        match doc.tree.kind(subject) {
            NodeKind::VarName { name: n } => n == name,
            NodeKind::ValuePath { .. } => {
                let first = doc.tree.children(subject).first().copied();
                first.is_some_and(|f| {
                    matches!(doc.tree.kind(f), NodeKind::VarName { name: n } if n == name)
                })
            }
            _ => false,
        }
    }

    /// Calls inside the body that pass `name` along: the parameter
    /// takes the type of the matching callee parameter.
    fn type_from_function_calls(
        &mut self,
        doc: &Document,
        body: &[NodeId],
        name: &str,
    ) -> Option<Ty> {
        for node in body {
            if let NodeKind::FunctionCall {
                kind: FunctionCallKind::None,
                name: callee,
                ..
            } = doc.tree.kind(*node)
            {
                let callee = callee.clone();
                let args: Vec<NodeId> = doc.tree.children(*node).to_vec();
                for (i, arg) in args.iter().enumerate() {
                    if !self.subject_names(doc, *arg, name) {
                        continue;
                    }
                    let decl = doc
                        .tree
                        .parent(*node)
                        .and_then(|p| doc.find_node_for_name(&callee, p))?;
                    let fn_ty = doc.tree.ty(decl)?;
                    if let Some(param) = fn_ty.fn_args().get(i) {
                        if let Some(ty) = fn_arg_ty(doc, param) {
                            return Some(ty);
                        }
                    }
                }
            }
            let children: Vec<NodeId> = doc.tree.children(*node).to_vec();
            if !children.is_empty() {
                if let Some(ty) = self.type_from_function_calls(doc, &children, name) {
                    return Some(ty);
                }
            }
        }
        None
    }

    /// Expressions using the name: the other operand gives the type.
    fn type_from_expressions(&mut self, doc: &Document, body: &[NodeId], name: &str) -> Option<Ty> {
        let mut found: Vec<Ty> = Vec::new();
        self.collect_expression_types(doc, body, name, &mut found);
        found.into_iter().next()
    }

    fn collect_expression_types(
        &mut self,
        doc: &Document,
        nodes: &[NodeId],
        name: &str,
        out: &mut Vec<Ty>,
    ) {
        for node in nodes {
            match doc.tree.kind(*node) {
                NodeKind::Expression {
                    lhs: Some(lhs),
                    rhs: Some(rhs),
                    ..
                } => {
                    let (lhs, rhs) = (*lhs, *rhs);
                    if self.subject_names(doc, lhs, name) {
                        if let Some(ty) = self.node_ty(doc, rhs) {
                            if !ty.is_weak() {
                                out.push(ty);
                            }
                        }
                    } else if self.subject_names(doc, rhs, name) {
                        if let Some(ty) = self.node_ty(doc, lhs) {
                            if !ty.is_weak() {
                                out.push(ty);
                            }
                        }
                    }
                    let children: Vec<NodeId> = doc.tree.children(*node).to_vec();
                    self.collect_expression_types(doc, &children, name, out);
                }
                _ => {
                    let children: Vec<NodeId> = doc.tree.children(*node).to_vec();
                    if !children.is_empty() {
                        self.collect_expression_types(doc, &children, name, out);
                    }
                }
            }
        }
    }

    /// Actual-argument types across every registered caller, merged.
    fn type_from_callers(
        &mut self,
        doc: &Document,
        callers: &[NodeId],
        name: &str,
        idx: usize,
    ) -> Option<Ty> {
        let mut merged: Option<Ty> = None;
        for caller in callers {
            if !matches!(doc.tree.kind(*caller), NodeKind::FunctionCall { .. }) {
                continue;
            }
            let args: Vec<NodeId> = doc.tree.children(*caller).to_vec();
            let mut this_caller: Option<Ty> = None;
            for (i, arg) in args.iter().enumerate() {
                match doc.tree.kind(*arg) {
                    NodeKind::Assignment {
                        subject: Some(subject),
                        value: Some(value),
                    } => {
                        if self.subject_names(doc, *subject, name) {
                            this_caller = self.node_ty(doc, *value);
                        }
                    }
                    _ if i == idx => {
                        this_caller = self.node_ty(doc, *arg);
                    }
                    _ => {}
                }
            }
            if let Some(ty) = this_caller {
                merged = Ty::merge(merged.as_ref(), Some(&ty));
            }
        }
        merged
    }

    // -----------------------------------------------------------------
    // Phase 7: per-node finishing
    // -----------------------------------------------------------------

    fn process(&mut self, doc: &mut Document, node: NodeId) {
        // Children first: literals resolve before their containers.
        let children: Vec<NodeId> = doc.tree.children(node).to_vec();
        for child in children {
            self.process(doc, child);
        }
        match doc.tree.kind(node).clone() {
            NodeKind::NumberLiteral { .. } => self.process_number(doc, node),
            NodeKind::Expression { .. } => self.process_expression(doc, node),
            NodeKind::VarDecl { .. } => self.process_var_decl(doc, node),
            NodeKind::Assignment { .. } => self.process_assignment(doc, node),
            NodeKind::FunctionDecl { .. } => self.process_function_decl(doc, node),
            NodeKind::FunctionCall { .. } => self.process_function_call(doc, node),
            _ => {}
        }
    }

    fn process_number(&mut self, doc: &mut Document, node: NodeId) {
        let Some(ty) = doc.tree.ty(node).cloned() else {
            return;
        };
        if !ty.is_weak() {
            return;
        }
        let context_ty = self.type_from_ancestors(doc, node);
        match Ty::merge(Some(&ty), context_ty.as_ref()) {
            Some(merged) if merged.is_weak() => {
                // No context decided: the first candidate wins.
                let first = merged.members().first().cloned();
                doc.tree.set_ty(node, first);
            }
            Some(merged) => {
                doc.tree.set_ty(node, Some(merged.clone()));
                self.set_type_on_ancestor(doc, node, &merged);
            }
            None => {
                // The context asks for a numeric type outside the
                // candidate set (say `i32` against `{i64|f64}`): the
                // literal adopts it. Anything else is a real mismatch.
                match context_ty {
                    Some(ctx) if ctx.is_number() => {
                        doc.tree.set_ty(node, Some(ctx));
                    }
                    _ => {
                        self.error(doc, node, "number literal does not fit its context type");
                    }
                }
            }
        }
    }

    fn process_expression(&mut self, doc: &mut Document, node: NodeId) {
        if doc.tree.ty(node).is_some() {
            return;
        }
        let (lhs, rhs) = match doc.tree.kind(node) {
            NodeKind::Expression { lhs, rhs, .. } => (*lhs, *rhs),
            _ => return,
        };
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return;
        };
        let lhs_ty = self.node_ty(doc, lhs);
        let rhs_ty = self.node_ty(doc, rhs);
        let merged = Ty::merge(lhs_ty.as_ref(), rhs_ty.as_ref());
        let Some(merged) = merged else {
            if lhs_ty.is_some() && rhs_ty.is_some() {
                self.error(doc, node, "operand types cannot be reconciled");
            }
            return;
        };
        if lhs_ty.as_ref().is_some_and(|t| t.is_weak()) {
            doc.tree.set_ty(lhs, Some(merged.clone()));
        }
        if rhs_ty.as_ref().is_some_and(|t| t.is_weak()) {
            doc.tree.set_ty(rhs, Some(merged.clone()));
        }
        doc.tree.set_ty(node, Some(merged));
    }

    fn process_var_decl(&mut self, doc: &mut Document, node: NodeId) {
        if doc.tree.ty(node).is_none() {
            if let Some(init) = crate::helpers::var_decl_first_init(doc, node) {
                if let Some(ty) = self.node_ty(doc, init) {
                    doc.tree.set_ty(node, Some(ty));
                }
            }
        }
        let Some(ty) = doc.tree.ty(node).cloned() else {
            return;
        };
        if ty.is_weak() {
            // No context resolved this declaration: take the first
            // candidate, matching the literal collapse.
            let first = ty.members().first().cloned();
            doc.tree.set_ty(node, first);
            return;
        }
        // A union containing null becomes a nullable type.
        if let TyKind::Multiple { types, is_weak } = &ty.kind {
            let has_null = types.iter().any(|t| t.name == "null");
            if !has_null {
                return;
            }
            let mut rest: Vec<Ty> = types.iter().filter(|t| t.name != "null").cloned().collect();
            let new_ty = if rest.len() == 1 {
                let mut only = rest.remove(0);
                only.is_nullable = true;
                only
            } else {
                Ty {
                    kind: TyKind::Multiple {
                        types: rest,
                        is_weak: *is_weak,
                    },
                    name: ty.name.clone(),
                    strong_type_name: ty.strong_type_name.clone(),
                    is_nullable: true,
                    tmpl_params: ty.tmpl_params.clone(),
                }
            };
            doc.tree.set_ty(node, Some(new_ty));
        }
    }

    fn process_assignment(&mut self, doc: &mut Document, node: NodeId) {
        if doc.tree.ty(node).is_some() {
            return;
        }
        let (subject, value) = match doc.tree.kind(node) {
            NodeKind::Assignment { subject, value } => (*subject, *value),
            _ => return,
        };
        let ty = subject
            .and_then(|s| self.node_ty(doc, s))
            .or_else(|| value.and_then(|v| self.node_ty(doc, v)));
        if let Some(ty) = ty {
            doc.tree.set_ty(node, Some(ty));
        }
    }

    fn process_function_decl(&mut self, doc: &mut Document, node: NodeId) {
        let Some(fn_ty) = doc.tree.ty(node).cloned() else {
            return;
        };
        if !fn_ty.is_function() || fn_ty.return_ty().is_some() {
            return;
        }
        let body: Vec<NodeId> = match doc.tree.kind(node) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => return,
        };
        let mut return_types: Vec<Ty> = Vec::new();
        self.collect_return_types(doc, &body, &mut return_types);
        let mut return_ty = match return_types.len() {
            0 => Ty::make("null"),
            1 => return_types.remove(0),
            _ => {
                let mut merged = Some(return_types[0].clone());
                for ty in &return_types[1..] {
                    merged = Ty::merge(merged.as_ref(), Some(ty));
                }
                match merged {
                    Some(ty) => ty,
                    None => {
                        self.error(doc, node, "return statements disagree about the type");
                        return;
                    }
                }
            }
        };
        if return_ty.is_weak() {
            return_ty = Ty::make("i64");
        }
        if let Some(ty) = doc.tree.node_mut(node).ty.as_mut() {
            ty.set_return_ty(return_ty.clone());
        }
        // Keep the wrapping declaration's signature in step.
        if let Some(wrapper) = doc.tree.parent(node) {
            if matches!(doc.tree.kind(wrapper), NodeKind::VarDecl { .. }) {
                if let Some(ty) = doc.tree.node_mut(wrapper).ty.as_mut() {
                    if ty.is_function() && ty.return_ty().is_none() {
                        ty.set_return_ty(return_ty);
                    }
                }
            }
        }
    }

    fn collect_return_types(&mut self, doc: &Document, body: &[NodeId], out: &mut Vec<Ty>) {
        for node in body {
            match doc.tree.kind(*node) {
                NodeKind::FlowControlCall {
                    kind: FlowControlCallKind::Return,
                    argument,
                } => {
                    if let Some(arg) = argument {
                        if let Some(ty) = self.node_ty(doc, *arg) {
                            out.push(ty);
                        }
                    }
                }
                NodeKind::FlowControl { then, els, .. } => {
                    let nested: Vec<NodeId> =
                        then.iter().chain(els.iter()).copied().collect();
                    self.collect_return_types(doc, &nested, out);
                }
                _ => {}
            }
        }
    }

    fn process_function_call(&mut self, doc: &mut Document, node: NodeId) {
        let args: Vec<NodeId> = doc.tree.children(node).to_vec();
        let mut arg_types: Vec<Ty> = Vec::new();
        for arg in args {
            if let Some(ty) = self.node_ty(doc, arg) {
                if ty.is_function() {
                    if let Some(ret) = ty.return_ty() {
                        arg_types.push(ret.clone());
                    }
                } else {
                    arg_types.push(ty);
                }
            }
        }
        let return_ty = self.return_type_for_call(doc, node);
        if let NodeKind::FunctionCall {
            arg_types: slot,
            return_ty: ret_slot,
            ..
        } = doc.tree.kind_mut(node)
        {
            *slot = arg_types;
            if ret_slot.is_none() {
                *ret_slot = return_ty;
            }
        }
    }

    // -----------------------------------------------------------------
    // Type lookup
    // -----------------------------------------------------------------

    /// The type a node evaluates to, without mutating anything.
    fn node_ty(&mut self, doc: &Document, node: NodeId) -> Option<Ty> {
        match doc.tree.kind(node) {
            NodeKind::BoolLiteral { .. } => Some(Ty::make("bool")),
            NodeKind::NumberLiteral { .. } => {
                Some(doc.tree.ty(node).cloned().unwrap_or_else(Ty::weak_number))
            }
            NodeKind::PercentageLiteral { .. } => doc.tree.ty(node).cloned(),
            NodeKind::StringLiteral { is_cstring, .. } => {
                Some(Ty::make(if *is_cstring { "cstr" } else { "str" }))
            }
            NodeKind::StringFunction { .. } => Some(Ty::make("str")),
            NodeKind::NullLiteral => Some(Ty::make("null")),
            NodeKind::ObjectDefinition => doc.tree.ty(node).cloned(),
            NodeKind::Expression { .. } => self.expression_ty(doc, node),
            NodeKind::FunctionDecl { .. } => doc.tree.ty(node).cloned(),
            NodeKind::ValuePath { .. } => self.value_path_ty(doc, node),
            NodeKind::VarName { name } => {
                let decl = doc.find_node_for_name(&name.clone(), node)?;
                self.node_ty(doc, decl)
            }
            NodeKind::VarDecl { .. } => doc.tree.ty(node).cloned(),
            NodeKind::FunctionCall { return_ty, .. } => match return_ty {
                Some(ty) => Some(ty.clone()),
                None => self.return_type_for_call(doc, node),
            },
            NodeKind::Assignment { .. } => doc.tree.ty(node).cloned(),
            NodeKind::Type(ty) => Some(ty.clone()),
            _ => doc.tree.ty(node).cloned(),
        }
    }

    fn expression_ty(&mut self, doc: &Document, node: NodeId) -> Option<Ty> {
        if let Some(ty) = doc.tree.ty(node) {
            return Some(ty.clone());
        }
        let (lhs, rhs) = match doc.tree.kind(node) {
            NodeKind::Expression { lhs, rhs, .. } => (*lhs, *rhs),
            _ => return None,
        };
        let lhs_ty = lhs.and_then(|l| self.node_ty(doc, l));
        let rhs_ty = rhs.and_then(|r| self.node_ty(doc, r));
        Ty::merge(lhs_ty.as_ref(), rhs_ty.as_ref())
    }

    /// Resolves the type a value path evaluates to, following fields
    /// and methods through the class registry.
    fn value_path_ty(&mut self, doc: &Document, vp: NodeId) -> Option<Ty> {
        if let Some(ty) = doc.tree.ty(vp) {
            return Some(ty.clone());
        }
        let segments: Vec<NodeId> = doc.tree.children(vp).to_vec();
        match segments.len() {
            0 => None,
            1 => self.node_ty(doc, segments[0]),
            _ => {
                let mut class = self.value_path_class(doc, vp)?;
                for (i, segment) in segments[1..].iter().enumerate() {
                    let is_last = i == segments.len() - 2;
                    match doc.tree.kind(*segment) {
                        NodeKind::PropertyName { name } => {
                            let field = class_field_named(doc, class, &name.clone())?;
                            let field_ty = doc.tree.ty(field)?.clone();
                            if is_last {
                                return Some(field_ty);
                            }
                            if field_ty.is_object() {
                                class = doc.find_class(&field_ty.name)?;
                            } else {
                                return None;
                            }
                        }
                        NodeKind::FunctionCall { name, .. } => {
                            let method = class_method_named(doc, class, &name.clone())?;
                            let method_ty = doc.tree.ty(method)?;
                            return method_ty.return_ty().cloned();
                        }
                        _ => return None,
                    }
                }
                None
            }
        }
    }

    fn return_type_for_call(&mut self, doc: &Document, call: NodeId) -> Option<Ty> {
        let (kind, name) = match doc.tree.kind(call) {
            NodeKind::FunctionCall { kind, name, .. } => (*kind, name.clone()),
            _ => return None,
        };
        match kind {
            FunctionCallKind::None => {
                let decl = doc
                    .tree
                    .parent(call)
                    .and_then(|p| doc.find_node_for_name(&name, p))?;
                let ty = doc.tree.ty(decl)?;
                if ty.is_function() {
                    ty.return_ty().cloned()
                } else {
                    None
                }
            }
            FunctionCallKind::ValuePath => {
                let vp = doc.tree.parent(call)?;
                let method = self.value_path_method_decl(doc, vp, &name)?;
                doc.tree.ty(method)?.return_ty().cloned()
            }
            FunctionCallKind::ValueOf => {
                let first = doc.tree.children(call).first().copied()?;
                let ty = self.node_ty(doc, first)?;
                ty.pointee().cloned()
            }
            FunctionCallKind::PointerTo => {
                let first = doc.tree.children(call).first().copied()?;
                let ty = self.node_ty(doc, first)?;
                Some(Ty::make_pointer(ty))
            }
            FunctionCallKind::SizeOf => Some(Ty::make("i64")),
            _ => None,
        }
    }

    /// Walks upward until a context imposes a concrete type on a weak
    /// literal.
    fn type_from_ancestors(&mut self, doc: &Document, node: NodeId) -> Option<Ty> {
        let parent = doc.tree.parent(node)?;
        match doc.tree.kind(parent).clone() {
            NodeKind::FunctionDecl { .. } => {
                doc.tree.ty(parent).and_then(|ty| ty.return_ty().cloned())
            }
            NodeKind::FunctionCall { kind, name, .. } => match kind {
                FunctionCallKind::None | FunctionCallKind::ValuePath => {
                    let decl = match kind {
                        FunctionCallKind::None => doc
                            .tree
                            .parent(parent)
                            .and_then(|p| doc.find_node_for_name(&name, p)),
                        _ => {
                            let vp = doc.tree.parent(parent);
                            vp.and_then(|vp| self.value_path_method_decl(doc, vp, &name))
                        }
                    }?;
                    let fn_ty = doc.tree.ty(decl)?.clone();
                    let idx = doc
                        .tree
                        .children(parent)
                        .iter()
                        .position(|c| *c == node)?;
                    fn_ty
                        .fn_args()
                        .get(idx)
                        .and_then(|arg| fn_arg_ty(doc, arg))
                }
                FunctionCallKind::Set => {
                    let args = doc.tree.children(parent);
                    if args.len() != 2 {
                        return None;
                    }
                    let target_ty = self.node_ty(doc, args[0])?;
                    target_ty.pointee().cloned()
                }
                _ => None,
            },
            NodeKind::FlowControlCall {
                kind: FlowControlCallKind::Return,
                ..
            } => {
                let fd = doc.tree.enclosing_function(parent)?;
                doc.tree.ty(fd).and_then(|ty| ty.return_ty().cloned())
            }
            NodeKind::Assignment { subject, .. } => {
                let grandparent = doc.tree.parent(parent)?;
                if matches!(doc.tree.kind(grandparent), NodeKind::ObjectDefinition) {
                    // Field type from the object's class.
                    let subject = subject?;
                    let field_name = match doc.tree.kind(subject) {
                        NodeKind::PropertyName { name } => name.clone(),
                        NodeKind::ValuePath { .. } => {
                            let first = doc.tree.children(subject).first().copied()?;
                            match doc.tree.kind(first) {
                                NodeKind::PropertyName { name } => name.clone(),
                                _ => return None,
                            }
                        }
                        _ => return None,
                    };
                    let obj_ty = doc.tree.ty(grandparent)?.clone();
                    let class = doc.find_class(&obj_ty.name)?;
                    let field = class_field_named(doc, class, &field_name)?;
                    doc.tree.ty(field).cloned()
                } else {
                    match doc.tree.ty(parent) {
                        Some(ty) => Some(ty.clone()),
                        None => subject.and_then(|s| self.node_ty(doc, s)),
                    }
                }
            }
            _ => match doc.tree.ty(parent) {
                Some(ty) => Some(ty.clone()),
                None => {
                    // One step of context computation, not a full walk.
                    match doc.tree.kind(parent) {
                        NodeKind::Expression { .. } => self.expression_ty(doc, parent),
                        NodeKind::VarDecl { .. } => None,
                        _ => None,
                    }
                }
            },
        }
    }

    /// Back-propagates a resolved literal type into an enclosing
    /// expression chain that has no type yet.
    fn set_type_on_ancestor(&mut self, doc: &mut Document, node: NodeId, ty: &Ty) {
        let Some(parent) = doc.tree.parent(node) else {
            return;
        };
        if matches!(doc.tree.kind(parent), NodeKind::Expression { .. })
            && doc.tree.ty(parent).is_none()
        {
            doc.tree.set_ty(parent, Some(ty.clone()));
            self.set_type_on_ancestor(doc, parent, ty);
        }
    }
}

impl Pass for TypeGuesser {
    fn name(&self) -> &'static str {
        "type-guesser"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        self.connect_calls_with_decls(doc);
        self.propagate_strong_types(doc);
        self.types_from_init_vals(doc);
        self.resolve_weak_var_decls(doc);
        self.types_from_assignments(doc);
        self.types_for_arguments(doc);
        let roots: Vec<NodeId> = doc.nodes().to_vec();
        for node in roots {
            self.process(doc, node);
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lil_core::{ExpressionKind, Node, ScopeTable};

    fn var_decl(doc: &mut Document, name: &str, ty: Option<Ty>) -> NodeId {
        let vd = doc.tree.add_node(Node::new(NodeKind::VarDecl {
            name: name.into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![],
        }));
        doc.tree.set_ty(vd, ty);
        vd
    }

    fn number(doc: &mut Document, digits: &str, ty: Option<Ty>) -> NodeId {
        let n = doc.tree.add_node(Node::new(NodeKind::NumberLiteral {
            value: digits.into(),
        }));
        doc.tree.set_ty(n, ty);
        n
    }

    fn set_init(doc: &mut Document, vd: NodeId, init: NodeId) {
        doc.tree.add_child(vd, init);
        if let NodeKind::VarDecl { init_vals, .. } = doc.tree.kind_mut(vd) {
            init_vals.push(init);
        }
    }

    /// `var x = 1; var y: f64 = x + 0.5;`
    fn weak_resolution_fixture() -> (Document, NodeId, NodeId, NodeId) {
        let mut doc = Document::new();
        let x = var_decl(&mut doc, "x", None);
        let one = number(&mut doc, "1", Some(Ty::weak_number()));
        set_init(&mut doc, x, one);
        doc.add_to_main(x);

        let y = var_decl(&mut doc, "y", Some(Ty::make("f64")));
        let exp = doc.tree.add_node(Node::new(NodeKind::Expression {
            op: ExpressionKind::Sum,
            lhs: None,
            rhs: None,
        }));
        let use_x = doc.tree.add_node(Node::new(NodeKind::VarName { name: "x".into() }));
        let half = number(&mut doc, "0.5", Some(Ty::make("f64")));
        doc.tree.add_child(exp, use_x);
        doc.tree.add_child(exp, half);
        if let NodeKind::Expression { lhs, rhs, .. } = doc.tree.kind_mut(exp) {
            *lhs = Some(use_x);
            *rhs = Some(half);
        }
        set_init(&mut doc, y, exp);
        doc.add_to_main(y);
        doc.finalize();
        (doc, x, one, exp)
    }

    #[test]
    fn weak_literal_back_propagates_from_expression_context() {
        let (mut doc, x, one, exp) = weak_resolution_fixture();
        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        assert!(!pass.has_errors(), "{:?}", pass.errors());

        assert!(doc.tree.ty(x).unwrap().equal_to(&Ty::make("f64")));
        assert!(doc.tree.ty(one).unwrap().equal_to(&Ty::make("f64")));
        assert!(doc.tree.ty(exp).unwrap().equal_to(&Ty::make("f64")));
    }

    #[test]
    fn annotated_type_collapses_weak_initializer() {
        let mut doc = Document::new();
        let x = var_decl(&mut doc, "x", Some(Ty::make("i32")));
        let lit = number(&mut doc, "42", Some(Ty::weak_number()));
        set_init(&mut doc, x, lit);
        doc.add_to_main(x);
        doc.finalize();

        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        assert!(!pass.has_errors(), "{:?}", pass.errors());
        // i32 is outside the {i64|f64} candidate set; the literal
        // adopts the declared numeric type instead of failing.
        assert!(doc.tree.ty(x).unwrap().equal_to(&Ty::make("i32")));
        assert!(doc.tree.ty(lit).unwrap().equal_to(&Ty::make("i32")));
    }

    #[test]
    fn uncontexted_integer_collapses_to_i64() {
        let mut doc = Document::new();
        let x = var_decl(&mut doc, "x", None);
        let lit = number(&mut doc, "1", Some(Ty::weak_number()));
        set_init(&mut doc, x, lit);
        doc.add_to_main(x);
        doc.finalize();

        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        assert!(doc.tree.ty(lit).unwrap().equal_to(&Ty::make("i64")));
        assert!(doc.tree.ty(x).unwrap().equal_to(&Ty::make("i64")));
    }

    #[test]
    fn return_type_computed_from_body() {
        let mut doc = Document::new();
        let lit = number(&mut doc, "true", Some(Ty::make("bool")));
        let ret = doc.tree.add_node(Node::new(NodeKind::FlowControlCall {
            kind: FlowControlCallKind::Return,
            argument: Some(lit),
        }));
        doc.tree.add_child(ret, lit);
        let fd = doc.tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: lil_core::FunctionDeclKind::Fn,
            name: Some("f".into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: true,
            receives_function_body: true,
            args: vec![],
            body: vec![ret],
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(fd, Some(Ty::make_fn()));
        doc.tree.add_child(fd, ret);
        let vd = var_decl(&mut doc, "f", None);
        set_init(&mut doc, vd, fd);
        doc.add_node(vd);
        doc.set_local_variable("f", vd);
        doc.finalize();

        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        let ret_ty = doc.tree.ty(fd).unwrap().return_ty().cloned().unwrap();
        assert!(ret_ty.equal_to(&Ty::make("bool")));
    }

    #[test]
    fn function_without_return_yields_null() {
        let mut doc = Document::new();
        let fd = doc.tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: lil_core::FunctionDeclKind::Fn,
            name: Some("noop".into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: vec![],
            body: vec![],
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(fd, Some(Ty::make_fn()));
        let vd = var_decl(&mut doc, "noop", None);
        set_init(&mut doc, vd, fd);
        doc.add_node(vd);
        doc.finalize();

        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        let ret_ty = doc.tree.ty(fd).unwrap().return_ty().cloned().unwrap();
        assert!(ret_ty.equal_to(&Ty::make("null")));
    }

    #[test]
    fn parameter_type_inferred_from_caller() {
        let mut doc = Document::new();
        // fn f(a) { }  -- a has no annotation.
        let param = var_decl(&mut doc, "a", None);
        let mut fn_ty = Ty::make_fn();
        fn_ty.add_fn_arg(FnArg::Decl(param));
        let fd = doc.tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: lil_core::FunctionDeclKind::Fn,
            name: Some("f".into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: vec![param],
            body: vec![],
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(fd, Some(fn_ty.clone()));
        doc.tree.add_child(fd, param);
        let vd = var_decl(&mut doc, "f", Some(fn_ty));
        set_init(&mut doc, vd, fd);
        doc.add_node(vd);
        doc.set_local_variable("f", vd);

        // f("hello")
        let arg = doc.tree.add_node(Node::new(NodeKind::StringLiteral {
            value: "hello".into(),
            is_cstring: false,
        }));
        let call = doc.tree.add_node(Node::new(NodeKind::FunctionCall {
            kind: FunctionCallKind::None,
            name: "f".into(),
            arg_types: vec![],
            return_ty: None,
        }));
        doc.tree.add_child(call, arg);
        doc.add_to_main(call);
        doc.finalize();

        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        assert!(!pass.has_errors(), "{:?}", pass.errors());
        assert!(doc.tree.ty(param).unwrap().equal_to(&Ty::make("str")));
    }

    #[test]
    fn unresolvable_parameter_defaults_to_any() {
        let mut doc = Document::new();
        let param = var_decl(&mut doc, "mystery", None);
        let mut fn_ty = Ty::make_fn();
        fn_ty.add_fn_arg(FnArg::Decl(param));
        let fd = doc.tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: lil_core::FunctionDeclKind::Fn,
            name: Some("g".into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: vec![param],
            body: vec![],
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(fd, Some(fn_ty.clone()));
        doc.tree.add_child(fd, param);
        let vd = var_decl(&mut doc, "g", Some(fn_ty));
        set_init(&mut doc, vd, fd);
        doc.add_node(vd);
        doc.finalize();

        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        assert!(doc.tree.ty(param).unwrap().equal_to(&Ty::make("any")));
    }

    #[test]
    fn union_with_null_becomes_nullable() {
        let mut doc = Document::new();
        let union = Ty {
            kind: TyKind::Multiple {
                types: vec![Ty::make("i32"), Ty::make("null")],
                is_weak: false,
            },
            name: String::new(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        };
        let x = var_decl(&mut doc, "x", Some(union));
        doc.add_to_main(x);
        doc.finalize();

        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        let ty = doc.tree.ty(x).unwrap();
        assert!(ty.is_nullable);
        assert!(ty.is_single());
        assert_eq!(ty.name, "i32");
    }

    #[test]
    fn guessing_twice_is_idempotent() {
        let (mut doc, ..) = weak_resolution_fixture();
        let mut pass = TypeGuesser::new();
        pass.perform_visit(&mut doc);
        let snapshot = serde_json::to_string(&doc).unwrap();
        let mut pass2 = TypeGuesser::new();
        pass2.perform_visit(&mut doc);
        let again = serde_json::to_string(&doc).unwrap();
        assert_eq!(snapshot, again);
    }
}
