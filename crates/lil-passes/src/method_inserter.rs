//! Default method synthesis for classes.
//!
//! Every class gets a `construct` and a `destruct` method when the
//! user wrote none. Every `ivar` field gets a `getX` accessor
//! returning `@self.x` and a `setX` accessor writing it -- unless the
//! user supplied one whose body already touches the field, in which
//! case the existing accesses are marked so the emitter reads the
//! ivar directly instead of calling back into the accessor.

use lil_core::{
    Diagnostic, Document, FlowControlCallKind, FlowControlKind, FnArg, FunctionDeclKind, Node,
    NodeId, NodeKind, ScopeTable, SelectorKind, Ty,
};

use crate::helpers::{class_method_named, upper_first, var_decl_first_init};
use crate::visitor::Pass;

#[derive(Default)]
pub struct MethodInserter {
    errors: Vec<Diagnostic>,
}

impl MethodInserter {
    pub fn new() -> MethodInserter {
        MethodInserter::default()
    }

    fn process_class(&mut self, doc: &mut Document, class: NodeId) {
        if matches!(
            doc.tree.kind(class),
            NodeKind::ClassDecl {
                is_extern: true,
                ..
            }
        ) {
            return;
        }

        if class_method_named(doc, class, "construct").is_none() {
            let (method, _) = self.make_empty_method(doc, "construct", true);
            self.attach_method(doc, class, method, "construct");
        }
        if class_method_named(doc, class, "destruct").is_none() {
            let (method, _) = self.make_empty_method(doc, "destruct", false);
            self.attach_method(doc, class, method, "destruct");
        }

        let fields: Vec<NodeId> = match doc.tree.kind(class) {
            NodeKind::ClassDecl { fields, .. } => fields.clone(),
            _ => return,
        };
        for field in fields {
            let (name, is_ivar) = match doc.tree.kind(field) {
                NodeKind::VarDecl { name, is_ivar, .. } => (name.clone(), *is_ivar),
                _ => continue,
            };
            if !is_ivar {
                continue;
            }
            let field_ty = doc.tree.ty(field).cloned();
            self.ensure_getter(doc, class, &name, field_ty.clone());
            self.ensure_setter(doc, class, &name, field_ty);
        }
    }

    /// Returns the wrapping declaration and the function inside it.
    fn make_empty_method(
        &self,
        doc: &mut Document,
        name: &str,
        is_constructor: bool,
    ) -> (NodeId, NodeId) {
        let fd = doc.tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: FunctionDeclKind::Fn,
            name: Some(name.into()),
            is_constructor,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: Vec::new(),
            body: Vec::new(),
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(fd, Some(Ty::make_fn()));
        let vd = doc.tree.add_node(Node::new(NodeKind::VarDecl {
            name: name.into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![fd],
        }));
        doc.tree.set_ty(vd, Some(Ty::make_fn()));
        doc.tree.add_child(vd, fd);
        (vd, fd)
    }

    fn attach_method(&self, doc: &mut Document, class: NodeId, method: NodeId, name: &str) {
        doc.tree.add_child(class, method);
        if let NodeKind::ClassDecl { methods, .. } = doc.tree.kind_mut(class) {
            methods.push(method);
        }
        doc.tree.set_local_variable(class, name, method);
    }

    fn ensure_getter(
        &mut self,
        doc: &mut Document,
        class: NodeId,
        field: &str,
        field_ty: Option<Ty>,
    ) {
        let getter_name = format!("get{}", upper_first(field));
        match class_method_named(doc, class, &getter_name) {
            Some(getter) => {
                let Some(fd) = var_decl_first_init(doc, getter) else {
                    return;
                };
                let body: Vec<NodeId> = match doc.tree.kind(fd) {
                    NodeKind::FunctionDecl { body, .. } => body.clone(),
                    _ => return,
                };
                let returns = find_return_statements(doc, &body);
                if returns.is_empty() {
                    // Empty getter: fill in the return of the ivar.
                    let ret = self.make_ivar_return(doc, field);
                    doc.tree.add_child(fd, ret);
                    if let NodeKind::FunctionDecl {
                        body, has_return, ..
                    } = doc.tree.kind_mut(fd)
                    {
                        body.push(ret);
                        *has_return = true;
                    }
                } else {
                    // The getter returns the ivar itself: suppress the
                    // accessor-call lowering on those paths.
                    for ret in returns {
                        let arg = match doc.tree.kind(ret) {
                            NodeKind::FlowControlCall { argument, .. } => *argument,
                            _ => None,
                        };
                        if let Some(arg) = arg {
                            if let NodeKind::ValuePath {
                                prevent_emit_call_to_ivar,
                            } = doc.tree.kind_mut(arg)
                            {
                                *prevent_emit_call_to_ivar = true;
                            }
                        }
                    }
                }
            }
            None => {
                // No user getter at all: synthesize the whole accessor.
                let (method, fd) = self.make_empty_method(doc, &getter_name, false);
                let mut fn_ty = Ty::make_fn();
                if let Some(field_ty) = &field_ty {
                    fn_ty.set_return_ty(field_ty.clone());
                }
                doc.tree.set_ty(method, Some(fn_ty.clone()));
                doc.tree.set_ty(fd, Some(fn_ty));
                let ret = self.make_ivar_return(doc, field);
                doc.tree.add_child(fd, ret);
                if let NodeKind::FunctionDecl {
                    body, has_return, ..
                } = doc.tree.kind_mut(fd)
                {
                    body.push(ret);
                    *has_return = true;
                }
                self.attach_method(doc, class, method, &getter_name);
            }
        }
    }

    fn ensure_setter(
        &mut self,
        doc: &mut Document,
        class: NodeId,
        field: &str,
        field_ty: Option<Ty>,
    ) {
        let setter_name = format!("set{}", upper_first(field));
        match class_method_named(doc, class, &setter_name) {
            Some(setter) => {
                let Some(fd) = var_decl_first_init(doc, setter) else {
                    return;
                };
                let body: Vec<NodeId> = match doc.tree.kind(fd) {
                    NodeKind::FunctionDecl { body, .. } => body.clone(),
                    _ => return,
                };
                let sets = find_setter_statements(doc, field, &body);
                if sets.is_empty() {
                    // The setter exists but never writes the field:
                    // append the assignment from its first parameter.
                    let param = doc
                        .tree
                        .ty(fd)
                        .and_then(|ty| ty.fn_args().first().cloned())
                        .and_then(|arg| match arg {
                            FnArg::Decl(id) => match doc.tree.kind(id) {
                                NodeKind::VarDecl { name, .. } => Some(name.clone()),
                                _ => None,
                            },
                            FnArg::Ty(_) => None,
                        });
                    let Some(param) = param else {
                        let loc = doc.tree.node(setter).loc.clone();
                        self.errors.push(Diagnostic::new(
                            format!("setter \"{setter_name}\" does not assign the field and has no parameter"),
                            &loc,
                        ));
                        return;
                    };
                    let asgmt = self.make_ivar_assignment(doc, field, &param);
                    doc.tree.add_child(fd, asgmt);
                    if let NodeKind::FunctionDecl { body, .. } = doc.tree.kind_mut(fd) {
                        body.push(asgmt);
                    }
                } else {
                    for set in sets {
                        let subject = match doc.tree.kind(set) {
                            NodeKind::Assignment { subject, .. } => *subject,
                            _ => None,
                        };
                        if let Some(subject) = subject {
                            if let NodeKind::ValuePath {
                                prevent_emit_call_to_ivar,
                            } = doc.tree.kind_mut(subject)
                            {
                                *prevent_emit_call_to_ivar = true;
                            }
                        }
                    }
                }
            }
            None => {
                let (method, fd) = self.make_empty_method(doc, &setter_name, false);
                // One parameter carrying the ivar's type.
                let param = doc.tree.add_node(Node::new(NodeKind::VarDecl {
                    name: "value".into(),
                    is_extern: false,
                    is_ivar: false,
                    is_vvar: false,
                    is_const: false,
                    init_vals: vec![],
                }));
                doc.tree.set_ty(param, field_ty);
                doc.tree.add_child(fd, param);
                if let NodeKind::FunctionDecl { args, .. } = doc.tree.kind_mut(fd) {
                    args.push(param);
                }
                let mut fn_ty = Ty::make_fn();
                fn_ty.add_fn_arg(FnArg::Decl(param));
                doc.tree.set_ty(fd, Some(fn_ty.clone()));
                doc.tree.set_ty(method, Some(fn_ty));
                doc.tree.set_local_variable(fd, "value", param);

                let asgmt = self.make_ivar_assignment(doc, field, "value");
                doc.tree.add_child(fd, asgmt);
                if let NodeKind::FunctionDecl { body, .. } = doc.tree.kind_mut(fd) {
                    body.push(asgmt);
                }
                self.attach_method(doc, class, method, &setter_name);
            }
        }
    }

    /// `@self.<field>` with accessor lowering suppressed.
    fn make_self_path(&self, doc: &mut Document, field: &str) -> NodeId {
        let vp = doc.tree.add_node(Node::new(NodeKind::ValuePath {
            prevent_emit_call_to_ivar: true,
        }));
        let self_sel = doc.tree.add_node(Node::new(NodeKind::Selector {
            kind: SelectorKind::SelfSelector,
            name: "@self".into(),
        }));
        let pn = doc.tree.add_node(Node::new(NodeKind::PropertyName {
            name: field.into(),
        }));
        doc.tree.add_child(vp, self_sel);
        doc.tree.add_child(vp, pn);
        vp
    }

    fn make_ivar_return(&self, doc: &mut Document, field: &str) -> NodeId {
        let vp = self.make_self_path(doc, field);
        let ret = doc.tree.add_node(Node::new(NodeKind::FlowControlCall {
            kind: FlowControlCallKind::Return,
            argument: Some(vp),
        }));
        doc.tree.add_child(ret, vp);
        ret
    }

    fn make_ivar_assignment(&self, doc: &mut Document, field: &str, param: &str) -> NodeId {
        let subject = self.make_self_path(doc, field);
        let value_vp = doc.tree.add_node(Node::new(NodeKind::ValuePath {
            prevent_emit_call_to_ivar: false,
        }));
        let vn = doc.tree.add_node(Node::new(NodeKind::VarName {
            name: param.into(),
        }));
        doc.tree.add_child(value_vp, vn);
        let asgmt = doc.tree.add_node(Node::new(NodeKind::Assignment {
            subject: Some(subject),
            value: Some(value_vp),
        }));
        doc.tree.add_child(asgmt, subject);
        doc.tree.add_child(asgmt, value_vp);
        asgmt
    }
}

/// Return statements in a body, looking through nested flow control.
fn find_return_statements(doc: &Document, body: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::new();
    for node in body {
        match doc.tree.kind(*node) {
            NodeKind::FlowControlCall {
                kind: FlowControlCallKind::Return,
                ..
            } => out.push(*node),
            NodeKind::FlowControl {
                kind, then, els, ..
            } => {
                out.extend(find_return_statements(doc, then));
                if matches!(kind, FlowControlKind::If) {
                    out.extend(find_return_statements(doc, els));
                }
            }
            _ => {}
        }
    }
    out
}

/// Assignments writing `@self.<field>` in a body.
fn find_setter_statements(doc: &Document, field: &str, body: &[NodeId]) -> Vec<NodeId> {
    let mut out = Vec::new();
    for node in body {
        match doc.tree.kind(*node) {
            NodeKind::Assignment {
                subject: Some(subject),
                ..
            } => {
                if !matches!(doc.tree.kind(*subject), NodeKind::ValuePath { .. }) {
                    continue;
                }
                let segments = doc.tree.children(*subject);
                if segments.len() != 2 {
                    continue;
                }
                let starts_with_self = matches!(
                    doc.tree.kind(segments[0]),
                    NodeKind::Selector {
                        kind: SelectorKind::SelfSelector,
                        ..
                    }
                );
                let names_field = matches!(
                    doc.tree.kind(segments[1]),
                    NodeKind::PropertyName { name } if name == field
                );
                if starts_with_self && names_field {
                    out.push(*node);
                }
            }
            NodeKind::FlowControl {
                kind, then, els, ..
            } => {
                out.extend(find_setter_statements(doc, field, then));
                if matches!(kind, FlowControlKind::If) {
                    out.extend(find_setter_statements(doc, field, els));
                }
            }
            _ => {}
        }
    }
    out
}

impl Pass for MethodInserter {
    fn name(&self) -> &'static str {
        "method-inserter"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let classes: Vec<NodeId> = doc.classes().to_vec();
        for class in classes {
            self.process_class(doc, class);
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}
