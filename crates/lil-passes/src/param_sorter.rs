//! Call-argument reordering.
//!
//! For every method call reached through a value path, resolves the
//! callee and rewrites the call's arguments into declaration order.
//! Named arguments (assignments whose subject names a parameter) win
//! their slot outright; positional arguments fill the remaining slots
//! left to right; parameters left unmentioned fall back to their
//! declared initializer. A slot that cannot be satisfied is an error.

use lil_core::{
    Diagnostic, Document, FunctionCallKind, Node, NodeId, NodeKind,
};

use crate::helpers::{class_field_named, class_method_named, fn_arg_name, var_decl_first_init};
use crate::visitor::Pass;

#[derive(Default)]
pub struct ParameterSorter {
    errors: Vec<Diagnostic>,
}

impl ParameterSorter {
    pub fn new() -> ParameterSorter {
        ParameterSorter::default()
    }

    fn error(&mut self, doc: &Document, node: NodeId, message: impl Into<String>) {
        let loc = doc.tree.node(node).loc.clone();
        self.errors.push(Diagnostic::new(message, &loc));
    }

    fn process_call(&mut self, doc: &mut Document, call: NodeId) {
        let Some(vp) = doc.tree.parent(call) else {
            return;
        };
        if !matches!(doc.tree.kind(vp), NodeKind::ValuePath { .. }) {
            return;
        }
        let segments: Vec<NodeId> = doc.tree.children(vp).to_vec();
        if segments.len() < 2 {
            return;
        }

        // Resolve the subject declaration the path starts from.
        let mut decl = match doc.tree.kind(segments[0]) {
            NodeKind::VarName { name } => {
                match doc.find_node_for_name(&name.clone(), vp) {
                    Some(d) if matches!(doc.tree.kind(d), NodeKind::VarDecl { .. }) => d,
                    _ => return,
                }
            }
            _ => return,
        };
        if matches!(
            doc.tree.kind(decl),
            NodeKind::VarDecl {
                is_extern: true,
                ..
            }
        ) {
            return;
        }

        for segment in &segments[1..] {
            match doc.tree.kind(*segment).clone() {
                NodeKind::FunctionCall { name, .. } => {
                    let Some(obj_ty) = doc.tree.ty(decl).cloned() else {
                        return;
                    };
                    if !obj_ty.is_object() {
                        self.error(doc, *segment, "value path does not point to an object");
                        return;
                    }
                    let Some(class) = doc.find_class(&obj_ty.name) else {
                        self.error(
                            doc,
                            *segment,
                            format!("unknown class \"{}\"", obj_ty.name),
                        );
                        return;
                    };
                    let Some(method) = class_method_named(doc, class, &name) else {
                        self.error(doc, *segment, format!("unknown method \"{name}\""));
                        return;
                    };
                    decl = method;
                    if *segment == call {
                        self.sort_arguments(doc, call, method);
                    }
                }
                NodeKind::PropertyName { name } => {
                    let Some(obj_ty) = doc.tree.ty(decl).cloned() else {
                        return;
                    };
                    if !obj_ty.is_object() {
                        return;
                    }
                    let Some(class) = doc.find_class(&obj_ty.name) else {
                        return;
                    };
                    let Some(field) = class_field_named(doc, class, &name) else {
                        self.error(doc, *segment, format!("unknown field \"{name}\""));
                        return;
                    };
                    decl = field;
                }
                _ => {}
            }
        }
    }

    fn sort_arguments(&mut self, doc: &mut Document, call: NodeId, method: NodeId) {
        let Some(method_ty) = doc.tree.ty(method).cloned() else {
            return;
        };
        if !method_ty.is_function() {
            self.error(doc, call, "called member is not a function");
            return;
        }

        let call_args: Vec<NodeId> = doc.tree.children(call).to_vec();
        let mut named: Vec<NodeId> = Vec::new();
        let mut plain: Vec<NodeId> = Vec::new();
        for arg in call_args {
            if matches!(doc.tree.kind(arg), NodeKind::Assignment { .. }) {
                named.push(arg);
            } else {
                plain.push(arg);
            }
        }

        let mut new_args: Vec<NodeId> = Vec::new();
        let mut plain_used = 0usize;
        for decl_arg in method_ty.fn_args() {
            let Some(param_name) = fn_arg_name(doc, decl_arg) else {
                continue;
            };
            // A named argument claims the slot first.
            let named_hit = named.iter().copied().find(|asgmt| {
                let subject = match doc.tree.kind(*asgmt) {
                    NodeKind::Assignment { subject, .. } => *subject,
                    _ => None,
                };
                subject.is_some_and(|s| {
                    matches!(doc.tree.kind(s), NodeKind::VarName { name } if *name == param_name)
                })
            });
            if let Some(asgmt) = named_hit {
                new_args.push(asgmt);
                continue;
            }
            if plain_used < plain.len() {
                let value = plain[plain_used];
                plain_used += 1;
                let value_ty = doc.tree.ty(value).cloned();
                let vn = doc.tree.add_node(Node::new(NodeKind::VarName {
                    name: param_name.clone(),
                }));
                let asgmt = doc.tree.add_node(Node::new(NodeKind::Assignment {
                    subject: Some(vn),
                    value: Some(value),
                }));
                doc.tree.set_ty(asgmt, value_ty);
                doc.tree.add_child(asgmt, vn);
                doc.tree.add_child(asgmt, value);
                new_args.push(asgmt);
                continue;
            }
            // Unmentioned parameter with a default: synthesize it.
            let decl_id = match decl_arg {
                lil_core::FnArg::Decl(id) => Some(*id),
                lil_core::FnArg::Ty(_) => None,
            };
            let default = decl_id.and_then(|d| var_decl_first_init(doc, d));
            if let Some(default) = default {
                let value = doc.tree.deep_clone(default);
                let vn = doc.tree.add_node(Node::new(NodeKind::VarName {
                    name: param_name.clone(),
                }));
                let vp = doc.tree.add_node(Node::new(NodeKind::ValuePath {
                    prevent_emit_call_to_ivar: false,
                }));
                doc.tree.add_child(vp, vn);
                let asgmt = doc.tree.add_node(Node::new(NodeKind::Assignment {
                    subject: Some(vp),
                    value: Some(value),
                }));
                doc.tree.add_child(asgmt, vp);
                doc.tree.add_child(asgmt, value);
                new_args.push(asgmt);
            } else {
                self.error(
                    doc,
                    call,
                    format!("no value for parameter \"{param_name}\""),
                );
            }
        }

        doc.tree.set_children(call, new_args);
    }
}

impl Pass for ParameterSorter {
    fn name(&self) -> &'static str {
        "parameter-sorter"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if matches!(
                doc.tree.kind(node),
                NodeKind::FunctionCall {
                    kind: FunctionCallKind::ValuePath,
                    ..
                }
            ) {
                self.process_call(doc, node);
            }
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}
