//! Implicit conversion insertion at call sites.
//!
//! Whenever an argument's type differs from the parameter's declared
//! type and a conversion `"<srcTy>_to_<dstTy>"` is registered, the
//! argument is wrapped in a synthesized conversion call. Arguments
//! with no matching conversion are left alone; the type guesser and
//! validator flag them later.

use lil_core::{
    Diagnostic, Document, FunctionCallKind, Node, NodeId, NodeKind,
};

use crate::helpers::fn_arg_ty;
use crate::visitor::Pass;

#[derive(Default)]
pub struct ConversionInserter {
    errors: Vec<Diagnostic>,
}

impl ConversionInserter {
    pub fn new() -> ConversionInserter {
        ConversionInserter::default()
    }

    fn process_call(&mut self, doc: &mut Document, call: NodeId) {
        let name = match doc.tree.kind(call) {
            NodeKind::FunctionCall {
                kind: FunctionCallKind::None,
                name,
                ..
            } => name.clone(),
            _ => return,
        };
        let Some(parent) = doc.tree.parent(call) else {
            return;
        };
        let Some(decl) = doc.find_node_for_name(&name, parent) else {
            return;
        };
        let Some(fn_ty) = doc.tree.ty(decl).cloned() else {
            return;
        };
        if !fn_ty.is_function() {
            return;
        }

        let call_args: Vec<NodeId> = doc.tree.children(call).to_vec();
        if !fn_ty.is_variadic() && call_args.len() != fn_ty.fn_args().len() {
            // Arity mismatch is the validator's concern.
            return;
        }

        for (i, arg) in call_args.iter().enumerate() {
            let Some(param_ty) = fn_ty.fn_args().get(i).and_then(|a| fn_arg_ty(doc, a)) else {
                break;
            };
            let Some(arg_ty) = doc.tree.ty(*arg).cloned() else {
                continue;
            };
            if param_ty.equal_to(&arg_ty) {
                continue;
            }
            let key = format!("{arg_ty}_to_{param_ty}");
            if doc.find_conversion(&key).is_none() {
                continue;
            }
            let conv_call = doc.tree.add_node(Node::new(NodeKind::FunctionCall {
                kind: FunctionCallKind::Conversion,
                name: key,
                arg_types: vec![arg_ty],
                return_ty: Some(param_ty),
            }));
            doc.tree.node_mut(conv_call).loc = doc.tree.node(*arg).loc.clone();
            doc.tree.replace_node(*arg, conv_call);
            doc.tree.add_child(conv_call, *arg);
        }

        // Refresh the recorded argument types.
        let new_types: Vec<_> = doc
            .tree
            .children(call)
            .iter()
            .filter_map(|a| doc.tree.ty(*a).cloned())
            .collect();
        if let NodeKind::FunctionCall { arg_types, .. } = doc.tree.kind_mut(call) {
            *arg_types = new_types;
        }
    }
}

impl Pass for ConversionInserter {
    fn name(&self) -> &'static str {
        "conversion-inserter"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if matches!(doc.tree.kind(node), NodeKind::FunctionCall { .. }) {
                self.process_call(doc, node);
            }
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}
