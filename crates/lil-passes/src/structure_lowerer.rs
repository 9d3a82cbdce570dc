//! Union-argument specialization.
//!
//! A function whose type carries a strong multiple-typed argument is
//! specialized once per member of the union: each specialization takes
//! the concrete member type in place of the union and is flagged for
//! name mangling. Inside a specialization, `if x is T` blocks on the
//! specialized argument are reduced statically -- the matching branch
//! is spliced in, the other dropped.
//!
//! Specializations join the overload set of the wrapping declaration,
//! one initializer per argument-type tuple.

use lil_core::{
    Diagnostic, Document, FlowControlKind, FnArg, NodeId, NodeKind, Ty, TyKind,
};

use crate::visitor::Pass;

#[derive(Default)]
pub struct StructureLowerer {
    errors: Vec<Diagnostic>,
}

impl StructureLowerer {
    pub fn new() -> StructureLowerer {
        StructureLowerer::default()
    }

    fn process_function(&mut self, doc: &mut Document, fd: NodeId) {
        let Some(fn_ty) = doc.tree.ty(fd).cloned() else {
            return;
        };
        if !fn_ty.is_function() {
            return;
        }
        // Only functions wrapped in a declaration can host an overload set.
        let Some(wrapper) = doc.tree.parent(fd) else {
            return;
        };
        if !matches!(doc.tree.kind(wrapper), NodeKind::VarDecl { .. }) {
            return;
        }

        for arg in fn_ty.fn_args() {
            let arg_ty = match arg {
                FnArg::Decl(id) => doc.tree.ty(*id).cloned(),
                FnArg::Ty(ty) => Some((**ty).clone()),
            };
            let Some(arg_ty) = arg_ty else {
                continue;
            };
            let TyKind::Multiple {
                types: members,
                is_weak: false,
            } = &arg_ty.kind
            else {
                continue;
            };
            let arg_name = match arg {
                FnArg::Decl(id) => match doc.tree.kind(*id) {
                    NodeKind::VarDecl { name, .. } => name.clone(),
                    _ => continue,
                },
                FnArg::Ty(_) => continue,
            };
            for member in members.clone() {
                let spec = self.specialize(doc, fd, &arg_name, &member);
                doc.tree.add_child(wrapper, spec);
                if let NodeKind::VarDecl { init_vals, .. } = doc.tree.kind_mut(wrapper) {
                    init_vals.push(spec);
                }
            }
        }
    }

    /// Clones `fd`, narrows the union-typed argument to `member`, and
    /// reduces `if is` blocks over it.
    fn specialize(&mut self, doc: &mut Document, fd: NodeId, arg_name: &str, member: &Ty) -> NodeId {
        let spec = doc.tree.deep_clone(fd);
        if let NodeKind::FunctionDecl {
            needs_name_mangling,
            ..
        } = doc.tree.kind_mut(spec)
        {
            *needs_name_mangling = true;
        }

        // Narrow the cloned argument declarations.
        let args: Vec<NodeId> = match doc.tree.kind(spec) {
            NodeKind::FunctionDecl { args, .. } => args.clone(),
            _ => Vec::new(),
        };
        for arg in &args {
            let is_multi = doc
                .tree
                .ty(*arg)
                .map(|t| t.is_multiple() && !t.is_weak())
                .unwrap_or(false);
            let names_match = matches!(
                doc.tree.kind(*arg),
                NodeKind::VarDecl { name, .. } if name == arg_name
            );
            if is_multi && names_match {
                doc.tree.set_ty(*arg, Some(member.clone()));
            }
        }
        // And the bare type entries of the signature.
        if let Some(ty) = doc.tree.node_mut(spec).ty.as_mut() {
            if let TyKind::Function { args, .. } = &mut ty.kind {
                for entry in args {
                    if let FnArg::Ty(arg_ty) = entry {
                        if arg_ty.is_multiple() && !arg_ty.is_weak() {
                            *entry = FnArg::Ty(Box::new(member.clone()));
                        }
                    }
                }
            }
        }

        // Statically reduce `if <arg> is T` over the now-known type.
        let body: Vec<NodeId> = match doc.tree.kind(spec) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => Vec::new(),
        };
        let mut new_body: Vec<NodeId> = Vec::new();
        for stmt in body {
            new_body.extend(self.reduce_if_is(doc, stmt, arg_name, &member.name));
        }
        let keep_children: Vec<NodeId> = {
            let (args, finally) = match doc.tree.kind(spec) {
                NodeKind::FunctionDecl { args, finally, .. } => (args.clone(), *finally),
                _ => (Vec::new(), None),
            };
            args.into_iter()
                .chain(new_body.iter().copied())
                .chain(finally)
                .collect()
        };
        doc.tree.set_children(spec, keep_children);
        if let NodeKind::FunctionDecl { body, .. } = doc.tree.kind_mut(spec) {
            *body = new_body;
        }
        spec
    }

    /// Reduces an `if <arg_name> is <ty>` block against the known
    /// member type; other nodes pass through unchanged.
    fn reduce_if_is(
        &mut self,
        doc: &mut Document,
        node: NodeId,
        arg_name: &str,
        ty_name: &str,
    ) -> Vec<NodeId> {
        let (args, then, els) = match doc.tree.kind(node) {
            NodeKind::FlowControl {
                kind: FlowControlKind::IfIs,
                args,
                then,
                els,
                ..
            } => (args.clone(), then.clone(), els.clone()),
            _ => return vec![node],
        };
        let on_arg = args.first().is_some_and(|a| {
            matches!(doc.tree.kind(*a), NodeKind::VarName { name } if name == arg_name)
        });
        if !on_arg {
            return vec![node];
        }
        let matches_ty = args.last().is_some_and(|a| {
            matches!(doc.tree.kind(*a), NodeKind::Type(ty) if ty.name == ty_name)
        });
        let branch = if matches_ty { then } else { els };
        let mut out = Vec::new();
        for stmt in branch {
            doc.tree.detach(stmt);
            out.extend(self.reduce_if_is(doc, stmt, arg_name, ty_name));
        }
        doc.tree.detach(node);
        out
    }
}

impl Pass for StructureLowerer {
    fn name(&self) -> &'static str {
        "structure-lowerer"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if matches!(doc.tree.kind(node), NodeKind::FunctionDecl { .. }) {
                self.process_function(doc, node);
            }
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lil_core::{FunctionDeclKind, Node, ScopeTable};

    /// `fn describe(x: i64|str) { if x is i64 { <a> } else { <b> } }`
    fn fixture() -> (Document, NodeId) {
        let mut doc = Document::new();
        let union = Ty {
            kind: TyKind::Multiple {
                types: vec![Ty::make("i64"), Ty::make("str")],
                is_weak: false,
            },
            name: String::new(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        };
        let param = doc.tree.add_node(Node::new(NodeKind::VarDecl {
            name: "x".into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![],
        }));
        doc.tree.set_ty(param, Some(union));

        // if x is i64 { var whenInt } else { var whenStr }
        let cond_vn = doc.tree.add_node(Node::new(NodeKind::VarName { name: "x".into() }));
        let cond_ty = doc.tree.add_node(Node::new(NodeKind::Type(Ty::make("i64"))));
        let then_stmt = doc.tree.add_node(Node::new(NodeKind::VarDecl {
            name: "whenInt".into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![],
        }));
        let else_stmt = doc.tree.add_node(Node::new(NodeKind::VarDecl {
            name: "whenStr".into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![],
        }));
        let if_is = doc.tree.add_node(Node::new(NodeKind::FlowControl {
            kind: FlowControlKind::IfIs,
            receives_function_body: true,
            receives_else: true,
            args: vec![cond_vn, cond_ty],
            then: vec![then_stmt],
            els: vec![else_stmt],
            local_vars: ScopeTable::new(),
        }));
        for c in [cond_vn, cond_ty, then_stmt, else_stmt] {
            doc.tree.add_child(if_is, c);
        }

        let mut fn_ty = Ty::make_fn();
        fn_ty.add_fn_arg(FnArg::Decl(param));
        fn_ty.set_return_ty(Ty::make("null"));
        let fd = doc.tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: FunctionDeclKind::Fn,
            name: Some("describe".into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: vec![param],
            body: vec![if_is],
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(fd, Some(fn_ty.clone()));
        doc.tree.add_child(fd, param);
        doc.tree.add_child(fd, if_is);

        let wrapper = doc.tree.add_node(Node::new(NodeKind::VarDecl {
            name: "describe".into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![fd],
        }));
        doc.tree.set_ty(wrapper, Some(fn_ty));
        doc.tree.add_child(wrapper, fd);
        doc.add_node(wrapper);
        doc.set_local_variable("describe", wrapper);
        doc.finalize();
        (doc, wrapper)
    }

    fn body_decl_names(doc: &Document, fd: NodeId) -> Vec<String> {
        let body = match doc.tree.kind(fd) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        body.iter()
            .filter_map(|n| match doc.tree.kind(*n) {
                NodeKind::VarDecl { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn emits_one_specialization_per_member() {
        let (mut doc, wrapper) = fixture();
        let mut pass = StructureLowerer::new();
        pass.perform_visit(&mut doc);
        assert!(!pass.has_errors());
        let inits = match doc.tree.kind(wrapper) {
            NodeKind::VarDecl { init_vals, .. } => init_vals.clone(),
            _ => panic!(),
        };
        // The original plus i64 and str specializations.
        assert_eq!(inits.len(), 3);
        for spec in &inits[1..] {
            assert!(matches!(
                doc.tree.kind(*spec),
                NodeKind::FunctionDecl {
                    needs_name_mangling: true,
                    ..
                }
            ));
        }
    }

    #[test]
    fn specializations_take_concrete_member_types() {
        let (mut doc, wrapper) = fixture();
        let mut pass = StructureLowerer::new();
        pass.perform_visit(&mut doc);
        let inits = match doc.tree.kind(wrapper) {
            NodeKind::VarDecl { init_vals, .. } => init_vals.clone(),
            _ => panic!(),
        };
        let arg_ty = |fd: NodeId| {
            let args = match doc.tree.kind(fd) {
                NodeKind::FunctionDecl { args, .. } => args.clone(),
                _ => panic!(),
            };
            doc.tree.ty(args[0]).unwrap().clone()
        };
        assert!(arg_ty(inits[1]).equal_to(&Ty::make("i64")));
        assert!(arg_ty(inits[2]).equal_to(&Ty::make("str")));
    }

    #[test]
    fn if_is_blocks_reduce_to_matching_branch() {
        let (mut doc, wrapper) = fixture();
        let mut pass = StructureLowerer::new();
        pass.perform_visit(&mut doc);
        let inits = match doc.tree.kind(wrapper) {
            NodeKind::VarDecl { init_vals, .. } => init_vals.clone(),
            _ => panic!(),
        };
        // i64 specialization keeps the then-branch...
        assert_eq!(body_decl_names(&doc, inits[1]), vec!["whenInt".to_string()]);
        // ...and the str specialization the else-branch.
        assert_eq!(body_decl_names(&doc, inits[2]), vec!["whenStr".to_string()]);
        // The original is untouched.
        let original_body = match doc.tree.kind(inits[0]) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        assert!(matches!(
            doc.tree.kind(original_body[0]),
            NodeKind::FlowControl {
                kind: FlowControlKind::IfIs,
                ..
            }
        ));
    }
}
