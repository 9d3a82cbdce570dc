//! Name mangling.
//!
//! Produces unique external symbols of the form
//! `_lil_[n<ns>_][c<len>_<className>_]f<len>_<name>[_<tyCode>...]`.
//! A declaration is mangled when it is a class method, when it is one
//! overload of a multi-initializer declaration, or when structure
//! lowering flagged it because an argument used to carry a union
//! type.

use lil_core::{Diagnostic, Document, NodeId, NodeKind};

use crate::helpers::{decorate, fn_arg_ty};
use crate::visitor::Pass;

#[derive(Default)]
pub struct NameLowerer {
    errors: Vec<Diagnostic>,
}

impl NameLowerer {
    pub fn new() -> NameLowerer {
        NameLowerer::default()
    }

    fn process_function(&mut self, doc: &mut Document, fd: NodeId) {
        let Some(wrapper) = doc.tree.parent(fd) else {
            return;
        };
        let wrapper_inits = match doc.tree.kind(wrapper) {
            NodeKind::VarDecl { init_vals, .. } => init_vals.len(),
            _ => return,
        };
        let Some(fn_ty) = doc.tree.ty(fd).cloned() else {
            return;
        };
        if !fn_ty.is_function() {
            return;
        }
        let name = match doc.tree.kind(fd) {
            NodeKind::FunctionDecl { name: Some(n), .. } => n.clone(),
            _ => return,
        };
        if name.starts_with("_lil_") {
            return;
        }

        let class_name = doc
            .tree
            .parent(wrapper)
            .filter(|gp| matches!(doc.tree.kind(*gp), NodeKind::ClassDecl { .. }))
            .and_then(|gp| doc.tree.ty(gp).map(|t| t.name.clone()));

        let flagged = matches!(
            doc.tree.kind(fd),
            NodeKind::FunctionDecl {
                needs_name_mangling: true,
                ..
            }
        );
        let has_multi_arg = fn_ty
            .fn_args()
            .iter()
            .any(|arg| fn_arg_ty(doc, arg).is_some_and(|t| t.is_multiple() && !t.is_weak()));
        let is_overload = wrapper_inits > 1;

        if class_name.is_none() && !flagged && !has_multi_arg && !is_overload {
            return;
        }

        let mangled = decorate(
            doc,
            "",
            class_name.as_deref().unwrap_or(""),
            &name,
            Some(&fn_ty),
        );
        if let NodeKind::FunctionDecl { name: slot, .. } = doc.tree.kind_mut(fd) {
            *slot = Some(mangled);
        }
    }
}

impl Pass for NameLowerer {
    fn name(&self) -> &'static str {
        "name-lowerer"
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
    use lil_core::{FnArg, FunctionDeclKind, Node, ScopeTable, Ty};

    fn make_fn_decl(doc: &mut Document, name: &str, arg_tys: &[Ty]) -> NodeId {
        let mut fn_ty = Ty::make_fn();
        for ty in arg_tys {
            fn_ty.add_fn_arg(FnArg::Ty(Box::new(ty.clone())));
        }
        let fd = doc.tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: FunctionDeclKind::Fn,
            name: Some(name.into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: vec![],
            body: vec![],
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(fd, Some(fn_ty));
        fd
    }

    fn wrap(doc: &mut Document, name: &str, fds: &[NodeId]) -> NodeId {
        let vd = doc.tree.add_node(Node::new(NodeKind::VarDecl {
            name: name.into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: fds.to_vec(),
        }));
        for fd in fds {
            doc.tree.add_child(vd, *fd);
        }
        vd
    }

    fn fd_name(doc: &Document, fd: NodeId) -> String {
        match doc.tree.kind(fd) {
            NodeKind::FunctionDecl { name: Some(n), .. } => n.clone(),
            _ => panic!(),
        }
    }

    #[test]
    fn plain_function_keeps_its_name() {
        let mut doc = Document::new();
        let fd = make_fn_decl(&mut doc, "solo", &[Ty::make("i32")]);
        let vd = wrap(&mut doc, "solo", &[fd]);
        doc.add_node(vd);
        doc.finalize();
        let mut pass = NameLowerer::new();
        pass.perform_visit(&mut doc);
        assert_eq!(fd_name(&doc, fd), "solo");
    }

    #[test]
    fn overload_set_members_are_mangled() {
        let mut doc = Document::new();
        let f_int = make_fn_decl(&mut doc, "f", &[Ty::make("i32")]);
        let f_str = make_fn_decl(&mut doc, "f", &[Ty::make("str")]);
        let vd = wrap(&mut doc, "f", &[f_int, f_str]);
        doc.add_node(vd);
        doc.finalize();
        let mut pass = NameLowerer::new();
        pass.perform_visit(&mut doc);
        assert_eq!(fd_name(&doc, f_int), "_lil_f1_f_a3_i32");
        assert_eq!(fd_name(&doc, f_str), "_lil_f1_f_a3_str");
    }

    #[test]
    fn class_methods_carry_the_class_name() {
        let mut doc = Document::new();
        let fd = make_fn_decl(&mut doc, "area", &[]);
        let method = wrap(&mut doc, "area", &[fd]);
        doc.tree.set_ty(method, Some(Ty::make_fn()));
        let class = doc.tree.add_node(Node::new(NodeKind::ClassDecl {
            receives_inherits: false,
            inherit_ty: None,
            is_extern: false,
            is_template: false,
            fields: vec![],
            methods: vec![method],
            aliases: vec![],
            docs: vec![],
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(class, Some(Ty::make_object("shape")));
        doc.tree.add_child(class, method);
        doc.add_node(class);
        doc.add_class(class);
        doc.finalize();
        let mut pass = NameLowerer::new();
        pass.perform_visit(&mut doc);
        assert_eq!(fd_name(&doc, fd), "_lil_c5_shape_f4_area");
    }

    #[test]
    fn flagged_specialization_is_mangled() {
        let mut doc = Document::new();
        let fd = make_fn_decl(&mut doc, "g", &[Ty::make("i64")]);
        if let NodeKind::FunctionDecl {
            needs_name_mangling,
            ..
        } = doc.tree.kind_mut(fd)
        {
            *needs_name_mangling = true;
        }
        let vd = wrap(&mut doc, "g", &[fd]);
        doc.add_node(vd);
        doc.finalize();
        let mut pass = NameLowerer::new();
        pass.perform_visit(&mut doc);
        assert_eq!(fd_name(&doc, fd), "_lil_f1_g_a3_i64");
    }

    #[test]
    fn mangling_is_idempotent() {
        let mut doc = Document::new();
        let fd = make_fn_decl(&mut doc, "h", &[Ty::make("i64")]);
        if let NodeKind::FunctionDecl {
            needs_name_mangling,
            ..
        } = doc.tree.kind_mut(fd)
        {
            *needs_name_mangling = true;
        }
        let vd = wrap(&mut doc, "h", &[fd]);
        doc.add_node(vd);
        doc.finalize();
        let mut pass = NameLowerer::new();
        pass.perform_visit(&mut doc);
        let once = fd_name(&doc, fd);
        let mut pass2 = NameLowerer::new();
        pass2.perform_visit(&mut doc);
        assert_eq!(fd_name(&doc, fd), once);
    }
}
