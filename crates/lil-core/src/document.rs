//! The root environment of a compilation unit.
//!
//! A [`Document`] owns the node arena and the registries the passes
//! share: the synthetic `main` function, the class list, typedef and
//! alias tables, the conversion registry, and the import dependency
//! list. Top-level statements that are not function or class
//! declarations end up in `main`'s body; a trailing `return 0` of
//! type `i64` is injected when none exists.

use indexmap::IndexMap;

use crate::id::NodeId;
use crate::node::{FlowControlCallKind, FunctionDeclKind, NodeKind, ScopeTable};
use crate::tree::NodeTree;
use crate::ty::Ty;

/// One compilation unit's AST plus its registries.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Document {
    pub tree: NodeTree,
    root: NodeId,
    main_fn: NodeId,
    main_fn_decl: NodeId,
    classes: Vec<NodeId>,
    typedefs: Vec<NodeId>,
    aliases: Vec<NodeId>,
    conversions: IndexMap<String, NodeId>,
    dependencies: Vec<NodeId>,
    finalized: bool,
}

impl Document {
    pub fn new() -> Document {
        let mut tree = NodeTree::new();
        let root = tree.new_node(NodeKind::Root {
            local_vars: ScopeTable::new(),
        });

        // The synthetic main: a VarDecl wrapping a function returning i64.
        let mut main_ty = Ty::make_fn();
        main_ty.set_return_ty(Ty::make("i64"));

        let main_fn = tree.new_node(NodeKind::FunctionDecl {
            kind: FunctionDeclKind::Fn,
            name: Some("main".into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: Vec::new(),
            body: Vec::new(),
            finally: None,
            local_vars: ScopeTable::new(),
        });
        tree.set_ty(main_fn, Some(main_ty.clone()));

        let main_fn_decl = tree.new_node(NodeKind::VarDecl {
            name: "main".into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![main_fn],
        });
        tree.set_ty(main_fn_decl, Some(main_ty));
        tree.add_child(main_fn_decl, main_fn);

        let mut doc = Document {
            tree,
            root,
            main_fn,
            main_fn_decl,
            classes: Vec::new(),
            typedefs: Vec::new(),
            aliases: Vec::new(),
            conversions: IndexMap::new(),
            dependencies: Vec::new(),
            finalized: false,
        };
        doc.set_local_variable("main", main_fn_decl);
        doc
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn main_fn(&self) -> NodeId {
        self.main_fn
    }

    pub fn main_fn_decl(&self) -> NodeId {
        self.main_fn_decl
    }

    /// Top-level nodes in insertion order.
    pub fn nodes(&self) -> &[NodeId] {
        self.tree.children(self.root)
    }

    /// Appends a top-level node.
    pub fn add_node(&mut self, id: NodeId) {
        self.tree.add_child(self.root, id);
    }

    /// Appends a statement to `main`'s body.
    pub fn add_to_main(&mut self, id: NodeId) {
        let main_fn = self.main_fn;
        self.tree.add_child(main_fn, id);
        let is_return = matches!(
            self.tree.kind(id),
            NodeKind::FlowControlCall {
                kind: FlowControlCallKind::Return,
                ..
            }
        );
        let register = match self.tree.kind(id) {
            NodeKind::VarDecl { name, .. } => Some(name.clone()),
            _ => None,
        };
        if let NodeKind::FunctionDecl {
            body, has_return, ..
        } = self.tree.kind_mut(main_fn)
        {
            body.push(id);
            if is_return {
                *has_return = true;
            }
        }
        if let Some(name) = register {
            self.tree.set_local_variable(main_fn, &name, id);
        }
    }

    /// Injects the trailing `return 0` when needed and attaches the
    /// `main` declaration to the root. Idempotent.
    pub fn finalize(&mut self) {
        if self.finalized {
            return;
        }
        self.finalized = true;
        let has_return = matches!(
            self.tree.kind(self.main_fn),
            NodeKind::FunctionDecl {
                has_return: true,
                ..
            }
        );
        if !has_return {
            let zero = self.tree.new_node(NodeKind::NumberLiteral { value: "0".into() });
            self.tree.set_ty(zero, Some(Ty::make("i64")));
            let ret = self.tree.new_node(NodeKind::FlowControlCall {
                kind: FlowControlCallKind::Return,
                argument: Some(zero),
            });
            self.tree.add_child(ret, zero);
            self.add_to_main(ret);
        }
        let main_fn_decl = self.main_fn_decl;
        self.add_node(main_fn_decl);
    }

    // -----------------------------------------------------------------
    // Registries
    // -----------------------------------------------------------------

    pub fn add_class(&mut self, id: NodeId) {
        self.classes.push(id);
    }

    pub fn classes(&self) -> &[NodeId] {
        &self.classes
    }

    /// First class whose object type carries `name`.
    pub fn find_class(&self, name: &str) -> Option<NodeId> {
        self.classes.iter().copied().find(|id| {
            self.tree
                .ty(*id)
                .map(|ty| ty.name == name)
                .unwrap_or(false)
        })
    }

    pub fn add_typedef(&mut self, id: NodeId) {
        self.typedefs.push(id);
    }

    pub fn typedefs(&self) -> &[NodeId] {
        &self.typedefs
    }

    pub fn add_alias(&mut self, id: NodeId) {
        self.aliases.push(id);
    }

    pub fn aliases(&self) -> &[NodeId] {
        &self.aliases
    }

    /// Registers a conversion under its `"<srcTy>_to_<dstTy>"` key.
    pub fn add_conversion(&mut self, key: String, id: NodeId) {
        self.conversions.insert(key, id);
    }

    pub fn conversions(&self) -> &IndexMap<String, NodeId> {
        &self.conversions
    }

    pub fn find_conversion(&self, key: &str) -> Option<NodeId> {
        self.conversions.get(key).copied()
    }

    pub fn add_dependency(&mut self, id: NodeId) {
        self.dependencies.push(id);
    }

    pub fn dependencies(&self) -> &[NodeId] {
        &self.dependencies
    }

    /// Registers a top-level binding.
    pub fn set_local_variable(&mut self, name: &str, decl: NodeId) {
        let root = self.root;
        if let Some(scope) = self.tree.kind_mut(root).local_vars_mut() {
            scope.insert(name.to_string(), decl);
        }
    }

    /// Resolves `name` from `from` outward through scope-owning
    /// ancestors, escalating to the root bindings.
    pub fn find_node_for_name(&self, name: &str, from: NodeId) -> Option<NodeId> {
        self.tree.find_in_scope(from, name)
    }
}

impl Default for Document {
    fn default() -> Self {
        Document::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_document_has_main() {
        let doc = Document::new();
        let main_fn = doc.main_fn();
        assert!(matches!(
            doc.tree.kind(main_fn),
            NodeKind::FunctionDecl { name: Some(n), .. } if n == "main"
        ));
        let ty = doc.tree.ty(main_fn).unwrap();
        assert!(ty.return_ty().unwrap().equal_to(&Ty::make("i64")));
        assert_eq!(doc.find_node_for_name("main", doc.root()), Some(doc.main_fn_decl()));
    }

    #[test]
    fn finalize_injects_return_zero() {
        let mut doc = Document::new();
        doc.finalize();
        let body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        let last = *body.last().unwrap();
        assert!(matches!(
            doc.tree.kind(last),
            NodeKind::FlowControlCall {
                kind: FlowControlCallKind::Return,
                argument: Some(_)
            }
        ));
        let arg = match doc.tree.kind(last) {
            NodeKind::FlowControlCall { argument, .. } => argument.unwrap(),
            _ => panic!(),
        };
        assert!(doc.tree.ty(arg).unwrap().equal_to(&Ty::make("i64")));
        // main decl attached to root
        assert!(doc.nodes().contains(&doc.main_fn_decl()));
    }

    #[test]
    fn finalize_skips_return_when_present() {
        let mut doc = Document::new();
        let ret = doc.tree.new_node(NodeKind::FlowControlCall {
            kind: FlowControlCallKind::Return,
            argument: None,
        });
        doc.add_to_main(ret);
        doc.finalize();
        let body_len = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.len(),
            _ => panic!(),
        };
        assert_eq!(body_len, 1);
    }

    #[test]
    fn class_registry_lookup() {
        let mut doc = Document::new();
        let cd = doc.tree.new_node(NodeKind::ClassDecl {
            receives_inherits: false,
            inherit_ty: None,
            is_extern: false,
            is_template: false,
            fields: vec![],
            methods: vec![],
            aliases: vec![],
            docs: vec![],
            local_vars: ScopeTable::new(),
        });
        doc.tree.set_ty(cd, Some(Ty::make_object("point")));
        doc.add_node(cd);
        doc.add_class(cd);
        assert_eq!(doc.find_class("point"), Some(cd));
        assert_eq!(doc.find_class("missing"), None);
    }

    #[test]
    fn conversion_registry_keys() {
        let mut doc = Document::new();
        let conv = doc.tree.new_node(NodeKind::ConversionDecl {
            src_ty: Some(Ty::make("i32")),
            dst_ty: Some(Ty::make("f64")),
            var_decl: None,
            body: vec![],
            local_vars: ScopeTable::new(),
        });
        doc.add_conversion("i32_to_f64".into(), conv);
        assert_eq!(doc.find_conversion("i32_to_f64"), Some(conv));
        assert_eq!(doc.find_conversion("f64_to_i32"), None);
    }
}
