//! Arena storage for AST nodes.
//!
//! Nodes live in a flat `Vec` indexed by [`NodeId`]; the parent
//! back-reference is an id rather than a pointer, which sidesteps the
//! reference cycles a pointer-based tree would need weak references
//! for. Detached nodes are simply never reclaimed -- the arena lives
//! exactly as long as its compilation unit.
//!
//! The tree enforces the single-owner invariant: a node has at most
//! one parent, and [`NodeTree::add_child`] detaches a node from its
//! previous parent before re-attaching it.

use smallvec::SmallVec;

use crate::id::NodeId;
use crate::node::{Node, NodeKind};
use crate::ty::{FnArg, Ty, TyKind};

/// The node arena.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
pub struct NodeTree {
    nodes: Vec<Node>,
}

impl NodeTree {
    pub fn new() -> NodeTree {
        NodeTree { nodes: Vec::new() }
    }

    /// Allocates a new detached node.
    pub fn add_node(&mut self, node: Node) -> NodeId {
        let id = NodeId::from(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Shorthand for allocating a node from a kind alone.
    pub fn new_node(&mut self, kind: NodeKind) -> NodeId {
        self.add_node(Node::new(kind))
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.node(id).kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.node_mut(id).kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.node(id).children
    }

    pub fn ty(&self, id: NodeId) -> Option<&Ty> {
        self.node(id).ty.as_ref()
    }

    pub fn set_ty(&mut self, id: NodeId, ty: Option<Ty>) {
        self.node_mut(id).ty = ty;
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    // -----------------------------------------------------------------
    // Parent/child maintenance
    // -----------------------------------------------------------------

    /// Takes ownership of `child` under `parent`, appending it to the
    /// child list. A child attached elsewhere is detached first so the
    /// back-reference invariant holds at every step.
    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.node_mut(parent).children.push(child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Inserts `child` at `index` in the parent's child list.
    pub fn insert_child(&mut self, parent: NodeId, index: usize, child: NodeId) {
        self.detach(child);
        self.node_mut(parent).children.insert(index, child);
        self.node_mut(child).parent = Some(parent);
    }

    /// Removes `child` from `parent`, clearing the back-reference.
    /// Also scrubs any payload role reference to the child.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        let children = &mut self.node_mut(parent).children;
        if let Some(pos) = children.iter().position(|c| *c == child) {
            children.remove(pos);
        }
        self.node_mut(child).parent = None;
        scrub_role(&mut self.node_mut(parent).kind, child);
    }

    /// Detaches a node from whatever parent currently owns it.
    pub fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            self.remove_child(parent, id);
        }
    }

    /// Moves a node to a new parent, clearing the old back-reference
    /// first.
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) {
        self.detach(child);
        self.add_child(new_parent, child);
    }

    /// Replaces the whole child list of a node. Old children are
    /// detached; new children may come from anywhere in the arena.
    pub fn set_children(&mut self, parent: NodeId, new_children: Vec<NodeId>) {
        let old: SmallVec<[NodeId; 4]> = std::mem::take(&mut self.node_mut(parent).children);
        for c in old {
            self.node_mut(c).parent = None;
        }
        for c in new_children {
            self.add_child(parent, c);
        }
    }

    // -----------------------------------------------------------------
    // Deep clone
    // -----------------------------------------------------------------

    /// Deep-copies the subtree rooted at `id`. The clone gets fresh
    /// ids throughout, its root has no parent, and every id embedded
    /// in payloads or types is remapped through the copy. Ids that
    /// point outside the subtree (for example a function type's
    /// registered callers) are kept as-is.
    pub fn deep_clone(&mut self, id: NodeId) -> NodeId {
        let mut map: Vec<(NodeId, NodeId)> = Vec::new();
        let root = self.clone_rec(id, &mut map);
        // Remap payload and type references now that the whole
        // subtree is copied.
        let lookup = |old: NodeId, map: &[(NodeId, NodeId)]| {
            map.iter().find(|(o, _)| *o == old).map(|(_, n)| *n)
        };
        for (_, new_id) in map.clone() {
            let mut node = self.nodes[new_id.index()].clone();
            remap_kind(&mut node.kind, &|old| lookup(old, &map));
            if let Some(ty) = &mut node.ty {
                remap_ty(ty, &|old| lookup(old, &map));
            }
            self.nodes[new_id.index()] = node;
        }
        self.node_mut(root).parent = None;
        root
    }

    fn clone_rec(&mut self, id: NodeId, map: &mut Vec<(NodeId, NodeId)>) -> NodeId {
        let mut copy = self.node(id).clone();
        copy.children = SmallVec::new();
        copy.parent = None;
        let new_id = self.add_node(copy);
        map.push((id, new_id));
        let children: Vec<NodeId> = self.node(id).children.to_vec();
        for child in children {
            let new_child = self.clone_rec(child, map);
            self.node_mut(new_id).children.push(new_child);
            self.node_mut(new_child).parent = Some(new_id);
        }
        new_id
    }

    /// Swaps `new` into the position `old` occupies under its parent,
    /// updating the child list and any payload role reference. `old`
    /// is left detached.
    pub fn replace_node(&mut self, old: NodeId, new: NodeId) {
        let Some(parent) = self.parent(old) else {
            return;
        };
        self.detach(new);
        let children = &mut self.node_mut(parent).children;
        if let Some(pos) = children.iter().position(|c| *c == old) {
            children[pos] = new;
        }
        self.node_mut(old).parent = None;
        self.node_mut(new).parent = Some(parent);
        let lookup = move |id: NodeId| if id == old { Some(new) } else { None };
        remap_kind(&mut self.node_mut(parent).kind, &lookup);
        if let Some(ty) = self.node_mut(parent).ty.as_mut() {
            remap_ty(ty, &lookup);
        }
    }

    /// Copies the subtree rooted at `id` out of `other` into this
    /// arena, remapping every embedded id. The returned root is
    /// detached. Used when splicing imported declarations into the
    /// importing unit.
    pub fn import_subtree(&mut self, other: &NodeTree, id: NodeId) -> NodeId {
        let mut map: Vec<(NodeId, NodeId)> = Vec::new();
        let root = self.import_rec(other, id, &mut map);
        let lookup = |old: NodeId, map: &[(NodeId, NodeId)]| {
            map.iter().find(|(o, _)| *o == old).map(|(_, n)| *n)
        };
        for (_, new_id) in map.clone() {
            let mut node = self.nodes[new_id.index()].clone();
            remap_kind(&mut node.kind, &|old| lookup(old, &map));
            if let Some(ty) = &mut node.ty {
                remap_ty(ty, &|old| lookup(old, &map));
            }
            self.nodes[new_id.index()] = node;
        }
        self.node_mut(root).parent = None;
        root
    }

    fn import_rec(
        &mut self,
        other: &NodeTree,
        id: NodeId,
        map: &mut Vec<(NodeId, NodeId)>,
    ) -> NodeId {
        let mut copy = other.node(id).clone();
        copy.children = SmallVec::new();
        copy.parent = None;
        // Callers registered in the source arena are meaningless here.
        if let Some(ty) = &mut copy.ty {
            clear_foreign_callers(ty);
        }
        let new_id = self.add_node(copy);
        map.push((id, new_id));
        for child in other.children(id) {
            let new_child = self.import_rec(other, *child, map);
            self.node_mut(new_id).children.push(new_child);
            self.node_mut(new_child).parent = Some(new_id);
        }
        new_id
    }

    // -----------------------------------------------------------------
    // Content equality
    // -----------------------------------------------------------------

    /// Content equality: variant tag, scalar payload, type, and the
    /// recursive child structure. Parent back-references, source
    /// locations, and the hidden flag are excluded.
    pub fn node_equals(&self, a: NodeId, b: NodeId) -> bool {
        let na = self.node(a);
        let nb = self.node(b);
        if !na.kind.scalar_eq(&nb.kind) {
            return false;
        }
        match (&na.ty, &nb.ty) {
            (Some(ta), Some(tb)) => {
                if !ta.equal_to(tb) {
                    return false;
                }
            }
            (None, None) => {}
            _ => return false,
        }
        if na.children.len() != nb.children.len() {
            return false;
        }
        na.children
            .iter()
            .zip(nb.children.iter())
            .all(|(ca, cb)| self.node_equals(*ca, *cb))
    }

    // -----------------------------------------------------------------
    // Traversal helpers
    // -----------------------------------------------------------------

    /// Pre-order walk of the subtree, root included.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            out.push(n);
            // Push in reverse so children pop in order.
            for c in self.children(n).iter().rev() {
                stack.push(*c);
            }
        }
        out
    }

    /// Walks scope-owning ancestors (starting at `from` itself) until
    /// one declares `name`, then escalates to nothing.
    pub fn find_in_scope(&self, from: NodeId, name: &str) -> Option<NodeId> {
        let mut current = Some(from);
        while let Some(id) = current {
            if let Some(scope) = self.kind(id).local_vars() {
                if let Some(hit) = scope.get(name) {
                    return Some(*hit);
                }
            }
            current = self.parent(id);
        }
        None
    }

    /// Registers `name` in the nearest scope-owning ancestor of
    /// `from` (or `from` itself when it owns a scope).
    pub fn set_local_variable(&mut self, from: NodeId, name: &str, decl: NodeId) {
        let mut current = Some(from);
        while let Some(id) = current {
            if self.kind(id).is_scope_owner() {
                if let Some(scope) = self.kind_mut(id).local_vars_mut() {
                    scope.insert(name.to_string(), decl);
                }
                return;
            }
            current = self.parent(id);
        }
    }

    /// Nearest enclosing function declaration, if any.
    pub fn enclosing_function(&self, from: NodeId) -> Option<NodeId> {
        let mut current = self.parent(from);
        while let Some(id) = current {
            if matches!(self.kind(id), NodeKind::FunctionDecl { .. }) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }

    /// Nearest enclosing class declaration, if any.
    pub fn enclosing_class(&self, from: NodeId) -> Option<NodeId> {
        let mut current = self.parent(from);
        while let Some(id) = current {
            if matches!(self.kind(id), NodeKind::ClassDecl { .. }) {
                return Some(id);
            }
            current = self.parent(id);
        }
        None
    }
}

/// Clears payload role references equal to `child`. Role lists keep
/// their other entries; the child list itself is maintained by the
/// caller.
fn scrub_role(kind: &mut NodeKind, child: NodeId) {
    let scrub_opt = |slot: &mut Option<NodeId>| {
        if *slot == Some(child) {
            *slot = None;
        }
    };
    let scrub_list = |list: &mut Vec<NodeId>| {
        list.retain(|c| *c != child);
    };
    match kind {
        NodeKind::VarDecl { init_vals, .. } => scrub_list(init_vals),
        NodeKind::ConversionDecl {
            var_decl, body, ..
        } => {
            scrub_opt(var_decl);
            scrub_list(body);
        }
        NodeKind::ClassDecl {
            fields,
            methods,
            aliases,
            docs,
            ..
        } => {
            scrub_list(fields);
            scrub_list(methods);
            scrub_list(aliases);
            scrub_list(docs);
        }
        NodeKind::Assignment { subject, value } => {
            scrub_opt(subject);
            scrub_opt(value);
        }
        NodeKind::Expression { lhs, rhs, .. } => {
            scrub_opt(lhs);
            scrub_opt(rhs);
        }
        NodeKind::UnaryExpression { value, .. } => scrub_opt(value),
        NodeKind::Rule {
            selector_chains,
            values,
            child_rules,
        } => {
            scrub_list(selector_chains);
            scrub_list(values);
            scrub_list(child_rules);
        }
        NodeKind::FlowControl {
            args, then, els, ..
        } => {
            scrub_list(args);
            scrub_list(then);
            scrub_list(els);
        }
        NodeKind::FlowControlCall { argument, .. } => scrub_opt(argument),
        NodeKind::FunctionDecl {
            args,
            body,
            finally,
            ..
        } => {
            scrub_list(args);
            scrub_list(body);
            scrub_opt(finally);
        }
        NodeKind::Instruction { argument, .. } => scrub_opt(argument),
        NodeKind::IfInstruction {
            condition,
            then,
            els,
            ..
        } => {
            scrub_opt(condition);
            scrub_list(then);
            scrub_list(els);
        }
        _ => {}
    }
}

/// Rewrites every id in a payload through the clone map.
fn remap_kind(kind: &mut NodeKind, lookup: &dyn Fn(NodeId) -> Option<NodeId>) {
    let remap_opt = |slot: &mut Option<NodeId>| {
        if let Some(old) = slot {
            if let Some(new) = lookup(*old) {
                *slot = Some(new);
            }
        }
    };
    let remap_list = |list: &mut Vec<NodeId>| {
        for entry in list {
            if let Some(new) = lookup(*entry) {
                *entry = new;
            }
        }
    };
    match kind {
        NodeKind::Root { local_vars } => {
            for (_, v) in local_vars.iter_mut() {
                if let Some(new) = lookup(*v) {
                    *v = new;
                }
            }
        }
        NodeKind::VarDecl { init_vals, .. } => remap_list(init_vals),
        NodeKind::ConversionDecl {
            var_decl,
            body,
            local_vars,
            ..
        } => {
            remap_opt(var_decl);
            remap_list(body);
            for (_, v) in local_vars.iter_mut() {
                if let Some(new) = lookup(*v) {
                    *v = new;
                }
            }
        }
        NodeKind::ClassDecl {
            fields,
            methods,
            aliases,
            docs,
            local_vars,
            ..
        } => {
            remap_list(fields);
            remap_list(methods);
            remap_list(aliases);
            remap_list(docs);
            for (_, v) in local_vars.iter_mut() {
                if let Some(new) = lookup(*v) {
                    *v = new;
                }
            }
        }
        NodeKind::Assignment { subject, value } => {
            remap_opt(subject);
            remap_opt(value);
        }
        NodeKind::Expression { lhs, rhs, .. } => {
            remap_opt(lhs);
            remap_opt(rhs);
        }
        NodeKind::UnaryExpression { value, .. } => remap_opt(value),
        NodeKind::Rule {
            selector_chains,
            values,
            child_rules,
        } => {
            remap_list(selector_chains);
            remap_list(values);
            remap_list(child_rules);
        }
        NodeKind::FlowControl {
            args,
            then,
            els,
            local_vars,
            ..
        } => {
            remap_list(args);
            remap_list(then);
            remap_list(els);
            for (_, v) in local_vars.iter_mut() {
                if let Some(new) = lookup(*v) {
                    *v = new;
                }
            }
        }
        NodeKind::FlowControlCall { argument, .. } => remap_opt(argument),
        NodeKind::FunctionDecl {
            args,
            body,
            finally,
            local_vars,
            ..
        } => {
            remap_list(args);
            remap_list(body);
            remap_opt(finally);
            for (_, v) in local_vars.iter_mut() {
                if let Some(new) = lookup(*v) {
                    *v = new;
                }
            }
        }
        NodeKind::Instruction { argument, .. } => remap_opt(argument),
        NodeKind::IfInstruction {
            condition,
            then,
            els,
            ..
        } => {
            remap_opt(condition);
            remap_list(then);
            remap_list(els);
        }
        NodeKind::Type(ty) => remap_ty(ty, lookup),
        _ => {}
    }
}

/// Drops caller back-references that point into a different arena.
fn clear_foreign_callers(ty: &mut Ty) {
    for p in &mut ty.tmpl_params {
        clear_foreign_callers(p);
    }
    match &mut ty.kind {
        TyKind::Multiple { types, .. } => {
            for t in types {
                clear_foreign_callers(t);
            }
        }
        TyKind::Function {
            args,
            return_ty,
            callers,
            ..
        } => {
            callers.clear();
            for arg in args {
                if let FnArg::Ty(t) = arg {
                    clear_foreign_callers(t);
                }
            }
            if let Some(ret) = return_ty {
                clear_foreign_callers(ret);
            }
        }
        TyKind::Pointer { arg } => {
            if let Some(p) = arg {
                clear_foreign_callers(p);
            }
        }
        TyKind::Object { fields } => {
            for f in fields {
                clear_foreign_callers(f);
            }
        }
        TyKind::StaticArray { elem, .. } | TyKind::Simd { elem, .. } => {
            clear_foreign_callers(elem);
        }
        TyKind::Single => {}
    }
}

/// Rewrites ids embedded in a type (function-argument declarations and
/// caller back-references) through the clone map. Ids pointing outside
/// the cloned subtree stay untouched.
fn remap_ty(ty: &mut Ty, lookup: &dyn Fn(NodeId) -> Option<NodeId>) {
    for p in &mut ty.tmpl_params {
        remap_ty(p, lookup);
    }
    match &mut ty.kind {
        TyKind::Multiple { types, .. } => {
            for t in types {
                remap_ty(t, lookup);
            }
        }
        TyKind::Function {
            args,
            return_ty,
            callers,
            ..
        } => {
            for arg in args {
                match arg {
                    FnArg::Ty(t) => remap_ty(t, lookup),
                    FnArg::Decl(id) => {
                        if let Some(new) = lookup(*id) {
                            *id = new;
                        }
                    }
                }
            }
            if let Some(ret) = return_ty {
                remap_ty(ret, lookup);
            }
            for caller in callers {
                if let Some(new) = lookup(*caller) {
                    *caller = new;
                }
            }
        }
        TyKind::Pointer { arg } => {
            if let Some(p) = arg {
                remap_ty(p, lookup);
            }
        }
        TyKind::Object { fields } => {
            for f in fields {
                remap_ty(f, lookup);
            }
        }
        TyKind::StaticArray { elem, .. } => remap_ty(elem, lookup),
        TyKind::Simd { elem, .. } => remap_ty(elem, lookup),
        TyKind::Single => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ExpressionKind, ScopeTable};
    use crate::ty::Ty;

    fn var_name(tree: &mut NodeTree, name: &str) -> NodeId {
        tree.new_node(NodeKind::VarName { name: name.into() })
    }

    #[test]
    fn add_child_sets_backref() {
        let mut tree = NodeTree::new();
        let parent = tree.new_node(NodeKind::ValueList);
        let child = var_name(&mut tree, "x");
        tree.add_child(parent, child);
        assert_eq!(tree.parent(child), Some(parent));
        assert_eq!(tree.children(parent), &[child]);
    }

    #[test]
    fn remove_child_clears_backref() {
        let mut tree = NodeTree::new();
        let parent = tree.new_node(NodeKind::ValueList);
        let child = var_name(&mut tree, "x");
        tree.add_child(parent, child);
        tree.remove_child(parent, child);
        assert_eq!(tree.parent(child), None);
        assert!(tree.children(parent).is_empty());
    }

    #[test]
    fn reparent_moves_between_parents() {
        let mut tree = NodeTree::new();
        let a = tree.new_node(NodeKind::ValueList);
        let b = tree.new_node(NodeKind::ValueList);
        let child = var_name(&mut tree, "x");
        tree.add_child(a, child);
        tree.reparent(child, b);
        assert_eq!(tree.parent(child), Some(b));
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[child]);
    }

    #[test]
    fn add_child_twice_does_not_duplicate() {
        let mut tree = NodeTree::new();
        let a = tree.new_node(NodeKind::ValueList);
        let b = tree.new_node(NodeKind::ValueList);
        let child = var_name(&mut tree, "x");
        tree.add_child(a, child);
        tree.add_child(b, child);
        // No node appears in two children lists.
        assert!(tree.children(a).is_empty());
        assert_eq!(tree.children(b), &[child]);
    }

    #[test]
    fn deep_clone_is_equal_and_disjoint() {
        let mut tree = NodeTree::new();
        let exp = tree.new_node(NodeKind::Expression {
            op: ExpressionKind::Sum,
            lhs: None,
            rhs: None,
        });
        let lhs = tree.new_node(NodeKind::NumberLiteral { value: "1".into() });
        tree.set_ty(lhs, Some(Ty::weak_number()));
        let rhs = tree.new_node(NodeKind::NumberLiteral { value: "2".into() });
        tree.add_child(exp, lhs);
        tree.add_child(exp, rhs);
        if let NodeKind::Expression { lhs: l, rhs: r, .. } = tree.kind_mut(exp) {
            *l = Some(lhs);
            *r = Some(rhs);
        }

        let copy = tree.deep_clone(exp);
        assert!(tree.node_equals(exp, copy));
        assert_eq!(tree.parent(copy), None);

        // The clone's role references point inside the clone.
        let (cl, cr) = match tree.kind(copy) {
            NodeKind::Expression { lhs, rhs, .. } => (lhs.unwrap(), rhs.unwrap()),
            _ => panic!("expected expression"),
        };
        assert_ne!(cl, lhs);
        assert_ne!(cr, rhs);
        assert_eq!(tree.parent(cl), Some(copy));
        assert_eq!(tree.parent(cr), Some(copy));
    }

    #[test]
    fn clone_descendant_backrefs_stay_inside_clone() {
        let mut tree = NodeTree::new();
        let outer = tree.new_node(NodeKind::ValueList);
        let inner = tree.new_node(NodeKind::ValueList);
        let leaf = var_name(&mut tree, "deep");
        tree.add_child(outer, inner);
        tree.add_child(inner, leaf);

        let copy = tree.deep_clone(outer);
        let originals = tree.descendants(outer);
        for d in tree.descendants(copy) {
            if let Some(p) = tree.parent(d) {
                assert!(!originals.contains(&p));
            }
            assert!(!originals.contains(&d));
        }
    }

    #[test]
    fn node_equality_ignores_location_and_hidden() {
        let mut tree = NodeTree::new();
        let a = var_name(&mut tree, "x");
        let b = var_name(&mut tree, "x");
        tree.node_mut(b).hidden = true;
        tree.node_mut(b).loc.line = 99;
        assert!(tree.node_equals(a, b));
    }

    #[test]
    fn node_equality_checks_children() {
        let mut tree = NodeTree::new();
        let a = tree.new_node(NodeKind::ValueList);
        let b = tree.new_node(NodeKind::ValueList);
        let child = var_name(&mut tree, "x");
        tree.add_child(a, child);
        assert!(!tree.node_equals(a, b));
    }

    #[test]
    fn scope_lookup_walks_outward() {
        let mut tree = NodeTree::new();
        let root = tree.new_node(NodeKind::Root {
            local_vars: ScopeTable::new(),
        });
        let fd = tree.new_node(NodeKind::FunctionDecl {
            kind: crate::node::FunctionDeclKind::Fn,
            name: Some("f".into()),
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: false,
            args: vec![],
            body: vec![],
            finally: None,
            local_vars: ScopeTable::new(),
        });
        tree.add_child(root, fd);
        let decl_outer = var_name(&mut tree, "outer-decl");
        let decl_inner = var_name(&mut tree, "inner-decl");
        tree.set_local_variable(root, "x", decl_outer);
        tree.set_local_variable(fd, "y", decl_inner);

        let use_site = var_name(&mut tree, "y");
        tree.add_child(fd, use_site);

        assert_eq!(tree.find_in_scope(use_site, "y"), Some(decl_inner));
        assert_eq!(tree.find_in_scope(use_site, "x"), Some(decl_outer));
        assert_eq!(tree.find_in_scope(use_site, "z"), None);
    }

    #[test]
    fn shadowing_finds_nearest_declaration() {
        let mut tree = NodeTree::new();
        let root = tree.new_node(NodeKind::Root {
            local_vars: ScopeTable::new(),
        });
        let fd = tree.new_node(NodeKind::FunctionDecl {
            kind: crate::node::FunctionDeclKind::Fn,
            name: None,
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: false,
            args: vec![],
            body: vec![],
            finally: None,
            local_vars: ScopeTable::new(),
        });
        tree.add_child(root, fd);
        let outer = var_name(&mut tree, "outer");
        let inner = var_name(&mut tree, "inner");
        tree.set_local_variable(root, "x", outer);
        tree.set_local_variable(fd, "x", inner);

        let use_site = var_name(&mut tree, "x");
        tree.add_child(fd, use_site);
        assert_eq!(tree.find_in_scope(use_site, "x"), Some(inner));
    }

    #[test]
    fn replace_node_updates_roles() {
        let mut tree = NodeTree::new();
        let exp = tree.new_node(NodeKind::Expression {
            op: ExpressionKind::Sum,
            lhs: None,
            rhs: None,
        });
        let old = tree.new_node(NodeKind::NumberLiteral { value: "1".into() });
        tree.add_child(exp, old);
        if let NodeKind::Expression { lhs, .. } = tree.kind_mut(exp) {
            *lhs = Some(old);
        }
        let new = tree.new_node(NodeKind::NumberLiteral { value: "2".into() });
        tree.replace_node(old, new);
        assert_eq!(tree.children(exp), &[new]);
        assert_eq!(tree.parent(new), Some(exp));
        assert_eq!(tree.parent(old), None);
        assert!(matches!(
            tree.kind(exp),
            NodeKind::Expression { lhs: Some(l), .. } if *l == new
        ));
    }

    #[test]
    fn import_subtree_copies_across_arenas() {
        let mut src = NodeTree::new();
        let list = src.new_node(NodeKind::ValueList);
        let child = var_name(&mut src, "imported");
        src.add_child(list, child);

        let mut dst = NodeTree::new();
        let _occupant = var_name(&mut dst, "occupant");
        let copy = dst.import_subtree(&src, list);
        assert_eq!(dst.parent(copy), None);
        assert_eq!(dst.children(copy).len(), 1);
        let copied_child = dst.children(copy)[0];
        assert!(matches!(
            dst.kind(copied_child),
            NodeKind::VarName { name } if name == "imported"
        ));
    }

    #[test]
    fn descendants_preorder() {
        let mut tree = NodeTree::new();
        let root = tree.new_node(NodeKind::ValueList);
        let a = var_name(&mut tree, "a");
        let b = tree.new_node(NodeKind::ValueList);
        let c = var_name(&mut tree, "c");
        tree.add_child(root, a);
        tree.add_child(root, b);
        tree.add_child(b, c);
        assert_eq!(tree.descendants(root), vec![root, a, b, c]);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        /// A recipe for a small tree: each entry is (depth, name); a
        /// node becomes a child of the most recent shallower entry.
        fn build_from_recipe(recipe: &[(u8, String)]) -> (NodeTree, NodeId) {
            let mut tree = NodeTree::new();
            let root = tree.new_node(NodeKind::ValueList);
            let mut stack: Vec<(u8, NodeId)> = vec![(0, root)];
            for (depth, name) in recipe {
                let depth = depth % 4 + 1;
                while stack.last().map(|(d, _)| *d >= depth).unwrap_or(false) {
                    stack.pop();
                }
                let parent = stack.last().map(|(_, id)| *id).unwrap_or(root);
                let node = tree.new_node(NodeKind::VarName { name: name.clone() });
                tree.add_child(parent, node);
                stack.push((depth, node));
            }
            (tree, root)
        }

        proptest! {
            #[test]
            fn clone_is_a_congruence(
                recipe in prop::collection::vec(
                    (any::<u8>(), "[a-z]{1,6}"),
                    0..12
                )
            ) {
                let (mut tree, root) = build_from_recipe(&recipe);
                let copy = tree.deep_clone(root);
                prop_assert!(tree.node_equals(root, copy));
                // Every descendant's parent points inside the clone.
                let originals = tree.descendants(root);
                for d in tree.descendants(copy) {
                    prop_assert!(!originals.contains(&d));
                    if d != copy {
                        let p = tree.parent(d).expect("child has a parent");
                        prop_assert!(!originals.contains(&p));
                    }
                }
            }

            #[test]
            fn children_have_exactly_one_owner(
                recipe in prop::collection::vec(
                    (any::<u8>(), "[a-z]{1,6}"),
                    1..12
                ),
                moves in prop::collection::vec((any::<u8>(), any::<u8>()), 0..6)
            ) {
                let (mut tree, root) = build_from_recipe(&recipe);
                // Random reparenting within the tree.
                let all = tree.descendants(root);
                for (from, to) in moves {
                    let child = all[1 + (from as usize) % (all.len() - 1).max(1)];
                    let parent = all[(to as usize) % all.len()];
                    // Do not create cycles: skip when parent sits
                    // under child.
                    if tree.descendants(child).contains(&parent) {
                        continue;
                    }
                    tree.reparent(child, parent);
                }
                // Invariant: each node appears in at most one child
                // list, and that list belongs to its parent.
                for id in 0..tree.len() {
                    let id = NodeId::from(id);
                    let owners: Vec<NodeId> = (0..tree.len())
                        .map(NodeId::from)
                        .filter(|p| tree.children(*p).contains(&id))
                        .collect();
                    prop_assert!(owners.len() <= 1);
                    match tree.parent(id) {
                        Some(p) => prop_assert_eq!(owners, vec![p]),
                        None => prop_assert!(owners.is_empty()),
                    }
                }
            }
        }
    }
}
