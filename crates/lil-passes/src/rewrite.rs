//! Splicing support for passes that replace one node with several.

use lil_core::{NodeId, NodeKind, NodeTree};

/// Replaces `old` with `replacements` in its parent's child list and
/// in whatever payload role list holds it. An empty replacement list
/// removes the node. Returns false when `old` has no parent.
pub fn splice_node(tree: &mut NodeTree, old: NodeId, replacements: &[NodeId]) -> bool {
    let Some(parent) = tree.parent(old) else {
        return false;
    };
    for r in replacements {
        tree.detach(*r);
    }
    // Child list
    let children: Vec<NodeId> = tree.children(parent).to_vec();
    let mut new_children = Vec::with_capacity(children.len() + replacements.len());
    for c in children {
        if c == old {
            new_children.extend_from_slice(replacements);
        } else {
            new_children.push(c);
        }
    }
    tree.node_mut(old).parent = None;
    for r in replacements {
        tree.node_mut(*r).parent = Some(parent);
    }
    {
        let node = tree.node_mut(parent);
        node.children.clear();
        node.children.extend(new_children.iter().copied());
    }
    splice_in_kind(&mut tree.node_mut(parent).kind, old, replacements);
    true
}

fn splice_in_list(list: &mut Vec<NodeId>, old: NodeId, replacements: &[NodeId]) {
    if let Some(pos) = list.iter().position(|c| *c == old) {
        list.splice(pos..=pos, replacements.iter().copied());
    }
}

fn splice_in_opt(slot: &mut Option<NodeId>, old: NodeId, replacements: &[NodeId]) {
    if *slot == Some(old) {
        *slot = replacements.first().copied();
    }
}

fn splice_in_kind(kind: &mut NodeKind, old: NodeId, replacements: &[NodeId]) {
    match kind {
        NodeKind::VarDecl { init_vals, .. } => splice_in_list(init_vals, old, replacements),
        NodeKind::ConversionDecl {
            var_decl, body, ..
        } => {
            splice_in_opt(var_decl, old, replacements);
            splice_in_list(body, old, replacements);
        }
        NodeKind::ClassDecl {
            fields,
            methods,
            aliases,
            docs,
            ..
        } => {
            splice_in_list(fields, old, replacements);
            splice_in_list(methods, old, replacements);
            splice_in_list(aliases, old, replacements);
            splice_in_list(docs, old, replacements);
        }
        NodeKind::Assignment { subject, value } => {
            splice_in_opt(subject, old, replacements);
            splice_in_opt(value, old, replacements);
        }
        NodeKind::Expression { lhs, rhs, .. } => {
            splice_in_opt(lhs, old, replacements);
            splice_in_opt(rhs, old, replacements);
        }
        NodeKind::UnaryExpression { value, .. } => splice_in_opt(value, old, replacements),
        NodeKind::Rule {
            selector_chains,
            values,
            child_rules,
        } => {
            splice_in_list(selector_chains, old, replacements);
            splice_in_list(values, old, replacements);
            splice_in_list(child_rules, old, replacements);
        }
        NodeKind::FlowControl {
            args, then, els, ..
        } => {
            splice_in_list(args, old, replacements);
            splice_in_list(then, old, replacements);
            splice_in_list(els, old, replacements);
        }
        NodeKind::FlowControlCall { argument, .. } => splice_in_opt(argument, old, replacements),
        NodeKind::FunctionDecl {
            args,
            body,
            finally,
            ..
        } => {
            splice_in_list(args, old, replacements);
            splice_in_list(body, old, replacements);
            splice_in_opt(finally, old, replacements);
        }
        NodeKind::Instruction { argument, .. } => splice_in_opt(argument, old, replacements),
        NodeKind::IfInstruction {
            condition,
            then,
            els,
            ..
        } => {
            splice_in_opt(condition, old, replacements);
            splice_in_list(then, old, replacements);
            splice_in_list(els, old, replacements);
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lil_core::node::FunctionDeclKind;
    use lil_core::{Node, ScopeTable};

    #[test]
    fn splice_replaces_one_with_many_in_body() {
        let mut tree = NodeTree::new();
        let fd = tree.add_node(Node::new(NodeKind::FunctionDecl {
            kind: FunctionDeclKind::Fn,
            name: None,
            is_constructor: false,
            needs_name_mangling: false,
            has_return: false,
            receives_function_body: true,
            args: vec![],
            body: vec![],
            finally: None,
            local_vars: ScopeTable::new(),
        }));
        let old = tree.new_node(NodeKind::NullLiteral);
        tree.add_child(fd, old);
        if let NodeKind::FunctionDecl { body, .. } = tree.kind_mut(fd) {
            body.push(old);
        }
        let a = tree.new_node(NodeKind::NumberLiteral { value: "1".into() });
        let b = tree.new_node(NodeKind::NumberLiteral { value: "2".into() });
        assert!(splice_node(&mut tree, old, &[a, b]));
        assert_eq!(tree.children(fd), &[a, b]);
        assert!(matches!(
            tree.kind(fd),
            NodeKind::FunctionDecl { body, .. } if body == &vec![a, b]
        ));
        assert_eq!(tree.parent(a), Some(fd));
        assert_eq!(tree.parent(old), None);
    }

    #[test]
    fn empty_splice_removes() {
        let mut tree = NodeTree::new();
        let list = tree.new_node(NodeKind::ValueList);
        let old = tree.new_node(NodeKind::NullLiteral);
        tree.add_child(list, old);
        assert!(splice_node(&mut tree, old, &[]));
        assert!(tree.children(list).is_empty());
    }
}
