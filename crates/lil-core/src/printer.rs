//! Renders nodes back to LIL-flavored source text.
//!
//! Used by the verbose tree-printing pass and by diagnostics in tests.
//! The output is readable rather than re-parseable: synthesized nodes
//! print the way the user would have written them.

use crate::id::NodeId;
use crate::node::{FlowControlCallKind, FlowControlKind, NodeKind, UnaryExpressionKind};
use crate::tree::NodeTree;

/// One-line rendering of a node.
pub fn node_to_string(tree: &NodeTree, id: NodeId) -> String {
    let node = tree.node(id);
    match &node.kind {
        NodeKind::Root { .. } => "root".into(),
        NodeKind::BoolLiteral { value } => value.to_string(),
        NodeKind::NumberLiteral { value } | NodeKind::PercentageLiteral { value } => value.clone(),
        NodeKind::StringLiteral { value, is_cstring } => {
            if *is_cstring {
                format!("`{value}`")
            } else {
                format!("\"{value}\"")
            }
        }
        NodeKind::StringFunction { start, mids, end } => {
            let mut out = format!("\"{start}%{{");
            let children = tree.children(id);
            for (i, child) in children.iter().enumerate() {
                out.push_str(&node_to_string(tree, *child));
                out.push_str("}%");
                if let Some(mid) = mids.get(i) {
                    out.push_str(mid);
                    out.push_str("%{");
                }
            }
            out.push_str(end);
            out.push('"');
            out
        }
        NodeKind::NullLiteral => "null".into(),
        NodeKind::VarName { name } | NodeKind::PropertyName { name } => name.clone(),
        NodeKind::ValuePath { .. } => {
            let parts: Vec<String> = tree
                .children(id)
                .iter()
                .map(|c| node_to_string(tree, *c))
                .collect();
            parts.join(".")
        }
        NodeKind::VarDecl {
            name, init_vals, ..
        } => {
            let mut out = format!("var {name}");
            if let Some(ty) = &node.ty {
                out.push_str(&format!(": {ty}"));
            }
            if let Some(first) = init_vals.first() {
                out.push_str(" = ");
                out.push_str(&node_to_string(tree, *first));
            }
            out
        }
        NodeKind::AliasDecl { src_ty, dst_ty } => format!(
            "alias {} => {}",
            src_ty.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            dst_ty.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        ),
        NodeKind::TypeDecl { src_ty, dst_ty } => format!(
            "type {} => {}",
            src_ty.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            dst_ty.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        ),
        NodeKind::ConversionDecl { src_ty, dst_ty, .. } => format!(
            "conversion {} => {}",
            src_ty.as_ref().map(|t| t.to_string()).unwrap_or_default(),
            dst_ty.as_ref().map(|t| t.to_string()).unwrap_or_default(),
        ),
        NodeKind::EnumDecl { name } => format!("enum {name}"),
        NodeKind::ClassDecl { .. } => {
            let name = node.ty.as_ref().map(|t| t.name.clone()).unwrap_or_default();
            format!("class @{name}")
        }
        NodeKind::ObjectDefinition => {
            let name = node.ty.as_ref().map(|t| t.name.clone()).unwrap_or_default();
            let props: Vec<String> = tree
                .children(id)
                .iter()
                .map(|c| node_to_string(tree, *c))
                .collect();
            format!("@{name} {{ {} }}", props.join("; "))
        }
        NodeKind::ValueList => {
            let parts: Vec<String> = tree
                .children(id)
                .iter()
                .map(|c| node_to_string(tree, *c))
                .collect();
            parts.join(", ")
        }
        NodeKind::Assignment { subject, value } => {
            let subject = subject
                .map(|s| node_to_string(tree, s))
                .unwrap_or_default();
            match value {
                Some(v) => format!("{subject}: {}", node_to_string(tree, *v)),
                None => subject,
            }
        }
        NodeKind::Expression { op, lhs, rhs } => {
            let lhs = lhs.map(|n| node_to_string(tree, n)).unwrap_or_default();
            let rhs = rhs.map(|n| node_to_string(tree, n)).unwrap_or_default();
            format!("{lhs} {} {rhs}", op.symbol())
        }
        NodeKind::UnaryExpression { op, value } => {
            let value = value.map(|n| node_to_string(tree, n)).unwrap_or_default();
            match op {
                UnaryExpressionKind::Sign => format!("-{value}"),
                UnaryExpressionKind::Not => format!("!{value}"),
            }
        }
        NodeKind::Rule { .. } => "rule".into(),
        NodeKind::SelectorChain | NodeKind::SimpleSelector => {
            let parts: Vec<String> = tree
                .children(id)
                .iter()
                .map(|c| node_to_string(tree, *c))
                .collect();
            parts.join(" ")
        }
        NodeKind::Selector { name, .. } => name.clone(),
        NodeKind::Combinator { .. } => "..".into(),
        NodeKind::Filter { name } => format!(":{name}"),
        NodeKind::Flag { name } => format!("::{name}"),
        NodeKind::FlowControl { kind, .. } => match kind {
            FlowControlKind::If => "if",
            FlowControlKind::IfIs => "if is",
            FlowControlKind::IfCast => "if cast",
            FlowControlKind::Else => "else",
            FlowControlKind::Switch => "switch",
            FlowControlKind::Case => "case",
            FlowControlKind::Default => "default",
            FlowControlKind::Loop => "loop",
            FlowControlKind::For => "for",
            FlowControlKind::Finally => "finally",
        }
        .into(),
        NodeKind::FlowControlCall { kind, argument } => {
            let kw = match kind {
                FlowControlCallKind::Return => "return",
                FlowControlCallKind::Repeat => "repeat",
                FlowControlCallKind::Continue => "continue",
                FlowControlCallKind::Break => "break",
            };
            match argument {
                Some(arg) => format!("{kw} {}", node_to_string(tree, *arg)),
                None => kw.into(),
            }
        }
        NodeKind::FunctionDecl { name, .. } => {
            format!("fn {}", name.clone().unwrap_or_default())
        }
        NodeKind::FunctionCall { name, .. } => {
            let args: Vec<String> = tree
                .children(id)
                .iter()
                .map(|c| node_to_string(tree, *c))
                .collect();
            format!("{name}({})", args.join(", "))
        }
        NodeKind::Instruction { name, .. } => format!("#{name}"),
        NodeKind::IfInstruction { .. } => "#if".into(),
        NodeKind::SnippetInstruction { name } => format!("#snippet {name}"),
        NodeKind::ForeignLang { language, .. } => format!("<{language}>"),
        NodeKind::IndexAccessor => {
            let args: Vec<String> = tree
                .children(id)
                .iter()
                .map(|c| node_to_string(tree, *c))
                .collect();
            format!("[{}]", args.join(""))
        }
        NodeKind::Documentation { .. } => "doc".into(),
        NodeKind::Type(ty) => ty.to_string(),
    }
}

/// Multi-line rendering of a whole subtree with indentation, used by
/// the verbose pass between pipeline stages.
pub fn tree_to_string(tree: &NodeTree, id: NodeId) -> String {
    let mut out = String::new();
    render(tree, id, 0, &mut out);
    out
}

fn render(tree: &NodeTree, id: NodeId, depth: usize, out: &mut String) {
    let node = tree.node(id);
    if node.hidden {
        return;
    }
    for _ in 0..depth {
        out.push_str("  ");
    }
    out.push_str(node.kind.variant_name());
    out.push_str(": ");
    out.push_str(&node_to_string(tree, id));
    out.push('\n');
    for child in tree.children(id) {
        render(tree, *child, depth + 1, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::ExpressionKind;
    use crate::ty::Ty;

    #[test]
    fn renders_var_decl() {
        let mut tree = NodeTree::new();
        let vd = tree.new_node(NodeKind::VarDecl {
            name: "x".into(),
            is_extern: false,
            is_ivar: false,
            is_vvar: false,
            is_const: false,
            init_vals: vec![],
        });
        tree.set_ty(vd, Some(Ty::make("i32")));
        let num = tree.new_node(NodeKind::NumberLiteral { value: "42".into() });
        tree.add_child(vd, num);
        if let NodeKind::VarDecl { init_vals, .. } = tree.kind_mut(vd) {
            init_vals.push(num);
        }
        assert_eq!(node_to_string(&tree, vd), "var x: i32 = 42");
    }

    #[test]
    fn renders_expression() {
        let mut tree = NodeTree::new();
        let exp = tree.new_node(NodeKind::Expression {
            op: ExpressionKind::Sum,
            lhs: None,
            rhs: None,
        });
        let a = tree.new_node(NodeKind::NumberLiteral { value: "1".into() });
        let b = tree.new_node(NodeKind::NumberLiteral { value: "2".into() });
        tree.add_child(exp, a);
        tree.add_child(exp, b);
        if let NodeKind::Expression { lhs, rhs, .. } = tree.kind_mut(exp) {
            *lhs = Some(a);
            *rhs = Some(b);
        }
        assert_eq!(node_to_string(&tree, exp), "1 + 2");
    }

    #[test]
    fn renders_value_path() {
        let mut tree = NodeTree::new();
        let vp = tree.new_node(NodeKind::ValuePath {
            prevent_emit_call_to_ivar: false,
        });
        let vn = tree.new_node(NodeKind::VarName { name: "obj".into() });
        let pn = tree.new_node(NodeKind::PropertyName { name: "x".into() });
        tree.add_child(vp, vn);
        tree.add_child(vp, pn);
        assert_eq!(node_to_string(&tree, vp), "obj.x");
    }

    #[test]
    fn hidden_nodes_are_suppressed() {
        let mut tree = NodeTree::new();
        let list = tree.new_node(NodeKind::ValueList);
        let child = tree.new_node(NodeKind::NullLiteral);
        tree.add_child(list, child);
        tree.node_mut(child).hidden = true;
        let rendered = tree_to_string(&tree, list);
        assert!(!rendered.contains("nullLiteral"));
    }
}
