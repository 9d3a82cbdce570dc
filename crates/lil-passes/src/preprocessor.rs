//! Compile-time instruction evaluation: `#if`, `#snippet` / `#paste`,
//! and `#export`.
//!
//! `#snippet name { ... }` registers a named statement list. `#paste
//! name` clones the snippet body into the paste site; every pasted
//! node takes on the paste site's source location so diagnostics point
//! at the use, not the definition. `#if` evaluates its condition from
//! literals and keeps only the chosen branch. Passes over the tree
//! repeat until no instruction rewrites remain, since a pasted body
//! may itself contain instructions.

use indexmap::IndexMap;
use lil_core::{
    Diagnostic, Document, ExpressionKind, InstructionKind, NodeId, NodeKind, SourceLocation,
    UnaryExpressionKind,
};

use crate::rewrite::splice_node;
use crate::visitor::Pass;

const MAX_ROUNDS: usize = 16;

#[derive(Default)]
pub struct Preprocessor {
    snippets: IndexMap<String, NodeId>,
    errors: Vec<Diagnostic>,
}

impl Preprocessor {
    pub fn new() -> Preprocessor {
        Preprocessor::default()
    }

    fn collect_snippets(&mut self, doc: &Document) {
        for node in doc.nodes() {
            if let NodeKind::SnippetInstruction { name } = doc.tree.kind(*node) {
                self.snippets.insert(name.clone(), *node);
            }
        }
    }

    /// Evaluates a compile-time condition from literal structure.
    /// Unknown shapes evaluate to false and report an error.
    fn evaluate(&mut self, doc: &Document, node: NodeId) -> bool {
        match doc.tree.kind(node) {
            NodeKind::BoolLiteral { value } => *value,
            NodeKind::NumberLiteral { value } => {
                value.parse::<f64>().map(|v| v != 0.0).unwrap_or(false)
            }
            NodeKind::StringLiteral { value, .. } => !value.is_empty(),
            NodeKind::NullLiteral => false,
            NodeKind::UnaryExpression {
                op: UnaryExpressionKind::Not,
                value: Some(v),
            } => !self.evaluate(doc, *v),
            NodeKind::Expression {
                op,
                lhs: Some(l),
                rhs: Some(r),
            } => {
                let op = *op;
                let (l, r) = (*l, *r);
                match op {
                    ExpressionKind::LogicalAnd => self.evaluate(doc, l) && self.evaluate(doc, r),
                    ExpressionKind::LogicalOr => self.evaluate(doc, l) || self.evaluate(doc, r),
                    ExpressionKind::EqualComparison => literal_eq(doc, l, r),
                    ExpressionKind::NotEqualComparison => !literal_eq(doc, l, r),
                    ExpressionKind::BiggerComparison
                    | ExpressionKind::BiggerOrEqualComparison
                    | ExpressionKind::SmallerComparison
                    | ExpressionKind::SmallerOrEqualComparison => {
                        let (Some(a), Some(b)) = (literal_num(doc, l), literal_num(doc, r))
                        else {
                            return false;
                        };
                        match op {
                            ExpressionKind::BiggerComparison => a > b,
                            ExpressionKind::BiggerOrEqualComparison => a >= b,
                            ExpressionKind::SmallerComparison => a < b,
                            _ => a <= b,
                        }
                    }
                    _ => false,
                }
            }
            _ => {
                let loc = doc.tree.node(node).loc.clone();
                self.errors.push(Diagnostic::new(
                    "cannot evaluate #if condition at compile time",
                    &loc,
                ));
                false
            }
        }
    }

    /// One rewriting round; returns true when anything changed.
    fn round(&mut self, doc: &mut Document) -> bool {
        let mut changed = false;
        let all: Vec<NodeId> = doc.tree.descendants(doc.root()).to_vec();
        for node in all {
            // A node rewritten earlier in the round may be detached by now.
            if doc.tree.parent(node).is_none() && node != doc.root() {
                continue;
            }
            match doc.tree.kind(node).clone() {
                NodeKind::IfInstruction {
                    condition,
                    then,
                    els,
                    ..
                } => {
                    let keep = match condition {
                        Some(cond) => {
                            if self.evaluate(doc, cond) {
                                then
                            } else {
                                els
                            }
                        }
                        None => {
                            let loc = doc.tree.node(node).loc.clone();
                            self.errors
                                .push(Diagnostic::new("#if without a condition", &loc));
                            Vec::new()
                        }
                    };
                    self.splice_at_root_or_parent(doc, node, &keep);
                    for kept in keep {
                        self.register_exported(doc, kept);
                    }
                    changed = true;
                }
                NodeKind::Instruction {
                    kind: InstructionKind::Paste,
                    name,
                    ..
                } => {
                    let loc = doc.tree.node(node).loc.clone();
                    match self.snippets.get(&name).copied() {
                        Some(snippet) => {
                            let body: Vec<NodeId> = doc.tree.children(snippet).to_vec();
                            let mut clones = Vec::with_capacity(body.len());
                            for stmt in body {
                                let clone = doc.tree.deep_clone(stmt);
                                stamp_location(doc, clone, &loc);
                                clones.push(clone);
                            }
                            self.splice_at_root_or_parent(doc, node, &clones);
                            for clone in clones {
                                self.register_exported(doc, clone);
                            }
                        }
                        None => {
                            self.errors.push(Diagnostic::new(
                                format!("unknown snippet \"{name}\""),
                                &loc,
                            ));
                            self.splice_at_root_or_parent(doc, node, &[]);
                        }
                    }
                    changed = true;
                }
                NodeKind::Instruction {
                    kind: InstructionKind::Export,
                    ..
                } => {
                    let exported: Vec<NodeId> = doc.tree.children(node).to_vec();
                    for e in &exported {
                        doc.tree.node_mut(*e).exported = true;
                    }
                    self.splice_at_root_or_parent(doc, node, &exported);
                    for e in exported {
                        self.register_exported(doc, e);
                    }
                    changed = true;
                }
                _ => {}
            }
        }
        changed
    }

    /// Spliced root-level declarations still need their registry entries.
    fn register_exported(&mut self, doc: &mut Document, node: NodeId) {
        if doc.tree.parent(node) != Some(doc.root()) {
            return;
        }
        match doc.tree.kind(node).clone() {
            NodeKind::VarDecl { name, .. } => {
                doc.set_local_variable(&name, node);
            }
            NodeKind::ClassDecl { .. } => {
                if doc.find_class(&doc.tree.ty(node).map(|t| t.name.clone()).unwrap_or_default())
                    .is_none()
                {
                    doc.add_class(node);
                }
            }
            NodeKind::AliasDecl { .. } => doc.add_alias(node),
            NodeKind::TypeDecl { .. } => doc.add_typedef(node),
            NodeKind::ConversionDecl { src_ty, dst_ty, .. } => {
                if let (Some(src), Some(dst)) = (src_ty, dst_ty) {
                    doc.add_conversion(format!("{src}_to_{dst}"), node);
                }
            }
            _ => {}
        }
    }

    fn splice_at_root_or_parent(&mut self, doc: &mut Document, old: NodeId, new: &[NodeId]) {
        if !splice_node(&mut doc.tree, old, new) {
            let loc = doc.tree.node(old).loc.clone();
            self.errors.push(Diagnostic::new(
                "instruction has no containing node to expand into",
                &loc,
            ));
        }
    }

    fn remove_snippets(&mut self, doc: &mut Document) {
        for (_, snippet) in std::mem::take(&mut self.snippets) {
            if doc.tree.parent(snippet).is_some() {
                doc.tree.detach(snippet);
            }
        }
    }
}

/// Pasted nodes adopt the paste site's location; keeping the snippet's
/// own location would mislead users reading diagnostics.
fn stamp_location(doc: &mut Document, node: NodeId, loc: &SourceLocation) {
    for id in doc.tree.descendants(node) {
        doc.tree.node_mut(id).loc = loc.clone();
    }
}

fn literal_num(doc: &Document, id: NodeId) -> Option<f64> {
    match doc.tree.kind(id) {
        NodeKind::NumberLiteral { value } => value.parse().ok(),
        NodeKind::BoolLiteral { value } => Some(if *value { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn literal_eq(doc: &Document, a: NodeId, b: NodeId) -> bool {
    match (doc.tree.kind(a), doc.tree.kind(b)) {
        (
            NodeKind::StringLiteral { value: va, .. },
            NodeKind::StringLiteral { value: vb, .. },
        ) => va == vb,
        _ => match (literal_num(doc, a), literal_num(doc, b)) {
            (Some(x), Some(y)) => x == y,
            _ => doc.tree.node_equals(a, b),
        },
    }
}

impl Pass for Preprocessor {
    fn name(&self) -> &'static str {
        "preprocessor"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        self.collect_snippets(doc);
        for _ in 0..MAX_ROUNDS {
            if !self.round(doc) {
                break;
            }
        }
        self.remove_snippets(doc);
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lil_core::{AstBuilder, NodeVariant, ParserEvent};

    fn build_snippet_and_paste() -> Document {
        let mut b = AstBuilder::new();
        // #snippet greet { var x = 1; }
        b.receive_node_start(NodeVariant::SnippetInstruction);
        b.receive_node_data(ParserEvent::Identifier, "greet");
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "x");
        b.receive_node_start(NodeVariant::NumberLiteral);
        b.receive_node_data(ParserEvent::NumberInt, "");
        b.receive_node_data(ParserEvent::Identifier, "1");
        b.receive_node_end(NodeVariant::NumberLiteral);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::SnippetInstruction);
        b.receive_node_commit();
        // fn host { #paste greet; }
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "host");
        b.receive_node_start(NodeVariant::FunctionDecl);
        b.receive_node_data(ParserEvent::FunctionBody, "");
        b.receive_node_start(NodeVariant::Instruction);
        b.receive_node_data(ParserEvent::Identifier, "paste");
        b.receive_node_data(ParserEvent::Identifier, "greet");
        b.receive_node_end(NodeVariant::Instruction);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::FunctionDecl);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        let (doc, _) = b.finish();
        doc
    }

    fn host_body(doc: &Document) -> Vec<NodeId> {
        let host = doc
            .nodes()
            .iter()
            .copied()
            .find(|id| {
                matches!(doc.tree.kind(*id), NodeKind::VarDecl { name, .. } if name == "host")
            })
            .expect("host fn");
        let fd = doc.tree.children(host)[0];
        match doc.tree.kind(fd) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!("expected function decl"),
        }
    }

    #[test]
    fn paste_expands_snippet_body() {
        let mut doc = build_snippet_and_paste();
        let mut pp = Preprocessor::new();
        pp.perform_visit(&mut doc);
        assert!(!pp.has_errors(), "{:?}", pp.errors());
        let body = host_body(&doc);
        assert_eq!(body.len(), 1);
        assert!(matches!(
            doc.tree.kind(body[0]),
            NodeKind::VarDecl { name, .. } if name == "x"
        ));
        // Snippet removed from the root.
        assert!(!doc
            .nodes()
            .iter()
            .any(|id| matches!(doc.tree.kind(*id), NodeKind::SnippetInstruction { .. })));
    }

    #[test]
    fn paste_of_unknown_snippet_errors() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::Instruction);
        b.receive_node_data(ParserEvent::Identifier, "paste");
        b.receive_node_data(ParserEvent::Identifier, "nothing");
        b.receive_node_end(NodeVariant::Instruction);
        b.receive_node_commit();
        let (mut doc, _) = b.finish();
        let mut pp = Preprocessor::new();
        pp.perform_visit(&mut doc);
        assert!(pp.has_errors());
    }

    #[test]
    fn if_instruction_keeps_then_branch() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::IfInstruction);
        // condition: true
        b.receive_node_start(NodeVariant::Bool);
        b.receive_node_data(ParserEvent::Identifier, "true");
        b.receive_node_end(NodeVariant::Bool);
        b.receive_node_commit();
        // then: var a = 1
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "a");
        b.receive_node_start(NodeVariant::NumberLiteral);
        b.receive_node_data(ParserEvent::NumberInt, "");
        b.receive_node_data(ParserEvent::Identifier, "1");
        b.receive_node_end(NodeVariant::NumberLiteral);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        // else: var b = 2
        b.receive_node_data(ParserEvent::FlowControlElse, "");
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "b");
        b.receive_node_start(NodeVariant::NumberLiteral);
        b.receive_node_data(ParserEvent::NumberInt, "");
        b.receive_node_data(ParserEvent::Identifier, "2");
        b.receive_node_end(NodeVariant::NumberLiteral);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::IfInstruction);
        b.receive_node_commit();
        let (mut doc, _) = b.finish();

        let mut pp = Preprocessor::new();
        pp.perform_visit(&mut doc);
        assert!(!pp.has_errors());
        let names: Vec<String> = doc
            .nodes()
            .iter()
            .filter_map(|id| match doc.tree.kind(*id) {
                NodeKind::VarDecl { name, .. } => Some(name.clone()),
                _ => None,
            })
            .collect();
        assert!(names.contains(&"a".to_string()));
        assert!(!names.contains(&"b".to_string()));
    }

    #[test]
    fn pasted_nodes_take_paste_site_location() {
        let mut doc = build_snippet_and_paste();
        // Give the paste site a distinctive location.
        let host = doc
            .nodes()
            .iter()
            .copied()
            .find(|id| {
                matches!(doc.tree.kind(*id), NodeKind::VarDecl { name, .. } if name == "host")
            })
            .unwrap();
        let fd = doc.tree.children(host)[0];
        let paste = doc.tree.children(fd)[0];
        doc.tree.node_mut(paste).loc = SourceLocation::new("main.lil", 40, 2, 0..0);

        let mut pp = Preprocessor::new();
        pp.perform_visit(&mut doc);
        let body = host_body(&doc);
        assert_eq!(doc.tree.node(body[0]).loc.line, 40);
    }
}
