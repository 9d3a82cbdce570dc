//! `#arg` substitution.
//!
//! `#arg name` stands for a value supplied on the compiler command
//! line. When the map has the name, the instruction is replaced by the
//! literal; otherwise the instruction's own argument serves as the
//! default, and a missing default is an error.

use indexmap::IndexMap;
use lil_core::{Diagnostic, Document, InstructionKind, NodeId, NodeKind};

use crate::config::ConfigValue;
use crate::rewrite::splice_node;
use crate::visitor::Pass;

pub struct ArgResolver {
    args: IndexMap<String, ConfigValue>,
    errors: Vec<Diagnostic>,
}

impl ArgResolver {
    pub fn new(args: IndexMap<String, ConfigValue>) -> ArgResolver {
        ArgResolver {
            args,
            errors: Vec::new(),
        }
    }
}

impl Pass for ArgResolver {
    fn name(&self) -> &'static str {
        "arg-resolver"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if doc.tree.parent(node).is_none() {
                continue;
            }
            let (name, default) = match doc.tree.kind(node) {
                NodeKind::Instruction {
                    kind: InstructionKind::Arg,
                    name,
                    argument,
                    ..
                } => (name.clone(), *argument),
                _ => continue,
            };
            if let Some(value) = self.args.get(&name) {
                let replacement = value.to_node(&mut doc.tree);
                let loc = doc.tree.node(node).loc.clone();
                doc.tree.node_mut(replacement).loc = loc;
                splice_node(&mut doc.tree, node, &[replacement]);
            } else if let Some(default) = default {
                let clone = doc.tree.deep_clone(default);
                splice_node(&mut doc.tree, node, &[clone]);
            } else {
                let loc = doc.tree.node(node).loc.clone();
                self.errors.push(Diagnostic::new(
                    format!(
                        "no value provided for #arg \"{name}\". Please provide a default value."
                    ),
                    &loc,
                ));
                splice_node(&mut doc.tree, node, &[]);
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
    use lil_core::{AstBuilder, NodeVariant, ParserEvent};

    /// `var x = #arg level;`
    fn unit_with_arg() -> Document {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "x");
        b.receive_node_start(NodeVariant::Instruction);
        b.receive_node_data(ParserEvent::Identifier, "arg");
        b.receive_node_data(ParserEvent::Identifier, "level");
        b.receive_node_end(NodeVariant::Instruction);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        let (doc, _) = b.finish();
        doc
    }

    fn first_init_of_x(doc: &Document) -> NodeId {
        let main_body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        let vd = main_body[0];
        match doc.tree.kind(vd) {
            NodeKind::VarDecl { init_vals, .. } => init_vals[0],
            _ => panic!(),
        }
    }

    #[test]
    fn supplied_arg_replaces_instruction() {
        let mut doc = unit_with_arg();
        let mut args = IndexMap::new();
        args.insert("level".to_string(), ConfigValue::Int(3));
        let mut pass = ArgResolver::new(args);
        pass.perform_visit(&mut doc);
        assert!(!pass.has_errors());
        let init = first_init_of_x(&doc);
        assert!(matches!(
            doc.tree.kind(init),
            NodeKind::NumberLiteral { value } if value == "3"
        ));
    }

    #[test]
    fn missing_arg_without_default_is_error() {
        let mut doc = unit_with_arg();
        let mut pass = ArgResolver::new(IndexMap::new());
        pass.perform_visit(&mut doc);
        assert!(pass.has_errors());
    }
}
