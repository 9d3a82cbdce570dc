//! `#getConfig` replacement.
//!
//! Replaces every `#getConfig name` instruction with a literal sourced
//! from the external configuration object.

use lil_core::{Diagnostic, Document, InstructionKind, NodeId, NodeKind};

use crate::config::Configuration;
use crate::rewrite::splice_node;
use crate::visitor::Pass;

pub struct ConfigGetter {
    config: Configuration,
    errors: Vec<Diagnostic>,
}

impl ConfigGetter {
    pub fn new(config: Configuration) -> ConfigGetter {
        ConfigGetter {
            config,
            errors: Vec::new(),
        }
    }
}

impl Pass for ConfigGetter {
    fn name(&self) -> &'static str {
        "config-getter"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if doc.tree.parent(node).is_none() {
                continue;
            }
            let name = match doc.tree.kind(node) {
                NodeKind::Instruction {
                    kind: InstructionKind::GetConfig,
                    name,
                    ..
                } => name.clone(),
                _ => continue,
            };
            match self.config.get(&name).cloned() {
                Some(value) => {
                    let replacement = value.to_node(&mut doc.tree);
                    let loc = doc.tree.node(node).loc.clone();
                    doc.tree.node_mut(replacement).loc = loc;
                    splice_node(&mut doc.tree, node, &[replacement]);
                }
                None => {
                    let loc = doc.tree.node(node).loc.clone();
                    self.errors.push(Diagnostic::new(
                        format!("unknown configuration value \"{name}\""),
                        &loc,
                    ));
                }
            }
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}
