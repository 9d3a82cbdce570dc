//! Compile-time configuration for a compilation unit.
//!
//! The driver hands the pipeline a [`CompileConfig`]: where the unit
//! came from, the `#needs` search directory, verbosity and per-pass
//! debug flags, the `#arg` substitution map, and the configuration
//! object backing `#getConfig`. Parsing is an external concern, so
//! `#needs` resolution goes through the [`ModuleLoader`] seam.

use indexmap::IndexMap;
use lil_core::{Diagnostic, Document, Node, NodeKind, NodeTree, Ty};
use serde::{Deserialize, Serialize};

/// A literal replacement value for `#arg` and `#getConfig`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConfigValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ConfigValue {
    /// Materializes the value as a fresh literal node.
    pub fn to_node(&self, tree: &mut NodeTree) -> lil_core::NodeId {
        match self {
            ConfigValue::Bool(b) => tree.add_node(Node::new(NodeKind::BoolLiteral { value: *b })),
            ConfigValue::Int(n) => {
                let id = tree.add_node(Node::new(NodeKind::NumberLiteral {
                    value: n.to_string(),
                }));
                tree.set_ty(id, Some(Ty::make("i64")));
                id
            }
            ConfigValue::Float(n) => {
                let id = tree.add_node(Node::new(NodeKind::NumberLiteral {
                    value: n.to_string(),
                }));
                tree.set_ty(id, Some(Ty::make("f64")));
                id
            }
            ConfigValue::Str(s) => tree.add_node(Node::new(NodeKind::StringLiteral {
                value: s.clone(),
                is_cstring: false,
            })),
        }
    }
}

/// The external configuration object read by `#getConfig`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    pub values: IndexMap<String, ConfigValue>,
}

impl Configuration {
    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.values.get(name)
    }
}

/// Per-pass debug switches, mirrored from the driver's flags.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DebugFlags {
    pub ast: bool,
    pub preprocessor: bool,
    pub ast_validator: bool,
    pub field_sorter: bool,
    pub parameter_sorter: bool,
    pub method_inserter: bool,
    pub conversion_inserter: bool,
    pub type_guesser: bool,
    pub type_resolver: bool,
    pub structure_lowerer: bool,
    pub name_lowerer: bool,
}

/// Everything the driver supplies for one compilation unit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompileConfig {
    /// Path of the unit's main file.
    pub file: String,
    /// Directory `#needs` arguments resolve against.
    pub dir: String,
    /// The original source text, used for error rendering.
    pub source: String,
    pub verbose: bool,
    pub debug: DebugFlags,
    /// Compile-time `#arg` name/value map.
    pub args: IndexMap<String, ConfigValue>,
    pub configuration: Configuration,
}

/// Supplies parsed documents for `#needs` / `#import` paths. The
/// concrete implementation wraps the external parser; tests provide
/// documents assembled through the builder directly.
pub trait ModuleLoader {
    fn load(&mut self, path: &str) -> Result<Document, Diagnostic>;
}

/// A loader that fails every request, for units without imports.
#[derive(Debug, Default)]
pub struct NoImports;

impl ModuleLoader for NoImports {
    fn load(&mut self, path: &str) -> Result<Document, Diagnostic> {
        Err(Diagnostic {
            message: format!("failed to read the file {path}"),
            file: path.to_string(),
            line: 1,
            column: 1,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_value_to_node() {
        let mut tree = NodeTree::new();
        let b = ConfigValue::Bool(true).to_node(&mut tree);
        assert!(matches!(
            tree.kind(b),
            NodeKind::BoolLiteral { value: true }
        ));
        let n = ConfigValue::Int(7).to_node(&mut tree);
        assert!(matches!(
            tree.kind(n),
            NodeKind::NumberLiteral { value } if value == "7"
        ));
        assert!(tree.ty(n).unwrap().equal_to(&Ty::make("i64")));
        let s = ConfigValue::Str("hi".into()).to_node(&mut tree);
        assert!(matches!(
            tree.kind(s),
            NodeKind::StringLiteral { value, .. } if value == "hi"
        ));
    }

    #[test]
    fn no_imports_loader_fails() {
        let mut loader = NoImports;
        assert!(loader.load("missing.lil").is_err());
    }
}
