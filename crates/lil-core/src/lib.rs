pub mod builder;
pub mod document;
pub mod error;
pub mod id;
pub mod loc;
pub mod node;
pub mod printer;
pub mod tree;
pub mod ty;

// Re-export commonly used types
pub use builder::{AstBuilder, NodeVariant, ParserEvent};
pub use document::Document;
pub use error::{CoreError, Diagnostic};
pub use id::NodeId;
pub use loc::SourceLocation;
pub use node::{
    CombinatorKind, ExpressionKind, FlowControlCallKind, FlowControlKind, FunctionCallKind,
    FunctionDeclKind, InstructionKind, Node, NodeKind, ScopeTable, SelectorKind,
    UnaryExpressionKind,
};
pub use printer::{node_to_string, tree_to_string};
pub use tree::NodeTree;
pub use ty::{FnArg, StaticSize, Ty, TyKind};
