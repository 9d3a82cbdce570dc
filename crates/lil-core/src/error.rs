//! Error types for lil-core.
//!
//! Compiler diagnostics are values, never panics: the builder and every
//! pass accumulate [`Diagnostic`] records and keep going, so the user
//! gets a full batch before the pipeline halts. [`CoreError`] covers
//! programmatic misuse of the arena, which indicates a bug in a pass
//! rather than an error in user code.

use thiserror::Error;

use crate::id::NodeId;
use crate::loc::SourceLocation;

/// A user-facing error record: what went wrong and where.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[error("{message} on line {line} column {column}")]
pub struct Diagnostic {
    pub message: String,
    pub file: String,
    pub line: usize,
    pub column: usize,
}

impl Diagnostic {
    pub fn new(message: impl Into<String>, loc: &SourceLocation) -> Self {
        Diagnostic {
            message: message.into(),
            file: loc.file.clone(),
            line: loc.line,
            column: loc.column,
        }
    }
}

/// Hard failures in the core data model.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A NodeId was not found in the arena.
    #[error("node not found: NodeId({id})", id = id.0)]
    NodeNotFound { id: NodeId },

    /// A node had a different variant than the caller required.
    #[error("unexpected node variant at NodeId({id}): expected {expected}", id = id.0)]
    WrongVariant { id: NodeId, expected: &'static str },

    /// A child was not present in its parent's child list.
    #[error("node {child} is not a child of {parent}")]
    NotAChild { parent: NodeId, child: NodeId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display() {
        let loc = SourceLocation::new("a.lil", 4, 9, 0..0);
        let d = Diagnostic::new("unknown name \"foo\"", &loc);
        assert_eq!(d.to_string(), "unknown name \"foo\" on line 4 column 9");
    }

    #[test]
    fn core_error_display() {
        let e = CoreError::NodeNotFound { id: NodeId(3) };
        assert_eq!(e.to_string(), "node not found: NodeId(3)");
    }
}
