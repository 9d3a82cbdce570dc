//! Source locations attached to every AST node.

use std::ops::Range;

use serde::{Deserialize, Serialize};

/// Where a node came from in the source text.
///
/// Line and column are 1-based, matching what the parser reports. The
/// `range` covers the byte span of the whole construct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub range: Range<usize>,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, line: usize, column: usize, range: Range<usize>) -> Self {
        SourceLocation {
            file: file.into(),
            line,
            column,
            range,
        }
    }
}

impl Default for SourceLocation {
    fn default() -> Self {
        SourceLocation {
            file: String::new(),
            line: 1,
            column: 1,
            range: 0..0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_line_one() {
        let loc = SourceLocation::default();
        assert_eq!(loc.line, 1);
        assert_eq!(loc.column, 1);
    }

    #[test]
    fn serde_roundtrip() {
        let loc = SourceLocation::new("main.lil", 3, 14, 40..52);
        let json = serde_json::to_string(&loc).unwrap();
        let back: SourceLocation = serde_json::from_str(&json).unwrap();
        assert_eq!(loc, back);
    }
}
