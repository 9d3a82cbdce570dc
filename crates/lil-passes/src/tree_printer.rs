//! Verbose tree dumping between pipeline stages.

use lil_core::{tree_to_string, Diagnostic, Document};

use crate::visitor::Pass;

/// Prints the tree through `tracing` so a verbose run shows the
/// effect of each stage. Never records errors.
#[derive(Default)]
pub struct TreePrinter {
    headline: Option<&'static str>,
}

impl TreePrinter {
    pub fn new() -> TreePrinter {
        TreePrinter::default()
    }

    pub fn with_headline(headline: &'static str) -> TreePrinter {
        TreePrinter {
            headline: Some(headline),
        }
    }
}

impl Pass for TreePrinter {
    fn name(&self) -> &'static str {
        "tree-printer"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        if let Some(headline) = self.headline {
            tracing::info!("==== {headline} ====");
        }
        tracing::info!("{}", tree_to_string(&doc.tree, doc.root()));
    }

    fn errors(&self) -> &[Diagnostic] {
        &[]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_fails() {
        let mut doc = Document::new();
        doc.finalize();
        let mut pass = TreePrinter::with_headline("after parsing");
        pass.perform_visit(&mut doc);
        assert!(!pass.has_errors());
    }
}
