//! The pass abstraction and the pass manager.
//!
//! A pass owns its error list and rewrites the document in place.
//! [`PassManager::execute`] runs passes in order and halts the
//! pipeline after the first pass that records errors, rendering every
//! diagnostic of that pass against the original source text.

use lil_core::{Diagnostic, Document};
use thiserror::Error;

/// One semantic pass over the tree.
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Log-banner hook, called right before the pass runs.
    fn initialize_visit(&self) {
        tracing::debug!(pass = self.name(), "====  {}  ====", self.name());
    }

    /// Visits the whole document. The default of the original walks
    /// root children in order; passes here implement their own walk.
    fn perform_visit(&mut self, doc: &mut Document);

    fn errors(&self) -> &[Diagnostic];

    fn has_errors(&self) -> bool {
        !self.errors().is_empty()
    }
}

/// The pipeline halted because a pass recorded errors.
#[derive(Debug, Error)]
#[error("pass '{pass}' reported {count} error(s):\n{rendered}", count = diagnostics.len())]
pub struct PipelineError {
    pub pass: &'static str,
    pub diagnostics: Vec<Diagnostic>,
    pub rendered: String,
}

/// Runs an ordered list of passes, aborting on the first failure.
#[derive(Debug, Default)]
pub struct PassManager {
    verbose: bool,
}

impl PassManager {
    pub fn new() -> PassManager {
        PassManager { verbose: false }
    }

    pub fn set_verbose(&mut self, value: bool) {
        self.verbose = value;
    }

    pub fn verbose(&self) -> bool {
        self.verbose
    }

    /// Executes the passes in order against `doc`. On failure the
    /// tree keeps every successful rewrite already applied, but no
    /// further pass runs.
    pub fn execute(
        &mut self,
        passes: &mut [Box<dyn Pass>],
        doc: &mut Document,
        source: &str,
    ) -> Result<(), PipelineError> {
        for pass in passes.iter_mut() {
            pass.initialize_visit();
            pass.perform_visit(doc);
            if pass.has_errors() {
                let diagnostics = pass.errors().to_vec();
                let rendered = render_errors(&diagnostics, source);
                tracing::error!(pass = pass.name(), "{rendered}");
                return Err(PipelineError {
                    pass: pass.name(),
                    diagnostics,
                    rendered,
                });
            }
        }
        Ok(())
    }
}

/// Renders diagnostics against the source, showing the offending line
/// with a caret under the column.
pub fn render_errors(errors: &[Diagnostic], source: &str) -> String {
    let lines: Vec<&str> = source.split('\n').collect();
    let mut out = format!("Found {} errors in your code:\n", errors.len());
    for e in errors {
        out.push_str(&format!(
            "{} on line {} column {}\n\n",
            e.message, e.line, e.column
        ));
        if e.line >= 2 {
            if let Some(prev) = lines.get(e.line - 2) {
                out.push_str(&format!("{}: {}\n", e.line - 1, prev));
            }
        }
        if let Some(line) = lines.get(e.line.saturating_sub(1)) {
            out.push_str(&format!("{}: {}\n", e.line, line));
            let pad = e.column.saturating_sub(1) + format!("{}: ", e.line).len();
            out.push_str(&" ".repeat(pad));
            out.push_str("^\n");
        }
        if let Some(next) = lines.get(e.line) {
            out.push_str(&format!("{}: {}\n", e.line + 1, next));
        }
    }
    out
}
