//! Class field ordering.
//!
//! Holds the field-layout slot in the pipeline. The traversal visits
//! every class so the debug plumbing stays observable, but the
//! ordering itself is left as declared.
//
// TODO: apply a size-descending layout sort once the IR emitter
// consumes field offsets instead of recomputing them.

use lil_core::{Diagnostic, Document, NodeKind};

use crate::visitor::Pass;

#[derive(Default)]
pub struct FieldSorter {
    errors: Vec<Diagnostic>,
}

impl FieldSorter {
    pub fn new() -> FieldSorter {
        FieldSorter::default()
    }
}

impl Pass for FieldSorter {
    fn name(&self) -> &'static str {
        "field-sorter"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        for class in doc.classes() {
            if let NodeKind::ClassDecl { fields, .. } = doc.tree.kind(*class) {
                tracing::trace!(
                    class = %doc.tree.ty(*class).map(|t| t.name.clone()).unwrap_or_default(),
                    fields = fields.len(),
                    "field order kept as declared"
                );
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
    use lil_core::{Node, NodeId, ScopeTable, Ty};

    #[test]
    fn keeps_declaration_order() {
        let mut doc = Document::new();
        let mk_field = |doc: &mut Document, name: &str| -> NodeId {
            doc.tree.add_node(Node::new(NodeKind::VarDecl {
                name: name.into(),
                is_extern: false,
                is_ivar: false,
                is_vvar: false,
                is_const: false,
                init_vals: vec![],
            }))
        };
        let a = mk_field(&mut doc, "a");
        let b = mk_field(&mut doc, "b");
        let cd = doc.tree.add_node(Node::new(NodeKind::ClassDecl {
            receives_inherits: false,
            inherit_ty: None,
            is_extern: false,
            is_template: false,
            fields: vec![a, b],
            methods: vec![],
            aliases: vec![],
            docs: vec![],
            local_vars: ScopeTable::new(),
        }));
        doc.tree.set_ty(cd, Some(Ty::make_object("pair")));
        doc.tree.add_child(cd, a);
        doc.tree.add_child(cd, b);
        doc.add_node(cd);
        doc.add_class(cd);

        let mut pass = FieldSorter::new();
        pass.perform_visit(&mut doc);
        assert!(!pass.has_errors());
        assert!(matches!(
            doc.tree.kind(cd),
            NodeKind::ClassDecl { fields, .. } if fields == &vec![a, b]
        ));
    }
}
