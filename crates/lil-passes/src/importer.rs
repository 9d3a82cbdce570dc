//! `#needs` / `#import` resolution.
//!
//! Each import instruction names a file (or glob) relative to the
//! directory the driver configured. The named files are parsed through
//! a nested compilation unit supplied by the [`ModuleLoader`] seam,
//! their own imports are resolved recursively, and the declarations a
//! consumer may see are spliced into the importing root. Already
//! imported paths are tracked separately for `#needs` and `#import`,
//! so mutual imports terminate.
//!
//! `#needs` brings in headers: function declarations arrive as extern
//! VarDecls carrying just the signature. `#import` splices the full
//! definitions.

use indexmap::IndexSet;
use lil_core::{
    Diagnostic, Document, InstructionKind, Node, NodeId, NodeKind, Ty,
};

use crate::config::ModuleLoader;
use crate::visitor::Pass;

pub struct NeedsImporter {
    loader: Box<dyn ModuleLoader>,
    dir: String,
    /// The unit's own file, pre-marked so a cycle back to it stops.
    own_file: String,
    imported_needs: IndexSet<String>,
    imported_import: IndexSet<String>,
    errors: Vec<Diagnostic>,
}

impl NeedsImporter {
    pub fn new(loader: Box<dyn ModuleLoader>, dir: &str, own_file: &str) -> NeedsImporter {
        NeedsImporter {
            loader,
            dir: dir.to_string(),
            own_file: own_file.to_string(),
            imported_needs: IndexSet::new(),
            imported_import: IndexSet::new(),
            errors: Vec::new(),
        }
    }

    fn resolve_paths(&self, arg: &str) -> Vec<String> {
        let full = if self.dir.is_empty() {
            arg.to_string()
        } else {
            format!("{}/{}", self.dir, arg)
        };
        if !full.contains('*') {
            return vec![full];
        }
        match glob::glob(&full) {
            Ok(paths) => paths
                .filter_map(|p| p.ok())
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
            Err(e) => {
                tracing::warn!("glob failed for {full}: {e}");
                Vec::new()
            }
        }
    }

    fn already_imported(&self, path: &str, is_needs: bool) -> bool {
        if path == self.own_file {
            return true;
        }
        if is_needs {
            self.imported_needs.contains(path)
        } else {
            self.imported_import.contains(path)
        }
    }

    fn mark_imported(&mut self, path: &str, is_needs: bool) {
        if is_needs {
            self.imported_needs.insert(path.to_string());
        } else {
            self.imported_import.insert(path.to_string());
        }
    }

    fn process_document(&mut self, doc: &mut Document) {
        let root_nodes: Vec<NodeId> = doc.nodes().to_vec();
        let mut insert_at = 0usize;
        for node in root_nodes {
            let (kind, argument) = match doc.tree.kind(node) {
                NodeKind::Instruction { kind, argument, .. } => (*kind, *argument),
                _ => continue,
            };
            let is_needs = match kind {
                InstructionKind::Needs => true,
                InstructionKind::Import => false,
                _ => continue,
            };
            let Some(arg) = argument else {
                continue;
            };
            let arg_str = match doc.tree.kind(arg) {
                NodeKind::StringLiteral { value, .. } => value.clone(),
                _ => continue,
            };
            let mut imported_any = false;
            for path in self.resolve_paths(&arg_str) {
                if self.already_imported(&path, is_needs) {
                    imported_any = true;
                    continue;
                }
                self.mark_imported(&path, is_needs);
                let mut child = match self.loader.load(&path) {
                    Ok(child) => child,
                    Err(mut e) => {
                        e.message = format!("failed to read the file {path}: {}", e.message);
                        self.errors.push(e);
                        continue;
                    }
                };
                tracing::debug!(path = %path, "importing unit");
                // Resolve the child's own imports first so its
                // re-exports are visible here.
                self.process_document(&mut child);
                insert_at = self.splice(doc, &child, is_needs, insert_at);
                imported_any = true;
            }
            if imported_any {
                doc.add_dependency(node);
            }
        }
    }

    /// Splices the importable declarations of `child` into `doc`
    /// starting at root position `insert_at`; returns the next
    /// insertion point.
    fn splice(
        &mut self,
        doc: &mut Document,
        child: &Document,
        is_needs: bool,
        mut insert_at: usize,
    ) -> usize {
        let main_decl = child.main_fn_decl();
        let mut pending: Vec<NodeId> = Vec::new();
        for node in child.nodes() {
            if *node == main_decl {
                continue;
            }
            match child.tree.kind(*node) {
                NodeKind::Instruction {
                    kind: InstructionKind::Export,
                    ..
                } => {
                    for c in child.tree.children(*node) {
                        pending.push(*c);
                    }
                }
                _ => pending.push(*node),
            }
        }

        for node in pending {
            match child.tree.kind(node).clone() {
                NodeKind::VarDecl {
                    name, init_vals, ..
                } => {
                    let ty = child.tree.ty(node).cloned();
                    let is_fn = ty.as_ref().map(|t| t.is_function()).unwrap_or_else(|| {
                        init_vals.first().is_some_and(|iv| {
                            matches!(child.tree.kind(*iv), NodeKind::FunctionDecl { .. })
                        })
                    });
                    if !is_fn {
                        continue;
                    }
                    let imported = if is_needs {
                        // Header only: an extern decl carrying the signature.
                        let fn_ty = ty
                            .or_else(|| {
                                init_vals.first().and_then(|iv| child.tree.ty(*iv).cloned())
                            })
                            .unwrap_or_else(Ty::make_fn);
                        let vd = doc.tree.add_node(Node::new(NodeKind::VarDecl {
                            name: name.clone(),
                            is_extern: true,
                            is_ivar: false,
                            is_vvar: false,
                            is_const: false,
                            init_vals: Vec::new(),
                        }));
                        doc.tree.set_ty(vd, Some(fn_ty));
                        vd
                    } else {
                        doc.tree.import_subtree(&child.tree, node)
                    };
                    let root = doc.root();
                    doc.tree.insert_child(root, insert_at, imported);
                    insert_at += 1;
                    doc.set_local_variable(&name, imported);
                }
                NodeKind::ClassDecl { .. } => {
                    let imported = doc.tree.import_subtree(&child.tree, node);
                    let root = doc.root();
                    doc.tree.insert_child(root, insert_at, imported);
                    insert_at += 1;
                    doc.add_class(imported);
                }
                NodeKind::AliasDecl { .. } => {
                    let imported = doc.tree.import_subtree(&child.tree, node);
                    let root = doc.root();
                    doc.tree.insert_child(root, insert_at, imported);
                    insert_at += 1;
                    doc.add_alias(imported);
                }
                NodeKind::TypeDecl { .. } => {
                    let imported = doc.tree.import_subtree(&child.tree, node);
                    let root = doc.root();
                    doc.tree.insert_child(root, insert_at, imported);
                    insert_at += 1;
                    doc.add_typedef(imported);
                }
                NodeKind::ConversionDecl { src_ty, dst_ty, .. } => {
                    let imported = doc.tree.import_subtree(&child.tree, node);
                    let root = doc.root();
                    doc.tree.insert_child(root, insert_at, imported);
                    insert_at += 1;
                    if let (Some(src), Some(dst)) = (src_ty, dst_ty) {
                        doc.add_conversion(format!("{src}_to_{dst}"), imported);
                    }
                }
                _ => {}
            }
        }
        insert_at
    }
}

impl Pass for NeedsImporter {
    fn name(&self) -> &'static str {
        "needs-importer"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        self.process_document(doc);
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}
