//! Alias and typedef resolution.
//!
//! Replaces user-defined type names with their resolved targets,
//! looking first through the aliases of the class being visited, then
//! through the root alias and typedef tables. The original name of a
//! typedef survives as the type's `strong_type_name`. Resolution
//! recurses through pointer arguments, union members, static-array
//! elements, SIMD inner types, and function argument/return
//! positions, and also rewrites the type operand of cast expressions
//! and `if cast` flow control.

use lil_core::{
    Diagnostic, Document, ExpressionKind, FlowControlKind, NodeId, NodeKind, Ty, TyKind,
};

use crate::visitor::Pass;

#[derive(Default)]
pub struct TypeResolver {
    class_context: Vec<NodeId>,
    errors: Vec<Diagnostic>,
}

impl TypeResolver {
    pub fn new() -> TypeResolver {
        TypeResolver::default()
    }

    fn process(&mut self, doc: &mut Document, node: NodeId) {
        let is_class = matches!(doc.tree.kind(node), NodeKind::ClassDecl { .. });
        if is_class {
            self.class_context.push(node);
        }
        let children: Vec<NodeId> = doc.tree.children(node).to_vec();
        for child in children {
            self.process(doc, child);
        }
        if is_class {
            self.class_context.pop();
            // The inherit type may itself be an alias.
            let inherit = match doc.tree.kind(node) {
                NodeKind::ClassDecl { inherit_ty, .. } => inherit_ty.clone(),
                _ => None,
            };
            if let Some(inherit) = inherit {
                if let Some(resolved) = self.resolve(doc, &inherit) {
                    if let NodeKind::ClassDecl { inherit_ty, .. } = doc.tree.kind_mut(node) {
                        *inherit_ty = Some(resolved);
                    }
                }
            }
        }

        match doc.tree.kind(node).clone() {
            NodeKind::FlowControl {
                kind: FlowControlKind::IfCast,
                args,
                ..
            } => {
                if args.len() != 2 {
                    let loc = doc.tree.node(node).loc.clone();
                    self.errors.push(Diagnostic::new(
                        "if cast requires a subject and a type",
                        &loc,
                    ));
                    return;
                }
                self.resolve_type_node(doc, args[1]);
            }
            NodeKind::Expression {
                op: ExpressionKind::Cast,
                rhs: Some(rhs),
                ..
            } => {
                self.resolve_type_node(doc, rhs);
            }
            NodeKind::Type(ty) => {
                if let Some(resolved) = self.resolve(doc, &ty) {
                    if let NodeKind::Type(slot) = doc.tree.kind_mut(node) {
                        *slot = resolved;
                    }
                }
            }
            _ => {
                if let Some(ty) = doc.tree.ty(node).cloned() {
                    if let Some(resolved) = self.resolve(doc, &ty) {
                        doc.tree.set_ty(node, Some(resolved));
                    }
                }
            }
        }
    }

    fn resolve_type_node(&mut self, doc: &mut Document, node: NodeId) {
        let ty = match doc.tree.kind(node) {
            NodeKind::Type(ty) => ty.clone(),
            _ => {
                let loc = doc.tree.node(node).loc.clone();
                self.errors
                    .push(Diagnostic::new("cast target is not a type", &loc));
                return;
            }
        };
        if let Some(resolved) = self.resolve(doc, &ty) {
            if let NodeKind::Type(slot) = doc.tree.kind_mut(node) {
                *slot = resolved;
            }
        }
    }

    /// Returns the rewritten type, or `None` when nothing changed.
    fn resolve(&mut self, doc: &Document, ty: &Ty) -> Option<Ty> {
        match &ty.kind {
            TyKind::Pointer { arg: Some(arg) } => {
                let resolved = self.resolve(doc, arg)?;
                let mut out = ty.clone();
                out.set_pointee(resolved);
                Some(out)
            }
            TyKind::Pointer { arg: None } => None,
            TyKind::Multiple { types, is_weak } => {
                let mut changed = false;
                let mut members: Vec<Ty> = Vec::with_capacity(types.len());
                for member in types {
                    match self.resolve(doc, member) {
                        Some(resolved) => {
                            changed = true;
                            members.push(resolved);
                        }
                        None => members.push(member.clone()),
                    }
                }
                members.sort_by(|a, b| a.name.cmp(&b.name));
                let reordered = members
                    .iter()
                    .zip(types.iter())
                    .any(|(a, b)| !a.equal_to(b));
                if !changed && !reordered {
                    return None;
                }
                let mut out = ty.clone();
                out.kind = TyKind::Multiple {
                    types: members,
                    is_weak: *is_weak,
                };
                Some(out)
            }
            TyKind::Function {
                args, return_ty, ..
            } => {
                let mut out = ty.clone();
                let mut changed = false;
                if let TyKind::Function {
                    args: out_args,
                    return_ty: out_ret,
                    ..
                } = &mut out.kind
                {
                    for (i, arg) in args.iter().enumerate() {
                        if let lil_core::FnArg::Ty(arg_ty) = arg {
                            if let Some(resolved) = self.resolve(doc, arg_ty) {
                                out_args[i] = lil_core::FnArg::Ty(Box::new(resolved));
                                changed = true;
                            }
                        }
                    }
                    if let Some(ret) = return_ty {
                        if let Some(resolved) = self.resolve(doc, ret) {
                            *out_ret = Some(Box::new(resolved));
                            changed = true;
                        }
                    }
                }
                changed.then_some(out)
            }
            TyKind::Single => {
                if Ty::is_built_in_name(&ty.name) {
                    return None;
                }
                self.resolve_named(doc, ty)
            }
            TyKind::Object { .. } => {
                let resolved = self.resolve_named(doc, ty)?;
                let mut out = resolved;
                // Template parameters travel with the use site.
                if !ty.tmpl_params.is_empty() {
                    out.tmpl_params = ty.tmpl_params.clone();
                }
                Some(out)
            }
            TyKind::StaticArray { elem, size } => {
                let resolved = self.resolve(doc, elem)?;
                let mut out = ty.clone();
                out.kind = TyKind::StaticArray {
                    elem: Box::new(resolved),
                    size: size.clone(),
                };
                Some(out)
            }
            TyKind::Simd { elem, width } => {
                let resolved = self.resolve(doc, elem)?;
                let mut out = ty.clone();
                out.kind = TyKind::Simd {
                    elem: Box::new(resolved),
                    width: *width,
                };
                Some(out)
            }
        }
    }

    /// Looks a name up through class aliases, root aliases, and root
    /// typedefs, in that order.
    fn resolve_named(&mut self, doc: &Document, ty: &Ty) -> Option<Ty> {
        if let Some(class) = self.class_context.last() {
            let aliases: Vec<NodeId> = match doc.tree.kind(*class) {
                NodeKind::ClassDecl { aliases, .. } => aliases.clone(),
                _ => Vec::new(),
            };
            if let Some(resolved) = self.lookup_in(doc, &aliases, ty, false) {
                return Some(resolved);
            }
        }
        if let Some(resolved) = self.lookup_in(doc, doc.aliases(), ty, false) {
            return Some(resolved);
        }
        self.lookup_in(doc, doc.typedefs(), ty, true)
    }

    fn lookup_in(
        &mut self,
        doc: &Document,
        decls: &[NodeId],
        ty: &Ty,
        keep_strong_name: bool,
    ) -> Option<Ty> {
        for decl in decls {
            let (src, dst) = match doc.tree.kind(*decl) {
                NodeKind::AliasDecl { src_ty, dst_ty } | NodeKind::TypeDecl { src_ty, dst_ty } => {
                    (src_ty.clone(), dst_ty.clone())
                }
                _ => continue,
            };
            let (Some(src), Some(dst)) = (src, dst) else {
                continue;
            };
            if !src.equal_to(ty) {
                continue;
            }
            let mut resolved = self.resolve(doc, &dst).unwrap_or(dst);
            if keep_strong_name {
                resolved.strong_type_name = Some(ty.name.clone());
            }
            return Some(resolved);
        }
        None
    }
}

impl Pass for TypeResolver {
    fn name(&self) -> &'static str {
        "type-resolver"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let roots: Vec<NodeId> = doc.nodes().to_vec();
        for node in roots {
            self.process(doc, node);
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}
