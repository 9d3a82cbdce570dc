//! Lookups and name decoration shared by several passes.

use lil_core::{Document, FnArg, NodeId, NodeKind, Ty};

/// First initializer of a VarDecl, if any.
pub fn var_decl_first_init(doc: &Document, vd: NodeId) -> Option<NodeId> {
    match doc.tree.kind(vd) {
        NodeKind::VarDecl { init_vals, .. } => init_vals.first().copied(),
        _ => None,
    }
}

/// All initializers of a VarDecl.
pub fn var_decl_inits(doc: &Document, vd: NodeId) -> Vec<NodeId> {
    match doc.tree.kind(vd) {
        NodeKind::VarDecl { init_vals, .. } => init_vals.clone(),
        _ => Vec::new(),
    }
}

/// The method VarDecl named `name` on a class, if declared.
pub fn class_method_named(doc: &Document, class: NodeId, name: &str) -> Option<NodeId> {
    let methods = match doc.tree.kind(class) {
        NodeKind::ClassDecl { methods, .. } => methods.clone(),
        _ => return None,
    };
    methods.into_iter().find(|m| {
        matches!(doc.tree.kind(*m), NodeKind::VarDecl { name: n, .. } if n == name)
    })
}

/// The field VarDecl named `name` on a class, if declared.
pub fn class_field_named(doc: &Document, class: NodeId, name: &str) -> Option<NodeId> {
    let fields = match doc.tree.kind(class) {
        NodeKind::ClassDecl { fields, .. } => fields.clone(),
        _ => return None,
    };
    fields.into_iter().find(|f| {
        matches!(doc.tree.kind(*f), NodeKind::VarDecl { name: n, .. } if n == name)
    })
}

/// Resolves a function-type argument entry to its type.
pub fn fn_arg_ty(doc: &Document, arg: &FnArg) -> Option<Ty> {
    match arg {
        FnArg::Ty(ty) => Some((**ty).clone()),
        FnArg::Decl(id) => doc.tree.ty(*id).cloned(),
    }
}

/// Resolves a function-type argument entry to its declared name.
pub fn fn_arg_name(doc: &Document, arg: &FnArg) -> Option<String> {
    match arg {
        FnArg::Ty(_) => None,
        FnArg::Decl(id) => match doc.tree.kind(*id) {
            NodeKind::VarDecl { name, .. } => Some(name.clone()),
            _ => None,
        },
    }
}

/// Picks the overload of a multi-initializer declaration whose
/// parameter types accept the given actual-argument types. An exact
/// structural match wins; otherwise the first overload every actual
/// merges into is taken.
pub fn select_overload(doc: &Document, decl: NodeId, actual_tys: &[Ty]) -> Option<NodeId> {
    let inits = var_decl_inits(doc, decl);
    let candidates: Vec<NodeId> = inits
        .into_iter()
        .filter(|init| matches!(doc.tree.kind(*init), NodeKind::FunctionDecl { .. }))
        .collect();
    let param_tys = |fd: NodeId| -> Option<Vec<Ty>> {
        let fn_ty = doc.tree.ty(fd)?;
        fn_ty.fn_args().iter().map(|a| fn_arg_ty(doc, a)).collect()
    };
    // Exact match first.
    for fd in &candidates {
        let Some(params) = param_tys(*fd) else {
            continue;
        };
        if params.len() == actual_tys.len()
            && params.iter().zip(actual_tys).all(|(p, a)| p.equal_to(a))
        {
            return Some(*fd);
        }
    }
    // Then overloads a weak literal argument can still collapse into.
    candidates.into_iter().find(|fd| {
        let Some(params) = param_tys(*fd) else {
            return false;
        };
        params.len() == actual_tys.len()
            && params.iter().zip(actual_tys).all(|(p, a)| {
                a.equal_to(p) || (a.is_weak() && a.members().iter().any(|m| m.equal_to(p)))
            })
    })
}

/// `name.to_upper_first()` -- `x` becomes `X`, used for accessor names.
pub fn upper_first(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Produces the mangled external symbol:
/// `_lil_[n<ns>_][c<len>_<className>_]f<len>_<name>[<tyCode>]`.
pub fn decorate(
    doc: &Document,
    ns: &str,
    class_name: &str,
    name: &str,
    ty: Option<&Ty>,
) -> String {
    let mut out = String::from("_lil_");
    if !ns.is_empty() {
        out.push('n');
        out.push_str(ns);
        out.push('_');
    }
    if !class_name.is_empty() {
        out.push_str(&format!("c{}_{}_", class_name.len(), class_name));
    }
    out.push_str(&format!("f{}_{}", name.len(), name));
    if let Some(ty) = ty {
        out.push_str(&type_to_string(doc, ty));
    }
    out
}

/// Encodes a type for mangling. Function types list their argument
/// codes; a function-typed argument nests as `f0<inner>`, anything
/// else as `a<len>_<tyName>`.
pub fn type_to_string(doc: &Document, ty: &Ty) -> String {
    if !ty.is_function() {
        return ty.name.clone();
    }
    let args = ty.fn_args();
    if args.is_empty() {
        return String::new();
    }
    let mut out = String::from("_");
    for (i, arg) in args.iter().enumerate() {
        let arg_ty = fn_arg_ty(doc, arg);
        let is_fn = arg_ty.as_ref().map(|t| t.is_function()).unwrap_or(false);
        let code = arg_ty
            .as_ref()
            .map(|t| type_to_string(doc, t))
            .unwrap_or_default();
        if is_fn {
            out.push_str(&format!("f0{code}"));
        } else {
            out.push_str(&format!("a{}_{}", code.len(), code));
        }
        if i < args.len() - 1 {
            out.push('_');
        }
    }
    out
}
