//! The LIL type model.
//!
//! A [`Ty`] is a tagged value: single (primitive or nominal), multiple
//! (a strong union or a *weak* placeholder for an unresolved literal),
//! function, pointer, object, static array, or SIMD vector. Types hang
//! off nodes ([`crate::node::Node::ty`]) rather than living in the tree
//! themselves; the one exception is the [`crate::node::NodeKind::Type`]
//! node used where a type is a true operand (cast, `if cast`).
//!
//! [`Ty::merge`] implements the asymmetric weak/strong resolution at
//! the center of type inference: a weak multiple type collapses to a
//! concrete member on contact with context, while strong types union.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::id::NodeId;

/// Argument entry of a function type: either a bare type or a
/// reference to the VarDecl node that declares the parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FnArg {
    Ty(Box<Ty>),
    Decl(NodeId),
}

/// Size argument of a static array type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StaticSize {
    /// A number literal, kept as written.
    Literal(String),
    /// A name resolved later against a constant declaration.
    Name(String),
}

/// The variant-specific part of a type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TyKind {
    /// A primitive (`i32`, `f64`, `bool`, ...) or a nominal name.
    Single,
    /// Union of member types. With `is_weak` set this is not a real
    /// union but the placeholder of an unresolved literal.
    Multiple { types: Vec<Ty>, is_weak: bool },
    /// A function signature.
    Function {
        args: Vec<FnArg>,
        return_ty: Option<Box<Ty>>,
        is_variadic: bool,
        /// Builder flag: the next committed type goes to the return slot.
        receives_return_type: bool,
        /// Call sites registered by the type guesser.
        callers: Vec<NodeId>,
    },
    /// Pointer to a single pointee type.
    Pointer { arg: Option<Box<Ty>> },
    /// An object type: class name plus ordered field types.
    Object { fields: Vec<Ty> },
    /// Fixed-size array.
    StaticArray { elem: Box<Ty>, size: StaticSize },
    /// SIMD vector of a primitive element type.
    Simd { elem: Box<Ty>, width: u32 },
}

/// A LIL type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ty {
    pub kind: TyKind,
    pub name: String,
    /// The original typedef name, preserved when the type resolver
    /// replaces a user-defined name with its target.
    pub strong_type_name: Option<String>,
    pub is_nullable: bool,
    pub tmpl_params: Vec<Ty>,
}

impl Ty {
    /// Convenience constructor for a single type with the given name.
    pub fn make(name: impl Into<String>) -> Ty {
        Ty {
            kind: TyKind::Single,
            name: name.into(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        }
    }

    /// An empty function type named `fn`.
    pub fn make_fn() -> Ty {
        Ty {
            kind: TyKind::Function {
                args: Vec::new(),
                return_ty: None,
                is_variadic: false,
                receives_return_type: false,
                callers: Vec::new(),
            },
            name: "fn".into(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        }
    }

    /// An object type with the given class name and no fields yet.
    pub fn make_object(name: impl Into<String>) -> Ty {
        Ty {
            kind: TyKind::Object { fields: Vec::new() },
            name: name.into(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        }
    }

    /// A pointer type wrapping `pointee`.
    pub fn make_pointer(pointee: Ty) -> Ty {
        Ty {
            kind: TyKind::Pointer {
                arg: Some(Box::new(pointee)),
            },
            name: "ptr".into(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        }
    }

    /// The weak `{i64|f64}` placeholder given to integer literals
    /// before context assigns them a concrete type.
    pub fn weak_number() -> Ty {
        Ty {
            kind: TyKind::Multiple {
                types: vec![Ty::make("i64"), Ty::make("f64")],
                is_weak: true,
            },
            name: String::new(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        }
    }

    pub fn is_single(&self) -> bool {
        matches!(self.kind, TyKind::Single)
    }

    pub fn is_multiple(&self) -> bool {
        matches!(self.kind, TyKind::Multiple { .. })
    }

    pub fn is_function(&self) -> bool {
        matches!(self.kind, TyKind::Function { .. })
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TyKind::Pointer { .. })
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, TyKind::Object { .. })
    }

    /// Weakness is a property of multiple types only.
    pub fn is_weak(&self) -> bool {
        matches!(
            self.kind,
            TyKind::Multiple { is_weak: true, .. }
        )
    }

    /// Member list of a multiple type; empty for every other variant.
    pub fn members(&self) -> &[Ty] {
        match &self.kind {
            TyKind::Multiple { types, .. } => types,
            _ => &[],
        }
    }

    /// True if the name is one of the built-in primitive type names.
    pub fn is_built_in_name(name: &str) -> bool {
        matches!(
            name,
            "i8" | "i16"
                | "i32"
                | "i64"
                | "i128"
                | "f32"
                | "f64"
                | "bool"
                | "null"
                | "cstr"
                | "str"
                | "any"
                | "i8%"
                | "i16%"
                | "i32%"
                | "i64%"
                | "f32%"
                | "f64%"
        )
    }

    /// True if the name is a numeric primitive.
    pub fn is_number_name(name: &str) -> bool {
        Ty::is_integer_name(name) || Ty::is_float_name(name)
    }

    pub fn is_integer_name(name: &str) -> bool {
        matches!(name, "i8" | "i16" | "i32" | "i64" | "i128")
    }

    pub fn is_float_name(name: &str) -> bool {
        matches!(name, "f32" | "f64")
    }

    pub fn is_number(&self) -> bool {
        self.is_single() && Ty::is_number_name(&self.name)
    }

    pub fn is_integer(&self) -> bool {
        self.is_single() && Ty::is_integer_name(&self.name)
    }

    pub fn is_float(&self) -> bool {
        self.is_single() && Ty::is_float_name(&self.name)
    }

    // -----------------------------------------------------------------
    // Function type accessors
    // -----------------------------------------------------------------

    pub fn fn_args(&self) -> &[FnArg] {
        match &self.kind {
            TyKind::Function { args, .. } => args,
            _ => &[],
        }
    }

    pub fn add_fn_arg(&mut self, arg: FnArg) {
        if let TyKind::Function { args, .. } = &mut self.kind {
            args.push(arg);
        }
    }

    /// Prepends an argument; used to introduce the implicit `@self`.
    pub fn prepend_fn_arg(&mut self, arg: FnArg) {
        if let TyKind::Function { args, .. } = &mut self.kind {
            args.insert(0, arg);
        }
    }

    /// Drops the implicit `@self` argument again.
    pub fn remove_first_fn_arg(&mut self) {
        if let TyKind::Function { args, .. } = &mut self.kind {
            if !args.is_empty() {
                args.remove(0);
            }
        }
    }

    pub fn return_ty(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Function { return_ty, .. } => return_ty.as_deref(),
            _ => None,
        }
    }

    pub fn set_return_ty(&mut self, ty: Ty) {
        if let TyKind::Function { return_ty, .. } = &mut self.kind {
            *return_ty = Some(Box::new(ty));
        }
    }

    pub fn add_caller(&mut self, caller: NodeId) {
        if let TyKind::Function { callers, .. } = &mut self.kind {
            callers.push(caller);
        }
    }

    pub fn callers(&self) -> &[NodeId] {
        match &self.kind {
            TyKind::Function { callers, .. } => callers,
            _ => &[],
        }
    }

    pub fn is_variadic(&self) -> bool {
        matches!(
            self.kind,
            TyKind::Function {
                is_variadic: true,
                ..
            }
        )
    }

    // -----------------------------------------------------------------
    // Pointer type accessors
    // -----------------------------------------------------------------

    pub fn pointee(&self) -> Option<&Ty> {
        match &self.kind {
            TyKind::Pointer { arg } => arg.as_deref(),
            _ => None,
        }
    }

    pub fn set_pointee(&mut self, ty: Ty) {
        if let TyKind::Pointer { arg } = &mut self.kind {
            *arg = Some(Box::new(ty));
        }
    }

    // -----------------------------------------------------------------
    // Equality and merge
    // -----------------------------------------------------------------

    /// Structural equality. Excludes provenance (`strong_type_name`),
    /// the registered callers of a function type, and builder-only
    /// flags.
    pub fn equal_to(&self, other: &Ty) -> bool {
        if self.name != other.name || self.is_nullable != other.is_nullable {
            return false;
        }
        if self.tmpl_params.len() != other.tmpl_params.len()
            || !self
                .tmpl_params
                .iter()
                .zip(&other.tmpl_params)
                .all(|(a, b)| a.equal_to(b))
        {
            return false;
        }
        match (&self.kind, &other.kind) {
            (TyKind::Single, TyKind::Single) => true,
            (
                TyKind::Multiple { types: a, is_weak: wa },
                TyKind::Multiple { types: b, is_weak: wb },
            ) => wa == wb && a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal_to(y)),
            (
                TyKind::Function {
                    args: a,
                    return_ty: ra,
                    is_variadic: va,
                    ..
                },
                TyKind::Function {
                    args: b,
                    return_ty: rb,
                    is_variadic: vb,
                    ..
                },
            ) => {
                va == vb
                    && a.len() == b.len()
                    && a.iter().zip(b).all(|(x, y)| match (x, y) {
                        (FnArg::Ty(x), FnArg::Ty(y)) => x.equal_to(y),
                        (FnArg::Decl(x), FnArg::Decl(y)) => x == y,
                        _ => false,
                    })
                    && match (ra, rb) {
                        (Some(x), Some(y)) => x.equal_to(y),
                        (None, None) => true,
                        _ => false,
                    }
            }
            (TyKind::Pointer { arg: a }, TyKind::Pointer { arg: b }) => match (a, b) {
                (Some(x), Some(y)) => x.equal_to(y),
                (None, None) => true,
                _ => false,
            },
            (TyKind::Object { fields: a }, TyKind::Object { fields: b }) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.equal_to(y))
            }
            (
                TyKind::StaticArray { elem: a, size: sa },
                TyKind::StaticArray { elem: b, size: sb },
            ) => sa == sb && a.equal_to(b),
            (
                TyKind::Simd { elem: a, width: wa },
                TyKind::Simd { elem: b, width: wb },
            ) => wa == wb && a.equal_to(b),
            _ => false,
        }
    }

    /// Produces the narrowest type both inputs satisfy, or `None` when
    /// they cannot be reconciled.
    ///
    /// The weak flag makes this asymmetric: a weak multiple type stands
    /// for "one of these, to be decided", so merging it against a
    /// concrete member yields the concrete member, and merging two weak
    /// placeholders unions their candidates. Strong multiple types are
    /// real unions and extend instead.
    pub fn merge(a: Option<&Ty>, b: Option<&Ty>) -> Option<Ty> {
        let (a, b) = match (a, b) {
            (None, None) => return None,
            (Some(a), None) => return Some(a.clone()),
            (None, Some(b)) => return Some(b.clone()),
            (Some(a), Some(b)) => (a, b),
        };
        if a.equal_to(b) {
            return Some(a.clone());
        }

        let mut multi_a: Option<Ty> = a.is_multiple().then(|| a.clone());
        let multi_b: Option<&Ty> = b.is_multiple().then_some(b);

        if let (Some(mb), None) = (multi_b, &multi_a) {
            if mb.is_weak() && mb.members().iter().any(|t| t.equal_to(a)) {
                return Some(a.clone());
            }
            // Wrap the concrete side so both are multiple below.
            multi_a = Some(Ty {
                kind: TyKind::Multiple {
                    types: vec![a.clone()],
                    is_weak: false,
                },
                name: String::new(),
                strong_type_name: None,
                is_nullable: false,
                tmpl_params: Vec::new(),
            });
        }
        if let (Some(ma), None) = (&multi_a, multi_b) {
            if ma.is_weak() {
                return ma
                    .members()
                    .iter()
                    .any(|t| t.equal_to(b))
                    .then(|| b.clone());
            }
        }

        match (multi_a, multi_b) {
            (Some(mut ma), Some(mb)) => {
                let a_weak = ma.is_weak();
                let b_weak = mb.is_weak();
                if a_weak == b_weak {
                    // Union the members into a.
                    let extra: Vec<Ty> = mb
                        .members()
                        .iter()
                        .filter(|tb| !ma.members().iter().any(|ta| ta.equal_to(tb)))
                        .cloned()
                        .collect();
                    if let TyKind::Multiple { types, .. } = &mut ma.kind {
                        types.extend(extra);
                    }
                    Some(ma)
                } else if a_weak {
                    // Intersection must be a single member.
                    let mut found: Option<Ty> = None;
                    for tb in mb.members() {
                        if ma.members().iter().any(|ta| ta.equal_to(tb)) {
                            if found.is_some() {
                                return None;
                            }
                            found = Some(tb.clone());
                        }
                    }
                    found
                } else {
                    // b is weak: the first member of a that b allows wins.
                    ma.members()
                        .iter()
                        .find(|ta| mb.members().iter().any(|tb| tb.equal_to(ta)))
                        .cloned()
                }
            }
            (Some(mut ma), None) => {
                // a is a strong union; extend it with b.
                if !ma.members().iter().any(|ta| ta.equal_to(b)) {
                    if let TyKind::Multiple { types, .. } = &mut ma.kind {
                        types.push(b.clone());
                    }
                }
                Some(ma)
            }
            _ => {
                // Two unequal non-multiple types form a new union.
                Some(Ty {
                    kind: TyKind::Multiple {
                        types: vec![a.clone(), b.clone()],
                        is_weak: false,
                    },
                    name: String::new(),
                    strong_type_name: None,
                    is_nullable: false,
                    tmpl_params: Vec::new(),
                })
            }
        }
    }
}

impl fmt::Display for Ty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            TyKind::Single => write!(f, "{}", self.name)?,
            TyKind::Multiple { types, .. } => {
                let names: Vec<String> = types.iter().map(|t| t.to_string()).collect();
                write!(f, "{}", names.join("|"))?;
            }
            TyKind::Function { return_ty, .. } => {
                write!(f, "fn")?;
                if let Some(ret) = return_ty {
                    write!(f, "=>{ret}")?;
                }
            }
            TyKind::Pointer { arg } => match arg {
                Some(p) => write!(f, "ptr({p})")?,
                None => write!(f, "ptr")?,
            },
            TyKind::Object { .. } => write!(f, "@{}", self.name)?,
            TyKind::StaticArray { elem, size } => {
                let size = match size {
                    StaticSize::Literal(s) | StaticSize::Name(s) => s,
                };
                write!(f, "[{size} x {elem}]")?;
            }
            TyKind::Simd { elem, width } => write!(f, "{elem}x{width}")?,
        }
        if self.is_nullable {
            write!(f, "?")?;
        }
        Ok(())
    }
}
