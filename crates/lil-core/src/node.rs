//! The heterogeneous AST node model.
//!
//! Every node is a [`Node`] carrying a [`NodeKind`] variant payload,
//! an optional type, a source location, a parent back-reference, and
//! an ordered child list. Structure lives in the child list; payloads
//! hold scalars plus *role* references (ids that also appear among the
//! children) where a variant needs to address a child directly, such
//! as an expression's left and right operands.
//!
//! Scope-owning variants (root, function declarations, flow control,
//! class declarations, conversion declarations) additionally carry a
//! local name table used by outward name resolution.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::id::NodeId;
use crate::loc::SourceLocation;
use crate::ty::Ty;

// ---------------------------------------------------------------------------
// Variant-discriminating enums
// ---------------------------------------------------------------------------

/// Binary expression operators, including the cast pseudo-operator
/// whose right operand is a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpressionKind {
    Sum,
    Subtraction,
    Multiplication,
    Division,
    EqualComparison,
    NotEqualComparison,
    BiggerComparison,
    BiggerOrEqualComparison,
    SmallerComparison,
    SmallerOrEqualComparison,
    LogicalAnd,
    LogicalOr,
    BitwiseAnd,
    BitwiseOr,
    Cast,
}

impl ExpressionKind {
    /// The operator as written in source, used by the printer.
    pub fn symbol(self) -> &'static str {
        match self {
            ExpressionKind::Sum => "+",
            ExpressionKind::Subtraction => "-",
            ExpressionKind::Multiplication => "*",
            ExpressionKind::Division => "/",
            ExpressionKind::EqualComparison => "=",
            ExpressionKind::NotEqualComparison => "!=",
            ExpressionKind::BiggerComparison => ">",
            ExpressionKind::BiggerOrEqualComparison => ">=",
            ExpressionKind::SmallerComparison => "<",
            ExpressionKind::SmallerOrEqualComparison => "<=",
            ExpressionKind::LogicalAnd => "&&",
            ExpressionKind::LogicalOr => "||",
            ExpressionKind::BitwiseAnd => "&",
            ExpressionKind::BitwiseOr => "|",
            ExpressionKind::Cast => "=>",
        }
    }

    /// Maps an operator token to its kind. Note `=` here is the
    /// equality comparison: in assignment position the builder never
    /// routes the token to an expression.
    pub fn from_symbol(sym: &str) -> Option<ExpressionKind> {
        Some(match sym {
            "+" => ExpressionKind::Sum,
            "-" => ExpressionKind::Subtraction,
            "*" => ExpressionKind::Multiplication,
            "/" => ExpressionKind::Division,
            "=" => ExpressionKind::EqualComparison,
            "!=" => ExpressionKind::NotEqualComparison,
            ">" => ExpressionKind::BiggerComparison,
            ">=" => ExpressionKind::BiggerOrEqualComparison,
            "<" => ExpressionKind::SmallerComparison,
            "<=" => ExpressionKind::SmallerOrEqualComparison,
            "&&" => ExpressionKind::LogicalAnd,
            "||" => ExpressionKind::LogicalOr,
            "&" => ExpressionKind::BitwiseAnd,
            "|" => ExpressionKind::BitwiseOr,
            "=>" => ExpressionKind::Cast,
            _ => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryExpressionKind {
    Sign,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionDeclKind {
    Fn,
    Insert,
    Override,
    Macro,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionCallKind {
    /// A plain call through a name.
    None,
    /// A call that is a segment of a value path.
    ValuePath,
    Ref,
    Sel,
    Flag,
    Unflag,
    AddFlag,
    TakeFlag,
    ReplaceFlag,
    PointerTo,
    ValueOf,
    Set,
    SizeOf,
    /// A synthesized call to a registered conversion.
    Conversion,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControlKind {
    If,
    IfIs,
    IfCast,
    Else,
    Switch,
    Case,
    Default,
    Loop,
    For,
    Finally,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowControlCallKind {
    Return,
    Repeat,
    Continue,
    Break,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectorKind {
    Universal,
    Name,
    SelfSelector,
    ThisSelector,
    RootSelector,
    ParentSelector,
    SuperSelector,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CombinatorKind {
    Descendants,
    Siblings,
    NextSiblings,
    PreviousSiblings,
    Children,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InstructionKind {
    Needs,
    Import,
    Export,
    If,
    Paste,
    Snippet,
    Arg,
    Expand,
    New,
    Move,
    Delete,
    Configure,
    GetConfig,
    Bug,
    Resource,
    Gpu,
    Grayscale1,
    Grayscale2,
    Rgb,
    Rgba,
    Rgbaa,
    Rrggbb,
    Rrggbba,
    Rrggbbaa,
}

impl InstructionKind {
    pub fn is_color(self) -> bool {
        matches!(
            self,
            InstructionKind::Grayscale1
                | InstructionKind::Grayscale2
                | InstructionKind::Rgb
                | InstructionKind::Rgba
                | InstructionKind::Rgbaa
                | InstructionKind::Rrggbb
                | InstructionKind::Rrggbba
                | InstructionKind::Rrggbbaa
        )
    }

    pub fn from_keyword(kw: &str) -> Option<InstructionKind> {
        Some(match kw {
            "needs" => InstructionKind::Needs,
            "import" => InstructionKind::Import,
            "export" => InstructionKind::Export,
            "if" => InstructionKind::If,
            "paste" => InstructionKind::Paste,
            "snippet" => InstructionKind::Snippet,
            "arg" => InstructionKind::Arg,
            "expand" => InstructionKind::Expand,
            "new" => InstructionKind::New,
            "move" => InstructionKind::Move,
            "delete" => InstructionKind::Delete,
            "configure" => InstructionKind::Configure,
            "getConfig" => InstructionKind::GetConfig,
            "bug" => InstructionKind::Bug,
            "resource" => InstructionKind::Resource,
            "gpu" => InstructionKind::Gpu,
            _ => return None,
        })
    }
}

/// Scope table type used by scope-owning variants.
pub type ScopeTable = IndexMap<String, NodeId>;

// ---------------------------------------------------------------------------
// NodeKind
// ---------------------------------------------------------------------------

/// The closed set of AST variants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum NodeKind {
    /// The document root. Top-level declarations are its children.
    Root { local_vars: ScopeTable },

    // Literals
    BoolLiteral {
        value: bool,
    },
    /// Numeric literal. The digits stay as written; the numeric type
    /// (weak `{i64|f64}` or concrete) lives on the node's `ty`.
    NumberLiteral {
        value: String,
    },
    PercentageLiteral {
        value: String,
    },
    StringLiteral {
        value: String,
        is_cstring: bool,
    },
    /// String interpolation: chunks interleaved with the embedded
    /// expressions, which are the children.
    StringFunction {
        start: String,
        mids: Vec<String>,
        end: String,
    },
    NullLiteral,

    // Names and paths
    VarName {
        name: String,
    },
    PropertyName {
        name: String,
    },
    /// Member access / method call chain. Children are the segments.
    ValuePath {
        prevent_emit_call_to_ivar: bool,
    },

    // Declarations
    /// A variable declaration. Multiple initializers encode a typed
    /// overload set under one name.
    VarDecl {
        name: String,
        is_extern: bool,
        is_ivar: bool,
        is_vvar: bool,
        is_const: bool,
        init_vals: Vec<NodeId>,
    },
    AliasDecl {
        src_ty: Option<Ty>,
        dst_ty: Option<Ty>,
    },
    TypeDecl {
        src_ty: Option<Ty>,
        dst_ty: Option<Ty>,
    },
    /// A conversion between two types; children are the single
    /// argument VarDecl plus the body statements.
    ConversionDecl {
        src_ty: Option<Ty>,
        dst_ty: Option<Ty>,
        var_decl: Option<NodeId>,
        body: Vec<NodeId>,
        local_vars: ScopeTable,
    },
    EnumDecl {
        name: String,
    },
    ClassDecl {
        /// Builder flag: the next committed type is the inherit type.
        receives_inherits: bool,
        inherit_ty: Option<Ty>,
        is_extern: bool,
        is_template: bool,
        fields: Vec<NodeId>,
        methods: Vec<NodeId>,
        aliases: Vec<NodeId>,
        docs: Vec<NodeId>,
        local_vars: ScopeTable,
    },

    // Composite values
    ObjectDefinition,
    ValueList,
    Assignment {
        subject: Option<NodeId>,
        value: Option<NodeId>,
    },

    // Operators
    Expression {
        op: ExpressionKind,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    },
    UnaryExpression {
        op: UnaryExpressionKind,
        value: Option<NodeId>,
    },

    // Rules
    Rule {
        selector_chains: Vec<NodeId>,
        values: Vec<NodeId>,
        child_rules: Vec<NodeId>,
    },
    SelectorChain,
    SimpleSelector,
    Selector {
        kind: SelectorKind,
        name: String,
    },
    Combinator {
        kind: CombinatorKind,
    },
    Filter {
        name: String,
    },
    Flag {
        name: String,
    },

    // Control flow
    FlowControl {
        kind: FlowControlKind,
        receives_function_body: bool,
        receives_else: bool,
        args: Vec<NodeId>,
        then: Vec<NodeId>,
        els: Vec<NodeId>,
        local_vars: ScopeTable,
    },
    FlowControlCall {
        kind: FlowControlCallKind,
        argument: Option<NodeId>,
    },

    // Functions
    FunctionDecl {
        kind: FunctionDeclKind,
        name: Option<String>,
        is_constructor: bool,
        needs_name_mangling: bool,
        has_return: bool,
        receives_function_body: bool,
        args: Vec<NodeId>,
        body: Vec<NodeId>,
        finally: Option<NodeId>,
        local_vars: ScopeTable,
    },
    FunctionCall {
        kind: FunctionCallKind,
        name: String,
        arg_types: Vec<Ty>,
        return_ty: Option<Ty>,
    },

    // Instructions
    Instruction {
        kind: InstructionKind,
        name: String,
        is_color: bool,
        argument: Option<NodeId>,
    },
    IfInstruction {
        receives_else: bool,
        condition: Option<NodeId>,
        then: Vec<NodeId>,
        els: Vec<NodeId>,
    },
    SnippetInstruction {
        name: String,
    },
    ForeignLang {
        language: String,
        content: String,
    },

    // Misc
    /// One-argument subscript segment inside a value path.
    IndexAccessor,
    Documentation {
        content: String,
    },
    /// An embedded type operand (cast right-hand side, `if cast`
    /// argument, builder intermediate).
    Type(Ty),
}

impl NodeKind {
    /// Stable variant name for diagnostics and the printer.
    pub fn variant_name(&self) -> &'static str {
        match self {
            NodeKind::Root { .. } => "root",
            NodeKind::BoolLiteral { .. } => "boolLiteral",
            NodeKind::NumberLiteral { .. } => "numberLiteral",
            NodeKind::PercentageLiteral { .. } => "percentageLiteral",
            NodeKind::StringLiteral { .. } => "stringLiteral",
            NodeKind::StringFunction { .. } => "stringFunction",
            NodeKind::NullLiteral => "nullLiteral",
            NodeKind::VarName { .. } => "varName",
            NodeKind::PropertyName { .. } => "propertyName",
            NodeKind::ValuePath { .. } => "valuePath",
            NodeKind::VarDecl { .. } => "varDecl",
            NodeKind::AliasDecl { .. } => "aliasDecl",
            NodeKind::TypeDecl { .. } => "typeDecl",
            NodeKind::ConversionDecl { .. } => "conversionDecl",
            NodeKind::EnumDecl { .. } => "enum",
            NodeKind::ClassDecl { .. } => "classDecl",
            NodeKind::ObjectDefinition => "objectDefinition",
            NodeKind::ValueList => "valueList",
            NodeKind::Assignment { .. } => "assignment",
            NodeKind::Expression { .. } => "expression",
            NodeKind::UnaryExpression { .. } => "unaryExpression",
            NodeKind::Rule { .. } => "rule",
            NodeKind::SelectorChain => "selectorChain",
            NodeKind::SimpleSelector => "simpleSelector",
            NodeKind::Selector { .. } => "selector",
            NodeKind::Combinator { .. } => "combinator",
            NodeKind::Filter { .. } => "filter",
            NodeKind::Flag { .. } => "flag",
            NodeKind::FlowControl { .. } => "flowControl",
            NodeKind::FlowControlCall { .. } => "flowControlCall",
            NodeKind::FunctionDecl { .. } => "functionDecl",
            NodeKind::FunctionCall { .. } => "functionCall",
            NodeKind::Instruction { .. } => "instruction",
            NodeKind::IfInstruction { .. } => "ifInstruction",
            NodeKind::SnippetInstruction { .. } => "snippetInstruction",
            NodeKind::ForeignLang { .. } => "foreignLang",
            NodeKind::IndexAccessor => "indexAccessor",
            NodeKind::Documentation { .. } => "documentation",
            NodeKind::Type(_) => "type",
        }
    }

    /// Container variants collect committed children while open in the
    /// builder.
    pub fn is_container(&self) -> bool {
        matches!(
            self,
            NodeKind::Root { .. }
                | NodeKind::StringFunction { .. }
                | NodeKind::ValuePath { .. }
                | NodeKind::VarDecl { .. }
                | NodeKind::ConversionDecl { .. }
                | NodeKind::EnumDecl { .. }
                | NodeKind::ClassDecl { .. }
                | NodeKind::ObjectDefinition
                | NodeKind::ValueList
                | NodeKind::Assignment { .. }
                | NodeKind::Expression { .. }
                | NodeKind::UnaryExpression { .. }
                | NodeKind::Rule { .. }
                | NodeKind::SelectorChain
                | NodeKind::SimpleSelector
                | NodeKind::FlowControl { .. }
                | NodeKind::FlowControlCall { .. }
                | NodeKind::FunctionDecl { .. }
                | NodeKind::FunctionCall { .. }
                | NodeKind::Instruction { .. }
                | NodeKind::IfInstruction { .. }
                | NodeKind::SnippetInstruction { .. }
                | NodeKind::IndexAccessor
        )
    }

    /// Typed variants carry a meaningful `ty` slot.
    pub fn is_typed(&self) -> bool {
        matches!(
            self,
            NodeKind::NumberLiteral { .. }
                | NodeKind::PercentageLiteral { .. }
                | NodeKind::StringLiteral { .. }
                | NodeKind::StringFunction { .. }
                | NodeKind::ValuePath { .. }
                | NodeKind::VarDecl { .. }
                | NodeKind::ObjectDefinition
                | NodeKind::ValueList
                | NodeKind::Assignment { .. }
                | NodeKind::Expression { .. }
                | NodeKind::UnaryExpression { .. }
                | NodeKind::FunctionDecl { .. }
                | NodeKind::FunctionCall { .. }
                | NodeKind::IndexAccessor
                | NodeKind::ClassDecl { .. }
        )
    }

    /// Scope-owning variants maintain a local name table.
    pub fn is_scope_owner(&self) -> bool {
        matches!(
            self,
            NodeKind::Root { .. }
                | NodeKind::FunctionDecl { .. }
                | NodeKind::FlowControl { .. }
                | NodeKind::ClassDecl { .. }
                | NodeKind::ConversionDecl { .. }
        )
    }

    pub fn is_root(&self) -> bool {
        matches!(self, NodeKind::Root { .. })
    }

    /// Access the local scope table of a scope-owning variant.
    pub fn local_vars(&self) -> Option<&ScopeTable> {
        match self {
            NodeKind::Root { local_vars }
            | NodeKind::FunctionDecl { local_vars, .. }
            | NodeKind::FlowControl { local_vars, .. }
            | NodeKind::ClassDecl { local_vars, .. }
            | NodeKind::ConversionDecl { local_vars, .. } => Some(local_vars),
            _ => None,
        }
    }

    pub fn local_vars_mut(&mut self) -> Option<&mut ScopeTable> {
        match self {
            NodeKind::Root { local_vars }
            | NodeKind::FunctionDecl { local_vars, .. }
            | NodeKind::FlowControl { local_vars, .. }
            | NodeKind::ClassDecl { local_vars, .. }
            | NodeKind::ConversionDecl { local_vars, .. } => Some(local_vars),
            _ => None,
        }
    }

    /// Compares the scalar payload of two kinds: variant tag plus
    /// every non-structural field. Node ids, scope tables, and builder
    /// bookkeeping are excluded; tree structure is compared separately
    /// by walking children.
    pub fn scalar_eq(&self, other: &NodeKind) -> bool {
        use NodeKind::*;
        match (self, other) {
            (Root { .. }, Root { .. }) => true,
            (BoolLiteral { value: a }, BoolLiteral { value: b }) => a == b,
            (NumberLiteral { value: a }, NumberLiteral { value: b }) => a == b,
            (PercentageLiteral { value: a }, PercentageLiteral { value: b }) => a == b,
            (
                StringLiteral {
                    value: a,
                    is_cstring: ca,
                },
                StringLiteral {
                    value: b,
                    is_cstring: cb,
                },
            ) => a == b && ca == cb,
            (
                StringFunction {
                    start: sa,
                    mids: ma,
                    end: ea,
                },
                StringFunction {
                    start: sb,
                    mids: mb,
                    end: eb,
                },
            ) => sa == sb && ma == mb && ea == eb,
            (NullLiteral, NullLiteral) => true,
            (VarName { name: a }, VarName { name: b }) => a == b,
            (PropertyName { name: a }, PropertyName { name: b }) => a == b,
            (ValuePath { .. }, ValuePath { .. }) => true,
            (
                VarDecl {
                    name: na,
                    is_extern: ea,
                    is_ivar: ia,
                    is_vvar: va,
                    is_const: ca,
                    ..
                },
                VarDecl {
                    name: nb,
                    is_extern: eb,
                    is_ivar: ib,
                    is_vvar: vb,
                    is_const: cb,
                    ..
                },
            ) => na == nb && ea == eb && ia == ib && va == vb && ca == cb,
            (
                AliasDecl {
                    src_ty: sa,
                    dst_ty: da,
                },
                AliasDecl {
                    src_ty: sb,
                    dst_ty: db,
                },
            )
            | (
                TypeDecl {
                    src_ty: sa,
                    dst_ty: da,
                },
                TypeDecl {
                    src_ty: sb,
                    dst_ty: db,
                },
            ) => opt_ty_eq(sa, sb) && opt_ty_eq(da, db),
            (
                ConversionDecl {
                    src_ty: sa,
                    dst_ty: da,
                    ..
                },
                ConversionDecl {
                    src_ty: sb,
                    dst_ty: db,
                    ..
                },
            ) => opt_ty_eq(sa, sb) && opt_ty_eq(da, db),
            (EnumDecl { name: a }, EnumDecl { name: b }) => a == b,
            (
                ClassDecl {
                    inherit_ty: ia,
                    is_extern: ea,
                    is_template: ta,
                    ..
                },
                ClassDecl {
                    inherit_ty: ib,
                    is_extern: eb,
                    is_template: tb,
                    ..
                },
            ) => opt_ty_eq(ia, ib) && ea == eb && ta == tb,
            (ObjectDefinition, ObjectDefinition) => true,
            (ValueList, ValueList) => true,
            (Assignment { .. }, Assignment { .. }) => true,
            (Expression { op: a, .. }, Expression { op: b, .. }) => a == b,
            (UnaryExpression { op: a, .. }, UnaryExpression { op: b, .. }) => a == b,
            (Rule { .. }, Rule { .. }) => true,
            (SelectorChain, SelectorChain) => true,
            (SimpleSelector, SimpleSelector) => true,
            (
                Selector { kind: ka, name: na },
                Selector { kind: kb, name: nb },
            ) => ka == kb && na == nb,
            (Combinator { kind: a }, Combinator { kind: b }) => a == b,
            (Filter { name: a }, Filter { name: b }) => a == b,
            (Flag { name: a }, Flag { name: b }) => a == b,
            (FlowControl { kind: a, .. }, FlowControl { kind: b, .. }) => a == b,
            (FlowControlCall { kind: a, .. }, FlowControlCall { kind: b, .. }) => a == b,
            (
                FunctionDecl {
                    kind: ka,
                    name: na,
                    is_constructor: ca,
                    ..
                },
                FunctionDecl {
                    kind: kb,
                    name: nb,
                    is_constructor: cb,
                    ..
                },
            ) => ka == kb && na == nb && ca == cb,
            (
                FunctionCall {
                    kind: ka,
                    name: na,
                    ..
                },
                FunctionCall {
                    kind: kb,
                    name: nb,
                    ..
                },
            ) => ka == kb && na == nb,
            (
                Instruction {
                    kind: ka,
                    name: na,
                    ..
                },
                Instruction {
                    kind: kb,
                    name: nb,
                    ..
                },
            ) => ka == kb && na == nb,
            (IfInstruction { .. }, IfInstruction { .. }) => true,
            (SnippetInstruction { name: a }, SnippetInstruction { name: b }) => a == b,
            (
                ForeignLang {
                    language: la,
                    content: ca,
                },
                ForeignLang {
                    language: lb,
                    content: cb,
                },
            ) => la == lb && ca == cb,
            (IndexAccessor, IndexAccessor) => true,
            (Documentation { content: a }, Documentation { content: b }) => a == b,
            (Type(a), Type(b)) => a.equal_to(b),
            _ => false,
        }
    }
}

fn opt_ty_eq(a: &Option<Ty>, b: &Option<Ty>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a.equal_to(b),
        (None, None) => true,
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// An AST node as stored in the arena.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub kind: NodeKind,
    /// The node's type, when the variant is typed.
    pub ty: Option<Ty>,
    pub loc: SourceLocation,
    /// Lazily created: a node has no parent until added as a child.
    pub parent: Option<NodeId>,
    /// Insertion order is semantically meaningful.
    pub children: SmallVec<[NodeId; 4]>,
    /// Suppresses printing.
    pub hidden: bool,
    pub exported: bool,
}

impl Node {
    pub fn new(kind: NodeKind) -> Node {
        Node {
            kind,
            ty: None,
            loc: SourceLocation::default(),
            parent: None,
            children: SmallVec::new(),
            hidden: false,
            exported: false,
        }
    }

    /// Absorbs an identifier token from the parser. What the string
    /// means depends on the variant: a name for declarations and
    /// names, appended digits for numbers, a keyword for flow control,
    /// appended characters for a type name.
    pub fn receive_node_data(&mut self, data: &str) {
        match &mut self.kind {
            NodeKind::BoolLiteral { value } => {
                *value = data == "true";
            }
            NodeKind::NumberLiteral { value } | NodeKind::PercentageLiteral { value } => {
                value.push_str(data);
            }
            NodeKind::StringLiteral { value, .. } => {
                value.push_str(data);
            }
            NodeKind::VarName { name }
            | NodeKind::PropertyName { name }
            | NodeKind::Filter { name }
            | NodeKind::Flag { name }
            | NodeKind::EnumDecl { name }
            | NodeKind::SnippetInstruction { name } => {
                *name = data.to_string();
            }
            NodeKind::VarDecl { name, .. } => {
                *name = data.to_string();
            }
            NodeKind::Selector { kind, name } => match data {
                "@" => {}
                "*" => {
                    *kind = SelectorKind::Universal;
                    *name = "*".into();
                }
                "this" => {
                    *kind = SelectorKind::ThisSelector;
                    *name = "@this".into();
                }
                "root" => {
                    *kind = SelectorKind::RootSelector;
                    *name = "@root".into();
                }
                "parent" => {
                    *kind = SelectorKind::ParentSelector;
                    *name = "@parent".into();
                }
                "self" => {
                    *kind = SelectorKind::SelfSelector;
                    *name = "@self".into();
                }
                "super" => {
                    *kind = SelectorKind::SuperSelector;
                    *name = "@super".into();
                }
                other => {
                    *kind = SelectorKind::Name;
                    *name = other.to_string();
                }
            },
            NodeKind::Combinator { kind } => {
                *kind = match data {
                    ".." => CombinatorKind::Descendants,
                    "=" => CombinatorKind::Siblings,
                    "+" => CombinatorKind::NextSiblings,
                    "-" => CombinatorKind::PreviousSiblings,
                    _ => CombinatorKind::Children,
                };
            }
            NodeKind::FlowControl { kind, .. } => {
                if let Some(k) = match data {
                    "if" => Some(FlowControlKind::If),
                    "else" => Some(FlowControlKind::Else),
                    "switch" => Some(FlowControlKind::Switch),
                    "case" => Some(FlowControlKind::Case),
                    "default" => Some(FlowControlKind::Default),
                    "loop" => Some(FlowControlKind::Loop),
                    "for" => Some(FlowControlKind::For),
                    "finally" => Some(FlowControlKind::Finally),
                    _ => None,
                } {
                    *kind = k;
                }
            }
            NodeKind::FlowControlCall { kind, .. } => {
                if let Some(k) = match data {
                    "return" => Some(FlowControlCallKind::Return),
                    "repeat" => Some(FlowControlCallKind::Repeat),
                    "continue" => Some(FlowControlCallKind::Continue),
                    "break" => Some(FlowControlCallKind::Break),
                    _ => None,
                } {
                    *kind = k;
                }
            }
            NodeKind::FunctionDecl { kind, .. } => {
                if let Some(k) = match data {
                    "fn" => Some(FunctionDeclKind::Fn),
                    "override" => Some(FunctionDeclKind::Override),
                    "insert" => Some(FunctionDeclKind::Insert),
                    "macro" => Some(FunctionDeclKind::Macro),
                    _ => None,
                } {
                    *kind = k;
                }
            }
            NodeKind::FunctionCall { kind, name, .. } => {
                if let Some(k) = match data {
                    "ref" => Some(FunctionCallKind::Ref),
                    "sel" => Some(FunctionCallKind::Sel),
                    "flag" => Some(FunctionCallKind::Flag),
                    "unflag" => Some(FunctionCallKind::Unflag),
                    "addFlag" => Some(FunctionCallKind::AddFlag),
                    "takeFlag" => Some(FunctionCallKind::TakeFlag),
                    "replaceFlag" => Some(FunctionCallKind::ReplaceFlag),
                    "pointerTo" => Some(FunctionCallKind::PointerTo),
                    "valueOf" => Some(FunctionCallKind::ValueOf),
                    "set" => Some(FunctionCallKind::Set),
                    "sizeOf" => Some(FunctionCallKind::SizeOf),
                    _ => None,
                } {
                    *kind = k;
                }
                *name = data.to_string();
            }
            NodeKind::Instruction { kind, name, is_color, .. } => {
                if let Some(k) = InstructionKind::from_keyword(data) {
                    *kind = k;
                    *is_color = k.is_color();
                }
                *name = data.to_string();
            }
            NodeKind::Type(ty) => {
                // Type names arrive in pieces (`ptr`, `(`, name, ...).
                ty.name.push_str(data);
            }
            NodeKind::ForeignLang { language, content } => {
                if language.is_empty() {
                    *language = data.to_string();
                } else {
                    content.push_str(data);
                }
            }
            NodeKind::Documentation { content } => {
                content.push_str(data);
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_names_are_stable() {
        assert_eq!(NodeKind::NullLiteral.variant_name(), "nullLiteral");
        assert_eq!(
            NodeKind::VarName { name: "x".into() }.variant_name(),
            "varName"
        );
    }

    #[test]
    fn number_literal_accumulates_digits() {
        let mut node = Node::new(NodeKind::NumberLiteral {
            value: String::new(),
        });
        node.receive_node_data("4");
        node.receive_node_data("2");
        assert!(matches!(
            &node.kind,
            NodeKind::NumberLiteral { value } if value == "42"
        ));
    }

    #[test]
    fn selector_data_sets_kind() {
        let mut node = Node::new(NodeKind::Selector {
            kind: SelectorKind::Name,
            name: String::new(),
        });
        node.receive_node_data("@");
        node.receive_node_data("self");
        assert!(matches!(
            &node.kind,
            NodeKind::Selector {
                kind: SelectorKind::SelfSelector,
                name
            } if name == "@self"
        ));
    }

    #[test]
    fn flow_control_keyword_sets_kind() {
        let mut node = Node::new(NodeKind::FlowControl {
            kind: FlowControlKind::If,
            receives_function_body: false,
            receives_else: false,
            args: vec![],
            then: vec![],
            els: vec![],
            local_vars: ScopeTable::new(),
        });
        node.receive_node_data("loop");
        assert!(matches!(
            &node.kind,
            NodeKind::FlowControl {
                kind: FlowControlKind::Loop,
                ..
            }
        ));
    }

    #[test]
    fn function_call_data_sets_kind_and_name() {
        let mut node = Node::new(NodeKind::FunctionCall {
            kind: FunctionCallKind::None,
            name: String::new(),
            arg_types: vec![],
            return_ty: None,
        });
        node.receive_node_data("pointerTo");
        assert!(matches!(
            &node.kind,
            NodeKind::FunctionCall {
                kind: FunctionCallKind::PointerTo,
                name,
                ..
            } if name == "pointerTo"
        ));
    }

    #[test]
    fn scalar_eq_ignores_role_ids() {
        let a = NodeKind::Assignment {
            subject: Some(NodeId(1)),
            value: Some(NodeId(2)),
        };
        let b = NodeKind::Assignment {
            subject: Some(NodeId(7)),
            value: None,
        };
        assert!(a.scalar_eq(&b));
    }

    #[test]
    fn scalar_eq_checks_names() {
        let a = NodeKind::VarName { name: "x".into() };
        let b = NodeKind::VarName { name: "y".into() };
        assert!(!a.scalar_eq(&b));
    }

    #[test]
    fn scope_owner_predicate() {
        assert!(NodeKind::Root {
            local_vars: ScopeTable::new()
        }
        .is_scope_owner());
        assert!(!NodeKind::NullLiteral.is_scope_owner());
    }

    #[test]
    fn expression_symbols_roundtrip() {
        for kind in [
            ExpressionKind::Sum,
            ExpressionKind::EqualComparison,
            ExpressionKind::LogicalAnd,
            ExpressionKind::Cast,
        ] {
            assert_eq!(ExpressionKind::from_symbol(kind.symbol()), Some(kind));
        }
    }

    #[test]
    fn instruction_keywords() {
        assert_eq!(
            InstructionKind::from_keyword("getConfig"),
            Some(InstructionKind::GetConfig)
        );
        assert!(InstructionKind::Rgba.is_color());
        assert!(!InstructionKind::Needs.is_color());
    }

    #[test]
    fn serde_roundtrip() {
        let node = Node::new(NodeKind::StringLiteral {
            value: "hello".into(),
            is_cstring: false,
        });
        let json = serde_json::to_string(&node).unwrap();
        let back: Node = serde_json::from_str(&json).unwrap();
        assert!(node.kind.scalar_eq(&back.kind));
    }
}
