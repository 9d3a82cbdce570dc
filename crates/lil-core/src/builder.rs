//! Event-driven AST assembly.
//!
//! The parser (an external collaborator) drives the builder through
//! four callbacks: [`AstBuilder::receive_node_start`],
//! [`AstBuilder::receive_node_end`], [`AstBuilder::receive_node_commit`],
//! and [`AstBuilder::receive_node_data`], plus source locations and
//! errors. The builder keeps a stack of states (one per open
//! construct), a current-node slot, and a stack of in-progress
//! containers; commits route the current node into the innermost
//! container according to the topmost state.
//!
//! Parser errors and malformed event sequences become [`Diagnostic`]s,
//! never panics; assembly continues past the offending node.

use crate::document::Document;
use crate::error::Diagnostic;
use crate::id::NodeId;
use crate::loc::SourceLocation;
use crate::node::{
    CombinatorKind, ExpressionKind, FlowControlKind, FunctionCallKind, FunctionDeclKind,
    InstructionKind, NodeKind, ScopeTable, SelectorKind, UnaryExpressionKind,
};
use crate::ty::{FnArg, StaticSize, Ty, TyKind};

/// The node variants the parser can open with `nodeStart`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeVariant {
    Bool,
    NumberLiteral,
    PercentageLiteral,
    StringLiteral,
    CStringLiteral,
    StringFunction,
    Null,
    VarName,
    PropertyName,
    ValuePath,
    VarDecl,
    AliasDecl,
    TypeDecl,
    ConversionDecl,
    EnumDecl,
    ClassDecl,
    ObjectDefinition,
    ValueList,
    Assignment,
    Expression,
    UnaryExpression,
    Rule,
    SelectorChain,
    SimpleSelector,
    Selector,
    Combinator,
    Filter,
    Flag,
    FlowControl,
    FlowControlCall,
    FunctionDecl,
    FunctionCall,
    Instruction,
    IfInstruction,
    SnippetInstruction,
    ForeignLang,
    IndexAccessor,
    Documentation,
    Type,
    MultipleType,
    FunctionType,
    PointerType,
    ObjectType,
    StaticArrayType,
    SimdType,
}

impl NodeVariant {
    /// Container variants are pushed onto the container stack at
    /// start and popped into the current slot at end.
    pub fn is_container(self) -> bool {
        !matches!(
            self,
            NodeVariant::Bool
                | NodeVariant::NumberLiteral
                | NodeVariant::PercentageLiteral
                | NodeVariant::StringLiteral
                | NodeVariant::CStringLiteral
                | NodeVariant::Null
                | NodeVariant::VarName
                | NodeVariant::PropertyName
                | NodeVariant::Selector
                | NodeVariant::Combinator
                | NodeVariant::Filter
                | NodeVariant::Flag
                | NodeVariant::ForeignLang
                | NodeVariant::Documentation
        )
    }
}

/// Data events accompanying `nodeData`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserEvent {
    Punctuation,
    Whitespace,
    Comment,
    NumberInt,
    NumberFp,
    NumberLiteral,
    ExpressionSign,
    FunctionBody,
    ReturnType,
    FunctionVariadic,
    Extern,
    VariableDeclaration,
    Inherits,
    FlowControlElse,
    StringFunctionStart,
    StringFunctionMid,
    StringFunctionEnd,
    StringFunctionArgEnd,
    ColorG1,
    ColorG2,
    ColorRGB,
    ColorRGBA,
    ColorRGBAA,
    ColorRRGGBB,
    ColorRRGGBBA,
    ColorRRGGBBAA,
    Identifier,
}

/// One builder state per open construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BuilderState {
    Root,
    Number,
    Percentage,
    String,
    StringFunction,
    Expression,
    UnaryExpression,
    Type,
    MultipleType,
    FunctionType,
    PointerType,
    ObjectType,
    StaticArrayType,
    SimdType,
    VarDecl,
    VarName,
    AliasDecl,
    TypeDecl,
    ConversionDecl,
    EnumDecl,
    Rule,
    SelectorChain,
    SimpleSelector,
    Selector,
    Combinator,
    ValuePath,
    PropertyName,
    Assignment,
    ClassDecl,
    ObjectDefinition,
    ValueList,
    FunctionDecl,
    FunctionCall,
    FlowControl,
    FlowControlCall,
    Null,
    Bool,
    Filter,
    Flag,
    Instruction,
    IfInstruction,
    SnippetInstruction,
    ForeignLang,
    IndexAccessor,
    Documentation,
}

/// Streaming AST assembler.
pub struct AstBuilder {
    doc: Document,
    state: Vec<BuilderState>,
    current: Option<NodeId>,
    containers: Vec<NodeId>,
    errors: Vec<Diagnostic>,
}

impl AstBuilder {
    pub fn new() -> AstBuilder {
        AstBuilder {
            doc: Document::new(),
            state: vec![BuilderState::Root],
            current: None,
            containers: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    /// Finishes assembly: finalizes `main` and hands over the
    /// document plus any collected errors.
    pub fn finish(mut self) -> (Document, Vec<Diagnostic>) {
        self.doc.finalize();
        (self.doc, self.errors)
    }

    fn push_error(&mut self, message: impl Into<String>) {
        let loc = self
            .current
            .or_else(|| self.containers.last().copied())
            .map(|id| self.doc.tree.node(id).loc.clone())
            .unwrap_or_default();
        self.errors.push(Diagnostic::new(message, &loc));
    }

    fn make_ty_node(&mut self, kind: TyKind) -> NodeId {
        let ty = Ty {
            kind,
            name: String::new(),
            strong_type_name: None,
            is_nullable: false,
            tmpl_params: Vec::new(),
        };
        self.doc.tree.new_node(NodeKind::Type(ty))
    }

    // -----------------------------------------------------------------
    // nodeStart
    // -----------------------------------------------------------------

    pub fn receive_node_start(&mut self, variant: NodeVariant) {
        use NodeVariant as V;
        let tree = &mut self.doc.tree;
        match variant {
            V::NumberLiteral => {
                self.current = Some(tree.new_node(NodeKind::NumberLiteral {
                    value: String::new(),
                }));
                self.state.push(BuilderState::Number);
            }
            V::PercentageLiteral => {
                self.current = Some(tree.new_node(NodeKind::PercentageLiteral {
                    value: String::new(),
                }));
                self.state.push(BuilderState::Percentage);
            }
            V::StringLiteral | V::CStringLiteral => {
                self.current = Some(tree.new_node(NodeKind::StringLiteral {
                    value: String::new(),
                    is_cstring: variant == V::CStringLiteral,
                }));
                self.state.push(BuilderState::String);
            }
            V::StringFunction => {
                let id = tree.new_node(NodeKind::StringFunction {
                    start: String::new(),
                    mids: Vec::new(),
                    end: String::new(),
                });
                self.containers.push(id);
                self.state.push(BuilderState::StringFunction);
            }
            V::Expression => {
                self.state.push(BuilderState::Expression);
                let id = tree.new_node(NodeKind::Expression {
                    op: ExpressionKind::Sum,
                    lhs: None,
                    rhs: None,
                });
                if let Some(current) = self.current.take() {
                    tree.add_child(id, current);
                    if let NodeKind::Expression { lhs, .. } = tree.kind_mut(id) {
                        *lhs = Some(current);
                    }
                }
                self.containers.push(id);
            }
            V::UnaryExpression => {
                self.state.push(BuilderState::UnaryExpression);
                let id = tree.new_node(NodeKind::UnaryExpression {
                    op: UnaryExpressionKind::Sign,
                    value: None,
                });
                self.containers.push(id);
            }
            V::Type => {
                self.state.push(BuilderState::Type);
                let id = self.make_ty_node(TyKind::Single);
                self.containers.push(id);
            }
            V::MultipleType => {
                self.state.push(BuilderState::MultipleType);
                let id = self.make_ty_node(TyKind::Multiple {
                    types: Vec::new(),
                    is_weak: false,
                });
                self.containers.push(id);
            }
            V::FunctionType => {
                self.state.push(BuilderState::FunctionType);
                let id = self.make_ty_node(TyKind::Function {
                    args: Vec::new(),
                    return_ty: None,
                    is_variadic: false,
                    receives_return_type: false,
                    callers: Vec::new(),
                });
                if let NodeKind::Type(ty) = self.doc.tree.kind_mut(id) {
                    ty.name = "fn".into();
                }
                self.containers.push(id);
            }
            V::PointerType => {
                self.state.push(BuilderState::PointerType);
                let id = self.make_ty_node(TyKind::Pointer { arg: None });
                if let NodeKind::Type(ty) = self.doc.tree.kind_mut(id) {
                    ty.name = "ptr".into();
                }
                self.containers.push(id);
            }
            V::ObjectType => {
                self.state.push(BuilderState::ObjectType);
                let id = self.make_ty_node(TyKind::Object { fields: Vec::new() });
                self.containers.push(id);
            }
            V::StaticArrayType => {
                self.state.push(BuilderState::StaticArrayType);
                let id = self.make_ty_node(TyKind::StaticArray {
                    elem: Box::new(Ty::make("any")),
                    size: StaticSize::Literal(String::new()),
                });
                self.containers.push(id);
            }
            V::SimdType => {
                self.state.push(BuilderState::SimdType);
                let id = self.make_ty_node(TyKind::Simd {
                    elem: Box::new(Ty::make("any")),
                    width: 0,
                });
                self.containers.push(id);
            }
            V::VarDecl => {
                self.state.push(BuilderState::VarDecl);
                let id = tree.new_node(NodeKind::VarDecl {
                    name: String::new(),
                    is_extern: false,
                    is_ivar: false,
                    is_vvar: false,
                    is_const: false,
                    init_vals: Vec::new(),
                });
                self.containers.push(id);
            }
            V::AliasDecl => {
                self.state.push(BuilderState::AliasDecl);
                let id = tree.new_node(NodeKind::AliasDecl {
                    src_ty: None,
                    dst_ty: None,
                });
                self.containers.push(id);
            }
            V::TypeDecl => {
                self.state.push(BuilderState::TypeDecl);
                let id = tree.new_node(NodeKind::TypeDecl {
                    src_ty: None,
                    dst_ty: None,
                });
                self.containers.push(id);
            }
            V::ConversionDecl => {
                self.state.push(BuilderState::ConversionDecl);
                let id = tree.new_node(NodeKind::ConversionDecl {
                    src_ty: None,
                    dst_ty: None,
                    var_decl: None,
                    body: Vec::new(),
                    local_vars: ScopeTable::new(),
                });
                self.containers.push(id);
            }
            V::EnumDecl => {
                self.state.push(BuilderState::EnumDecl);
                let id = tree.new_node(NodeKind::EnumDecl {
                    name: String::new(),
                });
                self.containers.push(id);
            }
            V::VarName => {
                self.state.push(BuilderState::VarName);
                self.current = Some(tree.new_node(NodeKind::VarName {
                    name: String::new(),
                }));
            }
            V::Rule => {
                self.state.push(BuilderState::Rule);
                let id = tree.new_node(NodeKind::Rule {
                    selector_chains: Vec::new(),
                    values: Vec::new(),
                    child_rules: Vec::new(),
                });
                self.containers.push(id);
            }
            V::SelectorChain => {
                self.state.push(BuilderState::SelectorChain);
                let id = tree.new_node(NodeKind::SelectorChain);
                self.containers.push(id);
            }
            V::SimpleSelector => {
                self.state.push(BuilderState::SimpleSelector);
                let id = tree.new_node(NodeKind::SimpleSelector);
                self.containers.push(id);
            }
            V::Selector => {
                self.state.push(BuilderState::Selector);
                self.current = Some(tree.new_node(NodeKind::Selector {
                    kind: SelectorKind::Name,
                    name: String::new(),
                }));
            }
            V::Combinator => {
                self.state.push(BuilderState::Combinator);
                self.current = Some(tree.new_node(NodeKind::Combinator {
                    kind: CombinatorKind::Children,
                }));
            }
            V::ValuePath => {
                self.state.push(BuilderState::ValuePath);
                let id = tree.new_node(NodeKind::ValuePath {
                    prevent_emit_call_to_ivar: false,
                });
                if let Some(current) = self.current.take() {
                    tree.add_child(id, current);
                }
                self.containers.push(id);
            }
            V::PropertyName => {
                self.state.push(BuilderState::PropertyName);
                self.current = Some(tree.new_node(NodeKind::PropertyName {
                    name: String::new(),
                }));
            }
            V::Assignment => {
                self.state.push(BuilderState::Assignment);
                let id = tree.new_node(NodeKind::Assignment {
                    subject: None,
                    value: None,
                });
                self.containers.push(id);
            }
            V::ClassDecl => {
                self.state.push(BuilderState::ClassDecl);
                let id = tree.new_node(NodeKind::ClassDecl {
                    receives_inherits: false,
                    inherit_ty: None,
                    is_extern: false,
                    is_template: false,
                    fields: Vec::new(),
                    methods: Vec::new(),
                    aliases: Vec::new(),
                    docs: Vec::new(),
                    local_vars: ScopeTable::new(),
                });
                self.containers.push(id);
            }
            V::ObjectDefinition => {
                self.state.push(BuilderState::ObjectDefinition);
                let id = tree.new_node(NodeKind::ObjectDefinition);
                self.containers.push(id);
            }
            V::ValueList => {
                self.state.push(BuilderState::ValueList);
                let id = tree.new_node(NodeKind::ValueList);
                self.containers.push(id);
            }
            V::FunctionDecl => {
                self.state.push(BuilderState::FunctionDecl);
                let id = tree.new_node(NodeKind::FunctionDecl {
                    kind: FunctionDeclKind::Fn,
                    name: None,
                    is_constructor: false,
                    needs_name_mangling: false,
                    has_return: false,
                    receives_function_body: false,
                    args: Vec::new(),
                    body: Vec::new(),
                    finally: None,
                    local_vars: ScopeTable::new(),
                });
                tree.set_ty(id, Some(Ty::make_fn()));
                self.containers.push(id);
            }
            V::FunctionCall => {
                self.state.push(BuilderState::FunctionCall);
                let id = tree.new_node(NodeKind::FunctionCall {
                    kind: FunctionCallKind::None,
                    name: String::new(),
                    arg_types: Vec::new(),
                    return_ty: None,
                });
                self.containers.push(id);
            }
            V::FlowControl => {
                self.state.push(BuilderState::FlowControl);
                let id = tree.new_node(NodeKind::FlowControl {
                    kind: FlowControlKind::If,
                    receives_function_body: false,
                    receives_else: false,
                    args: Vec::new(),
                    then: Vec::new(),
                    els: Vec::new(),
                    local_vars: ScopeTable::new(),
                });
                self.containers.push(id);
            }
            V::FlowControlCall => {
                self.state.push(BuilderState::FlowControlCall);
                let id = tree.new_node(NodeKind::FlowControlCall {
                    kind: crate::node::FlowControlCallKind::Return,
                    argument: None,
                });
                self.containers.push(id);
            }
            V::Null => {
                self.state.push(BuilderState::Null);
                self.current = Some(tree.new_node(NodeKind::NullLiteral));
            }
            V::Bool => {
                self.state.push(BuilderState::Bool);
                self.current = Some(tree.new_node(NodeKind::BoolLiteral { value: false }));
            }
            V::Filter => {
                self.state.push(BuilderState::Filter);
                self.current = Some(tree.new_node(NodeKind::Filter {
                    name: String::new(),
                }));
            }
            V::Flag => {
                self.state.push(BuilderState::Flag);
                self.current = Some(tree.new_node(NodeKind::Flag {
                    name: String::new(),
                }));
            }
            V::Instruction => {
                self.state.push(BuilderState::Instruction);
                let id = tree.new_node(NodeKind::Instruction {
                    kind: InstructionKind::Needs,
                    name: String::new(),
                    is_color: false,
                    argument: None,
                });
                self.containers.push(id);
            }
            V::IfInstruction => {
                self.state.push(BuilderState::IfInstruction);
                let id = tree.new_node(NodeKind::IfInstruction {
                    receives_else: false,
                    condition: None,
                    then: Vec::new(),
                    els: Vec::new(),
                });
                self.containers.push(id);
            }
            V::SnippetInstruction => {
                self.state.push(BuilderState::SnippetInstruction);
                let id = tree.new_node(NodeKind::SnippetInstruction {
                    name: String::new(),
                });
                self.containers.push(id);
            }
            V::ForeignLang => {
                self.state.push(BuilderState::ForeignLang);
                self.current = Some(tree.new_node(NodeKind::ForeignLang {
                    language: String::new(),
                    content: String::new(),
                }));
            }
            V::IndexAccessor => {
                self.state.push(BuilderState::IndexAccessor);
                let id = tree.new_node(NodeKind::IndexAccessor);
                self.containers.push(id);
            }
            V::Documentation => {
                self.state.push(BuilderState::Documentation);
                self.current = Some(tree.new_node(NodeKind::Documentation {
                    content: String::new(),
                }));
            }
        }
    }

    // -----------------------------------------------------------------
    // nodeEnd
    // -----------------------------------------------------------------

    pub fn receive_node_end(&mut self, variant: NodeVariant) {
        if variant.is_container() {
            match self.containers.pop() {
                Some(id) => self.current = Some(id),
                None => self.push_error("unbalanced node end"),
            }
        }
        if self.state.len() > 1 {
            self.state.pop();
        } else {
            self.push_error("unbalanced node end at document root");
        }
    }

    // -----------------------------------------------------------------
    // nodeCommit
    // -----------------------------------------------------------------

    pub fn receive_node_commit(&mut self) {
        let state = self.state.last().copied().unwrap_or(BuilderState::Root);
        match state {
            BuilderState::Root => self.commit_root(),
            BuilderState::StringFunction => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                }
            }
            BuilderState::Expression => self.commit_expression(),
            BuilderState::UnaryExpression => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                    if let NodeKind::UnaryExpression { value, .. } =
                        self.doc.tree.kind_mut(container)
                    {
                        *value = Some(current);
                    }
                }
            }
            BuilderState::MultipleType => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::Type(container_ty) = self.doc.tree.kind_mut(container) {
                            if let TyKind::Multiple { types, .. } = &mut container_ty.kind {
                                types.push(ty);
                            }
                        }
                    }
                }
            }
            BuilderState::FunctionType => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::Type(container_ty) = self.doc.tree.kind_mut(container) {
                            if let TyKind::Function {
                                args,
                                return_ty,
                                receives_return_type,
                                ..
                            } = &mut container_ty.kind
                            {
                                if *receives_return_type {
                                    *return_ty = Some(Box::new(ty));
                                } else {
                                    args.push(FnArg::Ty(Box::new(ty)));
                                }
                            }
                        }
                    }
                }
            }
            BuilderState::PointerType => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::Type(container_ty) = self.doc.tree.kind_mut(container) {
                            if let TyKind::Pointer { arg } = &mut container_ty.kind {
                                *arg = Some(Box::new(ty));
                            }
                        }
                    }
                }
            }
            BuilderState::ObjectType => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::Type(container_ty) = self.doc.tree.kind_mut(container) {
                            if let TyKind::Object { fields } = &mut container_ty.kind {
                                fields.push(ty);
                            }
                        }
                    }
                }
            }
            BuilderState::StaticArrayType => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::Type(container_ty) = self.doc.tree.kind_mut(container) {
                            if let TyKind::StaticArray { elem, .. } = &mut container_ty.kind {
                                *elem = Box::new(ty);
                            }
                        }
                    }
                }
            }
            BuilderState::SimdType => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::Type(container_ty) = self.doc.tree.kind_mut(container) {
                            if let TyKind::Simd { elem, .. } = &mut container_ty.kind {
                                *elem = Box::new(ty);
                            }
                        }
                    }
                }
            }
            BuilderState::VarDecl => self.commit_var_decl(),
            BuilderState::AliasDecl | BuilderState::TypeDecl => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        match self.doc.tree.kind_mut(container) {
                            NodeKind::AliasDecl { src_ty, dst_ty }
                            | NodeKind::TypeDecl { src_ty, dst_ty } => {
                                if src_ty.is_none() {
                                    *src_ty = Some(ty);
                                } else {
                                    *dst_ty = Some(ty);
                                }
                            }
                            _ => {}
                        }
                    }
                }
            }
            BuilderState::ConversionDecl => self.commit_conversion_decl(),
            BuilderState::EnumDecl | BuilderState::ValueList | BuilderState::IndexAccessor => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                }
            }
            BuilderState::SimpleSelector | BuilderState::SelectorChain => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                }
            }
            BuilderState::ValuePath => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    if let NodeKind::FunctionCall { kind, .. } = self.doc.tree.kind_mut(current) {
                        *kind = FunctionCallKind::ValuePath;
                    }
                    self.doc.tree.add_child(container, current);
                }
            }
            BuilderState::Rule => self.commit_rule(),
            BuilderState::Assignment => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                    if let NodeKind::Assignment { subject, value } =
                        self.doc.tree.kind_mut(container)
                    {
                        if subject.is_none() {
                            *subject = Some(current);
                        } else {
                            *value = Some(current);
                        }
                    }
                }
            }
            BuilderState::ClassDecl => self.commit_class_decl(),
            BuilderState::ObjectDefinition => {
                if let Some(ty) = self.take_current_ty() {
                    if let Some(&container) = self.containers.last() {
                        self.doc.tree.set_ty(container, Some(ty));
                    }
                    return;
                }
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                }
            }
            BuilderState::FunctionDecl => self.commit_function_decl(),
            BuilderState::FunctionCall => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                }
            }
            BuilderState::FlowControl => self.commit_flow_control(),
            BuilderState::FlowControlCall => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                    if let NodeKind::FlowControlCall { argument, .. } =
                        self.doc.tree.kind_mut(container)
                    {
                        *argument = Some(current);
                    }
                }
            }
            BuilderState::Instruction => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                    if let NodeKind::Instruction { argument, .. } =
                        self.doc.tree.kind_mut(container)
                    {
                        if argument.is_none() {
                            *argument = Some(current);
                        }
                    }
                }
            }
            BuilderState::IfInstruction => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                    if let NodeKind::IfInstruction {
                        condition,
                        then,
                        els,
                        receives_else,
                    } = self.doc.tree.kind_mut(container)
                    {
                        if condition.is_none() {
                            *condition = Some(current);
                        } else if *receives_else {
                            els.push(current);
                        } else {
                            then.push(current);
                        }
                    }
                }
            }
            BuilderState::SnippetInstruction => {
                if let (Some(current), Some(&container)) =
                    (self.current.take(), self.containers.last())
                {
                    self.doc.tree.add_child(container, current);
                }
            }
            _ => {
                self.push_error("unexpected node commit");
            }
        }
        self.current = None;
    }

    /// When the current slot holds an intermediate type node, takes
    /// its type and discards the node.
    fn take_current_ty(&mut self) -> Option<Ty> {
        let id = self.current?;
        if let NodeKind::Type(ty) = self.doc.tree.kind(id) {
            let ty = ty.clone();
            self.current = None;
            Some(ty)
        } else {
            None
        }
    }

    fn commit_root(&mut self) {
        let Some(current) = self.current.take() else {
            // End of document: the parser commits once with nothing
            // pending to finalize the unit.
            self.doc.finalize();
            return;
        };
        match self.doc.tree.kind(current).clone() {
            NodeKind::VarDecl {
                name,
                is_extern,
                init_vals,
                ..
            } => {
                self.doc.set_local_variable(&name, current);
                let init_is_fn = init_vals.first().map(|iv| {
                    matches!(self.doc.tree.kind(*iv), NodeKind::FunctionDecl { .. })
                });
                if is_extern || init_is_fn == Some(true) {
                    self.doc.add_node(current);
                } else {
                    self.doc.add_to_main(current);
                }
            }
            NodeKind::ClassDecl { .. } => {
                self.doc.add_node(current);
                self.doc.add_class(current);
            }
            NodeKind::AliasDecl { .. } => {
                self.doc.add_node(current);
                self.doc.add_alias(current);
            }
            NodeKind::TypeDecl { .. } => {
                self.doc.add_node(current);
                self.doc.add_typedef(current);
            }
            NodeKind::ConversionDecl { src_ty, dst_ty, .. } => {
                self.doc.add_node(current);
                if let (Some(src), Some(dst)) = (src_ty, dst_ty) {
                    self.doc.add_conversion(format!("{src}_to_{dst}"), current);
                }
            }
            NodeKind::Instruction { .. }
            | NodeKind::IfInstruction { .. }
            | NodeKind::SnippetInstruction { .. }
            | NodeKind::Documentation { .. } => {
                self.doc.add_node(current);
            }
            _ => {
                self.doc.add_to_main(current);
            }
        }
    }

    fn commit_expression(&mut self) {
        if let (Some(current), Some(&container)) = (self.current.take(), self.containers.last()) {
            self.doc.tree.add_child(container, current);
            if let NodeKind::Expression { lhs, rhs, .. } = self.doc.tree.kind_mut(container) {
                if lhs.is_none() {
                    *lhs = Some(current);
                } else {
                    *rhs = Some(current);
                }
            }
        }
    }

    fn commit_var_decl(&mut self) {
        if let Some(ty) = self.take_current_ty() {
            if let Some(&container) = self.containers.last() {
                self.doc.tree.set_ty(container, Some(ty));
            }
            return;
        }
        if let (Some(current), Some(&container)) = (self.current.take(), self.containers.last()) {
            self.doc.tree.add_child(container, current);
            let vd_name = match self.doc.tree.kind(container) {
                NodeKind::VarDecl { name, .. } => name.clone(),
                _ => String::new(),
            };
            if let NodeKind::VarDecl { init_vals, .. } = self.doc.tree.kind_mut(container) {
                init_vals.push(current);
            }
            if let NodeKind::FunctionDecl {
                name,
                is_constructor,
                ..
            } = self.doc.tree.kind_mut(current)
            {
                *name = Some(vd_name.clone());
                if vd_name == "construct" {
                    *is_constructor = true;
                }
            }
        }
    }

    fn commit_conversion_decl(&mut self) {
        if let Some(ty) = self.take_current_ty() {
            // The target type of the conversion.
            if let Some(&container) = self.containers.last() {
                if let NodeKind::ConversionDecl { dst_ty, .. } = self.doc.tree.kind_mut(container)
                {
                    *dst_ty = Some(ty);
                }
            }
            return;
        }
        if let (Some(current), Some(&container)) = (self.current.take(), self.containers.last()) {
            self.doc.tree.add_child(container, current);
            let is_var_decl = matches!(self.doc.tree.kind(current), NodeKind::VarDecl { .. });
            let arg_ty = self.doc.tree.ty(current).cloned();
            let register = match self.doc.tree.kind(current) {
                NodeKind::VarDecl { name, .. } => Some(name.clone()),
                _ => None,
            };
            if let NodeKind::ConversionDecl {
                var_decl,
                src_ty,
                body,
                ..
            } = self.doc.tree.kind_mut(container)
            {
                if is_var_decl && var_decl.is_none() {
                    *var_decl = Some(current);
                    *src_ty = arg_ty;
                } else {
                    body.push(current);
                }
            }
            if let Some(name) = register {
                self.doc.tree.set_local_variable(container, &name, current);
            }
        }
    }

    fn commit_rule(&mut self) {
        if let (Some(current), Some(&container)) = (self.current.take(), self.containers.last()) {
            self.doc.tree.add_child(container, current);
            let role = match self.doc.tree.kind(current) {
                NodeKind::SelectorChain => 0,
                NodeKind::Assignment { .. } => 1,
                NodeKind::Rule { .. } => 2,
                _ => 3,
            };
            if let NodeKind::Rule {
                selector_chains,
                values,
                child_rules,
            } = self.doc.tree.kind_mut(container)
            {
                match role {
                    0 => selector_chains.push(current),
                    1 => values.push(current),
                    2 => child_rules.push(current),
                    _ => {}
                }
            }
        }
    }

    fn commit_class_decl(&mut self) {
        if let Some(ty) = self.take_current_ty() {
            if let Some(&container) = self.containers.last() {
                let receives_inherits = matches!(
                    self.doc.tree.kind(container),
                    NodeKind::ClassDecl {
                        receives_inherits: true,
                        ..
                    }
                );
                if receives_inherits {
                    if let NodeKind::ClassDecl { inherit_ty, .. } =
                        self.doc.tree.kind_mut(container)
                    {
                        *inherit_ty = Some(ty);
                    }
                } else {
                    self.doc.tree.set_ty(container, Some(ty));
                }
            }
            return;
        }
        let (Some(current), Some(&container)) = (self.current.take(), self.containers.last())
        else {
            return;
        };
        self.doc.tree.add_child(container, current);
        match self.doc.tree.kind(current).clone() {
            NodeKind::VarDecl {
                name, init_vals, ..
            } => {
                // A function-typed member is a method, anything else a field.
                let is_method = self
                    .doc
                    .tree
                    .ty(current)
                    .map(|ty| ty.is_function())
                    .unwrap_or_else(|| {
                        init_vals.first().is_some_and(|iv| {
                            matches!(self.doc.tree.kind(*iv), NodeKind::FunctionDecl { .. })
                        })
                    });
                if let NodeKind::ClassDecl {
                    fields, methods, ..
                } = self.doc.tree.kind_mut(container)
                {
                    if is_method {
                        methods.push(current);
                    } else {
                        fields.push(current);
                    }
                }
                self.doc.tree.set_local_variable(container, &name, current);
            }
            NodeKind::AliasDecl { .. } => {
                if let NodeKind::ClassDecl { aliases, .. } = self.doc.tree.kind_mut(container) {
                    aliases.push(current);
                }
            }
            NodeKind::Documentation { .. } => {
                if let NodeKind::ClassDecl { docs, .. } = self.doc.tree.kind_mut(container) {
                    docs.push(current);
                }
            }
            _ => {}
        }
    }

    fn commit_function_decl(&mut self) {
        if let Some(ty) = self.take_current_ty() {
            // An explicit return type annotation.
            if let Some(&container) = self.containers.last() {
                if let Some(fn_ty) = self.doc.tree.node_mut(container).ty.as_mut() {
                    fn_ty.set_return_ty(ty);
                }
            }
            return;
        }
        let (Some(current), Some(&container)) = (self.current.take(), self.containers.last())
        else {
            return;
        };
        let receives_body = matches!(
            self.doc.tree.kind(container),
            NodeKind::FunctionDecl {
                receives_function_body: true,
                ..
            }
        );
        self.doc.tree.add_child(container, current);
        if !receives_body {
            // Argument position.
            let register = match self.doc.tree.kind(current) {
                NodeKind::VarDecl { name, .. } => Some(name.clone()),
                _ => None,
            };
            if let NodeKind::FunctionDecl { args, .. } = self.doc.tree.kind_mut(container) {
                args.push(current);
            }
            if let Some(fn_ty) = self.doc.tree.node_mut(container).ty.as_mut() {
                fn_ty.add_fn_arg(FnArg::Decl(current));
            }
            if let Some(name) = register {
                self.doc.tree.set_local_variable(container, &name, current);
            }
        } else {
            let is_finally = matches!(
                self.doc.tree.kind(current),
                NodeKind::FlowControl {
                    kind: FlowControlKind::Finally,
                    ..
                }
            );
            let is_return = matches!(
                self.doc.tree.kind(current),
                NodeKind::FlowControlCall {
                    kind: crate::node::FlowControlCallKind::Return,
                    ..
                }
            );
            let register = match self.doc.tree.kind(current) {
                NodeKind::VarDecl { name, .. } => Some(name.clone()),
                _ => None,
            };
            if let NodeKind::FunctionDecl {
                body,
                finally,
                has_return,
                ..
            } = self.doc.tree.kind_mut(container)
            {
                if is_finally {
                    *finally = Some(current);
                } else {
                    body.push(current);
                    if is_return {
                        *has_return = true;
                    }
                }
            }
            if let Some(name) = register {
                self.doc.tree.set_local_variable(container, &name, current);
            }
        }
    }

    fn commit_flow_control(&mut self) {
        let (Some(current), Some(&container)) = (self.current.take(), self.containers.last())
        else {
            return;
        };
        self.doc.tree.add_child(container, current);
        let register = match self.doc.tree.kind(current) {
            NodeKind::VarDecl { name, .. } => Some(name.clone()),
            _ => None,
        };
        if let NodeKind::FlowControl {
            receives_function_body,
            receives_else,
            args,
            then,
            els,
            ..
        } = self.doc.tree.kind_mut(container)
        {
            if *receives_function_body {
                if *receives_else {
                    els.push(current);
                } else {
                    then.push(current);
                }
            } else {
                args.push(current);
            }
        }
        if let Some(name) = register {
            self.doc.tree.set_local_variable(container, &name, current);
        }
    }

    // -----------------------------------------------------------------
    // nodeData
    // -----------------------------------------------------------------

    pub fn receive_node_data(&mut self, event: ParserEvent, data: &str) {
        use ParserEvent as E;
        if matches!(event, E::Punctuation | E::Whitespace | E::Comment) {
            return;
        }
        let state = self.state.last().copied().unwrap_or(BuilderState::Root);
        match state {
            BuilderState::Number => match event {
                E::NumberInt => {
                    if let Some(id) = self.current {
                        self.doc.tree.set_ty(id, Some(Ty::weak_number()));
                    }
                }
                E::NumberFp => {
                    if let Some(id) = self.current {
                        self.doc.tree.set_ty(id, Some(Ty::make("f64")));
                    }
                }
                _ => self.data_to_current(data),
            },
            BuilderState::StringFunction => {
                let Some(&container) = self.containers.last() else {
                    return;
                };
                if let NodeKind::StringFunction { start, mids, end } =
                    self.doc.tree.kind_mut(container)
                {
                    match event {
                        E::StringFunctionStart => *start = data.to_string(),
                        E::StringFunctionMid => mids.push(data.to_string()),
                        E::StringFunctionEnd => *end = data.to_string(),
                        E::StringFunctionArgEnd => {}
                        _ => {}
                    }
                }
            }
            BuilderState::Expression => match event {
                E::ExpressionSign => {
                    if let Some(&container) = self.containers.last() {
                        if let Some(kind) = ExpressionKind::from_symbol(data) {
                            if let NodeKind::Expression { op, .. } =
                                self.doc.tree.kind_mut(container)
                            {
                                *op = kind;
                            }
                        }
                    }
                }
                E::NumberLiteral => {
                    // Digits arriving after the operand was committed
                    // are appended to the rightmost number literal.
                    if let Some(&container) = self.containers.last() {
                        let (lhs, rhs) = match self.doc.tree.kind(container) {
                            NodeKind::Expression { lhs, rhs, .. } => (*lhs, *rhs),
                            _ => (None, None),
                        };
                        for side in [rhs, lhs].into_iter().flatten() {
                            if matches!(
                                self.doc.tree.kind(side),
                                NodeKind::NumberLiteral { .. }
                            ) {
                                self.doc.tree.node_mut(side).receive_node_data(data);
                                break;
                            }
                        }
                    }
                }
                _ => self.data_to_current(data),
            },
            BuilderState::FunctionDecl => {
                if event == E::FunctionBody {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::FunctionDecl {
                            receives_function_body,
                            ..
                        } = self.doc.tree.kind_mut(container)
                        {
                            *receives_function_body = true;
                        }
                    }
                } else {
                    self.data_to_container(data);
                }
            }
            BuilderState::FlowControl => {
                let Some(&container) = self.containers.last() else {
                    return;
                };
                match event {
                    E::FunctionBody => {
                        if let NodeKind::FlowControl {
                            receives_function_body,
                            ..
                        } = self.doc.tree.kind_mut(container)
                        {
                            *receives_function_body = true;
                        }
                    }
                    E::FlowControlElse => {
                        if let NodeKind::FlowControl { receives_else, .. } =
                            self.doc.tree.kind_mut(container)
                        {
                            *receives_else = true;
                        }
                    }
                    _ => {
                        let receives_else = matches!(
                            self.doc.tree.kind(container),
                            NodeKind::FlowControl {
                                receives_else: true,
                                ..
                            }
                        );
                        if !receives_else {
                            self.doc.tree.node_mut(container).receive_node_data(data);
                        }
                    }
                }
            }
            BuilderState::IfInstruction => {
                if event == E::FlowControlElse {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::IfInstruction { receives_else, .. } =
                            self.doc.tree.kind_mut(container)
                        {
                            *receives_else = true;
                        }
                    }
                }
            }
            BuilderState::ClassDecl => {
                if event == E::Inherits {
                    if let Some(&container) = self.containers.last() {
                        if let NodeKind::ClassDecl {
                            receives_inherits, ..
                        } = self.doc.tree.kind_mut(container)
                        {
                            *receives_inherits = true;
                        }
                    }
                }
            }
            BuilderState::FunctionType => {
                let Some(&container) = self.containers.last() else {
                    return;
                };
                if let NodeKind::Type(ty) = self.doc.tree.kind_mut(container) {
                    match event {
                        E::ReturnType => {
                            if let TyKind::Function {
                                receives_return_type,
                                ..
                            } = &mut ty.kind
                            {
                                *receives_return_type = true;
                            }
                        }
                        E::FunctionVariadic => {
                            if let TyKind::Function { is_variadic, .. } = &mut ty.kind {
                                *is_variadic = true;
                            }
                        }
                        _ => ty.name.push_str(data),
                    }
                }
            }
            BuilderState::Type
            | BuilderState::MultipleType
            | BuilderState::PointerType
            | BuilderState::ObjectType => {
                if let Some(&container) = self.containers.last() {
                    if let NodeKind::Type(ty) = self.doc.tree.kind_mut(container) {
                        if data == "?" {
                            ty.is_nullable = true;
                        } else {
                            ty.name.push_str(data);
                        }
                    }
                }
            }
            BuilderState::StaticArrayType => {
                if let Some(&container) = self.containers.last() {
                    if let NodeKind::Type(ty) = self.doc.tree.kind_mut(container) {
                        if let TyKind::StaticArray { size, .. } = &mut ty.kind {
                            let is_numeric = data.chars().all(|c| c.is_ascii_digit());
                            *size = if is_numeric {
                                StaticSize::Literal(data.to_string())
                            } else {
                                StaticSize::Name(data.to_string())
                            };
                        }
                    }
                }
            }
            BuilderState::SimdType => {
                if let Some(&container) = self.containers.last() {
                    if let NodeKind::Type(ty) = self.doc.tree.kind_mut(container) {
                        if let Ok(width) = data.parse::<u32>() {
                            if let TyKind::Simd { width: w, .. } = &mut ty.kind {
                                *w = width;
                            }
                        } else {
                            ty.name.push_str(data);
                        }
                    }
                }
            }
            BuilderState::Instruction => {
                let Some(&container) = self.containers.last() else {
                    return;
                };
                let color_kind = match event {
                    E::ColorG1 => Some(InstructionKind::Grayscale1),
                    E::ColorG2 => Some(InstructionKind::Grayscale2),
                    E::ColorRGB => Some(InstructionKind::Rgb),
                    E::ColorRGBA => Some(InstructionKind::Rgba),
                    E::ColorRGBAA => Some(InstructionKind::Rgbaa),
                    E::ColorRRGGBB => Some(InstructionKind::Rrggbb),
                    E::ColorRRGGBBA => Some(InstructionKind::Rrggbba),
                    E::ColorRRGGBBAA => Some(InstructionKind::Rrggbbaa),
                    _ => None,
                };
                if let Some(k) = color_kind {
                    if let NodeKind::Instruction {
                        kind,
                        name,
                        is_color,
                        ..
                    } = self.doc.tree.kind_mut(container)
                    {
                        *kind = k;
                        *name = data.to_string();
                        *is_color = true;
                    }
                } else {
                    self.doc.tree.node_mut(container).receive_node_data(data);
                }
            }
            BuilderState::VarDecl => {
                let Some(&container) = self.containers.last() else {
                    return;
                };
                match event {
                    E::Extern => {
                        if let NodeKind::VarDecl { is_extern, .. } =
                            self.doc.tree.kind_mut(container)
                        {
                            *is_extern = true;
                        }
                    }
                    E::VariableDeclaration => {
                        if let NodeKind::VarDecl {
                            is_ivar,
                            is_vvar,
                            is_const,
                            ..
                        } = self.doc.tree.kind_mut(container)
                        {
                            match data {
                                "ivar" => *is_ivar = true,
                                "vvar" => *is_vvar = true,
                                "const" => *is_const = true,
                                _ => {}
                            }
                        }
                    }
                    _ => self.doc.tree.node_mut(container).receive_node_data(data),
                }
            }
            _ => {
                if self.current.is_some() {
                    self.data_to_current(data);
                } else {
                    self.data_to_container(data);
                }
            }
        }
    }

    fn data_to_current(&mut self, data: &str) {
        if let Some(id) = self.current {
            self.doc.tree.node_mut(id).receive_node_data(data);
        }
    }

    fn data_to_container(&mut self, data: &str) {
        if let Some(&id) = self.containers.last() {
            self.doc.tree.node_mut(id).receive_node_data(data);
        }
    }

    // -----------------------------------------------------------------
    // Locations and errors
    // -----------------------------------------------------------------

    pub fn receive_source_location(
        &mut self,
        file: &str,
        line: usize,
        column: usize,
        range: std::ops::Range<usize>,
    ) {
        let loc = SourceLocation::new(file, line, column, range);
        if let Some(id) = self.current.or_else(|| self.containers.last().copied()) {
            self.doc.tree.node_mut(id).loc = loc;
        }
    }

    pub fn receive_error(&mut self, message: &str, file: &str, line: usize, column: usize) {
        self.errors.push(Diagnostic {
            message: message.to_string(),
            file: file.to_string(),
            line,
            column,
        });
    }

    /// Direct access to the document under construction.
    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.doc
    }
}

impl Default for AstBuilder {
    fn default() -> Self {
        AstBuilder::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FlowControlCallKind;

    /// Drives `var x: i32 = 42;` through the builder.
    fn build_minimal_program() -> (Document, Vec<Diagnostic>) {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "x");
        b.receive_node_start(NodeVariant::Type);
        b.receive_node_data(ParserEvent::Identifier, "i32");
        b.receive_node_end(NodeVariant::Type);
        b.receive_node_commit();
        b.receive_node_start(NodeVariant::NumberLiteral);
        b.receive_node_data(ParserEvent::NumberInt, "");
        b.receive_node_data(ParserEvent::Identifier, "42");
        b.receive_node_end(NodeVariant::NumberLiteral);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        b.finish()
    }

    #[test]
    fn minimal_program_routes_to_main() {
        let (doc, errors) = build_minimal_program();
        assert!(errors.is_empty());
        let body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        // The var decl plus the injected return 0.
        assert_eq!(body.len(), 2);
        let vd = body[0];
        assert!(matches!(
            doc.tree.kind(vd),
            NodeKind::VarDecl { name, .. } if name == "x"
        ));
        assert!(doc.tree.ty(vd).unwrap().equal_to(&Ty::make("i32")));
        let ret = body[1];
        assert!(matches!(
            doc.tree.kind(ret),
            NodeKind::FlowControlCall {
                kind: FlowControlCallKind::Return,
                ..
            }
        ));
    }

    #[test]
    fn integer_literal_gets_weak_type() {
        let (doc, _) = build_minimal_program();
        let body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        let vd = body[0];
        let init = doc.tree.children(vd)[0];
        let ty = doc.tree.ty(init).unwrap();
        assert!(ty.is_weak());
        assert_eq!(ty.members().len(), 2);
    }

    #[test]
    fn fp_literal_gets_f64() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::NumberLiteral);
        b.receive_node_data(ParserEvent::NumberFp, "");
        b.receive_node_data(ParserEvent::Identifier, "0.5");
        b.receive_node_end(NodeVariant::NumberLiteral);
        b.receive_node_commit();
        let (doc, _) = b.finish();
        let body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        assert!(doc.tree.ty(body[0]).unwrap().equal_to(&Ty::make("f64")));
    }

    #[test]
    fn function_decl_routes_to_root() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "greet");
        b.receive_node_start(NodeVariant::FunctionDecl);
        b.receive_node_data(ParserEvent::Identifier, "fn");
        b.receive_node_data(ParserEvent::FunctionBody, "");
        b.receive_node_end(NodeVariant::FunctionDecl);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        let (doc, errors) = b.finish();
        assert!(errors.is_empty());
        // The decl is a root child, not a main statement.
        let root_vds: Vec<NodeId> = doc
            .nodes()
            .iter()
            .copied()
            .filter(|id| matches!(doc.tree.kind(*id), NodeKind::VarDecl { name, .. } if name == "greet"))
            .collect();
        assert_eq!(root_vds.len(), 1);
        // And the inner function got its name from the decl.
        let fd = doc.tree.children(root_vds[0])[0];
        assert!(matches!(
            doc.tree.kind(fd),
            NodeKind::FunctionDecl { name: Some(n), .. } if n == "greet"
        ));
    }

    #[test]
    fn construct_vardecl_marks_constructor() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "construct");
        b.receive_node_start(NodeVariant::FunctionDecl);
        b.receive_node_data(ParserEvent::FunctionBody, "");
        b.receive_node_end(NodeVariant::FunctionDecl);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        let (doc, _) = b.finish();
        let vd = *doc.nodes().iter().next().unwrap();
        let fd = doc.tree.children(vd)[0];
        assert!(matches!(
            doc.tree.kind(fd),
            NodeKind::FunctionDecl {
                is_constructor: true,
                ..
            }
        ));
    }

    #[test]
    fn expression_collects_left_then_right() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::Expression);
        b.receive_node_data(ParserEvent::ExpressionSign, "+");
        b.receive_node_start(NodeVariant::NumberLiteral);
        b.receive_node_data(ParserEvent::NumberInt, "");
        b.receive_node_data(ParserEvent::Identifier, "1");
        b.receive_node_end(NodeVariant::NumberLiteral);
        b.receive_node_commit();
        b.receive_node_start(NodeVariant::NumberLiteral);
        b.receive_node_data(ParserEvent::NumberFp, "");
        b.receive_node_data(ParserEvent::Identifier, "0.5");
        b.receive_node_end(NodeVariant::NumberLiteral);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::Expression);
        b.receive_node_commit();
        let (doc, errors) = b.finish();
        assert!(errors.is_empty());
        let body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        let exp = body[0];
        match doc.tree.kind(exp) {
            NodeKind::Expression {
                op: ExpressionKind::Sum,
                lhs: Some(l),
                rhs: Some(r),
            } => {
                assert!(doc.tree.ty(*l).unwrap().is_weak());
                assert!(doc.tree.ty(*r).unwrap().equal_to(&Ty::make("f64")));
            }
            other => panic!("unexpected expression shape: {other:?}"),
        }
    }

    #[test]
    fn equals_sign_is_comparison_in_expression_state() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::Expression);
        b.receive_node_data(ParserEvent::ExpressionSign, "=");
        b.receive_node_end(NodeVariant::Expression);
        b.receive_node_commit();
        let (doc, _) = b.finish();
        let body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        assert!(matches!(
            doc.tree.kind(body[0]),
            NodeKind::Expression {
                op: ExpressionKind::EqualComparison,
                ..
            }
        ));
    }

    #[test]
    fn class_decl_registers_in_class_table() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::ClassDecl);
        b.receive_node_start(NodeVariant::ObjectType);
        b.receive_node_data(ParserEvent::Identifier, "point");
        b.receive_node_end(NodeVariant::ObjectType);
        b.receive_node_commit();
        // field: var x: i32
        b.receive_node_start(NodeVariant::VarDecl);
        b.receive_node_data(ParserEvent::Identifier, "x");
        b.receive_node_start(NodeVariant::Type);
        b.receive_node_data(ParserEvent::Identifier, "i32");
        b.receive_node_end(NodeVariant::Type);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::VarDecl);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::ClassDecl);
        b.receive_node_commit();
        let (doc, errors) = b.finish();
        assert!(errors.is_empty());
        let cd = doc.find_class("point").expect("class registered");
        match doc.tree.kind(cd) {
            NodeKind::ClassDecl {
                fields, methods, ..
            } => {
                assert_eq!(fields.len(), 1);
                assert!(methods.is_empty());
            }
            _ => panic!(),
        }
    }

    #[test]
    fn value_path_call_gets_value_path_kind() {
        let mut b = AstBuilder::new();
        b.receive_node_start(NodeVariant::ValuePath);
        b.receive_node_start(NodeVariant::VarName);
        b.receive_node_data(ParserEvent::Identifier, "obj");
        b.receive_node_end(NodeVariant::VarName);
        b.receive_node_commit();
        b.receive_node_start(NodeVariant::FunctionCall);
        b.receive_node_data(ParserEvent::Identifier, "doIt");
        b.receive_node_end(NodeVariant::FunctionCall);
        b.receive_node_commit();
        b.receive_node_end(NodeVariant::ValuePath);
        b.receive_node_commit();
        let (doc, _) = b.finish();
        let body: Vec<NodeId> = match doc.tree.kind(doc.main_fn()) {
            NodeKind::FunctionDecl { body, .. } => body.clone(),
            _ => panic!(),
        };
        let vp = body[0];
        let segments = doc.tree.children(vp);
        assert_eq!(segments.len(), 2);
        assert!(matches!(
            doc.tree.kind(segments[1]),
            NodeKind::FunctionCall {
                kind: FunctionCallKind::ValuePath,
                ..
            }
        ));
    }

    #[test]
    fn unbalanced_end_is_an_error_not_a_panic() {
        let mut b = AstBuilder::new();
        b.receive_node_end(NodeVariant::VarDecl);
        assert!(b.has_errors());
    }

    #[test]
    fn parser_errors_are_collected() {
        let mut b = AstBuilder::new();
        b.receive_error("unexpected token", "main.lil", 3, 7);
        assert!(b.has_errors());
        assert_eq!(b.errors()[0].line, 3);
    }
}
