//! Structural validation of the tree.
//!
//! Checks per-variant invariants after the preprocessor instructions
//! are gone: required children present, instruction kinds legal in
//! their containers, selector chains non-empty, types well-formed.
//! The validator only reads; it never rewrites.

use lil_core::{
    Diagnostic, Document, FlowControlKind, FunctionCallKind, InstructionKind, NodeId, NodeKind,
    Ty, TyKind,
};

use crate::helpers::var_decl_first_init;
use crate::visitor::Pass;

#[derive(Default)]
pub struct AstValidator {
    errors: Vec<Diagnostic>,
}

impl AstValidator {
    pub fn new() -> AstValidator {
        AstValidator::default()
    }

    fn error(&mut self, doc: &Document, node: NodeId, message: impl Into<String>) {
        let loc = doc.tree.node(node).loc.clone();
        self.errors.push(Diagnostic::new(message, &loc));
    }

    fn validate(&mut self, doc: &Document, node: NodeId) {
        match doc.tree.kind(node) {
            NodeKind::Expression { lhs, rhs, .. } => {
                if lhs.is_none() {
                    self.error(doc, node, "expression is missing its left side");
                }
                if rhs.is_none() {
                    self.error(doc, node, "expression is missing its right side");
                }
            }
            NodeKind::UnaryExpression { value, .. } => {
                if value.is_none() {
                    self.error(doc, node, "unary expression is missing its value");
                }
            }
            NodeKind::Assignment { subject, .. } => {
                if subject.is_none() {
                    self.error(doc, node, "assignment is missing its subject");
                }
            }
            NodeKind::VarDecl { name, .. } => {
                if name.is_empty() {
                    self.error(doc, node, "variable declaration without a name");
                }
                // A constructor must wrap a function.
                if name == "construct" {
                    if let Some(init) = var_decl_first_init(doc, node) {
                        if !matches!(doc.tree.kind(init), NodeKind::FunctionDecl { .. }) {
                            self.error(doc, node, "constructor is not a function");
                        }
                    }
                }
            }
            NodeKind::ValuePath { .. } => {
                let children = doc.tree.children(node);
                if children.is_empty() {
                    self.error(doc, node, "value path has no segments");
                    return;
                }
                match doc.tree.kind(children[0]) {
                    NodeKind::VarName { .. }
                    | NodeKind::Selector { .. }
                    | NodeKind::PropertyName { .. } => {}
                    other => {
                        self.error(
                            doc,
                            node,
                            format!(
                                "value path starts with {}, expected a name or selector",
                                other.variant_name()
                            ),
                        );
                    }
                }
                for segment in &children[1..] {
                    match doc.tree.kind(*segment) {
                        NodeKind::PropertyName { .. }
                        | NodeKind::FunctionCall { .. }
                        | NodeKind::IndexAccessor => {}
                        other => {
                            self.error(
                                doc,
                                *segment,
                                format!(
                                    "illegal value path segment: {}",
                                    other.variant_name()
                                ),
                            );
                        }
                    }
                }
            }
            NodeKind::SelectorChain => {
                if doc.tree.children(node).is_empty() {
                    self.error(doc, node, "selector chain is empty");
                }
            }
            NodeKind::SimpleSelector => {
                if doc.tree.children(node).is_empty() {
                    self.error(doc, node, "simple selector is empty");
                }
            }
            NodeKind::Rule {
                selector_chains, ..
            } => {
                if selector_chains.is_empty() {
                    self.error(doc, node, "rule without a selector chain");
                }
            }
            NodeKind::FlowControl { kind, args, .. } => match kind {
                FlowControlKind::If | FlowControlKind::Switch => {
                    if args.is_empty() {
                        self.error(doc, node, "flow control requires a condition argument");
                    }
                }
                FlowControlKind::IfIs | FlowControlKind::IfCast => {
                    if args.len() != 2 {
                        self.error(doc, node, "if is/if cast requires exactly two arguments");
                    } else if !matches!(doc.tree.kind(args[1]), NodeKind::Type(_)) {
                        self.error(doc, node, "second argument must be a type");
                    }
                }
                _ => {}
            },
            NodeKind::FunctionDecl { .. } => {
                match doc.tree.ty(node) {
                    Some(ty) if ty.is_function() => {}
                    _ => self.error(doc, node, "function declaration without a function type"),
                }
            }
            NodeKind::FunctionCall { kind, name, .. } => {
                let arg_count = doc.tree.children(node).len();
                match kind {
                    FunctionCallKind::None => {
                        if name.is_empty() {
                            self.error(doc, node, "call without a function name");
                        }
                    }
                    FunctionCallKind::Set => {
                        if arg_count != 2 {
                            self.error(doc, node, "set needs 2 arguments");
                        }
                    }
                    FunctionCallKind::PointerTo
                    | FunctionCallKind::ValueOf
                    | FunctionCallKind::SizeOf => {
                        if arg_count != 1 {
                            self.error(doc, node, "call takes exactly one argument");
                        }
                    }
                    _ => {}
                }
            }
            NodeKind::Instruction { kind, .. } => {
                let at_root = doc.tree.parent(node) == Some(doc.root());
                match kind {
                    InstructionKind::Needs
                    | InstructionKind::Import
                    | InstructionKind::Export
                    | InstructionKind::Configure => {
                        if !at_root {
                            let kw = match kind {
                                InstructionKind::Needs => "needs",
                                InstructionKind::Import => "import",
                                InstructionKind::Export => "export",
                                _ => "configure",
                            };
                            self.error(
                                doc,
                                node,
                                format!("#{kw} is only allowed at the top level"),
                            );
                        }
                    }
                    _ => {}
                }
            }
            NodeKind::ClassDecl { inherit_ty, .. } => {
                match doc.tree.ty(node) {
                    Some(ty) if ty.is_object() => {}
                    _ => self.error(doc, node, "class declaration without an object type"),
                }
                if let Some(inherit) = inherit_ty {
                    if !inherit.is_object() {
                        self.error(doc, node, "class inherit is not a class");
                    }
                }
            }
            NodeKind::ConversionDecl {
                var_decl, dst_ty, ..
            } => {
                if var_decl.is_none() {
                    self.error(doc, node, "conversion without an argument declaration");
                }
                if dst_ty.is_none() {
                    self.error(doc, node, "conversion without a target type");
                }
            }
            NodeKind::Type(ty) => {
                self.validate_ty(doc, node, ty);
            }
            _ => {}
        }
        if let Some(ty) = doc.tree.ty(node) {
            self.validate_ty(doc, node, ty);
        }
    }

    fn validate_ty(&mut self, doc: &Document, node: NodeId, ty: &Ty) {
        match &ty.kind {
            TyKind::Single => {
                if ty.name.is_empty() {
                    self.error(doc, node, "type without a name");
                }
            }
            TyKind::Multiple { types, .. } => {
                if types.is_empty() {
                    self.error(doc, node, "multiple type without members");
                }
                for member in types {
                    self.validate_ty(doc, node, member);
                }
            }
            TyKind::Function { return_ty, .. } => {
                if let Some(ret) = return_ty {
                    self.validate_ty(doc, node, ret);
                }
            }
            TyKind::Pointer { arg } => {
                if let Some(p) = arg {
                    self.validate_ty(doc, node, p);
                }
            }
            TyKind::Object { .. } => {
                if ty.name.is_empty() {
                    self.error(doc, node, "object type without a name");
                }
            }
            TyKind::StaticArray { elem, size } => {
                self.validate_ty(doc, node, elem);
                let empty = match size {
                    lil_core::StaticSize::Literal(s) | lil_core::StaticSize::Name(s) => {
                        s.is_empty()
                    }
                };
                if empty {
                    self.error(doc, node, "static array without a size");
                }
            }
            TyKind::Simd { elem, width } => {
                self.validate_ty(doc, node, elem);
                if *width == 0 {
                    self.error(doc, node, "SIMD type without a lane width");
                }
            }
        }
    }
}

impl Pass for AstValidator {
    fn name(&self) -> &'static str {
        "ast-validator"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        for node in doc.tree.descendants(doc.root()) {
            self.validate(doc, node);
        }
    }

    fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lil_core::node::ExpressionKind;
    use lil_core::Node;

    #[test]
    fn accepts_fresh_document() {
        let mut doc = Document::new();
        doc.finalize();
        let mut v = AstValidator::new();
        v.perform_visit(&mut doc);
        assert!(!v.has_errors(), "{:?}", v.errors());
    }

    #[test]
    fn rejects_expression_without_operands() {
        let mut doc = Document::new();
        let exp = doc.tree.add_node(Node::new(NodeKind::Expression {
            op: ExpressionKind::Sum,
            lhs: None,
            rhs: None,
        }));
        doc.add_to_main(exp);
        doc.finalize();
        let mut v = AstValidator::new();
        v.perform_visit(&mut doc);
        assert_eq!(v.errors().len(), 2);
    }

    #[test]
    fn rejects_empty_selector_chain() {
        let mut doc = Document::new();
        let chain = doc.tree.add_node(Node::new(NodeKind::SelectorChain));
        doc.add_to_main(chain);
        doc.finalize();
        let mut v = AstValidator::new();
        v.perform_visit(&mut doc);
        assert!(v.has_errors());
    }

    #[test]
    fn rejects_needs_below_root() {
        let mut doc = Document::new();
        let instr = doc.tree.add_node(Node::new(NodeKind::Instruction {
            kind: InstructionKind::Needs,
            name: "needs".into(),
            is_color: false,
            argument: None,
        }));
        doc.add_to_main(instr);
        doc.finalize();
        let mut v = AstValidator::new();
        v.perform_visit(&mut doc);
        assert!(v.has_errors());
    }

    #[test]
    fn rejects_non_class_inherit() {
        let mut doc = Document::new();
        let cd = doc.tree.add_node(Node::new(NodeKind::ClassDecl {
            receives_inherits: false,
            inherit_ty: Some(Ty::make("i32")),
            is_extern: false,
            is_template: false,
            fields: vec![],
            methods: vec![],
            aliases: vec![],
            docs: vec![],
            local_vars: Default::default(),
        }));
        doc.tree.set_ty(cd, Some(Ty::make_object("thing")));
        doc.add_node(cd);
        doc.finalize();
        let mut v = AstValidator::new();
        v.perform_visit(&mut doc);
        assert!(v
            .errors()
            .iter()
            .any(|e| e.message.contains("inherit is not a class")));
    }
}
