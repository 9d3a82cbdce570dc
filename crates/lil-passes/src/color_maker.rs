//! Color literal lowering.
//!
//! Rewrites `#f00`-style color instructions into object definitions of
//! type `rgb` with `red`, `green`, `blue`, `alpha` assignments as
//! `f64` values in `[0.0, 1.0]`. Each length variant has its own
//! digit-expansion rule; see [`parse_color`].

use lil_core::{
    Diagnostic, Document, InstructionKind, Node, NodeId, NodeKind, SourceLocation, Ty,
};

use crate::rewrite::splice_node;
use crate::visitor::Pass;

#[derive(Default)]
pub struct ColorMaker {
    errors: Vec<Diagnostic>,
}

impl ColorMaker {
    pub fn new() -> ColorMaker {
        ColorMaker::default()
    }
}

/// Channel values of a color instruction, each in `[0.0, 1.0]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Channels {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub alpha: f64,
}

fn byte(digits: &str) -> Option<f64> {
    u32::from_str_radix(digits, 16).ok().map(|v| v as f64 / 255.0)
}

fn repeated(digit: &str) -> Option<f64> {
    byte(&format!("{digit}{digit}"))
}

/// Expands the hex digits of a color instruction per its variant.
pub fn parse_color(kind: InstructionKind, digits: &str) -> Option<Channels> {
    let d = |i: usize, len: usize| digits.get(i..i + len);
    match kind {
        InstructionKind::Grayscale1 => {
            let v = repeated(d(0, 1)?)?;
            Some(Channels {
                red: v,
                green: v,
                blue: v,
                alpha: 1.0,
            })
        }
        InstructionKind::Grayscale2 => {
            let v = byte(d(0, 2)?)?;
            Some(Channels {
                red: v,
                green: v,
                blue: v,
                alpha: 1.0,
            })
        }
        InstructionKind::Rgb | InstructionKind::Rgba | InstructionKind::Rgbaa => {
            let red = repeated(d(0, 1)?)?;
            let green = repeated(d(1, 1)?)?;
            let blue = repeated(d(2, 1)?)?;
            let alpha = match kind {
                InstructionKind::Rgba => repeated(d(3, 1)?)?,
                InstructionKind::Rgbaa => byte(d(3, 2)?)?,
                _ => 1.0,
            };
            Some(Channels {
                red,
                green,
                blue,
                alpha,
            })
        }
        InstructionKind::Rrggbb | InstructionKind::Rrggbba | InstructionKind::Rrggbbaa => {
            let red = byte(d(0, 2)?)?;
            let green = byte(d(2, 2)?)?;
            let blue = byte(d(4, 2)?)?;
            let alpha = match kind {
                InstructionKind::Rrggbba => repeated(d(6, 1)?)?,
                InstructionKind::Rrggbbaa => byte(d(6, 2)?)?,
                _ => 1.0,
            };
            Some(Channels {
                red,
                green,
                blue,
                alpha,
            })
        }
        _ => None,
    }
}

fn format_channel(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{v:.1}")
    } else {
        format!("{v}")
    }
}

fn make_rgb_objdef(doc: &mut Document, channels: Channels, loc: &SourceLocation) -> NodeId {
    let num_ty = Ty::make("f64");
    let objdef = doc.tree.add_node(Node::new(NodeKind::ObjectDefinition));
    doc.tree.set_ty(objdef, Some(Ty::make_object("rgb")));
    doc.tree.node_mut(objdef).loc = loc.clone();
    for (field, value) in [
        ("red", channels.red),
        ("green", channels.green),
        ("blue", channels.blue),
        ("alpha", channels.alpha),
    ] {
        let pn = doc.tree.add_node(Node::new(NodeKind::PropertyName {
            name: field.into(),
        }));
        let lit = doc.tree.add_node(Node::new(NodeKind::NumberLiteral {
            value: format_channel(value),
        }));
        doc.tree.set_ty(lit, Some(num_ty.clone()));
        let assignment = doc.tree.add_node(Node::new(NodeKind::Assignment {
            subject: Some(pn),
            value: Some(lit),
        }));
        doc.tree.set_ty(assignment, Some(num_ty.clone()));
        doc.tree.add_child(assignment, pn);
        doc.tree.add_child(assignment, lit);
        doc.tree.add_child(objdef, assignment);
    }
    objdef
}

impl Pass for ColorMaker {
    fn name(&self) -> &'static str {
        "color-maker"
    }

    fn perform_visit(&mut self, doc: &mut Document) {
        let all: Vec<NodeId> = doc.tree.descendants(doc.root());
        for node in all {
            if doc.tree.parent(node).is_none() {
                continue;
            }
            let (kind, digits) = match doc.tree.kind(node) {
                NodeKind::Instruction {
                    kind,
                    name,
                    is_color: true,
                    ..
                } => (*kind, name.clone()),
                _ => continue,
            };
            let loc = doc.tree.node(node).loc.clone();
            match parse_color(kind, &digits) {
                Some(channels) => {
                    let objdef = make_rgb_objdef(doc, channels, &loc);
                    splice_node(&mut doc.tree, node, &[objdef]);
                }
                None => {
                    self.errors.push(Diagnostic::new(
                        format!("malformed color literal \"#{digits}\""),
                        &loc,
                    ));
                }
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

    #[test]
    fn grayscale_one_digit_repeats() {
        let c = parse_color(InstructionKind::Grayscale1, "f").unwrap();
        assert_eq!(c.red, 1.0);
        assert_eq!(c.green, 1.0);
        assert_eq!(c.blue, 1.0);
        assert_eq!(c.alpha, 1.0);
    }

    #[test]
    fn rgb_expands_each_digit() {
        let c = parse_color(InstructionKind::Rgb, "f00").unwrap();
        assert_eq!(c.red, 1.0);
        assert_eq!(c.green, 0.0);
        assert_eq!(c.blue, 0.0);
        assert_eq!(c.alpha, 1.0);
    }

    #[test]
    fn rgba_includes_alpha_digit() {
        let c = parse_color(InstructionKind::Rgba, "08f8").unwrap();
        assert!((c.green - 136.0 / 255.0).abs() < 1e-9);
        assert!((c.alpha - 136.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn rgbaa_takes_two_alpha_digits() {
        let c = parse_color(InstructionKind::Rgbaa, "f0080").unwrap();
        assert!((c.alpha - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn rrggbb_defaults_alpha_to_one() {
        let c = parse_color(InstructionKind::Rrggbb, "336699").unwrap();
        assert!((c.red - 51.0 / 255.0).abs() < 1e-9);
        assert!((c.green - 102.0 / 255.0).abs() < 1e-9);
        assert!((c.blue - 153.0 / 255.0).abs() < 1e-9);
        assert_eq!(c.alpha, 1.0);
    }

    #[test]
    fn rrggbba_repeats_alpha_digit() {
        let c = parse_color(InstructionKind::Rrggbba, "3366998").unwrap();
        assert!((c.alpha - 136.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn rrggbbaa_takes_alpha_bytes() {
        let c = parse_color(InstructionKind::Rrggbbaa, "33669980").unwrap();
        assert!((c.alpha - 128.0 / 255.0).abs() < 1e-9);
    }

    #[test]
    fn malformed_digits_rejected() {
        assert!(parse_color(InstructionKind::Rgb, "zz").is_none());
        assert!(parse_color(InstructionKind::Rrggbbaa, "12").is_none());
    }

    #[test]
    fn channel_formatting() {
        assert_eq!(format_channel(1.0), "1.0");
        assert_eq!(format_channel(0.0), "0.0");
        assert_eq!(format_channel(0.5), "0.5");
    }
}
