//! Canonical textual rendering of syntax trees.
//!
//! `Display` is the single-line canonical form used in diagnostics.
//! [`pprint`] adds a multiline mode that puts collection children on their
//! own indented lines.

use super::{Node, NodeKind};
use std::fmt;

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Nil => write!(f, "nil"),
            NodeKind::Bool(b) => write!(f, "{}", b),
            NodeKind::Symbol(s) => write!(f, "{}", s),
            NodeKind::Keyword(k) => write!(f, ":{}", k),
            NodeKind::Int { text, .. } | NodeKind::Float { text, .. } => write!(f, "{}", text),
            NodeKind::Str(s) => write!(f, "\"{}\"", escape_quotes(s)),
            NodeKind::Char(c) => write!(f, "\\{}", c),
            NodeKind::List(items) => write_seq(f, "(", items, ")"),
            NodeKind::Vector(items) => write_seq(f, "[", items, "]"),
            NodeKind::Map(items) => write_seq(f, "{", items, "}"),
            NodeKind::Set(items) => write_seq(f, "#{", items, "}"),
            NodeKind::Tagged { tag, payload } => write!(f, "#{} {}", tag, payload),
            NodeKind::Discard(payload) => write!(f, "#_ {}", payload),
        }
    }
}

fn write_seq(f: &mut fmt::Formatter<'_>, open: &str, items: &[Node], close: &str) -> fmt::Result {
    write!(f, "{}", open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, " ")?;
        }
        write!(f, "{}", item)?;
    }
    write!(f, "{}", close)
}

fn escape_quotes(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 4);
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Render a node, one collection child per line when `multiline` is set.
pub fn pprint(node: &Node, multiline: bool) -> String {
    if multiline {
        render(node, 0)
    } else {
        node.to_string()
    }
}

fn render(node: &Node, indent: usize) -> String {
    let (open, items, close) = match &node.kind {
        NodeKind::List(items) => ("(", items, ")"),
        NodeKind::Vector(items) => ("[", items, "]"),
        NodeKind::Map(items) => ("{", items, "}"),
        NodeKind::Set(items) => ("#{", items, "}"),
        _ => return node.to_string(),
    };
    if items.len() < 2 {
        return node.to_string();
    }
    let prefix = " ".repeat(indent + 1);
    let mut out = String::from(open);
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push('\n');
            out.push_str(&prefix);
        }
        out.push_str(&render(item, indent + 1));
    }
    out.push_str(close);
    out
}
