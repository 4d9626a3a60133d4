//! Recursive-descent parser: token stream to syntax tree.
//!
//! Collections are collected up to their matching closer. An atom beginning
//! with `#` introduces a tagged form: `#_` discards the following node,
//! `#` directly before a map builds a set, and any other tag name must be a
//! valid symbol. Plain atoms classify by running the predicates below in
//! order; an atom matching none of them is a parse error.

use super::token::{SourceLoc, Token, TokenKind};
use crate::error::Diagnostic;
use crate::syntax::{Node, NodeKind};

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    last_loc: SourceLoc,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Parser {
            tokens,
            pos: 0,
            last_loc: SourceLoc::start(),
        }
    }

    pub fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if let Some(t) = &token {
            self.last_loc = t.loc;
            self.pos += 1;
        }
        token
    }

    /// Parse one node from the stream.
    pub fn parse_node(&mut self) -> Result<Node, Diagnostic> {
        let Some(token) = self.next() else {
            return Err(Diagnostic::at(self.last_loc, "unexpected end of input"));
        };
        match token.kind {
            TokenKind::Str => Ok(Node::new(NodeKind::Str(token.text), token.loc)),
            TokenKind::Paren => self.parse_collection(token),
            TokenKind::Atom => {
                if token.text.starts_with('#') {
                    self.parse_tagged(token)
                } else {
                    classify_atom(&token)
                }
            }
        }
    }

    fn parse_collection(&mut self, open: Token) -> Result<Node, Diagnostic> {
        let closer = match open.text.as_str() {
            "(" => ")",
            "[" => "]",
            "{" => "}",
            other => {
                return Err(Diagnostic::at(
                    open.loc,
                    format!("unexpected '{}'", other),
                ))
            }
        };
        let mut children = Vec::new();
        loop {
            match self.peek() {
                None => {
                    return Err(Diagnostic::at(open.loc, "unterminated collection"));
                }
                Some(t) if t.kind == TokenKind::Paren && t.text == closer => {
                    self.next();
                    break;
                }
                Some(_) => children.push(self.parse_node()?),
            }
        }
        let kind = match open.text.as_str() {
            "(" => NodeKind::List(children),
            "[" => NodeKind::Vector(children),
            _ => NodeKind::Map(children),
        };
        Ok(Node::new(kind, open.loc))
    }

    fn parse_tagged(&mut self, token: Token) -> Result<Node, Diagnostic> {
        let tag = token.text[1..].to_string();
        let payload = self.parse_node()?;
        if tag == "_" {
            return Ok(Node::new(NodeKind::Discard(Box::new(payload)), token.loc));
        }
        if tag.is_empty() {
            // `#` directly before a map builds a set
            return match payload.kind {
                NodeKind::Map(children) => Ok(Node::new(NodeKind::Set(children), token.loc)),
                _ => Err(Diagnostic::at(
                    token.loc,
                    "expected { } after # to build a set",
                )),
            };
        }
        if !valid_symbol(&tag) {
            return Err(Diagnostic::at(
                token.loc,
                format!("invalid tag name '{}'", tag),
            ));
        }
        let tag_node = Node::new(NodeKind::Symbol(tag), token.loc);
        Ok(Node::new(
            NodeKind::Tagged {
                tag: Box::new(tag_node),
                payload: Box::new(payload),
            },
            token.loc,
        ))
    }
}

fn classify_atom(token: &Token) -> Result<Node, Diagnostic> {
    let text = &token.text;
    let kind = if text == "nil" {
        NodeKind::Nil
    } else if let Some(c) = char_literal(text) {
        NodeKind::Char(c)
    } else if text == "true" || text == "false" {
        NodeKind::Bool(text == "true")
    } else if valid_int(text) {
        NodeKind::Int {
            text: text.clone(),
            ty: None,
        }
    } else if valid_float(text) {
        NodeKind::Float {
            text: text.clone(),
            ty: None,
        }
    } else if valid_keyword(text) {
        NodeKind::Keyword(text[1..].to_string())
    } else if valid_symbol(text) {
        NodeKind::Symbol(text.clone())
    } else {
        return Err(Diagnostic::at(
            token.loc,
            format!("could not parse atom '{}'", text),
        ));
    };
    Ok(Node::new(kind, token.loc))
}

/// `\X`: a backslash followed by exactly one character.
fn char_literal(text: &str) -> Option<char> {
    let mut chars = text.chars();
    match (chars.next(), chars.next(), chars.next()) {
        (Some('\\'), Some(c), None) => Some(c),
        _ => None,
    }
}

const SYMBOL_PUNCT: &str = ".*+!-_?$%&=:#/><;";

/// Symbols draw from letters, digits and `SYMBOL_PUNCT`; they may not start
/// with a digit, `:` or `#`, may start with `/` only as the lone `/`, may
/// not start with a sign or `.` immediately followed by a digit, and carry
/// at most one `/`.
pub fn valid_symbol(text: &str) -> bool {
    let mut chars = text.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    if !text
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || SYMBOL_PUNCT.contains(c))
    {
        return false;
    }
    if first.is_ascii_digit() {
        return false;
    }
    if (first == ':' || first == '#' || first == '/') && text != "/" {
        return false;
    }
    if matches!(first, '-' | '+' | '.') && chars.next().is_some_and(|c| c.is_ascii_digit()) {
        return false;
    }
    text.matches('/').count() <= 1
}

/// `:` followed by a valid symbol.
pub fn valid_keyword(text: &str) -> bool {
    matches!(text.strip_prefix(':'), Some(rest) if valid_symbol(rest))
}

/// Optionally signed digit run with at most one trailing `N` or `M`.
pub fn valid_int(text: &str) -> bool {
    let mut digits = text;
    if digits.len() > 1 {
        if let Some(rest) = digits.strip_prefix(['-', '+']) {
            digits = rest;
        }
    }
    if let Some(rest) = digits.strip_suffix(['N', 'M']) {
        digits = rest;
    }
    !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit())
}

fn digit_run(text: &str) -> bool {
    !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit())
}

/// Optionally signed integer part, a mandatory decimal point and digit run,
/// then either an `E` exponent (optionally signed) or an optional `M`
/// suffix. Case-insensitive.
pub fn valid_float(text: &str) -> bool {
    let upper = text.to_ascii_uppercase();
    let Some((front, back)) = upper.split_once('.') else {
        return false;
    };
    let front_ok = front.is_empty()
        || digit_run(front)
        || (front.starts_with(['-', '+']) && digit_run(&front[1..]));
    if !front_ok {
        return false;
    }
    if let Some((frac, exp)) = back.split_once('E') {
        let exp = exp.strip_prefix(['-', '+']).unwrap_or(exp);
        digit_run(frac) && digit_run(exp)
    } else {
        digit_run(back.strip_suffix('M').unwrap_or(back))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::lex;

    fn parse(input: &str) -> Node {
        let tokens = lex(input).unwrap();
        Parser::new(tokens).parse_node().unwrap()
    }

    #[test]
    fn classifies_leaves() {
        assert_eq!(parse("nil").kind, NodeKind::Nil);
        assert_eq!(parse("true").kind, NodeKind::Bool(true));
        assert_eq!(parse("false").kind, NodeKind::Bool(false));
        assert_eq!(parse(r"\a").kind, NodeKind::Char('a'));
        assert!(matches!(parse("42").kind, NodeKind::Int { .. }));
        assert!(matches!(parse("-7N").kind, NodeKind::Int { .. }));
        assert!(matches!(parse("3.25").kind, NodeKind::Float { .. }));
        assert!(matches!(parse(":x").kind, NodeKind::Keyword(k) if k == "x"));
        assert!(matches!(parse("foo").kind, NodeKind::Symbol(s) if s == "foo"));
    }

    #[test]
    fn collections_by_opener() {
        assert!(matches!(parse("(1 2)").kind, NodeKind::List(c) if c.len() == 2));
        assert!(matches!(parse("[1 2 3]").kind, NodeKind::Vector(c) if c.len() == 3));
        assert!(matches!(parse("{:a 1}").kind, NodeKind::Map(c) if c.len() == 2));
        assert!(matches!(parse("#{1 2}").kind, NodeKind::Set(c) if c.len() == 2));
    }

    #[test]
    fn tagged_and_discard() {
        let node = parse("#inst \"now\"");
        match node.kind {
            NodeKind::Tagged { tag, payload } => {
                assert!(matches!(tag.kind, NodeKind::Symbol(s) if s == "inst"));
                assert!(matches!(payload.kind, NodeKind::Str(_)));
            }
            other => panic!("expected tagged node, got {:?}", other),
        }
        assert!(matches!(parse("#_ 5").kind, NodeKind::Discard(_)));
    }

    #[test]
    fn set_requires_map_payload() {
        let tokens = lex("# (1)").unwrap();
        assert!(Parser::new(tokens).parse_node().is_err());
    }

    #[test]
    fn unexpected_closer_is_fatal() {
        let tokens = lex(")").unwrap();
        assert!(Parser::new(tokens).parse_node().is_err());
    }

    #[test]
    fn unterminated_collection_is_fatal() {
        let tokens = lex("(1 2").unwrap();
        let err = Parser::new(tokens).parse_node().unwrap_err();
        assert_eq!(err.loc, SourceLoc::new(1, 1));
    }

    #[test]
    fn unclassifiable_atom_is_fatal() {
        let tokens = lex("@@").unwrap();
        assert!(Parser::new(tokens).parse_node().is_err());
    }

    #[test]
    fn string_token_is_never_nil() {
        // the string "nil" is a string, not the nil literal
        assert!(matches!(parse("\"nil\"").kind, NodeKind::Str(s) if s == "nil"));
    }

    #[test]
    fn symbol_predicate() {
        for ok in ["foo", "set!", "a/b", "/", "<=", "-", "+", "...", "x2"] {
            assert!(valid_symbol(ok), "expected '{}' to be a symbol", ok);
        }
        for bad in ["", "1x", ":k", "#t", "/a", "a/b/c", "-1", "+2", ".5", "a b"] {
            assert!(!valid_symbol(bad), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn int_predicate() {
        for ok in ["0", "42", "-7", "+9", "12N", "3M", "-12N"] {
            assert!(valid_int(ok), "expected '{}' to be an int", ok);
        }
        for bad in ["", "-", "+", "N", "1.5", "12NN", "0x1"] {
            assert!(!valid_int(bad), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn float_predicate() {
        for ok in ["1.5", "-2.5", "+0.25", "3.25M", "1.5E3", "1.5e-3", "2.5E+7"] {
            assert!(valid_float(ok), "expected '{}' to be a float", ok);
        }
        for bad in ["", "5", ".5", "5.", "1.5E", "1..2", "a.5", "1.x"] {
            assert!(!valid_float(bad), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn numeric_predicates_are_disjoint_from_symbols() {
        for text in ["1", "-7", "+9", "1.5", "-2.5", ":k", "12N"] {
            assert!(!valid_symbol(text), "'{}' classified both ways", text);
        }
        for text in ["foo", "-", "+", "/"] {
            assert!(!valid_int(text) && !valid_float(text) && !valid_keyword(text));
        }
    }
}
