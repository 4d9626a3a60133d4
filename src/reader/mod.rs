//! Reader for the EDN surface syntax: tokenizer plus parser.

mod lexer;
mod parser;
mod token;

pub use lexer::lex;
pub use parser::{valid_float, valid_int, valid_keyword, valid_symbol, Parser};
pub use token::{SourceLoc, Token, TokenKind};

use crate::error::Diagnostic;
use crate::syntax::Node;

/// Read every top-level form in `source`.
pub fn read_str(source: &str) -> Result<Vec<Node>, Diagnostic> {
    let tokens = lex(source)?;
    if tokens.is_empty() {
        return Err(Diagnostic::at(
            SourceLoc::start(),
            "no parsable tokens found in input",
        ));
    }
    let mut parser = Parser::new(tokens);
    let mut nodes = Vec::new();
    while !parser.at_end() {
        nodes.push(parser.parse_node()?);
    }
    Ok(nodes)
}

/// Read exactly one form (the first, if the source holds several).
pub fn read_one(source: &str) -> Result<Node, Diagnostic> {
    read_str(source)?.into_iter().next().ok_or_else(|| {
        Diagnostic::at(SourceLoc::start(), "no parsable tokens found in input")
    })
}
