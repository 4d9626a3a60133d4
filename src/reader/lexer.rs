//! Tokenizer for the EDN surface syntax.
//!
//! A single pass over the input with string, escape and comment state.
//! Whitespace, commas and newlines separate tokens and are not emitted;
//! `;` starts a comment running to end of line. Two atom forms terminate
//! early: the discard marker `#_` and two-character `\X` character
//! literals, so `#_foo` lexes as `#_` followed by `foo`.

use super::token::{SourceLoc, Token, TokenKind};
use crate::error::Diagnostic;

const ESCAPE: char = '\\';

fn is_paren(c: char) -> bool {
    matches!(c, '(' | ')' | '[' | ']' | '{' | '}')
}

fn is_separator(c: char) -> bool {
    is_paren(c) || matches!(c, ' ' | '\t' | '\n' | '\r' | ',')
}

struct Lexer {
    tokens: Vec<Token>,
    atom: String,
    atom_start: SourceLoc,
}

impl Lexer {
    fn push(&mut self, c: char, loc: SourceLoc) {
        if self.atom.is_empty() {
            self.atom_start = loc;
        }
        self.atom.push(c);
    }

    fn flush(&mut self) {
        if !self.atom.is_empty() {
            let text = std::mem::take(&mut self.atom);
            self.tokens
                .push(Token::new(TokenKind::Atom, text, self.atom_start));
        }
    }
}

/// Tokenize `input`, failing on an unterminated string.
pub fn lex(input: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut lexer = Lexer {
        tokens: Vec::new(),
        atom: String::new(),
        atom_start: SourceLoc::start(),
    };
    let mut string = String::new();
    let mut string_start = SourceLoc::start();
    let mut in_string = false;
    let mut in_comment = false;
    let mut escaping = false;
    let mut line = 1usize;
    let mut col = 0usize;

    for c in input.chars() {
        col += 1;
        let loc = SourceLoc::new(line, col);
        if c == '\n' {
            line += 1;
            col = 0;
        }

        if in_comment {
            if c == '\n' {
                in_comment = false;
            }
            continue;
        }

        if in_string {
            if escaping {
                escaping = false;
                // \t \n \f \r keep the backslash; anything else is taken
                // literally with the backslash dropped
                if matches!(c, 't' | 'n' | 'f' | 'r') {
                    string.push(ESCAPE);
                }
                string.push(c);
            } else if c == ESCAPE {
                escaping = true;
            } else if c == '"' {
                in_string = false;
                lexer.tokens.push(Token::new(
                    TokenKind::Str,
                    std::mem::take(&mut string),
                    string_start,
                ));
            } else {
                string.push(c);
            }
            continue;
        }

        if c == ';' && !escaping {
            lexer.flush();
            in_comment = true;
        } else if c == '"' && !escaping {
            lexer.flush();
            in_string = true;
            string_start = loc;
        } else if is_separator(c) {
            lexer.flush();
            escaping = false;
            if is_paren(c) {
                lexer.tokens.push(Token::new(TokenKind::Paren, c, loc));
            }
        } else {
            if escaping {
                escaping = false;
            } else if c == ESCAPE {
                escaping = true;
            }
            // discard markers and character literals end at two characters
            if lexer.atom == "#_"
                || (lexer.atom.chars().count() == 2 && lexer.atom.starts_with(ESCAPE))
            {
                lexer.flush();
            }
            lexer.push(c, loc);
        }
    }

    if in_string {
        return Err(Diagnostic::at(string_start, "unterminated string"));
    }
    lexer.flush();
    Ok(lexer.tokens)
}
