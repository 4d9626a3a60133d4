//! Reader round trips and token position checks.

use ednjit::reader::{lex, read_str, valid_float, valid_int, valid_keyword, valid_symbol, TokenKind};
use ednjit::syntax::NodeKind;

#[test]
fn print_then_reparse_preserves_structure() {
    let sources = [
        "(defn :int32 add ((a :int32) (b :int32)) (+ a b))",
        "(struct Point ((x :int32) (y :int32)))",
        "(cond ((> 1 2) 10) ((< 1 2) 20) (else 30))",
        "[1 2.5 :key sym \"str\" \\c nil true]",
        "{:a 1 :b [2 3]}",
        "#{1 2 3}",
        "#tag {:payload 1}",
        "#_ (ignored form) (+ 1 2)",
    ];
    for source in sources {
        let nodes = read_str(source).unwrap();
        let printed = nodes
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(" ");
        let reparsed = read_str(&printed).unwrap();
        assert_eq!(nodes.len(), reparsed.len(), "arity drift for '{}'", source);
        for (a, b) in nodes.iter().zip(&reparsed) {
            assert_eq!(a.kind, b.kind, "'{}' printed as '{}'", source, printed);
        }
    }
}

#[test]
fn token_positions_rescan_to_the_same_byte() {
    let source = "(defn :int32 add ((a :int32) (b :int32))\n  (+ a b))\n(add 4 6) ; trailing\n";
    let lines: Vec<&str> = source.split('\n').collect();
    let tokens = lex(source).unwrap();
    assert!(!tokens.is_empty());
    for token in tokens {
        let line = lines[token.loc.line - 1];
        let rest = &line[token.loc.col - 1..];
        match token.kind {
            TokenKind::Str => assert!(rest.starts_with('"')),
            _ => assert!(
                rest.starts_with(&token.text),
                "token '{}' at {} does not rescan",
                token.text,
                token.loc
            ),
        }
    }
}

#[test]
fn every_atom_classifies_exactly_once() {
    // each sample claims exactly the kind the reader assigns it, and no
    // other numeric/name predicate accepts it
    let samples = [
        ("42", "int"),
        ("-7N", "int"),
        ("3.5", "float"),
        ("-1.25E2", "float"),
        (":key", "keyword"),
        ("foo-bar", "symbol"),
        ("/", "symbol"),
        ("<=", "symbol"),
    ];
    for (text, expect) in samples {
        let hits: Vec<&str> = [
            ("int", valid_int(text)),
            ("float", valid_float(text)),
            ("keyword", valid_keyword(text)),
            ("symbol", valid_symbol(text)),
        ]
        .into_iter()
        .filter_map(|(name, hit)| hit.then_some(name))
        .collect();
        assert_eq!(hits, vec![expect], "'{}' classified as {:?}", text, hits);
    }
}

#[test]
fn multi_form_sources_read_in_order() {
    let nodes = read_str("(= x :int32 1) (= y :int32 2) (+ x y)").unwrap();
    assert_eq!(nodes.len(), 3);
    assert!(nodes.iter().all(|n| matches!(n.kind, NodeKind::List(_))));
    assert_eq!(nodes[0].loc.col, 1);
    assert_eq!(nodes[1].loc.col, 16);
}

#[test]
fn empty_input_is_an_error() {
    assert!(read_str("").is_err());
    assert!(read_str("; only a comment\n").is_err());
}

#[test]
fn mismatched_delimiters_are_errors() {
    assert!(read_str("(]").is_err());
    assert!(read_str("(1 2").is_err());
    assert!(read_str("]").is_err());
}
