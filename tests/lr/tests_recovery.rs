//! Error recovery: every input produces a tree covering all of it.

use rstest::rstest;
use strand::ParseError;
use strand::lr::{ParserConfig, RecoveryTuning};

use crate::helpers::grammar::PARSER;
use crate::helpers::tree_assertions::{assert_well_formed, count_nodes, has_error};

#[rstest]
#[case("a b;")]
#[case("a")]
#[case(";")]
#[case("}")]
#[case("{ a;")]
#[case("a; } b;")]
#[case("let ;")]
#[case("let let let")]
#[case("{{{{")]
#[case("a; ?? b;")]
#[case("ünïcödé;")]
fn test_invalid_input_recovers(#[case] input: &str) {
    let tree = PARSER.parse(input).unwrap();
    assert!(has_error(&tree), "expected an error node in {input:?}: {tree}");
    assert_well_formed(&tree, input);
    assert_eq!(tree.node_type().name(), "Program");
}

#[test]
fn test_recovery_keeps_following_statements() {
    let tree = PARSER.parse("a b; c; d;").unwrap();
    assert!(has_error(&tree));
    assert!(count_nodes(&tree, "Stmt") >= 3, "{tree}");
}

#[test]
fn test_missing_semicolon_between_identifiers() {
    // The first statement is closed with an empty error node before `go`.
    let input = "lets go;";
    let tree = PARSER.parse(input).unwrap();
    assert_eq!(tree.to_string(), "Program(Stmt(Ident,Space,⚠),Stmt(Ident,Semi))");
    assert_well_formed(&tree, input);
}

#[test]
fn test_missing_semicolon_in_block() {
    let tree = PARSER.parse("{ a } b;").unwrap();
    assert!(has_error(&tree));
    assert_eq!(count_nodes(&tree, "Block"), 1, "{tree}");
    assert_well_formed(&tree, "{ a } b;");
}

#[test]
fn test_unclosed_block_is_closed_at_end() {
    let tree = PARSER.parse("{ a; b;").unwrap();
    assert_eq!(count_nodes(&tree, "Block"), 1, "{tree}");
    assert_eq!(count_nodes(&tree, "Stmt"), 2, "{tree}");
}

#[test]
fn test_error_tokens_cover_whole_characters() {
    let input = "é;";
    let tree = PARSER.parse(input).unwrap();
    tree.iterate(
        |cursor| {
            assert!(input.is_char_boundary(cursor.from()), "{}", cursor.name());
            assert!(input.is_char_boundary(cursor.to()), "{}", cursor.name());
            true
        },
        |_| {},
    );
}

#[test]
fn test_disabled_dialect_keyword_is_an_error() {
    let tree = PARSER.parse("var x;").unwrap();
    assert!(has_error(&tree), "{tree}");
    assert_eq!(count_nodes(&tree, "LetStmt"), 0);
}

#[test]
fn test_strict_parser_fails_on_syntax_error() {
    let strict = PARSER
        .configure(ParserConfig {
            strict: Some(true),
            ..ParserConfig::default()
        })
        .unwrap();
    let err = strict.parse("a b;").unwrap_err();
    assert!(err.is_syntax(), "{err}");
    assert!(matches!(err, ParseError::Syntax { .. }));
}

#[test]
fn test_recovery_tuning_is_configurable() {
    let tuned = PARSER
        .configure(ParserConfig {
            tuning: Some(RecoveryTuning {
                delete_penalty: 1,
                ..RecoveryTuning::default()
            }),
            ..ParserConfig::default()
        })
        .unwrap();
    assert_eq!(tuned.tuning().delete_penalty, 1);
    let tree = tuned.parse("a b;").unwrap();
    assert_well_formed(&tree, "a b;");
}

#[test]
fn test_long_garbage_terminates() {
    let input = "} ".repeat(200);
    let tree = PARSER.parse(&input).unwrap();
    assert_well_formed(&tree, &input);
}
