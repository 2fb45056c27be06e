//! Parsing well-formed input and querying the parse tables.

use rstest::rstest;
use strand::lr::{Input, ParserConfig};
use strand::tree::NodeProp;
use tokio_util::sync::CancellationToken;

use crate::helpers::grammar::*;
use crate::helpers::tree_assertions::{assert_well_formed, has_error};

// ============================================================================
// Tree Shape
// ============================================================================

#[rstest]
#[case("", "Program")]
#[case("a;", "Program(Stmt(Ident,Semi))")]
#[case("a ;", "Program(Stmt(Ident,Space,Semi))")]
#[case("a; b;", "Program(Stmt(Ident,Semi),Space,Stmt(Ident,Semi))")]
#[case("let x;", "Program(LetStmt(let,Space,Ident,Semi))")]
#[case("{}", "Program(Block(LBrace,RBrace))")]
#[case("{a;}", "Program(Block(LBrace,Stmt(Ident,Semi),RBrace))")]
#[case(
    "{{a;}}",
    "Program(Block(LBrace,Block(LBrace,Stmt(Ident,Semi),RBrace),RBrace))"
)]
#[case("a;\n", "Program(Stmt(Ident,Semi),Space)")]
#[case("  a;", "Program(Space,Stmt(Ident,Semi))")]
fn test_parse_shape(#[case] input: &str, #[case] expected: &str) {
    let tree = PARSER.parse(input).unwrap();
    assert_eq!(tree.to_string(), expected, "input {input:?}");
    assert_well_formed(&tree, input);
}

#[rstest]
#[case("letter;")]
#[case("lets;")]
#[case("{ let a; b; { c; } }")]
#[case("x1; y_2; Z3;")]
fn test_parse_without_errors(#[case] input: &str) {
    let tree = PARSER.parse(input).unwrap();
    assert!(!has_error(&tree), "unexpected error in {input:?}: {tree}");
    assert_well_formed(&tree, input);
}

#[test]
fn test_keyword_prefix_stays_identifier() {
    let tree = PARSER.parse("letter;").unwrap();
    assert_eq!(tree.to_string(), "Program(Stmt(Ident,Semi))");
}

#[test]
fn test_many_statements_are_balanced() {
    let input = "a; ".repeat(500);
    let tree = PARSER.parse(&input).unwrap();
    assert_eq!(tree.len(), input.len());
    assert!(!has_error(&tree));
    assert_eq!(
        crate::helpers::tree_assertions::count_nodes(&tree, "Stmt"),
        500
    );
}

#[test]
fn test_root_type_is_top() {
    let tree = PARSER.parse("a;").unwrap();
    assert!(tree.node_type().is_top());
    assert_eq!(tree.node_type().name(), "Program");
}

// ============================================================================
// Navigation
// ============================================================================

#[test]
fn test_resolve_finds_innermost_node() {
    let tree = PARSER.parse("let x;").unwrap();
    let node = tree.resolve(4, 1);
    assert_eq!(node.name(), "Ident");
    assert_eq!((node.from(), node.to()), (4, 5));
    let parent = node.parent().unwrap();
    assert_eq!(parent.name(), "LetStmt");
    assert_eq!(parent.text("let x;"), "let x;");
}

#[test]
fn test_node_props_come_from_tables() {
    let set = PARSER.node_set();
    let lbrace = set.get(LBRACE).unwrap();
    let closed_by = lbrace.prop(NodeProp::ClosedBy).and_then(|v| v.as_names()).unwrap();
    assert_eq!(closed_by[0].as_str(), "RBrace");
    assert!(set.get(STMT).unwrap().is("Statement"));
    assert!(set.get(LET_STMT).unwrap().is("Statement"));
    assert!(!set.get(BLOCK).unwrap().is("Statement"));
    assert!(set.get(SPACE).unwrap().is_skipped());
    assert!(set.get(ITEMS).unwrap().is_anonymous());
}

// ============================================================================
// Table Queries
// ============================================================================

#[test]
fn test_has_action() {
    assert_eq!(PARSER.has_action(0, IDENT), 3);
    assert_eq!(PARSER.has_action(3, SEMI), 4);
    assert_eq!(PARSER.has_action(3, IDENT), 0);
    // Skip actions count too.
    assert_ne!(PARSER.has_action(3, SPACE), 0);
}

#[test]
fn test_get_goto() {
    assert_eq!(PARSER.get_goto(0, STMT, false), Some(8));
    assert_eq!(PARSER.get_goto(2, BLOCK, false), Some(9));
    assert_eq!(PARSER.get_goto(3, STMT, false), None);
    assert_eq!(PARSER.get_goto(0, TOP, false), Some(1));
}

#[test]
fn test_next_states() {
    assert_eq!(
        PARSER.next_states(0),
        vec![(IDENT, 3), (LET, 5), (LBRACE, 10)]
    );
    assert!(PARSER.next_states(1).is_empty());
}

#[test]
fn test_term_metadata() {
    assert_eq!(PARSER.eof_term(), EOF);
    assert_eq!(PARSER.top(), (0, PROGRAM));
    assert_eq!(PARSER.top_node().name(), "Program");
    assert_eq!(PARSER.get_name(LBRACE), "LBrace");
    assert_eq!(PARSER.top_rule_names().collect::<Vec<_>>(), vec!["Program"]);
}

// ============================================================================
// Parse Driver
// ============================================================================

#[test]
fn test_advance_reports_progress() {
    let input = "a; b; c;";
    let mut parse = PARSER.start_parse(&input, &[], &[]).unwrap();
    let mut steps = 0;
    let mut last_pos = 0;
    let tree = loop {
        steps += 1;
        if let Some(tree) = parse.advance().unwrap() {
            break tree;
        }
        assert!(parse.parsed_pos() >= last_pos);
        last_pos = parse.parsed_pos();
    };
    assert!(steps > 1);
    assert_eq!(tree.len(), input.len());
    // A finished parse keeps returning its tree.
    let again = parse.advance().unwrap().unwrap();
    assert!(std::sync::Arc::ptr_eq(&tree, &again));
}

#[test]
fn test_stop_at_truncates_the_tree() {
    let input = "a; b; c;";
    let mut parse = PARSER.start_parse(&input, &[], &[]).unwrap();
    parse.stop_at(3).unwrap();
    assert!(parse.stop_at(5).is_err());
    let tree = parse.finish().unwrap();
    assert!(tree.len() < input.len());
    assert_eq!(
        crate::helpers::tree_assertions::count_nodes(&tree, "Stmt"),
        2
    );
}

#[test]
fn test_advance_until_cancelled() {
    let input = "a; ".repeat(50);
    let mut parse = PARSER.start_parse(&input, &[], &[]).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();
    assert!(parse.advance_until(&cancel).unwrap().is_none());
    let tree = parse.advance_until(&CancellationToken::new()).unwrap().unwrap();
    assert_eq!(tree.len(), input.len());
}

#[test]
fn test_parse_ranges_skip_gaps() {
    let input = "a; XXXX b;";
    let ranges = [strand::Range::new(0, 3), strand::Range::new(7, 10)];
    let tree = PARSER
        .start_parse(&input, &[], &ranges)
        .unwrap()
        .finish()
        .unwrap();
    assert!(!has_error(&tree), "{tree}");
    assert_eq!(
        crate::helpers::tree_assertions::count_nodes(&tree, "Stmt"),
        2
    );
}

#[test]
fn test_unsorted_ranges_are_rejected() {
    let ranges = [strand::Range::new(5, 8), strand::Range::new(0, 3)];
    let input = "a; b; c;";
    assert!(PARSER.start_parse(&input, &[], &ranges).is_err());
}

#[test]
fn test_string_input() {
    let input = String::from("a;");
    assert_eq!(Input::len(&input), 2);
    let tree = PARSER.start_parse(&input, &[], &[]).unwrap().finish().unwrap();
    assert_eq!(tree.to_string(), "Program(Stmt(Ident,Semi))");
}

#[test]
fn test_strict_parse_of_valid_input() {
    let strict = PARSER
        .configure(ParserConfig {
            strict: Some(true),
            ..ParserConfig::default()
        })
        .unwrap();
    assert!(strict.is_strict());
    assert!(strict.parse("{ a; }").is_ok());
}
