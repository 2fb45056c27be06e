//! Property tests: parsing never fails and always covers the input.

use proptest::prelude::*;
use strand::lr::ParserConfig;
use strand::tree::TreeFragment;
use strand::ChangedRange;

use crate::helpers::grammar::PARSER;
use crate::helpers::tree_assertions::{assert_well_formed, has_error};

// ============================================================================
// Strategies
// ============================================================================

fn arb_token() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z][a-z0-9]{0,4}".prop_map(|s| s),
        Just("let".to_string()),
        Just(";".to_string()),
        Just("{".to_string()),
        Just("}".to_string()),
        Just(" ".to_string()),
        Just("\n".to_string()),
        Just("?".to_string()),
        Just("é".to_string()),
    ]
}

fn arb_soup() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_token(), 0..40).prop_map(|tokens| tokens.join(""))
}

/// Identifiers, excluding the `let` keyword.
fn arb_name() -> impl Strategy<Value = String> {
    "[a-z]{1,4}".prop_filter("keyword", |name| name != "let")
}

fn arb_statement() -> impl Strategy<Value = String> {
    prop_oneof![
        arb_name().prop_map(|name| format!("{name}; ")),
        arb_name().prop_map(|name| format!("let {name}; ")),
        arb_name().prop_map(|name| format!("{{ {name}; }} ")),
    ]
}

fn arb_program() -> impl Strategy<Value = String> {
    prop::collection::vec(arb_statement(), 0..30).prop_map(|stmts| stmts.concat())
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_any_input_parses(input in arb_soup()) {
        let tree = PARSER.parse(&input).unwrap();
        prop_assert_eq!(tree.len(), input.len());
        assert_well_formed(&tree, &input);
    }

    #[test]
    fn prop_parsing_is_deterministic(input in arb_soup()) {
        let first = PARSER.parse(&input).unwrap();
        let second = PARSER.parse(&input).unwrap();
        prop_assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn prop_valid_programs_have_no_errors(input in arb_program()) {
        let tree = PARSER.parse(&input).unwrap();
        prop_assert!(!has_error(&tree), "{}", tree);
    }

    #[test]
    fn prop_incremental_insert_matches_fresh(
        program in arb_program(),
        stmt in arb_statement(),
        split in 0usize..30,
    ) {
        let parser = PARSER
            .configure(ParserConfig { buffer_length: Some(16), ..ParserConfig::default() })
            .unwrap();
        // Insert between two statements.
        let boundaries: Vec<usize> = std::iter::once(0)
            .chain(program.match_indices("; ").map(|(i, _)| i + 2))
            .chain(program.match_indices("} ").map(|(i, _)| i + 2))
            .collect();
        let at = boundaries[split % boundaries.len()];

        let tree = parser.parse(&program).unwrap();
        let new = format!("{}{}{}", &program[..at], stmt, &program[at..]);
        let fragments = TreeFragment::apply_changes(
            &TreeFragment::add_tree(tree, &[], false),
            &[ChangedRange::replace(at, at, stmt.len())],
        );
        let incremental = parser.start_parse(&new.as_str(), &fragments, &[]).unwrap().finish().unwrap();
        let fresh = parser.parse(&new).unwrap();
        prop_assert_eq!(incremental.to_string(), fresh.to_string());
    }
}
