//! Unit tests for stacks and the parse driver, on a one-token grammar.
//!
//! ```text
//! Program { Word* }
//! skip    { Space }
//! ```

use std::sync::Arc;

use indexmap::IndexMap;

use crate::base::Range;

use super::constants::action::REDUCE_FLAG;
use super::constants::{parse_state, term};
use super::input::{Input, InputStream};
use super::parse::{BigReductions, ParseEnv};
use super::stack::{SegmentArena, Stack};
use super::*;

const PROGRAM: u16 = 1;
const WORD: u16 = 2;
const SPACE: u16 = 3;
const WORDS: u16 = 4;
const EOF: u16 = 5;
const TOP: u16 = 6;

fn words_parser() -> Arc<LrParser> {
    use ParseAction::{Reduce, ReduceRepeat, Shift};

    let mut builder = TableBuilder::new();
    let state = || StateSpec::new(1).skip(SPACE, ParseAction::Skip);
    builder.state(
        state()
            .on(WORD, Shift(2))
            .on(EOF, Reduce { term: TOP, depth: 0 })
            .forced_reduce(Reduce { term: TOP, depth: 0 }),
    );
    builder.state(state().accepting());
    let words = Reduce { term: WORDS, depth: 1 };
    builder.state(state().default_reduce(words).forced_reduce(words));
    builder.state(
        state()
            .on(WORD, Shift(4))
            .on(EOF, Reduce { term: TOP, depth: 1 })
            .forced_reduce(Reduce { term: TOP, depth: 1 }),
    );
    let repeat = ReduceRepeat { term: WORDS, depth: 2 };
    builder.state(state().default_reduce(repeat).forced_reduce(repeat));
    builder.goto(0, TOP, 1).goto(0, WORDS, 3);

    builder.token_state(
        TokenState::new(1)
            .byte(b' ', 2)
            .edge(u16::from(b'a'), u32::from(b'z') + 1, 1),
    );
    builder.token_state(
        TokenState::new(1)
            .accept(WORD, 1)
            .edge(u16::from(b'a'), u32::from(b'z') + 1, 1),
    );
    builder.token_state(TokenState::new(1).accept(SPACE, 1).byte(b' ', 2));

    let mut top_rules = IndexMap::new();
    top_rules.insert("Program".to_string(), (0, PROGRAM));
    let spec = builder.build(ParserSpec {
        node_names: "⚠ Program Word Space".to_string(),
        max_term: TOP,
        repeat_node_count: 1,
        skipped_nodes: vec![SPACE],
        tokenizers: vec![TokenizerSpec::Group(0)],
        top_rules,
        ..ParserSpec::default()
    });
    Arc::new(LrParser::deserialize(spec).unwrap())
}

fn env<'a>(parser: &Arc<LrParser>, input: &'a dyn Input) -> ParseEnv<'a> {
    ParseEnv {
        parser: Arc::clone(parser),
        stream: InputStream::new(input, vec![Range::new(0, input.len())]),
        segments: SegmentArena::default(),
        reused: Vec::new(),
        big: BigReductions::default(),
        start: 0,
    }
}

// ============================================================================
// Stack
// ============================================================================

#[test]
fn test_shift_then_default_reduce() {
    let parser = words_parser();
    let input = "abc";
    let mut env = env(&parser, &input);
    let mut stack = Stack::start(&parser, 0, 0);

    stack.apply(2, WORD, 0, 3, &mut env);
    assert_eq!(stack.state, 2);
    assert_eq!(stack.pos, 3);
    assert_eq!(stack.buffer, vec![i64::from(WORD), 0, 3, 4]);

    let reduce = parser.state_slot(2, parse_state::DEFAULT_REDUCE);
    assert!(reduce & REDUCE_FLAG != 0);
    stack.reduce(reduce, &mut env);
    assert_eq!(stack.state, 3);
    // Anonymous repeat reductions without the repeat flag store no node.
    assert_eq!(stack.buffer.len(), 4);
    assert_eq!(stack.to_string(), "[0,3]@3");
}

#[test]
fn test_split_freezes_shared_prefix() {
    let parser = words_parser();
    let input = "abc";
    let mut env = env(&parser, &input);
    let mut stack = Stack::start(&parser, 0, 0);
    stack.apply(2, WORD, 0, 3, &mut env);

    let copy = stack.split(&mut env);
    assert_eq!(env.segments.len(), 1);
    assert!(stack.buffer.is_empty());
    assert!(copy.buffer.is_empty());
    assert_eq!(stack.buffer_len(), 4);
    assert_eq!(copy.buffer_len(), 4);
    assert!(stack.same_state(&copy));
}

#[test]
fn test_can_shift_through_reductions() {
    let parser = words_parser();
    let input = "abc";
    let mut env = env(&parser, &input);
    let mut stack = Stack::start(&parser, 0, 0);
    assert!(stack.can_shift(&parser, WORD));
    stack.apply(2, WORD, 0, 3, &mut env);
    // State 2 only reduces, after which a word can be shifted.
    assert!(stack.can_shift(&parser, WORD));
    assert!(!stack.can_shift(&parser, PROGRAM));
}

#[test]
fn test_force_all_reaches_accepting_state() {
    let parser = words_parser();
    let input = "abc";
    let mut env = env(&parser, &input);
    let mut stack = Stack::start(&parser, 0, 0);
    stack.apply(2, WORD, 0, 3, &mut env);
    stack.force_all(&mut env);
    assert_eq!(stack.state, 1);
    assert_eq!(stack.score, 0);
}

#[test]
fn test_recover_by_delete() {
    let parser = words_parser();
    let input = "a";
    let mut env = env(&parser, &input);
    let mut stack = Stack::start(&parser, 0, 0);
    stack.recover_by_delete(WORD, 1, &mut env);
    assert_eq!(stack.pos, 1);
    assert_eq!(stack.reduce_pos, 1);
    assert_eq!(stack.score, -parser.tuning().delete_penalty);
    assert_eq!(stack.buffer, vec![i64::from(WORD), 0, 1, 4, 0, 0, 1, 8]);
}

#[test]
fn test_adjacent_error_nodes_merge() {
    let parser = words_parser();
    let input = "??";
    let mut env = env(&parser, &input);
    let mut stack = Stack::start(&parser, 0, 0);
    stack.recover_by_delete(term::ERR, 1, &mut env);
    stack.recover_by_delete(term::ERR, 2, &mut env);
    assert_eq!(stack.buffer, vec![0, 0, 2, 4]);
}

#[test]
fn test_recover_by_insert_scores_each_option() {
    let parser = words_parser();
    let input = "";
    let mut env = env(&parser, &input);
    let mut stack = Stack::start(&parser, 0, 0);
    let inserted = stack.recover_by_insert(EOF, &mut env);
    assert_eq!(inserted.len(), 1);
    assert_eq!(inserted[0].state, 2);
    assert_eq!(inserted[0].score, -parser.tuning().insert_penalty);
}

// ============================================================================
// Parse
// ============================================================================

#[test]
fn test_parse_words() {
    let parser = words_parser();
    let tree = parser.parse("ab cd").unwrap();
    assert_eq!(tree.to_string(), "Program(Word,Space,Word)");
    assert_eq!(tree.len(), 5);
}

#[test]
fn test_parse_recovers_from_unknown_bytes() {
    let parser = words_parser();
    let tree = parser.parse("ab 12 cd").unwrap();
    assert_eq!(tree.len(), 8);
    assert!(tree.to_string().contains('⚠'));
}

#[test]
fn test_parse_debug_output() {
    let parser = words_parser();
    let input = "ab";
    let parse = parser.start_parse(&input, &[], &[]).unwrap();
    let debug = format!("{parse:?}");
    assert!(debug.starts_with("Parse"));
    assert!(format!("{parser:?}").contains("LrParser"));
}
