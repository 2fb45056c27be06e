//! A small statement grammar, assembled with `TableBuilder`.
//!
//! ```text
//! Program { (Stmt | LetStmt | Block)* }
//! Stmt    { Ident ";" }
//! LetStmt { (let | var) Ident ";" }
//! Block   { "{" (Stmt | LetStmt | Block)* "}" }
//! skip    { Space }
//! ```
//!
//! `let` and `var` are keywords specialized from `Ident`. `var` belongs to
//! the `legacy` dialect.

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use strand::lr::{
    LrParser, NodePropSpec, ParseAction, ParserSpec, Specialization, SpecializerSpec, StateSpec,
    TableBuilder, TokenState, TokenizerSpec,
};
use strand::tree::NodeProp;

pub const ERR: u16 = 0;
pub const PROGRAM: u16 = 1;
pub const STMT: u16 = 2;
pub const LET_STMT: u16 = 3;
pub const BLOCK: u16 = 4;
pub const IDENT: u16 = 5;
pub const SEMI: u16 = 6;
pub const LBRACE: u16 = 7;
pub const RBRACE: u16 = 8;
pub const LET: u16 = 9;
pub const VAR: u16 = 10;
pub const SPACE: u16 = 11;
pub const ITEMS: u16 = 12;
pub const BLOCK_ITEMS: u16 = 13;
pub const EOF: u16 = 14;
pub const TOP: u16 = 15;

const NODE_NAMES: &str = "⚠ Program Stmt LetStmt Block Ident Semi LBrace RBrace let var Space";

/// The statement grammar parser, shared between tests.
pub static PARSER: Lazy<LrParser> = Lazy::new(|| build_parser().expect("fixture grammar is valid"));

/// Assemble the parse tables for the statement grammar.
pub fn build_spec() -> ParserSpec {
    let mut builder = TableBuilder::new();
    add_tokens(&mut builder);
    add_states(&mut builder);
    builder.dialect("legacy", vec![VAR]);

    let mut top_rules = IndexMap::new();
    top_rules.insert("Program".to_string(), (0, PROGRAM));

    builder.build(ParserSpec {
        node_names: NODE_NAMES.to_string(),
        max_term: TOP,
        repeat_node_count: 2,
        node_props: vec![
            NodePropSpec {
                prop: NodeProp::ClosedBy,
                assignments: vec![(LBRACE, "RBrace".to_string())],
            },
            NodePropSpec {
                prop: NodeProp::OpenedBy,
                assignments: vec![(RBRACE, "LBrace".to_string())],
            },
            NodePropSpec {
                prop: NodeProp::Group,
                assignments: vec![
                    (STMT, "Statement".to_string()),
                    (LET_STMT, "Statement".to_string()),
                ],
            },
        ],
        skipped_nodes: vec![SPACE],
        tokenizers: vec![TokenizerSpec::Group(0)],
        top_rules,
        specialized: vec![SpecializerSpec::keywords(
            IDENT,
            [
                ("let", Specialization::Specialize(LET)),
                ("var", Specialization::Specialize(VAR)),
            ],
        )],
        ..ParserSpec::default()
    })
}

pub fn build_parser() -> strand::Result<LrParser> {
    LrParser::deserialize(build_spec())
}

fn add_tokens(builder: &mut TableBuilder) {
    const START: u16 = 0;
    const SPACE_STATE: u16 = 1;
    const IDENT_STATE: u16 = 2;
    const SEMI_STATE: u16 = 3;
    const LBRACE_STATE: u16 = 4;
    const RBRACE_STATE: u16 = 5;

    let space_edges = |state: TokenState| {
        state
            .edge(9, 11, SPACE_STATE)
            .byte(b'\r', SPACE_STATE)
            .byte(b' ', SPACE_STATE)
    };
    let ident_start = |state: TokenState, target: u16| {
        state
            .edge(u16::from(b'A'), u32::from(b'Z') + 1, target)
            .byte(b'_', target)
            .edge(u16::from(b'a'), u32::from(b'z') + 1, target)
    };

    let start = ident_start(space_edges(TokenState::new(1)), IDENT_STATE)
        .byte(b';', SEMI_STATE)
        .byte(b'{', LBRACE_STATE)
        .byte(b'}', RBRACE_STATE);
    assert_eq!(builder.token_state(start), START);
    builder.token_state(space_edges(TokenState::new(1).accept(SPACE, 1)));
    builder.token_state(
        ident_start(TokenState::new(1).accept(IDENT, 1), IDENT_STATE)
            .edge(u16::from(b'0'), u32::from(b'9') + 1, IDENT_STATE),
    );
    builder.token_state(TokenState::new(1).accept(SEMI, 1));
    builder.token_state(TokenState::new(1).accept(LBRACE, 1));
    builder.token_state(TokenState::new(1).accept(RBRACE, 1));
}

fn add_states(builder: &mut TableBuilder) {
    use ParseAction::{Reduce, ReduceRepeat, Shift};

    let state = || StateSpec::new(1).skip(SPACE, ParseAction::Skip);
    // Shifts that start an item: 3 for Ident, 5 for let/var, 10 for "{".
    let items = |spec: StateSpec| {
        spec.on(IDENT, Shift(3))
            .on(LET, Shift(5))
            .on(VAR, Shift(5))
            .on(LBRACE, Shift(10))
    };
    let reduce = |term, depth| Reduce { term, depth };

    // 0: Program → · items
    builder.state(items(state()).on(EOF, reduce(TOP, 0)).forced_reduce(reduce(TOP, 0)));
    // 1: accept
    builder.state(state().accepting());
    // 2: Program → items ·, items → items · item
    builder.state(items(state()).on(EOF, reduce(TOP, 1)).forced_reduce(reduce(TOP, 1)));
    // 3..4: Stmt
    builder.state(state().on(SEMI, Shift(4)).forced_reduce(reduce(STMT, 1)));
    builder.state(state().default_reduce(reduce(STMT, 2)).forced_reduce(reduce(STMT, 2)));
    // 5..7: LetStmt
    builder.state(state().on(IDENT, Shift(6)).forced_reduce(reduce(LET_STMT, 1)));
    builder.state(state().on(SEMI, Shift(7)).forced_reduce(reduce(LET_STMT, 2)));
    builder.state(state().default_reduce(reduce(LET_STMT, 3)).forced_reduce(reduce(LET_STMT, 3)));
    // 8..9: top-level repetition
    builder.state(state().default_reduce(reduce(ITEMS, 1)).forced_reduce(reduce(ITEMS, 1)));
    let repeat = ReduceRepeat { term: ITEMS, depth: 2 };
    builder.state(state().default_reduce(repeat).forced_reduce(repeat));
    // 10..13: Block
    builder.state(items(state()).on(RBRACE, Shift(11)).forced_reduce(reduce(BLOCK, 1)));
    builder.state(state().default_reduce(reduce(BLOCK, 2)).forced_reduce(reduce(BLOCK, 2)));
    builder.state(items(state()).on(RBRACE, Shift(13)).forced_reduce(reduce(BLOCK, 2)));
    builder.state(state().default_reduce(reduce(BLOCK, 3)).forced_reduce(reduce(BLOCK, 3)));
    // 14..15: repetition inside blocks
    builder.state(state().default_reduce(reduce(BLOCK_ITEMS, 1)).forced_reduce(reduce(BLOCK_ITEMS, 1)));
    let repeat = ReduceRepeat { term: BLOCK_ITEMS, depth: 2 };
    builder.state(state().default_reduce(repeat).forced_reduce(repeat));

    builder.goto(0, TOP, 1).goto(0, ITEMS, 2).goto(10, BLOCK_ITEMS, 12);
    for term in [STMT, LET_STMT, BLOCK] {
        builder
            .goto(0, term, 8)
            .goto(2, term, 9)
            .goto(10, term, 14)
            .goto(12, term, 15);
    }
}
