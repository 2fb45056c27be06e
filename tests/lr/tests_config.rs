//! Parser variants made with `LrParser::configure`.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strand::ParseError;
use strand::lr::{
    ExternalTokenizer, InputStream, ParserConfig, Specialization, SpecializerSpec, StackView,
    Tokenizer,
};
use strand::tree::{NodeProp, PropValue, prop_source};

use crate::helpers::grammar::*;
use crate::helpers::tree_assertions::{count_nodes, has_error};

fn with(config: ParserConfig) -> strand::LrParser {
    PARSER.configure(config).unwrap()
}

// ============================================================================
// Dialects
// ============================================================================

#[test]
fn test_dialect_enables_keyword() {
    let legacy = with(ParserConfig {
        dialect: Some("legacy".to_string()),
        ..ParserConfig::default()
    });
    assert!(legacy.dialect().flag(0));
    assert_eq!(legacy.dialect().source(), Some("legacy"));
    let tree = legacy.parse("var x;").unwrap();
    assert_eq!(tree.to_string(), "Program(LetStmt(var,Space,Ident,Semi))");
}

#[test]
fn test_default_dialect_disables_keyword() {
    assert!(!PARSER.dialect().flag(0));
    assert!(!PARSER.dialect().allows(VAR));
    assert!(PARSER.dialect().allows(LET));
}

#[test]
fn test_unknown_dialect_names_are_ignored() {
    let parser = with(ParserConfig {
        dialect: Some("modern legacy".to_string()),
        ..ParserConfig::default()
    });
    assert!(parser.dialect().allows(VAR));
}

// ============================================================================
// Top Rules
// ============================================================================

#[test]
fn test_unknown_top_rule() {
    let result = PARSER.configure(ParserConfig {
        top: Some("Nope".to_string()),
        ..ParserConfig::default()
    });
    assert!(matches!(result, Err(ParseError::UnknownTopRule(name)) if name == "Nope"));
}

#[test]
fn test_known_top_rule() {
    let parser = with(ParserConfig {
        top: Some("Program".to_string()),
        ..ParserConfig::default()
    });
    assert_eq!(parser.top(), (0, PROGRAM));
}

// ============================================================================
// Props
// ============================================================================

#[test]
fn test_props_extend_node_set() {
    let parser = with(ParserConfig {
        props: vec![prop_source(
            NodeProp::Group,
            [("Block", PropValue::Names(vec!["Scope".into()]))],
        )],
        ..ParserConfig::default()
    });
    assert!(parser.node_set().get(BLOCK).unwrap().is("Scope"));
    assert!(!PARSER.node_set().get(BLOCK).unwrap().is("Scope"));
    // Trees from the configured parser carry the extended types.
    let tree = parser.parse("{}").unwrap();
    let block = tree.resolve(0, 1).parent().unwrap();
    assert_eq!(block.name(), "Block");
    assert!(block.node_type().is("Scope"));
}

// ============================================================================
// Specializers
// ============================================================================

#[test]
fn test_replacing_specializer() {
    let parser = with(ParserConfig {
        specializers: vec![SpecializerSpec::keywords(
            IDENT,
            [("define", Specialization::Specialize(LET))],
        )],
        ..ParserConfig::default()
    });
    let tree = parser.parse("define x;").unwrap();
    assert_eq!(tree.to_string(), "Program(LetStmt(let,Space,Ident,Semi))");
    // The old keyword is a plain identifier now.
    let tree = parser.parse("let;").unwrap();
    assert_eq!(tree.to_string(), "Program(Stmt(Ident,Semi))");
}

#[test]
fn test_extending_specializer_keeps_both_readings() {
    // `let` may also be read as an identifier.
    let parser = with(ParserConfig {
        specializers: vec![SpecializerSpec::external(IDENT, |text, _stack: &StackView<'_>| {
            (text == "let").then_some(Specialization::Extend(LET))
        })],
        ..ParserConfig::default()
    });
    let tree = parser.parse("let;").unwrap();
    assert!(!has_error(&tree), "{tree}");
    assert_eq!(count_nodes(&tree, "Stmt"), 1);
    let tree = parser.parse("let x;").unwrap();
    assert!(!has_error(&tree), "{tree}");
    assert_eq!(count_nodes(&tree, "LetStmt"), 1);
}

// ============================================================================
// External Tokenizers
// ============================================================================

fn is_ident_byte(next: i32) -> bool {
    u8::try_from(next).is_ok_and(|b| b.is_ascii_alphanumeric() || b == b'_')
}

fn statement_tokens(input: &mut InputStream<'_>, _stack: &StackView<'_>) -> strand::Result<()> {
    let Ok(byte) = u8::try_from(input.next()) else {
        return Ok(());
    };
    let term = match byte {
        b';' => SEMI,
        b'{' => LBRACE,
        b'}' => RBRACE,
        b if b.is_ascii_whitespace() => {
            while u8::try_from(input.next()).is_ok_and(|b| b.is_ascii_whitespace()) {
                input.advance(1);
            }
            return input.accept_token(SPACE, 0);
        }
        b if b.is_ascii_alphabetic() || b == b'_' => {
            while is_ident_byte(input.next()) {
                input.advance(1);
            }
            return input.accept_token(IDENT, 0);
        }
        _ => return Ok(()),
    };
    input.advance(1);
    input.accept_token(term, 0)
}

#[test]
fn test_external_tokenizer_replaces_token_group() {
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(ExternalTokenizer::new(move |input, stack| {
        counter.fetch_add(1, Ordering::Relaxed);
        statement_tokens(input, stack)
    }));
    let parser = with(ParserConfig {
        tokenizers: vec![(0, tokenizer)],
        ..ParserConfig::default()
    });
    let input = "let x; { y; }";
    let expected = PARSER.parse(input).unwrap().to_string();
    let tree = parser.parse(input).unwrap();
    assert_eq!(tree.to_string(), expected);
    assert!(calls.load(Ordering::Relaxed) > 0);
}

#[test]
fn test_external_tokenizer_lookahead() {
    // Reads ahead past the token end without consuming.
    let tokenizer = ExternalTokenizer::new(|input, stack| {
        if input.next() == i32::from(b'a') && input.peek(1) == i32::from(b';') {
            assert!(stack.can_shift(IDENT));
            input.advance(1);
            return input.accept_token(IDENT, 0);
        }
        statement_tokens(input, stack)
    })
    .with_contextual(true);
    let tokenizer: Arc<dyn Tokenizer> = Arc::new(tokenizer);
    let parser = with(ParserConfig {
        tokenizers: vec![(0, tokenizer)],
        ..ParserConfig::default()
    });
    let tree = parser.parse("a; b;").unwrap();
    assert_eq!(tree.to_string(), "Program(Stmt(Ident,Semi),Space,Stmt(Ident,Semi))");
}

#[test]
fn test_tokenizer_errors_propagate() {
    let tokenizer: Arc<dyn Tokenizer> =
        Arc::new(ExternalTokenizer::new(|input, _stack| input.accept_token(IDENT, -100)));
    let parser = with(ParserConfig {
        tokenizers: vec![(0, tokenizer)],
        ..ParserConfig::default()
    });
    let err = parser.parse("abc").unwrap_err();
    assert!(matches!(err, ParseError::TokenOutOfBounds { .. }), "{err}");
}

#[test]
fn test_buffer_length_config() {
    let parser = with(ParserConfig {
        buffer_length: Some(8),
        ..ParserConfig::default()
    });
    assert_eq!(parser.buffer_length(), 8);
    let input = "{ a; b; } { c; }";
    assert_eq!(
        parser.parse(input).unwrap().to_string(),
        PARSER.parse(input).unwrap().to_string()
    );
}
