//! Context tracking through shifts and reductions.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use strand::lr::{
    ContextTracker, ContextValue, InputStream, LrParser, ParserConfig, Specialization, SpecializerSpec,
    StackView,
};
use strand::tree::TreeFragment;

use crate::helpers::grammar::*;
use crate::helpers::tree_assertions::{count_nodes, has_error};

/// Tracks block nesting depth.
#[derive(Default)]
struct DepthTracker {
    shifts: AtomicUsize,
    reductions: AtomicUsize,
}

fn depth(context: &ContextValue) -> usize {
    context.downcast_ref::<usize>().copied().unwrap_or(0)
}

impl ContextTracker for DepthTracker {
    fn start(&self) -> ContextValue {
        Arc::new(0usize)
    }

    fn shift(
        &self,
        context: &ContextValue,
        term: u16,
        _stack: &StackView<'_>,
        _input: &mut InputStream<'_>,
    ) -> ContextValue {
        self.shifts.fetch_add(1, Ordering::Relaxed);
        match term {
            LBRACE => Arc::new(depth(context) + 1),
            RBRACE => Arc::new(depth(context).saturating_sub(1)),
            _ => Arc::clone(context),
        }
    }

    fn reduce(
        &self,
        context: &ContextValue,
        _term: u16,
        _stack: &StackView<'_>,
        _input: &mut InputStream<'_>,
    ) -> ContextValue {
        self.reductions.fetch_add(1, Ordering::Relaxed);
        Arc::clone(context)
    }

    fn hash(&self, context: &ContextValue) -> u32 {
        depth(context) as u32
    }
}

/// `let` is a keyword only outside blocks.
fn top_level_let() -> SpecializerSpec {
    SpecializerSpec::external(IDENT, |text, stack: &StackView<'_>| {
        let depth = stack.context().map_or(0, depth);
        (text == "let" && depth == 0).then_some(Specialization::Specialize(LET))
    })
}

fn tracked(tracker: Arc<DepthTracker>) -> LrParser {
    PARSER
        .configure(ParserConfig {
            context_tracker: Some(tracker),
            specializers: vec![top_level_let()],
            ..ParserConfig::default()
        })
        .unwrap()
}

#[test]
fn test_tracker_sees_shifts_and_reductions() {
    let tracker = Arc::new(DepthTracker::default());
    let parser = tracked(Arc::clone(&tracker));
    parser.parse("{ a; } b;").unwrap();
    // Two braces, two identifiers, two semicolons, three spaces.
    assert!(tracker.shifts.load(Ordering::Relaxed) >= 6);
    assert!(tracker.reductions.load(Ordering::Relaxed) >= 3);
}

#[test]
fn test_specializer_reads_context() {
    let parser = tracked(Arc::new(DepthTracker::default()));
    let tree = parser.parse("let x;").unwrap();
    assert_eq!(count_nodes(&tree, "LetStmt"), 1);
    // Inside a block, `let` is an identifier and `let x;` is an error.
    let tree = parser.parse("{ let x; }").unwrap();
    assert!(has_error(&tree), "{tree}");
    assert_eq!(count_nodes(&tree, "LetStmt"), 0);
    let tree = parser.parse("{ let; }").unwrap();
    assert!(!has_error(&tree), "{tree}");
}

#[test]
fn test_incremental_parse_with_tracker() {
    let parser = tracked(Arc::new(DepthTracker::default()))
        .configure(ParserConfig {
            buffer_length: Some(16),
            ..ParserConfig::default()
        })
        .unwrap();
    let old = "{ a; b; } c; ".repeat(20);
    let tree = parser.parse(&old).unwrap();

    let mut new = old.clone();
    new.insert_str(0, "{ ");
    new.insert_str(old.len() / 2 + 2, " }");
    let changes = [
        strand::ChangedRange::replace(0, 0, 2),
        strand::ChangedRange::new(old.len() / 2, old.len() / 2, old.len() / 2 + 2, old.len() / 2 + 4),
    ];
    let fragments = TreeFragment::apply_changes(&TreeFragment::add_tree(tree, &[], false), &changes);
    let incremental = parser.start_parse(&new.as_str(), &fragments, &[]).unwrap().finish().unwrap();
    let fresh = parser.parse(&new).unwrap();
    assert_eq!(incremental.to_string(), fresh.to_string());
}
