//! Incremental reparsing: reusing fragments of an old tree must produce the
//! same tree as parsing from scratch.

use std::sync::Arc;

use rstest::rstest;
use rustc_hash::FxHashSet;
use strand::lr::{LrParser, ParserConfig};
use strand::tree::{Child, Tree, TreeFragment};
use strand::ChangedRange;

use crate::helpers::grammar::PARSER;
use crate::helpers::tree_assertions::assert_well_formed;

/// Small buffers so that short documents still produce reusable subtrees.
fn small_buffers() -> LrParser {
    PARSER
        .configure(ParserConfig {
            buffer_length: Some(16),
            ..ParserConfig::default()
        })
        .unwrap()
}

fn document() -> String {
    document_of(30)
}

fn document_of(lines: usize) -> String {
    (0..lines).map(|i| format!("{{ a{i}; let b{i}; }} c{i};\n")).collect()
}

/// Apply `replace(from, to, text)` to `old` and reparse incrementally.
fn reparse(parser: &LrParser, old: &str, tree: Arc<Tree>, from: usize, to: usize, text: &str) -> (String, Arc<Tree>) {
    let mut new = String::with_capacity(old.len() + text.len());
    new.push_str(&old[..from]);
    new.push_str(text);
    new.push_str(&old[to..]);
    let fragments = TreeFragment::apply_changes(
        &TreeFragment::add_tree(tree, &[], false),
        &[ChangedRange::new(from, to, from, from + text.len())],
    );
    let tree = parser
        .start_parse(&new.as_str(), &fragments, &[])
        .unwrap()
        .finish()
        .unwrap();
    (new, tree)
}

#[rstest]
#[case::insert_statement(100, 100, "x; ")]
#[case::delete_statement(0, 20, "")]
#[case::rename(2, 4, "zzz")]
#[case::open_brace(60, 60, "{ ")]
#[case::at_end(usize::MAX, usize::MAX, " tail;")]
fn test_incremental_matches_fresh(#[case] from: usize, #[case] to: usize, #[case] text: &str) {
    let parser = small_buffers();
    let old = document();
    let (from, to) = (from.min(old.len()), to.min(old.len()));
    let tree = parser.parse(&old).unwrap();
    let (new, incremental) = reparse(&parser, &old, tree, from, to, text);
    let fresh = parser.parse(&new).unwrap();
    assert_eq!(incremental.to_string(), fresh.to_string());
    assert_well_formed(&incremental, &new);
}

#[test]
fn test_unchanged_document_reuses_nodes() {
    let parser = small_buffers();
    let old = document();
    let tree = parser.parse(&old).unwrap();
    let fragments = TreeFragment::add_tree(Arc::clone(&tree), &[], false);
    let again = parser
        .start_parse(&old.as_str(), &fragments, &[])
        .unwrap()
        .finish()
        .unwrap();
    assert_eq!(again.to_string(), tree.to_string());

    // Some subtree of the old tree appears unchanged in the new one.
    let old_children: Vec<&Arc<Tree>> = subtrees(&tree);
    let shared = subtrees(&again)
        .into_iter()
        .any(|node| old_children.iter().any(|old| Arc::ptr_eq(old, node)));
    assert!(shared, "no subtree was reused");
}

#[test]
fn test_edit_in_large_document_reuses_most_of_it() {
    let parser = small_buffers();
    let old = document_of(400);
    let tree = parser.parse(&old).unwrap();
    let old_nodes: FxHashSet<*const Tree> = subtrees(&tree).into_iter().map(Arc::as_ptr).collect();

    let at = old[..old.len() / 2].rfind('\n').map_or(0, |i| i + 1);
    // Keep the old nodes alive so their addresses stay unique.
    let _old_tree = Arc::clone(&tree);
    let (new, incremental) = reparse(&parser, &old, tree, at, at, "x; ");
    assert_eq!(incremental.to_string(), parser.parse(&new).unwrap().to_string());

    let reused = reused_bytes(&incremental, &old_nodes);
    let untouched = old.len();
    assert!(
        reused * 2 >= untouched,
        "only {reused} of {untouched} unchanged bytes came from reused nodes"
    );
}

#[test]
fn test_repeated_edits() {
    let parser = small_buffers();
    let mut text = document();
    let mut tree = parser.parse(&text).unwrap();
    for step in 0..5 {
        let at = text.len() / (step + 2);
        let at = text[..at].rfind('\n').map_or(0, |i| i + 1);
        let (new, next) = reparse(&parser, &text, tree, at, at, "q; ");
        assert_eq!(next.to_string(), parser.parse(&new).unwrap().to_string());
        text = new;
        tree = next;
    }
}

#[test]
fn test_edit_introducing_error() {
    let parser = small_buffers();
    let old = document();
    let tree = parser.parse(&old).unwrap();
    let at = old.len() / 2;
    let at = old[..at].rfind('\n').map_or(0, |i| i + 1);
    let (new, incremental) = reparse(&parser, &old, tree, at, at, "}");
    assert_well_formed(&incremental, &new);
}

/// All `Tree` nodes below `tree`, depth first.
fn subtrees(tree: &Arc<Tree>) -> Vec<&Arc<Tree>> {
    let mut out = Vec::new();
    let mut pending: Vec<&Arc<Tree>> = vec![tree];
    while let Some(node) = pending.pop() {
        for child in node.children() {
            if let Child::Tree(inner) = child {
                out.push(inner);
                pending.push(inner);
            }
        }
    }
    out
}

/// Bytes covered by the outermost nodes of `tree` that were taken over from
/// the old tree.
fn reused_bytes(tree: &Arc<Tree>, old_nodes: &FxHashSet<*const Tree>) -> usize {
    let mut total = 0;
    let mut pending: Vec<&Arc<Tree>> = vec![tree];
    while let Some(node) = pending.pop() {
        for child in node.children() {
            if let Child::Tree(inner) = child {
                if old_nodes.contains(&Arc::as_ptr(inner)) {
                    total += inner.len();
                } else {
                    pending.push(inner);
                }
            }
        }
    }
    total
}
