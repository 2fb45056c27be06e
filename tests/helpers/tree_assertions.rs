//! Assertions over parse trees.

use std::cell::RefCell;
use std::sync::Arc;

use strand::tree::Tree;

/// Names of every named node in document order, as `(name, from, to)`.
pub fn collect_nodes(tree: &Arc<Tree>) -> Vec<(String, usize, usize)> {
    let mut nodes = Vec::new();
    tree.iterate(
        |cursor| {
            nodes.push((cursor.name().to_string(), cursor.from(), cursor.to()));
            true
        },
        |_| {},
    );
    nodes
}

pub fn count_nodes(tree: &Arc<Tree>, name: &str) -> usize {
    collect_nodes(tree).iter().filter(|(n, _, _)| n == name).count()
}

pub fn has_error(tree: &Arc<Tree>) -> bool {
    count_nodes(tree, "⚠") > 0
}

/// Every node lies within its parent and the root covers the whole input.
#[track_caller]
pub fn assert_well_formed(tree: &Arc<Tree>, input: &str) {
    assert_eq!(tree.len(), input.len(), "tree length for {input:?}");
    // Both callbacks need the open-node stack.
    let stack: RefCell<Vec<(usize, usize)>> = RefCell::new(Vec::new());
    tree.iterate(
        |cursor| {
            if let Some(&(from, to)) = stack.borrow().last() {
                assert!(
                    cursor.from() >= from && cursor.to() <= to,
                    "{} {}..{} escapes parent {from}..{to} in {input:?}",
                    cursor.name(),
                    cursor.from(),
                    cursor.to()
                );
            }
            assert!(cursor.from() <= cursor.to());
            stack.borrow_mut().push((cursor.from(), cursor.to()));
            true
        },
        |_| {
            stack.borrow_mut().pop();
        },
    );
}
