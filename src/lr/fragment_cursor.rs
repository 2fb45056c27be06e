//! Walks the fragments of a previous parse to find reusable nodes.

use std::sync::Arc;

use crate::tree::{Child, IterMode, NodeProp, Tree, TreeFragment};

use super::constants::LOOKAHEAD_MARGIN;

/// Cursor over reusable trees, queried with non-decreasing positions.
pub(crate) struct FragmentCursor {
    fragments: Vec<TreeFragment>,
    i: usize,
    fragment: Option<TreeFragment>,
    safe_from: usize,
    safe_to: usize,
    /// Open trees with their document start and next child index.
    trees: Vec<(Arc<Tree>, isize, usize)>,
    next_start: usize,
}

impl FragmentCursor {
    pub fn new(fragments: Vec<TreeFragment>) -> Self {
        let mut cursor = Self {
            fragments,
            i: 0,
            fragment: None,
            safe_from: 0,
            safe_to: 0,
            trees: Vec::new(),
            next_start: 0,
        };
        cursor.next_fragment();
        cursor
    }

    fn next_fragment(&mut self) {
        self.fragment = self.fragments.get(self.i).cloned();
        self.trees.clear();
        match &self.fragment {
            Some(fr) => {
                self.i += 1;
                let offset = fr.offset;
                self.safe_from = if fr.open_start() {
                    shift(cut_at(&fr.tree, shift(fr.from, offset), 1), -offset)
                } else {
                    fr.from
                };
                self.safe_to = if fr.open_end() {
                    shift(cut_at(&fr.tree, shift(fr.to, offset), -1), -offset)
                } else {
                    fr.to
                };
                self.trees.push((Arc::clone(&fr.tree), -offset, 0));
                self.next_start = self.safe_from;
            }
            None => self.next_start = usize::MAX,
        }
    }

    /// A reusable tree starting exactly at `pos`, if any. `pos` must not be
    /// smaller than in previous calls.
    pub fn node_at(&mut self, pos: usize) -> Option<Arc<Tree>> {
        if pos < self.next_start {
            return None;
        }
        while self.fragment.is_some() && self.safe_to <= pos {
            self.next_fragment();
        }
        let fragment_to = self.fragment.as_ref()?.to;

        loop {
            let Some((top, top_start, index)) = self.trees.last().cloned() else {
                self.next_fragment();
                return None;
            };
            if index == top.children().len() {
                self.trees.pop();
                continue;
            }
            let child = &top.children()[index];
            let start = top_start + top.positions()[index] as isize;
            if start > pos as isize {
                self.next_start = start.max(0) as usize;
                return None;
            }
            match child {
                Child::Tree(next) => {
                    let end = start + next.len() as isize;
                    if start == pos as isize {
                        if start < self.safe_from as isize {
                            return None;
                        }
                        if end <= self.safe_to as isize {
                            let look_ahead = next.prop_number(NodeProp::LookAhead).unwrap_or(0) as isize;
                            if look_ahead == 0 || end + look_ahead < fragment_to as isize {
                                return Some(Arc::clone(next));
                            }
                        }
                    }
                    // Only skip nodes that were not handed out, so a stack
                    // that must reduce first is offered the same node again.
                    self.advance_index();
                    if end >= self.safe_from.max(pos) as isize {
                        self.trees.push((Arc::clone(next), start, 0));
                    }
                }
                Child::Buffer(buffer) => {
                    self.advance_index();
                    self.next_start = (start + buffer.len() as isize).max(0) as usize;
                }
            }
        }
    }
}

impl FragmentCursor {
    fn advance_index(&mut self) {
        if let Some(top) = self.trees.last_mut() {
            top.2 += 1;
        }
    }
}

fn shift(pos: usize, offset: isize) -> usize {
    (pos as isize + offset).max(0) as usize
}

/// A position near `pos`, at least [`LOOKAHEAD_MARGIN`] away from it, where
/// `tree` can be cut without splitting a node that touches `pos`.
fn cut_at(tree: &Arc<Tree>, pos: usize, side: i8) -> usize {
    let mut cursor = tree.cursor(IterMode::INCLUDE_ANONYMOUS);
    cursor.move_to(pos, 0);
    loop {
        let entered = if side < 0 {
            cursor.child_before(pos)
        } else {
            cursor.child_after(pos)
        };
        if entered {
            continue;
        }
        loop {
            let outside = if side < 0 {
                cursor.to() < pos
            } else {
                cursor.from() > pos
            };
            if outside && !cursor.node_type().is_error() {
                return if side < 0 {
                    cursor.to().saturating_sub(1).min(pos.saturating_sub(LOOKAHEAD_MARGIN))
                } else {
                    tree.len().min((cursor.from() + 1).max(pos + LOOKAHEAD_MARGIN))
                };
            }
            let moved = if side < 0 {
                cursor.prev_sibling()
            } else {
                cursor.next_sibling()
            };
            if moved {
                break;
            }
            if !cursor.parent() {
                return if side < 0 { 0 } else { tree.len() };
            }
        }
    }
}
