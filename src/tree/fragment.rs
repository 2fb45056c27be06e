//! Fragments of old trees that can be reused by an incremental parse.

use std::sync::Arc;

use crate::base::ChangedRange;

use super::tree::Tree;

/// Minimum gap left between a change and a reusable fragment.
pub const DEFAULT_MIN_GAP: usize = 128;

const OPEN_START: u8 = 1;
const OPEN_END: u8 = 2;

/// A range `from..to` of a new document in which `tree`, shifted by
/// `offset`, is still valid.
///
/// A fragment side that borders an edit is *open*: nodes touching it must
/// not be reused, because the edit may have changed how they'd parse.
#[derive(Clone, Debug)]
pub struct TreeFragment {
    pub from: usize,
    pub to: usize,
    pub tree: Arc<Tree>,
    /// Position in the tree minus position in the new document.
    pub offset: isize,
    open: u8,
}

impl TreeFragment {
    pub fn new(
        from: usize,
        to: usize,
        tree: Arc<Tree>,
        offset: isize,
        open_start: bool,
        open_end: bool,
    ) -> Self {
        Self {
            from,
            to,
            tree,
            offset,
            open: if open_start { OPEN_START } else { 0 } | if open_end { OPEN_END } else { 0 },
        }
    }

    pub fn open_start(&self) -> bool {
        self.open & OPEN_START > 0
    }

    pub fn open_end(&self) -> bool {
        self.open & OPEN_END > 0
    }

    /// Fragments covering all of `tree`, optionally added to the still-valid
    /// parts of `fragments`.
    pub fn add_tree(
        tree: Arc<Tree>,
        fragments: &[TreeFragment],
        partial: bool,
    ) -> Vec<TreeFragment> {
        let len = tree.len();
        let mut result = vec![TreeFragment::new(0, len, tree, 0, false, partial)];
        result.extend(fragments.iter().filter(|f| f.to > len).cloned());
        result
    }

    /// Apply `changes` (sorted, non-overlapping, in old and new coordinates)
    /// to a set of fragments, keeping [`DEFAULT_MIN_GAP`] bytes clear around
    /// every change.
    pub fn apply_changes(fragments: &[TreeFragment], changes: &[ChangedRange]) -> Vec<TreeFragment> {
        Self::apply_changes_with_gap(fragments, changes, DEFAULT_MIN_GAP)
    }

    pub fn apply_changes_with_gap(
        fragments: &[TreeFragment],
        changes: &[ChangedRange],
        min_gap: usize,
    ) -> Vec<TreeFragment> {
        if changes.is_empty() {
            return fragments.to_vec();
        }
        let mut result = Vec::new();
        let mut f_i = 1;
        let mut next_f = fragments.first();
        let mut c_i = 0;
        let mut pos = 0usize;
        let mut off: isize = 0;
        loop {
            let next_c = changes.get(c_i);
            let next_pos = next_c.map_or(usize::MAX, |c| c.from_a);
            if next_pos.saturating_sub(pos) >= min_gap {
                while let Some(fragment) = next_f {
                    if fragment.from >= next_pos {
                        break;
                    }
                    if pos >= fragment.from || next_pos <= fragment.to || off != 0 {
                        let f_from = pos.max(fragment.from) as isize - off;
                        let f_to = next_pos.min(fragment.to) as isize - off;
                        if f_from < f_to {
                            result.push(TreeFragment::new(
                                f_from as usize,
                                f_to as usize,
                                fragment.tree.clone(),
                                fragment.offset + off,
                                c_i > 0,
                                next_c.is_some(),
                            ));
                        }
                    } else {
                        result.push(fragment.clone());
                    }
                    if fragment.to > next_pos {
                        break;
                    }
                    next_f = fragments.get(f_i);
                    f_i += 1;
                }
            }
            let Some(change) = next_c else {
                break;
            };
            pos = change.to_a;
            off = change.to_a as isize - change.to_b as isize;
            c_i += 1;
        }
        result
    }
}
