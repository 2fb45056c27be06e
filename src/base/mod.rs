//! Foundation types shared by the tree and the LR runtime.
//!
//! This module provides:
//! - [`Range`] - A half-open byte range of the document to parse
//! - [`ChangedRange`] - An edit, expressed in old and new document coordinates
//! - [`TextRange`], [`TextSize`] - Re-exported from `text-size` for hosts
//!
//! All positions in this crate are UTF-8 byte offsets.
//!
//! This module has NO dependencies on other strand modules.

pub use text_size::{TextRange, TextSize};

/// A half-open range `from..to` of the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Range {
    pub from: usize,
    pub to: usize,
}

impl Range {
    pub fn new(from: usize, to: usize) -> Self {
        Self { from, to }
    }

    pub fn len(&self) -> usize {
        self.to.saturating_sub(self.from)
    }

    pub fn is_empty(&self) -> bool {
        self.to <= self.from
    }

    /// Convert to a `text-size` range.
    pub fn text_range(&self) -> TextRange {
        text_range(self.from, self.to)
    }
}

/// A changed region of the document.
///
/// `from_a..to_a` is the replaced range in the old document,
/// `from_b..to_b` the range that replaced it in the new document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChangedRange {
    pub from_a: usize,
    pub to_a: usize,
    pub from_b: usize,
    pub to_b: usize,
}

impl ChangedRange {
    pub fn new(from_a: usize, to_a: usize, from_b: usize, to_b: usize) -> Self {
        Self {
            from_a,
            to_a,
            from_b,
            to_b,
        }
    }

    /// Describe replacing `from..to` of the old document with `inserted` bytes.
    pub fn replace(from: usize, to: usize, inserted: usize) -> Self {
        Self::new(from, to, from, from + inserted)
    }
}

/// Build a [`TextRange`] from byte offsets, saturating at `u32::MAX`.
pub fn text_range(from: usize, to: usize) -> TextRange {
    let clamp = |v: usize| TextSize::new(u32::try_from(v).unwrap_or(u32::MAX));
    TextRange::new(clamp(from), clamp(to.max(from)))
}
