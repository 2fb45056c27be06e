//! Stateful tree traversal.

use super::node::{IterMode, Side, SyntaxNode};
use super::node_type::NodeType;

/// A cursor that moves through a tree one node at a time.
///
/// Unless created with [`IterMode::INCLUDE_ANONYMOUS`], anonymous nodes are
/// looked through: their children appear as children of the nearest named
/// ancestor.
#[derive(Clone)]
pub struct TreeCursor {
    node: SyntaxNode,
    mode: IterMode,
}

impl TreeCursor {
    pub fn new(node: SyntaxNode, mode: IterMode) -> Self {
        Self { node, mode }
    }

    /// The node the cursor points at.
    pub fn node(&self) -> &SyntaxNode {
        &self.node
    }

    pub fn node_type(&self) -> &NodeType {
        self.node.node_type()
    }

    pub fn name(&self) -> &str {
        self.node.name()
    }

    pub fn from(&self) -> usize {
        self.node.from()
    }

    pub fn to(&self) -> usize {
        self.node.to()
    }

    fn set(&mut self, next: Option<SyntaxNode>) -> bool {
        match next {
            Some(node) => {
                self.node = node;
                true
            }
            None => false,
        }
    }

    fn enter_child(&mut self, dir: isize, pos: i64, side: Side) -> bool {
        let next = self.node.child(dir, pos, side, self.mode);
        self.set(next)
    }

    pub fn first_child(&mut self) -> bool {
        self.enter_child(1, 0, Side::DontCare)
    }

    pub fn last_child(&mut self) -> bool {
        self.enter_child(-1, 0, Side::DontCare)
    }

    /// Move to the first child that ends after `pos`.
    pub fn child_after(&mut self, pos: usize) -> bool {
        self.enter_child(1, pos as i64, Side::After)
    }

    /// Move to the last child that starts before `pos`.
    pub fn child_before(&mut self, pos: usize) -> bool {
        self.enter_child(-1, pos as i64, Side::Before)
    }

    /// Move into the child covering `pos` according to `side`.
    pub fn enter(&mut self, pos: usize, side: Side) -> bool {
        self.enter_child(1, pos as i64, side)
    }

    pub fn parent(&mut self) -> bool {
        let include_anon = self.mode.contains(IterMode::INCLUDE_ANONYMOUS);
        let next = match &self.node {
            SyntaxNode::Tree(node) => node.raw_parent().map(|parent| {
                SyntaxNode::Tree(if include_anon {
                    parent.clone()
                } else {
                    parent.next_significant_parent()
                })
            }),
            SyntaxNode::Buffer(node) => Some(node.parent_node(include_anon)),
        };
        self.set(next)
    }

    pub fn next_sibling(&mut self) -> bool {
        let next = self.node.sibling(1, self.mode);
        self.set(next)
    }

    pub fn prev_sibling(&mut self) -> bool {
        let next = self.node.sibling(-1, self.mode);
        self.set(next)
    }

    fn step(&mut self, dir: isize, enter: bool) -> bool {
        if enter && self.enter_child(dir, 0, Side::DontCare) {
            return true;
        }
        loop {
            let sibling = self.node.sibling(dir, self.mode);
            if self.set(sibling) {
                return true;
            }
            if !self.parent() {
                return false;
            }
        }
    }

    /// Move to the next node in pre-order. Returns `false` at the end.
    pub fn next(&mut self) -> bool {
        self.step(1, true)
    }

    /// Like [`next`](Self::next), optionally without entering children.
    pub fn next_with(&mut self, enter: bool) -> bool {
        self.step(1, enter)
    }

    /// Move to the previous node in pre-order.
    pub fn prev(&mut self) -> bool {
        self.step(-1, true)
    }

    /// Move to the innermost node covering `pos`.
    pub fn move_to(&mut self, pos: usize, side: i8) -> &mut Self {
        loop {
            let (from, to) = (self.from(), self.to());
            let outside = from == to
                || if side < 1 { from >= pos } else { from > pos }
                || if side > -1 { to <= pos } else { to < pos };
            if !outside || !self.parent() {
                break;
            }
        }
        while self.enter_child(1, pos as i64, Side::from_bias(side)) {}
        self
    }
}

impl std::fmt::Debug for TreeCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TreeCursor({:?})", self.node)
    }
}
