//! Syntax node views.
//!
//! Stored trees have no parent pointers. A [`SyntaxNode`] is a lightweight
//! view that pairs a stored node with its absolute position and the chain of
//! views it was reached through, so parents and siblings can be found.
//!
//! Views are reference counted with `Rc` and are cheap to clone, but are
//! confined to one thread. The trees they point into are `Send + Sync`.

use std::rc::Rc;
use std::sync::Arc;

use smol_str::SmolStr;

use crate::base::{TextRange, text_range};

use super::cursor::TreeCursor;
use super::node_type::NodeType;
use super::tree::{Child, Tree, TreeBuffer};

// ============================================================================
// SIDE AND MODE
// ============================================================================

/// Where a node must lie relative to a position to match a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Ends before the position.
    Before,
    /// Starts before the position, ends at or after it.
    AtOrBefore,
    /// Starts before and ends after the position.
    Around,
    /// Starts at or before the position, ends after it.
    AtOrAfter,
    /// Starts after the position.
    After,
    /// Any node.
    DontCare,
}

impl Side {
    /// Map a resolve bias (-1, 0, 1) to a side.
    pub fn from_bias(bias: i8) -> Self {
        match bias {
            i8::MIN..=-1 => Self::AtOrBefore,
            0 => Self::Around,
            1..=i8::MAX => Self::AtOrAfter,
        }
    }
}

pub(crate) fn check_side(side: Side, pos: i64, from: i64, to: i64) -> bool {
    match side {
        Side::Before => from < pos,
        Side::AtOrBefore => to >= pos && from < pos,
        Side::Around => from < pos && to > pos,
        Side::AtOrAfter => from <= pos && to > pos,
        Side::After => to > pos,
        Side::DontCare => true,
    }
}

/// Flags controlling which nodes navigation visits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct IterMode(u8);

impl IterMode {
    pub const NONE: IterMode = IterMode(0);
    /// Don't enter [`TreeBuffer`] contents.
    pub const EXCLUDE_BUFFERS: IterMode = IterMode(1);
    /// Visit anonymous nodes instead of looking through them.
    pub const INCLUDE_ANONYMOUS: IterMode = IterMode(2);

    pub fn contains(self, other: IterMode) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for IterMode {
    type Output = IterMode;

    fn bitor(self, rhs: Self) -> Self {
        IterMode(self.0 | rhs.0)
    }
}

// ============================================================================
// TREE NODES
// ============================================================================

/// A view of a [`Tree`] node.
pub struct TreeNode {
    tree: Arc<Tree>,
    from: usize,
    /// Index in the parent's children, `None` for a root.
    index: Option<usize>,
    parent: Option<Rc<TreeNode>>,
}

impl TreeNode {
    pub(crate) fn root(tree: Arc<Tree>, from: usize) -> Rc<TreeNode> {
        Rc::new(TreeNode {
            tree,
            from,
            index: None,
            parent: None,
        })
    }

    pub fn tree(&self) -> &Arc<Tree> {
        &self.tree
    }

    pub fn from(&self) -> usize {
        self.from
    }

    pub fn to(&self) -> usize {
        self.from + self.tree.len()
    }

    pub(crate) fn index(&self) -> Option<usize> {
        self.index
    }

    pub(crate) fn raw_parent(&self) -> Option<&Rc<TreeNode>> {
        self.parent.as_ref()
    }

    /// This node, or the closest ancestor that is not anonymous.
    pub(crate) fn next_significant_parent(self: &Rc<Self>) -> Rc<TreeNode> {
        let mut node = self.clone();
        while node.tree.node_type().is_anonymous() {
            match node.parent.clone() {
                Some(parent) => node = parent,
                None => break,
            }
        }
        node
    }

    /// Scan children from index `i` in direction `dir` for one matching
    /// `side` relative to `pos`. Unless `mode` includes anonymous nodes,
    /// anonymous children are looked through, and the scan continues in the
    /// parent when an anonymous node runs out of children.
    pub(crate) fn next_child(
        self: &Rc<Self>,
        mut i: isize,
        dir: isize,
        pos: i64,
        side: Side,
        mode: IterMode,
    ) -> Option<SyntaxNode> {
        let include_anon = mode.contains(IterMode::INCLUDE_ANONYMOUS);
        let mut parent = self.clone();
        loop {
            let tree = parent.tree.clone();
            let end = if dir > 0 {
                tree.children().len() as isize
            } else {
                -1
            };
            while i != end {
                let index = i as usize;
                let next = &tree.children()[index];
                let start = tree.positions()[index] as usize + parent.from;
                if check_side(side, pos, start as i64, (start + next.len()) as i64) {
                    match next {
                        Child::Buffer(buffer) => {
                            if !mode.contains(IterMode::EXCLUDE_BUFFERS) {
                                let found = buffer.find_child(
                                    0,
                                    buffer.buffer().len(),
                                    dir,
                                    pos - start as i64,
                                    side,
                                );
                                if let Some(found) = found {
                                    let context = Rc::new(BufferContext {
                                        parent: parent.clone(),
                                        buffer: buffer.clone(),
                                        index,
                                        start,
                                    });
                                    return Some(SyntaxNode::Buffer(Rc::new(BufferNode {
                                        context,
                                        parent: None,
                                        index: found,
                                    })));
                                }
                            }
                        }
                        Child::Tree(child) => {
                            let anonymous = child.node_type().is_anonymous();
                            if include_anon || !anonymous || has_child(child) {
                                let inner = Rc::new(TreeNode {
                                    tree: child.clone(),
                                    from: start,
                                    index: Some(index),
                                    parent: Some(parent.clone()),
                                });
                                if include_anon || !anonymous {
                                    return Some(SyntaxNode::Tree(inner));
                                }
                                let first = if dir < 0 {
                                    child.children().len() as isize - 1
                                } else {
                                    0
                                };
                                return inner.next_child(first, dir, pos, side, mode);
                            }
                        }
                    }
                }
                i += dir;
            }
            if include_anon || !parent.tree.node_type().is_anonymous() {
                return None;
            }
            let up = parent.parent.clone()?;
            i = match parent.index {
                Some(index) => index as isize + dir,
                None if dir < 0 => -1,
                None => up.tree.children().len() as isize,
            };
            parent = up;
        }
    }
}

fn has_child(tree: &Tree) -> bool {
    tree.children().iter().any(|child| match child {
        Child::Buffer(_) => true,
        Child::Tree(tree) => !tree.node_type().is_anonymous() || has_child(tree),
    })
}

// ============================================================================
// BUFFER NODES
// ============================================================================

pub(crate) struct BufferContext {
    parent: Rc<TreeNode>,
    buffer: Arc<TreeBuffer>,
    /// Index of the buffer in its parent's children.
    index: usize,
    start: usize,
}

/// A view of a node stored inside a [`TreeBuffer`].
pub struct BufferNode {
    context: Rc<BufferContext>,
    parent: Option<Rc<BufferNode>>,
    index: usize,
}

impl BufferNode {
    fn record(&self, offset: usize) -> u16 {
        self.context.buffer.buffer()[self.index + offset]
    }

    pub fn node_type(&self) -> &NodeType {
        let id = self.record(0);
        self.context
            .buffer
            .node_set()
            .get(id)
            .unwrap_or_else(|| &self.context.buffer.node_set().types()[0])
    }

    pub fn from(&self) -> usize {
        self.context.start + usize::from(self.record(1))
    }

    pub fn to(&self) -> usize {
        self.context.start + usize::from(self.record(2))
    }

    fn with_index(self: &Rc<Self>, parent: Option<Rc<BufferNode>>, index: usize) -> SyntaxNode {
        SyntaxNode::Buffer(Rc::new(BufferNode {
            context: self.context.clone(),
            parent,
            index,
        }))
    }

    pub(crate) fn child(self: &Rc<Self>, dir: isize, pos: i64, side: Side) -> Option<SyntaxNode> {
        let buffer = &self.context.buffer;
        let found = buffer.find_child(
            self.index + 4,
            usize::from(self.record(3)),
            dir,
            pos - self.context.start as i64,
            side,
        )?;
        Some(self.with_index(Some(self.clone()), found))
    }

    pub(crate) fn parent_node(&self, include_anon: bool) -> SyntaxNode {
        match &self.parent {
            Some(parent) => SyntaxNode::Buffer(parent.clone()),
            None if include_anon => SyntaxNode::Tree(self.context.parent.clone()),
            None => SyntaxNode::Tree(self.context.parent.next_significant_parent()),
        }
    }

    fn external_sibling(&self, dir: isize, mode: IterMode) -> Option<SyntaxNode> {
        if self.parent.is_some() {
            return None;
        }
        self.context.parent.next_child(
            self.context.index as isize + dir,
            dir,
            0,
            Side::DontCare,
            mode,
        )
    }

    pub(crate) fn next_sibling_with(self: &Rc<Self>, mode: IterMode) -> Option<SyntaxNode> {
        let buffer = self.context.buffer.buffer();
        let after = usize::from(self.record(3));
        let limit = match &self.parent {
            Some(parent) => usize::from(buffer[parent.index + 3]),
            None => buffer.len(),
        };
        if after < limit {
            Some(self.with_index(self.parent.clone(), after))
        } else {
            self.external_sibling(1, mode)
        }
    }

    pub(crate) fn prev_sibling_with(self: &Rc<Self>, mode: IterMode) -> Option<SyntaxNode> {
        let parent_start = self.parent.as_ref().map_or(0, |parent| parent.index + 4);
        if self.index == parent_start {
            return self.external_sibling(-1, mode);
        }
        let found = self.context.buffer.find_child(
            parent_start,
            self.index,
            -1,
            0,
            Side::DontCare,
        )?;
        Some(self.with_index(self.parent.clone(), found))
    }
}

// ============================================================================
// SYNTAX NODE
// ============================================================================

/// A node in a syntax tree, with access to its parent and siblings.
#[derive(Clone)]
pub enum SyntaxNode {
    Tree(Rc<TreeNode>),
    Buffer(Rc<BufferNode>),
}

impl SyntaxNode {
    pub fn node_type(&self) -> &NodeType {
        match self {
            Self::Tree(node) => node.tree.node_type(),
            Self::Buffer(node) => node.node_type(),
        }
    }

    pub fn name(&self) -> &str {
        self.node_type().name()
    }

    pub fn from(&self) -> usize {
        match self {
            Self::Tree(node) => node.from(),
            Self::Buffer(node) => node.from(),
        }
    }

    pub fn to(&self) -> usize {
        match self {
            Self::Tree(node) => node.to(),
            Self::Buffer(node) => node.to(),
        }
    }

    pub fn text_range(&self) -> TextRange {
        text_range(self.from(), self.to())
    }

    /// The stored tree, if this node isn't inside a buffer.
    pub fn tree(&self) -> Option<&Arc<Tree>> {
        match self {
            Self::Tree(node) => Some(&node.tree),
            Self::Buffer(_) => None,
        }
    }

    /// The closest non-anonymous ancestor.
    pub fn parent(&self) -> Option<SyntaxNode> {
        match self {
            Self::Tree(node) => node
                .parent
                .as_ref()
                .map(|parent| SyntaxNode::Tree(parent.next_significant_parent())),
            Self::Buffer(node) => Some(node.parent_node(false)),
        }
    }

    pub(crate) fn child(&self, dir: isize, pos: i64, side: Side, mode: IterMode) -> Option<SyntaxNode> {
        match self {
            Self::Tree(node) => {
                let first = if dir > 0 {
                    0
                } else {
                    node.tree.children().len() as isize - 1
                };
                node.next_child(first, dir, pos, side, mode)
            }
            Self::Buffer(node) => {
                if mode.contains(IterMode::EXCLUDE_BUFFERS) {
                    None
                } else {
                    node.child(dir, pos, side)
                }
            }
        }
    }

    pub fn first_child(&self) -> Option<SyntaxNode> {
        self.child(1, 0, Side::DontCare, IterMode::NONE)
    }

    pub fn last_child(&self) -> Option<SyntaxNode> {
        self.child(-1, 0, Side::DontCare, IterMode::NONE)
    }

    /// First child that ends after `pos`.
    pub fn child_after(&self, pos: usize) -> Option<SyntaxNode> {
        self.child(1, pos as i64, Side::After, IterMode::NONE)
    }

    /// Last child that starts before `pos`.
    pub fn child_before(&self, pos: usize) -> Option<SyntaxNode> {
        self.child(-1, pos as i64, Side::Before, IterMode::NONE)
    }

    /// Move into the child that covers `pos` according to `side`.
    pub fn enter(&self, pos: usize, side: Side, mode: IterMode) -> Option<SyntaxNode> {
        self.child(1, pos as i64, side, mode)
    }

    pub fn next_sibling(&self) -> Option<SyntaxNode> {
        self.sibling(1, IterMode::NONE)
    }

    pub fn prev_sibling(&self) -> Option<SyntaxNode> {
        self.sibling(-1, IterMode::NONE)
    }

    pub(crate) fn sibling(&self, dir: isize, mode: IterMode) -> Option<SyntaxNode> {
        match self {
            Self::Tree(node) => match (&node.parent, node.index) {
                (Some(parent), Some(index)) => {
                    parent.next_child(index as isize + dir, dir, 0, Side::DontCare, mode)
                }
                _ => None,
            },
            Self::Buffer(node) if dir > 0 => node.next_sibling_with(mode),
            Self::Buffer(node) => node.prev_sibling_with(mode),
        }
    }

    /// First direct child with the given type name or group.
    pub fn get_child(&self, name: &str) -> Option<SyntaxNode> {
        self.get_children(name).into_iter().next()
    }

    /// All direct children with the given type name or group.
    pub fn get_children(&self, name: &str) -> Vec<SyntaxNode> {
        let mut result = Vec::new();
        let mut next = self.first_child();
        while let Some(node) = next {
            if node.node_type().is(name) {
                result.push(node.clone());
            }
            next = node.next_sibling();
        }
        result
    }

    /// Source text of this node.
    pub fn text<'t>(&self, source: &'t str) -> &'t str {
        source.get(self.from()..self.to()).unwrap_or_default()
    }

    /// The innermost node around `pos`, starting the search at this node.
    pub fn resolve(&self, pos: usize, side: i8) -> SyntaxNode {
        resolve_node(self.clone(), pos, side)
    }

    pub fn cursor(&self, mode: IterMode) -> TreeCursor {
        TreeCursor::new(self.clone(), mode)
    }

    /// Whether two views refer to the same stored node.
    pub fn same(&self, other: &SyntaxNode) -> bool {
        match (self, other) {
            (Self::Tree(a), Self::Tree(b)) => Arc::ptr_eq(&a.tree, &b.tree) && a.from == b.from,
            (Self::Buffer(a), Self::Buffer(b)) => {
                Arc::ptr_eq(&a.context.buffer, &b.context.buffer)
                    && a.context.start == b.context.start
                    && a.index == b.index
            }
            _ => false,
        }
    }
}

impl std::fmt::Debug for SyntaxNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}..{}", self.name(), self.from(), self.to())
    }
}

/// Climb out of `node` until it covers `pos`, then descend as deep as
/// possible.
pub(crate) fn resolve_node(mut node: SyntaxNode, pos: usize, side: i8) -> SyntaxNode {
    loop {
        let (from, to) = (node.from(), node.to());
        let outside = from == to
            || if side < 1 { from >= pos } else { from > pos }
            || if side > -1 { to <= pos } else { to < pos };
        if !outside {
            break;
        }
        match node.parent() {
            Some(parent) => node = parent,
            None => return node,
        }
    }
    let side = Side::from_bias(side);
    while let Some(inner) = node.enter(pos, side, IterMode::NONE) {
        node = inner;
    }
    node
}

// ============================================================================
// NODE CACHE
// ============================================================================

/// Remembers the last resolved node per tree, so that nearby lookups can
/// start from there instead of from the root.
#[derive(Default)]
pub struct NodeCache {
    last: Option<(Arc<Tree>, SyntaxNode)>,
}

impl NodeCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `pos` in `tree`, starting from the cached node when it
    /// belongs to the same tree.
    pub fn resolve(&mut self, tree: &Arc<Tree>, pos: usize, side: i8) -> SyntaxNode {
        let start = match &self.last {
            Some((cached, node)) if Arc::ptr_eq(cached, tree) => node.clone(),
            _ => tree.top_node(),
        };
        let node = resolve_node(start, pos, side);
        self.last = Some((tree.clone(), node.clone()));
        node
    }

    /// Name of the cached node, if any.
    pub fn last_name(&self) -> Option<SmolStr> {
        self.last.as_ref().map(|(_, node)| SmolStr::new(node.name()))
    }

    pub fn clear(&mut self) {
        self.last = None;
    }
}
