//! `Tree` and `TreeBuffer`, the two kinds of stored nodes.

use std::fmt;
use std::sync::Arc;

use crate::base::{TextRange, text_range};

use super::balance::{BRANCH_FACTOR, balance_range};
use super::cursor::TreeCursor;
use super::node::{IterMode, Side, SyntaxNode, TreeNode, check_side, resolve_node};
use super::node_type::{NodeProp, NodeSet, NodeType, PropValue};

/// Default maximum length of a `TreeBuffer`, in bytes of source text.
pub const DEFAULT_BUFFER_LENGTH: usize = 1024;

// ============================================================================
// CHILD
// ============================================================================

/// A child of a [`Tree`]: either a tree node or a flat buffer of nodes.
#[derive(Clone)]
pub enum Child {
    Tree(Arc<Tree>),
    Buffer(Arc<TreeBuffer>),
}

impl Child {
    /// Length of the child in bytes.
    pub fn len(&self) -> usize {
        match self {
            Self::Tree(tree) => tree.len(),
            Self::Buffer(buffer) => buffer.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The tree, if this child is one.
    pub fn as_tree(&self) -> Option<&Arc<Tree>> {
        match self {
            Self::Tree(tree) => Some(tree),
            Self::Buffer(_) => None,
        }
    }

    /// Type of the child. Buffers report [`NodeType::none`].
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Tree(tree) => tree.node_type().clone(),
            Self::Buffer(_) => NodeType::none(),
        }
    }
}

impl From<Arc<Tree>> for Child {
    fn from(tree: Arc<Tree>) -> Self {
        Self::Tree(tree)
    }
}

impl From<Tree> for Child {
    fn from(tree: Tree) -> Self {
        Self::Tree(Arc::new(tree))
    }
}

impl From<TreeBuffer> for Child {
    fn from(buffer: TreeBuffer) -> Self {
        Self::Buffer(Arc::new(buffer))
    }
}

impl fmt::Display for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(tree) => fmt::Display::fmt(tree, f),
            Self::Buffer(buffer) => fmt::Display::fmt(buffer, f),
        }
    }
}

impl fmt::Debug for Child {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(tree) => fmt::Debug::fmt(tree, f),
            Self::Buffer(buffer) => fmt::Debug::fmt(buffer, f),
        }
    }
}

// ============================================================================
// TREE
// ============================================================================

/// An immutable syntax tree node.
///
/// Child positions are relative to the start of this node.
pub struct Tree {
    node_type: NodeType,
    children: Vec<Child>,
    positions: Vec<u32>,
    length: u32,
    props: Option<Box<[(NodeProp, PropValue)]>>,
}

impl Tree {
    /// Construct a tree. `props` holds per-node props; others are ignored.
    pub fn new(
        node_type: NodeType,
        children: Vec<Child>,
        positions: Vec<u32>,
        length: usize,
        props: Vec<(NodeProp, PropValue)>,
    ) -> Self {
        debug_assert_eq!(children.len(), positions.len());
        let props: Vec<_> = props.into_iter().filter(|(prop, _)| prop.per_node()).collect();
        Self {
            node_type,
            children,
            positions,
            length: u32::try_from(length).unwrap_or(u32::MAX),
            props: if props.is_empty() {
                None
            } else {
                Some(props.into_boxed_slice())
            },
        }
    }

    /// The empty tree.
    pub fn empty() -> Arc<Tree> {
        Arc::new(Tree::new(NodeType::none(), Vec::new(), Vec::new(), 0, Vec::new()))
    }

    pub fn node_type(&self) -> &NodeType {
        &self.node_type
    }

    pub fn children(&self) -> &[Child] {
        &self.children
    }

    /// Child start offsets, relative to this node.
    pub fn positions(&self) -> &[u32] {
        &self.positions
    }

    /// Length of the tree in bytes.
    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Value of a prop. Per-node props are looked up on this tree, others on
    /// its type.
    pub fn prop(&self, prop: NodeProp) -> Option<&PropValue> {
        if prop.per_node() {
            self.props
                .as_deref()
                .and_then(|props| props.iter().find(|(p, _)| *p == prop))
                .map(|(_, value)| value)
        } else {
            self.node_type.prop(prop)
        }
    }

    /// Numeric value of a prop, if set.
    pub fn prop_number(&self, prop: NodeProp) -> Option<u32> {
        self.prop(prop).and_then(PropValue::as_number)
    }

    /// The per-node props of this tree.
    pub fn prop_values(&self) -> &[(NodeProp, PropValue)] {
        self.props.as_deref().unwrap_or(&[])
    }

    /// A syntax node view of the root of this tree.
    pub fn top_node(self: &Arc<Self>) -> SyntaxNode {
        SyntaxNode::Tree(TreeNode::root(self.clone(), 0))
    }

    /// A cursor positioned at the root.
    pub fn cursor(self: &Arc<Self>, mode: IterMode) -> TreeCursor {
        TreeCursor::new(self.top_node(), mode)
    }

    /// A cursor pointing at the innermost node covering `pos`.
    pub fn cursor_at(self: &Arc<Self>, pos: usize, side: i8) -> TreeCursor {
        let mut cursor = self.cursor(IterMode::NONE);
        cursor.move_to(pos, side);
        cursor
    }

    /// The innermost node covering `pos`. With `side` < 0 the node must end
    /// at or after `pos`, with `side` > 0 it must start at or before it.
    pub fn resolve(self: &Arc<Self>, pos: usize, side: i8) -> SyntaxNode {
        resolve_node(self.top_node(), pos, side)
    }

    /// Iterate over the tree in pre-order, calling `enter` for every
    /// non-anonymous node (returning `false` skips its children) and `leave`
    /// after its children have been visited.
    pub fn iterate<E, L>(self: &Arc<Self>, enter: E, leave: L)
    where
        E: FnMut(&TreeCursor) -> bool,
        L: FnMut(&TreeCursor),
    {
        self.iterate_range(0, self.len(), IterMode::NONE, enter, leave)
    }

    /// [`iterate`](Self::iterate), restricted to nodes overlapping
    /// `from..=to`.
    pub fn iterate_range<E, L>(
        self: &Arc<Self>,
        from: usize,
        to: usize,
        mode: IterMode,
        mut enter: E,
        mut leave: L,
    ) where
        E: FnMut(&TreeCursor) -> bool,
        L: FnMut(&TreeCursor),
    {
        let anon = mode.contains(IterMode::INCLUDE_ANONYMOUS);
        let mut cursor = self.cursor(mode | IterMode::INCLUDE_ANONYMOUS);
        loop {
            let mut entered = false;
            if cursor.from() <= to
                && cursor.to() >= from
                && ((!anon && cursor.node_type().is_anonymous()) || enter(&cursor))
            {
                if cursor.first_child() {
                    continue;
                }
                entered = true;
            }
            loop {
                if entered && (anon || !cursor.node_type().is_anonymous()) {
                    leave(&cursor);
                }
                if cursor.next_sibling() {
                    break;
                }
                if !cursor.parent() {
                    return;
                }
                entered = true;
            }
        }
    }

    /// Balance the direct children of this tree into a tree of anonymous
    /// nodes with a bounded branching factor.
    pub fn balance(self: &Arc<Self>) -> Arc<Tree> {
        if self.children.len() <= BRANCH_FACTOR {
            return self.clone();
        }
        let top_type = self.node_type.clone();
        let props = self.prop_values().to_vec();
        let mk_top = move |children, positions, length| {
            Arc::new(Tree::new(top_type.clone(), children, positions, length, props.clone()))
        };
        let mk_tree = |children, positions, length| {
            Arc::new(Tree::new(NodeType::none(), children, positions, length, Vec::new()))
        };
        balance_range(
            &NodeType::none(),
            &self.children,
            &self.positions,
            0,
            self.children.len(),
            0,
            self.len(),
            Some(&mk_top),
            &mk_tree,
        )
    }

    /// Text range covered by this tree when it starts at `offset`.
    pub fn text_range(&self, offset: usize) -> TextRange {
        text_range(offset, offset + self.len())
    }
}

impl fmt::Display for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut children = String::new();
        for child in &self.children {
            let text = child.to_string();
            if !text.is_empty() {
                if !children.is_empty() {
                    children.push(',');
                }
                children.push_str(&text);
            }
        }
        if self.node_type.name().is_empty() {
            return f.write_str(&children);
        }
        write_type_name(f, &self.node_type)?;
        if !children.is_empty() {
            write!(f, "({children})")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Tree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Tree({}, len={}, {self})", self.node_type.name(), self.length)
    }
}

/// Write a type name, quoting names with non-word characters (except for
/// the error type).
fn write_type_name(f: &mut fmt::Formatter<'_>, ty: &NodeType) -> fmt::Result {
    let name = ty.name();
    let plain = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
    if plain || ty.is_error() {
        f.write_str(name)
    } else {
        write!(f, "{name:?}")
    }
}

// ============================================================================
// TREE BUFFER
// ============================================================================

/// A flat encoding of a subtree.
///
/// Every node is a record of four `u16` values: type id, start, end (both
/// relative to the buffer start), and the index one past the node's last
/// descendant. Records are in pre-order, so a node's children directly
/// follow it and `endIndex` lets a reader skip over a whole subtree.
pub struct TreeBuffer {
    buffer: Box<[u16]>,
    length: u32,
    set: NodeSet,
}

impl TreeBuffer {
    pub fn new(buffer: Vec<u16>, length: usize, set: NodeSet) -> Self {
        Self {
            buffer: buffer.into_boxed_slice(),
            length: u32::try_from(length).unwrap_or(u32::MAX),
            set,
        }
    }

    pub fn buffer(&self) -> &[u16] {
        &self.buffer
    }

    pub fn len(&self) -> usize {
        self.length as usize
    }

    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    pub fn node_set(&self) -> &NodeSet {
        &self.set
    }

    /// Type of the record at `index`.
    pub fn node_type_at(&self, index: usize) -> Option<&NodeType> {
        self.buffer.get(index).and_then(|&id| self.set.get(id))
    }

    /// Find the first (`dir` > 0) or last (`dir` < 0) sibling record between
    /// `start_index` and `end_index` whose span matches `side` relative to
    /// `pos`.
    pub fn find_child(
        &self,
        start_index: usize,
        end_index: usize,
        dir: isize,
        pos: i64,
        side: Side,
    ) -> Option<usize> {
        let buffer = &self.buffer;
        let mut pick = None;
        let mut i = start_index;
        while i != end_index && i + 3 < buffer.len() {
            if check_side(side, pos, i64::from(buffer[i + 1]), i64::from(buffer[i + 2])) {
                pick = Some(i);
                if dir > 0 {
                    break;
                }
            }
            i = usize::from(buffer[i + 3]);
        }
        pick
    }

    fn write_child(&self, index: usize, out: &mut String) {
        let buffer = &self.buffer;
        let end_index = usize::from(buffer[index + 3]);
        if let Some(ty) = self.set.get(buffer[index]) {
            let name = ty.name();
            let plain = name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if plain || ty.is_error() {
                out.push_str(name);
            } else {
                out.push_str(&format!("{name:?}"));
            }
        }
        let mut index = index + 4;
        if end_index == index {
            return;
        }
        out.push('(');
        let mut first = true;
        while index < end_index {
            if !first {
                out.push(',');
            }
            first = false;
            self.write_child(index, out);
            index = usize::from(buffer[index + 3]);
        }
        out.push(')');
    }
}

impl fmt::Display for TreeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        let mut index = 0;
        while index < self.buffer.len() {
            if index > 0 {
                out.push(',');
            }
            self.write_child(index, &mut out);
            index = usize::from(self.buffer[index + 3]);
        }
        f.write_str(&out)
    }
}

impl fmt::Debug for TreeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TreeBuffer(len={}, {self})", self.length)
    }
}
