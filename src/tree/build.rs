//! Building trees from postfix node buffers.
//!
//! The parser emits nodes as 4-value records `(type, start, end, size)` in
//! postfix order: children come before their parent, and `size` is the
//! number of buffer slots (4 per record) the node and its descendants cover.
//! Negative sizes mark special records:
//!
//! - [`record::REUSE`] - `type` indexes a reused tree
//! - [`record::CONTEXT_CHANGE`] - `type` is the new context hash
//! - [`record::LOOK_AHEAD`] - `type` is a new look-ahead position
//!
//! The builder walks the buffer backwards, packing small subtrees into
//! [`TreeBuffer`]s and balancing repetitions.

use std::sync::Arc;

use crate::error::{ParseError, Result};

use super::balance::balance_range;
use super::node_type::{NodeProp, NodeSet, NodeType, PropValue};
use super::tree::{Child, DEFAULT_BUFFER_LENGTH, Tree, TreeBuffer};

/// Sizes of special buffer records.
pub(crate) mod record {
    pub const REUSE: i64 = -1;
    pub const CONTEXT_CHANGE: i64 = -3;
    pub const LOOK_AHEAD: i64 = -4;
}

/// Nesting depth past which nodes are flattened to protect the call stack.
const CUTOFF_DEPTH: usize = 2500;

/// Look-ahead distances up to this are not recorded on nodes.
const LOOKAHEAD_MARGIN: usize = 25;

// ============================================================================
// CURSORS
// ============================================================================

/// Backwards cursor over a postfix node buffer.
///
/// `pos` is the index just past the current record; it reaches 0 when the
/// buffer is exhausted.
pub trait BufferCursor {
    fn pos(&self) -> usize;
    fn id(&self) -> i64;
    fn start(&self) -> usize;
    fn end(&self) -> usize;
    fn size(&self) -> i64;
    /// Move to the previous record.
    fn next(&mut self);
    /// An independent copy at the same position.
    fn fork(&self) -> Self
    where
        Self: Sized;
}

/// A [`BufferCursor`] over a flat slice.
#[derive(Debug, Clone, Copy)]
pub struct FlatBufferCursor<'a> {
    buffer: &'a [i64],
    index: usize,
}

impl<'a> FlatBufferCursor<'a> {
    pub fn new(buffer: &'a [i64], index: usize) -> Self {
        Self { buffer, index }
    }
}

impl BufferCursor for FlatBufferCursor<'_> {
    fn pos(&self) -> usize {
        self.index
    }

    fn id(&self) -> i64 {
        self.buffer[self.index - 4]
    }

    fn start(&self) -> usize {
        self.buffer[self.index - 3].max(0) as usize
    }

    fn end(&self) -> usize {
        self.buffer[self.index - 2].max(0) as usize
    }

    fn size(&self) -> i64 {
        self.buffer[self.index - 1]
    }

    fn next(&mut self) {
        self.index -= 4;
    }

    fn fork(&self) -> Self {
        *self
    }
}

// ============================================================================
// BUILD DATA
// ============================================================================

/// Inputs for [`Tree::build`].
#[derive(Clone)]
pub struct BuildData<'a> {
    pub node_set: &'a NodeSet,
    /// Type of the root node.
    pub top_id: u16,
    /// Largest text length stored in a single [`TreeBuffer`].
    pub max_buffer_length: usize,
    /// Trees referred to by [`record::REUSE`] records.
    pub reused: &'a [Arc<Tree>],
    /// Document offset the buffer's positions are measured against.
    pub start: usize,
    /// Records before this buffer index are not part of this tree.
    pub buffer_start: usize,
    /// Length of the root; defaults to the end of its last child.
    pub length: Option<usize>,
    /// Type ids at or above this are anonymous repetition nodes.
    pub min_repeat_type: Option<u16>,
}

impl<'a> BuildData<'a> {
    pub fn new(node_set: &'a NodeSet, top_id: u16) -> Self {
        Self {
            node_set,
            top_id,
            max_buffer_length: DEFAULT_BUFFER_LENGTH,
            reused: &[],
            start: 0,
            buffer_start: 0,
            length: None,
            min_repeat_type: None,
        }
    }
}

impl Tree {
    /// Build a tree from a flat postfix buffer.
    ///
    /// Malformed buffers (a length that is not a multiple of 4, sizes that
    /// reach past the buffer, inverted ranges, children outside their parent)
    /// are rejected with [`ParseError::InvalidRecord`].
    pub fn build(buffer: &[i64], data: BuildData<'_>) -> Result<Tree> {
        validate_records(buffer, data.buffer_start)?;
        Self::build_from_cursor(FlatBufferCursor::new(buffer, buffer.len()), data)
    }

    /// Build a tree by reading records from `cursor`.
    pub fn build_from_cursor<C: BufferCursor>(cursor: C, data: BuildData<'_>) -> Result<Tree> {
        let types = data.node_set.types();
        let top = types
            .get(usize::from(data.top_id))
            .cloned()
            .ok_or(ParseError::InvalidRecord(i64::from(data.top_id)))?;
        let mut builder = Builder {
            cursor,
            types,
            node_set: data.node_set,
            max_buffer_length: data.max_buffer_length,
            reused: data.reused,
            min_repeat_type: data
                .min_repeat_type
                .map_or(types.len() as i64, i64::from),
            context_hash: 0,
            look_ahead: 0,
        };
        let mut children = Vec::new();
        let mut positions = Vec::new();
        while builder.cursor.pos() > data.buffer_start {
            builder.take_node(
                data.start,
                data.buffer_start,
                &mut children,
                &mut positions,
                -1,
                0,
            )?;
        }
        children.reverse();
        positions.reverse();
        let length = data.length.unwrap_or_else(|| match children.first() {
            Some(first) => positions[0] as usize + first.len(),
            None => 0,
        });
        tracing::trace!(nodes = children.len(), length, "built tree");
        Ok(Tree::new(top, children, positions, length, Vec::new()))
    }
}

/// Check the record structure of a flat buffer before building from it.
fn validate_records(buffer: &[i64], buffer_start: usize) -> Result<()> {
    if buffer.len() % 4 != 0 || buffer_start > buffer.len() {
        return Err(ParseError::InvalidRecord(buffer.len() as i64));
    }
    // Enclosing nodes as (index of their first record, start, end).
    let mut parents: Vec<(usize, i64, i64)> = Vec::new();
    let mut pos = buffer.len();
    while pos > buffer_start {
        while parents.last().is_some_and(|&(first, _, _)| pos <= first) {
            parents.pop();
        }
        let (start, end, size) = (buffer[pos - 3], buffer[pos - 2], buffer[pos - 1]);
        // Special records are checked by the builder.
        if size < 0 {
            pos -= 4;
            continue;
        }
        let inside = parents
            .last()
            .is_none_or(|&(_, from, to)| from <= start && end <= to);
        if size < 4
            || size % 4 != 0
            || size as usize > pos - buffer_start
            || start < 0
            || start > end
            || !inside
        {
            return Err(ParseError::InvalidRecord(size));
        }
        parents.push((pos - size as usize, start, end));
        pos -= 4;
    }
    Ok(())
}

// ============================================================================
// BUILDER
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
struct BufferSize {
    size: usize,
    start: usize,
    skip: usize,
}

struct Builder<'a, C> {
    cursor: C,
    types: &'a [NodeType],
    node_set: &'a NodeSet,
    max_buffer_length: usize,
    reused: &'a [Arc<Tree>],
    min_repeat_type: i64,
    context_hash: u32,
    look_ahead: usize,
}

impl<C: BufferCursor> Builder<'_, C> {
    fn node_type(&self, id: i64) -> Result<NodeType> {
        usize::try_from(id)
            .ok()
            .and_then(|id| self.types.get(id))
            .cloned()
            .ok_or(ParseError::InvalidRecord(id))
    }

    fn take_node(
        &mut self,
        parent_start: usize,
        min_pos: usize,
        children: &mut Vec<Child>,
        positions: &mut Vec<u32>,
        in_repeat: i64,
        depth: usize,
    ) -> Result<()> {
        let id = self.cursor.id();
        let start = self.cursor.start();
        let end = self.cursor.end();
        let size = self.cursor.size();
        let look_ahead_at_start = self.look_ahead;
        let context_at_start = self.context_hash;

        if size < 0 {
            self.cursor.next();
            match size {
                record::REUSE => {
                    let node = usize::try_from(id)
                        .ok()
                        .and_then(|i| self.reused.get(i))
                        .ok_or(ParseError::InvalidRecord(size))?;
                    children.push(Child::Tree(node.clone()));
                    positions.push(start.saturating_sub(parent_start) as u32);
                }
                record::CONTEXT_CHANGE => self.context_hash = id as u32,
                record::LOOK_AHEAD => self.look_ahead = id.max(0) as usize,
                _ => return Err(ParseError::InvalidRecord(size)),
            }
            return Ok(());
        }

        if size < 4 || size as usize > self.cursor.pos() - min_pos || end < start {
            return Err(ParseError::InvalidRecord(size));
        }
        let ty = self.node_type(id)?;
        let mut start_pos = start.saturating_sub(parent_start);
        let buffer = if end - start <= self.max_buffer_length {
            self.find_buffer_size(self.cursor.pos() - min_pos, in_repeat)
        } else {
            None
        };

        let node = if let Some(buffer) = buffer {
            let mut data = vec![0u16; buffer.size - buffer.skip];
            let end_pos = self.cursor.pos() - buffer.size;
            let mut index = data.len();
            while self.cursor.pos() > end_pos {
                index = self.copy_to_buffer(buffer.start, &mut data, index);
            }
            start_pos = buffer.start.saturating_sub(parent_start);
            Child::Buffer(Arc::new(TreeBuffer::new(
                data,
                end - buffer.start,
                self.node_set.clone(),
            )))
        } else {
            let end_pos = self.cursor.pos() - size as usize;
            self.cursor.next();
            let mut local_children = Vec::new();
            let mut local_positions = Vec::new();
            let local_in_repeat = if id >= self.min_repeat_type { id } else { -1 };
            let mut last_group = 0;
            let mut last_end = end;
            while self.cursor.pos() > end_pos {
                if local_in_repeat >= 0
                    && self.cursor.id() == local_in_repeat
                    && self.cursor.size() >= 0
                {
                    if self.cursor.end() + self.max_buffer_length <= last_end {
                        let group_end = self.cursor.end();
                        self.make_repeat_leaf(
                            &mut local_children,
                            &mut local_positions,
                            start,
                            last_group,
                            group_end,
                            last_end,
                            &ty,
                            look_ahead_at_start,
                            context_at_start,
                        );
                        last_group = local_children.len();
                        last_end = group_end;
                    }
                    self.cursor.next();
                } else if depth > CUTOFF_DEPTH {
                    self.take_flat_node(start, end_pos, &mut local_children, &mut local_positions)?;
                } else {
                    self.take_node(
                        start,
                        end_pos,
                        &mut local_children,
                        &mut local_positions,
                        local_in_repeat,
                        depth + 1,
                    )?;
                }
            }
            if local_in_repeat >= 0 && last_group > 0 && last_group < local_children.len() {
                self.make_repeat_leaf(
                    &mut local_children,
                    &mut local_positions,
                    start,
                    last_group,
                    start,
                    last_end,
                    &ty,
                    look_ahead_at_start,
                    context_at_start,
                );
            }
            local_children.reverse();
            local_positions.reverse();

            if local_in_repeat >= 0 && last_group > 0 {
                let make = make_balanced(ty.clone(), context_at_start);
                Child::Tree(balance_range(
                    &ty,
                    &local_children,
                    &local_positions,
                    0,
                    local_children.len(),
                    0,
                    end - start,
                    Some(&make),
                    &make,
                ))
            } else {
                Child::Tree(make_tree(
                    ty,
                    local_children,
                    local_positions,
                    end - start,
                    look_ahead_at_start.saturating_sub(end),
                    context_at_start,
                ))
            }
        };

        children.push(node);
        positions.push(start_pos as u32);
        Ok(())
    }

    /// Flatten the nodes directly at the cursor into a single buffer without
    /// recursing.
    fn take_flat_node(
        &mut self,
        parent_start: usize,
        min_pos: usize,
        children: &mut Vec<Child>,
        positions: &mut Vec<u32>,
    ) -> Result<()> {
        let mut nodes: Vec<(i64, usize, usize)> = Vec::new();
        let mut stop_at = None;
        while self.cursor.pos() > min_pos {
            let size = self.cursor.size();
            if size > 4 {
                self.cursor.next();
                continue;
            }
            if size < 0 {
                if nodes.is_empty() {
                    return self.take_node(parent_start, min_pos, children, positions, -1, 0);
                }
                break;
            }
            let (start, end) = (self.cursor.start(), self.cursor.end());
            if stop_at.is_some_and(|stop| start < stop) {
                break;
            }
            if stop_at.is_none() {
                stop_at = Some(end.saturating_sub(self.max_buffer_length));
            }
            nodes.push((self.cursor.id(), start, end));
            self.cursor.next();
        }
        let Some(&(_, start, _)) = nodes.last() else {
            return Ok(());
        };
        let mut buffer = Vec::with_capacity(nodes.len() * 4);
        for &(id, from, to) in nodes.iter().rev() {
            let index = buffer.len() as u16;
            buffer.extend([id as u16, (from - start) as u16, (to - start) as u16, index + 4]);
        }
        children.push(Child::Buffer(Arc::new(TreeBuffer::new(
            buffer,
            nodes[0].2 - start,
            self.node_set.clone(),
        ))));
        positions.push(start.saturating_sub(parent_start) as u32);
        Ok(())
    }

    /// Wrap `children[i..]` into a repetition node spanning `from..to`.
    #[allow(clippy::too_many_arguments)]
    fn make_repeat_leaf(
        &self,
        children: &mut Vec<Child>,
        positions: &mut Vec<u32>,
        base: usize,
        i: usize,
        from: usize,
        to: usize,
        ty: &NodeType,
        look_ahead: usize,
        context_hash: u32,
    ) {
        let mut local_children = Vec::new();
        let mut local_positions = Vec::new();
        while children.len() > i {
            if let (Some(child), Some(pos)) = (children.pop(), positions.pop()) {
                local_children.push(child);
                local_positions.push((pos as usize + base - from) as u32);
            }
        }
        children.push(Child::Tree(make_tree(
            ty.clone(),
            local_children,
            local_positions,
            to - from,
            look_ahead.saturating_sub(to),
            context_hash,
        )));
        positions.push((from - base) as u32);
    }

    /// Scan ahead to see how many of the upcoming records form a run of
    /// small nodes that can be packed into one buffer.
    fn find_buffer_size(&self, max_size: usize, in_repeat: i64) -> Option<BufferSize> {
        let mut fork = self.cursor.fork();
        let (mut size, mut start, mut skip) = (0usize, 0usize, 0usize);
        let min_start = fork.end().saturating_sub(self.max_buffer_length);
        let mut result = BufferSize::default();
        let min_pos = fork.pos() - max_size;
        'scan: while fork.pos() > min_pos {
            let node_size = fork.size();
            if fork.id() == in_repeat && node_size >= 0 {
                // Repetition nodes of the enclosing repeat are dropped from
                // the buffer; remember where the last complete run ended.
                result = BufferSize { size, start, skip };
                skip += 4;
                size += 4;
                fork.next();
                continue;
            }
            if node_size < 0 {
                break;
            }
            let start_pos = fork.pos() as i64 - node_size;
            if start_pos < min_pos as i64 || fork.start() < min_start {
                break;
            }
            let start_pos = start_pos as usize;
            let mut local_skipped = if fork.id() >= self.min_repeat_type { 4 } else { 0 };
            let node_start = fork.start();
            fork.next();
            while fork.pos() > start_pos {
                let size = fork.size();
                if size < 0 {
                    if size == record::CONTEXT_CHANGE {
                        local_skipped += 4;
                    } else {
                        break 'scan;
                    }
                } else if fork.id() >= self.min_repeat_type {
                    local_skipped += 4;
                }
                fork.next();
            }
            start = node_start;
            size += node_size as usize;
            skip += local_skipped;
        }
        if in_repeat < 0 || size == max_size {
            result = BufferSize { size, start, skip };
        }
        (result.size > 4).then_some(result)
    }

    /// Copy the record at the cursor, and its children, into `buffer` ending
    /// at `index`. Returns the new start index.
    fn copy_to_buffer(&mut self, buffer_start: usize, buffer: &mut [u16], index: usize) -> usize {
        let id = self.cursor.id();
        let start = self.cursor.start();
        let end = self.cursor.end();
        let size = self.cursor.size();
        self.cursor.next();
        let mut index = index;
        if size >= 0 && id < self.min_repeat_type {
            let start_index = index;
            if size > 4 {
                let end_pos = self.cursor.pos() - (size as usize - 4);
                while self.cursor.pos() > end_pos {
                    index = self.copy_to_buffer(buffer_start, buffer, index);
                }
            }
            index -= 4;
            buffer[index] = id as u16;
            buffer[index + 1] = (start - buffer_start) as u16;
            buffer[index + 2] = (end - buffer_start) as u16;
            buffer[index + 3] = start_index as u16;
        } else if size == record::CONTEXT_CHANGE {
            self.context_hash = id as u32;
        } else if size == record::LOOK_AHEAD {
            self.look_ahead = id.max(0) as usize;
        }
        index
    }
}

fn make_tree(
    ty: NodeType,
    children: Vec<Child>,
    positions: Vec<u32>,
    length: usize,
    look_ahead: usize,
    context_hash: u32,
) -> Arc<Tree> {
    let mut props = Vec::new();
    if context_hash != 0 {
        props.push((NodeProp::ContextHash, PropValue::Number(context_hash)));
    }
    if look_ahead > LOOKAHEAD_MARGIN {
        props.push((NodeProp::LookAhead, PropValue::Number(look_ahead as u32)));
    }
    Arc::new(Tree::new(ty, children, positions, length, props))
}

/// Node constructor for balanced repetitions. A single child of the same
/// type and length is returned as-is; otherwise the look-ahead of the last
/// child is carried over to the new node.
fn make_balanced(
    ty: NodeType,
    context_hash: u32,
) -> impl Fn(Vec<Child>, Vec<u32>, usize) -> Arc<Tree> {
    move |children, positions, length| {
        let mut look_ahead = 0;
        if let Some(Child::Tree(last)) = children.last() {
            let last_i = children.len() - 1;
            if last_i == 0 && last.node_type() == &ty && last.len() == length {
                return last.clone();
            }
            if let Some(prop) = last.prop_number(NodeProp::LookAhead) {
                look_ahead = positions[last_i] as usize + last.len() + prop as usize;
            }
        }
        make_tree(ty.clone(), children, positions, length, look_ahead, context_hash)
    }
}
