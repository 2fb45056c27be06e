//! Parse stacks.
//!
//! A [`Stack`] is one path through the automaton: its state, the frames of
//! enclosing states, and a buffer of node records waiting to become a tree.
//! Ambiguity and error recovery work by splitting stacks. A split freezes
//! the shared part of the buffer into a [`SegmentArena`] so both halves keep
//! appending to their own tails; frozen segments are never modified again.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use tracing::warn;

use crate::tree::{BufferCursor, Tree};

use super::constants::action::{GOTO_FLAG, REDUCE_DEPTH_SHIFT, REDUCE_FLAG, REPEAT_FLAG, STAY_FLAG, VALUE_MASK};
use super::constants::state_flag::{ACCEPTING, SKIPPED};
use super::constants::{LOOKAHEAD_MARGIN, NO_STATE, parse_state, term};
use super::context::{ContextValue, StackContext};
use super::parse::ParseEnv;
use super::parser::LrParser;

const ERR: i64 = term::ERR as i64;

// ============================================================================
// SEGMENTS
// ============================================================================

/// Index of a frozen buffer segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct SegmentId(u32);

/// A frozen prefix of a stack's buffer, shared by the stacks split from it.
#[derive(Debug)]
pub(crate) struct Segment {
    pub buffer: Vec<i64>,
    /// Buffer position of the segment's first record.
    pub base: usize,
    pub parent: Option<SegmentId>,
}

/// Owner of all frozen segments of one parse.
#[derive(Debug, Default)]
pub(crate) struct SegmentArena {
    segments: Vec<Segment>,
}

impl SegmentArena {
    fn push(&mut self, segment: Segment) -> SegmentId {
        self.segments.push(segment);
        SegmentId((self.segments.len() - 1) as u32)
    }

    pub fn get(&self, id: SegmentId) -> &Segment {
        &self.segments[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

// ============================================================================
// STACK
// ============================================================================

/// A parse stack.
pub(crate) struct Stack {
    /// Frames as `(state, start, buffer position)` triples.
    pub stack: Vec<usize>,
    pub state: u32,
    /// End of the last reduced or shifted non-skipped token.
    pub reduce_pos: usize,
    pub pos: usize,
    pub score: i32,
    /// Node records `(term, start, end, size)` not yet frozen.
    pub buffer: Vec<i64>,
    /// Buffer position of `buffer[0]`.
    pub buffer_base: usize,
    pub cur_context: Option<StackContext>,
    pub look_ahead: usize,
    pub parent: Option<SegmentId>,
}

impl Stack {
    pub fn start(parser: &LrParser, state: u32, pos: usize) -> Self {
        let cur_context = parser
            .context()
            .map(|tracker| StackContext::new(Arc::clone(tracker), tracker.start()));
        Self {
            stack: Vec::new(),
            state,
            reduce_pos: pos,
            pos,
            score: 0,
            buffer: Vec::new(),
            buffer_base: 0,
            cur_context,
            look_ahead: 0,
            parent: None,
        }
    }

    pub fn context(&self) -> Option<&ContextValue> {
        self.cur_context.as_ref().map(|cx| &cx.context)
    }

    /// Total buffer length including frozen segments.
    pub fn buffer_len(&self) -> usize {
        self.buffer_base + self.buffer.len()
    }

    fn goto_or_stop(parser: &LrParser, state: u32, term: u16) -> u32 {
        parser.get_goto(state, term, true).unwrap_or_else(|| {
            warn!(state, term, "missing goto entry");
            NO_STATE
        })
    }

    pub fn push_state(&mut self, state: u32, start: usize) {
        let buffer_pos = self.buffer_len();
        self.stack.extend([self.state as usize, start, buffer_pos]);
        self.state = state;
    }

    // ========================================================================
    // SHIFT / REDUCE
    // ========================================================================

    pub fn reduce(&mut self, action: u32, env: &mut ParseEnv<'_>) {
        let parser = Arc::clone(&env.parser);
        let depth = (action >> REDUCE_DEPTH_SHIFT) as usize;
        let ty = (action & VALUE_MASK) as u16;

        let look_ahead_record = self.reduce_pos + LOOKAHEAD_MARGIN < self.pos;
        if look_ahead_record {
            self.set_look_ahead(self.pos);
        }
        let d_prec = parser.dynamic_precedence(ty);
        if d_prec != 0 {
            self.score += d_prec;
        }

        if depth == 0 {
            let goto = Self::goto_or_stop(&parser, self.state, ty);
            self.push_state(goto, self.reduce_pos);
            if ty < parser.min_repeat_term() {
                let size = if look_ahead_record { 8 } else { 4 };
                self.store_node(i64::from(ty), self.reduce_pos, self.reduce_pos, size, true, env);
            }
            self.reduce_context(ty, self.reduce_pos, env);
            return;
        }

        let stay = if action & STAY_FLAG != 0 { 6 } else { 0 };
        let base = self.stack.len().saturating_sub((depth - 1) * 3 + stay);
        let start = if base >= 2 { self.stack[base - 2] } else { env.start };
        let size = self.reduce_pos.saturating_sub(start);

        // Track repeated big reductions from the same start, which signal a
        // pathological left-associative parse.
        let anonymous = parser.node_set().get(ty).is_some_and(|t| t.is_anonymous());
        if size >= parser.tuning().min_big_reduction && !anonymous {
            if env.big.start == Some(start) {
                env.big.count += 1;
                env.big.size = size;
            } else if env.big.size < size {
                env.big.count = 1;
                env.big.start = Some(start);
                env.big.size = size;
            }
        }

        let buffer_base = if base >= 1 { self.stack[base - 1] } else { 0 };
        let count = self.buffer_len().saturating_sub(buffer_base);
        if ty < parser.min_repeat_term() || action & REPEAT_FLAG != 0 {
            let pos = if parser.state_flag(self.state, SKIPPED) {
                self.pos
            } else {
                self.reduce_pos
            };
            self.store_node(i64::from(ty), start, pos, count as i64 + 4, true, env);
        }
        if action & STAY_FLAG != 0 {
            self.state = self.stack.get(base).map_or(NO_STATE, |&s| s as u32);
        } else if base >= 3 {
            let base_state = self.stack[base - 3] as u32;
            self.state = Self::goto_or_stop(&parser, base_state, ty);
        } else {
            warn!(term = ty, depth, "reduction deeper than the stack");
            self.state = NO_STATE;
        }
        self.stack.truncate(base);
        self.reduce_context(ty, start, env);
    }

    /// Add a node record, sinking it below trailing skipped nodes when
    /// `must_sink` is set so those end up inside the parent.
    pub fn store_node(
        &mut self,
        term: i64,
        start: usize,
        end: usize,
        size: i64,
        must_sink: bool,
        env: &ParseEnv<'_>,
    ) {
        let (start_i, end_i) = (start as i64, end as i64);
        if term == ERR
            && self
                .stack
                .last()
                .is_none_or(|&top| top < self.buffer_len())
        {
            // Merge with a directly preceding error node
            let previous: Option<(i64, i64, i64)> = if self.buffer.is_empty() {
                self.parent.and_then(|id| {
                    let segment = &env.segments.get(id).buffer;
                    let top = segment.len();
                    (top >= 4).then(|| (segment[top - 4], segment[top - 2], segment[top - 1]))
                })
            } else {
                let top = self.buffer.len();
                (top >= 4).then(|| (self.buffer[top - 4], self.buffer[top - 2], self.buffer[top - 1]))
            };
            if let Some((prev_term, prev_end, prev_size)) = previous {
                if prev_term == ERR && prev_size > -1 {
                    if start == end {
                        return;
                    }
                    if prev_end >= start_i && !self.buffer.is_empty() {
                        let len = self.buffer.len();
                        self.buffer[len - 2] = end_i;
                        return;
                    }
                }
            }
        }

        if !must_sink || self.pos == end {
            self.buffer.extend([term, start_i, end_i, size]);
            return;
        }

        let mut index = self.buffer.len();
        if index > 0 && self.buffer[index - 4] != ERR {
            let mut must_move = false;
            let mut scan = index;
            while scan > 0 && self.buffer[scan - 2] > end_i {
                if self.buffer[scan - 1] >= 0 {
                    must_move = true;
                    break;
                }
                scan -= 4;
            }
            if must_move {
                let mut size = size;
                self.buffer.extend([0; 4]);
                while index > 0 && self.buffer[index - 2] > end_i {
                    self.buffer.copy_within(index - 4..index, index);
                    index -= 4;
                    if size > 4 {
                        size -= 4;
                    }
                }
                self.buffer[index..index + 4].copy_from_slice(&[term, start_i, end_i, size]);
                return;
            }
        }
        self.buffer.extend([term, start_i, end_i, size]);
    }

    pub fn shift(&mut self, action: u32, ty: u16, start: usize, end: usize, env: &mut ParseEnv<'_>) {
        let max_node = env.parser.max_node();
        if action & GOTO_FLAG != 0 {
            self.push_state(action & VALUE_MASK, self.pos);
        } else if action & STAY_FLAG == 0 {
            let next_state = action;
            if end > self.pos || ty <= max_node {
                self.pos = end;
                if !env.parser.state_flag(next_state, SKIPPED) {
                    self.reduce_pos = end;
                }
            }
            self.push_state(next_state, start);
            self.shift_context(ty, start, env);
            if ty <= max_node {
                self.buffer.extend([i64::from(ty), start as i64, end as i64, 4]);
            }
        } else {
            self.pos = end;
            self.shift_context(ty, start, env);
            if ty <= max_node {
                self.buffer.extend([i64::from(ty), start as i64, end as i64, 4]);
            }
        }
    }

    pub fn apply(&mut self, action: u32, next: u16, next_start: usize, next_end: usize, env: &mut ParseEnv<'_>) {
        if action & REDUCE_FLAG != 0 {
            self.reduce(action, env);
        } else {
            self.shift(action, next, next_start, next_end, env);
        }
    }

    /// Splice a node from a previous parse in at the current position.
    pub fn use_node(&mut self, value: Arc<Tree>, next: u32, env: &mut ParseEnv<'_>) {
        let index = match env.reused.last() {
            Some(last) if Arc::ptr_eq(last, &value) => env.reused.len() - 1,
            _ => {
                env.reused.push(Arc::clone(&value));
                env.reused.len() - 1
            }
        };
        let start = self.pos;
        self.pos = start + value.len();
        self.reduce_pos = self.pos;
        self.push_state(next, start);
        self.buffer
            .extend([index as i64, start as i64, self.reduce_pos as i64, -1]);
        if let Some(cx) = &self.cur_context {
            let (tracker, context) = (Arc::clone(&cx.tracker), Arc::clone(&cx.context));
            let input = env.stream.reset(self.pos - value.len(), None);
            let view = StackView::new(self, &env.parser);
            let updated = tracker.reuse(&context, &value, &view, input);
            self.update_context(updated);
        }
    }

    /// Split off a stack that continues independently from this one.
    pub fn split(&mut self, env: &mut ParseEnv<'_>) -> Stack {
        let mut off = self.buffer.len();
        while off > 0 && self.buffer[off - 2] > self.reduce_pos as i64 {
            off -= 4;
        }
        if off > 0 {
            let prefix: Vec<i64> = self.buffer.drain(..off).collect();
            let id = env.segments.push(Segment {
                buffer: prefix,
                base: self.buffer_base,
                parent: self.parent,
            });
            self.buffer_base += off;
            self.parent = Some(id);
        }
        Stack {
            stack: self.stack.clone(),
            state: self.state,
            reduce_pos: self.reduce_pos,
            pos: self.pos,
            score: self.score,
            buffer: self.buffer.clone(),
            buffer_base: self.buffer_base,
            cur_context: self.cur_context.clone(),
            look_ahead: self.look_ahead,
            parent: self.parent,
        }
    }

    // ========================================================================
    // RECOVERY
    // ========================================================================

    /// Skip the next token, wrapping it in an error node.
    pub fn recover_by_delete(&mut self, next: u16, next_end: usize, env: &mut ParseEnv<'_>) {
        let is_node = next <= env.parser.max_node();
        if is_node {
            self.store_node(i64::from(next), self.pos, next_end, 4, false, env);
        }
        self.store_node(ERR, self.pos, next_end, if is_node { 8 } else { 4 }, false, env);
        self.pos = next_end;
        self.reduce_pos = next_end;
        self.score -= env.parser.tuning().delete_penalty;
    }

    /// Whether `term` could be shifted after some sequence of reductions.
    pub fn can_shift(&self, parser: &LrParser, term: u16) -> bool {
        let mut sim = SimulatedStack::new(self);
        loop {
            let default = parser.state_slot(sim.state, parse_state::DEFAULT_REDUCE);
            let action = if default != 0 {
                default
            } else {
                parser.has_action(sim.state, term)
            };
            if action == 0 {
                return false;
            }
            if action & REDUCE_FLAG == 0 {
                return true;
            }
            sim.reduce(action, parser);
        }
    }

    /// Stacks that pretend a token was inserted before `next`.
    pub fn recover_by_insert(&mut self, next: u16, env: &mut ParseEnv<'_>) -> Vec<Stack> {
        let parser = Arc::clone(&env.parser);
        let tuning = parser.tuning();
        if self.stack.len() >= tuning.max_insert_stack_depth {
            return Vec::new();
        }

        let mut next_states = parser.next_states(self.state);
        if next_states.len() > tuning.max_next || self.stack.len() >= tuning.dampen_insert_stack_depth {
            let mut best: Vec<(u16, u32)> = next_states
                .iter()
                .copied()
                .filter(|&(_, s)| s != self.state && parser.has_action(s, next) != 0)
                .collect();
            if self.stack.len() < tuning.dampen_insert_stack_depth {
                for &(term, s) in &next_states {
                    if best.len() >= tuning.max_next {
                        break;
                    }
                    if !best.iter().any(|&(_, b)| b == s) {
                        best.push((term, s));
                    }
                }
            }
            next_states = best;
        }

        let mut result = Vec::new();
        for (term, s) in next_states {
            if result.len() >= tuning.max_next {
                break;
            }
            if s == self.state {
                continue;
            }
            let mut stack = self.split(env);
            stack.push_state(s, self.pos);
            stack.store_node(ERR, stack.pos, stack.pos, 4, true, env);
            stack.shift_context(term, self.pos, env);
            stack.reduce_pos = self.pos;
            stack.score -= tuning.insert_penalty;
            result.push(stack);
        }
        result
    }

    /// Apply the state's forced reduction, or any reduction that gets the
    /// stack unstuck. Returns false when there is none.
    pub fn force_reduce(&mut self, env: &mut ParseEnv<'_>) -> bool {
        let parser = Arc::clone(&env.parser);
        let mut reduce = parser.state_slot(self.state, parse_state::FORCED_REDUCE);
        if reduce & REDUCE_FLAG == 0 {
            return false;
        }
        if !parser.valid_action(self.state, reduce) {
            let depth = (reduce >> REDUCE_DEPTH_SHIFT) as usize;
            let term = (reduce & VALUE_MASK) as u16;
            let target = self.stack.len().checked_sub(depth * 3);
            let reachable = target
                .and_then(|t| self.stack.get(t))
                .and_then(|&state| parser.get_goto(state as u32, term, false))
                .is_some();
            if !reachable {
                match self.find_forced_reduction(&parser) {
                    Some(backup) => reduce = backup,
                    None => return false,
                }
            }
            self.store_node(ERR, self.pos, self.pos, 4, true, env);
            self.score -= parser.tuning().reduce_penalty;
        }
        self.reduce_pos = self.pos;
        self.reduce(reduce, env);
        true
    }

    /// Search the states reachable by shifting for a reduction whose goto
    /// is valid from this stack.
    fn find_forced_reduction(&self, parser: &LrParser) -> Option<u32> {
        let mut seen = Vec::new();
        self.explore_reductions(parser, self.state, 0, &mut seen)
    }

    fn explore_reductions(
        &self,
        parser: &LrParser,
        state: u32,
        depth: usize,
        seen: &mut Vec<u32>,
    ) -> Option<u32> {
        if seen.contains(&state) {
            return None;
        }
        seen.push(state);
        parser.all_actions(state, |action| {
            if action & (STAY_FLAG | GOTO_FLAG) != 0 {
                None
            } else if action & REDUCE_FLAG != 0 {
                let r_depth = (action >> REDUCE_DEPTH_SHIFT) as isize - depth as isize;
                if r_depth > 1 {
                    let term = (action & VALUE_MASK) as u16;
                    let target = self.stack.len() as isize - r_depth * 3;
                    if target >= 0
                        && parser
                            .get_goto(self.stack[target as usize] as u32, term, false)
                            .is_some()
                    {
                        return Some(((r_depth as u32) << REDUCE_DEPTH_SHIFT) | REDUCE_FLAG | u32::from(term));
                    }
                }
                None
            } else {
                self.explore_reductions(parser, action, depth + 1, &mut *seen)
            }
        })
    }

    /// Reduce until the stack reaches an accepting state.
    pub fn force_all(&mut self, env: &mut ParseEnv<'_>) -> &mut Self {
        while !env.parser.state_flag(self.state, ACCEPTING) {
            if !self.force_reduce(env) {
                self.store_node(ERR, self.pos, self.pos, 4, true, env);
                break;
            }
        }
        self
    }

    /// A stack at the bottom frame of its rule with nothing left to do.
    pub fn dead_end(&self, parser: &LrParser) -> bool {
        self.stack.len() == 3 && parser.has_no_actions(self.state)
    }

    /// Return to the start state, keeping the buffer.
    pub fn restart(&mut self, env: &ParseEnv<'_>) {
        self.store_node(ERR, self.pos, self.pos, 4, true, env);
        if let Some(&state) = self.stack.first() {
            self.state = state as u32;
        }
        self.stack.clear();
    }

    pub fn same_state(&self, other: &Stack) -> bool {
        if self.state != other.state || self.stack.len() != other.stack.len() {
            return false;
        }
        self.stack
            .iter()
            .zip(&other.stack)
            .step_by(3)
            .all(|(a, b)| a == b)
    }

    // ========================================================================
    // CONTEXT
    // ========================================================================

    pub fn shift_context(&mut self, term: u16, start: usize, env: &mut ParseEnv<'_>) {
        if let Some(cx) = &self.cur_context {
            let (tracker, context) = (Arc::clone(&cx.tracker), Arc::clone(&cx.context));
            let input = env.stream.reset(start, None);
            let view = StackView::new(self, &env.parser);
            let updated = tracker.shift(&context, term, &view, input);
            self.update_context(updated);
        }
    }

    fn reduce_context(&mut self, term: u16, start: usize, env: &mut ParseEnv<'_>) {
        if let Some(cx) = &self.cur_context {
            let (tracker, context) = (Arc::clone(&cx.tracker), Arc::clone(&cx.context));
            let input = env.stream.reset(start, None);
            let view = StackView::new(self, &env.parser);
            let updated = tracker.reduce(&context, term, &view, input);
            self.update_context(updated);
        }
    }

    fn emit_context(&mut self) {
        let Some(cx) = &self.cur_context else {
            return;
        };
        if self.buffer.last() != Some(&-3) {
            let hash = i64::from(cx.hash);
            self.buffer.extend([hash, self.pos as i64, self.pos as i64, -3]);
        }
    }

    fn emit_look_ahead(&mut self) {
        if self.buffer.last() != Some(&-4) {
            let look_ahead = self.look_ahead as i64;
            self.buffer.extend([look_ahead, self.pos as i64, self.pos as i64, -4]);
        }
    }

    fn update_context(&mut self, context: ContextValue) {
        let Some(cur) = &self.cur_context else {
            return;
        };
        if Arc::ptr_eq(&context, &cur.context) {
            return;
        }
        let next = StackContext::new(Arc::clone(&cur.tracker), context);
        if next.hash != cur.hash {
            self.emit_context();
        }
        self.cur_context = Some(next);
    }

    pub fn set_look_ahead(&mut self, look_ahead: usize) {
        if look_ahead > self.look_ahead {
            self.emit_look_ahead();
            self.look_ahead = look_ahead;
        }
    }

    /// Flush the final context and look-ahead markers before building.
    pub fn close(&mut self) {
        if self
            .cur_context
            .as_ref()
            .is_some_and(|cx| cx.tracker.strict())
        {
            self.emit_context();
        }
        if self.look_ahead > 0 {
            self.emit_look_ahead();
        }
    }
}

impl fmt::Display for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for state in self.stack.iter().step_by(3) {
            write!(f, "{state},")?;
        }
        write!(f, "{}]@{}", self.state, self.pos)?;
        if self.score != 0 {
            write!(f, "!{}", self.score)?;
        }
        Ok(())
    }
}

// ============================================================================
// STACK VIEW
// ============================================================================

/// Read-only access to a stack for tokenizers, specializers and context
/// trackers.
#[derive(Clone, Copy)]
pub struct StackView<'s> {
    stack: &'s Stack,
    parser: &'s LrParser,
}

impl<'s> StackView<'s> {
    pub(crate) fn new(stack: &'s Stack, parser: &'s LrParser) -> Self {
        Self { stack, parser }
    }

    pub fn pos(&self) -> usize {
        self.stack.pos
    }

    pub fn state(&self) -> u32 {
        self.stack.state
    }

    pub fn parser(&self) -> &'s LrParser {
        self.parser
    }

    /// Whether `term` can be shifted here, possibly after reductions.
    pub fn can_shift(&self, term: u16) -> bool {
        self.stack.can_shift(self.parser, term)
    }

    /// Whether the dialect with index `id` is enabled.
    pub fn dialect_enabled(&self, id: usize) -> bool {
        self.parser.dialect().flag(id)
    }

    pub(crate) fn dialect_enabled_term(&self, term: u16) -> bool {
        self.parser.dialect().allows(term)
    }

    pub fn context(&self) -> Option<&'s ContextValue> {
        self.stack.context()
    }
}

impl fmt::Debug for StackView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "StackView({})", self.stack)
    }
}

// ============================================================================
// SIMULATION
// ============================================================================

/// Runs reductions on a copy-on-write view of a stack's frames.
struct SimulatedStack<'s> {
    state: u32,
    stack: Cow<'s, [usize]>,
    base: usize,
}

impl<'s> SimulatedStack<'s> {
    fn new(start: &'s Stack) -> Self {
        Self {
            state: start.state,
            stack: Cow::Borrowed(&start.stack),
            base: start.stack.len(),
        }
    }

    fn reduce(&mut self, action: u32, parser: &LrParser) {
        let term = (action & VALUE_MASK) as u16;
        let depth = (action >> REDUCE_DEPTH_SHIFT) as usize;
        if depth == 0 {
            let frames = self.stack.to_mut();
            frames.truncate(self.base);
            frames.extend([self.state as usize, 0, 0]);
            self.base += 3;
        } else {
            self.base = self.base.saturating_sub((depth - 1) * 3);
        }
        self.state = if self.base >= 3 {
            parser
                .get_goto(self.stack[self.base - 3] as u32, term, true)
                .unwrap_or(NO_STATE)
        } else {
            NO_STATE
        };
    }
}

// ============================================================================
// BUFFER CURSOR
// ============================================================================

/// Reads a stack's buffer backwards, continuing into frozen segments.
#[derive(Clone)]
pub(crate) struct StackBufferCursor<'s> {
    segments: &'s SegmentArena,
    buffer: &'s [i64],
    base: usize,
    parent: Option<SegmentId>,
    pos: usize,
    index: usize,
}

impl<'s> StackBufferCursor<'s> {
    pub fn new(stack: &'s Stack, segments: &'s SegmentArena) -> Self {
        let mut cursor = Self {
            segments,
            buffer: &stack.buffer,
            base: stack.buffer_base,
            parent: stack.parent,
            pos: stack.buffer_len(),
            index: stack.buffer.len(),
        };
        if cursor.index == 0 {
            cursor.maybe_next();
        }
        cursor
    }

    fn maybe_next(&mut self) {
        if let Some(id) = self.parent {
            let segment = self.segments.get(id);
            self.index = self.base - segment.base;
            self.buffer = &segment.buffer;
            self.base = segment.base;
            self.parent = segment.parent;
        }
    }
}

impl BufferCursor for StackBufferCursor<'_> {
    fn pos(&self) -> usize {
        self.pos
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
        self.pos -= 4;
        if self.index == 0 {
            self.maybe_next();
        }
    }

    fn fork(&self) -> Self {
        self.clone()
    }
}
