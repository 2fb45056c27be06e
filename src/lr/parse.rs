//! The parse driver.
//!
//! A [`Parse`] steps a set of stacks through the input in lockstep. Each
//! [`Parse::advance`] call moves every stack at the lowest position forward
//! by one action, splitting stacks on ambiguous actions, pruning duplicates,
//! and falling back to error recovery when no stack can move.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use crate::base::Range;
use crate::error::{ParseError, Result};
use crate::tree::{BuildData, Child, NodeProp, Tree, TreeFragment};

use super::constants::state_flag::ACCEPTING;
use super::constants::{parse_state, term};
use super::fragment_cursor::FragmentCursor;
use super::input::{Input, InputStream};
use super::parser::LrParser;
use super::stack::{SegmentArena, Stack, StackBufferCursor};
use super::token_cache::TokenCache;

// ============================================================================
// SHARED STATE
// ============================================================================

/// Tracks the largest repeated reduction, to detect runaway
/// left-associative parses.
#[derive(Debug, Default)]
pub(crate) struct BigReductions {
    pub start: Option<usize>,
    pub size: usize,
    pub count: usize,
}

/// Parse state shared by all stacks.
pub(crate) struct ParseEnv<'a> {
    pub parser: Arc<LrParser>,
    pub stream: InputStream<'a>,
    pub segments: SegmentArena,
    /// Trees from previous parses referred to by reuse records.
    pub reused: Vec<Arc<Tree>>,
    pub big: BigReductions,
    /// Start of the first parse range.
    pub start: usize,
}

// ============================================================================
// PARSE
// ============================================================================

/// An in-progress parse. Call [`advance`](Self::advance) until it returns a
/// tree, or [`finish`](Self::finish) to run to completion.
pub struct Parse<'a> {
    env: ParseEnv<'a>,
    stacks: Vec<Stack>,
    token_cache: TokenCache,
    fragments: Option<FragmentCursor>,
    recovering: u32,
    min_stack_pos: usize,
    stopped_at: Option<usize>,
    top_term: u16,
    result: Option<Arc<Tree>>,
}

impl<'a> Parse<'a> {
    /// `ranges` must be non-empty.
    pub(crate) fn new(
        parser: Arc<LrParser>,
        input: &'a dyn Input,
        fragments: &[TreeFragment],
        ranges: Vec<Range>,
    ) -> Self {
        let start = ranges.first().map_or(0, |r| r.from);
        let stream = InputStream::new(input, ranges);
        let reuse = !fragments.is_empty()
            && stream.end().saturating_sub(start) > parser.buffer_length() * 4;
        let (top_state, top_term) = parser.top();
        let stacks = vec![Stack::start(&parser, top_state, start)];
        Self {
            token_cache: TokenCache::new(&parser),
            fragments: reuse.then(|| FragmentCursor::new(fragments.to_vec())),
            env: ParseEnv {
                parser,
                stream,
                segments: SegmentArena::default(),
                reused: Vec::new(),
                big: BigReductions::default(),
                start,
            },
            stacks,
            recovering: 0,
            min_stack_pos: start,
            stopped_at: None,
            top_term,
            result: None,
        }
    }

    /// Position up to which every stack has advanced.
    pub fn parsed_pos(&self) -> usize {
        self.min_stack_pos
    }

    pub fn stopped_at(&self) -> Option<usize> {
        self.stopped_at
    }

    /// Finish the parse at `pos` instead of the end of the input. The stop
    /// can only move backwards.
    pub fn stop_at(&mut self, pos: usize) -> Result<()> {
        if let Some(current) = self.stopped_at {
            if current < pos {
                return Err(ParseError::StopAtForward {
                    current,
                    requested: pos,
                });
            }
        }
        self.stopped_at = Some(pos);
        Ok(())
    }

    /// Advance until the parse is done.
    pub fn finish(mut self) -> Result<Arc<Tree>> {
        loop {
            if let Some(tree) = self.advance()? {
                return Ok(tree);
            }
        }
    }

    /// Advance until the parse is done or `cancel` fires. Returns `None`
    /// when cancelled; the parse can be resumed later.
    pub fn advance_until(&mut self, cancel: &CancellationToken) -> Result<Option<Arc<Tree>>> {
        loop {
            if cancel.is_cancelled() {
                debug!(pos = self.min_stack_pos, "parse cancelled");
                return Ok(None);
            }
            if let Some(tree) = self.advance()? {
                return Ok(Some(tree));
            }
        }
    }

    /// Run one step. Returns the tree once the parse is complete.
    pub fn advance(&mut self) -> Result<Option<Arc<Tree>>> {
        if let Some(tree) = &self.result {
            return Ok(Some(Arc::clone(tree)));
        }
        let parser = Arc::clone(&self.env.parser);
        let tuning = parser.tuning();
        let pos = self.min_stack_pos;
        let mut queue: VecDeque<Stack> = std::mem::take(&mut self.stacks).into();
        let mut new_stacks: Vec<Stack> = Vec::new();
        let mut stopped: Vec<Stack> = Vec::new();
        let mut stopped_tokens: Vec<(u16, usize)> = Vec::new();

        if self.env.big.count > tuning.max_left_associative_reduction_count && queue.len() == 1 {
            if let Some(stack) = queue.front_mut() {
                warn!(
                    pos = stack.pos,
                    count = self.env.big.count,
                    "fast-forwarding repeated big reductions"
                );
                let big_start = self.env.big.start.unwrap_or(0);
                while stack.force_reduce(&mut self.env)
                    && stack.stack.len() >= 2
                    && stack.stack[stack.stack.len() - 2] >= big_start
                {}
            }
            self.env.big.count = 0;
            self.env.big.size = 0;
        }

        let mut split: Vec<Stack> = Vec::new();
        while let Some(mut stack) = queue.pop_front() {
            loop {
                self.token_cache.clear_main_token();
                if stack.pos > pos {
                    new_stacks.push(stack);
                    break;
                }
                let advanced = self.advance_stack(&mut stack, Some((&mut new_stacks, &mut split)))?;
                queue.extend(split.drain(..));
                if advanced {
                    continue;
                }
                stopped_tokens.push(self.token_cache.get_main_token(&stack, &self.env));
                stopped.push(stack);
                break;
            }
        }

        if new_stacks.is_empty() {
            if let Some(best) = self.find_finished(&stopped) {
                let stack = stopped.swap_remove(best);
                debug!(pos = stack.pos, score = stack.score, "finished parse");
                return self.stack_to_tree(stack).map(Some);
            }
            if parser.is_strict() {
                debug!(pos, stacks = stopped.len(), "no parse in strict mode");
                return Err(ParseError::syntax(pos));
            }
            if self.recovering == 0 {
                self.recovering = tuning.recovery_distance;
            }
        }

        if self.recovering > 0 && !stopped.is_empty() {
            let finished = match self.stopped_at {
                Some(stopped_at) if stopped[0].pos > stopped_at => Some(stopped.swap_remove(0)),
                _ => self.run_recovery(stopped, stopped_tokens, &mut new_stacks)?,
            };
            if let Some(mut stack) = finished {
                debug!(pos = stack.pos, score = stack.score, "force-finishing parse");
                stack.force_all(&mut self.env);
                return self.stack_to_tree(stack).map(Some);
            }
        }

        if self.recovering > 0 {
            let max_remaining = if self.recovering == 1 {
                1
            } else {
                self.recovering as usize * tuning.max_remaining_per_step
            };
            if new_stacks.len() > max_remaining {
                new_stacks.sort_by(|a, b| b.score.cmp(&a.score));
                new_stacks.truncate(max_remaining);
            }
            if new_stacks.iter().any(|s| s.reduce_pos > pos) {
                self.recovering -= 1;
            }
        } else if new_stacks.len() > 1 {
            prune_stacks(&mut new_stacks, tuning.min_buffer_length_prune);
            new_stacks.truncate(tuning.max_stack_count);
        }

        let Some(min_pos) = new_stacks.iter().map(|s| s.pos).min() else {
            return Err(ParseError::syntax(pos));
        };
        self.min_stack_pos = min_pos;
        self.stacks = new_stacks;
        Ok(None)
    }

    /// Move `stack` forward by one action. Additional actions split the
    /// stack: splits that consumed input go to `forks.0`, others to
    /// `forks.1`. Without `forks`, only the first action is taken.
    fn advance_stack(
        &mut self,
        stack: &mut Stack,
        forks: Option<(&mut Vec<Stack>, &mut Vec<Stack>)>,
    ) -> Result<bool> {
        let start = stack.pos;
        let parser = Arc::clone(&self.env.parser);

        if let Some(stopped_at) = self.stopped_at {
            if start > stopped_at {
                return Ok(stack.force_reduce(&mut self.env));
            }
        }

        if let Some(fragments) = self.fragments.as_mut() {
            let strict_hash = stack
                .cur_context
                .as_ref()
                .filter(|cx| cx.tracker.strict())
                .map(|cx| cx.hash);
            let mut cached = fragments.node_at(start);
            while let Some(node) = cached {
                let id = node.node_type().id();
                let same_type = parser
                    .node_set()
                    .get(id)
                    .is_some_and(|ty| ty == node.node_type());
                let goto = if same_type {
                    parser.get_goto(stack.state, id, false)
                } else {
                    None
                };
                if let Some(goto) = goto {
                    let context_ok = strict_hash.is_none_or(|hash| {
                        node.prop_number(NodeProp::ContextHash).unwrap_or(0) == hash
                    });
                    if !node.is_empty() && context_ok {
                        trace!(pos = start, node = %parser.get_name(id), "reuse");
                        stack.use_node(node, goto, &mut self.env);
                        return Ok(true);
                    }
                }
                cached = match (node.children().first(), node.positions().first()) {
                    (Some(Child::Tree(inner)), Some(0)) => Some(Arc::clone(inner)),
                    _ => None,
                };
            }
        }

        let default_reduce = parser.state_slot(stack.state, parse_state::DEFAULT_REDUCE);
        if default_reduce > 0 {
            stack.reduce(default_reduce, &mut self.env);
            trace!(stack = %stack, "always reduce");
            return Ok(true);
        }

        let tuning = parser.tuning();
        if stack.stack.len() >= tuning.cut_depth {
            while stack.stack.len() > tuning.cut_to && stack.force_reduce(&mut self.env) {}
        }

        let actions = self.token_cache.get_actions(stack, &mut self.env)?.to_vec();
        let main_start = self.token_cache.main_token_start();
        let mut forks = forks;
        for (i, &(action, term, end)) in actions.iter().enumerate() {
            let last = i + 1 == actions.len() || forks.is_none();
            if last {
                let token_start = main_start.unwrap_or(stack.pos);
                stack.apply(action, term, token_start, end, &mut self.env);
                trace!(stack = %stack, term = %parser.get_name(term), "apply");
                return Ok(true);
            }
            let mut local = stack.split(&mut self.env);
            let token_start = main_start.unwrap_or(local.pos);
            local.apply(action, term, token_start, end, &mut self.env);
            trace!(stack = %local, term = %parser.get_name(term), "split");
            if let Some((stacks, split)) = forks.as_mut() {
                if local.pos > start {
                    stacks.push(local);
                } else {
                    split.push(local);
                }
            }
        }
        Ok(false)
    }

    /// Advance `stack` until it moves past its current position. Returns the
    /// stack back when it gets stuck first.
    fn advance_fully(&mut self, mut stack: Stack, new_stacks: &mut Vec<Stack>) -> Result<Option<Stack>> {
        let pos = stack.pos;
        loop {
            if !self.advance_stack(&mut stack, None)? {
                return Ok(Some(stack));
            }
            if stack.pos > pos {
                push_stack_dedup(stack, new_stacks);
                return Ok(None);
            }
        }
    }

    /// Try every recovery strategy on the stuck stacks. Returns a stack to
    /// finish with when one reached the end of the input.
    fn run_recovery(
        &mut self,
        stacks: Vec<Stack>,
        tokens: Vec<(u16, usize)>,
        new_stacks: &mut Vec<Stack>,
    ) -> Result<Option<Stack>> {
        let parser = Arc::clone(&self.env.parser);
        let tuning = parser.tuning();
        let mut finished: Option<Stack> = None;
        let mut restarted = false;

        for (mut stack, (mut token, mut token_end)) in stacks.into_iter().zip(tokens) {
            if stack.dead_end(&parser) {
                if restarted {
                    continue;
                }
                restarted = true;
                stack.restart(&self.env);
                debug!(pos = stack.pos, "restart");
                match self.advance_fully(stack, new_stacks)? {
                    Some(stuck) => stack = stuck,
                    None => continue,
                }
            }

            let mut force = Some(stack.split(&mut self.env));
            for _ in 0..tuning.force_reduce_limit {
                let Some(mut forced) = force.take() else {
                    break;
                };
                if !forced.force_reduce(&mut self.env) {
                    break;
                }
                debug!(pos = forced.pos, score = forced.score, "force-reduce");
                force = self.advance_fully(forced, new_stacks)?;
            }

            for insert in stack.recover_by_insert(token, &mut self.env) {
                debug!(pos = insert.pos, score = insert.score, "insert");
                self.advance_fully(insert, new_stacks)?;
            }

            if self.env.stream.end() > stack.pos {
                if token_end == stack.pos {
                    token_end = self.env.stream.char_end(stack.pos);
                    token = term::ERR;
                }
                stack.recover_by_delete(token, token_end, &mut self.env);
                debug!(pos = stack.pos, score = stack.score, term = token, "delete");
                push_stack_dedup(stack, new_stacks);
            } else if finished.as_ref().is_none_or(|f| f.score < stack.score) {
                finished = Some(stack);
            }
        }
        Ok(finished)
    }

    /// Index of the best stack that is done: accepting, at the end of input
    /// (or past the stop position).
    fn find_finished(&self, stacks: &[Stack]) -> Option<usize> {
        let mut best: Option<usize> = None;
        for (i, stack) in stacks.iter().enumerate() {
            let at_end = stack.pos == self.env.stream.end()
                || self.stopped_at.is_some_and(|stop| stack.pos > stop);
            if at_end
                && self.env.parser.state_flag(stack.state, ACCEPTING)
                && best.is_none_or(|b| stacks[b].score < stack.score)
            {
                best = Some(i);
            }
        }
        best
    }

    fn stack_to_tree(&mut self, mut stack: Stack) -> Result<Arc<Tree>> {
        stack.close();
        let parser = Arc::clone(&self.env.parser);
        let data = BuildData {
            node_set: parser.node_set(),
            top_id: self.top_term,
            max_buffer_length: parser.buffer_length(),
            reused: &self.env.reused,
            start: self.env.start,
            buffer_start: 0,
            length: Some(stack.pos.saturating_sub(self.env.start)),
            min_repeat_type: Some(parser.min_repeat_term()),
        };
        let cursor = StackBufferCursor::new(&stack, &self.env.segments);
        let tree = Arc::new(Tree::build_from_cursor(cursor, data)?);
        debug!(
            length = tree.len(),
            segments = self.env.segments.len(),
            reused = self.env.reused.len(),
            "built parse tree"
        );
        self.result = Some(Arc::clone(&tree));
        Ok(tree)
    }
}

impl std::fmt::Debug for Parse<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parse")
            .field("parsed_pos", &self.min_stack_pos)
            .field("stacks", &self.stacks.len())
            .field("recovering", &self.recovering)
            .field("stopped_at", &self.stopped_at)
            .finish_non_exhaustive()
    }
}

/// Add `stack` unless a stack in the same state at the same position exists,
/// keeping the higher score.
fn push_stack_dedup(stack: Stack, new_stacks: &mut Vec<Stack>) {
    for other in new_stacks.iter_mut() {
        if other.pos == stack.pos && other.same_state(&stack) {
            if other.score < stack.score {
                *other = stack;
            }
            return;
        }
    }
    new_stacks.push(stack);
}

/// Drop stacks that are in the same state as a better one, or that have
/// both built long buffers and score worse.
fn prune_stacks(stacks: &mut Vec<Stack>, min_buffer_length: usize) {
    let mut i = 0;
    'outer: while i + 1 < stacks.len() {
        let mut j = i + 1;
        while j < stacks.len() {
            let (stack, other) = (&stacks[i], &stacks[j]);
            let comparable = stack.same_state(other)
                || (stack.buffer.len() > min_buffer_length && other.buffer.len() > min_buffer_length);
            if comparable {
                let diff = match stack.score - other.score {
                    0 => stack.buffer_len() as i64 - other.buffer_len() as i64,
                    diff => i64::from(diff),
                };
                if diff > 0 {
                    stacks.remove(j);
                } else {
                    stacks.remove(i);
                    continue 'outer;
                }
            } else {
                j += 1;
            }
        }
        i += 1;
    }
}
