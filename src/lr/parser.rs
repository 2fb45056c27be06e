//! The LR parser: decoded tables plus the tokenizers and hooks that go with
//! them.
//!
//! An [`LrParser`] is immutable and cheap to clone; all tables sit behind
//! `Arc`s. [`LrParser::configure`] derives a variant (other top rule,
//! dialect, tokenizers, strictness) without copying them.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::base::Range;
use crate::error::{ParseError, Result};
use crate::tree::{NodeSet, NodeType, NodeTypeSpec, PropSource, PropValue, Tree, TreeFragment, DEFAULT_BUFFER_LENGTH};

use super::constants::action::REDUCE_FLAG;
use super::constants::{FILE_VERSION, pair, parse_state, seq, term};
use super::context::ContextTracker;
use super::input::Input;
use super::parse::Parse;
use super::spec::{ParserSpec, SpecializeFn, SpecializerSpec, TokenizerSpec};
use super::token::{TokenGroup, Tokenizer};
use super::tuning::RecoveryTuning;

// ============================================================================
// DIALECT
// ============================================================================

/// The set of enabled dialects and the terms they disable.
#[derive(Debug, Clone, Default)]
pub struct Dialect {
    source: Option<String>,
    flags: Vec<bool>,
    disabled: Option<Arc<[bool]>>,
}

impl Dialect {
    /// The dialect string this was parsed from.
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    /// Whether the dialect with index `id` is enabled.
    pub fn flag(&self, id: usize) -> bool {
        self.flags.get(id).copied().unwrap_or(false)
    }

    /// Whether tokens of `term` may be produced.
    pub fn allows(&self, term: u16) -> bool {
        match &self.disabled {
            Some(disabled) => !disabled.get(usize::from(term)).copied().unwrap_or(false),
            None => true,
        }
    }
}

// ============================================================================
// CONFIGURATION
// ============================================================================

/// Options for [`LrParser::configure`]. Unset fields keep the parser's
/// current value.
#[derive(Clone, Default)]
pub struct ParserConfig {
    /// Prop sources added to the node set.
    pub props: Vec<PropSource>,
    /// Name of the top rule to parse.
    pub top: Option<String>,
    /// Space-separated names of dialects to enable.
    pub dialect: Option<String>,
    /// Tokenizers replacing the one at the given index.
    pub tokenizers: Vec<(usize, Arc<dyn Tokenizer>)>,
    /// Specializers replacing the one for the same term.
    pub specializers: Vec<SpecializerSpec>,
    pub context_tracker: Option<Arc<dyn ContextTracker>>,
    /// Fail with [`ParseError::Syntax`] instead of recovering.
    pub strict: Option<bool>,
    /// Maximum text length stored in one tree buffer.
    pub buffer_length: Option<usize>,
    pub tuning: Option<RecoveryTuning>,
}

// ============================================================================
// PARSER
// ============================================================================

/// A table-driven, error-tolerant LR parser.
#[derive(Clone)]
pub struct LrParser {
    states: Arc<[u32]>,
    data: Arc<[u16]>,
    goto: Arc<[u16]>,
    max_term: u16,
    min_repeat_term: u16,
    max_node: u16,
    tokenizers: Vec<Arc<dyn Tokenizer>>,
    top_rules: Arc<IndexMap<String, (u32, u16)>>,
    context: Option<Arc<dyn ContextTracker>>,
    dialects: Arc<IndexMap<String, usize>>,
    dynamic_precedences: Arc<FxHashMap<u16, i32>>,
    specialized: Vec<u16>,
    specializers: Vec<SpecializeFn>,
    token_prec: usize,
    term_names: Option<Arc<FxHashMap<u16, String>>>,
    node_set: NodeSet,
    dialect: Dialect,
    top: (u32, u16),
    strict: bool,
    buffer_length: usize,
    tuning: RecoveryTuning,
}

impl LrParser {
    /// Build a parser from its serialized tables.
    pub fn deserialize(spec: ParserSpec) -> Result<Self> {
        if spec.version != FILE_VERSION {
            return Err(ParseError::Version {
                found: spec.version,
                expected: FILE_VERSION,
            });
        }

        let mut names: Vec<&str> = spec.node_names.split(' ').collect();
        let min_repeat_term = names.len() as u16;
        names.extend(std::iter::repeat_n("", usize::from(spec.repeat_node_count)));

        let mut props: Vec<Vec<_>> = vec![Vec::new(); names.len()];
        for prop_spec in &spec.node_props {
            for (id, value) in &prop_spec.assignments {
                let value: PropValue = prop_spec.prop.deserialize(value)?;
                if let Some(slot) = props.get_mut(usize::from(*id)) {
                    slot.push((prop_spec.prop, value));
                }
            }
        }

        let top_terms: Vec<u16> = spec.top_rules.values().map(|&(_, term)| term).collect();
        let types = names
            .iter()
            .zip(props)
            .enumerate()
            .map(|(i, (name, props))| {
                let id = i as u16;
                NodeType::define(NodeTypeSpec {
                    name: (!name.is_empty()).then(|| name.to_string()),
                    id,
                    props,
                    top: top_terms.contains(&id),
                    error: id == term::ERR,
                    skipped: spec.skipped_nodes.contains(&id),
                })
            })
            .collect();
        let mut node_set = NodeSet::new(types)?;
        if !spec.prop_sources.is_empty() {
            node_set = node_set.extend(&spec.prop_sources);
        }

        let token_data: Arc<[u16]> = spec.token_data.to_u16()?.into();
        let tokenizers = spec
            .tokenizers
            .into_iter()
            .map(|tokenizer| match tokenizer {
                TokenizerSpec::Group(id) => {
                    Arc::new(TokenGroup::new(Arc::clone(&token_data), id)) as Arc<dyn Tokenizer>
                }
                TokenizerSpec::External(tokenizer) => tokenizer,
            })
            .collect();

        let top = spec
            .top_rules
            .values()
            .next()
            .copied()
            .ok_or_else(|| ParseError::UnknownTopRule(String::new()))?;

        let (specialized, specializers) = spec
            .specialized
            .into_iter()
            .map(|s| (s.term, s.get))
            .unzip();

        let mut parser = Self {
            states: spec.states.to_u32()?.into(),
            data: spec.state_data.to_u16()?.into(),
            goto: spec.goto.to_u16()?.into(),
            max_term: spec.max_term,
            min_repeat_term,
            max_node: (node_set.len().saturating_sub(1)) as u16,
            tokenizers,
            top_rules: Arc::new(spec.top_rules),
            context: spec.context,
            dialects: Arc::new(spec.dialects),
            dynamic_precedences: Arc::new(spec.dynamic_precedences),
            specialized,
            specializers,
            token_prec: spec.token_prec,
            term_names: spec.term_names.map(Arc::new),
            node_set,
            dialect: Dialect::default(),
            top,
            strict: false,
            buffer_length: DEFAULT_BUFFER_LENGTH,
            tuning: RecoveryTuning::default(),
        };
        parser.dialect = parser.parse_dialect(None);
        tracing::debug!(
            states = parser.state_count(),
            nodes = parser.node_set.len(),
            tokenizers = parser.tokenizers.len(),
            "deserialized parser"
        );
        Ok(parser)
    }

    /// A copy of this parser with `config` applied.
    pub fn configure(&self, config: ParserConfig) -> Result<Self> {
        let mut copy = self.clone();
        if !config.props.is_empty() {
            copy.node_set = copy.node_set.extend(&config.props);
        }
        if let Some(top) = config.top {
            copy.top = *self
                .top_rules
                .get(&top)
                .ok_or(ParseError::UnknownTopRule(top))?;
        }
        for (index, tokenizer) in config.tokenizers {
            if let Some(slot) = copy.tokenizers.get_mut(index) {
                *slot = tokenizer;
            }
        }
        for spec in config.specializers {
            match copy.specialized.iter().position(|&t| t == spec.term) {
                Some(i) => copy.specializers[i] = spec.get,
                None => {
                    copy.specialized.push(spec.term);
                    copy.specializers.push(spec.get);
                }
            }
        }
        if let Some(tracker) = config.context_tracker {
            copy.context = Some(tracker);
        }
        if let Some(dialect) = config.dialect {
            copy.dialect = copy.parse_dialect(Some(&dialect));
        }
        if let Some(strict) = config.strict {
            copy.strict = strict;
        }
        if let Some(buffer_length) = config.buffer_length {
            copy.buffer_length = buffer_length;
        }
        if let Some(tuning) = config.tuning {
            copy.tuning = tuning;
        }
        Ok(copy)
    }

    // ========================================================================
    // PARSING
    // ========================================================================

    /// Parse a whole document.
    pub fn parse(&self, input: &str) -> Result<Arc<Tree>> {
        self.start_parse(&input, &[], &[])?.finish()
    }

    /// Start an incremental parse of `ranges` (the whole input when empty),
    /// reusing nodes from `fragments`.
    pub fn start_parse<'a>(
        &self,
        input: &'a dyn Input,
        fragments: &[TreeFragment],
        ranges: &[Range],
    ) -> Result<Parse<'a>> {
        let ranges = if ranges.is_empty() {
            vec![Range::new(0, input.len())]
        } else {
            let sorted = ranges
                .windows(2)
                .all(|pair| pair[0].to <= pair[1].from);
            if !sorted || ranges.iter().any(|r| r.from > r.to) {
                return Err(ParseError::InvalidRanges);
            }
            ranges.to_vec()
        };
        Ok(Parse::new(Arc::new(self.clone()), input, fragments, ranges))
    }

    // ========================================================================
    // TABLE QUERIES
    // ========================================================================

    pub(crate) fn state_count(&self) -> usize {
        self.states.len() / parse_state::SIZE
    }

    fn is_state(&self, state: u32) -> bool {
        (state as usize) < self.state_count()
    }

    pub(crate) fn state_slot(&self, state: u32, slot: usize) -> u32 {
        if !self.is_state(state) {
            return 0;
        }
        self.states
            .get(state as usize * parse_state::SIZE + slot)
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn state_flag(&self, state: u32, flag: u32) -> bool {
        self.state_slot(state, parse_state::FLAGS) & flag > 0
    }

    fn at(&self, index: usize) -> u16 {
        self.data.get(index).copied().unwrap_or(seq::END)
    }

    /// The action for `terminal` in `state`, from either its action or skip
    /// table, or 0.
    pub fn has_action(&self, state: u32, terminal: u16) -> u32 {
        if !self.is_state(state) {
            return 0;
        }
        for slot in [parse_state::ACTIONS, parse_state::SKIP] {
            let mut i = self.state_slot(state, slot) as usize;
            loop {
                let mut next = self.at(i);
                if next == seq::END {
                    match self.at(i + 1) {
                        seq::NEXT => {
                            i = pair(&self.data, i + 2) as usize;
                            next = self.at(i);
                        }
                        seq::OTHER => return pair(&self.data, i + 2),
                        _ => break,
                    }
                }
                if next == terminal || next == term::ERR {
                    return pair(&self.data, i + 1);
                }
                i += 3;
            }
        }
        0
    }

    /// Call `f` with the default reduction and every action of `state` until
    /// it returns `Some`.
    pub(crate) fn all_actions<T>(&self, state: u32, mut f: impl FnMut(u32) -> Option<T>) -> Option<T> {
        if !self.is_state(state) {
            return None;
        }
        let default = self.state_slot(state, parse_state::DEFAULT_REDUCE);
        if default != 0 {
            if let Some(result) = f(default) {
                return Some(result);
            }
        }
        let mut i = self.state_slot(state, parse_state::ACTIONS) as usize;
        loop {
            if self.at(i) == seq::END {
                if self.at(i + 1) == seq::NEXT {
                    i = pair(&self.data, i + 2) as usize;
                } else {
                    return None;
                }
            }
            if let Some(result) = f(pair(&self.data, i + 1)) {
                return Some(result);
            }
            i += 3;
        }
    }

    /// Whether `action` is one of the actions of `state`.
    pub fn valid_action(&self, state: u32, action: u32) -> bool {
        self.all_actions(state, |a| (a == action).then_some(())).is_some()
    }

    /// The `(term, state)` shift targets of `state`, one per target state.
    pub fn next_states(&self, state: u32) -> Vec<(u16, u32)> {
        let mut result: Vec<(u16, u32)> = Vec::new();
        if !self.is_state(state) {
            return result;
        }
        let mut i = self.state_slot(state, parse_state::ACTIONS) as usize;
        loop {
            if self.at(i) == seq::END {
                if self.at(i + 1) == seq::NEXT {
                    i = pair(&self.data, i + 2) as usize;
                } else {
                    break;
                }
            }
            if u32::from(self.at(i + 2)) & (REDUCE_FLAG >> 16) == 0 {
                let value = u32::from(self.at(i + 1));
                if !result.iter().any(|&(_, s)| s == value) {
                    result.push((self.at(i), value));
                }
            }
            i += 3;
        }
        result
    }

    /// Whether `state` has no actions at all.
    pub(crate) fn has_no_actions(&self, state: u32) -> bool {
        !self.is_state(state)
            || (self.at(self.state_slot(state, parse_state::ACTIONS) as usize) == seq::END
                && self.state_slot(state, parse_state::DEFAULT_REDUCE) == 0)
    }

    /// The state reached from `state` after reducing `term`. With `loose`,
    /// the last group's target is returned without checking membership.
    pub fn get_goto(&self, state: u32, term: u16, loose: bool) -> Option<u32> {
        let table = &self.goto;
        let n_terms = *table.first()?;
        if term >= n_terms {
            return None;
        }
        let mut pos = usize::from(*table.get(usize::from(term) + 1)?);
        loop {
            let group_tag = *table.get(pos)?;
            let last = group_tag & 1 == 1;
            let target = u32::from(*table.get(pos + 1)?);
            pos += 2;
            if last && loose {
                return Some(target);
            }
            let end = pos + usize::from(group_tag >> 1);
            while pos < end {
                if u32::from(*table.get(pos)?) == state {
                    return Some(target);
                }
                pos += 1;
            }
            if last {
                return None;
            }
        }
    }

    fn parse_dialect(&self, dialect: Option<&str>) -> Dialect {
        let names: Vec<&String> = self.dialects.keys().collect();
        let mut flags = vec![false; names.len()];
        if let Some(dialect) = dialect {
            for part in dialect.split(' ') {
                if let Some(id) = names.iter().position(|name| name.as_str() == part) {
                    flags[id] = true;
                }
            }
        }
        let mut disabled: Option<Vec<bool>> = None;
        for (i, name) in names.iter().enumerate() {
            if flags[i] {
                continue;
            }
            let mut j = self.dialects.get(*name).copied().unwrap_or(usize::MAX);
            loop {
                let id = self.at(j);
                if id == seq::END {
                    break;
                }
                let disabled = disabled.get_or_insert_with(|| vec![false; usize::from(self.max_term) + 1]);
                if let Some(slot) = disabled.get_mut(usize::from(id)) {
                    *slot = true;
                }
                j += 1;
            }
        }
        Dialect {
            source: dialect.map(str::to_string),
            flags,
            disabled: disabled.map(Into::into),
        }
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    /// Dynamic precedence of a term, added to a stack's score on reduce.
    pub fn dynamic_precedence(&self, term: u16) -> i32 {
        self.dynamic_precedences.get(&term).copied().unwrap_or(0)
    }

    /// A readable name for a term.
    pub fn get_name(&self, term: u16) -> String {
        if let Some(names) = &self.term_names {
            if let Some(name) = names.get(&term) {
                return name.clone();
            }
        }
        match self.node_set.get(term) {
            Some(ty) if term <= self.max_node && !ty.name().is_empty() => ty.name().to_string(),
            _ => term.to_string(),
        }
    }

    /// The node type of the active top rule.
    pub fn top_node(&self) -> NodeType {
        self.node_set
            .get(self.top.1)
            .cloned()
            .unwrap_or_else(NodeType::none)
    }

    /// Start state and term of the active top rule.
    pub fn top(&self) -> (u32, u16) {
        self.top
    }

    /// The end-of-input term.
    pub fn eof_term(&self) -> u16 {
        self.max_node + 1
    }

    pub fn max_node(&self) -> u16 {
        self.max_node
    }

    pub fn max_term(&self) -> u16 {
        self.max_term
    }

    pub(crate) fn min_repeat_term(&self) -> u16 {
        self.min_repeat_term
    }

    pub fn node_set(&self) -> &NodeSet {
        &self.node_set
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn buffer_length(&self) -> usize {
        self.buffer_length
    }

    pub fn tuning(&self) -> &RecoveryTuning {
        &self.tuning
    }

    pub(crate) fn data(&self) -> &[u16] {
        &self.data
    }

    pub(crate) fn token_prec_table(&self) -> usize {
        self.token_prec
    }

    pub(crate) fn tokenizers(&self) -> &[Arc<dyn Tokenizer>] {
        &self.tokenizers
    }

    pub(crate) fn context(&self) -> Option<&Arc<dyn ContextTracker>> {
        self.context.as_ref()
    }

    pub(crate) fn specializers_for(&self, term: u16) -> impl Iterator<Item = &SpecializeFn> {
        self.specialized
            .iter()
            .zip(&self.specializers)
            .filter(move |(t, _)| **t == term)
            .map(|(_, get)| get)
    }

    /// Names of the top rules, default first.
    pub fn top_rule_names(&self) -> impl Iterator<Item = &str> {
        self.top_rules.keys().map(String::as_str)
    }
}

impl fmt::Debug for LrParser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LrParser")
            .field("states", &self.state_count())
            .field("nodes", &self.node_set.len())
            .field("top", &self.top)
            .field("strict", &self.strict)
            .finish_non_exhaustive()
    }
}
