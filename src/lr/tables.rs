//! Assembling parse tables by hand.
//!
//! [`TableBuilder`] takes an explicit automaton and lays it out in the
//! serialized table format:
//! - parse states with their action, skip and default reductions
//! - goto entries grouped by term and target
//! - token automaton states
//! - dialect term lists and the token precedence table
//!
//! Identical action and skip lists are shared between states.

use rustc_hash::FxHashMap;

use super::constants::action::{GOTO_FLAG, REDUCE_DEPTH_SHIFT, REDUCE_FLAG, REPEAT_FLAG, STAY_FLAG};
use super::constants::{parse_state, seq, state_flag};
use super::spec::{ParserSpec, TableData};

// ============================================================================
// ACTIONS
// ============================================================================

/// A parse action before encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseAction {
    /// Consume the token and move to the state.
    Shift(u32),
    /// Push the state without consuming input.
    Goto(u32),
    /// Consume a skipped token without changing state.
    Skip,
    /// Pop `depth` frames and reduce to `term`.
    Reduce { term: u16, depth: u16 },
    /// Like `Reduce`, but a repeat term that still gets a node.
    ReduceRepeat { term: u16, depth: u16 },
    /// Pop `depth` frames plus one, returning to the state below them.
    ReduceStay { term: u16, depth: u16 },
}

impl ParseAction {
    pub fn encode(self) -> u32 {
        let reduce = |term: u16, depth: u16| {
            REDUCE_FLAG | u32::from(term) | (u32::from(depth) << REDUCE_DEPTH_SHIFT)
        };
        match self {
            Self::Shift(state) => state,
            Self::Goto(state) => state | GOTO_FLAG,
            Self::Skip => STAY_FLAG,
            Self::Reduce { term, depth } => reduce(term, depth),
            Self::ReduceRepeat { term, depth } => reduce(term, depth) | REPEAT_FLAG,
            Self::ReduceStay { term, depth } => reduce(term, depth) | STAY_FLAG,
        }
    }
}

// ============================================================================
// STATES
// ============================================================================

/// One parse state.
#[derive(Debug, Clone, Default)]
pub struct StateSpec {
    pub accepting: bool,
    /// The state belongs to a skip rule.
    pub skipped: bool,
    pub actions: Vec<(u16, ParseAction)>,
    /// Action for any term not in `actions`.
    pub other: Option<ParseAction>,
    pub skip: Vec<(u16, ParseAction)>,
    /// Bit `i` enables tokenizer `i`.
    pub tokenizer_mask: u32,
    pub default_reduce: Option<ParseAction>,
    /// Reduction used by error recovery when the state has to be left.
    pub forced_reduce: Option<ParseAction>,
}

impl StateSpec {
    pub fn new(tokenizer_mask: u32) -> Self {
        Self {
            tokenizer_mask,
            ..Self::default()
        }
    }

    pub fn on(mut self, term: u16, action: ParseAction) -> Self {
        self.actions.push((term, action));
        self
    }

    pub fn skip(mut self, term: u16, action: ParseAction) -> Self {
        self.skip.push((term, action));
        self
    }

    pub fn default_reduce(mut self, action: ParseAction) -> Self {
        self.default_reduce = Some(action);
        self
    }

    pub fn forced_reduce(mut self, action: ParseAction) -> Self {
        self.forced_reduce = Some(action);
        self
    }

    pub fn accepting(mut self) -> Self {
        self.accepting = true;
        self
    }
}

/// One state of the token automaton.
#[derive(Debug, Clone, Default)]
pub struct TokenState {
    /// Groups this state belongs to.
    pub group_mask: u16,
    /// `(term, group mask)` tokens accepted in this state.
    pub accept: Vec<(u16, u16)>,
    /// `(from, to, target)` byte ranges, `to` exclusive.
    pub edges: Vec<(u16, u32, u16)>,
    /// Target on end of input.
    pub eof: Option<u16>,
}

impl TokenState {
    pub fn new(group_mask: u16) -> Self {
        Self {
            group_mask,
            ..Self::default()
        }
    }

    pub fn accept(mut self, term: u16, group_mask: u16) -> Self {
        self.accept.push((term, group_mask));
        self
    }

    pub fn edge(mut self, from: u16, to: u32, target: u16) -> Self {
        self.edges.push((from, to, target));
        self
    }

    /// An edge for a single byte.
    pub fn byte(self, byte: u8, target: u16) -> Self {
        self.edge(u16::from(byte), u32::from(byte) + 1, target)
    }

    pub fn eof(mut self, target: u16) -> Self {
        self.eof = Some(target);
        self
    }

    fn size(&self) -> usize {
        3 + self.accept.len() * 2 + (self.edges.len() + usize::from(self.eof.is_some())) * 3
    }
}

// ============================================================================
// BUILDER
// ============================================================================

/// Lays out an explicit automaton as parser tables.
#[derive(Debug, Default)]
pub struct TableBuilder {
    states: Vec<StateSpec>,
    gotos: FxHashMap<u16, Vec<(u32, u32)>>,
    token_states: Vec<TokenState>,
    dialects: Vec<(String, Vec<u16>)>,
    token_prec: Vec<u16>,
}

impl TableBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a parse state, returning its id.
    pub fn state(&mut self, state: StateSpec) -> u32 {
        self.states.push(state);
        (self.states.len() - 1) as u32
    }

    /// After reducing `term` on top of `from`, go to `to`.
    pub fn goto(&mut self, from: u32, term: u16, to: u32) -> &mut Self {
        self.gotos.entry(term).or_default().push((from, to));
        self
    }

    /// Add a token automaton state, returning its id. State 0 is the start.
    pub fn token_state(&mut self, state: TokenState) -> u16 {
        self.token_states.push(state);
        (self.token_states.len() - 1) as u16
    }

    /// A dialect that, unless enabled, disables `terms`.
    pub fn dialect(&mut self, name: impl Into<String>, terms: Vec<u16>) -> &mut Self {
        self.dialects.push((name.into(), terms));
        self
    }

    /// Tokens in precedence order, highest first.
    pub fn token_precedence(&mut self, terms: Vec<u16>) -> &mut Self {
        self.token_prec = terms;
        self
    }

    /// Fill the table fields of `spec`.
    pub fn build(self, mut spec: ParserSpec) -> ParserSpec {
        let mut data: Vec<u16> = Vec::new();
        let mut shared: FxHashMap<Vec<u16>, usize> = FxHashMap::default();
        let mut add_list = |data: &mut Vec<u16>, list: Vec<u16>| -> u32 {
            if let Some(&offset) = shared.get(&list) {
                return offset as u32;
            }
            let offset = data.len();
            data.extend_from_slice(&list);
            shared.insert(list, offset);
            offset as u32
        };

        let mut states = Vec::with_capacity(self.states.len() * parse_state::SIZE);
        for state in &self.states {
            let actions = add_list(&mut data, action_list(&state.actions, state.other));
            let skip = add_list(&mut data, action_list(&state.skip, None));
            let mut flags = 0;
            if state.skipped {
                flags |= state_flag::SKIPPED;
            }
            if state.accepting {
                flags |= state_flag::ACCEPTING;
            }
            states.extend([
                flags,
                actions,
                skip,
                state.tokenizer_mask,
                state.default_reduce.map_or(0, ParseAction::encode),
                state.forced_reduce.map_or(0, ParseAction::encode),
            ]);
        }

        let mut dialects = indexmap::IndexMap::new();
        for (name, terms) in self.dialects {
            dialects.insert(name, data.len());
            data.extend(terms);
            data.push(seq::END);
        }
        let token_prec = data.len();
        data.extend(self.token_prec);
        data.push(seq::END);

        spec.states = TableData::Raw(states);
        spec.state_data = TableData::from(data);
        spec.goto = TableData::from(goto_table(self.gotos));
        spec.token_data = TableData::from(token_table(&self.token_states));
        spec.dialects = dialects;
        spec.token_prec = token_prec;
        spec
    }
}

/// `(term, action lo, action hi)*` followed by an end marker.
fn action_list(actions: &[(u16, ParseAction)], other: Option<ParseAction>) -> Vec<u16> {
    let mut list = Vec::with_capacity(actions.len() * 3 + 4);
    for &(term, action) in actions {
        let value = action.encode();
        list.extend([term, value as u16, (value >> 16) as u16]);
    }
    list.push(seq::END);
    match other {
        Some(action) => {
            let value = action.encode();
            list.extend([seq::OTHER, value as u16, (value >> 16) as u16]);
        }
        None => list.push(seq::DONE),
    }
    list
}

/// `[term count, offset per term, groups]`, where a group is
/// `[count << 1 | last, target, source states...]`.
fn goto_table(gotos: FxHashMap<u16, Vec<(u32, u32)>>) -> Vec<u16> {
    let n_terms = gotos.keys().max().map_or(0, |&max| usize::from(max) + 1);
    let mut table = vec![0u16; n_terms + 1];
    table[0] = n_terms as u16;
    // Terms without gotos share one empty group.
    let none = table.len();
    table.extend([1, seq::END]);

    for term in 0..n_terms {
        let Some(entries) = gotos.get(&(term as u16)) else {
            table[term + 1] = none as u16;
            continue;
        };
        table[term + 1] = table.len() as u16;
        let mut groups: Vec<(u32, Vec<u32>)> = Vec::new();
        for &(from, to) in entries {
            match groups.iter_mut().find(|(target, _)| *target == to) {
                Some((_, sources)) => sources.push(from),
                None => groups.push((to, vec![from])),
            }
        }
        let last = groups.len() - 1;
        for (i, (target, sources)) in groups.into_iter().enumerate() {
            table.push(((sources.len() as u16) << 1) | u16::from(i == last));
            table.push(target as u16);
            table.extend(sources.into_iter().map(|s| s as u16));
        }
    }
    table
}

fn token_table(states: &[TokenState]) -> Vec<u16> {
    let mut offsets = Vec::with_capacity(states.len());
    let mut size = 0;
    for state in states {
        offsets.push(size as u16);
        size += state.size();
    }
    let target = |id: u16| offsets.get(usize::from(id)).copied().unwrap_or(0);

    let mut table = Vec::with_capacity(size);
    for (i, state) in states.iter().enumerate() {
        let acc_end = usize::from(offsets[i]) + 3 + state.accept.len() * 2;
        let mut edges = state.edges.clone();
        edges.sort_by_key(|&(from, _, _)| from);
        let edge_count = edges.len() + usize::from(state.eof.is_some());
        table.extend([state.group_mask, acc_end as u16, edge_count as u16]);
        for &(term, mask) in &state.accept {
            table.extend([term, mask]);
        }
        for (from, to, next) in edges {
            let to = if to >= 0x10000 { 0 } else { to as u16 };
            table.extend([from, to, target(next)]);
        }
        if let Some(next) = state.eof {
            table.extend([seq::END, 0, target(next)]);
        }
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_actions() {
        assert_eq!(ParseAction::Shift(7).encode(), 7);
        assert_eq!(ParseAction::Goto(3).encode(), 3 | GOTO_FLAG);
        let reduce = ParseAction::Reduce { term: 5, depth: 2 }.encode();
        assert_eq!(reduce & 0xffff, 5);
        assert_eq!(reduce >> REDUCE_DEPTH_SHIFT, 2);
        assert!(reduce & REDUCE_FLAG != 0);
        assert!(ParseAction::ReduceRepeat { term: 5, depth: 2 }.encode() & REPEAT_FLAG != 0);
    }

    #[test]
    fn test_identical_lists_are_shared() {
        let mut builder = TableBuilder::new();
        builder.state(StateSpec::new(1).on(3, ParseAction::Shift(1)).skip(4, ParseAction::Skip));
        builder.state(StateSpec::new(1).on(3, ParseAction::Shift(1)).skip(4, ParseAction::Skip));
        let spec = builder.build(ParserSpec::default());
        let states = spec.states.to_u32().unwrap();
        assert_eq!(states[parse_state::ACTIONS], states[parse_state::SIZE + parse_state::ACTIONS]);
        assert_eq!(states[parse_state::SKIP], states[parse_state::SIZE + parse_state::SKIP]);
    }

    #[test]
    fn test_goto_groups() {
        let mut builder = TableBuilder::new();
        builder.goto(0, 2, 5).goto(1, 2, 5).goto(3, 2, 6);
        let spec = builder.build(ParserSpec::default());
        let table = spec.goto.to_u16().unwrap();
        assert_eq!(table[0], 3);
        let offset = usize::from(table[3]);
        assert_eq!(&table[offset..offset + 4], &[4, 5, 0, 1]);
        assert_eq!(&table[offset + 4..offset + 7], &[3, 6, 3]);
    }

    #[test]
    fn test_token_states_use_offsets() {
        let mut builder = TableBuilder::new();
        builder.token_state(TokenState::new(1).byte(b'a', 1));
        builder.token_state(TokenState::new(1).accept(4, 1));
        let spec = builder.build(ParserSpec::default());
        let table = spec.token_data.to_u16().unwrap();
        // Start state: mask, accept end, one edge.
        assert_eq!(&table[..3], &[1, 3, 1]);
        assert_eq!(&table[3..6], &[97, 98, 6]);
        assert_eq!(&table[6..11], &[1, 11, 0, 4, 1]);
    }
}
