//! The serialized form of a parser, as produced by a grammar generator or by
//! [`TableBuilder`](super::TableBuilder).

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::error::{ParseError, Result};
use crate::tree::{NodeProp, PropSource};

use super::constants::FILE_VERSION;
use super::context::ContextTracker;
use super::decode::decode_array;
use super::stack::StackView;
use super::token::Tokenizer;

// ============================================================================
// TABLE DATA
// ============================================================================

/// A table payload: either base-46 encoded text or plain values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableData {
    Encoded(String),
    Raw(Vec<u32>),
}

impl Default for TableData {
    fn default() -> Self {
        Self::Raw(Vec::new())
    }
}

impl TableData {
    pub(crate) fn to_u32(&self) -> Result<Vec<u32>> {
        match self {
            Self::Encoded(text) => decode_array(text),
            Self::Raw(values) => Ok(values.clone()),
        }
    }

    pub(crate) fn to_u16(&self) -> Result<Vec<u16>> {
        self.to_u32()?
            .into_iter()
            .map(|value| {
                u16::try_from(value)
                    .map_err(|_| ParseError::decode(format!("value {value} exceeds 16 bits")))
            })
            .collect()
    }
}

impl From<&str> for TableData {
    fn from(value: &str) -> Self {
        Self::Encoded(value.to_string())
    }
}

impl From<Vec<u32>> for TableData {
    fn from(value: Vec<u32>) -> Self {
        Self::Raw(value)
    }
}

impl From<Vec<u16>> for TableData {
    fn from(value: Vec<u16>) -> Self {
        Self::Raw(value.into_iter().map(u32::from).collect())
    }
}

// ============================================================================
// TOKENIZERS AND SPECIALIZERS
// ============================================================================

/// A tokenizer slot: a group of the table-driven token automaton, or a host
/// tokenizer.
#[derive(Clone)]
pub enum TokenizerSpec {
    Group(u32),
    External(Arc<dyn Tokenizer>),
}

impl fmt::Debug for TokenizerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group(id) => write!(f, "Group({id})"),
            Self::External(_) => f.write_str("External"),
        }
    }
}

/// Result of a specializer lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Specialization {
    /// Replace the generic token with this term.
    Specialize(u16),
    /// Add this term as an alternative to the generic token.
    Extend(u16),
}

impl Specialization {
    pub fn term(self) -> u16 {
        match self {
            Self::Specialize(term) | Self::Extend(term) => term,
        }
    }
}

/// Specializer callback: maps a token's text to a more specific term.
pub type SpecializeFn =
    Arc<dyn Fn(&str, &StackView<'_>) -> Option<Specialization> + Send + Sync>;

/// A specializer for tokens of `term`.
#[derive(Clone)]
pub struct SpecializerSpec {
    pub term: u16,
    pub get: SpecializeFn,
}

impl SpecializerSpec {
    /// A keyword table: exact token texts mapped to specializations.
    pub fn keywords<I, S>(term: u16, entries: I) -> Self
    where
        I: IntoIterator<Item = (S, Specialization)>,
        S: Into<String>,
    {
        let table: FxHashMap<String, Specialization> =
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self {
            term,
            get: Arc::new(move |text, _| table.get(text).copied()),
        }
    }

    /// A host function.
    pub fn external<F>(term: u16, get: F) -> Self
    where
        F: Fn(&str, &StackView<'_>) -> Option<Specialization> + Send + Sync + 'static,
    {
        Self {
            term,
            get: Arc::new(get),
        }
    }
}

impl fmt::Debug for SpecializerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpecializerSpec").field("term", &self.term).finish_non_exhaustive()
    }
}

// ============================================================================
// PARSER SPEC
// ============================================================================

/// Values of one per-type prop, as `(node id, serialized value)` pairs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodePropSpec {
    pub prop: NodeProp,
    pub assignments: Vec<(u16, String)>,
}

/// Everything needed to construct an [`LrParser`](super::LrParser).
#[derive(Clone)]
pub struct ParserSpec {
    /// Table format version. Must equal [`FILE_VERSION`].
    pub version: u32,
    /// State records, [`parse_state::SIZE`](super::constants::parse_state::SIZE)
    /// slots each.
    pub states: TableData,
    /// Action lists, skip lists, dialect lists and the precedence table.
    pub state_data: TableData,
    pub goto: TableData,
    /// Space-separated node names, indexed by term id. Empty names are
    /// anonymous.
    pub node_names: String,
    pub max_term: u16,
    /// Number of anonymous repeat node types appended after the named ones.
    pub repeat_node_count: u16,
    pub node_props: Vec<NodePropSpec>,
    pub prop_sources: Vec<PropSource>,
    pub skipped_nodes: Vec<u16>,
    pub token_data: TableData,
    pub tokenizers: Vec<TokenizerSpec>,
    /// Named top rules as `(start state, top term)`. The first is the default.
    pub top_rules: IndexMap<String, (u32, u16)>,
    pub context: Option<Arc<dyn ContextTracker>>,
    /// Dialect names mapped to the offset of their term list in `state_data`.
    pub dialects: IndexMap<String, usize>,
    pub dynamic_precedences: FxHashMap<u16, i32>,
    pub specialized: Vec<SpecializerSpec>,
    /// Offset of the token precedence table in `state_data`.
    pub token_prec: usize,
    pub term_names: Option<FxHashMap<u16, String>>,
}

impl Default for ParserSpec {
    fn default() -> Self {
        Self {
            version: FILE_VERSION,
            states: TableData::default(),
            state_data: TableData::default(),
            goto: TableData::default(),
            node_names: String::new(),
            max_term: 0,
            repeat_node_count: 0,
            node_props: Vec::new(),
            prop_sources: Vec::new(),
            skipped_nodes: Vec::new(),
            token_data: TableData::default(),
            tokenizers: Vec::new(),
            top_rules: IndexMap::new(),
            context: None,
            dialects: IndexMap::new(),
            dynamic_precedences: FxHashMap::default(),
            specialized: Vec::new(),
            token_prec: 0,
            term_names: None,
        }
    }
}

impl fmt::Debug for ParserSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserSpec")
            .field("version", &self.version)
            .field("max_term", &self.max_term)
            .field("top_rules", &self.top_rules)
            .field("tokenizers", &self.tokenizers)
            .finish_non_exhaustive()
    }
}
