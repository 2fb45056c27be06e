//! Error types for tree construction and parsing.

use thiserror::Error;

/// Errors produced by the tree builder and the LR runtime.
///
/// Malformed *input text* is never an error: it produces a tree with error
/// nodes. These variants cover misuse of the API, malformed tables, and the
/// opt-in strict mode.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Strict mode found no action for any stack.
    #[error("No parse at {pos}")]
    Syntax { pos: usize },

    /// The parse tables were produced for a different table format.
    #[error("Parser version ({found}) doesn't match runtime version ({expected})")]
    Version { found: u32, expected: u32 },

    /// A tokenizer accepted a token that ends before it starts.
    #[error("Token end out of bounds: token starts at {start}, end resolved to {end:?}")]
    TokenOutOfBounds { start: usize, end: Option<usize> },

    /// `stop_at` was called with a position after the current stop.
    #[error("Can't move stoppedAt forward (from {current} to {requested})")]
    StopAtForward { current: usize, requested: usize },

    /// A configuration referred to a top rule the grammar doesn't have.
    #[error("Invalid top rule name {0}")]
    UnknownTopRule(String),

    /// A build buffer contained an unknown negative record size.
    #[error("Unrecognized record size: {0}")]
    InvalidRecord(i64),

    /// A node prop value could not be parsed.
    #[error("Invalid value for {prop} prop: {value:?}")]
    InvalidProp { prop: &'static str, value: String },

    /// A base-46 table string was malformed.
    #[error("Invalid table encoding: {0}")]
    Decode(String),

    /// A node set was created with types whose ids don't match their index.
    #[error("Node type ids should correspond to array positions (type {id} at index {index})")]
    NodeSetMismatch { index: usize, id: u16 },

    /// Parse ranges were empty, unsorted, or overlapping.
    #[error("Parse ranges must be non-empty, sorted, and non-overlapping")]
    InvalidRanges,
}

impl ParseError {
    /// Create a syntax error at a position.
    pub fn syntax(pos: usize) -> Self {
        Self::Syntax { pos }
    }

    /// Create a table decoding error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Create a prop deserialization error.
    pub fn invalid_prop(prop: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidProp {
            prop,
            value: value.into(),
        }
    }

    /// Whether this error describes the input text rather than API misuse.
    pub fn is_syntax(&self) -> bool {
        matches!(self, Self::Syntax { .. })
    }
}

/// Result alias used throughout the crate.
pub type Result<T, E = ParseError> = std::result::Result<T, E>;
