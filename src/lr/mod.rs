//! The incremental LR runtime.
//!
//! ## Pipeline
//!
//! ```text
//! ParserSpec ──deserialize──► LrParser ──start_parse──► Parse ──advance*──► Tree
//!                                │                        │
//!                                │                        ├─ Stack (one per parse branch)
//!                                │                        ├─ TokenCache → Tokenizer*
//!                                │                        └─ FragmentCursor (reuse)
//!                                └─ configure → LrParser (variant)
//! ```
//!
//! Parsing is GLR-like: when a state has several actions for a token, the
//! stack is split and the branches advance in lock step, ordered by
//! position. Branches that reach the same state at the same position are
//! merged, keeping the better-scored one. When every branch is stuck, error
//! recovery tries deleting tokens, inserting tokens and forcing reductions,
//! each at a score penalty.

pub mod constants;
mod context;
mod decode;
mod fragment_cursor;
mod input;
mod parse;
mod parser;
mod spec;
mod stack;
mod tables;
mod token;
mod token_cache;
mod tuning;

#[cfg(test)]
mod tests;

pub use context::{ContextTracker, ContextValue};
pub use decode::{decode_array, decode_array_u16, encode_array};
pub use input::{Input, InputStream};
pub use parse::Parse;
pub use parser::{Dialect, LrParser, ParserConfig};
pub use spec::{
    NodePropSpec, ParserSpec, SpecializeFn, Specialization, SpecializerSpec, TableData, TokenizerSpec,
};
pub use stack::StackView;
pub use tables::{ParseAction, StateSpec, TableBuilder, TokenState};
pub use token::{ExternalTokenizer, TokenGroup, Tokenizer};
pub use tuning::RecoveryTuning;
