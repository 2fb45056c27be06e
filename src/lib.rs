//! # strand-lr
//!
//! Incremental, error-tolerant LR parsing driven by precomputed tables.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! lr     → Parser tables, tokenizers, stacks, the incremental parse driver
//!   ↓
//! tree   → Immutable syntax trees, cursors, fragments for reuse
//!   ↓
//! error  → ParseError and Result
//!   ↓
//! base   → Primitives (Range, ChangedRange, TextRange)
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! let parser = LrParser::deserialize(spec)?;
//! let tree = parser.parse("let x;")?;
//!
//! // After an edit, reuse what is still valid.
//! let fragments = TreeFragment::add_tree(tree, &[], false);
//! let fragments = TreeFragment::apply_changes(&fragments, &[ChangedRange::new(4, 5, 4, 7)]);
//! let tree = parser.start_parse(&"let xyz;", &fragments, &[])?.finish()?;
//! ```

// ============================================================================
// MODULES (dependency order: base → error → tree → lr)
// ============================================================================

/// Foundation types: Range, ChangedRange, TextRange
pub mod base;

/// Error type shared by all modules
pub mod error;

/// Syntax trees: Tree, TreeBuffer, NodeType, cursors, fragments
pub mod tree;

/// The LR runtime: LrParser, Parse, tokenizers, context tracking
pub mod lr;

// Re-export commonly needed items
pub use base::{ChangedRange, Range, TextRange, TextSize};
pub use error::{ParseError, Result};
pub use lr::{
    ContextTracker, ExternalTokenizer, Input, InputStream, LrParser, Parse, ParserConfig, ParserSpec,
    StackView, TableBuilder, Tokenizer,
};
pub use tree::{IterMode, NodeProp, NodeSet, NodeType, SyntaxNode, Tree, TreeCursor, TreeFragment};
