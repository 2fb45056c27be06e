//! Compact, immutable syntax trees.
//!
//! ## Representation
//!
//! ```text
//! Tree ──children──► Tree | TreeBuffer
//!   │                        │
//!   │ NodeType (shared)      └─ flat u16 quadruples: (type, start, end, endIndex)
//!   └ per-node props (ContextHash, LookAhead)
//! ```
//!
//! Trees are shared freely (they are immutable and reference counted).
//! Dense subtrees without notable props are stored as a [`TreeBuffer`], one
//! allocation for the whole subtree. Navigation happens through
//! [`SyntaxNode`] views and [`TreeCursor`], which add parent links without
//! storing them in the tree.
//!
//! ## Incremental reuse
//!
//! [`TreeFragment`] records which ranges of an old tree are still valid after
//! a set of edits, so a new parse can splice those subtrees in unchanged.

mod balance;
mod build;
mod cursor;
mod fragment;
mod green;
mod node;
mod node_type;
#[allow(clippy::module_inception)]
mod tree;


pub use build::{BufferCursor, BuildData, FlatBufferCursor};
pub use cursor::TreeCursor;
pub use fragment::{DEFAULT_MIN_GAP, TreeFragment};
pub use green::{GAP_KIND, RowanNode, StrandLanguage, to_green};
pub use node::{BufferNode, IterMode, NodeCache, Side, SyntaxNode, TreeNode};
pub use node_type::{NodeProp, NodeSet, NodeType, NodeTypeSpec, PropSource, PropValue, prop_source};
pub use tree::{Child, DEFAULT_BUFFER_LENGTH, Tree, TreeBuffer};
