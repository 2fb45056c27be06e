//! Context tracking: grammar-supplied state that follows the parse.
//!
//! A [`ContextTracker`] computes a value for every stack as it shifts and
//! reduces (indentation depth, for example). Tokenizers can read it through
//! [`StackView::context`], and strict trackers stamp a hash of it on tree
//! nodes so an incremental parse only reuses nodes parsed in an equal
//! context.

use std::any::Any;
use std::sync::Arc;

use crate::tree::Tree;

use super::input::InputStream;
use super::stack::StackView;

/// A context value. Values are compared by identity; return the same `Arc`
/// to signal "unchanged".
pub type ContextValue = Arc<dyn Any + Send + Sync>;

/// Host-provided context tracking.
pub trait ContextTracker: Send + Sync {
    /// The context at the start of the document.
    fn start(&self) -> ContextValue;

    /// Update the context when a token is shifted.
    fn shift(
        &self,
        context: &ContextValue,
        term: u16,
        stack: &StackView<'_>,
        input: &mut InputStream<'_>,
    ) -> ContextValue {
        let _ = (term, stack, input);
        Arc::clone(context)
    }

    /// Update the context when a nonterminal is reduced.
    fn reduce(
        &self,
        context: &ContextValue,
        term: u16,
        stack: &StackView<'_>,
        input: &mut InputStream<'_>,
    ) -> ContextValue {
        let _ = (term, stack, input);
        Arc::clone(context)
    }

    /// Update the context when a node from a previous parse is reused.
    fn reuse(
        &self,
        context: &ContextValue,
        node: &Arc<Tree>,
        stack: &StackView<'_>,
        input: &mut InputStream<'_>,
    ) -> ContextValue {
        let _ = (node, stack, input);
        Arc::clone(context)
    }

    /// Hash of a context value. Nodes are only reused in a context with the
    /// same hash.
    fn hash(&self, context: &ContextValue) -> u32 {
        let _ = context;
        0
    }

    /// Whether context hashes are recorded on nodes. Non-strict trackers
    /// allow reuse regardless of context.
    fn strict(&self) -> bool {
        true
    }
}

/// A stack's current context with its cached hash.
#[derive(Clone)]
pub(crate) struct StackContext {
    pub tracker: Arc<dyn ContextTracker>,
    pub context: ContextValue,
    pub hash: u32,
}

impl StackContext {
    pub fn new(tracker: Arc<dyn ContextTracker>, context: ContextValue) -> Self {
        let hash = if tracker.strict() {
            tracker.hash(&context)
        } else {
            0
        };
        Self {
            tracker,
            context,
            hash,
        }
    }
}
