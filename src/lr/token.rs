//! Tokenizers.
//!
//! A parser has an ordered list of tokenizers. Each state's tokenizer mask
//! selects which of them run there:
//! - [`TokenGroup`] - runs one group of the table-driven token automaton
//! - [`ExternalTokenizer`] - runs a host callback

use std::fmt;
use std::sync::Arc;

use crate::error::Result;

use super::constants::seq;
use super::input::InputStream;
use super::stack::StackView;

/// Something that reads tokens from an [`InputStream`].
///
/// A tokenizer reads from the current position and calls
/// [`InputStream::accept_token`] when it recognizes a token. Returning
/// without accepting means no token.
pub trait Tokenizer: Send + Sync {
    fn token(&self, input: &mut InputStream<'_>, stack: &StackView<'_>) -> Result<()>;

    /// The result depends on the stack, so it can't be cached by position.
    fn contextual(&self) -> bool {
        false
    }

    /// Only runs (and only yields actions) when earlier tokenizers produced
    /// no usable token.
    fn fallback(&self) -> bool {
        false
    }

    /// Later tokenizers still run after this one produced a token.
    fn extend(&self) -> bool {
        false
    }
}

// ============================================================================
// TOKEN GROUP
// ============================================================================

/// A group of the shared token automaton.
#[derive(Clone)]
pub struct TokenGroup {
    data: Arc<[u16]>,
    id: u32,
}

impl TokenGroup {
    pub fn new(data: Arc<[u16]>, id: u32) -> Self {
        Self { data, id }
    }

    pub fn id(&self) -> u32 {
        self.id
    }
}

impl fmt::Debug for TokenGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenGroup").field("id", &self.id).finish()
    }
}

impl Tokenizer for TokenGroup {
    fn token(&self, input: &mut InputStream<'_>, stack: &StackView<'_>) -> Result<()> {
        let parser = stack.parser();
        read_token(
            &self.data,
            input,
            stack,
            self.id,
            parser.data(),
            parser.token_prec_table(),
        )
    }
}

/// Run the token automaton for `group` from the current input position.
///
/// Each state is laid out as `[group mask, accept end, edge count,
/// (term, group mask)*, (from, to, target)*]`. Edges are sorted byte
/// ranges; `to == 0` means "up to and including 0xffff", and an edge from
/// [`seq::END`] matches the end of input.
fn read_token(
    data: &[u16],
    input: &mut InputStream<'_>,
    stack: &StackView<'_>,
    group: u32,
    prec_table: &[u16],
    prec_offset: usize,
) -> Result<()> {
    let at = |i: usize| u32::from(data.get(i).copied().unwrap_or(0));
    let group_mask = 1u32 << group;
    let mut state = 0usize;
    'scan: loop {
        if group_mask & at(state) == 0 {
            break;
        }
        let acc_end = at(state + 1) as usize;
        let mut i = state + 3;
        while i < acc_end {
            if at(i + 1) & group_mask > 0 {
                let term = at(i) as u16;
                let current = input.token.value;
                if stack.dialect_enabled_term(term)
                    && (current == -1
                        || current == i32::from(term)
                        || overrides(term, current as u16, prec_table, prec_offset))
                {
                    input.accept_token(term, 0)?;
                    break;
                }
            }
            i += 2;
        }
        let next = input.next();
        let mut low = 0usize;
        let mut high = at(state + 2) as usize;
        if next < 0 && high > low && at(acc_end + high * 3 - 3) == u32::from(seq::END) {
            state = at(acc_end + high * 3 - 1) as usize;
            continue 'scan;
        }
        while low < high {
            let mid = (low + high) >> 1;
            let index = acc_end + mid * 3;
            let from = at(index) as i32;
            let to = match at(index + 1) {
                0 => 0x10000,
                to => to as i32,
            };
            if next < from {
                high = mid;
            } else if next >= to {
                low = mid + 1;
            } else {
                state = at(index + 2) as usize;
                input.advance(1);
                continue 'scan;
            }
        }
        break;
    }
    Ok(())
}

/// Index of `term` in the [`seq::END`]-terminated list at `start`.
pub(crate) fn find_offset(data: &[u16], start: usize, term: u16) -> Option<usize> {
    data.get(start..)?
        .iter()
        .take_while(|&&next| next != seq::END)
        .position(|&next| next == term)
}

/// Whether `token` has precedence over `prev` in the precedence table.
/// Tokens missing from the table rank before every listed token.
pub(crate) fn overrides(token: u16, prev: u16, table: &[u16], offset: usize) -> bool {
    match find_offset(table, offset, prev) {
        None => true,
        Some(i_prev) => find_offset(table, offset, token).is_none_or(|i| i < i_prev),
    }
}

// ============================================================================
// EXTERNAL TOKENIZER
// ============================================================================

type TokenizeFn = dyn Fn(&mut InputStream<'_>, &StackView<'_>) -> Result<()> + Send + Sync;

/// A tokenizer implemented by a host callback.
pub struct ExternalTokenizer {
    token: Box<TokenizeFn>,
    contextual: bool,
    fallback: bool,
    extend: bool,
}

impl ExternalTokenizer {
    pub fn new<F>(token: F) -> Self
    where
        F: Fn(&mut InputStream<'_>, &StackView<'_>) -> Result<()> + Send + Sync + 'static,
    {
        Self {
            token: Box::new(token),
            contextual: false,
            fallback: false,
            extend: false,
        }
    }

    pub fn with_contextual(mut self, contextual: bool) -> Self {
        self.contextual = contextual;
        self
    }

    pub fn with_fallback(mut self, fallback: bool) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_extend(mut self, extend: bool) -> Self {
        self.extend = extend;
        self
    }
}

impl fmt::Debug for ExternalTokenizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalTokenizer")
            .field("contextual", &self.contextual)
            .field("fallback", &self.fallback)
            .field("extend", &self.extend)
            .finish_non_exhaustive()
    }
}

impl Tokenizer for ExternalTokenizer {
    fn token(&self, input: &mut InputStream<'_>, stack: &StackView<'_>) -> Result<()> {
        (self.token)(input, stack)
    }

    fn contextual(&self) -> bool {
        self.contextual
    }

    fn fallback(&self) -> bool {
        self.fallback
    }

    fn extend(&self) -> bool {
        self.extend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_offset() {
        let data = [9, 3, 5, 7, seq::END, 3];
        assert_eq!(find_offset(&data, 1, 5), Some(1));
        assert_eq!(find_offset(&data, 1, 3), Some(0));
        assert_eq!(find_offset(&data, 1, 9), None);
        assert_eq!(find_offset(&data, 10, 3), None);
    }

    #[test]
    fn test_overrides_by_table_order() {
        let table = [4, 2, seq::END];
        assert!(overrides(4, 2, &table, 0));
        assert!(!overrides(2, 4, &table, 0));
        // A previous token outside the table is always overridden.
        assert!(overrides(2, 8, &table, 0));
        // So is a listed token, by one outside the table.
        assert!(overrides(8, 2, &table, 0));
        assert!(overrides(8, 4, &table, 0));
    }
}
