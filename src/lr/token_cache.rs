//! Per-parse token cache.
//!
//! Stacks at the same position in the same state usually want the same
//! tokens, so each tokenizer's last result is kept and reused while the
//! position, tokenizer mask and context hash match.

use std::sync::Arc;

use crate::error::Result;

use super::constants::{LOOKAHEAD_MARGIN, pair, parse_state, seq, term};
use super::input::CachedToken;
use super::parse::ParseEnv;
use super::parser::LrParser;
use super::spec::Specialization;
use super::stack::{Stack, StackView};
use super::token::Tokenizer;

/// A candidate action: `(action, term, token end)`.
pub(crate) type TokenAction = (u32, u16, usize);

pub(crate) struct TokenCache {
    tokens: Vec<CachedToken>,
    main_token: Option<CachedToken>,
    actions: Vec<TokenAction>,
}

impl TokenCache {
    pub fn new(parser: &LrParser) -> Self {
        Self {
            tokens: vec![CachedToken::default(); parser.tokenizers().len()],
            main_token: None,
            actions: Vec::new(),
        }
    }

    pub fn clear_main_token(&mut self) {
        self.main_token = None;
    }

    /// Start of the token the last actions were computed for.
    pub fn main_token_start(&self) -> Option<usize> {
        self.main_token.as_ref().and_then(|token| token.start)
    }

    /// The actions available to `stack` for the tokens at its position.
    pub fn get_actions(&mut self, stack: &mut Stack, env: &mut ParseEnv<'_>) -> Result<&[TokenAction]> {
        let parser = Arc::clone(&env.parser);
        self.actions.clear();
        let mut main: Option<CachedToken> = None;
        let mask = parser.state_slot(stack.state, parse_state::TOKENIZER_MASK);
        let context = stack.cur_context.as_ref().map_or(0, |cx| cx.hash);
        let mut look_ahead = 0;

        for (i, tokenizer) in parser.tokenizers().iter().enumerate() {
            if i >= 32 || (1u32 << i) & mask == 0 {
                continue;
            }
            if main.is_some() && !tokenizer.fallback() {
                continue;
            }
            let cached = &self.tokens[i];
            if tokenizer.contextual()
                || cached.start != Some(stack.pos)
                || cached.mask != mask
                || cached.context != context
            {
                self.update_cached_token(i, tokenizer.as_ref(), stack, env)?;
                let token = &mut self.tokens[i];
                token.mask = mask;
                token.context = context;
            }
            let token = self.tokens[i].clone();
            if token.look_ahead > token.end + LOOKAHEAD_MARGIN {
                look_ahead = look_ahead.max(token.look_ahead);
            }

            if token.value != i32::from(term::ERR) {
                let start_len = self.actions.len();
                if token.extended > -1 {
                    self.add_actions(stack, &parser, token.extended as u16, token.end);
                }
                self.add_actions(stack, &parser, token.value as u16, token.end);
                if !tokenizer.extend() {
                    let produced = self.actions.len() > start_len;
                    main = Some(token);
                    if produced {
                        break;
                    }
                }
            }
        }

        if look_ahead > 0 {
            stack.set_look_ahead(look_ahead);
        }
        if main.is_none() && stack.pos == env.stream.end() {
            let eof = CachedToken {
                start: Some(stack.pos),
                value: i32::from(parser.eof_term()),
                end: stack.pos,
                ..CachedToken::default()
            };
            self.add_actions(stack, &parser, parser.eof_term(), stack.pos);
            main = Some(eof);
        }
        self.main_token = main;
        Ok(&self.actions)
    }

    /// The token `stack` is stuck on, as `(term, end)`. Without a main token
    /// this is a one-character error token (or end of input).
    pub fn get_main_token(&self, stack: &Stack, env: &ParseEnv<'_>) -> (u16, usize) {
        if let Some(main) = &self.main_token {
            return (main.value.max(0) as u16, main.end);
        }
        let end = env.stream.end();
        if stack.pos >= end {
            (env.parser.eof_term(), end)
        } else {
            (term::ERR, env.stream.char_end(stack.pos).min(end))
        }
    }

    fn update_cached_token(
        &mut self,
        index: usize,
        tokenizer: &dyn Tokenizer,
        stack: &Stack,
        env: &mut ParseEnv<'_>,
    ) -> Result<()> {
        let start = env.stream.clip_pos(stack.pos);
        let previous = std::mem::take(&mut self.tokens[index]);
        {
            let input = env.stream.reset(start, Some(previous));
            tokenizer.token(input, &StackView::new(stack, &env.parser))?;
        }
        let mut token = std::mem::take(&mut env.stream.token);
        if token.value > -1 {
            let view = StackView::new(stack, &env.parser);
            let text = env.stream.read(start, token.end);
            for get in env.parser.specializers_for(token.value as u16) {
                let Some(result) = (**get)(&text, &view) else {
                    continue;
                };
                if env.parser.dialect().allows(result.term()) {
                    match result {
                        Specialization::Specialize(term) => token.value = i32::from(term),
                        Specialization::Extend(term) => token.extended = i32::from(term),
                    }
                    break;
                }
            }
        } else {
            token.value = i32::from(term::ERR);
            token.end = env.stream.char_end(start);
        }
        self.tokens[index] = token;
        Ok(())
    }

    fn put_action(&mut self, action: u32, term: u16, end: usize) {
        if self.actions.iter().any(|&(a, _, _)| a == action) {
            return;
        }
        self.actions.push((action, term, end));
    }

    fn add_actions(&mut self, stack: &Stack, parser: &LrParser, token: u16, end: usize) {
        let data = parser.data();
        let at = |i: usize| data.get(i).copied().unwrap_or(seq::END);
        for slot in [parse_state::ACTIONS, parse_state::SKIP] {
            if parser.state_count() <= stack.state as usize {
                return;
            }
            let mut i = parser.state_slot(stack.state, slot) as usize;
            loop {
                if at(i) == seq::END {
                    if at(i + 1) == seq::NEXT {
                        i = pair(data, i + 2) as usize;
                    } else {
                        if self.actions.is_empty() && at(i + 1) == seq::OTHER {
                            self.put_action(pair(data, i + 2), token, end);
                        }
                        break;
                    }
                }
                if at(i) == token {
                    self.put_action(pair(data, i + 1), token, end);
                }
                i += 3;
            }
        }
    }
}
