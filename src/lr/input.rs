//! Document input and the token-level input stream.
//!
//! Positions are UTF-8 byte offsets. The stream hands tokenizers one byte at
//! a time, skipping over the gaps between parse ranges, and records how far
//! ahead each token scan looked so incremental parses know which nodes an
//! edit can affect.

use std::borrow::Cow;

use crate::base::Range;
use crate::error::{ParseError, Result};

// ============================================================================
// INPUT
// ============================================================================

/// A document that can be parsed.
pub trait Input {
    /// Length in bytes.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bytes starting at `from`. Must be non-empty when `from < len()`.
    fn chunk(&self, from: usize) -> &[u8];

    /// Text of `from..to`. Invalid UTF-8 at the edges is replaced.
    fn read(&self, from: usize, to: usize) -> String;
}

impl Input for &str {
    fn len(&self) -> usize {
        str::len(self)
    }

    fn chunk(&self, from: usize) -> &[u8] {
        self.as_bytes().get(from..).unwrap_or_default()
    }

    fn read(&self, from: usize, to: usize) -> String {
        lossy_slice(self.as_bytes(), from, to).into_owned()
    }
}

impl Input for String {
    fn len(&self) -> usize {
        String::len(self)
    }

    fn chunk(&self, from: usize) -> &[u8] {
        self.as_bytes().get(from..).unwrap_or_default()
    }

    fn read(&self, from: usize, to: usize) -> String {
        lossy_slice(self.as_bytes(), from, to).into_owned()
    }
}

fn lossy_slice(bytes: &[u8], from: usize, to: usize) -> Cow<'_, str> {
    let to = to.min(bytes.len());
    let from = from.min(to);
    String::from_utf8_lossy(&bytes[from..to])
}

// ============================================================================
// CACHED TOKEN
// ============================================================================

/// A token read by a tokenizer, cached per tokenizer in the token cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CachedToken {
    /// Start position, `None` when nothing was read yet.
    pub start: Option<usize>,
    /// Accepted term, or -1.
    pub value: i32,
    pub end: usize,
    /// Alternative term added by an extending specializer, or -1.
    pub extended: i32,
    /// One past the furthest position the tokenizer looked at.
    pub look_ahead: usize,
    /// Tokenizer mask of the state the token was read in.
    pub mask: u32,
    /// Context hash the token was read in.
    pub context: u32,
}

impl Default for CachedToken {
    fn default() -> Self {
        Self {
            start: None,
            value: -1,
            end: 0,
            extended: -1,
            look_ahead: 0,
            mask: 0,
            context: 0,
        }
    }
}

// ============================================================================
// INPUT STREAM
// ============================================================================

/// The byte stream tokenizers read from.
///
/// [`next`](Self::next) is the byte at the current position (or -1 at the
/// end of the parsed ranges). Tokenizers move with [`advance`](Self::advance)
/// and finish by calling [`accept_token`](Self::accept_token).
pub struct InputStream<'a> {
    input: &'a dyn Input,
    ranges: Vec<Range>,
    chunk: &'a [u8],
    chunk_off: usize,
    chunk_pos: usize,
    chunk2: &'a [u8],
    chunk2_pos: usize,
    next: i32,
    pub(crate) token: CachedToken,
    pos: usize,
    end: usize,
    range_index: usize,
    range: Range,
}

impl<'a> InputStream<'a> {
    /// Create a stream over `ranges` of `input`. `ranges` must be non-empty.
    pub(crate) fn new(input: &'a dyn Input, ranges: Vec<Range>) -> Self {
        let first = ranges.first().copied().unwrap_or_default();
        let end = ranges.last().map_or(0, |r| r.to);
        let mut stream = Self {
            input,
            ranges,
            chunk: &[],
            chunk_off: 0,
            chunk_pos: first.from,
            chunk2: &[],
            chunk2_pos: 0,
            next: -1,
            token: CachedToken::default(),
            pos: first.from,
            end,
            range_index: 0,
            range: first,
        };
        stream.read_next();
        stream
    }

    /// The byte at the current position, or -1.
    pub fn next(&self) -> i32 {
        self.next
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    /// End of the last parse range.
    pub fn end(&self) -> usize {
        self.end
    }

    /// Start of the token being read.
    pub fn token_start(&self) -> usize {
        self.token.start.unwrap_or(self.pos)
    }

    /// Map a relative offset to a document position, skipping range gaps.
    fn resolve_offset(&self, offset: isize, assoc: i8) -> Option<usize> {
        let mut range = self.range;
        let mut index = self.range_index;
        let mut pos = self.pos as isize + offset;
        while pos < range.from as isize {
            if index == 0 {
                return None;
            }
            index -= 1;
            let next = self.ranges[index];
            pos -= range.from as isize - next.to as isize;
            range = next;
        }
        while if assoc < 0 {
            pos > range.to as isize
        } else {
            pos >= range.to as isize
        } {
            if index + 1 >= self.ranges.len() {
                return None;
            }
            index += 1;
            let next = self.ranges[index];
            pos += next.from as isize - range.to as isize;
            range = next;
        }
        usize::try_from(pos).ok()
    }

    /// Move a position that falls between ranges to the start of the next
    /// range.
    pub(crate) fn clip_pos(&self, pos: usize) -> usize {
        if pos >= self.range.from && pos < self.range.to {
            return pos;
        }
        for range in &self.ranges {
            if range.to > pos {
                return pos.max(range.from);
            }
        }
        self.end
    }

    /// End of the character starting at `pos`, for one-character error
    /// tokens.
    pub(crate) fn char_end(&self, pos: usize) -> usize {
        let mut end = self.clip_pos(pos + 1);
        while end < self.end {
            match self.input.chunk(end).first() {
                Some(byte) if byte & 0xc0 == 0x80 => end = self.clip_pos(end + 1),
                _ => break,
            }
        }
        end
    }

    /// Look at the byte `offset` bytes from the current position, without
    /// moving.
    pub fn peek(&mut self, offset: isize) -> i32 {
        let idx = self.chunk_off as isize + offset;
        let (pos, result) = if idx >= 0 && (idx as usize) < self.chunk.len() {
            ((self.pos as isize + offset) as usize, i32::from(self.chunk[idx as usize]))
        } else {
            let Some(pos) = self.resolve_offset(offset, 1) else {
                return -1;
            };
            if pos >= self.chunk2_pos && pos < self.chunk2_pos + self.chunk2.len() {
                (pos, i32::from(self.chunk2[pos - self.chunk2_pos]))
            } else {
                let mut i = self.range_index;
                let mut range = self.range;
                while range.to <= pos && i + 1 < self.ranges.len() {
                    i += 1;
                    range = self.ranges[i];
                }
                let mut chunk = self.input.chunk(pos);
                if pos + chunk.len() > range.to {
                    chunk = &chunk[..range.to.saturating_sub(pos).min(chunk.len())];
                }
                self.chunk2 = chunk;
                self.chunk2_pos = pos;
                (pos, chunk.first().map_or(-1, |&b| i32::from(b)))
            }
        };
        if pos >= self.token.look_ahead {
            self.token.look_ahead = pos + 1;
        }
        result
    }

    /// Accept a token ending `end_offset` bytes from the current position.
    pub fn accept_token(&mut self, term: u16, end_offset: isize) -> Result<()> {
        let end = if end_offset != 0 {
            self.resolve_offset(end_offset, -1)
        } else {
            Some(self.pos)
        };
        match end {
            Some(end) if self.token.start.is_none_or(|start| end >= start) => {
                self.token.value = i32::from(term);
                self.token.end = end;
                Ok(())
            }
            _ => Err(ParseError::TokenOutOfBounds {
                start: self.token_start(),
                end,
            }),
        }
    }

    /// Accept a token ending at an absolute position.
    pub fn accept_token_to(&mut self, term: u16, end: usize) {
        self.token.value = i32::from(term);
        self.token.end = end;
    }

    fn get_chunk(&mut self) {
        if self.pos >= self.chunk2_pos && self.pos < self.chunk2_pos + self.chunk2.len() {
            std::mem::swap(&mut self.chunk, &mut self.chunk2);
            std::mem::swap(&mut self.chunk_pos, &mut self.chunk2_pos);
            self.chunk_off = self.pos - self.chunk_pos;
        } else {
            self.chunk2 = self.chunk;
            self.chunk2_pos = self.chunk_pos;
            let next = self.input.chunk(self.pos);
            let limit = self.range.to.saturating_sub(self.pos);
            self.chunk = if next.len() > limit { &next[..limit] } else { next };
            self.chunk_pos = self.pos;
            self.chunk_off = 0;
        }
    }

    fn read_next(&mut self) -> i32 {
        if self.chunk_off >= self.chunk.len() {
            self.get_chunk();
            if self.chunk_off >= self.chunk.len() {
                self.next = -1;
                return -1;
            }
        }
        self.next = i32::from(self.chunk[self.chunk_off]);
        self.next
    }

    /// Move `n` bytes forward and return the new [`next`](Self::next).
    pub fn advance(&mut self, n: usize) -> i32 {
        let mut n = n;
        self.chunk_off += n;
        while self.pos + n >= self.range.to {
            if self.range_index + 1 >= self.ranges.len() {
                return self.set_done();
            }
            n -= self.range.to - self.pos;
            self.range_index += 1;
            self.range = self.ranges[self.range_index];
            self.pos = self.range.from;
        }
        self.pos += n;
        if self.pos >= self.token.look_ahead {
            self.token.look_ahead = self.pos + 1;
        }
        self.read_next()
    }

    fn set_done(&mut self) -> i32 {
        self.pos = self.end;
        self.chunk_pos = self.end;
        self.range_index = self.ranges.len().saturating_sub(1);
        self.range = self.ranges.last().copied().unwrap_or_default();
        self.chunk = &[];
        self.chunk_off = 0;
        self.next = -1;
        -1
    }

    /// Move to `pos`, starting a fresh token there if `token` is given.
    pub(crate) fn reset(&mut self, pos: usize, token: Option<CachedToken>) -> &mut Self {
        self.token = match token {
            Some(mut token) => {
                token.start = Some(pos);
                token.look_ahead = pos + 1;
                token.value = -1;
                token.extended = -1;
                token
            }
            None => CachedToken::default(),
        };
        if self.pos != pos {
            self.pos = pos;
            if pos >= self.end {
                self.set_done();
                return self;
            }
            while pos < self.range.from && self.range_index > 0 {
                self.range_index -= 1;
                self.range = self.ranges[self.range_index];
            }
            while pos >= self.range.to && self.range_index + 1 < self.ranges.len() {
                self.range_index += 1;
                self.range = self.ranges[self.range_index];
            }
            if pos >= self.chunk_pos && pos < self.chunk_pos + self.chunk.len() {
                self.chunk_off = pos - self.chunk_pos;
            } else {
                self.chunk = &[];
                self.chunk_off = 0;
            }
            self.read_next();
        }
        self
    }

    /// Text of `from..to`, leaving out gaps between ranges.
    pub fn read(&self, from: usize, to: usize) -> String {
        if from >= self.chunk_pos && to <= self.chunk_pos + self.chunk.len() {
            return lossy_slice(self.chunk, from - self.chunk_pos, to - self.chunk_pos).into_owned();
        }
        if from >= self.chunk2_pos && to <= self.chunk2_pos + self.chunk2.len() {
            return lossy_slice(self.chunk2, from - self.chunk2_pos, to - self.chunk2_pos).into_owned();
        }
        if from >= self.range.from && to <= self.range.to {
            return self.input.read(from, to);
        }
        let mut result = String::new();
        for range in &self.ranges {
            if range.from >= to {
                break;
            }
            if range.to > from {
                result.push_str(&self.input.read(range.from.max(from), range.to.min(to)));
            }
        }
        result
    }
}
