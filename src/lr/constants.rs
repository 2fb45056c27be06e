//! Encoding constants shared by the parse tables and the runtime.

/// Parse action encoding.
///
/// A shift action is the target state. A reduce action has [`REDUCE_FLAG`]
/// set, the reduced term in the low 16 bits and the number of popped frames
/// above [`REDUCE_DEPTH_SHIFT`].
pub mod action {
    pub const REDUCE_FLAG: u32 = 1 << 16;
    pub const VALUE_MASK: u32 = 0xffff;
    pub const REDUCE_DEPTH_SHIFT: u32 = 19;
    /// On reduce: the reduced term is a repeat term that still gets a node.
    pub const REPEAT_FLAG: u32 = 1 << 17;
    /// On shift: push the target state without consuming input.
    pub const GOTO_FLAG: u32 = 1 << 17;
    /// On shift: consume the token without changing state (skipped tokens).
    /// On reduce: go back to the state below the popped frames.
    pub const STAY_FLAG: u32 = 1 << 18;
}

/// Flags stored in a state's first slot.
pub mod state_flag {
    /// The state is inside a skip rule.
    pub const SKIPPED: u32 = 1;
    /// Reaching this state at the end of input finishes the parse.
    pub const ACCEPTING: u32 = 2;
}

/// Low bit of a specializer result.
pub mod specialize {
    pub const SPECIALIZE: u32 = 0;
    pub const EXTEND: u32 = 1;
}

/// Term ids with a fixed meaning.
pub mod term {
    /// The error term, also the id of the error node type.
    pub const ERR: u16 = 0;
}

/// Markers in the action and list data.
pub mod seq {
    /// Ends a list.
    pub const END: u16 = 0xffff;
    /// After [`END`]: the list is done.
    pub const DONE: u16 = 0;
    /// After [`END`]: continue at the offset stored in the next two slots.
    pub const NEXT: u16 = 1;
    /// After [`END`]: the action stored in the next two slots applies to any
    /// other term.
    pub const OTHER: u16 = 2;
}

/// Slots of a state record.
pub mod parse_state {
    pub const FLAGS: usize = 0;
    pub const ACTIONS: usize = 1;
    pub const SKIP: usize = 2;
    pub const TOKENIZER_MASK: usize = 3;
    pub const DEFAULT_REDUCE: usize = 4;
    pub const FORCED_REDUCE: usize = 5;
    pub const SIZE: usize = 6;
}

/// Characters of the base-46 string encoding.
pub mod encode {
    pub const BIG_VAL: u32 = 0xffff;
    pub const BIG_VAL_CODE: u8 = 126;
    pub const START: u32 = 32;
    pub const GAP1: u32 = 34;
    pub const GAP2: u32 = 92;
    pub const BASE: u32 = 46;
}

/// Table format version this runtime reads.
pub const FILE_VERSION: u32 = 14;

/// Look-ahead within this many bytes past a token's end is not recorded.
pub const LOOKAHEAD_MARGIN: usize = 25;

/// State id used when a goto lookup fails. It has no actions.
pub const NO_STATE: u32 = u32::MAX;

/// Combine two 16-bit slots into a 32-bit value.
#[inline]
pub(crate) fn pair(data: &[u16], off: usize) -> u32 {
    let lo = data.get(off).copied().unwrap_or(0);
    let hi = data.get(off + 1).copied().unwrap_or(0);
    u32::from(lo) | (u32::from(hi) << 16)
}
