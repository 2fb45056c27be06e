//! Heuristic constants for error recovery and stack pruning.

/// Tunable recovery and pruning heuristics.
///
/// These affect which of several possible trees is produced for broken input
/// and how much work the parser does, never whether it terminates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryTuning {
    /// Score penalty for inserting a virtual token.
    pub insert_penalty: i32,
    /// Score penalty for skipping a token.
    pub delete_penalty: i32,
    /// Score penalty for a reduction not allowed by the tables.
    pub reduce_penalty: i32,
    /// Maximum number of states tried when inserting a token.
    pub max_next: usize,
    /// Stack depth (in slots) at which token insertion is no longer tried.
    pub max_insert_stack_depth: usize,
    /// Stack depth (in slots) past which only insertions that enable the
    /// next token are tried.
    pub dampen_insert_stack_depth: usize,
    /// Node size above which a reduction counts as big.
    pub min_big_reduction: usize,
    /// Number of ticks recovery stays active after it started.
    pub recovery_distance: u32,
    /// Stacks kept per remaining recovery tick.
    pub max_remaining_per_step: usize,
    /// Buffer length past which two stacks are compared even in different
    /// states.
    pub min_buffer_length_prune: usize,
    /// Forced reductions tried per stuck stack during recovery.
    pub force_reduce_limit: usize,
    /// Stack depth (in slots) that triggers forced reductions.
    pub cut_depth: usize,
    /// Stack depth (in slots) forced reductions cut back to.
    pub cut_to: usize,
    /// Repeated big reductions from the same start before the parser
    /// fast-forwards with forced reductions.
    pub max_left_associative_reduction_count: usize,
    /// Maximum number of stacks kept outside recovery.
    pub max_stack_count: usize,
}

impl Default for RecoveryTuning {
    fn default() -> Self {
        Self {
            insert_penalty: 200,
            delete_penalty: 190,
            reduce_penalty: 100,
            max_next: 4,
            max_insert_stack_depth: 300,
            dampen_insert_stack_depth: 120,
            min_big_reduction: 2000,
            recovery_distance: 5,
            max_remaining_per_step: 3,
            min_buffer_length_prune: 500,
            force_reduce_limit: 10,
            cut_depth: 2800 * 3,
            cut_to: 2000 * 3,
            max_left_associative_reduction_count: 300,
            max_stack_count: 12,
        }
    }
}
