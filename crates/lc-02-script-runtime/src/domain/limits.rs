use serde::{Deserialize, Serialize};

/// Default evaluation step budget per script.
pub const DEFAULT_MAX_STEPS: u64 = 100_000;

/// Default maximum nesting of `$call`.
pub const DEFAULT_MAX_CALL_DEPTH: usize = 64;

/// Default maximum nesting of evaluated expressions, across calls.
///
/// Fits the native stack of a 2 MiB worker thread with room to spare.
pub const DEFAULT_MAX_EVAL_DEPTH: usize = 256;

/// String bytes that cost one step when a string is built or copied.
pub const STRING_BYTES_PER_STEP: usize = 64;

/// Resource bounds for one script execution.
///
/// The environment-initialization script and the handler script each get a
/// fresh budget. Steps are charged per evaluated expression and, on top of
/// that, per element of every value a script builds or copies, so the step
/// budget also bounds the memory a script can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionLimits {
    /// Maximum number of steps.
    pub max_steps: u64,
    /// Maximum function call nesting.
    pub max_call_depth: usize,
    /// Maximum expression nesting, summed over all active calls.
    pub max_eval_depth: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_eval_depth: DEFAULT_MAX_EVAL_DEPTH,
        }
    }
}
