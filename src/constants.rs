//! Engine-wide constants: search parameters, rollout limits and heuristic priors.
//!
//! Board geometry is not fixed at compile time; see [`crate::board::BoardConfig`].

// =============================================================================
// Board
// =============================================================================

/// Largest board supported by the coordinate formats (SGF letters run out at 52,
/// the letter+digit format at 25).
pub const MAX_BOARD_SIZE: usize = 25;

/// Standard komi under area scoring.
pub const DEFAULT_KOMI: f32 = 7.5;

// =============================================================================
// MCTS (PUCT) Parameters
// =============================================================================

/// Exploration constant in the PUCT bonus.
pub const C_PUCT: f64 = 5.0;

/// Default wall-clock budget per move, in seconds.
pub const SECONDS_PER_MOVE: f64 = 5.0;

/// Q of the most visited root child below which the engine resigns.
/// Q lives in [-1, 1], so -0.6 corresponds to a 20% winrate.
pub const RESIGN_THRES: f64 = -0.6;

/// Minimum visits of the best child before resignation is considered.
pub const RESIGN_MIN_VISITS: u32 = 50;

/// Number of root children reported at debug level after a search.
pub const REPORT_CHILDREN: usize = 5;

// =============================================================================
// Rollouts
// =============================================================================

/// Fraction of the board area played by the policy before random play takes over.
pub const POLICY_CUTOFF_FRACTION: f64 = 0.7;

/// Rollouts stop after this many moves per board point.
pub const MAX_GAME_LEN_FACTOR: usize = 3;

// =============================================================================
// Heuristic priors
// =============================================================================

/// Base weight every point receives.
pub const PRIOR_EVEN: f32 = 10.0;

/// Bonus for capturing a single stone.
pub const PRIOR_CAPTURE_ONE: f32 = 15.0;

/// Bonus for capturing two or more stones.
pub const PRIOR_CAPTURE_MANY: f32 = 30.0;

/// Penalty for a move that leaves the new group with a single liberty.
pub const PRIOR_SELFATARI: f32 = 8.0;

/// Penalty for first/second line moves with no stones nearby.
pub const PRIOR_EMPTYAREA: f32 = 6.0;

/// Weight given to passing while the board still has reasonable moves.
pub const PRIOR_PASS: f32 = 0.1;
