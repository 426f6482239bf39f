//! Move selection helpers and Monte Carlo playouts.
//!
//! A playout plays policy-sampled moves up to a cutoff depth, then random
//! reasonable moves until both sides pass or the move cap is hit, and scores
//! the final position.

use anyhow::Context;
use log::{debug, trace};

use crate::board::{BoardConfig, Color, Move};
use crate::constants::{MAX_GAME_LEN_FACTOR, POLICY_CUTOFF_FRACTION};
use crate::policy::{MoveProbabilities, PolicyOracle};
use crate::position::{is_eye, Position};

/// Depth limits for a playout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RolloutConfig {
    /// Moves are drawn from the policy while the move number is below this.
    pub policy_cutoff_depth: usize,
    /// Playouts stop once the move number reaches this.
    pub max_moves: usize,
}

impl RolloutConfig {
    /// Policy for the first 70% of the board area, random afterwards,
    /// at most three moves per point.
    pub fn for_board(config: &BoardConfig) -> Self {
        let area = config.area();
        RolloutConfig {
            policy_cutoff_depth: (area as f64 * POLICY_CUTOFF_FRACTION) as usize,
            max_moves: area * MAX_GAME_LEN_FACTOR,
        }
    }

    /// Random play from the first move.
    pub fn random(config: &BoardConfig) -> Self {
        RolloutConfig {
            policy_cutoff_depth: 0,
            ..Self::for_board(config)
        }
    }
}

/// A move is reasonable if it is legal and does not fill one of the mover's eyes.
pub fn is_move_reasonable(position: &Position, mv: Move) -> bool {
    match mv {
        Move::Pass => true,
        Move::Play(c) => {
            position.board().get(c) == Color::Empty
                && is_eye(position.config(), position.board(), c) != Some(Color::Black)
                && position.is_move_legal(mv)
        }
    }
}

/// Pick a random reasonable move and return it with the resulting position.
/// Passes when nothing reasonable is left.
fn random_step(position: &Position, rng: &mut fastrand::Rng) -> (Move, Position) {
    let config = position.config();
    let board = position.board();
    let mut candidates: Vec<_> = config
        .all_coords()
        .iter()
        .copied()
        .filter(|&c| board.get(c) == Color::Empty && is_eye(config, board, c) != Some(Color::Black))
        .collect();

    // Lazy Fisher-Yates: only shuffle as far as we need to find a legal move.
    let n = candidates.len();
    for i in 0..n {
        let j = i + rng.usize(..n - i);
        candidates.swap(i, j);
        let mv = Move::Play(candidates[i]);
        if let Ok(next) = position.play(mv) {
            return (mv, next);
        }
    }
    (Move::Pass, position.pass_turn())
}

/// A uniformly random reasonable move, or pass.
pub fn select_random(position: &Position, rng: &mut fastrand::Rng) -> Move {
    random_step(position, rng).0
}

/// The most probable reasonable move, or pass.
pub fn select_most_likely(position: &Position, probs: &MoveProbabilities) -> Move {
    probs
        .sorted_moves()
        .into_iter()
        .map(Move::Play)
        .find(|&mv| is_move_reasonable(position, mv))
        .unwrap_or(Move::Pass)
}

/// Draw a board point proportionally to its probability. Falls back to the
/// most likely reasonable move if the draw is not reasonable.
pub fn select_weighted_random(
    position: &Position,
    probs: &MoveProbabilities,
    rng: &mut fastrand::Rng,
) -> Move {
    let points = || probs.iter().filter(|(mv, _)| !mv.is_pass());
    let total: f32 = points().map(|(_, p)| p).sum();
    let selection = rng.f32() * total;
    let mut cumulative = 0.0;
    let mut selected = None;
    for (mv, p) in points() {
        cumulative += p;
        if cumulative > selection {
            selected = Some(mv);
            break;
        }
    }
    match selected {
        Some(mv) if is_move_reasonable(position, mv) => mv,
        _ => {
            debug!("weighted draw {selected:?} not reasonable, using most likely move");
            select_most_likely(position, probs)
        }
    }
}

/// Play a game to the end from `position`.
///
/// `black` moves for Black and `white` for White. Each policy proposes
/// moves (sampled by probability) until the move number reaches
/// `rollout.policy_cutoff_depth`; random reasonable moves follow until two
/// consecutive passes or `rollout.max_moves`.
pub fn simulate_game<B, W>(
    black: &B,
    white: &W,
    position: &Position,
    rollout: &RolloutConfig,
    rng: &mut fastrand::Rng,
) -> anyhow::Result<Position>
where
    B: PolicyOracle + ?Sized,
    W: PolicyOracle + ?Sized,
{
    let mut position = position.clone();
    while position.n() < rollout.policy_cutoff_depth
        && position.n() < rollout.max_moves
        && !position.is_game_over()
    {
        let probs = match position.to_play() {
            Color::Black => black.evaluate(&position),
            _ => white.evaluate(&position),
        }
        .with_context(|| format!("policy failed at move {}", position.n()))?;
        let mv = select_weighted_random(&position, &probs, rng);
        position = position.play(mv)?;
    }

    while position.n() < rollout.max_moves && !position.is_game_over() {
        position = random_step(&position, rng).1;
    }
    trace!("playout finished after {} moves", position.n());
    Ok(position)
}

/// Outcome of a finished game for `perspective`: 1 for a win, -1 for a loss,
/// 0 for a draw.
pub fn outcome(final_position: &Position, perspective: Color) -> f64 {
    let score = final_position.score() as f64;
    let black_result = if score > 0.0 {
        1.0
    } else if score < 0.0 {
        -1.0
    } else {
        0.0
    };
    match perspective {
        Color::Black => black_result,
        _ => -black_result,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::board::{Board, Coord};
    use crate::coords::parse_kgs_coords;
    use crate::policy::{FnPolicy, UniformPolicy};

    static PLAYOUT_WARNINGS: AtomicUsize = AtomicUsize::new(0);

    /// Counts warnings and errors logged from this module.
    struct WarningCounter;

    impl log::Log for WarningCounter {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            if record.level() <= log::Level::Warn && record.target() == "gopuct::playout" {
                PLAYOUT_WARNINGS.fetch_add(1, Ordering::SeqCst);
            }
        }

        fn flush(&self) {}
    }

    const CROWDED: &str = "
            .XXOOOXXX
            X.XO.OX.X
            XXXOOOXX.
            ...XXX..X
            XXXX.....
            OOOX....O
            X.OXX.OO.
            .XO.X.O.O
            XXO.X.OO.
            ";

    fn pc(config: &BoardConfig, s: &str) -> Move {
        parse_kgs_coords(config, s).unwrap()
    }

    #[test]
    fn test_is_move_reasonable() {
        let config = BoardConfig::new(9);
        let board = Board::from_diagram(9, CROWDED).unwrap();
        let position = Position::from_board(Arc::clone(&config), &board, Color::Black, 7.5);

        for mv in ["E8", "B3"] {
            assert!(is_move_reasonable(&position, pc(&config, mv)), "{mv}");
        }
        // own eyes, occupied points and suicides
        for mv in ["A9", "B8", "H8", "J7", "A2", "J3", "H2", "J1", "C9"] {
            assert!(!is_move_reasonable(&position, pc(&config, mv)), "{mv}");
        }
        assert!(is_move_reasonable(&position, Move::Pass));
    }

    #[test]
    fn test_select_random_never_fills_own_eye() {
        let config = BoardConfig::new(3);
        let board = Board::from_diagram(
            3,
            "
            .X.
            XX.
            ...
            ",
        )
        .unwrap();
        let position = Position::from_board(Arc::clone(&config), &board, Color::Black, 0.5);
        let mut rng = fastrand::Rng::with_seed(7);
        for _ in 0..50 {
            let mv = select_random(&position, &mut rng);
            assert_ne!(mv, Move::Play(Coord::new(0, 0)));
            assert!(position.is_move_legal(mv));
        }
    }

    #[test]
    fn test_select_most_likely_skips_unreasonable() {
        let config = BoardConfig::new(3);
        let position = Position::initial_state(Arc::clone(&config), 0.5)
            .play(Move::Play(Coord::new(0, 0)))
            .unwrap();
        let mut probs = vec![0.0; 10];
        probs[0] = 0.9; // occupied
        probs[4] = 0.1;
        let probs = MoveProbabilities::new(&config, probs).unwrap();
        assert_eq!(
            select_most_likely(&position, &probs),
            Move::Play(Coord::new(1, 1))
        );
        let mut rng = fastrand::Rng::with_seed(1);
        assert!(position.is_move_legal(select_weighted_random(&position, &probs, &mut rng)));
    }

    #[test]
    fn test_simulate_game_terminates() {
        let config = BoardConfig::new(5);
        let position = Position::initial_state(Arc::clone(&config), 0.5);
        let rollout = RolloutConfig::for_board(&config);
        let mut rng = fastrand::Rng::with_seed(42);

        let end = simulate_game(&UniformPolicy, &UniformPolicy, &position, &rollout, &mut rng)
            .unwrap();
        assert!(end.is_game_over() || end.n() >= rollout.max_moves);
        assert!(end.groups_match_board());
        assert_eq!(outcome(&end, Color::Black), -outcome(&end, Color::White));
        assert_ne!(outcome(&end, Color::Black), 0.0);
    }

    #[test]
    fn test_rejected_weighted_draws_stay_quiet() {
        let _ = log::set_logger(&WarningCounter);
        log::set_max_level(log::LevelFilter::Trace);

        let config = BoardConfig::new(9);
        let board = Board::from_diagram(9, CROWDED).unwrap();
        let position = Position::from_board(Arc::clone(&config), &board, Color::Black, 7.5);
        // most of the uniform mass sits on occupied points
        let probs = MoveProbabilities::uniform(&config);
        let mut rng = fastrand::Rng::with_seed(5);
        for _ in 0..200 {
            let mv = select_weighted_random(&position, &probs, &mut rng);
            assert!(is_move_reasonable(&position, mv), "{mv:?}");
        }
        assert_eq!(PLAYOUT_WARNINGS.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_random_rollout_never_asks_the_policy() {
        let config = BoardConfig::new(5);
        let position = Position::initial_state(Arc::clone(&config), 0.5);
        let offline = FnPolicy(|_: &Position| -> anyhow::Result<MoveProbabilities> {
            anyhow::bail!("policy offline")
        });
        let mut rng = fastrand::Rng::with_seed(9);

        let random = RolloutConfig::random(&config);
        let end = simulate_game(&offline, &offline, &position, &random, &mut rng).unwrap();
        assert!(end.is_game_over() || end.n() >= random.max_moves);

        // the policy phase does consult it
        let guided = RolloutConfig::for_board(&config);
        let err = simulate_game(&offline, &offline, &position, &guided, &mut rng).unwrap_err();
        assert!(format!("{err:#}").contains("policy offline"));
    }

    #[test]
    fn test_rollout_stops_at_move_cap() {
        let config = BoardConfig::new(5);
        let rollout = RolloutConfig::for_board(&config);
        let position =
            Position::initial_state(Arc::clone(&config), 0.5).with_move_number(rollout.max_moves);
        let mut rng = fastrand::Rng::with_seed(3);

        let end = simulate_game(&UniformPolicy, &UniformPolicy, &position, &rollout, &mut rng)
            .unwrap();
        assert_eq!(end.n(), rollout.max_moves);
        assert!(end.recent().is_empty());
    }
}
