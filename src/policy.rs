//! Move-probability oracles.
//!
//! The search only needs a function from a position to a distribution over
//! every board point plus pass. How it is produced (a network, a table, a
//! hand-written heuristic) is up to the implementor of [`PolicyOracle`].

use std::sync::Arc;

use thiserror::Error;

use crate::board::{BoardConfig, Color, Coord, Move};
use crate::constants::{
    PRIOR_CAPTURE_MANY, PRIOR_CAPTURE_ONE, PRIOR_EMPTYAREA, PRIOR_EVEN, PRIOR_PASS,
    PRIOR_SELFATARI,
};
use crate::position::{is_eye, Position};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyError {
    #[error("distribution has {found} entries, expected {expected}")]
    WrongLength { expected: usize, found: usize },
    #[error("probability {value} at index {index} is negative or not finite")]
    InvalidProbability { index: usize, value: f32 },
}

/// One probability per board point in row-major order, then one for pass.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveProbabilities {
    size: usize,
    probs: Vec<f32>,
}

impl MoveProbabilities {
    pub fn new(config: &BoardConfig, probs: Vec<f32>) -> Result<Self, PolicyError> {
        let expected = config.area() + 1;
        if probs.len() != expected {
            return Err(PolicyError::WrongLength {
                expected,
                found: probs.len(),
            });
        }
        if let Some((index, &value)) = probs
            .iter()
            .enumerate()
            .find(|(_, p)| !p.is_finite() || **p < 0.0)
        {
            return Err(PolicyError::InvalidProbability { index, value });
        }
        Ok(MoveProbabilities {
            size: config.size(),
            probs,
        })
    }

    /// Same probability for every move, pass included.
    pub fn uniform(config: &BoardConfig) -> Self {
        let len = config.area() + 1;
        MoveProbabilities {
            size: config.size(),
            probs: vec![1.0 / len as f32; len],
        }
    }

    fn index(&self, mv: Move) -> usize {
        match mv {
            Move::Play(c) => c.row as usize * self.size + c.col as usize,
            Move::Pass => self.size * self.size,
        }
    }

    pub fn get(&self, mv: Move) -> f32 {
        self.probs[self.index(mv)]
    }

    /// All moves with their probability, board points first, pass last.
    pub fn iter(&self) -> impl Iterator<Item = (Move, f32)> + '_ {
        let size = self.size;
        self.probs.iter().enumerate().map(move |(i, &p)| {
            let mv = if i == size * size {
                Move::Pass
            } else {
                Move::Play(Coord::new((i / size) as u8, (i % size) as u8))
            };
            (mv, p)
        })
    }

    /// Board points ordered by decreasing probability. Equal probabilities
    /// keep row-major order.
    pub fn sorted_moves(&self) -> Vec<Coord> {
        let mut moves: Vec<(Coord, f32)> = self
            .iter()
            .filter_map(|(mv, p)| mv.coord().map(|c| (c, p)))
            .collect();
        moves.sort_by(|a, b| b.1.total_cmp(&a.1));
        moves.into_iter().map(|(c, _)| c).collect()
    }

    pub fn total(&self) -> f32 {
        self.probs.iter().sum()
    }
}

/// Source of move priors for a position.
pub trait PolicyOracle {
    fn evaluate(&self, position: &Position) -> anyhow::Result<MoveProbabilities>;
}

impl<P: PolicyOracle + ?Sized> PolicyOracle for &P {
    fn evaluate(&self, position: &Position) -> anyhow::Result<MoveProbabilities> {
        (**self).evaluate(position)
    }
}

impl<P: PolicyOracle + ?Sized> PolicyOracle for Box<P> {
    fn evaluate(&self, position: &Position) -> anyhow::Result<MoveProbabilities> {
        (**self).evaluate(position)
    }
}

impl<P: PolicyOracle + ?Sized> PolicyOracle for Arc<P> {
    fn evaluate(&self, position: &Position) -> anyhow::Result<MoveProbabilities> {
        (**self).evaluate(position)
    }
}

/// Adapter turning a closure into an oracle.
pub struct FnPolicy<F>(pub F);

impl<F> PolicyOracle for FnPolicy<F>
where
    F: Fn(&Position) -> anyhow::Result<MoveProbabilities>,
{
    fn evaluate(&self, position: &Position) -> anyhow::Result<MoveProbabilities> {
        (self.0)(position)
    }
}

/// Every move is equally likely.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformPolicy;

impl PolicyOracle for UniformPolicy {
    fn evaluate(&self, position: &Position) -> anyhow::Result<MoveProbabilities> {
        Ok(MoveProbabilities::uniform(position.config()))
    }
}

/// Cheap tactical priors: favour captures, avoid self-atari, own eyes and
/// lonely first/second line moves.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicPolicy;

impl PolicyOracle for HeuristicPolicy {
    fn evaluate(&self, position: &Position) -> anyhow::Result<MoveProbabilities> {
        let config = position.config();
        let board = position.board();
        let (own, opponent) = position.groups();
        let mut weights = vec![0.0f32; config.area() + 1];

        for &c in config.all_coords() {
            if board.get(c) != Color::Empty || is_eye(config, board, c) == Some(Color::Black) {
                continue;
            }
            let mut w = PRIOR_EVEN;

            let captured: usize = opponent
                .iter()
                .filter(|g| g.in_atari() && g.liberties.contains(&c))
                .map(|g| g.stones.len())
                .sum();
            match captured {
                0 => {}
                1 => w += PRIOR_CAPTURE_ONE,
                _ => w += PRIOR_CAPTURE_MANY,
            }

            if captured == 0 {
                // liberties the new chain would have after merging
                let mut liberties: Vec<Coord> = config
                    .neighbors(c)
                    .iter()
                    .copied()
                    .filter(|&n| board.get(n) == Color::Empty)
                    .collect();
                for g in own.iter().filter(|g| g.liberties.contains(&c)) {
                    liberties.extend(g.liberties.iter().copied().filter(|&l| l != c));
                }
                liberties.sort();
                liberties.dedup();
                if liberties.len() <= 1 {
                    w -= PRIOR_SELFATARI;
                }
            }

            if line_height(config, c) <= 1 && empty_area(config, position, c, 3) {
                w -= PRIOR_EMPTYAREA;
            }

            weights[config.index(c)] = w.max(0.5);
        }
        weights[config.area()] = PRIOR_PASS;

        let total: f32 = weights.iter().sum();
        let probs = weights.into_iter().map(|w| w / total).collect();
        Ok(MoveProbabilities::new(config, probs)?)
    }
}

/// Distance (0-indexed) from the nearest edge.
fn line_height(config: &BoardConfig, c: Coord) -> usize {
    let last = config.size() - 1;
    let (r, k) = (c.row as usize, c.col as usize);
    r.min(last - r).min(k).min(last - k)
}

/// True if there are no stones within Manhattan distance `dist` of `c`.
fn empty_area(config: &BoardConfig, position: &Position, c: Coord, dist: usize) -> bool {
    let board = position.board();
    let (r0, k0) = (c.row as isize, c.col as isize);
    let d = dist as isize;
    for dr in -d..=d {
        let span = d - dr.abs();
        for dk in -span..=span {
            let (r, k) = (r0 + dr, k0 + dk);
            if r < 0 || k < 0 {
                continue;
            }
            let occupied = config
                .coord(r as usize, k as usize)
                .is_some_and(|p| board.get(p).is_stone());
            if occupied {
                return false;
            }
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::board::Board;

    #[test]
    fn test_validation() {
        let config = BoardConfig::new(3);
        assert_eq!(
            MoveProbabilities::new(&config, vec![0.1; 9]),
            Err(PolicyError::WrongLength {
                expected: 10,
                found: 9
            })
        );
        let mut probs = vec![0.1; 10];
        probs[4] = -0.5;
        assert!(matches!(
            MoveProbabilities::new(&config, probs),
            Err(PolicyError::InvalidProbability { index: 4, .. })
        ));
        assert!(MoveProbabilities::new(&config, vec![0.1; 10]).is_ok());
    }

    #[test]
    fn test_sorted_moves_is_stable() {
        let config = BoardConfig::new(2);
        let probs = MoveProbabilities::new(&config, vec![0.1, 0.4, 0.1, 0.3, 0.1]).unwrap();
        assert_eq!(
            probs.sorted_moves(),
            vec![
                Coord::new(0, 1),
                Coord::new(1, 1),
                Coord::new(0, 0),
                Coord::new(1, 0)
            ]
        );
        assert_eq!(probs.get(Move::Pass), 0.1);
        assert_eq!(probs.iter().last(), Some((Move::Pass, 0.1)));
    }

    #[test]
    fn test_uniform_sums_to_one() {
        let config = BoardConfig::new(9);
        let pos = Position::initial_state(Arc::clone(&config), 7.5);
        let probs = UniformPolicy.evaluate(&pos).unwrap();
        assert!((probs.total() - 1.0).abs() < 1e-4);
    }

    #[test]
    fn test_heuristic_prefers_capture() {
        let config = BoardConfig::new(5);
        let board = Board::from_diagram(
            5,
            "
            .....
            .XO..
            XO...
            .X...
            .....
            ",
        )
        .unwrap();
        let pos = Position::from_board(Arc::clone(&config), &board, Color::Black, 0.5);
        let probs = HeuristicPolicy.evaluate(&pos).unwrap();

        let capture = Move::Play(Coord::new(2, 2));
        let quiet = Move::Play(Coord::new(4, 4));
        assert!(probs.get(capture) > probs.get(quiet));
        assert_eq!(probs.get(Move::Play(Coord::new(1, 1))), 0.0);
        assert!((probs.total() - 1.0).abs() < 1e-4);
    }
}
