//! Interchangeable move-suggestion strategies.
//!
//! Every player implements [`MoveSuggester`]; the concrete player is picked
//! at construction time from a [`StrategyKind`].

use std::sync::Arc;

use anyhow::Context;
use clap::ValueEnum;
use log::info;

use crate::board::{Color, Move};
use crate::coords::format_kgs_coords;
use crate::mcts::{MctsConfig, MctsPlayer};
use crate::playout::{select_most_likely, select_random, select_weighted_random};
use crate::policy::PolicyOracle;
use crate::position::Position;

/// What a player wants to do on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Suggestion {
    Move(Move),
    Resign,
}

/// Anything that can propose a move for the side to play.
pub trait MoveSuggester {
    fn suggest_move(&mut self, position: &Position) -> anyhow::Result<Suggestion>;
}

/// Plays a uniformly random reasonable move.
pub struct RandomPlayer {
    rng: fastrand::Rng,
}

impl RandomPlayer {
    pub fn new(seed: u64) -> Self {
        RandomPlayer {
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl MoveSuggester for RandomPlayer {
    fn suggest_move(&mut self, position: &Position) -> anyhow::Result<Suggestion> {
        Ok(Suggestion::Move(select_random(position, &mut self.rng)))
    }
}

/// Plays the policy's most likely reasonable move.
pub struct GreedyPolicyPlayer<P> {
    policy: P,
}

impl<P: PolicyOracle> GreedyPolicyPlayer<P> {
    pub fn new(policy: P) -> Self {
        GreedyPolicyPlayer { policy }
    }
}

impl<P: PolicyOracle> MoveSuggester for GreedyPolicyPlayer<P> {
    fn suggest_move(&mut self, position: &Position) -> anyhow::Result<Suggestion> {
        let probs = self.policy.evaluate(position)?;
        Ok(Suggestion::Move(select_most_likely(position, &probs)))
    }
}

/// Samples a move from the policy's distribution.
pub struct RandomPolicyPlayer<P> {
    policy: P,
    rng: fastrand::Rng,
}

impl<P: PolicyOracle> RandomPolicyPlayer<P> {
    pub fn new(policy: P, seed: u64) -> Self {
        RandomPolicyPlayer {
            policy,
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl<P: PolicyOracle> MoveSuggester for RandomPolicyPlayer<P> {
    fn suggest_move(&mut self, position: &Position) -> anyhow::Result<Suggestion> {
        let probs = self.policy.evaluate(position)?;
        Ok(Suggestion::Move(select_weighted_random(
            position,
            &probs,
            &mut self.rng,
        )))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StrategyKind {
    /// Uniformly random reasonable moves
    Random,
    /// Most likely move according to the policy
    Greedy,
    /// Move sampled from the policy
    Weighted,
    /// Policy-guided tree search
    Mcts,
}

/// Build a player of the requested kind.
pub fn build_suggester(
    kind: StrategyKind,
    policy: Arc<dyn PolicyOracle>,
    mcts: MctsConfig,
) -> Box<dyn MoveSuggester> {
    match kind {
        StrategyKind::Random => Box::new(RandomPlayer::new(mcts.seed)),
        StrategyKind::Greedy => Box::new(GreedyPolicyPlayer::new(policy)),
        StrategyKind::Weighted => Box::new(RandomPolicyPlayer::new(policy, mcts.seed)),
        StrategyKind::Mcts => Box::new(MctsPlayer::new(policy, mcts)),
    }
}

/// How a game between two suggesters ended.
#[derive(Debug, Clone)]
pub struct GameResult {
    pub position: Position,
    /// The side that resigned, if any
    pub resigned: Option<Color>,
}

impl GameResult {
    /// The winner, by resignation or by area score.
    pub fn winner(&self) -> Color {
        match self.resigned {
            Some(loser) => loser.opponent(),
            None if self.position.score() > 0.0 => Color::Black,
            None if self.position.score() < 0.0 => Color::White,
            None => Color::Empty,
        }
    }
}

/// Play until both sides pass in a row, someone resigns, or `max_moves`.
pub fn play_game(
    black: &mut dyn MoveSuggester,
    white: &mut dyn MoveSuggester,
    position: Position,
    max_moves: usize,
) -> anyhow::Result<GameResult> {
    let mut position = position;
    while !position.is_game_over() && position.n() < max_moves {
        let to_play = position.to_play();
        let player: &mut dyn MoveSuggester = match to_play {
            Color::Black => &mut *black,
            _ => &mut *white,
        };
        let mv = match player.suggest_move(&position)? {
            Suggestion::Move(mv) => mv,
            Suggestion::Resign => {
                info!("{to_play:?} resigns at move {}", position.n());
                return Ok(GameResult {
                    position,
                    resigned: Some(to_play),
                });
            }
        };
        info!(
            "{:?} plays {}",
            to_play,
            format_kgs_coords(position.config(), mv)
        );
        position = position
            .play(mv)
            .with_context(|| format!("suggested move {mv:?} is illegal"))?;
    }
    Ok(GameResult {
        position,
        resigned: None,
    })
}
