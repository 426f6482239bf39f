//! gopuct: Go rules and PUCT tree search driven by a policy oracle.
//!
//! The rules engine keeps every position from the point of view of the side
//! to move, tracks groups and liberties incrementally, and scores by area.
//! The search asks a [`policy::PolicyOracle`] for move priors and values its
//! leaves with playouts.
//!
//! ## Modules
//!
//! - [`constants`] - Engine parameters and heuristic weights
//! - [`board`] - Colors, coordinates, board geometry and raw boards
//! - [`coords`] - KGS and SGF coordinate notation
//! - [`group`] - Groups of connected stones and their liberties
//! - [`position`] - Game state, move legality, captures, ko and scoring
//! - [`policy`] - Move-probability oracles
//! - [`playout`] - Move selection helpers and full-game simulation
//! - [`mcts`] - PUCT tree search
//! - [`strategies`] - Interchangeable move suggesters
//! - [`logging`] - Log output setup
//!
//! ## Example
//!
//! ```
//! use std::time::Duration;
//!
//! use gopuct::board::{BoardConfig, Move};
//! use gopuct::coords::{format_kgs_coords, parse_kgs_coords};
//! use gopuct::mcts::{MctsConfig, MctsPlayer};
//! use gopuct::policy::HeuristicPolicy;
//! use gopuct::position::Position;
//! use gopuct::strategies::{MoveSuggester, Suggestion};
//!
//! let config = BoardConfig::new(9);
//! let pos = Position::initial_state(config.clone(), 7.5);
//! let pos = pos.play(parse_kgs_coords(&config, "E5")?)?;
//!
//! let mut player = MctsPlayer::new(
//!     HeuristicPolicy,
//!     MctsConfig {
//!         time_budget: Duration::from_secs(10),
//!         max_simulations: Some(50),
//!         ..MctsConfig::default()
//!     },
//! );
//! if let Suggestion::Move(mv) = player.suggest_move(&pos)? {
//!     println!("White plays {}", format_kgs_coords(&config, mv));
//!     assert_ne!(mv, Move::Play(gopuct::board::Coord::new(4, 4)));
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod board;
pub mod constants;
pub mod coords;
pub mod group;
pub mod logging;
pub mod mcts;
pub mod playout;
pub mod policy;
pub mod position;
pub mod strategies;
