//! gopuct: play or analyse Go games with PUCT search.
//!
//! ## Usage
//!
//! - `gopuct selfplay --black mcts --white random` - Play a full game
//! - `gopuct suggest D4 Q16` - Replay moves and suggest the next one

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use log::info;

use gopuct::board::{BoardConfig, Color};
use gopuct::constants::{DEFAULT_KOMI, MAX_BOARD_SIZE, MAX_GAME_LEN_FACTOR, SECONDS_PER_MOVE};
use gopuct::coords::{format_kgs_coords, parse_kgs_coords};
use gopuct::logging::init_logging;
use gopuct::mcts::MctsConfig;
use gopuct::policy::{HeuristicPolicy, PolicyOracle, UniformPolicy};
use gopuct::position::Position;
use gopuct::strategies::{build_suggester, play_game, MoveSuggester, StrategyKind, Suggestion};

/// gopuct: Go rules engine with policy-guided tree search
#[derive(Parser)]
#[command(name = "gopuct")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Board size
    #[arg(long, global = true, default_value_t = 9,
          value_parser = clap::value_parser!(u8).range(1..=MAX_BOARD_SIZE as i64))]
    size: u8,

    /// Compensation given to White
    #[arg(long, global = true, default_value_t = DEFAULT_KOMI)]
    komi: f32,

    /// Seed for every random choice
    #[arg(long, global = true, default_value_t = 0)]
    seed: u64,

    /// Prior used by the search and the policy players
    #[arg(long, global = true, value_enum, default_value_t = PolicyKind::Heuristic)]
    policy: PolicyKind,

    /// Search time per move
    #[arg(long, global = true, default_value_t = SECONDS_PER_MOVE)]
    seconds: f64,

    /// Cap on simulations per move
    #[arg(long, global = true)]
    simulations: Option<usize>,

    /// Never resign
    #[arg(long, global = true)]
    no_resign: bool,

    /// Log level on stderr
    #[arg(long, global = true, default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,

    /// Also write debug logs to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a full game between two strategies
    Selfplay {
        #[arg(long, value_enum, default_value_t = StrategyKind::Mcts)]
        black: StrategyKind,
        #[arg(long, value_enum, default_value_t = StrategyKind::Random)]
        white: StrategyKind,
    },
    /// Replay moves in KGS notation and suggest the next one
    Suggest {
        #[arg(long, value_enum, default_value_t = StrategyKind::Mcts)]
        strategy: StrategyKind,
        moves: Vec<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PolicyKind {
    Uniform,
    Heuristic,
}

impl Cli {
    fn policy(&self) -> Arc<dyn PolicyOracle> {
        match self.policy {
            PolicyKind::Uniform => Arc::new(UniformPolicy),
            PolicyKind::Heuristic => Arc::new(HeuristicPolicy),
        }
    }

    fn mcts_config(&self, seed: u64) -> anyhow::Result<MctsConfig> {
        let time_budget = Duration::try_from_secs_f64(self.seconds)
            .with_context(|| format!("invalid --seconds {}", self.seconds))?;
        let defaults = MctsConfig::default();
        Ok(MctsConfig {
            time_budget,
            max_simulations: self.simulations,
            resign_threshold: if self.no_resign {
                None
            } else {
                defaults.resign_threshold
            },
            seed,
            ..defaults
        })
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_level, cli.log_file.as_deref())?;

    let config = BoardConfig::new(cli.size as usize);
    let position = Position::initial_state(Arc::clone(&config), cli.komi);

    match &cli.command {
        Commands::Selfplay { black, white } => {
            let black_config = cli.mcts_config(cli.seed)?;
            let white_config = cli.mcts_config(cli.seed.wrapping_add(1))?;
            let mut black_player = build_suggester(*black, cli.policy(), black_config);
            let mut white_player = build_suggester(*white, cli.policy(), white_config);
            let max_moves = config.area() * MAX_GAME_LEN_FACTOR;
            let result = play_game(&mut *black_player, &mut *white_player, position, max_moves)?;

            println!("{}", result.position);
            match result.resigned {
                Some(loser) => println!("{:?} resigns. {:?} wins.", loser, loser.opponent()),
                None => {
                    let score = result.position.score();
                    match result.winner() {
                        Color::Empty => println!("Draw"),
                        winner => println!("{winner:?} wins by {:.1}", score.abs()),
                    }
                }
            }
        }
        Commands::Suggest { strategy, moves } => {
            let mut position = position;
            for s in moves {
                let mv = parse_kgs_coords(&config, s)?;
                position = position
                    .play(mv)
                    .with_context(|| format!("cannot play {s} at move {}", position.n() + 1))?;
            }
            info!("Replayed {} moves", position.n());
            println!("{position}");

            let mut player = build_suggester(*strategy, cli.policy(), cli.mcts_config(cli.seed)?);
            match player.suggest_move(&position)? {
                Suggestion::Move(mv) => {
                    println!("{:?} plays {}", position.to_play(), format_kgs_coords(&config, mv))
                }
                Suggestion::Resign => println!("{:?} resigns", position.to_play()),
            }
        }
    }
    Ok(())
}
