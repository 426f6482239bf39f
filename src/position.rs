//! Go position representation and move execution.
//!
//! This module provides the rules engine:
//! - Stone placement with incremental group/liberty updates
//! - Capture resolution, suicide rejection and simple ko
//! - Area (Chinese) scoring by flood-filling empty regions
//! - Eye heuristics used to keep rollouts from filling their own eyes
//!
//! A [`Position`] is stored from the point of view of the player to move:
//! that player's stones are always [`Color::Black`] on the internal board and
//! komi is the number of points the mover owes. Every transition flips the
//! board, so rules code only ever reasons about "my stones" and "their
//! stones". Accessors that talk about real colors ([`Position::stone_at`],
//! [`Position::captures`], [`Position::score`]) undo the flip.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::board::{Board, BoardConfig, Color, Coord, Move};
use crate::coords::format_kgs_coords;
use crate::group::{
    deduce_groups, find_liberties, find_neighbors, flood_fill, update_groups, Group, Groups,
};

/// Why a move was rejected. Failure never touches the original position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MoveError {
    #[error("Illegal move: point not empty")]
    Occupied,
    #[error("Illegal move: retakes ko")]
    Ko,
    #[error("Illegal move: suicide")]
    Suicide,
}

/// A Go position.
#[derive(Clone)]
pub struct Position {
    config: Arc<BoardConfig>,
    /// Stones with the player to move as `Black`.
    board: Board,
    /// Moves played so far
    n: usize,
    /// Points owed by the player to move
    komi: f32,
    /// Captures as (player to move, opponent)
    caps: (u32, u32),
    /// Groups as (player to move, opponent)
    groups: (Groups, Groups),
    ko: Option<Coord>,
    recent: Vec<Move>,
    player1turn: bool,
}

impl Position {
    /// The empty board with Black to play.
    pub fn initial_state(config: Arc<BoardConfig>, komi: f32) -> Self {
        let size = config.size();
        Position {
            config,
            board: Board::new(size),
            n: 0,
            komi,
            caps: (0, 0),
            groups: (Vec::new(), Vec::new()),
            ko: None,
            recent: Vec::new(),
            player1turn: true,
        }
    }

    /// Build a position from an arbitrary board in real colors.
    ///
    /// `komi` is the compensation given to White. Groups are deduced from
    /// scratch.
    ///
    /// # Panics
    /// If the board size does not match `config`.
    pub fn from_board(config: Arc<BoardConfig>, board: &Board, to_play: Color, komi: f32) -> Self {
        assert_eq!(
            board.size(),
            config.size(),
            "board of size {} loaded into a {}x{} configuration",
            board.size(),
            config.size(),
            config.size()
        );
        assert!(to_play.is_stone(), "to_play must be Black or White");
        let player1turn = to_play == Color::Black;
        let board = if player1turn {
            board.clone()
        } else {
            board.flipped()
        };
        let (own, opponent) = deduce_groups(&config, &board);
        Position {
            config,
            board,
            n: 0,
            komi: if player1turn { komi } else { -komi },
            caps: (0, 0),
            groups: (own, opponent),
            ko: None,
            recent: Vec::new(),
            player1turn,
        }
    }

    /// Copy with the move counter replaced.
    pub fn with_move_number(mut self, n: usize) -> Self {
        self.n = n;
        self
    }

    /// Copy with the capture tallies replaced, given in real colors.
    pub fn with_captures(mut self, black: u32, white: u32) -> Self {
        self.caps = if self.player1turn {
            (black, white)
        } else {
            (white, black)
        };
        self
    }

    /// Copy with the ko point replaced.
    pub fn with_ko(mut self, ko: Option<Coord>) -> Self {
        self.ko = ko;
        self
    }

    pub fn config(&self) -> &Arc<BoardConfig> {
        &self.config
    }

    /// The internal board, with the player to move as `Black`.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The board in real colors.
    pub fn absolute_board(&self) -> Board {
        if self.player1turn {
            self.board.clone()
        } else {
            self.board.flipped()
        }
    }

    /// Real color of the stone at `c`.
    pub fn stone_at(&self, c: Coord) -> Color {
        let color = self.board.get(c);
        if self.player1turn {
            color
        } else {
            color.opponent()
        }
    }

    pub fn n(&self) -> usize {
        self.n
    }

    /// Points owed by the player to move (negative when they receive komi).
    pub fn komi(&self) -> f32 {
        self.komi
    }

    pub fn to_play(&self) -> Color {
        if self.player1turn {
            Color::Black
        } else {
            Color::White
        }
    }

    /// Stones captured so far by `color`.
    pub fn captures(&self, color: Color) -> u32 {
        match (color == self.to_play(), color) {
            (_, Color::Empty) => 0,
            (true, _) => self.caps.0,
            (false, _) => self.caps.1,
        }
    }

    /// Groups as (player to move, opponent).
    pub fn groups(&self) -> (&[Arc<Group>], &[Arc<Group>]) {
        (&self.groups.0, &self.groups.1)
    }

    pub fn ko(&self) -> Option<Coord> {
        self.ko
    }

    /// Every move played from this position's origin, oldest first.
    pub fn recent(&self) -> &[Move] {
        &self.recent
    }

    pub fn last_move(&self) -> Option<Move> {
        self.recent.last().copied()
    }

    /// True once the last two moves were both passes.
    pub fn is_game_over(&self) -> bool {
        matches!(self.recent.as_slice(), [.., Move::Pass, Move::Pass])
    }

    /// Check the tracked groups against a full rescan of the board.
    pub fn groups_match_board(&self) -> bool {
        let as_set = |groups: &[Arc<Group>]| -> BTreeSet<(Vec<Coord>, Vec<Coord>)> {
            groups
                .iter()
                .map(|g| {
                    (
                        g.stones.iter().copied().collect(),
                        g.liberties.iter().copied().collect(),
                    )
                })
                .collect()
        };
        let (own, opponent) = deduce_groups(&self.config, &self.board);
        as_set(&own) == as_set(&self.groups.0) && as_set(&opponent) == as_set(&self.groups.1)
    }

    /// Swap sides without playing a move.
    pub fn flip_playerturn(&self) -> Position {
        Position {
            config: Arc::clone(&self.config),
            board: self.board.flipped(),
            n: self.n,
            komi: -self.komi,
            caps: (self.caps.1, self.caps.0),
            groups: (self.groups.1.clone(), self.groups.0.clone()),
            ko: self.ko,
            recent: self.recent.clone(),
            player1turn: !self.player1turn,
        }
    }

    /// Pass. Always legal; clears the ko.
    pub fn pass_turn(&self) -> Position {
        let mut recent = self.recent.clone();
        recent.push(Move::Pass);
        Position {
            config: Arc::clone(&self.config),
            board: self.board.flipped(),
            n: self.n + 1,
            komi: -self.komi,
            caps: (self.caps.1, self.caps.0),
            groups: (self.groups.1.clone(), self.groups.0.clone()),
            ko: None,
            recent,
            player1turn: !self.player1turn,
        }
    }

    /// Play a move for the side to move.
    ///
    /// Rules: no suicide, simple ko, area scoring. The only reliable way to
    /// detect every capture/suicide interaction is to play the move, so
    /// legality is tested by calling this and checking the result.
    pub fn play(&self, mv: Move) -> Result<Position, MoveError> {
        let c = match mv {
            Move::Pass => return Ok(self.pass_turn()),
            Move::Play(c) => c,
        };
        if self.ko == Some(c) {
            return Err(MoveError::Ko);
        }
        if self.board.get(c) != Color::Empty {
            return Err(MoveError::Occupied);
        }

        let config = &*self.config;
        let mut board = self.board.clone();
        board.set(c, Color::Black);
        let (own, opponent) = update_groups(config, &board, &self.groups.0, &self.groups.1, c);

        // Opponent captures first, then our own suicide.
        let mut captured = BTreeSet::new();
        let mut final_opponent = Vec::with_capacity(opponent.len());
        for group in opponent {
            if group.liberties.is_empty() {
                for &s in &group.stones {
                    board.set(s, Color::Empty);
                }
                captured.extend(group.stones.iter().copied());
            } else {
                final_opponent.push(group);
            }
        }

        let final_own = if captured.is_empty() {
            if own.iter().any(|g| g.liberties.is_empty()) {
                return Err(MoveError::Suicide);
            }
            own
        } else {
            let touched = find_neighbors(config, &board, Color::Black, &captured);
            own.into_iter()
                .map(|g| {
                    if g.stones.is_disjoint(&touched) {
                        g
                    } else {
                        let liberties = find_liberties(config, &board, &g.stones);
                        Arc::new(Group::new(g.stones.clone(), liberties))
                    }
                })
                .collect()
        };

        let ko = if captured.len() == 1 && is_koish(config, &self.board, c) == Some(Color::White) {
            captured.first().copied()
        } else {
            None
        };

        let mut recent = self.recent.clone();
        recent.push(mv);
        Ok(Position {
            config: Arc::clone(&self.config),
            board: board.flipped(),
            n: self.n + 1,
            komi: -self.komi,
            caps: (self.caps.1, self.caps.0 + captured.len() as u32),
            groups: (final_opponent, final_own),
            ko,
            recent,
            player1turn: !self.player1turn,
        })
    }

    pub fn is_move_legal(&self, mv: Move) -> bool {
        self.play(mv).is_ok()
    }

    /// Place a setup stone of real color `color` without changing the turn.
    ///
    /// No captures are resolved; groups are recomputed from scratch and the
    /// ko is cleared.
    pub fn add_stone(&self, color: Color, c: Coord) -> Result<Position, MoveError> {
        if self.board.get(c) != Color::Empty {
            return Err(MoveError::Occupied);
        }
        let internal = if self.player1turn {
            color
        } else {
            color.opponent()
        };
        let mut board = self.board.clone();
        board.set(c, internal);
        let groups = deduce_groups(&self.config, &board);
        Ok(Position {
            board,
            groups,
            ko: None,
            ..self.clone()
        })
    }

    /// Area score from Black's point of view, komi included.
    ///
    /// Empty regions bordered by a single color count for that color;
    /// regions touching both colors (dame, seki) or no stones count for
    /// nobody.
    pub fn score(&self) -> f32 {
        let config = &*self.config;
        let mut visited = vec![false; config.area()];
        let mut own = self.board.count(Color::Black) as f32;
        let mut opponent = self.board.count(Color::White) as f32;

        for c in self.board.points_of(Color::Empty) {
            if visited[config.index(c)] {
                continue;
            }
            let territory = flood_fill(config, &self.board, c);
            for t in &territory {
                visited[config.index(*t)] = true;
            }
            let own_border =
                !find_neighbors(config, &self.board, Color::Black, &territory).is_empty();
            let opponent_border =
                !find_neighbors(config, &self.board, Color::White, &territory).is_empty();
            match (own_border, opponent_border) {
                (true, false) => own += territory.len() as f32,
                (false, true) => opponent += territory.len() as f32,
                _ => {}
            }
        }

        let score = own - opponent - self.komi;
        if self.player1turn { score } else { -score }
    }

    /// [`is_koish`] on this position's board, in real colors.
    pub fn is_koish(&self, c: Coord) -> Option<Color> {
        is_koish(&self.config, &self.board, c).map(|color| self.to_absolute(color))
    }

    /// [`is_eye`] on this position's board, in real colors.
    pub fn is_eye(&self, c: Coord) -> Option<Color> {
        is_eye(&self.config, &self.board, c).map(|color| self.to_absolute(color))
    }

    fn to_absolute(&self, internal: Color) -> Color {
        if self.player1turn {
            internal
        } else {
            internal.opponent()
        }
    }
}

/// Check whether `c` is empty and surrounded on all sides by one color.
///
/// Board edges don't disqualify a point. Returns the surrounding color.
pub fn is_koish(config: &BoardConfig, board: &Board, c: Coord) -> Option<Color> {
    if board.get(c) != Color::Empty {
        return None;
    }
    let mut eyecolor = None;
    for &n in config.neighbors(c) {
        match (board.get(n), eyecolor) {
            (Color::Empty, _) => return None,
            (color, None) => eyecolor = Some(color),
            (color, Some(e)) if color != e => return None,
            _ => {}
        }
    }
    eyecolor
}

/// Check whether `c` is an eye, for the purpose of restricting rollouts.
///
/// A koish point is an eye unless it has more than one fault: being on the
/// edge counts as one fault, and so does each diagonal held by the other
/// color. This is a heuristic; false eyes in seki can slip through.
pub fn is_eye(config: &BoardConfig, board: &Board, c: Coord) -> Option<Color> {
    let color = is_koish(config, board, c)?;
    let diagonals = config.diagonals(c);
    let mut faults = usize::from(diagonals.len() < 4);
    faults += diagonals
        .iter()
        .filter(|&&d| board.get(d) == color.opponent())
        .count();
    if faults > 1 { None } else { Some(color) }
}

impl fmt::Debug for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        write!(f, "{self}")
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const COLUMNS: &str = "ABCDEFGHJKLMNOPQRSTUVWXYZ";
        let size = self.config.size();
        let last = match self.last_move() {
            Some(Move::Play(c)) => Some(c),
            _ => None,
        };
        let header: Vec<String> = COLUMNS.chars().take(size).map(String::from).collect();
        let header = format!("   {}   ", header.join(" "));

        writeln!(f, "{header}")?;
        for row in 0..size {
            let label = format!("{:2} ", size - row);
            write!(f, "{label}")?;
            for col in 0..size {
                let c = Coord::new(row as u8, col as u8);
                let ch = match self.stone_at(c) {
                    _ if self.ko == Some(c) => '*',
                    Color::Black => 'X',
                    Color::White => 'O',
                    Color::Empty => '.',
                };
                let marker = if last == Some(c) { '<' } else { ' ' };
                write!(f, "{ch}{marker}")?;
            }
            writeln!(f, "{label}")?;
        }
        writeln!(f, "{header}")?;
        let last = self
            .last_move()
            .map(|mv| format_kgs_coords(&self.config, mv))
            .unwrap_or_else(|| "-".to_string());
        writeln!(
            f,
            "Move: {}. Last: {}. Captures X: {} O: {}",
            self.n,
            last,
            self.captures(Color::Black),
            self.captures(Color::White)
        )
    }
}
