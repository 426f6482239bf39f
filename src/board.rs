//! Board geometry and the raw stone grid.
//!
//! [`BoardConfig`] holds the board size together with precomputed neighbor
//! and diagonal tables. It is built once per size and shared as an
//! `Arc<BoardConfig>` by every position and search tree on that size.
//!
//! Coordinates are `(row, col)` with `(0, 0)` in the upper left corner and
//! `(size - 1, 0)` in the lower left.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::constants::MAX_BOARD_SIZE;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Color {
    Black,
    White,
    Empty,
}

impl Color {
    /// The other stone color. `Empty` stays `Empty`.
    #[inline]
    pub fn opponent(self) -> Color {
        match self {
            Color::Black => Color::White,
            Color::White => Color::Black,
            Color::Empty => Color::Empty,
        }
    }

    pub fn is_stone(self) -> bool {
        self != Color::Empty
    }
}

/// A point on the board.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coord {
    pub row: u8,
    pub col: u8,
}

impl Coord {
    pub const fn new(row: u8, col: u8) -> Self {
        Coord { row, col }
    }
}

/// A move: either a stone placement or a pass.
///
/// Ordering puts every board point (row-major) before `Pass`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Move {
    Play(Coord),
    Pass,
}

impl Move {
    pub fn coord(self) -> Option<Coord> {
        match self {
            Move::Play(c) => Some(c),
            Move::Pass => None,
        }
    }

    pub fn is_pass(self) -> bool {
        self == Move::Pass
    }
}

impl From<Coord> for Move {
    fn from(c: Coord) -> Self {
        Move::Play(c)
    }
}

/// Errors raised while loading a board from text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BoardError {
    #[error("board diagram has {found} rows, expected {expected}")]
    RowCount { expected: usize, found: usize },
    #[error("board diagram row {row} has {found} points, expected {expected}")]
    RowLength {
        row: usize,
        expected: usize,
        found: usize,
    },
    #[error("unexpected character {0:?} in board diagram")]
    InvalidCell(char),
}

/// Board size plus adjacency tables, immutable after construction.
#[derive(Debug)]
pub struct BoardConfig {
    size: usize,
    all_coords: Vec<Coord>,
    neighbors: Vec<Vec<Coord>>,
    diagonals: Vec<Vec<Coord>>,
}

impl BoardConfig {
    /// Build the tables for an `size`x`size` board.
    ///
    /// # Panics
    /// If `size` is zero or larger than [`MAX_BOARD_SIZE`].
    pub fn new(size: usize) -> Arc<Self> {
        assert!(
            (1..=MAX_BOARD_SIZE).contains(&size),
            "unsupported board size {size}"
        );
        let all_coords: Vec<Coord> = (0..size)
            .flat_map(|r| (0..size).map(move |c| Coord::new(r as u8, c as u8)))
            .collect();

        let in_bounds = |r: isize, c: isize| -> Option<Coord> {
            let n = size as isize;
            if r >= 0 && r < n && c >= 0 && c < n {
                Some(Coord::new(r as u8, c as u8))
            } else {
                None
            }
        };

        let mut neighbors = Vec::with_capacity(size * size);
        let mut diagonals = Vec::with_capacity(size * size);
        for c in &all_coords {
            let (r, k) = (c.row as isize, c.col as isize);
            neighbors.push(
                [(r + 1, k), (r - 1, k), (r, k + 1), (r, k - 1)]
                    .into_iter()
                    .filter_map(|(r, k)| in_bounds(r, k))
                    .collect(),
            );
            diagonals.push(
                [(r + 1, k + 1), (r + 1, k - 1), (r - 1, k + 1), (r - 1, k - 1)]
                    .into_iter()
                    .filter_map(|(r, k)| in_bounds(r, k))
                    .collect(),
            );
        }

        Arc::new(BoardConfig {
            size,
            all_coords,
            neighbors,
            diagonals,
        })
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of points on the board.
    #[inline]
    pub fn area(&self) -> usize {
        self.size * self.size
    }

    /// Checked constructor for a coordinate on this board.
    pub fn coord(&self, row: usize, col: usize) -> Option<Coord> {
        (row < self.size && col < self.size).then(|| Coord::new(row as u8, col as u8))
    }

    pub fn contains(&self, c: Coord) -> bool {
        (c.row as usize) < self.size && (c.col as usize) < self.size
    }

    /// Flat row-major index of `c`.
    #[inline]
    pub fn index(&self, c: Coord) -> usize {
        debug_assert!(self.contains(c), "{c:?} is off a {0}x{0} board", self.size);
        c.row as usize * self.size + c.col as usize
    }

    /// Inverse of [`BoardConfig::index`].
    #[inline]
    pub fn from_index(&self, i: usize) -> Coord {
        self.all_coords[i]
    }

    /// Every point in row-major order.
    pub fn all_coords(&self) -> &[Coord] {
        &self.all_coords
    }

    /// Every point in row-major order followed by `Pass`.
    pub fn all_moves(&self) -> impl Iterator<Item = Move> + '_ {
        self.all_coords
            .iter()
            .map(|&c| Move::Play(c))
            .chain(std::iter::once(Move::Pass))
    }

    /// Orthogonal neighbors inside the board (2 to 4 of them).
    #[inline]
    pub fn neighbors(&self, c: Coord) -> &[Coord] {
        &self.neighbors[self.index(c)]
    }

    /// Diagonal neighbors inside the board (1 to 4 of them).
    #[inline]
    pub fn diagonals(&self, c: Coord) -> &[Coord] {
        &self.diagonals[self.index(c)]
    }
}

/// An NxN grid of colors.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Board {
    size: usize,
    cells: Vec<Color>,
}

impl Board {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![Color::Empty; size * size],
        }
    }

    /// Parse a text diagram, one row per line, top row first.
    ///
    /// `X`/`B` are black stones, `O`/`W` white stones, `.` empty points.
    /// Whitespace inside a row and blank lines are ignored.
    pub fn from_diagram(size: usize, diagram: &str) -> Result<Self, BoardError> {
        let mut board = Board::new(size);
        let rows: Vec<&str> = diagram
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if rows.len() != size {
            return Err(BoardError::RowCount {
                expected: size,
                found: rows.len(),
            });
        }
        for (r, line) in rows.iter().enumerate() {
            let cells: Vec<char> = line.chars().filter(|ch| !ch.is_whitespace()).collect();
            if cells.len() != size {
                return Err(BoardError::RowLength {
                    row: r,
                    expected: size,
                    found: cells.len(),
                });
            }
            for (c, ch) in cells.into_iter().enumerate() {
                let color = match ch {
                    'X' | 'B' => Color::Black,
                    'O' | 'W' => Color::White,
                    '.' => Color::Empty,
                    other => return Err(BoardError::InvalidCell(other)),
                };
                board.cells[r * size + c] = color;
            }
        }
        Ok(board)
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    fn idx(&self, c: Coord) -> usize {
        c.row as usize * self.size + c.col as usize
    }

    #[inline]
    pub fn get(&self, c: Coord) -> Color {
        self.cells[self.idx(c)]
    }

    #[inline]
    pub fn set(&mut self, c: Coord, color: Color) {
        let i = self.idx(c);
        self.cells[i] = color;
    }

    /// Copy of the board with black and white swapped.
    pub fn flipped(&self) -> Board {
        Board {
            size: self.size,
            cells: self.cells.iter().map(|c| c.opponent()).collect(),
        }
    }

    pub fn count(&self, color: Color) -> usize {
        self.cells.iter().filter(|&&c| c == color).count()
    }

    /// Points holding `color`, in row-major order.
    pub fn points_of(&self, color: Color) -> impl Iterator<Item = Coord> + '_ {
        let size = self.size;
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, c)| **c == color)
            .map(move |(i, _)| Coord::new((i / size) as u8, (i % size) as u8))
    }
}

impl fmt::Debug for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        write!(f, "{self}")
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.size) {
            for cell in row {
                let ch = match cell {
                    Color::Black => 'X',
                    Color::White => 'O',
                    Color::Empty => '.',
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
