//! Text coordinate formats used at the engine boundary.
//!
//! - KGS/GTP style: a column letter (`A`-`Z`, skipping `I`) followed by a row
//!   number counted from the bottom, e.g. `D4`. The pass token is `pass`.
//! - SGF style: two lowercase letters, column then row, counted from the
//!   upper left corner, e.g. `df`. The pass token is the empty string; `tt`
//!   is also accepted as pass on boards up to 19x19.

use thiserror::Error;

use crate::board::{BoardConfig, Coord, Move};

/// Column letters for the KGS format. `I` is skipped to avoid confusion with `J`.
const KGS_COLUMNS: &[u8] = b"ABCDEFGHJKLMNOPQRSTUVWXYZ";

const SGF_COLUMNS: &[u8] = b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordError {
    #[error("invalid coordinate {0:?}")]
    InvalidCoordinate(String),
}

fn invalid(s: &str) -> CoordError {
    CoordError::InvalidCoordinate(s.to_string())
}

/// Parse a KGS coordinate (`D4`, `pass`). Case-insensitive.
pub fn parse_kgs_coords(config: &BoardConfig, s: &str) -> Result<Move, CoordError> {
    let s = s.trim();
    if s.eq_ignore_ascii_case("pass") {
        return Ok(Move::Pass);
    }
    let bytes = s.as_bytes();
    if bytes.len() < 2 {
        return Err(invalid(s));
    }
    let letter = bytes[0].to_ascii_uppercase();
    let col = KGS_COLUMNS
        .iter()
        .position(|&b| b == letter)
        .ok_or_else(|| invalid(s))?;
    if !bytes[1..].iter().all(u8::is_ascii_digit) {
        return Err(invalid(s));
    }
    let row_from_bottom: usize = s[1..].parse().map_err(|_| invalid(s))?;
    if row_from_bottom == 0 || row_from_bottom > config.size() {
        return Err(invalid(s));
    }
    config
        .coord(config.size() - row_from_bottom, col)
        .map(Move::Play)
        .ok_or_else(|| invalid(s))
}

/// Format a move in KGS notation.
pub fn format_kgs_coords(config: &BoardConfig, mv: Move) -> String {
    match mv {
        Move::Pass => "pass".to_string(),
        Move::Play(c) => {
            let letter = KGS_COLUMNS[c.col as usize] as char;
            format!("{letter}{}", config.size() - c.row as usize)
        }
    }
}

/// Parse an SGF coordinate (`df`, empty for pass).
pub fn parse_sgf_coords(config: &BoardConfig, s: &str) -> Result<Move, CoordError> {
    if s.is_empty() || (s == "tt" && config.size() <= 19) {
        return Ok(Move::Pass);
    }
    let bytes = s.as_bytes();
    if bytes.len() != 2 {
        return Err(invalid(s));
    }
    let lookup = |b: u8| SGF_COLUMNS.iter().position(|&x| x == b);
    let col = lookup(bytes[0]).ok_or_else(|| invalid(s))?;
    let row = lookup(bytes[1]).ok_or_else(|| invalid(s))?;
    config
        .coord(row, col)
        .map(Move::Play)
        .ok_or_else(|| invalid(s))
}

/// Format a move in SGF notation. Passes become the empty string.
pub fn format_sgf_coords(mv: Move) -> String {
    match mv {
        Move::Pass => String::new(),
        Move::Play(Coord { row, col }) => {
            let col = SGF_COLUMNS[col as usize] as char;
            let row = SGF_COLUMNS[row as usize] as char;
            format!("{col}{row}")
        }
    }
}
