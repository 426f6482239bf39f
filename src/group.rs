//! Group and liberty tracking.
//!
//! A [`Group`] is an immutable snapshot of one maximal chain of same-colored
//! stones and its liberties. Positions hold groups behind `Arc`, so a move
//! only allocates the groups it actually touches; everything else is shared
//! with the previous position.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::board::{Board, BoardConfig, Color, Coord};

/// One connected chain of stones and the empty points adjacent to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Group {
    pub stones: BTreeSet<Coord>,
    pub liberties: BTreeSet<Coord>,
}

pub type Groups = Vec<Arc<Group>>;

impl Group {
    pub fn new(stones: BTreeSet<Coord>, liberties: BTreeSet<Coord>) -> Self {
        Group { stones, liberties }
    }

    /// True when the group has exactly one liberty left.
    pub fn in_atari(&self) -> bool {
        self.liberties.len() == 1
    }
}

/// Collect the chain of same-colored points connected to `start`.
///
/// Works for empty regions too, which is how scoring finds territories.
pub fn flood_fill(config: &BoardConfig, board: &Board, start: Coord) -> BTreeSet<Coord> {
    let color = board.get(start);
    let mut visited = vec![false; config.area()];
    let mut stack = vec![start];
    let mut chain = BTreeSet::new();
    visited[config.index(start)] = true;

    while let Some(pt) = stack.pop() {
        chain.insert(pt);
        for &n in config.neighbors(pt) {
            let i = config.index(n);
            if !visited[i] && board.get(n) == color {
                visited[i] = true;
                stack.push(n);
            }
        }
    }
    chain
}

/// Points of `color` adjacent to any of `stones`.
pub fn find_neighbors<'a>(
    config: &BoardConfig,
    board: &Board,
    color: Color,
    stones: impl IntoIterator<Item = &'a Coord>,
) -> BTreeSet<Coord> {
    stones
        .into_iter()
        .flat_map(|&s| config.neighbors(s).iter().copied())
        .filter(|&n| board.get(n) == color)
        .collect()
}

/// Empty points adjacent to any of `stones`.
pub fn find_liberties<'a>(
    config: &BoardConfig,
    board: &Board,
    stones: impl IntoIterator<Item = &'a Coord>,
) -> BTreeSet<Coord> {
    find_neighbors(config, board, Color::Empty, stones)
}

/// Full group decomposition of a board, as `(black_groups, white_groups)`.
///
/// Each stone is visited once, groups come out ordered by their first stone
/// in row-major order.
pub fn deduce_groups(config: &BoardConfig, board: &Board) -> (Groups, Groups) {
    let find_groups = |color: Color| -> Groups {
        let mut visited = vec![false; config.area()];
        let mut groups = Vec::new();
        for c in board.points_of(color) {
            if visited[config.index(c)] {
                continue;
            }
            let stones = flood_fill(config, board, c);
            for s in &stones {
                visited[config.index(*s)] = true;
            }
            let liberties = find_liberties(config, board, &stones);
            groups.push(Arc::new(Group::new(stones, liberties)));
        }
        groups
    };
    (find_groups(Color::Black), find_groups(Color::White))
}

/// Incrementally update groups after a stone was placed at `placed_at`.
///
/// `board` already holds the new stone. `own` are the mover's groups and
/// `opponent` the other side's. Own groups touching the stone are merged
/// with it; opponent groups lose the liberty. The result reflects the board
/// before captures are processed, so opponent groups may have no liberties.
pub fn update_groups(
    config: &BoardConfig,
    board: &Board,
    own: &[Arc<Group>],
    opponent: &[Arc<Group>],
    placed_at: Coord,
) -> (Groups, Groups) {
    let mut new_own = Vec::with_capacity(own.len() + 1);
    let mut stones = BTreeSet::from([placed_at]);
    let mut liberties: BTreeSet<Coord> = config
        .neighbors(placed_at)
        .iter()
        .copied()
        .filter(|&n| board.get(n) == Color::Empty)
        .collect();

    for g in own {
        if g.liberties.contains(&placed_at) {
            stones.extend(g.stones.iter().copied());
            liberties.extend(g.liberties.iter().copied());
        } else {
            new_own.push(Arc::clone(g));
        }
    }
    liberties.remove(&placed_at);
    new_own.push(Arc::new(Group::new(stones, liberties)));

    let new_opponent = opponent
        .iter()
        .map(|g| {
            if g.liberties.contains(&placed_at) {
                let mut liberties = g.liberties.clone();
                liberties.remove(&placed_at);
                Arc::new(Group::new(g.stones.clone(), liberties))
            } else {
                Arc::clone(g)
            }
        })
        .collect();

    (new_own, new_opponent)
}
