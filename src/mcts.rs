//! Monte Carlo Tree Search (MCTS) guided by a policy oracle.
//!
//! This module implements PUCT search:
//! - Selection by `Q + U`, where `U` is an exploration bonus weighted by the
//!   oracle's prior for the move
//! - Lazy expansion: a child's position is only computed when it is first
//!   selected, and illegal children are pruned at that point
//! - Leaf evaluation by a pluggable [`LeafEvaluator`], playouts by default
//! - Backup of the value along the parent chain, negated at every ply
//!
//! Nodes live in an arena and refer to their parent by index. All notation
//! (Q, U, N, c_puct) follows the AlphaGo paper.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use anyhow::Context;
use log::{debug, info, trace};

use crate::board::Move;
use crate::constants::{C_PUCT, REPORT_CHILDREN, RESIGN_MIN_VISITS, RESIGN_THRES, SECONDS_PER_MOVE};
use crate::coords::format_kgs_coords;
use crate::playout::{is_move_reasonable, outcome, simulate_game, RolloutConfig};
use crate::policy::{MoveProbabilities, PolicyOracle};
use crate::position::{MoveError, Position};
use crate::strategies::{MoveSuggester, Suggestion};

/// Index of a node in its tree's arena.
pub type NodeId = usize;

/// A node in the search tree.
///
/// A plain node only knows its Q and U values so the parent can decide
/// between children. Once expanded it also holds its position and one child
/// per candidate move.
#[derive(Debug, Clone)]
pub struct MctsNode {
    pub parent: Option<NodeId>,
    /// The move that led here; `None` for the root
    pub mv: Option<Move>,
    pub prior: f64,
    /// Lazily computed on first selection
    pub position: Option<Position>,
    pub children: BTreeMap<Move, NodeId>,
    /// Average outcome for the player who chose this node's move
    pub q: f64,
    /// Exploration bonus
    pub u: f64,
    /// Visit count
    pub n: u32,
    expanded: bool,
}

impl MctsNode {
    fn new(parent: Option<NodeId>, mv: Option<Move>, prior: f64, q: f64) -> Self {
        MctsNode {
            parent,
            mv,
            prior,
            position: None,
            children: BTreeMap::new(),
            q,
            u: prior,
            n: 0,
            expanded: false,
        }
    }

    #[inline]
    pub fn action_score(&self) -> f64 {
        self.q + self.u
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }
}

/// Result of one select/expand/evaluate/backup cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SimulationOutcome {
    /// The leaf was evaluated and its value (for the player who chose the
    /// leaf) backed up to the root.
    Completed { leaf: NodeId, value: f64 },
    /// The selected move turned out to be illegal and was removed.
    Pruned(Move),
}

/// Estimates the value of a leaf position.
pub trait LeafEvaluator {
    /// Value in [-1, 1] for the player to move in `position`.
    fn evaluate(&mut self, position: &Position, policy: &dyn PolicyOracle) -> anyhow::Result<f64>;
}

/// Values a leaf by playing the game out and scoring it.
pub struct RolloutEvaluator {
    rollout: Option<RolloutConfig>,
    rng: fastrand::Rng,
}

impl RolloutEvaluator {
    /// `rollout: None` uses [`RolloutConfig::for_board`] for the leaf's board.
    pub fn new(rollout: Option<RolloutConfig>, seed: u64) -> Self {
        RolloutEvaluator {
            rollout,
            rng: fastrand::Rng::with_seed(seed),
        }
    }
}

impl LeafEvaluator for RolloutEvaluator {
    fn evaluate(&mut self, position: &Position, policy: &dyn PolicyOracle) -> anyhow::Result<f64> {
        let rollout = self
            .rollout
            .unwrap_or_else(|| RolloutConfig::for_board(position.config()));
        let end = simulate_game(policy, policy, position, &rollout, &mut self.rng)?;
        Ok(outcome(&end, position.to_play()))
    }
}

/// Arena-backed search tree. The root is always node 0.
#[derive(Debug, Clone)]
pub struct MctsTree {
    nodes: Vec<MctsNode>,
    c_puct: f64,
}

impl MctsTree {
    pub const ROOT: NodeId = 0;

    /// Create a root for `position` and expand it with `probs`.
    pub fn new(position: Position, probs: &MoveProbabilities, c_puct: f64) -> Self {
        let mut root = MctsNode::new(None, None, 0.0, 0.0);
        root.position = Some(position);
        let mut tree = MctsTree {
            nodes: vec![root],
            c_puct,
        };
        tree.expand(Self::ROOT, probs);
        tree
    }

    pub fn node(&self, id: NodeId) -> &MctsNode {
        &self.nodes[id]
    }

    pub fn root(&self) -> &MctsNode {
        &self.nodes[Self::ROOT]
    }

    /// Number of nodes ever allocated, pruned ones included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn child(&self, id: NodeId, mv: Move) -> Option<NodeId> {
        self.nodes[id].children.get(&mv).copied()
    }

    /// Descend from the root by maximal `Q + U` until an unexpanded node
    /// (or a childless terminal node) is reached. Ties go to the first
    /// child in move order.
    pub fn select_leaf(&self) -> NodeId {
        let mut current = Self::ROOT;
        loop {
            let node = &self.nodes[current];
            if !node.expanded {
                return current;
            }
            let mut best: Option<(NodeId, f64)> = None;
            for &child in node.children.values() {
                let score = self.nodes[child].action_score();
                if best.is_none_or(|(_, s)| score > s) {
                    best = Some((child, score));
                }
            }
            match best {
                Some((child, _)) => current = child,
                None => return current,
            }
        }
    }

    /// Create one child per candidate move. Children inherit this node's Q
    /// and start with U equal to their prior.
    ///
    /// Occupied points and zero-probability moves are skipped; pass is always
    /// added, since some positions (seki) are only resolved by passing.
    pub fn expand(&mut self, id: NodeId, probs: &MoveProbabilities) {
        let q = self.nodes[id].q;
        let position = self.nodes[id]
            .position
            .as_ref()
            .expect("expanding a node without a position");
        let board = position.board();
        let candidates: Vec<(Move, f64)> = probs
            .iter()
            .filter(|&(mv, p)| match mv {
                Move::Pass => true,
                Move::Play(c) => p > 0.0 && !board.get(c).is_stone(),
            })
            .map(|(mv, p)| (mv, p as f64))
            .collect();

        for (mv, prior) in candidates {
            let child = self.nodes.len();
            self.nodes.push(MctsNode::new(Some(id), Some(mv), prior, q));
            self.nodes[id].children.insert(mv, child);
        }
        self.nodes[id].expanded = true;
    }

    /// Compute a node's position by playing its move on the parent's.
    pub fn compute_position(&mut self, id: NodeId) -> Result<&Position, MoveError> {
        if self.nodes[id].position.is_none() {
            let node = &self.nodes[id];
            let (Some(parent), Some(mv)) = (node.parent, node.mv) else {
                unreachable!("only the root lacks a parent, and it always has a position");
            };
            let parent_position = self.nodes[parent]
                .position
                .as_ref()
                .expect("parent of a selected node is expanded");
            let position = parent_position.play(mv)?;
            self.nodes[id].position = Some(position);
        }
        Ok(self.nodes[id].position.as_ref().expect("position was just set"))
    }

    /// Detach a node from its parent. The arena slot is left behind.
    pub fn remove_child(&mut self, id: NodeId) {
        if let (Some(parent), Some(mv)) = (self.nodes[id].parent, self.nodes[id].mv) {
            self.nodes[parent].children.remove(&mv);
        }
    }

    /// Record `value` (for the player who chose `id`'s move) at `id` and every
    /// ancestor, flipping sign at each ply.
    pub fn backup_value(&mut self, id: NodeId, value: f64) {
        let mut current = id;
        let mut value = value;
        loop {
            let node = &mut self.nodes[current];
            node.n += 1;
            let Some(parent) = node.parent else {
                // Root Q/U are never used for selection.
                return;
            };
            let parent_n = self.nodes[parent].n as f64;
            let node = &mut self.nodes[current];
            let n = node.n as f64;
            node.q += (value - node.q) / n;
            node.u = self.c_puct * parent_n.sqrt() * node.prior / n;
            value = -value;
            current = parent;
        }
    }

    /// Run one simulation: select, expand, evaluate, back up.
    ///
    /// An illegal selected move is pruned and the simulation ends without a
    /// backup. Oracle and evaluator failures are returned as errors.
    pub fn tree_search<P, E>(
        &mut self,
        policy: &P,
        evaluator: &mut E,
    ) -> anyhow::Result<SimulationOutcome>
    where
        P: PolicyOracle,
        E: LeafEvaluator + ?Sized,
    {
        let leaf = self.select_leaf();
        let position = match self.compute_position(leaf) {
            Ok(position) => position.clone(),
            Err(err) => {
                let mv = self.nodes[leaf].mv.unwrap_or(Move::Pass);
                trace!("pruning {mv:?}: {err}");
                self.remove_child(leaf);
                return Ok(SimulationOutcome::Pruned(mv));
            }
        };

        if !self.nodes[leaf].expanded {
            if position.is_game_over() {
                self.nodes[leaf].expanded = true;
            } else {
                let probs = policy
                    .evaluate(&position)
                    .with_context(|| format!("policy failed at move {}", position.n()))?;
                self.expand(leaf, &probs);
            }
        }

        // The evaluator scores for the side to move at the leaf; the leaf's
        // statistics belong to the side that chose it.
        let value = -evaluator.evaluate(&position, policy)?;
        trace!("leaf {leaf} value {value}");
        self.backup_value(leaf, value);
        Ok(SimulationOutcome::Completed { leaf, value })
    }

    /// Root moves ordered by visit count, most visited first. Equal counts
    /// keep move order.
    pub fn ranked_moves(&self) -> Vec<(Move, &MctsNode)> {
        let mut moves: Vec<(Move, &MctsNode)> = self
            .root()
            .children
            .iter()
            .map(|(&mv, &id)| (mv, &self.nodes[id]))
            .collect();
        moves.sort_by(|a, b| b.1.n.cmp(&a.1.n));
        moves
    }
}

/// Search parameters.
#[derive(Debug, Clone)]
pub struct MctsConfig {
    pub c_puct: f64,
    /// Wall-clock budget per move
    pub time_budget: Duration,
    /// Stop early after this many simulations
    pub max_simulations: Option<usize>,
    /// `None` derives the limits from the board size
    pub rollout: Option<RolloutConfig>,
    /// Resign when the chosen move's Q drops below this
    pub resign_threshold: Option<f64>,
    pub seed: u64,
}

impl Default for MctsConfig {
    fn default() -> Self {
        MctsConfig {
            c_puct: C_PUCT,
            time_budget: Duration::from_secs_f64(SECONDS_PER_MOVE),
            max_simulations: None,
            rollout: None,
            resign_threshold: Some(RESIGN_THRES),
            seed: 0,
        }
    }
}

/// Counters from one call to [`MctsPlayer::search`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub simulations: usize,
    pub pruned: usize,
}

/// Move suggester running PUCT search from scratch for every move.
pub struct MctsPlayer<P, E = RolloutEvaluator> {
    policy: P,
    evaluator: E,
    config: MctsConfig,
}

impl<P: PolicyOracle> MctsPlayer<P, RolloutEvaluator> {
    pub fn new(policy: P, config: MctsConfig) -> Self {
        let evaluator = RolloutEvaluator::new(config.rollout, config.seed);
        MctsPlayer {
            policy,
            evaluator,
            config,
        }
    }
}

impl<P: PolicyOracle, E: LeafEvaluator> MctsPlayer<P, E> {
    pub fn with_evaluator(policy: P, evaluator: E, config: MctsConfig) -> Self {
        MctsPlayer {
            policy,
            evaluator,
            config,
        }
    }

    pub fn config(&self) -> &MctsConfig {
        &self.config
    }

    /// Build a tree for `position` and search until the time budget runs
    /// out or `max_simulations` is reached. A running simulation is always
    /// finished before the clock is checked.
    pub fn search(&mut self, position: &Position) -> anyhow::Result<(MctsTree, SearchStats)> {
        let start = Instant::now();
        let probs = self
            .policy
            .evaluate(position)
            .context("policy failed at the root")?;
        let mut tree = MctsTree::new(position.clone(), &probs, self.config.c_puct);
        let mut stats = SearchStats::default();

        while start.elapsed() < self.config.time_budget
            && self.config.max_simulations.is_none_or(|max| stats.simulations < max)
        {
            let simulation = tree.tree_search(&self.policy, &mut self.evaluator)?;
            if let SimulationOutcome::Pruned(_) = simulation {
                stats.pruned += 1;
            }
            stats.simulations += 1;
        }

        info!(
            "Searched {} simulations ({} pruned) in {:.2}s",
            stats.simulations,
            stats.pruned,
            start.elapsed().as_secs_f64()
        );
        if log::log_enabled!(log::Level::Debug) {
            dump_children(&tree);
        }
        Ok((tree, stats))
    }

    /// Pick the most visited reasonable root move, or resign if it looks lost.
    ///
    /// Because pass competes with board moves purely on visit count, a
    /// search that never favours passing can end up filling its own eyes
    /// once nothing else is left. This is accepted.
    pub fn choose(&self, tree: &MctsTree, position: &Position) -> Suggestion {
        let Some((mv, node)) = tree
            .ranked_moves()
            .into_iter()
            .find(|&(mv, _)| is_move_reasonable(position, mv))
        else {
            return Suggestion::Move(Move::Pass);
        };
        match self.config.resign_threshold {
            Some(threshold) if node.n >= RESIGN_MIN_VISITS && node.q < threshold => {
                info!("Resigning: best move Q {:.3} below {threshold}", node.q);
                Suggestion::Resign
            }
            _ => Suggestion::Move(mv),
        }
    }
}

impl<P: PolicyOracle, E: LeafEvaluator> MoveSuggester for MctsPlayer<P, E> {
    fn suggest_move(&mut self, position: &Position) -> anyhow::Result<Suggestion> {
        let (tree, _) = self.search(position)?;
        Ok(self.choose(&tree, position))
    }
}

/// Log the most visited root children.
pub fn dump_children(tree: &MctsTree) {
    let config = tree
        .root()
        .position
        .as_ref()
        .map(|p| p.config().clone());
    for (mv, child) in tree.ranked_moves().into_iter().take(REPORT_CHILDREN) {
        let name = config
            .as_ref()
            .map(|c| format_kgs_coords(c, mv))
            .unwrap_or_else(|| format!("{mv:?}"));
        debug!(
            "move {name} n={} q={:.3} u={:.3} prior={:.4}",
            child.n, child.q, child.u, child.prior
        );
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::board::{Board, BoardConfig, Color, Coord};
    use crate::policy::{FnPolicy, UniformPolicy};

    /// Evaluator returning a fixed value, for checking bookkeeping.
    struct Constant(f64);

    impl LeafEvaluator for Constant {
        fn evaluate(&mut self, _: &Position, _: &dyn PolicyOracle) -> anyhow::Result<f64> {
            Ok(self.0)
        }
    }

    /// Evaluator under which White always wins.
    struct WhiteWins;

    impl LeafEvaluator for WhiteWins {
        fn evaluate(&mut self, position: &Position, _: &dyn PolicyOracle) -> anyhow::Result<f64> {
            Ok(match position.to_play() {
                Color::White => 1.0,
                _ => -1.0,
            })
        }
    }

    fn small_tree() -> MctsTree {
        let config = BoardConfig::new(3);
        let position = Position::initial_state(Arc::clone(&config), 0.5);
        MctsTree::new(position, &MoveProbabilities::uniform(&config), C_PUCT)
    }

    #[test]
    fn test_root_expansion() {
        let tree = small_tree();
        let root = tree.root();
        assert!(root.is_expanded());
        assert_eq!(root.children.len(), 10);
        assert!(root.children.contains_key(&Move::Pass));
        for &id in root.children.values() {
            let child = tree.node(id);
            assert_eq!(child.q, 0.0);
            assert_eq!(child.u, child.prior);
            assert_eq!(child.n, 0);
            assert!(child.position.is_none());
        }
    }

    #[test]
    fn test_select_leaf_breaks_ties_in_move_order() {
        let tree = small_tree();
        let leaf = tree.select_leaf();
        assert_eq!(tree.node(leaf).mv, Some(Move::Play(Coord::new(0, 0))));
    }

    #[test]
    fn test_backup_value() {
        let mut tree = small_tree();
        let child = tree.child(MctsTree::ROOT, Move::Play(Coord::new(1, 1))).unwrap();
        let prior = tree.node(child).prior;

        tree.backup_value(child, 1.0);
        assert_eq!(tree.node(child).n, 1);
        assert_eq!(tree.node(child).q, 1.0);
        assert_eq!(tree.node(child).u, 0.0);
        assert_eq!(tree.root().n, 1);

        tree.backup_value(child, -1.0);
        assert_eq!(tree.node(child).n, 2);
        assert_eq!(tree.node(child).q, 0.0);
        assert!((tree.node(child).u - C_PUCT * 1.0 * prior / 2.0).abs() < 1e-12);
        assert_eq!(tree.root().n, 2);
    }

    #[test]
    fn test_backup_negates_per_ply() {
        let mut tree = small_tree();
        let child = tree.child(MctsTree::ROOT, Move::Play(Coord::new(1, 1))).unwrap();
        tree.compute_position(child).unwrap();
        let config = BoardConfig::new(3);
        tree.expand(child, &MoveProbabilities::uniform(&config));
        let grandchild = tree.child(child, Move::Play(Coord::new(0, 0))).unwrap();

        tree.backup_value(grandchild, 1.0);
        assert_eq!(tree.node(grandchild).q, 1.0);
        assert_eq!(tree.node(child).q, -1.0);
        assert_eq!(tree.root().n, 1);
    }

    #[test]
    fn test_illegal_child_is_pruned() {
        let config = BoardConfig::new(3);
        let board = Board::from_diagram(
            3,
            "
            .X.
            X..
            ...
            ",
        )
        .unwrap();
        let position = Position::from_board(Arc::clone(&config), &board, Color::White, 0.5);
        // all the mass on a suicide point
        let oracle = FnPolicy(|p: &Position| -> anyhow::Result<MoveProbabilities> {
            let mut probs = vec![0.01; 10];
            probs[0] = 0.9;
            Ok(MoveProbabilities::new(p.config(), probs)?)
        });
        let probs = oracle.evaluate(&position).unwrap();
        let mut tree = MctsTree::new(position.clone(), &probs, C_PUCT);
        let outcome = tree.tree_search(&oracle, &mut Constant(0.0)).unwrap();

        let a3 = Move::Play(Coord::new(0, 0));
        assert_eq!(outcome, SimulationOutcome::Pruned(a3));
        assert!(!tree.root().children.contains_key(&a3));
        assert_eq!(tree.root().n, 0);

        // the next simulation goes elsewhere and completes
        let outcome = tree.tree_search(&oracle, &mut Constant(0.0)).unwrap();
        assert!(matches!(outcome, SimulationOutcome::Completed { .. }));
        assert_eq!(tree.root().n, 1);
    }

    #[test]
    fn test_visits_sum_to_simulations() {
        let config = BoardConfig::new(5);
        let position = Position::initial_state(Arc::clone(&config), 0.5);
        let mut player = MctsPlayer::new(
            UniformPolicy,
            MctsConfig {
                time_budget: Duration::from_secs(600),
                max_simulations: Some(60),
                seed: 3,
                ..MctsConfig::default()
            },
        );
        let (tree, stats) = player.search(&position).unwrap();

        assert_eq!(stats.simulations, 60);
        let completed = (stats.simulations - stats.pruned) as u32;
        assert_eq!(tree.root().n, completed);
        let child_visits: u32 = tree.root().children.values().map(|&id| tree.node(id).n).sum();
        assert_eq!(child_visits, completed);
    }

    #[test]
    fn test_oracle_failure_propagates() {
        let config = BoardConfig::new(3);
        let position = Position::initial_state(Arc::clone(&config), 0.5);
        let failing = FnPolicy(|p: &Position| -> anyhow::Result<MoveProbabilities> {
            if p.n() == 0 {
                Ok(MoveProbabilities::uniform(p.config()))
            } else {
                anyhow::bail!("oracle offline")
            }
        });
        let mut tree = MctsTree::new(position, &MoveProbabilities::uniform(&config), C_PUCT);
        let err = tree.tree_search(&failing, &mut Constant(0.0)).unwrap_err();
        assert!(format!("{err:#}").contains("oracle offline"));
        assert_eq!(tree.root().n, 0);
    }

    #[test]
    fn test_resigns_when_lost() {
        let config = BoardConfig::new(3);
        let position = Position::initial_state(Arc::clone(&config), 0.5);
        let mut player = MctsPlayer::with_evaluator(
            UniformPolicy,
            WhiteWins,
            MctsConfig {
                time_budget: Duration::from_secs(600),
                max_simulations: Some(1000),
                ..MctsConfig::default()
            },
        );
        assert_eq!(player.suggest_move(&position).unwrap(), Suggestion::Resign);
    }
}
