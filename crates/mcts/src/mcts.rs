use std::time::Instant;

use gomoku_core::{Board, Move, Side};
use log::trace;
use rand::thread_rng;

use crate::backup::backup;
use crate::config::{MctsConfig, SearchLimit};
use crate::dirichlet::add_dirichlet_noise_to_root;
use crate::error::Result;
use crate::evaluation::{legal_moves, legal_priors, Evaluator};
use crate::expansion::{expand, expand_and_evaluate};
use crate::search_result::SearchResult;
use crate::selection::select;
use crate::tree::{MctsTree, NodeId};

/// Monte Carlo Tree Search guided by a policy/value evaluator (PUCT)
pub struct Mcts {
    tree: MctsTree,
}

impl Mcts {
    /// Create a new MCTS instance
    pub fn new() -> Self {
        Self {
            tree: MctsTree::new(),
        }
    }

    /// Run MCTS search from a given board position with `side` to move
    ///
    /// The tree is rebuilt from scratch on every call. Returns the most
    /// visited root move and the visit count of every root child.
    pub fn search<E: Evaluator + ?Sized>(
        &mut self,
        board: &Board,
        side: Side,
        evaluator: &E,
        config: &MctsConfig,
    ) -> Result<SearchResult> {
        let start = Instant::now();

        // 1. Initialize and expand the root with one evaluator query
        let root_id = self.tree.initialize_root(side);
        let legal = legal_moves(board, config);
        if legal.is_empty() {
            return Ok(SearchResult::no_move(start.elapsed()));
        }
        let evaluation = evaluator.evaluate(board, side)?;
        let priors = legal_priors(&evaluation.policy, &legal, board.size())?;
        expand(&mut self.tree, root_id, &priors);

        if self.tree.nodes[root_id].children.is_empty() {
            return Ok(SearchResult::no_move(start.elapsed()));
        }

        // 2. Add Dirichlet noise if configured
        if config.add_dirichlet_noise {
            add_dirichlet_noise_to_root(
                &mut self.tree,
                root_id,
                config.dirichlet_alpha,
                config.dirichlet_epsilon,
                &mut thread_rng(),
            )?;
        }

        // 3. Run simulations; the deadline is checked once per iteration
        let mut simulations = 0u32;
        loop {
            let mut scratch = board.clone();

            // Selection: traverse tree using PUCT, playing moves on the scratch board
            let leaf_id = select(&self.tree, root_id, config.c_puct, &mut scratch)?;

            // Evaluation: terminal check or evaluator query plus expansion
            let (value, _) =
                expand_and_evaluate(&mut self.tree, leaf_id, &scratch, evaluator, config)?;

            // Backup: each node stores value for the side that moved into it,
            // so a parent picks the child with the best value for itself
            backup(&mut self.tree, leaf_id, -value);

            simulations += 1;
            if limit_reached(config.limit, simulations, start) {
                break;
            }
        }

        trace!(
            "search finished: {} simulations, {} nodes, {:?}",
            simulations,
            self.tree.size(),
            start.elapsed()
        );

        // 4. Extract results
        Ok(self.create_search_result(root_id, simulations, start))
    }

    /// Create search result from root node statistics
    fn create_search_result(&self, root_id: NodeId, simulations: u32, start: Instant) -> SearchResult {
        let root = &self.tree.nodes[root_id];

        let root_visit_counts: Vec<(Move, u32)> = root
            .children
            .iter()
            .filter_map(|&id| {
                let child = &self.tree.nodes[id];
                child.move_action.map(|m| (m, child.visit_count))
            })
            .collect();

        SearchResult {
            best_move: most_visited(&root_visit_counts),
            root_visit_counts,
            root_value: -root.q_value(),
            num_simulations_run: simulations,
            elapsed: start.elapsed(),
        }
    }

    /// Reset the tree (clear all nodes)
    pub fn reset(&mut self) {
        self.tree.clear();
    }

    /// Get the number of nodes in the tree
    pub fn tree_size(&self) -> usize {
        self.tree.size()
    }

    /// Read-only view of the last search tree
    pub fn tree(&self) -> &MctsTree {
        &self.tree
    }
}

impl Default for Mcts {
    fn default() -> Self {
        Self::new()
    }
}

fn limit_reached(limit: SearchLimit, simulations: u32, start: Instant) -> bool {
    match limit {
        SearchLimit::Simulations(n) => simulations >= n,
        SearchLimit::Time(budget) => start.elapsed() >= budget,
    }
}

/// Highest visit count wins; the first child wins ties
fn most_visited(move_visits: &[(Move, u32)]) -> Option<Move> {
    let mut best: Option<(Move, u32)> = None;
    for &(mv, visits) in move_visits {
        match best {
            Some((_, v)) if visits <= v => {}
            _ => best = Some((mv, visits)),
        }
    }
    best.map(|(mv, _)| mv)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::{Evaluation, UniformEvaluator};
    use std::time::Duration;

    struct NoPriorEvaluator;

    impl Evaluator for NoPriorEvaluator {
        fn evaluate(&self, board: &Board, _side: Side) -> Result<Evaluation> {
            Ok(Evaluation {
                policy: vec![0.0; board.cell_count()],
                value: 0.0,
            })
        }
    }

    #[test]
    fn test_mcts_creation() {
        let mcts = Mcts::new();
        assert_eq!(mcts.tree_size(), 0);
    }

    #[test]
    fn test_mcts_reset() {
        let mut mcts = Mcts::new();
        let config = MctsConfig::default().with_simulations(4);
        mcts.search(&Board::new(5), Side::Black, &UniformEvaluator, &config)
            .unwrap();
        assert!(mcts.tree_size() > 0);
        mcts.reset();
        assert_eq!(mcts.tree_size(), 0);
    }

    #[test]
    fn test_most_visited_argmax() {
        let mv = |c| Move::new(0, c);
        let visits = vec![(mv(0), 10), (mv(1), 20), (mv(2), 5)];
        assert_eq!(most_visited(&visits), Some(mv(1)));
    }

    #[test]
    fn test_most_visited_first_on_tie() {
        let mv = |c| Move::new(0, c);
        let visits = vec![(mv(0), 3), (mv(1), 7), (mv(2), 7)];
        assert_eq!(most_visited(&visits), Some(mv(1)));
        assert_eq!(most_visited(&[]), None);
    }

    #[test]
    fn test_full_board_returns_no_move() {
        let board = Board::from_rows(&["XO", "OX"]).unwrap();
        let mut mcts = Mcts::new();
        let result = mcts
            .search(&board, Side::Black, &UniformEvaluator, &MctsConfig::default())
            .unwrap();
        assert!(result.best_move.is_none());
        assert!(result.root_visit_counts.is_empty());
    }

    #[test]
    fn test_zero_priors_return_no_move() {
        let mut mcts = Mcts::new();
        let config = MctsConfig::default().with_simulations(10);
        let result = mcts
            .search(&Board::new(5), Side::Black, &NoPriorEvaluator, &config)
            .unwrap();
        assert!(result.best_move.is_none());
    }

    #[test]
    fn test_simulation_limit_is_exact() {
        let mut mcts = Mcts::new();
        let config = MctsConfig::default().with_simulations(25);
        let result = mcts
            .search(&Board::new(5), Side::Black, &UniformEvaluator, &config)
            .unwrap();
        assert_eq!(result.num_simulations_run, 25);
        assert_eq!(result.total_visits(), 25);
        assert_eq!(mcts.tree().nodes[0].visit_count, 25);
    }

    #[test]
    fn test_time_budget_runs_at_least_once() {
        let mut mcts = Mcts::new();
        let config = MctsConfig::default().with_time_budget(Duration::ZERO);
        let result = mcts
            .search(&Board::new(5), Side::White, &UniformEvaluator, &config)
            .unwrap();
        assert!(result.num_simulations_run >= 1);
        let best = result.best_move.unwrap();
        assert!(result.visit_count_for_move(best) > 0);
    }
}
