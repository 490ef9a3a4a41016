use std::sync::Arc;

use gomoku_core::{Board, Move, Side};

use crate::config::MctsConfig;
use crate::error::{MctsError, Result};

/// Output of one evaluator query
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    /// Probability for every cell, row-major (length `size * size`)
    pub policy: Vec<f32>,

    /// Position value in [-1, 1] from the perspective of the side to move
    pub value: f32,
}

/// Interface to the learned position evaluator.
///
/// Implementations must be side-effect free from the search's point of view;
/// the search may call `evaluate` any number of times.
pub trait Evaluator {
    fn evaluate(&self, board: &Board, side: Side) -> Result<Evaluation>;
}

impl<E: Evaluator + ?Sized> Evaluator for &E {
    fn evaluate(&self, board: &Board, side: Side) -> Result<Evaluation> {
        (**self).evaluate(board, side)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Box<E> {
    fn evaluate(&self, board: &Board, side: Side) -> Result<Evaluation> {
        (**self).evaluate(board, side)
    }
}

impl<E: Evaluator + ?Sized> Evaluator for Arc<E> {
    fn evaluate(&self, board: &Board, side: Side) -> Result<Evaluation> {
        (**self).evaluate(board, side)
    }
}

/// Uniform prior over every empty cell and a neutral value.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformEvaluator;

impl Evaluator for UniformEvaluator {
    fn evaluate(&self, board: &Board, _side: Side) -> Result<Evaluation> {
        let empty = board.cell_count() - board.stone_count();
        let p = if empty == 0 { 0.0 } else { 1.0 / empty as f32 };
        let policy = board
            .cells()
            .iter()
            .map(|c| if c.is_none() { p } else { 0.0 })
            .collect();
        Ok(Evaluation { policy, value: 0.0 })
    }
}

/// Terminal status of a position reached during search
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeafOutcome {
    /// The move into this position completed five in a row
    Win(Side),
    /// No legal move remains
    Draw,
    /// Not terminal; the evaluator must be queried
    NeedsEvaluation,
}

impl LeafOutcome {
    /// Terminal value from the perspective of `side`, or None if not terminal
    pub fn value_for(self, side: Side) -> Option<f32> {
        match self {
            LeafOutcome::Win(winner) if winner == side => Some(1.0),
            LeafOutcome::Win(_) => Some(-1.0),
            LeafOutcome::Draw => Some(0.0),
            LeafOutcome::NeedsEvaluation => None,
        }
    }
}

/// Classify a position given the move that produced it and the legal replies
pub fn classify_leaf(board: &Board, last: Option<(Move, Side)>, legal: &[Move]) -> LeafOutcome {
    if let Some((mv, mover)) = last {
        if board.is_winning_move(mv, mover) {
            return LeafOutcome::Win(mover);
        }
    }
    if legal.is_empty() {
        LeafOutcome::Draw
    } else {
        LeafOutcome::NeedsEvaluation
    }
}

/// Legal moves under the search configuration
pub fn legal_moves(board: &Board, config: &MctsConfig) -> Vec<Move> {
    match config.candidate_radius {
        Some(radius) => board.candidate_moves(radius),
        None => board.legal_moves(),
    }
}

/// Pair each legal move with its prior, dropping moves with no probability.
///
/// Priors are not renormalized after filtering.
pub fn legal_priors(policy: &[f32], legal: &[Move], size: usize) -> Result<Vec<(Move, f32)>> {
    if policy.len() != size * size {
        return Err(MctsError::InvalidPolicy {
            expected: size * size,
            got: policy.len(),
        });
    }

    Ok(legal
        .iter()
        .map(|&mv| (mv, policy[mv.index(size)]))
        .filter(|&(_, p)| p > 0.0)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_uniform_evaluator_covers_empty_cells() {
        let board = Board::from_rows(&["X..", "...", "..O"]).unwrap();
        let eval = UniformEvaluator.evaluate(&board, Side::Black).unwrap();
        assert_eq!(eval.policy.len(), 9);
        assert_eq!(eval.policy[0], 0.0);
        assert_eq!(eval.policy[8], 0.0);
        assert_relative_eq!(eval.policy.iter().sum::<f32>(), 1.0, epsilon = 1e-5);
        assert_eq!(eval.value, 0.0);
    }

    #[test]
    fn test_legal_priors_drops_zero_and_illegal() {
        let board = Board::from_rows(&["X..", "...", "..."]).unwrap();
        let mut policy = vec![0.0; 9];
        policy[0] = 0.5; // occupied
        policy[1] = 0.2;
        policy[4] = 0.3;
        let priors = legal_priors(&policy, &board.legal_moves(), 3).unwrap();
        assert_eq!(priors, vec![(Move::new(0, 1), 0.2), (Move::new(1, 1), 0.3)]);
    }

    #[test]
    fn test_legal_priors_rejects_wrong_length() {
        let err = legal_priors(&[0.5; 4], &[Move::new(0, 0)], 3).unwrap_err();
        assert!(matches!(err, MctsError::InvalidPolicy { expected: 9, got: 4 }));
    }

    #[test]
    fn test_classify_win_draw_and_open() {
        let board = Board::from_rows(&["XXXXX", "OOOO.", ".....", ".....", "....."]).unwrap();
        let legal = board.legal_moves();
        let win = classify_leaf(&board, Some((Move::new(0, 4), Side::Black)), &legal);
        assert_eq!(win, LeafOutcome::Win(Side::Black));
        assert_eq!(win.value_for(Side::White), Some(-1.0));
        assert_eq!(win.value_for(Side::Black), Some(1.0));

        let open = classify_leaf(&board, Some((Move::new(1, 0), Side::White)), &legal);
        assert_eq!(open, LeafOutcome::NeedsEvaluation);
        assert_eq!(open.value_for(Side::Black), None);

        let full = Board::from_rows(&["XO", "OX"]).unwrap();
        let draw = classify_leaf(&full, Some((Move::new(1, 1), Side::Black)), &[]);
        assert_eq!(draw, LeafOutcome::Draw);
        assert_eq!(draw.value_for(Side::Black), Some(0.0));
    }

    #[test]
    fn test_legal_moves_respects_radius() {
        let board = Board::new(9);
        let config = MctsConfig::default();
        assert_eq!(legal_moves(&board, &config).len(), 81);
        let config = config.with_candidate_radius(1);
        assert_eq!(legal_moves(&board, &config), vec![Move::new(4, 4)]);
    }
}
