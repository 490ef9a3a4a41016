//! Reference evaluator: a per-cell policy table and a per-side value bias.
//!
//! It stands in for a learned network so the pipeline runs end to end; it
//! ignores everything about a position except which cells are empty.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use gomoku_core::{Board, Side};
use gomoku_mcts::{Evaluation, Evaluator, MctsError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod loader;
mod trainer;

pub use loader::{ChampionSource, TableModelLoader};
pub use trainer::TableTrainer;

pub const MODEL_FILE: &str = "model.json";

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid model file {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Model is for a {got}x{got} board, expected {expected}x{expected}")]
    BoardSize { expected: usize, got: usize },

    #[error("Model has {got} logits, expected {expected}")]
    Shape { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableModel {
    pub board_size: usize,
    /// One logit per cell, row-major
    pub logits: Vec<f32>,
    /// Value bias for black and white to move
    pub value_bias: [f32; 2],
}

impl TableModel {
    /// Uniform policy and neutral value
    pub fn new(board_size: usize) -> Self {
        Self {
            board_size,
            logits: vec![0.0; board_size * board_size],
            value_bias: [0.0; 2],
        }
    }

    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(MODEL_FILE);
        let bytes = fs::read(&path).map_err(|source| ModelError::Io {
            path: path.clone(),
            source,
        })?;
        let model: Self = serde_json::from_slice(&bytes).map_err(|source| ModelError::Json { path, source })?;
        let expected = model.board_size * model.board_size;
        if model.logits.len() != expected {
            return Err(ModelError::Shape {
                expected,
                got: model.logits.len(),
            });
        }
        Ok(model)
    }

    pub fn save<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let path = dir.as_ref().join(MODEL_FILE);
        let json = serde_json::to_vec_pretty(self).map_err(|source| ModelError::Json {
            path: path.clone(),
            source,
        })?;
        fs::write(&path, json).map_err(|source| ModelError::Io { path, source })
    }

    pub fn value_for(&self, side: Side) -> f32 {
        self.value_bias[side_index(side)].tanh()
    }

    /// Softmax of the logits over the empty cells of `board`, zero elsewhere
    pub fn policy(&self, board: &Board) -> Vec<f32> {
        let legal: Vec<usize> = board
            .cells()
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.is_none().then_some(i))
            .collect();
        let mut policy = vec![0.0; self.logits.len()];
        for (idx, p) in legal.iter().zip(softmax_legal_moves(&self.logits, &legal)) {
            policy[*idx] = p;
        }
        policy
    }
}

impl Evaluator for TableModel {
    fn evaluate(&self, board: &Board, side: Side) -> gomoku_mcts::Result<Evaluation> {
        if board.size() != self.board_size {
            return Err(MctsError::EvaluatorUnavailable(
                ModelError::BoardSize {
                    expected: board.size(),
                    got: self.board_size,
                }
                .to_string(),
            ));
        }
        Ok(Evaluation {
            policy: self.policy(board),
            value: self.value_for(side),
        })
    }
}

pub(crate) fn side_index(side: Side) -> usize {
    match side {
        Side::Black => 0,
        Side::White => 1,
    }
}

/// Compute softmax over legal moves only
///
/// Returns one probability per entry of `legal_moves`, in the same order
pub(crate) fn softmax_legal_moves(logits: &[f32], legal_moves: &[usize]) -> Vec<f32> {
    if legal_moves.is_empty() {
        return Vec::new();
    }

    // Find max for numerical stability
    let max = legal_moves
        .iter()
        .map(|&m| logits[m])
        .fold(f32::NEG_INFINITY, f32::max);

    let exp: Vec<f32> = legal_moves.iter().map(|&m| (logits[m] - max).exp()).collect();
    let sum: f32 = exp.iter().sum();

    exp.into_iter().map(|e| e / sum).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gomoku_core::Move;

    #[test]
    fn test_softmax_sums_to_one() {
        let logits = vec![1.0, 2.0, 3.0, 100.0];
        let probs = softmax_legal_moves(&logits, &[0, 1, 2]);
        assert_eq!(probs.len(), 3);
        assert_relative_eq!(probs.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
        assert!(softmax_legal_moves(&logits, &[]).is_empty());
    }

    #[test]
    fn test_policy_masks_occupied_cells() {
        let mut model = TableModel::new(3);
        model.logits[4] = 10.0;
        let mut board = Board::new(3);
        board.place(Move::new(1, 1), Side::Black).unwrap();

        let policy = model.policy(&board);

        assert_eq!(policy[4], 0.0);
        assert_relative_eq!(policy.iter().sum::<f32>(), 1.0, epsilon = 1e-6);
        assert_relative_eq!(policy[0], 0.125, epsilon = 1e-6);
    }

    #[test]
    fn test_value_per_side() {
        let mut model = TableModel::new(3);
        model.value_bias = [0.5, -0.5];
        let eval = model.evaluate(&Board::new(3), Side::Black).unwrap();
        assert_relative_eq!(eval.value, 0.5f32.tanh());
        assert_relative_eq!(model.value_for(Side::White), -(0.5f32.tanh()));
    }

    #[test]
    fn test_wrong_board_size_is_unavailable() {
        let model = TableModel::new(3);
        let err = model.evaluate(&Board::new(5), Side::Black).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut model = TableModel::new(4);
        model.logits[3] = 1.5;
        model.value_bias = [0.1, -0.2];

        model.save(dir.path()).unwrap();

        assert_eq!(TableModel::load(dir.path()).unwrap(), model);
    }

    #[test]
    fn test_load_rejects_bad_shape() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(MODEL_FILE),
            br#"{"board_size":3,"logits":[0.0],"value_bias":[0.0,0.0]}"#,
        )
        .unwrap();
        assert!(matches!(TableModel::load(dir.path()), Err(ModelError::Shape { expected: 9, got: 1 })));
        assert!(matches!(
            TableModel::load(dir.path().join("missing")),
            Err(ModelError::Io { .. })
        ));
    }
}
