use thiserror::Error;

use crate::types::Move;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BoardError {
    #[error("Move {0} is outside a {1}x{1} board")]
    OutOfBounds(Move, usize),

    #[error("Cell {0} is already occupied")]
    Occupied(Move),

    #[error("Board of side {size} needs {expected} cells, got {got}")]
    SizeMismatch {
        size: usize,
        expected: usize,
        got: usize,
    },

    #[error("Board side must be at least 1")]
    EmptyBoard,

    #[error("Unrecognized cell character {0:?}")]
    InvalidCell(char),
}

pub type Result<T> = std::result::Result<T, BoardError>;
