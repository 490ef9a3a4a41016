//! Board and rules for five-in-a-row on a square grid.

mod board;
mod error;
mod types;

pub use board::{Board, BOARD_SIZE, WIN_LENGTH};
pub use error::{BoardError, Result};
pub use types::{Move, Side};
