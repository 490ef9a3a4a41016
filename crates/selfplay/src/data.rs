use gomoku_core::{Board, Move, Side};
use serde::{Deserialize, Serialize};

/// Result of a game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GameResult {
    BlackWin,
    WhiteWin,
    Draw,
}

impl GameResult {
    pub fn from_winner(winner: Option<Side>) -> Self {
        match winner {
            Some(Side::Black) => GameResult::BlackWin,
            Some(Side::White) => GameResult::WhiteWin,
            None => GameResult::Draw,
        }
    }

    pub fn winner(self) -> Option<Side> {
        match self {
            GameResult::BlackWin => Some(Side::Black),
            GameResult::WhiteWin => Some(Side::White),
            GameResult::Draw => None,
        }
    }

    /// Final outcome from the perspective of `side`: +1 win, -1 loss, 0 draw
    pub fn value_for(self, side: Side) -> f32 {
        match self.winner() {
            Some(winner) if winner == side => 1.0,
            Some(_) => -1.0,
            None => 0.0,
        }
    }
}

/// Record of a single game
#[derive(Debug, Clone)]
pub struct GameRecord {
    /// Board state before each move
    pub states: Vec<Board>,
    /// Side to move at each state
    pub sides: Vec<Side>,
    /// Normalized visit distribution over all cells at each move
    pub policies: Vec<Vec<f32>>,
    /// Move actually played
    pub moves: Vec<Move>,
    /// Final result of the game
    pub winner: GameResult,
}

impl GameRecord {
    /// Create a new empty game record
    pub fn new() -> Self {
        Self {
            states: Vec::new(),
            sides: Vec::new(),
            policies: Vec::new(),
            moves: Vec::new(),
            winner: GameResult::Draw,
        }
    }

    /// Set the winner
    pub fn set_winner(&mut self, winner: GameResult) {
        self.winner = winner;
    }

    /// Record the position and search target before a move is committed
    pub fn add_position(&mut self, state: Board, side: Side, policy: Vec<f32>) {
        self.states.push(state);
        self.sides.push(side);
        self.policies.push(policy);
    }

    /// Record the move chosen for the last position
    pub fn add_move(&mut self, action: Move) {
        self.moves.push(action);
    }

    /// Get the number of recorded positions
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Check if the record is empty
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

impl Default for GameRecord {
    fn default() -> Self {
        Self::new()
    }
}

/// One training sample: a position, its search target and the final outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeSample {
    /// Board before the move
    pub board: Board,
    /// Side to move
    pub side: Side,
    /// Target visit distribution over all cells, row-major
    pub policy: Vec<f32>,
    /// Outcome for `side`: -1, 0 or 1
    pub value: f32,
}

impl EpisodeSample {
    /// Create a new sample
    pub fn new(board: Board, side: Side, policy: Vec<f32>, value: f32) -> Self {
        Self {
            board,
            side,
            policy,
            value,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_for_sides() {
        assert_eq!(GameResult::BlackWin.value_for(Side::Black), 1.0);
        assert_eq!(GameResult::BlackWin.value_for(Side::White), -1.0);
        assert_eq!(GameResult::WhiteWin.value_for(Side::White), 1.0);
        assert_eq!(GameResult::Draw.value_for(Side::Black), 0.0);
    }

    #[test]
    fn test_from_winner_roundtrip() {
        for winner in [Some(Side::Black), Some(Side::White), None] {
            assert_eq!(GameResult::from_winner(winner).winner(), winner);
        }
    }

    #[test]
    fn test_record_accumulates() {
        let mut record = GameRecord::new();
        assert!(record.is_empty());
        record.add_position(Board::new(3), Side::Black, vec![0.0; 9]);
        record.add_move(Move::new(1, 1));
        assert_eq!(record.len(), 1);
        assert_eq!(record.moves, vec![Move::new(1, 1)]);
    }
}
