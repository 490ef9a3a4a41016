use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{BoardError, Result};
use crate::types::{Move, Side};

/// Standard board side length.
pub const BOARD_SIZE: usize = 19;

/// Stones in an unbroken line needed to win.
pub const WIN_LENGTH: usize = 5;

const DIRECTIONS: [(isize, isize); 4] = [(0, 1), (1, 0), (1, 1), (1, -1)];

/// Square grid of stones. Cells are stored row-major.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBoard", into = "RawBoard")]
pub struct Board {
    size: usize,
    cells: Vec<Option<Side>>,
    stones: usize,
}

/// Wire shape of a board; validated on the way in.
#[derive(Serialize, Deserialize)]
struct RawBoard {
    size: usize,
    cells: Vec<Option<Side>>,
}

impl TryFrom<RawBoard> for Board {
    type Error = BoardError;

    fn try_from(raw: RawBoard) -> Result<Self> {
        Board::from_cells(raw.size, raw.cells)
    }
}

impl From<Board> for RawBoard {
    fn from(board: Board) -> Self {
        RawBoard {
            size: board.size,
            cells: board.cells,
        }
    }
}

impl Board {
    /// Create an empty board of side `size`.
    ///
    /// # Panics
    /// Panics if `size` is zero.
    pub fn new(size: usize) -> Self {
        assert!(size > 0, "board side must be at least 1");
        Self {
            size,
            cells: vec![None; size * size],
            stones: 0,
        }
    }

    /// Build a board from a row-major cell list.
    pub fn from_cells(size: usize, cells: Vec<Option<Side>>) -> Result<Self> {
        if size == 0 {
            return Err(BoardError::EmptyBoard);
        }
        if cells.len() != size * size {
            return Err(BoardError::SizeMismatch {
                size,
                expected: size * size,
                got: cells.len(),
            });
        }
        let stones = cells.iter().filter(|c| c.is_some()).count();
        Ok(Self {
            size,
            cells,
            stones,
        })
    }

    /// Parse rows of `X` (black), `O` (white) and `.` (empty).
    pub fn from_rows(rows: &[&str]) -> Result<Self> {
        let size = rows.len();
        let mut cells = Vec::with_capacity(size * size);
        for row in rows {
            let before = cells.len();
            for ch in row.chars() {
                cells.push(match ch {
                    'X' | 'x' => Some(Side::Black),
                    'O' | 'o' => Some(Side::White),
                    '.' | '-' => None,
                    other => return Err(BoardError::InvalidCell(other)),
                });
            }
            if cells.len() - before != size {
                return Err(BoardError::SizeMismatch {
                    size,
                    expected: size * size,
                    got: cells.len(),
                });
            }
        }
        Self::from_cells(size, cells)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn stone_count(&self) -> usize {
        self.stones
    }

    pub fn cells(&self) -> &[Option<Side>] {
        &self.cells
    }

    pub fn is_full(&self) -> bool {
        self.stones == self.cells.len()
    }

    pub fn contains(&self, mv: Move) -> bool {
        mv.row < self.size && mv.col < self.size
    }

    /// Stone at `mv`, or `None` for empty or off-board cells.
    pub fn get(&self, mv: Move) -> Option<Side> {
        if self.contains(mv) {
            self.cells[mv.index(self.size)]
        } else {
            None
        }
    }

    pub fn is_empty_at(&self, mv: Move) -> bool {
        self.contains(mv) && self.cells[mv.index(self.size)].is_none()
    }

    /// Place a stone for `side`. Each cell can be set once.
    pub fn place(&mut self, mv: Move, side: Side) -> Result<()> {
        if !self.contains(mv) {
            return Err(BoardError::OutOfBounds(mv, self.size));
        }
        let cell = &mut self.cells[mv.index(self.size)];
        if cell.is_some() {
            return Err(BoardError::Occupied(mv));
        }
        *cell = Some(side);
        self.stones += 1;
        Ok(())
    }

    /// Every empty cell, row-major.
    pub fn legal_moves(&self) -> Vec<Move> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(i, _)| Move::from_index(i, self.size))
            .collect()
    }

    /// Empty cells within Chebyshev distance `radius` of any stone, row-major.
    ///
    /// An empty board yields only the center cell.
    pub fn candidate_moves(&self, radius: usize) -> Vec<Move> {
        if self.stones == 0 {
            let mid = self.size / 2;
            return vec![Move::new(mid, mid)];
        }

        let mut near = vec![false; self.cells.len()];
        for (i, cell) in self.cells.iter().enumerate() {
            if cell.is_none() {
                continue;
            }
            let Move { row, col } = Move::from_index(i, self.size);
            let r_lo = row.saturating_sub(radius);
            let r_hi = (row + radius).min(self.size - 1);
            let c_lo = col.saturating_sub(radius);
            let c_hi = (col + radius).min(self.size - 1);
            for r in r_lo..=r_hi {
                for c in c_lo..=c_hi {
                    near[r * self.size + c] = true;
                }
            }
        }

        near.iter()
            .enumerate()
            .filter(|&(i, &flag)| flag && self.cells[i].is_none())
            .map(|(i, _)| Move::from_index(i, self.size))
            .collect()
    }

    /// Whether the stone at `mv` belongs to `side` and completes a line of
    /// at least `WIN_LENGTH` through `mv` in any direction.
    pub fn is_winning_move(&self, mv: Move, side: Side) -> bool {
        if self.get(mv) != Some(side) {
            return false;
        }
        DIRECTIONS.iter().any(|&(dr, dc)| {
            1 + self.run_length(mv, side, dr, dc) + self.run_length(mv, side, -dr, -dc)
                >= WIN_LENGTH
        })
    }

    /// Consecutive `side` stones from `mv` (exclusive) stepping by `(dr, dc)`.
    fn run_length(&self, mv: Move, side: Side, dr: isize, dc: isize) -> usize {
        let mut count = 0;
        let mut row = mv.row as isize;
        let mut col = mv.col as isize;
        while count < WIN_LENGTH - 1 {
            row += dr;
            col += dc;
            if row < 0 || col < 0 {
                break;
            }
            if self.get(Move::new(row as usize, col as usize)) != Some(side) {
                break;
            }
            count += 1;
        }
        count
    }

    /// Feature planes `[3, size, size]` flattened: stones of `side`, stones of
    /// the opponent, and a constant plane set when `side` moves first.
    pub fn to_planes(&self, side: Side) -> Vec<f32> {
        let plane = self.cells.len();
        let mut planes = vec![0f32; 3 * plane];
        for (i, cell) in self.cells.iter().enumerate() {
            match cell {
                Some(s) if *s == side => planes[i] = 1.0,
                Some(_) => planes[plane + i] = 1.0,
                None => {}
            }
        }
        if side == Side::FIRST {
            planes[2 * plane..].fill(1.0);
        }
        planes
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new(BOARD_SIZE)
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in self.cells.chunks(self.size) {
            for cell in row {
                let ch = match cell {
                    Some(Side::Black) => 'X',
                    Some(Side::White) => 'O',
                    None => '.',
                };
                write!(f, "{ch}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
