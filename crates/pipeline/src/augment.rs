//! Dihedral symmetry augmentation of training samples.
//!
//! Each symmetry maps a cell `(r, c)` by rotating it a number of quarter
//! turns `(r, c) -> (c, L-1-r)` and then optionally mirroring the column
//! `(r, c) -> (r, L-1-c)`. Board and policy target go through the same map.

use anyhow::{ensure, Result};
use gomoku_core::{Board, Move};
use gomoku_selfplay::EpisodeSample;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Symmetry {
    quarter_turns: u8,
    flipped: bool,
}

impl Symmetry {
    pub const IDENTITY: Symmetry = Symmetry {
        quarter_turns: 0,
        flipped: false,
    };

    pub fn new(quarter_turns: u8, flipped: bool) -> Self {
        Self {
            quarter_turns: quarter_turns % 4,
            flipped,
        }
    }

    /// All eight symmetries: each rotation followed by its mirrored variant
    pub fn all() -> [Symmetry; 8] {
        let mut out = [Symmetry::IDENTITY; 8];
        for q in 0..4u8 {
            out[2 * q as usize] = Symmetry::new(q, false);
            out[2 * q as usize + 1] = Symmetry::new(q, true);
        }
        out
    }

    pub fn quarter_turns(self) -> u8 {
        self.quarter_turns
    }

    pub fn is_flipped(self) -> bool {
        self.flipped
    }

    pub fn inverse(self) -> Symmetry {
        if self.flipped {
            // Reflections are involutions
            self
        } else {
            Symmetry::new(4 - self.quarter_turns, false)
        }
    }

    /// Image of `mv` on a board of side `size`
    pub fn map(self, mv: Move, size: usize) -> Move {
        let (mut r, mut c) = (mv.row, mv.col);
        for _ in 0..self.quarter_turns {
            (r, c) = (c, size - 1 - r);
        }
        if self.flipped {
            c = size - 1 - c;
        }
        Move::new(r, c)
    }

    pub fn apply_board(self, board: &Board) -> Result<Board> {
        let size = board.size();
        let mut cells = vec![None; board.cell_count()];
        for (i, &cell) in board.cells().iter().enumerate() {
            let to = self.map(Move::from_index(i, size), size);
            cells[to.index(size)] = cell;
        }
        Ok(Board::from_cells(size, cells)?)
    }

    /// Permute a row-major per-cell vector the same way as the board
    pub fn apply_policy(self, policy: &[f32], size: usize) -> Result<Vec<f32>> {
        ensure!(
            policy.len() == size * size,
            "policy has {} entries, expected {}",
            policy.len(),
            size * size
        );
        let mut out = vec![0.0; policy.len()];
        for (i, &p) in policy.iter().enumerate() {
            out[self.map(Move::from_index(i, size), size).index(size)] = p;
        }
        Ok(out)
    }

    pub fn apply(self, sample: &EpisodeSample) -> Result<EpisodeSample> {
        let size = sample.board.size();
        Ok(EpisodeSample::new(
            self.apply_board(&sample.board)?,
            sample.side,
            self.apply_policy(&sample.policy, size)?,
            sample.value,
        ))
    }
}

/// The eight symmetric variants of one sample, identity first
pub fn augment(sample: &EpisodeSample) -> Result<Vec<EpisodeSample>> {
    Symmetry::all().iter().map(|sym| sym.apply(sample)).collect()
}

pub fn augment_all(samples: &[EpisodeSample]) -> Result<Vec<EpisodeSample>> {
    let mut out = Vec::with_capacity(samples.len() * 8);
    for sample in samples {
        out.extend(augment(sample)?);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomoku_core::Side;

    #[test]
    fn test_quarter_turn_moves_corner() {
        let rot = Symmetry::new(1, false);
        assert_eq!(rot.map(Move::new(0, 0), 5), Move::new(0, 4));
        assert_eq!(rot.map(Move::new(0, 4), 5), Move::new(4, 4));
        assert_eq!(rot.map(Move::new(1, 2), 5), Move::new(2, 3));
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let flip = Symmetry::new(0, true);
        assert_eq!(flip.map(Move::new(2, 0), 5), Move::new(2, 4));
        assert_eq!(flip.map(Move::new(2, 2), 5), Move::new(2, 2));
    }

    #[test]
    fn test_orbits_of_edge_and_corner() {
        let board = Board::from_rows(&["X..", "...", "..."]).unwrap();
        let mut images: Vec<Move> = Symmetry::all()
            .iter()
            .map(|s| s.map(Move::new(0, 1), 3))
            .collect();
        images.sort_by_key(|m| m.index(3));
        images.dedup();
        // (0,1) is an edge midpoint: four distinct images, each hit twice
        assert_eq!(images.len(), 4);
        assert_eq!(Symmetry::all()[0], Symmetry::IDENTITY);

        let boards: Vec<String> = Symmetry::all()
            .iter()
            .map(|s| s.apply_board(&board).unwrap().to_string())
            .collect();
        let mut unique = boards.clone();
        unique.sort();
        unique.dedup();
        // A corner stone has four images
        assert_eq!(unique.len(), 4);
    }

    #[test]
    fn test_board_and_policy_stay_aligned() {
        let board = Board::from_rows(&["XO..", "....", "....", "...."]).unwrap();
        let mut policy = vec![0.0; 16];
        policy[Move::new(0, 2).index(4)] = 1.0;
        let sample = EpisodeSample::new(board, Side::Black, policy, 1.0);

        for variant in augment(&sample).unwrap() {
            assert_eq!(variant.value, 1.0);
            assert_eq!(variant.side, Side::Black);
            // The target cell stays empty and next to the white stone's image
            let target = Move::from_index(variant.policy.iter().position(|&p| p == 1.0).unwrap(), 4);
            assert!(variant.board.is_empty_at(target));
            assert_eq!(variant.board.stone_count(), 2);
            let white = Move::from_index(
                variant.board.cells().iter().position(|&c| c == Some(Side::White)).unwrap(),
                4,
            );
            assert_eq!(white.row.abs_diff(target.row).max(white.col.abs_diff(target.col)), 1);
        }
    }

    #[test]
    fn test_policy_length_is_checked() {
        assert!(Symmetry::IDENTITY.apply_policy(&[0.0; 3], 2).is_err());
    }

    #[test]
    fn test_augment_all_multiplies_by_eight() {
        let sample = EpisodeSample::new(Board::new(3), Side::White, vec![0.0; 9], -1.0);
        let out = augment_all(&[sample.clone(), sample]).unwrap();
        assert_eq!(out.len(), 16);
    }
}
