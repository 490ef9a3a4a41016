use std::path::Path;

use anyhow::{bail, Context, Result};
use gomoku_selfplay::EpisodeSample;
use ndarray::{Array, Array1, Array2, Array4};
use ndarray_npy::write_npy;

/// Number of feature planes produced by `Board::to_planes`
pub const PLANES: usize = 3;

/// Dense tensors for one chunk of (augmented) samples
#[derive(Debug, Clone)]
pub struct TrainingBatch {
    /// (N, 3, L, L) feature planes
    pub states: Array4<f32>,
    /// (N, L*L) visit distributions
    pub policies: Array2<f32>,
    /// (N,) outcome targets
    pub values: Array1<f32>,
}

impl TrainingBatch {
    /// Stack samples into tensors. All samples must share one board size.
    pub fn from_samples(samples: &[EpisodeSample]) -> Result<Self> {
        let Some(first) = samples.first() else {
            bail!("Cannot build a batch from no samples");
        };
        let size = first.board.size();
        let n = samples.len();

        let mut states = Vec::with_capacity(n * PLANES * size * size);
        let mut policies = Vec::with_capacity(n * size * size);
        let mut values = Vec::with_capacity(n);
        for (i, sample) in samples.iter().enumerate() {
            if sample.board.size() != size {
                bail!("sample {i} has board side {}, expected {size}", sample.board.size());
            }
            states.extend(sample.board.to_planes(sample.side));
            policies.extend_from_slice(&sample.policy);
            values.push(sample.value);
        }

        let states = Array::from_shape_vec((n, PLANES, size, size), states).context("states shape")?;
        let policies = Array::from_shape_vec((n, size * size), policies).context("policies shape")?;
        Ok(Self {
            states,
            policies,
            values: Array::from_vec(values),
        })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn board_size(&self) -> usize {
        self.states.shape()[2]
    }

    /// Save the batch to NPY files
    ///
    /// Creates three separate files:
    /// - `{prefix}_states.npy`: (N, 3, L, L) board states
    /// - `{prefix}_policies.npy`: (N, L*L) policy distributions
    /// - `{prefix}_values.npy`: (N,) value targets
    pub fn save_npy(&self, prefix: &Path) -> Result<()> {
        let prefix = prefix.display();
        write_npy(format!("{prefix}_states.npy"), &self.states)?;
        write_npy(format!("{prefix}_policies.npy"), &self.policies)?;
        write_npy(format!("{prefix}_values.npy"), &self.values)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomoku_core::{Board, Side};
    use ndarray_npy::read_npy;

    fn sample(value: f32) -> EpisodeSample {
        let board = Board::from_rows(&["X..", ".O.", "..."]).unwrap();
        EpisodeSample::new(board, Side::Black, vec![0.5; 9], value)
    }

    #[test]
    fn test_shapes_and_planes() {
        let batch = TrainingBatch::from_samples(&[sample(1.0), sample(-1.0)]).unwrap();

        assert_eq!(batch.states.shape(), &[2, 3, 3, 3]);
        assert_eq!(batch.policies.shape(), &[2, 9]);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.board_size(), 3);
        // Own stone, opponent stone, color plane
        assert_eq!(batch.states[[0, 0, 0, 0]], 1.0);
        assert_eq!(batch.states[[0, 1, 1, 1]], 1.0);
        assert_eq!(batch.states[[0, 2, 2, 2]], 1.0);
        assert_eq!(batch.values[1], -1.0);
    }

    #[test]
    fn test_rejects_empty_and_mixed_sizes() {
        assert!(TrainingBatch::from_samples(&[]).is_err());
        let other = EpisodeSample::new(Board::new(4), Side::White, vec![0.0; 16], 0.0);
        assert!(TrainingBatch::from_samples(&[sample(0.0), other]).is_err());
    }

    #[test]
    fn test_save_and_load_npy() {
        let dir = tempfile::tempdir().unwrap();
        let prefix = dir.path().join("chunk_0");
        let batch = TrainingBatch::from_samples(&[sample(1.0), sample(0.0)]).unwrap();

        batch.save_npy(&prefix).unwrap();

        let states: Array4<f32> = read_npy(dir.path().join("chunk_0_states.npy")).unwrap();
        let policies: Array2<f32> = read_npy(dir.path().join("chunk_0_policies.npy")).unwrap();
        let values: Array1<f32> = read_npy(dir.path().join("chunk_0_values.npy")).unwrap();
        assert_eq!(states, batch.states);
        assert_eq!(policies.shape(), &[2, 9]);
        assert_eq!(values[0], 1.0);
    }
}
