use std::path::Path;

use anyhow::{bail, ensure, Context, Result};
use gomoku_core::Side;
use gomoku_pipeline::{Trainer, TrainingBatch};
use log::{debug, warn};
use ndarray::{s, ArrayView3};

use crate::{side_index, softmax_legal_moves, TableModel};

/// Plain SGD on the table: cross-entropy for the policy, squared error for the value
#[derive(Debug, Clone)]
pub struct TableTrainer {
    board_size: usize,
    batch_size: usize,
    learning_rate: f32,
    model: Option<TableModel>,
}

impl TableTrainer {
    pub fn new(board_size: usize, batch_size: usize, learning_rate: f32) -> Self {
        Self {
            board_size,
            batch_size: batch_size.max(1),
            learning_rate,
            model: None,
        }
    }

    pub fn model(&self) -> Option<&TableModel> {
        self.model.as_ref()
    }

    /// One gradient step over rows `start..end`; returns the summed loss
    fn step(model: &mut TableModel, batch: &TrainingBatch, start: usize, end: usize, lr: f32) -> f32 {
        let cells = model.logits.len();
        let n = (end - start) as f32;
        let mut logit_grad = vec![0.0f32; cells];
        let mut bias_grad = [0.0f32; 2];
        let mut loss = 0.0;

        for row in start..end {
            let planes = batch.states.slice(s![row, .., .., ..]);
            let target = batch.policies.row(row);
            let z = batch.values[row];

            let legal = empty_cells(&planes);
            let probs = softmax_legal_moves(&model.logits, &legal);
            for (&idx, &p) in legal.iter().zip(&probs) {
                logit_grad[idx] += p - target[idx];
                loss -= target[idx] * p.max(1e-12).ln();
            }

            let side = side_index(side_to_move(&planes));
            let v = model.value_bias[side].tanh();
            loss += (v - z) * (v - z);
            bias_grad[side] += 2.0 * (v - z) * (1.0 - v * v);
        }

        for (logit, g) in model.logits.iter_mut().zip(&logit_grad) {
            *logit -= lr * g / n;
        }
        for (bias, g) in model.value_bias.iter_mut().zip(bias_grad) {
            *bias -= lr * g / n;
        }
        loss
    }
}

impl Trainer for TableTrainer {
    fn begin(&mut self, base: Option<&Path>) -> Result<()> {
        let model = match base {
            Some(dir) => match TableModel::load(dir) {
                Ok(model) if model.board_size == self.board_size => model,
                Ok(model) => bail!(
                    "champion is a {}x{} model, trainer is set up for {}x{}",
                    model.board_size,
                    model.board_size,
                    self.board_size,
                    self.board_size
                ),
                Err(e) => {
                    warn!("[trainer] cannot warm start from {}, starting fresh: {e}", dir.display());
                    TableModel::new(self.board_size)
                }
            },
            None => TableModel::new(self.board_size),
        };
        self.model = Some(model);
        Ok(())
    }

    fn fit(&mut self, batch: &TrainingBatch) -> Result<f32> {
        let model = self.model.as_mut().context("fit called before begin")?;
        ensure!(
            batch.board_size() == model.board_size,
            "batch is for a {0}x{0} board, model for {1}x{1}",
            batch.board_size(),
            model.board_size
        );
        if batch.is_empty() {
            return Ok(0.0);
        }

        let mut total = 0.0;
        let mut start = 0;
        while start < batch.len() {
            let end = (start + self.batch_size).min(batch.len());
            total += Self::step(model, batch, start, end, self.learning_rate);
            start = end;
        }
        let mean = total / batch.len() as f32;
        debug!("[trainer] fit {} samples, loss {mean:.4}", batch.len());
        Ok(mean)
    }

    fn save(&mut self, dir: &Path) -> Result<()> {
        let model = self.model.as_ref().context("save called before begin")?;
        model.save(dir)?;
        Ok(())
    }
}

/// Cells empty in both stone planes, row-major
fn empty_cells(planes: &ArrayView3<f32>) -> Vec<usize> {
    let size = planes.shape()[1];
    (0..size * size)
        .filter(|&i| {
            let (r, c) = (i / size, i % size);
            planes[[0, r, c]] == 0.0 && planes[[1, r, c]] == 0.0
        })
        .collect()
}

fn side_to_move(planes: &ArrayView3<f32>) -> Side {
    if planes[[2, 0, 0]] == 1.0 {
        Side::FIRST
    } else {
        Side::FIRST.opponent()
    }
}
