use std::path::Path;

use anyhow::{ensure, Context, Result};
use gomoku_pipeline::{ChampionStore, ModelLoader};
use gomoku_selfplay::EvaluatorSource;

use crate::TableModel;

/// Loads table models for a fixed board size
#[derive(Debug, Clone, Copy)]
pub struct TableModelLoader {
    board_size: usize,
}

impl TableModelLoader {
    pub fn new(board_size: usize) -> Self {
        Self { board_size }
    }
}

impl ModelLoader for TableModelLoader {
    type Model = TableModel;

    fn load(&self, dir: &Path) -> Result<TableModel> {
        let model = TableModel::load(dir)?;
        ensure!(
            model.board_size == self.board_size,
            "{} holds a {}x{} model, expected {}x{}",
            dir.display(),
            model.board_size,
            model.board_size,
            self.board_size,
            self.board_size
        );
        Ok(model)
    }
}

/// Self-play source that always loads the current champion
#[derive(Debug, Clone)]
pub struct ChampionSource {
    champion: ChampionStore,
    loader: TableModelLoader,
}

impl ChampionSource {
    pub fn new(champion: ChampionStore, board_size: usize) -> Self {
        Self {
            champion,
            loader: TableModelLoader::new(board_size),
        }
    }
}

impl EvaluatorSource for ChampionSource {
    type Evaluator = TableModel;

    fn load(&self) -> Result<TableModel> {
        let dir = self
            .champion
            .current_dir()?
            .context("no champion has been published yet")?;
        self.loader.load(&dir)
    }
}
