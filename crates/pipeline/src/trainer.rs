//! Training loop: replay queue in, checkpoint out.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use gomoku_core::BOARD_SIZE;
use gomoku_selfplay::{load_unit_for_board, EpisodeSample, ReplayStore, Shutdown};
use log::{debug, error, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::augment::augment_all;
use crate::batch::TrainingBatch;
use crate::champion::ChampionStore;
use crate::checkpoint::CheckpointQueue;
use crate::daemon::run_periodic;

/// Interface to the external optimizer
pub trait Trainer {
    /// Start a run, warm-starting from `base` (the current champion) if given
    fn begin(&mut self, base: Option<&Path>) -> Result<()>;

    /// Train on one batch and return its loss
    fn fit(&mut self, batch: &TrainingBatch) -> Result<f32>;

    /// Write the trained artifact into the empty directory `dir`
    fn save(&mut self, dir: &Path) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Pending games required before a run starts
    pub min_games: usize,
    /// Units played on any other board size are skipped
    pub board_size: usize,
    pub epochs: usize,
    /// Samples per chunk, before augmentation
    pub chunk_size: usize,
    pub poll_interval: Duration,
    /// When set, each first-epoch chunk is also written as npy files here
    pub export_dir: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            min_games: 100,
            board_size: BOARD_SIZE,
            epochs: 5,
            chunk_size: 8192,
            poll_interval: Duration::from_secs(60),
            export_dir: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TrainingOutcome {
    /// Not enough games yet
    Idle { pending: usize },
    Trained {
        checkpoint: PathBuf,
        games: usize,
        samples: usize,
        skipped: usize,
        final_loss: f32,
    },
}

pub struct TrainingLoop<T> {
    config: TrainingConfig,
    trainer: T,
    replay: ReplayStore,
    checkpoints: CheckpointQueue,
    champion: ChampionStore,
}

impl<T: Trainer> TrainingLoop<T> {
    pub fn new(
        config: TrainingConfig,
        trainer: T,
        replay: ReplayStore,
        checkpoints: CheckpointQueue,
        champion: ChampionStore,
    ) -> Self {
        Self {
            config,
            trainer,
            replay,
            checkpoints,
            champion,
        }
    }

    pub fn trainer(&self) -> &T {
        &self.trainer
    }

    /// One pass: claim every pending game, train, publish a checkpoint.
    ///
    /// Claimed games that were read are archived whether or not training
    /// succeeds. Games that could not be read go back to `pending/`.
    pub fn run_once<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Result<TrainingOutcome> {
        let pending = self.replay.pending_count()?;
        if pending < self.config.min_games {
            debug!("[trainer] {pending}/{} games pending, waiting", self.config.min_games);
            return Ok(TrainingOutcome::Idle { pending });
        }

        let claimed = self.replay.claim_all()?;
        info!("[trainer] claimed {} games", claimed.len());

        let LoadedUnits {
            samples,
            consumed,
            skipped,
        } = self.load_claimed(&claimed);
        let result = self.train_on(samples, consumed.len() - skipped, skipped, rng);

        for path in &consumed {
            if let Err(e) = self.replay.archive(path) {
                error!("[trainer] could not archive {}: {e}", path.display());
            }
        }

        result
    }

    /// Train periodically until `shutdown` fires
    pub fn run(&mut self, shutdown: &Shutdown) -> Result<()> {
        self.replay.recover_processing()?;
        let interval = self.config.poll_interval;
        let mut rng = rand::thread_rng();
        run_periodic("trainer", interval, shutdown, || self.run_once(&mut rng).map(|_| ()));
        Ok(())
    }

    /// Read every claimed unit. Malformed ones are skipped but still consumed;
    /// unreadable ones are released for a later pass.
    fn load_claimed(&self, claimed: &[PathBuf]) -> LoadedUnits {
        let mut loaded = LoadedUnits::default();
        for path in claimed {
            match load_unit_for_board(path, self.config.board_size) {
                Ok(unit) => {
                    loaded.samples.extend(unit);
                    loaded.consumed.push(path.clone());
                }
                Err(e) if e.is_malformed() => {
                    warn!("[trainer] skipping {}: {e}", path.display());
                    loaded.skipped += 1;
                    loaded.consumed.push(path.clone());
                }
                Err(e) => {
                    warn!("[trainer] could not read {}, leaving it queued: {e}", path.display());
                    if let Err(e) = self.replay.release(path) {
                        error!("[trainer] could not release {}: {e}", path.display());
                    }
                }
            }
        }
        loaded
    }

    fn train_on<R: Rng + ?Sized>(
        &mut self,
        mut samples: Vec<EpisodeSample>,
        games: usize,
        skipped: usize,
        rng: &mut R,
    ) -> Result<TrainingOutcome> {
        if samples.is_empty() {
            bail!("none of the {} claimed games held usable samples", games + skipped);
        }
        samples.shuffle(rng);

        let base = self.champion.current_dir()?;
        self.trainer.begin(base.as_deref()).context("starting training run")?;

        let chunk_size = self.config.chunk_size.max(1);
        let num_chunks = samples.len().div_ceil(chunk_size);
        let mut final_loss = 0.0;
        for epoch in 0..self.config.epochs {
            let mut epoch_loss = 0.0;
            for (i, chunk) in samples.chunks(chunk_size).enumerate() {
                let batch = TrainingBatch::from_samples(&augment_all(chunk)?)?;
                if epoch == 0 {
                    self.export(i, &batch)?;
                }
                let loss = self.trainer.fit(&batch).with_context(|| format!("epoch {epoch} chunk {i}"))?;
                debug!("[trainer] epoch {} chunk {}/{}: loss {loss:.4}", epoch + 1, i + 1, num_chunks);
                epoch_loss += loss;
            }
            final_loss = epoch_loss / num_chunks as f32;
            info!(
                "[trainer] epoch {}/{} mean loss {final_loss:.4}",
                epoch + 1,
                self.config.epochs
            );
        }

        let trainer = &mut self.trainer;
        let checkpoint = self.checkpoints.publish(|dir| trainer.save(dir))?;

        Ok(TrainingOutcome::Trained {
            checkpoint,
            games,
            samples: samples.len(),
            skipped,
            final_loss,
        })
    }

    fn export(&self, chunk: usize, batch: &TrainingBatch) -> Result<()> {
        let Some(dir) = &self.config.export_dir else {
            return Ok(());
        };
        fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
        batch.save_npy(&dir.join(format!("chunk_{chunk}")))
    }
}

#[derive(Debug, Default)]
struct LoadedUnits {
    samples: Vec<EpisodeSample>,
    /// Units to archive after the run, including skipped ones
    consumed: Vec<PathBuf>,
    skipped: usize,
}
