//! Training data pipeline and promotion gate
//!
//! This crate provides functionality for:
//! - Eight-fold symmetry augmentation of self-play samples
//! - Chunking samples into dense batches (and npy export)
//! - The periodic training loop behind the [`Trainer`] interface
//! - The checkpoint queue and the atomically swapped champion
//! - Champion/challenger evaluation and promotion

pub mod augment;
mod batch;
mod champion;
mod checkpoint;
pub mod config;
mod daemon;
mod fsutil;
pub mod gate;
mod trainer;

// Re-export public API
pub use augment::{augment, augment_all, Symmetry};
pub use batch::{TrainingBatch, PLANES};
pub use champion::ChampionStore;
pub use checkpoint::CheckpointQueue;
pub use config::PipelineConfig;
pub use daemon::run_periodic;
pub use gate::{
    decide, tally, CheckpointState, Decision, GateConfig, GateOutcome, MatchReport, ModelLoader, PromotionGate,
    MAX_INSTALL_ATTEMPTS,
};
pub use trainer::{Trainer, TrainingConfig, TrainingLoop, TrainingOutcome};
