//! Self-play system for AlphaZero-style reinforcement learning
//!
//! This crate provides functionality for:
//! - Playing self-play games and evaluation matches using MCTS
//! - Recording game states and visit policies
//! - Converting games to training samples
//! - Persisting finished games in a directory-backed replay queue
//! - Running a supervised pool of self-play workers
//!
//! # Example
//!
//! ```no_run
//! use gomoku_mcts::{MctsConfig, UniformEvaluator};
//! use gomoku_selfplay::{game_to_samples, play_game, ReplayStore, ReplayUnit, SelfPlayConfig};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = SelfPlayConfig {
//!     mcts: MctsConfig::default().with_simulations(200),
//!     ..SelfPlayConfig::default()
//! };
//!
//! // Play one game
//! let record = play_game(&UniformEvaluator, &config)?;
//! println!("Game finished with {} moves", record.len());
//!
//! // Queue its samples for training
//! let store = ReplayStore::open("data/replay")?;
//! store.write_unit(&ReplayUnit::new(0, game_to_samples(&record)))?;
//! # Ok(())
//! # }
//! ```

mod data;
mod game;
pub mod orchestrator;
mod shutdown;
pub mod storage;

// Re-export public API
pub use data::{EpisodeSample, GameRecord, GameResult};
pub use game::{game_to_samples, play_game, play_game_until, play_game_with_rng, play_match, SelfPlayConfig};
pub use orchestrator::{EvaluatorSource, Orchestrator, OrchestratorConfig, OrchestratorReport};
pub use shutdown::Shutdown;
pub use storage::{load_unit, load_unit_for_board, ReplayStore, ReplayUnit, StorageError};
