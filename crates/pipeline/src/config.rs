//! On-disk pipeline settings (TOML). Every field has a default, so an empty
//! file or no file at all gives the standard setup.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use gomoku_core::BOARD_SIZE;
use gomoku_mcts::MctsConfig;
use gomoku_selfplay::{OrchestratorConfig, SelfPlayConfig};
use serde::{Deserialize, Serialize};

use crate::gate::GateConfig;
use crate::trainer::TrainingConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Root for replay, checkpoint and champion directories
    pub data_dir: PathBuf,
    pub board_size: usize,
    pub search: SearchSection,
    pub selfplay: SelfPlaySection,
    pub training: TrainingSection,
    pub evaluation: EvaluationSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSection {
    pub c_puct: f32,
    /// Restrict candidates to cells near existing stones
    pub candidate_radius: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SelfPlaySection {
    pub workers: usize,
    pub move_time_ms: u64,
    pub exploration_moves: usize,
    pub flush_interval_secs: u64,
    pub restart_backoff_secs: u64,
    pub reload_every: usize,
    pub load_retry_secs: u64,
    /// Root Dirichlet noise as `[alpha, epsilon]`
    pub dirichlet_noise: Option<[f32; 2]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingSection {
    pub min_games: usize,
    pub epochs: usize,
    pub chunk_size: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub poll_interval_secs: u64,
    pub export_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EvaluationSection {
    pub games: usize,
    pub threshold: f32,
    pub move_time_ms: u64,
    pub poll_interval_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            board_size: BOARD_SIZE,
            search: SearchSection::default(),
            selfplay: SelfPlaySection::default(),
            training: TrainingSection::default(),
            evaluation: EvaluationSection::default(),
        }
    }
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            c_puct: 1.5,
            candidate_radius: None,
        }
    }
}

impl Default for SelfPlaySection {
    fn default() -> Self {
        Self {
            workers: 4,
            move_time_ms: 2000,
            exploration_moves: 15,
            flush_interval_secs: 60,
            restart_backoff_secs: 5,
            reload_every: 5,
            load_retry_secs: 10,
            dirichlet_noise: None,
        }
    }
}

impl Default for TrainingSection {
    fn default() -> Self {
        Self {
            min_games: 100,
            epochs: 5,
            chunk_size: 8192,
            batch_size: 128,
            learning_rate: 0.01,
            poll_interval_secs: 60,
            export_dir: None,
        }
    }
}

impl Default for EvaluationSection {
    fn default() -> Self {
        Self {
            games: 50,
            threshold: 0.55,
            move_time_ms: 1000,
            poll_interval_secs: 15 * 60,
        }
    }
}

impl PipelineConfig {
    /// Read a TOML file; a missing file yields the defaults
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let config: Self = toml::from_str(&text).with_context(|| format!("parsing {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.board_size >= 1, "board_size must be positive");
        ensure!(self.selfplay.workers >= 1, "selfplay.workers must be at least 1");
        ensure!(self.training.chunk_size >= 1, "training.chunk_size must be at least 1");
        ensure!(self.training.batch_size >= 1, "training.batch_size must be at least 1");
        ensure!(
            self.evaluation.games >= 1 && self.evaluation.games % 2 == 0,
            "evaluation.games must be a positive even number"
        );
        ensure!(
            (0.0..=1.0).contains(&self.evaluation.threshold),
            "evaluation.threshold must be within [0, 1]"
        );
        Ok(())
    }

    pub fn replay_dir(&self) -> PathBuf {
        self.data_dir.join("replay")
    }

    fn search_config(&self, move_time_ms: u64) -> MctsConfig {
        let mut config = MctsConfig::default()
            .with_time_budget(Duration::from_millis(move_time_ms))
            .with_c_puct(self.search.c_puct);
        if let Some(radius) = self.search.candidate_radius {
            config = config.with_candidate_radius(radius);
        }
        config
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let s = &self.selfplay;
        let mut mcts = self.search_config(s.move_time_ms);
        if let Some([alpha, epsilon]) = s.dirichlet_noise {
            mcts = mcts.with_dirichlet_noise(alpha, epsilon);
        }
        OrchestratorConfig {
            workers: s.workers,
            flush_interval: Duration::from_secs(s.flush_interval_secs),
            restart_backoff: Duration::from_secs(s.restart_backoff_secs),
            reload_every: s.reload_every,
            load_retry: Duration::from_secs(s.load_retry_secs),
            selfplay: SelfPlayConfig {
                mcts,
                exploration_moves: s.exploration_moves,
                board_size: self.board_size,
            },
        }
    }

    pub fn training_config(&self) -> TrainingConfig {
        let t = &self.training;
        TrainingConfig {
            min_games: t.min_games,
            board_size: self.board_size,
            epochs: t.epochs,
            chunk_size: t.chunk_size,
            poll_interval: Duration::from_secs(t.poll_interval_secs),
            export_dir: t.export_dir.clone(),
        }
    }

    pub fn gate_config(&self) -> GateConfig {
        let e = &self.evaluation;
        GateConfig {
            games: e.games,
            threshold: e.threshold,
            search: self.search_config(e.move_time_ms),
            board_size: self.board_size,
            poll_interval: Duration::from_secs(e.poll_interval_secs),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gomoku_mcts::SearchLimit;

    #[test]
    fn test_empty_toml_is_default() {
        let config: PipelineConfig = toml::from_str("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_partial_override() {
        let config: PipelineConfig = toml::from_str(
            r#"
            board_size = 9

            [selfplay]
            workers = 2
            move_time_ms = 250
            dirichlet_noise = [0.3, 0.25]

            [evaluation]
            games = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.board_size, 9);
        assert_eq!(config.selfplay.exploration_moves, 15);

        let orchestrator = config.orchestrator_config();
        assert_eq!(orchestrator.workers, 2);
        assert_eq!(orchestrator.selfplay.board_size, 9);
        assert_eq!(orchestrator.selfplay.mcts.limit, SearchLimit::Time(Duration::from_millis(250)));
        assert!(orchestrator.selfplay.mcts.add_dirichlet_noise);

        let gate = config.gate_config();
        assert_eq!(gate.games, 10);
        assert_eq!(gate.search.limit, SearchLimit::Time(Duration::from_millis(1000)));
        assert!(!gate.search.add_dirichlet_noise);
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(toml::from_str::<PipelineConfig>("bord_size = 9").is_err());
    }

    #[test]
    fn test_odd_game_count_is_invalid() {
        let mut config = PipelineConfig::default();
        config.evaluation.games = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::load(&dir.path().join("pipeline.toml")).unwrap();
        assert_eq!(config.training.min_games, 100);
        assert_eq!(config.training_config().chunk_size, 8192);
    }
}
