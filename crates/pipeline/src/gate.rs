//! Champion/challenger evaluation and promotion.
//!
//! Each checkpoint goes `Pending -> Evaluating -> {Promoted | Rejected} ->
//! Archived`. With no champion yet the checkpoint is promoted without play.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
use gomoku_core::{Board, Side, BOARD_SIZE};
use gomoku_mcts::{Evaluation, Evaluator, MctsConfig};
use gomoku_selfplay::{play_match, GameResult, Shutdown};
use log::{debug, error, info, warn};
use rayon::prelude::*;

use crate::champion::ChampionStore;
use crate::checkpoint::CheckpointQueue;
use crate::daemon::run_periodic;

/// Failed installs of one checkpoint before it is given up on
pub const MAX_INSTALL_ATTEMPTS: usize = 3;

/// Loads an evaluator from an artifact directory
pub trait ModelLoader {
    type Model: Evaluator + Sync;

    fn load(&self, dir: &Path) -> Result<Self::Model>;
}

#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Games per evaluation; the challenger moves first in even-indexed games
    pub games: usize,
    /// Win rate the challenger must strictly exceed
    pub threshold: f32,
    /// Search settings for both sides (no exploration)
    pub search: MctsConfig,
    pub board_size: usize,
    pub poll_interval: Duration,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            games: 50,
            threshold: 0.55,
            search: MctsConfig::default().with_time_budget(Duration::from_millis(1000)),
            board_size: BOARD_SIZE,
            poll_interval: Duration::from_secs(15 * 60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MatchReport {
    pub games: usize,
    pub challenger_wins: usize,
    pub champion_wins: usize,
    pub draws: usize,
}

impl MatchReport {
    /// Challenger wins over games played; draws count for neither side
    pub fn win_rate(&self) -> f32 {
        if self.games == 0 {
            0.0
        } else {
            self.challenger_wins as f32 / self.games as f32
        }
    }

    /// Record game `index`, where the challenger played first on even indices
    pub fn record(&mut self, index: usize, result: GameResult) {
        let challenger_first = index % 2 == 0;
        self.games += 1;
        match (result, challenger_first) {
            (GameResult::Draw, _) => self.draws += 1,
            (GameResult::BlackWin, true) | (GameResult::WhiteWin, false) => self.challenger_wins += 1,
            _ => self.champion_wins += 1,
        }
    }
}

impl fmt::Display for MatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}W {}L {}D over {} games (win rate {:.3})",
            self.challenger_wins,
            self.champion_wins,
            self.draws,
            self.games,
            self.win_rate()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No champion existed; promoted without play
    Bootstrap,
    Promote,
    Reject,
}

impl Decision {
    pub fn promotes(self) -> bool {
        matches!(self, Decision::Bootstrap | Decision::Promote)
    }
}

/// Decide from a finished match, or bootstrap when there was no champion
pub fn decide(report: Option<&MatchReport>, threshold: f32) -> Decision {
    match report {
        None => Decision::Bootstrap,
        Some(r) if r.win_rate() > threshold => Decision::Promote,
        Some(_) => Decision::Reject,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointState {
    Pending,
    Evaluating,
    Promoted,
    Rejected,
    Archived,
}

impl CheckpointState {
    pub fn can_become(self, next: CheckpointState) -> bool {
        use CheckpointState::*;
        matches!(
            (self, next),
            (Pending, Evaluating) | (Evaluating, Promoted) | (Evaluating, Rejected) | (Promoted, Archived) | (Rejected, Archived)
        )
    }
}

/// Play `games` games in parallel and tally them by game index.
///
/// `play(i)` returns the result of game `i` from the board's point of view.
pub fn tally<F>(games: usize, play: F) -> Result<MatchReport>
where
    F: Fn(usize) -> Result<GameResult> + Sync,
{
    let results: Vec<GameResult> = (0..games).into_par_iter().map(&play).collect::<Result<_>>()?;
    let mut report = MatchReport::default();
    for (i, result) in results.into_iter().enumerate() {
        report.record(i, result);
    }
    Ok(report)
}

/// Evaluator wrapper that remembers whether any query failed
struct Tracked<'a, E> {
    inner: &'a E,
    failed: AtomicBool,
}

impl<'a, E: Evaluator> Tracked<'a, E> {
    fn new(inner: &'a E) -> Self {
        Self {
            inner,
            failed: AtomicBool::new(false),
        }
    }

    fn failed(&self) -> bool {
        self.failed.load(Ordering::Relaxed)
    }
}

impl<E: Evaluator> Evaluator for Tracked<'_, E> {
    fn evaluate(&self, board: &Board, side: Side) -> gomoku_mcts::Result<Evaluation> {
        let evaluation = self.inner.evaluate(board, side);
        if evaluation.is_err() {
            self.failed.store(true, Ordering::Relaxed);
        }
        evaluation
    }
}

/// What happened to one checkpoint
#[derive(Debug, Clone)]
pub struct GateOutcome {
    /// Where the checkpoint was archived
    pub archived: PathBuf,
    pub decision: Decision,
    pub report: Option<MatchReport>,
}

pub struct PromotionGate<L> {
    config: GateConfig,
    loader: L,
    queue: CheckpointQueue,
    champion: ChampionStore,
    install_failures: Mutex<HashMap<PathBuf, usize>>,
}

impl<L: ModelLoader> PromotionGate<L> {
    pub fn new(config: GateConfig, loader: L, queue: CheckpointQueue, champion: ChampionStore) -> Self {
        Self {
            config,
            loader,
            queue,
            champion,
            install_failures: Mutex::new(HashMap::new()),
        }
    }

    pub fn loader(&self) -> &L {
        &self.loader
    }

    /// Evaluate the oldest pending checkpoint, if any.
    ///
    /// A challenger that cannot be loaded or fails during play is rejected.
    /// A failed install returns an error and leaves the checkpoint queued
    /// until it has failed [`MAX_INSTALL_ATTEMPTS`] times, after which it is
    /// rejected. Champion-side failures return an error.
    pub fn evaluate_next(&self) -> Result<Option<GateOutcome>> {
        let Some(checkpoint) = self.queue.oldest()? else {
            return Ok(None);
        };
        let name = display_name(&checkpoint);
        let mut state = CheckpointState::Pending;
        self.advance(&name, &mut state, CheckpointState::Evaluating);

        let challenger = match self.loader.load(&checkpoint) {
            Ok(model) => model,
            Err(e) => {
                warn!("[gate] {name} cannot be loaded, rejecting: {e:#}");
                self.advance(&name, &mut state, CheckpointState::Rejected);
                return self.finish(&name, &checkpoint, &mut state, Decision::Reject, None).map(Some);
            }
        };

        let report = match self.champion.current_dir()? {
            None => None,
            Some(dir) => {
                let champion = self.loader.load(&dir).context("loading current champion")?;
                let challenger = Tracked::new(&challenger);
                let search = &self.config.search;
                let board_size = self.config.board_size;
                info!("[gate] {name}: playing {} games against the champion", self.config.games);
                let played = tally(self.config.games, |i| {
                    let result = if i % 2 == 0 {
                        play_match(&challenger, &champion, search, board_size)
                    } else {
                        play_match(&champion, &challenger, search, board_size)
                    };
                    result.with_context(|| format!("evaluation game {i}"))
                });
                match played {
                    Ok(report) => {
                        info!("[gate] {name}: {report}");
                        Some(report)
                    }
                    Err(e) if challenger.failed() => {
                        warn!("[gate] {name} failed during play, rejecting: {e:#}");
                        self.advance(&name, &mut state, CheckpointState::Rejected);
                        return self.finish(&name, &checkpoint, &mut state, Decision::Reject, None).map(Some);
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let mut decision = decide(report.as_ref(), self.config.threshold);
        if decision.promotes() {
            match self.champion.install(&checkpoint) {
                Ok(_) => {
                    self.clear_install_failures(&checkpoint);
                    self.advance(&name, &mut state, CheckpointState::Promoted);
                }
                Err(e) => {
                    let attempts = self.record_install_failure(&checkpoint);
                    if attempts < MAX_INSTALL_ATTEMPTS {
                        return Err(e.context(format!("promoting {name} (attempt {attempts})")));
                    }
                    error!("[gate] giving up on {name} after {attempts} failed installs: {e:#}");
                    self.clear_install_failures(&checkpoint);
                    decision = Decision::Reject;
                    self.advance(&name, &mut state, CheckpointState::Rejected);
                }
            }
        } else {
            self.advance(&name, &mut state, CheckpointState::Rejected);
        }

        self.finish(&name, &checkpoint, &mut state, decision, report).map(Some)
    }

    /// Evaluate every pending checkpoint, oldest first
    pub fn drain(&self, shutdown: &Shutdown) -> Result<Vec<GateOutcome>> {
        let mut outcomes = Vec::new();
        while !shutdown.is_triggered() {
            match self.evaluate_next()? {
                Some(outcome) => outcomes.push(outcome),
                None => break,
            }
        }
        Ok(outcomes)
    }

    /// Poll for checkpoints until `shutdown` fires
    pub fn run(&self, shutdown: &Shutdown) {
        run_periodic("gate", self.config.poll_interval, shutdown, || {
            self.drain(shutdown).map(|_| ())
        });
    }

    fn finish(
        &self,
        name: &str,
        checkpoint: &Path,
        state: &mut CheckpointState,
        decision: Decision,
        report: Option<MatchReport>,
    ) -> Result<GateOutcome> {
        let archived = self.queue.archive(checkpoint)?;
        self.advance(name, state, CheckpointState::Archived);
        info!("[gate] {name}: {decision:?}");
        Ok(GateOutcome {
            archived,
            decision,
            report,
        })
    }

    fn record_install_failure(&self, checkpoint: &Path) -> usize {
        let mut failures = self.install_failures.lock().unwrap_or_else(PoisonError::into_inner);
        let attempts = failures.entry(checkpoint.to_path_buf()).or_insert(0);
        *attempts += 1;
        *attempts
    }

    fn clear_install_failures(&self, checkpoint: &Path) {
        self.install_failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(checkpoint);
    }

    fn advance(&self, name: &str, state: &mut CheckpointState, next: CheckpointState) {
        debug_assert!(state.can_become(next), "{state:?} -> {next:?}");
        debug!("[gate] {name}: {state:?} -> {next:?}");
        *state = next;
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;

    /// Scripted results: challenger wins the first `w`, then `d` draws, then losses
    fn scripted(w: usize, d: usize) -> impl Fn(usize) -> Result<GameResult> + Sync {
        move |i| {
            let challenger_first = i % 2 == 0;
            let (won, lost) = if challenger_first {
                (GameResult::BlackWin, GameResult::WhiteWin)
            } else {
                (GameResult::WhiteWin, GameResult::BlackWin)
            };
            Ok(if i < w {
                won
            } else if i < w + d {
                GameResult::Draw
            } else {
                lost
            })
        }
    }

    #[test]
    fn test_thirty_wins_promote() {
        let report = tally(50, scripted(30, 5)).unwrap();
        assert_eq!(report.challenger_wins, 30);
        assert_eq!(report.draws, 5);
        assert_eq!(report.champion_wins, 15);
        assert!((report.win_rate() - 0.60).abs() < 1e-6);
        assert_eq!(decide(Some(&report), 0.55), Decision::Promote);
    }

    #[test]
    fn test_twenty_wins_reject() {
        let report = tally(50, scripted(20, 5)).unwrap();
        assert!((report.win_rate() - 0.40).abs() < 1e-6);
        assert_eq!(decide(Some(&report), 0.55), Decision::Reject);
    }

    #[test]
    fn test_threshold_is_strict() {
        let report = MatchReport {
            games: 20,
            challenger_wins: 11,
            champion_wins: 9,
            draws: 0,
        };
        assert_eq!(decide(Some(&report), 0.55), Decision::Reject);
    }

    #[test]
    fn test_no_champion_bootstraps() {
        assert_eq!(decide(None, 0.55), Decision::Bootstrap);
        assert!(Decision::Bootstrap.promotes());
        assert!(!Decision::Reject.promotes());
    }

    #[test]
    fn test_tally_propagates_game_errors() {
        let result = tally(4, |i| if i == 3 { Err(anyhow!("evaluator gone")) } else { Ok(GameResult::Draw) });
        assert!(result.is_err());
    }

    #[test]
    fn test_record_by_seat() {
        let mut report = MatchReport::default();
        report.record(0, GameResult::BlackWin);
        report.record(1, GameResult::BlackWin);
        report.record(2, GameResult::WhiteWin);
        report.record(3, GameResult::Draw);
        assert_eq!(report.challenger_wins, 1);
        assert_eq!(report.champion_wins, 2);
        assert_eq!(report.draws, 1);
    }

    #[test]
    fn test_state_transitions() {
        use CheckpointState::*;
        assert!(Pending.can_become(Evaluating));
        assert!(Evaluating.can_become(Rejected));
        assert!(Promoted.can_become(Archived));
        assert!(!Pending.can_become(Promoted));
        assert!(!Archived.can_become(Pending));
        assert!(!Evaluating.can_become(Archived));
    }
}
