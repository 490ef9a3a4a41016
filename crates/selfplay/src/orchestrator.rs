//! Worker pool running self-play episodes against the current champion.
//!
//! Each worker thread owns its evaluator and search tree. Finished games are
//! sent over a channel to a single collector (the calling thread), which owns
//! the in-memory batch and flushes it to the replay store on a fixed interval
//! and once more after every worker has stopped.

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam_channel::{unbounded, RecvTimeoutError, Sender};
use gomoku_mcts::Evaluator;
use log::{debug, error, info, warn};
use rand::thread_rng;

use crate::game::{game_to_samples, play_game_until, SelfPlayConfig};
use crate::shutdown::Shutdown;
use crate::storage::{ReplayStore, ReplayUnit};

/// Something that can produce the current champion evaluator.
///
/// Called once when a worker starts and again every
/// [`OrchestratorConfig::reload_every`] episodes.
pub trait EvaluatorSource {
    type Evaluator: Evaluator;

    fn load(&self) -> Result<Self::Evaluator>;
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Number of concurrent self-play workers
    pub workers: usize,
    /// How often the collected batch is written out
    pub flush_interval: Duration,
    /// Delay before a failed worker is restarted
    pub restart_backoff: Duration,
    /// Reload the champion after this many episodes (0 disables reloads)
    pub reload_every: usize,
    /// Delay between attempts when no model can be loaded
    pub load_retry: Duration,
    pub selfplay: SelfPlayConfig,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            workers: 4,
            flush_interval: Duration::from_secs(60),
            restart_backoff: Duration::from_secs(5),
            reload_every: 5,
            load_retry: Duration::from_secs(10),
            selfplay: SelfPlayConfig::default(),
        }
    }
}

/// Counters reported when the orchestrator stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OrchestratorReport {
    pub episodes: usize,
    pub units_written: usize,
    pub worker_restarts: usize,
}

pub struct Orchestrator<S> {
    config: OrchestratorConfig,
    source: S,
    store: ReplayStore,
}

impl<S> Orchestrator<S>
where
    S: EvaluatorSource + Sync,
{
    pub fn new(config: OrchestratorConfig, source: S, store: ReplayStore) -> Self {
        Self { config, source, store }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Run workers until `shutdown` fires, then flush whatever is left.
    ///
    /// Returns an error only if the final flush could not persist the batch.
    pub fn run(&self, shutdown: &Shutdown) -> Result<OrchestratorReport> {
        let restarts = AtomicUsize::new(0);
        let (tx, rx) = unbounded::<ReplayUnit>();

        info!(
            "[orchestrator] starting {} workers, flushing every {:?}",
            self.config.workers, self.config.flush_interval
        );

        let (episodes, units_written, unflushed) = thread::scope(|scope| {
            for worker_id in 0..self.config.workers {
                let tx = tx.clone();
                let restarts = &restarts;
                scope.spawn(move || self.supervise(worker_id, tx, shutdown, restarts));
            }
            // Workers hold the only senders; the channel disconnects once all have stopped.
            drop(tx);

            let mut batch = VecDeque::new();
            let mut episodes = 0;
            let mut written = 0;
            let mut next_flush = Instant::now() + self.config.flush_interval;

            loop {
                match rx.recv_deadline(next_flush) {
                    Ok(unit) => {
                        episodes += 1;
                        batch.push_back(unit);
                    }
                    Err(RecvTimeoutError::Timeout) => {
                        written += self.flush(&mut batch);
                        next_flush = Instant::now() + self.config.flush_interval;
                    }
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }

            written += self.flush(&mut batch);
            (episodes, written, batch.len())
        });

        let report = OrchestratorReport {
            episodes,
            units_written,
            worker_restarts: restarts.load(Ordering::Relaxed),
        };
        info!("[orchestrator] stopped: {report:?}");

        if unflushed > 0 {
            bail!("{unflushed} finished games could not be written to the replay store");
        }
        Ok(report)
    }

    /// Write queued units in order; a unit leaves the batch only once written.
    fn flush(&self, batch: &mut VecDeque<ReplayUnit>) -> usize {
        let mut written = 0;
        while let Some(unit) = batch.front() {
            match self.store.write_unit(unit) {
                Ok(path) => {
                    debug!("[orchestrator] wrote {}", path.display());
                    batch.pop_front();
                    written += 1;
                }
                Err(e) => {
                    error!(
                        "[orchestrator] flush failed, keeping {} games for the next attempt: {e}",
                        batch.len()
                    );
                    break;
                }
            }
        }
        if written > 0 {
            info!("[orchestrator] flushed {written} games");
        }
        written
    }

    fn supervise(&self, worker_id: usize, tx: Sender<ReplayUnit>, shutdown: &Shutdown, restarts: &AtomicUsize) {
        loop {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_worker(worker_id, &tx, shutdown)));
            match outcome {
                Ok(Ok(())) => return,
                Ok(Err(e)) => error!("[worker {worker_id}] failed: {e:#}"),
                Err(payload) => error!("[worker {worker_id}] panicked: {}", panic_message(&*payload)),
            }

            if shutdown.wait_timeout(self.config.restart_backoff) {
                return;
            }
            restarts.fetch_add(1, Ordering::Relaxed);
            info!("[worker {worker_id}] restarting");
        }
    }

    fn run_worker(&self, worker_id: usize, tx: &Sender<ReplayUnit>, shutdown: &Shutdown) -> Result<()> {
        let Some(mut evaluator) = self.load_with_retry(worker_id, shutdown) else {
            return Ok(());
        };
        let mut rng = thread_rng();
        let mut played = 0usize;

        while !shutdown.is_triggered() {
            let Some(record) = play_game_until(&evaluator, &self.config.selfplay, &mut rng, shutdown)
                .with_context(|| format!("episode {} failed", played + 1))?
            else {
                break;
            };
            played += 1;
            info!(
                "[worker {worker_id}] episode {played} finished: {} moves, {:?}",
                record.len(),
                record.winner
            );

            if tx.send(ReplayUnit::new(worker_id, game_to_samples(&record))).is_err() {
                warn!("[worker {worker_id}] collector is gone, stopping");
                break;
            }

            if self.config.reload_every > 0 && played % self.config.reload_every == 0 {
                match self.source.load() {
                    Ok(fresh) => {
                        evaluator = fresh;
                        debug!("[worker {worker_id}] reloaded champion");
                    }
                    Err(e) => warn!("[worker {worker_id}] reload failed, keeping current model: {e:#}"),
                }
            }
        }

        Ok(())
    }

    fn load_with_retry(&self, worker_id: usize, shutdown: &Shutdown) -> Option<S::Evaluator> {
        loop {
            match self.source.load() {
                Ok(evaluator) => return Some(evaluator),
                Err(e) => warn!(
                    "[worker {worker_id}] no usable model, retrying in {:?}: {e:#}",
                    self.config.load_retry
                ),
            }
            if shutdown.wait_timeout(self.config.load_retry) {
                return None;
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
