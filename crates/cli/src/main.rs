//! gomoku-zero: self-play, training and promotion for five in a row
//!
//! Usage: gomoku-zero [--config pipeline.toml] <init|selfplay|train|evaluate|pipeline>

use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use gomoku_nn::{ChampionSource, TableModel, TableModelLoader, TableTrainer};
use gomoku_pipeline::{ChampionStore, CheckpointQueue, PipelineConfig, PromotionGate, TrainingLoop, TrainingOutcome};
use gomoku_selfplay::{Orchestrator, ReplayStore, Shutdown};
use log::{error, info};

/// Delay before a crashed pipeline stage is started again
const STAGE_RESTART_DELAY: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(name = "gomoku-zero")]
#[command(about = "AlphaZero-style self-play training for five in a row", long_about = None)]
struct Cli {
    /// Pipeline settings (TOML); defaults apply when the file is missing
    #[arg(long, default_value = "pipeline.toml")]
    config: PathBuf,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Override the board side length
    #[arg(long)]
    board_size: Option<usize>,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Install a fresh reference model as the champion
    Init {
        /// Replace an existing champion
        #[arg(long)]
        force: bool,
    },
    /// Run self-play workers against the champion
    Selfplay {
        /// Override the number of workers
        #[arg(long)]
        workers: Option<usize>,
    },
    /// Train on pending games and publish checkpoints
    Train {
        /// Run a single pass and exit
        #[arg(long)]
        once: bool,
    },
    /// Evaluate pending checkpoints against the champion
    Evaluate {
        /// Drain the checkpoint queue once and exit
        #[arg(long)]
        once: bool,
    },
    /// Run self-play, training and evaluation together
    Pipeline,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let mut config = PipelineConfig::load(&cli.config)?;
    if let Some(dir) = cli.data_dir {
        config.data_dir = dir;
    }
    if let Some(size) = cli.board_size {
        config.board_size = size;
    }
    if let Command::Selfplay { workers: Some(n) } = cli.command {
        config.selfplay.workers = n;
    }
    config.validate()?;

    let shutdown = Shutdown::new();
    let handle = shutdown.clone();
    ctrlc::set_handler(move || {
        eprintln!("\nInterrupted, shutting down...");
        handle.trigger();
    })
    .context("Failed to set Ctrl-C handler")?;

    match cli.command {
        Command::Init { force } => init(&config, force),
        Command::Selfplay { .. } => selfplay(&config, &shutdown),
        Command::Train { once: true } => {
            let outcome = training_loop(&config)?.run_once(&mut rand::thread_rng())?;
            report_training(&outcome);
            Ok(())
        }
        Command::Train { once: false } => training_loop(&config)?.run(&shutdown),
        Command::Evaluate { once: true } => {
            let outcomes = gate(&config)?.drain(&shutdown)?;
            info!("evaluated {} checkpoints", outcomes.len());
            Ok(())
        }
        Command::Evaluate { once: false } => {
            gate(&config)?.run(&shutdown);
            Ok(())
        }
        Command::Pipeline => pipeline(&config, &shutdown),
    }
}

fn init(config: &PipelineConfig, force: bool) -> Result<()> {
    let champion = ChampionStore::open(&config.data_dir)?;
    if champion.exists()? && !force {
        bail!("a champion already exists; pass --force to replace it");
    }

    let staging = config.data_dir.join("init_staging");
    fs::create_dir_all(&staging).with_context(|| format!("creating {}", staging.display()))?;
    TableModel::new(config.board_size).save(&staging)?;
    let installed = champion.install(&staging);
    fs::remove_dir_all(&staging).ok();

    info!("initial champion installed at {}", installed?.display());
    Ok(())
}

fn selfplay(config: &PipelineConfig, shutdown: &Shutdown) -> Result<()> {
    let champion = ChampionStore::open(&config.data_dir)?;
    let replay = ReplayStore::open(config.replay_dir())?;
    let orchestrator = Orchestrator::new(
        config.orchestrator_config(),
        ChampionSource::new(champion, config.board_size),
        replay,
    );
    let report = orchestrator.run(shutdown)?;
    info!(
        "self-play finished: {} games, {} written, {} worker restarts",
        report.episodes, report.units_written, report.worker_restarts
    );
    Ok(())
}

fn training_loop(config: &PipelineConfig) -> Result<TrainingLoop<TableTrainer>> {
    let t = &config.training;
    Ok(TrainingLoop::new(
        config.training_config(),
        TableTrainer::new(config.board_size, t.batch_size, t.learning_rate),
        ReplayStore::open(config.replay_dir())?,
        CheckpointQueue::open(&config.data_dir)?,
        ChampionStore::open(&config.data_dir)?,
    ))
}

fn report_training(outcome: &TrainingOutcome) {
    match outcome {
        TrainingOutcome::Idle { pending } => info!("only {pending} games pending, nothing to do"),
        TrainingOutcome::Trained {
            checkpoint,
            games,
            samples,
            skipped,
            final_loss,
        } => info!(
            "trained on {games} games ({samples} samples, {skipped} skipped), loss {final_loss:.4}, wrote {}",
            checkpoint.display()
        ),
    }
}

fn gate(config: &PipelineConfig) -> Result<PromotionGate<TableModelLoader>> {
    Ok(PromotionGate::new(
        config.gate_config(),
        TableModelLoader::new(config.board_size),
        CheckpointQueue::open(&config.data_dir)?,
        ChampionStore::open(&config.data_dir)?,
    ))
}

/// All three stages on their own threads, each restarted if it crashes
fn pipeline(config: &PipelineConfig, shutdown: &Shutdown) -> Result<()> {
    if !ChampionStore::open(&config.data_dir)?.exists()? {
        init(config, false)?;
    }

    thread::scope(|s| {
        s.spawn(|| supervise("selfplay", shutdown, || selfplay(config, shutdown)));
        s.spawn(|| supervise("trainer", shutdown, || training_loop(config)?.run(shutdown)));
        s.spawn(|| {
            supervise("gate", shutdown, || {
                gate(config)?.run(shutdown);
                Ok(())
            })
        });
    });
    Ok(())
}

fn supervise<F>(name: &str, shutdown: &Shutdown, stage: F)
where
    F: Fn() -> Result<()>,
{
    while !shutdown.is_triggered() {
        match panic::catch_unwind(AssertUnwindSafe(&stage)) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => error!("[{name}] exited with error: {e:#}"),
            Err(_) => error!("[{name}] panicked"),
        }
        if shutdown.wait_timeout(STAGE_RESTART_DELAY) {
            return;
        }
        info!("[{name}] restarting");
    }
}
