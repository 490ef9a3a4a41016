use std::time::Duration;

use anyhow::{Context, Result};
use gomoku_core::{Board, Move, Side, BOARD_SIZE};
use gomoku_mcts::{Evaluator, Mcts, MctsConfig, SearchResult};
use log::debug;
use rand::distributions::{Distribution, WeightedIndex};
use rand::{thread_rng, Rng};

use crate::data::{EpisodeSample, GameRecord, GameResult};
use crate::shutdown::Shutdown;

/// Self-play settings for one game
#[derive(Debug, Clone)]
pub struct SelfPlayConfig {
    /// Search settings used for every ply
    pub mcts: MctsConfig,
    /// Plies during which moves are sampled from the visit distribution
    pub exploration_moves: usize,
    /// Board side length
    pub board_size: usize,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            mcts: MctsConfig::default().with_time_budget(Duration::from_millis(2000)),
            exploration_moves: 15,
            board_size: BOARD_SIZE,
        }
    }
}

/// Play a single self-play game with a thread-local RNG
pub fn play_game<E: Evaluator + ?Sized>(evaluator: &E, config: &SelfPlayConfig) -> Result<GameRecord> {
    play_game_with_rng(evaluator, config, &mut thread_rng())
}

/// Play a single self-play game
///
/// # Arguments
/// * `evaluator` - Position evaluator guiding the search for both sides
/// * `config` - Search and exploration settings
/// * `rng` - Source of randomness for exploration sampling
///
/// # Returns
/// A complete game record. The game ends on five in a row, a full board, or
/// when the search reports no candidate move (a draw); it never records more
/// than `board_size * board_size` positions.
pub fn play_game_with_rng<E, R>(evaluator: &E, config: &SelfPlayConfig, rng: &mut R) -> Result<GameRecord>
where
    E: Evaluator + ?Sized,
    R: Rng + ?Sized,
{
    run_episode(evaluator, config, rng, &|| false)?.context("episode stopped without a cancel request")
}

/// Play a self-play game that gives up between plies once `shutdown` fires.
///
/// Returns `Ok(None)` when the game was abandoned.
pub fn play_game_until<E, R>(
    evaluator: &E,
    config: &SelfPlayConfig,
    rng: &mut R,
    shutdown: &Shutdown,
) -> Result<Option<GameRecord>>
where
    E: Evaluator + ?Sized,
    R: Rng + ?Sized,
{
    run_episode(evaluator, config, rng, &|| shutdown.is_triggered())
}

fn run_episode<E, R>(
    evaluator: &E,
    config: &SelfPlayConfig,
    rng: &mut R,
    cancelled: &dyn Fn() -> bool,
) -> Result<Option<GameRecord>>
where
    E: Evaluator + ?Sized,
    R: Rng + ?Sized,
{
    let size = config.board_size;
    let mut board = Board::new(size);
    let mut side = Side::FIRST;
    let mut mcts = Mcts::new();
    let mut record = GameRecord::new();

    for ply in 0..size * size {
        if cancelled() {
            debug!("episode abandoned at ply {ply}");
            return Ok(None);
        }

        let result = mcts
            .search(&board, side, evaluator, &config.mcts)
            .with_context(|| format!("search failed at ply {ply}"))?;

        let Some(best_move) = result.best_move else {
            debug!("no candidate move at ply {ply}; game drawn");
            break;
        };

        record.add_position(board.clone(), side, result.normalized_policy(size));

        let chosen = if ply < config.exploration_moves {
            sample_move(&result, best_move, rng)
        } else {
            best_move
        };

        board
            .place(chosen, side)
            .with_context(|| format!("engine proposed illegal move {chosen}"))?;
        record.add_move(chosen);

        if board.is_winning_move(chosen, side) {
            record.set_winner(GameResult::from_winner(Some(side)));
            return Ok(Some(record));
        }

        // Trees are not reused across plies
        mcts.reset();
        side = side.opponent();
    }

    record.set_winner(GameResult::Draw);
    Ok(Some(record))
}

/// Sample a root move proportionally to its visit count (temperature 1).
///
/// Normalization is over all root children, which are exactly the moves the
/// evaluator gave a non-zero prior. With a single candidate, or no visits at
/// all, the best move is returned unchanged.
fn sample_move<R: Rng + ?Sized>(result: &SearchResult, best_move: Move, rng: &mut R) -> Move {
    if result.root_visit_counts.len() <= 1 {
        return best_move;
    }

    let weights: Vec<u32> = result.root_visit_counts.iter().map(|(_, v)| *v).collect();
    match WeightedIndex::new(&weights) {
        Ok(dist) => result.root_visit_counts[dist.sample(rng)].0,
        Err(_) => best_move,
    }
}

/// Play a deterministic game between two evaluators; `black` moves first.
///
/// Both sides always take the most visited move.
pub fn play_match<A, B>(black: &A, white: &B, config: &MctsConfig, board_size: usize) -> Result<GameResult>
where
    A: Evaluator + ?Sized,
    B: Evaluator + ?Sized,
{
    let mut board = Board::new(board_size);
    let mut side = Side::FIRST;
    let mut mcts = Mcts::new();

    for ply in 0..board_size * board_size {
        let result = match side {
            Side::Black => mcts.search(&board, side, black, config),
            Side::White => mcts.search(&board, side, white, config),
        }
        .with_context(|| format!("match search failed at ply {ply}"))?;

        let Some(mv) = result.best_move else {
            return Ok(GameResult::Draw);
        };

        board
            .place(mv, side)
            .with_context(|| format!("engine proposed illegal move {mv}"))?;

        if board.is_winning_move(mv, side) {
            return Ok(GameResult::from_winner(Some(side)));
        }

        mcts.reset();
        side = side.opponent();
    }

    Ok(GameResult::Draw)
}

/// Convert game record to training samples
///
/// Each position gets the final outcome from the perspective of the side
/// that was to move there.
pub fn game_to_samples(record: &GameRecord) -> Vec<EpisodeSample> {
    record
        .states
        .iter()
        .zip(&record.sides)
        .zip(&record.policies)
        .map(|((state, &side), policy)| {
            EpisodeSample::new(
                state.clone(),
                side,
                policy.clone(),
                record.winner.value_for(side),
            )
        })
        .collect()
}
