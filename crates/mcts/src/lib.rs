//! PUCT Monte Carlo Tree Search over a five-in-a-row board.
//!
//! The search is driven by an external [`Evaluator`] that maps a position to
//! move priors and a value. Nodes live in a flat arena and refer to their
//! parent by index.

mod backup;
mod config;
mod dirichlet;
mod error;
mod evaluation;
mod expansion;
mod mcts;
mod search_result;
mod selection;
mod tree;

// Public exports
pub use config::{MctsConfig, SearchLimit};
pub use error::{MctsError, Result};
pub use evaluation::{
    classify_leaf, legal_moves, legal_priors, Evaluation, Evaluator, LeafOutcome, UniformEvaluator,
};
pub use mcts::Mcts;
pub use search_result::SearchResult;
pub use tree::{MctsNode, MctsTree, NodeId};
