use thiserror::Error;

#[derive(Error, Debug)]
pub enum MctsError {
    #[error("Board error: {0}")]
    BoardError(#[from] gomoku_core::BoardError),

    #[error("Evaluator unavailable: {0}")]
    EvaluatorUnavailable(String),

    #[error("Expected policy over {expected} cells, got {got}")]
    InvalidPolicy { expected: usize, got: usize },

    #[error("Invalid node ID: {0}")]
    InvalidNodeId(usize),

    #[error("Root node not initialized")]
    RootNotInitialized,

    #[error("Dirichlet sampling error: {0}")]
    DirichletError(String),
}

impl MctsError {
    /// Whether waiting and retrying (e.g. after reloading a model) can help
    pub fn is_retryable(&self) -> bool {
        matches!(self, MctsError::EvaluatorUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, MctsError>;
