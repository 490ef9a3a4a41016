use std::time::Duration;

/// When a search stops iterating
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchLimit {
    /// Soft wall-clock deadline, checked between simulations
    Time(Duration),
    /// Fixed number of simulations
    Simulations(u32),
}

/// Configuration for MCTS search
#[derive(Debug, Clone)]
pub struct MctsConfig {
    /// Stop condition for the simulation loop
    pub limit: SearchLimit,

    /// PUCT exploration constant (typically 1.0-5.0)
    pub c_puct: f32,

    /// Restrict legal moves to empty cells within this distance of a stone.
    /// `None` means every empty cell is legal.
    pub candidate_radius: Option<usize>,

    /// Whether to add Dirichlet noise to root
    pub add_dirichlet_noise: bool,

    /// Dirichlet alpha parameter
    pub dirichlet_alpha: f32,

    /// Dirichlet epsilon for mixing noise (typically 0.25)
    pub dirichlet_epsilon: f32,
}

impl MctsConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Search for a fixed wall-clock budget
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.limit = SearchLimit::Time(budget);
        self
    }

    /// Search for a fixed number of simulations
    pub fn with_simulations(mut self, n: u32) -> Self {
        self.limit = SearchLimit::Simulations(n);
        self
    }

    /// Set PUCT exploration constant
    pub fn with_c_puct(mut self, c: f32) -> Self {
        self.c_puct = c;
        self
    }

    /// Only consider moves near existing stones
    pub fn with_candidate_radius(mut self, radius: usize) -> Self {
        self.candidate_radius = Some(radius);
        self
    }

    /// Enable Dirichlet noise with given parameters
    pub fn with_dirichlet_noise(mut self, alpha: f32, epsilon: f32) -> Self {
        self.add_dirichlet_noise = true;
        self.dirichlet_alpha = alpha;
        self.dirichlet_epsilon = epsilon;
        self
    }

    /// Disable Dirichlet noise
    pub fn without_dirichlet_noise(mut self) -> Self {
        self.add_dirichlet_noise = false;
        self
    }
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            limit: SearchLimit::Time(Duration::from_millis(2000)),
            c_puct: 1.5,
            candidate_radius: None,
            add_dirichlet_noise: false,
            dirichlet_alpha: 0.3,
            dirichlet_epsilon: 0.25,
        }
    }
}
