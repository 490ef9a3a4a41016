use std::time::Duration;

use gomoku_core::Move;

/// Result of MCTS search
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Most visited root move, or None when the root had no children
    pub best_move: Option<Move>,

    /// Visit counts for each root child in creation order: (move, visit_count)
    pub root_visit_counts: Vec<(Move, u32)>,

    /// Mean backed-up value for the side to move at the root
    pub root_value: f32,

    /// Number of simulations actually run
    pub num_simulations_run: u32,

    /// Wall-clock time spent searching
    pub elapsed: Duration,
}

impl SearchResult {
    /// Result for a position without any candidate move
    pub fn no_move(elapsed: Duration) -> Self {
        Self {
            best_move: None,
            root_visit_counts: Vec::new(),
            root_value: 0.0,
            num_simulations_run: 0,
            elapsed,
        }
    }

    /// Get the visit count for a specific move
    pub fn visit_count_for_move(&self, mv: Move) -> u32 {
        self.root_visit_counts
            .iter()
            .find(|(m, _)| *m == mv)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }

    /// Get the total number of visits over all root children
    pub fn total_visits(&self) -> u32 {
        self.root_visit_counts.iter().map(|(_, v)| v).sum()
    }

    /// Visit counts divided by their total, laid out over all `size * size`
    /// cells. All zeros when nothing was visited.
    pub fn normalized_policy(&self, size: usize) -> Vec<f32> {
        let mut policy = vec![0.0f32; size * size];
        let total = self.total_visits();
        if total == 0 {
            return policy;
        }
        for &(mv, visits) in &self.root_visit_counts {
            policy[mv.index(size)] = visits as f32 / total as f32;
        }
        policy
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(visits: Vec<(Move, u32)>) -> SearchResult {
        SearchResult {
            best_move: visits.first().map(|(m, _)| *m),
            root_visit_counts: visits,
            root_value: 0.0,
            num_simulations_run: 0,
            elapsed: Duration::ZERO,
        }
    }

    #[test]
    fn test_normalized_policy() {
        let r = result(vec![(Move::new(0, 0), 3), (Move::new(1, 1), 1)]);
        let policy = r.normalized_policy(2);
        assert_eq!(policy, vec![0.75, 0.0, 0.0, 0.25]);
        assert_eq!(r.total_visits(), 4);
        assert_eq!(r.visit_count_for_move(Move::new(1, 1)), 1);
        assert_eq!(r.visit_count_for_move(Move::new(0, 1)), 0);
    }

    #[test]
    fn test_normalized_policy_all_zero_when_unvisited() {
        let r = result(vec![(Move::new(0, 0), 0), (Move::new(1, 1), 0)]);
        assert!(r.normalized_policy(2).iter().all(|&p| p == 0.0));
    }

    #[test]
    fn test_no_move_result() {
        let r = SearchResult::no_move(Duration::from_millis(3));
        assert!(r.best_move.is_none());
        assert_eq!(r.total_visits(), 0);
    }
}
