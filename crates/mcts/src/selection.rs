use gomoku_core::Board;

use crate::error::Result;
use crate::tree::{MctsTree, NodeId};

/// Select a leaf node to evaluate using the PUCT formula
///
/// Traverses the tree from root, selecting children with highest PUCT value
/// until reaching a node without children. Every move on the path is played
/// onto `board` by the side to move at its parent.
pub fn select(tree: &MctsTree, root_id: NodeId, c_puct: f32, board: &mut Board) -> Result<NodeId> {
    let mut current_id = root_id;

    loop {
        let node = tree.node(current_id)?;
        if node.is_leaf() {
            return Ok(current_id);
        }

        let sqrt_parent = (node.visit_count as f32).sqrt();

        // Strict comparison keeps the first child among equal scores
        let mut best_id = node.children[0];
        let mut best_score = f32::NEG_INFINITY;
        for &child_id in &node.children {
            let score = puct_value(tree, child_id, sqrt_parent, c_puct);
            if score > best_score {
                best_score = score;
                best_id = child_id;
            }
        }

        if let Some(mv) = tree.nodes[best_id].move_action {
            board.place(mv, node.side)?;
        }
        current_id = best_id;
    }
}

/// Calculate PUCT value for a node
///
/// PUCT(s, a) = Q(s, a) + c_puct * P(s, a) * sqrt(N(s)) / (1 + N(s, a))
///
/// Where:
/// - Q(s, a) = W(s, a) / N(s, a) is the average action value (0 if unvisited)
/// - P(s, a) is the prior probability from the evaluator
/// - N(s) is parent visit count
/// - N(s, a) is child visit count
/// - c_puct is the exploration constant
pub(crate) fn puct_value(tree: &MctsTree, node_id: NodeId, sqrt_parent: f32, c_puct: f32) -> f32 {
    let node = &tree.nodes[node_id];

    // Q value (exploitation)
    let q = node.q_value();

    // U value (exploration)
    let u = c_puct * node.prior * sqrt_parent / (1.0 + node.visit_count as f32);

    q + u
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::MctsNode;
    use gomoku_core::{Move, Side};

    fn root_with_children(priors: &[f32]) -> MctsTree {
        let mut tree = MctsTree::new();
        tree.initialize_root(Side::Black);
        for (i, &prior) in priors.iter().enumerate() {
            let child = MctsNode::new_child(Move::new(0, i), Side::White, 0, prior);
            let id = tree.add_node(child);
            tree.nodes[0].children.push(id);
        }
        tree
    }

    #[test]
    fn test_puct_value_unvisited() {
        let mut tree = root_with_children(&[0.5]);
        tree.nodes[0].visit_count = 100;

        let sqrt_parent = (tree.nodes[0].visit_count as f32).sqrt();
        let puct = puct_value(&tree, 1, sqrt_parent, 1.5);

        // PUCT = 0 + 1.5 * 0.5 * sqrt(100) / (1 + 0) = 7.5
        assert!((puct - 7.5).abs() < 1e-5);
    }

    #[test]
    fn test_puct_value_visited() {
        let mut tree = root_with_children(&[0.5]);
        tree.nodes[0].visit_count = 100;
        tree.nodes[1].visit_count = 10;
        tree.nodes[1].value_sum = 5.0; // Q = 0.5

        let sqrt_parent = (tree.nodes[0].visit_count as f32).sqrt();
        let puct = puct_value(&tree, 1, sqrt_parent, 1.5);

        // Q = 0.5, U = 1.5 * 0.5 * 10 / 11 ≈ 0.682
        assert!((puct - 1.182).abs() < 0.01);
    }

    #[test]
    fn test_select_prefers_high_prior_and_plays_move() {
        let mut tree = root_with_children(&[0.1, 0.7, 0.2]);
        tree.nodes[0].visit_count = 1;
        let mut board = Board::new(5);

        let leaf = select(&tree, 0, 1.5, &mut board).unwrap();

        assert_eq!(leaf, 2);
        assert_eq!(board.get(Move::new(0, 1)), Some(Side::Black));
        assert_eq!(board.stone_count(), 1);
    }

    #[test]
    fn test_select_breaks_ties_by_first_child() {
        let mut tree = root_with_children(&[0.25, 0.25, 0.25]);
        tree.nodes[0].visit_count = 4;
        let mut board = Board::new(5);

        assert_eq!(select(&tree, 0, 1.5, &mut board).unwrap(), 1);
    }

    #[test]
    fn test_select_stops_at_unexpanded_root() {
        let mut tree = MctsTree::new();
        tree.initialize_root(Side::White);
        let mut board = Board::new(5);

        assert_eq!(select(&tree, 0, 1.5, &mut board).unwrap(), 0);
        assert_eq!(board.stone_count(), 0);
    }

    #[test]
    fn test_select_descends_with_alternating_sides() {
        let mut tree = root_with_children(&[1.0]);
        let grandchild = MctsNode::new_child(Move::new(2, 2), Side::Black, 1, 1.0);
        let gid = tree.add_node(grandchild);
        tree.nodes[1].children.push(gid);
        let mut board = Board::new(5);

        let leaf = select(&tree, 0, 1.5, &mut board).unwrap();

        assert_eq!(leaf, gid);
        assert_eq!(board.get(Move::new(0, 0)), Some(Side::Black));
        assert_eq!(board.get(Move::new(2, 2)), Some(Side::White));
    }
}
