use gomoku_core::{Board, Move};

use crate::config::MctsConfig;
use crate::error::Result;
use crate::evaluation::{classify_leaf, legal_moves, legal_priors, Evaluator, LeafOutcome};
use crate::tree::{MctsNode, MctsTree, NodeId};

/// Evaluate the position at `leaf_id` and expand it when it is not terminal.
///
/// `board` must reflect the path from the root to the leaf. Returns the value
/// from the perspective of the side to move at the leaf, together with the
/// terminal classification.
pub fn expand_and_evaluate<E: Evaluator + ?Sized>(
    tree: &mut MctsTree,
    leaf_id: NodeId,
    board: &Board,
    evaluator: &E,
    config: &MctsConfig,
) -> Result<(f32, LeafOutcome)> {
    let leaf = tree.node(leaf_id)?;
    let side = leaf.side;
    let last = leaf.move_action.map(|mv| (mv, side.opponent()));

    let legal = legal_moves(board, config);
    let outcome = classify_leaf(board, last, &legal);
    if let Some(value) = outcome.value_for(side) {
        return Ok((value, outcome));
    }

    let evaluation = evaluator.evaluate(board, side)?;
    let priors = legal_priors(&evaluation.policy, &legal, board.size())?;
    expand(tree, leaf_id, &priors);

    Ok((evaluation.value.clamp(-1.0, 1.0), outcome))
}

/// Create one child per `(move, prior)` pair. Moves must be distinct.
pub fn expand(tree: &mut MctsTree, node_id: NodeId, priors: &[(Move, f32)]) {
    let child_side = tree.nodes[node_id].side.opponent();
    for &(mv, prior) in priors {
        let child = MctsNode::new_child(mv, child_side, node_id, prior);
        let child_id = tree.add_node(child);
        tree.nodes[node_id].children.push(child_id);
    }
}
