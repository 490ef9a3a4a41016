use crate::tree::{MctsTree, NodeId};

/// Backup value from leaf to root
///
/// `value` is added to the leaf as given. In zero-sum games the value must be
/// negated when moving to the parent because consecutive nodes belong to
/// opposing sides.
pub fn backup(tree: &mut MctsTree, leaf_id: NodeId, value: f32) {
    let mut current_value = value;
    let mut current_id = Some(leaf_id);

    while let Some(node_id) = current_id {
        let node = &mut tree.nodes[node_id];

        node.visit_count += 1;
        node.value_sum += current_value;

        current_id = node.parent;
        current_value = -current_value;
    }
}
