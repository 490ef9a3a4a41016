use rand::Rng;
use rand_distr::{Dirichlet, Distribution};

use crate::error::{MctsError, Result};
use crate::tree::{MctsTree, NodeId};

/// Add Dirichlet noise to root node priors for exploration
///
/// The noise is mixed with the original prior: P' = (1-ε)*P + ε*noise
///
/// Only applied to root node, not to other nodes in the tree.
pub fn add_dirichlet_noise_to_root<R: Rng + ?Sized>(
    tree: &mut MctsTree,
    root_id: NodeId,
    alpha: f32,
    epsilon: f32,
    rng: &mut R,
) -> Result<()> {
    if tree.nodes.is_empty() {
        return Err(MctsError::RootNotInitialized);
    }

    let children = tree.node(root_id)?.children.clone();
    let n = children.len();
    if n < 2 {
        // Dirichlet needs at least two categories; a single child keeps its prior
        return Ok(());
    }

    let alpha_vec = vec![alpha as f64; n];
    let dirichlet =
        Dirichlet::new(&alpha_vec).map_err(|e| MctsError::DirichletError(e.to_string()))?;

    let noise: Vec<f32> = dirichlet.sample(rng).iter().map(|&x| x as f32).collect();

    for (&child_id, &eta) in children.iter().zip(noise.iter()) {
        let child = &mut tree.nodes[child_id];
        child.prior = (1.0 - epsilon) * child.prior + epsilon * eta;
    }

    Ok(())
}
