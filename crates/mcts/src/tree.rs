use gomoku_core::{Move, Side};

use crate::error::{MctsError, Result};

/// Node ID in the arena-style tree
pub type NodeId = usize;

/// A single node in the MCTS tree
#[derive(Debug, Clone)]
pub struct MctsNode {
    /// Move that led to this node (None for root)
    pub move_action: Option<Move>,

    /// Side to move at this node
    pub side: Side,

    /// Parent node ID, used only for backup
    pub parent: Option<NodeId>,

    /// Child node IDs, one per distinct move
    pub children: Vec<NodeId>,

    /// Number of times this node has been visited
    pub visit_count: u32,

    /// Sum of values backed up through this node
    pub value_sum: f32,

    /// Prior probability from the evaluator
    pub prior: f32,
}

impl MctsNode {
    /// Create a new root node
    pub fn new_root(side: Side) -> Self {
        Self {
            move_action: None,
            side,
            parent: None,
            children: Vec::new(),
            visit_count: 0,
            value_sum: 0.0,
            prior: 1.0,
        }
    }

    /// Create a new child node; `side` is the side to move after `move_action`
    pub fn new_child(move_action: Move, side: Side, parent: NodeId, prior: f32) -> Self {
        Self {
            move_action: Some(move_action),
            side,
            parent: Some(parent),
            children: Vec::new(),
            visit_count: 0,
            value_sum: 0.0,
            prior,
        }
    }

    /// Get Q-value (average value)
    pub fn q_value(&self) -> f32 {
        if self.visit_count == 0 {
            0.0
        } else {
            self.value_sum / self.visit_count as f32
        }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// MCTS tree using arena allocation
#[derive(Debug, Default)]
pub struct MctsTree {
    /// Arena of all nodes
    pub nodes: Vec<MctsNode>,

    /// Root node ID (usually 0)
    pub root_id: NodeId,
}

impl MctsTree {
    /// Create a new empty tree
    pub fn new() -> Self {
        Self {
            nodes: Vec::with_capacity(10000),
            root_id: 0,
        }
    }

    /// Initialize the tree with a root node for `side`
    pub fn initialize_root(&mut self, side: Side) -> NodeId {
        self.nodes.clear();
        self.nodes.push(MctsNode::new_root(side));
        self.root_id = 0;
        self.root_id
    }

    /// Add a new node and return its ID
    pub fn add_node(&mut self, node: MctsNode) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(node);
        id
    }

    /// Checked access to a node
    pub fn node(&self, id: NodeId) -> Result<&MctsNode> {
        self.nodes.get(id).ok_or(MctsError::InvalidNodeId(id))
    }

    /// Get the number of nodes in the tree
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    /// Clear the tree
    pub fn clear(&mut self) {
        self.nodes.clear();
    }
}
