//! Per-participant fork-choice state.

use std::{collections::HashSet, fmt::Display};

use crate::block::{BlockId, Side};

/// Index of an honest participant in the network.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy)]
pub struct NodeId(pub usize);

impl From<usize> for NodeId {
    fn from(value: usize) -> Self {
        NodeId(value)
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whose knowledge a [`NodeLocalView`] represents.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy)]
pub enum ViewOwner {
    /// An honest participant, or the adversary's mirror of one.
    Node(NodeId),
    /// The adversary's aggregate view of everything it has observed.
    Adversary,
}

/// What a single participant knows about the two competing subtrees.
///
/// The view favors [`Side::Left`] whenever the left subtree is at least as
/// heavy as the right one, so an empty view favors the left side.
#[derive(Debug, Clone)]
pub struct NodeLocalView {
    owner: ViewOwner,
    side: Side,
    left_subtree_weight: i64,
    right_subtree_weight: i64,
    received: HashSet<BlockId>,
}

impl NodeLocalView {
    pub fn new(owner: ViewOwner) -> Self {
        let mut view = NodeLocalView {
            owner,
            side: Side::Left,
            left_subtree_weight: 0,
            right_subtree_weight: 0,
            received: HashSet::new(),
        };
        view.update_side();

        view
    }

    /// Records `block_id` on `side`. Returns false, leaving the view
    /// untouched, if the block was already delivered.
    pub fn deliver_block(&mut self, block_id: BlockId, side: Side) -> bool {
        if !self.received.insert(block_id) {
            return false;
        }

        match side {
            Side::Left => self.left_subtree_weight += 1,
            Side::Right => self.right_subtree_weight += 1,
        }
        self.update_side();

        true
    }

    #[inline]
    pub fn owner(&self) -> ViewOwner {
        self.owner
    }

    /// The side this view currently mines on.
    #[inline]
    pub fn side(&self) -> Side {
        self.side
    }

    #[inline]
    pub fn blocks_received(&self) -> usize {
        self.received.len()
    }

    #[inline]
    pub fn has_received(&self, block_id: BlockId) -> bool {
        self.received.contains(&block_id)
    }

    #[inline]
    pub fn subtree_weight(&self, side: Side) -> i64 {
        match side {
            Side::Left => self.left_subtree_weight,
            Side::Right => self.right_subtree_weight,
        }
    }

    /// Left subtree weight minus right subtree weight.
    #[inline]
    pub fn weight_diff(&self) -> i64 {
        self.left_subtree_weight - self.right_subtree_weight
    }

    fn update_side(&mut self) {
        self.side = if self.left_subtree_weight >= self.right_subtree_weight {
            Side::Left
        } else {
            Side::Right
        };
    }
}
