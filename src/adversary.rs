//! Definitions for representations of network-level adversaries.

pub mod random_latency;

pub use random_latency::StrategyRandomLatency;

use std::fmt::Debug;

use dyn_clone::DynClone;

use crate::{
    block::{BlockId, Side, TimeMs},
    network::{LatencyMatrix, UNREACHABLE},
    node_view::NodeId,
};

/// Releases requested by [`AdversaryStrategy::adversary_strategy`] that could
/// not be covered by withheld blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Shortfall {
    /// The side whose backlog the missing blocks are owed to.
    pub side: Side,
    /// Number of releases that could not be made.
    pub blocks: usize,
}

/// The adversary's static split of the network into nodes it keeps on the
/// left side and nodes it keeps on the right side.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Partition {
    keep_left: Vec<NodeId>,
    keep_right: Vec<NodeId>,
    cross_partition_latency: Vec<TimeMs>,
}

impl Partition {
    /// Assigns even-numbered nodes to the left and odd-numbered nodes to the
    /// right. A node's cross partition latency is the shortest latency from
    /// any node of the opposite group to it.
    ///
    /// Returns an empty partition if `num_nodes < 2`.
    pub fn new(num_nodes: usize, all_pairs_distances: &LatencyMatrix) -> Self {
        if num_nodes < 2 {
            return Self::default();
        }

        let keep_left: Vec<NodeId> =
            (0..num_nodes).step_by(2).map(NodeId).collect();
        let keep_right: Vec<NodeId> =
            (1..num_nodes).step_by(2).map(NodeId).collect();

        let min_latency_from = |sources: &[NodeId], dest: usize| {
            sources
                .iter()
                .map(|source| all_pairs_distances[source.0][dest])
                .filter(|&latency| latency > UNREACHABLE)
                .min()
                .unwrap_or(0)
        };

        let mut cross_partition_latency = vec![0; num_nodes];
        for node in keep_left.iter() {
            cross_partition_latency[node.0] =
                min_latency_from(&keep_right, node.0);
        }
        for node in keep_right.iter() {
            cross_partition_latency[node.0] =
                min_latency_from(&keep_left, node.0);
        }

        Partition {
            keep_left,
            keep_right,
            cross_partition_latency,
        }
    }

    /// Nodes the adversary keeps mining on `side`.
    #[inline]
    pub fn nodes(&self, side: Side) -> &[NodeId] {
        match side {
            Side::Left => &self.keep_left,
            Side::Right => &self.keep_right,
        }
    }

    #[inline]
    pub fn keep_left(&self) -> &[NodeId] {
        &self.keep_left
    }

    #[inline]
    pub fn keep_right(&self) -> &[NodeId] {
        &self.keep_right
    }

    /// Extra delay for a block pushed to `node` from the opposite group.
    ///
    /// ## Panics
    /// Panics if `node` is not part of this partition.
    #[inline]
    pub fn cross_partition_latency(&self, node: NodeId) -> TimeMs {
        self.cross_partition_latency[node.0]
    }

    pub fn is_empty(&self) -> bool {
        self.keep_left.is_empty() && self.keep_right.is_empty()
    }
}

/// An adversary which controls when the blocks it mines reach the network.
///
/// The simulation engine calls [`AdversaryStrategy::setup_network`] once
/// after the topology is built, then [`AdversaryStrategy::start_attack`],
/// before any other trait methods.
pub trait AdversaryStrategy: Debug + DynClone + Send + Sync {
    /// Partitions the network and sizes per-node bookkeeping for
    /// `num_nodes` participants.
    fn setup_network(
        &mut self,
        num_nodes: usize,
        all_pairs_distances: &LatencyMatrix,
    );

    /// The partition computed by [`AdversaryStrategy::setup_network`].
    fn partition(&self) -> &Partition;

    /// Seeds the adversary's bookkeeping before any block is mined.
    fn start_attack(&mut self);

    /// Withholds a block the adversary mined on `side` at `time_ms`.
    fn adversary_mined(&mut self, side: Side, block_id: BlockId, time_ms: TimeMs);

    /// The side the adversary should mine its next block on.
    fn adversary_side_to_mine(&self) -> Side;

    /// Records that `peer` has received `block_id` on `side`.
    fn receive_block_from_peer(
        &mut self,
        side: Side,
        block_id: BlockId,
        peer: NodeId,
    );

    /// Decides which withheld blocks to release now. Released blocks are
    /// appended to `blocks_to_send` (caller-owned, mutated in place); the
    /// returned [`Shortfall`] counts releases that had no block to send.
    fn adversary_strategy(
        &mut self,
        time_ms: TimeMs,
        blocks_to_send: &mut Vec<(Side, BlockId)>,
    ) -> Shortfall;

    /// Running total of releases which could not be covered by withheld
    /// blocks.
    fn total_borrowed_blocks(&self) -> usize;

    /// Number of blocks currently withheld on both sides.
    fn withheld_blocks(&self) -> usize;

    /// Returns the name of the adversary's strategy.
    fn name(&self) -> String {
        "Name not set".into()
    }
}

dyn_clone::clone_trait_object!(AdversaryStrategy);
