//! Balance attack for networks with random peer latencies.

use std::collections::VecDeque;

use tracing::trace;

use crate::{
    block::{BlockId, Side, TimeMs},
    network::LatencyMatrix,
    node_view::{NodeId, NodeLocalView, ViewOwner},
};

use super::{AdversaryStrategy, Partition, Shortfall};

/// Computes the number of extra blocks to release on top of the estimated
/// need, given the adversary's current state.
pub type ExtraSendFn = fn(&StrategyRandomLatency) -> i64;

/// Keeps both sides of the fork competitive by mining on whichever side is
/// behind and releasing withheld blocks towards the side the network is
/// drifting away from.
///
/// The adversary mirrors what it believes every honest node has received,
/// and estimates how far each half of its partition leans by averaging the
/// weight differences of the nodes in that half.
#[derive(Debug, Clone)]
pub struct StrategyRandomLatency {
    partition: Partition,
    /// Everything the adversary has observed or released.
    adv_view: NodeLocalView,
    left_withheld_blocks: VecDeque<(TimeMs, BlockId)>,
    right_withheld_blocks: VecDeque<(TimeMs, BlockId)>,
    left_borrowed_blocks: usize,
    right_borrowed_blocks: usize,
    honest_node_views: Vec<NodeLocalView>,
    extra_send: ExtraSendFn,
}

impl StrategyRandomLatency {
    pub fn new() -> Self {
        Self::with_extra_send(extra_send_calc)
    }

    pub fn with_extra_send(extra_send: ExtraSendFn) -> Self {
        StrategyRandomLatency {
            partition: Partition::default(),
            adv_view: NodeLocalView::new(ViewOwner::Adversary),
            left_withheld_blocks: VecDeque::new(),
            right_withheld_blocks: VecDeque::new(),
            left_borrowed_blocks: 0,
            right_borrowed_blocks: 0,
            honest_node_views: vec![],
            extra_send,
        }
    }

    /// The adversary's aggregate view of both subtrees.
    #[inline]
    pub fn adversary_view(&self) -> &NodeLocalView {
        &self.adv_view
    }

    /// What the adversary believes `node` has received.
    #[inline]
    pub fn honest_node_view(&self, node: NodeId) -> &NodeLocalView {
        &self.honest_node_views[node.0]
    }

    /// Withheld `(time mined, block)` pairs on `side`, oldest first.
    #[inline]
    pub fn withheld(&self, side: Side) -> &VecDeque<(TimeMs, BlockId)> {
        match side {
            Side::Left => &self.left_withheld_blocks,
            Side::Right => &self.right_withheld_blocks,
        }
    }

    /// Releases accumulated on `side` that could not be covered.
    #[inline]
    pub fn borrowed_blocks(&self, side: Side) -> usize {
        match side {
            Side::Left => self.left_borrowed_blocks,
            Side::Right => self.right_borrowed_blocks,
        }
    }

    fn withheld_mut(&mut self, side: Side) -> &mut VecDeque<(TimeMs, BlockId)> {
        match side {
            Side::Left => &mut self.left_withheld_blocks,
            Side::Right => &mut self.right_withheld_blocks,
        }
    }

    /// Mean weight difference of the mirrored views of `nodes`, or 0 if
    /// `nodes` is empty.
    fn average_weight_diff(&self, nodes: &[NodeId]) -> f64 {
        if nodes.is_empty() {
            return 0.0;
        }

        let total: i64 = nodes
            .iter()
            .map(|node| self.honest_node_views[node.0].weight_diff())
            .sum();

        total as f64 / nodes.len() as f64
    }

    /// Moves the oldest withheld block on `side` into `blocks_to_send`.
    /// Returns false if nothing is withheld on `side`.
    fn pop_withheld_block(
        &mut self,
        side: Side,
        blocks_to_send: &mut Vec<(Side, BlockId)>,
    ) -> bool {
        match self.withheld_mut(side).pop_front() {
            Some((_, block_id)) => {
                self.adv_view.deliver_block(block_id, side);
                blocks_to_send.push((side, block_id));

                true
            }
            None => false,
        }
    }
}

impl Default for StrategyRandomLatency {
    fn default() -> Self {
        Self::new()
    }
}

/// Number of loop iterations needed to release `count` blocks, where a
/// fractional count rounds up.
#[inline]
fn release_count(count: f64) -> usize {
    if count > 0.0 {
        count.ceil() as usize
    } else {
        0
    }
}

impl AdversaryStrategy for StrategyRandomLatency {
    fn name(&self) -> String {
        "Random Latency Balance".into()
    }

    fn setup_network(
        &mut self,
        num_nodes: usize,
        all_pairs_distances: &LatencyMatrix,
    ) {
        self.honest_node_views = (0..num_nodes)
            .map(|node| NodeLocalView::new(ViewOwner::Node(NodeId(node))))
            .collect();
        self.partition = Partition::new(num_nodes, all_pairs_distances);
    }

    #[inline]
    fn partition(&self) -> &Partition {
        &self.partition
    }

    fn start_attack(&mut self) {
        let keep_right = self.partition.keep_right().to_vec();
        for peer in keep_right {
            self.receive_block_from_peer(Side::Right, BlockId::GENESIS, peer);
        }
    }

    fn adversary_mined(&mut self, side: Side, block_id: BlockId, time_ms: TimeMs) {
        self.withheld_mut(side).push_back((time_ms, block_id));
    }

    fn adversary_side_to_mine(&self) -> Side {
        let left = self.left_withheld_blocks.len() as i64
            + self.adv_view.subtree_weight(Side::Left);
        let right = self.right_withheld_blocks.len() as i64
            + self.adv_view.subtree_weight(Side::Right);

        if left < right {
            Side::Left
        } else {
            Side::Right
        }
    }

    fn receive_block_from_peer(
        &mut self,
        side: Side,
        block_id: BlockId,
        peer: NodeId,
    ) {
        self.honest_node_views[peer.0].deliver_block(block_id, side);
        self.adv_view.deliver_block(block_id, side);
    }

    fn adversary_strategy(
        &mut self,
        time_ms: TimeMs,
        blocks_to_send: &mut Vec<(Side, BlockId)>,
    ) -> Shortfall {
        let extra_send = (self.extra_send)(self) as f64;
        let left_diff = self.average_weight_diff(self.partition.keep_left());
        let right_diff = self.average_weight_diff(self.partition.keep_right());

        let mut left_send_count = -left_diff + extra_send;
        let mut right_send_count = right_diff + 1.0 + extra_send;
        match self.adv_view.side() {
            Side::Left => left_send_count = 0.0,
            Side::Right => right_send_count = 0.0,
        }
        trace!(time_ms, left_send_count, right_send_count, "release decision");

        let mut blocks_to_borrow = 0;
        for _ in 0..release_count(left_send_count) {
            if !self.pop_withheld_block(Side::Left, blocks_to_send) {
                blocks_to_borrow += 1;
            }
        }
        for _ in 0..release_count(right_send_count) {
            if !self.pop_withheld_block(Side::Right, blocks_to_send) {
                blocks_to_borrow += 1;
            }
        }

        if left_send_count > 0.0 {
            self.left_borrowed_blocks += blocks_to_borrow;
            Shortfall {
                side: Side::Left,
                blocks: blocks_to_borrow,
            }
        } else {
            self.right_borrowed_blocks += blocks_to_borrow;
            Shortfall {
                side: Side::Right,
                blocks: blocks_to_borrow,
            }
        }
    }

    #[inline]
    fn total_borrowed_blocks(&self) -> usize {
        self.left_borrowed_blocks + self.right_borrowed_blocks
    }

    #[inline]
    fn withheld_blocks(&self) -> usize {
        self.left_withheld_blocks.len() + self.right_withheld_blocks.len()
    }
}

/// Releases more aggressively the further the adversary's global view is
/// from flipping sides.
///
/// Ties favor the left side, so a left lead of `d` needs `d + 1` right
/// blocks to flip while a right lead of `d` needs only `d` left blocks.
/// Returns `-1` when fewer than 3 blocks would flip the global view, `0` at
/// exactly 3 and `1` beyond that.
pub fn extra_send_calc(strategy: &StrategyRandomLatency) -> i64 {
    let diff = strategy.adv_view.weight_diff();
    let distance_to_flip = if diff < 0 { -diff } else { diff + 1 };

    match distance_to_flip {
        d if d < 3 => -1,
        3 => 0,
        _ => 1,
    }
}

#[cfg(test)]
mod tests {
    use super::{extra_send_calc, StrategyRandomLatency};
    use crate::{
        adversary::AdversaryStrategy,
        block::{BlockId, Side},
        network::compute_apsp,
        node_view::NodeId,
    };

    /// Fully connected network with 10ms edges, already set up.
    fn strategy(num_nodes: usize) -> StrategyRandomLatency {
        let mut edge_map = vec![vec![10; num_nodes]; num_nodes];
        for (i, row) in edge_map.iter_mut().enumerate() {
            row[i] = -1;
        }

        let mut strategy = StrategyRandomLatency::new();
        strategy.setup_network(num_nodes, &compute_apsp(&edge_map));
        strategy
    }

    #[test]
    fn start_attack_mirrors_genesis_on_right_nodes() {
        let mut s = strategy(4);
        s.start_attack();

        for node in [1, 3] {
            let view = s.honest_node_view(NodeId(node));
            assert!(view.has_received(BlockId::GENESIS));
            assert_eq!(view.side(), Side::Right);
        }
        for node in [0, 2] {
            assert_eq!(s.honest_node_view(NodeId(node)).blocks_received(), 0);
        }

        // The aggregate view deduplicates the genesis block.
        assert_eq!(s.adversary_view().subtree_weight(Side::Right), 1);
        assert_eq!(s.adversary_view().side(), Side::Right);
    }

    #[test]
    fn mined_blocks_are_withheld_in_order() {
        let mut s = strategy(2);
        s.adversary_mined(Side::Left, BlockId(3), 100);
        s.adversary_mined(Side::Left, BlockId(5), 200);
        s.adversary_mined(Side::Right, BlockId(4), 150);

        let left: Vec<_> = s.withheld(Side::Left).iter().copied().collect();
        assert_eq!(left, vec![(100, BlockId(3)), (200, BlockId(5))]);
        assert_eq!(s.withheld_blocks(), 3);
        assert_eq!(s.adversary_view().blocks_received(), 0);
    }

    #[test]
    fn side_to_mine_is_the_lighter_side() {
        let mut s = strategy(2);
        // Equal potential weight goes to the right side.
        assert_eq!(s.adversary_side_to_mine(), Side::Right);

        s.adversary_mined(Side::Right, BlockId(1), 0);
        assert_eq!(s.adversary_side_to_mine(), Side::Left);

        s.receive_block_from_peer(Side::Left, BlockId(2), NodeId(0));
        assert_eq!(s.adversary_side_to_mine(), Side::Right);

        s.adversary_mined(Side::Left, BlockId(3), 0);
        assert_eq!(s.adversary_side_to_mine(), Side::Right);
    }

    #[test]
    fn extra_send_grows_with_global_imbalance() {
        let mut s = strategy(2);
        // diff 0 is one block from flipping.
        assert_eq!(extra_send_calc(&s), -1);

        s.receive_block_from_peer(Side::Left, BlockId(1), NodeId(0));
        assert_eq!(extra_send_calc(&s), -1);
        s.receive_block_from_peer(Side::Left, BlockId(2), NodeId(0));
        assert_eq!(extra_send_calc(&s), 0);
        s.receive_block_from_peer(Side::Left, BlockId(3), NodeId(0));
        assert_eq!(extra_send_calc(&s), 1);

        let mut s = strategy(2);
        for id in 1..=3 {
            s.receive_block_from_peer(Side::Right, BlockId(id), NodeId(1));
        }
        assert_eq!(extra_send_calc(&s), 0);
    }

    #[test]
    fn releases_toward_the_unfavored_side() {
        let mut s = strategy(2);
        s.start_attack();
        // Adversary view favors right (0 vs 1), so only left blocks are sent.
        s.adversary_mined(Side::Left, BlockId(1), 0);
        s.adversary_mined(Side::Right, BlockId(2), 0);

        // Node 0 (kept left) is mirrored with a right lead of 3.
        for id in 10..13 {
            s.receive_block_from_peer(Side::Right, BlockId(id), NodeId(0));
        }
        // Global diff is -4, so extra_send is 1: left count = 3 + 1 = 4.
        let mut sent = vec![];
        let shortfall = s.adversary_strategy(1000, &mut sent);

        assert_eq!(sent, vec![(Side::Left, BlockId(1))]);
        assert_eq!(shortfall.side, Side::Left);
        assert_eq!(shortfall.blocks, 3);
        assert_eq!(s.withheld(Side::Right).len(), 1);
        assert!(s.adversary_view().has_received(BlockId(1)));
        assert_eq!(s.borrowed_blocks(Side::Left), 3);
        assert_eq!(s.total_borrowed_blocks(), 3);
    }

    #[test]
    fn no_release_when_estimate_is_not_positive() {
        let mut s = strategy(2);
        s.start_attack();
        s.adversary_mined(Side::Left, BlockId(1), 0);

        // Left count = -0 + (-1) < 0.
        let mut sent = vec![];
        let shortfall = s.adversary_strategy(0, &mut sent);

        assert!(sent.is_empty());
        assert_eq!(shortfall.blocks, 0);
        assert_eq!(shortfall.side, Side::Right);
        assert_eq!(s.withheld_blocks(), 1);
    }

    #[test]
    fn borrowed_total_is_cumulative_shortfall() {
        let mut s = strategy(2);
        // Adversary view is empty and favors left: right count is
        // right_diff + 1 + extra_send = 0 + 1 - 1 = 0 at first.
        let mut total = 0;
        let mut sent = vec![];
        for id in 1..20 {
            s.receive_block_from_peer(Side::Left, BlockId(id), NodeId(0));
            let shortfall = s.adversary_strategy(id, &mut sent);
            total += shortfall.blocks;
            assert_eq!(s.total_borrowed_blocks(), total);
        }
        assert!(total > 0);
        assert!(sent.is_empty());
    }
}
