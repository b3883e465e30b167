//! Running balance attack simulations

use std::num::NonZeroUsize;

use rand::{rngs::StdRng, Rng, SeedableRng};
use rand_distr::{Distribution, Exp, ExpError};
#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{debug, info};

use crate::{
    adversary::{AdversaryStrategy, StrategyRandomLatency},
    block::{BlockId, Side, TimeMs},
    network::NetworkGraph,
    node_view::{NodeId, NodeLocalView, ViewOwner},
    results::ResultsBuilder,
};

pub mod builder;
pub mod environment;
pub mod event;

pub use builder::{SimulationBuildError, SimulationGroupBuilder};
pub use environment::{EnvironmentBuilder, EnvironmentError, TestEnvironment};
pub use event::{Event, EventQueue};

/// How long all honest nodes must keep agreeing on a side before the fork
/// counts as resolved.
pub const CONVERGE_TIME_MS_CRITERIA: TimeMs = 50_000;

/// Time of the first convergence check.
pub const FIRST_CHECK_MERGE_MS: TimeMs = 10;

/// Interval between convergence checks.
pub const CHECK_MERGE_INTERVAL_MS: TimeMs = 50;

#[derive(Debug, thiserror::Error)]
pub enum SimulationError {
    #[error("invalid test environment")]
    EnvironmentError(#[from] EnvironmentError),
    #[error("could not create the block interval distribution")]
    MiningDistributionError(#[from] ExpError),
    #[error("network graph has no nodes")]
    EmptyNetwork,
}

/// Contains the output data from a single simulation run.
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    pub env: TestEnvironment,
    /// Name of the adversary's strategy.
    pub strategy: String,
    /// Simulated time until the fork was resolved, or the termination time
    /// if it never was.
    pub fork_duration: TimeMs,
    /// The side all honest nodes settled on, if they did.
    pub converged_side: Option<Side>,
    /// Blocks mined by honest nodes and the adversary together.
    pub blocks_mined: usize,
    pub adversary_blocks_mined: usize,
    /// Mined adversary blocks which were released to the network.
    pub released_blocks: usize,
    /// Adversary blocks still withheld when the run ended.
    pub withheld_blocks: usize,
    /// Releases the adversary wanted but had no block for.
    pub borrowed_blocks: usize,
    pub diameter: TimeMs,
}

impl SimulationOutput {
    #[inline]
    pub fn converged(&self) -> bool {
        self.converged_side.is_some()
    }
}

/// A single run of the balance attack: honest nodes mining on a random
/// network while an adversary times the release of its own blocks.
///
/// # Details
/// Time advances by popping events from an [`EventQueue`]. A run ends once
/// every honest node has favored the same side for longer than
/// [`CONVERGE_TIME_MS_CRITERIA`], or when the termination time of its
/// [`TestEnvironment`] is reached.
#[derive(Debug, Clone)]
pub struct Simulator {
    env: TestEnvironment,
    adversary: Box<dyn AdversaryStrategy>,
    event_queue: EventQueue,
    nodes: Vec<NodeLocalView>,
    network_graph: NetworkGraph,
    nodes_converge: Option<(TimeMs, Side)>,

    // Counters reported in the SimulationOutput
    blocks_mined: usize,
    adversary_blocks_mined: usize,
    released_blocks: usize,
}

impl Simulator {
    /// Builds a simulator running [`StrategyRandomLatency`] on a random
    /// network described by `env`.
    pub fn new<R: Rng + ?Sized>(
        env: TestEnvironment,
        rng: &mut R,
    ) -> Result<Self, SimulationError> {
        Self::with_strategy(env, Box::new(StrategyRandomLatency::new()), rng)
    }

    /// Builds a simulator running `adversary` on a random network described
    /// by `env`.
    pub fn with_strategy<R: Rng + ?Sized>(
        env: TestEnvironment,
        adversary: Box<dyn AdversaryStrategy>,
        rng: &mut R,
    ) -> Result<Self, SimulationError> {
        env.validate()?;
        let network_graph = NetworkGraph::make_graph(rng, &env);

        Self::with_network(env, network_graph, adversary)
    }

    /// Builds a simulator on a given network. The graph's node count takes
    /// precedence over the graph parameters of `env`.
    ///
    /// Fails with [`SimulationError::EmptyNetwork`] if `network_graph` has no
    /// nodes.
    pub fn with_network(
        env: TestEnvironment,
        network_graph: NetworkGraph,
        adversary: Box<dyn AdversaryStrategy>,
    ) -> Result<Self, SimulationError> {
        env.validate()?;
        if network_graph.num_nodes() == 0 {
            return Err(SimulationError::EmptyNetwork);
        }

        let mut sim = Simulator {
            env,
            adversary,
            event_queue: EventQueue::new(),
            nodes: vec![],
            network_graph,
            nodes_converge: None,
            blocks_mined: 0,
            adversary_blocks_mined: 0,
            released_blocks: 0,
        };
        sim.setup_chain();
        sim.setup_network();

        Ok(sim)
    }

    #[inline]
    pub fn env(&self) -> &TestEnvironment {
        &self.env
    }

    #[inline]
    pub fn network_graph(&self) -> &NetworkGraph {
        &self.network_graph
    }

    #[inline]
    pub fn adversary(&self) -> &dyn AdversaryStrategy {
        self.adversary.as_ref()
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.network_graph.num_nodes()
    }

    /// Executes the configured simulation.
    pub fn simulate<R: Rng + ?Sized>(
        mut self,
        rng: &mut R,
    ) -> Result<SimulationOutput, SimulationError> {
        let (fork_duration, converged_side) = self.run_test(rng)?;

        Ok(SimulationOutput {
            strategy: self.adversary.name(),
            fork_duration,
            converged_side,
            blocks_mined: self.blocks_mined,
            adversary_blocks_mined: self.adversary_blocks_mined,
            released_blocks: self.released_blocks,
            withheld_blocks: self.adversary.withheld_blocks(),
            borrowed_blocks: self.adversary.total_borrowed_blocks(),
            diameter: self.network_graph.diameter(),
            env: self.env,
        })
    }

    fn setup_chain(&mut self) {
        self.nodes = (0..self.num_nodes())
            .map(|node| NodeLocalView::new(ViewOwner::Node(NodeId(node))))
            .collect();
    }

    fn setup_network(&mut self) {
        debug!("adversary to set up network partition");
        self.adversary.setup_network(
            self.network_graph.num_nodes(),
            self.network_graph.all_pairs_distances(),
        );
    }

    /// Runs the event loop until the fork is resolved or time runs out.
    /// Returns the elapsed time and, if the fork was resolved, the winning
    /// side.
    fn run_test<R: Rng + ?Sized>(
        &mut self,
        rng: &mut R,
    ) -> Result<(TimeMs, Option<Side>), SimulationError> {
        let termination_time_ms = self.env.termination_time_ms;
        let one_way_latency_ms = self.env.one_way_latency_ms;

        // Initialize the target's GHOST tree.
        let keep_right = self.adversary.partition().keep_right().to_vec();
        for node in keep_right {
            self.nodes[node.0].deliver_block(BlockId::GENESIS, Side::Right);
            self.honest_node_broadcast_block(
                0,
                node,
                Side::Right,
                BlockId::GENESIS,
            );
        }

        self.adversary.start_attack();

        let mining_time_dist = Exp::new(1.0 / self.env.average_block_period_ms)?;
        let mut next_block = 1;
        let mut now: TimeMs = 0;
        self.event_queue.push(now, Event::MineBlock);
        self.event_queue.push(FIRST_CHECK_MERGE_MS, Event::CheckMerge);

        loop {
            let event = match self.event_queue.pop() {
                Some((time_ms, event)) => {
                    now = time_ms;
                    event
                }
                None => Event::QueueEmpty,
            };
            if now >= termination_time_ms {
                info!(termination_time_ms, "simulation reached termination time");
                return Ok((termination_time_ms, None));
            }

            match event {
                Event::MineBlock => {
                    let time_to_next_block =
                        mining_time_dist.sample(rng) as TimeMs;
                    self.event_queue
                        .push(now + time_to_next_block, Event::MineBlock);

                    let block = BlockId(next_block);
                    next_block += 1;
                    self.blocks_mined += 1;

                    if rng.gen::<f64>() < self.env.evil_rate {
                        let side = self.adversary.adversary_side_to_mine();
                        debug!(%block, %side, now, "mined by adversary");

                        self.adversary.adversary_mined(side, block, now);
                        self.adversary_blocks_mined += 1;
                    } else {
                        let miner = NodeId(rng.gen_range(0..self.num_nodes()));
                        let side = self.nodes[miner.0].side();
                        debug!(%block, %side, %miner, now, "mined by node");

                        // Update miner and attacker's view.
                        self.nodes[miner.0].deliver_block(block, side);
                        self.honest_node_broadcast_block(now, miner, side, block);
                        self.event_queue.push(
                            now + one_way_latency_ms,
                            Event::AdvReceivedBlock {
                                side,
                                block,
                                peer: miner,
                            },
                        );
                    }
                }
                Event::BlockDeliver { peer, side, block } => {
                    // Each peer forwards new blocks to the adversary.
                    if self.nodes[peer.0].deliver_block(block, side) {
                        self.event_queue.push(
                            now + one_way_latency_ms,
                            Event::AdvReceivedBlock { side, block, peer },
                        );
                    }
                }
                Event::AdvReceivedBlock { side, block, peer } => {
                    self.adversary.receive_block_from_peer(side, block, peer);
                    self.adversary_release_blocks(now);
                }
                Event::CheckMerge => {
                    if let Some(side) = self.is_chain_merged(now) {
                        info!(now, %side, "chain merged");
                        return Ok((now, Some(side)));
                    }

                    self.event_queue
                        .push(now + CHECK_MERGE_INTERVAL_MS, Event::CheckMerge);
                }
                Event::QueueEmpty => {
                    if self.event_queue.is_empty() {
                        info!(now, "event queue drained");
                        return Ok((termination_time_ms, None));
                    }
                }
            }
        }
    }

    /// Runs the adversary's release decision and schedules delivery of every
    /// released block.
    fn adversary_release_blocks(&mut self, now: TimeMs) {
        let mut blocks_to_send = vec![];
        let shortfall =
            self.adversary.adversary_strategy(now, &mut blocks_to_send);

        if self.env.debug_allow_borrow && shortfall.blocks > 0 {
            // Borrowed blocks get negative ids below every id handed out so
            // far.
            let total_borrowed = self.adversary.total_borrowed_blocks() as i64;
            for i in (1..=shortfall.blocks as i64).rev() {
                let block = BlockId(i - 1 - total_borrowed);
                self.adversary.adversary_mined(shortfall.side, block, now);
            }
            self.adversary.adversary_strategy(now, &mut blocks_to_send);
        }

        let time_delivery = now + self.env.one_way_latency_ms;
        let partition = self.adversary.partition();
        for (side, block) in blocks_to_send {
            debug!(now, %block, %side, "adversary sends block");
            if !block.is_synthetic() {
                self.released_blocks += 1;
            }

            for &peer in partition.nodes(side) {
                self.event_queue.push(
                    time_delivery,
                    Event::BlockDeliver { peer, side, block },
                );
            }
            for &peer in partition.nodes(side.other()) {
                self.event_queue.push(
                    time_delivery + partition.cross_partition_latency(peer),
                    Event::BlockDeliver { peer, side, block },
                );
            }
        }
    }

    /// Schedules delivery of `block` from `node` to every other node.
    fn honest_node_broadcast_block(
        &mut self,
        time_ms: TimeMs,
        node: NodeId,
        side: Side,
        block: BlockId,
    ) {
        let peer_distances = self.network_graph.connectivity(node);
        for (peer, &latency_ms) in peer_distances.iter().enumerate() {
            if peer == node.0 {
                continue;
            }

            self.event_queue.push(
                time_ms + latency_ms,
                Event::BlockDeliver {
                    peer: NodeId(peer),
                    side,
                    block,
                },
            );
        }
    }

    /// Returns the agreed side once all honest nodes have favored it for
    /// longer than [`CONVERGE_TIME_MS_CRITERIA`]. Any disagreement resets
    /// the clock.
    fn is_chain_merged(&mut self, now: TimeMs) -> Option<Side> {
        let side = self.nodes.first()?.side();
        if self.nodes.iter().any(|peer| peer.side() != side) {
            if let Some((since, _)) = self.nodes_converge.take() {
                debug!(now, since, "nodes no longer agree");
            }
            return None;
        }

        match self.nodes_converge {
            Some((since, agreed)) if agreed == side => {
                (now - since > CONVERGE_TIME_MS_CRITERIA).then_some(side)
            }
            _ => {
                debug!(now, %side, "all nodes mine on the same side");
                self.nodes_converge = Some((now, side));
                None
            }
        }
    }
}

/// Container for a group of simulations which run with the same adversary
/// strategy. Simulations should be run using this struct's `run_all` method.
#[derive(Debug, Clone)]
pub struct SimulationGroup {
    envs: Vec<TestEnvironment>,
    strategy: Option<Box<dyn AdversaryStrategy>>,
    repeat_all: NonZeroUsize,
    seed: u64,
}

impl SimulationGroup {
    pub fn add(&mut self, env: TestEnvironment) {
        self.envs.push(env);
    }

    pub fn builder() -> SimulationGroupBuilder {
        SimulationGroupBuilder::new()
    }

    /// Runs every environment `repeat_all` times. Run `i` (counting over all
    /// environments and repeats in order) uses a [`StdRng`] seeded with
    /// `seed + i`.
    pub fn run_all(self) -> Result<ResultsBuilder, SimulationError> {
        let SimulationGroup {
            envs,
            strategy,
            repeat_all,
            seed,
        } = self;

        let runs: Vec<_> = envs
            .into_iter()
            // Clone each environment repeat_all times
            .flat_map(|env| vec![env; repeat_all.get()])
            .enumerate()
            .collect();

        let run = |(index, env): (usize, TestEnvironment)| -> Result<
            SimulationOutput,
            SimulationError,
        > {
            let mut rng = StdRng::seed_from_u64(seed.wrapping_add(index as u64));
            let adversary = match &strategy {
                Some(prototype) => prototype.clone(),
                None => Box::new(StrategyRandomLatency::new()),
            };

            let output = Simulator::with_strategy(env, adversary, &mut rng)?
                .simulate(&mut rng)?;
            info!(run = index, fork_duration = output.fork_duration, "run finished");

            Ok(output)
        };

        #[cfg(feature = "rayon")]
        let outputs: Result<Vec<_>, SimulationError> =
            runs.into_par_iter().map(run).collect();
        #[cfg(not(feature = "rayon"))]
        let outputs: Result<Vec<_>, SimulationError> =
            runs.into_iter().map(run).collect();

        Ok(ResultsBuilder::new(outputs?, repeat_all))
    }
}

#[cfg(test)]
mod tests {
    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::network::{NetworkGraph, TopologyKind, UNREACHABLE};

    /// Fully connected network with the same latency on every edge.
    fn complete_graph(num_nodes: usize, latency: TimeMs) -> NetworkGraph {
        let mut edge_map = vec![vec![latency; num_nodes]; num_nodes];
        for (i, row) in edge_map.iter_mut().enumerate() {
            row[i] = UNREACHABLE;
        }
        NetworkGraph::from_edge_map(&edge_map)
    }

    fn run(env: TestEnvironment, graph: NetworkGraph, seed: u64) -> SimulationOutput {
        let mut rng = StdRng::seed_from_u64(seed);
        Simulator::with_network(env, graph, Box::new(StrategyRandomLatency::new()))
            .expect("valid environment")
            .simulate(&mut rng)
            .expect("simulation runs")
    }

    fn small_env() -> EnvironmentBuilder {
        TestEnvironment::builder()
            .num_nodes(2)
            .degree(1)
            .latency_ms(0)
            .topology(TopologyKind::Random)
            .average_block_period_ms(500.0)
            .one_way_latency_ms(10)
            .termination_time_ms(5_400_000)
    }

    #[test]
    fn honest_mining_converges_deterministically() {
        let env = small_env().evil_rate(0.0).build().unwrap();

        // With instant delivery both nodes always hold the same blocks, so
        // agreement is recorded at the first check and held from then on.
        let expected = FIRST_CHECK_MERGE_MS
            + (CONVERGE_TIME_MS_CRITERIA / CHECK_MERGE_INTERVAL_MS + 1)
                * CHECK_MERGE_INTERVAL_MS;
        for seed in 0..4 {
            let output = run(env.clone(), complete_graph(2, 0), seed);

            assert!(output.converged());
            assert_eq!(output.fork_duration, expected);
            assert_eq!(output.adversary_blocks_mined, 0);
            assert_eq!(output.released_blocks, 0);
            assert!(output.fork_duration < env.termination_time_ms);
        }
    }

    #[test]
    fn same_seed_same_result() {
        let env = TestEnvironment::builder()
            .num_nodes(20)
            .degree(3)
            .latency_ms(100)
            .topology(TopologyKind::GeoLatency)
            .evil_rate(0.2)
            .termination_time_ms(400_000)
            .build()
            .unwrap();

        let simulate = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            Simulator::new(env.clone(), &mut rng)
                .unwrap()
                .simulate(&mut rng)
                .unwrap()
        };
        let a = simulate(11);
        let b = simulate(11);

        assert_eq!(a.fork_duration, b.fork_duration);
        assert_eq!(a.converged_side, b.converged_side);
        assert_eq!(a.blocks_mined, b.blocks_mined);
        assert_eq!(a.adversary_blocks_mined, b.adversary_blocks_mined);
        assert_eq!(a.borrowed_blocks, b.borrowed_blocks);
        assert_eq!(a.diameter, b.diameter);
    }

    #[test]
    fn adversary_only_mining_withholds_everything() {
        let period = 100.0;
        let env = TestEnvironment::builder()
            .num_nodes(10)
            .degree(3)
            .latency_ms(100)
            .topology(TopologyKind::Random)
            .average_block_period_ms(period)
            .evil_rate(1.0)
            .termination_time_ms(1_000_000)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let output = Simulator::new(env, &mut rng)
            .unwrap()
            .simulate(&mut rng)
            .unwrap();

        assert_eq!(output.adversary_blocks_mined, output.blocks_mined);
        assert_eq!(
            output.released_blocks + output.withheld_blocks,
            output.adversary_blocks_mined
        );

        // Blocks arrive at rate evil_rate / period.
        let expected = output.fork_duration as f64 / period;
        let mined = output.adversary_blocks_mined as f64;
        assert!(
            (mined - expected).abs() < 0.2 * expected,
            "mined {mined}, expected about {expected}"
        );
    }

    #[test]
    fn mixed_mining_splits_blocks_by_evil_rate() {
        let period = 100.0;
        let evil_rate = 0.5;
        let env = TestEnvironment::builder()
            .num_nodes(10)
            .degree(3)
            .latency_ms(100)
            .topology(TopologyKind::Random)
            .average_block_period_ms(period)
            .evil_rate(evil_rate)
            .termination_time_ms(1_000_000)
            .build()
            .unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let output = Simulator::new(env, &mut rng)
            .unwrap()
            .simulate(&mut rng)
            .unwrap();

        // Convergence needs at least 50s of agreement, so hundreds of
        // blocks are mined in any run.
        let mined = output.blocks_mined as f64;
        let expected = output.fork_duration as f64 / period;
        assert!(
            (mined - expected).abs() < 0.2 * expected,
            "mined {mined}, expected about {expected}"
        );

        let share = output.adversary_blocks_mined as f64 / mined;
        assert!(
            (share - evil_rate).abs() < 0.1,
            "adversary share {share}, expected about {evil_rate}"
        );
        // Borrowing is off, so every sent block was really mined.
        assert_eq!(
            output.released_blocks + output.withheld_blocks,
            output.adversary_blocks_mined
        );
    }

    #[test]
    fn agreement_clock_restarts_after_disagreement() {
        let env = small_env().evil_rate(0.0).build().unwrap();
        let mut sim = Simulator::with_network(
            env,
            complete_graph(2, 0),
            Box::new(StrategyRandomLatency::new()),
        )
        .unwrap();

        // Both nodes favor the right side.
        for node in sim.nodes.iter_mut() {
            node.deliver_block(BlockId(1), Side::Right);
        }
        assert_eq!(sim.is_chain_merged(0), None);

        // Node 0 switches to the left side.
        sim.nodes[0].deliver_block(BlockId(2), Side::Left);
        sim.nodes[0].deliver_block(BlockId(3), Side::Left);
        assert_eq!(sim.nodes[0].side(), Side::Left);
        assert_eq!(sim.is_chain_merged(50), None);

        // And back to the right side.
        sim.nodes[0].deliver_block(BlockId(4), Side::Right);
        sim.nodes[0].deliver_block(BlockId(5), Side::Right);
        assert_eq!(sim.nodes[0].side(), Side::Right);
        assert_eq!(sim.is_chain_merged(100), None);

        // Counted from 100, not from 0.
        assert_eq!(sim.is_chain_merged(CONVERGE_TIME_MS_CRITERIA + 1), None);
        assert_eq!(
            sim.is_chain_merged(CONVERGE_TIME_MS_CRITERIA + 101),
            Some(Side::Right)
        );
    }

    #[test]
    fn empty_network_is_rejected() {
        let env = small_env().build().unwrap();
        let result = Simulator::with_network(
            env,
            NetworkGraph::from_edge_map(&vec![]),
            Box::new(StrategyRandomLatency::new()),
        );

        assert!(matches!(result, Err(SimulationError::EmptyNetwork)));
    }

    #[test]
    fn termination_before_any_convergence_returns_the_bound() {
        let env = small_env()
            .evil_rate(0.0)
            .termination_time_ms(CONVERGE_TIME_MS_CRITERIA - 1)
            .build()
            .unwrap();
        let output = run(env, complete_graph(2, 0), 3);

        assert!(!output.converged());
        assert_eq!(output.fork_duration, CONVERGE_TIME_MS_CRITERIA - 1);
    }

    #[test]
    fn borrowing_mints_synthetic_blocks() {
        let env = small_env()
            .num_nodes(4)
            .evil_rate(0.0)
            .debug_allow_borrow(true)
            .termination_time_ms(200_000)
            .build()
            .unwrap();
        let output = run(env, complete_graph(4, 50), 9);

        assert!(output.borrowed_blocks > 0);
        // Only real adversary blocks count as released.
        assert_eq!(output.released_blocks, 0);
        assert!(output.fork_duration <= 200_000);
    }

    #[test]
    fn single_node_converges_immediately() {
        let env = small_env().num_nodes(1).evil_rate(0.5).build().unwrap();
        let output = run(env, complete_graph(1, 0), 1);

        assert!(output.converged());
        assert_eq!(output.diameter, 0);
    }

    #[test]
    fn group_runs_every_repeat() {
        let env = small_env()
            .num_nodes(6)
            .degree(3)
            .latency_ms(50)
            .evil_rate(0.1)
            .termination_time_ms(100_000)
            .build()
            .unwrap();

        let outputs = SimulationGroup::builder()
            .add_env(env.clone())
            .add_env(TestEnvironment { evil_rate: 0.3, ..env })
            .repeat_all(3)
            .seed(42)
            .build()
            .expect("valid group")
            .run_all()
            .expect("runs succeed")
            .data();

        assert_eq!(outputs.len(), 6);
        assert!(outputs[..3].iter().all(|o| o.env.evil_rate == 0.1));
        assert!(outputs[3..].iter().all(|o| o.env.evil_rate == 0.3));
        assert!(outputs.iter().all(|o| o.fork_duration <= 100_000));
    }
}
