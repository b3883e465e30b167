//! Random network topologies and their all-pairs propagation latencies.

pub mod geo;

use std::{collections::HashSet, convert::Infallible, fmt::Display, str::FromStr};

use rand::Rng;
use tracing::{info, trace};

use crate::{
    block::TimeMs, node_view::NodeId, simulation::environment::TestEnvironment,
};

use self::geo::{GEO_DELAY_MS, NUM_CITIES};

/// Square matrix of latencies between participants, indexed `[from][to]`.
pub type LatencyMatrix = Vec<Vec<TimeMs>>;

/// Marks a pair of participants with no (known) path between them.
pub const UNREACHABLE: TimeMs = -1;

/// Placeholder weight for an edge whose latency has not been assigned yet.
pub const CONNECTED: TimeMs = 1;

/// How edge latencies are drawn when generating a [`NetworkGraph`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TopologyKind {
    /// Uniform jitter of ±25% around the base latency.
    Random,
    /// Each node sits in a random city; edges cost the inter-city delay plus
    /// ±20% queueing jitter around the base latency.
    #[default]
    GeoLatency,
}

impl FromStr for TopologyKind {
    type Err = Infallible;

    /// `"geolatency"` selects [`TopologyKind::GeoLatency`]; every other name
    /// falls back to [`TopologyKind::Random`].
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "geolatency" => TopologyKind::GeoLatency,
            _ => TopologyKind::Random,
        })
    }
}

impl Display for TopologyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TopologyKind::Random => write!(f, "random"),
            TopologyKind::GeoLatency => write!(f, "geolatency"),
        }
    }
}

/// A connected network of participants with shortest-path latencies between
/// every pair of them.
#[derive(Debug, Clone)]
pub struct NetworkGraph {
    all_pairs_distances: LatencyMatrix,
    diameter: TimeMs,
}

impl NetworkGraph {
    /// Builds a graph from direct edge latencies (`UNREACHABLE` where no edge
    /// exists).
    pub fn from_edge_map(edge_map: &LatencyMatrix) -> Self {
        let all_pairs_distances = compute_apsp(edge_map);
        let diameter = compute_diameter(&all_pairs_distances);
        info!(diameter, "network graph generated");

        NetworkGraph {
            all_pairs_distances,
            diameter,
        }
    }

    /// Random topology with latencies drawn uniformly from
    /// `[0.75 * latency, 1.25 * latency]`.
    pub fn make_random_graph<R: Rng + ?Sized>(
        rng: &mut R,
        num_nodes: usize,
        degree: usize,
        latency: TimeMs,
    ) -> Self {
        let mut edge_map = generate_connectivity(rng, num_nodes, degree);
        assign_random_latency(rng, &mut edge_map, latency);

        Self::from_edge_map(&edge_map)
    }

    /// Random topology with latencies taken from the city delay table.
    pub fn make_random_geodelay_graph<R: Rng + ?Sized>(
        rng: &mut R,
        num_nodes: usize,
        degree: usize,
        queueing_latency: TimeMs,
    ) -> Self {
        let mut edge_map = generate_connectivity(rng, num_nodes, degree);
        embed_geolatency(rng, &mut edge_map, queueing_latency);

        Self::from_edge_map(&edge_map)
    }

    /// Builds the topology described by `env`.
    pub fn make_graph<R: Rng + ?Sized>(
        rng: &mut R,
        env: &TestEnvironment,
    ) -> Self {
        match env.topology {
            TopologyKind::GeoLatency => Self::make_random_geodelay_graph(
                rng,
                env.num_nodes,
                env.degree,
                env.latency_ms,
            ),
            TopologyKind::Random => Self::make_random_graph(
                rng,
                env.num_nodes,
                env.degree,
                env.latency_ms,
            ),
        }
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.all_pairs_distances.len()
    }

    #[inline]
    pub fn all_pairs_distances(&self) -> &LatencyMatrix {
        &self.all_pairs_distances
    }

    /// Shortest-path latency from `node` to every participant.
    #[inline]
    pub fn connectivity(&self, node: NodeId) -> &[TimeMs] {
        &self.all_pairs_distances[node.0]
    }

    /// Largest finite latency between any two participants.
    #[inline]
    pub fn diameter(&self) -> TimeMs {
        self.diameter
    }
}

/// Draws random graphs until one is connected. Every node tries to link to
/// `degree` distinct peers, skipping itself and peers which are already
/// saturated.
///
/// Direct edges are marked [`CONNECTED`]; all other entries, the diagonal
/// included, are [`UNREACHABLE`].
///
/// # Termination
/// There is no cap on the number of attempts. Degrees that cannot yield a
/// connected graph (e.g. `degree == 1` for more than two nodes) loop forever.
pub fn generate_connectivity<R: Rng + ?Sized>(
    rng: &mut R,
    num_nodes: usize,
    degree: usize,
) -> LatencyMatrix {
    let mut iteration: u64 = 0;
    loop {
        trace!(iteration, "generating connectivity");

        let mut degrees = vec![0; num_nodes];
        let mut edge_map = vec![vec![UNREACHABLE; num_nodes]; num_nodes];

        for i in 0..num_nodes {
            let mut peers = HashSet::new();
            while peers.len() < num_nodes && degree > degrees[i] {
                let peer = rng.gen_range(0..num_nodes);
                peers.insert(peer);
                if peer == i
                    || degrees[peer] == degree
                    || edge_map[i][peer] > UNREACHABLE
                {
                    continue;
                }

                edge_map[i][peer] = CONNECTED;
                edge_map[peer][i] = CONNECTED;
                degrees[i] += 1;
                degrees[peer] += 1;
            }
        }

        if is_connected(&edge_map) {
            return edge_map;
        }
        iteration += 1;
    }
}

/// Returns true if every node is reachable from node 0.
pub fn is_connected(edge_map: &LatencyMatrix) -> bool {
    let num_nodes = edge_map.len();
    if num_nodes == 0 {
        return true;
    }

    let mut reachable = vec![false; num_nodes];
    reachable[0] = true;
    let mut visited = vec![0];
    let mut next = 0;
    while let Some(&node) = visited.get(next) {
        for peer in 0..num_nodes {
            if !reachable[peer] && edge_map[node][peer] > UNREACHABLE {
                reachable[peer] = true;
                visited.push(peer);
            }
        }
        next += 1;
    }

    visited.len() == num_nodes
}

/// Replaces every edge weight with a latency drawn uniformly from
/// `[0.75 * latency, 1.25 * latency]`. Both directions of an edge share the
/// same latency.
pub fn assign_random_latency<R: Rng + ?Sized>(
    rng: &mut R,
    edge_map: &mut LatencyMatrix,
    latency: TimeMs,
) {
    trace!(latency, "assigning random latency");

    let base = latency as f64;
    let num_nodes = edge_map.len();
    for i in 0..num_nodes {
        for j in i + 1..num_nodes {
            if edge_map[i][j] > UNREACHABLE {
                let edge = rng.gen_range(0.75 * base..=1.25 * base) as TimeMs;
                edge_map[i][j] = edge;
                edge_map[j][i] = edge;
            }
        }
    }
}

/// Places every node in a random city and replaces each edge weight with the
/// directional city delay plus a queueing delay drawn uniformly from
/// `[0.8 * queueing_latency, 1.2 * queueing_latency]`.
///
/// The queueing delay is shared by both directions of an edge, but the city
/// delay is not, so `edge_map[i][j]` and `edge_map[j][i]` may differ.
pub fn embed_geolatency<R: Rng + ?Sized>(
    rng: &mut R,
    edge_map: &mut LatencyMatrix,
    queueing_latency: TimeMs,
) {
    trace!(queueing_latency, "embedding geo latency");

    let base = queueing_latency as f64;
    let num_nodes = edge_map.len();
    let city: Vec<usize> =
        (0..num_nodes).map(|_| rng.gen_range(0..NUM_CITIES)).collect();

    for i in 0..num_nodes {
        for j in i + 1..num_nodes {
            if edge_map[i][j] > UNREACHABLE {
                let queueing = rng.gen_range(0.8 * base..=1.2 * base);
                edge_map[i][j] =
                    (GEO_DELAY_MS[city[i]][city[j]] + queueing) as TimeMs;
                edge_map[j][i] =
                    (GEO_DELAY_MS[city[j]][city[i]] + queueing) as TimeMs;
            }
        }
    }
}

/// All-pairs shortest paths (Floyd-Warshall). Entries which are
/// [`UNREACHABLE`] are treated as missing edges; the diagonal is zero.
pub fn compute_apsp(edge_map: &LatencyMatrix) -> LatencyMatrix {
    let num_nodes = edge_map.len();
    let mut distances = edge_map.clone();

    for (i, row) in distances.iter_mut().enumerate() {
        row[i] = 0;
    }

    for k in 0..num_nodes {
        for i in 0..num_nodes {
            let d_ik = distances[i][k];
            if d_ik <= UNREACHABLE {
                continue;
            }

            for j in 0..num_nodes {
                let d_kj = distances[k][j];
                if d_kj <= UNREACHABLE {
                    continue;
                }

                let through_k = d_ik + d_kj;
                let d_ij = &mut distances[i][j];
                if *d_ij <= UNREACHABLE || through_k < *d_ij {
                    *d_ij = through_k;
                }
            }
        }
    }

    distances
}

/// Largest finite entry of `distances`, or 0 for graphs with fewer than two
/// nodes.
pub fn compute_diameter(distances: &LatencyMatrix) -> TimeMs {
    distances
        .iter()
        .flatten()
        .copied()
        .filter(|&d| d > UNREACHABLE)
        .max()
        .unwrap_or(0)
}
