use std::time::Instant;

use anyhow::Result;
use balance_sim::prelude::*;
use tracing::info;
use tracing_subscriber::EnvFilter;

const REPEATS: usize = 1;

/// (nodes, degree, base latency in ms, topology)
const GRAPH_PARAMS: [(usize, usize, TimeMs, &str); 1] =
    [(2000, 3, 200, "geolatency")];

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(repeats = REPEATS, "starting balance attack simulations");

    for (num_nodes, degree, latency_ms, topology) in GRAPH_PARAMS {
        let env = TestEnvironment::builder()
            .num_nodes(num_nodes)
            .degree(degree)
            .latency_ms(latency_ms)
            .topology(topology.parse()?)
            .average_block_period_ms(500.0)
            .evil_rate(0.2)
            .one_way_latency_ms(10)
            .debug_allow_borrow(false)
            .termination_time_ms(5_400_000)
            .build()?;

        let start = Instant::now();
        let simulation = SimulationGroup::builder()
            .add_env(env)
            .repeat_all(REPEATS)
            .build()?;

        let results = simulation
            .run_all()?
            .strategy_name()
            .environment()
            .converged()
            .adversary_blocks()
            .borrowed_blocks()
            .diameter()
            .build();

        println!("{}", results);
        println!(
            "executed {} attack simulations in {}ms",
            REPEATS,
            start.elapsed().as_millis()
        );
    }

    Ok(())
}
