/*!
Simulator for the balance attack on GHOST fork choice.

An adversary splits a peer-to-peer network into two halves mining on the two
sides of a fork, then releases the blocks it mines itself so that neither
side pulls ahead. Runs measure how long the fork survives.

```
use balance_sim::prelude::*;
use rand::{rngs::StdRng, SeedableRng};

let env = TestEnvironment::builder()
    .num_nodes(8)
    .topology(TopologyKind::Random)
    .latency_ms(50)
    .termination_time_ms(200_000)
    .build()
    .unwrap();

let mut rng = StdRng::seed_from_u64(7);
let output = Simulator::new(env, &mut rng)
    .unwrap()
    .simulate(&mut rng)
    .unwrap();

assert!(output.fork_duration <= 200_000);
```
*/

// ## Todo:
// - Adversary strategies which release according to measured latencies
//   instead of the static cross partition latency

pub mod adversary;
pub mod block;
pub mod network;
pub mod node_view;
pub mod prelude;
pub mod results;
pub mod simulation;

pub(crate) mod utils;
