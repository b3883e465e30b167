/*!
Re-export of common values and datatypes used for running and analyzing
simulations. Must be imported manually.

```
use balance_sim::prelude::*;
```
*/

use crate::{adversary, block, network, node_view, results, simulation};

pub use adversary::{
    random_latency::extra_send_calc, AdversaryStrategy, Partition, Shortfall,
    StrategyRandomLatency,
};

pub use block::{BlockId, Side, TimeMs};

pub use network::{LatencyMatrix, NetworkGraph, TopologyKind};

pub use node_view::{NodeId, NodeLocalView, ViewOwner};

pub use results::{Average, Format, ResultsBuilder, ResultsTable};

pub use simulation::{
    EnvironmentBuilder, EnvironmentError, SimulationBuildError,
    SimulationError, SimulationGroup, SimulationGroupBuilder,
    SimulationOutput, Simulator, TestEnvironment,
};
