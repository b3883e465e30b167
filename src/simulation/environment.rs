//! Parameters of a single simulated experiment.

use crate::{block::TimeMs, network::TopologyKind};

/// Read-only configuration for one run of a [`Simulator`](super::Simulator).
#[derive(Debug, Clone, PartialEq)]
pub struct TestEnvironment {
    // Graph params
    pub num_nodes: usize,
    pub degree: usize,
    /// Base edge latency. Used as the queueing latency for
    /// [`TopologyKind::GeoLatency`] graphs.
    pub latency_ms: TimeMs,
    pub topology: TopologyKind,

    // Chain params
    /// Mean of the exponential distribution of block inter-arrival times.
    pub average_block_period_ms: f64,

    // Attacker params
    /// Probability that a block is mined by the adversary.
    pub evil_rate: f64,
    /// Latency of every message between the adversary and an honest node.
    pub one_way_latency_ms: TimeMs,
    /// Lets the adversary mint synthetic blocks when its backlog cannot cover
    /// a release. Experimental, only useful for tuning `evil_rate`.
    pub debug_allow_borrow: bool,

    // Simulation params
    pub termination_time_ms: TimeMs,
}

impl TestEnvironment {
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::new()
    }

    /// Checks every parameter of this environment.
    pub fn validate(&self) -> Result<(), EnvironmentError> {
        use EnvironmentError::*;

        if self.num_nodes == 0 {
            return Err(ZeroNodes);
        }
        if self.degree == 0 {
            return Err(ZeroDegree);
        }
        if self.latency_ms < 0 {
            return Err(NegativeLatency(self.latency_ms));
        }
        if !self.average_block_period_ms.is_finite()
            || self.average_block_period_ms <= 0.0
        {
            return Err(BadBlockPeriod(self.average_block_period_ms));
        }
        if self.evil_rate.is_nan() || !(0.0..=1.0).contains(&self.evil_rate) {
            return Err(BadEvilRate(self.evil_rate));
        }
        if self.one_way_latency_ms < 0 {
            return Err(NegativeOneWayLatency(self.one_way_latency_ms));
        }
        if self.termination_time_ms <= 0 {
            return Err(BadTerminationTime(self.termination_time_ms));
        }

        Ok(())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        TestEnvironment {
            num_nodes: 2000,
            degree: 3,
            latency_ms: 200,
            topology: TopologyKind::GeoLatency,
            average_block_period_ms: 500.0,
            evil_rate: 0.2,
            one_way_latency_ms: 10,
            debug_allow_borrow: false,
            termination_time_ms: 5_400_000,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EnvironmentError {
    #[error("cannot simulate a network with zero nodes")]
    ZeroNodes,
    #[error("node degree must be greater than 0")]
    ZeroDegree,
    #[error("base latency {0}ms is negative")]
    NegativeLatency(TimeMs),
    #[error("average block period {0}ms is not a positive number")]
    BadBlockPeriod(f64),
    #[error("evil rate {0} is not in the range 0.0..=1.0")]
    BadEvilRate(f64),
    #[error("one-way latency {0}ms is negative")]
    NegativeOneWayLatency(TimeMs),
    #[error("termination time {0}ms must be greater than 0")]
    BadTerminationTime(TimeMs),
}

/// Builds a [`TestEnvironment`], starting from [`TestEnvironment::default`].
#[derive(Debug, Default)]
pub struct EnvironmentBuilder {
    env: TestEnvironment,
}

impl EnvironmentBuilder {
    /// Creates a new [`EnvironmentBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the number of honest participants.
    pub fn num_nodes(mut self, num_nodes: usize) -> Self {
        self.env.num_nodes = num_nodes;

        self
    }

    /// Sets the number of peers each node tries to connect to.
    pub fn degree(mut self, degree: usize) -> Self {
        self.env.degree = degree;

        self
    }

    /// Sets the base edge latency.
    pub fn latency_ms(mut self, latency_ms: TimeMs) -> Self {
        self.env.latency_ms = latency_ms;

        self
    }

    pub fn topology(mut self, topology: TopologyKind) -> Self {
        self.env.topology = topology;

        self
    }

    pub fn average_block_period_ms(mut self, period_ms: f64) -> Self {
        self.env.average_block_period_ms = period_ms;

        self
    }

    /// Sets the adversary's share of the total mining power.
    pub fn evil_rate(mut self, evil_rate: f64) -> Self {
        self.env.evil_rate = evil_rate;

        self
    }

    pub fn one_way_latency_ms(mut self, latency_ms: TimeMs) -> Self {
        self.env.one_way_latency_ms = latency_ms;

        self
    }

    /// Enables the experimental block borrowing mode (off by default).
    pub fn debug_allow_borrow(mut self, allow: bool) -> Self {
        self.env.debug_allow_borrow = allow;

        self
    }

    /// Sets the simulated time after which a run stops unconditionally.
    pub fn termination_time_ms(mut self, time_ms: TimeMs) -> Self {
        self.env.termination_time_ms = time_ms;

        self
    }

    /// Creates a [`TestEnvironment`] from the specified parameters.
    pub fn build(self) -> Result<TestEnvironment, EnvironmentError> {
        self.env.validate()?;

        Ok(self.env)
    }
}

#[cfg(test)]
mod tests {
    use super::{EnvironmentError, TestEnvironment};
    use crate::network::TopologyKind;

    #[test]
    fn default_environment_is_valid() {
        let env = TestEnvironment::builder().build().expect("valid defaults");
        assert_eq!(env.num_nodes, 2000);
        assert_eq!(env.topology, TopologyKind::GeoLatency);
        assert!(!env.debug_allow_borrow);
    }

    #[test]
    fn rejects_bad_parameters() {
        assert!(matches!(
            TestEnvironment::builder().num_nodes(0).build(),
            Err(EnvironmentError::ZeroNodes)
        ));
        assert!(matches!(
            TestEnvironment::builder().evil_rate(1.5).build(),
            Err(EnvironmentError::BadEvilRate(_))
        ));
        assert!(matches!(
            TestEnvironment::builder().evil_rate(f64::NAN).build(),
            Err(EnvironmentError::BadEvilRate(_))
        ));
        assert!(matches!(
            TestEnvironment::builder().average_block_period_ms(0.0).build(),
            Err(EnvironmentError::BadBlockPeriod(_))
        ));
        assert!(matches!(
            TestEnvironment::builder().termination_time_ms(0).build(),
            Err(EnvironmentError::BadTerminationTime(0))
        ));
    }

    #[test]
    fn evil_rate_bounds_are_inclusive() {
        assert!(TestEnvironment::builder().evil_rate(0.0).build().is_ok());
        assert!(TestEnvironment::builder().evil_rate(1.0).build().is_ok());
    }
}
