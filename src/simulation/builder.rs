use std::num::NonZeroUsize;

use crate::adversary::AdversaryStrategy;

use super::{EnvironmentError, SimulationGroup, TestEnvironment};

/// Builds a [`SimulationGroup`].
#[derive(Debug, Default)]
pub struct SimulationGroupBuilder {
    pub repeat_all: Option<usize>,
    pub seed: Option<u64>,
    pub envs: Vec<TestEnvironment>,
    strategy: Option<Box<dyn AdversaryStrategy>>,
}

#[derive(Debug, thiserror::Error)]
pub enum SimulationBuildError {
    #[error("no test environments were added")]
    NoEnvironmentsGiven,
    #[error("cannot repeat a simulation 0 times")]
    RepeatAllZero,
    #[error(transparent)]
    EnvironmentError(#[from] EnvironmentError),
}

impl SimulationGroupBuilder {
    /// Creates a new [`SimulationGroupBuilder`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a simulation of `env` to the group.
    pub fn add_env(mut self, env: TestEnvironment) -> Self {
        self.envs.push(env);

        self
    }

    /// Call [`SimulationGroupBuilder::add_env`] once for each element of
    /// `envs`.
    pub fn add_envs<I>(mut self, envs: I) -> Self
    where
        I: IntoIterator<Item = TestEnvironment>,
    {
        self.envs.extend(envs);

        self
    }

    /// Run every environment `num` times (default 1).
    pub fn repeat_all(mut self, num: usize) -> Self {
        self.repeat_all = Some(num);

        self
    }

    /// Sets the base seed of the group (default 0). See
    /// [`SimulationGroup::run_all`].
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);

        self
    }

    /// Use a copy of `strategy` as the adversary of every run
    /// ([`StrategyRandomLatency`](crate::adversary::StrategyRandomLatency)
    /// otherwise).
    pub fn strategy<S: AdversaryStrategy + 'static>(mut self, strategy: S) -> Self {
        self.strategy = Some(Box::new(strategy));

        self
    }

    /// Creates a [`SimulationGroup`] from the specified parameters.
    pub fn build(self) -> Result<SimulationGroup, SimulationBuildError> {
        use SimulationBuildError::*;

        let SimulationGroupBuilder {
            repeat_all,
            seed,
            envs,
            strategy,
        } = self;

        if envs.is_empty() {
            return Err(NoEnvironmentsGiven);
        }
        for env in envs.iter() {
            env.validate()?;
        }

        let repeat_all = match repeat_all {
            Some(x) => NonZeroUsize::new(x).ok_or(RepeatAllZero)?,
            None => NonZeroUsize::MIN,
        };

        Ok(SimulationGroup {
            envs,
            strategy,
            repeat_all,
            seed: seed.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{SimulationBuildError, SimulationGroupBuilder};
    use crate::{adversary::StrategyRandomLatency, simulation::TestEnvironment};

    #[test]
    fn example_build() {
        SimulationGroupBuilder::new()
            .add_env(TestEnvironment::default())
            .strategy(StrategyRandomLatency::new())
            .build()
            .expect("valid simulation build");
    }

    #[test]
    fn build_errors() {
        assert!(matches!(
            SimulationGroupBuilder::new().build(),
            Err(SimulationBuildError::NoEnvironmentsGiven)
        ));
        assert!(matches!(
            SimulationGroupBuilder::new()
                .add_env(TestEnvironment::default())
                .repeat_all(0)
                .build(),
            Err(SimulationBuildError::RepeatAllZero)
        ));

        let bad = TestEnvironment {
            evil_rate: -0.1,
            ..Default::default()
        };
        assert!(matches!(
            SimulationGroupBuilder::new().add_env(bad).build(),
            Err(SimulationBuildError::EnvironmentError(_))
        ));
    }
}
