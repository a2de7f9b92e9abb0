//! Scenario driver
//!
//! Runs the caller's model `runs` times against a registry: one scenario
//! reset up front, then a run reset and one model call per iteration.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::context::AggregationMode;
use crate::registry::VariableRegistry;
use crate::XmcError;

pub const DEFAULT_RUNS: usize = 1000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScenarioConfig {
    pub name: String,
    pub runs: usize,
    pub seed: u64,
}

impl Default for ScenarioConfig {
    fn default() -> Self {
        Self {
            name: "base".to_string(),
            runs: DEFAULT_RUNS,
            seed: 2026,
        }
    }
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<(), XmcError> {
        if self.runs == 0 {
            return Err(XmcError::InvalidConfig(
                "runs must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }

    /// A single run is reported raw, more than one as statistics.
    pub fn aggregation_mode(&self) -> AggregationMode {
        if self.runs > 1 {
            AggregationMode::Aggregated
        } else {
            AggregationMode::SingleRun
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScenarioOutcome {
    pub runs: usize,
    pub mode: AggregationMode,
}

/// Drive one scenario.
///
/// Inputs must be assigned before calling; their values survive the reset.
/// `model` receives the registry, a seeded RNG and the run index, and should
/// write every output key once. The first model error abandons the scenario;
/// the partial statistics are discarded by the next scenario reset.
pub fn run_scenario<F>(
    registry: &mut VariableRegistry,
    config: &ScenarioConfig,
    mut model: F,
) -> Result<ScenarioOutcome, XmcError>
where
    F: FnMut(&mut VariableRegistry, &mut StdRng, usize) -> Result<(), XmcError>,
{
    config.validate()?;

    let mode = config.aggregation_mode();
    registry.set_aggregation_mode(mode);
    registry.scenario_reset();

    let mut rng = StdRng::seed_from_u64(config.seed);
    for run in 0..config.runs {
        registry.run_reset();
        model(registry, &mut rng, run)?;
    }

    debug!(scenario = %config.name, runs = config.runs, ?mode, "scenario complete");
    Ok(ScenarioOutcome {
        runs: config.runs,
        mode,
    })
}
