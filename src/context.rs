//! Model context
//!
//! Session-wide settings every variable is built against: how many periods a
//! time series holds and whether reports show raw values or statistics.

use serde::{Deserialize, Serialize};

use crate::XmcError;

/// Number of forecast periods used when nothing else is configured.
pub const DEFAULT_PERIOD_COUNT: usize = 15;

/// Whether variables report the latest raw observation or accumulated statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationMode {
    /// One deterministic run; reports show last values
    #[default]
    SingleRun,
    /// Many stochastic runs; reports show mean and standard deviation
    Aggregated,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub period_count: usize,
    pub aggregation_mode: AggregationMode,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            period_count: DEFAULT_PERIOD_COUNT,
            aggregation_mode: AggregationMode::SingleRun,
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), XmcError> {
        if self.period_count == 0 {
            return Err(XmcError::InvalidConfig(
                "period_count must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Read-only handle passed to variables at construction.
///
/// The period count is fixed for the session. The aggregation mode is owned by
/// whoever holds the context (normally the registry) and is never changed by
/// a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelContext {
    period_count: usize,
    aggregation_mode: AggregationMode,
}

impl ModelContext {
    pub fn new(period_count: usize) -> Result<Self, XmcError> {
        Self::from_config(&ModelConfig {
            period_count,
            ..ModelConfig::default()
        })
    }

    pub fn from_config(config: &ModelConfig) -> Result<Self, XmcError> {
        config.validate()?;
        Ok(Self {
            period_count: config.period_count,
            aggregation_mode: config.aggregation_mode,
        })
    }

    pub fn period_count(&self) -> usize {
        self.period_count
    }

    pub fn aggregation_mode(&self) -> AggregationMode {
        self.aggregation_mode
    }

    pub(crate) fn set_aggregation_mode(&mut self, mode: AggregationMode) {
        self.aggregation_mode = mode;
    }
}

impl Default for ModelContext {
    fn default() -> Self {
        Self {
            period_count: DEFAULT_PERIOD_COUNT,
            aggregation_mode: AggregationMode::SingleRun,
        }
    }
}
