//! XMC - Monte Carlo model variables
//!
//! Model parameters and results (scalar or per-period, input or output,
//! numeric or textual) that absorb one observation per simulation run and
//! expose running mean/variance without revisiting earlier runs.
//!
//! Spreadsheet rendering, charts and file output live outside this crate and
//! consume the read interface of [`VariableRegistry`].

pub mod accumulator;
pub mod context;
pub mod registry;
pub mod sim;
pub mod variable;

use thiserror::Error;

// Re-export main types
pub use accumulator::{KeyStats, StatAccumulator, StatError};
pub use context::{AggregationMode, ModelConfig, ModelContext};
pub use registry::{VarId, VariableRegistry, VariableSummary};
pub use sim::{run_scenario, ScenarioConfig, ScenarioOutcome};
pub use variable::{
    Cardinality, HeaderMarker, NumericVariable, Role, ScenarioState, StringVariable, Value,
    Variable, VariableAlias, VariableKind,
};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum XmcError {
    #[error("{name}: key {key} out of range (bound {bound})")]
    IndexOutOfRange {
        name: String,
        key: usize,
        bound: usize,
    },
    #[error("{name}: input variables cannot be written per run")]
    InputNotWritable { name: String },
    #[error("{name}: alias is read-only")]
    ImmutableAlias { name: String },
    #[error("{name}: no samples at key {key}")]
    NoSamples { name: String, key: usize },
    #[error("{name}: variance needs at least 2 samples at key {key}, have {count}")]
    InsufficientSamples {
        name: String,
        key: usize,
        count: u64,
    },
    #[error("{name}: written before the first scenario reset")]
    ScenarioNotStarted { name: String },
    #[error("{name}: only input variables can be assigned")]
    NotAnInput { name: String },
    #[error("{name}: variable keeps no statistics")]
    NoStatistics { name: String },
    #[error("{name}: expected a {expected} value")]
    TypeMismatch { name: String, expected: &'static str },
    #[error("{name}: aliases must point at a numeric or string variable")]
    InvalidAliasTarget { name: String },
    #[error("duplicate variable name: {0}")]
    DuplicateName(String),
    #[error("unknown variable: {0}")]
    UnknownVariable(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{context} length mismatch: expected {expected}, got {got}")]
    LengthMismatch {
        context: &'static str,
        expected: usize,
        got: usize,
    },
}
