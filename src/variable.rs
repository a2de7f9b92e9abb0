//! Model variables
//!
//! A closed set of variable kinds sharing an identity (name, title) and,
//! where it applies, per-key storage:
//! - [`NumericVariable`]: last value per key plus Welford statistics for outputs
//! - [`StringVariable`]: last text per key, never aggregated
//! - [`VariableAlias`]: read-only view of another variable in the registry
//! - [`HeaderMarker`]: a label with no data

use serde::Serialize;
use tracing::trace;

use crate::accumulator::StatAccumulator;
use crate::context::ModelContext;
use crate::registry::VarId;
use crate::XmcError;

/// Whether a variable is supplied per scenario or accumulated per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Input,
    Output,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// Single slot, key 0
    Scalar,
    /// One slot per model period
    TimeSeries,
}

impl Cardinality {
    pub fn slot_count(&self, ctx: &ModelContext) -> usize {
        match self {
            Cardinality::Scalar => 1,
            Cardinality::TimeSeries => ctx.period_count(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    Numeric,
    Text,
    Alias,
    Header,
}

/// A single read-back value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Empty,
}

impl Value {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(x) => Some(*x),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

/// Lifecycle of an output variable within a scenario
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScenarioState {
    /// No scenario reset has happened yet
    Unallocated,
    /// Reset, waiting for the first run
    Ready,
    /// At least one observation written since the last reset
    Populated,
}

fn check_key(name: &str, key: usize, bound: usize) -> Result<(), XmcError> {
    if key < bound {
        Ok(())
    } else {
        Err(XmcError::IndexOutOfRange {
            name: name.to_string(),
            key,
            bound,
        })
    }
}

/// Numeric model parameter or result
#[derive(Debug, Clone)]
pub struct NumericVariable {
    name: String,
    title: String,
    role: Role,
    cardinality: Cardinality,
    slots: usize,
    state: ScenarioState,
    last: Vec<Option<f64>>,
    /// Only outputs accumulate; inputs keep `None` for their whole life.
    accumulator: Option<StatAccumulator>,
}

impl NumericVariable {
    pub fn new(
        ctx: &ModelContext,
        name: impl Into<String>,
        title: impl Into<String>,
        role: Role,
        cardinality: Cardinality,
    ) -> Self {
        let slots = cardinality.slot_count(ctx);
        let accumulator = match role {
            Role::Input => None,
            Role::Output => Some(StatAccumulator::new(slots)),
        };

        Self {
            name: name.into(),
            title: title.into(),
            role,
            cardinality,
            slots,
            state: ScenarioState::Unallocated,
            last: vec![None; slots],
            accumulator,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn slot_count(&self) -> usize {
        self.slots
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    /// Record one run's observation at `key`.
    pub fn write(&mut self, key: usize, value: f64) -> Result<(), XmcError> {
        if self.role == Role::Input {
            return Err(XmcError::InputNotWritable {
                name: self.name.clone(),
            });
        }
        check_key(&self.name, key, self.slots)?;
        let accumulator = self.ready_accumulator()?;
        accumulator
            .update(key, value)
            .map_err(|e| e.for_variable(&self.name))?;
        self.last[key] = Some(value);
        self.state = ScenarioState::Populated;
        trace!(name = %self.name, key, value, "sample");
        Ok(())
    }

    /// Supply the scenario value of an input.
    pub fn assign(&mut self, key: usize, value: f64) -> Result<(), XmcError> {
        if self.role != Role::Input {
            return Err(XmcError::NotAnInput {
                name: self.name.clone(),
            });
        }
        check_key(&self.name, key, self.slots)?;
        self.last[key] = Some(value);
        Ok(())
    }

    /// Latest raw value at `key`, whatever the aggregation mode.
    pub fn read(&self, key: usize) -> Result<f64, XmcError> {
        check_key(&self.name, key, self.slots)?;
        self.last[key].ok_or_else(|| XmcError::NoSamples {
            name: self.name.clone(),
            key,
        })
    }

    pub fn accumulator(&self) -> Result<&StatAccumulator, XmcError> {
        self.accumulator
            .as_ref()
            .ok_or_else(|| XmcError::NoStatistics {
                name: self.name.clone(),
            })
    }

    pub fn mean(&self, key: usize) -> Result<f64, XmcError> {
        self.accumulator()?
            .mean(key)
            .map_err(|e| e.for_variable(&self.name))
    }

    pub fn variance(&self, key: usize) -> Result<f64, XmcError> {
        self.accumulator()?
            .variance(key)
            .map_err(|e| e.for_variable(&self.name))
    }

    pub fn stddev(&self, key: usize) -> Result<f64, XmcError> {
        self.accumulator()?
            .stddev(key)
            .map_err(|e| e.for_variable(&self.name))
    }

    pub fn sample_count(&self, key: usize) -> Result<u64, XmcError> {
        self.accumulator()?
            .sample_count(key)
            .map_err(|e| e.for_variable(&self.name))
    }

    /// Fold a partial accumulator (for example from a worker thread) into
    /// this variable's statistics. The last raw value is left untouched.
    pub fn absorb(&mut self, partial: &StatAccumulator) -> Result<(), XmcError> {
        let accumulator = self.ready_accumulator()?;
        accumulator
            .merge(partial)
            .map_err(|e| e.for_variable(&self.name))?;
        if (0..partial.key_count()).any(|key| partial.sample_count(key).unwrap_or(0) > 0) {
            self.state = ScenarioState::Populated;
        }
        Ok(())
    }

    /// Start a new scenario; inputs keep their assigned values.
    pub fn scenario_reset(&mut self) {
        if let Some(accumulator) = self.accumulator.as_mut() {
            accumulator.reset(self.slots);
            self.last = vec![None; self.slots];
            self.state = ScenarioState::Ready;
        }
    }

    /// Nothing is held per run; each write is absorbed immediately.
    pub fn run_reset(&mut self) {}

    fn ready_accumulator(&mut self) -> Result<&mut StatAccumulator, XmcError> {
        let Some(accumulator) = self.accumulator.as_mut() else {
            return Err(XmcError::InputNotWritable {
                name: self.name.clone(),
            });
        };
        if self.state == ScenarioState::Unallocated {
            return Err(XmcError::ScenarioNotStarted {
                name: self.name.clone(),
            });
        }
        Ok(accumulator)
    }
}

/// Textual model field; later writes overwrite earlier ones
#[derive(Debug, Clone)]
pub struct StringVariable {
    name: String,
    title: String,
    role: Role,
    cardinality: Cardinality,
    state: ScenarioState,
    last: Vec<String>,
}

impl StringVariable {
    pub fn new(
        ctx: &ModelContext,
        name: impl Into<String>,
        title: impl Into<String>,
        role: Role,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            role,
            cardinality,
            state: ScenarioState::Unallocated,
            last: vec![String::new(); cardinality.slot_count(ctx)],
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn cardinality(&self) -> Cardinality {
        self.cardinality
    }

    pub fn slot_count(&self) -> usize {
        self.last.len()
    }

    pub fn state(&self) -> ScenarioState {
        self.state
    }

    pub fn write(&mut self, key: usize, value: impl Into<String>) -> Result<(), XmcError> {
        if self.role == Role::Input {
            return Err(XmcError::InputNotWritable {
                name: self.name.clone(),
            });
        }
        if self.state == ScenarioState::Unallocated {
            return Err(XmcError::ScenarioNotStarted {
                name: self.name.clone(),
            });
        }
        check_key(&self.name, key, self.last.len())?;
        self.last[key] = value.into();
        self.state = ScenarioState::Populated;
        Ok(())
    }

    pub fn assign(&mut self, key: usize, value: impl Into<String>) -> Result<(), XmcError> {
        if self.role != Role::Input {
            return Err(XmcError::NotAnInput {
                name: self.name.clone(),
            });
        }
        check_key(&self.name, key, self.last.len())?;
        self.last[key] = value.into();
        Ok(())
    }

    /// Current text at `key`; empty if never written.
    pub fn read(&self, key: usize) -> Result<&str, XmcError> {
        check_key(&self.name, key, self.last.len())?;
        Ok(&self.last[key])
    }

    pub fn scenario_reset(&mut self) {
        if self.role == Role::Input {
            return;
        }
        for slot in self.last.iter_mut() {
            slot.clear();
        }
        self.state = ScenarioState::Ready;
    }

    pub fn run_reset(&mut self) {}
}

/// Second presentation of an existing numeric or string variable.
///
/// Holds the original's registry id, never its data. Identity is copied at
/// creation since it cannot change afterwards.
#[derive(Debug, Clone)]
pub struct VariableAlias {
    name: String,
    title: String,
    role: Role,
    cardinality: Cardinality,
    original: VarId,
}

impl VariableAlias {
    pub(crate) fn new(original_id: VarId, original: &Variable) -> Result<Self, XmcError> {
        let (role, cardinality) = match original {
            Variable::Numeric(v) => (v.role(), v.cardinality()),
            Variable::Text(v) => (v.role(), v.cardinality()),
            Variable::Alias(_) | Variable::Header(_) => {
                return Err(XmcError::InvalidAliasTarget {
                    name: original.name().to_string(),
                })
            }
        };

        Ok(Self {
            name: original.name().to_string(),
            title: original.title().to_string(),
            role,
            cardinality,
            original: original_id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn original(&self) -> VarId {
        self.original
    }

    pub(crate) fn reject_write(&self) -> XmcError {
        XmcError::ImmutableAlias {
            name: self.name.clone(),
        }
    }
}

/// Labelled report row with no data
#[derive(Debug, Clone)]
pub struct HeaderMarker {
    name: String,
    title: String,
}

impl HeaderMarker {
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

#[derive(Debug, Clone)]
pub enum Variable {
    Numeric(NumericVariable),
    Text(StringVariable),
    Alias(VariableAlias),
    Header(HeaderMarker),
}

impl Variable {
    pub fn name(&self) -> &str {
        match self {
            Variable::Numeric(v) => v.name(),
            Variable::Text(v) => v.name(),
            Variable::Alias(v) => v.name(),
            Variable::Header(v) => v.name(),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Variable::Numeric(v) => v.title(),
            Variable::Text(v) => v.title(),
            Variable::Alias(v) => v.title(),
            Variable::Header(v) => v.title(),
        }
    }

    pub fn kind(&self) -> VariableKind {
        match self {
            Variable::Numeric(_) => VariableKind::Numeric,
            Variable::Text(_) => VariableKind::Text,
            Variable::Alias(_) => VariableKind::Alias,
            Variable::Header(_) => VariableKind::Header,
        }
    }

    /// `None` for headers, which carry identity only.
    pub fn role(&self) -> Option<Role> {
        match self {
            Variable::Numeric(v) => Some(v.role()),
            Variable::Text(v) => Some(v.role()),
            Variable::Alias(v) => Some(v.role),
            Variable::Header(_) => None,
        }
    }

    pub fn cardinality(&self) -> Option<Cardinality> {
        match self {
            Variable::Numeric(v) => Some(v.cardinality()),
            Variable::Text(v) => Some(v.cardinality()),
            Variable::Alias(v) => Some(v.cardinality),
            Variable::Header(_) => None,
        }
    }

    /// Aliases and headers own nothing to reset.
    pub fn scenario_reset(&mut self) {
        match self {
            Variable::Numeric(v) => v.scenario_reset(),
            Variable::Text(v) => v.scenario_reset(),
            Variable::Alias(_) | Variable::Header(_) => {}
        }
    }

    pub fn run_reset(&mut self) {
        match self {
            Variable::Numeric(v) => v.run_reset(),
            Variable::Text(v) => v.run_reset(),
            Variable::Alias(_) | Variable::Header(_) => {}
        }
    }
}
