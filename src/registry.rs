//! Variable registry
//!
//! Ordered collection of variables for one report session. Aliases refer to
//! their original by [`VarId`]; variables are never removed, so an id stays
//! valid for the registry's lifetime.
//!
//! `mean`, `variance`, `stddev` and `sample_count` ignore the aggregation
//! mode; only `report_cell` and `report_spread` apply it.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::context::{AggregationMode, ModelContext};
use crate::variable::{
    Cardinality, HeaderMarker, NumericVariable, Role, StringVariable, Value, Variable,
    VariableAlias, VariableKind,
};
use crate::XmcError;

/// Position of a variable in its registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct VarId(usize);

impl VarId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// What the reporting layer needs to lay out one row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableSummary {
    pub id: VarId,
    pub name: String,
    pub title: String,
    pub kind: VariableKind,
    pub role: Option<Role>,
    pub cardinality: Option<Cardinality>,
    /// Set for aliases only
    pub original: Option<VarId>,
}

#[derive(Debug, Clone, Default)]
pub struct VariableRegistry {
    context: ModelContext,
    variables: Vec<Variable>,
    by_name: HashMap<String, VarId>,
}

impl VariableRegistry {
    pub fn new(context: ModelContext) -> Self {
        Self {
            context,
            variables: Vec::new(),
            by_name: HashMap::new(),
        }
    }

    pub fn context(&self) -> &ModelContext {
        &self.context
    }

    pub fn set_aggregation_mode(&mut self, mode: AggregationMode) {
        if self.context.aggregation_mode() != mode {
            debug!(?mode, "aggregation mode changed");
        }
        self.context.set_aggregation_mode(mode);
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (VarId, &Variable)> {
        self.variables
            .iter()
            .enumerate()
            .map(|(idx, v)| (VarId(idx), v))
    }

    pub fn get(&self, id: VarId) -> Result<&Variable, XmcError> {
        self.variables
            .get(id.0)
            .ok_or_else(|| XmcError::UnknownVariable(format!("#{}", id.0)))
    }

    fn get_mut(&mut self, id: VarId) -> Result<&mut Variable, XmcError> {
        self.variables
            .get_mut(id.0)
            .ok_or_else(|| XmcError::UnknownVariable(format!("#{}", id.0)))
    }

    /// Look up a numeric, string or header variable by name.
    pub fn id_of(&self, name: &str) -> Result<VarId, XmcError> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| XmcError::UnknownVariable(name.to_string()))
    }

    pub fn add_numeric(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        role: Role,
        cardinality: Cardinality,
    ) -> Result<VarId, XmcError> {
        let variable = NumericVariable::new(&self.context, name, title, role, cardinality);
        self.push_named(Variable::Numeric(variable))
    }

    pub fn add_string(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
        role: Role,
        cardinality: Cardinality,
    ) -> Result<VarId, XmcError> {
        let variable = StringVariable::new(&self.context, name, title, role, cardinality);
        self.push_named(Variable::Text(variable))
    }

    pub fn add_header(
        &mut self,
        name: impl Into<String>,
        title: impl Into<String>,
    ) -> Result<VarId, XmcError> {
        self.push_named(Variable::Header(HeaderMarker::new(name, title)))
    }

    /// Show `original` again at a later report position.
    pub fn add_alias(&mut self, original: VarId) -> Result<VarId, XmcError> {
        let alias = VariableAlias::new(original, self.get(original)?)?;
        let id = VarId(self.variables.len());
        self.variables.push(Variable::Alias(alias));
        Ok(id)
    }

    fn push_named(&mut self, variable: Variable) -> Result<VarId, XmcError> {
        if self.by_name.contains_key(variable.name()) {
            return Err(XmcError::DuplicateName(variable.name().to_string()));
        }
        let id = VarId(self.variables.len());
        self.by_name.insert(variable.name().to_string(), id);
        self.variables.push(variable);
        Ok(id)
    }

    /// Follow an alias to the variable that owns the data.
    pub fn resolve(&self, id: VarId) -> Result<&Variable, XmcError> {
        match self.get(id)? {
            Variable::Alias(alias) => self.get(alias.original()),
            other => Ok(other),
        }
    }

    pub fn numeric(&self, id: VarId) -> Result<&NumericVariable, XmcError> {
        match self.resolve(id)? {
            Variable::Numeric(v) => Ok(v),
            other => Err(XmcError::TypeMismatch {
                name: other.name().to_string(),
                expected: "numeric",
            }),
        }
    }

    pub fn string(&self, id: VarId) -> Result<&StringVariable, XmcError> {
        match self.resolve(id)? {
            Variable::Text(v) => Ok(v),
            other => Err(XmcError::TypeMismatch {
                name: other.name().to_string(),
                expected: "string",
            }),
        }
    }

    /// Writable numeric target; aliases are refused before anything else.
    fn numeric_mut(&mut self, id: VarId) -> Result<&mut NumericVariable, XmcError> {
        match self.get_mut(id)? {
            Variable::Numeric(v) => Ok(v),
            Variable::Alias(alias) => Err(alias.reject_write()),
            other => Err(XmcError::TypeMismatch {
                name: other.name().to_string(),
                expected: "numeric",
            }),
        }
    }

    fn string_mut(&mut self, id: VarId) -> Result<&mut StringVariable, XmcError> {
        match self.get_mut(id)? {
            Variable::Text(v) => Ok(v),
            Variable::Alias(alias) => Err(alias.reject_write()),
            other => Err(XmcError::TypeMismatch {
                name: other.name().to_string(),
                expected: "string",
            }),
        }
    }

    /// Raw last observation; headers read as [`Value::Empty`].
    pub fn read(&self, id: VarId, key: usize) -> Result<Value, XmcError> {
        match self.resolve(id)? {
            Variable::Numeric(v) => v.read(key).map(Value::Number),
            Variable::Text(v) => v.read(key).map(|s| Value::Text(s.to_string())),
            Variable::Header(_) | Variable::Alias(_) => Ok(Value::Empty),
        }
    }

    /// One run's observation for a numeric output. Writing to a header is a no-op.
    pub fn write_number(&mut self, id: VarId, key: usize, value: f64) -> Result<(), XmcError> {
        if let Variable::Header(_) = self.get(id)? {
            return Ok(());
        }
        self.numeric_mut(id)?.write(key, value)
    }

    pub fn write_text(
        &mut self,
        id: VarId,
        key: usize,
        value: impl Into<String>,
    ) -> Result<(), XmcError> {
        if let Variable::Header(_) = self.get(id)? {
            return Ok(());
        }
        self.string_mut(id)?.write(key, value)
    }

    pub fn assign_number(&mut self, id: VarId, key: usize, value: f64) -> Result<(), XmcError> {
        self.numeric_mut(id)?.assign(key, value)
    }

    pub fn assign_text(
        &mut self,
        id: VarId,
        key: usize,
        value: impl Into<String>,
    ) -> Result<(), XmcError> {
        self.string_mut(id)?.assign(key, value)
    }

    fn stats_source(&self, id: VarId) -> Result<&NumericVariable, XmcError> {
        match self.resolve(id)? {
            Variable::Numeric(v) => Ok(v),
            other => Err(XmcError::NoStatistics {
                name: other.name().to_string(),
            }),
        }
    }

    pub fn mean(&self, id: VarId, key: usize) -> Result<f64, XmcError> {
        self.stats_source(id)?.mean(key)
    }

    pub fn variance(&self, id: VarId, key: usize) -> Result<f64, XmcError> {
        self.stats_source(id)?.variance(key)
    }

    pub fn stddev(&self, id: VarId, key: usize) -> Result<f64, XmcError> {
        self.stats_source(id)?.stddev(key)
    }

    pub fn sample_count(&self, id: VarId, key: usize) -> Result<u64, XmcError> {
        self.stats_source(id)?.sample_count(key)
    }

    /// Value for the main report sheet: the raw value for a single run, the
    /// mean of a numeric output once runs are aggregated.
    pub fn report_cell(&self, id: VarId, key: usize) -> Result<Value, XmcError> {
        if self.context.aggregation_mode() == AggregationMode::Aggregated {
            if let Variable::Numeric(v) = self.resolve(id)? {
                if v.role() == Role::Output {
                    return v.mean(key).map(Value::Number);
                }
            }
        }
        self.read(id, key)
    }

    /// Value for the spread (standard deviation) sheet, which only exists in
    /// aggregated mode. Text repeats as-is; numeric inputs carry no spread.
    pub fn report_spread(&self, id: VarId, key: usize) -> Result<Option<Value>, XmcError> {
        if self.context.aggregation_mode() == AggregationMode::SingleRun {
            return Ok(None);
        }

        let cell = match self.resolve(id)? {
            Variable::Numeric(v) if v.role() == Role::Output => Value::Number(v.stddev(key)?),
            Variable::Numeric(_) | Variable::Header(_) | Variable::Alias(_) => Value::Empty,
            Variable::Text(v) => Value::Text(v.read(key)?.to_string()),
        };
        Ok(Some(cell))
    }

    pub fn summaries(&self) -> Vec<VariableSummary> {
        self.iter()
            .map(|(id, v)| VariableSummary {
                id,
                name: v.name().to_string(),
                title: v.title().to_string(),
                kind: v.kind(),
                role: v.role(),
                cardinality: v.cardinality(),
                original: match v {
                    Variable::Alias(alias) => Some(alias.original()),
                    _ => None,
                },
            })
            .collect()
    }

    /// Start a new scenario on every variable; inputs keep their values.
    pub fn scenario_reset(&mut self) {
        for variable in self.variables.iter_mut() {
            variable.scenario_reset();
        }
        debug!(variables = self.variables.len(), "scenario reset");
    }

    pub fn run_reset(&mut self) {
        for variable in self.variables.iter_mut() {
            variable.run_reset();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> VariableRegistry {
        VariableRegistry::new(ModelContext::new(3).unwrap())
    }

    #[test]
    fn iteration_keeps_insertion_order() {
        let mut reg = registry();
        reg.add_header("inputs", "Inputs").unwrap();
        let rate = reg
            .add_numeric("rate", "Discount rate", Role::Input, Cardinality::Scalar)
            .unwrap();
        reg.add_numeric("cash", "Cash flow", Role::Output, Cardinality::TimeSeries)
            .unwrap();
        reg.add_alias(rate).unwrap();

        let names: Vec<&str> = reg.iter().map(|(_, v)| v.name()).collect();
        assert_eq!(names, ["inputs", "rate", "cash", "rate"]);
        assert_eq!(reg.len(), 4);
        assert_eq!(reg.id_of("cash").unwrap().index(), 2);
        assert!(matches!(
            reg.id_of("missing"),
            Err(XmcError::UnknownVariable(_))
        ));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut reg = registry();
        reg.add_numeric("npv", "NPV", Role::Output, Cardinality::Scalar)
            .unwrap();
        assert_eq!(
            reg.add_string("npv", "NPV text", Role::Output, Cardinality::Scalar),
            Err(XmcError::DuplicateName("npv".to_string()))
        );
    }

    #[test]
    fn alias_forwards_reads_and_refuses_writes() {
        let mut reg = registry();
        let npv = reg
            .add_numeric("npv", "NPV", Role::Output, Cardinality::Scalar)
            .unwrap();
        let copy = reg.add_alias(npv).unwrap();
        reg.scenario_reset();
        for x in [1.0, 2.0, 6.0] {
            reg.write_number(npv, 0, x).unwrap();
        }

        assert_eq!(reg.read(copy, 0).unwrap(), reg.read(npv, 0).unwrap());
        assert_eq!(reg.mean(copy, 0).unwrap(), reg.mean(npv, 0).unwrap());
        assert_eq!(reg.variance(copy, 0).unwrap(), reg.variance(npv, 0).unwrap());
        assert_eq!(reg.sample_count(copy, 0).unwrap(), 3);

        assert_eq!(
            reg.write_number(copy, 0, 100.0),
            Err(XmcError::ImmutableAlias {
                name: "npv".to_string()
            })
        );
        assert_eq!(reg.sample_count(npv, 0).unwrap(), 3);
        assert_eq!(reg.read(npv, 0).unwrap(), Value::Number(6.0));
    }

    #[test]
    fn alias_of_string_and_invalid_targets() {
        let mut reg = registry();
        let label = reg
            .add_string("label", "Label", Role::Output, Cardinality::Scalar)
            .unwrap();
        let header = reg.add_header("h", "Header").unwrap();
        let alias = reg.add_alias(label).unwrap();
        reg.scenario_reset();
        reg.write_text(label, 0, "base").unwrap();
        assert_eq!(reg.read(alias, 0).unwrap(), Value::Text("base".to_string()));
        assert!(matches!(
            reg.write_text(alias, 0, "x"),
            Err(XmcError::ImmutableAlias { .. })
        ));
        assert!(matches!(
            reg.add_alias(alias),
            Err(XmcError::InvalidAliasTarget { .. })
        ));
        assert!(matches!(
            reg.add_alias(header),
            Err(XmcError::InvalidAliasTarget { .. })
        ));
        assert!(matches!(
            reg.mean(alias, 0),
            Err(XmcError::NoStatistics { .. })
        ));
    }

    #[test]
    fn alias_resets_nothing_but_sees_original_reset() {
        let mut reg = registry();
        let cash = reg
            .add_numeric("cash", "Cash", Role::Output, Cardinality::TimeSeries)
            .unwrap();
        let copy = reg.add_alias(cash).unwrap();
        reg.scenario_reset();
        reg.write_number(cash, 1, 9.0).unwrap();
        reg.scenario_reset();
        assert_eq!(reg.sample_count(copy, 1).unwrap(), 0);
    }

    #[test]
    fn header_reads_empty_and_ignores_writes() {
        let mut reg = registry();
        let h = reg.add_header("section", "Section").unwrap();
        reg.scenario_reset();
        assert_eq!(reg.read(h, 0).unwrap(), Value::Empty);
        assert!(reg.write_number(h, 0, 1.0).is_ok());
        assert!(reg.write_text(h, 0, "x").is_ok());
        assert!(matches!(reg.stddev(h, 0), Err(XmcError::NoStatistics { .. })));
    }

    #[test]
    fn type_mismatch_on_wrong_write() {
        let mut reg = registry();
        let npv = reg
            .add_numeric("npv", "NPV", Role::Output, Cardinality::Scalar)
            .unwrap();
        reg.scenario_reset();
        assert!(matches!(
            reg.write_text(npv, 0, "oops"),
            Err(XmcError::TypeMismatch {
                expected: "string",
                ..
            })
        ));
        assert!(matches!(reg.string(npv), Err(XmcError::TypeMismatch { .. })));
        assert!(reg.numeric(npv).is_ok());
    }

    #[test]
    fn input_is_exempt_from_reset_and_statistics() {
        let mut reg = registry();
        let rate = reg
            .add_numeric("rate", "Rate", Role::Input, Cardinality::Scalar)
            .unwrap();
        reg.assign_number(rate, 0, 0.035).unwrap();
        reg.scenario_reset();
        assert_eq!(reg.read(rate, 0).unwrap(), Value::Number(0.035));
        assert!(matches!(
            reg.write_number(rate, 0, 0.04),
            Err(XmcError::InputNotWritable { .. })
        ));
        assert!(matches!(
            reg.sample_count(rate, 0),
            Err(XmcError::NoStatistics { .. })
        ));
    }

    #[test]
    fn report_cells_follow_aggregation_mode() {
        let mut reg = registry();
        let rate = reg
            .add_numeric("rate", "Rate", Role::Input, Cardinality::Scalar)
            .unwrap();
        let cash = reg
            .add_numeric("cash", "Cash", Role::Output, Cardinality::TimeSeries)
            .unwrap();
        let note = reg
            .add_string("note", "Note", Role::Output, Cardinality::Scalar)
            .unwrap();
        reg.assign_number(rate, 0, 0.05).unwrap();
        reg.scenario_reset();
        reg.write_text(note, 0, "ok").unwrap();
        for x in [10.0, 20.0, 30.0] {
            reg.write_number(cash, 2, x).unwrap();
        }

        assert_eq!(reg.report_cell(cash, 2).unwrap(), Value::Number(30.0));
        assert_eq!(reg.report_spread(cash, 2).unwrap(), None);

        reg.set_aggregation_mode(AggregationMode::Aggregated);
        assert_eq!(reg.report_cell(cash, 2).unwrap(), Value::Number(20.0));
        assert_eq!(reg.report_spread(cash, 2).unwrap(), Some(Value::Number(10.0)));
        assert_eq!(reg.report_cell(rate, 0).unwrap(), Value::Number(0.05));
        assert_eq!(reg.report_spread(rate, 0).unwrap(), Some(Value::Empty));
        assert_eq!(
            reg.report_spread(note, 0).unwrap(),
            Some(Value::Text("ok".to_string()))
        );
        assert!(matches!(
            reg.report_cell(cash, 0),
            Err(XmcError::NoSamples { key: 0, .. })
        ));
    }

    #[test]
    fn summaries_describe_rows() {
        let mut reg = registry();
        let h = reg.add_header("costs", "Costs").unwrap();
        let capex = reg
            .add_numeric("capex", "Capex", Role::Output, Cardinality::TimeSeries)
            .unwrap();
        reg.add_alias(capex).unwrap();

        let rows = reg.summaries();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, h);
        assert_eq!(rows[0].kind, VariableKind::Header);
        assert_eq!(rows[0].role, None);
        assert_eq!(rows[1].cardinality, Some(Cardinality::TimeSeries));
        assert_eq!(rows[2].kind, VariableKind::Alias);
        assert_eq!(rows[2].original, Some(capex));
        assert_eq!(rows[2].role, Some(Role::Output));

        let json = serde_json::to_value(&rows[1]).unwrap();
        assert_eq!(json["kind"], "numeric");
        assert_eq!(json["role"], "output");
        assert_eq!(json["cardinality"], "time_series");
    }
}
