//! Scenario Report Example
//!
//! Builds a small project-finance model, runs a deterministic base case and a
//! Monte Carlo scenario, and prints the report cells as CSV on stdout.

use std::error::Error;
use std::io;

use csv::Writer;
use rand::Rng;
use rand_distr::{Distribution, Normal};
use xmc::{
    run_scenario, Cardinality, ModelConfig, ModelContext, Role, ScenarioConfig, Value,
    VariableRegistry, XmcError,
};

#[derive(Debug, serde::Serialize)]
struct ReportRow<'a> {
    scenario: &'a str,
    title: &'a str,
    key: usize,
    value: String,
    spread: String,
}

fn main() -> Result<(), Box<dyn Error>> {
    let context = ModelContext::from_config(&ModelConfig {
        period_count: 5,
        ..ModelConfig::default()
    })?;
    let mut registry = VariableRegistry::new(context);

    registry.add_header("assumptions", "Assumptions")?;
    let unit_capex =
        registry.add_numeric("unit_capex", "Unit capex", Role::Input, Cardinality::Scalar)?;
    let site = registry.add_string("site", "Site", Role::Input, Cardinality::Scalar)?;
    registry.add_header("results", "Results")?;
    let capex =
        registry.add_numeric("capex", "Capex", Role::Output, Cardinality::TimeSeries)?;
    let npv = registry.add_numeric("npv", "NPV", Role::Output, Cardinality::Scalar)?;
    let phase =
        registry.add_string("phase", "Phase", Role::Output, Cardinality::TimeSeries)?;
    registry.add_header("summary", "Summary")?;
    registry.add_alias(npv)?;

    registry.assign_number(unit_capex, 0, 250.0)?;
    registry.assign_text(site, 0, "North")?;

    let periods = registry.context().period_count();
    let cost_noise = Normal::new(1.0, 0.15)?;
    let mut writer = Writer::from_writer(io::stdout());

    for config in [
        ScenarioConfig {
            name: "base".to_string(),
            runs: 1,
            seed: 1,
        },
        ScenarioConfig {
            name: "monte_carlo".to_string(),
            runs: 2000,
            seed: 42,
        },
    ] {
        let stochastic = config.runs > 1;
        run_scenario(&mut registry, &config, |reg, rng, _| {
            let unit = reg.numeric(unit_capex)?.read(0)?;
            let mut total = 0.0;
            for year in 0..periods {
                let factor = if stochastic {
                    cost_noise.sample(rng)
                } else {
                    1.0
                };
                let spend = unit * factor / (1.0 + year as f64);
                total += spend / 1.08_f64.powi(year as i32);
                reg.write_number(capex, year, spend)?;
                let label = if year < 2 || rng.gen_bool(0.1) {
                    "build"
                } else {
                    "operate"
                };
                reg.write_text(phase, year, label)?;
            }
            reg.write_number(npv, 0, 900.0 - total)
        })?;

        write_report(&mut writer, &config.name, &registry)?;
    }

    writer.flush()?;
    Ok(())
}

fn write_report<W: io::Write>(
    writer: &mut Writer<W>,
    scenario: &str,
    registry: &VariableRegistry,
) -> Result<(), Box<dyn Error>> {
    for (id, variable) in registry.iter() {
        let keys = match variable.cardinality() {
            Some(Cardinality::TimeSeries) => registry.context().period_count(),
            _ => 1,
        };
        for key in 0..keys {
            let value = cell_text(registry.report_cell(id, key));
            let spread = match registry.report_spread(id, key) {
                Ok(Some(cell)) => cell_text(Ok(cell)),
                Ok(None) => String::new(),
                Err(error) => cell_text(Err(error)),
            };
            writer.serialize(ReportRow {
                scenario,
                title: variable.title(),
                key,
                value,
                spread,
            })?;
        }
    }
    Ok(())
}

/// Report errors as placeholders rather than aborting the sheet.
fn cell_text(cell: Result<Value, XmcError>) -> String {
    match cell {
        Ok(Value::Number(x)) => format!("{x:.2}"),
        Ok(Value::Text(s)) => s,
        Ok(Value::Empty) => String::new(),
        Err(_) => "n/a".to_string(),
    }
}
