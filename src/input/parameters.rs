//! Code for reading economic and technical parameters from a CSV file.
use super::{input_err_msg, read_csv};
use crate::economics::EconomicParams;
use crate::units::{Dimensionless, Energy, MoneyPerEnergy, MoneyPerPower, Power};
use anyhow::{Context, Result, bail, ensure};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

const PARAMETERS_FILE_NAME: &str = "parameters.csv";

/// Every parameter which must appear in the parameters file
const PARAMETER_NAMES: [&str; 17] = [
    "growth_per_year",
    "battery_capacity",
    "battery_power",
    "battery_efficiency",
    "battery_depth",
    "battery_capex",
    "battery_opex",
    "future_battery_capex",
    "battery_replacement_fraction",
    "pv_capex",
    "pv_opex",
    "lifespan",
    "loan_fraction",
    "loan_interest_rate",
    "loan_term",
    "entrepreneur_return",
    "max_selling_power",
];

/// A row of the parameters file
#[derive(Debug, PartialEq, Deserialize)]
struct ParameterRaw {
    parameter: String,
    value: f64,
    #[serde(default)]
    unit: String,
}

/// Convert a value given in MW-based units to kW-based units.
///
/// Rates per MW or MWh (e.g. `ILS/MWh`) are divided by 1000 and quantities in MW or MWh are
/// multiplied by 1000. Other units are left alone.
fn normalise_unit(value: f64, unit: &str) -> f64 {
    let unit = unit.trim().to_uppercase();
    if unit.contains("/MW") {
        value / 1000.0
    } else if unit.starts_with("MW") {
        value * 1000.0
    } else {
        value
    }
}

/// Parameter values, keyed by name, which are removed as they are used
struct ParameterValues(HashMap<String, f64>);

impl ParameterValues {
    fn take(&mut self, name: &str) -> Result<f64> {
        self.0
            .remove(name)
            .with_context(|| format!("Missing parameter {name}"))
    }

    /// Take a parameter which must be a whole number of years
    fn take_years(&mut self, name: &str) -> Result<u32> {
        let value = self.take(name)?;
        ensure!(
            value >= 0.0 && value.fract() == 0.0 && value <= f64::from(u32::MAX),
            "{name} must be a whole number of years, but got {value}"
        );

        Ok(value as u32)
    }
}

/// Build [`EconomicParams`] from the rows of a parameters file
fn read_economic_params_from_iter<I>(iter: I) -> Result<EconomicParams>
where
    I: Iterator<Item = ParameterRaw>,
{
    let mut values = HashMap::new();
    for raw in iter {
        ensure!(
            PARAMETER_NAMES.contains(&raw.parameter.as_str()),
            "Unknown parameter {}",
            raw.parameter
        );
        ensure!(
            raw.value.is_finite(),
            "Invalid value for parameter {}: {}",
            raw.parameter,
            raw.value
        );

        let value = normalise_unit(raw.value, &raw.unit);
        if values.insert(raw.parameter.clone(), value).is_some() {
            bail!("Duplicate entry for parameter {}", raw.parameter);
        }
    }

    let mut values = ParameterValues(values);
    let params = EconomicParams {
        growth_per_year: Dimensionless(values.take("growth_per_year")?),
        battery_capacity: Energy(values.take("battery_capacity")?),
        battery_power: Power(values.take("battery_power")?),
        battery_efficiency: Dimensionless(values.take("battery_efficiency")?),
        battery_depth: Dimensionless(values.take("battery_depth")?),
        battery_capex: MoneyPerEnergy(values.take("battery_capex")?),
        battery_opex: MoneyPerEnergy(values.take("battery_opex")?),
        future_battery_capex: MoneyPerEnergy(values.take("future_battery_capex")?),
        battery_replacement_fraction: Dimensionless(
            values.take("battery_replacement_fraction")?,
        ),
        pv_capex: MoneyPerPower(values.take("pv_capex")?),
        pv_opex: MoneyPerPower(values.take("pv_opex")?),
        lifespan: values.take_years("lifespan")?,
        loan_fraction: Dimensionless(values.take("loan_fraction")?),
        loan_interest_rate: Dimensionless(values.take("loan_interest_rate")?),
        loan_term: values.take_years("loan_term")?,
        entrepreneur_return: Dimensionless(values.take("entrepreneur_return")?),
        max_selling_power: Power(values.take("max_selling_power")?),
    };
    params.validate()?;

    Ok(params)
}

/// Read economic and technical parameters from the model directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// Validated parameters, converted to kW-based units
pub fn read_economic_params(model_dir: &Path) -> Result<EconomicParams> {
    let file_path = model_dir.join(PARAMETERS_FILE_NAME);
    let iter = read_csv::<ParameterRaw>(&file_path)?;
    read_economic_params_from_iter(iter).with_context(|| input_err_msg(&file_path))
}
