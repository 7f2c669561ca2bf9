//! Functionality for simulating a facility with a given amount of solar power and batteries.
use crate::allocation::{Allocation, AllocationInput};
use crate::cost::{CostBreakdown, calculate_cost};
use crate::demand::forecast_demand;
use crate::model::Model;
use crate::output::DataWriter;
use crate::series::scale_production;
use crate::units::{Money, Power};
use anyhow::{Context, Result, ensure};
use log::{debug, info};
use std::fmt;
use std::path::Path;

/// A configuration of the facility
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    /// Installed solar power
    pub solar_power: Power,
    /// Number of batteries. Fractional values scale capacity and power proportionally.
    pub num_batteries: f64,
}

impl Scenario {
    /// Create a new [`Scenario`], checking that both quantities are valid
    pub fn new(solar_power: f64, num_batteries: f64) -> Result<Self> {
        ensure!(
            solar_power.is_finite() && solar_power >= 0.0,
            "Solar power must be a finite number greater than or equal to zero"
        );
        ensure!(
            num_batteries.is_finite() && num_batteries >= 0.0,
            "Number of batteries must be a finite number greater than or equal to zero"
        );

        Ok(Self {
            solar_power: Power(solar_power),
            num_batteries,
        })
    }
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} kW of solar power and {} batteries",
            self.solar_power, self.num_batteries
        )
    }
}

/// The outcome of simulating a single year
#[derive(Debug, Clone, PartialEq)]
pub struct YearResult {
    /// The simulated year
    pub year: u32,
    /// How energy was allocated in each hour
    pub allocation: Allocation,
    /// The cost of the year
    pub cost: CostBreakdown,
}

/// Simulate a single year: forecast demand, allocate energy and work out the cost
pub fn simulate_year(model: &Model, scenario: &Scenario, year: u32) -> Result<YearResult> {
    let economics = &model.economics;
    let demand = forecast_demand(&model.demand, year, economics.growth_per_year);
    let production = scale_production(&model.production, scenario.solar_power.value());
    let battery = economics.battery_config(scenario.num_batteries)?;
    let input = AllocationInput::new(
        &demand.values,
        &production,
        &model.tariff,
        &battery,
        economics.max_selling_power,
    )?;

    let allocation = model.parameters.strategy.allocate(&input)?;
    let cost = calculate_cost(
        &allocation,
        &model.tariff,
        economics.nominal_battery_capacity(scenario.num_batteries),
        scenario.solar_power,
        economics,
    );
    debug!("Cost for {year} with {scenario}: {}", cost.total());

    Ok(YearResult {
        year,
        allocation,
        cost,
    })
}

/// Simulate every year of the model's horizon
pub fn simulate(model: &Model, scenario: &Scenario) -> Result<Vec<YearResult>> {
    model
        .iter_years()
        .map(|year| {
            simulate_year(model, scenario, year)
                .with_context(|| format!("Failed to simulate year {year}"))
        })
        .collect()
}

/// The total cost of a scenario over the model's horizon
pub fn evaluate_scenario(model: &Model, scenario: &Scenario) -> Result<Money> {
    let results = simulate(model, scenario)?;

    Ok(results.iter().map(|result| result.cost.total()).sum())
}

/// Run the simulation for a single scenario, writing results to `output_path`.
///
/// # Arguments:
///
/// * `model` - The model to run
/// * `scenario` - The facility configuration
/// * `output_path` - The folder to which output files will be written
pub fn run(model: &Model, scenario: &Scenario, output_path: &Path) -> Result<Money> {
    let mut writer = DataWriter::create(output_path, &model.model_path)?;

    let mut total = Money(0.0);
    for year in model.iter_years() {
        info!("Simulating year: {year}");
        let result = simulate_year(model, scenario, year)
            .with_context(|| format!("Failed to simulate year {year}"))?;
        info!("Cost for {year}: {}", result.cost.total());

        writer.write_allocation(year, &result.allocation)?;
        writer.write_cost(year, &result.cost)?;
        total += result.cost.total();
    }
    writer.flush()?;

    Ok(total)
}
