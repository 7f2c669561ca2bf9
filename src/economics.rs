//! Economic and technical parameters shared by every simulation in a model.
use crate::battery::BatteryConfig;
use crate::units::{Dimensionless, Energy, MoneyPerEnergy, MoneyPerPower, Power};
use anyhow::{Result, ensure};
use log::warn;

/// Economic and technical constants for a model.
///
/// All rates are normalised to kW/kWh-based units when the parameters are loaded. Opex rates are
/// per year.
#[derive(Debug, Clone, PartialEq)]
pub struct EconomicParams {
    /// Yearly growth factor for demand (e.g. 1.028)
    pub growth_per_year: Dimensionless,
    /// Nominal energy capacity of a single battery
    pub battery_capacity: Energy,
    /// Maximum charge or discharge power of a single battery
    pub battery_power: Power,
    /// Fraction of charged energy which can later be discharged
    pub battery_efficiency: Dimensionless,
    /// Fraction of nominal capacity which may actually be used (depth of discharge)
    pub battery_depth: Dimensionless,
    /// Capital cost per kWh of nominal battery capacity
    pub battery_capex: MoneyPerEnergy,
    /// Yearly operating cost per kWh of nominal battery capacity
    pub battery_opex: MoneyPerEnergy,
    /// Expected capital cost per kWh of batteries bought as replacements
    pub future_battery_capex: MoneyPerEnergy,
    /// Fraction of the battery bank replaced over the facility's lifespan
    pub battery_replacement_fraction: Dimensionless,
    /// Capital cost per kW of installed solar power
    pub pv_capex: MoneyPerPower,
    /// Yearly operating cost per kW of installed solar power
    pub pv_opex: MoneyPerPower,
    /// Lifespan of the facility in years
    pub lifespan: u32,
    /// Fraction of the investment financed with a loan
    pub loan_fraction: Dimensionless,
    /// Yearly interest rate on the loan
    pub loan_interest_rate: Dimensionless,
    /// Term of the loan in years
    pub loan_term: u32,
    /// Yearly return required by the entrepreneur on the equity portion of the investment
    pub entrepreneur_return: Dimensionless,
    /// Maximum power which can be sold to the grid
    pub max_selling_power: Power,
}

/// Check that a value is finite and not negative
fn check_non_negative(name: &str, value: f64) -> Result<()> {
    ensure!(
        value.is_finite() && value >= 0.0,
        "{name} must be a finite number greater than or equal to zero"
    );

    Ok(())
}

/// Check that a value lies in (0, 1]
fn check_proportion_nonzero(name: &str, value: Dimensionless) -> Result<()> {
    ensure!(
        value.value() > 0.0 && value.value() <= 1.0,
        "{name} must be greater than 0 and less than or equal to 1"
    );

    Ok(())
}

/// Check that a value lies in [0, 1]
fn check_proportion(name: &str, value: Dimensionless) -> Result<()> {
    ensure!(
        (0.0..=1.0).contains(&value.value()),
        "{name} must be between 0 and 1"
    );

    Ok(())
}

impl EconomicParams {
    /// Validate parameters after reading them in
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.growth_per_year.is_finite() && self.growth_per_year.value() > 0.0,
            "growth_per_year must be a finite number greater than zero"
        );
        if self.growth_per_year.value() < 0.5 || self.growth_per_year.value() > 1.5 {
            warn!(
                "growth_per_year is {}. Note that this is a yearly growth factor (e.g. 1.028 for \
                2.8% growth), not a percentage.",
                self.growth_per_year
            );
        }

        check_non_negative("battery_capacity", self.battery_capacity.value())?;
        check_non_negative("battery_power", self.battery_power.value())?;
        check_proportion_nonzero("battery_efficiency", self.battery_efficiency)?;
        check_proportion_nonzero("battery_depth", self.battery_depth)?;
        check_non_negative("battery_capex", self.battery_capex.value())?;
        check_non_negative("battery_opex", self.battery_opex.value())?;
        check_non_negative("future_battery_capex", self.future_battery_capex.value())?;
        check_non_negative(
            "battery_replacement_fraction",
            self.battery_replacement_fraction.value(),
        )?;
        check_non_negative("pv_capex", self.pv_capex.value())?;
        check_non_negative("pv_opex", self.pv_opex.value())?;
        ensure!(self.lifespan > 0, "lifespan cannot be zero");
        check_proportion("loan_fraction", self.loan_fraction)?;
        check_non_negative("loan_interest_rate", self.loan_interest_rate.value())?;
        ensure!(self.loan_term > 0, "loan_term cannot be zero");
        if self.loan_term > self.lifespan {
            warn!(
                "loan_term ({} years) is longer than the facility's lifespan ({} years)",
                self.loan_term, self.lifespan
            );
        }
        check_non_negative("entrepreneur_return", self.entrepreneur_return.value())?;
        check_non_negative("max_selling_power", self.max_selling_power.value())?;

        Ok(())
    }

    /// Nominal capacity of a bank of `num_batteries` batteries, as priced by the cost model
    pub fn nominal_battery_capacity(&self, num_batteries: f64) -> Energy {
        self.battery_capacity * Dimensionless(num_batteries)
    }

    /// The physical limits of a bank of `num_batteries` batteries
    pub fn battery_config(&self, num_batteries: f64) -> Result<BatteryConfig> {
        BatteryConfig::new(
            self.nominal_battery_capacity(num_batteries) * self.battery_depth,
            self.battery_power * Dimensionless(num_batteries),
            self.battery_efficiency,
        )
    }
}
