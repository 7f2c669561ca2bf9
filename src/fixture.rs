//! Fixtures for tests

use crate::allocation::Strategy;
use crate::battery::BatteryConfig;
use crate::economics::EconomicParams;
use crate::model::{Model, ModelParameters};
use crate::series::{DemandSeries, Tariff};
use crate::units::{Dimensionless, Energy, MoneyPerEnergy, MoneyPerPower, Power};
use rstest::fixture;
use std::iter;
use std::path::PathBuf;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Parameters with every cost and rate set to zero
#[fixture]
pub fn economic_params() -> EconomicParams {
    EconomicParams {
        growth_per_year: Dimensionless(1.0),
        battery_capacity: Energy(10.0),
        battery_power: Power(5.0),
        battery_efficiency: Dimensionless(0.9),
        battery_depth: Dimensionless(1.0),
        battery_capex: MoneyPerEnergy(0.0),
        battery_opex: MoneyPerEnergy(0.0),
        future_battery_capex: MoneyPerEnergy(0.0),
        battery_replacement_fraction: Dimensionless(0.0),
        pv_capex: MoneyPerPower(0.0),
        pv_opex: MoneyPerPower(0.0),
        lifespan: 20,
        loan_fraction: Dimensionless(0.0),
        loan_interest_rate: Dimensionless(0.0),
        loan_term: 10,
        entrepreneur_return: Dimensionless(0.0),
        max_selling_power: Power(0.0),
    }
}

#[fixture]
pub fn battery() -> BatteryConfig {
    BatteryConfig::new(Energy(20.0), Power(5.0), Dimensionless(0.9)).unwrap()
}

/// Two days of prices: a two-level tariff with an evening peak, then a flat day
#[fixture]
pub fn tariff() -> Tariff {
    let peak: Vec<_> = (0..48).map(|h| (17..22).contains(&h)).collect();
    let buy = peak
        .iter()
        .take(24)
        .map(|&p| if p { 0.6 } else { 0.2 })
        .chain(iter::repeat_n(0.3, 24))
        .collect();
    let sell = peak.iter().map(|&p| if p { 0.5 } else { 0.1 }).collect();

    Tariff::new(buy, sell, peak).unwrap()
}

/// A two-day model with flat demand and solar production through the middle of the day
#[fixture]
pub fn model(economic_params: EconomicParams, tariff: Tariff) -> Model {
    Model {
        model_path: PathBuf::from("model"),
        parameters: ModelParameters {
            simulated_year: 2020,
            strategy: Strategy::Greedy,
            horizon_years: 1,
            search: None,
        },
        economics: economic_params,
        demand: DemandSeries {
            year: 2020,
            values: vec![5.0; 48],
        },
        production: (0..48)
            .map(|hour| match hour % 24 {
                8..=16 => 0.5,
                _ => 0.0,
            })
            .collect(),
        tariff,
    }
}
