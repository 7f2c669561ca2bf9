//! Code for forecasting demand in future years.
use crate::series::DemandSeries;
use crate::units::Dimensionless;

/// Scale a reference demand curve to `target_year` using a compound annual growth factor.
///
/// Every hour is multiplied by `growth_per_year^(target_year − reference_year)`, so a target year
/// before the reference year shrinks demand.
///
/// # Arguments
///
/// * `demand` - Demand curve for its reference year
/// * `target_year` - The year to forecast demand for
/// * `growth_per_year` - Yearly growth factor (e.g. 1.028 for 2.8% growth a year)
pub fn forecast_demand(
    demand: &DemandSeries,
    target_year: u32,
    growth_per_year: Dimensionless,
) -> DemandSeries {
    let years = i64::from(target_year) - i64::from(demand.year);
    let factor = growth_per_year.value().powi(years as i32);

    DemandSeries {
        year: target_year,
        values: demand.values.iter().map(|value| value * factor).collect(),
    }
}
