//! The yearly cost of running a facility with a given allocation of energy.
//!
//! Capital costs are spread evenly over the facility's lifespan. On top of these, the cost of
//! financing the investment is split between the interest paid on the loan and the return demanded
//! by the entrepreneur on the remaining equity, both annualised in the same way.
use crate::allocation::Allocation;
use crate::economics::EconomicParams;
use crate::finance::annuity_interest;
use crate::series::Tariff;
use crate::units::{Dimensionless, Energy, Money, MoneyPerEnergy, Power};

/// The components of a year's cost
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct CostBreakdown {
    /// Grid energy bought, both to meet demand and to charge the battery
    pub gas_cost: Money,
    /// Solar capital cost, annualised
    pub pv_capex: Money,
    /// Battery capital cost, annualised
    pub battery_capex: Money,
    /// Annualised cost of replacing batteries over the lifespan
    pub replacement: Money,
    /// Solar operating cost
    pub pv_opex: Money,
    /// Battery operating cost
    pub battery_opex: Money,
    /// Annualised interest on the loan
    pub financing: Money,
    /// Annualised return on the entrepreneur's equity
    pub profit: Money,
    /// Income from selling solar and stored energy to the grid
    pub sale_income: Money,
}

impl CostBreakdown {
    /// The net cost: all costs minus sale income
    pub fn total(&self) -> Money {
        self.gas_cost
            + self.pv_capex
            + self.battery_capex
            + self.replacement
            + self.pv_opex
            + self.battery_opex
            + self.financing
            + self.profit
            - self.sale_income
    }
}

/// Calculate the cost of a year's allocation.
///
/// # Arguments
///
/// * `allocation` - Hourly allocation for the year
/// * `tariff` - Prices for the same hours
/// * `battery_capacity` - Nominal capacity of the battery bank (before depth of discharge)
/// * `solar_power` - Installed solar power
/// * `params` - Economic parameters
pub fn calculate_cost(
    allocation: &Allocation,
    tariff: &Tariff,
    battery_capacity: Energy,
    solar_power: Power,
    params: &EconomicParams,
) -> CostBreakdown {
    let mut gas_cost = Money(0.0);
    let mut sale_income = Money(0.0);
    for ((record, &buy), &sell) in allocation.records.iter().zip(&tariff.buy).zip(&tariff.sell) {
        let buy = MoneyPerEnergy(buy);
        let sell = MoneyPerEnergy(sell);

        // Energy bought for the battery is priced before charging losses
        gas_cost += buy * Energy(record.gas_usage);
        gas_cost += buy * Energy(record.gas_stored) / params.battery_efficiency;

        sale_income += sell * Energy(record.solar_sold + record.stored_sold);
    }

    let lifespan = Dimensionless(params.lifespan as f64);
    let pv_investment = params.pv_capex * solar_power;
    let battery_investment = params.battery_capex * battery_capacity;
    let investment = pv_investment + battery_investment;
    let future_battery_investment = params.future_battery_capex * battery_capacity;

    let principal = investment * params.loan_fraction;
    let financing = annuity_interest(principal, params.loan_term, params.loan_interest_rate);
    let equity = investment - principal;
    let profit = annuity_interest(equity, params.lifespan, params.entrepreneur_return);

    CostBreakdown {
        gas_cost,
        pv_capex: pv_investment / lifespan,
        battery_capex: battery_investment / lifespan,
        replacement: future_battery_investment * params.battery_replacement_fraction / lifespan,
        pv_opex: params.pv_opex * solar_power,
        battery_opex: params.battery_opex * battery_capacity,
        financing: financing / lifespan,
        profit: profit / lifespan,
        sale_income,
    }
}

/// The net yearly cost of an allocation. See [`calculate_cost`].
pub fn total_cost(
    allocation: &Allocation,
    tariff: &Tariff,
    battery_capacity: Energy,
    solar_power: Power,
    params: &EconomicParams,
) -> Money {
    calculate_cost(allocation, tariff, battery_capacity, solar_power, params).total()
}
