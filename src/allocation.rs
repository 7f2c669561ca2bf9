//! Hour-by-hour allocation of solar, stored and grid energy to demand.
//!
//! An allocation strategy decides, for every hour, how solar production is split between meeting
//! demand, charging the battery, being sold and being lost, and how the remaining demand is met
//! from the battery and the grid. The battery's state of charge carries over from each hour to the
//! next, so every strategy walks the hours in order.
use crate::battery::BatteryConfig;
use crate::series::{Tariff, check_series_shapes};
use crate::units::Power;
use anyhow::Result;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use strum::EnumIter;

pub mod greedy;
use greedy::GreedyAllocator;
pub mod peak_arbitrage;
use peak_arbitrage::PeakArbitrageAllocator;

/// Values smaller than this in magnitude are rounding noise and are snapped to zero
pub const ROUNDING_TOLERANCE: f64 = 1e-9;

/// The slack allowed when checking an allocation's invariants
pub const INVARIANT_TOLERANCE: f64 = 1e-6;

/// How energy was sourced and used in a single hour (all values in kWh)
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AllocationRecord {
    /// The hour of the year
    pub hour_of_year: usize,
    /// Grid energy used to meet demand
    pub gas_usage: f64,
    /// Grid energy bought to charge the battery
    pub gas_stored: f64,
    /// Solar energy used to meet demand
    pub solar_usage: f64,
    /// Battery discharge used to meet demand
    pub stored_usage: f64,
    /// Solar energy added to the battery
    pub solar_stored: f64,
    /// Solar energy which was neither used, stored nor sold
    pub solar_lost: f64,
    /// Solar energy sold to the grid
    pub solar_sold: f64,
    /// Battery discharge sold to the grid
    pub stored_sold: f64,
}

impl AllocationRecord {
    /// Create an empty record for the given hour
    pub fn new(hour_of_year: usize) -> Self {
        Self {
            hour_of_year,
            ..Default::default()
        }
    }

    /// Iterate over the names and values of the energy fields
    fn fields(&self) -> [(&'static str, f64); 8] {
        [
            ("GasUsage", self.gas_usage),
            ("GasStored", self.gas_stored),
            ("SolarUsage", self.solar_usage),
            ("StoredUsage", self.stored_usage),
            ("SolarStored", self.solar_stored),
            ("SolarLost", self.solar_lost),
            ("SolarSold", self.solar_sold),
            ("StoredSold", self.stored_sold),
        ]
    }

    /// Snap floating-point noise to zero
    fn round(&mut self) {
        for value in [
            &mut self.gas_usage,
            &mut self.gas_stored,
            &mut self.solar_usage,
            &mut self.stored_usage,
            &mut self.solar_stored,
            &mut self.solar_lost,
            &mut self.solar_sold,
            &mut self.stored_sold,
        ] {
            if value.abs() < ROUNDING_TOLERANCE {
                *value = 0.0;
            }
        }
    }

    /// Net energy flowing into the battery over the hour
    pub fn net_battery_flow(&self) -> f64 {
        self.solar_stored + self.gas_stored - self.stored_usage - self.stored_sold
    }
}

/// The hourly inputs to an allocation strategy
#[derive(Debug, Clone, Copy)]
pub struct AllocationInput<'a> {
    /// Demand for each hour (kWh)
    pub demand: &'a [f64],
    /// Solar production for each hour (kWh)
    pub production: &'a [f64],
    /// Prices and peak hours
    pub tariff: &'a Tariff,
    /// The battery bank
    pub battery: &'a BatteryConfig,
    /// Maximum power which can be sold to the grid in any hour
    pub max_selling_power: Power,
}

impl<'a> AllocationInput<'a> {
    /// Create a new [`AllocationInput`], checking that all series cover the same whole days
    pub fn new(
        demand: &'a [f64],
        production: &'a [f64],
        tariff: &'a Tariff,
        battery: &'a BatteryConfig,
        max_selling_power: Power,
    ) -> Result<Self> {
        check_series_shapes(&[
            ("demand", demand.len()),
            ("production", production.len()),
            ("tariff", tariff.len()),
        ])?;

        Ok(Self {
            demand,
            production,
            tariff,
            battery,
            max_selling_power,
        })
    }

    /// The number of hours to allocate
    pub fn len(&self) -> usize {
        self.demand.len()
    }

    /// Whether there are no hours to allocate
    pub fn is_empty(&self) -> bool {
        self.demand.is_empty()
    }
}

/// The shared contract of every allocation strategy
pub trait Allocator {
    /// Allocate energy for every hour of `input`, in order
    fn allocate(&self, input: &AllocationInput) -> Result<Vec<AllocationRecord>>;

    /// The divisor applied to `solar_stored` when checking that production is fully accounted
    /// for.
    ///
    /// It is the battery efficiency if `solar_stored` is the post-loss amount and the charging
    /// loss is not counted as lost solar, or one if the charging loss is included in `solar_lost`.
    fn charge_accounting_divisor(&self, battery: &BatteryConfig) -> f64;
}

/// The available allocation strategies
#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    EnumIter,
    DeserializeLabeledStringEnum,
    SerializeLabeledStringEnum,
)]
pub enum Strategy {
    /// Solar first, then battery, then grid, without selling
    #[default]
    #[string = "greedy"]
    Greedy,
    /// Sell in peak hours and buy cheap grid energy when the spread makes it profitable
    #[string = "peak_arbitrage"]
    PeakArbitrage,
}

impl Strategy {
    /// Allocate energy for every hour of `input` with this strategy.
    ///
    /// The allocation is checked against its invariants before it is returned. Violations are
    /// logged as warnings.
    pub fn allocate(self, input: &AllocationInput) -> Result<Allocation> {
        let mut records = match self {
            Self::Greedy => GreedyAllocator.allocate(input)?,
            Self::PeakArbitrage => PeakArbitrageAllocator.allocate(input)?,
        };
        for record in &mut records {
            record.round();
        }

        let allocation = Allocation { records };
        let divisor = self.charge_accounting_divisor(input.battery);
        let violations = allocation.check_invariants(input, divisor);
        for violation in violations.iter().take(MAX_VIOLATIONS_REPORTED) {
            warn!("{self} allocation: {violation}");
        }
        if violations.len() > MAX_VIOLATIONS_REPORTED {
            warn!(
                "{self} allocation: {} further tolerance violations not shown",
                violations.len() - MAX_VIOLATIONS_REPORTED
            );
        }

        Ok(allocation)
    }

    /// See [`Allocator::charge_accounting_divisor`]
    pub fn charge_accounting_divisor(self, battery: &BatteryConfig) -> f64 {
        match self {
            Self::Greedy => GreedyAllocator.charge_accounting_divisor(battery),
            Self::PeakArbitrage => PeakArbitrageAllocator.charge_accounting_divisor(battery),
        }
    }
}

/// The maximum number of individual invariant violations logged for one allocation
const MAX_VIOLATIONS_REPORTED: usize = 10;

/// The result of allocating energy over a period: one record per hour
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    /// Records for each hour, in order
    pub records: Vec<AllocationRecord>,
}

impl Allocation {
    /// Check the allocation's invariants, returning a description of each violation.
    ///
    /// These are self-checks rather than hard gates: small violations are expected from rounding
    /// in the efficiency arithmetic.
    pub fn check_invariants(&self, input: &AllocationInput, charge_divisor: f64) -> Vec<String> {
        let eps = INVARIANT_TOLERANCE;
        let capacity = input.battery.capacity.value();
        let power = input.battery.power.value();
        let mut violations = Vec::new();
        let mut state = 0.0;

        for (i, record) in self.records.iter().enumerate() {
            let hour = record.hour_of_year;

            for (name, value) in record.fields() {
                if value < -eps {
                    violations.push(format!("Hour {hour}: {name} is negative ({value})"));
                }
            }

            let accounted = record.solar_usage
                + record.solar_stored / charge_divisor
                + record.solar_lost
                + record.solar_sold;
            if (accounted - input.production[i]).abs() > eps {
                violations.push(format!(
                    "Hour {hour}: production of {} not fully accounted for ({accounted})",
                    input.production[i]
                ));
            }

            let met = record.solar_usage + record.gas_usage + record.stored_usage;
            if (met - input.demand[i]).abs() > eps {
                violations.push(format!(
                    "Hour {hour}: demand of {} not met exactly ({met})",
                    input.demand[i]
                ));
            }

            let charged = record.solar_stored + record.gas_stored;
            let discharged = record.stored_usage + record.stored_sold;
            if charged > power + eps || discharged > power + eps {
                violations.push(format!(
                    "Hour {hour}: battery power limit of {power} exceeded (charge {charged}, \
                    discharge {discharged})"
                ));
            }

            state += record.net_battery_flow();
            if state < -eps || state > capacity + eps {
                violations.push(format!(
                    "Hour {hour}: battery state of charge {state} outside [0, {capacity}]"
                ));
            }
        }

        violations
    }
}
