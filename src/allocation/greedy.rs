//! Greedy allocation: solar first, then the battery, then the grid.
use super::{AllocationInput, AllocationRecord, Allocator};
use crate::battery::BatteryConfig;
use anyhow::Result;

/// Meets demand from solar, then from the battery, then from the grid, hour by hour.
///
/// Surplus solar charges the battery as far as capacity and power allow and the rest is lost.
/// Nothing is ever sold and the grid never charges the battery.
pub struct GreedyAllocator;

impl Allocator for GreedyAllocator {
    fn allocate(&self, input: &AllocationInput) -> Result<Vec<AllocationRecord>> {
        let capacity = input.battery.capacity.value();
        let power = input.battery.power.value();
        let efficiency = input.battery.efficiency.value();

        let mut state = 0.0;
        let records = input
            .demand
            .iter()
            .zip(input.production)
            .enumerate()
            .map(|(hour, (&demand, &production))| {
                let mut record = AllocationRecord::new(hour);

                record.solar_usage = production.min(demand);
                let need = demand - record.solar_usage;

                let surplus = production - record.solar_usage;
                let charge = surplus.min(capacity - state).min(power).max(0.0);
                record.solar_stored = charge * efficiency;
                state += record.solar_stored;
                record.solar_lost = surplus - charge;

                record.stored_usage = state.min(need).min(power).max(0.0);
                state -= record.stored_usage;
                record.gas_usage = need - record.stored_usage;

                record
            })
            .collect();

        Ok(records)
    }

    fn charge_accounting_divisor(&self, battery: &BatteryConfig) -> f64 {
        battery.efficiency.value()
    }
}
