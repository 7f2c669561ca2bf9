//! Peak arbitrage: store energy ahead of each day's peak and use or sell it during the peak.
//!
//! Each day with peak hours is planned in passes. Solar is first allocated within the peak hours,
//! which tells us how much the battery could usefully deliver there. Surplus solar from before the
//! peak then charges the battery, latest hours first. If the price spread makes it worthwhile, the
//! battery is topped up from the grid in the cheapest hours before the peak. Finally the battery is
//! discharged into the peak, most valuable hours first, and whatever it doesn't cover is met from
//! the grid.
//!
//! Days without a peak hour fall back to a greedy rule which also sells surplus solar.
use super::{AllocationInput, AllocationRecord, Allocator};
use crate::battery::BatteryConfig;
use crate::series::{HOURS_PER_DAY, check_whole_days};
use anyhow::Result;
use itertools::Itertools;

/// Moves energy from cheap hours into expensive peak hours, selling what isn't needed
pub struct PeakArbitrageAllocator;

impl Allocator for PeakArbitrageAllocator {
    fn allocate(&self, input: &AllocationInput) -> Result<Vec<AllocationRecord>> {
        check_whole_days(input.len())?;

        let mut records: Vec<_> = (0..input.len()).map(AllocationRecord::new).collect();
        let mut battery = BatteryState::new(input.battery);
        let max_sell = input.max_selling_power.value();
        for (index, day_records) in records.chunks_mut(HOURS_PER_DAY).enumerate() {
            let hours = index * HOURS_PER_DAY..(index + 1) * HOURS_PER_DAY;
            let day = Day {
                demand: &input.demand[hours.clone()],
                production: &input.production[hours.clone()],
                buy: &input.tariff.buy[hours.clone()],
                sell: &input.tariff.sell[hours.clone()],
                peak: &input.tariff.peak[hours],
            };
            allocate_day(&day, day_records, &mut battery, max_sell);
        }

        Ok(records)
    }

    fn charge_accounting_divisor(&self, _battery: &BatteryConfig) -> f64 {
        1.0
    }
}

/// The parts of the input covering a single day
struct Day<'a> {
    demand: &'a [f64],
    production: &'a [f64],
    buy: &'a [f64],
    sell: &'a [f64],
    peak: &'a [bool],
}

/// A battery bank and its current state of charge
struct BatteryState {
    capacity: f64,
    power: f64,
    efficiency: f64,
    state: f64,
}

impl BatteryState {
    /// An empty battery
    fn new(config: &BatteryConfig) -> Self {
        Self {
            capacity: config.capacity.value(),
            power: config.power.value(),
            efficiency: config.efficiency.value(),
            state: 0.0,
        }
    }

    fn is_full(&self) -> bool {
        self.state >= self.capacity
    }

    /// Charge from up to `surplus` of solar energy.
    ///
    /// Returns the energy drawn, before charging losses.
    fn charge(&mut self, surplus: f64) -> f64 {
        let charge = surplus
            .min((self.capacity - self.state) / self.efficiency)
            .min(self.power / self.efficiency)
            .max(0.0);
        self.state += charge * self.efficiency;

        charge
    }

    /// Discharge up to `amount`, returning the energy delivered
    fn discharge(&mut self, amount: f64) -> f64 {
        let delivered = amount.min(self.power).min(self.state).max(0.0);
        self.state -= delivered;

        delivered
    }
}

/// Sell as much of `surplus` as the export limit allows and count the rest as lost
fn sell_surplus(record: &mut AllocationRecord, surplus: f64, max_sell: f64) {
    record.solar_sold = surplus.min(max_sell).max(0.0);
    record.solar_lost += surplus - record.solar_sold;
}

fn allocate_day(
    day: &Day,
    records: &mut [AllocationRecord],
    battery: &mut BatteryState,
    max_sell: f64,
) {
    let peak_hours = (0..records.len()).filter(|&h| day.peak[h]).collect_vec();
    let Some(&first_peak) = peak_hours.first() else {
        allocate_flat_day(day, records, battery, max_sell);
        return;
    };

    let mut available = day.production.to_vec();
    let mut residual = vec![0.0; records.len()];
    let mut expensive_completion = 0.0;
    let mut expensive_use_completion = 0.0;

    // Peak hours: solar first, surplus sold straight away
    for &h in &peak_hours {
        let record = &mut records[h];
        record.solar_usage = day.production[h].min(day.demand[h]);
        residual[h] = day.demand[h] - record.solar_usage;
        sell_surplus(record, day.production[h] - record.solar_usage, max_sell);
        available[h] = 0.0;

        expensive_completion += (residual[h] + max_sell - record.solar_sold).min(battery.power);
        expensive_use_completion += residual[h].min(battery.power);
    }

    // Surplus solar before the peak, latest hours first
    for h in (0..first_peak).rev() {
        if battery.is_full() {
            break;
        }

        let surplus = (available[h] - day.demand[h]).max(0.0);
        let charge = battery.charge(surplus);
        records[h].solar_stored = charge * battery.efficiency;
        records[h].solar_lost += charge - records[h].solar_stored;
        available[h] -= charge;
    }

    // Grid purchases, only if the spread covers the charging loss
    let cheapest = day.buy[..first_peak]
        .iter()
        .copied()
        .fold(f64::INFINITY, f64::min);
    let best_sale = peak_hours
        .iter()
        .map(|&h| day.sell[h])
        .fold(f64::NEG_INFINITY, f64::max);
    if cheapest < best_sale * battery.efficiency {
        let target = battery.capacity.min(expensive_completion);
        let by_price = (0..first_peak).sorted_by(|&a, &b| day.buy[a].total_cmp(&day.buy[b]));
        for h in by_price {
            if battery.state >= target {
                break;
            }

            let bought = (battery.power - records[h].solar_stored)
                .min(target - battery.state)
                .max(0.0);
            records[h].gas_stored = bought;
            battery.state += bought;
        }
    }

    // Discharge into the peak, best sell price first. Only what isn't needed to cover the peak's
    // demand may be sold.
    let mut sell_allowance = battery.state - expensive_use_completion;
    let by_value = peak_hours
        .iter()
        .copied()
        .sorted_by(|&a, &b| day.sell[b].total_cmp(&day.sell[a]));
    for h in by_value {
        let record = &mut records[h];
        record.stored_usage = battery.discharge(residual[h]);
        if sell_allowance > 0.0 {
            let sale = (max_sell - record.solar_sold)
                .min(battery.power - record.stored_usage)
                .min(sell_allowance);
            record.stored_sold = battery.discharge(sale);
            sell_allowance -= record.stored_sold;
        }
        record.gas_usage = residual[h] - record.stored_usage;
    }

    for h in (0..records.len()).filter(|&h| !day.peak[h]) {
        let record = &mut records[h];
        record.solar_usage = available[h].min(day.demand[h]);
        sell_surplus(record, available[h] - record.solar_usage, max_sell);
        record.gas_usage = day.demand[h] - record.solar_usage;
    }
}

/// Allocate a day with no peak hours: solar, then battery, then grid, selling leftover solar
fn allocate_flat_day(
    day: &Day,
    records: &mut [AllocationRecord],
    battery: &mut BatteryState,
    max_sell: f64,
) {
    for (h, record) in records.iter_mut().enumerate() {
        record.solar_usage = day.production[h].min(day.demand[h]);

        let surplus = day.production[h] - record.solar_usage;
        let charge = battery.charge(surplus);
        record.solar_stored = charge * battery.efficiency;
        record.solar_lost = charge - record.solar_stored;
        sell_surplus(record, surplus - charge, max_sell);

        let need = day.demand[h] - record.solar_usage;
        record.stored_usage = battery.discharge(need);
        record.gas_usage = need - record.stored_usage;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use crate::series::Tariff;
    use crate::units::{Dimensionless, Energy, Power};
    use rstest::rstest;

    fn allocate(
        demand: &[f64],
        production: &[f64],
        tariff: &Tariff,
        battery: &BatteryConfig,
        max_sell: f64,
    ) -> Result<Vec<AllocationRecord>> {
        let input = AllocationInput {
            demand,
            production,
            tariff,
            battery,
            max_selling_power: Power(max_sell),
        };
        PeakArbitrageAllocator.allocate(&input)
    }

    /// A single day with peak hours at 18:00 and 19:00
    fn evening_peak_tariff(off_peak_buy: f64, sell: [f64; 2]) -> Tariff {
        let peak: Vec<_> = (0..24).map(|h| h == 18 || h == 19).collect();
        let buy = peak
            .iter()
            .map(|&p| if p { 0.9 } else { off_peak_buy })
            .collect();
        let sell = (0..24)
            .map(|h| match h {
                18 => sell[0],
                19 => sell[1],
                _ => 0.1,
            })
            .collect();
        Tariff::new(buy, sell, peak).unwrap()
    }

    #[test]
    fn test_buys_cheap_and_sells_in_peak() {
        let battery = BatteryConfig::new(Energy(10.0), Power(4.0), Dimensionless(1.0)).unwrap();
        let tariff = evening_peak_tariff(0.1, [0.5, 0.8]);
        let records = allocate(&[2.0; 24], &[0.0; 24], &tariff, &battery, 1.0).unwrap();

        // Bought in the earliest of the equally cheap hours
        assert_eq!(records[0].gas_stored, 4.0);
        assert_eq!(records[1].gas_stored, 2.0);
        assert!(records[2..].iter().all(|r| r.gas_stored == 0.0));

        for h in [18, 19] {
            assert_eq!(records[h].stored_usage, 2.0);
            assert_eq!(records[h].stored_sold, 1.0);
            assert_eq!(records[h].gas_usage, 0.0);
        }
        assert!(
            records
                .iter()
                .filter(|r| !tariff.peak[r.hour_of_year])
                .all(|r| r.gas_usage == 2.0)
        );
    }

    #[test]
    fn test_stores_solar_without_buying_when_unprofitable() {
        let battery = BatteryConfig::new(Energy(10.0), Power(10.0), Dimensionless(0.5)).unwrap();
        let tariff = evening_peak_tariff(0.8, [0.5, 0.5]);
        let mut production = vec![0.0; 24];
        production[10] = 5.0;
        let records = allocate(&[1.0; 24], &production, &tariff, &battery, 0.0).unwrap();

        assert_eq!(records[10].solar_usage, 1.0);
        assert_eq!(records[10].solar_stored, 2.0);
        assert_eq!(records[10].solar_lost, 2.0);
        assert_eq!(records[10].gas_usage, 0.0);
        assert!(records.iter().all(|r| r.gas_stored == 0.0));
        for h in [18, 19] {
            assert_eq!(records[h].stored_usage, 1.0);
            assert_eq!(records[h].gas_usage, 0.0);
        }
    }

    #[rstest]
    #[case([0.5, 0.8], 19, 18)]
    #[case([0.8, 0.5], 18, 19)]
    fn test_small_battery_serves_best_peak_hour_first(
        #[case] sell: [f64; 2],
        #[case] best_hour: usize,
        #[case] other_hour: usize,
    ) {
        // Buying at 0.8 never pays, so the battery only holds the 3 units of surplus solar
        let battery = BatteryConfig::new(Energy(3.0), Power(10.0), Dimensionless(1.0)).unwrap();
        let tariff = evening_peak_tariff(0.8, sell);
        let mut production = vec![0.0; 24];
        production[10] = 5.0;
        let records = allocate(&[2.0; 24], &production, &tariff, &battery, 1.0).unwrap();

        assert_eq!(records[10].solar_stored, 3.0);
        assert!(records.iter().all(|r| r.gas_stored == 0.0));
        assert_eq!(records[best_hour].stored_usage, 2.0);
        assert_eq!(records[best_hour].gas_usage, 0.0);
        assert_eq!(records[other_hour].stored_usage, 1.0);
        assert_eq!(records[other_hour].gas_usage, 1.0);
        assert!(records.iter().all(|r| r.stored_sold == 0.0));
    }

    #[test]
    fn test_charge_carries_over_and_sales_are_capped() {
        let battery = BatteryConfig::new(Energy(10.0), Power(10.0), Dimensionless(1.0)).unwrap();
        let day = evening_peak_tariff(0.8, [0.5, 0.8]);
        let tariff = Tariff::new(
            [day.buy.clone(), day.buy].concat(),
            [day.sell.clone(), day.sell].concat(),
            [day.peak.clone(), day.peak].concat(),
        )
        .unwrap();
        let demand = [[0.0; 24], [1.0; 24]].concat();
        let mut production = vec![0.0; 48];
        production[10] = 10.0;
        let records = allocate(&demand, &production, &tariff, &battery, 3.0).unwrap();

        // First day: fill up on solar, then sell up to the export limit in both peak hours
        assert_eq!(records[10].solar_stored, 10.0);
        assert_eq!(records[18].stored_sold, 3.0);
        assert_eq!(records[19].stored_sold, 3.0);

        // Second day starts with the remaining 4 units. Only what the peak's own demand doesn't
        // need may be sold, and the best-paid hour sells first.
        assert!(records.iter().all(|r| r.gas_stored == 0.0));
        assert_eq!(records[43].stored_usage, 1.0);
        assert_eq!(records[43].stored_sold, 2.0);
        assert_eq!(records[42].stored_usage, 1.0);
        assert_eq!(records[42].stored_sold, 0.0);
        assert_eq!(records[42].gas_usage, 0.0);
        assert_eq!(records[43].gas_usage, 0.0);
    }

    #[test]
    fn test_flat_day_sells_surplus() {
        let battery = BatteryConfig::new(Energy(3.0), Power(10.0), Dimensionless(0.5)).unwrap();
        let tariff = Tariff::new(vec![0.3; 24], vec![0.1; 24], vec![false; 24]).unwrap();
        let mut production = vec![0.0; 24];
        production[0] = 10.0;
        let records = allocate(&[2.0; 24], &production, &tariff, &battery, 1.0).unwrap();

        assert_eq!(records[0].solar_usage, 2.0);
        assert_eq!(records[0].solar_stored, 3.0);
        assert_eq!(records[0].solar_sold, 1.0);
        assert_eq!(records[0].solar_lost, 4.0);
        assert_eq!(records[1].stored_usage, 2.0);
        assert_eq!(records[2].stored_usage, 1.0);
        assert_eq!(records[2].gas_usage, 1.0);
        assert_eq!(records[3].gas_usage, 2.0);
    }

    #[test]
    fn test_partial_day_rejected() {
        let battery = BatteryConfig::new(Energy(1.0), Power(1.0), Dimensionless(1.0)).unwrap();
        let tariff = Tariff::new(vec![0.3; 25], vec![0.1; 25], vec![false; 25]).unwrap();
        assert_error!(
            allocate(&[1.0; 25], &[0.0; 25], &tariff, &battery, 0.0),
            "Length of input should be a whole number of days, but got 25 hours"
        );
    }
}
