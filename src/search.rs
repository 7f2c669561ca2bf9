//! Exhaustive grid search over solar power and battery count for the cheapest configuration.
//!
//! The sweep runs on a background thread while the calling thread reports its progress.
use crate::units::Money;
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::info;
use serde::Deserialize;
use std::fmt;
use std::panic;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;
use strum::Display;

/// A range of evenly spaced sample values, including both ends
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SampleRange {
    /// The first value
    pub from: f64,
    /// The last value
    pub to: f64,
    /// The number of values
    pub samples: u32,
}

impl SampleRange {
    /// Check that the range describes a non-empty set of valid values
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.from.is_finite() && self.to.is_finite(),
            "Range bounds must be finite numbers"
        );
        ensure!(self.from >= 0.0, "Range values cannot be negative");
        ensure!(
            self.from <= self.to,
            "Start of range ({}) cannot be greater than end of range ({})",
            self.from,
            self.to
        );
        ensure!(self.samples > 0, "Number of samples cannot be zero");

        Ok(())
    }

    /// The sample values, in ascending order.
    ///
    /// A single sample gives just the start of the range.
    pub fn values(&self) -> Vec<f64> {
        if self.samples == 1 {
            return vec![self.from];
        }

        let last = f64::from(self.samples - 1);
        (0..self.samples)
            .map(|i| {
                let t = f64::from(i) / last;
                self.from * (1.0 - t) + self.to * t
            })
            .collect()
    }
}

impl FromStr for SampleRange {
    type Err = anyhow::Error;

    /// Parse a range written as `from,to,samples`
    fn from_str(s: &str) -> Result<Self> {
        let Some((from, to, samples)) = s.split(',').map(str::trim).collect_tuple() else {
            anyhow::bail!("Range must be given as from,to,samples but got '{s}'");
        };

        let range = Self {
            from: from.parse().context("Invalid start of range")?,
            to: to.parse().context("Invalid end of range")?,
            samples: samples.parse().context("Invalid number of samples")?,
        };
        range.validate()?;

        Ok(range)
    }
}

/// The ranges to sweep over
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct SearchRanges {
    /// Installed solar power (kW)
    pub solar_power: SampleRange,
    /// Number of batteries
    pub num_batteries: SampleRange,
}

impl SearchRanges {
    /// Check both ranges
    pub fn validate(&self) -> Result<()> {
        self.solar_power
            .validate()
            .context("Invalid solar power range")?;
        self.num_batteries
            .validate()
            .context("Invalid battery count range")?;

        Ok(())
    }
}

/// The cost of a single configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScenarioPoint {
    /// Installed solar power (kW)
    pub solar_power: f64,
    /// Number of batteries
    pub num_batteries: f64,
    /// Total cost over the simulated horizon
    pub cost: Money,
}

/// How far a sweep has got.
///
/// Updated by the worker and read by any number of observers.
#[derive(Debug)]
pub struct SearchProgress {
    completed: AtomicUsize,
    total: usize,
}

impl SearchProgress {
    /// Progress for a sweep of `total` cells, none of which are complete
    pub fn new(total: usize) -> Self {
        Self {
            completed: AtomicUsize::new(0),
            total,
        }
    }

    /// Record that another cell has been evaluated
    pub fn increment(&self) {
        self.completed.fetch_add(1, Ordering::Relaxed);
    }

    /// The number of cells evaluated so far
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::Relaxed)
    }

    /// The number of cells in the sweep
    pub fn total(&self) -> usize {
        self.total
    }

    /// Percentage of cells evaluated
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }

        100.0 * self.completed() as f64 / self.total as f64
    }
}

/// A bound of the search grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Bound {
    /// Lowest solar power searched
    #[strum(to_string = "lower bound of solar power")]
    SolarPowerLower,
    /// Highest solar power searched
    #[strum(to_string = "upper bound of solar power")]
    SolarPowerUpper,
    /// Fewest batteries searched
    #[strum(to_string = "lower bound of battery count")]
    BatteriesLower,
    /// Most batteries searched
    #[strum(to_string = "upper bound of battery count")]
    BatteriesUpper,
}

/// Which bounds of the search grid the optimum lies on.
///
/// An optimum on a bound suggests the true optimum may lie outside the grid. A dimension with a
/// single value lies on both of its bounds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BoundaryStatus {
    /// Every bound the optimum lies on
    pub bounds: Vec<Bound>,
}

impl BoundaryStatus {
    /// Find the bounds which `point` lies on
    pub fn new(point: &ScenarioPoint, ranges: &SearchRanges) -> Self {
        let mut bounds = Vec::new();
        let mut check = |value: f64, range: &SampleRange, lower: Bound, upper: Bound| {
            if value <= range.from {
                bounds.push(lower);
            }
            if value >= range.to {
                bounds.push(upper);
            }
        };
        check(
            point.solar_power,
            &ranges.solar_power,
            Bound::SolarPowerLower,
            Bound::SolarPowerUpper,
        );
        check(
            point.num_batteries,
            &ranges.num_batteries,
            Bound::BatteriesLower,
            Bound::BatteriesUpper,
        );

        Self { bounds }
    }

    /// Whether the optimum lies strictly inside the grid
    pub fn is_in_range(&self) -> bool {
        self.bounds.is_empty()
    }
}

impl fmt::Display for BoundaryStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.is_in_range() {
            return write!(f, "in range");
        }

        write!(f, "optimum lies on the {}", self.bounds.iter().join(" and the "))
    }
}

/// The outcome of a grid search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    /// Every cell of the grid, in sweep order
    pub points: Vec<ScenarioPoint>,
    /// The cheapest cell
    pub optimum: ScenarioPoint,
    /// Where the optimum lies relative to the grid bounds
    pub boundary: BoundaryStatus,
}

/// Evaluate every cell of the grid, returning the costs in sweep order (solar power outermost)
fn sweep<F>(
    cells: &[(f64, f64)],
    progress: &SearchProgress,
    evaluate: &F,
) -> Result<Vec<ScenarioPoint>>
where
    F: Fn(f64, f64) -> Result<Money>,
{
    cells
        .iter()
        .map(|&(solar_power, num_batteries)| {
            let cost = evaluate(solar_power, num_batteries).with_context(|| {
                format!(
                    "Failed to evaluate scenario with {solar_power} kW of solar power and \
                    {num_batteries} batteries"
                )
            })?;
            progress.increment();

            Ok(ScenarioPoint {
                solar_power,
                num_batteries,
                cost,
            })
        })
        .collect()
}

/// Evaluate the cost of every combination of the sample values and find the cheapest.
///
/// The sweep stops at the first scenario which fails. On ties, the first cell in sweep order wins.
///
/// # Arguments
///
/// * `ranges` - The values of solar power and battery count to try
/// * `progress_interval` - How often to log progress
/// * `evaluate` - Calculates the cost of a given solar power and battery count
pub fn grid_search<F>(
    ranges: &SearchRanges,
    progress_interval: Duration,
    evaluate: F,
) -> Result<SearchResult>
where
    F: Fn(f64, f64) -> Result<Money> + Sync,
{
    ranges.validate()?;
    ensure!(
        !progress_interval.is_zero(),
        "Progress interval must be greater than zero"
    );
    let cells = ranges
        .solar_power
        .values()
        .into_iter()
        .cartesian_product(ranges.num_batteries.values())
        .collect_vec();
    let progress = SearchProgress::new(cells.len());
    info!("Searching {} scenarios", progress.total());

    let points = thread::scope(|scope| {
        let caller = thread::current();
        let (cells, progress, evaluate) = (&cells, &progress, &evaluate);
        let worker = scope.spawn(move || {
            let points = sweep(cells, progress, evaluate);
            caller.unpark();
            points
        });

        while !worker.is_finished() {
            thread::park_timeout(progress_interval);
            if !worker.is_finished() {
                info!(
                    "Search progress: {:.0}% ({}/{} scenarios)",
                    progress.percent(),
                    progress.completed(),
                    progress.total()
                );
            }
        }

        worker.join().unwrap_or_else(|err| panic::resume_unwind(err))
    })?;

    let optimum = points
        .iter()
        .min_by(|a, b| a.cost.value().total_cmp(&b.cost.value()))
        .copied()
        .context("Search grid is empty")?;
    let boundary = BoundaryStatus::new(&optimum, ranges);

    Ok(SearchResult {
        points,
        optimum,
        boundary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use anyhow::bail;
    use rstest::rstest;

    fn range(from: f64, to: f64, samples: u32) -> SampleRange {
        SampleRange { from, to, samples }
    }

    fn ranges(solar_power: SampleRange, num_batteries: SampleRange) -> SearchRanges {
        SearchRanges {
            solar_power,
            num_batteries,
        }
    }

    #[rstest]
    #[case(range(0.0, 10.0, 3), &[0.0, 5.0, 10.0])]
    #[case(range(2.0, 6.0, 5), &[2.0, 3.0, 4.0, 5.0, 6.0])]
    #[case(range(7.0, 9.0, 1), &[7.0])]
    #[case(range(4.0, 4.0, 2), &[4.0, 4.0])]
    fn test_sample_range_values(#[case] range: SampleRange, #[case] expected: &[f64]) {
        assert_eq!(range.values(), expected);
    }

    #[test]
    fn test_sample_range_validate() {
        assert!(range(0.0, 10.0, 3).validate().is_ok());
        assert_error!(
            range(0.0, 10.0, 0).validate(),
            "Number of samples cannot be zero"
        );
        assert_error!(
            range(5.0, 1.0, 3).validate(),
            "Start of range (5) cannot be greater than end of range (1)"
        );
        assert_error!(
            range(-1.0, 1.0, 3).validate(),
            "Range values cannot be negative"
        );
        assert_error!(
            range(0.0, f64::INFINITY, 3).validate(),
            "Range bounds must be finite numbers"
        );
    }

    #[test]
    fn test_sample_range_from_str() {
        assert_eq!(
            "0, 100, 11".parse::<SampleRange>().unwrap(),
            range(0.0, 100.0, 11)
        );
        assert!("0,100".parse::<SampleRange>().is_err());
        assert!("0,100,11,1".parse::<SampleRange>().is_err());
        assert!("a,100,11".parse::<SampleRange>().is_err());
        assert!("10,0,11".parse::<SampleRange>().is_err());
    }

    #[test]
    fn test_search_progress() {
        let progress = SearchProgress::new(4);
        assert_eq!(progress.percent(), 0.0);
        progress.increment();
        assert_eq!(progress.completed(), 1);
        assert_eq!(progress.percent(), 25.0);
    }

    #[test]
    fn test_grid_search_interior_optimum() {
        let ranges = ranges(range(0.0, 10.0, 11), range(0.0, 4.0, 5));
        let result = grid_search(&ranges, Duration::from_millis(10), |p, b| {
            Ok(Money((p - 5.0).powi(2) + (b - 2.0).powi(2)))
        })
        .unwrap();

        assert_eq!(result.points.len(), 55);
        assert_eq!(result.optimum.solar_power, 5.0);
        assert_eq!(result.optimum.num_batteries, 2.0);
        assert!(result.boundary.is_in_range());
        assert_eq!(result.boundary.to_string(), "in range");
    }

    #[test]
    fn test_grid_search_sweep_order() {
        let ranges = ranges(range(0.0, 1.0, 2), range(0.0, 2.0, 3));
        let result =
            grid_search(&ranges, Duration::from_millis(10), |p, b| Ok(Money(p + b))).unwrap();

        let cells = result
            .points
            .iter()
            .map(|point| (point.solar_power, point.num_batteries))
            .collect_vec();
        assert_eq!(
            cells,
            [
                (0.0, 0.0),
                (0.0, 1.0),
                (0.0, 2.0),
                (1.0, 0.0),
                (1.0, 1.0),
                (1.0, 2.0)
            ]
        );
    }

    #[test]
    fn test_grid_search_boundary() {
        let ranges = ranges(range(0.0, 10.0, 3), range(0.0, 4.0, 3));
        let result =
            grid_search(&ranges, Duration::from_millis(10), |p, b| Ok(Money(-p + b))).unwrap();

        assert_eq!(result.optimum.solar_power, 10.0);
        assert_eq!(result.optimum.num_batteries, 0.0);
        assert_eq!(
            result.boundary.bounds,
            [Bound::SolarPowerUpper, Bound::BatteriesLower]
        );
        assert_eq!(
            result.boundary.to_string(),
            "optimum lies on the upper bound of solar power and the lower bound of battery count"
        );
    }

    #[test]
    fn test_grid_search_fixed_dimension_on_both_bounds() {
        let ranges = ranges(range(0.0, 10.0, 11), range(2.0, 2.0, 1));
        let result = grid_search(&ranges, Duration::from_millis(10), |p, _| {
            Ok(Money((p - 5.0).powi(2)))
        })
        .unwrap();

        assert_eq!(result.optimum.solar_power, 5.0);
        assert_eq!(result.optimum.num_batteries, 2.0);
        assert!(!result.boundary.is_in_range());
        assert_eq!(
            result.boundary.bounds,
            [Bound::BatteriesLower, Bound::BatteriesUpper]
        );
    }

    #[test]
    fn test_grid_search_single_sample_lower_bound() {
        let ranges = ranges(range(0.0, 10.0, 3), range(2.0, 4.0, 1));
        let result =
            grid_search(&ranges, Duration::from_millis(10), |_, _| Ok(Money(1.0))).unwrap();

        // The only battery count tried is the start of its range
        assert_eq!(
            result.boundary.bounds,
            [Bound::SolarPowerLower, Bound::BatteriesLower]
        );
    }

    #[test]
    fn test_grid_search_zero_progress_interval() {
        let ranges = ranges(range(0.0, 10.0, 3), range(0.0, 4.0, 3));
        assert_error!(
            grid_search(&ranges, Duration::ZERO, |_, _| Ok(Money(0.0))),
            "Progress interval must be greater than zero"
        );
    }

    #[test]
    fn test_grid_search_tie_takes_first() {
        let ranges = ranges(range(0.0, 10.0, 3), range(0.0, 4.0, 3));
        let result =
            grid_search(&ranges, Duration::from_millis(10), |_, _| Ok(Money(1.0))).unwrap();

        assert_eq!(result.optimum.solar_power, 0.0);
        assert_eq!(result.optimum.num_batteries, 0.0);
    }

    #[test]
    fn test_grid_search_failure_aborts() {
        let ranges = ranges(range(0.0, 10.0, 3), range(0.0, 4.0, 3));
        let result = grid_search(&ranges, Duration::from_millis(10), |p, _| {
            if p > 5.0 {
                bail!("Too much solar");
            }
            Ok(Money(p))
        });

        assert_error!(
            result,
            "Failed to evaluate scenario with 10 kW of solar power and 0 batteries"
        );
    }

    #[test]
    fn test_grid_search_invalid_range() {
        let ranges = ranges(range(0.0, 10.0, 0), range(0.0, 4.0, 3));
        assert_error!(
            grid_search(&ranges, Duration::from_millis(10), |_, _| Ok(Money(0.0))),
            "Invalid solar power range"
        );
    }
}
