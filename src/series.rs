//! Hour-indexed time series which drive a simulation.
//!
//! All series cover the same whole number of days, indexed by hour of year.
use anyhow::{Result, ensure};

/// The number of hours in a day
pub const HOURS_PER_DAY: usize = 24;

/// A demand curve for a particular year, in kWh for each hour
#[derive(Debug, Clone, PartialEq)]
pub struct DemandSeries {
    /// The year which this demand curve describes
    pub year: u32,
    /// Demand for each hour of the year
    pub values: Vec<f64>,
}

impl DemandSeries {
    /// The number of hours covered
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the series is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Grid electricity prices and peak classification for each hour
#[derive(Debug, Clone, PartialEq)]
pub struct Tariff {
    /// Price paid for each kWh bought from the grid
    pub buy: Vec<f64>,
    /// Price received for each kWh sold to the grid
    pub sell: Vec<f64>,
    /// Whether each hour is a peak (expensive) hour
    pub peak: Vec<bool>,
}

impl Tariff {
    /// Create a new [`Tariff`], checking that all of its series line up
    pub fn new(buy: Vec<f64>, sell: Vec<f64>, peak: Vec<bool>) -> Result<Self> {
        ensure!(
            buy.len() == sell.len() && buy.len() == peak.len(),
            "Buy prices ({} hours), sell prices ({} hours) and peak hours ({} hours) must cover \
            the same period",
            buy.len(),
            sell.len(),
            peak.len()
        );

        Ok(Self { buy, sell, peak })
    }

    /// Create a [`Tariff`] whose peak hours are derived from the buy prices.
    ///
    /// An hour is peak if its buy price is strictly above the cheapest buy price of its day, which
    /// is exact for two-level time-of-use tariffs.
    pub fn with_derived_peak_hours(buy: Vec<f64>, sell: Vec<f64>) -> Result<Self> {
        check_whole_days(buy.len())?;
        let peak = buy
            .chunks(HOURS_PER_DAY)
            .flat_map(|day| {
                let cheapest = day.iter().copied().fold(f64::INFINITY, f64::min);
                day.iter().map(move |&price| price > cheapest)
            })
            .collect();

        Self::new(buy, sell, peak)
    }

    /// The number of hours covered
    pub fn len(&self) -> usize {
        self.buy.len()
    }

    /// Whether the tariff is empty
    pub fn is_empty(&self) -> bool {
        self.buy.is_empty()
    }
}

/// Check that a series of `len` hours covers a whole, non-zero number of days
pub fn check_whole_days(len: usize) -> Result<()> {
    ensure!(len > 0, "Time series cannot be empty");
    ensure!(
        len % HOURS_PER_DAY == 0,
        "Length of input should be a whole number of days, but got {len} hours"
    );

    Ok(())
}

/// Check that every named series has the same length and covers whole days
pub fn check_series_shapes(series: &[(&str, usize)]) -> Result<()> {
    let Some(&(first_name, first_len)) = series.first() else {
        return Ok(());
    };

    for &(name, len) in series {
        ensure!(
            len == first_len,
            "Mismatched time series: {first_name} covers {first_len} hours but {name} covers \
            {len} hours"
        );
    }

    check_whole_days(first_len)
}

/// Scale a normalised production curve by the installed solar power (kW) to get kWh per hour
pub fn scale_production(normalised: &[f64], solar_power: f64) -> Vec<f64> {
    normalised.iter().map(|value| value * solar_power).collect()
}
