//! Code for reading hourly time series from CSV files.
//!
//! Each file has two columns: `HourOfYear` followed by a single value column. Hours must run from
//! zero upwards with no gaps.
use super::input_err_msg;
use crate::series::{DemandSeries, Tariff, check_whole_days};
use anyhow::{Context, Result, bail, ensure};
use itertools::Itertools;
use log::{info, warn};
use std::path::Path;

const DEMAND_FILE_NAME: &str = "demand.csv";
const PRODUCTION_FILE_NAME: &str = "production.csv";
const BUY_PRICES_FILE_NAME: &str = "buy_prices.csv";
const SELL_PRICES_FILE_NAME: &str = "sell_prices.csv";
const PEAK_HOURS_FILE_NAME: &str = "peak_hours.csv";

/// The title of the hour column in every time series file
const HOUR_COLUMN: &str = "HourOfYear";

/// A time series read from file, along with the title of its value column
struct HourlySeries {
    title: String,
    values: Vec<f64>,
}

/// Read (hour, value) pairs into a series of values, checking the hours run from zero in order
fn read_series_from_iter<I>(iter: I) -> Result<Vec<f64>>
where
    I: Iterator<Item = (usize, f64)>,
{
    let values: Vec<f64> = iter
        .enumerate()
        .map(|(expected, (hour, value))| {
            ensure!(
                hour == expected,
                "Hours must run from 0 in order without gaps: expected hour {expected} but got \
                {hour}"
            );
            ensure!(value.is_finite(), "Invalid value for hour {hour}: {value}");

            Ok(value)
        })
        .try_collect()?;
    check_whole_days(values.len())?;

    Ok(values)
}

/// Read an hourly time series from a CSV file
fn read_hourly_series(file_path: &Path) -> Result<HourlySeries> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?;

    let title = {
        let headers = reader.headers().with_context(|| input_err_msg(file_path))?;
        let Some((hour_column, title)) = headers.iter().collect_tuple() else {
            bail!(
                "{}: Expected exactly two columns ({HOUR_COLUMN} and a value column)",
                input_err_msg(file_path)
            );
        };
        ensure!(
            hour_column == HOUR_COLUMN,
            "{}: First column must be {HOUR_COLUMN}, but got '{hour_column}'",
            input_err_msg(file_path)
        );
        title.to_string()
    };

    let records: Vec<(usize, f64)> = reader
        .deserialize()
        .try_collect()
        .with_context(|| input_err_msg(file_path))?;
    let values =
        read_series_from_iter(records.into_iter()).with_context(|| input_err_msg(file_path))?;

    Ok(HourlySeries { title, values })
}

/// Check that every value in the series is at least zero
fn check_non_negative(values: &[f64]) -> Result<()> {
    if let Some((hour, value)) = values.iter().find_position(|&&value| value < 0.0) {
        bail!("Value for hour {hour} cannot be negative ({value})");
    }

    Ok(())
}

/// Read the demand curve from the model directory.
///
/// The title of the value column gives the year the demand curve describes.
pub fn read_demand(model_dir: &Path) -> Result<DemandSeries> {
    let file_path = model_dir.join(DEMAND_FILE_NAME);
    let series = read_hourly_series(&file_path)?;
    read_demand_from_series(series).with_context(|| input_err_msg(&file_path))
}

fn read_demand_from_series(series: HourlySeries) -> Result<DemandSeries> {
    let year = series.title.parse().with_context(|| {
        format!(
            "Demand column title must be the year of the demand data, but got '{}'",
            series.title
        )
    })?;
    check_non_negative(&series.values)?;

    Ok(DemandSeries {
        year,
        values: series.values,
    })
}

/// Read the normalised solar production curve from the model directory.
///
/// Values are production per kW of installed solar power.
pub fn read_production(model_dir: &Path) -> Result<Vec<f64>> {
    let file_path = model_dir.join(PRODUCTION_FILE_NAME);
    let series = read_hourly_series(&file_path)?;
    check_production(&series.values).with_context(|| input_err_msg(&file_path))?;

    Ok(series.values)
}

fn check_production(values: &[f64]) -> Result<()> {
    check_non_negative(values)?;
    if values.iter().any(|&value| value > 1.0) {
        warn!(
            "Solar production values above 1 found. Production should be normalised to the \
            installed solar power."
        );
    }

    Ok(())
}

/// Convert 0/1 flags into booleans
fn read_peak_flags(values: &[f64]) -> Result<Vec<bool>> {
    values
        .iter()
        .enumerate()
        .map(|(hour, &value)| {
            ensure!(
                value == 0.0 || value == 1.0,
                "Peak hour flag for hour {hour} must be 0 or 1, but got {value}"
            );

            Ok(value == 1.0)
        })
        .collect()
}

/// Read buy and sell prices and peak hours from the model directory.
///
/// If there is no peak hours file, peak hours are derived from the buy prices.
pub fn read_tariff(model_dir: &Path) -> Result<Tariff> {
    let buy = read_hourly_series(&model_dir.join(BUY_PRICES_FILE_NAME))?.values;
    let sell = read_hourly_series(&model_dir.join(SELL_PRICES_FILE_NAME))?.values;
    ensure!(
        buy.len() == sell.len(),
        "{BUY_PRICES_FILE_NAME} covers {} hours but {SELL_PRICES_FILE_NAME} covers {} hours",
        buy.len(),
        sell.len()
    );

    let peak_path = model_dir.join(PEAK_HOURS_FILE_NAME);
    if !peak_path.is_file() {
        info!("No {PEAK_HOURS_FILE_NAME} file found. Deriving peak hours from buy prices.");
        return Tariff::with_derived_peak_hours(buy, sell);
    }

    let flags = read_hourly_series(&peak_path)?.values;
    let peak = read_peak_flags(&flags).with_context(|| input_err_msg(&peak_path))?;
    Tariff::new(buy, sell, peak).with_context(|| input_err_msg(&peak_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    /// Write an hourly series file with the given value column title
    fn write_series(dir: &Path, file_name: &str, title: &str, values: &[f64]) {
        let mut file = File::create(dir.join(file_name)).unwrap();
        writeln!(file, "{HOUR_COLUMN},{title}").unwrap();
        for (hour, value) in values.iter().enumerate() {
            writeln!(file, "{hour},{value}").unwrap();
        }
    }

    #[test]
    fn test_read_series_from_iter() {
        let values = read_series_from_iter((0..24).map(|h| (h, h as f64))).unwrap();
        assert_eq!(values.len(), 24);
        assert_eq!(values[23], 23.0);

        assert_error!(
            read_series_from_iter((0..24).map(|h| (h + 1, 0.0))),
            "Hours must run from 0 in order without gaps: expected hour 0 but got 1"
        );
        assert_error!(
            read_series_from_iter((0..23).map(|h| (h, 0.0))),
            "Length of input should be a whole number of days, but got 23 hours"
        );
        assert_error!(
            read_series_from_iter((0..24).map(|h| (h, if h == 3 { f64::NAN } else { 0.0 }))),
            "Invalid value for hour 3: NaN"
        );
    }

    #[test]
    fn test_read_demand() {
        let dir = tempdir().unwrap();
        write_series(dir.path(), DEMAND_FILE_NAME, "2023", &[5.0; 48]);

        let demand = read_demand(dir.path()).unwrap();
        assert_eq!(demand.year, 2023);
        assert_eq!(demand.values, [5.0; 48]);
    }

    #[test]
    fn test_read_demand_bad_title() {
        let dir = tempdir().unwrap();
        write_series(dir.path(), DEMAND_FILE_NAME, "Demand", &[5.0; 24]);

        let err = read_demand(dir.path()).unwrap_err();
        assert!(format!("{err:?}").contains("must be the year of the demand data"));
    }

    #[test]
    fn test_read_demand_negative() {
        let mut values = [5.0; 24];
        values[7] = -1.0;
        let series = HourlySeries {
            title: "2023".into(),
            values: values.to_vec(),
        };
        assert_error!(
            read_demand_from_series(series),
            "Value for hour 7 cannot be negative (-1)"
        );
    }

    #[test]
    fn test_read_hourly_series_bad_header() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("series.csv");
        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "Hour,Value\n0,1.0").unwrap();
        }
        assert!(read_hourly_series(&file_path).is_err());

        {
            let mut file = File::create(&file_path).unwrap();
            writeln!(file, "HourOfYear,Value,Extra\n0,1.0,2.0").unwrap();
        }
        assert!(read_hourly_series(&file_path).is_err());
    }

    #[test]
    fn test_read_peak_flags() {
        assert_eq!(read_peak_flags(&[0.0, 1.0, 0.0]).unwrap(), [false, true, false]);
        assert_error!(
            read_peak_flags(&[0.0, 0.5]),
            "Peak hour flag for hour 1 must be 0 or 1, but got 0.5"
        );
    }

    #[test]
    fn test_read_tariff_derived_peak_hours() {
        let dir = tempdir().unwrap();
        let buy: Vec<f64> = (0..24).map(|h| if h >= 17 { 0.6 } else { 0.2 }).collect();
        write_series(dir.path(), BUY_PRICES_FILE_NAME, "Price", &buy);
        write_series(dir.path(), SELL_PRICES_FILE_NAME, "Price", &[0.1; 24]);

        let tariff = read_tariff(dir.path()).unwrap();
        assert_eq!(tariff.peak.iter().filter(|&&p| p).count(), 7);
        assert!(tariff.peak[17]);
        assert!(!tariff.peak[16]);
    }

    #[test]
    fn test_read_tariff_explicit_peak_hours() {
        let dir = tempdir().unwrap();
        write_series(dir.path(), BUY_PRICES_FILE_NAME, "Price", &[0.2; 24]);
        write_series(dir.path(), SELL_PRICES_FILE_NAME, "Price", &[0.1; 24]);
        let flags: Vec<f64> = (0..24).map(|h| if h == 20 { 1.0 } else { 0.0 }).collect();
        write_series(dir.path(), PEAK_HOURS_FILE_NAME, "IsPeak", &flags);

        let tariff = read_tariff(dir.path()).unwrap();
        let peak_hours = (0..24).filter(|&h| tariff.peak[h]).collect_vec();
        assert_eq!(peak_hours, [20]);
    }

    #[test]
    fn test_read_tariff_mismatched() {
        let dir = tempdir().unwrap();
        write_series(dir.path(), BUY_PRICES_FILE_NAME, "Price", &[0.2; 24]);
        write_series(dir.path(), SELL_PRICES_FILE_NAME, "Price", &[0.1; 48]);

        assert_error!(
            read_tariff(dir.path()),
            "buy_prices.csv covers 24 hours but sell_prices.csv covers 48 hours"
        );
    }
}
