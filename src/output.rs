//! The module responsible for writing output data to disk.
use crate::allocation::Allocation;
use crate::cost::CostBreakdown;
use crate::search::ScenarioPoint;
use crate::units::Money;
use anyhow::{Context, Result, ensure};
use serde::{Deserialize, Serialize};
use std::fs;
use std::fs::File;
use std::path::{Path, PathBuf};

pub mod metadata;
use metadata::write_metadata;

/// The root folder in which model-specific output folders will be created
const OUTPUT_DIRECTORY_ROOT: &str = "pvbess_results";

/// The output file name for the hourly allocation
const ALLOCATION_FILE_NAME: &str = "hourly_allocation.csv";

/// The output file name for yearly costs
const COST_FILE_NAME: &str = "cost_breakdown.csv";

/// The output file name for the cost of every scenario searched
const SCENARIOS_FILE_NAME: &str = "scenarios.csv";

/// Get the default output directory for the model specified at `model_dir`
pub fn get_output_dir(model_dir: &Path) -> Result<PathBuf> {
    // Get the model name from the dir path. This ends up being convoluted because we need to check
    // for all possible errors. Ugh.
    let model_dir = model_dir
        .canonicalize() // canonicalise in case the user has specified "."
        .context("Could not resolve path to model")?;

    let model_name = model_dir
        .file_name()
        .context("Model cannot be in root folder")?
        .to_str()
        .context("Invalid chars in model dir name")?;

    // Construct path
    Ok([OUTPUT_DIRECTORY_ROOT, model_name].iter().collect())
}

/// Create a new output directory for the model, optionally overwriting existing data
///
/// # Arguments
///
/// * `output_dir` - The output directory to create/overwrite
/// * `allow_overwrite` - Whether to delete and recreate the folder if it is non-empty
///
/// # Returns
///
/// True if the output dir contained existing data that was deleted, false if not, or an error.
pub fn create_output_directory(output_dir: &Path, allow_overwrite: bool) -> Result<bool> {
    // If the folder already exists, then delete it
    let overwrite = if let Ok(mut it) = fs::read_dir(output_dir) {
        if it.next().is_none() {
            // Folder exists and is empty: nothing to do
            return Ok(false);
        }

        ensure!(
            allow_overwrite,
            "Output folder already exists and is not empty. Please delete the folder or pass the \
            --overwrite command-line option."
        );

        fs::remove_dir_all(output_dir).context("Could not delete folder")?;
        true
    } else {
        false
    };

    // Try to create the directory, with parents
    fs::create_dir_all(output_dir)?;

    Ok(overwrite)
}

/// The year column, written before each allocation record
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct YearRow {
    year: u32,
}

/// Represents a row in the cost breakdown CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(rename_all = "PascalCase")]
struct CostRow {
    year: u32,
    gas_cost: Money,
    pv_capex: Money,
    battery_capex: Money,
    replacement: Money,
    pv_opex: Money,
    battery_opex: Money,
    financing: Money,
    profit: Money,
    sale_income: Money,
    total: Money,
}

impl CostRow {
    fn new(year: u32, cost: &CostBreakdown) -> Self {
        Self {
            year,
            gas_cost: cost.gas_cost,
            pv_capex: cost.pv_capex,
            battery_capex: cost.battery_capex,
            replacement: cost.replacement,
            pv_opex: cost.pv_opex,
            battery_opex: cost.battery_opex,
            financing: cost.financing,
            profit: cost.profit,
            sale_income: cost.sale_income,
            total: cost.total(),
        }
    }
}

/// Represents a row in the scenarios CSV file
#[derive(Serialize, Deserialize, Debug, PartialEq)]
struct ScenarioRow {
    #[serde(rename = "PowerSolar")]
    solar_power: f64,
    #[serde(rename = "NumBatteries")]
    num_batteries: f64,
    #[serde(rename = "Cost")]
    cost: Money,
}

/// An object for writing the results of a simulation to file
pub struct DataWriter {
    allocation_writer: csv::Writer<File>,
    cost_writer: csv::Writer<File>,
}

impl DataWriter {
    /// Open CSV files to write output data to and save metadata
    ///
    /// # Arguments
    ///
    /// * `output_path` - Folder where files will be saved
    /// * `model_path` - Path to input model
    pub fn create(output_path: &Path, model_path: &Path) -> Result<Self> {
        write_metadata(output_path, model_path).context("Failed to save metadata")?;

        let new_writer = |file_name| {
            let file_path = output_path.join(file_name);
            csv::Writer::from_path(&file_path)
                .with_context(|| format!("Could not create {}", file_path.display()))
        };

        Ok(Self {
            allocation_writer: new_writer(ALLOCATION_FILE_NAME)?,
            cost_writer: new_writer(COST_FILE_NAME)?,
        })
    }

    /// Write a year's hourly allocation to file
    pub fn write_allocation(&mut self, year: u32, allocation: &Allocation) -> Result<()> {
        for record in &allocation.records {
            self.allocation_writer.serialize((YearRow { year }, record))?;
        }

        Ok(())
    }

    /// Write a year's costs to file
    pub fn write_cost(&mut self, year: u32, cost: &CostBreakdown) -> Result<()> {
        self.cost_writer.serialize(CostRow::new(year, cost))?;

        Ok(())
    }

    /// Flush the underlying streams
    pub fn flush(&mut self) -> Result<()> {
        self.allocation_writer.flush()?;
        self.cost_writer.flush()?;

        Ok(())
    }
}

/// Write the cost of every scenario searched, along with metadata
///
/// # Arguments
///
/// * `output_path` - Folder where files will be saved
/// * `model_path` - Path to input model
/// * `points` - The scenarios, in the order they were evaluated
pub fn write_scenarios(
    output_path: &Path,
    model_path: &Path,
    points: &[ScenarioPoint],
) -> Result<()> {
    write_metadata(output_path, model_path).context("Failed to save metadata")?;

    let file_path = output_path.join(SCENARIOS_FILE_NAME);
    let mut writer = csv::Writer::from_path(&file_path)
        .with_context(|| format!("Could not create {}", file_path.display()))?;
    for point in points {
        writer.serialize(ScenarioRow {
            solar_power: point.solar_power,
            num_batteries: point.num_batteries,
            cost: point.cost,
        })?;
    }
    writer.flush()?;

    Ok(())
}
