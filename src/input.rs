//! Common routines for handling input data.
use crate::model::{Model, ModelParameters};
use crate::series::{HOURS_PER_DAY, check_series_shapes};
use anyhow::{Context, Result, ensure};
use itertools::Itertools;
use log::info;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

pub mod parameters;
use parameters::read_economic_params;
pub mod series;
use series::{read_demand, read_production, read_tariff};

/// Read a series of type `T`s from a CSV file.
///
/// Will raise an error if the file is empty.
///
/// # Arguments
///
/// * `file_path` - Path to the CSV file
pub fn read_csv<'a, T: DeserializeOwned + 'a>(
    file_path: &'a Path,
) -> Result<impl Iterator<Item = T> + 'a> {
    let vec = read_csv_internal(file_path)?;
    ensure!(
        !vec.is_empty(),
        "CSV file {} cannot be empty",
        file_path.display()
    );

    Ok(vec.into_iter())
}

fn read_csv_internal<T: DeserializeOwned>(file_path: &Path) -> Result<Vec<T>> {
    let vec = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(file_path)
        .with_context(|| input_err_msg(file_path))?
        .into_deserialize()
        .process_results(|iter| iter.collect_vec())
        .with_context(|| input_err_msg(file_path))?;

    Ok(vec)
}

/// Parse a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path).with_context(|| input_err_msg(file_path))?;
    let toml_data = toml::from_str(&toml_str).with_context(|| input_err_msg(file_path))?;

    Ok(toml_data)
}

/// Format an error message to include the file path. To be used with `anyhow::Context`.
pub fn input_err_msg<P: AsRef<Path>>(file_path: P) -> String {
    format!("Error reading {}", file_path.as_ref().display())
}

/// Read a model from the specified directory.
///
/// # Arguments
///
/// * `model_dir` - Folder containing model configuration files
///
/// # Returns
///
/// The loaded, validated model or an error.
pub fn load_model<P: AsRef<Path>>(model_dir: P) -> Result<Model> {
    let model_dir = model_dir.as_ref();
    let parameters = ModelParameters::from_path(model_dir)?;
    let economics = read_economic_params(model_dir)?;
    let demand = read_demand(model_dir)?;
    let production = read_production(model_dir)?;
    let tariff = read_tariff(model_dir)?;

    check_series_shapes(&[
        ("demand", demand.len()),
        ("production", production.len()),
        ("tariff", tariff.len()),
    ])
    .context("Input time series do not line up")?;
    info!(
        "Read {} days of hourly data (reference year {})",
        demand.len() / HOURS_PER_DAY,
        demand.year
    );

    Ok(Model {
        model_path: model_dir.to_path_buf(),
        parameters,
        economics,
        demand,
        production,
        tariff,
    })
}
