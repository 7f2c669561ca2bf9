//! The model represents the static input data provided by the user.
use crate::economics::EconomicParams;
use crate::series::{DemandSeries, Tariff};
use std::path::PathBuf;

pub mod parameters;
pub use parameters::ModelParameters;

/// Model definition
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    /// Path to model folder
    pub model_path: PathBuf,
    /// Parameters from the model TOML file
    pub parameters: ModelParameters,
    /// Economic and technical constants
    pub economics: EconomicParams,
    /// Demand curve for its reference year
    pub demand: DemandSeries,
    /// Solar production for each hour, per kW of installed solar power
    pub production: Vec<f64>,
    /// Grid prices and peak hours
    pub tariff: Tariff,
}

impl Model {
    /// Iterate over the years to simulate
    pub fn iter_years(&self) -> impl Iterator<Item = u32> {
        self.parameters.years()
    }
}
