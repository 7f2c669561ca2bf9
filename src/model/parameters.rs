//! Defines the `ModelParameters` struct, which represents the contents of `model.toml`.
use crate::allocation::Strategy;
use crate::input::{input_err_msg, read_toml};
use crate::search::SearchRanges;
use anyhow::{Context, Result, ensure};
use log::warn;
use serde::Deserialize;
use std::ops::Range;
use std::path::Path;

const MODEL_PARAMETERS_FILE_NAME: &str = "model.toml";

/// The longest horizon we'll simulate without a warning
const LONG_HORIZON_YEARS: u32 = 50;

fn default_horizon_years() -> u32 {
    1
}

/// Represents the contents of the entire model file.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct ModelParameters {
    /// The first year to simulate
    pub simulated_year: u32,
    /// How energy is allocated in each hour
    #[serde(default)]
    pub strategy: Strategy,
    /// The number of consecutive years to simulate, starting at `simulated_year`
    #[serde(default = "default_horizon_years")]
    pub horizon_years: u32,
    /// Ranges to search over. Can be overridden from the command line.
    #[serde(default)]
    pub search: Option<SearchRanges>,
}

/// Check that the `horizon_years` parameter is valid
fn check_horizon_years(value: u32) -> Result<()> {
    ensure!(value > 0, "horizon_years cannot be zero");
    if value > LONG_HORIZON_YEARS {
        warn!("horizon_years is {value}. Every year is simulated in full, so this may be slow.");
    }

    Ok(())
}

impl ModelParameters {
    /// Read a model file from the specified directory.
    ///
    /// # Arguments
    ///
    /// * `model_dir` - Folder containing model configuration files
    ///
    /// # Returns
    ///
    /// The model file contents as a [`ModelParameters`] struct or an error if the file is invalid
    pub fn from_path<P: AsRef<Path>>(model_dir: P) -> Result<ModelParameters> {
        let file_path = model_dir.as_ref().join(MODEL_PARAMETERS_FILE_NAME);
        let model_params: ModelParameters = read_toml(&file_path)?;

        model_params
            .validate()
            .with_context(|| input_err_msg(file_path))?;

        Ok(model_params)
    }

    /// Validate parameters after reading in file
    fn validate(&self) -> Result<()> {
        check_horizon_years(self.horizon_years)?;

        if let Some(search) = &self.search {
            search.validate()?;
        }

        Ok(())
    }

    /// The years to simulate, in order
    pub fn years(&self) -> Range<u32> {
        self.simulated_year..self.simulated_year + self.horizon_years
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SampleRange;
    use itertools::Itertools;
    use rstest::rstest;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_model_file(dir: &Path, contents: &str) {
        let mut file = File::create(dir.join(MODEL_PARAMETERS_FILE_NAME)).unwrap();
        write!(file, "{contents}").unwrap();
    }

    #[test]
    fn test_model_params_from_path_defaults() {
        let dir = tempdir().unwrap();
        write_model_file(dir.path(), "simulated_year = 2025\n");

        let model_params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(
            model_params,
            ModelParameters {
                simulated_year: 2025,
                strategy: Strategy::Greedy,
                horizon_years: 1,
                search: None,
            }
        );
        assert_eq!(model_params.years().collect_vec(), [2025]);
    }

    #[test]
    fn test_model_params_from_path_full() {
        let dir = tempdir().unwrap();
        write_model_file(
            dir.path(),
            r#"simulated_year = 2025
strategy = "peak_arbitrage"
horizon_years = 3

[search]
solar_power = { from = 0.0, to = 1000.0, samples = 11 }
num_batteries = { from = 0, to = 20, samples = 5 }
"#,
        );

        let model_params = ModelParameters::from_path(dir.path()).unwrap();
        assert_eq!(model_params.strategy, Strategy::PeakArbitrage);
        assert_eq!(model_params.years().collect_vec(), [2025, 2026, 2027]);
        assert_eq!(
            model_params.search,
            Some(SearchRanges {
                solar_power: SampleRange {
                    from: 0.0,
                    to: 1000.0,
                    samples: 11
                },
                num_batteries: SampleRange {
                    from: 0.0,
                    to: 20.0,
                    samples: 5
                },
            })
        );
    }

    #[rstest]
    #[case("simulated_year = 2025\nhorizon_years = 0\n")]
    #[case("simulated_year = 2025\nstrategy = \"smart\"\n")]
    #[case("simulated_year = 2025\nmilestone_years = [2025]\n")]
    #[case(
        "simulated_year = 2025\n[search]\nsolar_power = { from = 5.0, to = 1.0, samples = 3 }\n\
        num_batteries = { from = 0, to = 2, samples = 3 }\n"
    )]
    fn test_model_params_from_path_invalid(#[case] contents: &str) {
        let dir = tempdir().unwrap();
        write_model_file(dir.path(), contents);

        assert!(ModelParameters::from_path(dir.path()).is_err());
    }

    #[test]
    fn test_check_horizon_years() {
        assert!(check_horizon_years(1).is_ok());
        assert!(check_horizon_years(100).is_ok()); // Accepted with a warning
        assert!(check_horizon_years(0).is_err());
    }
}
