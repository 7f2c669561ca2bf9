//! Code for loading program settings.
use crate::input::read_toml;
use crate::log::DEFAULT_LOG_LEVEL;
use anyhow::{Context, Result, anyhow, ensure};
use documented::DocumentedFields;
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const SETTINGS_FILE_NAME: &str = "settings.toml";

const DEFAULT_SETTINGS_FILE_HEADER: &str = "# This file contains the program settings for pvbess
# Uncomment a line to change the setting from its default value
";

/// How often to report search progress by default, in milliseconds
const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 1000;

/// Default log level for program
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_progress_interval_ms() -> u64 {
    DEFAULT_PROGRESS_INTERVAL_MS
}

/// Get the folder in which the program's configuration is stored
pub fn get_pvbess_config_dir() -> Result<PathBuf> {
    let mut path = dirs::config_dir().context("Could not determine the configuration folder")?;
    path.push("pvbess");

    Ok(path)
}

/// Get the path to where the settings file will be read from
pub fn get_settings_file_path() -> Result<PathBuf> {
    let mut path = get_pvbess_config_dir()?;
    path.push(SETTINGS_FILE_NAME);

    Ok(path)
}

/// Program settings from config file
#[derive(Debug, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// The default program log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Whether to overwrite output files by default
    #[serde(default)]
    pub overwrite: bool,
    /// How often search progress is reported, in milliseconds
    #[serde(default = "default_progress_interval_ms")]
    pub progress_interval_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            overwrite: false,
            progress_interval_ms: DEFAULT_PROGRESS_INTERVAL_MS,
        }
    }
}

impl Settings {
    /// Read the program settings file.
    ///
    /// If the file is not present, default values for settings will be used
    ///
    /// # Returns
    ///
    /// The program settings as a `Settings` struct or an error if the file is invalid
    pub fn load() -> Result<Settings> {
        Self::load_from_path(&get_settings_file_path()?)
    }

    /// Read settings from the specified path, falling back to defaults if there is no file
    fn load_from_path(file_path: &Path) -> Result<Settings> {
        if !file_path.is_file() {
            return Ok(Settings::default());
        }

        let settings: Settings = read_toml(file_path)?;
        settings.validate()?;

        Ok(settings)
    }

    /// Check that setting values are usable
    fn validate(&self) -> Result<()> {
        ensure!(
            self.progress_interval_ms > 0,
            "progress_interval_ms must be greater than zero"
        );

        Ok(())
    }

    /// The interval between search progress reports
    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }

    /// The contents of the default settings file, with every setting commented out
    pub fn default_file_contents() -> Result<String> {
        let settings_raw = toml::to_string(&Settings::default())?;

        // Iterate through the generated TOML, commenting out lines and adding docs
        let mut out = DEFAULT_SETTINGS_FILE_HEADER.to_string();
        for line in settings_raw.lines() {
            if let Some(last) = line.find('=') {
                let field = line[..last].trim();

                // All fields should have doc comments
                let docs = Settings::get_field_docs(field)
                    .map_err(|_| anyhow!("Missing doc comment for field {field}"))?;
                for line in docs.lines() {
                    write!(&mut out, "\n# # {}\n", line.trim())?;
                }

                writeln!(&mut out, "# {}", line.trim())?;
            }
        }

        Ok(out)
    }
}
