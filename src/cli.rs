//! The command line interface for the tool.
use crate::input::load_model;
use crate::log;
use crate::model::Model;
use crate::output::{create_output_directory, get_output_dir, write_scenarios};
use crate::search::{SampleRange, SearchRanges, grid_search};
use crate::settings::Settings;
use crate::simulation::{Scenario, evaluate_scenario};
use ::log::{info, warn};
use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use std::path::{Path, PathBuf};

pub mod settings;
use settings::SettingsSubcommands;

/// The command line interface for the tool.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// The available commands.
    #[command(subcommand)]
    command: Option<Commands>,
    /// Flag to provide the CLI docs as markdown
    #[arg(long, hide = true)]
    markdown_help: bool,
}

/// Options for commands which write output files
#[derive(Args, Default)]
pub struct OutputOpts {
    /// Directory for output files
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,
    /// Whether to overwrite the output directory if it already exists
    #[arg(long)]
    pub overwrite: bool,
}

/// The available commands.
#[derive(Subcommand)]
enum Commands {
    /// Simulate a single facility configuration.
    Run {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Installed solar power (kW).
        #[arg(long)]
        solar_power: f64,
        /// Number of batteries.
        #[arg(long)]
        num_batteries: f64,
        /// Other output options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Search for the cheapest combination of solar power and batteries.
    Search {
        /// Path to the model directory.
        model_dir: PathBuf,
        /// Solar power values to try, as `from,to,samples` (kW).
        #[arg(long)]
        solar_power_range: Option<SampleRange>,
        /// Battery counts to try, as `from,to,samples`.
        #[arg(long)]
        batteries_range: Option<SampleRange>,
        /// Other output options
        #[command(flatten)]
        opts: OutputOpts,
    },
    /// Validate a model.
    Validate {
        /// The path to the model directory.
        model_dir: PathBuf,
    },
    /// Manage settings file.
    Settings {
        /// The subcommands for managing the settings file.
        #[command(subcommand)]
        subcommand: SettingsSubcommands,
    },
}

impl Commands {
    /// Execute the supplied CLI command
    fn execute(self) -> Result<()> {
        match self {
            Self::Run {
                model_dir,
                solar_power,
                num_batteries,
                opts,
            } => {
                let scenario = Scenario::new(solar_power, num_batteries)?;
                handle_run_command(&model_dir, &scenario, &opts, None)
            }
            Self::Search {
                model_dir,
                solar_power_range,
                batteries_range,
                opts,
            } => handle_search_command(
                &model_dir,
                solar_power_range,
                batteries_range,
                &opts,
                None,
            ),
            Self::Validate { model_dir } => handle_validate_command(&model_dir, None),
            Self::Settings { subcommand } => subcommand.execute(),
        }
    }
}

/// Parse CLI arguments and run the requested command
pub fn run_cli() -> Result<()> {
    let cli = Cli::parse();

    // Invoked as: `$ pvbess --markdown-help`
    if cli.markdown_help {
        clap_markdown::print_help_markdown::<Cli>();
        return Ok(());
    }

    let Some(command) = cli.command else {
        let help_str = Cli::command().render_long_help().to_string();
        println!("{help_str}");
        return Ok(());
    };

    command.execute()
}

/// Load program settings, if not provided
fn load_settings(settings: Option<Settings>) -> Result<Settings> {
    match settings {
        Some(settings) => Ok(settings),
        None => Settings::load().context("Failed to load settings."),
    }
}

/// Initialise the program logger, unless it is already running
fn init_logger(settings: &Settings, log_file_path: Option<&Path>) -> Result<()> {
    if log::is_logger_initialised() {
        return Ok(());
    }

    log::init(&settings.log_level, log_file_path).context("Failed to initialise logging.")
}

/// Create the output folder, initialise logging and load the model.
///
/// Returns the loaded model along with the path to the output folder.
fn prepare_output(
    model_path: &Path,
    opts: &OutputOpts,
    settings: &Settings,
) -> Result<(Model, PathBuf)> {
    let output_path = match &opts.output_dir {
        Some(path) => path.clone(),
        None => get_output_dir(model_path)?,
    };

    let overwrite = create_output_directory(&output_path, opts.overwrite || settings.overwrite)
        .with_context(|| {
            format!(
                "Failed to create output directory: {}",
                output_path.display()
            )
        })?;

    init_logger(settings, Some(&output_path))?;

    let model = load_model(model_path).context("Failed to load model.")?;
    info!("Loaded model from {}", model_path.display());
    info!("Output folder: {}", output_path.display());

    // NB: We have to wait until the logger is initialised to display this warning
    if overwrite {
        warn!("Output folder will be overwritten");
    }

    Ok((model, output_path))
}

/// Handle the `run` command.
pub fn handle_run_command(
    model_path: &Path,
    scenario: &Scenario,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let (model, output_path) = prepare_output(model_path, opts, &settings)?;

    info!("Simulating {scenario}");
    let total = crate::simulation::run(&model, scenario, &output_path)?;
    info!("Total cost: {total}");
    info!("Simulation complete!");

    Ok(())
}

/// Work out which ranges to search, preferring those given on the command line
fn resolve_search_ranges(
    model: &Model,
    solar_power_range: Option<SampleRange>,
    batteries_range: Option<SampleRange>,
) -> Result<SearchRanges> {
    let from_model = model.parameters.search;
    let solar_power = solar_power_range
        .or(from_model.map(|ranges| ranges.solar_power))
        .context("No solar power range given on the command line or in model.toml")?;
    let num_batteries = batteries_range
        .or(from_model.map(|ranges| ranges.num_batteries))
        .context("No battery count range given on the command line or in model.toml")?;

    let ranges = SearchRanges {
        solar_power,
        num_batteries,
    };
    ranges.validate()?;

    Ok(ranges)
}

/// Handle the `search` command.
pub fn handle_search_command(
    model_path: &Path,
    solar_power_range: Option<SampleRange>,
    batteries_range: Option<SampleRange>,
    opts: &OutputOpts,
    settings: Option<Settings>,
) -> Result<()> {
    let settings = load_settings(settings)?;
    let (model, output_path) = prepare_output(model_path, opts, &settings)?;
    let ranges = resolve_search_ranges(&model, solar_power_range, batteries_range)?;

    let result = grid_search(
        &ranges,
        settings.progress_interval(),
        |solar_power, num_batteries| {
            let scenario = Scenario::new(solar_power, num_batteries)?;
            evaluate_scenario(&model, &scenario)
        },
    )?;
    write_scenarios(&output_path, model_path, &result.points)?;

    let optimum = &result.optimum;
    info!(
        "Cheapest configuration: {} kW of solar power and {} batteries, costing {}",
        optimum.solar_power, optimum.num_batteries, optimum.cost
    );
    if result.boundary.is_in_range() {
        info!("The optimum is inside the search range");
    } else {
        warn!(
            "The {}. Consider widening the search range.",
            result.boundary
        );
    }

    Ok(())
}

/// Handle the `validate` command.
pub fn handle_validate_command(model_path: &Path, settings: Option<Settings>) -> Result<()> {
    let settings = load_settings(settings)?;

    // We won't save log files when running the validate command
    init_logger(&settings, None)?;

    // Load/validate the model
    load_model(model_path).context("Failed to validate model.")?;
    info!("Model validation successful!");

    Ok(())
}
