//! Logging for the command line tool.
//!
//! Records are echoed to the console and, for commands which write results, copied into the
//! output folder. Informational records and problems are kept apart in both places: the console
//! splits them between stdout and stderr, and each has its own log file.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::{File, OpenOptions};
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::OnceLock;

/// Set once the global logger has been installed
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// Level used when neither the environment nor settings.toml names one
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Environment variable which, when set, wins over the settings file
const LOG_LEVEL_ENV_VAR: &str = "PVBESS_LOG_LEVEL";

/// Log file for records below warning level
const INFO_LOG_FILE_NAME: &str = "pvbess_info.log";

/// Log file for warnings and errors
const PROBLEM_LOG_FILE_NAME: &str = "pvbess_error.log";

/// Whether [`init`] has already succeeded in this process
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Install the global logger.
///
/// The level comes from `PVBESS_LOG_LEVEL` if it is set, otherwise from `settings_level`. Accepted
/// names are `off`, `error`, `warn`, `info`, `debug` and `trace`, in any case.
///
/// When `log_dir` is given, a pair of log files is (re)created inside it. The files always record
/// at least `info`, whatever the console level.
pub fn init(settings_level: &str, log_dir: Option<&Path>) -> Result<()> {
    let level = resolve_log_level(env::var(LOG_LEVEL_ENV_VAR).ok().as_deref(), settings_level)?;

    let mut dispatch = Dispatch::new()
        .chain(console_sink(level, false))
        .chain(console_sink(level, true));
    if let Some(log_dir) = log_dir {
        let info_file = create_log_file(log_dir, INFO_LOG_FILE_NAME)?;
        let problem_file = create_log_file(log_dir, PROBLEM_LOG_FILE_NAME)?;
        dispatch = dispatch
            .chain(
                Dispatch::new()
                    .filter(|metadata| metadata.level() > LevelFilter::Warn)
                    .format(write_log_plain)
                    .level(level.max(LevelFilter::Info))
                    .chain(info_file),
            )
            .chain(
                Dispatch::new()
                    .format(write_log_plain)
                    .level(LevelFilter::Warn)
                    .chain(problem_file),
            );
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// Pick the log level, preferring the environment's choice over the settings file
fn resolve_log_level(from_env: Option<&str>, from_settings: &str) -> Result<LevelFilter> {
    parse_log_level(from_env.unwrap_or(from_settings))
}

/// Convert a log level name (case insensitive) to a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    Ok(match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    })
}

/// Truncate or create a log file
fn create_log_file(log_dir: &Path, file_name: &str) -> Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(log_dir.join(file_name))
        .with_context(|| format!("Could not create log file {file_name}"))
}

/// A console output: problems go to stderr and everything else to stdout.
///
/// Level names are coloured only when the stream is a terminal.
fn console_sink(level: LevelFilter, problems: bool) -> Dispatch {
    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    if problems {
        let use_colour = io::stderr().is_terminal();
        Dispatch::new()
            .format(move |out, message, record| {
                write_log_colour(out, message, record, use_colour, &colours);
            })
            .level(level.min(LevelFilter::Warn))
            .chain(io::stderr())
    } else {
        let use_colour = io::stdout().is_terminal();
        Dispatch::new()
            .filter(|metadata| metadata.level() > LevelFilter::Warn)
            .format(move |out, message, record| {
                write_log_colour(out, message, record, use_colour, &colours);
            })
            .level(level)
            .chain(io::stdout())
    }
}

/// Write a log line as `[time level target] message`
fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

fn write_log_colour(
    out: FormatCallback,
    message: &Arguments,
    record: &Record,
    use_colour: bool,
    colours: &ColoredLevelConfig,
) {
    if use_colour {
        write_log(out, colours.color(record.level()), record.target(), message);
    } else {
        write_log_plain(out, message, record);
    }
}
