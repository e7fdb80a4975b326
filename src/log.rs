//! Initialisation and configuration of the program's logging system.
//!
//! Messages are written to stdout (info and below) and stderr (warnings and errors), coloured when
//! attached to a terminal. Optionally, plain-text copies are written to log files. The log level
//! can be overridden with the `GRIDPLAN_LOG_LEVEL` environment variable.
use anyhow::{Context, Result, bail};
use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::{Dispatch, FormatCallback};
use log::{LevelFilter, Record};
use std::env;
use std::fmt::{Arguments, Display};
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::OnceLock;

/// A flag indicating whether the logger has been initialised
static LOGGER_INIT: OnceLock<()> = OnceLock::new();

/// The default log level for the program.
///
/// Used as a fallback if the user hasn't specified something else with the `GRIDPLAN_LOG_LEVEL`
/// environment variable or the run configuration.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// The environment variable used to override the log level
const LOG_LEVEL_ENV_VAR: &str = "GRIDPLAN_LOG_LEVEL";

/// The file name for the log file containing messages about model construction and solving
const LOG_INFO_FILE_NAME: &str = "gridplan_info.log";

/// The file name for the log file containing warnings and error messages
const LOG_ERROR_FILE_NAME: &str = "gridplan_error.log";

/// Whether the program logger has been initialised
pub fn is_logger_initialised() -> bool {
    LOGGER_INIT.get().is_some()
}

/// Convert a log level name into a [`LevelFilter`]
fn parse_log_level(log_level: &str) -> Result<LevelFilter> {
    let level = match log_level.to_lowercase().as_str() {
        "off" => LevelFilter::Off,
        "error" => LevelFilter::Error,
        "warn" => LevelFilter::Warn,
        "info" => LevelFilter::Info,
        "debug" => LevelFilter::Debug,
        "trace" => LevelFilter::Trace,
        unknown => bail!("Unknown log level: {unknown}"),
    };

    Ok(level)
}

/// Initialise the program logger using the `fern` logging library with colourised output.
///
/// The log level is taken from the `GRIDPLAN_LOG_LEVEL` environment variable if set, otherwise
/// from the run configuration, otherwise `info`.
///
/// # Arguments
///
/// * `log_level_from_config`: The log level given in the run configuration
/// * `log_file_path`: The folder to save log files to (if Some, log files will be created)
pub fn init(log_level_from_config: Option<&str>, log_file_path: Option<&Path>) -> Result<()> {
    let log_level = env::var(LOG_LEVEL_ENV_VAR).unwrap_or_else(|_| {
        log_level_from_config
            .unwrap_or(DEFAULT_LOG_LEVEL)
            .to_string()
    });
    let log_level = parse_log_level(&log_level)?;

    let colours = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::Magenta);

    // Only colour output going to a terminal
    let use_colour_stdout = std::io::stdout().is_terminal();
    let use_colour_stderr = std::io::stderr().is_terminal();

    let (info_log_file, err_log_file) = if let Some(log_file_path) = log_file_path {
        let new_log_file = |file_name| {
            OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(log_file_path.join(file_name))
                .with_context(|| format!("Could not create log file {file_name}"))
        };
        (
            Some(new_log_file(LOG_INFO_FILE_NAME)?),
            Some(new_log_file(LOG_ERROR_FILE_NAME)?),
        )
    } else {
        (None, None)
    };

    let mut dispatch = Dispatch::new()
        .chain(
            // Non-error messages go to stdout
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stdout, &colours);
                })
                .level(log_level)
                .chain(std::io::stdout()),
        )
        .chain(
            // Warnings and errors go to stderr
            Dispatch::new()
                .format(move |out, message, record| {
                    write_log_colour(out, message, record, use_colour_stderr, &colours);
                })
                .level(log_level.min(LevelFilter::Warn))
                .chain(std::io::stderr()),
        );

    if let Some(info_log_file) = info_log_file {
        dispatch = dispatch.chain(
            Dispatch::new()
                .filter(|metadata| metadata.level() > LevelFilter::Warn)
                .format(write_log_plain)
                .level(log_level.max(LevelFilter::Info))
                .chain(info_log_file),
        );
    }

    if let Some(err_log_file) = err_log_file {
        dispatch = dispatch.chain(
            Dispatch::new()
                .format(write_log_plain)
                .level(LevelFilter::Warn)
                .chain(err_log_file),
        );
    }

    dispatch.apply().context("Logger already initialised")?;
    LOGGER_INIT.get_or_init(|| ());

    Ok(())
}

/// Write to the log in the format we want for gridplan
fn write_log<T: Display>(out: FormatCallback, level: T, target: &str, message: &Arguments) {
    let timestamp = Local::now().format("%H:%M:%S");

    out.finish(format_args!("[{timestamp} {level} {target}] {message}"));
}

/// Write to the log with no colours
fn write_log_plain(out: FormatCallback, message: &Arguments, record: &Record) {
    write_log(out, record.level(), record.target(), message);
}

/// Write to the log with optional colours
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::assert_error;
    use rstest::rstest;

    #[rstest]
    #[case("off", LevelFilter::Off)]
    #[case("WARN", LevelFilter::Warn)]
    #[case("Debug", LevelFilter::Debug)]
    #[case("trace", LevelFilter::Trace)]
    fn test_parse_log_level(#[case] name: &str, #[case] expected: LevelFilter) {
        assert_eq!(parse_log_level(name).unwrap(), expected);
    }

    #[test]
    fn test_parse_log_level_unknown() {
        assert_error!(parse_log_level("loud"), "Unknown log level: loud");
    }
}
