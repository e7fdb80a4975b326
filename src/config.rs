//! Defines the [`RunConfig`] struct, which configures a single model run.
//!
//! The configuration can be built in code or read from a TOML file. Validation reports every
//! problem found in one go, so that a user can fix their configuration in a single pass.
use crate::log::DEFAULT_LOG_LEVEL;
use crate::solver::SOLVER_NAMES;
use anyhow::{Context, Result, ensure};
use documented::DocumentedFields;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_string_enum::{DeserializeLabeledStringEnum, SerializeLabeledStringEnum};
use std::error::Error;
use std::fmt::{self, Write};
use std::fs;
use std::path::{Path, PathBuf};

/// Options passed through to one solver backend
pub type SolverSettings = toml::Table;

const DEFAULT_CONFIG_FILE_HEADER: &str = "# This file contains the run configuration for gridplan
# Uncomment and edit the options you want to change
";

macro_rules! define_param_default {
    ($name:ident, $type: ty, $value: expr) => {
        fn $name() -> $type {
            $value
        }
    };
}

define_param_default!(default_money_scale, f64, 1.0);
define_param_default!(default_ens, bool, true);
define_param_default!(default_ens_min_penalty_price, f64, 1.0);
define_param_default!(default_use_hourly_scale, bool, true);
define_param_default!(default_numeric_tolerance, f64, 1e-6);
define_param_default!(default_solver_name, String, "highs".to_string());
define_param_default!(default_log_level, String, DEFAULT_LOG_LEVEL.to_string());

/// How capacity-related costs of generators are expressed
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    SerializeLabeledStringEnum,
    DeserializeLabeledStringEnum,
)]
pub enum CapacityCostConvention {
    /// Costs apply to gross (input-side) capacity
    #[default]
    #[string = "brutto"]
    Brutto,
    /// Costs apply to net (output-side) capacity, i.e. gross capacity scaled by efficiency
    #[string = "netto"]
    Netto,
}

/// The configuration of a single model run
#[derive(Debug, Clone, DocumentedFields, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Number of hours on the full hour axis
    pub n_hours: usize,
    /// Number of years on the full year axis
    pub n_years: usize,
    /// Hours to include in the model, as positions on the hour axis (default: all hours)
    #[serde(default)]
    pub hour_sample: Option<Vec<usize>>,
    /// Years to include in the model; must be consecutive, starting from 0 (default: all years)
    #[serde(default)]
    pub year_sample: Option<Vec<usize>>,
    /// Discount rate for every year on the full year axis (default: zero)
    #[serde(default)]
    pub discount_rate: Option<Vec<f64>>,
    /// Weight of every sampled year in operational costs (default: one)
    #[serde(default)]
    pub year_aggregates: Option<Vec<f64>>,
    /// All monetary inputs are divided by this value
    #[serde(default = "default_money_scale")]
    pub money_scale: f64,
    /// Whether unserved energy is allowed
    #[serde(default = "default_ens")]
    pub ens: bool,
    /// Penalty per unit of unserved energy; estimated from other costs if not given
    #[serde(default)]
    pub ens_penalty_price: Option<f64>,
    /// Lower bound on the estimated unserved energy penalty
    #[serde(default = "default_ens_min_penalty_price")]
    pub ens_min_penalty_price: f64,
    /// Whether to extrapolate energy totals from sampled hours to the full year
    #[serde(default = "default_use_hourly_scale")]
    pub use_hourly_scale: bool,
    /// Whether generator capacity costs apply to gross ("brutto") or net ("netto") capacity
    #[serde(default)]
    pub generator_capacity_cost: CapacityCostConvention,
    /// Tolerance used when checking results
    #[serde(default = "default_numeric_tolerance")]
    pub numeric_tolerance: f64,
    /// Name of the solver backend
    #[serde(default = "default_solver_name")]
    pub solver_name: String,
    /// Options passed to solver backends, as one table per solver name
    #[serde(default)]
    pub solver_settings: toml::Table,
    /// Folder to write diagnostic files to when the problem is infeasible
    #[serde(default)]
    pub diagnostics_dir: Option<PathBuf>,
    /// File to write the raw solution to after every solve
    #[serde(default)]
    pub sol_dump_path: Option<PathBuf>,
    /// File to write the solver's own log to
    #[serde(default)]
    pub opt_logs_dump_path: Option<PathBuf>,
    /// The default log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Every problem found while validating a [`RunConfig`]
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigErrors(pub Vec<String>);

impl fmt::Display for ConfigErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Errors in configuration:")?;
        for error in &self.0 {
            write!(f, "\n  - {error}")?;
        }
        Ok(())
    }
}

impl Error for ConfigErrors {}

/// Read a TOML file at the specified path.
///
/// # Arguments
///
/// * `file_path` - Path to the TOML file
///
/// # Returns
///
/// * The deserialised TOML data or an error if the file could not be read or parsed.
pub fn read_toml<T: DeserializeOwned>(file_path: &Path) -> Result<T> {
    let toml_str = fs::read_to_string(file_path)
        .with_context(|| format!("Could not read file {}", file_path.display()))?;
    let toml_data = toml::from_str(&toml_str)
        .with_context(|| format!("Could not parse TOML file {}", file_path.display()))?;
    Ok(toml_data)
}

fn check_discount_rate(config: &RunConfig) -> Result<()> {
    if let Some(rates) = &config.discount_rate {
        ensure!(
            rates.len() == config.n_years,
            "discount_rate has {} values, but there are {} years",
            rates.len(),
            config.n_years
        );
        ensure!(
            rates.iter().all(|rate| rate.is_finite() && *rate > -1.0),
            "discount_rate values must be finite and greater than -1"
        );
    }

    Ok(())
}

fn check_hour_sample(config: &RunConfig) -> Result<()> {
    ensure!(config.n_hours > 0, "n_hours must be greater than zero");
    if let Some(sample) = &config.hour_sample {
        ensure!(!sample.is_empty(), "hour_sample is empty");
        ensure!(
            sample.iter().all(|&hour| hour < config.n_hours),
            "hour_sample contains hours outside 0..{}",
            config.n_hours
        );
    }

    Ok(())
}

fn check_year_sample(config: &RunConfig) -> Result<()> {
    ensure!(config.n_years > 0, "n_years must be greater than zero");
    if let Some(sample) = &config.year_sample {
        ensure!(!sample.is_empty(), "year_sample is empty");
        ensure!(
            sample.iter().enumerate().all(|(i, &year)| i == year),
            "year sample must be consecutive starting from 0"
        );
        ensure!(
            sample.len() <= config.n_years,
            "year sample {} must be less than or equal to the number of years {}",
            sample.len(),
            config.n_years
        );
    }

    Ok(())
}

fn check_year_aggregates(config: &RunConfig) -> Result<()> {
    if let Some(aggregates) = &config.year_aggregates {
        let n_sampled = config.year_sample().len();
        ensure!(
            aggregates.len() == n_sampled,
            "year_aggregates has {} values, but {n_sampled} years are sampled",
            aggregates.len()
        );
        ensure!(
            aggregates.iter().all(|value| value.is_finite() && *value >= 0.0),
            "year_aggregates must be finite and non-negative"
        );
    }

    Ok(())
}

fn check_money_scale(config: &RunConfig) -> Result<()> {
    ensure!(
        config.money_scale >= 1.0,
        "money scale must be greater or equal 1"
    );

    Ok(())
}

fn check_ens_penalty(config: &RunConfig) -> Result<()> {
    if let Some(price) = config.ens_penalty_price {
        ensure!(
            price.is_finite() && price >= 0.0,
            "ens_penalty_price must be a finite, non-negative number"
        );
    }
    ensure!(
        config.ens_min_penalty_price.is_finite() && config.ens_min_penalty_price >= 0.0,
        "ens_min_penalty_price must be a finite, non-negative number"
    );

    Ok(())
}

fn check_numeric_tolerance(config: &RunConfig) -> Result<()> {
    ensure!(
        config.numeric_tolerance.is_finite() && config.numeric_tolerance >= 0.0,
        "numeric_tolerance must be a finite, non-negative number"
    );

    Ok(())
}

fn check_solver_settings(config: &RunConfig) -> Result<()> {
    for (solver, settings) in &config.solver_settings {
        ensure!(
            settings.is_table(),
            "solver_settings for {solver} must be a table of options"
        );
    }

    Ok(())
}

fn check_solver_name(config: &RunConfig) -> Result<()> {
    ensure!(
        SOLVER_NAMES.contains(&config.solver_name.as_str()),
        "Unknown solver {}. Available solvers: {}",
        config.solver_name,
        SOLVER_NAMES.join(", ")
    );

    Ok(())
}

impl RunConfig {
    /// Create a configuration covering all hours and years, with default options
    pub fn new(n_hours: usize, n_years: usize) -> Self {
        Self {
            n_hours,
            n_years,
            hour_sample: None,
            year_sample: None,
            discount_rate: None,
            year_aggregates: None,
            money_scale: default_money_scale(),
            ens: default_ens(),
            ens_penalty_price: None,
            ens_min_penalty_price: default_ens_min_penalty_price(),
            use_hourly_scale: default_use_hourly_scale(),
            generator_capacity_cost: CapacityCostConvention::default(),
            numeric_tolerance: default_numeric_tolerance(),
            solver_name: default_solver_name(),
            solver_settings: toml::Table::new(),
            diagnostics_dir: None,
            sol_dump_path: None,
            opt_logs_dump_path: None,
            log_level: default_log_level(),
        }
    }

    /// Read and validate a configuration file.
    ///
    /// # Arguments
    ///
    /// * `file_path` - Path to the TOML file
    ///
    /// # Returns
    ///
    /// The validated configuration or an error listing every problem found
    pub fn from_path(file_path: &Path) -> Result<RunConfig> {
        let config: RunConfig = read_toml(file_path)?;
        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", file_path.display()))?;

        Ok(config)
    }

    /// Check the configuration, collecting every problem found.
    pub fn validate(&self) -> Result<(), ConfigErrors> {
        let checks = [
            check_discount_rate(self),
            check_hour_sample(self),
            check_year_sample(self),
            check_year_aggregates(self),
            check_money_scale(self),
            check_ens_penalty(self),
            check_numeric_tolerance(self),
            check_solver_name(self),
            check_solver_settings(self),
        ];
        let errors: Vec<_> = checks
            .into_iter()
            .filter_map(Result::err)
            .map(|err| format!("{err:#}"))
            .collect();

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigErrors(errors))
        }
    }

    /// The options configured for the named solver (empty if none are given)
    pub fn settings_for_solver(&self, solver: &str) -> SolverSettings {
        self.solver_settings
            .get(solver)
            .and_then(toml::Value::as_table)
            .cloned()
            .unwrap_or_default()
    }

    /// The hours included in the model, as positions on the full hour axis
    pub fn hour_sample(&self) -> Vec<usize> {
        self.hour_sample
            .clone()
            .unwrap_or_else(|| (0..self.n_hours).collect())
    }

    /// The years included in the model, as positions on the full year axis
    pub fn year_sample(&self) -> Vec<usize> {
        self.year_sample
            .clone()
            .unwrap_or_else(|| (0..self.n_years).collect())
    }

    /// The discount rate for every year on the full year axis
    pub fn discount_rate(&self) -> Vec<f64> {
        self.discount_rate
            .clone()
            .unwrap_or_else(|| vec![0.0; self.n_years])
    }

    /// Multiplier extrapolating totals over sampled hours to the full hour axis
    pub fn hourly_scale(&self) -> f64 {
        if self.use_hourly_scale {
            self.n_hours as f64 / self.hour_sample().len() as f64
        } else {
            1.0
        }
    }

    /// The contents of a commented configuration file with default values
    pub fn default_file_contents(n_hours: usize, n_years: usize) -> Result<String> {
        let config = RunConfig::new(n_hours, n_years);
        let config_raw = toml::to_string(&config).context("Could not convert config to TOML")?;

        // Comment out every option, documenting it with its doc comment
        let mut out = DEFAULT_CONFIG_FILE_HEADER.to_string();
        for line in config_raw.split('\n') {
            if let Some(last) = line.find('=') {
                let field = line[..last].trim();
                let docs = RunConfig::get_field_docs(field)
                    .map_err(|_| anyhow::anyhow!("Missing doc comment for field {field}"))?;
                for line in docs.split('\n') {
                    write!(&mut out, "\n# # {}\n", line.trim())?;
                }

                writeln!(&mut out, "# {}", line.trim())?;
            }
        }

        Ok(out)
    }
}
