//! Network-wide and run-wide parameters.
use super::extract::{keyed_by_index, sample_optional, scale};
use crate::config::RunConfig;
use crate::index::Indices;
use crate::network::Network;
use anyhow::{Result, ensure};
use indexmap::IndexMap;

/// Parameters which apply to the whole network or run
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioParameters {
    /// Discount rate over sampled years
    pub discount_rate: Vec<f64>,
    /// Cumulative discount factor over sampled years
    pub discount_factors: Vec<f64>,
    /// Emission limit relative to the base total, per emission type, over sampled years
    pub rel_em_limit: IndexMap<usize, Vec<Option<f64>>>,
    /// Total emission in the base year, per emission type
    pub base_total_emission: IndexMap<usize, f64>,
    /// Power reserve kept by units with a given tag, per energy type
    pub power_reserves: IndexMap<usize, IndexMap<usize, f64>>,
    /// Multiplier used to estimate the unserved energy penalty, per energy type
    pub ens_penalty_coefficients: IndexMap<usize, f64>,
    /// Multiplier extrapolating totals over sampled hours to the full year
    pub hourly_scale: f64,
    /// Divisor applied to all monetary inputs
    pub money_scale: f64,
    /// Tolerance used when checking results
    pub numeric_tolerance: f64,
    /// Weight of every sampled year in operational costs
    pub year_aggregates: Vec<f64>,
    /// Whether unserved energy is allowed
    pub ens: bool,
    /// Explicit penalty per unit of unserved energy (money-scaled)
    pub ens_penalty_price: Option<f64>,
    /// Lower bound on the estimated penalty (money-scaled)
    pub ens_min_penalty_price: f64,
    /// Whether stack fractions are binary
    pub binary_fraction: bool,
}

/// Cumulative product of `1 / (1 + rate)`
pub fn discount_factors(rates: &[f64]) -> Vec<f64> {
    rates
        .iter()
        .scan(1.0, |factor, rate| {
            *factor /= 1.0 + rate;
            Some(*factor)
        })
        .collect()
}

impl ScenarioParameters {
    /// Extract the network constants and run configuration
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        let constants = &network.constants;
        let discount_rate = indices.years.slice(&config.discount_rate())?;

        let mut base_total_emission = IndexMap::new();
        for (emission_type, value) in &constants.base_total_emission {
            if let Some(value) = value {
                base_total_emission.insert(
                    indices.emission_types.index_of(emission_type.as_str())?,
                    *value,
                );
            }
        }

        let rel_em_limit = keyed_by_index(
            &indices.emission_types,
            &constants.relative_emission_limits,
            |series| sample_optional(&indices.years, series),
        )?;
        for (emission_type, limits) in &rel_em_limit {
            ensure!(
                limits.iter().all(Option::is_none)
                    || base_total_emission.contains_key(emission_type),
                "Relative emission limit for {} requires a base total emission",
                indices.emission_types.get(*emission_type)
            );
        }

        Ok(Self {
            discount_factors: discount_factors(&discount_rate),
            discount_rate,
            rel_em_limit,
            base_total_emission,
            power_reserves: keyed_by_index(
                &indices.energy_types,
                &constants.power_reserves,
                |reserves| keyed_by_index(&indices.tags, reserves, |value| Ok(*value)),
            )?,
            ens_penalty_coefficients: keyed_by_index(
                &indices.energy_types,
                &constants.ens_penalty_coefficients,
                |value| Ok(*value),
            )?,
            hourly_scale: config.hourly_scale(),
            money_scale: config.money_scale,
            numeric_tolerance: config.numeric_tolerance,
            year_aggregates: indices.year_aggregates.clone(),
            ens: config.ens,
            ens_penalty_price: config
                .ens_penalty_price
                .map(|price| scale(price, config.money_scale)),
            ens_min_penalty_price: scale(config.ens_min_penalty_price, config.money_scale),
            binary_fraction: constants.binary_fraction,
        })
    }
}
