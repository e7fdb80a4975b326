//! Parameters of fuels, fees, profiles and policy rules.
use super::extract::{element_prop, keyed_by_index, sample_optional, scale, scale_series};
use crate::config::RunConfig;
use crate::index::{Indices, TimeIndex};
use crate::network::{BoundSense, FractionType, Network};
use anyhow::{Context, Result, bail, ensure};
use indexmap::IndexMap;
use std::ops::Range;

/// Parameters of fuels
#[derive(Debug, Clone, PartialEq)]
pub struct FuelParameters {
    /// Emission per unit of fuel, per emission type
    pub u_emission: Vec<IndexMap<usize, f64>>,
    /// Energy released per unit of fuel
    pub energy_per_unit: Vec<f64>,
    /// Cost per unit of fuel over sampled years (money-scaled)
    pub unit_cost: Vec<Vec<f64>>,
    /// Maximum amount available over sampled years
    pub availability: Vec<Vec<Option<f64>>>,
}

impl FuelParameters {
    /// Extract the parameters of every fuel
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        let fuels = &network.fuels;
        let space = &indices.fuels;

        Ok(Self {
            u_emission: element_prop(fuels, space, |fuel| {
                keyed_by_index(&indices.emission_types, &fuel.emission, |value| Ok(*value))
            })?,
            energy_per_unit: element_prop(fuels, space, |fuel| {
                ensure!(
                    fuel.energy_per_unit > 0.0,
                    "Energy per unit of fuel {} must be positive",
                    fuel.id
                );
                Ok(fuel.energy_per_unit)
            })?,
            unit_cost: element_prop(fuels, space, |fuel| {
                Ok(scale_series(
                    &indices.years.slice(&fuel.cost)?,
                    config.money_scale,
                ))
            })?,
            availability: element_prop(fuels, space, |fuel| {
                if fuel.availability.is_empty() {
                    Ok(vec![None; indices.years.len()])
                } else {
                    sample_optional(&indices.years, &fuel.availability)
                }
            })?,
        })
    }
}

/// Parameters of capacity factor profiles
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityFactorParameters {
    /// Fraction of capacity available over sampled hours
    pub profile: Vec<Vec<f64>>,
}

impl CapacityFactorParameters {
    /// Extract every capacity factor profile
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        Ok(Self {
            profile: element_prop(&network.capacity_factors, &indices.capacity_factors, |cf| {
                indices.hours.slice(&cf.profile)
            })?,
        })
    }
}

/// Parameters of emission fees
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionFeeParameters {
    /// Emission type charged
    pub emission_type: Vec<usize>,
    /// Price per unit of emission over sampled years (money-scaled)
    pub price: Vec<Vec<f64>>,
}

impl EmissionFeeParameters {
    /// Extract the parameters of every emission fee
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        let fees = &network.emission_fees;
        let space = &indices.emission_fees;

        Ok(Self {
            emission_type: element_prop(fees, space, |fee| {
                indices.emission_types.index_of(fee.emission_type.as_str())
            })?,
            price: element_prop(fees, space, |fee| {
                Ok(scale_series(
                    &indices.years.slice(&fee.price)?,
                    config.money_scale,
                ))
            })?,
        })
    }
}

/// Parameters of transmission fees
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionFeeParameters {
    /// Fee per unit of flow over sampled hours (money-scaled)
    pub fee: Vec<Vec<f64>>,
}

impl TransmissionFeeParameters {
    /// Extract every transmission fee
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        Ok(Self {
            fee: element_prop(
                &network.transmission_fees,
                &indices.transmission_fees,
                |fee| {
                    Ok(scale_series(
                        &indices.hours.slice(&fee.fee)?,
                        config.money_scale,
                    ))
                },
            )?,
        })
    }
}

/// A demand chunk period which lies entirely within the hour sample
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkPeriod {
    /// Sampled hour indices covering the period
    pub hours: Vec<usize>,
    /// Demand to cover in the period over sampled years
    pub demand: Vec<f64>,
}

/// Parameters of demand chunks
#[derive(Debug, Clone, PartialEq)]
pub struct DemandChunkParameters {
    /// Energy type demanded
    pub energy_type: Vec<usize>,
    /// Tag of the units allowed to cover the demand
    pub tag: Vec<usize>,
    /// Periods fully covered by the hour sample
    pub periods: Vec<Vec<ChunkPeriod>>,
}

/// Keep the periods whose every hour is sampled, mapping them to sampled hour indices
fn sample_periods(
    hours: &TimeIndex,
    years: &TimeIndex,
    periods: &[(usize, usize)],
    demand: &[Vec<f64>],
) -> Result<Vec<ChunkPeriod>> {
    ensure!(
        periods.len() == demand.len(),
        "Found {} periods but {} demand rows",
        periods.len(),
        demand.len()
    );

    let mut sampled = Vec::new();
    for (&(start, end), demand) in periods.iter().zip(demand) {
        ensure!(start <= end, "Period ({start}, {end}) ends before it starts");
        let fully_sampled = (start..=end).all(|hour| hours.sample().contains(&hour));
        if !fully_sampled {
            continue;
        }

        sampled.push(ChunkPeriod {
            hours: hours
                .ord()
                .filter(|&h| (start..=end).contains(&hours.position(h)))
                .collect(),
            demand: years.slice(demand)?,
        });
    }

    Ok(sampled)
}

impl DemandChunkParameters {
    /// Extract the parameters of every demand chunk
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let chunks = &network.demand_chunks;
        let space = &indices.demand_chunks;

        Ok(Self {
            energy_type: element_prop(chunks, space, |chunk| {
                indices.energy_types.index_of(chunk.energy_type.as_str())
            })?,
            tag: element_prop(chunks, space, |chunk| {
                indices.tags.index_of(chunk.tag.as_str())
            })?,
            periods: element_prop(chunks, space, |chunk| {
                sample_periods(&indices.hours, &indices.years, &chunk.periods, &chunk.demand)
                    .with_context(|| format!("Invalid periods for demand chunk {}", chunk.id))
            })?,
        })
    }
}

/// Parameters of demand-side response rules
#[derive(Debug, Clone, PartialEq)]
pub struct DsrParameters {
    /// Ratio of positive to negative shift in a balancing period
    pub compensation_factor: Vec<f64>,
    /// Length of a balancing period in sampled hours
    pub balancing_period_len: Vec<usize>,
    /// Penalty per unit of negative shift (money-scaled)
    pub penalization_minus: Vec<f64>,
    /// Penalty per unit of positive shift (money-scaled)
    pub penalization_plus: Vec<f64>,
    /// Maximum shed load in a period relative to the period's load
    pub relative_shift_limit: Vec<Option<f64>>,
    /// Maximum shed load in a period
    pub abs_shift_limit: Vec<Option<f64>>,
    /// Maximum hourly positive shift relative to the hourly load
    pub hourly_relative_shift_plus_limit: Vec<Option<f64>>,
    /// Maximum hourly negative shift relative to the hourly load
    pub hourly_relative_shift_minus_limit: Vec<Option<f64>>,
    /// Consecutive ranges of sampled hours over which shifts must balance
    pub balancing_periods: Vec<Vec<Range<usize>>>,
}

/// Split the sampled hours into consecutive periods, the last of which may be shorter
fn balancing_periods(n_hours: usize, period_len: usize) -> Vec<Range<usize>> {
    (0..n_hours)
        .step_by(period_len)
        .map(|start| start..(start + period_len).min(n_hours))
        .collect()
}

impl DsrParameters {
    /// Extract the parameters of every demand-side response rule
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        let rules = &network.dsr;
        let space = &indices.dsr;
        let balancing_period_len = element_prop(rules, space, |rule| {
            ensure!(
                rule.balancing_period_len > 0,
                "Balancing period of DSR rule {} must be positive",
                rule.id
            );
            Ok(rule.balancing_period_len)
        })?;

        Ok(Self {
            compensation_factor: element_prop(rules, space, |rule| Ok(rule.compensation_factor))?,
            balancing_periods: balancing_period_len
                .iter()
                .map(|&len| balancing_periods(indices.hours.len(), len))
                .collect(),
            balancing_period_len,
            penalization_minus: element_prop(rules, space, |rule| {
                Ok(scale(rule.penalization_minus, config.money_scale))
            })?,
            penalization_plus: element_prop(rules, space, |rule| {
                Ok(scale(rule.penalization_plus, config.money_scale))
            })?,
            relative_shift_limit: element_prop(rules, space, |rule| Ok(rule.relative_shift_limit))?,
            abs_shift_limit: element_prop(rules, space, |rule| Ok(rule.abs_shift_limit))?,
            hourly_relative_shift_plus_limit: element_prop(rules, space, |rule| {
                Ok(rule.hourly_relative_shift_plus_limit)
            })?,
            hourly_relative_shift_minus_limit: element_prop(rules, space, |rule| {
                Ok(rule.hourly_relative_shift_minus_limit)
            })?,
        })
    }
}

/// The kind of unit named by a capacity bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitRef {
    /// A generator, by index
    Generator(usize),
    /// A storage unit, by index
    Storage(usize),
}

impl UnitRef {
    /// Resolve a technology name to a generator or storage unit
    fn resolve(indices: &Indices, name: &str) -> Result<Self> {
        if let Ok(idx) = indices.generators.index_of(name) {
            Ok(Self::Generator(idx))
        } else if let Ok(idx) = indices.storages.index_of(name) {
            Ok(Self::Storage(idx))
        } else {
            bail!("Technology {name} is neither a generator nor a storage unit")
        }
    }
}

/// Parameters of capacity bounds
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityBoundParameters {
    /// Unit on the left-hand side
    pub left: Vec<UnitRef>,
    /// Unit on the right-hand side
    pub right: Vec<UnitRef>,
    /// The relation imposed
    pub sense: Vec<BoundSense>,
    /// Coefficient of the left-hand capacity
    pub left_coeff: Vec<f64>,
}

impl CapacityBoundParameters {
    /// Extract the parameters of every capacity bound
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let bounds = &network.capacity_bounds;
        let space = &indices.capacity_bounds;

        Ok(Self {
            left: element_prop(bounds, space, |bound| {
                UnitRef::resolve(indices, &bound.left_technology)
            })?,
            right: element_prop(bounds, space, |bound| {
                UnitRef::resolve(indices, &bound.right_technology)
            })?,
            sense: element_prop(bounds, space, |bound| Ok(bound.sense))?,
            left_coeff: element_prop(bounds, space, |bound| Ok(bound.left_coefficient))?,
        })
    }
}

/// Parameters of generation fraction policies
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationFractionParameters {
    /// Tag of the superset of units
    pub tag: Vec<usize>,
    /// Tag of the subset of units
    pub sub_tag: Vec<usize>,
    /// Energy type considered
    pub et: Vec<usize>,
    /// Aggregation of generation
    pub fraction_type: Vec<FractionType>,
    /// Minimum fraction over sampled years
    pub min_generation_fraction: Vec<Vec<Option<f64>>>,
    /// Maximum fraction over sampled years
    pub max_generation_fraction: Vec<Vec<Option<f64>>>,
}

impl GenerationFractionParameters {
    /// Extract the parameters of every generation fraction policy
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let fractions = &network.generation_fractions;
        let space = &indices.generation_fractions;
        let sample = |series: &[Option<f64>]| {
            if series.is_empty() {
                Ok(vec![None; indices.years.len()])
            } else {
                sample_optional(&indices.years, series)
            }
        };

        Ok(Self {
            tag: element_prop(fractions, space, |gf| indices.tags.index_of(gf.tag.as_str()))?,
            sub_tag: element_prop(fractions, space, |gf| {
                indices.tags.index_of(gf.sub_tag.as_str())
            })?,
            et: element_prop(fractions, space, |gf| {
                indices.energy_types.index_of(gf.energy_type.as_str())
            })?,
            fraction_type: element_prop(fractions, space, |gf| Ok(gf.fraction_type))?,
            min_generation_fraction: element_prop(fractions, space, |gf| {
                sample(&gf.min_generation_fraction)
            })?,
            max_generation_fraction: element_prop(fractions, space, |gf| {
                sample(&gf.max_generation_fraction)
            })?,
        })
    }
}
