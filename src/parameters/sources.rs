//! Parameters of generators, storage units and their types.
use super::extract::{
    element_prop, indices_of, keyed_by_index, sample_optional, scale_series, type_index_prop,
    type_prop,
};
use crate::config::{CapacityCostConvention, RunConfig};
use crate::index::{Indices, TimeIndex};
use crate::network::{Generator, Network, Storage, TechnologyParameters, UnitCapacityLimits};
use anyhow::{Context, Result, ensure};
use indexmap::{IndexMap, IndexSet};

/// Capacity limits over the sampled years (`None` where unset)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapacityLimits {
    /// Lower bound on installed capacity
    pub min_capacity: Vec<Option<f64>>,
    /// Upper bound on installed capacity
    pub max_capacity: Vec<Option<f64>>,
    /// Lower bound on the year-over-year capacity change
    pub min_capacity_increase: Vec<Option<f64>>,
    /// Upper bound on the year-over-year capacity change
    pub max_capacity_increase: Vec<Option<f64>>,
}

impl CapacityLimits {
    /// Sample the limits of a unit or type
    pub fn new(years: &TimeIndex, limits: &UnitCapacityLimits) -> Result<Self> {
        // Unset series mean no limit in any year
        let sample = |series: &[Option<f64>]| {
            if series.is_empty() {
                Ok(vec![None; years.len()])
            } else {
                sample_optional(years, series)
            }
        };

        Ok(Self {
            min_capacity: sample(&limits.min_capacity)?,
            max_capacity: sample(&limits.max_capacity)?,
            min_capacity_increase: sample(&limits.min_capacity_increase)?,
            max_capacity_increase: sample(&limits.max_capacity_increase)?,
        })
    }
}

/// Parameters of individual generators
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorParameters {
    /// Capacity installed before the first modelled year
    pub base_cap: Vec<f64>,
    /// Buses the generator is attached to
    pub buses: Vec<IndexSet<usize>>,
    /// The generator's type
    pub tgen: Vec<usize>,
    /// Fuel burned (from the type)
    pub fuel: Vec<Option<usize>>,
    /// Capacity factor profile (from the type)
    pub capacity_factor: Vec<Option<usize>>,
    /// Energy types produced (from the type)
    pub ett: Vec<IndexSet<usize>>,
    /// Conversion rate per consumed energy type over sampled hours (from the type)
    pub conv_rate: Vec<IndexMap<usize, Vec<f64>>>,
    /// Emission reduction per emission type over sampled years (from the type)
    pub em_red: Vec<IndexMap<usize, Vec<f64>>>,
    /// Unit capacity limits
    pub limits: Vec<CapacityLimits>,
    /// Minimum nominal power of a single device
    pub min_device_nom_power: Vec<Option<f64>>,
    /// Maximum nominal power of a single device
    pub max_device_nom_power: Vec<Option<f64>>,
    /// Emission fees charged on the unit's emissions
    pub emission_fees: Vec<IndexSet<usize>>,
    /// Tags of the unit
    pub tags: Vec<IndexSet<usize>>,
    /// Demand chunks whose tag the unit carries
    pub demand_chunks: Vec<IndexSet<usize>>,
    /// Capacity binding group, if any
    pub capacity_binding: Vec<Option<String>>,
}

/// Demand chunks whose tag is among the given unit tags
fn chunks_for_tags(network: &Network, tags: &[String]) -> IndexSet<usize> {
    network
        .demand_chunks
        .values()
        .enumerate()
        .filter(|(_, chunk)| tags.contains(&chunk.tag))
        .map(|(idx, _)| idx)
        .collect()
}

fn generator_type_of(generator: &Generator) -> &str {
    &generator.generator_type.0
}

fn storage_type_of(storage: &Storage) -> &str {
    &storage.storage_type.0
}

impl GeneratorParameters {
    /// Extract the parameters of every generator
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let generators = &network.generators;
        let space = &indices.generators;
        let types = &network.generator_types;
        let type_of = generator_type_of;

        Ok(Self {
            base_cap: element_prop(generators, space, |g| Ok(g.unit_base_cap))?,
            buses: element_prop(generators, space, |g| indices_of(&indices.buses, &g.buses))?,
            tgen: element_prop(generators, space, |g| {
                indices.generator_types.index_of(type_of(g))
            })?,
            fuel: type_index_prop(generators, space, types, type_of, &indices.fuels, |t| {
                t.fuel.as_ref().map(|fuel| &*fuel.0)
            })?,
            capacity_factor: type_index_prop(
                generators,
                space,
                types,
                type_of,
                &indices.capacity_factors,
                |t| t.capacity_factor.as_ref().map(|cf| &*cf.0),
            )?,
            ett: type_prop(generators, space, types, type_of, |t| {
                indices_of(&indices.energy_types, &t.energy_types)
            })?,
            conv_rate: type_prop(generators, space, types, type_of, |t| {
                keyed_by_index(&indices.energy_types, &t.conversion_rate, |series| {
                    indices.hours.slice(series)
                })
            })?,
            em_red: type_prop(generators, space, types, type_of, |t| {
                keyed_by_index(&indices.emission_types, &t.emission_reduction, |series| {
                    indices.years.slice(series)
                })
            })?,
            limits: element_prop(generators, space, |g| {
                CapacityLimits::new(&indices.years, &g.limits)
            })?,
            min_device_nom_power: element_prop(generators, space, |g| {
                Ok(g.min_device_nom_power)
            })?,
            max_device_nom_power: element_prop(generators, space, |g| {
                Ok(g.max_device_nom_power)
            })?,
            emission_fees: element_prop(generators, space, |g| {
                indices_of(&indices.emission_fees, &g.emission_fees)
            })?,
            tags: element_prop(generators, space, |g| indices_of(&indices.tags, &g.tags))?,
            demand_chunks: element_prop(generators, space, |g| {
                Ok(chunks_for_tags(network, &g.tags))
            })?,
            capacity_binding: element_prop(generators, space, |g| {
                Ok(g.capacity_binding.clone())
            })?,
        })
    }
}

/// Parameters of individual storage units
#[derive(Debug, Clone, PartialEq)]
pub struct StorageParameters {
    /// Capacity installed before the first modelled year
    pub base_cap: Vec<f64>,
    /// The bus the unit is attached to
    pub bus: Vec<usize>,
    /// The unit's type
    pub tstor: Vec<usize>,
    /// Energy type stored (from the type)
    pub et: Vec<usize>,
    /// Discharge efficiency (from the type)
    pub gen_eff: Vec<f64>,
    /// Charge efficiency (from the type)
    pub load_eff: Vec<f64>,
    /// Ratio of nominal power to energy capacity (from the type)
    pub p2cap: Vec<f64>,
    /// Hours after which the state of charge is reset (from the type)
    pub cycle_len: Vec<Option<usize>>,
    /// Unit capacity limits
    pub limits: Vec<CapacityLimits>,
    /// Minimum nominal power of a single device
    pub min_device_nom_power: Vec<Option<f64>>,
    /// Maximum nominal power of a single device
    pub max_device_nom_power: Vec<Option<f64>>,
    /// Tags of the unit
    pub tags: Vec<IndexSet<usize>>,
    /// Demand chunks the unit can contribute to: it carries their tag and stores their energy type
    pub demand_chunks: Vec<IndexSet<usize>>,
}

impl StorageParameters {
    /// Extract the parameters of every storage unit
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let storages = &network.storages;
        let space = &indices.storages;
        let types = &network.storage_types;
        let type_of = storage_type_of;

        let et = type_prop(storages, space, types, type_of, |t| {
            indices.energy_types.index_of(t.energy_type.as_str())
        })?;
        let demand_chunks = element_prop(storages, space, |s| {
            let stored_type = &types
                .get(type_of(s))
                .with_context(|| format!("Unknown storage type {}", s.storage_type))?
                .energy_type;
            Ok(chunks_for_tags(network, &s.tags)
                .into_iter()
                .filter(|&chunk_idx| network.demand_chunks[chunk_idx].energy_type == *stored_type)
                .collect())
        })?;

        Ok(Self {
            base_cap: element_prop(storages, space, |s| Ok(s.unit_base_cap))?,
            bus: element_prop(storages, space, |s| indices.buses.index_of(&*s.bus.0))?,
            tstor: element_prop(storages, space, |s| {
                indices.storage_types.index_of(type_of(s))
            })?,
            et,
            gen_eff: type_prop(storages, space, types, type_of, |t| {
                Ok(t.generation_efficiency)
            })?,
            load_eff: type_prop(storages, space, types, type_of, |t| Ok(t.load_efficiency))?,
            p2cap: type_prop(storages, space, types, type_of, |t| Ok(t.power_to_capacity))?,
            cycle_len: type_prop(storages, space, types, type_of, |t| {
                ensure!(
                    t.cycle_length != Some(0),
                    "Cycle length of storage type {} must be positive",
                    t.id
                );
                Ok(t.cycle_length)
            })?,
            limits: element_prop(storages, space, |s| {
                CapacityLimits::new(&indices.years, &s.limits)
            })?,
            min_device_nom_power: element_prop(storages, space, |s| Ok(s.min_device_nom_power))?,
            max_device_nom_power: element_prop(storages, space, |s| Ok(s.max_device_nom_power))?,
            tags: element_prop(storages, space, |s| indices_of(&indices.tags, &s.tags))?,
            demand_chunks,
        })
    }
}

/// Parameters shared by generator and storage types
#[derive(Debug, Clone, PartialEq)]
pub struct TechnologyTable {
    /// Life time in years
    pub lt: Vec<usize>,
    /// Build time in years
    pub bt: Vec<usize>,
    /// Capital expenditure over sampled years (money-scaled)
    pub capex: Vec<Vec<f64>>,
    /// Operating expenditure over sampled years (money-scaled)
    pub opex: Vec<Vec<f64>>,
    /// Type-wide capacity limits
    pub limits: Vec<CapacityLimits>,
    /// Type tags
    pub tags: Vec<IndexSet<usize>>,
}

impl TechnologyTable {
    /// Extract the technology parameters of every type
    fn new<'a, I>(technologies: I, indices: &Indices, money_scale: f64) -> Result<Self>
    where
        I: Iterator<Item = (&'a str, &'a TechnologyParameters)>,
    {
        let mut table = Self {
            lt: Vec::new(),
            bt: Vec::new(),
            capex: Vec::new(),
            opex: Vec::new(),
            limits: Vec::new(),
            tags: Vec::new(),
        };
        for (type_id, tech) in technologies {
            ensure!(
                tech.life_time > 0,
                "Life time of technology type {type_id} must be positive"
            );
            table.lt.push(tech.life_time);
            table.bt.push(tech.build_time);
            table.capex.push(scale_series(
                &indices.years.slice(&tech.capex).with_context(|| {
                    format!("Invalid capex for technology type {type_id}")
                })?,
                money_scale,
            ));
            table.opex.push(scale_series(
                &indices.years.slice(&tech.opex).with_context(|| {
                    format!("Invalid opex for technology type {type_id}")
                })?,
                money_scale,
            ));
            table
                .limits
                .push(CapacityLimits::new(&indices.years, &tech.limits)?);
            table.tags.push(indices_of(&indices.type_tags, &tech.tags)?);
        }

        Ok(table)
    }
}

/// Parameters of generator types
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorTypeParameters {
    /// Life time, build time, costs, limits and tags
    pub technology: TechnologyTable,
    /// Efficiency per produced energy type over sampled hours
    pub eff: Vec<IndexMap<usize, Vec<f64>>>,
    /// Maximum usable fraction of capacity over sampled hours
    pub power_utilization: Vec<Vec<f64>>,
    /// Minimum used fraction of capacity over sampled hours
    pub minimal_power_utilization: Vec<Vec<f64>>,
    /// Maximum hour-over-hour increase in generation as a fraction of capacity
    pub ramp_up: Vec<Option<f64>>,
    /// Maximum hour-over-hour decrease in generation as a fraction of capacity
    pub ramp_down: Vec<Option<f64>>,
    /// Cost of curtailed energy over sampled years (money-scaled)
    pub energy_curtailment_cost: Vec<Option<Vec<f64>>>,
    /// Compensation per unit of generation over sampled years (money-scaled)
    pub generation_compensation: Vec<Option<Vec<f64>>>,
    /// Multiplier applied to capacity costs under the configured cost convention
    pub capacity_multiplier: Vec<f64>,
}

/// Mean efficiency of the first produced energy type, used for net capacity costs
fn netto_multiplier(
    type_id: &str,
    eff: &IndexMap<usize, Vec<f64>>,
    produced: &IndexSet<String>,
    indices: &Indices,
) -> Result<f64> {
    let first = produced
        .first()
        .with_context(|| format!("Generator type {type_id} produces no energy types"))?;
    let series = eff
        .get(&indices.energy_types.index_of(first.as_str())?)
        .with_context(|| format!("Generator type {type_id} has no efficiency for {first}"))?;

    Ok(series.iter().sum::<f64>() / series.len() as f64)
}

/// Sample and money-scale an optional year series
fn optional_cost(
    years: &TimeIndex,
    series: Option<&Vec<f64>>,
    money_scale: f64,
) -> Result<Option<Vec<f64>>> {
    series
        .map(|series| Ok(scale_series(&years.slice(series)?, money_scale)))
        .transpose()
}

impl GeneratorTypeParameters {
    /// Extract the parameters of every generator type
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        let types = &network.generator_types;
        let space = &indices.generator_types;
        let money_scale = config.money_scale;

        let eff = element_prop(types, space, |t| {
            keyed_by_index(&indices.energy_types, &t.efficiency, |series| {
                indices.hours.slice(series)
            })
        })?;
        let capacity_multiplier = match config.generator_capacity_cost {
            CapacityCostConvention::Brutto => vec![1.0; space.len()],
            CapacityCostConvention::Netto => types
                .values()
                .zip(&eff)
                .map(|(t, eff)| netto_multiplier(&t.id.0, eff, &t.energy_types, indices))
                .collect::<Result<_>>()?,
        };

        Ok(Self {
            technology: TechnologyTable::new(
                types.values().map(|t| (&*t.id.0, &t.technology)),
                indices,
                money_scale,
            )?,
            eff,
            power_utilization: element_prop(types, space, |t| {
                indices.hours.slice(&t.power_utilization)
            })?,
            minimal_power_utilization: element_prop(types, space, |t| {
                indices.hours.slice(&t.minimal_power_utilization)
            })?,
            ramp_up: element_prop(types, space, |t| Ok(t.ramp_up))?,
            ramp_down: element_prop(types, space, |t| Ok(t.ramp_down))?,
            energy_curtailment_cost: element_prop(types, space, |t| {
                optional_cost(
                    &indices.years,
                    t.energy_curtailment_cost.as_ref(),
                    money_scale,
                )
            })?,
            generation_compensation: element_prop(types, space, |t| {
                optional_cost(
                    &indices.years,
                    t.generation_compensation.as_ref(),
                    money_scale,
                )
            })?,
            capacity_multiplier,
        })
    }
}

/// Parameters of storage types
#[derive(Debug, Clone, PartialEq)]
pub struct StorageTypeParameters {
    /// Life time, build time, costs, limits and tags
    pub technology: TechnologyTable,
    /// Fraction of the state of charge lost every hour
    pub energy_loss: Vec<f64>,
    /// Fraction of capacity usable for storing energy
    pub power_utilization: Vec<f64>,
}

impl StorageTypeParameters {
    /// Extract the parameters of every storage type
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        let types = &network.storage_types;
        let space = &indices.storage_types;

        Ok(Self {
            technology: TechnologyTable::new(
                types.values().map(|t| (&*t.id.0, &t.technology)),
                indices,
                config.money_scale,
            )?,
            energy_loss: element_prop(types, space, |t| Ok(t.energy_loss))?,
            power_utilization: element_prop(types, space, |t| Ok(t.power_utilization))?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{household_network, run_config};
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    #[rstest]
    fn test_generator_parameters(household_network: Network) {
        let indices = Indices::new(&household_network, &run_config()).unwrap();
        let params = GeneratorParameters::new(&household_network, &indices).unwrap();

        let coal = indices.generators.index_of("coal_plant").unwrap();
        let heat_pump = indices.generators.index_of("heat_pump").unwrap();
        let electricity = indices.energy_types.index_of("electricity").unwrap();
        let heat = indices.energy_types.index_of("heat").unwrap();

        assert_eq!(params.fuel[coal], Some(indices.fuels.index_of("coal").unwrap()));
        assert_eq!(params.fuel[heat_pump], None);
        assert_eq!(params.ett[heat_pump], IndexSet::from([heat]));
        assert_eq!(
            params.conv_rate[heat_pump][&electricity].len(),
            indices.hours.len()
        );
        assert_eq!(params.buses[heat_pump].len(), 2);
        assert!(params.limits[coal].min_capacity.iter().all(Option::is_none));
    }

    #[rstest]
    fn test_storage_parameters(household_network: Network) {
        let indices = Indices::new(&household_network, &run_config()).unwrap();
        let params = StorageParameters::new(&household_network, &indices).unwrap();
        let battery = indices.storages.index_of("battery").unwrap();

        assert_eq!(
            params.bus[battery],
            indices.buses.index_of("house_el").unwrap()
        );
        assert_approx_eq!(f64, params.gen_eff[battery], 0.95);
        assert_eq!(params.cycle_len[battery], Some(2));
    }

    #[rstest]
    fn test_type_costs_are_money_scaled(household_network: Network) {
        let config = RunConfig {
            money_scale: 10.0,
            ..run_config()
        };
        let indices = Indices::new(&household_network, &config).unwrap();
        let params = GeneratorTypeParameters::new(&household_network, &indices, &config).unwrap();
        let coal_type = indices.generator_types.index_of("coal_type").unwrap();

        assert_eq!(params.technology.capex[coal_type], vec![10.0; config.n_years]);
        assert_eq!(params.technology.opex[coal_type], vec![0.5; config.n_years]);
        assert_approx_eq!(f64, params.capacity_multiplier[coal_type], 1.0);
    }

    #[rstest]
    fn test_netto_capacity_multiplier(household_network: Network) {
        let config = RunConfig {
            generator_capacity_cost: CapacityCostConvention::Netto,
            ..run_config()
        };
        let indices = Indices::new(&household_network, &config).unwrap();
        let params = GeneratorTypeParameters::new(&household_network, &indices, &config).unwrap();
        let coal_type = indices.generator_types.index_of("coal_type").unwrap();

        assert_approx_eq!(f64, params.capacity_multiplier[coal_type], 0.4);
    }
}
