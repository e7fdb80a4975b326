//! Dense integer index spaces for network collections and the sampled time axes.
//!
//! Every collection of network elements is assigned a bijection between its names and the integers
//! `0..n`. All parameter tables and variable tensors are addressed through these indices.
use crate::config::RunConfig;
use crate::id::ElementMap;
use crate::network::{BusID, LocalBalancingStackID, Network};
use anyhow::{Context, Result, bail, ensure};
use indexmap::{IndexMap, IndexSet};
use std::borrow::Borrow;
use std::fmt::Display;
use std::hash::Hash;
use std::ops::Range;

/// A bijection between the names of a collection and the integers `0..n`
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSpace<K: Hash + Eq> {
    name: &'static str,
    items: IndexSet<K>,
}

impl<K: Hash + Eq + Clone + Display> IndexSpace<K> {
    /// Create a new index space, failing if `items` contains duplicates.
    ///
    /// # Arguments
    ///
    /// * `name` - Name of the space, used in error messages
    /// * `items` - The names to index, in index order
    pub fn new<I: IntoIterator<Item = K>>(name: &'static str, items: I) -> Result<Self> {
        let mut set = IndexSet::new();
        for item in items {
            if set.contains(&item) {
                bail!("Index space {name} contains duplicate entry {item}");
            }
            set.insert(item);
        }

        Ok(Self { name, items: set })
    }

    /// The name of the space
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The number of entries
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the space is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The indices of the space, in order
    pub fn ord(&self) -> Range<usize> {
        0..self.items.len()
    }

    /// The name with the given index.
    ///
    /// Panics if the index is out of range.
    pub fn get(&self, index: usize) -> &K {
        &self.items[index]
    }

    /// Look up the index of a name, failing if it is absent
    pub fn index_of<Q>(&self, key: &Q) -> Result<usize>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + Display + ?Sized,
    {
        self.items
            .get_index_of(key)
            .with_context(|| format!("{key} not found in index space {}", self.name))
    }

    /// Whether the space contains a name
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.items.contains(key)
    }

    /// Iterate over `(index, name)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (usize, &K)> {
        self.items.iter().enumerate()
    }
}

/// A time axis (hours or years) under sampling.
///
/// Sampled index `i` refers to position `sample[i]` of the full axis. Positions may repeat, so the
/// sample itself is not required to be a set.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeIndex {
    name: &'static str,
    sample: Vec<usize>,
}

impl TimeIndex {
    /// Create a time index from positions on the full axis
    pub fn new(name: &'static str, sample: Vec<usize>) -> Self {
        Self { name, sample }
    }

    /// The number of sampled positions
    pub fn len(&self) -> usize {
        self.sample.len()
    }

    /// Whether nothing is sampled
    pub fn is_empty(&self) -> bool {
        self.sample.is_empty()
    }

    /// The sampled indices, in order
    pub fn ord(&self) -> Range<usize> {
        0..self.sample.len()
    }

    /// The sampled positions on the full axis
    pub fn sample(&self) -> &[usize] {
        &self.sample
    }

    /// The full-axis position of sampled index `i`
    pub fn position(&self, i: usize) -> usize {
        self.sample[i]
    }

    /// Gather the sampled values of a full-axis series, preserving sample order
    pub fn slice<T: Clone>(&self, series: &[T]) -> Result<Vec<T>> {
        self.sample
            .iter()
            .map(|&pos| {
                series.get(pos).cloned().with_context(|| {
                    format!(
                        "Series of length {} has no value for {} {pos}",
                        series.len(),
                        self.name
                    )
                })
            })
            .collect()
    }
}

/// Index spaces for every network collection, plus the sampled time axes
#[derive(Debug, Clone)]
pub struct Indices {
    /// Sampled hours
    pub hours: TimeIndex,
    /// Sampled years
    pub years: TimeIndex,
    /// Energy types
    pub energy_types: IndexSpace<String>,
    /// Emission types
    pub emission_types: IndexSpace<String>,
    /// Fuels
    pub fuels: IndexSpace<String>,
    /// Capacity factor profiles
    pub capacity_factors: IndexSpace<String>,
    /// Generators
    pub generators: IndexSpace<String>,
    /// Demand chunks
    pub demand_chunks: IndexSpace<String>,
    /// Storage units
    pub storages: IndexSpace<String>,
    /// Transmission fees
    pub transmission_fees: IndexSpace<String>,
    /// Lines
    pub lines: IndexSpace<String>,
    /// Buses
    pub buses: IndexSpace<String>,
    /// Aggregated consumers
    pub aggregated_consumers: IndexSpace<String>,
    /// Local balancing stacks
    pub stacks: IndexSpace<String>,
    /// Generator types
    pub generator_types: IndexSpace<String>,
    /// Storage types
    pub storage_types: IndexSpace<String>,
    /// Emission fees
    pub emission_fees: IndexSpace<String>,
    /// Demand-side response rules
    pub dsr: IndexSpace<String>,
    /// Capacity bounds
    pub capacity_bounds: IndexSpace<String>,
    /// Generation fraction policies
    pub generation_fractions: IndexSpace<String>,
    /// Tags of generators and storage units
    pub tags: IndexSpace<String>,
    /// Tags of generator and storage types
    pub type_tags: IndexSpace<String>,
    /// Generators reachable through the stacks of each aggregated consumer
    pub aggr_gen_map: Vec<IndexSet<usize>>,
    /// Storage units reachable through the stacks of each aggregated consumer
    pub aggr_stor_map: Vec<IndexSet<usize>>,
    /// Types of the generators in `aggr_gen_map`
    pub aggr_tgen_map: Vec<IndexSet<usize>>,
    /// Types of the storage units in `aggr_stor_map`
    pub aggr_tstor_map: Vec<IndexSet<usize>>,
    /// Weight of every sampled year in operational costs
    pub year_aggregates: Vec<f64>,
}

/// Build an index space from the keys of a network collection
fn space_from_keys<K: Display, V>(
    name: &'static str,
    map: &IndexMap<K, V>,
) -> Result<IndexSpace<String>> {
    IndexSpace::new(name, map.keys().map(ToString::to_string))
}

/// Union of tag lists, in first-seen order
fn union_of_tags<'a, I: IntoIterator<Item = &'a Vec<String>>>(
    name: &'static str,
    tag_lists: I,
) -> Result<IndexSpace<String>> {
    let tags: IndexSet<String> = tag_lists.into_iter().flatten().cloned().collect();
    IndexSpace::new(name, tags)
}

/// The units attached to the buses of the stacks available to an aggregated consumer
fn units_of_consumer<'a>(
    network: &Network,
    stack_ids: impl Iterator<Item = &'a LocalBalancingStackID>,
    units_by_bus: &IndexMap<BusID, Vec<usize>>,
) -> Result<IndexSet<usize>> {
    let mut units = IndexSet::new();
    for stack_id in stack_ids {
        let stack = network
            .local_balancing_stacks
            .get_element(stack_id, "local balancing stack")?;
        for bus_id in stack.buses.values().flatten() {
            if let Some(bus_units) = units_by_bus.get(bus_id) {
                units.extend(bus_units.iter().copied());
            }
        }
    }

    Ok(units)
}

impl Indices {
    /// Build the index spaces for a network under the sampling given by `config`
    pub fn new(network: &Network, config: &RunConfig) -> Result<Self> {
        let hours = TimeIndex::new("hour", config.hour_sample());
        let years = TimeIndex::new("year", config.year_sample());
        ensure!(!hours.is_empty(), "No hours sampled");
        ensure!(!years.is_empty(), "No years sampled");

        let generators = space_from_keys("GEN", &network.generators)?;
        let storages = space_from_keys("STOR", &network.storages)?;
        let generator_types = space_from_keys("TGEN", &network.generator_types)?;
        let storage_types = space_from_keys("TSTOR", &network.storage_types)?;
        let aggregated_consumers = space_from_keys("AGGR", &network.aggregated_consumers)?;

        let mut gens_by_bus: IndexMap<BusID, Vec<usize>> = IndexMap::new();
        for (gen_idx, generator) in network.generators.values().enumerate() {
            for bus_id in &generator.buses {
                gens_by_bus.entry(bus_id.clone()).or_default().push(gen_idx);
            }
        }
        let mut stors_by_bus: IndexMap<BusID, Vec<usize>> = IndexMap::new();
        for (stor_idx, storage) in network.storages.values().enumerate() {
            stors_by_bus
                .entry(storage.bus.clone())
                .or_default()
                .push(stor_idx);
        }

        let mut aggr_gen_map = Vec::new();
        let mut aggr_stor_map = Vec::new();
        let mut aggr_tgen_map = Vec::new();
        let mut aggr_tstor_map = Vec::new();
        for consumer in network.aggregated_consumers.values() {
            let stack_ids = || consumer.stack_base_fraction.keys();
            let gens = units_of_consumer(network, stack_ids(), &gens_by_bus)?;
            let stors = units_of_consumer(network, stack_ids(), &stors_by_bus)?;

            let tgens = gens
                .iter()
                .map(|&gen_idx| {
                    let generator = &network.generators[gen_idx];
                    generator_types.index_of(&*generator.generator_type.0)
                })
                .collect::<Result<IndexSet<_>>>()?;
            let tstors = stors
                .iter()
                .map(|&stor_idx| {
                    let storage = &network.storages[stor_idx];
                    storage_types.index_of(&*storage.storage_type.0)
                })
                .collect::<Result<IndexSet<_>>>()?;

            aggr_gen_map.push(gens);
            aggr_stor_map.push(stors);
            aggr_tgen_map.push(tgens);
            aggr_tstor_map.push(tstors);
        }

        let year_aggregates = config
            .year_aggregates
            .clone()
            .unwrap_or_else(|| vec![1.0; years.len()]);
        ensure!(
            year_aggregates.len() == years.len(),
            "Expected {} year aggregates, found {}",
            years.len(),
            year_aggregates.len()
        );

        Ok(Self {
            hours,
            years,
            energy_types: IndexSpace::new("ET", network.energy_types.iter().cloned())?,
            emission_types: IndexSpace::new("EMT", network.emission_types.iter().cloned())?,
            fuels: space_from_keys("FUEL", &network.fuels)?,
            capacity_factors: space_from_keys("CF", &network.capacity_factors)?,
            generators,
            demand_chunks: space_from_keys("DEMCH", &network.demand_chunks)?,
            storages,
            transmission_fees: space_from_keys("TF", &network.transmission_fees)?,
            lines: space_from_keys("LINE", &network.lines)?,
            buses: space_from_keys("BUS", &network.buses)?,
            aggregated_consumers,
            stacks: space_from_keys("LBS", &network.local_balancing_stacks)?,
            generator_types,
            storage_types,
            emission_fees: space_from_keys("EMF", &network.emission_fees)?,
            dsr: space_from_keys("DSR", &network.dsr)?,
            capacity_bounds: space_from_keys("CAP_BOUND", &network.capacity_bounds)?,
            generation_fractions: space_from_keys("GF", &network.generation_fractions)?,
            tags: union_of_tags(
                "TAGS",
                network
                    .generators
                    .values()
                    .map(|generator| &generator.tags)
                    .chain(network.storages.values().map(|storage| &storage.tags)),
            )?,
            type_tags: union_of_tags(
                "T_TAGS",
                network
                    .generator_types
                    .values()
                    .map(|gen_type| &gen_type.technology.tags)
                    .chain(
                        network
                            .storage_types
                            .values()
                            .map(|stor_type| &stor_type.technology.tags),
                    ),
            )?,
            aggr_gen_map,
            aggr_stor_map,
            aggr_tgen_map,
            aggr_tstor_map,
            year_aggregates,
        })
    }

    /// Generators owned by some aggregated consumer through its stacks
    pub fn local_generators(&self) -> IndexSet<usize> {
        self.aggr_gen_map.iter().flatten().copied().collect()
    }

    /// Storage units owned by some aggregated consumer through its stacks
    pub fn local_storages(&self) -> IndexSet<usize> {
        self.aggr_stor_map.iter().flatten().copied().collect()
    }

    /// Whether a generator is owned by some aggregated consumer
    pub fn is_local_generator(&self, gen_idx: usize) -> bool {
        self.aggr_gen_map.iter().any(|gens| gens.contains(&gen_idx))
    }

    /// Whether a storage unit is owned by some aggregated consumer
    pub fn is_local_storage(&self, stor_idx: usize) -> bool {
        self.aggr_stor_map.iter().any(|stors| stors.contains(&stor_idx))
    }

    /// Weight of a sampled year in operational costs
    pub fn year_aggregation(&self, y: usize) -> f64 {
        self.year_aggregates[y]
    }
}
