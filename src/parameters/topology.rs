//! Parameters of buses, lines, local balancing stacks and aggregated consumers.
use super::extract::{element_prop, index_prop, indices_of, keyed_by_index, sample_optional};
use crate::id::ElementMap;
use crate::index::Indices;
use crate::network::{AggregatedConsumer, LocalBalancingStackID, Network, OptionalYearSeries};
use anyhow::{Context, Result, bail, ensure};
use float_cmp::approx_eq;
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

/// Parameters of buses
#[derive(Debug, Clone, PartialEq)]
pub struct BusParameters {
    /// Energy type balanced at the bus
    pub et: Vec<usize>,
    /// Generators attached to the bus
    pub generators: Vec<IndexSet<usize>>,
    /// Storage units attached to the bus
    pub storages: Vec<IndexSet<usize>>,
    /// Lines ending at the bus
    pub lines_in: Vec<IndexSet<usize>>,
    /// Lines starting at the bus
    pub lines_out: Vec<IndexSet<usize>>,
    /// The stack delivering energy to consumers through each bus, for its "bus out" buses only
    pub lbs_mapping: IndexMap<usize, usize>,
    /// Demand-side response rule applied at the bus
    pub dsr_type: Vec<Option<usize>>,
}

impl BusParameters {
    /// Extract the parameters of every bus, deriving the attached units and lines
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let n_buses = indices.buses.len();
        let mut generators = vec![IndexSet::new(); n_buses];
        for (gen_idx, generator) in network.generators.values().enumerate() {
            for bus_id in &generator.buses {
                generators[indices.buses.index_of(&*bus_id.0)?].insert(gen_idx);
            }
        }
        let mut storages = vec![IndexSet::new(); n_buses];
        for (stor_idx, storage) in network.storages.values().enumerate() {
            storages[indices.buses.index_of(&*storage.bus.0)?].insert(stor_idx);
        }
        let mut lines_in = vec![IndexSet::new(); n_buses];
        let mut lines_out = vec![IndexSet::new(); n_buses];
        for (line_idx, line) in network.lines.values().enumerate() {
            lines_out[indices.buses.index_of(&*line.from.0)?].insert(line_idx);
            lines_in[indices.buses.index_of(&*line.to.0)?].insert(line_idx);
        }

        let mut lbs_mapping = IndexMap::new();
        for (lbs_idx, stack) in network.local_balancing_stacks.values().enumerate() {
            for bus_id in stack.buses_out.values() {
                lbs_mapping.insert(indices.buses.index_of(&*bus_id.0)?, lbs_idx);
            }
        }

        Ok(Self {
            et: element_prop(&network.buses, &indices.buses, |bus| {
                indices.energy_types.index_of(bus.energy_type.as_str())
            })?,
            generators,
            storages,
            lines_in,
            lines_out,
            lbs_mapping,
            dsr_type: index_prop(&network.buses, &indices.buses, &indices.dsr, |bus| {
                bus.dsr_type.as_ref().map(|dsr| &*dsr.0)
            })?,
        })
    }
}

/// Parameters of transmission lines
#[derive(Debug, Clone, PartialEq)]
pub struct LineParameters {
    /// Energy type carried
    pub et: Vec<usize>,
    /// Source bus
    pub bus_from: Vec<usize>,
    /// Destination bus
    pub bus_to: Vec<usize>,
    /// Fraction of the flow lost in transmission
    pub loss: Vec<f64>,
    /// Maximum flow per hour (may be infinite)
    pub cap: Vec<f64>,
    /// Transmission fee charged on the flow
    pub tf: Vec<Option<usize>>,
}

impl LineParameters {
    /// Extract the parameters of every line
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let lines = &network.lines;
        let space = &indices.lines;

        Ok(Self {
            et: element_prop(lines, space, |line| {
                indices.energy_types.index_of(line.energy_type.as_str())
            })?,
            bus_from: element_prop(lines, space, |line| indices.buses.index_of(&*line.from.0))?,
            bus_to: element_prop(lines, space, |line| indices.buses.index_of(&*line.to.0))?,
            loss: element_prop(lines, space, |line| Ok(line.transmission_loss))?,
            cap: element_prop(lines, space, |line| Ok(line.max_capacity))?,
            tf: index_prop(lines, space, &indices.transmission_fees, |line| {
                line.transmission_fee.as_ref().map(|fee| &*fee.0)
            })?,
        })
    }
}

/// Parameters of local balancing stacks
#[derive(Debug, Clone, PartialEq)]
pub struct LbsParameters {
    /// The bus delivering each energy type to consumers
    pub bus_out: Vec<IndexMap<usize, usize>>,
    /// All buses of the stack, per energy type
    pub buses: Vec<IndexMap<usize, IndexSet<usize>>>,
    /// The aggregated consumer which can use the stack, if any
    pub aggr_idx: Vec<Option<usize>>,
}

impl LbsParameters {
    /// Extract the parameters of every local balancing stack
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let stacks = &network.local_balancing_stacks;
        let space = &indices.stacks;

        let mut aggr_idx = vec![None; space.len()];
        for (consumer_idx, consumer) in network.aggregated_consumers.values().enumerate() {
            for stack_id in consumer.stack_base_fraction.keys() {
                let lbs_idx = space.index_of(&*stack_id.0)?;
                if let Some(other) = aggr_idx[lbs_idx].replace(consumer_idx) {
                    bail!(
                        "Local balancing stack {stack_id} is used by aggregated consumers {} and {}",
                        indices.aggregated_consumers.get(other),
                        consumer.id
                    );
                }
            }
        }

        Ok(Self {
            bus_out: element_prop(stacks, space, |stack| {
                keyed_by_index(&indices.energy_types, &stack.buses_out, |bus_id| {
                    indices.buses.index_of(&*bus_id.0)
                })
            })?,
            buses: element_prop(stacks, space, |stack| {
                keyed_by_index(&indices.energy_types, &stack.buses, |bus_ids| {
                    indices_of(&indices.buses, bus_ids)
                })
            })?,
            aggr_idx,
        })
    }
}

/// Per-stack series of an aggregated consumer, keyed by stack index
pub type StackSeries = IndexMap<usize, Vec<Option<f64>>>;

/// Parameters of aggregated consumers
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedConsumerParameters {
    /// Demand per energy type, indexed by `[hour][year]`
    pub dem: Vec<IndexMap<usize, Vec<Vec<f64>>>>,
    /// Base-year fraction of consumers using each stack, indexed by `[consumer][stack]`
    pub fr_base: Vec<Vec<f64>>,
    /// 1 where the consumer can use the stack, 0 otherwise, indexed by `[consumer][stack]`
    pub lbs_indicator: Vec<Vec<f64>>,
    /// Lower bound on the fraction of each stack
    pub min_fraction: Vec<StackSeries>,
    /// Upper bound on the fraction of each stack
    pub max_fraction: Vec<StackSeries>,
    /// Upper bound on the year-over-year increase of each stack's fraction
    pub max_fraction_increase: Vec<StackSeries>,
    /// Upper bound on the year-over-year decrease of each stack's fraction
    pub max_fraction_decrease: Vec<StackSeries>,
    /// Number of consumers over sampled years
    pub n_consumers: Vec<Vec<f64>>,
}

/// Sample a per-stack fraction bound of every aggregated consumer
fn stack_series<F>(network: &Network, indices: &Indices, get: F) -> Result<Vec<StackSeries>>
where
    F: Fn(&AggregatedConsumer) -> &IndexMap<LocalBalancingStackID, OptionalYearSeries>,
{
    element_prop(
        &network.aggregated_consumers,
        &indices.aggregated_consumers,
        |consumer| {
            keyed_by_index(&indices.stacks, get(consumer), |series| {
                sample_optional(&indices.years, series)
            })
        },
    )
}

/// With binary fractions, every fraction and fraction bound of a consumer must be 0 or 1
fn check_binary_fractions(consumer: &AggregatedConsumer) -> Result<()> {
    let is_binary = |value: f64| approx_eq!(f64, value, 0.0) || approx_eq!(f64, value, 1.0);
    for (stack_id, &fraction) in &consumer.stack_base_fraction {
        ensure!(
            is_binary(fraction),
            "For binary fractions, the base fraction of stack {stack_id} in aggregated consumer \
            {} must be 0 or 1, found {fraction}",
            consumer.id
        );
    }

    let bounds = [
        ("min_fraction", &consumer.min_fraction),
        ("max_fraction", &consumer.max_fraction),
        ("max_fraction_increase", &consumer.max_fraction_increase),
        ("max_fraction_decrease", &consumer.max_fraction_decrease),
    ];
    for (name, bound) in bounds {
        for (stack_id, series) in bound {
            let wrong_years = series
                .iter()
                .positions(|value| value.is_some_and(|value| !is_binary(value)))
                .collect_vec();
            ensure!(
                wrong_years.is_empty(),
                "For binary fractions, {name} of stack {stack_id} in aggregated consumer {} \
                must be 0 or 1, found other values in years {wrong_years:?}",
                consumer.id
            );
        }
    }

    Ok(())
}

impl AggregatedConsumerParameters {
    /// Extract the parameters of every aggregated consumer
    pub fn new(network: &Network, indices: &Indices) -> Result<Self> {
        let consumers = &network.aggregated_consumers;
        let space = &indices.aggregated_consumers;
        if network.constants.binary_fraction {
            for consumer in consumers.values() {
                check_binary_fractions(consumer)?;
            }
        }

        let n_consumers = element_prop(consumers, space, |consumer| {
            indices.years.slice(&consumer.n_consumers)
        })?;

        let dem = element_prop(consumers, space, |consumer| {
            let profile = network
                .demand_profiles
                .get_element(&consumer.demand_profile, "demand profile")?;
            let n_consumers = &consumer.n_consumers;
            profile
                .normalized_profile
                .iter()
                .map(|(energy_type, shape)| {
                    let usage = consumer
                        .yearly_energy_usage
                        .get(energy_type)
                        .with_context(|| {
                            format!(
                                "Aggregated consumer {} has no yearly usage of {energy_type}",
                                consumer.id
                            )
                        })?;
                    let shape = indices.hours.slice(shape)?;
                    let yearly: Vec<f64> = indices
                        .years
                        .slice(usage)?
                        .into_iter()
                        .zip(indices.years.slice(n_consumers)?)
                        .map(|(usage, n)| usage * n)
                        .collect();
                    let demand = shape
                        .iter()
                        .map(|share| yearly.iter().map(|total| share * total).collect())
                        .collect();

                    Ok((indices.energy_types.index_of(energy_type.as_str())?, demand))
                })
                .collect::<Result<IndexMap<_, _>>>()
        })?;

        let fractions = |indicator: bool| {
            element_prop(consumers, space, |consumer| {
                let mut row = vec![0.0; indices.stacks.len()];
                for (stack_id, base_fraction) in &consumer.stack_base_fraction {
                    row[indices.stacks.index_of(&*stack_id.0)?] =
                        if indicator { 1.0 } else { *base_fraction };
                }
                Ok(row)
            })
        };

        Ok(Self {
            dem,
            fr_base: fractions(false)?,
            lbs_indicator: fractions(true)?,
            min_fraction: stack_series(network, indices, |c| &c.min_fraction)?,
            max_fraction: stack_series(network, indices, |c| &c.max_fraction)?,
            max_fraction_increase: stack_series(network, indices, |c| &c.max_fraction_increase)?,
            max_fraction_decrease: stack_series(network, indices, |c| &c.max_fraction_decrease)?,
            n_consumers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{assert_error, household_network, run_config};
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    #[rstest]
    fn test_bus_parameters(household_network: Network) {
        let indices = Indices::new(&household_network, &run_config()).unwrap();
        let params = BusParameters::new(&household_network, &indices).unwrap();

        let grid = indices.buses.index_of("grid").unwrap();
        let house_el = indices.buses.index_of("house_el").unwrap();
        let line = indices.lines.index_of("grid_to_house").unwrap();
        let lbs = indices.stacks.index_of("lbs_house").unwrap();

        assert_eq!(params.lines_out[grid], IndexSet::from([line]));
        assert_eq!(params.lines_in[house_el], IndexSet::from([line]));
        assert_eq!(params.lbs_mapping.get(&house_el), Some(&lbs));
        assert_eq!(params.lbs_mapping.get(&grid), None);
        assert_eq!(
            params.dsr_type[house_el],
            Some(indices.dsr.index_of("dsr_house").unwrap())
        );
        assert!(
            params.generators[house_el].contains(&indices.generators.index_of("heat_pump").unwrap())
        );
    }

    #[rstest]
    fn test_aggregated_consumer_demand(household_network: Network) {
        let config = run_config();
        let indices = Indices::new(&household_network, &config).unwrap();
        let params = AggregatedConsumerParameters::new(&household_network, &indices).unwrap();
        let electricity = indices.energy_types.index_of("electricity").unwrap();

        // profile 0.25 x usage 4 x 10 consumers
        let demand = &params.dem[0][&electricity];
        assert_eq!(demand.len(), config.n_hours);
        for hourly in demand {
            for value in hourly {
                assert_approx_eq!(f64, *value, 10.0);
            }
        }
        assert_eq!(params.fr_base, vec![vec![1.0]]);
        assert_eq!(params.lbs_indicator, vec![vec![1.0]]);
    }

    #[rstest]
    fn test_stack_shared_by_two_consumers(mut household_network: Network) {
        let mut other = household_network.aggregated_consumers[0].clone();
        other.id = "offices".into();
        household_network
            .aggregated_consumers
            .insert(other.id.clone(), other);
        let indices = Indices::new(&household_network, &run_config()).unwrap();

        assert_error!(
            LbsParameters::new(&household_network, &indices),
            "Local balancing stack lbs_house is used by aggregated consumers households and offices"
        );
    }

    #[rstest]
    fn test_binary_fractions(mut household_network: Network) {
        household_network.constants.binary_fraction = true;
        let indices = Indices::new(&household_network, &run_config()).unwrap();
        assert!(AggregatedConsumerParameters::new(&household_network, &indices).is_ok());

        let consumer = &mut household_network.aggregated_consumers[0];
        consumer.max_fraction = indexmap! {"lbs_house".into() => vec![None, Some(1.0), Some(0.5)]};
        assert_error!(
            AggregatedConsumerParameters::new(&household_network, &indices),
            "For binary fractions, max_fraction of stack lbs_house in aggregated consumer \
            households must be 0 or 1, found other values in years [2]"
        );

        household_network.constants.binary_fraction = false;
        assert!(AggregatedConsumerParameters::new(&household_network, &indices).is_ok());
    }

    #[rstest]
    fn test_binary_base_fraction(mut household_network: Network) {
        household_network.constants.binary_fraction = true;
        household_network.aggregated_consumers[0].stack_base_fraction =
            indexmap! {"lbs_house".into() => 0.5};
        let indices = Indices::new(&household_network, &run_config()).unwrap();
        assert_error!(
            AggregatedConsumerParameters::new(&household_network, &indices),
            "For binary fractions, the base fraction of stack lbs_house in aggregated consumer \
            households must be 0 or 1, found 0.5"
        );
    }
}
