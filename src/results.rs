//! Dense result arrays read back from an optimal solution.
//!
//! Every array is keyed by entity name. Hourly values are indexed `[hour][year]` over the sampled
//! hours and years; yearly values are indexed by sampled year.
use crate::index::{IndexSpace, Indices};
use crate::solver::{RawSolution, Variable};
use crate::variables::{
    DenseTensor, LocalCapacityVariables, SparseTensor, UnitCapacityVariables, Variables,
};
use indexmap::{IndexMap, IndexSet};
use itertools::Itertools;

/// Values over sampled hours and years, indexed `[hour][year]`
pub type HourlyValues = Vec<Vec<f64>>;

/// Hourly values of one family, keyed by entity name
pub type HourlyMap = IndexMap<String, HourlyValues>;

/// Capacity of one unit (or one consumer-owned unit type) over the years
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityResults {
    /// Installed capacity per year
    pub cap: Vec<f64>,
    /// New capacity whose construction starts in each year
    pub cap_plus: Vec<f64>,
    /// Capacity built in year `s` and retired in year `t`, indexed `[s][t]`
    pub cap_minus: Vec<Vec<f64>>,
    /// Base capacity retired in each year
    pub cap_base_minus: Vec<f64>,
}

/// Results for generators
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorResults {
    /// Brutto generation
    pub generation: HourlyMap,
    /// Net generation per energy type
    pub generation_et: IndexMap<String, HourlyMap>,
    /// Total dumped energy
    pub dump: HourlyMap,
    /// Dumped energy per energy type
    pub dump_et: IndexMap<String, HourlyMap>,
    /// Capacities
    pub capacity: IndexMap<String, CapacityResults>,
}

/// Results for storage units
#[derive(Debug, Clone, PartialEq)]
pub struct StorageResults {
    /// Discharge
    pub generation: HourlyMap,
    /// Charge
    pub load: HourlyMap,
    /// State of charge
    pub soc: HourlyMap,
    /// Capacities
    pub capacity: IndexMap<String, CapacityResults>,
}

/// Results for buses
#[derive(Debug, Clone, PartialEq)]
pub struct BusResults {
    /// Unserved energy
    pub ens: HourlyMap,
    /// Load shifted into an hour (buses with DSR only)
    pub shift_plus: HourlyMap,
    /// Load shifted out of an hour (buses with DSR only)
    pub shift_minus: HourlyMap,
}

/// The solution of an optimised model
#[derive(Debug, Clone, PartialEq)]
pub struct Results {
    /// Value of the objective
    pub objective_value: f64,
    /// Generator results
    pub generators: GeneratorResults,
    /// Storage results
    pub storages: StorageResults,
    /// Flow through every line
    pub line_flow: HourlyMap,
    /// Bus results
    pub buses: BusResults,
    /// Fraction of every aggregated consumer using each of its stacks, per year
    pub fractions: IndexMap<String, IndexMap<String, Vec<f64>>>,
    /// Capacity of consumer-owned generator types, keyed by consumer then type
    pub local_generator_capacity: IndexMap<String, IndexMap<String, CapacityResults>>,
    /// Capacity of consumer-owned storage types, keyed by consumer then type
    pub local_storage_capacity: IndexMap<String, IndexMap<String, CapacityResults>>,
    /// Generation assigned to demand chunks, keyed by chunk then generator or storage unit
    pub demand_chunks: IndexMap<String, HourlyMap>,
}

/// Reads variable values out of a solution
struct Reader<'a> {
    indices: &'a Indices,
    columns: &'a [f64],
}

impl Reader<'_> {
    fn value(&self, var: Variable) -> f64 {
        self.columns[var.index()]
    }

    fn optional(&self, var: Option<Variable>) -> f64 {
        var.map_or(0.0, |var| self.value(var))
    }

    fn hourly<F: Fn(usize, usize) -> Option<Variable>>(&self, var: F) -> HourlyValues {
        self.indices
            .hours
            .ord()
            .map(|h| {
                self.indices
                    .years
                    .ord()
                    .map(|y| self.optional(var(h, y)))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Hourly values of a `[entity, hour, year]` tensor, keyed by entity name
    fn dense_map<'n, I>(&self, names: I, tensor: &DenseTensor) -> HourlyMap
    where
        I: Iterator<Item = (usize, &'n String)>,
    {
        names
            .map(|(idx, name)| {
                (
                    name.clone(),
                    self.hourly(|h, y| Some(tensor.at(&[idx, h, y]))),
                )
            })
            .collect()
    }

    /// Hourly values of a sparse `(entity, hour, year)` tensor for the entities it covers
    fn sparse_map<'n, I>(&self, names: I, tensor: &SparseTensor<(usize, usize, usize)>) -> HourlyMap
    where
        I: Iterator<Item = (usize, &'n String)>,
    {
        names
            .filter(|(idx, _)| tensor.get(&(*idx, 0, 0)).is_some())
            .map(|(idx, name)| (name.clone(), self.hourly(|h, y| tensor.get(&(idx, h, y)))))
            .collect()
    }

    /// Per-energy-type hourly values of a `[entity, energy type, hour, year]` tensor
    fn per_energy_type<'n, I>(&self, names: I, tensor: &DenseTensor) -> IndexMap<String, HourlyMap>
    where
        I: Iterator<Item = (usize, &'n String)>,
    {
        names
            .map(|(idx, name)| {
                let by_type: HourlyMap = self
                    .indices
                    .energy_types
                    .iter()
                    .map(|(et, et_name)| {
                        (
                            et_name.clone(),
                            self.hourly(|h, y| Some(tensor.at(&[idx, et, h, y]))),
                        )
                    })
                    .collect();
                (name.clone(), by_type)
            })
            .collect()
    }

    fn capacity<C, P, M, B>(&self, cap: C, plus: P, minus: M, base_minus: B) -> CapacityResults
    where
        C: Fn(usize) -> Option<Variable>,
        P: Fn(usize) -> Option<Variable>,
        M: Fn(usize, usize) -> Option<Variable>,
        B: Fn(usize) -> Option<Variable>,
    {
        let years = self.indices.years.ord();
        CapacityResults {
            cap: years.clone().map(|y| self.optional(cap(y))).collect(),
            cap_plus: years.clone().map(|y| self.optional(plus(y))).collect(),
            cap_minus: years
                .clone()
                .map(|s| years.clone().map(|t| self.optional(minus(s, t))).collect())
                .collect(),
            cap_base_minus: years.map(|y| self.optional(base_minus(y))).collect(),
        }
    }

    fn unit_capacities<'n, I>(
        &self,
        names: I,
        vars: &UnitCapacityVariables,
    ) -> IndexMap<String, CapacityResults>
    where
        I: Iterator<Item = (usize, &'n String)>,
    {
        names
            .map(|(unit, name)| {
                let capacity = self.capacity(
                    |y| Some(vars.cap.at(&[unit, y])),
                    |y| vars.cap_plus.get(&(unit, y)),
                    |s, t| vars.cap_minus.get(&(unit, s, t)),
                    |y| vars.cap_base_minus.get(&(unit, y)),
                );
                (name.clone(), capacity)
            })
            .collect()
    }

    fn local_capacities(
        &self,
        types_of_consumer: &[IndexSet<usize>],
        type_names: &IndexSpace<String>,
        vars: &LocalCapacityVariables,
    ) -> IndexMap<String, IndexMap<String, CapacityResults>> {
        types_of_consumer
            .iter()
            .enumerate()
            .map(|(aggr, types)| {
                let by_type: IndexMap<String, CapacityResults> = types
                    .iter()
                    .map(|&ty| {
                        let capacity = self.capacity(
                            |y| vars.tcap.get(&(aggr, ty, y)),
                            |y| vars.tcap_plus.get(&(aggr, ty, y)),
                            |s, t| vars.tcap_minus.get(&(aggr, ty, s, t)),
                            |y| vars.tcap_base_minus.get(&(aggr, ty, y)),
                        );
                        (type_names.get(ty).clone(), capacity)
                    })
                    .collect();
                (self.indices.aggregated_consumers.get(aggr).clone(), by_type)
            })
            .collect()
    }
}

impl Results {
    /// Read every variable family out of an optimal solution.
    ///
    /// # Arguments
    ///
    /// * `indices` - Index spaces of the model
    /// * `variables` - Variables of the model
    /// * `solution` - The optimal solution returned by the solver
    pub fn new(indices: &Indices, variables: &Variables, solution: &RawSolution) -> Self {
        let reader = Reader {
            indices,
            columns: &solution.columns,
        };
        let generators = || indices.generators.iter();
        let storages = || indices.storages.iter();

        let fractions = indices
            .aggregated_consumers
            .iter()
            .map(|(aggr, consumer)| {
                let by_stack: IndexMap<String, Vec<f64>> = indices
                    .stacks
                    .iter()
                    .map(|(lbs, stack)| {
                        let values: Vec<f64> = indices
                            .years
                            .ord()
                            .map(|y| reader.value(variables.f_fraction.at(&[aggr, lbs, y])))
                            .collect();
                        (stack.clone(), values)
                    })
                    .collect();
                (consumer.clone(), by_stack)
            })
            .collect();

        let mut demand_chunks: IndexMap<String, HourlyMap> = indices
            .demand_chunks
            .iter()
            .map(|(_, name)| (name.clone(), IndexMap::new()))
            .collect();
        let generator_chunks = variables
            .g_gen_dch
            .iter()
            .map(|(&(dch, g, _, _), _)| (dch, g))
            .unique();
        for (dch, g) in generator_chunks {
            let values = reader.hourly(|h, y| variables.g_gen_dch.get(&(dch, g, h, y)));
            if let Some((_, chunk)) = demand_chunks.get_index_mut(dch) {
                chunk.insert(indices.generators.get(g).clone(), values);
            }
        }
        let storage_chunks = variables
            .s_gen_dch
            .iter()
            .map(|(&(dch, s, _, _), _)| (dch, s))
            .unique();
        for (dch, s) in storage_chunks {
            let values = reader.hourly(|h, y| variables.s_gen_dch.get(&(dch, s, h, y)));
            if let Some((_, chunk)) = demand_chunks.get_index_mut(dch) {
                chunk.insert(indices.storages.get(s).clone(), values);
            }
        }

        Self {
            objective_value: solution.objective_value,
            generators: GeneratorResults {
                generation: reader.dense_map(generators(), &variables.g_gen),
                generation_et: reader.per_energy_type(generators(), &variables.g_gen_et),
                dump: reader.dense_map(generators(), &variables.g_dump),
                dump_et: reader.per_energy_type(generators(), &variables.g_dump_et),
                capacity: reader.unit_capacities(generators(), &variables.g_capacity),
            },
            storages: StorageResults {
                generation: reader.dense_map(storages(), &variables.s_gen),
                load: reader.dense_map(storages(), &variables.s_load),
                soc: reader.dense_map(storages(), &variables.s_soc),
                capacity: reader.unit_capacities(storages(), &variables.s_capacity),
            },
            line_flow: reader.dense_map(indices.lines.iter(), &variables.l_flow),
            buses: BusResults {
                ens: reader.dense_map(indices.buses.iter(), &variables.b_ens),
                shift_plus: reader.sparse_map(indices.buses.iter(), &variables.b_shift_plus),
                shift_minus: reader.sparse_map(indices.buses.iter(), &variables.b_shift_minus),
            },
            fractions,
            local_generator_capacity: reader.local_capacities(
                &indices.aggr_tgen_map,
                &indices.generator_types,
                &variables.tg_capacity,
            ),
            local_storage_capacity: reader.local_capacities(
                &indices.aggr_tstor_map,
                &indices.storage_types,
                &variables.ts_capacity,
            ),
            demand_chunks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Compiled, N_HOURS, N_YEARS, compiled};
    use crate::solver::OptimisationStatus;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    /// A solution in which every column takes its own index as value
    fn indexed_solution(compiled: &Compiled) -> RawSolution {
        RawSolution {
            status: OptimisationStatus::Optimal,
            objective_value: 42.0,
            columns: (0..compiled.problem.num_columns()).map(|i| i as f64).collect(),
        }
    }

    #[rstest]
    fn test_results_shapes(compiled: Compiled) {
        let solution = indexed_solution(&compiled);
        let results = Results::new(&compiled.indices, &compiled.variables, &solution);
        assert_approx_eq!(f64, results.objective_value, 42.0);

        let coal = &results.generators.generation["coal_plant"];
        assert_eq!(coal.len(), N_HOURS);
        assert_eq!(coal[0].len(), N_YEARS);
        assert_eq!(results.generators.generation_et["heat_pump"].len(), 2);
        assert_eq!(results.buses.ens.len(), 3);
        assert_eq!(results.buses.shift_plus.keys().collect::<Vec<_>>(), ["house_el"]);
        assert_eq!(results.fractions["households"]["lbs_house"].len(), N_YEARS);
        assert!(
            results.local_generator_capacity["households"].contains_key("heat_pump_type")
        );
    }

    #[rstest]
    fn test_results_values(compiled: Compiled) {
        let solution = indexed_solution(&compiled);
        let results = Results::new(&compiled.indices, &compiled.variables, &solution);
        let vars = &compiled.variables;

        let expected = vars.l_flow.at(&[0, 2, 1]).index() as f64;
        assert_approx_eq!(f64, results.line_flow["grid_to_house"][2][1], expected);

        // Consumer-owned units have no increments of their own
        let heat_pump = &results.generators.capacity["heat_pump"];
        assert_eq!(heat_pump.cap_plus, vec![0.0; N_YEARS]);
        let expected = vars.g_capacity.cap.at(&[2, 1]).index() as f64;
        assert_approx_eq!(f64, heat_pump.cap[1], expected);

        let coal = &results.generators.capacity["coal_plant"];
        let expected = vars.g_capacity.cap_minus.get(&(0, 1, 2)).unwrap().index() as f64;
        assert_approx_eq!(f64, coal.cap_minus[1][2], expected);
    }
}
