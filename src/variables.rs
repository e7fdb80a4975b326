//! The variable allocator.
//!
//! Every decision variable of the model is declared here, grouped into tensors whose shapes are
//! derived from the index spaces. Columns are named `FAMILY[i,j,...]` after the integer indices of
//! the element they refer to. All variables are non-negative.
use crate::index::Indices;
use crate::parameters::Parameters;
use crate::solver::{Problem, Variable};
use anyhow::Result;
use indexmap::{IndexMap, IndexSet};
use itertools::{Itertools, iproduct};
use log::debug;
use std::hash::Hash;

/// Format the name of the column for one element of a variable family
fn column_name(family: &str, index: &[usize]) -> String {
    format!("{family}[{}]", index.iter().join(","))
}

/// A dense tensor of variables, stored in row-major order
#[derive(Debug, Clone, PartialEq)]
pub struct DenseTensor {
    family: &'static str,
    shape: Vec<usize>,
    variables: Vec<Variable>,
}

impl DenseTensor {
    /// Declare one variable for every element of a tensor of the given shape.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to add columns to
    /// * `family` - Name of the variable family
    /// * `shape` - Size of every axis
    /// * `upper` - Upper bound of every variable
    pub fn new(
        problem: &mut Problem,
        family: &'static str,
        shape: &[usize],
        upper: f64,
    ) -> Result<Self> {
        Self::declare(problem, family, shape, |problem, name| {
            problem.add_variable(name, 0.0, upper)
        })
    }

    /// Declare one binary variable for every element of a tensor of the given shape
    pub fn binary(problem: &mut Problem, family: &'static str, shape: &[usize]) -> Result<Self> {
        Self::declare(problem, family, shape, |problem, name| {
            problem.add_integer_variable(name, 0.0, 1.0)
        })
    }

    fn declare<F>(
        problem: &mut Problem,
        family: &'static str,
        shape: &[usize],
        mut add_column: F,
    ) -> Result<Self>
    where
        F: FnMut(&mut Problem, String) -> Result<Variable>,
    {
        let len = shape.iter().product();
        let mut variables = Vec::with_capacity(len);
        let mut index = vec![0; shape.len()];
        for _ in 0..len {
            variables.push(add_column(problem, column_name(family, &index))?);

            // Advance the multi-index, last axis fastest
            for axis in (0..shape.len()).rev() {
                index[axis] += 1;
                if index[axis] < shape[axis] {
                    break;
                }
                index[axis] = 0;
            }
        }

        Ok(Self {
            family,
            shape: shape.to_vec(),
            variables,
        })
    }

    /// Name of the variable family
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// Size of every axis
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn offset(&self, index: &[usize]) -> usize {
        assert_eq!(
            index.len(),
            self.shape.len(),
            "Wrong number of indices for {}",
            self.family
        );
        index
            .iter()
            .zip(&self.shape)
            .fold(0, |offset, (&i, &size)| {
                assert!(i < size, "Index {i} out of range for {}", self.family);
                offset * size + i
            })
    }

    /// The variable at the given multi-index.
    ///
    /// Panics if the index does not match the tensor's shape.
    pub fn at(&self, index: &[usize]) -> Variable {
        self.variables[self.offset(index)]
    }

    /// Every variable, in row-major order
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }
}

/// A sparse tensor of variables, declared only for the keys that need them
#[derive(Debug, Clone, PartialEq)]
pub struct SparseTensor<K: Hash + Eq> {
    family: &'static str,
    variables: IndexMap<K, Variable>,
}

/// A key of a [`SparseTensor`] which can be written as a list of indices
pub trait TensorKey: Hash + Eq + Copy {
    /// The key as a list of indices, used to name columns
    fn indices(&self) -> Vec<usize>;
}

impl TensorKey for (usize, usize) {
    fn indices(&self) -> Vec<usize> {
        vec![self.0, self.1]
    }
}

impl TensorKey for (usize, usize, usize) {
    fn indices(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2]
    }
}

impl TensorKey for (usize, usize, usize, usize) {
    fn indices(&self) -> Vec<usize> {
        vec![self.0, self.1, self.2, self.3]
    }
}

impl<K: TensorKey> SparseTensor<K> {
    /// Declare one variable for every key.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to add columns to
    /// * `family` - Name of the variable family
    /// * `keys` - The keys to declare variables for
    pub fn new<I>(problem: &mut Problem, family: &'static str, keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = K>,
    {
        let mut variables = IndexMap::new();
        for key in keys {
            let name = column_name(family, &key.indices());
            let var = problem.add_variable(name, 0.0, f64::INFINITY)?;
            variables.insert(key, var);
        }

        Ok(Self { family, variables })
    }

    /// Name of the variable family
    pub fn family(&self) -> &'static str {
        self.family
    }

    /// The variable with the given key, if declared
    pub fn get(&self, key: &K) -> Option<Variable> {
        self.variables.get(key).copied()
    }

    /// Iterate over keys and variables, in declaration order
    pub fn iter(&self) -> impl Iterator<Item = (&K, Variable)> {
        self.variables.iter().map(|(key, var)| (key, *var))
    }

    /// Number of declared variables
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Whether no variables are declared
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

/// Names of the families of one capacity variable group
struct CapacityFamilies {
    cap: &'static str,
    cap_plus: &'static str,
    cap_minus: &'static str,
    cap_base_minus: &'static str,
}

/// Capacity variables of individual units.
///
/// `cap` covers every unit. The increments and decrements exist only for units which are not
/// owned by an aggregated consumer; the capacity of locally-owned units evolves through
/// [`LocalCapacityVariables`] instead.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCapacityVariables {
    /// Installed capacity, `[unit, year]`
    pub cap: DenseTensor,
    /// New capacity whose construction starts in a year, keyed by `(unit, year)`
    pub cap_plus: SparseTensor<(usize, usize)>,
    /// Capacity built in year `s` and retired in year `t`, keyed by `(unit, s, t)`
    pub cap_minus: SparseTensor<(usize, usize, usize)>,
    /// Base capacity retired in a year, keyed by `(unit, year)`
    pub cap_base_minus: SparseTensor<(usize, usize)>,
}

impl UnitCapacityVariables {
    fn new(
        problem: &mut Problem,
        families: &CapacityFamilies,
        n_units: usize,
        local_units: &IndexSet<usize>,
        n_years: usize,
    ) -> Result<Self> {
        let global_units = || (0..n_units).filter(move |unit| !local_units.contains(unit));

        Ok(Self {
            cap: DenseTensor::new(problem, families.cap, &[n_units, n_years], f64::INFINITY)?,
            cap_plus: SparseTensor::new(
                problem,
                families.cap_plus,
                iproduct!(global_units(), 0..n_years),
            )?,
            cap_minus: SparseTensor::new(
                problem,
                families.cap_minus,
                iproduct!(global_units(), 0..n_years, 0..n_years),
            )?,
            cap_base_minus: SparseTensor::new(
                problem,
                families.cap_base_minus,
                iproduct!(global_units(), 0..n_years),
            )?,
        })
    }
}

/// Capacity variables of the locally-owned units of one technology type within one aggregated
/// consumer, keyed by `(consumer, type, ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCapacityVariables {
    /// Installed capacity, keyed by `(consumer, type, year)`
    pub tcap: SparseTensor<(usize, usize, usize)>,
    /// New capacity, keyed by `(consumer, type, year)`
    pub tcap_plus: SparseTensor<(usize, usize, usize)>,
    /// Capacity built in `s` and retired in `t`, keyed by `(consumer, type, s, t)`
    pub tcap_minus: SparseTensor<(usize, usize, usize, usize)>,
    /// Base capacity retired in a year, keyed by `(consumer, type, year)`
    pub tcap_base_minus: SparseTensor<(usize, usize, usize)>,
}

impl LocalCapacityVariables {
    fn new(
        problem: &mut Problem,
        families: &CapacityFamilies,
        types_of_consumer: &[IndexSet<usize>],
        n_years: usize,
    ) -> Result<Self> {
        let pairs = || {
            types_of_consumer
                .iter()
                .enumerate()
                .flat_map(|(aggr, types)| types.iter().map(move |&ty| (aggr, ty)))
        };
        let by_year =
            || pairs().flat_map(move |(aggr, ty)| (0..n_years).map(move |y| (aggr, ty, y)));

        Ok(Self {
            tcap: SparseTensor::new(problem, families.cap, by_year())?,
            tcap_plus: SparseTensor::new(problem, families.cap_plus, by_year())?,
            tcap_minus: SparseTensor::new(
                problem,
                families.cap_minus,
                pairs().flat_map(move |(aggr, ty)| {
                    iproduct!(0..n_years, 0..n_years).map(move |(s, t)| (aggr, ty, s, t))
                }),
            )?,
            tcap_base_minus: SparseTensor::new(problem, families.cap_base_minus, by_year())?,
        })
    }
}

/// Every decision variable of the model
#[derive(Debug, Clone, PartialEq)]
pub struct Variables {
    /// Brutto generation, `[generator, hour, year]`
    pub g_gen: DenseTensor,
    /// Net generation per energy type, `[generator, energy type, hour, year]`
    pub g_gen_et: DenseTensor,
    /// Generation assigned to demand chunks, keyed by `(chunk, generator, hour, year)`
    pub g_gen_dch: SparseTensor<(usize, usize, usize, usize)>,
    /// Generation kept as power reserve, keyed by `(generator, energy type, hour, year)`
    pub g_gen_reserve: SparseTensor<(usize, usize, usize, usize)>,
    /// Total dumped energy, `[generator, hour, year]`
    pub g_dump: DenseTensor,
    /// Dumped energy per energy type, `[generator, energy type, hour, year]`
    pub g_dump_et: DenseTensor,
    /// Generator capacities
    pub g_capacity: UnitCapacityVariables,
    /// Storage discharge, `[storage, hour, year]`
    pub s_gen: DenseTensor,
    /// Storage discharge assigned to demand chunks, keyed by `(chunk, storage, hour, year)`
    pub s_gen_dch: SparseTensor<(usize, usize, usize, usize)>,
    /// Storage charge, `[storage, hour, year]`
    pub s_load: DenseTensor,
    /// State of charge, `[storage, hour, year]`
    pub s_soc: DenseTensor,
    /// Storage capacities
    pub s_capacity: UnitCapacityVariables,
    /// Capacities of locally-owned generator types
    pub tg_capacity: LocalCapacityVariables,
    /// Capacities of locally-owned storage types
    pub ts_capacity: LocalCapacityVariables,
    /// Line flow, `[line, hour, year]`
    pub l_flow: DenseTensor,
    /// Unserved energy, `[bus, hour, year]`
    pub b_ens: DenseTensor,
    /// Load shifted into an hour, keyed by `(bus, hour, year)` for buses with DSR
    pub b_shift_plus: SparseTensor<(usize, usize, usize)>,
    /// Load shifted out of an hour, keyed by `(bus, hour, year)` for buses with DSR
    pub b_shift_minus: SparseTensor<(usize, usize, usize)>,
    /// Fraction of an aggregated consumer using a stack, `[consumer, stack, year]`
    pub f_fraction: DenseTensor,
}

/// Buses on which load can be shifted: those with a DSR rule which deliver energy to consumers
pub fn dsr_buses(parameters: &Parameters) -> Vec<(usize, usize)> {
    parameters
        .buses
        .dsr_type
        .iter()
        .enumerate()
        .filter(|(bus, _)| parameters.buses.lbs_mapping.contains_key(bus))
        .filter_map(|(bus, dsr)| dsr.map(|dsr| (bus, dsr)))
        .collect()
}

/// Keys of generators which keep a power reserve for an energy type, in declaration order
fn reserve_keys(indices: &Indices, parameters: &Parameters) -> IndexSet<(usize, usize)> {
    let generators = &parameters.generators;
    let mut keys = IndexSet::new();
    for (&et, reserves) in &parameters.scenario.power_reserves {
        for &tag in reserves.keys() {
            for gen_idx in indices.generators.ord() {
                if generators.tags[gen_idx].contains(&tag) && generators.ett[gen_idx].contains(&et)
                {
                    keys.insert((gen_idx, et));
                }
            }
        }
    }

    keys
}

impl Variables {
    /// Declare every variable of the model.
    ///
    /// # Arguments
    ///
    /// * `problem` - The problem to add columns to
    /// * `indices` - Index spaces of the model
    /// * `parameters` - Parameter tables of the model
    pub fn new(problem: &mut Problem, indices: &Indices, parameters: &Parameters) -> Result<Self> {
        debug!("Declaring variables");
        let n_hours = indices.hours.len();
        let n_years = indices.years.len();
        let n_gen = indices.generators.len();
        let n_stor = indices.storages.len();
        let n_et = indices.energy_types.len();
        let n_buses = indices.buses.len();
        let hy = || iproduct!(0..n_hours, 0..n_years);

        let gen_chunks = parameters
            .generators
            .demand_chunks
            .iter()
            .enumerate()
            .flat_map(|(g, chunks)| chunks.iter().map(move |&dch| (dch, g)))
            .sorted()
            .flat_map(|(dch, g)| hy().map(move |(h, y)| (dch, g, h, y)))
            .collect_vec();
        let stor_chunks = parameters
            .storages
            .demand_chunks
            .iter()
            .enumerate()
            .flat_map(|(s, chunks)| chunks.iter().map(move |&dch| (dch, s)))
            .sorted()
            .flat_map(|(dch, s)| hy().map(move |(h, y)| (dch, s, h, y)))
            .collect_vec();
        let reserves = reserve_keys(indices, parameters)
            .into_iter()
            .flat_map(|(g, et)| hy().map(move |(h, y)| (g, et, h, y)))
            .collect_vec();
        let shift_keys = dsr_buses(parameters)
            .into_iter()
            .flat_map(|(bus, _)| hy().map(move |(h, y)| (bus, h, y)))
            .collect_vec();

        let fraction_shape = [
            indices.aggregated_consumers.len(),
            indices.stacks.len(),
            n_years,
        ];
        let ens_upper = if parameters.scenario.ens {
            f64::INFINITY
        } else {
            0.0
        };

        let variables = Self {
            g_gen: DenseTensor::new(problem, "G_GEN", &[n_gen, n_hours, n_years], f64::INFINITY)?,
            g_gen_et: DenseTensor::new(
                problem,
                "G_GEN_ET",
                &[n_gen, n_et, n_hours, n_years],
                f64::INFINITY,
            )?,
            g_gen_dch: SparseTensor::new(problem, "G_GEN_DCH", gen_chunks)?,
            g_gen_reserve: SparseTensor::new(problem, "G_GEN_RESERVE", reserves)?,
            g_dump: DenseTensor::new(problem, "G_DUMP", &[n_gen, n_hours, n_years], f64::INFINITY)?,
            g_dump_et: DenseTensor::new(
                problem,
                "G_DUMP_ET",
                &[n_gen, n_et, n_hours, n_years],
                f64::INFINITY,
            )?,
            g_capacity: UnitCapacityVariables::new(
                problem,
                &CapacityFamilies {
                    cap: "G_CAP",
                    cap_plus: "G_CAP_PLUS",
                    cap_minus: "G_CAP_MINUS",
                    cap_base_minus: "G_CAP_BASE_MINUS",
                },
                n_gen,
                &indices.local_generators(),
                n_years,
            )?,
            s_gen: DenseTensor::new(problem, "S_GEN", &[n_stor, n_hours, n_years], f64::INFINITY)?,
            s_gen_dch: SparseTensor::new(problem, "S_GEN_DCH", stor_chunks)?,
            s_load: DenseTensor::new(
                problem,
                "S_LOAD",
                &[n_stor, n_hours, n_years],
                f64::INFINITY,
            )?,
            s_soc: DenseTensor::new(problem, "S_SOC", &[n_stor, n_hours, n_years], f64::INFINITY)?,
            s_capacity: UnitCapacityVariables::new(
                problem,
                &CapacityFamilies {
                    cap: "S_CAP",
                    cap_plus: "S_CAP_PLUS",
                    cap_minus: "S_CAP_MINUS",
                    cap_base_minus: "S_CAP_BASE_MINUS",
                },
                n_stor,
                &indices.local_storages(),
                n_years,
            )?,
            tg_capacity: LocalCapacityVariables::new(
                problem,
                &CapacityFamilies {
                    cap: "TG_TCAP",
                    cap_plus: "TG_TCAP_PLUS",
                    cap_minus: "TG_TCAP_MINUS",
                    cap_base_minus: "TG_TCAP_BASE_MINUS",
                },
                &indices.aggr_tgen_map,
                n_years,
            )?,
            ts_capacity: LocalCapacityVariables::new(
                problem,
                &CapacityFamilies {
                    cap: "TS_TCAP",
                    cap_plus: "TS_TCAP_PLUS",
                    cap_minus: "TS_TCAP_MINUS",
                    cap_base_minus: "TS_TCAP_BASE_MINUS",
                },
                &indices.aggr_tstor_map,
                n_years,
            )?,
            l_flow: DenseTensor::new(
                problem,
                "L_FLOW",
                &[indices.lines.len(), n_hours, n_years],
                f64::INFINITY,
            )?,
            b_ens: DenseTensor::new(problem, "B_ENS", &[n_buses, n_hours, n_years], ens_upper)?,
            b_shift_plus: SparseTensor::new(problem, "B_SHIFT_PLUS", shift_keys.iter().copied())?,
            b_shift_minus: SparseTensor::new(problem, "B_SHIFT_MINUS", shift_keys)?,
            f_fraction: if parameters.scenario.binary_fraction {
                DenseTensor::binary(problem, "F_FRACTION", &fraction_shape)?
            } else {
                DenseTensor::new(problem, "F_FRACTION", &fraction_shape, f64::INFINITY)?
            },
        };
        debug!("Declared {} variables", problem.num_columns());

        Ok(variables)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::fixture::{household_network, run_config};
    use crate::network::Network;
    use rstest::{fixture, rstest};

    struct Allocated {
        indices: Indices,
        problem: Problem,
        variables: Variables,
    }

    fn allocate(network: &Network, config: &RunConfig) -> Allocated {
        let indices = Indices::new(network, config).unwrap();
        let parameters = Parameters::new(network, &indices, config).unwrap();
        let mut problem = Problem::new();
        let variables = Variables::new(&mut problem, &indices, &parameters).unwrap();
        Allocated {
            indices,
            problem,
            variables,
        }
    }

    #[fixture]
    fn allocated(household_network: Network) -> Allocated {
        allocate(&household_network, &run_config())
    }

    #[test]
    fn test_dense_tensor_row_major() {
        let mut problem = Problem::new();
        let tensor = DenseTensor::new(&mut problem, "X", &[2, 3], 1.0).unwrap();
        assert_eq!(tensor.variables().len(), 6);
        assert_eq!(tensor.at(&[1, 2]).index(), 5);
        assert_eq!(tensor.at(&[1, 0]).index(), 3);
        assert_eq!(problem.columns()[4].name, "X[1,1]");
        assert_eq!(problem.columns()[4].upper, 1.0);
    }

    #[test]
    fn test_dense_tensor_empty_axis() {
        let mut problem = Problem::new();
        let tensor = DenseTensor::new(&mut problem, "X", &[0, 3], 1.0).unwrap();
        assert!(tensor.variables().is_empty());
        assert_eq!(problem.num_columns(), 0);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_dense_tensor_out_of_range() {
        let mut problem = Problem::new();
        let tensor = DenseTensor::new(&mut problem, "X", &[2, 3], 1.0).unwrap();
        tensor.at(&[2, 0]);
    }

    #[test]
    fn test_sparse_tensor() {
        let mut problem = Problem::new();
        let tensor = SparseTensor::new(&mut problem, "Y", [(0, 1), (2, 0)]).unwrap();
        assert_eq!(tensor.len(), 2);
        assert!(tensor.get(&(0, 0)).is_none());
        let var = tensor.get(&(2, 0)).unwrap();
        assert_eq!(problem.columns()[var.index()].name, "Y[2,0]");
    }

    #[rstest]
    fn test_shapes(allocated: Allocated) {
        let Allocated {
            indices, variables, ..
        } = allocated;
        let n_gen = indices.generators.len();
        assert_eq!(variables.g_gen.shape(), &[n_gen, 4, 3]);
        assert_eq!(variables.g_gen_et.shape(), &[n_gen, 2, 4, 3]);
        assert_eq!(variables.f_fraction.shape(), &[1, 1, 3]);
    }

    #[rstest]
    fn test_local_units_have_no_increments(allocated: Allocated) {
        let Allocated {
            indices, variables, ..
        } = allocated;
        let heat_pump = indices.generators.index_of("heat_pump").unwrap();
        let coal = indices.generators.index_of("coal_plant").unwrap();
        let hp_type = indices.generator_types.index_of("heat_pump_type").unwrap();

        assert!(variables.g_capacity.cap_plus.get(&(heat_pump, 1)).is_none());
        assert!(variables.g_capacity.cap_plus.get(&(coal, 1)).is_some());
        assert!(variables.s_capacity.cap_plus.is_empty());
        assert!(variables.tg_capacity.tcap_plus.get(&(0, hp_type, 1)).is_some());
        assert_eq!(variables.tg_capacity.tcap.len(), 3);
        assert_eq!(variables.ts_capacity.tcap.len(), 3);
    }

    #[rstest]
    fn test_shift_only_on_dsr_buses(allocated: Allocated) {
        let Allocated {
            indices, variables, ..
        } = allocated;
        let house_el = indices.buses.index_of("house_el").unwrap();
        let grid = indices.buses.index_of("grid").unwrap();
        assert!(variables.b_shift_plus.get(&(house_el, 0, 0)).is_some());
        assert!(variables.b_shift_minus.get(&(grid, 0, 0)).is_none());
        assert_eq!(variables.b_shift_plus.len(), 12);
    }

    #[rstest]
    #[case(true, f64::INFINITY)]
    #[case(false, 0.0)]
    fn test_ens_bounds(household_network: Network, #[case] ens: bool, #[case] expected: f64) {
        let config = RunConfig {
            ens,
            ..run_config()
        };
        let Allocated {
            problem, variables, ..
        } = allocate(&household_network, &config);
        for var in variables.b_ens.variables() {
            assert_eq!(problem.columns()[var.index()].upper, expected);
        }
    }

    #[rstest]
    fn test_reserve_variables(mut household_network: Network) {
        household_network.constants.power_reserves = indexmap::indexmap! {
            "electricity".to_string() => indexmap::indexmap! {"res".to_string() => 1.0},
        };
        let Allocated {
            indices, variables, ..
        } = allocate(&household_network, &run_config());
        let pv = indices.generators.index_of("pv_farm").unwrap();
        let coal = indices.generators.index_of("coal_plant").unwrap();
        assert!(variables.g_gen_reserve.get(&(pv, 0, 0, 0)).is_some());
        assert!(variables.g_gen_reserve.get(&(coal, 0, 0, 0)).is_none());
        assert_eq!(variables.g_gen_reserve.len(), 12);
    }

    #[rstest]
    #[case(false, f64::INFINITY, false)]
    #[case(true, 1.0, true)]
    fn test_fraction_type(
        mut household_network: Network,
        #[case] binary_fraction: bool,
        #[case] upper: f64,
        #[case] integer: bool,
    ) {
        household_network.constants.binary_fraction = binary_fraction;
        let Allocated {
            problem, variables, ..
        } = allocate(&household_network, &run_config());
        for var in variables.f_fraction.variables() {
            let column = &problem.columns()[var.index()];
            assert_eq!(column.upper, upper);
            assert_eq!(column.integer, integer);
        }
        assert_eq!(problem.is_mixed_integer(), binary_fraction);
    }
}
