//! Energy sources (generators and storage units) and their technology types.
use super::{HourSeries, OptionalYearSeries, YearSeries};
use crate::id::{define_id_getter, define_id_type};
use crate::network::{BusID, CapacityFactorID, EmissionFeeID, FuelID};
use indexmap::{IndexMap, IndexSet};

define_id_type! {GeneratorID}
define_id_type! {StorageID}
define_id_type! {GeneratorTypeID}
define_id_type! {StorageTypeID}

/// A map of [`Generator`]s, keyed by ID
pub type GeneratorMap = IndexMap<GeneratorID, Generator>;

/// A map of [`Storage`]s, keyed by ID
pub type StorageMap = IndexMap<StorageID, Storage>;

/// A map of [`GeneratorType`]s, keyed by ID
pub type GeneratorTypeMap = IndexMap<GeneratorTypeID, GeneratorType>;

/// A map of [`StorageType`]s, keyed by ID
pub type StorageTypeMap = IndexMap<StorageTypeID, StorageType>;

/// Per-unit capacity limits shared by generators and storage units
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UnitCapacityLimits {
    /// Lower bound on installed capacity per year
    pub min_capacity: OptionalYearSeries,
    /// Upper bound on installed capacity per year
    pub max_capacity: OptionalYearSeries,
    /// Lower bound on the year-over-year capacity change
    pub min_capacity_increase: OptionalYearSeries,
    /// Upper bound on the year-over-year capacity change
    pub max_capacity_increase: OptionalYearSeries,
}

/// Technology-level parameters shared by generator and storage types
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TechnologyParameters {
    /// Asset life time in years
    pub life_time: usize,
    /// Construction time in years
    pub build_time: usize,
    /// Capital expenditure per unit of new capacity, per year of construction start
    pub capex: YearSeries,
    /// Operating expenditure per unit of installed capacity, per year
    pub opex: YearSeries,
    /// Type-wide capacity limits
    pub limits: UnitCapacityLimits,
    /// Tags attached to the technology
    pub tags: Vec<String>,
}

/// A generator (or, more generally, an energy converter) attached to one or more buses
#[derive(Debug, Clone, PartialEq)]
pub struct Generator {
    /// Unique identifier
    pub id: GeneratorID,
    /// The generator's technology type
    pub generator_type: GeneratorTypeID,
    /// Buses the unit is attached to
    pub buses: IndexSet<BusID>,
    /// Capacity installed before the first modelled year
    pub unit_base_cap: f64,
    /// Unit-level capacity limits
    pub limits: UnitCapacityLimits,
    /// Minimum nominal power of a single device
    pub min_device_nom_power: Option<f64>,
    /// Maximum nominal power of a single device
    pub max_device_nom_power: Option<f64>,
    /// Emission fees charged on the unit's emissions
    pub emission_fees: IndexSet<EmissionFeeID>,
    /// Tags attached to the unit
    pub tags: Vec<String>,
    /// Name of a group of units forced to have identical capacities
    pub capacity_binding: Option<String>,
}
define_id_getter! {Generator, GeneratorID}

/// A storage unit attached to a single bus
#[derive(Debug, Clone, PartialEq)]
pub struct Storage {
    /// Unique identifier
    pub id: StorageID,
    /// The storage unit's technology type
    pub storage_type: StorageTypeID,
    /// The bus the unit is attached to
    pub bus: BusID,
    /// Capacity installed before the first modelled year
    pub unit_base_cap: f64,
    /// Unit-level capacity limits
    pub limits: UnitCapacityLimits,
    /// Minimum nominal power of a single device
    pub min_device_nom_power: Option<f64>,
    /// Maximum nominal power of a single device
    pub max_device_nom_power: Option<f64>,
    /// Tags attached to the unit
    pub tags: Vec<String>,
}
define_id_getter! {Storage, StorageID}

/// A generator technology
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorType {
    /// Unique identifier
    pub id: GeneratorTypeID,
    /// Life time, build time, costs, limits and tags
    pub technology: TechnologyParameters,
    /// Hourly efficiency for every energy type produced
    pub efficiency: IndexMap<String, HourSeries>,
    /// Energy types produced
    pub energy_types: IndexSet<String>,
    /// Reduction of fuel emissions per emission type, per year
    pub emission_reduction: IndexMap<String, YearSeries>,
    /// Hourly conversion rate for every energy type consumed
    pub conversion_rate: IndexMap<String, HourSeries>,
    /// Fuel burned, if any
    pub fuel: Option<FuelID>,
    /// Availability profile for non-dispatchable technologies
    pub capacity_factor: Option<CapacityFactorID>,
    /// Maximum hourly fraction of capacity that can be used
    pub power_utilization: HourSeries,
    /// Minimum hourly fraction of capacity that must be used by dispatchable units
    pub minimal_power_utilization: HourSeries,
    /// Maximum hour-over-hour increase in generation as a fraction of capacity
    pub ramp_up: Option<f64>,
    /// Maximum hour-over-hour decrease in generation as a fraction of capacity
    pub ramp_down: Option<f64>,
    /// Cost of curtailed (dumped) energy per year
    pub energy_curtailment_cost: Option<YearSeries>,
    /// Compensation paid per unit of generation per year
    pub generation_compensation: Option<YearSeries>,
}
define_id_getter! {GeneratorType, GeneratorTypeID}

/// A storage technology
#[derive(Debug, Clone, PartialEq)]
pub struct StorageType {
    /// Unique identifier
    pub id: StorageTypeID,
    /// Life time, build time, costs, limits and tags
    pub technology: TechnologyParameters,
    /// Energy type stored
    pub energy_type: String,
    /// Discharge efficiency
    pub generation_efficiency: f64,
    /// Charge efficiency
    pub load_efficiency: f64,
    /// Number of hours after which the state of charge is reset to zero
    pub cycle_length: Option<usize>,
    /// Ratio of nominal power to energy capacity
    pub power_to_capacity: f64,
    /// Fraction of the state of charge lost every hour
    pub energy_loss: f64,
    /// Fraction of capacity usable for storing energy
    pub power_utilization: f64,
}
define_id_getter! {StorageType, StorageTypeID}
