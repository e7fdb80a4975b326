//! The in-memory energy network snapshot consumed by the model compiler.
//!
//! The network is built and validated elsewhere. Every collection is an [`IndexMap`], so the
//! insertion order of elements defines the order of their index spaces.
use indexmap::IndexMap;

pub mod policy;
pub mod sources;
pub mod topology;

pub use policy::*;
pub use sources::*;
pub use topology::*;

/// A series with one value per hour of the full (unsampled) hour axis
pub type HourSeries = Vec<f64>;

/// A series with one value per year of the full (unsampled) year axis
pub type YearSeries = Vec<f64>;

/// A per-year series in which individual years may be unset
pub type OptionalYearSeries = Vec<Option<f64>>;

/// Network-wide constants
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkConstants {
    /// Emission limit per emission type, relative to the base total emission, per year
    pub relative_emission_limits: IndexMap<String, OptionalYearSeries>,
    /// Total emission in the base year per emission type
    pub base_total_emission: IndexMap<String, Option<f64>>,
    /// Power reserve which must be kept by units with a given tag, per energy type
    pub power_reserves: IndexMap<String, IndexMap<String, f64>>,
    /// Multipliers used to derive the unserved energy penalty, per energy type
    pub ens_penalty_coefficients: IndexMap<String, f64>,
    /// Whether every consumer of an aggregated consumer must use a single stack, making stack
    /// fractions binary
    pub binary_fraction: bool,
}

/// A complete, validated energy network
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Network {
    /// Energy types carried by buses, in index order
    pub energy_types: Vec<String>,
    /// Emission types tracked by fuels and fees
    pub emission_types: Vec<String>,
    /// Network-wide constants
    pub constants: NetworkConstants,
    /// Buses
    pub buses: BusMap,
    /// Generators
    pub generators: GeneratorMap,
    /// Storage units
    pub storages: StorageMap,
    /// Transmission lines
    pub lines: LineMap,
    /// Generator types
    pub generator_types: GeneratorTypeMap,
    /// Storage types
    pub storage_types: StorageTypeMap,
    /// Local balancing stacks
    pub local_balancing_stacks: LocalBalancingStackMap,
    /// Aggregated consumers
    pub aggregated_consumers: AggregatedConsumerMap,
    /// Normalised demand profiles
    pub demand_profiles: DemandProfileMap,
    /// Fuels
    pub fuels: FuelMap,
    /// Capacity factor profiles
    pub capacity_factors: CapacityFactorMap,
    /// Emission fees
    pub emission_fees: EmissionFeeMap,
    /// Transmission fees
    pub transmission_fees: TransmissionFeeMap,
    /// Demand chunks
    pub demand_chunks: DemandChunkMap,
    /// Demand-side response rules
    pub dsr: DsrMap,
    /// Inter-technology capacity bounds
    pub capacity_bounds: CapacityBoundMap,
    /// Generation fraction policies
    pub generation_fractions: GenerationFractionMap,
}

impl Network {
    /// Create an empty network carrying the given energy and emission types
    pub fn new(energy_types: &[&str], emission_types: &[&str]) -> Self {
        Self {
            energy_types: energy_types.iter().map(ToString::to_string).collect(),
            emission_types: emission_types.iter().map(ToString::to_string).collect(),
            ..Default::default()
        }
    }
}
