//! Fuels, fees, profiles and policy rules.
use super::{HourSeries, OptionalYearSeries, YearSeries};
use crate::id::{define_id_getter, define_id_type};
use indexmap::IndexMap;
use serde_string_enum::DeserializeLabeledStringEnum;

define_id_type! {FuelID}
define_id_type! {CapacityFactorID}
define_id_type! {EmissionFeeID}
define_id_type! {TransmissionFeeID}
define_id_type! {DemandChunkID}
define_id_type! {DsrID}
define_id_type! {CapacityBoundID}
define_id_type! {GenerationFractionID}

/// A map of [`Fuel`]s, keyed by ID
pub type FuelMap = IndexMap<FuelID, Fuel>;

/// A map of [`CapacityFactor`]s, keyed by ID
pub type CapacityFactorMap = IndexMap<CapacityFactorID, CapacityFactor>;

/// A map of [`EmissionFee`]s, keyed by ID
pub type EmissionFeeMap = IndexMap<EmissionFeeID, EmissionFee>;

/// A map of [`TransmissionFee`]s, keyed by ID
pub type TransmissionFeeMap = IndexMap<TransmissionFeeID, TransmissionFee>;

/// A map of [`DemandChunk`]s, keyed by ID
pub type DemandChunkMap = IndexMap<DemandChunkID, DemandChunk>;

/// A map of [`DsrRule`]s, keyed by ID
pub type DsrMap = IndexMap<DsrID, DsrRule>;

/// A map of [`CapacityBound`]s, keyed by ID
pub type CapacityBoundMap = IndexMap<CapacityBoundID, CapacityBound>;

/// A map of [`GenerationFraction`]s, keyed by ID
pub type GenerationFractionMap = IndexMap<GenerationFractionID, GenerationFraction>;

/// A fuel burned by generators
#[derive(Debug, Clone, PartialEq)]
pub struct Fuel {
    /// Unique identifier
    pub id: FuelID,
    /// Emission per unit of fuel, per emission type
    pub emission: IndexMap<String, f64>,
    /// Maximum amount available per year
    pub availability: OptionalYearSeries,
    /// Cost per unit of fuel, per year
    pub cost: YearSeries,
    /// Energy released per unit of fuel
    pub energy_per_unit: f64,
}
define_id_getter! {Fuel, FuelID}

/// An hourly availability profile for non-dispatchable technologies
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityFactor {
    /// Unique identifier
    pub id: CapacityFactorID,
    /// Fraction of capacity available per hour
    pub profile: HourSeries,
}
define_id_getter! {CapacityFactor, CapacityFactorID}

/// A fee charged per unit of a given emission type
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionFee {
    /// Unique identifier
    pub id: EmissionFeeID,
    /// Emission type charged
    pub emission_type: String,
    /// Price per unit of emission, per year
    pub price: YearSeries,
}
define_id_getter! {EmissionFee, EmissionFeeID}

/// A fee charged per unit of energy transmitted through a line
#[derive(Debug, Clone, PartialEq)]
pub struct TransmissionFee {
    /// Unique identifier
    pub id: TransmissionFeeID,
    /// Fee per hour
    pub fee: HourSeries,
}
define_id_getter! {TransmissionFee, TransmissionFeeID}

/// A tag-scoped demand which must be covered within specific periods
#[derive(Debug, Clone, PartialEq)]
pub struct DemandChunk {
    /// Unique identifier
    pub id: DemandChunkID,
    /// Tag of the units allowed to cover the demand
    pub tag: String,
    /// Energy type demanded
    pub energy_type: String,
    /// Periods as inclusive `(start, end)` hours on the full hour axis
    pub periods: Vec<(usize, usize)>,
    /// Demand per period (rows, matching `periods`) and year (columns)
    pub demand: Vec<YearSeries>,
}
define_id_getter! {DemandChunk, DemandChunkID}

/// A demand-side response rule governing load shifting on a bus
#[derive(Debug, Clone, PartialEq)]
pub struct DsrRule {
    /// Unique identifier
    pub id: DsrID,
    /// Ratio of compensating (positive) shift to shed (negative) shift in a balancing period
    pub compensation_factor: f64,
    /// Length of a balancing period in sampled hours
    pub balancing_period_len: usize,
    /// Penalty per unit of negative shift
    pub penalization_minus: f64,
    /// Penalty per unit of positive shift
    pub penalization_plus: f64,
    /// Maximum shed load in a period relative to the period's load
    pub relative_shift_limit: Option<f64>,
    /// Maximum shed load in a period
    pub abs_shift_limit: Option<f64>,
    /// Maximum hourly positive shift relative to the hourly load
    pub hourly_relative_shift_plus_limit: Option<f64>,
    /// Maximum hourly negative shift relative to the hourly load
    pub hourly_relative_shift_minus_limit: Option<f64>,
}
define_id_getter! {DsrRule, DsrID}

/// The relation imposed by a [`CapacityBound`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum BoundSense {
    /// Left-hand side equals right-hand side
    #[string = "EQ"]
    Equal,
    /// Left-hand side is at most the right-hand side
    #[string = "LEQ"]
    LessOrEqual,
}

/// A linear relation between the capacities of two named technologies
#[derive(Debug, Clone, PartialEq)]
pub struct CapacityBound {
    /// Unique identifier
    pub id: CapacityBoundID,
    /// Generator or storage on the left-hand side
    pub left_technology: String,
    /// Generator or storage on the right-hand side
    pub right_technology: String,
    /// The relation imposed
    pub sense: BoundSense,
    /// Coefficient multiplying the left-hand capacity
    pub left_coefficient: f64,
}
define_id_getter! {CapacityBound, CapacityBoundID}

/// How generation is aggregated by a [`GenerationFraction`] policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, DeserializeLabeledStringEnum)]
pub enum FractionType {
    /// The bound holds in every hour
    #[string = "hourly"]
    Hourly,
    /// The bound holds for yearly totals
    #[string = "yearly"]
    Yearly,
}

/// A bound on generation from a subset of tagged units relative to a superset
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationFraction {
    /// Unique identifier
    pub id: GenerationFractionID,
    /// Tag of the superset of units
    pub tag: String,
    /// Tag of the subset of units
    pub sub_tag: String,
    /// Energy type considered
    pub energy_type: String,
    /// Aggregation of generation
    pub fraction_type: FractionType,
    /// Minimum fraction per year
    pub min_generation_fraction: OptionalYearSeries,
    /// Maximum fraction per year
    pub max_generation_fraction: OptionalYearSeries,
}
define_id_getter! {GenerationFraction, GenerationFractionID}
