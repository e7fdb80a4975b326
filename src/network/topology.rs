//! Buses, lines and the demand side of the network.
use super::{HourSeries, OptionalYearSeries, YearSeries};
use crate::id::{define_id_getter, define_id_type};
use crate::network::{DsrID, TransmissionFeeID};
use indexmap::{IndexMap, IndexSet};

define_id_type! {BusID}
define_id_type! {LineID}
define_id_type! {LocalBalancingStackID}
define_id_type! {AggregatedConsumerID}
define_id_type! {DemandProfileID}

/// A map of [`Bus`]es, keyed by ID
pub type BusMap = IndexMap<BusID, Bus>;

/// A map of [`Line`]s, keyed by ID
pub type LineMap = IndexMap<LineID, Line>;

/// A map of [`LocalBalancingStack`]s, keyed by ID
pub type LocalBalancingStackMap = IndexMap<LocalBalancingStackID, LocalBalancingStack>;

/// A map of [`AggregatedConsumer`]s, keyed by ID
pub type AggregatedConsumerMap = IndexMap<AggregatedConsumerID, AggregatedConsumer>;

/// A map of [`DemandProfile`]s, keyed by ID
pub type DemandProfileMap = IndexMap<DemandProfileID, DemandProfile>;

/// A node enforcing energy balance for a single energy type
#[derive(Debug, Clone, PartialEq)]
pub struct Bus {
    /// Unique identifier
    pub id: BusID,
    /// Energy type balanced at this bus
    pub energy_type: String,
    /// Demand-side response rule applied to the bus load
    pub dsr_type: Option<DsrID>,
}
define_id_getter! {Bus, BusID}

/// A transmission line between two buses of the same energy type
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    /// Unique identifier
    pub id: LineID,
    /// Energy type carried
    pub energy_type: String,
    /// Source bus
    pub from: BusID,
    /// Destination bus
    pub to: BusID,
    /// Fraction of the flow lost in transmission
    pub transmission_loss: f64,
    /// Maximum flow per hour (may be infinite)
    pub max_capacity: f64,
    /// Fee charged per unit of flow
    pub transmission_fee: Option<TransmissionFeeID>,
}
define_id_getter! {Line, LineID}

/// A bundle of buses representing one technology package available to consumers
#[derive(Debug, Clone, PartialEq)]
pub struct LocalBalancingStack {
    /// Unique identifier
    pub id: LocalBalancingStackID,
    /// The bus delivering each energy type to consumers
    pub buses_out: IndexMap<String, BusID>,
    /// All buses of the stack, per energy type
    pub buses: IndexMap<String, IndexSet<BusID>>,
}
define_id_getter! {LocalBalancingStack, LocalBalancingStackID}

/// A demand segment which splits its demand between the stacks available to it
#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedConsumer {
    /// Unique identifier
    pub id: AggregatedConsumerID,
    /// Normalised profile of hourly demand
    pub demand_profile: DemandProfileID,
    /// Fraction of consumers using each available stack in the base year
    pub stack_base_fraction: IndexMap<LocalBalancingStackID, f64>,
    /// Yearly energy usage of a single consumer, per energy type
    pub yearly_energy_usage: IndexMap<String, YearSeries>,
    /// Lower bound on each stack's fraction
    pub min_fraction: IndexMap<LocalBalancingStackID, OptionalYearSeries>,
    /// Upper bound on each stack's fraction
    pub max_fraction: IndexMap<LocalBalancingStackID, OptionalYearSeries>,
    /// Upper bound on the year-over-year increase of each stack's fraction
    pub max_fraction_increase: IndexMap<LocalBalancingStackID, OptionalYearSeries>,
    /// Upper bound on the year-over-year decrease of each stack's fraction
    pub max_fraction_decrease: IndexMap<LocalBalancingStackID, OptionalYearSeries>,
    /// Number of consumers per year
    pub n_consumers: YearSeries,
}
define_id_getter! {AggregatedConsumer, AggregatedConsumerID}

/// Normalised hourly demand shape, per energy type
#[derive(Debug, Clone, PartialEq)]
pub struct DemandProfile {
    /// Unique identifier
    pub id: DemandProfileID,
    /// Hourly profile per energy type (sums to 1 over the full year)
    pub normalized_profile: IndexMap<String, HourSeries>,
}
define_id_getter! {DemandProfile, DemandProfileID}
