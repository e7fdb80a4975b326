//! The parameter preprocessor.
//!
//! Every property of the network that the model needs is extracted into a table aligned with the
//! index space that produced it. Time series are reduced to the sampled hours and years and
//! monetary values are divided by the money scale. Any reference to an unknown entity fails
//! immediately; no other validation is performed here.
use crate::config::RunConfig;
use crate::index::Indices;
use crate::network::Network;
use anyhow::{Context, Result};
use log::debug;

pub mod extract;
pub mod policy;
pub mod scenario;
pub mod sources;
pub mod topology;

pub use policy::*;
pub use scenario::*;
pub use sources::*;
pub use topology::*;

/// Every parameter table of the model
#[derive(Debug, Clone, PartialEq)]
pub struct Parameters {
    /// Generators
    pub generators: GeneratorParameters,
    /// Storage units
    pub storages: StorageParameters,
    /// Generator types
    pub generator_types: GeneratorTypeParameters,
    /// Storage types
    pub storage_types: StorageTypeParameters,
    /// Buses
    pub buses: BusParameters,
    /// Lines
    pub lines: LineParameters,
    /// Local balancing stacks
    pub stacks: LbsParameters,
    /// Aggregated consumers
    pub aggregated_consumers: AggregatedConsumerParameters,
    /// Fuels
    pub fuels: FuelParameters,
    /// Capacity factor profiles
    pub capacity_factors: CapacityFactorParameters,
    /// Emission fees
    pub emission_fees: EmissionFeeParameters,
    /// Transmission fees
    pub transmission_fees: TransmissionFeeParameters,
    /// Demand chunks
    pub demand_chunks: DemandChunkParameters,
    /// Demand-side response rules
    pub dsr: DsrParameters,
    /// Capacity bounds
    pub capacity_bounds: CapacityBoundParameters,
    /// Generation fraction policies
    pub generation_fractions: GenerationFractionParameters,
    /// Network-wide and run-wide parameters
    pub scenario: ScenarioParameters,
}

impl Parameters {
    /// Extract every parameter table.
    ///
    /// # Arguments
    ///
    /// * `network` - The network to model
    /// * `indices` - Index spaces built for the network
    /// * `config` - The run configuration
    pub fn new(network: &Network, indices: &Indices, config: &RunConfig) -> Result<Self> {
        debug!("Extracting parameters");

        Ok(Self {
            generators: GeneratorParameters::new(network, indices)
                .context("Invalid generator parameters")?,
            storages: StorageParameters::new(network, indices)
                .context("Invalid storage parameters")?,
            generator_types: GeneratorTypeParameters::new(network, indices, config)
                .context("Invalid generator type parameters")?,
            storage_types: StorageTypeParameters::new(network, indices, config)
                .context("Invalid storage type parameters")?,
            buses: BusParameters::new(network, indices).context("Invalid bus parameters")?,
            lines: LineParameters::new(network, indices).context("Invalid line parameters")?,
            stacks: LbsParameters::new(network, indices)
                .context("Invalid local balancing stack parameters")?,
            aggregated_consumers: AggregatedConsumerParameters::new(network, indices)
                .context("Invalid aggregated consumer parameters")?,
            fuels: FuelParameters::new(network, indices, config)
                .context("Invalid fuel parameters")?,
            capacity_factors: CapacityFactorParameters::new(network, indices)
                .context("Invalid capacity factor parameters")?,
            emission_fees: EmissionFeeParameters::new(network, indices, config)
                .context("Invalid emission fee parameters")?,
            transmission_fees: TransmissionFeeParameters::new(network, indices, config)
                .context("Invalid transmission fee parameters")?,
            demand_chunks: DemandChunkParameters::new(network, indices)
                .context("Invalid demand chunk parameters")?,
            dsr: DsrParameters::new(network, indices, config).context("Invalid DSR parameters")?,
            capacity_bounds: CapacityBoundParameters::new(network, indices)
                .context("Invalid capacity bound parameters")?,
            generation_fractions: GenerationFractionParameters::new(network, indices)
                .context("Invalid generation fraction parameters")?,
            scenario: ScenarioParameters::new(network, indices, config)
                .context("Invalid scenario parameters")?,
        })
    }
}
