//! Networks and helpers shared by the integration tests.
use gridplan::config::RunConfig;
use gridplan::model::OptimisationModel;
use gridplan::network::{
    AggregatedConsumer, Bus, DemandProfile, Fuel, Generator, GeneratorType, Line,
    LocalBalancingStack, Network, Storage, StorageType, TechnologyParameters, UnitCapacityLimits,
};
use gridplan::results::Results;
use gridplan::solver::{HighsBackend, OptimisationStatus};
use indexmap::{IndexMap, IndexSet, indexmap, indexset};

pub const N_HOURS: usize = 4;

/// Silence logging in the code under test
pub fn quiet() {
    // SAFETY: the integration tests only ever set this variable to the same value
    unsafe { std::env::set_var("GRIDPLAN_LOG_LEVEL", "off") };
}

/// A run configuration covering every hour of the given number of years
pub fn run_config(n_years: usize) -> RunConfig {
    RunConfig::new(N_HOURS, n_years)
}

/// A dispatchable electricity generator type without fuel
pub fn plant_type(id: &str, capex: f64, n_years: usize) -> GeneratorType {
    GeneratorType {
        id: id.into(),
        technology: TechnologyParameters {
            life_time: 10,
            build_time: 0,
            capex: vec![capex; n_years],
            opex: vec![0.0; n_years],
            ..Default::default()
        },
        efficiency: indexmap! {"electricity".to_string() => vec![1.0; N_HOURS]},
        energy_types: indexset! {"electricity".to_string()},
        emission_reduction: IndexMap::new(),
        conversion_rate: IndexMap::new(),
        fuel: None,
        capacity_factor: None,
        power_utilization: vec![1.0; N_HOURS],
        minimal_power_utilization: vec![0.0; N_HOURS],
        ramp_up: None,
        ramp_down: None,
        energy_curtailment_cost: None,
        generation_compensation: None,
    }
}

/// A generator on the supply bus with no existing capacity
pub fn plant(id: &str, plant_type: &str) -> Generator {
    Generator {
        id: id.into(),
        generator_type: plant_type.into(),
        buses: indexset! {"supply".into()},
        unit_base_cap: 0.0,
        limits: UnitCapacityLimits::default(),
        min_device_nom_power: None,
        max_device_nom_power: None,
        emission_fees: IndexSet::new(),
        tags: Vec::new(),
        capacity_binding: None,
    }
}

/// A supply bus connected by a lossless line to a town whose consumers use one unit of
/// electricity every hour.
///
/// Generators are left to the caller.
pub fn town_network(n_years: usize) -> Network {
    let mut network = Network::new(&["electricity"], &[]);
    for id in ["supply", "town"] {
        let bus = Bus {
            id: id.into(),
            energy_type: "electricity".into(),
            dsr_type: None,
        };
        network.buses.insert(bus.id.clone(), bus);
    }

    let line = Line {
        id: "supply_to_town".into(),
        energy_type: "electricity".into(),
        from: "supply".into(),
        to: "town".into(),
        transmission_loss: 0.0,
        max_capacity: 100.0,
        transmission_fee: None,
    };
    network.lines.insert(line.id.clone(), line);

    let stack = LocalBalancingStack {
        id: "lbs_town".into(),
        buses_out: indexmap! {"electricity".to_string() => "town".into()},
        buses: indexmap! {"electricity".to_string() => indexset! {"town".into()}},
    };
    network
        .local_balancing_stacks
        .insert(stack.id.clone(), stack);

    let profile = DemandProfile {
        id: "flat".into(),
        normalized_profile: indexmap! {"electricity".to_string() => vec![0.25; N_HOURS]},
    };
    network.demand_profiles.insert(profile.id.clone(), profile);

    let consumers = AggregatedConsumer {
        id: "townsfolk".into(),
        demand_profile: "flat".into(),
        stack_base_fraction: indexmap! {"lbs_town".into() => 1.0},
        yearly_energy_usage: indexmap! {"electricity".to_string() => vec![4.0; n_years]},
        min_fraction: IndexMap::new(),
        max_fraction: IndexMap::new(),
        max_fraction_increase: IndexMap::new(),
        max_fraction_decrease: IndexMap::new(),
        n_consumers: vec![1.0; n_years],
    };
    network
        .aggregated_consumers
        .insert(consumers.id.clone(), consumers);

    network
}

/// Add a generator type and one generator of that type to a network
pub fn add_plant(network: &mut Network, generator: Generator, generator_type: GeneratorType) {
    network
        .generator_types
        .insert(generator_type.id.clone(), generator_type);
    network.generators.insert(generator.id.clone(), generator);
}

/// A fuel released one-for-one as energy, emitting the given amount of CO2 per unit
pub fn fuel(id: &str, cost: f64, co2: f64, n_years: usize) -> Fuel {
    Fuel {
        id: id.into(),
        emission: indexmap! {"CO2".to_string() => co2},
        availability: Vec::new(),
        cost: vec![cost; n_years],
        energy_per_unit: 1.0,
    }
}

/// A lossless storage on the supply bus whose power matches its capacity
pub fn add_storage(network: &mut Network, id: &str, capex: f64, n_years: usize) {
    let storage_type = StorageType {
        id: format!("{id}_type").into(),
        technology: TechnologyParameters {
            life_time: 10,
            build_time: 0,
            capex: vec![capex; n_years],
            opex: vec![0.0; n_years],
            ..Default::default()
        },
        energy_type: "electricity".into(),
        generation_efficiency: 1.0,
        load_efficiency: 1.0,
        cycle_length: None,
        power_to_capacity: 1.0,
        energy_loss: 0.0,
        power_utilization: 1.0,
    };
    let storage = Storage {
        id: id.into(),
        storage_type: storage_type.id.clone(),
        bus: "supply".into(),
        unit_base_cap: 0.0,
        limits: UnitCapacityLimits::default(),
        min_device_nom_power: None,
        max_device_nom_power: None,
        tags: Vec::new(),
    };
    network
        .storage_types
        .insert(storage_type.id.clone(), storage_type);
    network.storages.insert(storage.id.clone(), storage);
}

/// Build and optimise a model with HiGHS, returning its results
pub fn solve(network: &Network, config: &RunConfig) -> Results {
    let mut model = OptimisationModel::new();
    model.build(network, config).unwrap();
    let status = model.optimise(&HighsBackend).unwrap();
    assert_eq!(status, OptimisationStatus::Optimal);
    model.results().unwrap().clone()
}
