//! Fixtures for tests
use crate::config::RunConfig;
use crate::constraints::BuildContext;
use crate::index::Indices;
use crate::network::{
    AggregatedConsumer, Bus, CapacityFactor, DemandProfile, DsrRule, EmissionFee, Fuel, Generator,
    GeneratorType, Line, LocalBalancingStack, Network, Storage, StorageType, TechnologyParameters,
    TransmissionFee, UnitCapacityLimits,
};
use crate::parameters::Parameters;
use crate::solver::Problem;
use crate::variables::Variables;
use indexmap::{IndexMap, IndexSet, indexmap, indexset};
use rstest::fixture;

/// Assert that an error with the given message occurs
macro_rules! assert_error {
    ($result:expr, $msg:expr) => {
        assert_eq!(
            $result.unwrap_err().chain().next().unwrap().to_string(),
            $msg
        );
    };
}
pub(crate) use assert_error;

/// Number of hours in fixture networks
pub const N_HOURS: usize = 4;

/// Number of years in fixture networks
pub const N_YEARS: usize = 3;

#[fixture]
pub fn run_config() -> RunConfig {
    RunConfig::new(N_HOURS, N_YEARS)
}

/// Technology parameters with flat costs
pub fn technology(
    life_time: usize,
    build_time: usize,
    capex: f64,
    opex: f64,
) -> TechnologyParameters {
    TechnologyParameters {
        life_time,
        build_time,
        capex: vec![capex; N_YEARS],
        opex: vec![opex; N_YEARS],
        ..Default::default()
    }
}

/// A dispatchable generator type producing a single energy type
pub fn generator_type(id: &str, energy_type: &str, efficiency: f64) -> GeneratorType {
    GeneratorType {
        id: id.into(),
        technology: technology(20, 0, 100.0, 5.0),
        efficiency: indexmap! {energy_type.to_string() => vec![efficiency; N_HOURS]},
        energy_types: indexset! {energy_type.to_string()},
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

/// A generator attached to the given buses
pub fn generator(id: &str, generator_type: &str, buses: &[&str], base_cap: f64) -> Generator {
    Generator {
        id: id.into(),
        generator_type: generator_type.into(),
        buses: buses.iter().map(|&bus| bus.into()).collect(),
        unit_base_cap: base_cap,
        limits: UnitCapacityLimits::default(),
        min_device_nom_power: None,
        max_device_nom_power: None,
        emission_fees: IndexSet::new(),
        tags: Vec::new(),
        capacity_binding: None,
    }
}

/// A bus without demand-side response
pub fn bus(id: &str, energy_type: &str) -> Bus {
    Bus {
        id: id.into(),
        energy_type: energy_type.into(),
        dsr_type: None,
    }
}

/// A network with a coal plant and a solar farm on a grid bus, supplying a household stack with
/// a heat pump and a battery.
#[fixture]
pub fn household_network() -> Network {
    let mut network = Network::new(&["electricity", "heat"], &["CO2"]);
    network.constants.relative_emission_limits =
        indexmap! {"CO2".to_string() => vec![None, Some(0.9), Some(0.8)]};
    network.constants.base_total_emission = indexmap! {"CO2".to_string() => Some(100.0)};
    network.constants.ens_penalty_coefficients =
        indexmap! {"electricity".to_string() => 10.0, "heat".to_string() => 10.0};

    let house_el = Bus {
        dsr_type: Some("dsr_house".into()),
        ..bus("house_el", "electricity")
    };
    for bus in [bus("grid", "electricity"), house_el, bus("house_heat", "heat")] {
        network.buses.insert(bus.id.clone(), bus);
    }

    let coal_type = GeneratorType {
        technology: TechnologyParameters {
            tags: vec!["thermal".into()],
            ..technology(20, 0, 100.0, 5.0)
        },
        emission_reduction: indexmap! {"CO2".to_string() => vec![0.0; N_YEARS]},
        fuel: Some("coal".into()),
        ..generator_type("coal_type", "electricity", 0.4)
    };
    let pv_type = GeneratorType {
        technology: technology(25, 1, 80.0, 1.0),
        capacity_factor: Some("sun".into()),
        ..generator_type("pv_type", "electricity", 1.0)
    };
    let heat_pump_type = GeneratorType {
        technology: technology(15, 1, 50.0, 2.0),
        conversion_rate: indexmap! {"electricity".to_string() => vec![1.0; N_HOURS]},
        ..generator_type("heat_pump_type", "heat", 3.0)
    };
    for gen_type in [coal_type, pv_type, heat_pump_type] {
        network.generator_types.insert(gen_type.id.clone(), gen_type);
    }

    let coal = Generator {
        emission_fees: indexset! {"co2_fee".into()},
        ..generator("coal_plant", "coal_type", &["grid"], 10.0)
    };
    let pv = Generator {
        tags: vec!["res".into()],
        ..generator("pv_farm", "pv_type", &["grid"], 2.0)
    };
    let heat_pump = generator("heat_pump", "heat_pump_type", &["house_el", "house_heat"], 1.0);
    for generator in [coal, pv, heat_pump] {
        network.generators.insert(generator.id.clone(), generator);
    }

    let battery_type = StorageType {
        id: "battery_type".into(),
        technology: technology(10, 0, 30.0, 1.0),
        energy_type: "electricity".into(),
        generation_efficiency: 0.95,
        load_efficiency: 0.95,
        cycle_length: Some(2),
        power_to_capacity: 0.5,
        energy_loss: 0.01,
        power_utilization: 1.0,
    };
    network
        .storage_types
        .insert(battery_type.id.clone(), battery_type);
    let battery = Storage {
        id: "battery".into(),
        storage_type: "battery_type".into(),
        bus: "house_el".into(),
        unit_base_cap: 0.5,
        limits: UnitCapacityLimits::default(),
        min_device_nom_power: None,
        max_device_nom_power: None,
        tags: vec!["res".into()],
    };
    network.storages.insert(battery.id.clone(), battery);

    let line = Line {
        id: "grid_to_house".into(),
        energy_type: "electricity".into(),
        from: "grid".into(),
        to: "house_el".into(),
        transmission_loss: 0.05,
        max_capacity: 20.0,
        transmission_fee: Some("grid_fee".into()),
    };
    network.lines.insert(line.id.clone(), line);

    let stack = LocalBalancingStack {
        id: "lbs_house".into(),
        buses_out: indexmap! {
            "electricity".to_string() => "house_el".into(),
            "heat".to_string() => "house_heat".into(),
        },
        buses: indexmap! {
            "electricity".to_string() => indexset! {"house_el".into()},
            "heat".to_string() => indexset! {"house_heat".into()},
        },
    };
    network
        .local_balancing_stacks
        .insert(stack.id.clone(), stack);

    let profile = DemandProfile {
        id: "flat".into(),
        normalized_profile: indexmap! {
            "electricity".to_string() => vec![0.25; N_HOURS],
            "heat".to_string() => vec![0.25; N_HOURS],
        },
    };
    network.demand_profiles.insert(profile.id.clone(), profile);

    let households = AggregatedConsumer {
        id: "households".into(),
        demand_profile: "flat".into(),
        stack_base_fraction: indexmap! {"lbs_house".into() => 1.0},
        yearly_energy_usage: indexmap! {
            "electricity".to_string() => vec![4.0; N_YEARS],
            "heat".to_string() => vec![2.0; N_YEARS],
        },
        min_fraction: IndexMap::new(),
        max_fraction: IndexMap::new(),
        max_fraction_increase: IndexMap::new(),
        max_fraction_decrease: IndexMap::new(),
        n_consumers: vec![10.0; N_YEARS],
    };
    network
        .aggregated_consumers
        .insert(households.id.clone(), households);

    let coal_fuel = Fuel {
        id: "coal".into(),
        emission: indexmap! {"CO2".to_string() => 0.3},
        availability: Vec::new(),
        cost: vec![2.0; N_YEARS],
        energy_per_unit: 1.0,
    };
    network.fuels.insert(coal_fuel.id.clone(), coal_fuel);

    let sun = CapacityFactor {
        id: "sun".into(),
        profile: vec![0.0, 0.5, 1.0, 0.5],
    };
    network.capacity_factors.insert(sun.id.clone(), sun);

    let co2_fee = EmissionFee {
        id: "co2_fee".into(),
        emission_type: "CO2".into(),
        price: vec![10.0; N_YEARS],
    };
    network.emission_fees.insert(co2_fee.id.clone(), co2_fee);

    let grid_fee = TransmissionFee {
        id: "grid_fee".into(),
        fee: vec![0.1; N_HOURS],
    };
    network
        .transmission_fees
        .insert(grid_fee.id.clone(), grid_fee);

    let dsr = DsrRule {
        id: "dsr_house".into(),
        compensation_factor: 1.0,
        balancing_period_len: 2,
        penalization_minus: 0.5,
        penalization_plus: 0.0,
        relative_shift_limit: Some(0.2),
        abs_shift_limit: None,
        hourly_relative_shift_plus_limit: Some(0.5),
        hourly_relative_shift_minus_limit: Some(0.5),
    };
    network.dsr.insert(dsr.id.clone(), dsr);

    network
}

/// A network with its indices, parameters and variables
pub struct Compiled {
    pub indices: Indices,
    pub parameters: Parameters,
    pub variables: Variables,
    pub problem: Problem,
}

impl Compiled {
    /// Compile the indices, parameters and variables of a network
    pub fn new(network: &Network, config: &RunConfig) -> Self {
        let indices = Indices::new(network, config).unwrap();
        let parameters = Parameters::new(network, &indices, config).unwrap();
        let mut problem = Problem::new();
        let variables = Variables::new(&mut problem, &indices, &parameters).unwrap();
        Self {
            indices,
            parameters,
            variables,
            problem,
        }
    }

    pub fn context(&self) -> BuildContext<'_> {
        BuildContext {
            indices: &self.indices,
            parameters: &self.parameters,
            variables: &self.variables,
        }
    }
}

#[fixture]
pub fn compiled(household_network: Network) -> Compiled {
    Compiled::new(&household_network, &run_config())
}
