//! Solves small networks with HiGHS and checks the optimal plans.
mod common;
use common::{
    N_HOURS, add_plant, add_storage, fuel, plant, plant_type, quiet, run_config, solve,
    town_network,
};
use float_cmp::{approx_eq, assert_approx_eq};
use gridplan::config::RunConfig;
use gridplan::model::OptimisationModel;
use gridplan::network::{EmissionFee, Generator, GeneratorType, TechnologyParameters};
use gridplan::solver::{HighsBackend, OptimisationStatus};
use indexmap::{indexmap, indexset};
use rstest::rstest;
use std::fs;
use tempfile::tempdir;

const TOLERANCE: f64 = 1e-6;

#[test]
fn test_single_plant_meets_demand() {
    quiet();
    let mut network = town_network(1);
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type("gas", 10.0, 1));
    let results = solve(&network, &run_config(1));

    // One unit of capacity at 10 per unit, amortised over ten years
    assert_approx_eq!(f64, results.objective_value, 1.0, epsilon = TOLERANCE);
    let capacity = &results.generators.capacity["gas_plant"];
    assert_approx_eq!(f64, capacity.cap[0], 1.0, epsilon = TOLERANCE);
    for h in 0..N_HOURS {
        assert_approx_eq!(f64, results.line_flow["supply_to_town"][h][0], 1.0, epsilon = TOLERANCE);
        assert_approx_eq!(f64, results.buses.ens["town"][h][0], 0.0, epsilon = TOLERANCE);
    }
    assert_approx_eq!(
        f64,
        results.fractions["townsfolk"]["lbs_town"][0],
        1.0,
        epsilon = TOLERANCE
    );
}

#[test]
fn test_cheapest_plant_is_built() {
    quiet();
    let mut network = town_network(1);
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type("gas", 10.0, 1));
    add_plant(&mut network, plant("oil_plant", "oil"), plant_type("oil", 20.0, 1));
    let results = solve(&network, &run_config(1));

    let capacity = &results.generators.capacity;
    assert_approx_eq!(f64, capacity["gas_plant"].cap[0], 1.0, epsilon = TOLERANCE);
    assert_approx_eq!(f64, capacity["oil_plant"].cap[0], 0.0, epsilon = TOLERANCE);
}

#[test]
fn test_cheap_unserved_energy() {
    quiet();
    let mut network = town_network(1);
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type("gas", 10.0, 1));
    let config = RunConfig {
        ens_penalty_price: Some(0.1),
        ..run_config(1)
    };
    let results = solve(&network, &config);

    // Leaving four units of demand unserved is cheaper than building capacity
    assert_approx_eq!(f64, results.objective_value, 0.4, epsilon = TOLERANCE);
    assert_approx_eq!(
        f64,
        results.generators.capacity["gas_plant"].cap[0],
        0.0,
        epsilon = TOLERANCE
    );
    for h in 0..N_HOURS {
        let unserved: f64 = results.buses.ens.values().map(|ens| ens[h][0]).sum();
        assert_approx_eq!(f64, unserved, 1.0, epsilon = TOLERANCE);
    }
}

#[test]
fn test_capacity_binding() {
    quiet();
    let mut network = town_network(2);
    for (id, capex) in [("gas_plant", 10.0), ("oil_plant", 30.0)] {
        let type_id = format!("{id}_type");
        let generator = Generator {
            capacity_binding: Some("pair".into()),
            ..plant(id, &type_id)
        };
        add_plant(&mut network, generator, plant_type(&type_id, capex, 2));
    }
    let results = solve(&network, &run_config(2));

    let capacity = &results.generators.capacity;
    let gas = capacity["gas_plant"].cap[1];
    let oil = capacity["oil_plant"].cap[1];
    assert_approx_eq!(f64, gas, oil, epsilon = TOLERANCE);
    assert!(oil > TOLERANCE);
    assert!(gas + oil >= 1.0 - TOLERANCE);

    // Without the binding the expensive plant is never built
    assert!(approx_eq!(f64, capacity["oil_plant"].cap[0], 0.0, epsilon = TOLERANCE));
}

#[test]
fn test_write_problem() {
    quiet();
    let mut network = town_network(1);
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type("gas", 10.0, 1));
    let mut model = OptimisationModel::new();
    model.build(&network, &run_config(1)).unwrap();

    let dir = tempdir().unwrap();
    let file_path = dir.path().join("town.lp");
    model.write_problem(&file_path).unwrap();
    let contents = fs::read_to_string(file_path).unwrap();
    assert!(contents.contains("Minimize"));
    assert!(contents.contains("town_BALANCING_CONSTRAINT"));
}

#[test]
fn test_storage_covers_outage() {
    quiet();
    let mut network = town_network(1);
    let plant_type = GeneratorType {
        power_utilization: vec![1.0, 1.0, 0.0, 1.0],
        ..plant_type("gas", 10.0, 1)
    };
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type);
    add_storage(&mut network, "battery", 1.0, 1);
    let config = RunConfig {
        ens_penalty_price: Some(1000.0),
        ..run_config(1)
    };
    let results = solve(&network, &config);

    let soc = &results.storages.soc["battery"];
    let capacity = results.storages.capacity["battery"].cap[0];
    assert_approx_eq!(f64, soc[0][0], 0.0, epsilon = TOLERANCE);
    assert_approx_eq!(f64, soc[N_HOURS - 1][0], 0.0, epsilon = TOLERANCE);
    for hour in soc {
        assert!(hour[0] <= capacity + TOLERANCE);
    }

    // The battery alone serves the hour the plant is down
    assert_approx_eq!(f64, capacity, 1.0, epsilon = TOLERANCE);
    assert_approx_eq!(f64, soc[2][0], 1.0, epsilon = TOLERANCE);
    assert_approx_eq!(
        f64,
        results.storages.generation["battery"][2][0],
        1.0,
        epsilon = TOLERANCE
    );
    for ens in results.buses.ens.values() {
        assert!(ens.iter().all(|hour| hour[0].abs() < TOLERANCE));
    }

    // Charging is spread over both hours before the outage
    assert_approx_eq!(
        f64,
        results.generators.capacity["gas_plant"].cap[0],
        1.5,
        epsilon = TOLERANCE
    );
}

#[test]
fn test_capacity_is_rebuilt_at_end_of_life() {
    quiet();
    const N_YEARS: usize = 4;
    const LIFE_TIME: usize = 2;
    const BUILD_TIME: usize = 1;
    let mut network = town_network(N_YEARS);
    let plant_type = GeneratorType {
        technology: TechnologyParameters {
            life_time: LIFE_TIME,
            build_time: BUILD_TIME,
            capex: vec![10.0; N_YEARS],
            opex: vec![0.0; N_YEARS],
            ..Default::default()
        },
        ..plant_type("gas", 10.0, N_YEARS)
    };
    let generator = Generator {
        unit_base_cap: 1.0,
        ..plant("gas_plant", "gas")
    };
    add_plant(&mut network, generator, plant_type);
    let config = RunConfig {
        ens_penalty_price: Some(1000.0),
        ..run_config(N_YEARS)
    };
    let results = solve(&network, &config);

    // The base capacity retires after year 1 and is replaced by capacity started in year 1
    let capacity = &results.generators.capacity["gas_plant"];
    for y in 0..N_YEARS {
        assert_approx_eq!(f64, capacity.cap[y], 1.0, epsilon = TOLERANCE);
        if capacity.cap_plus[y] > TOLERANCE {
            assert_eq!((y + BUILD_TIME) % LIFE_TIME, 0, "capacity started in year {y}");
        }
    }
    assert_approx_eq!(f64, capacity.cap_plus[1], 1.0, epsilon = TOLERANCE);
    assert!(capacity.cap_minus.iter().flatten().all(|v| v.abs() < TOLERANCE));
    assert!(capacity.cap_base_minus.iter().all(|v| v.abs() < TOLERANCE));

    // Amortised over the two years it is in service
    assert_approx_eq!(f64, results.objective_value, 10.0, epsilon = TOLERANCE);
}

#[test]
fn test_fuel_cost() {
    quiet();
    let mut network = town_network(1);
    network.fuels.insert("gas_fuel".into(), fuel("gas_fuel", 3.0, 0.0, 1));
    let plant_type = GeneratorType {
        efficiency: indexmap! {"electricity".to_string() => vec![0.5; N_HOURS]},
        fuel: Some("gas_fuel".into()),
        ..plant_type("gas", 10.0, 1)
    };
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type);
    let config = RunConfig {
        ens_penalty_price: Some(1000.0),
        ..run_config(1)
    };
    let results = solve(&network, &config);

    // Two units burnt every hour at 3 each, plus two units of capacity
    assert_approx_eq!(
        f64,
        results.generators.capacity["gas_plant"].cap[0],
        2.0,
        epsilon = TOLERANCE
    );
    assert_approx_eq!(f64, results.objective_value, 26.0, epsilon = TOLERANCE);
}

#[rstest]
#[case(0.0, 21.0)]
#[case(0.2, 17.0)]
#[case(1.0, 1.0)]
fn test_emission_fee(#[case] reduction: f64, #[case] expected_objective: f64) {
    quiet();
    let mut network = town_network(1);
    network.emission_types = ["CO2".to_string()].into_iter().collect();
    network.fuels.insert("gas_fuel".into(), fuel("gas_fuel", 0.0, 0.5, 1));
    let fee = EmissionFee {
        id: "co2_fee".into(),
        emission_type: "CO2".into(),
        price: vec![10.0],
    };
    network.emission_fees.insert(fee.id.clone(), fee);
    let plant_type = GeneratorType {
        emission_reduction: indexmap! {"CO2".to_string() => vec![reduction]},
        fuel: Some("gas_fuel".into()),
        ..plant_type("gas", 10.0, 1)
    };
    let generator = Generator {
        emission_fees: indexset! {"co2_fee".into()},
        ..plant("gas_plant", "gas")
    };
    add_plant(&mut network, generator, plant_type);
    let config = RunConfig {
        ens_penalty_price: Some(1000.0),
        ..run_config(1)
    };
    let results = solve(&network, &config);

    // Four units of fuel emit two units of CO2 before reduction, charged at 10 each
    assert_approx_eq!(
        f64,
        results.objective_value,
        expected_objective,
        epsilon = TOLERANCE
    );
}

#[test]
fn test_unserved_energy_disabled() {
    quiet();
    let mut network = town_network(1);
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type("gas", 10.0, 1));
    let config = RunConfig {
        ens: false,
        ..run_config(1)
    };
    let results = solve(&network, &config);

    assert_approx_eq!(f64, results.objective_value, 1.0, epsilon = TOLERANCE);
    assert!(!results.buses.ens.is_empty());
    for ens in results.buses.ens.values() {
        assert!(ens.iter().flatten().all(|&v| v == 0.0));
    }
}

#[test]
fn test_infeasible_model_writes_diagnostics() {
    quiet();
    let mut network = town_network(1);
    let plant_type = GeneratorType {
        power_utilization: vec![0.0; N_HOURS],
        ..plant_type("gas", 10.0, 1)
    };
    add_plant(&mut network, plant("gas_plant", "gas"), plant_type);
    let dir = tempdir().unwrap();
    let config = RunConfig {
        ens: false,
        diagnostics_dir: Some(dir.path().to_path_buf()),
        ..run_config(1)
    };

    let mut model = OptimisationModel::new();
    model.build(&network, &config).unwrap();
    let status = model.optimise(&HighsBackend).unwrap();
    assert!(matches!(
        status,
        OptimisationStatus::Infeasible | OptimisationStatus::InfeasibleOrUnbounded
    ));
    assert!(model.results().is_err());
    let contents = fs::read_to_string(dir.path().join("infeasible_problem.lp")).unwrap();
    assert!(contents.contains("town_BALANCING_CONSTRAINT"));
}
