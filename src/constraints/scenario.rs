//! Scenario-wide bounds: fuel availability, capacity limits, emission limits and power reserves.
use super::BuildContext;
use crate::expression::{emission, fuel_consumption};
use crate::parameters::CapacityLimits;
use crate::solver::{LinExpr, Problem, Sense};
use crate::variables::DenseTensor;
use anyhow::Result;
use indexmap::IndexMap;
use log::warn;

pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    fuel_availability(ctx, problem)?;

    let params = ctx.parameters;
    let vars = ctx.variables;
    let gen_names = |g: usize| ctx.indices.generators.get(g).clone();
    let stor_names = |s: usize| ctx.indices.storages.get(s).clone();
    unit_capacity_limits(
        ctx,
        problem,
        &vars.g_capacity.cap,
        &params.generators.limits,
        gen_names,
        "GEN",
    )?;
    unit_capacity_limits(
        ctx,
        problem,
        &vars.s_capacity.cap,
        &params.storages.limits,
        stor_names,
        "STOR",
    )?;
    type_capacity_limits(
        ctx,
        problem,
        &vars.g_capacity.cap,
        &params.generators.tgen,
        &params.generator_types.technology.limits,
        |t| ctx.indices.generator_types.get(t).clone(),
        "TGEN",
    )?;
    type_capacity_limits(
        ctx,
        problem,
        &vars.s_capacity.cap,
        &params.storages.tstor,
        &params.storage_types.technology.limits,
        |t| ctx.indices.storage_types.get(t).clone(),
        "TSTOR",
    )?;

    emission_limits(ctx, problem)?;
    power_reserves(ctx, problem)
}

/// Bound the yearly consumption of every fuel by its availability
fn fuel_availability(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = ctx.parameters;
    for (fuel, name) in ctx.indices.fuels.iter() {
        for y in ctx.indices.years.ord() {
            let Some(available) = params.fuels.availability[fuel][y] else {
                continue;
            };

            let consumption: LinExpr = ctx
                .indices
                .generators
                .ord()
                .filter(|&g| params.generators.fuel[g] == Some(fuel))
                .filter_map(|g| fuel_consumption(ctx, g, y))
                .sum();
            if consumption.has_no_terms() {
                continue;
            }

            problem.add_constraint(
                format!("{name}_MAX_FUEL_AVAILABILITY_CONSTRAINT[{y}]"),
                consumption,
                Sense::Le,
                available.into(),
            )?;
        }
    }

    Ok(())
}

/// Add the bounds on installed capacity and its year-over-year change for one group of units.
///
/// Bounds apply from the first year after the base year.
fn add_limit_rows<F>(
    problem: &mut Problem,
    limits: &CapacityLimits,
    n_years: usize,
    capacity: F,
    prefix: &str,
) -> Result<()>
where
    F: Fn(usize) -> LinExpr,
{
    for y in 1..n_years {
        let bounds = [
            (limits.min_capacity[y], Sense::Ge, "CAP_MIN", false),
            (limits.max_capacity[y], Sense::Le, "CAP_MAX", false),
            (limits.min_capacity_increase[y], Sense::Ge, "DELTA_CAP_MIN", true),
            (limits.max_capacity_increase[y], Sense::Le, "DELTA_CAP_MAX", true),
        ];
        for (bound, sense, suffix, is_delta) in bounds {
            let Some(bound) = bound else {
                continue;
            };
            let lhs = if is_delta {
                capacity(y) - capacity(y - 1)
            } else {
                capacity(y)
            };
            problem.add_constraint(
                format!("{prefix}_{suffix}_CONSTRAINT[{y}]"),
                lhs,
                sense,
                bound.into(),
            )?;
        }
    }

    Ok(())
}

fn unit_capacity_limits<N>(
    ctx: &BuildContext,
    problem: &mut Problem,
    cap: &DenseTensor,
    limits: &[CapacityLimits],
    name_of: N,
    kind: &str,
) -> Result<()>
where
    N: Fn(usize) -> String,
{
    for (unit, limits) in limits.iter().enumerate() {
        add_limit_rows(
            problem,
            limits,
            ctx.indices.years.len(),
            |y| cap.at(&[unit, y]).into(),
            &format!("{}_{kind}", name_of(unit)),
        )?;
    }

    Ok(())
}

/// Bound the total capacity of the units of every technology type in use
fn type_capacity_limits<N>(
    ctx: &BuildContext,
    problem: &mut Problem,
    cap: &DenseTensor,
    type_of_unit: &[usize],
    limits: &[CapacityLimits],
    name_of: N,
    kind: &str,
) -> Result<()>
where
    N: Fn(usize) -> String,
{
    let mut units_of_type: IndexMap<usize, Vec<usize>> = IndexMap::new();
    for (unit, &unit_type) in type_of_unit.iter().enumerate() {
        units_of_type.entry(unit_type).or_default().push(unit);
    }

    for (unit_type, units) in &units_of_type {
        add_limit_rows(
            problem,
            &limits[*unit_type],
            ctx.indices.years.len(),
            |y| units.iter().map(|&unit| cap.at(&[unit, y])).sum(),
            &format!("{}_{kind}", name_of(*unit_type)),
        )?;
    }

    Ok(())
}

/// Bound total emissions relative to the base-year total
fn emission_limits(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let scenario = &ctx.parameters.scenario;
    for (&emission_type, limits) in &scenario.rel_em_limit {
        let Some(base_total) = scenario.base_total_emission.get(&emission_type) else {
            continue;
        };
        let base_total = base_total * scenario.hourly_scale;
        let name = ctx.indices.emission_types.get(emission_type);

        for (y, limit) in limits.iter().enumerate() {
            let Some(limit) = limit else {
                continue;
            };
            let total: LinExpr = ctx
                .indices
                .generators
                .ord()
                .filter_map(|g| emission(ctx, g, emission_type, y))
                .sum();
            problem.add_constraint(
                format!("{name}_EMISSIONS_CONSTRAINT[{y}]"),
                total,
                Sense::Le,
                (base_total * limit).into(),
            )?;
        }
    }

    Ok(())
}

/// Require the generators carrying a tag to keep a power reserve of an energy type every hour
fn power_reserves(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let indices = ctx.indices;
    let reserve = &ctx.variables.g_gen_reserve;
    for (&et, reserves) in &ctx.parameters.scenario.power_reserves {
        for (&tag, &value) in reserves {
            let et_name = indices.energy_types.get(et);
            let tag_name = indices.tags.get(tag);
            let generators: Vec<usize> = indices
                .generators
                .ord()
                .filter(|&g| ctx.parameters.generators.tags[g].contains(&tag))
                .filter(|&g| reserve.get(&(g, et, 0, 0)).is_some())
                .collect();
            if generators.is_empty() {
                warn!("No generator with tag {tag_name} produces {et_name}; skipping power reserve");
                continue;
            }

            for h in indices.hours.ord() {
                for y in indices.years.ord() {
                    let frozen: LinExpr = generators
                        .iter()
                        .filter_map(|&g| reserve.get(&(g, et, h, y)))
                        .map(LinExpr::from)
                        .sum();
                    problem.add_constraint(
                        format!("{et_name}_{tag_name}_POWER_RESERVE_CONSTRAINT[{h},{y}]"),
                        frozen,
                        Sense::Ge,
                        value.into(),
                    )?;
                }
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Compiled, household_network, run_config};
    use crate::network::Network;
    use float_cmp::assert_approx_eq;
    use indexmap::indexmap;
    use rstest::rstest;

    fn build_for(network: &Network) -> Compiled {
        let mut compiled = Compiled::new(network, &run_config());
        let ctx = BuildContext {
            indices: &compiled.indices,
            parameters: &compiled.parameters,
            variables: &compiled.variables,
        };
        build(&ctx, &mut compiled.problem).unwrap();
        compiled
    }

    #[rstest]
    fn test_emission_limits(household_network: Network) {
        let compiled = build_for(&household_network);
        let problem = &compiled.problem;

        // No limit in the base year
        assert!(problem.row("CO2_EMISSIONS_CONSTRAINT[0]").is_none());
        let row = problem.row("CO2_EMISSIONS_CONSTRAINT[2]").unwrap();
        assert_eq!(row.sense, Sense::Le);
        assert_approx_eq!(f64, row.rhs, 80.0);
        assert_eq!(row.terms.len(), 4);
    }

    #[rstest]
    fn test_fuel_availability(mut household_network: Network) {
        household_network.fuels[0].availability = vec![None, Some(50.0), None];
        let compiled = build_for(&household_network);
        let problem = &compiled.problem;

        assert!(problem.row("coal_MAX_FUEL_AVAILABILITY_CONSTRAINT[0]").is_none());
        let row = problem
            .row("coal_MAX_FUEL_AVAILABILITY_CONSTRAINT[1]")
            .unwrap();
        assert_approx_eq!(f64, row.rhs, 50.0);
    }

    #[rstest]
    fn test_unit_capacity_limits(mut household_network: Network) {
        household_network.generators[0].limits.max_capacity = vec![Some(1.0), None, Some(30.0)];
        household_network.generators[0].limits.min_capacity_increase =
            vec![None, Some(-2.0), None];
        let compiled = build_for(&household_network);
        let problem = &compiled.problem;

        // The base year is never bounded
        assert!(
            problem
                .row("coal_plant_GEN_CAP_MAX_CONSTRAINT[0]")
                .is_none()
        );
        assert!(
            problem
                .row("coal_plant_GEN_CAP_MAX_CONSTRAINT[1]")
                .is_none()
        );
        let row = problem.row("coal_plant_GEN_CAP_MAX_CONSTRAINT[2]").unwrap();
        assert_approx_eq!(f64, row.rhs, 30.0);
        let row = problem
            .row("coal_plant_GEN_DELTA_CAP_MIN_CONSTRAINT[1]")
            .unwrap();
        assert_eq!(row.sense, Sense::Ge);
        assert_eq!(row.terms.len(), 2);
    }

    #[rstest]
    fn test_type_capacity_limits(mut household_network: Network) {
        household_network.generator_types[0].technology.limits.max_capacity =
            vec![None, Some(100.0), Some(100.0)];
        let compiled = build_for(&household_network);
        assert!(
            compiled
                .problem
                .row("coal_type_TGEN_CAP_MAX_CONSTRAINT[1]")
                .is_some()
        );
    }

    #[rstest]
    fn test_power_reserves(mut household_network: Network) {
        household_network.constants.power_reserves = indexmap! {
            "electricity".to_string() => indexmap! {"res".to_string() => 0.5},
            "heat".to_string() => indexmap! {"res".to_string() => 0.5},
        };
        let compiled = build_for(&household_network);
        let problem = &compiled.problem;

        let row = problem
            .row("electricity_res_POWER_RESERVE_CONSTRAINT[3,2]")
            .unwrap();
        assert_eq!(row.sense, Sense::Ge);
        assert_approx_eq!(f64, row.rhs, 0.5);

        // No generator tagged "res" produces heat
        assert!(
            problem
                .row("heat_res_POWER_RESERVE_CONSTRAINT[0,0]")
                .is_none()
        );
    }
}
