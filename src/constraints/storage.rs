//! Storage operation: state of charge, power limits and loading cycles.
use super::BuildContext;
use crate::solver::{LinExpr, Problem, Sense};
use anyhow::Result;
use itertools::iproduct;

pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;

    for (s, name) in indices.storages.iter() {
        let tstor = params.storages.tstor[s];
        let utilization = params.storage_types.power_utilization[tstor];
        let p2cap = params.storages.p2cap[s];
        let gen_eff = params.storages.gen_eff[s];

        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            let soc = vars.s_soc.at(&[s, h, y]);
            let generation = vars.s_gen.at(&[s, h, y]);
            let capacity = vars.s_capacity.cap.at(&[s, y]);

            problem.add_constraint(
                format!("{name}_STATE_OF_CHARGE_UPPER_BOUND_CONSTRAINT[{h},{y}]"),
                soc.into(),
                Sense::Le,
                capacity * utilization,
            )?;
            problem.add_constraint(
                format!("{name}_GENERATION_UPPER_BOUND_CONSTRAINT[{h},{y}]"),
                generation.into(),
                Sense::Le,
                soc.into(),
            )?;
            problem.add_constraint(
                format!("{name}_BALANCE_UPPER_BOUND_CONSTRAINT[{h},{y}]"),
                generation * gen_eff + vars.s_load.at(&[s, h, y]),
                Sense::Le,
                capacity * p2cap,
            )?;
        }

        boundary_state_of_charge(ctx, problem, s)?;
        state_of_charge_definition(ctx, problem, s)?;
        loading_cycles(ctx, problem, s)?;
    }

    Ok(())
}

/// Storage starts empty in the first hour and ends empty in the last hour of the horizon
fn boundary_state_of_charge(ctx: &BuildContext, problem: &mut Problem, s: usize) -> Result<()> {
    let name = ctx.indices.storages.get(s);
    let last_hour = ctx.indices.hours.len() - 1;
    let last_year = ctx.indices.years.len() - 1;

    problem.add_constraint(
        format!("{name}_INITIAL_STATE_OF_CHARGE_CONSTRAINT"),
        ctx.variables.s_soc.at(&[s, 0, 0]).into(),
        Sense::Eq,
        0.0.into(),
    )?;
    problem.add_constraint(
        format!("{name}_END_STATE_OF_CHARGE_CONSTRAINT"),
        ctx.variables.s_soc.at(&[s, last_hour, last_year]).into(),
        Sense::Eq,
        0.0.into(),
    )
}

/// State of charge carried over from the given hour into the next one
fn carried_charge(ctx: &BuildContext, s: usize, h: usize, y: usize) -> LinExpr {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let loss = params.storage_types.energy_loss[params.storages.tstor[s]];

    vars.s_soc.at(&[s, h, y]) * (1.0 - loss) - vars.s_gen.at(&[s, h, y])
        + vars.s_load.at(&[s, h, y]) * params.storages.load_eff[s]
}

/// Link the state of charge of every hour to the previous one, wrapping from the last hour of a
/// year to the first hour of the next
fn state_of_charge_definition(ctx: &BuildContext, problem: &mut Problem, s: usize) -> Result<()> {
    let indices = ctx.indices;
    let name = indices.storages.get(s);
    let last_hour = indices.hours.len() - 1;

    for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
        let previous = match (h, y) {
            (0, 0) => continue,
            (0, y) => carried_charge(ctx, s, last_hour, y - 1),
            (h, y) => carried_charge(ctx, s, h - 1, y),
        };
        problem.add_constraint(
            format!("{name}_STATE_OF_CHARGE_DEFINITION_CONSTRAINT[{h},{y}]"),
            ctx.variables.s_soc.at(&[s, h, y]).into(),
            Sense::Eq,
            previous,
        )?;
    }

    Ok(())
}

/// Empty the storage at the start of every loading cycle, counting hours across years
fn loading_cycles(ctx: &BuildContext, problem: &mut Problem, s: usize) -> Result<()> {
    let Some(cycle_len) = ctx.parameters.storages.cycle_len[s] else {
        return Ok(());
    };
    let indices = ctx.indices;
    let name = indices.storages.get(s);

    for (y, h) in iproduct!(indices.years.ord(), indices.hours.ord()).step_by(cycle_len) {
        problem.add_constraint(
            format!("{name}_LOADING_CYCLE_CONSTRAINT[{h},{y}]"),
            ctx.variables.s_soc.at(&[s, h, y]).into(),
            Sense::Eq,
            0.0.into(),
        )?;
    }

    Ok(())
}
