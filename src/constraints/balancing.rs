//! Energy balance of buses and demand chunks, and demand-side response.
use super::BuildContext;
use crate::expression::{net_load, storage_injection};
use crate::solver::{LinExpr, Problem, Sense};
use crate::variables::{SparseTensor, dsr_buses};
use anyhow::Result;
use indexmap::IndexSet;
use itertools::iproduct;
use log::debug;
use std::ops::Range;

pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    bus_balance(ctx, problem)?;
    demand_chunk_balance(ctx, problem)?;
    load_shifting(ctx, problem)
}

/// Net shift of load into an hour (zero on buses without demand-side response)
fn shift(ctx: &BuildContext, bus: usize, h: usize, y: usize) -> LinExpr {
    let vars = ctx.variables;
    match (
        vars.b_shift_plus.get(&(bus, h, y)),
        vars.b_shift_minus.get(&(bus, h, y)),
    ) {
        (Some(plus), Some(minus)) => plus - minus,
        _ => LinExpr::new(),
    }
}

/// Energy injected into a bus by the units attached to it
fn injection(ctx: &BuildContext, bus: usize, h: usize, y: usize) -> LinExpr {
    let params = ctx.parameters;
    let et = params.buses.et[bus];

    let generation: LinExpr = params.buses.generators[bus]
        .iter()
        .filter(|&&g| params.generators.ett[g].contains(&et))
        .map(|&g| LinExpr::from(ctx.variables.g_gen_et.at(&[g, et, h, y])))
        .sum();
    let storage: LinExpr = params.buses.storages[bus]
        .iter()
        .map(|&s| storage_injection(ctx, s, h, y))
        .sum();

    generation + storage
}

/// Flow arriving at a bus, net of transmission loss
fn inflow(ctx: &BuildContext, bus: usize, h: usize, y: usize) -> LinExpr {
    let lines = &ctx.parameters.lines;
    ctx.parameters.buses.lines_in[bus]
        .iter()
        .map(|&l| ctx.variables.l_flow.at(&[l, h, y]) * (1.0 - lines.loss[l]))
        .sum()
}

/// Flow leaving a bus
fn outflow(ctx: &BuildContext, bus: usize, h: usize, y: usize) -> LinExpr {
    ctx.parameters.buses.lines_out[bus]
        .iter()
        .map(|&l| ctx.variables.l_flow.at(&[l, h, y]))
        .sum()
}

/// Supply must meet load on every bus in every hour:
/// `shift + load + outflow = unserved energy + inflow + injection`
fn bus_balance(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let indices = ctx.indices;
    for (bus, name) in indices.buses.iter() {
        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            let lhs = shift(ctx, bus, h, y) + net_load(ctx, bus, h, y) + outflow(ctx, bus, h, y);
            let rhs = ctx.variables.b_ens.at(&[bus, h, y])
                + inflow(ctx, bus, h, y)
                + injection(ctx, bus, h, y);
            problem.add_constraint(
                format!("{name}_BALANCING_CONSTRAINT[{h},{y}]"),
                lhs,
                Sense::Eq,
                rhs,
            )?;
        }
    }

    Ok(())
}

/// Units which are tagged to cover a demand chunk
fn chunk_units(unit_chunks: &[IndexSet<usize>], dch: usize) -> Vec<usize> {
    unit_chunks
        .iter()
        .enumerate()
        .filter(|(_, chunks)| chunks.contains(&dch))
        .map(|(unit, _)| unit)
        .collect()
}

/// The generation assigned to a demand chunk over a set of hours in one year
fn chunk_generation(
    ctx: &BuildContext,
    dch: usize,
    (generators, storages): (&[usize], &[usize]),
    hours: &[usize],
    y: usize,
) -> LinExpr {
    let vars = ctx.variables;
    let generation = iproduct!(generators, hours)
        .filter_map(|(&g, &h)| vars.g_gen_dch.get(&(dch, g, h, y)));
    let discharge = iproduct!(storages, hours)
        .filter_map(|(&s, &h)| vars.s_gen_dch.get(&(dch, s, h, y)));

    generation.chain(discharge).map(LinExpr::from).sum()
}

/// The tagged units must cover the demand of every chunk period
fn demand_chunk_balance(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = ctx.parameters;
    let chunks = &params.demand_chunks;
    for (dch, name) in ctx.indices.demand_chunks.iter() {
        let generators = chunk_units(&params.generators.demand_chunks, dch);
        let storages = chunk_units(&params.storages.demand_chunks, dch);
        for (period_idx, period) in chunks.periods[dch].iter().enumerate() {
            for y in ctx.indices.years.ord() {
                let generation =
                    chunk_generation(ctx, dch, (&generators, &storages), &period.hours, y);
                if generation.has_no_terms() {
                    debug!("No units can cover demand chunk {name}");
                    continue;
                }

                problem.add_constraint(
                    format!("{name}_{period_idx}_DEMAND_CHUNK_BALANCING_CONSTRAINT[{y}]"),
                    generation,
                    Sense::Eq,
                    period.demand[y].into(),
                )?;
            }
        }
    }

    Ok(())
}

/// Sum of a shift variable over a balancing period
fn period_shift(
    shift: &SparseTensor<(usize, usize, usize)>,
    bus: usize,
    period: &Range<usize>,
    y: usize,
) -> LinExpr {
    period
        .clone()
        .filter_map(|h| shift.get(&(bus, h, y)))
        .map(LinExpr::from)
        .sum()
}

/// Limits on shifting load at buses with a demand-side response rule
fn load_shifting(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let dsr = &ctx.parameters.dsr;
    let vars = ctx.variables;
    let indices = ctx.indices;

    for (bus, rule) in dsr_buses(ctx.parameters) {
        let bus_name = indices.buses.get(bus);
        let hourly_limits = [
            (
                &vars.b_shift_plus,
                dsr.hourly_relative_shift_plus_limit[rule],
                "LOAD_COMPENSATION_RELATIVE_HOURLY_LIMIT",
            ),
            (
                &vars.b_shift_minus,
                dsr.hourly_relative_shift_minus_limit[rule],
                "LOAD_SHIFTING_RELATIVE_HOURLY_LIMIT",
            ),
        ];
        for (shift, limit, suffix) in hourly_limits {
            let Some(limit) = limit else {
                continue;
            };
            for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
                let Some(var) = shift.get(&(bus, h, y)) else {
                    continue;
                };
                problem.add_constraint(
                    format!("{bus_name}_{suffix}_CONSTRAINT[{h},{y}]"),
                    var.into(),
                    Sense::Le,
                    net_load(ctx, bus, h, y) * limit,
                )?;
            }
        }

        for (period_idx, period) in dsr.balancing_periods[rule].iter().enumerate() {
            for y in indices.years.ord() {
                let shift_plus = period_shift(&vars.b_shift_plus, bus, period, y);
                let shift_minus = period_shift(&vars.b_shift_minus, bus, period, y);

                problem.add_constraint(
                    format!("{bus_name}_{period_idx}_DSR_COMPENSATION_CONSTRAINT[{y}]"),
                    shift_plus,
                    Sense::Eq,
                    shift_minus.clone() * dsr.compensation_factor[rule],
                )?;
                if let Some(limit) = dsr.relative_shift_limit[rule] {
                    let period_load: LinExpr =
                        period.clone().map(|h| net_load(ctx, bus, h, y)).sum();
                    problem.add_constraint(
                        format!("{bus_name}_{period_idx}_DSR_RELATIVE_SHIFT_CONSTRAINT[{y}]"),
                        shift_minus.clone(),
                        Sense::Le,
                        period_load * limit,
                    )?;
                }
                if let Some(limit) = dsr.abs_shift_limit[rule] {
                    problem.add_constraint(
                        format!("{bus_name}_{period_idx}_DSR_ABSOLUTE_SHIFT_CONSTRAINT[{y}]"),
                        shift_minus,
                        Sense::Le,
                        limit.into(),
                    )?;
                }
            }
        }
    }

    Ok(())
}
