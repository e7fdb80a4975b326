//! Generator output: capacity limits and the split of brutto generation into energy types.
use super::BuildContext;
use crate::solver::{LinExpr, Problem, Sense};
use anyhow::{Context, Result};
use itertools::iproduct;

pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    generation_vs_capacity(ctx, problem)?;
    generation_and_dump(ctx, problem)?;
    total_dump(ctx, problem)
}

/// Bound brutto generation by installed capacity.
///
/// Non-dispatchable units (those with a capacity factor) must generate exactly what their profile
/// allows; dispatchable units may generate anything between their minimal and maximal utilisation.
fn generation_vs_capacity(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;

    for (g, name) in indices.generators.iter() {
        let tgen = params.generators.tgen[g];
        let utilization = &params.generator_types.power_utilization[tgen];
        let min_utilization = &params.generator_types.minimal_power_utilization[tgen];
        let profile = params.generators.capacity_factor[g]
            .map(|cf| &params.capacity_factors.profile[cf]);

        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            let generation = vars.g_gen.at(&[g, h, y]);
            let capacity = vars.g_capacity.cap.at(&[g, y]);

            if let Some(profile) = profile {
                problem.add_constraint(
                    format!("{name}_NON_DISPATCHABLE_GEN_CAP_CONSTRAINT[{h},{y}]"),
                    generation.into(),
                    Sense::Eq,
                    capacity * (profile[h] * utilization[h]),
                )?;
            } else {
                problem.add_constraint(
                    format!("{name}_DISPATCHABLE_GEN_CAP_CONSTRAINT[{h},{y}]"),
                    generation.into(),
                    Sense::Le,
                    capacity * utilization[h],
                )?;
                problem.add_constraint(
                    format!("{name}_DISPATCHABLE_MIN_POWER_UTILIZATION_CONSTRAINT[{h},{y}]"),
                    generation.into(),
                    Sense::Ge,
                    capacity * min_utilization[h],
                )?;
            }
        }
    }

    Ok(())
}

/// Hourly efficiency of a generator for an energy type it produces
fn efficiency<'a>(ctx: &BuildContext<'a>, g: usize, et: usize) -> Result<&'a [f64]> {
    let params = ctx.parameters;
    let tgen = params.generators.tgen[g];
    params.generator_types.eff[tgen]
        .get(&et)
        .map(Vec::as_slice)
        .with_context(|| {
            format!(
                "Generator type {} has no efficiency for {}",
                ctx.indices.generator_types.get(tgen),
                ctx.indices.energy_types.get(et)
            )
        })
}

/// Generation of a unit committed to demand chunks of one energy type
fn chunk_generation(ctx: &BuildContext, g: usize, et: usize, h: usize, y: usize) -> LinExpr {
    let chunk_types = &ctx.parameters.demand_chunks.energy_type;
    ctx.parameters.generators.demand_chunks[g]
        .iter()
        .filter(|&&dch| chunk_types[dch] == et)
        .filter_map(|&dch| ctx.variables.g_gen_dch.get(&(dch, g, h, y)))
        .map(LinExpr::from)
        .sum()
}

/// Split brutto generation into net generation, dumped energy, demand chunk generation and power
/// reserve per energy type. Energy types a unit does not produce get nothing.
fn generation_and_dump(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;

    for (g, name) in indices.generators.iter() {
        for (et, et_name) in indices.energy_types.iter() {
            let produced = params.generators.ett[g].contains(&et);
            let eff = if produced {
                Some(efficiency(ctx, g, et)?)
            } else {
                None
            };

            for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
                let split = vars.g_gen_et.at(&[g, et, h, y]) + vars.g_dump_et.at(&[g, et, h, y]);
                let row_name = format!("{name}_{et_name}_GENERATION_DUMP_CONSTRAINT[{h},{y}]");
                match eff {
                    Some(eff) => {
                        let mut split = split + chunk_generation(ctx, g, et, h, y);
                        if let Some(reserve) = vars.g_gen_reserve.get(&(g, et, h, y)) {
                            split += reserve;
                        }
                        problem.add_constraint(
                            row_name,
                            vars.g_gen.at(&[g, h, y]) * eff[h],
                            Sense::Eq,
                            split,
                        )?;
                    }
                    None => problem.add_constraint(row_name, split, Sense::Eq, 0.0.into())?,
                }
            }
        }
    }

    Ok(())
}

/// Total dumped energy of a unit, measured before conversion losses
fn total_dump(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;

    for (g, name) in indices.generators.iter() {
        let efficiencies = params.generators.ett[g]
            .iter()
            .map(|&et| Ok((et, efficiency(ctx, g, et)?)))
            .collect::<Result<Vec<_>>>()?;

        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            let dumped: LinExpr = efficiencies
                .iter()
                .map(|(et, eff)| vars.g_dump_et.at(&[g, *et, h, y]) * (1.0 / eff[h]))
                .sum();
            problem.add_constraint(
                format!("{name}_TOTAL_DUMP_ENERGY_CONSTRAINT[{h},{y}]"),
                dumped,
                Sense::Eq,
                vars.g_dump.at(&[g, h, y]).into(),
            )?;
        }
    }

    Ok(())
}
