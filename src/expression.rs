//! Linear expressions shared by several constraint and objective builders.
use crate::constraints::BuildContext;
use crate::solver::LinExpr;
use std::ops::Range;

/// Years in which construction of capacity still in service in year `y` may have started.
///
/// # Arguments
///
/// * `y` - The year of interest
/// * `life_time` - Life time of the technology in years
/// * `build_time` - Build time of the technology in years
pub fn construction_starts(y: usize, life_time: usize, build_time: usize) -> Range<usize> {
    (y + 1).saturating_sub(life_time + build_time)..(y + 1).saturating_sub(build_time)
}

/// Years up to `y` in which capacity whose construction started in year `s` is in service
pub fn service_years(y: usize, s: usize, life_time: usize, build_time: usize) -> Range<usize> {
    (s + build_time)..(s + build_time + life_time).min(y + 1)
}

/// Whether capacity whose construction started in year `s` is in service in year `y`
pub fn in_service(s: usize, y: usize, life_time: usize, build_time: usize) -> bool {
    (s + build_time..s + build_time + life_time).contains(&y)
}

/// Fuel burned by a generator in a year, extrapolated to the full year.
///
/// Returns `None` for generators which burn no fuel.
pub fn fuel_consumption(ctx: &BuildContext, gen_idx: usize, y: usize) -> Option<LinExpr> {
    let params = ctx.parameters;
    let fuel = params.generators.fuel[gen_idx]?;
    let factor = params.scenario.hourly_scale / params.fuels.energy_per_unit[fuel];

    Some(
        ctx.indices
            .hours
            .ord()
            .map(|h| ctx.variables.g_gen.at(&[gen_idx, h, y]) * factor)
            .sum(),
    )
}

/// Emission of one type caused by a generator in a year, after emission reduction.
///
/// Returns `None` for generators whose fuel does not emit the given type.
pub fn emission(
    ctx: &BuildContext,
    gen_idx: usize,
    emission_type: usize,
    y: usize,
) -> Option<LinExpr> {
    let params = ctx.parameters;
    let fuel = params.generators.fuel[gen_idx]?;
    let unit_emission = *params.fuels.u_emission[fuel].get(&emission_type)?;
    let reduction = params.generators.em_red[gen_idx]
        .get(&emission_type)
        .map_or(0.0, |series| series[y]);

    fuel_consumption(ctx, gen_idx, y)
        .map(|consumption| consumption * (unit_emission * (1.0 - reduction)))
}

/// Demand delivered to consumers through a bus: the demand of the aggregated consumer using the
/// bus's stack, weighted by the fraction of consumers using that stack.
pub fn fraction_demand(ctx: &BuildContext, bus: usize, h: usize, y: usize) -> LinExpr {
    let params = ctx.parameters;
    let Some(&lbs) = params.buses.lbs_mapping.get(&bus) else {
        return LinExpr::new();
    };
    let Some(aggr) = params.stacks.aggr_idx[lbs] else {
        return LinExpr::new();
    };

    params.aggregated_consumers.dem[aggr]
        .get(&params.buses.et[bus])
        .map_or_else(LinExpr::new, |demand| {
            ctx.variables.f_fraction.at(&[aggr, lbs, y]) * demand[h][y]
        })
}

/// Energy drawn from a bus by the generators converting it into other energy types
pub fn converter_load(ctx: &BuildContext, bus: usize, h: usize, y: usize) -> LinExpr {
    let params = ctx.parameters;
    let et = params.buses.et[bus];

    params.buses.generators[bus]
        .iter()
        .filter_map(|&gen_idx| {
            let rate = params.generators.conv_rate[gen_idx].get(&et)?[h];
            Some(ctx.variables.g_gen.at(&[gen_idx, h, y]) * (1.0 / rate))
        })
        .sum()
}

/// Load of a bus which demand-side response may shift
pub fn net_load(ctx: &BuildContext, bus: usize, h: usize, y: usize) -> LinExpr {
    fraction_demand(ctx, bus, h, y) + converter_load(ctx, bus, h, y)
}

/// Storage discharge assigned to demand chunks
pub fn storage_chunk_generation(
    ctx: &BuildContext,
    stor_idx: usize,
    h: usize,
    y: usize,
) -> LinExpr {
    ctx.parameters.storages.demand_chunks[stor_idx]
        .iter()
        .filter_map(|&dch| ctx.variables.s_gen_dch.get(&(dch, stor_idx, h, y)))
        .map(LinExpr::from)
        .sum()
}

/// Net injection of a storage unit into its bus
pub fn storage_injection(ctx: &BuildContext, stor_idx: usize, h: usize, y: usize) -> LinExpr {
    let vars = ctx.variables;
    let gen_eff = ctx.parameters.storages.gen_eff[stor_idx];

    vars.s_gen.at(&[stor_idx, h, y]) * gen_eff
        - vars.s_load.at(&[stor_idx, h, y])
        - storage_chunk_generation(ctx, stor_idx, h, y)
}

/// Multiplier applied to a generator's capacity costs
pub fn generator_cost_multiplier(ctx: &BuildContext, gen_idx: usize) -> f64 {
    let params = ctx.parameters;
    params.generator_types.capacity_multiplier[params.generators.tgen[gen_idx]]
}

/// Net generation of one energy type by the units carrying a tag.
///
/// Generators contribute their net generation of the energy type; storage units storing that
/// energy type contribute their discharge.
pub fn tagged_generation(ctx: &BuildContext, tag: usize, et: usize, h: usize, y: usize) -> LinExpr {
    let params = ctx.parameters;
    let vars = ctx.variables;

    let generation: LinExpr = ctx
        .indices
        .generators
        .ord()
        .filter(|&g| params.generators.tags[g].contains(&tag))
        .map(|g| LinExpr::from(vars.g_gen_et.at(&[g, et, h, y])))
        .sum();
    let discharge: LinExpr = ctx
        .indices
        .storages
        .ord()
        .filter(|&s| params.storages.tags[s].contains(&tag) && params.storages.et[s] == et)
        .map(|s| vars.s_gen.at(&[s, h, y]) * params.storages.gen_eff[s])
        .sum();

    generation + discharge
}
