//! Costs of installed capacity.
use crate::constraints::BuildContext;
use crate::expression::{generator_cost_multiplier, in_service};
use crate::parameters::TechnologyTable;
use crate::solver::{LinExpr, Variable};
use itertools::iproduct;

/// Investment in new capacity of one technology, spread evenly over its life time and discounted
/// to every year in which the capacity is in service.
///
/// # Arguments
///
/// * `ctx` - The model being built
/// * `technology` - Technology parameters of the unit type
/// * `unit_type` - Index of the unit type
/// * `multiplier` - Multiplier applied to capacity costs of the unit
/// * `plus` - The new capacity whose construction starts in a year, if declared
fn amortised_capex<F>(
    ctx: &BuildContext,
    technology: &TechnologyTable,
    unit_type: usize,
    multiplier: f64,
    plus: F,
) -> LinExpr
where
    F: Fn(usize) -> Option<Variable>,
{
    let life_time = technology.lt[unit_type];
    let build_time = technology.bt[unit_type];
    let capex = &technology.capex[unit_type];
    let discount = &ctx.parameters.scenario.discount_factors;

    let mut expr = LinExpr::new();
    let years = ctx.indices.years.ord();
    for (s, y) in iproduct!(years.clone(), years) {
        if !in_service(s, y, life_time, build_time) {
            continue;
        }
        if let Some(var) = plus(s) {
            expr += var * (capex[s] * discount[y] / life_time as f64 * multiplier);
        }
    }

    expr
}

/// Discounted investment costs of every unit and every consumer-owned unit type
pub fn capex(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;
    let mut expr = LinExpr::new();

    for g in indices.generators.ord() {
        expr += amortised_capex(
            ctx,
            &params.generator_types.technology,
            params.generators.tgen[g],
            generator_cost_multiplier(ctx, g),
            |s| vars.g_capacity.cap_plus.get(&(g, s)),
        );
    }
    for s in indices.storages.ord() {
        expr += amortised_capex(
            ctx,
            &params.storage_types.technology,
            params.storages.tstor[s],
            1.0,
            |year| vars.s_capacity.cap_plus.get(&(s, year)),
        );
    }

    for (aggr, types) in indices.aggr_tgen_map.iter().enumerate() {
        for &tgen in types {
            expr += amortised_capex(
                ctx,
                &params.generator_types.technology,
                tgen,
                params.generator_types.capacity_multiplier[tgen],
                |s| vars.tg_capacity.tcap_plus.get(&(aggr, tgen, s)),
            );
        }
    }
    for (aggr, types) in indices.aggr_tstor_map.iter().enumerate() {
        for &tstor in types {
            expr += amortised_capex(
                ctx,
                &params.storage_types.technology,
                tstor,
                1.0,
                |s| vars.ts_capacity.tcap_plus.get(&(aggr, tstor, s)),
            );
        }
    }

    expr
}

/// Fixed operating costs of installed capacity
pub fn opex(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;

    let generators = iproduct!(indices.generators.ord(), indices.years.ord()).map(|(g, y)| {
        let opex = params.generator_types.technology.opex[params.generators.tgen[g]][y];
        vars.g_capacity.cap.at(&[g, y]) * (opex * generator_cost_multiplier(ctx, g))
    });
    let storages = iproduct!(indices.storages.ord(), indices.years.ord()).map(|(s, y)| {
        let opex = params.storage_types.technology.opex[params.storages.tstor[s]][y];
        vars.s_capacity.cap.at(&[s, y]) * opex
    });

    generators.chain(storages).sum()
}
