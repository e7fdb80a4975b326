//! Penalties for unserved energy and shifted load.
use crate::constraints::BuildContext;
use crate::solver::LinExpr;
use crate::variables::dsr_buses;
use itertools::iproduct;
use log::info;

/// The largest of the given values, or zero if there are none
fn max_or_zero<'a, I: IntoIterator<Item = &'a f64>>(values: I) -> f64 {
    values.into_iter().copied().fold(0.0, f64::max)
}

/// Cost of generating one unit of energy from the most expensive fuel, including the most
/// expensive fee on its emissions
fn max_variable_cost(ctx: &BuildContext) -> f64 {
    let params = ctx.parameters;
    let fees = &params.emission_fees;

    let fuel_costs = ctx.indices.fuels.ord().map(|fuel| {
        let energy_per_unit = params.fuels.energy_per_unit[fuel];
        let emission_cost: f64 = params.fuels.u_emission[fuel]
            .iter()
            .map(|(&emission_type, &per_unit)| {
                let max_fee = max_or_zero(
                    fees.price
                        .iter()
                        .zip(&fees.emission_type)
                        .filter(|(_, fee_type)| **fee_type == emission_type)
                        .flat_map(|(price, _)| price),
                );
                per_unit * max_fee
            })
            .sum();

        (max_or_zero(&params.fuels.unit_cost[fuel]) + emission_cost) / energy_per_unit
    });

    fuel_costs.fold(0.0, f64::max) * params.scenario.hourly_scale
}

/// The cost a unit of unserved energy must exceed for the model to prefer supplying it
fn base_cost(ctx: &BuildContext) -> f64 {
    let params = ctx.parameters;
    let scale = params.scenario.hourly_scale;
    let gen_tech = &params.generator_types.technology;
    let stor_tech = &params.storage_types.technology;

    [
        max_variable_cost(ctx),
        max_or_zero(&params.dsr.penalization_minus) * scale,
        max_or_zero(gen_tech.opex.iter().chain(&stor_tech.opex).flatten()),
        max_or_zero(gen_tech.capex.iter().chain(&stor_tech.capex).flatten()),
        max_or_zero(params.transmission_fees.fee.iter().flatten()) * scale,
    ]
    .into_iter()
    .fold(0.0, f64::max)
}

/// Price of a unit of unserved energy for every energy type.
///
/// An explicitly configured price applies to every energy type. Otherwise the price is estimated
/// as the energy type's penalty coefficient (one if not given) times the largest cost rate in the
/// model, but never less than the configured minimum.
pub fn ens_penalty_prices(ctx: &BuildContext) -> Vec<f64> {
    let scenario = &ctx.parameters.scenario;
    let n_types = ctx.indices.energy_types.len();
    if let Some(price) = scenario.ens_penalty_price {
        return vec![price; n_types];
    }

    let base = base_cost(ctx);
    (0..n_types)
        .map(|et| {
            let coefficient = scenario
                .ens_penalty_coefficients
                .get(&et)
                .copied()
                .unwrap_or(1.0);
            (coefficient * base).max(scenario.ens_min_penalty_price)
        })
        .collect()
}

/// Unserved energy on every bus, priced per energy type
pub fn ens_penalty(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let indices = ctx.indices;
    if !params.scenario.ens {
        return LinExpr::new();
    }

    let prices = ens_penalty_prices(ctx);
    for (et, name) in indices.energy_types.iter() {
        info!("Unserved {name} penalised at {} per unit", prices[et]);
    }

    iproduct!(indices.buses.ord(), indices.hours.ord(), indices.years.ord())
        .map(|(bus, h, y)| {
            let price = prices[params.buses.et[bus]] * indices.year_aggregation(y);
            ctx.variables.b_ens.at(&[bus, h, y]) * price
        })
        .sum()
}

/// Load shifted out of an hour by demand-side response.
///
/// Only the negative shift is priced; `penalization_plus` is carried by the rule but does not
/// enter the objective.
pub fn dsr_penalty(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;

    let mut expr = LinExpr::new();
    for (bus, dsr) in dsr_buses(params) {
        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            if let Some(minus) = vars.b_shift_minus.get(&(bus, h, y)) {
                let weight = indices.year_aggregation(y);
                expr += minus * (params.dsr.penalization_minus[dsr] * weight);
            }
        }
    }

    expr
}
