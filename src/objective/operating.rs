//! Costs which scale with the operation of units and lines.
use crate::constraints::BuildContext;
use crate::expression::{emission, fuel_consumption};
use crate::solver::LinExpr;
use itertools::iproduct;

/// Fuel burned by generators, priced at the yearly fuel cost
pub fn fuel_cost(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let year_weight = &params.scenario.year_aggregates;

    iproduct!(ctx.indices.generators.ord(), ctx.indices.years.ord())
        .filter_map(|(g, y)| {
            let fuel = params.generators.fuel[g]?;
            let consumption = fuel_consumption(ctx, g, y)?;
            Some(consumption * (params.fuels.unit_cost[fuel][y] * year_weight[y]))
        })
        .sum()
}

/// Emissions of generators, priced by every emission fee attached to them
pub fn emission_fee_cost(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let fees = &params.emission_fees;
    let year_weight = &params.scenario.year_aggregates;

    let mut expr = LinExpr::new();
    for (g, y) in iproduct!(ctx.indices.generators.ord(), ctx.indices.years.ord()) {
        for &fee in &params.generators.emission_fees[g] {
            if let Some(emitted) = emission(ctx, g, fees.emission_type[fee], y) {
                expr += emitted * (fees.price[fee][y] * year_weight[y]);
            }
        }
    }

    expr
}

/// Flow through lines charged with a transmission fee
pub fn transmission_fee_cost(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let indices = ctx.indices;
    let scale = params.scenario.hourly_scale;

    let mut expr = LinExpr::new();
    for (line, tf) in params.lines.tf.iter().enumerate() {
        let Some(tf) = *tf else {
            continue;
        };
        let fee = &params.transmission_fees.fee[tf];
        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            let price = fee[h] * params.scenario.year_aggregates[y] * scale;
            expr += ctx.variables.l_flow.at(&[line, h, y]) * price;
        }
    }

    expr
}

/// Energy dumped by generators whose type puts a price on curtailment
pub fn curtailment_cost(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let indices = ctx.indices;
    let scale = params.scenario.hourly_scale;

    let mut expr = LinExpr::new();
    for g in indices.generators.ord() {
        let Some(cost) = &params.generator_types.energy_curtailment_cost[params.generators.tgen[g]]
        else {
            continue;
        };
        for (&et, h, y) in iproduct!(
            &params.generators.ett[g],
            indices.hours.ord(),
            indices.years.ord()
        ) {
            let price = cost[y] * params.scenario.year_aggregates[y] * scale;
            expr += ctx.variables.g_dump_et.at(&[g, et, h, y]) * price;
        }
    }

    expr
}

/// Reward for generation by generators whose type is compensated, entered as a negative cost
pub fn generation_compensation(ctx: &BuildContext) -> LinExpr {
    let params = ctx.parameters;
    let indices = ctx.indices;
    let scale = params.scenario.hourly_scale;

    let mut expr = LinExpr::new();
    for g in indices.generators.ord() {
        let Some(compensation) =
            &params.generator_types.generation_compensation[params.generators.tgen[g]]
        else {
            continue;
        };
        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            let reward = compensation[y] * params.scenario.year_aggregates[y] * scale;
            expr -= ctx.variables.g_gen.at(&[g, h, y]) * reward;
        }
    }

    expr
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RunConfig;
    use crate::fixture::{Compiled, N_YEARS, compiled, household_network, run_config};
    use crate::network::Network;
    use crate::solver::Variable;
    use float_cmp::assert_approx_eq;
    use rstest::rstest;

    fn coefficient(expr: &LinExpr, var: Variable) -> f64 {
        expr.merged_terms()
            .into_iter()
            .find(|(v, _)| *v == var)
            .map_or(0.0, |(_, coeff)| coeff)
    }

    #[rstest]
    fn test_fuel_cost(household_network: Network) {
        let config = RunConfig {
            year_aggregates: Some(vec![1.0, 2.0, 1.0]),
            ..run_config()
        };
        let compiled = Compiled::new(&household_network, &config);
        let expr = fuel_cost(&compiled.context());
        let g_gen = &compiled.variables.g_gen;

        // Coal costs 2 per unit of fuel holding one unit of energy
        assert_approx_eq!(f64, coefficient(&expr, g_gen.at(&[0, 3, 0])), 2.0);
        assert_approx_eq!(f64, coefficient(&expr, g_gen.at(&[0, 3, 1])), 4.0);
        assert_approx_eq!(f64, coefficient(&expr, g_gen.at(&[1, 3, 1])), 0.0);
    }

    #[rstest]
    #[case(0.0, 3.0)]
    #[case(0.5, 1.5)]
    fn test_emission_fee_cost(
        mut household_network: Network,
        #[case] reduction: f64,
        #[case] expected: f64,
    ) {
        household_network.generator_types[0]
            .emission_reduction
            .insert("CO2".into(), vec![reduction; N_YEARS]);
        let compiled = Compiled::new(&household_network, &run_config());
        let expr = emission_fee_cost(&compiled.context());

        // 0.3 CO2 per unit of fuel at a fee of 10
        let var = compiled.variables.g_gen.at(&[0, 1, 2]);
        assert_approx_eq!(f64, coefficient(&expr, var), expected);
    }

    #[rstest]
    fn test_transmission_fee_cost(compiled: Compiled) {
        let expr = transmission_fee_cost(&compiled.context());
        assert_eq!(expr.terms().len(), 12);
        let var = compiled.variables.l_flow.at(&[0, 2, 1]);
        assert_approx_eq!(f64, coefficient(&expr, var), 0.1);
    }

    #[rstest]
    fn test_no_curtailment_or_compensation(compiled: Compiled) {
        let ctx = compiled.context();
        assert!(curtailment_cost(&ctx).has_no_terms());
        assert!(generation_compensation(&ctx).has_no_terms());
    }

    #[rstest]
    fn test_curtailment_and_compensation(mut household_network: Network) {
        household_network.generator_types[1].energy_curtailment_cost = Some(vec![3.0; N_YEARS]);
        household_network.generator_types[1].generation_compensation = Some(vec![0.5; N_YEARS]);
        let compiled = Compiled::new(&household_network, &run_config());
        let ctx = compiled.context();
        let vars = &compiled.variables;

        let expr = curtailment_cost(&ctx);
        assert_eq!(expr.terms().len(), 12);
        assert_approx_eq!(f64, coefficient(&expr, vars.g_dump_et.at(&[1, 0, 0, 0])), 3.0);

        let expr = generation_compensation(&ctx);
        assert_approx_eq!(f64, coefficient(&expr, vars.g_gen.at(&[1, 2, 2])), -0.5);
    }
}
