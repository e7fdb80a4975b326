//! The objective builders.
//!
//! Each builder returns one cost term of the (minimised) objective. Monetary parameters are
//! already divided by the money scale and discount factors are computed by the parameter
//! preprocessor, so builders only combine them with variables.
use crate::constraints::BuildContext;
use crate::solver::{LinExpr, Problem};
use log::{debug, info};

mod capex;
mod operating;
mod penalties;

pub use penalties::ens_penalty_prices;

/// A function building one term of the objective
type ObjectiveTerm = fn(&BuildContext) -> LinExpr;

/// Every objective term, in the order in which it is built
const TERMS: [(&str, ObjectiveTerm); 9] = [
    ("capex", capex::capex),
    ("variable cost", operating::fuel_cost),
    ("unserved energy penalty", penalties::ens_penalty),
    ("opex", capex::opex),
    ("emission fee", operating::emission_fee_cost),
    ("transmission fee", operating::transmission_fee_cost),
    ("DSR penalty", penalties::dsr_penalty),
    ("curtailment cost", operating::curtailment_cost),
    ("generation compensation", operating::generation_compensation),
];

/// Add every cost term to the objective of the problem
pub fn set_objective(ctx: &BuildContext, problem: &mut Problem) {
    info!("Building objective");
    for (name, term) in TERMS {
        let expr = term(ctx);
        debug!("Built {name} objective with {} terms", expr.terms().len());
        problem.add_objective(expr);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Compiled, compiled};
    use rstest::rstest;

    #[rstest]
    fn test_set_objective(mut compiled: Compiled) {
        let ctx = BuildContext {
            indices: &compiled.indices,
            parameters: &compiled.parameters,
            variables: &compiled.variables,
        };
        set_objective(&ctx, &mut compiled.problem);
        let coefficients = compiled.problem.objective_coefficients();
        let coal_gen = compiled.variables.g_gen.at(&[0, 0, 0]);
        let ens = compiled.variables.b_ens.at(&[0, 0, 0]);
        assert!(coefficients[coal_gen.index()] > 0.0);
        assert!(coefficients[ens.index()] > 0.0);
    }
}
