//! Allocation of aggregated consumers to their local balancing stacks.
use super::BuildContext;
use crate::parameters::StackSeries;
use crate::solver::{LinExpr, Problem, Sense};
use anyhow::Result;
use itertools::iproduct;

pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let indices = ctx.indices;
    let consumers = &ctx.parameters.aggregated_consumers;
    let fraction = &ctx.variables.f_fraction;

    for (aggr, name) in indices.aggregated_consumers.iter() {
        for (lbs, lbs_name) in indices.stacks.iter() {
            problem.add_constraint(
                format!("{name}_{lbs_name}_BASE_FRACTION_CONSTRAINT"),
                fraction.at(&[aggr, lbs, 0]).into(),
                Sense::Eq,
                consumers.fr_base[aggr][lbs].into(),
            )?;
            for y in indices.years.ord() {
                problem.add_constraint(
                    format!("{name}_{lbs_name}_FRACTION_UPPER_BOUND_CONSTRAINT[{y}]"),
                    fraction.at(&[aggr, lbs, y]).into(),
                    Sense::Le,
                    consumers.lbs_indicator[aggr][lbs].into(),
                )?;
            }
        }

        for y in indices.years.ord() {
            let total: LinExpr = indices
                .stacks
                .ord()
                .map(|lbs| fraction.at(&[aggr, lbs, y]))
                .sum();
            problem.add_constraint(
                format!("{name}_FRACTION_SUM_CONSTRAINT[{y}]"),
                total,
                Sense::Eq,
                1.0.into(),
            )?;
        }

        fraction_bounds(ctx, problem, aggr)?;
    }

    Ok(())
}

/// The kind of bound placed on a stack's fraction
#[derive(Clone, Copy)]
enum FractionBound {
    Min,
    Max,
    MaxIncrease,
    MaxDecrease,
}

impl FractionBound {
    fn suffix(self) -> &'static str {
        match self {
            Self::Min => "FRAC_MIN",
            Self::Max => "FRAC_MAX",
            Self::MaxIncrease => "FRAC_MAX_INCREASE",
            Self::MaxDecrease => "FRAC_MAX_DECREASE",
        }
    }

    /// The first year the bound can apply to
    fn first_year(self) -> usize {
        match self {
            Self::Min | Self::Max => 0,
            Self::MaxIncrease | Self::MaxDecrease => 1,
        }
    }
}

/// Declared min/max and change bounds on the fractions of one consumer
fn fraction_bounds(ctx: &BuildContext, problem: &mut Problem, aggr: usize) -> Result<()> {
    let consumers = &ctx.parameters.aggregated_consumers;
    let fraction = &ctx.variables.f_fraction;
    let name = ctx.indices.aggregated_consumers.get(aggr);
    let bounds: [(&StackSeries, FractionBound); 4] = [
        (&consumers.min_fraction[aggr], FractionBound::Min),
        (&consumers.max_fraction[aggr], FractionBound::Max),
        (&consumers.max_fraction_increase[aggr], FractionBound::MaxIncrease),
        (&consumers.max_fraction_decrease[aggr], FractionBound::MaxDecrease),
    ];

    for (series_of_stack, bound) in bounds {
        for ((&lbs, series), y) in iproduct!(series_of_stack, ctx.indices.years.ord()) {
            if y < bound.first_year() {
                continue;
            }
            let Some(value) = series[y] else {
                continue;
            };

            let current = fraction.at(&[aggr, lbs, y]);
            let (lhs, sense): (LinExpr, Sense) = match bound {
                FractionBound::Min => (current.into(), Sense::Ge),
                FractionBound::Max => (current.into(), Sense::Le),
                FractionBound::MaxIncrease => {
                    (current - fraction.at(&[aggr, lbs, y - 1]), Sense::Le)
                }
                FractionBound::MaxDecrease => {
                    (fraction.at(&[aggr, lbs, y - 1]) - current, Sense::Le)
                }
            };
            problem.add_constraint(
                format!(
                    "{name}_{}_{}_CONSTRAINT[{y}]",
                    ctx.indices.stacks.get(lbs),
                    bound.suffix()
                ),
                lhs,
                sense,
                value.into(),
            )?;
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
    fn test_fraction_allocation(household_network: Network) {
        let compiled = build_for(&household_network);
        let problem = &compiled.problem;

        let row = problem
            .row("households_lbs_house_BASE_FRACTION_CONSTRAINT")
            .unwrap();
        assert_approx_eq!(f64, row.rhs, 1.0);
        let row = problem.row("households_FRACTION_SUM_CONSTRAINT[2]").unwrap();
        assert_eq!(row.sense, Sense::Eq);
        assert_approx_eq!(f64, row.rhs, 1.0);
        assert!(
            problem
                .row("households_lbs_house_FRACTION_UPPER_BOUND_CONSTRAINT[1]")
                .is_some()
        );
        // No declared bounds
        assert!(!problem.rows().iter().any(|row| row.name.contains("FRAC_")));
    }

    #[rstest]
    fn test_fraction_bounds(mut household_network: Network) {
        let consumer = &mut household_network.aggregated_consumers[0];
        consumer.min_fraction = indexmap! {"lbs_house".into() => vec![Some(0.1), None, Some(0.3)]};
        consumer.max_fraction_increase =
            indexmap! {"lbs_house".into() => vec![Some(0.5), Some(0.2), None]};
        consumer.max_fraction_decrease =
            indexmap! {"lbs_house".into() => vec![None, None, Some(0.1)]};
        let compiled = build_for(&household_network);
        let problem = &compiled.problem;
        let vars = &compiled.variables;

        let row = problem
            .row("households_lbs_house_FRAC_MIN_CONSTRAINT[2]")
            .unwrap();
        assert_eq!(row.sense, Sense::Ge);
        assert_approx_eq!(f64, row.rhs, 0.3);
        assert!(
            problem
                .row("households_lbs_house_FRAC_MIN_CONSTRAINT[1]")
                .is_none()
        );

        // Changes are only bounded from the second year
        assert!(
            problem
                .row("households_lbs_house_FRAC_MAX_INCREASE_CONSTRAINT[0]")
                .is_none()
        );
        let row = problem
            .row("households_lbs_house_FRAC_MAX_INCREASE_CONSTRAINT[1]")
            .unwrap();
        assert_eq!(
            row.terms,
            vec![
                (vars.f_fraction.at(&[0, 0, 1]), 1.0),
                (vars.f_fraction.at(&[0, 0, 0]), -1.0)
            ]
        );
        let row = problem
            .row("households_lbs_house_FRAC_MAX_DECREASE_CONSTRAINT[2]")
            .unwrap();
        assert_eq!(
            row.terms,
            vec![
                (vars.f_fraction.at(&[0, 0, 1]), 1.0),
                (vars.f_fraction.at(&[0, 0, 2]), -1.0)
            ]
        );
    }
}
