//! Transmission line capacities.
use super::BuildContext;
use crate::solver::{Problem, Sense};
use anyhow::Result;
use itertools::iproduct;

/// Bound the hourly flow through every line of finite capacity
pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let indices = ctx.indices;
    for (line, name) in indices.lines.iter() {
        let cap = ctx.parameters.lines.cap[line];
        if !cap.is_finite() {
            continue;
        }

        for (h, y) in iproduct!(indices.hours.ord(), indices.years.ord()) {
            problem.add_constraint(
                format!("{name}_LINE_FLOW_UPPER_BOUND_CONSTRAINT[{h},{y}]"),
                ctx.variables.l_flow.at(&[line, h, y]).into(),
                Sense::Le,
                cap.into(),
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
    fn test_finite_capacity(household_network: Network) {
        let compiled = build_for(&household_network);
        assert_eq!(compiled.problem.num_rows(), 12);
        let row = compiled
            .problem
            .row("grid_to_house_LINE_FLOW_UPPER_BOUND_CONSTRAINT[3,2]")
            .unwrap();
        assert_eq!(row.sense, Sense::Le);
        assert_approx_eq!(f64, row.rhs, 20.0);
    }

    #[rstest]
    #[case(f64::INFINITY)]
    #[case(f64::NAN)]
    fn test_unbounded_line(mut household_network: Network, #[case] cap: f64) {
        household_network.lines[0].max_capacity = cap;
        let compiled = build_for(&household_network);
        assert_eq!(compiled.problem.num_rows(), 0);
    }
}
