//! Linear relations between the capacities of two units.
use super::BuildContext;
use crate::network::BoundSense;
use crate::parameters::UnitRef;
use crate::solver::{Problem, Sense, Variable};
use anyhow::Result;

/// Capacity variable of a unit in a year
fn capacity(ctx: &BuildContext, unit: UnitRef, y: usize) -> Variable {
    let vars = ctx.variables;
    match unit {
        UnitRef::Generator(g) => vars.g_capacity.cap.at(&[g, y]),
        UnitRef::Storage(s) => vars.s_capacity.cap.at(&[s, y]),
    }
}

/// Relate `coefficient * left capacity` to `right capacity` in every year but the first
pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = &ctx.parameters.capacity_bounds;
    let indices = ctx.indices;

    for (idx, name) in indices.capacity_bounds.iter() {
        let sense = match params.sense[idx] {
            BoundSense::Equal => Sense::Eq,
            BoundSense::LessOrEqual => Sense::Le,
        };
        for y in 1..indices.years.len() {
            problem.add_constraint(
                format!("{name}_CAPACITY_BOUNDS_CONSTRAINT[{y}]"),
                capacity(ctx, params.left[idx], y) * params.left_coeff[idx],
                sense,
                capacity(ctx, params.right[idx], y).into(),
            )?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Compiled, household_network, run_config};
    use crate::network::{CapacityBound, Network};
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

    fn bound(left: &str, right: &str, sense: BoundSense, coefficient: f64) -> CapacityBound {
        CapacityBound {
            id: format!("{left}_vs_{right}").into(),
            left_technology: left.into(),
            right_technology: right.into(),
            sense,
            left_coefficient: coefficient,
        }
    }

    #[rstest]
    #[case(BoundSense::Equal, Sense::Eq)]
    #[case(BoundSense::LessOrEqual, Sense::Le)]
    fn test_generator_vs_storage(
        mut household_network: Network,
        #[case] bound_sense: BoundSense,
        #[case] expected: Sense,
    ) {
        let bound = bound("pv_farm", "battery", bound_sense, 0.5);
        household_network
            .capacity_bounds
            .insert(bound.id.clone(), bound);
        let compiled = build_for(&household_network);
        let vars = &compiled.variables;

        assert_eq!(compiled.problem.num_rows(), 2);
        assert!(
            compiled
                .problem
                .row("pv_farm_vs_battery_CAPACITY_BOUNDS_CONSTRAINT[0]")
                .is_none()
        );
        let row = compiled
            .problem
            .row("pv_farm_vs_battery_CAPACITY_BOUNDS_CONSTRAINT[1]")
            .unwrap();
        assert_eq!(row.sense, expected);
        assert_eq!(
            row.terms,
            vec![
                (vars.g_capacity.cap.at(&[1, 1]), 0.5),
                (vars.s_capacity.cap.at(&[0, 1]), -1.0)
            ]
        );
    }
}
