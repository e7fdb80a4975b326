//! Generators whose capacities must move together.
use super::BuildContext;
use crate::solver::{Problem, Sense};
use anyhow::Result;
use indexmap::IndexMap;
use itertools::iproduct;

/// Tie the capacity of every generator in a binding group to the first generator of the group,
/// from the second year on
pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let indices = ctx.indices;
    let cap = &ctx.variables.g_capacity.cap;

    let mut groups: IndexMap<&str, Vec<usize>> = IndexMap::new();
    for (g, binding) in ctx.parameters.generators.capacity_binding.iter().enumerate() {
        if let Some(binding) = binding {
            groups.entry(binding.as_str()).or_default().push(g);
        }
    }

    for (binding, members) in groups {
        let Some((&reference, others)) = members.split_first() else {
            continue;
        };
        let ref_name = indices.generators.get(reference);
        for (&g, y) in iproduct!(others, 1..indices.years.len()) {
            problem.add_constraint(
                format!(
                    "{ref_name}_{}_CAPACITY_BINDING_{binding}_CONSTRAINT[{y}]",
                    indices.generators.get(g)
                ),
                cap.at(&[reference, y]).into(),
                Sense::Eq,
                cap.at(&[g, y]).into(),
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
    fn test_no_binding(household_network: Network) {
        assert_eq!(build_for(&household_network).problem.num_rows(), 0);
    }

    #[rstest]
    fn test_single_member_group(mut household_network: Network) {
        household_network.generators[0].capacity_binding = Some("alone".into());
        assert_eq!(build_for(&household_network).problem.num_rows(), 0);
    }

    #[rstest]
    fn test_binding_group(mut household_network: Network) {
        for g in 0..3 {
            household_network.generators[g].capacity_binding = Some("together".into());
        }
        let compiled = build_for(&household_network);
        let cap = &compiled.variables.g_capacity.cap;

        // Two followers over two years
        assert_eq!(compiled.problem.num_rows(), 4);
        assert!(
            compiled
                .problem
                .row("coal_plant_pv_farm_CAPACITY_BINDING_together_CONSTRAINT[0]")
                .is_none()
        );
        let row = compiled
            .problem
            .row("coal_plant_heat_pump_CAPACITY_BINDING_together_CONSTRAINT[2]")
            .unwrap();
        assert_eq!(row.sense, Sense::Eq);
        assert_eq!(row.terms, vec![(cap.at(&[0, 2]), 1.0), (cap.at(&[2, 2]), -1.0)]);
    }
}
