//! Hour-to-hour ramping limits of generators.
use super::BuildContext;
use crate::solver::{Problem, Sense};
use anyhow::Result;
use itertools::iproduct;

/// Bound the change in brutto generation between consecutive hours of a year by a fraction of
/// capacity. Up and down limits apply independently, each only when its rate is set.
pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = ctx.parameters;
    let vars = ctx.variables;
    let indices = ctx.indices;

    for (g, name) in indices.generators.iter() {
        let tgen = params.generators.tgen[g];
        let limits = [
            (params.generator_types.ramp_up[tgen], "RAMP_UP", 1.0),
            (params.generator_types.ramp_down[tgen], "RAMP_DOWN", -1.0),
        ];

        for (rate, suffix, direction) in limits {
            let Some(rate) = rate else {
                continue;
            };
            for (h, y) in iproduct!(1..indices.hours.len(), indices.years.ord()) {
                let change = vars.g_gen.at(&[g, h, y]) - vars.g_gen.at(&[g, h - 1, y]);
                problem.add_constraint(
                    format!("{name}_{suffix}_CONSTRAINT[{h},{y}]"),
                    change * direction,
                    Sense::Le,
                    vars.g_capacity.cap.at(&[g, y]) * rate,
                )?;
            }
        }
    }

    Ok(())
}
