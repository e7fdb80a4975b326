//! Bounds on the share of tagged generation coming from a subset of units.
use super::BuildContext;
use crate::expression::tagged_generation;
use crate::network::FractionType;
use crate::solver::{LinExpr, Problem, Sense};
use anyhow::Result;

/// Generation of the units with a tag in an hour, or over the whole year if `h` is `None`
fn generation(ctx: &BuildContext, tag: usize, et: usize, h: Option<usize>, y: usize) -> LinExpr {
    match h {
        Some(h) => tagged_generation(ctx, tag, et, h, y),
        None => ctx
            .indices
            .hours
            .ord()
            .map(|h| tagged_generation(ctx, tag, et, h, y))
            .sum(),
    }
}

/// Bound generation of the units carrying the sub-tag by a fraction of generation of the units
/// carrying the tag, for every year in which a bound is set
pub fn build(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    let params = &ctx.parameters.generation_fractions;
    let indices = ctx.indices;

    for (idx, name) in indices.generation_fractions.iter() {
        let (tag, sub_tag, et) = (params.tag[idx], params.sub_tag[idx], params.et[idx]);
        let hours: Vec<Option<usize>> = match params.fraction_type[idx] {
            FractionType::Hourly => indices.hours.ord().map(Some).collect(),
            FractionType::Yearly => vec![None],
        };
        let bounds = [
            ("MIN", Sense::Ge, &params.min_generation_fraction[idx]),
            ("MAX", Sense::Le, &params.max_generation_fraction[idx]),
        ];

        for (kind, sense, fractions) in bounds {
            for (y, fraction) in fractions.iter().enumerate() {
                let Some(fraction) = *fraction else {
                    continue;
                };
                for &h in &hours {
                    let row_name = match h {
                        Some(h) => format!("{name}_{kind}_GENERATION_FRACTION_CONSTRAINT[{h},{y}]"),
                        None => format!("{name}_{kind}_GENERATION_FRACTION_CONSTRAINT[{y}]"),
                    };
                    problem.add_constraint(
                        row_name,
                        generation(ctx, sub_tag, et, h, y),
                        sense,
                        generation(ctx, tag, et, h, y) * fraction,
                    )?;
                }
            }
        }
    }

    Ok(())
}
