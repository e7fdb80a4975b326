//! The constraint builders.
//!
//! Each physical or policy subsystem has its own builder. Builders only read the indices,
//! parameters and variables of the model and append named rows to the problem; they never call
//! each other. Bounds which are unset in the input are skipped rather than applied as zero.
use crate::index::Indices;
use crate::parameters::Parameters;
use crate::solver::Problem;
use crate::variables::Variables;
use anyhow::{Context, Result};
use log::{debug, info};

mod balancing;
mod capacity_binding;
mod capacity_bounds;
mod capacity_evolution;
mod fraction;
mod generation;
mod generation_fraction;
mod line_flow;
mod ramp;
mod scenario;
mod storage;

/// Everything a builder may read
#[derive(Clone, Copy)]
pub struct BuildContext<'a> {
    /// Index spaces of the model
    pub indices: &'a Indices,
    /// Parameter tables of the model
    pub parameters: &'a Parameters,
    /// Variables of the model
    pub variables: &'a Variables,
}

/// A function adding one family of constraints to the problem
type Builder = fn(&BuildContext, &mut Problem) -> Result<()>;

/// Every builder, in the order in which it runs
const BUILDERS: [(&str, Builder); 11] = [
    ("scenario", scenario::build),
    ("balancing", balancing::build),
    ("fraction", fraction::build),
    ("line flow", line_flow::build),
    ("generation", generation::build),
    ("storage", storage::build),
    ("ramp", ramp::build),
    ("capacity evolution", capacity_evolution::build),
    ("capacity binding", capacity_binding::build),
    ("capacity bounds", capacity_bounds::build),
    ("generation fraction", generation_fraction::build),
];

/// Add every constraint of the model to the problem
pub fn add_constraints(ctx: &BuildContext, problem: &mut Problem) -> Result<()> {
    info!("Building constraints");
    for (name, build) in BUILDERS {
        let rows_before = problem.num_rows();
        build(ctx, problem).with_context(|| format!("Failed to build {name} constraints"))?;
        debug!(
            "Added {} {name} constraints",
            problem.num_rows() - rows_before
        );
    }
    info!("Built {} constraints", problem.num_rows());

    Ok(())
}
