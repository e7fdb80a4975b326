//! The HiGHS solver backend.
use super::{OptimisationStatus, Problem, RawSolution, SolveOptions, SolverBackend};
use anyhow::{Context, Result, anyhow, bail};
use highs::{HighsModelStatus, RowProblem, Sense};
use log::debug;

/// Solves problems with the HiGHS solver
#[derive(Debug, Clone, Copy, Default)]
pub struct HighsBackend;

/// Apply a single user-provided option to the HiGHS model
fn apply_option(model: &mut highs::Model, name: &str, value: &toml::Value) -> Result<()> {
    match value {
        toml::Value::Boolean(value) => model.set_option(name, *value),
        toml::Value::Integer(value) => {
            let value = i32::try_from(*value)
                .with_context(|| format!("Value for solver option {name} is out of range"))?;
            model.set_option(name, value);
        }
        toml::Value::Float(value) => model.set_option(name, *value),
        toml::Value::String(value) => model.set_option(name, value.as_str()),
        _ => bail!("Unsupported value for solver option {name}: {value}"),
    }

    Ok(())
}

/// Convert the status reported by HiGHS
fn convert_status(status: HighsModelStatus) -> OptimisationStatus {
    match status {
        // A problem without rows has its optimum at the column bounds, which HiGHS reports
        // without running a solver
        HighsModelStatus::Optimal | HighsModelStatus::ModelEmpty => OptimisationStatus::Optimal,
        HighsModelStatus::Infeasible => OptimisationStatus::Infeasible,
        HighsModelStatus::UnboundedOrInfeasible => OptimisationStatus::InfeasibleOrUnbounded,
        HighsModelStatus::Unbounded => OptimisationStatus::Unbounded,
        _ => OptimisationStatus::Unknown,
    }
}

impl SolverBackend for HighsBackend {
    fn name(&self) -> &str {
        "highs"
    }

    fn solve(&self, problem: &Problem, options: &SolveOptions) -> Result<RawSolution> {
        let costs = problem.objective_coefficients();
        let mut highs_problem = RowProblem::default();
        let cols: Vec<_> = problem
            .columns()
            .iter()
            .zip(costs)
            .map(|(column, cost)| {
                highs_problem.add_column_with_integrality(
                    cost,
                    column.lower..=column.upper,
                    column.integer,
                )
            })
            .collect();
        for row in problem.rows() {
            let (lower, upper) = row.bounds();
            highs_problem.add_row(
                lower..=upper,
                row.terms
                    .iter()
                    .map(|(var, coeff)| (cols[var.index()], *coeff)),
            );
        }

        let mut model = highs_problem.optimise(Sense::Minimise);

        // Solver output doesn't go through our logger, so it is off unless requested
        model.set_option("output_flag", false);
        if let Some(log_file) = &options.log_file {
            let path = log_file
                .to_str()
                .with_context(|| format!("Invalid log file path {}", log_file.display()))?;
            model.set_option("output_flag", true);
            model.set_option("log_to_console", false);
            model.set_option("log_file", path);
        }
        for (name, value) in &options.settings {
            apply_option(&mut model, name, value)?;
        }

        debug!(
            "Solving problem with {} columns and {} rows",
            problem.num_columns(),
            problem.num_rows()
        );
        let solved = model
            .try_solve()
            .map_err(|status| anyhow!("HiGHS failed to solve the problem: {status:?}"))?;
        let status = convert_status(solved.status());
        debug!("HiGHS finished with status {:?}", solved.status());

        if status != OptimisationStatus::Optimal {
            return Ok(RawSolution {
                status,
                objective_value: f64::NAN,
                columns: Vec::new(),
            });
        }

        let columns = solved.get_solution().columns().to_vec();
        Ok(RawSolution {
            status,
            objective_value: problem.objective().evaluate(&columns),
            columns,
        })
    }
}
