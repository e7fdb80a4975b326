//! Writing raw solutions as plain text, one column per line.
use super::{Problem, RawSolution};
use anyhow::{Context, Result, ensure};
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Render a solution of a problem as text.
///
/// The header records the status and objective value. Column values follow as `name value` pairs
/// in column order; a solution without values has no such lines.
pub fn format_solution(problem: &Problem, solution: &RawSolution) -> Result<String> {
    ensure!(
        solution.columns.is_empty() || solution.columns.len() == problem.num_columns(),
        "Solution has {} values, but the problem has {} columns",
        solution.columns.len(),
        problem.num_columns()
    );

    let mut out = String::new();
    writeln!(out, "# Solution written by gridplan")?;
    writeln!(out, "# Status: {}", solution.status)?;
    writeln!(out, "# Objective value: {}", solution.objective_value)?;
    for (column, value) in problem.columns().iter().zip(&solution.columns) {
        writeln!(out, "{} {value}", column.name)?;
    }

    Ok(out)
}

/// Write a solution to a text file
pub fn write_solution(problem: &Problem, solution: &RawSolution, file_path: &Path) -> Result<()> {
    let contents = format_solution(problem, solution)?;
    fs::write(file_path, contents)
        .with_context(|| format!("Could not write solution to {}", file_path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::OptimisationStatus;
    use tempfile::tempdir;

    fn problem() -> Problem {
        let mut problem = Problem::new();
        problem.add_variable("G_CAP[0,0]".into(), 0.0, 1.0).unwrap();
        problem.add_variable("B_ENS[0,0,0]".into(), 0.0, 1.0).unwrap();
        problem
    }

    #[test]
    fn test_format_solution() {
        let solution = RawSolution {
            status: OptimisationStatus::Optimal,
            objective_value: 2.5,
            columns: vec![1.0, 0.25],
        };
        assert_eq!(
            format_solution(&problem(), &solution).unwrap(),
            "# Solution written by gridplan\n# Status: Optimal\n# Objective value: 2.5\n\
            G_CAP[0,0] 1\nB_ENS[0,0,0] 0.25\n"
        );
    }

    #[test]
    fn test_format_solution_without_values() {
        let solution = RawSolution {
            status: OptimisationStatus::Infeasible,
            objective_value: f64::NAN,
            columns: Vec::new(),
        };
        let text = format_solution(&problem(), &solution).unwrap();
        assert!(text.ends_with("# Status: Infeasible\n# Objective value: NaN\n"));
    }

    #[test]
    fn test_format_solution_wrong_length() {
        let solution = RawSolution {
            status: OptimisationStatus::Optimal,
            objective_value: 0.0,
            columns: vec![1.0],
        };
        assert!(format_solution(&problem(), &solution).is_err());
    }

    #[test]
    fn test_write_solution() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("solution.txt");
        let solution = RawSolution {
            status: OptimisationStatus::Optimal,
            objective_value: 0.0,
            columns: vec![0.0, 0.0],
        };
        write_solution(&problem(), &solution, &file_path).unwrap();
        assert!(
            fs::read_to_string(file_path)
                .unwrap()
                .contains("B_ENS[0,0,0] 0\n")
        );
    }
}
