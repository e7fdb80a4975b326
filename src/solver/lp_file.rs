//! Writing problems in the CPLEX LP text format, for diagnosing infeasible problems.
use super::{Problem, Variable};
use anyhow::{Context, Result};
use std::fmt::Write;
use std::fs;
use std::path::Path;

/// Maximum number of terms written on a single line
const TERMS_PER_LINE: usize = 8;

/// Make a name acceptable to LP-format readers
fn sanitise_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '[' => '(',
            ']' => ')',
            c if c.is_ascii_alphanumeric() || "!\"#$%&()/,.;?@_`'{}|~".contains(c) => c,
            _ => '_',
        })
        .collect()
}

/// Format a number, writing infinities the way LP readers expect
fn format_number(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{value}")
    }
}

/// Write a weighted sum of variables, wrapping long expressions over several lines
fn write_terms(out: &mut String, names: &[String], terms: &[(Variable, f64)]) -> Result<()> {
    if terms.is_empty() {
        // LP readers need at least one term per row
        if let Some(first) = names.first() {
            write!(out, " 0 {first}")?;
        }
        return Ok(());
    }

    for (i, (var, coeff)) in terms.iter().enumerate() {
        if i > 0 && i % TERMS_PER_LINE == 0 {
            write!(out, "\n   ")?;
        }
        let sign = if *coeff < 0.0 { '-' } else { '+' };
        write!(out, " {sign} {} {}", coeff.abs(), names[var.index()])?;
    }

    Ok(())
}

/// Render a problem in the CPLEX LP format
pub fn format_lp(problem: &Problem) -> Result<String> {
    let names: Vec<_> = problem
        .columns()
        .iter()
        .map(|column| sanitise_name(&column.name))
        .collect();

    let mut out = String::new();
    writeln!(out, "\\ Problem written by gridplan")?;
    writeln!(
        out,
        "\\ Objective constant: {}",
        format_number(problem.objective().offset())
    )?;
    writeln!(out, "Minimize")?;
    write!(out, " obj:")?;
    let costs: Vec<_> = problem
        .objective_coefficients()
        .into_iter()
        .enumerate()
        .filter(|(_, cost)| *cost != 0.0)
        .map(|(idx, cost)| (Variable(idx), cost))
        .collect();
    write_terms(&mut out, &names, &costs)?;
    writeln!(out)?;

    writeln!(out, "Subject To")?;
    for row in problem.rows() {
        write!(out, " {}:", sanitise_name(&row.name))?;
        write_terms(&mut out, &names, &row.terms)?;
        writeln!(out, " {} {}", row.sense, format_number(row.rhs))?;
    }

    writeln!(out, "Bounds")?;
    for (column, name) in problem.columns().iter().zip(&names) {
        writeln!(
            out,
            " {} <= {name} <= {}",
            format_number(column.lower),
            format_number(column.upper)
        )?;
    }
    if problem.is_mixed_integer() {
        writeln!(out, "Generals")?;
        for (_, name) in problem
            .columns()
            .iter()
            .zip(&names)
            .filter(|(column, _)| column.integer)
        {
            writeln!(out, " {name}")?;
        }
    }
    writeln!(out, "End")?;

    Ok(out)
}

/// Write a problem to a file in the CPLEX LP format
pub fn write_lp(problem: &Problem, file_path: &Path) -> Result<()> {
    let contents = format_lp(problem)?;
    fs::write(file_path, contents)
        .with_context(|| format!("Could not write problem to {}", file_path.display()))
}
