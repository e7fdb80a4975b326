//! A backend-neutral linear problem and the interface to solver backends.
//!
//! Builders append named columns and rows to a [`Problem`]. The problem is only handed to a
//! concrete solver when it is complete, so column costs can be accumulated from several objective
//! terms.
use crate::config::SolverSettings;
use anyhow::{Result, bail};
use indexmap::{IndexMap, IndexSet};
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Neg, Sub, SubAssign};
use std::path::PathBuf;
use strum::Display;

mod highs;
mod lp_file;
mod solution_file;

pub use self::highs::HighsBackend;
pub use lp_file::{format_lp, write_lp};
pub use solution_file::{format_solution, write_solution};

/// Names of the available solver backends
pub const SOLVER_NAMES: &[&str] = &["highs"];

/// A decision variable in the problem.
///
/// Note that this type does **not** include the value of the variable; it just refers to a
/// particular column of the problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(usize);

impl Variable {
    /// The index of the variable's column
    pub fn index(self) -> usize {
        self.0
    }
}

/// A linear expression: a weighted sum of variables plus a constant
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinExpr {
    terms: Vec<(Variable, f64)>,
    constant: f64,
}

impl LinExpr {
    /// An empty expression, equal to zero
    pub fn new() -> Self {
        Self::default()
    }

    /// A single weighted variable
    pub fn term(var: Variable, coeff: f64) -> Self {
        Self {
            terms: vec![(var, coeff)],
            constant: 0.0,
        }
    }

    /// A constant expression
    pub fn constant(value: f64) -> Self {
        Self {
            terms: Vec::new(),
            constant: value,
        }
    }

    /// Add `coeff * var` to the expression
    pub fn add_term(&mut self, var: Variable, coeff: f64) {
        self.terms.push((var, coeff));
    }

    /// The constant part of the expression
    pub fn offset(&self) -> f64 {
        self.constant
    }

    /// The terms of the expression, as added (may contain repeated variables)
    pub fn terms(&self) -> &[(Variable, f64)] {
        &self.terms
    }

    /// Whether the expression contains no variables
    pub fn has_no_terms(&self) -> bool {
        self.terms.is_empty()
    }

    /// The terms with repeated variables merged and zero coefficients dropped, in first-seen order
    pub fn merged_terms(&self) -> Vec<(Variable, f64)> {
        let mut merged: IndexMap<Variable, f64> = IndexMap::new();
        for &(var, coeff) in &self.terms {
            *merged.entry(var).or_default() += coeff;
        }

        merged.into_iter().filter(|(_, coeff)| *coeff != 0.0).collect()
    }

    /// Evaluate the expression for the given column values
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.constant
            + self
                .terms
                .iter()
                .map(|(var, coeff)| coeff * values[var.index()])
                .sum::<f64>()
    }
}

impl From<Variable> for LinExpr {
    fn from(var: Variable) -> Self {
        LinExpr::term(var, 1.0)
    }
}

impl From<f64> for LinExpr {
    fn from(value: f64) -> Self {
        LinExpr::constant(value)
    }
}

impl<T: Into<LinExpr>> AddAssign<T> for LinExpr {
    fn add_assign(&mut self, rhs: T) {
        let rhs = rhs.into();
        self.terms.extend(rhs.terms);
        self.constant += rhs.constant;
    }
}

impl<T: Into<LinExpr>> SubAssign<T> for LinExpr {
    fn sub_assign(&mut self, rhs: T) {
        *self += -rhs.into();
    }
}

impl<T: Into<LinExpr>> Add<T> for LinExpr {
    type Output = LinExpr;

    fn add(mut self, rhs: T) -> LinExpr {
        self += rhs;
        self
    }
}

impl<T: Into<LinExpr>> Sub<T> for LinExpr {
    type Output = LinExpr;

    fn sub(mut self, rhs: T) -> LinExpr {
        self -= rhs;
        self
    }
}

impl Neg for LinExpr {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        self * -1.0
    }
}

impl Mul<f64> for LinExpr {
    type Output = LinExpr;

    fn mul(mut self, rhs: f64) -> LinExpr {
        for (_, coeff) in &mut self.terms {
            *coeff *= rhs;
        }
        self.constant *= rhs;
        self
    }
}

impl Mul<LinExpr> for f64 {
    type Output = LinExpr;

    fn mul(self, rhs: LinExpr) -> LinExpr {
        rhs * self
    }
}

impl<T: Into<LinExpr>> Add<T> for Variable {
    type Output = LinExpr;

    fn add(self, rhs: T) -> LinExpr {
        LinExpr::from(self) + rhs
    }
}

impl<T: Into<LinExpr>> Sub<T> for Variable {
    type Output = LinExpr;

    fn sub(self, rhs: T) -> LinExpr {
        LinExpr::from(self) - rhs
    }
}

impl Neg for Variable {
    type Output = LinExpr;

    fn neg(self) -> LinExpr {
        LinExpr::term(self, -1.0)
    }
}

impl Mul<f64> for Variable {
    type Output = LinExpr;

    fn mul(self, rhs: f64) -> LinExpr {
        LinExpr::term(self, rhs)
    }
}

impl Mul<Variable> for f64 {
    type Output = LinExpr;

    fn mul(self, rhs: Variable) -> LinExpr {
        LinExpr::term(rhs, self)
    }
}

impl<T: Into<LinExpr>> Sum<T> for LinExpr {
    fn sum<I: Iterator<Item = T>>(iter: I) -> Self {
        iter.fold(LinExpr::new(), |acc, item| acc + item)
    }
}

/// The relation imposed by a constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Sense {
    /// Left-hand side equals right-hand side
    #[strum(to_string = "=")]
    Eq,
    /// Left-hand side is at most the right-hand side
    #[strum(to_string = "<=")]
    Le,
    /// Left-hand side is at least the right-hand side
    #[strum(to_string = ">=")]
    Ge,
}

/// A named column of the problem
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Unique name
    pub name: String,
    /// Lower bound
    pub lower: f64,
    /// Upper bound (may be infinite)
    pub upper: f64,
    /// Whether the column may only take integer values
    pub integer: bool,
}

/// A named row of the problem, in the form `terms sense rhs`
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Unique name
    pub name: String,
    /// Variable terms, with repeated variables merged
    pub terms: Vec<(Variable, f64)>,
    /// The relation imposed
    pub sense: Sense,
    /// Right-hand side
    pub rhs: f64,
}

impl Row {
    /// The row's activity bounds, as `(lower, upper)`
    pub fn bounds(&self) -> (f64, f64) {
        match self.sense {
            Sense::Eq => (self.rhs, self.rhs),
            Sense::Le => (f64::NEG_INFINITY, self.rhs),
            Sense::Ge => (self.rhs, f64::INFINITY),
        }
    }

    /// Whether the row holds for the given column values, within `tolerance`
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let activity: f64 = self
            .terms
            .iter()
            .map(|(var, coeff)| coeff * values[var.index()])
            .sum();
        let (lower, upper) = self.bounds();
        activity >= lower - tolerance && activity <= upper + tolerance
    }
}

/// A linear minimisation problem with named columns and rows
#[derive(Debug, Clone, Default)]
pub struct Problem {
    columns: Vec<Column>,
    column_names: IndexSet<String>,
    rows: Vec<Row>,
    row_names: IndexSet<String>,
    objective: LinExpr,
}

impl Problem {
    /// Create an empty problem
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a column with the given bounds.
    ///
    /// # Arguments
    ///
    /// * `name` - Unique name of the column
    /// * `lower` - Lower bound
    /// * `upper` - Upper bound (may be infinite)
    pub fn add_variable(&mut self, name: String, lower: f64, upper: f64) -> Result<Variable> {
        self.push_column(Column {
            name,
            lower,
            upper,
            integer: false,
        })
    }

    /// Add a column which may only take integer values within the given bounds
    pub fn add_integer_variable(
        &mut self,
        name: String,
        lower: f64,
        upper: f64,
    ) -> Result<Variable> {
        self.push_column(Column {
            name,
            lower,
            upper,
            integer: true,
        })
    }

    fn push_column(&mut self, column: Column) -> Result<Variable> {
        if !self.column_names.insert(column.name.clone()) {
            bail!("Duplicate variable name {}", column.name);
        }
        self.columns.push(column);

        Ok(Variable(self.columns.len() - 1))
    }

    /// Whether any column is restricted to integer values
    pub fn is_mixed_integer(&self) -> bool {
        self.columns.iter().any(|column| column.integer)
    }

    /// Add the constraint `lhs sense rhs`.
    ///
    /// Constants on either side are moved to the right-hand side.
    pub fn add_constraint(
        &mut self,
        name: String,
        lhs: LinExpr,
        sense: Sense,
        rhs: LinExpr,
    ) -> Result<()> {
        if !self.row_names.insert(name.clone()) {
            bail!("Duplicate constraint name {name}");
        }
        let diff = lhs - rhs;
        self.rows.push(Row {
            name,
            terms: diff.merged_terms(),
            sense,
            rhs: -diff.offset(),
        });

        Ok(())
    }

    /// Add a term to the (minimised) objective
    pub fn add_objective(&mut self, expr: LinExpr) {
        self.objective += expr;
    }

    /// The columns of the problem, in index order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// The rows of the problem, in insertion order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// The accumulated objective
    pub fn objective(&self) -> &LinExpr {
        &self.objective
    }

    /// Number of columns
    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Look up a column by name
    pub fn variable(&self, name: &str) -> Option<Variable> {
        self.column_names.get_index_of(name).map(Variable)
    }

    /// Look up a row by name
    pub fn row(&self, name: &str) -> Option<&Row> {
        self.row_names.get_index_of(name).map(|idx| &self.rows[idx])
    }

    /// The objective coefficient of every column, in index order
    pub fn objective_coefficients(&self) -> Vec<f64> {
        let mut costs = vec![0.0; self.columns.len()];
        for &(var, coeff) in self.objective.terms() {
            costs[var.index()] += coeff;
        }

        costs
    }
}

/// The outcome of a solve, as reported by a backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum OptimisationStatus {
    /// An optimal solution was found
    Optimal,
    /// The problem has no feasible solution
    Infeasible,
    /// The objective is unbounded below
    Unbounded,
    /// The solver proved that the problem is either infeasible or unbounded, but not which
    InfeasibleOrUnbounded,
    /// The solver stopped without a conclusive result
    Unknown,
}

/// The raw solution returned by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct RawSolution {
    /// Terminal status of the solve
    pub status: OptimisationStatus,
    /// Objective value, including constant terms (only meaningful when optimal)
    pub objective_value: f64,
    /// Value of every column, in index order (empty unless optimal)
    pub columns: Vec<f64>,
}

/// Options for a single solve
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolveOptions {
    /// Options passed through to the backend
    pub settings: SolverSettings,
    /// File to write the solver's own log to
    pub log_file: Option<PathBuf>,
}

/// A solver which can minimise a [`Problem`]
pub trait SolverBackend {
    /// The name of the backend
    fn name(&self) -> &str;

    /// Minimise the problem.
    ///
    /// An error is returned only if the backend itself fails; infeasibility and similar outcomes
    /// are reported through [`RawSolution::status`].
    fn solve(&self, problem: &Problem, options: &SolveOptions) -> Result<RawSolution>;
}

/// Create the backend with the given name
pub fn backend_for(name: &str) -> Result<Box<dyn SolverBackend>> {
    match name {
        "highs" => Ok(Box::new(HighsBackend)),
        unknown => bail!(
            "Unknown solver {unknown}. Available solvers: {}",
            SOLVER_NAMES.join(", ")
        ),
    }
}
