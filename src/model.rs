//! The model orchestrator.
//!
//! An [`OptimisationModel`] compiles a network snapshot into a linear problem, hands it to a
//! solver backend and keeps the results of the last optimal solve.
use crate::config::RunConfig;
use crate::constraints::{BuildContext, add_constraints};
use crate::index::Indices;
use crate::network::Network;
use crate::objective::set_objective;
use crate::parameters::Parameters;
use crate::results::Results;
use crate::solver::{
    OptimisationStatus, Problem, SolveOptions, SolverBackend, backend_for, write_lp,
    write_solution,
};
use crate::variables::Variables;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::error::Error;
use std::fmt;
use std::path::Path;

/// Name of the LP file written when a problem turns out to be infeasible
const INFEASIBLE_PROBLEM_FILE_NAME: &str = "infeasible_problem.lp";

/// How far a model has progressed
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum ModelStage {
    /// Nothing has been built
    Empty,
    /// Index spaces have been built
    IndicesBuilt,
    /// Parameters have been preprocessed
    ParametersBuilt,
    /// Variables have been allocated
    VariablesBuilt,
    /// Constraints have been added
    ConstraintsBuilt,
    /// The objective has been set and the model is ready to be optimised
    ObjectiveSet,
    /// The model has been optimised
    #[display("Solved ({_0})")]
    Solved(OptimisationStatus),
}

/// Errors reported by [`OptimisationModel`]
#[derive(Debug, Clone, PartialEq)]
pub enum ModelError {
    /// The model must be built before it can be optimised
    NotBuilt,
    /// No optimal solution is available; holds the status of the last solve, if any
    NoResults(Option<OptimisationStatus>),
    /// The solver backend failed
    Backend(String),
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::NotBuilt => write!(f, "The model has not been built"),
            ModelError::NoResults(None) => write!(f, "The model has not been optimised"),
            ModelError::NoResults(Some(status)) => {
                write!(f, "No results available: optimisation status is {status}")
            }
            ModelError::Backend(message) => write!(f, "Solver backend failed: {message}"),
        }
    }
}

impl Error for ModelError {}

/// Everything built from one network and configuration
struct CompiledModel {
    config: RunConfig,
    indices: Indices,
    parameters: Parameters,
    variables: Variables,
    problem: Problem,
}

/// A capacity-expansion model of one network
pub struct OptimisationModel {
    stage: ModelStage,
    compiled: Option<CompiledModel>,
    results: Option<Results>,
}

impl Default for OptimisationModel {
    fn default() -> Self {
        Self::new()
    }
}

impl OptimisationModel {
    /// Create an empty model
    pub fn new() -> Self {
        Self {
            stage: ModelStage::Empty,
            compiled: None,
            results: None,
        }
    }

    /// The stage the model has reached
    pub fn stage(&self) -> ModelStage {
        self.stage
    }

    /// The compiled problem, if the model has been built
    pub fn problem(&self) -> Option<&Problem> {
        self.compiled.as_ref().map(|compiled| &compiled.problem)
    }

    /// The index spaces, if the model has been built
    pub fn indices(&self) -> Option<&Indices> {
        self.compiled.as_ref().map(|compiled| &compiled.indices)
    }

    /// The variables, if the model has been built
    pub fn variables(&self) -> Option<&Variables> {
        self.compiled.as_ref().map(|compiled| &compiled.variables)
    }

    /// Compile a network into a linear problem.
    ///
    /// Every stage is built before anything is stored, so if any stage fails the model is left
    /// exactly as it was.
    ///
    /// # Arguments
    ///
    /// * `network` - The network to model
    /// * `config` - Configuration of the run
    pub fn build(&mut self, network: &Network, config: &RunConfig) -> Result<()> {
        config.validate().context("Invalid run configuration")?;
        info!("Building model");

        let indices = Indices::new(network, config).context("Failed to build indices")?;
        debug!("Model stage: {}", ModelStage::IndicesBuilt);

        let parameters = Parameters::new(network, &indices, config)
            .context("Failed to build parameters")?;
        debug!("Model stage: {}", ModelStage::ParametersBuilt);

        let mut problem = Problem::new();
        let variables = Variables::new(&mut problem, &indices, &parameters)
            .context("Failed to allocate variables")?;
        debug!(
            "Model stage: {} ({} columns)",
            ModelStage::VariablesBuilt,
            problem.num_columns()
        );

        let ctx = BuildContext {
            indices: &indices,
            parameters: &parameters,
            variables: &variables,
        };
        add_constraints(&ctx, &mut problem)?;
        debug!(
            "Model stage: {} ({} rows)",
            ModelStage::ConstraintsBuilt,
            problem.num_rows()
        );

        set_objective(&ctx, &mut problem);
        info!(
            "Model built with {} columns and {} rows",
            problem.num_columns(),
            problem.num_rows()
        );

        self.compiled = Some(CompiledModel {
            config: config.clone(),
            indices,
            parameters,
            variables,
            problem,
        });
        self.results = None;
        self.stage = ModelStage::ObjectiveSet;
        Ok(())
    }

    /// Optimise the model with the given backend.
    ///
    /// Results of any earlier solve are discarded first, and new results are only kept if the
    /// solution is optimal. If the problem may be infeasible and a diagnostics directory is
    /// configured, the problem is written there in LP format.
    ///
    /// # Returns
    ///
    /// The status reported by the backend.
    pub fn optimise(&mut self, backend: &dyn SolverBackend) -> Result<OptimisationStatus> {
        if !matches!(self.stage, ModelStage::ObjectiveSet | ModelStage::Solved(_)) {
            return Err(ModelError::NotBuilt.into());
        }
        let compiled = self.compiled.as_ref().ok_or(ModelError::NotBuilt)?;
        self.results = None;
        self.stage = ModelStage::ObjectiveSet;

        info!("Optimising with {}", backend.name());
        let options = SolveOptions {
            settings: compiled.config.settings_for_solver(backend.name()),
            log_file: compiled.config.opt_logs_dump_path.clone(),
        };
        let solution = backend
            .solve(&compiled.problem, &options)
            .map_err(|err| ModelError::Backend(format!("{err:#}")))?;
        let status = solution.status;
        self.stage = ModelStage::Solved(status);

        if let Some(file_path) = &compiled.config.sol_dump_path {
            write_solution(&compiled.problem, &solution, file_path)?;
            debug!("Solution written to {}", file_path.display());
        }

        if status == OptimisationStatus::Optimal {
            info!("Optimal solution found: objective is {}", solution.objective_value);
            let tolerance = compiled.parameters.scenario.numeric_tolerance;
            let violated = compiled
                .problem
                .rows()
                .iter()
                .filter(|row| !row.is_satisfied(&solution.columns, tolerance))
                .count();
            if violated > 0 {
                warn!("{violated} constraints are violated by more than {tolerance}");
            }
            self.results = Some(Results::new(
                &compiled.indices,
                &compiled.variables,
                &solution,
            ));
            return Ok(status);
        }

        warn!("Optimisation finished with status {status}");
        if let (
            OptimisationStatus::Infeasible | OptimisationStatus::InfeasibleOrUnbounded,
            Some(dir),
        ) = (status, &compiled.config.diagnostics_dir)
        {
            let file_path = dir.join(INFEASIBLE_PROBLEM_FILE_NAME);
            write_lp(&compiled.problem, &file_path)?;
            warn!(
                "Infeasible problem written to {}. Computing an irreducible infeasible subset is \
                not supported by the {} backend",
                file_path.display(),
                backend.name()
            );
        }

        Ok(status)
    }

    /// Optimise the model with the backend named in its run configuration
    pub fn optimise_with_configured_backend(&mut self) -> Result<OptimisationStatus> {
        let compiled = self.compiled.as_ref().ok_or(ModelError::NotBuilt)?;
        let backend = backend_for(&compiled.config.solver_name)?;
        self.optimise(backend.as_ref())
    }

    /// The results of the last solve.
    ///
    /// An error is returned unless the last solve found an optimal solution.
    pub fn results(&self) -> Result<&Results, ModelError> {
        self.results.as_ref().ok_or(match self.stage {
            ModelStage::Solved(status) => ModelError::NoResults(Some(status)),
            _ => ModelError::NoResults(None),
        })
    }

    /// Write the compiled problem to a file in LP format
    pub fn write_problem(&self, file_path: &Path) -> Result<()> {
        let compiled = self.compiled.as_ref().ok_or(ModelError::NotBuilt)?;
        write_lp(&compiled.problem, file_path)
    }
}
