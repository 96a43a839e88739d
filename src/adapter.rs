use crate::model::LinearProgram;
use crate::solver::{self, HighsModelStatus, HighsStatus};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum SolverError {
    #[error("HiGHS refused the problem while {stage}: {status:?}")]
    Refused {
        stage: &'static str,
        status: HighsStatus,
    },
}

/// The discrete outcome of a solve, reported without further interpretation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveStatus {
    Optimal,
    Infeasible,
    Unbounded,
    Error,
}

impl From<HighsModelStatus> for SolveStatus {
    fn from(status: HighsModelStatus) -> Self {
        match status {
            HighsModelStatus::Optimal => SolveStatus::Optimal,
            HighsModelStatus::Infeasible => SolveStatus::Infeasible,
            HighsModelStatus::Unbounded
            | HighsModelStatus::UnboundedOrInfeasible => SolveStatus::Unbounded,
            _ => SolveStatus::Error,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    pub objective: f64,
    /// One value per program column, in column order.
    pub values: Vec<f64>,
}

impl SolveOutcome {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

pub trait SolverAdapter {
    fn solve(&self, program: &LinearProgram) -> Result<SolveOutcome, SolverError>;
}

/// Hands the program to HiGHS in a single synchronous call.
#[derive(Debug, Clone)]
pub struct HighsAdapter {
    pub time_limit: f64,
    pub presolve: bool,
}

impl Default for HighsAdapter {
    fn default() -> Self {
        Self {
            time_limit: 300.0,
            presolve: true,
        }
    }
}

fn refused(stage: &'static str) -> impl Fn(HighsStatus) -> SolverError {
    move |status| SolverError::Refused { stage, status }
}

impl HighsAdapter {
    pub fn new(time_limit: f64) -> Self {
        Self {
            time_limit,
            ..Self::default()
        }
    }

    fn set_default_solver_options(&self, model: &mut solver::Model, is_mip: bool) -> Result<(), SolverError> {
        let options = refused("setting options");
        model
            .set_option("presolve", if self.presolve { "on" } else { "off" })
            .map_err(&options)?;
        // forcing simplex on a MIP would only solve its relaxation
        if !is_mip {
            model.set_option("solver", "simplex").map_err(&options)?;
        }
        model.set_option("parallel", "off").map_err(&options)?;
        model.set_option("threads", 1).map_err(&options)?;
        model
            .set_option("primal_feasibility_tolerance", 1e-7)
            .map_err(&options)?;
        model
            .set_option("dual_feasibility_tolerance", 1e-7)
            .map_err(&options)?;
        model.set_option("time_limit", self.time_limit).map_err(&options)?;
        Ok(())
    }
}

fn to_problem(program: &LinearProgram) -> Result<solver::Problem, SolverError> {
    let mut pb = solver::Problem::new();
    for column in program.columns() {
        pb.add_column(column.cost, column.lower..=column.upper, column.integer);
    }
    for row in program.rows() {
        pb.add_row(row.lower..=row.upper, &row.factors)
            .map_err(refused("adding rows"))?;
    }
    pb.offset = program.offset;
    Ok(pb)
}

impl SolverAdapter for HighsAdapter {
    fn solve(&self, program: &LinearProgram) -> Result<SolveOutcome, SolverError> {
        let pb = to_problem(program)?;
        let is_mip = pb.is_mip();
        let mut model = pb.try_optimise(program.sense).map_err(refused("loading"))?;
        self.set_default_solver_options(&mut model, is_mip)?;

        if model.try_solve().is_err() {
            return Ok(SolveOutcome {
                status: SolveStatus::Error,
                objective: f64::NAN,
                values: vec![],
            });
        }
        let status = SolveStatus::from(model.status());
        let (objective, values) = match status {
            SolveStatus::Optimal => (model.get_objective_value(), model.get_column_values()),
            _ => (f64::NAN, vec![]),
        };
        Ok(SolveOutcome {
            status,
            objective,
            values,
        })
    }
}
