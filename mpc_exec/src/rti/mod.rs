//! Real-time iteration solver
//!
//! Each call to [`RtiSolver::compute_feedback`] solves the tracking problem
//! over the horizon by multiple shooting. The decision vector interleaves
//! node states and interval controls,
//!
//! ```text
//! z = [s_0, u_0, s_1, u_1, ..., s_{N-1}, u_{N-1}, s_N]
//! ```
//!
//! and a small fixed number of Gauss-Newton iterations are run, each solving
//! one convex QP for the step in `z`. Only the first control is returned, the
//! rest of the solution warm starts the next call.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod qp;
mod shooting;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use params::*;
pub use shooting::*;
pub use state::*;

use serde::Serialize;
use thiserror::Error;

use crate::ocp::OcpError;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Summary of one control step's solve.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SolveReport {
    /// Start of the horizon window
    pub time_s: f64,

    /// Gauss-Newton iterations performed
    pub iterations: usize,

    /// Whether the KKT residual fell below the tolerance
    pub converged: bool,

    pub kkt_residual: f64,

    /// Objective of the returned trajectory
    pub objective: f64,

    /// Worst QP status seen across the iterations
    pub qp_status: QpStatus,

    /// Total interior point iterations across all QPs
    pub qp_iterations: u32,

    /// Wall clock time spent in the solve
    pub solve_time_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Outcome of a QP subproblem which produced a usable step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum QpStatus {
    Solved,
    AlmostSolved,

    /// Stopped on an iteration, time or progress limit with a finite step
    Inaccurate
}

/// Errors raised by the solver.
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("The QP subproblem is infeasible: {0}")]
    InfeasibleQp(String),

    #[error("The QP solver failed: {0}")]
    QpFailure(String),

    #[error("Invalid solver parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Ocp(#[from] OcpError)
}
