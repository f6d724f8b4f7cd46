//! Closed loop driver
//!
//! Runs the feedback, apply, advance cycle from an initial state until the
//! end of the reference, recording one sample per completed step.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use state::*;

use thiserror::Error;

use crate::rti::SolverError;
use crate::sim::SimError;
use crate::vehicle::{Control, State};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One realised step of the closed loop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    /// Time at which `state` was reached
    pub time_s: f64,

    /// State at the end of the step
    pub state: State,

    /// Control applied over the step
    pub control: Control
}

/// Summary of a completed run.
#[derive(Debug, Clone, Copy)]
pub struct RunSummary {
    pub num_steps: usize,
    pub final_time_s: f64,
    pub final_state: State,

    /// Steps whose solve reached the KKT tolerance
    pub num_converged: usize,

    pub max_kkt_residual: f64,
    pub total_solve_time_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Execution mode of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Not yet initialised
    Idle,

    /// Initialised, steps remain
    Running,

    /// All steps completed
    Finished,

    /// A step failed, no further steps will run
    Halted
}

/// Errors raised by the driver.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("The initial state {0:?} violates the path bounds")]
    Initialisation(State),

    #[error("Computing the feedback for step {step} at t = {time_s:.3} s failed: {source}")]
    Solver {
        step: usize,
        time_s: f64,
        source: SolverError
    },

    #[error("Advancing the process for step {step} at t = {time_s:.3} s failed: {source}")]
    Process {
        step: usize,
        time_s: f64,
        source: SimError
    },

    #[error("The driver hasn't been initialised")]
    NotInitialised,

    #[error("The run has ended ({0:?}), reinitialise to start again")]
    RunEnded(Mode)
}
