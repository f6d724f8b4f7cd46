//! Optimal control problem formulation
//!
//! Each control step the tracking problem is snapshotted into an
//! [`OcpInstance`]: the measured state, the horizon grid and the reference
//! sliced onto that grid. The instance is immutable and owns everything the
//! solver needs to evaluate costs.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod instance;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use instance::*;
pub use params::*;

use thiserror::Error;

use crate::vehicle::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Uniform grid of `num_intervals + 1` nodes starting at `start_s`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizonGrid {
    start_s: f64,
    interval_s: f64,
    num_intervals: usize
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while building a problem instance.
#[derive(Debug, Error)]
pub enum OcpError {
    #[error("The horizon is infeasible: {0}")]
    InfeasibleHorizon(String),

    #[error("The initial state {0:?} violates the path bounds")]
    InitialStateOutOfBounds(State),

    #[error("Cost weights must be finite and non-negative, found {0:?}")]
    InvalidWeights(Vec<f64>)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl HorizonGrid {
    pub fn new(start_s: f64, interval_s: f64, num_intervals: usize) -> Result<Self, OcpError> {
        if num_intervals < 1 {
            return Err(OcpError::InfeasibleHorizon(
                "at least one shooting interval is required".into()
            ))
        }

        if !(interval_s.is_finite() && interval_s > 0.0) {
            return Err(OcpError::InfeasibleHorizon(
                format!("the interval must be positive, found {}", interval_s)
            ))
        }

        if !start_s.is_finite() {
            return Err(OcpError::InfeasibleHorizon(
                format!("the start time must be finite, found {}", start_s)
            ))
        }

        Ok(Self {
            start_s,
            interval_s,
            num_intervals
        })
    }

    pub fn start_s(&self) -> f64 {
        self.start_s
    }

    pub fn interval_s(&self) -> f64 {
        self.interval_s
    }

    pub fn num_intervals(&self) -> usize {
        self.num_intervals
    }

    /// Number of nodes, one more than the number of intervals.
    pub fn num_nodes(&self) -> usize {
        self.num_intervals + 1
    }

    /// Time of node `k`.
    pub fn node_time(&self, k: usize) -> f64 {
        self.start_s + k as f64 * self.interval_s
    }
}
