//! Parameters structure for the optimal control problem

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters of the tracking problem.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Number of shooting intervals in the horizon.
    pub horizon_intervals: usize,

    /// Diagonal of the stage weight matrix, applied to the residual
    /// `[x, y, heading, speed, steer]`.
    pub stage_weights: [f64; 5],

    /// Diagonal of the terminal weight matrix on `[x, y, heading]`. When
    /// absent the problem has no terminal cost.
    pub terminal_weights: Option<[f64; 3]>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            horizon_intervals: 25,
            stage_weights: [1.0, 1.0, 0.7, 1e-6, 1e-6],
            terminal_weights: None
        }
    }
}
