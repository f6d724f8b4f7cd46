//! Parameters structure for the process simulator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the adaptive integrator used as the plant.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- TOLERANCES ----

    /// Relative error tolerance per step.
    pub rel_tolerance: f64,

    /// Absolute error tolerance per step.
    pub abs_tolerance: f64,

    // ---- STEP CONTROL ----

    /// First trial step size.
    ///
    /// Units: seconds
    pub initial_step_s: f64,

    // ---- PLANT ----

    /// Wheelbase of the simulated plant, if it differs from the model's.
    ///
    /// Units: meters
    pub wheelbase_m: Option<f64>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            rel_tolerance: 1e-8,
            abs_tolerance: 1e-10,
            initial_step_s: 0.01,
            wheelbase_m: None
        }
    }
}
