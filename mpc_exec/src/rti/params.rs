//! Parameters structure for the real-time iteration solver

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the real-time iteration solver.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- ITERATION ----

    /// Maximum number of Gauss-Newton iterations per control step.
    pub max_iterations: usize,

    /// Iterations stop once the KKT residual falls below this value.
    pub kkt_tolerance: f64,

    /// Fixed Levenberg-Marquardt damping added to the Gauss-Newton Hessian.
    pub levenberg_marquardt: f64,

    // ---- DISCRETISATION ----

    /// Number of RK4 steps per shooting interval.
    pub integrator_steps: usize,

    // ---- CONSTRAINTS ----

    /// Slack allowed when checking the measured state against the path
    /// bounds.
    ///
    /// Units: same as the state
    pub feasibility_tolerance: f64,

    /// Wrap the measured heading into (-pi, pi] before solving.
    pub wrap_heading: bool,

    // ---- QP ----

    /// Iteration limit of the interior point QP solver.
    pub max_qp_iterations: u32
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            kkt_tolerance: 1e-8,
            levenberg_marquardt: 1e-4,
            integrator_steps: 2,
            feasibility_tolerance: 1e-6,
            wrap_heading: true,
            max_qp_iterations: 200
        }
    }
}
