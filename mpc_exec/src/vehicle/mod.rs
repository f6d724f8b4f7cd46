//! Kinematic vehicle model
//!
//! A rigid single-track (bicycle) model driven by a speed and a steering
//! angle:
//!
//! ```text
//! dx/dt     = v cos(theta)
//! dy/dt     = v sin(theta)
//! dtheta/dt = v tan(delta) / L
//! ```
//!
//! The model is pure function evaluation. Bounds are exposed for the optimal
//! control problem to consume, the model never enforces them itself.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod model;
mod params;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use model::*;
pub use params::*;

use nalgebra::{Vector2, Vector3};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of elements in a state, `[x_m, y_m, heading_rad]`.
pub const STATE_DIM: usize = 3;

/// Number of elements in a control, `[speed_ms, steer_rad]`.
pub const CONTROL_DIM: usize = 2;

/// Index of the heading in a state vector.
pub const HEADING_IDX: usize = 2;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Planar pose of the vehicle, `[x_m, y_m, heading_rad]`.
///
/// The heading is an angle and only meaningful modulo 2pi.
pub type State = Vector3<f64>;

/// Control applied to the vehicle, `[speed_ms, steer_rad]`.
pub type Control = Vector2<f64>;
