//! Parameters structure for the vehicle model

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;
use std::f64::consts::PI;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the kinematic vehicle model.
///
/// All bounds are `[min, max]` pairs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Params {

    // ---- GEOMETRY ----

    /// Distance between the front and rear axles.
    ///
    /// Units: meters
    pub wheelbase_m: f64,

    // ---- STATE BOUNDS ----

    /// Units: meters
    pub x_bounds_m: [f64; 2],

    /// Units: meters
    pub y_bounds_m: [f64; 2],

    /// Units: radians
    pub heading_bounds_rad: [f64; 2],

    // ---- CONTROL BOUNDS ----

    /// Units: meters/second
    pub speed_bounds_ms: [f64; 2],

    /// Units: radians
    pub steer_bounds_rad: [f64; 2]
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            wheelbase_m: 10.0,
            x_bounds_m: [0.0, 200.0],
            y_bounds_m: [0.0, 200.0],
            heading_bounds_rad: [-PI, PI],
            speed_bounds_ms: [-10.0, 10.0],
            steer_bounds_rad: [-PI / 3.0, PI / 3.0]
        }
    }
}
