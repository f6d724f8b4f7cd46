//! # Receding horizon tracking library.
//!
//! This library holds everything the tracking executable runs, so that it can
//! also be exercised by tests and benchmarks.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

/// Closed loop driver - runs feedback, apply and advance until the end of the reference
pub mod driver;

/// Optimal control problem - the per-step tracking problem over the horizon
pub mod ocp;

/// Output files for the realised state and control trajectories
pub mod output;

/// Executable level parameters
pub mod params;

/// Reference trajectory - waypoints with time stamps and interpolation
pub mod reference;

/// Real-time iteration solver - produces one feedback control per call
pub mod rti;

/// Process simulator - adaptive integration of the plant
pub mod sim;

/// Vehicle model - kinematic bicycle dynamics and bounds
pub mod vehicle;
