//! State validity checking
//!
//! The planner that produces reference paths decides which states are
//! admissible. This module gives that decision an interface so references
//! can be audited against the environment they were planned in.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::vehicle::{Params as VehicleParams, State};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A predicate over states plus a distance-like margin.
pub trait StateValidityChecker {
    /// Whether the state is admissible.
    fn is_valid(&self, state: &State) -> bool;

    /// Distance from the state to the nearest inadmissible region. Negative
    /// when the state is itself invalid.
    fn clearance(&self, state: &State) -> f64;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Validity checker for an obstacle free rectangular workspace.
#[derive(Debug, Clone)]
pub struct BoundsValidityChecker {
    x_bounds_m: [f64; 2],
    y_bounds_m: [f64; 2]
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl BoundsValidityChecker {
    pub fn new(x_bounds_m: [f64; 2], y_bounds_m: [f64; 2]) -> Self {
        Self { x_bounds_m, y_bounds_m }
    }

    /// Use the position bounds of the vehicle as the workspace.
    pub fn from_vehicle_params(params: &VehicleParams) -> Self {
        Self::new(params.x_bounds_m, params.y_bounds_m)
    }
}

impl StateValidityChecker for BoundsValidityChecker {
    fn is_valid(&self, state: &State) -> bool {
        self.clearance(state) >= 0.0
    }

    fn clearance(&self, state: &State) -> f64 {
        if !state.iter().all(|v| v.is_finite()) {
            return f64::NEG_INFINITY
        }

        (state[0] - self.x_bounds_m[0])
            .min(self.x_bounds_m[1] - state[0])
            .min(state[1] - self.y_bounds_m[0])
            .min(self.y_bounds_m[1] - state[1])
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_bounds_checker() {
        let c = BoundsValidityChecker::from_vehicle_params(&VehicleParams::default());

        assert!(c.is_valid(&State::new(0.0, 0.0, 0.0)));
        assert!(c.is_valid(&State::new(100.0, 100.0, 10.0)));
        assert!(!c.is_valid(&State::new(100.0, 250.0, 0.0)));
        assert!(!c.is_valid(&State::new(f64::NAN, 10.0, 0.0)));

        assert_relative_eq!(c.clearance(&State::new(30.0, 50.0, 0.0)), 30.0);
        assert_relative_eq!(c.clearance(&State::new(100.0, 195.0, 0.0)), 5.0);
        assert_relative_eq!(c.clearance(&State::new(100.0, 250.0, 0.0)), -50.0);
    }
}
