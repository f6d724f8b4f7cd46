//! Reference trajectory
//!
//! An ordered sequence of waypoints with a uniform sampling interval. Waypoint
//! `i` is the target at time `i * sampling_interval_s`, queries between
//! waypoints are interpolated and queries outside the trajectory are clamped
//! to its ends.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod parse;
mod validity;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

pub use parse::*;
pub use validity::*;

use log::info;
use std::path::{Path, PathBuf};
use thiserror::Error;
use util::maths::{ang_interp, lin_interp};

use crate::vehicle::State;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A time parameterised reference trajectory.
#[derive(Debug, Clone)]
pub struct ReferenceTrajectory {
    waypoints: Vec<State>,
    sampling_interval_s: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while building a reference trajectory.
#[derive(Debug, Error)]
pub enum ReferenceError {
    #[error("Cannot load the reference file {0:?}: {1}")]
    FileLoadError(PathBuf, std::io::Error),

    #[error("Line {line} of the reference is malformed: {content:?}")]
    MalformedLine {
        line: usize,
        content: String
    },

    #[error("A reference needs at least 2 well formed waypoints, found {0}")]
    TooFewWaypoints(usize),

    #[error("The sampling interval must be positive and finite, found {0}")]
    InvalidSamplingInterval(f64)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ReferenceTrajectory {
    /// Build a trajectory from waypoints and the interval between them.
    pub fn new(waypoints: Vec<State>, sampling_interval_s: f64) -> Result<Self, ReferenceError> {
        if waypoints.len() < 2 {
            return Err(ReferenceError::TooFewWaypoints(waypoints.len()))
        }

        if !(sampling_interval_s.is_finite() && sampling_interval_s > 0.0) {
            return Err(ReferenceError::InvalidSamplingInterval(sampling_interval_s))
        }

        Ok(Self {
            waypoints,
            sampling_interval_s
        })
    }

    /// Build a trajectory whose waypoints are spread uniformly over
    /// `total_time_s`.
    pub fn from_waypoints_over(
        waypoints: Vec<State>, total_time_s: f64
    ) -> Result<Self, ReferenceError> {
        if waypoints.len() < 2 {
            return Err(ReferenceError::TooFewWaypoints(waypoints.len()))
        }

        let interval_s = total_time_s / ((waypoints.len() - 1) as f64);
        Self::new(waypoints, interval_s)
    }

    /// Parse a trajectory from the text of a waypoint file.
    pub fn from_text(text: &str, total_time_s: f64, mode: ParseMode) -> Result<Self, ReferenceError> {
        Self::from_waypoints_over(parse_waypoints(text, mode)?, total_time_s)
    }

    /// Load a trajectory from a waypoint file.
    pub fn from_file<P: AsRef<Path>>(
        path: P, total_time_s: f64, mode: ParseMode
    ) -> Result<Self, ReferenceError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| ReferenceError::FileLoadError(path.to_path_buf(), e))?;

        let traj = Self::from_text(&text, total_time_s, mode)?;

        info!(
            "Loaded reference {:?}: {} waypoints, {:.3} s apart, {:.3} s total",
            path, traj.len(), traj.sampling_interval_s, traj.total_duration()
        );

        Ok(traj)
    }

    /// Target state at time `time_s`.
    ///
    /// Position is interpolated linearly, heading along the shorter arc.
    /// Times outside `[0, total_duration]` return the first or last waypoint.
    pub fn value_at(&self, time_s: f64) -> State {
        let last = self.waypoints.len() - 1;

        if !(time_s > 0.0) {
            return self.waypoints[0]
        }
        if time_s >= self.total_duration() {
            return self.waypoints[last]
        }

        let pos = time_s / self.sampling_interval_s;
        let idx = (pos.floor() as usize).min(last - 1);
        let frac = pos - idx as f64;

        if frac <= 0.0 {
            return self.waypoints[idx]
        }

        let a = &self.waypoints[idx];
        let b = &self.waypoints[idx + 1];

        State::new(
            lin_interp(a[0], b[0], frac),
            lin_interp(a[1], b[1], frac),
            ang_interp(a[2], b[2], frac)
        )
    }

    /// Number of waypoints.
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    /// Time of the last waypoint, `(len - 1) * sampling_interval_s`.
    pub fn total_duration(&self) -> f64 {
        (self.waypoints.len() - 1) as f64 * self.sampling_interval_s
    }

    /// Time stamp of waypoint `index`.
    pub fn time_at(&self, index: usize) -> f64 {
        index as f64 * self.sampling_interval_s
    }

    pub fn sampling_interval_s(&self) -> f64 {
        self.sampling_interval_s
    }

    pub fn waypoints(&self) -> &[State] {
        &self.waypoints
    }

    /// Indices of the waypoints the checker rejects.
    pub fn invalid_waypoints(&self, checker: &dyn StateValidityChecker) -> Vec<usize> {
        self.waypoints
            .iter()
            .enumerate()
            .filter(|(_, w)| !checker.is_valid(w))
            .map(|(i, _)| i)
            .collect()
    }
}
