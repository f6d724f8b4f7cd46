//! # Tracking Executable Parameters
//!
//! Parameters of the executable itself rather than any one module.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Deserialize;

// ---------------------------------------------------------------------------
// STRUCTS
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MpcExecParams {

    /// Duration the reference waypoints are spread over. The reference
    /// sampling interval is `total_time_s / (num_waypoints - 1)`.
    ///
    /// Units: seconds
    pub total_time_s: f64,

    /// Reject malformed reference lines rather than zero filling them
    pub strict_parsing: bool,

    /// Minimum log level, one of `info`, `debug` or `trace`
    pub log_level: String,

    /// Directory, relative to the software root, that sessions are created in
    pub sessions_dir: String
}

impl Default for MpcExecParams {
    fn default() -> Self {
        Self {
            total_time_s: 70.0,
            strict_parsing: false,
            log_level: "info".into(),
            sessions_dir: "sessions".into()
        }
    }
}
