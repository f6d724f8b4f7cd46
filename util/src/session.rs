//! Session management
//!
//! A session is one execution of an executable. It owns a timestamped
//! directory holding the log file and any archives written during the run.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use chrono::{DateTime, Utc};
use conquer_once::OnceCell;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

// ---------------------------------------------------------------------------
// STATICS
// ---------------------------------------------------------------------------

/// Time the session started, set once per process.
static SESSION_EPOCH: OnceCell<DateTime<Utc>> = OnceCell::uninit();

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// chrono format of the timestamp in session directory names.
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Paths belonging to the current session.
#[derive(Clone, Debug)]
pub struct Session {
    /// The root directory for this session
    pub session_root: PathBuf,

    /// The root directory for this session's archives
    pub arch_root: PathBuf,

    /// The path to the session's log file
    pub log_file_path: PathBuf
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Possible errors associated with the session module.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Cannot determine the software root directory: {0}")]
    SwRootUnavailable(std::io::Error),

    #[error("Cannot create the session directory: {0}")]
    CannotCreateDir(std::io::Error),

    #[error("A session has already been started in this process ({0})")]
    CannotInitEpoch(conquer_once::TryInitError),

    #[error("Cannot get the session epoch")]
    CannotGetEpoch
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Session {
    /// Start a new session under the software root.
    ///
    /// See [`Session::new_in`].
    pub fn new(exec_name: &str, sessions_dir: &str) -> Result<Self, SessionError> {
        let root = crate::host::get_sw_root()
            .map_err(SessionError::SwRootUnavailable)?;

        Self::new_in(root, exec_name, sessions_dir)
    }

    /// Start a new session in `{root}/{sessions_dir}/{exec_name}_{timestamp}`.
    ///
    /// Only one session may be started per process, the session epoch is
    /// shared by everything that reports elapsed time.
    pub fn new_in<P: AsRef<Path>>(
        root: P, exec_name: &str, sessions_dir: &str
    ) -> Result<Self, SessionError> {
        SESSION_EPOCH.try_init_once(Utc::now)
            .map_err(SessionError::CannotInitEpoch)?;
        let epoch = SESSION_EPOCH.get().ok_or(SessionError::CannotGetEpoch)?;

        let session_root = root.as_ref()
            .join(sessions_dir)
            .join(format!("{}_{}", exec_name, epoch.format(TIMESTAMP_FORMAT)));
        let arch_root = session_root.join("arch");

        // Creates the session root too
        fs::create_dir_all(&arch_root).map_err(SessionError::CannotCreateDir)?;

        Ok(Session {
            log_file_path: session_root.join(format!("{}.log", exec_name)),
            session_root,
            arch_root
        })
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the number of seconds elapsed since the start of the session.
///
/// If the session has not been started yet `NaN` is returned.
pub fn get_elapsed_seconds() -> f64 {
    SESSION_EPOCH.get()
        .and_then(|e| (Utc::now() - *e).num_microseconds())
        .map(|us| us as f64 * 1e-6)
        .unwrap_or(f64::NAN)
}

/// Return a reference to the session's epoch, or `None` if no session has
/// been started.
pub fn get_epoch() -> Option<&'static DateTime<Utc>> {
    SESSION_EPOCH.get()
}
