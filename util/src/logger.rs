//! Logger initialisation for executables and tools
//!
//! Log lines are prefixed with the number of seconds elapsed since the start
//! of the session and a coloured three letter level tag.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use log::{self, info};
use fern;
use colored::{ColoredString, Colorize};
use thiserror::Error;

// Internal imports
use crate::session;

// Re-exports
pub use log::LevelFilter;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors associated with initialising the logger.
#[derive(Debug, Error)]
pub enum LoggerInitError {
    #[error("Expected a log level of at least `INFO`, found `{0}`")]
    InvalidMinLogLevel(log::LevelFilter),

    #[error("Error initialising the log file: {0}")]
    LogFileInitError(std::io::Error),

    #[error("An error occured while setting up the logger: {0}")]
    FernInitError(log::SetLoggerError)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Initialise the logger for this execution.
///
/// Output always goes to stdout. If a session is given the session's log
/// file is also written.
/// 
/// # Notes
/// 
/// - `min_level` must be at least as verbose as `log::Level::Info`, the
///   progress of a run is reported at that level.
/// - This function must only be called once per process, subsequent calls
///   return `FernInitError`.
pub fn logger_init(
    min_level: LevelFilter, 
    session: Option<&session::Session>
) -> Result<(), LoggerInitError> {

    if min_level < log::Level::Info {
        return Err(LoggerInitError::InvalidMinLogLevel(min_level))
    }

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            let elapsed_s = session::get_elapsed_seconds();
            let tag = level_to_str(record.level());

            // Only debug and trace lines carry the target
            if record.level() > log::Level::Info {
                out.finish(format_args!(
                    "[{:10.6} {}] {}: {}", elapsed_s, tag, record.target(), message
                ))
            }
            else {
                out.finish(format_args!("[{:10.6} {}] {}", elapsed_s, tag, message))
            }
        })
        .level(min_level)
        .chain(std::io::stdout());

    if let Some(s) = session {
        let file = fern::log_file(&s.log_file_path)
            .map_err(LoggerInitError::LogFileInitError)?;
        dispatch = dispatch.chain(file);
    }

    dispatch.apply().map_err(LoggerInitError::FernInitError)?;
    
    info!("Logging initialised");
    info!("    Log level: {:?}", min_level);
    if let Some(s) = session {
        if let Some(epoch) = session::get_epoch() {
            info!("    Session epoch: {}", epoch);
        }
        info!("    Log file path: {:?}", s.log_file_path);
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

/// Get the string representation of a log level
fn level_to_str(level: log::Level) -> ColoredString {
    match level {
        log::Level::Trace => "TRC".dimmed().italic(),
        log::Level::Debug => "DBG".dimmed(),
        log::Level::Info  => "INF".normal(),
        log::Level::Warn  => "WRN".yellow(),
        log::Level::Error => "ERR".red().bold()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reject_quiet_levels() {
        // Levels read from parameter files are not silently promoted
        let level: LevelFilter = "warn".parse().unwrap();
        match logger_init(level, None) {
            Err(LoggerInitError::InvalidMinLogLevel(LevelFilter::Warn)) => (),
            r => panic!("Expected an invalid level error, got {:?}", r)
        }
    }
}
