//! Trajectory output files
//!
//! Both files hold one whitespace separated row per recorded sample. Values
//! are written with their shortest round-trip representation so the files
//! can be read back exactly.
//!
//! Files are written to a temporary sibling and renamed into place, so an
//! interrupted write never leaves a partial file at the target path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use log::info;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::driver::Sample;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors raised while writing output files.
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Cannot write {0:?}: {1}")]
    WriteError(PathBuf, std::io::Error),

    #[error("Cannot move the finished file into place at {0:?}: {1}")]
    RenameError(PathBuf, std::io::Error)
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Write the realised states, `x y theta` per line.
pub fn write_states<P: AsRef<Path>>(path: P, samples: &[Sample]) -> Result<(), OutputError> {
    write_rows(path.as_ref(), samples.iter().map(|s| s.state.as_slice()))?;
    info!("Wrote {} states to {:?}", samples.len(), path.as_ref());
    Ok(())
}

/// Write the applied controls, `u0 u1` per line.
pub fn write_controls<P: AsRef<Path>>(path: P, samples: &[Sample]) -> Result<(), OutputError> {
    write_rows(path.as_ref(), samples.iter().map(|s| s.control.as_slice()))?;
    info!("Wrote {} controls to {:?}", samples.len(), path.as_ref());
    Ok(())
}

fn write_rows<'a, I>(path: &Path, rows: I) -> Result<(), OutputError>
where
    I: Iterator<Item = &'a [f64]>
{
    let tmp_path = temp_path(path);
    let write_err = |e| OutputError::WriteError(path.to_path_buf(), e);

    {
        let file = File::create(&tmp_path).map_err(write_err)?;
        let mut writer = BufWriter::new(file);

        for row in rows {
            let line = row.iter()
                .map(|v| v.to_string())
                .collect::<Vec<_>>()
                .join(" ");
            writeln!(writer, "{}", line).map_err(write_err)?;
        }

        writer.flush().map_err(write_err)?;
    }

    std::fs::rename(&tmp_path, path)
        .map_err(|e| OutputError::RenameError(path.to_path_buf(), e))
}

/// Temporary sibling of `path`, in the same directory so the rename doesn't
/// cross filesystems.
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::reference::{parse_waypoints, ParseMode};
    use crate::vehicle::{Control, State};

    fn samples() -> Vec<Sample> {
        vec![
            Sample {
                time_s: 1.0,
                state: State::new(1.0 / 3.0, 0.0, -0.1),
                control: Control::new(1.4285714285714286, 1e-9)
            },
            Sample {
                time_s: 2.0,
                state: State::new(199.99999999, 1e-12, std::f64::consts::PI),
                control: Control::new(-10.0, -1.0471975511965976)
            }
        ]
    }

    #[test]
    fn test_states_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output_states.txt");
        let samples = samples();

        write_states(&path, &samples).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let parsed = parse_waypoints(&text, ParseMode::Strict).unwrap();
        assert_eq!(parsed.len(), samples.len());
        for (p, s) in parsed.iter().zip(samples.iter()) {
            assert_eq!(*p, s.state);
        }

        // No temporary file is left behind
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_controls_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output_controls.txt");

        write_controls(&path, &samples()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec![
            "1.4285714285714286 0.000000001",
            "-10 -1.0471975511965976"
        ]);
    }

    #[test]
    fn test_empty_samples() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("states.txt");
        write_states(&path, &[]).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("states.txt");
        assert!(matches!(write_states(&path, &samples()), Err(OutputError::WriteError(..))));
    }
}
