//! Generic parameters functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::de::DeserializeOwned;
use std::fs::read_to_string;
use std::path::Path;
use thiserror::Error;
use toml;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// An error that occurs during loading of a parameter file.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Cannot determine the software root directory: {0}")]
    SwRootUnavailable(std::io::Error),

    #[error("Cannot load the parmeter file: {0}")]
    FileLoadError(std::io::Error),

    #[error("Cannot read the parameter file: {0}")]
    DeserialiseError(toml::de::Error)
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Load a parameter file
///
/// The file path is relative to the "params" directory inside the software
/// root (see [`crate::host::get_sw_root`]).
pub fn load<P>(param_file_path: &str) -> Result<P, LoadError> 
where
    P: DeserializeOwned
{
    // Get the params dir
    let mut path = crate::host::get_sw_root()
        .map_err(LoadError::SwRootUnavailable)?;
    path.push("params");

    load_from(path, param_file_path)
}

/// Load a parameter file from an explicit parameter directory.
pub fn load_from<D, P>(params_dir: D, param_file_path: &str) -> Result<P, LoadError>
where
    D: AsRef<Path>,
    P: DeserializeOwned
{
    let path = params_dir.as_ref().join(param_file_path);

    // Load the file into a string
    let params_str = match read_to_string(path) {
        Ok(s) => s,
        Err(e) => return Err(LoadError::FileLoadError(e))
    };

    // Parse the string into the parameter struct
    match toml::from_str(params_str.as_str()) {
        Ok(p) => Ok(p),
        Err(e) => Err(LoadError::DeserialiseError(e))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde::Deserialize;

    #[derive(Deserialize, Debug)]
    struct TestParams {
        gain: f64,
        limits: [f64; 2],
        name: Option<String>
    }

    #[test]
    fn test_load_from() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("test.toml"), 
            "gain = 0.5\nlimits = [-1.0, 1.0]\n"
        ).unwrap();

        let p: TestParams = load_from(dir.path(), "test.toml").unwrap();
        assert_eq!(p.gain, 0.5);
        assert_eq!(p.limits, [-1.0, 1.0]);
        assert!(p.name.is_none());

        // Missing files and bad contents are reported separately
        match load_from::<_, TestParams>(dir.path(), "missing.toml") {
            Err(LoadError::FileLoadError(_)) => (),
            r => panic!("Expected a file load error, got {:?}", r)
        }

        std::fs::write(dir.path().join("bad.toml"), "gain = \"fast\"\n").unwrap();
        match load_from::<_, TestParams>(dir.path(), "bad.toml") {
            Err(LoadError::DeserialiseError(_)) => (),
            r => panic!("Expected a deserialise error, got {:?}", r)
        }
    }
}
