//! CSV archiving of per-cycle records
//!
//! Any `serde::Serialize` struct with only primitive fields can be archived.
//! Each archive file gets a header row built from the field names of the
//! first record.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External imports
use std::fs::File;
use std::path::{Path, PathBuf};
use csv::WriterBuilder;
pub use csv::Writer;
use serde::Serialize;
use thiserror::Error;

// Internal imports
use crate::session::Session;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An object used to write CSV archive files.
pub struct Archiver {
    path: PathBuf,
    writer: Writer<File>,
    num_records: usize
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Errors which can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("Cannot create the archive file {0:?}: {1}")]
    CreateError(PathBuf, std::io::Error),

    #[error("Cannot write a record to {0:?}: {1}")]
    WriteError(PathBuf, csv::Error),

    #[error("Cannot flush the archive {0:?}: {1}")]
    FlushError(PathBuf, std::io::Error)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Archiver {
    /// Create a new archiver writing to the given file, truncating any
    /// existing file.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, ArchiveError> {
        let path = path.as_ref().to_path_buf();

        // Create the parent directories if needed
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ArchiveError::CreateError(path.clone(), e))?;
        }

        let file = File::create(&path)
            .map_err(|e| ArchiveError::CreateError(path.clone(), e))?;

        let writer = WriterBuilder::new()
            .has_headers(true)
            .from_writer(file);

        Ok(Self {
            path,
            writer,
            num_records: 0
        })
    }

    /// Create a new archiver from a paricular path relative to the session's
    /// archive root.
    pub fn from_session<P: AsRef<Path>>(
        session: &Session, path: P
    ) -> Result<Self, ArchiveError> {
        Self::new(session.arch_root.join(path))
    }

    /// Serialise a record into the archive.
    pub fn serialise<T: Serialize>(&mut self, record: T) -> Result<(), ArchiveError> {
        self.writer.serialize(record)
            .map_err(|e| ArchiveError::WriteError(self.path.clone(), e))?;
        self.num_records += 1;

        self.writer.flush()
            .map_err(|e| ArchiveError::FlushError(self.path.clone(), e))
    }

    /// Serialise every record from the iterator, flushing once at the end.
    pub fn serialise_all<T, I>(&mut self, records: I) -> Result<(), ArchiveError>
    where
        T: Serialize,
        I: IntoIterator<Item = T>
    {
        for r in records {
            self.writer.serialize(r)
                .map_err(|e| ArchiveError::WriteError(self.path.clone(), e))?;
            self.num_records += 1;
        }

        self.writer.flush()
            .map_err(|e| ArchiveError::FlushError(self.path.clone(), e))
    }

    /// Number of records written so far.
    pub fn num_records(&self) -> usize {
        self.num_records
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Serialize)]
    struct Record {
        time_s: f64,
        value: f64
    }

    #[test]
    fn test_archive_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("records.csv");

        let mut arch = Archiver::new(&path).unwrap();
        arch.serialise(Record { time_s: 0.0, value: 1.5 }).unwrap();
        arch.serialise_all(vec![
            Record { time_s: 1.0, value: -2.0 },
            Record { time_s: 2.0, value: 0.25 }
        ]).unwrap();
        assert_eq!(arch.num_records(), 3);

        let contents = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["time_s,value", "0.0,1.5", "1.0,-2.0", "2.0,0.25"]);
    }
}
