//! PW-003: Error taxonomy.
//!
//! `MonitorError` aborts a run before any verdict is produced. `FileError`
//! is scoped to one file and is converted into a finding by the caller.

use std::path::PathBuf;

/// Setup-level failure. A run that returns one of these produced no verdict.
#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error("root not accessible: {path}: {source}")]
    RootInaccessible {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no baseline at {0}")]
    BaselineNotFound(PathBuf),

    #[error("corrupt baseline {path}: {detail}")]
    BaselineCorrupt { path: PathBuf, detail: String },

    #[error("baseline {path} was generated with {found}, configured algorithm is {expected}")]
    AlgorithmMismatch {
        path: PathBuf,
        expected: String,
        found: String,
    },

    #[error("config error: {0}")]
    Config(String),

    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl MonitorError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// Failure to read or hash a single file.
#[derive(Debug, thiserror::Error)]
pub enum FileError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read error {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("read of {path} timed out after {millis}ms")]
    Timeout { path: PathBuf, millis: u64 },
}
