//! Errors raised while loading recordings.
//!
//! Dispatch itself never fails; only building a catalog can.

use std::path::PathBuf;
use thiserror::Error;

/// Failure while loading or validating recordings.
#[derive(Debug, Error)]
pub enum RecordingError {
    /// A recording file or directory could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A recording file is malformed.
    #[error("{path}:{line}: {message}")]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    /// The recorded method is not one the replayer serves.
    #[error("unsupported method: {0}")]
    UnsupportedMethod(String),

    /// Unknown body-match strategy name.
    #[error("invalid body match strategy: {0:?} (expected exact, ignore, contains, regex or json)")]
    InvalidBodyMatch(String),

    /// A regex in a recording did not compile.
    #[error("invalid regex {pattern:?}: {source}")]
    InvalidRegex {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    /// A recording using JSON body matching has a body that is not JSON.
    #[error("recorded body is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// An inline stub from the configuration is invalid.
    #[error("stub {id}: {message}")]
    InvalidStub { id: String, message: String },
}

impl RecordingError {
    /// Attach a file location to an error raised without one.
    pub(crate) fn at(self, path: &std::path::Path, line: usize) -> Self {
        match self {
            RecordingError::Io { .. } | RecordingError::Parse { .. } => self,
            other => RecordingError::Parse {
                path: path.to_path_buf(),
                line,
                message: other.to_string(),
            },
        }
    }
}
