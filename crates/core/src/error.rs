use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Failures of a single bridge iteration. All of them are recoverable at the
/// loop level; see [`BridgeError::is_fatal`].
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("malformed {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
    #[error("i/o failure on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl BridgeError {
    pub(crate) fn malformed(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        BridgeError::Malformed { path: path.into(), reason: reason.to_string() }
    }

    /// Map an I/O error on `path`, folding a missing file into `NotFound`.
    pub(crate) fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            BridgeError::NotFound(path)
        } else {
            BridgeError::Io { path, source }
        }
    }

    /// Permission errors cannot clear up by waiting for the next tick.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BridgeError::Io { source, .. } if source.kind() == io::ErrorKind::PermissionDenied)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
