//! Error types for pseudo console operations

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConPtyError {
    /// The host does not export the pseudo console entry points
    #[error("Pseudo console is not supported on this host: {0} not found")]
    UnsupportedPlatform(&'static str),

    #[error("Failed to allocate {what}: {source}")]
    ResourceAllocation {
        what: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Failed to spawn process: {0}")]
    SpawnFailure(#[source] io::Error),

    #[error("Pseudo console {op} failed: {source}")]
    IoFailure {
        op: &'static str,
        #[source]
        source: io::Error,
    },

    #[error("Pseudo console device is closed")]
    Closed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ConPtyError {
    pub(crate) fn allocation(what: &'static str, source: io::Error) -> Self {
        Self::ResourceAllocation { what, source }
    }

    pub(crate) fn io(op: &'static str, source: io::Error) -> Self {
        Self::IoFailure { op, source }
    }

    /// The OS status code (Win32 error or HRESULT) behind this error, if any
    pub fn status_code(&self) -> Option<i32> {
        match self {
            Self::ResourceAllocation { source, .. }
            | Self::SpawnFailure(source)
            | Self::IoFailure { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

impl From<ConPtyError> for io::Error {
    fn from(err: ConPtyError) -> Self {
        let kind = match &err {
            ConPtyError::Closed => io::ErrorKind::BrokenPipe,
            ConPtyError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            ConPtyError::UnsupportedPlatform(_) => io::ErrorKind::Unsupported,
            _ => io::ErrorKind::Other,
        };
        match err {
            ConPtyError::IoFailure { source, .. } => source,
            err => io::Error::new(kind, err),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConPtyError>;
