//! Error types for certificate lifecycle operations

use std::io;
use std::path::{Path, PathBuf};

/// Classified failure kinds surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidFormat,
    PermissionDenied,
    NotFound,
    GenerationFailed,
    Io,
    Config,
}

/// Certificate engine errors
///
/// Messages never carry private key bytes.
#[derive(Debug, thiserror::Error)]
pub enum CertError {
    #[error("Invalid certificate or key format: {0}")]
    InvalidFormat(String),
    #[error("Permission denied: {}", path.display())]
    PermissionDenied { path: PathBuf },
    #[error("File not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("Certificate generation failed: {0}")]
    GenerationFailed(String),
    #[error("Entropy source unavailable: {0}")]
    EntropyUnavailable(String),
    #[error("File operation failed on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Configuration error: {0}")]
    Config(String),
}

impl CertError {
    /// Classify an IO error at the point it happened
    pub(crate) fn from_io(path: &Path, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied {
                path: path.to_path_buf(),
            },
            io::ErrorKind::NotFound => Self::NotFound {
                path: path.to_path_buf(),
            },
            _ => Self::Io {
                path: path.to_path_buf(),
                source,
            },
        }
    }

    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidFormat(_) => ErrorKind::InvalidFormat,
            Self::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::GenerationFailed(_) | Self::EntropyUnavailable(_) => ErrorKind::GenerationFailed,
            Self::Io { .. } => ErrorKind::Io,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Whether retrying the same operation may succeed
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::EntropyUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, CertError>;
