use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while probing a volume's capacity.
///
/// Every failure is surfaced to the caller. The probe never retries, so a
/// transient failure (e.g. a network volume that is briefly unreachable)
/// shows up here immediately.
#[derive(Debug, Error)]
pub enum ProbeError {
    /// The queried path does not exist
    #[error("path not found: {}", path.display())]
    PathNotFound {
        /// The path that was queried.
        path: PathBuf,
    },

    /// The host or filesystem has no reclaimable-space tier (or no backend at all)
    #[error("unsupported platform ({backend}): {reason}")]
    UnsupportedPlatform {
        /// Name of the backend that could not answer.
        backend: &'static str,
        /// What the backend is missing.
        reason: &'static str,
    },

    /// The platform query failed for a reason other than a missing path
    #[error("{operation} failed for {}: {message}{}", path.display(), fmt_code(*code))]
    QueryFailed {
        /// The path that was queried.
        path: PathBuf,
        /// The platform call that failed.
        operation: &'static str,
        /// Raw platform error code (errno, or `CFError` code on macOS), if any.
        code: Option<i64>,
        /// Human-readable description from the platform.
        message: String,
    },
}

fn fmt_code(code: Option<i64>) -> String {
    code.map(|c| format!(" (code {c})")).unwrap_or_default()
}

impl ProbeError {
    /// Map an I/O error from `operation` on `path` into a probe error.
    ///
    /// `NotFound` becomes [`ProbeError::PathNotFound`]; everything else is a
    /// [`ProbeError::QueryFailed`] carrying the raw OS error code.
    pub fn from_io(path: &Path, operation: &'static str, err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            return Self::PathNotFound {
                path: path.to_path_buf(),
            };
        }
        Self::QueryFailed {
            path: path.to_path_buf(),
            operation,
            code: err.raw_os_error().map(i64::from),
            message: err.to_string(),
        }
    }

    /// Returns true if the queried path does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PathNotFound { .. })
    }

    /// Returns true if the platform cannot report a reclaimable-space tier
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::UnsupportedPlatform { .. })
    }

    /// The raw platform error code, for diagnostics
    pub fn raw_code(&self) -> Option<i64> {
        match self {
            Self::QueryFailed { code, .. } => *code,
            _ => None,
        }
    }
}

/// Error returned when parsing an [`UntieredPolicy`](crate::UntieredPolicy) from text.
#[derive(Debug, Error)]
#[error("invalid untiered policy '{0}' (expected \"degrade\" or \"error\")")]
pub struct ParsePolicyError(pub(crate) String);

/// Result type for capacity probes
pub type Result<T> = std::result::Result<T, ProbeError>;
