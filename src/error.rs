/*!
 * Error types for the custody engine
 */

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::checksum::HashAlgorithm;

pub type Result<T> = std::result::Result<T, CustodyError>;

#[derive(Debug)]
pub enum CustodyError {
    /// Selections empty, destination missing/unwritable, unresolvable paths
    Planning(String),

    /// Cannot open or stat a source file
    SourceAccess { path: PathBuf, source: io::Error },

    /// mkdir failure, short write, fsync failure, disk-full, path escape
    DestinationWrite { path: PathBuf, detail: String },

    /// Source hash and on-disk destination hash disagree after write+fsync+reread
    HashMismatch {
        algorithm: HashAlgorithm,
        source_hash: String,
        dest_hash: String,
        dest_path: PathBuf,
    },

    /// Cooperative cancel observed
    Cancelled,

    /// Counter disagreement or other impossible state; indicates a bug
    InternalInvariant(String),

    /// I/O error without a more specific classification
    Io(io::Error),
}

impl CustodyError {
    /// Check if this error is fatal for the whole run (never retried)
    pub fn is_fatal(&self) -> bool {
        match self {
            CustodyError::Planning(_) => true,
            CustodyError::HashMismatch { .. } => true,
            CustodyError::Cancelled => true,
            CustodyError::InternalInvariant(_) => true,

            CustodyError::SourceAccess { .. } => false,
            CustodyError::DestinationWrite { .. } => false,
            CustodyError::Io(_) => false,
        }
    }

    /// Get error category for logging and aggregation
    pub fn category(&self) -> ErrorCategory {
        match self {
            CustodyError::Planning(_) => ErrorCategory::Planning,
            CustodyError::SourceAccess { .. } => ErrorCategory::SourceAccess,
            CustodyError::DestinationWrite { .. } => ErrorCategory::DestinationWrite,
            CustodyError::HashMismatch { .. } => ErrorCategory::Integrity,
            CustodyError::Cancelled => ErrorCategory::Cancelled,
            CustodyError::InternalInvariant(_) => ErrorCategory::Internal,
            CustodyError::Io(_) => ErrorCategory::IoError,
        }
    }

    /// Investigator-readable message, suitable for a UI layer
    pub fn user_message(&self) -> String {
        match self {
            CustodyError::Planning(_) => {
                "Nothing to process. Check the selected items and the destination folder."
                    .to_string()
            }
            CustodyError::SourceAccess { path, .. } => format!(
                "Cannot read '{}'. Check that the file exists and you have permission to open it.",
                file_label(path)
            ),
            CustodyError::DestinationWrite { path, .. } => format!(
                "Cannot write '{}'. Check free space and folder permissions on the evidence drive.",
                file_label(path)
            ),
            CustodyError::HashMismatch { dest_path, .. } => format!(
                "Integrity check failed for '{}'. The copied file does not match the source and may be corrupted.",
                file_label(dest_path)
            ),
            CustodyError::Cancelled => "The operation was cancelled.".to_string(),
            CustodyError::InternalInvariant(_) => {
                "An internal consistency check failed. No further files were processed.".to_string()
            }
            CustodyError::Io(_) => {
                "A file system error occurred. Check disk space and permissions.".to_string()
            }
        }
    }
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Error category for classification and reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Pre-flight validation and plan construction
    Planning,
    /// Reading or statting a source file
    SourceAccess,
    /// Writing to the evidence drive
    DestinationWrite,
    /// Data integrity (hash verification)
    Integrity,
    /// Cooperative cancellation
    Cancelled,
    /// Invariant violations
    Internal,
    /// Unclassified I/O
    IoError,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Planning => write!(f, "planning"),
            ErrorCategory::SourceAccess => write!(f, "source_access"),
            ErrorCategory::DestinationWrite => write!(f, "destination_write"),
            ErrorCategory::Integrity => write!(f, "integrity"),
            ErrorCategory::Cancelled => write!(f, "cancelled"),
            ErrorCategory::Internal => write!(f, "internal"),
            ErrorCategory::IoError => write!(f, "io"),
        }
    }
}

impl fmt::Display for CustodyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CustodyError::Planning(msg) => {
                write!(f, "Planning error: {}", msg)
            }
            CustodyError::SourceAccess { path, source } => {
                write!(f, "Cannot access source {}: {}", path.display(), source)
            }
            CustodyError::DestinationWrite { path, detail } => {
                write!(f, "Destination write failed for {}: {}", path.display(), detail)
            }
            CustodyError::HashMismatch {
                algorithm,
                source_hash,
                dest_hash,
                dest_path,
            } => {
                write!(
                    f,
                    "Hash verification failed for {} ({}): source={}, dest={}",
                    dest_path.display(),
                    algorithm,
                    source_hash,
                    dest_hash
                )
            }
            CustodyError::Cancelled => write!(f, "Operation cancelled"),
            CustodyError::InternalInvariant(msg) => {
                write!(f, "Internal invariant violated: {}", msg)
            }
            CustodyError::Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl std::error::Error for CustodyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CustodyError::Io(err) => Some(err),
            CustodyError::SourceAccess { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<io::Error> for CustodyError {
    fn from(err: io::Error) -> Self {
        CustodyError::Io(err)
    }
}

/// A recorded error: category plus paired technical and user-readable messages.
///
/// `CustodyError` owns live `io::Error` values and cannot be cloned; outcomes
/// carry these flattened records instead.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorRecord {
    pub category: ErrorCategory,
    pub path: Option<PathBuf>,
    pub message: String,
    pub user_message: String,
}

impl ErrorRecord {
    pub fn from_error(error: &CustodyError, path: Option<&Path>) -> Self {
        let path = path.map(Path::to_path_buf).or_else(|| match error {
            CustodyError::SourceAccess { path, .. } => Some(path.clone()),
            CustodyError::DestinationWrite { path, .. } => Some(path.clone()),
            CustodyError::HashMismatch { dest_path, .. } => Some(dest_path.clone()),
            _ => None,
        });

        Self {
            category: error.category(),
            path,
            message: error.to_string(),
            user_message: error.user_message(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(CustodyError::Planning("empty".to_string()).is_fatal());
        assert!(CustodyError::Cancelled.is_fatal());
        assert!(CustodyError::HashMismatch {
            algorithm: HashAlgorithm::Sha256,
            source_hash: "abc".to_string(),
            dest_hash: "def".to_string(),
            dest_path: PathBuf::from("/tmp/x"),
        }
        .is_fatal());
    }

    #[test]
    fn test_non_fatal_errors() {
        assert!(!CustodyError::Io(io::Error::other("test")).is_fatal());
        assert!(!CustodyError::SourceAccess {
            path: PathBuf::from("/tmp/x"),
            source: io::Error::other("test"),
        }
        .is_fatal());
    }

    #[test]
    fn test_hash_mismatch_display() {
        let err = CustodyError::HashMismatch {
            algorithm: HashAlgorithm::Sha256,
            source_hash: "abc123".to_string(),
            dest_hash: "def456".to_string(),
            dest_path: PathBuf::from("/evidence/file.bin"),
        };
        let msg = err.to_string();
        assert!(msg.contains("abc123"));
        assert!(msg.contains("def456"));
        assert!(msg.contains("sha256"));
    }

    #[test]
    fn test_user_message_names_the_file() {
        let err = CustodyError::DestinationWrite {
            path: PathBuf::from("/evidence/out/file.bin"),
            detail: "short write".to_string(),
        };
        assert!(err.user_message().contains("file.bin"));
        // Technical and user-facing messages stay distinct
        assert_ne!(err.user_message(), err.to_string());
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            CustodyError::Planning("x".to_string()).category(),
            ErrorCategory::Planning
        );
        assert_eq!(CustodyError::Cancelled.category(), ErrorCategory::Cancelled);
        assert_eq!(
            CustodyError::Io(io::Error::other("test")).category(),
            ErrorCategory::IoError
        );
    }

    #[test]
    fn test_error_record_captures_path() {
        let err = CustodyError::SourceAccess {
            path: PathBuf::from("/in/a.txt"),
            source: io::Error::other("denied"),
        };
        let record = ErrorRecord::from_error(&err, None);
        assert_eq!(record.path, Some(PathBuf::from("/in/a.txt")));
        assert_eq!(record.category, ErrorCategory::SourceAccess);
    }
}
