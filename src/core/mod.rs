/*!
 * Core evidence-copy components
 */

// Submodules - organized by responsibility
pub mod buffered;
pub mod checksum;
pub mod metrics;
pub mod orchestrator;
pub mod planner;
pub mod probe;
pub mod progress;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::config::Options;
use crate::error::{ErrorRecord, Result};
use self::metrics::SizeHistogram;
use self::planner::PlanWarning;
use self::progress::Callbacks;

/// How a file reached the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Copy,
    Move,
}

/// Per-file result of a copy or move
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub bytes: u64,
    /// Digest of the source, taken while its bytes were being written
    pub source_hash: Option<String>,
    /// Digest of the destination, read back from disk after fsync
    pub dest_hash: Option<String>,
    pub verified: bool,
    pub operation: OperationKind,
    pub duration_s: f64,
    pub speed_mbps: f64,
    pub error: Option<String>,
}

/// A rename that rollback could not undo; attached to the aggregate, never raised
#[derive(Debug, Clone, Serialize)]
pub struct RollbackFailure {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub detail: String,
}

/// Result of a whole operation
#[derive(Debug, Clone, Serialize)]
pub struct AggregateOutcome {
    /// True iff every planned file verified (or completed, when hashing is
    /// off) and no rollback occurred
    pub success: bool,
    pub files_processed: u64,
    pub bytes_processed: u64,
    pub duration_s: f64,
    pub avg_speed_mbps: f64,
    pub peak_speed_mbps: f64,
    pub size_histogram: SizeHistogram,
    /// Destination reads eliminated by hashing the source during the write
    pub disk_reads_saved: u64,
    /// Keyed by relative destination path (basename in flat mode)
    pub per_file: BTreeMap<String, FileOutcome>,
    pub errors: Vec<ErrorRecord>,
    pub warnings: Vec<PlanWarning>,
    pub rollback_failures: Vec<RollbackFailure>,
    pub moves_rolled_back: u64,
    /// The error that stopped the run, when one did
    pub run_error: Option<ErrorRecord>,
}

/// Run an evidence operation: plan the selections, copy or move them under
/// the destination root, and return the aggregate outcome.
///
/// This is the convenience entry point; construct an
/// [`orchestrator::Operation`] directly to inject a storage selector or to
/// reuse a configuration across runs.
pub fn execute(
    selections: &[PathBuf],
    destination_root: &Path,
    options: Options,
    callbacks: Callbacks,
) -> Result<AggregateOutcome> {
    orchestrator::Operation::new(options, callbacks).run(selections, destination_root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CustodyError;
    use tempfile::tempdir;

    #[test]
    fn test_execute_simple_file() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("source.txt");
        let dest_root = dir.path().join("out");
        std::fs::write(&source, b"test data").unwrap();

        let outcome = execute(
            &[source],
            &dest_root,
            Options::default(),
            Callbacks::new(),
        )
        .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.files_processed, 1);
        assert_eq!(outcome.bytes_processed, 9);
        assert_eq!(
            std::fs::read(dest_root.join("source.txt")).unwrap(),
            b"test data"
        );
    }

    #[test]
    fn test_execute_empty_selection() {
        let dir = tempdir().unwrap();
        let result = execute(&[], dir.path(), Options::default(), Callbacks::new());
        assert!(matches!(result, Err(CustodyError::Planning(_))));
    }

    #[test]
    fn test_execute_missing_selection_is_warning_not_error() {
        let dir = tempdir().unwrap();
        let dest_root = dir.path().join("out");

        let outcome = execute(
            &[dir.path().join("ghost.txt")],
            &dest_root,
            Options::default(),
            Callbacks::new(),
        )
        .unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.files_processed, 0);
        assert_eq!(outcome.warnings.len(), 1);
    }

    #[test]
    fn test_outcome_serializes() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.bin");
        let dest_root = dir.path().join("out");
        std::fs::write(&source, b"payload").unwrap();

        let outcome = execute(
            &[source],
            &dest_root,
            Options::default(),
            Callbacks::new(),
        )
        .unwrap();

        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"success\":true"));
        assert!(json.contains("a.bin"));
    }
}
