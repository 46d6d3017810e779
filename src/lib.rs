/*!
 * Custody - forensic evidence-copy engine
 *
 * Streaming copy/move of selected files and folders onto an evidence drive
 * with cryptographic proof of faithful reproduction:
 * - Two-read integrity contract: the source is hashed while its bytes are
 *   written, then the destination is re-read from disk and hashed again
 * - Same-filesystem moves with rollback on failure
 * - Structure preservation, including empty directories
 * - Cooperative pause/cancel at chunk boundaries
 * - Bounded parallel copying on non-rotational storage
 * - Throttled progress and metrics callbacks
 *
 * The engine is a library with callbacks: no CLI, no UI, no event loop, no
 * persisted state. Hosts wire `Callbacks` into their own surface.
 */

pub mod config;
pub mod control;
pub mod core;
pub mod error;
pub mod logging;

// Re-export commonly used types for convenience
pub use crate::config::{
    default_worker_count, Options, SameDrivePolicy, LARGE_FILE_THRESHOLD, MAX_BUFFER_SIZE,
    MIN_BUFFER_SIZE, SMALL_FILE_THRESHOLD,
};
pub use crate::control::{CancelToken, PauseGate};
pub use crate::core::checksum::HashAlgorithm;
pub use crate::core::metrics::{MetricsSnapshot, SizeClass, SizeHistogram};
pub use crate::core::orchestrator::Operation;
pub use crate::core::planner::{
    build_plan, ItemKind, Plan, PlanItem, PlanWarning, PlanWarningKind,
};
pub use crate::core::probe::{
    needs_long_path, probe_pair, same_filesystem, storage_class, ProbeResult, StorageClass,
    StorageSelector, SHORT_PATH_THRESHOLD,
};
pub use crate::core::progress::Callbacks;
pub use crate::core::{execute, AggregateOutcome, FileOutcome, OperationKind, RollbackFailure};
pub use crate::error::{CustodyError, ErrorCategory, ErrorRecord, Result};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
