/*!
 * Configuration structures and defaults for copy/move operations
 */

use serde::{Deserialize, Serialize};

use crate::core::checksum::HashAlgorithm;

/// Files below this size are copied through the in-memory direct path
pub const SMALL_FILE_THRESHOLD: u64 = 1_000_000;

/// Files at or above this size are counted as large in the histogram
pub const LARGE_FILE_THRESHOLD: u64 = 100_000_000;

/// Lower clamp for the streaming buffer
pub const MIN_BUFFER_SIZE: usize = 8 * 1024;

/// Upper clamp for the streaming buffer
pub const MAX_BUFFER_SIZE: usize = 10 * 1024 * 1024;

/// Upper bound for the derived worker-count default
pub const MAX_DEFAULT_WORKERS: usize = 8;

/// What to do when source and destination share a filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameDrivePolicy {
    /// Always copy, never relocate the originals
    AlwaysCopy,
    /// Rename in place when the probe confirms a shared device, else copy
    AlwaysMove,
    /// Reserved for an interactive decision; currently behaves as AlwaysCopy
    Ask,
}

impl Default for SameDrivePolicy {
    fn default() -> Self {
        Self::AlwaysCopy
    }
}

/// Main configuration for an evidence operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Options {
    /// Recreate the source directory structure under the destination root
    pub preserve_structure: bool,

    /// Enable the two-read integrity contract (source hash + on-disk destination hash)
    pub calculate_hash: bool,

    /// Digest algorithm for the whole operation
    pub hash_algorithm: HashAlgorithm,

    /// Requested streaming buffer size in bytes (clamped on use)
    pub buffer_size_bytes: usize,

    /// Move-vs-copy policy combined with the filesystem probe
    pub same_drive_policy: SameDrivePolicy,

    /// Worker pool ceiling; 1 disables parallel copying
    pub max_parallel_workers: usize,

    /// Retry the destination re-read once if it fails with an I/O error
    pub verify_on_read_failure: bool,
}

impl Options {
    /// Effective buffer size after clamping, honouring an optional per-call override
    pub fn effective_buffer_size(&self, override_bytes: Option<usize>) -> usize {
        override_bytes
            .unwrap_or(self.buffer_size_bytes)
            .clamp(MIN_BUFFER_SIZE, MAX_BUFFER_SIZE)
    }

    /// Pool size for a run: bounded by configuration and by the file count
    pub fn worker_count(&self, file_count: u64) -> usize {
        self.max_parallel_workers
            .max(1)
            .min(file_count.max(1) as usize)
    }
}

impl Default for Options {
    fn default() -> Self {
        Self {
            preserve_structure: false,
            calculate_hash: true,
            hash_algorithm: HashAlgorithm::Sha256,
            buffer_size_bytes: 1024 * 1024,
            same_drive_policy: SameDrivePolicy::AlwaysCopy,
            max_parallel_workers: default_worker_count(),
            verify_on_read_failure: true,
        }
    }
}

/// Derive the default worker count from the CPU count, capped at
/// [`MAX_DEFAULT_WORKERS`]. Falls back to single-threaded mode when the
/// platform cannot report its parallelism (restricted containers, cgroups).
pub fn default_worker_count() -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or_else(|e| {
            tracing::warn!(
                "failed to detect available parallelism ({}); defaulting to 1 worker",
                e
            );
            1
        });
    cores.min(MAX_DEFAULT_WORKERS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = Options::default();
        assert!(options.calculate_hash);
        assert!(!options.preserve_structure);
        assert_eq!(options.hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(options.same_drive_policy, SameDrivePolicy::AlwaysCopy);
        assert!(options.max_parallel_workers >= 1);
        assert!(options.max_parallel_workers <= MAX_DEFAULT_WORKERS);
    }

    #[test]
    fn test_buffer_clamping() {
        let options = Options {
            buffer_size_bytes: 1024,
            ..Options::default()
        };
        assert_eq!(options.effective_buffer_size(None), MIN_BUFFER_SIZE);

        let options = Options {
            buffer_size_bytes: 64 * 1024 * 1024,
            ..Options::default()
        };
        assert_eq!(options.effective_buffer_size(None), MAX_BUFFER_SIZE);

        // Per-call override is clamped the same way
        assert_eq!(options.effective_buffer_size(Some(1)), MIN_BUFFER_SIZE);
        assert_eq!(
            options.effective_buffer_size(Some(64 * 1024)),
            64 * 1024
        );
    }

    #[test]
    fn test_worker_count_bounded_by_files() {
        let options = Options {
            max_parallel_workers: 8,
            ..Options::default()
        };
        assert_eq!(options.worker_count(3), 3);
        assert_eq!(options.worker_count(100), 8);
        assert_eq!(options.worker_count(0), 1);
    }

    #[test]
    fn test_worker_count_floor() {
        let options = Options {
            max_parallel_workers: 0,
            ..Options::default()
        };
        assert_eq!(options.worker_count(10), 1);
    }

    #[test]
    fn test_policy_serde_names() {
        let json = serde_json::to_string(&SameDrivePolicy::AlwaysMove).unwrap();
        assert_eq!(json, "\"always_move\"");

        let parsed: SameDrivePolicy = serde_json::from_str("\"ask\"").unwrap();
        assert_eq!(parsed, SameDrivePolicy::Ask);
    }

    #[test]
    fn test_options_round_trip() {
        let options = Options {
            preserve_structure: true,
            same_drive_policy: SameDrivePolicy::AlwaysMove,
            ..Options::default()
        };
        let json = serde_json::to_string(&options).unwrap();
        let parsed: Options = serde_json::from_str(&json).unwrap();
        assert!(parsed.preserve_structure);
        assert_eq!(parsed.same_drive_policy, SameDrivePolicy::AlwaysMove);
    }
}
