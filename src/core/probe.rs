/*!
 * Filesystem probe: device identity, path-length limits, storage class
 *
 * Probe results are advisory; the orchestrator combines them with the
 * configured policy and fails closed (copy mode) when a probe cannot answer.
 */

use std::path::{Path, PathBuf};
use std::sync::Arc;

use sysinfo::{DiskKind, Disks};
use tracing::{debug, warn};

/// Conservative character threshold below the Windows MAX_PATH limit,
/// leaving headroom for directory operations
pub const SHORT_PATH_THRESHOLD: usize = 248;

/// Probe result for one (source, destination) pair
#[derive(Debug, Clone, Copy)]
pub struct ProbeResult {
    pub same_device: bool,
    pub needs_long_path: bool,
}

/// Probe a source selection against the destination root
pub fn probe_pair(source: &Path, destination: &Path) -> ProbeResult {
    ProbeResult {
        same_device: same_filesystem(source, destination),
        needs_long_path: needs_long_path(source, SHORT_PATH_THRESHOLD)
            || needs_long_path(destination, SHORT_PATH_THRESHOLD),
    }
}

/// Check whether source and destination live on the same filesystem.
///
/// Compares device identifiers of the resolved paths, which correctly
/// distinguishes network drives, RAID volumes and virtual disks. If the
/// destination does not exist yet, its parent is resolved instead. Any
/// resolution failure answers `false` so the caller falls back to copy mode.
pub fn same_filesystem(source: &Path, destination: &Path) -> bool {
    let resolved = (|| -> std::io::Result<(PathBuf, PathBuf)> {
        let src = source.canonicalize()?;
        let dst = if destination.exists() {
            destination.canonicalize()?
        } else {
            destination
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."))
                .canonicalize()?
        };
        Ok((src, dst))
    })();

    let (src, dst) = match resolved {
        Ok(pair) => pair,
        Err(e) => {
            warn!("filesystem detection failed, defaulting to copy mode: {}", e);
            return false;
        }
    };

    match (device_id(&src), device_id(&dst)) {
        (Ok(a), Ok(b)) => {
            let same = a == b;
            debug!(
                "device probe: {} ({}) vs {} ({}) -> same={}",
                src.display(),
                a,
                dst.display(),
                b,
                same
            );
            same
        }
        (Err(e), _) | (_, Err(e)) => {
            warn!("device id lookup failed, defaulting to copy mode: {}", e);
            false
        }
    }
}

#[cfg(unix)]
fn device_id(path: &Path) -> std::io::Result<u64> {
    use std::os::unix::fs::MetadataExt;
    Ok(std::fs::metadata(path)?.dev())
}

#[cfg(not(unix))]
fn device_id(path: &Path) -> std::io::Result<u64> {
    // Without a stable device id, fall back to the volume prefix of the
    // canonical path (drive letter or UNC share).
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut components = path.components();
    let root = components
        .next()
        .ok_or_else(|| std::io::Error::other("path has no components"))?;
    let mut hasher = DefaultHasher::new();
    root.as_os_str().hash(&mut hasher);
    Ok(hasher.finish())
}

/// Check whether a path exceeds the short-path limit and needs the
/// extended-length form. Always false on platforms without such a limit.
pub fn needs_long_path(path: &Path, threshold: usize) -> bool {
    if !cfg!(windows) {
        return false;
    }

    let resolved = path
        .canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());

    let needs = exceeds_threshold(&resolved.to_string_lossy(), threshold);
    if needs {
        debug!(
            "path exceeds {} chars and needs the extended-length form: {}",
            threshold,
            resolved.display()
        );
    }
    needs
}

/// Length check shared by all platforms (counts characters, not bytes)
pub(crate) fn exceeds_threshold(path_str: &str, threshold: usize) -> bool {
    path_str.chars().count() > threshold
}

/// Return the platform's extended-length form of a path.
///
/// Within a single rename both sides must use the same form; mixing prefixed
/// and unprefixed paths crosses NT namespaces and fails.
pub fn extended_path(path: &Path) -> PathBuf {
    if cfg!(windows) {
        let s = path.to_string_lossy();
        if s.starts_with(r"\\?\") {
            path.to_path_buf()
        } else {
            PathBuf::from(format!(r"\\?\{}", s))
        }
    } else {
        path.to_path_buf()
    }
}

/// Storage class of the disk backing a path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageClass {
    Ssd,
    Hdd,
    Unknown,
}

impl StorageClass {
    /// Parallel file copies only pay off on non-rotational storage
    pub fn supports_parallel(&self) -> bool {
        matches!(self, Self::Ssd)
    }
}

/// Replaceable storage classifier; hosts and tests inject their own
pub type StorageSelector = Arc<dyn Fn(&Path) -> StorageClass + Send + Sync>;

/// Classify the disk that backs a path via the system disk list.
///
/// The disk with the longest mount-point prefix wins; an unmatched path
/// answers `Unknown`, which disables parallel copying.
pub fn storage_class(path: &Path) -> StorageClass {
    let resolved = path
        .canonicalize()
        .or_else(|_| std::path::absolute(path))
        .unwrap_or_else(|_| path.to_path_buf());

    let disks = Disks::new_with_refreshed_list();
    let mut best: Option<(usize, DiskKind)> = None;

    for disk in disks.list() {
        let mount = disk.mount_point();
        if resolved.starts_with(mount) {
            let depth = mount.components().count();
            if best.map_or(true, |(d, _)| depth > d) {
                best = Some((depth, disk.kind()));
            }
        }
    }

    match best {
        Some((_, DiskKind::SSD)) => StorageClass::Ssd,
        Some((_, DiskKind::HDD)) => StorageClass::Hdd,
        _ => StorageClass::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_same_filesystem_within_tempdir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"data").unwrap();

        assert!(same_filesystem(&file, dir.path()));
    }

    #[test]
    fn test_same_filesystem_missing_destination_uses_parent() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"data").unwrap();

        let missing_dest = dir.path().join("not-created-yet");
        assert!(same_filesystem(&file, &missing_dest));
    }

    #[test]
    fn test_same_filesystem_unresolvable_is_false() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"data").unwrap();

        assert!(!same_filesystem(
            Path::new("/nonexistent/path/that/should/not/exist"),
            dir.path()
        ));
        assert!(!same_filesystem(
            &file,
            Path::new("/nonexistent/parent/child")
        ));
    }

    #[test]
    fn test_threshold_counts_characters() {
        assert!(!exceeds_threshold("short", 248));
        let long = "x".repeat(249);
        assert!(exceeds_threshold(&long, 248));
        let exact = "x".repeat(248);
        assert!(!exceeds_threshold(&exact, 248));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_needs_long_path_is_false_without_limit() {
        let long = PathBuf::from(format!("/tmp/{}", "x".repeat(400)));
        assert!(!needs_long_path(&long, SHORT_PATH_THRESHOLD));
    }

    #[cfg(not(windows))]
    #[test]
    fn test_extended_path_is_identity_without_limit() {
        let path = Path::new("/some/path");
        assert_eq!(extended_path(path), path);
    }

    #[test]
    fn test_storage_class_does_not_panic() {
        let dir = tempdir().unwrap();
        let _ = storage_class(dir.path());
        let _ = storage_class(Path::new("/nonexistent/path"));
    }

    #[test]
    fn test_probe_pair_same_tempdir() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"data").unwrap();

        let result = probe_pair(&file, dir.path());
        assert!(result.same_device);
        #[cfg(not(windows))]
        assert!(!result.needs_long_path);
    }
}
