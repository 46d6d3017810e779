/*!
 * Buffered single-file copy with the two-read integrity contract
 *
 * When hashing is enabled the source is read exactly once (hashed while the
 * chunks are written) and the destination is read exactly once, from disk,
 * after fsync. The destination hash must reflect stored bytes, not a memory
 * buffer, so there is no one-read shortcut.
 */

use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};

use filetime::FileTime;
use tracing::{debug, warn};

use super::checksum::{digest_hex, hash_file_streaming, StreamingHasher};
use super::metrics::{MetricsRecorder, SizeClass};
use super::progress::Reporter;
use super::{FileOutcome, OperationKind};
use crate::config::{Options, SMALL_FILE_THRESHOLD};
use crate::error::{CustodyError, Result};

/// Wall-clock interval between throughput samples inside the streaming loop
const SAMPLE_INTERVAL: Duration = Duration::from_millis(100);

/// Per-file copy engine; workers construct their own around shared state
pub struct CopyEngine<'a> {
    options: &'a Options,
    reporter: &'a Reporter,
    metrics: &'a MetricsRecorder,
}

struct StreamedCopy {
    bytes: u64,
    in_flight: u64,
    source_hash: Option<String>,
}

impl<'a> CopyEngine<'a> {
    pub fn new(options: &'a Options, reporter: &'a Reporter, metrics: &'a MetricsRecorder) -> Self {
        Self {
            options,
            reporter,
            metrics,
        }
    }

    /// Copy one file and return its outcome.
    ///
    /// `buffer_override` replaces the configured buffer size for this call;
    /// both are clamped to the same bounds.
    pub fn copy_file(
        &self,
        source: &Path,
        dest: &Path,
        buffer_override: Option<usize>,
    ) -> Result<FileOutcome> {
        let started = Instant::now();

        let source_meta = std::fs::metadata(source).map_err(|e| CustodyError::SourceAccess {
            path: source.to_path_buf(),
            source: e,
        })?;
        let file_size = source_meta.len();

        self.refuse_same_path(source, dest)?;

        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CustodyError::DestinationWrite {
                path: dest.to_path_buf(),
                detail: format!("cannot create parent directory: {}", e),
            })?;
        }

        let class = SizeClass::classify(file_size);
        self.metrics.record_size_class(class);

        let buffer_size = self.options.effective_buffer_size(buffer_override);
        debug!(
            "copying {} ({} bytes, buffer {} KiB)",
            source.display(),
            file_size,
            buffer_size / 1024
        );

        let (bytes, source_hash, dest_hash, in_flight) = if file_size < SMALL_FILE_THRESHOLD {
            let (bytes, src_hash, dst_hash) = self.copy_small(source, dest, buffer_size)?;
            (bytes, src_hash, dst_hash, 0)
        } else {
            let streamed = self.stream_copy_with_hash(source, dest, buffer_size, file_size)?;

            if self.options.calculate_hash {
                // The combined read-hash-write pass eliminated one source read
                self.metrics.record_read_saved();
            }

            self.reporter.pause().wait_while_paused(self.reporter.cancel());
            if self.reporter.cancel().is_cancelled() {
                self.metrics.abort_file(streamed.in_flight);
                return Err(CustodyError::Cancelled);
            }

            let dest_hash = if self.options.calculate_hash {
                match self.hash_destination(dest, buffer_size) {
                    Ok(h) => Some(h),
                    Err(e) => {
                        self.metrics.abort_file(streamed.in_flight);
                        return Err(e);
                    }
                }
            } else {
                None
            };

            (
                streamed.bytes,
                streamed.source_hash,
                dest_hash,
                streamed.in_flight,
            )
        };

        if self.options.calculate_hash {
            let (src_hash, dst_hash) = match (&source_hash, &dest_hash) {
                (Some(s), Some(d)) => (s, d),
                _ => {
                    self.metrics.abort_file(in_flight);
                    return Err(CustodyError::InternalInvariant(
                        "hashing enabled but a digest is missing".to_string(),
                    ));
                }
            };
            if src_hash != dst_hash {
                self.metrics.abort_file(in_flight);
                return Err(CustodyError::HashMismatch {
                    algorithm: self.options.hash_algorithm,
                    source_hash: src_hash.clone(),
                    dest_hash: dst_hash.clone(),
                    dest_path: dest.to_path_buf(),
                });
            }
        }

        if let Err(e) = preserve_metadata(source, dest) {
            warn!(
                "failed to preserve metadata for {}: {}",
                dest.display(),
                e
            );
        }

        let duration = started.elapsed();
        self.metrics.complete_file(bytes, in_flight, duration);

        let duration_s = duration.as_secs_f64();
        let speed_mbps = if duration_s > 0.0 {
            (bytes as f64 / (1024.0 * 1024.0)) / duration_s
        } else {
            0.0
        };

        Ok(FileOutcome {
            source: source.to_path_buf(),
            destination: dest.to_path_buf(),
            bytes,
            source_hash,
            dest_hash,
            verified: true,
            operation: OperationKind::Copy,
            duration_s,
            speed_mbps,
            error: None,
        })
    }

    /// Direct path for small files: one buffered read for copy and source
    /// hash, then the usual on-disk destination verification. Read-count
    /// equivalent to the streaming path, not a shortcut around it.
    fn copy_small(
        &self,
        source: &Path,
        dest: &Path,
        buffer_size: usize,
    ) -> Result<(u64, Option<String>, Option<String>)> {
        self.reporter.pause().wait_while_paused(self.reporter.cancel());
        if self.reporter.cancel().is_cancelled() {
            return Err(CustodyError::Cancelled);
        }

        let data = std::fs::read(source).map_err(|e| CustodyError::SourceAccess {
            path: source.to_path_buf(),
            source: e,
        })?;

        let source_hash = self
            .options
            .calculate_hash
            .then(|| digest_hex(self.options.hash_algorithm, &data));

        let write = || -> std::io::Result<()> {
            let mut file = File::create(dest)?;
            file.write_all(&data)?;
            file.flush()?;
            file.sync_all()
        };
        write().map_err(|e| CustodyError::DestinationWrite {
            path: dest.to_path_buf(),
            detail: e.to_string(),
        })?;

        if self.reporter.cancel().is_cancelled() {
            return Err(CustodyError::Cancelled);
        }

        let dest_hash = if self.options.calculate_hash {
            Some(self.hash_destination(dest, buffer_size)?)
        } else {
            None
        };

        Ok((data.len() as u64, source_hash, dest_hash))
    }

    /// Combined read-hash-write pass over the source, fsync at the end.
    /// In-flight bytes folded into the metrics are retired here on error and
    /// by the caller on success.
    fn stream_copy_with_hash(
        &self,
        source: &Path,
        dest: &Path,
        buffer_size: usize,
        total_size: u64,
    ) -> Result<StreamedCopy> {
        let mut src = File::open(source).map_err(|e| CustodyError::SourceAccess {
            path: source.to_path_buf(),
            source: e,
        })?;
        let mut dst = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(dest)
            .map_err(|e| CustodyError::DestinationWrite {
                path: dest.to_path_buf(),
                detail: e.to_string(),
            })?;

        let mut hasher = self
            .options
            .calculate_hash
            .then(|| StreamingHasher::new(self.options.hash_algorithm));

        let name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| source.display().to_string());

        let mut buffer = vec![0u8; buffer_size];
        let mut bytes_copied: u64 = 0;
        let mut in_flight: u64 = 0;
        let mut last_sample: Option<Instant> = None;
        let mut last_sampled_bytes: u64 = 0;
        let loop_started = Instant::now();

        loop {
            self.reporter.pause().wait_while_paused(self.reporter.cancel());
            if self.reporter.cancel().is_cancelled() {
                self.metrics.abort_file(in_flight);
                return Err(CustodyError::Cancelled);
            }

            let n = src.read(&mut buffer).map_err(|e| {
                self.metrics.abort_file(in_flight);
                CustodyError::SourceAccess {
                    path: source.to_path_buf(),
                    source: e,
                }
            })?;
            if n == 0 {
                break;
            }

            if let Some(h) = hasher.as_mut() {
                h.update(&buffer[..n]);
            }

            let written = dst.write(&buffer[..n]).map_err(|e| {
                self.metrics.abort_file(in_flight);
                CustodyError::DestinationWrite {
                    path: dest.to_path_buf(),
                    detail: e.to_string(),
                }
            })?;
            if written != n {
                self.metrics.abort_file(in_flight);
                return Err(CustodyError::DestinationWrite {
                    path: dest.to_path_buf(),
                    detail: format!("incomplete write: {} of {} bytes", written, n),
                });
            }
            bytes_copied += n as u64;

            let now = Instant::now();
            let window = match last_sample {
                Some(prev) => now.duration_since(prev),
                None => now.duration_since(loop_started).max(Duration::from_nanos(1)),
            };
            if last_sample.is_none() || window >= SAMPLE_INTERVAL {
                let delta = bytes_copied - last_sampled_bytes;
                let mbps = (delta as f64 / (1024.0 * 1024.0)) / window.as_secs_f64();
                self.metrics.record_sample(mbps);
                self.metrics.add_in_flight(delta);
                in_flight += delta;

                let message = if hasher.is_some() {
                    format!("Copying and hashing {} @ {:.1} MB/s", name, mbps)
                } else {
                    format!("Streaming {} @ {:.1} MB/s", name, mbps)
                };
                self.reporter
                    .try_report(self.metrics.overall_percentage(), &message, || {
                        self.metrics.snapshot()
                    });

                last_sample = Some(now);
                last_sampled_bytes = bytes_copied;
            }
        }

        // Data must be on disk before the verification read
        let mut sync = || -> std::io::Result<()> {
            dst.flush()?;
            dst.sync_all()
        };
        sync().map_err(|e| {
            self.metrics.abort_file(in_flight);
            CustodyError::DestinationWrite {
                path: dest.to_path_buf(),
                detail: format!("fsync failed: {}", e),
            }
        })?;

        if bytes_copied != total_size {
            debug!(
                "{}: size changed during copy ({} planned, {} streamed)",
                source.display(),
                total_size,
                bytes_copied
            );
        }

        Ok(StreamedCopy {
            bytes: bytes_copied,
            in_flight,
            source_hash: hasher.map(StreamingHasher::finalize_hex),
        })
    }

    /// Hash the destination from disk, optionally retrying one failed read
    fn hash_destination(&self, dest: &Path, buffer_size: usize) -> Result<String> {
        let attempt = || {
            hash_file_streaming(
                dest,
                self.options.hash_algorithm,
                buffer_size,
                self.reporter.cancel(),
                self.reporter.pause(),
            )
        };

        match attempt() {
            Ok(digest) => Ok(digest),
            Err(CustodyError::Io(e)) if self.options.verify_on_read_failure => {
                debug!(
                    "verification re-read of {} failed ({}); retrying once",
                    dest.display(),
                    e
                );
                attempt().map_err(|e| reread_error(dest, e))
            }
            Err(e) => Err(reread_error(dest, e)),
        }
    }

    fn refuse_same_path(&self, source: &Path, dest: &Path) -> Result<()> {
        if let (Ok(src), Ok(dst)) = (source.canonicalize(), dest.canonicalize()) {
            if src == dst {
                return Err(CustodyError::DestinationWrite {
                    path: dest.to_path_buf(),
                    detail: "destination resolves to the source file".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn reread_error(dest: &Path, error: CustodyError) -> CustodyError {
    match error {
        CustodyError::Io(e) => CustodyError::DestinationWrite {
            path: dest.to_path_buf(),
            detail: format!("verification re-read failed: {}", e),
        },
        other => other,
    }
}

/// Carry source permissions and timestamps over to the destination
pub fn preserve_metadata(source: &Path, dest: &Path) -> std::io::Result<()> {
    let metadata = std::fs::metadata(source)?;

    std::fs::set_permissions(dest, metadata.permissions())?;

    let accessed = FileTime::from_last_access_time(&metadata);
    let modified = FileTime::from_last_modification_time(&metadata);
    filetime::set_file_times(dest, accessed, modified)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::checksum::HashAlgorithm;
    use crate::core::progress::Callbacks;
    use tempfile::tempdir;

    fn engine_parts() -> (Reporter, MetricsRecorder) {
        (Reporter::new(Callbacks::new()), MetricsRecorder::new(1, 0))
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 256) as u8).collect()
    }

    #[test]
    fn test_small_file_verified() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("small.bin");
        let dest = dir.path().join("out/small.bin");
        std::fs::write(&source, b"evidence payload").unwrap();

        let options = Options::default();
        let (reporter, metrics) = engine_parts();
        let engine = CopyEngine::new(&options, &reporter, &metrics);

        let outcome = engine.copy_file(&source, &dest, None).unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.bytes, 16);
        assert_eq!(
            outcome.source_hash.as_deref().unwrap(),
            outcome.dest_hash.as_deref().unwrap()
        );
        assert_eq!(
            outcome.source_hash.unwrap(),
            digest_hex(HashAlgorithm::Sha256, b"evidence payload")
        );
        assert_eq!(std::fs::read(&dest).unwrap(), b"evidence payload");

        // Small files do not use the combined-pass optimization
        assert_eq!(metrics.snapshot().disk_reads_saved, 0);
    }

    #[test]
    fn test_streaming_file_verified_and_read_saved() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("medium.bin");
        let dest = dir.path().join("medium.out");
        let data = pattern(SMALL_FILE_THRESHOLD as usize + 1);
        std::fs::write(&source, &data).unwrap();

        let options = Options::default();
        let (reporter, metrics) = engine_parts();
        let engine = CopyEngine::new(&options, &reporter, &metrics);

        let outcome = engine.copy_file(&source, &dest, None).unwrap();
        assert!(outcome.verified);
        assert_eq!(outcome.bytes, data.len() as u64);
        assert_eq!(
            outcome.dest_hash.unwrap(),
            digest_hex(HashAlgorithm::Sha256, &data)
        );
        assert_eq!(metrics.snapshot().disk_reads_saved, 1);
        assert_eq!(std::fs::read(&dest).unwrap(), data);
    }

    #[test]
    fn test_threshold_boundary_both_paths_verify() {
        let dir = tempdir().unwrap();
        let options = Options::default();

        for (name, len) in [
            ("under.bin", SMALL_FILE_THRESHOLD as usize - 1),
            ("over.bin", SMALL_FILE_THRESHOLD as usize + 1),
        ] {
            let source = dir.path().join(name);
            let dest = dir.path().join(format!("{}.out", name));
            let data = pattern(len);
            std::fs::write(&source, &data).unwrap();

            let (reporter, metrics) = engine_parts();
            let engine = CopyEngine::new(&options, &reporter, &metrics);
            let outcome = engine.copy_file(&source, &dest, None).unwrap();

            assert!(outcome.verified);
            assert_eq!(
                outcome.dest_hash.unwrap(),
                digest_hex(HashAlgorithm::Sha256, &data)
            );
        }
    }

    #[test]
    fn test_hashing_disabled_still_copies() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("plain.bin");
        let dest = dir.path().join("plain.out");
        std::fs::write(&source, b"no digests").unwrap();

        let options = Options {
            calculate_hash: false,
            ..Options::default()
        };
        let (reporter, metrics) = engine_parts();
        let engine = CopyEngine::new(&options, &reporter, &metrics);

        let outcome = engine.copy_file(&source, &dest, None).unwrap();
        assert!(outcome.verified);
        assert!(outcome.source_hash.is_none());
        assert!(outcome.dest_hash.is_none());
        assert_eq!(metrics.snapshot().disk_reads_saved, 0);
    }

    #[test]
    fn test_md5_algorithm() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("legacy.bin");
        let dest = dir.path().join("legacy.out");
        std::fs::write(&source, b"hello world").unwrap();

        let options = Options {
            hash_algorithm: HashAlgorithm::Md5,
            ..Options::default()
        };
        let (reporter, metrics) = engine_parts();
        let engine = CopyEngine::new(&options, &reporter, &metrics);

        let outcome = engine.copy_file(&source, &dest, None).unwrap();
        assert_eq!(
            outcome.dest_hash.as_deref(),
            Some("5eb63bbbe01eeed093cb22bb8f5acdc3")
        );
    }

    #[test]
    fn test_same_path_refused() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("self.bin");
        std::fs::write(&source, b"data").unwrap();

        let options = Options::default();
        let (reporter, metrics) = engine_parts();
        let engine = CopyEngine::new(&options, &reporter, &metrics);

        let result = engine.copy_file(&source, &source, None);
        assert!(matches!(
            result,
            Err(CustodyError::DestinationWrite { .. })
        ));
        // Source must be untouched
        assert_eq!(std::fs::read(&source).unwrap(), b"data");
    }

    #[test]
    fn test_missing_source_is_source_access() {
        let dir = tempdir().unwrap();
        let options = Options::default();
        let (reporter, metrics) = engine_parts();
        let engine = CopyEngine::new(&options, &reporter, &metrics);

        let result = engine.copy_file(
            &dir.path().join("ghost.bin"),
            &dir.path().join("out.bin"),
            None,
        );
        assert!(matches!(result, Err(CustodyError::SourceAccess { .. })));
    }

    #[test]
    fn test_pre_cancelled_returns_cancelled() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("a.bin");
        let dest = dir.path().join("a.out");
        std::fs::write(&source, pattern(SMALL_FILE_THRESHOLD as usize + 1)).unwrap();

        let options = Options::default();
        let callbacks = Callbacks::new();
        callbacks.cancel.cancel();
        let reporter = Reporter::new(callbacks);
        let metrics = MetricsRecorder::new(1, 0);
        let engine = CopyEngine::new(&options, &reporter, &metrics);

        let result = engine.copy_file(&source, &dest, None);
        assert!(matches!(result, Err(CustodyError::Cancelled)));
        assert_eq!(metrics.snapshot().files_processed, 0);
        assert_eq!(metrics.snapshot().bytes_in_flight, 0);
    }

    #[test]
    fn test_metadata_preserved() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("stamped.bin");
        let dest = dir.path().join("stamped.out");
        std::fs::write(&source, b"stamp me").unwrap();

        let past = FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_times(&source, past, past).unwrap();

        let options = Options::default();
        let (reporter, metrics) = engine_parts();
        let engine = CopyEngine::new(&options, &reporter, &metrics);
        engine.copy_file(&source, &dest, None).unwrap();

        let dest_meta = std::fs::metadata(&dest).unwrap();
        let modified = FileTime::from_last_modification_time(&dest_meta);
        assert_eq!(modified.unix_seconds(), 1_600_000_000);
    }
}
