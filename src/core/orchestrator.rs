/*!
 * Operation orchestrator: walks the plan, dispatches copies and moves,
 * aggregates per-file outcomes
 *
 * Moves are always sequential; renames are cheap and ordering keeps rollback
 * simple. Copies may fan out over a bounded worker pool when both sides sit
 * on non-rotational storage. The orchestrator thread is the only mutator of
 * the results map; workers report through completion messages.
 */

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crossbeam_channel::unbounded;
use tracing::{debug, info, warn};

use super::buffered::CopyEngine;
use super::checksum::hash_file_streaming;
use super::metrics::MetricsRecorder;
use super::planner::{build_plan, Plan, PlanItem};
use super::probe::{self, StorageSelector, SHORT_PATH_THRESHOLD};
use super::progress::{Callbacks, Reporter};
use super::{AggregateOutcome, FileOutcome, OperationKind, RollbackFailure};
use crate::config::{Options, SameDrivePolicy};
use crate::error::{CustodyError, ErrorRecord, Result};

/// A configured evidence operation, reusable across runs
pub struct Operation {
    options: Options,
    callbacks: Callbacks,
    storage_selector: Option<StorageSelector>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunMode {
    Copy,
    Move,
}

#[derive(Default)]
struct RunState {
    per_file: BTreeMap<String, FileOutcome>,
    errors: Vec<ErrorRecord>,
    rollback_failures: Vec<RollbackFailure>,
    run_error: Option<ErrorRecord>,
    moves_rolled_back: u64,
}

impl RunState {
    fn record_failure(
        &mut self,
        key: String,
        source: &Path,
        dest: &Path,
        operation: OperationKind,
        error: &CustodyError,
    ) {
        let (source_hash, dest_hash) = match error {
            CustodyError::HashMismatch {
                source_hash,
                dest_hash,
                ..
            } => (Some(source_hash.clone()), Some(dest_hash.clone())),
            _ => (None, None),
        };

        self.per_file.insert(
            key,
            FileOutcome {
                source: source.to_path_buf(),
                destination: dest.to_path_buf(),
                bytes: 0,
                source_hash,
                dest_hash,
                verified: false,
                operation,
                duration_s: 0.0,
                speed_mbps: 0.0,
                error: Some(error.to_string()),
            },
        );
        self.push_error(error, Some(dest));
    }

    fn push_error(&mut self, error: &CustodyError, path: Option<&Path>) {
        let record = ErrorRecord::from_error(error, path);
        if self.run_error.is_none() {
            self.run_error = Some(record.clone());
        }
        self.errors.push(record);
    }
}

impl Operation {
    pub fn new(options: Options, callbacks: Callbacks) -> Self {
        Self {
            options,
            callbacks,
            storage_selector: None,
        }
    }

    /// Replace the built-in storage classifier (host heuristics, tests)
    pub fn with_storage_selector(mut self, selector: StorageSelector) -> Self {
        self.storage_selector = Some(selector);
        self
    }

    /// Run the operation. Returns `Err` only for pre-flight planning
    /// failures; everything after planning is reported through the aggregate
    /// outcome.
    pub fn run(&self, selections: &[PathBuf], destination_root: &Path) -> Result<AggregateOutcome> {
        let started = Instant::now();

        if selections.is_empty() {
            return Err(CustodyError::Planning(
                "no files or folders selected".to_string(),
            ));
        }
        fs::create_dir_all(destination_root).map_err(|e| {
            CustodyError::Planning(format!(
                "destination {} is not writable: {}",
                destination_root.display(),
                e
            ))
        })?;

        let plan = build_plan(selections, self.options.preserve_structure)?;
        let metrics = MetricsRecorder::new(plan.file_count, plan.total_bytes);
        let reporter = Reporter::new(self.callbacks.clone());
        let mut state = RunState::default();

        let mode = self.resolve_mode(selections, destination_root);
        match mode {
            RunMode::Move => {
                reporter.report_now(0, "Fast mode: moving items (same drive detected)", || {
                    metrics.snapshot()
                });
                self.run_moves(&plan, destination_root, &reporter, &metrics, &mut state);
            }
            RunMode::Copy => {
                reporter.report_now(0, "Standard mode: copying items", || metrics.snapshot());
                self.materialise_empty_dirs(&plan, destination_root, &mut state);

                let pool_size = self.options.worker_count(plan.file_count);
                let parallel = pool_size > 1
                    && plan.file_count >= 2
                    && self.storage_supports_parallel(selections, destination_root);
                if parallel {
                    self.run_copies_parallel(
                        &plan,
                        destination_root,
                        pool_size,
                        &reporter,
                        &metrics,
                        &mut state,
                    );
                } else {
                    self.run_copies_sequential(
                        &plan,
                        destination_root,
                        &reporter,
                        &metrics,
                        &mut state,
                    );
                }
            }
        }

        Ok(self.finalize(&plan, state, &metrics, &reporter, started))
    }

    /// Combine policy with the filesystem probe. Moving requires every
    /// top-level selection to share a device with the destination.
    fn resolve_mode(&self, selections: &[PathBuf], destination_root: &Path) -> RunMode {
        match self.options.same_drive_policy {
            SameDrivePolicy::AlwaysCopy => RunMode::Copy,
            SameDrivePolicy::Ask => {
                info!("interactive decision not wired; copying");
                RunMode::Copy
            }
            SameDrivePolicy::AlwaysMove => {
                let all_same = selections
                    .iter()
                    .all(|s| probe::same_filesystem(s, destination_root));
                if all_same {
                    info!(
                        "move mode selected: {} selections share a device with {}",
                        selections.len(),
                        destination_root.display()
                    );
                    RunMode::Move
                } else {
                    info!("copy mode selected: selections span devices");
                    RunMode::Copy
                }
            }
        }
    }

    fn storage_supports_parallel(&self, selections: &[PathBuf], destination_root: &Path) -> bool {
        let classify = |path: &Path| match &self.storage_selector {
            Some(selector) => selector(path),
            None => probe::storage_class(path),
        };

        // First selection stands in for the source side
        let source_class = classify(&selections[0]);
        let dest_class = classify(destination_root);
        debug!(
            "storage probe: source={:?}, destination={:?}",
            source_class, dest_class
        );
        source_class.supports_parallel() && dest_class.supports_parallel()
    }

    fn materialise_empty_dirs(&self, plan: &Plan, root: &Path, state: &mut RunState) {
        let mut created = 0usize;
        for rel in &plan.empty_dirs {
            if let Err(e) = ensure_contained(rel) {
                state.push_error(&e, Some(rel));
                continue;
            }
            let dir = root.join(rel);
            match fs::create_dir_all(&dir) {
                Ok(()) => created += 1,
                Err(e) => {
                    let err = CustodyError::DestinationWrite {
                        path: dir.clone(),
                        detail: format!("cannot create directory: {}", e),
                    };
                    warn!("{}", err);
                    state.errors.push(ErrorRecord::from_error(&err, Some(&dir)));
                }
            }
        }
        if created > 0 {
            debug!("created {} empty directories", created);
        }
    }

    fn run_copies_sequential(
        &self,
        plan: &Plan,
        root: &Path,
        reporter: &Reporter,
        metrics: &MetricsRecorder,
        state: &mut RunState,
    ) {
        let engine = CopyEngine::new(&self.options, reporter, metrics);
        let total = plan.file_count;

        for (index, item) in plan.file_items().enumerate() {
            reporter.pause().wait_while_paused(reporter.cancel());
            if reporter.cancel().is_cancelled() {
                state.push_error(&CustodyError::Cancelled, None);
                break;
            }

            let key = outcome_key(item);
            let dest = match destination_for(item, root) {
                Ok(dest) => dest,
                Err(e) => {
                    state.record_failure(key, &item.source, root, OperationKind::Copy, &e);
                    break;
                }
            };

            reporter.try_report(
                metrics.overall_percentage(),
                &format!("Copying {} ({}/{})", display_name(&item.source), index + 1, total),
                || metrics.snapshot(),
            );

            match engine.copy_file(&item.source, &dest, None) {
                Ok(outcome) => {
                    state.per_file.insert(key, outcome);
                }
                Err(e) => {
                    state.record_failure(key, &item.source, &dest, OperationKind::Copy, &e);
                    break;
                }
            }
        }
    }

    /// Fan copies out over a bounded pool. Workers never touch the results
    /// map; they send completion messages that this thread folds in.
    fn run_copies_parallel(
        &self,
        plan: &Plan,
        root: &Path,
        pool_size: usize,
        reporter: &Reporter,
        metrics: &MetricsRecorder,
        state: &mut RunState,
    ) {
        // Validate every destination before dispatch; one bad path aborts the
        // run before any worker starts
        let mut work: Vec<(String, PathBuf, PathBuf)> = Vec::with_capacity(plan.file_count as usize);
        for item in plan.file_items() {
            let key = outcome_key(item);
            match destination_for(item, root) {
                Ok(dest) => work.push((key, item.source.clone(), dest)),
                Err(e) => {
                    state.record_failure(key, &item.source, root, OperationKind::Copy, &e);
                    return;
                }
            }
        }

        let pool = match rayon::ThreadPoolBuilder::new().num_threads(pool_size).build() {
            Ok(pool) => pool,
            Err(e) => {
                state.push_error(
                    &CustodyError::InternalInvariant(format!("cannot build worker pool: {}", e)),
                    None,
                );
                return;
            }
        };
        info!("parallel copy: {} workers for {} files", pool_size, work.len());

        let abort = AtomicBool::new(false);
        let (tx, rx) = unbounded::<(String, PathBuf, PathBuf, Result<FileOutcome>)>();
        let options = &self.options;

        pool.in_place_scope(|scope| {
            for (key, source, dest) in work {
                let tx = tx.clone();
                let abort = &abort;
                scope.spawn(move |_| {
                    if abort.load(Ordering::SeqCst) || reporter.cancel().is_cancelled() {
                        // Remaining work is abandoned after the first failure
                        return;
                    }
                    let engine = CopyEngine::new(options, reporter, metrics);
                    let result = engine.copy_file(&source, &dest, None);
                    if result.is_err() {
                        abort.store(true, Ordering::SeqCst);
                    }
                    let _ = tx.send((key, source, dest, result));
                });
            }
            drop(tx);

            for (key, source, dest, result) in rx.iter() {
                match result {
                    Ok(outcome) => {
                        state.per_file.insert(key, outcome);
                        reporter.try_report(
                            metrics.overall_percentage(),
                            &format!(
                                "Copied {}/{} files",
                                metrics.snapshot().files_processed,
                                plan.file_count
                            ),
                            || metrics.snapshot(),
                        );
                    }
                    Err(e) => {
                        state.record_failure(key, &source, &dest, OperationKind::Copy, &e);
                    }
                }
            }
        });

        if reporter.cancel().is_cancelled() && state.run_error.is_none() {
            state.push_error(&CustodyError::Cancelled, None);
        }
    }

    /// Sequential rename pass with rollback on the first hard error
    fn run_moves(
        &self,
        plan: &Plan,
        root: &Path,
        reporter: &Reporter,
        metrics: &MetricsRecorder,
        state: &mut RunState,
    ) {
        let engine = CopyEngine::new(&self.options, reporter, metrics);
        let total = plan.file_count;
        let buffer_size = self.options.effective_buffer_size(None);
        // (source, destination, bytes, key) of completed renames, for rollback
        let mut moved: Vec<(PathBuf, PathBuf, u64, String)> = Vec::new();
        let mut aborted = false;

        for (index, item) in plan.file_items().enumerate() {
            reporter.pause().wait_while_paused(reporter.cancel());
            if reporter.cancel().is_cancelled() {
                state.push_error(&CustodyError::Cancelled, None);
                aborted = true;
                break;
            }

            let item_started = Instant::now();
            let key = outcome_key(item);
            let dest = match destination_for(item, root) {
                Ok(dest) => dest,
                Err(e) => {
                    state.record_failure(key, &item.source, root, OperationKind::Move, &e);
                    aborted = true;
                    break;
                }
            };

            if let (Ok(src), Ok(dst)) = (item.source.canonicalize(), dest.canonicalize()) {
                if src == dst {
                    let err = CustodyError::DestinationWrite {
                        path: dest.clone(),
                        detail: "destination resolves to the source file".to_string(),
                    };
                    state.record_failure(key, &item.source, &dest, OperationKind::Move, &err);
                    aborted = true;
                    break;
                }
            }

            if let Some(parent) = dest.parent() {
                if let Err(e) = fs::create_dir_all(parent) {
                    let err = CustodyError::DestinationWrite {
                        path: dest.clone(),
                        detail: format!("cannot create parent directory: {}", e),
                    };
                    state.record_failure(key, &item.source, &dest, OperationKind::Move, &err);
                    aborted = true;
                    break;
                }
            }

            let bytes = match fs::metadata(&item.source) {
                Ok(meta) => meta.len(),
                Err(e) => {
                    let err = CustodyError::SourceAccess {
                        path: item.source.clone(),
                        source: e,
                    };
                    state.record_failure(key, &item.source, &dest, OperationKind::Move, &err);
                    aborted = true;
                    break;
                }
            };

            reporter.try_report(
                (index as u64 * 100 / total.max(1)).min(100) as u8,
                &format!("Moving {} ({}/{})", display_name(&item.source), index + 1, total),
                || metrics.snapshot(),
            );

            // Both sides must use the same path form; mixing namespaces
            // breaks the rename on platforms with a short-path limit
            let needs_long = probe::needs_long_path(&item.source, SHORT_PATH_THRESHOLD)
                || probe::needs_long_path(&dest, SHORT_PATH_THRESHOLD);
            let (src_os, dst_os) = if needs_long {
                (probe::extended_path(&item.source), probe::extended_path(&dest))
            } else {
                (item.source.clone(), dest.clone())
            };

            match fs::rename(&src_os, &dst_os) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
                    debug!(
                        "rename of {} crossed devices; falling back to copy-then-delete",
                        item.source.display()
                    );
                    match engine.copy_file(&item.source, &dest, None) {
                        Ok(mut outcome) => {
                            if let Err(rm) = fs::remove_file(&item.source) {
                                let err = CustodyError::SourceAccess {
                                    path: item.source.clone(),
                                    source: rm,
                                };
                                state.record_failure(
                                    key,
                                    &item.source,
                                    &dest,
                                    OperationKind::Move,
                                    &err,
                                );
                                aborted = true;
                                break;
                            }
                            outcome.operation = OperationKind::Move;
                            state.per_file.insert(key.clone(), outcome);
                            moved.push((item.source.clone(), dest.clone(), bytes, key));
                            continue;
                        }
                        Err(e) => {
                            state.record_failure(key, &item.source, &dest, OperationKind::Move, &e);
                            aborted = true;
                            break;
                        }
                    }
                }
                Err(e) => {
                    let err = CustodyError::DestinationWrite {
                        path: dest.clone(),
                        detail: format!("rename failed: {}", e),
                    };
                    state.record_failure(key, &item.source, &dest, OperationKind::Move, &err);
                    aborted = true;
                    break;
                }
            }

            moved.push((item.source.clone(), dest.clone(), bytes, key.clone()));

            // A rename does not rewrite data; hashing the destination proves
            // it is readable where it now lives
            let dest_hash = if self.options.calculate_hash {
                match hash_file_streaming(
                    &dest,
                    self.options.hash_algorithm,
                    buffer_size,
                    reporter.cancel(),
                    reporter.pause(),
                ) {
                    Ok(digest) => Some(digest),
                    Err(e) => {
                        state.push_error(&e, Some(&dest));
                        aborted = true;
                        break;
                    }
                }
            } else {
                None
            };

            let duration = item_started.elapsed();
            metrics.complete_file(bytes, 0, duration);

            let duration_s = duration.as_secs_f64();
            let speed_mbps = if duration_s > 0.0 {
                (bytes as f64 / (1024.0 * 1024.0)) / duration_s
            } else {
                0.0
            };
            state.per_file.insert(
                key,
                FileOutcome {
                    source: item.source.clone(),
                    destination: dest,
                    bytes,
                    source_hash: None,
                    dest_hash,
                    verified: true,
                    operation: OperationKind::Move,
                    duration_s,
                    speed_mbps,
                    error: None,
                },
            );
        }

        if aborted {
            rollback_moves(&moved, state, metrics);
            return;
        }

        // Deferred for moves: only materialise the empty set once every
        // rename has landed
        self.materialise_empty_dirs(plan, root, state);
    }

    fn finalize(
        &self,
        plan: &Plan,
        state: RunState,
        metrics: &MetricsRecorder,
        reporter: &Reporter,
        started: Instant,
    ) -> AggregateOutcome {
        let snapshot = metrics.snapshot();

        let successful: Vec<&FileOutcome> = state
            .per_file
            .values()
            .filter(|o| o.error.is_none())
            .collect();
        let successful_bytes: u64 = successful.iter().map(|o| o.bytes).sum();

        let mut errors = state.errors;
        if successful_bytes != snapshot.bytes_copied {
            let err = CustodyError::InternalInvariant(format!(
                "outcome byte sum {} disagrees with metrics counter {}",
                successful_bytes, snapshot.bytes_copied
            ));
            warn!("{}", err);
            errors.push(ErrorRecord::from_error(&err, None));
        }

        let success = state.run_error.is_none()
            && errors.is_empty()
            && state.rollback_failures.is_empty()
            && state.moves_rolled_back == 0
            && successful.len() as u64 == plan.file_count;

        let duration_s = started.elapsed().as_secs_f64();
        let avg_speed_mbps = snapshot.avg_speed_mbps;
        // Sparse sampling can miss the true peak on short runs; the average
        // is a lower bound on it
        let peak_speed_mbps = snapshot.peak_speed_mbps.max(avg_speed_mbps);

        info!(
            "operation complete: {}/{} files, {:.1} MB in {:.2}s (avg {:.1} MB/s, peak {:.1} MB/s), {} reads saved, histogram {}/{}/{}",
            snapshot.files_processed,
            plan.file_count,
            snapshot.bytes_copied as f64 / (1024.0 * 1024.0),
            duration_s,
            avg_speed_mbps,
            peak_speed_mbps,
            snapshot.disk_reads_saved,
            snapshot.histogram.small,
            snapshot.histogram.medium,
            snapshot.histogram.large,
        );

        let final_message = if success {
            format!(
                "Completed: {} files, {:.1} MB @ {:.1} MB/s avg",
                snapshot.files_processed,
                snapshot.bytes_copied as f64 / (1024.0 * 1024.0),
                avg_speed_mbps
            )
        } else {
            match &state.run_error {
                Some(record) => format!("Stopped: {}", record.user_message),
                None => "Completed with errors".to_string(),
            }
        };
        reporter.report_now(
            if success { 100 } else { metrics.overall_percentage() },
            &final_message,
            || metrics.snapshot(),
        );

        AggregateOutcome {
            success,
            files_processed: snapshot.files_processed,
            bytes_processed: snapshot.bytes_copied,
            duration_s,
            avg_speed_mbps,
            peak_speed_mbps,
            size_histogram: snapshot.histogram,
            disk_reads_saved: snapshot.disk_reads_saved,
            per_file: state.per_file,
            errors,
            warnings: plan.warnings.clone(),
            rollback_failures: state.rollback_failures,
            moves_rolled_back: state.moves_rolled_back,
            run_error: state.run_error,
        }
    }
}

/// Undo completed renames in reverse order. Failures are collected, never
/// raised; rollback must run to the end.
fn rollback_moves(
    moved: &[(PathBuf, PathBuf, u64, String)],
    state: &mut RunState,
    metrics: &MetricsRecorder,
) {
    if moved.is_empty() {
        return;
    }
    warn!("rolling back {} moved items", moved.len());

    for (source, dest, bytes, key) in moved.iter().rev() {
        if !dest.exists() {
            continue;
        }
        match fs::rename(dest, source) {
            Ok(()) => {
                state.moves_rolled_back += 1;
                if state.per_file.remove(key).is_some() {
                    metrics.rollback_file(*bytes);
                }
                debug!("rolled back {} -> {}", dest.display(), source.display());
            }
            Err(e) => {
                warn!(
                    "rollback failed for {} -> {}: {}",
                    dest.display(),
                    source.display(),
                    e
                );
                state.rollback_failures.push(RollbackFailure {
                    source: source.clone(),
                    destination: dest.clone(),
                    detail: e.to_string(),
                });
            }
        }
    }
}

/// Where a plan item lands under the destination root
fn destination_for(item: &PlanItem, root: &Path) -> Result<PathBuf> {
    match &item.relative {
        Some(rel) => {
            ensure_contained(rel)?;
            Ok(root.join(rel))
        }
        None => {
            let name = item.source.file_name().ok_or_else(|| CustodyError::DestinationWrite {
                path: item.source.clone(),
                detail: "source has no file name".to_string(),
            })?;
            Ok(root.join(name))
        }
    }
}

/// Evidence drives must never be escaped through a crafted relative path
fn ensure_contained(rel: &Path) -> Result<()> {
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            _ => {
                return Err(CustodyError::DestinationWrite {
                    path: rel.to_path_buf(),
                    detail: "relative path escapes the destination root".to_string(),
                })
            }
        }
    }
    Ok(())
}

fn outcome_key(item: &PlanItem) -> String {
    match &item.relative {
        Some(rel) => rel.to_string_lossy().into_owned(),
        None => item
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| item.source.display().to_string()),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::planner::ItemKind;
    use tempfile::tempdir;

    #[test]
    fn test_ensure_contained_rejects_escapes() {
        assert!(ensure_contained(Path::new("a/b/c.txt")).is_ok());
        assert!(ensure_contained(Path::new("../outside.txt")).is_err());
        assert!(ensure_contained(Path::new("a/../../outside.txt")).is_err());
        #[cfg(unix)]
        assert!(ensure_contained(Path::new("/abs/path.txt")).is_err());
    }

    #[test]
    fn test_destination_for_flat_uses_basename() {
        let item = PlanItem {
            kind: ItemKind::File,
            source: PathBuf::from("/in/photo.jpg"),
            relative: None,
        };
        let dest = destination_for(&item, Path::new("/out")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/photo.jpg"));
    }

    #[test]
    fn test_destination_for_preserved_joins_relative() {
        let item = PlanItem {
            kind: ItemKind::File,
            source: PathBuf::from("/in/case/photo.jpg"),
            relative: Some(PathBuf::from("case/photo.jpg")),
        };
        let dest = destination_for(&item, Path::new("/out")).unwrap();
        assert_eq!(dest, PathBuf::from("/out/case/photo.jpg"));
    }

    #[test]
    fn test_outcome_key_prefers_relative() {
        let item = PlanItem {
            kind: ItemKind::File,
            source: PathBuf::from("/in/case/photo.jpg"),
            relative: Some(PathBuf::from("case/photo.jpg")),
        };
        assert_eq!(outcome_key(&item), "case/photo.jpg");
    }

    #[test]
    fn test_ask_policy_resolves_to_copy() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();

        let operation = Operation::new(
            Options {
                same_drive_policy: SameDrivePolicy::Ask,
                ..Options::default()
            },
            Callbacks::new(),
        );
        assert_eq!(
            operation.resolve_mode(&[file], dir.path()),
            RunMode::Copy
        );
    }

    #[test]
    fn test_always_move_on_same_device_resolves_to_move() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("a.txt");
        std::fs::write(&file, b"x").unwrap();
        let dest = dir.path().join("out");
        std::fs::create_dir_all(&dest).unwrap();

        let operation = Operation::new(
            Options {
                same_drive_policy: SameDrivePolicy::AlwaysMove,
                ..Options::default()
            },
            Callbacks::new(),
        );
        assert_eq!(operation.resolve_mode(&[file], &dest), RunMode::Move);
    }

    #[test]
    fn test_always_move_with_missing_selection_falls_back_to_copy() {
        let dir = tempdir().unwrap();
        let operation = Operation::new(
            Options {
                same_drive_policy: SameDrivePolicy::AlwaysMove,
                ..Options::default()
            },
            Callbacks::new(),
        );
        // Unresolvable probe answers false, which forces copy mode
        assert_eq!(
            operation.resolve_mode(
                &[PathBuf::from("/nonexistent/selection")],
                dir.path()
            ),
            RunMode::Copy
        );
    }
}
