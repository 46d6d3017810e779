/*!
 * Item planner: expands user selections into a flat operation plan
 *
 * A plan is immutable once built. Unreadable entries become warnings, never
 * hard failures; a single broken link must not sink an evidence run.
 */

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{CustodyError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    File,
    Directory,
}

/// One planned operation: a source and where it lands relative to the
/// destination root. `relative = None` places the source's basename directly
/// under the root (flat mode).
#[derive(Debug, Clone)]
pub struct PlanItem {
    pub kind: ItemKind,
    pub source: PathBuf,
    pub relative: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanWarningKind {
    /// Source file missing or statting it failed; the file is excluded
    UnreadableSource,
    /// A directory entry could not be read during the walk
    UnreadableEntry,
    /// The preserved relative path could not be computed; basename used
    FlattenedPath,
}

#[derive(Debug, Clone, Serialize)]
pub struct PlanWarning {
    pub kind: PlanWarningKind,
    pub path: PathBuf,
    pub detail: String,
}

/// Materialised plan: ordered items, the empty-directory set, and totals
#[derive(Debug, Default)]
pub struct Plan {
    pub items: Vec<PlanItem>,
    pub empty_dirs: BTreeSet<PathBuf>,
    pub file_count: u64,
    pub total_bytes: u64,
    pub warnings: Vec<PlanWarning>,
}

impl Plan {
    pub fn file_items(&self) -> impl Iterator<Item = &PlanItem> {
        self.items.iter().filter(|i| i.kind == ItemKind::File)
    }

    fn warn(&mut self, kind: PlanWarningKind, path: &Path, detail: String) {
        warn!("planning warning for {}: {}", path.display(), detail);
        self.warnings.push(PlanWarning {
            kind,
            path: path.to_path_buf(),
            detail,
        });
    }
}

/// Build a plan from user selections.
///
/// Structure preservation keeps the immediate containing folder name: the
/// rebase root for file selections is the parent of their deepest shared
/// directory, and for a directory selection it is the directory's own parent.
pub fn build_plan(selections: &[PathBuf], preserve_structure: bool) -> Result<Plan> {
    if selections.is_empty() {
        return Err(CustodyError::Planning(
            "no files or folders selected".to_string(),
        ));
    }

    let mut plan = Plan::default();

    let file_selections: Vec<&PathBuf> = selections.iter().filter(|p| p.is_file()).collect();
    let common_root = if preserve_structure && !file_selections.is_empty() {
        file_common_root(&file_selections)
    } else {
        None
    };
    if let Some(root) = &common_root {
        debug!("common root for structure preservation: {}", root.display());
    }

    for selection in selections {
        if selection.is_file() {
            let relative = match (&common_root, preserve_structure) {
                (Some(root), true) => match selection.strip_prefix(root) {
                    Ok(rel) => Some(rel.to_path_buf()),
                    Err(_) => {
                        plan.warn(
                            PlanWarningKind::FlattenedPath,
                            selection,
                            format!("cannot rebase onto {}; using filename", root.display()),
                        );
                        selection.file_name().map(PathBuf::from)
                    }
                },
                _ => None,
            };
            add_file(&mut plan, selection, relative);
        } else if selection.is_dir() {
            walk_directory(&mut plan, selection, preserve_structure);
        } else {
            plan.warn(
                PlanWarningKind::UnreadableSource,
                selection,
                "selection does not exist or is not a regular file or directory".to_string(),
            );
        }
    }

    collect_empty_dirs(&mut plan);

    debug!(
        "plan built: {} files, {} bytes, {} empty dirs, {} warnings",
        plan.file_count,
        plan.total_bytes,
        plan.empty_dirs.len(),
        plan.warnings.len()
    );

    Ok(plan)
}

fn add_file(plan: &mut Plan, source: &Path, relative: Option<PathBuf>) {
    match std::fs::metadata(source) {
        Ok(meta) => {
            plan.total_bytes += meta.len();
            plan.file_count += 1;
            plan.items.push(PlanItem {
                kind: ItemKind::File,
                source: source.to_path_buf(),
                relative,
            });
        }
        Err(e) => {
            plan.warn(
                PlanWarningKind::UnreadableSource,
                source,
                format!("cannot stat source: {}", e),
            );
        }
    }
}

fn walk_directory(plan: &mut Plan, dir: &Path, preserve_structure: bool) {
    // Rebase against the parent so the directory's own name survives
    let base = dir.parent().unwrap_or(dir).to_path_buf();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                let path = e
                    .path()
                    .map(Path::to_path_buf)
                    .unwrap_or_else(|| dir.to_path_buf());
                plan.warn(
                    PlanWarningKind::UnreadableEntry,
                    &path,
                    format!("cannot read entry: {}", e),
                );
                continue;
            }
        };

        if entry.file_type().is_file() {
            let relative = if preserve_structure {
                match entry.path().strip_prefix(&base) {
                    Ok(rel) => Some(rel.to_path_buf()),
                    Err(_) => {
                        plan.warn(
                            PlanWarningKind::FlattenedPath,
                            entry.path(),
                            format!("cannot rebase onto {}; using filename", base.display()),
                        );
                        entry.path().file_name().map(PathBuf::from)
                    }
                }
            } else {
                None
            };
            add_file(plan, entry.path(), relative);
        } else if entry.file_type().is_dir() && preserve_structure {
            if let Ok(rel) = entry.path().strip_prefix(&base) {
                plan.items.push(PlanItem {
                    kind: ItemKind::Directory,
                    source: entry.path().to_path_buf(),
                    relative: Some(rel.to_path_buf()),
                });
            }
        }
    }
}

/// Directories with no planned file beneath them form the empty-directory set
fn collect_empty_dirs(plan: &mut Plan) {
    let file_relatives: Vec<&PathBuf> = plan
        .items
        .iter()
        .filter(|i| i.kind == ItemKind::File)
        .filter_map(|i| i.relative.as_ref())
        .collect();

    for item in plan.items.iter().filter(|i| i.kind == ItemKind::Directory) {
        if let Some(rel) = &item.relative {
            let has_file = file_relatives.iter().any(|f| f.starts_with(rel));
            if !has_file {
                plan.empty_dirs.insert(rel.clone());
            }
        }
    }
}

/// Deepest directory that is an ancestor of every file selection, then one
/// level further up so the shared containing folder name is retained
fn file_common_root(files: &[&PathBuf]) -> Option<PathBuf> {
    let first = files.first()?;
    let mut ancestor = first.parent()?.to_path_buf();

    for file in files.iter().skip(1) {
        while !file.starts_with(&ancestor) {
            match ancestor.parent() {
                Some(parent) => ancestor = parent.to_path_buf(),
                // No shared ancestor at all; fall back to the first parent
                None => return first.parent().and_then(Path::parent).map(Path::to_path_buf),
            }
        }
    }

    match ancestor.parent() {
        Some(parent) => Some(parent.to_path_buf()),
        None => Some(ancestor),
    }
}
