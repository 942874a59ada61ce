use ignore::{DirEntry, WalkBuilder};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ComparisonOptions;
use crate::filter::Filter;
use crate::fingerprint::try_fingerprint;
use crate::models::{ErrorEntry, FileInfo, Fingerprint};

/// Everything one pass over a root produced.
#[derive(Debug, Default)]
pub struct CollectedTree {
    pub entries: HashMap<String, FileInfo>,
    pub errors: Vec<ErrorEntry>,
}

struct PendingEntry {
    rel_path: String,
    path: PathBuf,
    meta: Metadata,
    is_dir: bool,
}

/// Slash-separated path of `path` below `root`. `None` for the root itself.
pub fn rel_path_of(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    let parts: Vec<String> = rel
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

#[cfg(unix)]
pub fn permission_string(meta: &Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    let mut out = String::with_capacity(9);
    for shift in [6u32, 3, 0] {
        let bits = (mode >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

#[cfg(not(unix))]
pub fn permission_string(meta: &Metadata) -> String {
    if meta.permissions().readonly() {
        "r--".to_string()
    } else {
        "rw-".to_string()
    }
}

fn walk_error_path(err: &ignore::Error) -> PathBuf {
    match err {
        ignore::Error::WithPath { path, .. } => path.clone(),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => {
            walk_error_path(err)
        }
        ignore::Error::Loop { child, .. } => child.clone(),
        _ => PathBuf::from("?"),
    }
}

/// Walks `root` and fingerprints every file that survives the filter.
///
/// Excluded directories are pruned before descent. Entries that cannot be
/// read are logged and recorded in `errors`; the walk carries on. Symlinks are
/// skipped unless `follow_symlinks` is set. The root itself is never included.
/// Fingerprinting runs on the current rayon pool.
pub fn collect(root: &Path, options: &ComparisonOptions, filter: Arc<Filter>) -> CollectedTree {
    let mut tree = CollectedTree::default();
    let mut pending = Vec::new();

    let prune_root = root.to_path_buf();
    let prune_filter = Arc::clone(&filter);
    let mut builder = WalkBuilder::new(root);
    builder
        .standard_filters(false)
        .follow_links(options.follow_symlinks)
        .filter_entry(move |entry: &DirEntry| {
            let Some(rel) = rel_path_of(&prune_root, entry.path()) else {
                return true;
            };
            let is_dir = entry.file_type().is_some_and(|ft| ft.is_dir());
            if prune_filter.should_exclude(&rel, is_dir) {
                debug!(path = %rel, is_dir, "Excluded by filter");
                return false;
            }
            true
        });

    for result in builder.build() {
        let entry = match result {
            Ok(e) => e,
            Err(err) => {
                warn!(error = %err, "Failed to read directory entry");
                tree.errors.push(ErrorEntry {
                    path: walk_error_path(&err),
                    error: err.to_string(),
                });
                continue;
            }
        };

        let Some(rel_path) = rel_path_of(root, entry.path()) else {
            continue;
        };

        let Some(ft) = entry.file_type() else {
            continue;
        };
        if ft.is_symlink() {
            debug!(path = %rel_path, "Skipping symlink");
            continue;
        }
        if !ft.is_dir() && !ft.is_file() {
            debug!(path = %rel_path, "Skipping special file");
            continue;
        }

        match entry.metadata() {
            Ok(meta) => pending.push(PendingEntry {
                rel_path,
                path: entry.path().to_path_buf(),
                meta,
                is_dir: ft.is_dir(),
            }),
            Err(err) => {
                warn!(path = %entry.path().display(), error = %err, "Failed to stat entry");
                tree.errors.push(ErrorEntry {
                    path: entry.path().to_path_buf(),
                    error: err.to_string(),
                });
            }
        }
    }

    let fingerprinted: Vec<(FileInfo, Option<ErrorEntry>)> = pending
        .into_par_iter()
        .map(|p| {
            let (fingerprint, error) = if p.is_dir {
                (Fingerprint::none(), None)
            } else {
                match try_fingerprint(&p.path, options.max_file_size, options.algo) {
                    Ok(fp) => (fp, None),
                    Err(e) => {
                        warn!(path = %p.path.display(), error = %e, "Failed to fingerprint file");
                        (
                            Fingerprint::error(),
                            Some(ErrorEntry {
                                path: p.path.clone(),
                                error: e.to_string(),
                            }),
                        )
                    }
                }
            };
            let info = FileInfo {
                rel_path: p.rel_path,
                size: if p.is_dir { 0 } else { p.meta.len() },
                modified: p.meta.modified().ok(),
                is_dir: p.is_dir,
                fingerprint,
                permissions: permission_string(&p.meta),
            };
            (info, error)
        })
        .collect();

    for (info, error) in fingerprinted {
        if let Some(error) = error {
            tree.errors.push(error);
        }
        tree.entries.insert(info.rel_path.clone(), info);
    }

    debug!(
        root = %root.display(),
        entries = tree.entries.len(),
        errors = tree.errors.len(),
        "Collected tree"
    );
    tree
}
