use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

use crate::action::{ActionFile, ActionItem, ActionType, SideSnapshot};
use crate::error::{ActionFileError, ValidationError};
use crate::filter::normalize_rel;

#[derive(Debug, Default)]
pub struct ValidationReport {
    /// Non-ignore items that passed.
    pub checked: usize,
    /// Things worth a look that do not block execution.
    pub warnings: Vec<String>,
}

fn canonical(root: &Path) -> PathBuf {
    fs::canonicalize(root).unwrap_or_else(|_| root.to_path_buf())
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// Rejects paths that would resolve outside a root.
fn unsafe_path_reason(path: &str) -> Option<&'static str> {
    if path.starts_with('/') || Path::new(path).is_absolute() {
        return Some("absolute paths are not allowed");
    }
    let mut has_normal = false;
    for component in Path::new(path).components() {
        match component {
            Component::ParentDir => return Some("'..' is not allowed in a relative path"),
            Component::Prefix(_) | Component::RootDir => {
                return Some("absolute paths are not allowed");
            }
            Component::Normal(_) => has_normal = true,
            Component::CurDir => {}
        }
    }
    if !has_normal {
        return Some("path does not name an entry below the roots");
    }
    None
}

fn stale_source(item: &ActionItem, snapshot: Option<&SideSnapshot>, source: &Path) -> Option<String> {
    let snapshot = snapshot?;
    let meta = fs::metadata(source).ok()?;
    if snapshot.is_dir != meta.is_dir() {
        return Some(format!(
            "line {}: {}: source changed type since the action file was generated",
            item.line, item.path
        ));
    }
    match snapshot.size {
        Some(size) if !meta.is_dir() && size != meta.len() => Some(format!(
            "line {}: {}: source size changed since generation ({} -> {} bytes)",
            item.line,
            item.path,
            size,
            meta.len()
        )),
        _ => None,
    }
}

/// Checks every action against the filesystem as it is now. Never mutates.
///
/// Copies need their source to exist and deletes their target; a delete on
/// both sides needs at least one of them. Duplicate paths, unsafe paths and
/// the reserved patch action are rejected, and so are roots that are the same
/// folder or nested in each other.
pub fn validate(
    file: &ActionFile,
    left_root: &Path,
    right_root: &Path,
) -> Result<ValidationReport, ActionFileError> {
    let (left_canon, right_canon) = (canonical(left_root), canonical(right_root));
    if left_canon.starts_with(&right_canon) || right_canon.starts_with(&left_canon) {
        return Err(ActionFileError::OverlappingRoots {
            left: left_canon,
            right: right_canon,
        });
    }

    let mut report = ValidationReport::default();
    let mut errors = Vec::new();
    let mut seen: HashMap<String, usize> = HashMap::new();

    for item in &file.items {
        let mut fail = |message: String| {
            errors.push(ValidationError {
                line: item.line,
                path: item.path.clone(),
                message,
            })
        };

        let key = normalize_rel(&item.path);
        if let Some(first) = seen.get(&key) {
            fail(format!("duplicate entry (first listed on line {})", first));
            continue;
        }
        seen.insert(key, item.line);

        if let Some(reason) = unsafe_path_reason(&item.path) {
            fail(reason.to_string());
            continue;
        }

        if item.action == ActionType::Ignore {
            continue;
        }
        if !item.action.is_executable() {
            fail(format!(
                "action [{}] is reserved and cannot be executed",
                item.action.token()
            ));
            continue;
        }

        let left = left_root.join(&item.path);
        let right = right_root.join(&item.path);

        let problem = match item.action {
            ActionType::CopyToRight if !exists(&left) => {
                Some("copy source is missing on the left".to_string())
            }
            ActionType::CopyToLeft if !exists(&right) => {
                Some("copy source is missing on the right".to_string())
            }
            ActionType::DeleteLeft if !exists(&left) => {
                Some("delete target is missing on the left".to_string())
            }
            ActionType::DeleteRight if !exists(&right) => {
                Some("delete target is missing on the right".to_string())
            }
            ActionType::DeleteBoth if !exists(&left) && !exists(&right) => {
                Some("delete target is missing on both sides".to_string())
            }
            _ => None,
        };

        if let Some(message) = problem {
            fail(message);
            continue;
        }

        let stale = match item.action {
            ActionType::CopyToRight => stale_source(item, item.left.as_ref(), &left),
            ActionType::CopyToLeft => stale_source(item, item.right.as_ref(), &right),
            _ => None,
        };
        if let Some(w) = stale {
            warn!("{}", w);
            report.warnings.push(w);
        }

        debug!(line = item.line, path = %item.path, action = %item.action, "Action valid");
        report.checked += 1;
    }

    if errors.is_empty() {
        Ok(report)
    } else {
        Err(ActionFileError::Validation(errors))
    }
}
