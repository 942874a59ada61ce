use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, IsTerminal, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::action::{ActionFile, ActionItem, ActionType};

pub const DRY_RUN_PREFIX: &str = "DRY RUN: Would ";

#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOptions {
    pub dry_run: bool,
    pub ignore_permissions: bool,
}

/// Outcome of one non-ignored action.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    pub line: usize,
    pub action: ActionType,
    pub path: String,
    pub success: bool,
    pub error: Option<String>,
    pub bytes: u64,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionSummary {
    pub dry_run: bool,
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub created: usize,
    pub overwritten: usize,
    pub deleted: usize,
    pub bytes: u64,
    pub errors: Vec<String>,
    #[serde(skip)]
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Created,
    Overwritten,
    Deleted,
    AlreadyAbsent,
    Nothing,
}

/// One filesystem step. `plan` is the same text in dry and real runs.
struct Step {
    plan: String,
    outcome: Outcome,
    bytes: u64,
    error: Option<String>,
}

impl Step {
    fn failed(plan: String, error: String) -> Self {
        Step {
            plan,
            outcome: Outcome::Nothing,
            bytes: 0,
            error: Some(error),
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn render_message(plan: &str, dry_run: bool) -> String {
    if dry_run {
        format!("{}{}", DRY_RUN_PREFIX, plan)
    } else {
        capitalize(plan)
    }
}

fn exists(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

/// True when `dest` is the very entry `source` names, through any path.
#[cfg(unix)]
fn same_entry(source: &Path, dest: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;
    match (fs::metadata(source), fs::metadata(dest)) {
        (Ok(a), Ok(b)) => a.dev() == b.dev() && a.ino() == b.ino(),
        _ => false,
    }
}

#[cfg(not(unix))]
fn same_entry(source: &Path, dest: &Path) -> bool {
    match (fs::canonicalize(source), fs::canonicalize(dest)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn remove_entry(path: &Path) -> io::Result<()> {
    if fs::symlink_metadata(path)?.is_dir() {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    }
}

fn stream_copy(source: &Path, dest: &Path) -> io::Result<u64> {
    let mut reader = BufReader::new(File::open(source)?);
    let mut writer = BufWriter::new(File::create(dest)?);
    let bytes = io::copy(&mut reader, &mut writer)?;
    writer.flush()?;
    Ok(bytes)
}

fn copy_entry(
    rel: &str,
    src_root: &Path,
    dst_root: &Path,
    direction: &str,
    options: ExecuteOptions,
) -> Step {
    let source = src_root.join(rel);
    let dest = dst_root.join(rel);

    let src_meta = match fs::metadata(&source) {
        Ok(m) => m,
        Err(e) => {
            return Step::failed(
                format!("copy {}: {}", direction, rel),
                format!("source {} is not readable: {}", source.display(), e),
            );
        }
    };

    // Decided before touching anything, so dry and real runs agree.
    let existed = exists(&dest);
    let outcome = if existed {
        Outcome::Overwritten
    } else {
        Outcome::Created
    };
    let size = if src_meta.is_dir() { 0 } else { src_meta.len() };
    let kind = if src_meta.is_dir() { "directory" } else { "file" };
    let plan = format!(
        "copy {} {}: {} ({}, {} bytes)",
        kind,
        direction,
        rel,
        if existed { "overwrite" } else { "create" },
        size
    );

    // Opening the destination for writing would truncate the source.
    if existed && same_entry(&source, &dest) {
        return Step::failed(
            plan,
            format!("{} and {} are the same entry", source.display(), dest.display()),
        );
    }

    if options.dry_run {
        return Step {
            plan,
            outcome,
            bytes: size,
            error: None,
        };
    }

    let result = (|| -> io::Result<u64> {
        if src_meta.is_dir() {
            if existed && !fs::symlink_metadata(&dest)?.is_dir() {
                fs::remove_file(&dest)?;
            }
            fs::create_dir_all(&dest)?;
            return Ok(0);
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        if existed && fs::symlink_metadata(&dest)?.is_dir() {
            fs::remove_dir_all(&dest)?;
        }
        stream_copy(&source, &dest)
    })();

    match result {
        Ok(bytes) => {
            if !options.ignore_permissions
                && let Err(e) = fs::set_permissions(&dest, src_meta.permissions())
            {
                warn!(path = %dest.display(), error = %e, "Failed to replicate permissions");
            }
            Step {
                plan,
                outcome,
                bytes,
                error: None,
            }
        }
        Err(e) => Step {
            plan,
            outcome: Outcome::Nothing,
            bytes: 0,
            error: Some(format!("{}: {}", dest.display(), e)),
        },
    }
}

/// A target that is already gone counts as done, so re-running a plan
/// never fails on deletes it already carried out.
fn delete_entry(rel: &str, root: &Path, side: &str, dry_run: bool) -> Step {
    let target = root.join(rel);
    let meta = match fs::symlink_metadata(&target) {
        Ok(m) => m,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Step {
                plan: format!("delete {}: {} (already absent)", side, rel),
                outcome: Outcome::AlreadyAbsent,
                bytes: 0,
                error: None,
            };
        }
        Err(e) => {
            return Step::failed(
                format!("delete {}: {}", side, rel),
                format!("{}: {}", target.display(), e),
            );
        }
    };

    let size = if meta.is_dir() { 0 } else { meta.len() };
    let plan = format!(
        "delete {} {}: {} ({} bytes)",
        if meta.is_dir() { "directory" } else { "file" },
        side,
        rel,
        size
    );
    if dry_run {
        return Step {
            plan,
            outcome: Outcome::Deleted,
            bytes: size,
            error: None,
        };
    }

    match remove_entry(&target) {
        Ok(()) => Step {
            plan,
            outcome: Outcome::Deleted,
            bytes: size,
            error: None,
        },
        Err(e) if e.kind() == io::ErrorKind::NotFound => Step {
            plan,
            outcome: Outcome::AlreadyAbsent,
            bytes: 0,
            error: None,
        },
        Err(e) => Step::failed(plan, format!("{}: {}", target.display(), e)),
    }
}

fn steps_for(item: &ActionItem, left: &Path, right: &Path, options: ExecuteOptions) -> Vec<Step> {
    let rel = item.path.as_str();
    match item.action {
        ActionType::Ignore => Vec::new(),
        ActionType::CopyToRight => vec![copy_entry(rel, left, right, "left -> right", options)],
        ActionType::CopyToLeft => vec![copy_entry(rel, right, left, "right -> left", options)],
        ActionType::DeleteLeft => vec![delete_entry(rel, left, "left", options.dry_run)],
        ActionType::DeleteRight => vec![delete_entry(rel, right, "right", options.dry_run)],
        // Each side is attempted even if the other fails.
        ActionType::DeleteBoth => vec![
            delete_entry(rel, left, "left", options.dry_run),
            delete_entry(rel, right, "right", options.dry_run),
        ],
        ActionType::Patch => vec![Step::failed(
            format!("patch {}", rel),
            "patch actions are reserved and cannot be executed".to_string(),
        )],
    }
}

/// Runs every non-ignored action in file order, one at a time.
///
/// Failures are recorded per action and never stop the queue. Dry runs take
/// the same decisions and stop short of the mutating call.
pub fn execute(
    file: &ActionFile,
    left_root: &Path,
    right_root: &Path,
    options: ExecuteOptions,
) -> Result<(ExecutionSummary, Vec<ExecutionResult>)> {
    let start_time = Instant::now();
    let mut summary = ExecutionSummary {
        dry_run: options.dry_run,
        ..Default::default()
    };
    let mut results = Vec::new();

    let pending: Vec<&ActionItem> = file.pending().collect();
    info!(actions = pending.len(), dry_run = options.dry_run, "Executing action file");

    let action_pb = if io::stderr().is_terminal() && !pending.is_empty() {
        let pb = ProgressBar::new(pending.len() as u64);
        pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [Elap>{elapsed_precise}] {msg}: {bar:40.cyan/blue} {pos}/{len} ({eta})")?);
        Some(pb)
    } else {
        None
    };

    for item in pending {
        if let Some(ref p) = action_pb {
            p.inc(1);
            p.set_message(format!("Processing {}", item.path));
        }

        let steps = steps_for(item, left_root, right_root, options);
        let mut bytes = 0u64;
        let mut messages = Vec::with_capacity(steps.len());
        let mut errors = Vec::new();

        for step in steps {
            messages.push(render_message(&step.plan, options.dry_run));
            match step.error {
                Some(err) => errors.push(err),
                None => {
                    bytes += step.bytes;
                    match step.outcome {
                        Outcome::Created => summary.created += 1,
                        Outcome::Overwritten => summary.overwritten += 1,
                        Outcome::Deleted => summary.deleted += 1,
                        Outcome::AlreadyAbsent | Outcome::Nothing => {}
                    }
                }
            }
        }

        summary.attempted += 1;
        summary.bytes += bytes;
        let success = errors.is_empty();
        let error = if success {
            summary.succeeded += 1;
            None
        } else {
            summary.failed += 1;
            let joined = errors.join("; ");
            warn!(line = item.line, path = %item.path, error = %joined, "Action failed");
            summary
                .errors
                .push(format!("line {}: [{}] {}: {}", item.line, item.action, item.path, joined));
            Some(joined)
        };

        results.push(ExecutionResult {
            line: item.line,
            action: item.action,
            path: item.path.clone(),
            success,
            error,
            bytes,
            message: messages.join("; "),
        });
    }

    if let Some(ref p) = action_pb {
        p.finish_with_message("Actions applied");
    }

    summary.elapsed = start_time.elapsed();
    info!(
        succeeded = summary.succeeded,
        failed = summary.failed,
        dry_run = options.dry_run,
        "Execution finished"
    );
    Ok((summary, results))
}
