use chrono::Local;
use std::path::Path;

use crate::action::{ActionType, SideSnapshot};
use crate::models::{CompareSummary, ComparisonResult, Status};

pub const TITLE: &str = "# cmpact action file";
pub const GENERATED_PREFIX: &str = "# Generated: ";
pub const LEFT_PREFIX: &str = "# Left:      ";
pub const RIGHT_PREFIX: &str = "# Right:     ";
pub const VERSION_PREFIX: &str = "# Version:   ";
/// Sits between an action line's path and its hints.
pub const HINT_SEPARATOR: &str = "   # ";
pub const HINT_JOIN: &str = " | ";

#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateOptions {
    pub include_identical: bool,
    /// Adds a `perms` hint when the two sides' permissions differ.
    pub permission_hints: bool,
}

fn hints(result: &ComparisonResult, permission_hints: bool) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(ref l) = result.left {
        out.push(format!("L: {}", SideSnapshot::from_info(l).hint()));
    }
    if let Some(ref r) = result.right {
        out.push(format!("R: {}", SideSnapshot::from_info(r).hint()));
    }
    if permission_hints
        && let (Some(l), Some(r)) = (&result.left, &result.right)
        && l.permissions != r.permissions
    {
        out.push(format!("perms {} != {}", l.permissions, r.permissions));
    }
    out
}

/// Renders one action line. Every line starts out as ignore.
fn render_line(result: &ComparisonResult, permission_hints: bool) -> String {
    let mut line = format!(
        "[{}] : {} : {}",
        ActionType::Ignore.token(),
        result.status.name(),
        result.path
    );
    let hints = hints(result, permission_hints);
    if !hints.is_empty() {
        line.push_str(HINT_SEPARATOR);
        line.push_str(&hints.join(HINT_JOIN));
    }
    line
}

/// Builds the action-file document for a comparison.
///
/// Lines follow the order of `results`; sort them first for a stable file.
pub fn generate(
    results: &[ComparisonResult],
    left_root: &Path,
    right_root: &Path,
    summary: &CompareSummary,
    options: GenerateOptions,
) -> String {
    let mut out = Vec::new();

    out.push(TITLE.to_string());
    out.push(format!(
        "{}{}",
        GENERATED_PREFIX,
        Local::now().format("%Y-%m-%d %H:%M:%S %z")
    ));
    out.push(format!("{}{}", LEFT_PREFIX, left_root.display()));
    out.push(format!("{}{}", RIGHT_PREFIX, right_root.display()));
    out.push(format!("{}{}", VERSION_PREFIX, env!("CARGO_PKG_VERSION")));
    out.push("#".to_string());
    out.push(format!(
        "# Summary: {} identical, {} modified, {} only in left, {} only in right",
        summary.identical, summary.modified, summary.only_left, summary.only_right
    ));
    if !summary.errors.is_empty() {
        out.push(format!(
            "# Warning: {} entries could not be read and are listed as MODIFIED or left out",
            summary.errors.len()
        ));
    }
    out.push("#".to_string());
    out.push("# Edit the token in brackets to choose an action:".to_string());
    for action in ActionType::ALL {
        out.push(format!(
            "#   [{}]{} {}",
            action.token(),
            " ".repeat(3 - action.token().len()),
            action.description()
        ));
    }
    out.push("#".to_string());
    out.push("# Format: [TOKEN] : STATUS : RELATIVE_PATH".to_string());
    out.push(String::new());

    let mut written = 0usize;
    for result in results {
        if result.status == Status::Identical && !options.include_identical {
            continue;
        }
        out.push(render_line(result, options.permission_hints));
        written += 1;
    }
    if written == 0 {
        out.push("# No differences found.".to_string());
    }

    let mut doc = out.join("\n");
    doc.push('\n');
    doc
}
