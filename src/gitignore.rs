use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::ComparisonOptions;
use crate::filter::has_glob_meta;

/// Exclude entries derived from `.gitignore` lines.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GitignoreExcludes {
    pub names: Vec<String>,
    pub paths: Vec<String>,
    pub extensions: Vec<String>,
    /// Lines with no exclude equivalent, dropped.
    pub unsupported: Vec<String>,
}

impl GitignoreExcludes {
    pub fn merge_into(self, options: &mut ComparisonOptions) {
        options.add_exclude_names(self.names);
        options.add_exclude_paths(self.paths);
        options.add_exclude_extensions(self.extensions);
    }
}

fn is_plain_extension_glob(pattern: &str) -> Option<&str> {
    let ext = pattern.strip_prefix("*.")?;
    if ext.is_empty() || ext.contains(['*', '?', '[', ']', '{', '}', '.', '/']) {
        None
    } else {
        Some(ext)
    }
}

/// Translates gitignore syntax into the filter's three exclude sets.
///
/// Negations (`!pattern`) and globs that span directories (`docs/*.md`)
/// cannot be expressed as excludes and are dropped.
pub fn translate(text: &str) -> GitignoreExcludes {
    let mut out = GitignoreExcludes::default();

    for raw in text.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if line.starts_with('!') {
            debug!(pattern = line, "Skipping gitignore negation");
            continue;
        }

        let pattern = line.trim_end_matches('/');
        if pattern.is_empty() {
            continue;
        }
        let anchored = pattern.starts_with('/');
        let pattern = pattern.trim_start_matches('/');
        let pattern = pattern.strip_prefix("**/").unwrap_or(pattern);

        if anchored || pattern.contains('/') {
            if has_glob_meta(pattern) {
                warn!(pattern = line, "Skipping gitignore glob with a directory part");
                out.unsupported.push(line.to_string());
                continue;
            }
            out.paths.push(pattern.to_string());
        } else if let Some(ext) = is_plain_extension_glob(pattern) {
            out.extensions.push(ext.to_string());
        } else {
            out.names.push(pattern.to_string());
        }
    }

    out
}

/// Reads `<root>/.gitignore` if it exists.
pub fn load(root: &Path) -> Result<GitignoreExcludes> {
    let path = root.join(".gitignore");
    if !path.is_file() {
        return Ok(GitignoreExcludes::default());
    }
    let text = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let excludes = translate(&text);
    debug!(
        path = %path.display(),
        names = excludes.names.len(),
        paths = excludes.paths.len(),
        extensions = excludes.extensions.len(),
        "Translated gitignore"
    );
    Ok(excludes)
}
