use globset::{Glob, GlobSet, GlobSetBuilder};
use std::collections::HashSet;
use tracing::warn;

use crate::config::ComparisonOptions;

/// Decides which relative paths take no part in a comparison.
///
/// Checked in order: base name (exact or glob), relative path (exact, prefix
/// or suffix), and for files only the extension (case-insensitive).
#[derive(Debug, Clone)]
pub struct Filter {
    name_literals: HashSet<String>,
    name_globs: GlobSet,
    paths: Vec<String>,
    extensions: HashSet<String>,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            name_literals: HashSet::new(),
            name_globs: GlobSet::empty(),
            paths: Vec::new(),
            extensions: HashSet::new(),
        }
    }
}

pub fn has_glob_meta(pattern: &str) -> bool {
    pattern.contains(['*', '?', '[', ']', '{', '}'])
}

pub fn normalize_rel(path: &str) -> String {
    let slashed = path.replace('\\', "/");
    let trimmed = slashed.trim_start_matches("./").trim_matches('/');
    trimmed.to_string()
}

impl Filter {
    pub fn new(names: &[String], paths: &[String], extensions: &[String]) -> Self {
        let mut name_literals = HashSet::new();
        let mut builder = GlobSetBuilder::new();
        let mut glob_count = 0usize;

        for pattern in names {
            if !has_glob_meta(pattern) {
                name_literals.insert(pattern.clone());
                continue;
            }
            match Glob::new(pattern) {
                Ok(glob) => {
                    builder.add(glob);
                    glob_count += 1;
                }
                Err(e) => {
                    warn!(pattern = %pattern, error = %e, "Malformed exclude glob, matching literally");
                    name_literals.insert(pattern.clone());
                }
            }
        }

        let name_globs = if glob_count == 0 {
            GlobSet::empty()
        } else {
            builder.build().unwrap_or_else(|e| {
                warn!(error = %e, "Failed to build exclude glob set, globs disabled");
                GlobSet::empty()
            })
        };

        let paths = paths
            .iter()
            .map(|p| normalize_rel(p))
            .filter(|p| !p.is_empty())
            .collect();

        let extensions = extensions
            .iter()
            .map(|ext| ext.trim_start_matches('.').to_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();

        Filter {
            name_literals,
            name_globs,
            paths,
            extensions,
        }
    }

    pub fn from_options(options: &ComparisonOptions) -> Self {
        Self::new(
            &options.exclude_names,
            &options.exclude_paths,
            &options.exclude_extensions,
        )
    }

    pub fn should_exclude(&self, rel_path: &str, is_dir: bool) -> bool {
        let rel = normalize_rel(rel_path);
        if rel.is_empty() {
            return false;
        }

        let base = rel.rsplit('/').next().unwrap_or(&rel);
        if self.name_literals.contains(base) || self.name_globs.is_match(base) {
            return true;
        }

        for p in &self.paths {
            if rel == *p
                || rel.strip_prefix(p.as_str()).is_some_and(|rest| rest.starts_with('/'))
                || rel.strip_suffix(p.as_str()).is_some_and(|head| head.ends_with('/'))
            {
                return true;
            }
        }

        if !is_dir && !self.extensions.is_empty() {
            if let Some((stem, ext)) = base.rsplit_once('.')
                && !stem.is_empty()
                && self.extensions.contains(&ext.to_lowercase())
            {
                return true;
            }
        }

        false
    }
}
