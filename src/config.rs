use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::HashAlgo;

pub const DEFAULT_CONFIG_FILE: &str = "cmpact.toml";

/// Everything the comparison core needs to know, with no behavior of its own.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ComparisonOptions {
    pub exclude_names: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub follow_symlinks: bool,
    pub ignore_permissions: bool,
    /// Files larger than this are fingerprinted by size+mtime. 0 disables.
    pub max_file_size: u64,
    /// 0 means one worker per available core.
    pub parallel_workers: usize,
    pub algo: HashAlgo,
}

impl ComparisonOptions {
    pub fn add_exclude_names<I: IntoIterator<Item = String>>(&mut self, items: I) {
        extend_unique(&mut self.exclude_names, items);
    }

    pub fn add_exclude_paths<I: IntoIterator<Item = String>>(&mut self, items: I) {
        extend_unique(&mut self.exclude_paths, items);
    }

    pub fn add_exclude_extensions<I: IntoIterator<Item = String>>(&mut self, items: I) {
        extend_unique(&mut self.exclude_extensions, items);
    }
}

fn extend_unique<I: IntoIterator<Item = String>>(target: &mut Vec<String>, items: I) {
    for item in items {
        if !target.contains(&item) {
            target.push(item);
        }
    }
}

/// The `[compare]` table of `cmpact.toml`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompareSection {
    pub exclude_names: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub follow_symlinks: Option<bool>,
    pub ignore_permissions: Option<bool>,
    pub max_file_size: Option<u64>,
    pub parallel_workers: Option<usize>,
    pub algo: Option<HashAlgo>,
    pub gitignore: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub compare: CompareSection,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).context("Invalid config file")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Loads the explicit path if given, else `./cmpact.toml` when it exists.
    pub fn discover(explicit: Option<&Path>) -> Result<Option<(PathBuf, Self)>> {
        if let Some(path) = explicit {
            return Ok(Some((path.to_path_buf(), Self::load(path)?)));
        }
        let default = PathBuf::from(DEFAULT_CONFIG_FILE);
        if default.is_file() {
            let cfg = Self::load(&default)?;
            return Ok(Some((default, cfg)));
        }
        Ok(None)
    }
}

/// Command-line values, before merging with a config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub exclude_names: Vec<String>,
    pub exclude_paths: Vec<String>,
    pub exclude_extensions: Vec<String>,
    pub follow_symlinks: bool,
    pub ignore_permissions: bool,
    pub max_file_size: Option<u64>,
    pub threads: Option<usize>,
    pub algo: Option<HashAlgo>,
    pub gitignore: bool,
}

/// Lists are unioned (file entries first). Scalars given on the command line win.
pub fn merge(file: Option<&FileConfig>, cli: CliOverrides) -> (ComparisonOptions, bool) {
    let mut options = ComparisonOptions::default();
    let mut gitignore = cli.gitignore;

    if let Some(file) = file {
        let section = &file.compare;
        options.add_exclude_names(section.exclude_names.iter().cloned());
        options.add_exclude_paths(section.exclude_paths.iter().cloned());
        options.add_exclude_extensions(section.exclude_extensions.iter().cloned());
        options.follow_symlinks = section.follow_symlinks.unwrap_or(false);
        options.ignore_permissions = section.ignore_permissions.unwrap_or(false);
        options.max_file_size = section.max_file_size.unwrap_or(0);
        options.parallel_workers = section.parallel_workers.unwrap_or(0);
        options.algo = section.algo.unwrap_or_default();
        gitignore |= section.gitignore.unwrap_or(false);
    }

    options.add_exclude_names(cli.exclude_names);
    options.add_exclude_paths(cli.exclude_paths);
    options.add_exclude_extensions(cli.exclude_extensions);
    // Boolean flags can only switch a behavior on.
    options.follow_symlinks |= cli.follow_symlinks;
    options.ignore_permissions |= cli.ignore_permissions;
    if let Some(size) = cli.max_file_size {
        options.max_file_size = size;
    }
    if let Some(threads) = cli.threads {
        options.parallel_workers = threads;
    }
    if let Some(algo) = cli.algo {
        options.algo = algo;
    }

    (options, gitignore)
}
