use anyhow::{Context, Result, bail};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::{ThreadPool, ThreadPoolBuilder};
use std::collections::HashSet;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Instant;
use tracing::{dispatcher, info};

use crate::config::ComparisonOptions;
use crate::filter::Filter;
use crate::logging;
use crate::models::{CompareMethod, CompareSummary, ComparisonResult, FileInfo, Status};
use crate::walk;

#[derive(Debug, PartialEq)]
pub enum ExitStatus {
    Success,
    Diff,
    Error,
}

/// Classifies a single path from what each side observed.
///
/// A fingerprint error on either side always yields `Modified`: two files that
/// could not be read are never reported as identical.
pub fn classify(path: &str, left: Option<&FileInfo>, right: Option<&FileInfo>) -> ComparisonResult {
    let (status, method) = match (left, right) {
        (Some(_), None) => (Status::OnlyLeft, CompareMethod::Existence),
        (None, Some(_)) => (Status::OnlyRight, CompareMethod::Existence),
        (None, None) => (Status::Modified, CompareMethod::Error),
        (Some(l), Some(r)) => match (l.is_dir, r.is_dir) {
            (true, true) => (Status::Identical, CompareMethod::Directory),
            (true, false) | (false, true) => (Status::Modified, CompareMethod::TypeMismatch),
            (false, false) => {
                if l.fingerprint.is_error() || r.fingerprint.is_error() {
                    (Status::Modified, CompareMethod::Error)
                } else if l.size != r.size {
                    (Status::Modified, CompareMethod::Size)
                } else if l.fingerprint.method == r.fingerprint.method
                    && l.fingerprint.id == r.fingerprint.id
                {
                    (Status::Identical, CompareMethod::Hash)
                } else {
                    (Status::Modified, CompareMethod::Hash)
                }
            }
        },
    };

    ComparisonResult {
        path: path.to_string(),
        status,
        left: left.cloned(),
        right: right.cloned(),
        method,
    }
}

/// Runs two tree walks and classifies the union of their paths on a bounded
/// worker pool.
pub struct ComparisonEngine {
    options: ComparisonOptions,
    filter: Arc<Filter>,
    pool: ThreadPool,
}

impl ComparisonEngine {
    /// Builds the worker pool. Workers log to whichever diagnostics sink is
    /// active on the calling thread at this point.
    pub fn new(options: ComparisonOptions) -> Result<Self> {
        let dispatch = logging::current();
        let pool = ThreadPoolBuilder::new()
            .num_threads(options.parallel_workers)
            .thread_name(|i| format!("cmpact-worker-{}", i))
            .spawn_handler(move |thread| {
                let dispatch = dispatch.clone();
                let mut b = std::thread::Builder::new();
                if let Some(name) = thread.name() {
                    b = b.name(name.to_owned());
                }
                if let Some(stack_size) = thread.stack_size() {
                    b = b.stack_size(stack_size);
                }
                b.spawn(move || {
                    let _guard = dispatcher::set_default(&dispatch);
                    thread.run()
                })?;
                Ok(())
            })
            .build()
            .context("Failed to build comparison worker pool")?;

        Ok(ComparisonEngine {
            filter: Arc::new(Filter::from_options(&options)),
            options,
            pool,
        })
    }

    pub fn options(&self) -> &ComparisonOptions {
        &self.options
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Results come back in completion order; sort them if order matters.
    pub fn compare(&self, left: &Path, right: &Path) -> Result<(Vec<ComparisonResult>, CompareSummary)> {
        let start_time = Instant::now();
        for (label, root) in [("left", left), ("right", right)] {
            if !root.is_dir() {
                bail!("{} root {} is not a directory", label, root.display());
            }
        }

        info!(left = %left.display(), right = %right.display(), workers = self.workers(), "Comparing");

        let (left_tree, right_tree) = self.pool.install(|| {
            rayon::join(
                || walk::collect(left, &self.options, Arc::clone(&self.filter)),
                || walk::collect(right, &self.options, Arc::clone(&self.filter)),
            )
        });

        let mut paths: HashSet<&str> = HashSet::with_capacity(left_tree.entries.len());
        paths.extend(left_tree.entries.keys().map(String::as_str));
        paths.extend(right_tree.entries.keys().map(String::as_str));

        let pb = if io::stderr().is_terminal() {
            let pb = ProgressBar::new(paths.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [Elap>{elapsed_precise}] [ {bar:40.cyan/blue} ] {pos}/{len} (Rema>{eta})")?
                    .progress_chars("#>- ")
            );
            pb.set_draw_target(indicatif::ProgressDrawTarget::stderr_with_hz(10));
            Some(pb)
        } else {
            None
        };

        let mut summary = CompareSummary::default();
        let mut results = Vec::with_capacity(paths.len());
        let (tx, rx) = mpsc::channel();

        self.pool.in_place_scope(|s| {
            for path in &paths {
                let tx = tx.clone();
                let l = left_tree.entries.get(*path);
                let r = right_tree.entries.get(*path);
                s.spawn(move |_| {
                    let _ = tx.send(classify(path, l, r));
                });
            }
            drop(tx);

            // Sole writer of the summary and the result list.
            for result in rx {
                if let Some(ref p) = pb {
                    p.inc(1);
                }
                summary.record(result.status);
                results.push(result);
            }
        });

        if let Some(ref p) = pb {
            p.finish_with_message("Comparison complete");
        }

        summary.errors.extend(left_tree.errors);
        summary.errors.extend(right_tree.errors);
        summary.elapsed = start_time.elapsed();

        info!(
            total = summary.total,
            identical = summary.identical,
            modified = summary.modified,
            only_left = summary.only_left,
            only_right = summary.only_right,
            errors = summary.errors.len(),
            "Comparison finished"
        );

        Ok((results, summary))
    }
}

pub fn sort_results(results: &mut [ComparisonResult]) {
    results.sort_by(|a, b| a.path.cmp(&b.path));
}

pub fn exit_status(summary: &CompareSummary) -> ExitStatus {
    if !summary.errors.is_empty() {
        ExitStatus::Error
    } else if summary.differences() > 0 {
        ExitStatus::Diff
    } else {
        ExitStatus::Success
    }
}
