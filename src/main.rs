mod action;
mod compare;
mod config;
mod error;
mod execute;
mod filter;
mod fingerprint;
mod generate;
mod gitignore;
mod logging;
mod models;
mod parser;
mod report;
mod validate;
mod walk;

#[cfg(test)]
mod tests;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use colored::*;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::compare::{ComparisonEngine, ExitStatus, exit_status, sort_results};
use crate::config::{CliOverrides, FileConfig};
use crate::execute::{ExecuteOptions, execute};
use crate::generate::{GenerateOptions, generate};
use crate::models::{HashAlgo, OutputFormat};
use crate::report::{
    ReportConfig, format_execution_result, generate_execution_summary_text, generate_json_report,
    generate_summary_text, generate_text_report, print_action_file_error, print_error_entry,
    write_report,
};
use crate::validate::validate;

#[cfg(target_env = "musl")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, help_template = "{before-help}{name} {version}\n{author-with-newline}{about-with-newline}\n{usage-heading} {usage} \n\n {all-args} {after-help}")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// More diagnostics on stderr (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only report errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compare two folders, optionally writing an action file
    Diff(DiffArgs),
    /// Check an edited action file against the folders without changing anything
    Validate(PlanArgs),
    /// Show what applying an action file would do
    DryRun(PlanArgs),
    /// Apply an edited action file
    Apply(PlanArgs),
}

#[derive(Args, Debug)]
struct DiffArgs {
    /// Left folder
    left: PathBuf,
    /// Right folder
    right: PathBuf,

    /// Write an action file here instead of listing results
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// List identical paths too
    #[arg(long)]
    include_identical: bool,

    /// Format for the result listing
    #[arg(short = 'f', long, value_enum, default_value_t = OutputFormat::Txt)]
    format: OutputFormat,

    /// Show sizes, hashes and permissions for each result
    #[arg(short, long)]
    details: bool,

    /// Exclude entries whose name matches (exact or glob)
    #[arg(long = "exclude-name", value_name = "PATTERN")]
    exclude_names: Vec<String>,

    /// Exclude a relative path and everything under it
    #[arg(long = "exclude-path", value_name = "PATH")]
    exclude_paths: Vec<String>,

    /// Exclude files with this extension
    #[arg(long = "exclude-ext", value_name = "EXT")]
    exclude_extensions: Vec<String>,

    /// Also exclude what each folder's .gitignore lists
    #[arg(long)]
    gitignore: bool,

    /// Descend through symbolic links
    #[arg(long)]
    follow_symlinks: bool,

    /// Do not report or copy permissions
    #[arg(long)]
    ignore_permissions: bool,

    /// Compare files larger than this by size and mtime instead of content
    #[arg(long, value_name = "BYTES")]
    max_file_size: Option<u64>,

    /// Worker threads (default: one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    #[arg(short, long, value_enum)]
    algo: Option<HashAlgo>,

    /// Config file (default: ./cmpact.toml if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Exit with 1 when differences are found
    #[arg(long)]
    exit_code: bool,
}

#[derive(Args, Debug)]
struct PlanArgs {
    /// Action file produced by `diff -o`
    action_file: PathBuf,

    /// Left folder (default: from the action file header)
    #[arg(long)]
    left: Option<PathBuf>,

    /// Right folder (default: from the action file header)
    #[arg(long)]
    right: Option<PathBuf>,

    /// Do not replicate permissions when copying
    #[arg(long)]
    ignore_permissions: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlanMode {
    Validate,
    DryRun,
    Apply,
}

fn exit_code(status: &ExitStatus) -> i32 {
    match status {
        ExitStatus::Success => 0,
        ExitStatus::Diff => 1,
        ExitStatus::Error => 2,
    }
}

fn print_banner(title: &str) {
    if io::stdout().is_terminal() {
        println!("{}", "==============================================".bright_blue());
        println!("  {}", title);
        println!("{}", "==============================================".bright_blue());
    }
}

fn run_diff(args: DiffArgs) -> Result<ExitStatus> {
    let file_config = FileConfig::discover(args.config.as_deref())?;
    if let Some((ref path, _)) = file_config {
        info!(path = %path.display(), "Loaded config file");
    }

    let overrides = CliOverrides {
        exclude_names: args.exclude_names,
        exclude_paths: args.exclude_paths,
        exclude_extensions: args.exclude_extensions,
        follow_symlinks: args.follow_symlinks,
        ignore_permissions: args.ignore_permissions,
        max_file_size: args.max_file_size,
        threads: args.threads,
        algo: args.algo,
        gitignore: args.gitignore,
    };
    let (mut options, use_gitignore) =
        config::merge(file_config.as_ref().map(|(_, cfg)| cfg), overrides);
    if use_gitignore {
        for root in [&args.left, &args.right] {
            gitignore::load(root)?.merge_into(&mut options);
        }
    }

    if args.format == OutputFormat::Txt && args.output.is_none() {
        print_banner("Folder Comparison");
    }

    let engine = ComparisonEngine::new(options)?;
    let (mut results, summary) = engine.compare(&args.left, &args.right)?;
    sort_results(&mut results);

    let report_conf = ReportConfig {
        algo: engine.options().algo,
        workers: engine.workers(),
        verbose: args.details,
    };

    if let Some(ref out) = args.output {
        for e in &summary.errors {
            print_error_entry(e);
        }
        let doc = generate(
            &results,
            &args.left,
            &args.right,
            &summary,
            GenerateOptions {
                include_identical: args.include_identical,
                permission_hints: !engine.options().ignore_permissions,
            },
        );
        write_report(&doc, Some(out))?;
        for line in generate_summary_text(&summary, &report_conf) {
            println!("{}", line);
        }
    } else {
        let shown: Vec<_> = results
            .iter()
            .filter(|r| args.include_identical || r.status != models::Status::Identical)
            .cloned()
            .collect();
        let output = match args.format {
            OutputFormat::Txt => generate_text_report(&shown, &summary, &report_conf),
            OutputFormat::Json => generate_json_report(&shown, &summary)?,
        };
        write_report(&output, None)?;
    }

    match exit_status(&summary) {
        ExitStatus::Diff if !args.exit_code => Ok(ExitStatus::Success),
        status => Ok(status),
    }
}

fn resolve_root(given: Option<PathBuf>, recorded: Option<&String>, side: &str) -> Result<PathBuf> {
    given
        .or_else(|| recorded.map(PathBuf::from))
        .with_context(|| format!("No {side} folder: pass --{side} or keep the '# {}:' header line", capitalize(side)))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn run_plan(args: PlanArgs, mode: PlanMode) -> Result<ExitStatus> {
    let text = fs::read_to_string(&args.action_file)
        .with_context(|| format!("Failed to read action file {}", args.action_file.display()))?;

    let file = match parser::parse(&text) {
        Ok(file) => file,
        Err(e) => {
            print_action_file_error(&e);
            return Ok(ExitStatus::Error);
        }
    };

    let left = resolve_root(args.left, file.header.left_root.as_ref(), "left")?;
    let right = resolve_root(args.right, file.header.right_root.as_ref(), "right")?;
    check_root(&left, "left")?;
    check_root(&right, "right")?;

    let report = match validate(&file, &left, &right) {
        Ok(report) => report,
        Err(e) => {
            print_action_file_error(&e);
            return Ok(ExitStatus::Error);
        }
    };
    for w in &report.warnings {
        eprintln!("[{}] {}", "WARN".yellow().bold(), w);
    }

    if mode == PlanMode::Validate {
        println!(
            "{} {} action(s) ready, {} ignored",
            "Valid:".green().bold(),
            report.checked,
            file.items.len() - report.checked
        );
        return Ok(ExitStatus::Success);
    }

    let dry_run = mode == PlanMode::DryRun;
    print_banner(if dry_run { "Action File Dry Run" } else { "Applying Action File" });
    if dry_run && io::stdout().is_terminal() {
        println!("{} {}", "DRY RUN: No changes will be made.".yellow().bold(), "(Use apply to make changes)".dimmed());
    }

    let (summary, results) = execute(
        &file,
        &left,
        &right,
        ExecuteOptions {
            dry_run,
            ignore_permissions: args.ignore_permissions,
        },
    )?;

    for result in &results {
        println!("{}", format_execution_result(result));
    }
    println!();
    for line in generate_execution_summary_text(&summary) {
        println!("{}", line);
    }

    if summary.failed > 0 {
        eprintln!(
            "{} {} of {} action(s) failed; re-run diff to review what is left",
            "error:".red().bold(),
            summary.failed,
            summary.attempted
        );
        Ok(ExitStatus::Error)
    } else {
        Ok(ExitStatus::Success)
    }
}

fn check_root(root: &Path, side: &str) -> Result<()> {
    if !root.is_dir() {
        anyhow::bail!("{} folder {} is not a directory", side, root.display());
    }
    Ok(())
}

fn run(cli: Cli) -> Result<ExitStatus> {
    match cli.command {
        Command::Diff(args) => run_diff(args),
        Command::Validate(args) => run_plan(args, PlanMode::Validate),
        Command::DryRun(args) => run_plan(args, PlanMode::DryRun),
        Command::Apply(args) => run_plan(args, PlanMode::Apply),
    }
}

fn main() {
    let cli = Cli::parse();
    let diagnostics = logging::init(cli.verbose, cli.quiet);

    let code = match run(cli) {
        Ok(status) => exit_code(&status),
        Err(e) => {
            eprintln!("{} {:#}", "error:".red().bold(), e);
            2
        }
    };

    drop(diagnostics);
    std::process::exit(code);
}
