use anyhow::{Context, Result};
use colored::*;
use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;

use crate::error::ActionFileError;
use crate::execute::{ExecutionResult, ExecutionSummary};
use crate::models::{CompareSummary, ComparisonResult, ErrorEntry, HashAlgo};

pub struct ReportConfig {
    pub algo: HashAlgo,
    pub workers: usize,
    pub verbose: bool,
}

pub fn print_error_entry(e: &ErrorEntry) {
    eprintln!(
        "[{}] {} ({})",
        "ERROR".red().on_white(),
        e.path.display(),
        e.error
    );
}

const CONTENT_WIDTH: usize = 47;

fn boxed(title: &str, rows: &[(&str, String, Color)]) -> Vec<String> {
    let mut output = Vec::new();

    output.push(format!("{}{}{}", "╔".bright_blue(), "═".repeat(CONTENT_WIDTH).bright_blue(), "╗".bright_blue()));

    let padding_total = CONTENT_WIDTH.saturating_sub(title.len());
    let padding_start = padding_total / 2;
    let padding_end = padding_total - padding_start;
    output.push(format!("{}{}{}{}{}",
        "║".bright_blue(),
        " ".repeat(padding_start),
        title.bold().bright_yellow(),
        " ".repeat(padding_end),
        "║".bright_blue()
    ));

    output.push(format!("{}{}{}", "╠".bright_blue(), "═".repeat(CONTENT_WIDTH).bright_blue(), "╣".bright_blue()));

    for (label, value, value_color) in rows {
        let colored_line = format!("  {} : {}",
            format!("{:<22}", label).bold().cyan(),
            value.bold().color(*value_color)
        );
        let uncolored_len = 2 + 22 + 3 + value.chars().count();
        let padding = " ".repeat(CONTENT_WIDTH.saturating_sub(uncolored_len));
        output.push(format!("{}{}{}{}", "║".bright_blue(), colored_line, padding, "║".bright_blue()));
    }

    output.push(format!("{}{}{}", "╚".bright_blue(), "═".repeat(CONTENT_WIDTH).bright_blue(), "╝".bright_blue()));

    output
}

pub fn generate_summary_text(summary: &CompareSummary, config: &ReportConfig) -> Vec<String> {
    let mut rows = vec![
        ("Algorithm", format!("{:?}", config.algo), Color::Magenta),
        ("Workers", config.workers.to_string(), Color::Magenta),
        ("Total paths", summary.total.to_string(), Color::Blue),
        ("Identical", summary.identical.to_string(), Color::Green),
        ("Modified", summary.modified.to_string(), Color::Red),
        ("Only in left", summary.only_left.to_string(), Color::Blue),
        ("Only in right", summary.only_right.to_string(), Color::Blue),
    ];
    if !summary.errors.is_empty() {
        rows.push(("Errors", summary.errors.len().to_string(), Color::Red));
    }
    rows.push(("Time taken", format!("{:.2?}", summary.elapsed), Color::Yellow));
    boxed("Summary", &rows)
}

pub fn generate_execution_summary_text(summary: &ExecutionSummary) -> Vec<String> {
    let title = if summary.dry_run { "Dry Run Summary" } else { "Apply Summary" };
    let mut rows = vec![
        ("Actions attempted", summary.attempted.to_string(), Color::Blue),
        ("Succeeded", summary.succeeded.to_string(), Color::Green),
        ("Failed", summary.failed.to_string(), if summary.failed > 0 { Color::Red } else { Color::Green }),
        ("Files created", summary.created.to_string(), Color::Blue),
        ("Files overwritten", summary.overwritten.to_string(), Color::Yellow),
        ("Files deleted", summary.deleted.to_string(), Color::Red),
        ("Bytes", summary.bytes.to_string(), Color::Magenta),
    ];
    rows.push(("Time taken", format!("{:.2?}", summary.elapsed), Color::Yellow));
    boxed(title, &rows)
}

pub fn generate_text_report(
    results: &[ComparisonResult],
    summary: &CompareSummary,
    config: &ReportConfig,
) -> String {
    let mut output = String::new();

    for e in &summary.errors {
        output.push_str(&format!("[{}] {} ({})\n", "ERROR".red().on_white(), e.path.display(), e.error));
    }

    for result in results {
        output.push_str(&result.format_text(config.verbose));
    }

    output.push('\n');
    output.push_str(&generate_summary_text(summary, config).join("\n"));

    output
}

pub fn generate_json_report(results: &[ComparisonResult], summary: &CompareSummary) -> Result<String> {
    let output = serde_json::json!({
        "summary": {
            "total": summary.total,
            "identical": summary.identical,
            "modified": summary.modified,
            "only_in_left": summary.only_left,
            "only_in_right": summary.only_right,
            "errors": summary.errors,
            "time_taken": format!("{:.2?}", summary.elapsed),
        },
        "results": results,
    });

    Ok(serde_json::to_string_pretty(&output)?)
}

pub fn format_execution_result(result: &ExecutionResult) -> String {
    let tag = if result.success { "OK".green() } else { "FAIL".red().bold() };
    let mut line = format!("[{}] {}", tag, result.message);
    if let Some(ref err) = result.error {
        line.push_str(&format!("\n    {}", err.red()));
    }
    line
}

pub fn print_action_file_error(err: &ActionFileError) {
    let (heading, errors): (&str, Vec<String>) = match err {
        ActionFileError::Parse(errs) => (
            "Action file rejected: parse errors",
            errs.iter().map(|e| e.to_string()).collect(),
        ),
        ActionFileError::Validation(errs) => (
            "Action file rejected: validation errors",
            errs.iter().map(|e| e.to_string()).collect(),
        ),
        ActionFileError::OverlappingRoots { .. } => {
            ("Action file rejected: unusable folders", vec![err.to_string()])
        }
    };
    eprintln!("{}", heading.red().bold());
    for e in errors {
        eprintln!("  {} {}", "-".red(), e);
    }
}

pub fn write_report(output: &str, output_file: Option<&Path>) -> Result<()> {
    if let Some(path) = output_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        fs::write(path, output).with_context(|| format!("Failed to write {}", path.display()))?;
        if io::stdout().is_terminal() {
            println!("Saved to {}", path.display());
        }
    } else {
        for line in output.lines() {
            println!("{}", line);
        }
    }
    Ok(())
}
