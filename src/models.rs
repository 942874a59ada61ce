use chrono::{DateTime, Local};
use clap::ValueEnum;
use colored::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, SystemTime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgo {
    #[default]
    Sha256,
    Blake3,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Txt,
    Json,
}

/// How a file's content identity was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FingerprintMethod {
    /// Full 256-bit digest of the byte stream.
    ContentHash,
    /// Size + modification time, used above the configured size limit.
    SizeSurrogate,
    /// The file could not be read. Never equal to anything.
    Error,
    /// Directories carry no fingerprint.
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    pub id: String,
    pub method: FingerprintMethod,
}

impl Fingerprint {
    pub const ERROR_ID: &'static str = "<unreadable>";

    pub fn none() -> Self {
        Fingerprint {
            id: String::new(),
            method: FingerprintMethod::None,
        }
    }

    pub fn error() -> Self {
        Fingerprint {
            id: Self::ERROR_ID.to_string(),
            method: FingerprintMethod::Error,
        }
    }

    pub fn is_error(&self) -> bool {
        self.method == FingerprintMethod::Error
    }

    /// Short prefix for human-facing hints.
    pub fn short(&self) -> &str {
        match self.method {
            FingerprintMethod::ContentHash => &self.id[..self.id.len().min(12)],
            _ => &self.id,
        }
    }
}

/// One side's observation of a path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInfo {
    pub rel_path: String,
    pub size: u64,
    pub modified: Option<SystemTime>,
    pub is_dir: bool,
    pub fingerprint: Fingerprint,
    pub permissions: String,
}

impl FileInfo {
    pub fn modified_display(&self) -> Option<String> {
        self.modified.map(|t| {
            DateTime::<Local>::from(t)
                .format("%Y-%m-%d %H:%M:%S")
                .to_string()
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Identical,
    Modified,
    #[serde(rename = "ONLY_IN_LEFT")]
    OnlyLeft,
    #[serde(rename = "ONLY_IN_RIGHT")]
    OnlyRight,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::Identical,
        Status::Modified,
        Status::OnlyLeft,
        Status::OnlyRight,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Status::Identical => "IDENTICAL",
            Status::Modified => "MODIFIED",
            Status::OnlyLeft => "ONLY_IN_LEFT",
            Status::OnlyRight => "ONLY_IN_RIGHT",
        }
    }

    pub fn colored_name(self) -> ColoredString {
        match self {
            Status::Identical => self.name().green(),
            Status::Modified => self.name().red(),
            Status::OnlyLeft | Status::OnlyRight => self.name().blue(),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Status::ALL
            .into_iter()
            .find(|st| st.name() == s)
            .ok_or_else(|| format!("unknown status '{}'", s))
    }
}

/// How a classification was derived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareMethod {
    /// Present on one side only; no content was looked at.
    Existence,
    /// Both sides are directories.
    Directory,
    /// One side is a directory, the other a file.
    TypeMismatch,
    /// Sizes differ.
    Size,
    /// Fingerprints compared.
    Hash,
    /// At least one side could not be fingerprinted.
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub path: String,
    pub status: Status,
    pub left: Option<FileInfo>,
    pub right: Option<FileInfo>,
    pub method: CompareMethod,
}

impl ComparisonResult {
    pub fn format_text(&self, verbose: bool) -> String {
        let mut output = String::new();
        let file_color = match self.status {
            Status::Identical => Color::Green,
            Status::Modified => Color::Red,
            Status::OnlyLeft | Status::OnlyRight => Color::Blue,
        };

        output.push_str(&format!(
            "[{}]  {}\n",
            self.status.colored_name(),
            self.path.color(file_color)
        ));

        if verbose {
            for (label, info) in [("left", &self.left), ("right", &self.right)] {
                if let Some(info) = info {
                    output.push_str(&format!(
                        "    {}: {}\n",
                        label.dimmed(),
                        describe_info(info).cyan()
                    ));
                }
            }
        }
        output
    }
}

fn describe_info(info: &FileInfo) -> String {
    if info.is_dir {
        return format!("<dir> {}", info.permissions);
    }
    let mut parts = vec![format!("{} bytes", info.size)];
    match info.fingerprint.method {
        FingerprintMethod::ContentHash => parts.push(info.fingerprint.short().to_string()),
        FingerprintMethod::SizeSurrogate => parts.push("(size+mtime)".to_string()),
        FingerprintMethod::Error => parts.push("(unreadable)".to_string()),
        FingerprintMethod::None => {}
    }
    if let Some(t) = info.modified_display() {
        parts.push(t);
    }
    parts.push(info.permissions.clone());
    parts.join("  ")
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEntry {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CompareSummary {
    pub total: usize,
    pub identical: usize,
    pub modified: usize,
    pub only_left: usize,
    pub only_right: usize,
    pub errors: Vec<ErrorEntry>,
    #[serde(skip)]
    pub elapsed: Duration,
}

impl CompareSummary {
    pub fn record(&mut self, status: Status) {
        self.total += 1;
        match status {
            Status::Identical => self.identical += 1,
            Status::Modified => self.modified += 1,
            Status::OnlyLeft => self.only_left += 1,
            Status::OnlyRight => self.only_right += 1,
        }
    }

    pub fn differences(&self) -> usize {
        self.modified + self.only_left + self.only_right
    }
}
