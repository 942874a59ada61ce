use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{FileInfo, FingerprintMethod, Status};

/// What to do with one path. Closed set; tokens are the on-disk spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Ignore,
    CopyToRight,
    CopyToLeft,
    DeleteLeft,
    DeleteRight,
    DeleteBoth,
    /// Reserved for hunk-level application. Parses, but never executes.
    Patch,
}

impl ActionType {
    pub const ALL: [ActionType; 7] = [
        ActionType::Ignore,
        ActionType::CopyToRight,
        ActionType::CopyToLeft,
        ActionType::DeleteLeft,
        ActionType::DeleteRight,
        ActionType::DeleteBoth,
        ActionType::Patch,
    ];

    pub fn token(self) -> &'static str {
        match self {
            ActionType::Ignore => "i",
            ActionType::CopyToRight => ">",
            ActionType::CopyToLeft => "<",
            ActionType::DeleteLeft => "x-",
            ActionType::DeleteRight => "-x",
            ActionType::DeleteBoth => "xx",
            ActionType::Patch => "p",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ActionType::Ignore => "ignore, leave both sides untouched",
            ActionType::CopyToRight => "copy left to right",
            ActionType::CopyToLeft => "copy right to left",
            ActionType::DeleteLeft => "delete from left",
            ActionType::DeleteRight => "delete from right",
            ActionType::DeleteBoth => "delete from both sides",
            ActionType::Patch => "apply selected hunks (reserved, not executable)",
        }
    }

    pub fn is_executable(self) -> bool {
        !matches!(self, ActionType::Patch)
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

fn token_list() -> String {
    let tokens: Vec<&str> = ActionType::ALL.iter().map(|a| a.token()).collect();
    tokens.join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown action token '{0}' (expected one of: {tokens})", tokens = token_list())]
pub struct UnknownToken(pub String);

impl FromStr for ActionType {
    type Err = UnknownToken;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let token = s.trim();
        ActionType::ALL
            .into_iter()
            .find(|a| a.token() == token)
            .ok_or_else(|| UnknownToken(token.to_string()))
    }
}

/// Generation-time view of one side of a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideSnapshot {
    pub is_dir: bool,
    pub size: Option<u64>,
    pub hash_prefix: Option<String>,
}

impl SideSnapshot {
    pub fn from_info(info: &FileInfo) -> Self {
        if info.is_dir {
            return SideSnapshot {
                is_dir: true,
                size: None,
                hash_prefix: None,
            };
        }
        let hash_prefix = match info.fingerprint.method {
            FingerprintMethod::ContentHash => Some(info.fingerprint.short().to_string()),
            _ => None,
        };
        SideSnapshot {
            is_dir: false,
            size: Some(info.size),
            hash_prefix,
        }
    }

    /// The hint text written after `L:` / `R:`.
    pub fn hint(&self) -> String {
        if self.is_dir {
            return "dir".to_string();
        }
        let mut out = match self.size {
            Some(size) => format!("{} B", size),
            None => "? B".to_string(),
        };
        if let Some(ref h) = self.hash_prefix {
            out.push(' ');
            out.push_str(h);
        }
        out
    }

    /// Inverse of [`SideSnapshot::hint`]. Unknown shapes yield `None`.
    pub fn parse_hint(text: &str) -> Option<Self> {
        let text = text.trim();
        if text == "dir" {
            return Some(SideSnapshot {
                is_dir: true,
                size: None,
                hash_prefix: None,
            });
        }
        let mut parts = text.split_whitespace();
        let size = parts.next()?.parse::<u64>().ok();
        if parts.next()? != "B" {
            return None;
        }
        let hash_prefix = parts
            .next()
            .filter(|h| h.chars().all(|c| c.is_ascii_hexdigit()))
            .map(str::to_string);
        Some(SideSnapshot {
            is_dir: false,
            size,
            hash_prefix,
        })
    }
}

/// One edited line of an action file.
#[derive(Debug, Clone)]
pub struct ActionItem {
    pub action: ActionType,
    pub status: Status,
    pub path: String,
    /// 1-based line in the source document, 0 when built in memory.
    pub line: usize,
    /// What the generator saw on each side, recovered from the line's hints.
    pub left: Option<SideSnapshot>,
    pub right: Option<SideSnapshot>,
}

impl ActionItem {
    pub fn new(action: ActionType, status: Status, path: impl Into<String>) -> Self {
        ActionItem {
            action,
            status,
            path: path.into(),
            line: 0,
            left: None,
            right: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionFileHeader {
    pub generated: Option<String>,
    pub left_root: Option<String>,
    pub right_root: Option<String>,
    pub version: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ActionFile {
    pub header: ActionFileHeader,
    pub items: Vec<ActionItem>,
    /// Comment lines other than the recognized header fields, verbatim.
    pub comments: Vec<String>,
}

impl ActionFile {
    pub fn pending(&self) -> impl Iterator<Item = &ActionItem> {
        self.items.iter().filter(|i| i.action != ActionType::Ignore)
    }
}
