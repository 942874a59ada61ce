use std::path::PathBuf;
use thiserror::Error;

/// A malformed action-file line.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ParseError {
    pub line: usize,
    pub message: String,
}

/// An action that does not fit the filesystem as it is now.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {path}: {message}")]
pub struct ValidationError {
    pub line: usize,
    pub path: String,
    pub message: String,
}

fn list<E: ToString>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| format!("  {}", e.to_string()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Batches of errors that make an action file unusable as a whole.
#[derive(Debug, Clone, Error)]
pub enum ActionFileError {
    #[error("action file has {} parse error(s):\n{}", .0.len(), list(.0))]
    Parse(Vec<ParseError>),
    #[error("action file has {} validation error(s):\n{}", .0.len(), list(.0))]
    Validation(Vec<ValidationError>),
    #[error(
        "left folder {} and right folder {} are the same folder or nested in each other",
        .left.display(),
        .right.display()
    )]
    OverlappingRoots { left: PathBuf, right: PathBuf },
}
