//! Match records and the `--vimgrep` line parser

use std::path::{Path, PathBuf};
use thiserror::Error;

/// A single hit reported by the search backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    /// Path as printed by ripgrep, relative to the search root
    pub file: PathBuf,
    /// 1-based line number
    pub line: usize,
    /// 1-based column of the match start
    pub column: usize,
    /// The full text of the matching line
    pub text: String,
}

impl Match {
    /// Resolve the file against the root the search ran in
    pub fn path_in(&self, root: &Path) -> PathBuf {
        if self.file.is_absolute() {
            self.file.clone()
        } else {
            root.join(&self.file)
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("expected file:line:column:text, got {0:?}")]
    Format(String),

    #[error("invalid line number {0:?}")]
    Line(String),

    #[error("invalid column number {0:?}")]
    Column(String),
}

/// Parse one line of `rg --vimgrep` output.
///
/// Only the first three colons are separators; the text keeps any colons of
/// its own.
pub fn parse_line(line: &str) -> Result<Match, ParseError> {
    let mut parts = line.splitn(4, ':');
    let (Some(file), Some(line_no), Some(column), Some(text)) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(ParseError::Format(line.to_string()));
    };

    if file.is_empty() {
        return Err(ParseError::Format(line.to_string()));
    }

    let line_no = parse_position(line_no).ok_or_else(|| ParseError::Line(line_no.to_string()))?;
    let column = parse_position(column).ok_or_else(|| ParseError::Column(column.to_string()))?;

    Ok(Match {
        file: PathBuf::from(file),
        line: line_no,
        column,
        text: text.to_string(),
    })
}

/// Parse a whole block of output, skipping blank and malformed lines
pub fn parse_output(output: &str) -> Vec<Match> {
    output
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| match parse_line(line) {
            Ok(m) => Some(m),
            Err(e) => {
                log::trace!("skipping search output line: {e}");
                None
            }
        })
        .collect()
}

fn parse_position(s: &str) -> Option<usize> {
    s.parse::<usize>().ok().filter(|n| *n >= 1)
}
