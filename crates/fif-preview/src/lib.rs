//! Preview windows: a few lines of context around a search hit

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Lines shown above the hit
pub const BEFORE: usize = 5;

/// Lines shown below the hit
pub const AFTER: usize = 10;

/// A window of lines around one line of a file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    pub file: PathBuf,
    /// 1-based line number of `lines[0]`
    pub start_line: usize,
    pub lines: Vec<String>,
    /// 1-based position of the hit within `lines`; 0 only when `lines` is empty
    pub hit_line_offset: usize,
}

impl Preview {
    /// 1-based file line number of the hit
    pub fn hit_line(&self) -> Option<usize> {
        (self.hit_line_offset > 0).then(|| self.start_line + self.hit_line_offset - 1)
    }

    /// Lines paired with their file line numbers
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(move |(i, line)| (self.start_line + i, line.as_str()))
    }
}

#[derive(Debug, Error)]
pub enum PreviewError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Load the default window around `line`
pub fn load(file: &Path, line: usize) -> Result<Preview, PreviewError> {
    load_window(file, line, BEFORE, AFTER)
}

/// Load up to `before` lines above and `after` lines below `line`.
///
/// The window is clamped to the file. A `line` past the end of the file is
/// treated as the last line.
pub fn load_window(
    file: &Path,
    line: usize,
    before: usize,
    after: usize,
) -> Result<Preview, PreviewError> {
    let bytes = std::fs::read(file).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => PreviewError::NotFound(file.to_path_buf()),
        _ => PreviewError::Read {
            path: file.to_path_buf(),
            source,
        },
    })?;
    let content = String::from_utf8_lossy(&bytes);
    let all: Vec<&str> = content.lines().collect();

    let preview = window(file, &all, line, before, after);
    log::trace!(
        "preview {}:{} -> lines {}..{}",
        file.display(),
        line,
        preview.start_line,
        preview.start_line + preview.lines.len()
    );
    Ok(preview)
}

fn window(file: &Path, all: &[&str], line: usize, before: usize, after: usize) -> Preview {
    if all.is_empty() {
        return Preview {
            file: file.to_path_buf(),
            start_line: 1,
            lines: Vec::new(),
            hit_line_offset: 0,
        };
    }

    let target = line.clamp(1, all.len());
    let start = target.saturating_sub(before).max(1);
    let end = (target + after).min(all.len());

    Preview {
        file: file.to_path_buf(),
        start_line: start,
        lines: all[start - 1..end].iter().map(|l| l.to_string()).collect(),
        hit_line_offset: target - start + 1,
    }
}
