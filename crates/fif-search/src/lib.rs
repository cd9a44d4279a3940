//! ripgrep-backed search for fif
//!
//! A search is one `rg --vimgrep` process per [`SearchRequest`]. Output is
//! read lazily as a [`MatchStream`], one [`Match`] per line, and the process
//! can be torn down from another thread through the request's
//! [`CancelToken`].

mod cancel;
mod matches;
mod ripgrep;
mod scope;

pub use cancel::CancelToken;
pub use matches::{Match, ParseError, parse_line, parse_output};
pub use ripgrep::{INSTALL_URL, MatchStream, PROGRAM, Ripgrep};
pub use scope::{Scope, ScopeRoots, find_repository_root};

use std::path::PathBuf;
use thiserror::Error;

/// One search attempt. The generation is assigned by the caller and echoed
/// back with the outcome so stale completions can be told apart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub generation: u64,
    pub query: String,
    /// Glob passed to `--glob`; `None` searches every file
    pub filter: Option<String>,
    /// Working directory of the search process
    pub root: PathBuf,
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("ripgrep (rg) is not installed or not in PATH")]
    NotInstalled(#[source] which::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read search output: {0}")]
    Read(#[from] std::io::Error),

    #[error("ripgrep failed ({}){}", exit_label(.code), stderr_suffix(.stderr))]
    Failed { code: Option<i32>, stderr: String },
}

pub type Result<T> = std::result::Result<T, SearchError>;

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit status {code}"),
        None => "terminated by signal".to_string(),
    }
}

fn stderr_suffix(stderr: &str) -> String {
    match stderr.lines().map(str::trim).find(|l| !l.is_empty()) {
        Some(first) => format!(": {first}"),
        None => String::new(),
    }
}
