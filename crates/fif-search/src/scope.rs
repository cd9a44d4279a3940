//! Search scopes and repository detection

use std::fmt;
use std::path::{Path, PathBuf};

/// Which directory a search runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Root of the enclosing repository
    Project,
    /// The directory fif was started in
    Directory,
}

impl Scope {
    pub fn label(&self) -> &'static str {
        match self {
            Scope::Project => "In Project",
            Scope::Directory => "Directory",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Project => write!(f, "project"),
            Scope::Directory => write!(f, "directory"),
        }
    }
}

/// Directories each scope maps to, captured once at startup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeRoots {
    pub current_dir: PathBuf,
    pub repository: Option<PathBuf>,
}

impl ScopeRoots {
    /// Detect the repository enclosing `current_dir`
    pub fn detect(current_dir: PathBuf) -> Self {
        let repository = find_repository_root(&current_dir);
        if let Some(root) = &repository {
            log::debug!("repository root: {}", root.display());
        }
        Self {
            current_dir,
            repository,
        }
    }

    /// Scope to start in: the project when there is one
    pub fn default_scope(&self) -> Scope {
        if self.repository.is_some() {
            Scope::Project
        } else {
            Scope::Directory
        }
    }

    pub fn supports(&self, scope: Scope) -> bool {
        match scope {
            Scope::Project => self.repository.is_some(),
            Scope::Directory => true,
        }
    }

    /// Directory a search in `scope` runs in. Falls back to the current
    /// directory when there is no repository.
    pub fn root(&self, scope: Scope) -> &Path {
        match (scope, &self.repository) {
            (Scope::Project, Some(repository)) => repository,
            _ => &self.current_dir,
        }
    }
}

/// Walk up from `start` looking for a `.git` entry.
///
/// `.git` may be a directory or, for worktrees and submodules, a file.
pub fn find_repository_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(".git").exists())
        .map(Path::to_path_buf)
}
