//! Editor detection and launch.
//!
//! fif hands a single `file:line:column` to a VS Code style editor and exits;
//! the editor process is never waited on.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

/// Environment variable naming the editor to use
pub const ENV_VAR: &str = "FIF_EDITOR";

/// Editors tried, in order, when none is configured
const AUTO_DETECT: [Editor; 2] = [Editor::Cursor, Editor::Code];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Editor {
    Cursor,
    Code,
    /// Any other command accepting `--goto file:line:column`
    Other(String),
}

impl Editor {
    pub fn command(&self) -> &str {
        match self {
            Editor::Cursor => "cursor",
            Editor::Code => "code",
            Editor::Other(cmd) => cmd,
        }
    }

    pub fn is_installed(&self) -> bool {
        which::which(self.command()).is_ok()
    }
}

impl From<&str> for Editor {
    fn from(name: &str) -> Self {
        match name {
            "cursor" => Editor::Cursor,
            "code" => Editor::Code,
            other => Editor::Other(other.to_string()),
        }
    }
}

impl fmt::Display for Editor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.command())
    }
}

/// Where to put the cursor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub line: usize,
    pub column: usize,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file.display(), self.line, self.column)
    }
}

/// Pick the editor: explicit flag, then `FIF_EDITOR`, then the first of
/// `cursor`/`code` found on `PATH`.
pub fn resolve(flag: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Option<Editor> {
    if let Some(name) = flag.filter(|n| !n.is_empty()) {
        return Some(Editor::from(name));
    }
    if let Some(name) = env(ENV_VAR).filter(|n| !n.is_empty()) {
        return Some(Editor::from(name.as_str()));
    }
    detect()
}

/// First auto-detectable editor on `PATH`
pub fn detect() -> Option<Editor> {
    AUTO_DETECT.into_iter().find(Editor::is_installed)
}

/// CLI arguments for opening `location`
pub fn args(location: &Location, reuse_window: bool) -> Vec<OsString> {
    let mut args = Vec::with_capacity(3);
    if reuse_window {
        args.push(OsString::from("--reuse-window"));
    }
    args.push(OsString::from("--goto"));
    args.push(OsString::from(location.to_string()));
    args
}

/// Whether the environment says we're inside an editor's integrated terminal
pub fn in_editor_terminal(env: impl Fn(&str) -> Option<String>) -> bool {
    let set = |key: &str| env(key).is_some_and(|v| !v.is_empty());

    if set("VSCODE_IPC_HOOK") || set("CURSOR_AGENT") {
        return true;
    }
    if ["CURSOR_PID", "VSCODE_PID"]
        .iter()
        .any(|key| env(key).is_some_and(|pid| process_exists(&pid)))
    {
        return true;
    }
    env("TERM_PROGRAM").is_some_and(|v| v == "vscode")
}

/// Open `location` in `editor` without waiting for it
pub fn open_file(editor: &Editor, location: &Location) -> Result<()> {
    let reuse = in_editor_terminal(|key| std::env::var(key).ok()) || parent_is_editor();
    log::debug!("opening {location} in {editor} (reuse window: {reuse})");

    if cfg!(target_os = "macos") && reuse && *editor == Editor::Cursor {
        match open_url(location) {
            Ok(()) => return Ok(()),
            Err(e) => log::debug!("cursor:// URL failed, falling back to CLI: {e:#}"),
        }
    }

    Command::new(editor.command())
        .args(args(location, reuse))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to launch {editor}"))?;
    Ok(())
}

fn open_url(location: &Location) -> Result<()> {
    let file = std::path::absolute(&location.file)
        .with_context(|| format!("Failed to resolve {}", location.file.display()))?;
    let url = format!(
        "cursor://file/{}:{}:{}",
        file.display(),
        location.line,
        location.column
    );
    open::that(&url).with_context(|| format!("Failed to open {url}"))
}

#[cfg(target_os = "linux")]
fn process_exists(pid: &str) -> bool {
    pid.trim().parse::<u32>().is_ok() && std::path::Path::new("/proc").join(pid.trim()).exists()
}

#[cfg(not(target_os = "linux"))]
fn process_exists(pid: &str) -> bool {
    pid.trim().parse::<u32>().is_ok()
}

#[cfg(unix)]
fn parent_is_editor() -> bool {
    let ppid = std::os::unix::process::parent_id();
    let Ok(output) = Command::new("ps")
        .args(["-p", &ppid.to_string(), "-o", "comm="])
        .stderr(Stdio::null())
        .output()
    else {
        return false;
    };
    let name = String::from_utf8_lossy(&output.stdout).to_lowercase();
    name.contains("cursor") || name.contains("code")
}

#[cfg(not(unix))]
fn parent_is_editor() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    fn location() -> Location {
        Location {
            file: PathBuf::from("src/main.rs"),
            line: 12,
            column: 5,
        }
    }

    #[test]
    fn test_editor_from_name() {
        assert_eq!(Editor::from("cursor"), Editor::Cursor);
        assert_eq!(Editor::from("code"), Editor::Code);
        assert_eq!(Editor::from("codium"), Editor::Other("codium".into()));
        assert_eq!(Editor::from("codium").command(), "codium");
    }

    #[test]
    fn test_resolve_prefers_flag_then_env() {
        let env = env_of(&[(ENV_VAR, "code")]);
        assert_eq!(resolve(Some("cursor"), &env), Some(Editor::Cursor));
        assert_eq!(resolve(None, &env), Some(Editor::Code));
        assert_eq!(resolve(Some(""), &env), Some(Editor::Code));
    }

    #[test]
    fn test_args() {
        assert_eq!(args(&location(), false), vec!["--goto", "src/main.rs:12:5"]);
        assert_eq!(
            args(&location(), true),
            vec!["--reuse-window", "--goto", "src/main.rs:12:5"]
        );
    }

    #[test]
    fn test_in_editor_terminal() {
        assert!(!in_editor_terminal(env_of(&[])));
        assert!(in_editor_terminal(env_of(&[(
            "VSCODE_IPC_HOOK",
            "/tmp/vscode-ipc.sock"
        )])));
        assert!(in_editor_terminal(env_of(&[("CURSOR_AGENT", "1")])));
        assert!(in_editor_terminal(env_of(&[("TERM_PROGRAM", "vscode")])));
        assert!(!in_editor_terminal(env_of(&[("TERM_PROGRAM", "iTerm.app")])));
        assert!(!in_editor_terminal(env_of(&[("VSCODE_IPC_HOOK", "")])));
        assert!(!in_editor_terminal(env_of(&[("CURSOR_PID", "not-a-pid")])));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_editor_pid_must_be_alive() {
        let own = std::process::id().to_string();
        assert!(in_editor_terminal(env_of(&[("VSCODE_PID", own.as_str())])));
        assert!(!in_editor_terminal(env_of(&[("CURSOR_PID", "4294967294")])));
    }
}
