//! Running `rg` as a subprocess

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use crate::{CancelToken, Match, Result, SearchError, SearchRequest, parse_line};

/// Name of the ripgrep executable
pub const PROGRAM: &str = "rg";

/// Where to point users who don't have ripgrep installed
pub const INSTALL_URL: &str = "https://github.com/BurntSushi/ripgrep";

/// ripgrep exits with 1 when the search ran fine but nothing matched
const NO_MATCHES_EXIT: i32 = 1;

/// ripgrep search adapter
#[derive(Debug, Clone)]
pub struct Ripgrep {
    program: PathBuf,
}

impl Ripgrep {
    /// Locate `rg` on `PATH`
    pub fn locate() -> Result<Self> {
        which::which(PROGRAM)
            .map(Self::with_program)
            .map_err(SearchError::NotInstalled)
    }

    /// Use a specific executable instead of looking one up
    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments for one request: one match per line, no headings, no color
    pub fn args(request: &SearchRequest) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "--vimgrep".into(),
            "--no-heading".into(),
            "--color=never".into(),
        ];
        if let Some(glob) = request.filter.as_deref().filter(|g| !g.is_empty()) {
            args.push("--glob".into());
            args.push(glob.into());
        }
        // Everything after `--` is the pattern, even if it starts with a dash
        args.push("--".into());
        args.push(request.query.as_str().into());
        args
    }

    /// Start the search and return its output as a lazy stream.
    ///
    /// The process is attached to `token`; cancelling the token kills it.
    pub fn stream(&self, request: &SearchRequest, token: &CancelToken) -> Result<MatchStream> {
        log::debug!(
            "search #{}: {} {:?} in {}",
            request.generation,
            self.program.display(),
            Self::args(request),
            request.root.display()
        );

        let mut child = Command::new(&self.program)
            .args(Self::args(request))
            .current_dir(&request.root)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| SearchError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        token.attach(child);

        let Some(stdout) = stdout else {
            let _ = reap(token);
            return Err(SearchError::Read(std::io::Error::other("stdout not captured")));
        };

        // Drain stderr on the side so a chatty process never blocks on a full pipe
        let stderr = stderr.map(|mut pipe| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        Ok(MatchStream {
            reader: BufReader::new(stdout),
            stderr,
            token: token.clone(),
            finished: false,
        })
    }

    /// Run a search to completion.
    ///
    /// Returns `Ok(None)` if the token was cancelled, in which case nothing
    /// should be reported for this request.
    pub fn search(&self, request: &SearchRequest, token: &CancelToken) -> Result<Option<Vec<Match>>> {
        let mut stream = self.stream(request, token)?;
        let mut matches = Vec::new();
        for item in stream.by_ref() {
            matches.push(item?);
        }

        if token.is_cancelled() {
            return Ok(None);
        }
        stream.finish()?;

        if token.is_cancelled() {
            return Ok(None);
        }
        Ok(Some(matches))
    }
}

/// Matches read lazily from a running search process.
///
/// Yields parsed matches in output order, silently skipping lines that don't
/// parse, and stops early once the token is cancelled. Call
/// [`MatchStream::finish`] after exhausting it to learn whether the process
/// succeeded. Dropping an unfinished stream kills and reaps the process.
pub struct MatchStream {
    reader: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
    token: CancelToken,
    finished: bool,
}

impl MatchStream {
    /// Wait for the process and map its exit status.
    ///
    /// "No matches" is a success.
    pub fn finish(mut self) -> Result<()> {
        self.finished = true;
        let status = match self.token.detach() {
            Some(mut child) => child.wait()?,
            None => return Ok(()),
        };
        let stderr = self
            .stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();

        if status.success() || status.code() == Some(NO_MATCHES_EXIT) {
            return Ok(());
        }
        if self.token.is_cancelled() {
            // Killed on purpose; the caller discards the outcome
            return Ok(());
        }
        Err(SearchError::Failed {
            code: status.code(),
            stderr,
        })
    }
}

impl Iterator for MatchStream {
    type Item = Result<Match>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        loop {
            if self.token.is_cancelled() {
                return None;
            }
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => return None,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim_end_matches(['\n', '\r']);
                    if line.trim().is_empty() {
                        continue;
                    }
                    match parse_line(line) {
                        Ok(m) => return Some(Ok(m)),
                        Err(e) => log::trace!("skipping search output line: {e}"),
                    }
                }
                Err(e) => {
                    if self.token.is_cancelled() {
                        return None;
                    }
                    return Some(Err(SearchError::Read(e)));
                }
            }
        }
    }
}

impl Drop for MatchStream {
    fn drop(&mut self) {
        if !self.finished {
            let _ = reap(&self.token);
        }
    }
}

/// Kill and wait for the attached process, if any
fn reap(token: &CancelToken) -> std::io::Result<()> {
    if let Some(mut child) = token.detach() {
        let _ = child.kill();
        child.wait()?;
    }
    Ok(())
}
