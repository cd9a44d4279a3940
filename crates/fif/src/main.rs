use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, ValueEnum};
use colored::Colorize;
use env_logger::{Env, Target};
use fif_search::{INSTALL_URL, Ripgrep, Scope, ScopeRoots};
use fif_tui::{Options, SessionConfig, Termination};
use std::fs::File;
use std::path::{Path, PathBuf};

mod tty;

#[derive(Parser)]
#[command(name = "fif")]
#[command(about = "Interactive find in files, powered by ripgrep", long_about = None)]
#[command(version)]
struct Cli {
    /// Initial search query
    query: Option<String>,

    /// Editor used to open the selected match (defaults to $FIF_EDITOR, then cursor or code)
    #[arg(long, value_name = "COMMAND")]
    editor: Option<String>,

    /// Where to search
    #[arg(long, value_enum)]
    scope: Option<ScopeArg>,

    /// Enable debug logging
    #[arg(short = 'd', long = "debug", hide = true)]
    debug: bool,

    /// Write log output to a file (the terminal belongs to the UI)
    #[arg(long = "log-file", value_name = "PATH")]
    log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ScopeArg {
    /// The enclosing git repository
    Project,
    /// The current working directory
    Directory,
}

impl From<ScopeArg> for Scope {
    fn from(arg: ScopeArg) -> Self {
        match arg {
            ScopeArg::Project => Scope::Project,
            ScopeArg::Directory => Scope::Directory,
        }
    }
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug, cli.log_file.as_deref())?;

    let ripgrep = Ripgrep::locate()
        .map_err(|e| anyhow!("{e}\nPlease install ripgrep: {INSTALL_URL}"))?;
    log::debug!("using {}", ripgrep.program().display());

    if !tty::is_interactive() {
        bail!("fif needs an interactive terminal");
    }

    let current_dir = std::env::current_dir().context("Failed to read the working directory")?;
    let roots = ScopeRoots::detect(current_dir);

    let editor = fif_editor::resolve(cli.editor.as_deref(), |key| std::env::var(key).ok());

    let termination = fif_tui::run(Options {
        ripgrep,
        roots,
        scope: cli.scope.map(Scope::from),
        query: cli.query,
        config: SessionConfig::default(),
    })?;

    match termination {
        Termination::Quit => Ok(()),
        Termination::Open(location) => {
            let Some(editor) = editor else {
                bail!("No editor found (cursor or code); set --editor or ${}", fif_editor::ENV_VAR);
            };
            fif_editor::open_file(&editor, &location)
        }
    }
}

/// Logs go to `log_file` when given. Without one nothing is logged unless
/// `RUST_LOG` asks for it, since stderr sits under the UI.
fn init_logging(debug: bool, log_file: Option<&Path>) -> Result<()> {
    let default_filter = match (debug, log_file) {
        (true, _) => "debug",
        (false, Some(_)) => "info",
        (false, None) => "off",
    };
    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or(default_filter));

    if let Some(path) = log_file {
        let file = File::create(path)
            .with_context(|| format!("Failed to create log file {}", path.display()))?;
        builder.target(Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}
