//! Application state and event loop

use super::input::{Edit, TextInput};
use super::session::{Direction, Field, Session, SessionConfig, Termination};
use super::ui;
use super::worker::{PreviewOutcome, SearchOutcome, Workers};
use anyhow::Result;
use crossterm::{
    cursor::{SetCursorStyle, Show},
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseEventKind,
    },
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use fif_search::{Ripgrep, Scope, ScopeRoots};
use ratatui::{Terminal, backend::CrosstermBackend};
use std::io::{self, Stdout};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};

/// What the TUI needs to start
#[derive(Debug, Clone)]
pub struct Options {
    pub ripgrep: Ripgrep,
    pub roots: ScopeRoots,
    /// Starting scope; project when a repository was found, otherwise directory
    pub scope: Option<Scope>,
    /// Prefilled query
    pub query: Option<String>,
    pub config: SessionConfig,
}

/// Toast notification state
pub struct Toast {
    pub message: String,
    pub expires_at: Instant,
    pub is_error: bool,
}

impl Toast {
    pub fn new(message: String, duration: Duration) -> Self {
        Self {
            message,
            expires_at: Instant::now() + duration,
            is_error: false,
        }
    }

    pub fn error(message: String, duration: Duration) -> Self {
        Self {
            is_error: true,
            ..Self::new(message, duration)
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

/// Application state
pub struct App {
    pub session: Session<Workers>,
    pub query_input: TextInput,
    pub filter_input: TextInput,
    pub toast: Option<Toast>,
    /// Channel to receive search outcomes
    search_rx: Receiver<SearchOutcome>,
    /// Channel to receive loaded previews
    preview_rx: Receiver<PreviewOutcome>,
}

impl App {
    pub fn new(options: Options) -> Self {
        let (workers, search_rx, preview_rx) = Workers::spawn(options.ripgrep);

        let scope = options
            .scope
            .unwrap_or_else(|| options.roots.default_scope());
        let toast = (!options.roots.supports(scope)).then(|| {
            Toast::error(
                "Not in a git repository, searching this directory".to_string(),
                Duration::from_secs(3),
            )
        });

        let mut session = Session::new(workers, options.roots, scope, options.config);
        let mut query_input = TextInput::new();
        if let Some(query) = options.query.filter(|q| !q.is_empty()) {
            query_input.set(query.as_str());
            session.on_text_changed(Field::Query, query);
        }

        Self {
            session,
            query_input,
            filter_input: TextInput::new(),
            toast,
            search_rx,
            preview_rx,
        }
    }

    /// How the session ended; quitting is assumed if it hasn't
    pub fn termination(&self) -> Termination {
        self.session
            .termination()
            .cloned()
            .unwrap_or(Termination::Quit)
    }

    pub fn input(&self, field: Field) -> &TextInput {
        match field {
            Field::Query => &self.query_input,
            Field::Filter => &self.filter_input,
        }
    }

    /// Handle input event (mouse scroll is coalesced separately in run_loop)
    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => match mouse.kind {
                MouseEventKind::ScrollDown => self.scroll(1),
                MouseEventKind::ScrollUp => self.scroll(-1),
                _ => {}
            },
            _ => {}
        }
    }

    fn handle_key(&mut self, key: KeyEvent) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        // macOS Option may report as SUPER
        let alt = key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER);

        match key.code {
            KeyCode::Esc => self.session.on_cancel_or_quit(),
            KeyCode::Char('c') if ctrl => self.session.on_cancel_or_quit(),
            KeyCode::Enter => self.session.on_activate(),
            KeyCode::Up => self.session.on_navigate(Direction::Up),
            KeyCode::Char('k') if ctrl => self.session.on_navigate(Direction::Up),
            KeyCode::Down => self.session.on_navigate(Direction::Down),
            KeyCode::Char('j') if ctrl => self.session.on_navigate(Direction::Down),
            KeyCode::Tab | KeyCode::BackTab => self.session.on_focus_toggled(),
            KeyCode::Char('t') if ctrl => self.session.on_filter_toggled(),
            KeyCode::Char('p' | 'P') if alt => self.select_scope(Scope::Project),
            KeyCode::Char('d' | 'D') if alt => self.select_scope(Scope::Directory),
            // Option+P / Option+D on macOS terminals without Meta
            KeyCode::Char('π') => self.select_scope(Scope::Project),
            KeyCode::Char('∂') => self.select_scope(Scope::Directory),
            code => self.edit(code, key.modifiers),
        }
    }

    /// Route a key to the focused input
    fn edit(&mut self, code: KeyCode, modifiers: KeyModifiers) {
        let field = self.session.focus();
        let input = match field {
            Field::Query => &mut self.query_input,
            Field::Filter => &mut self.filter_input,
        };
        if input.handle_key(code, modifiers) == Edit::Changed {
            let text = input.text().to_string();
            self.session.on_text_changed(field, text);
        }
    }

    fn select_scope(&mut self, scope: Scope) {
        if !self.session.on_scope_changed(scope) {
            self.toast = Some(Toast::error(
                "Not in a git repository".to_string(),
                Duration::from_secs(2),
            ));
        }
    }

    /// Move the selection by `delta` rows
    pub fn scroll(&mut self, delta: isize) {
        let direction = if delta < 0 {
            Direction::Up
        } else {
            Direction::Down
        };
        for _ in 0..delta.unsigned_abs() {
            self.session.on_navigate(direction);
        }
    }

    /// Poll for worker results (non-blocking)
    pub fn poll_workers(&mut self) {
        while let Ok(outcome) = self.search_rx.try_recv() {
            self.session
                .on_search_completed(outcome.generation, outcome.result);
        }
        while let Ok(outcome) = self.preview_rx.try_recv() {
            self.session.on_preview_loaded(outcome.request, outcome.result);
        }
    }

    /// Clear expired toast
    fn update_toast(&mut self) {
        if self.toast.as_ref().is_some_and(Toast::is_expired) {
            self.toast = None;
        }
    }
}

/// Run the TUI until the user quits or picks a match
pub fn run(options: Options) -> Result<Termination> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    let result = execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        SetCursorStyle::BlinkingBar
    )
    .map_err(anyhow::Error::from)
    .and_then(|()| {
        let mut terminal = Terminal::new(CrosstermBackend::new(stdout))?;
        let mut app = App::new(options);
        run_loop(&mut terminal, &mut app)?;
        Ok(app.termination())
    });

    // Restore even when the loop failed
    disable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        LeaveAlternateScreen,
        DisableMouseCapture,
        SetCursorStyle::DefaultUserShape,
        Show
    )?;

    result
}

fn run_loop(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    // ~60Hz is plenty for a text UI
    const FRAME_TIME: Duration = Duration::from_millis(16);
    // Wheel events arrive in bursts; cap how far one frame can move
    const MAX_SCROLL: isize = 10;

    loop {
        let frame_start = Instant::now();

        // Drain all pending events first (lowest latency for input)
        let mut scroll_delta: isize = 0;
        let mut events_processed = 0usize;
        while event::poll(Duration::ZERO)? && events_processed < 100 {
            match event::read()? {
                Event::Mouse(mouse) if mouse.kind == MouseEventKind::ScrollDown => {
                    scroll_delta += 1
                }
                Event::Mouse(mouse) if mouse.kind == MouseEventKind::ScrollUp => {
                    scroll_delta -= 1
                }
                ev => app.handle_event(ev),
            }
            events_processed += 1;
            if app.session.is_finished() {
                break;
            }
        }

        if app.session.is_finished() {
            break;
        }
        if scroll_delta != 0 {
            app.scroll(scroll_delta.clamp(-MAX_SCROLL, MAX_SCROLL));
        }

        // Fire the debounce before polling so a search can start this frame
        app.session.on_tick(Instant::now());
        app.update_toast();
        app.poll_workers();

        terminal.draw(|f| ui::render(f, app))?;

        // Sleep for remainder of frame time to maintain consistent frame rate
        let elapsed = frame_start.elapsed();
        if elapsed < FRAME_TIME {
            std::thread::sleep(FRAME_TIME - elapsed);
        }
    }

    Ok(())
}
