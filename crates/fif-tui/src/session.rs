//! Session state and the transitions that drive it.
//!
//! [`Session`] is the single owner of everything the UI shows. Every input
//! (keystrokes, timer ticks, worker completions) arrives as a call on it and
//! runs to completion on the event loop thread. Background work goes out
//! through a [`Dispatch`] implementation and comes back tagged, so late
//! completions are recognised by their generation or selection key rather
//! than by when they arrive.

use fif_editor::Location;
use fif_preview::{Preview, PreviewError};
use fif_search::{CancelToken, Match, Scope, ScopeRoots, SearchError, SearchRequest};
use std::collections::HashSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Quiet period after the last edit before a search is issued
pub const DEBOUNCE: Duration = Duration::from_millis(250);

/// Rows in the result list
pub const RESULT_WINDOW: usize = 5;

/// Hands work to the background and returns immediately
pub trait Dispatch {
    /// Start a search; cancelling the returned token abandons it
    fn search(&mut self, request: SearchRequest) -> CancelToken;

    /// Load a preview; the answer comes back via [`Session::on_preview_loaded`]
    fn preview(&mut self, request: PreviewRequest);
}

#[derive(Debug, Clone, Copy)]
pub struct SessionConfig {
    pub debounce: Duration,
    pub window: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEBOUNCE,
            window: RESULT_WINDOW,
        }
    }
}

/// Which text input has focus
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Query,
    Filter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the first result
    Up,
    /// Toward the last result
    Down,
}

/// How the session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Quit,
    Open(Location),
}

/// A preview load for one selection. Also the key a completion is checked
/// against: it only lands if the selection still resolves to the same key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewRequest {
    pub index: usize,
    /// Path resolved against the search root
    pub file: PathBuf,
    pub line: usize,
}

/// Matches from one search, in backend order, with the root they are
/// relative to
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultSet {
    root: PathBuf,
    matches: Vec<Match>,
}

impl ResultSet {
    pub fn new(root: PathBuf, matches: Vec<Match>) -> Self {
        Self { root, matches }
    }

    pub fn empty(root: PathBuf) -> Self {
        Self::new(root, Vec::new())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn matches(&self) -> &[Match] {
        &self.matches
    }

    pub fn get(&self, index: usize) -> Option<&Match> {
        self.matches.get(index)
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    /// Number of distinct files with at least one match
    pub fn file_count(&self) -> usize {
        self.matches
            .iter()
            .map(|m| &m.file)
            .collect::<HashSet<_>>()
            .len()
    }

    /// Editor location for a match, resolved against the root
    pub fn location(&self, index: usize) -> Option<Location> {
        self.get(index).map(|m| Location {
            file: m.path_in(&self.root),
            line: m.line,
            column: m.column,
        })
    }

    fn preview_request(&self, index: usize) -> Option<PreviewRequest> {
        self.get(index).map(|m| PreviewRequest {
            index,
            file: m.path_in(&self.root),
            line: m.line,
        })
    }
}

/// Armed debounce timer with the values it was armed for
#[derive(Debug, Clone)]
struct Debounce {
    deadline: Instant,
    query: String,
    filter: Option<String>,
}

pub struct Session<D: Dispatch> {
    config: SessionConfig,
    dispatch: D,
    roots: ScopeRoots,

    query: String,
    filter: String,
    filter_enabled: bool,
    focus: Field,
    scope: Scope,

    /// Generation of the most recently issued search
    generation: u64,
    /// Cancel handle of the search whose completion is still awaited
    in_flight: Option<CancelToken>,
    searching: bool,
    error: Option<String>,
    debounce: Option<Debounce>,

    results: ResultSet,
    selected: Option<usize>,
    scroll_offset: usize,

    preview: Option<Preview>,
    preview_error: Option<String>,
    /// Preview requested but not answered yet
    pending_preview: Option<PreviewRequest>,

    termination: Option<Termination>,
}

impl<D: Dispatch> Session<D> {
    pub fn new(dispatch: D, roots: ScopeRoots, scope: Scope, config: SessionConfig) -> Self {
        let scope = if roots.supports(scope) {
            scope
        } else {
            Scope::Directory
        };
        let results = ResultSet::empty(roots.root(scope).to_path_buf());
        Self {
            config,
            dispatch,
            roots,
            query: String::new(),
            filter: String::new(),
            filter_enabled: true,
            focus: Field::Query,
            scope,
            generation: 0,
            in_flight: None,
            searching: false,
            error: None,
            debounce: None,
            results,
            selected: None,
            scroll_offset: 0,
            preview: None,
            preview_error: None,
            pending_preview: None,
            termination: None,
        }
    }

    // Accessors

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    pub fn filter_enabled(&self) -> bool {
        self.filter_enabled
    }

    /// The glob actually passed to the backend
    pub fn effective_filter(&self) -> Option<String> {
        (self.filter_enabled && !self.filter.is_empty()).then(|| self.filter.clone())
    }

    pub fn focus(&self) -> Field {
        self.focus
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn roots(&self) -> &ScopeRoots {
        &self.roots
    }

    /// Directory searches currently run in
    pub fn root(&self) -> &Path {
        self.roots.root(self.scope)
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_searching(&self) -> bool {
        self.searching
    }

    /// An edit is waiting out the debounce period
    pub fn is_debouncing(&self) -> bool {
        self.debounce.is_some()
    }

    pub fn debounce_deadline(&self) -> Option<Instant> {
        self.debounce.as_ref().map(|d| d.deadline)
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn results(&self) -> &ResultSet {
        &self.results
    }

    pub fn selected(&self) -> Option<usize> {
        self.selected
    }

    pub fn selected_match(&self) -> Option<&Match> {
        self.selected.and_then(|i| self.results.get(i))
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn window(&self) -> usize {
        self.config.window.max(1)
    }

    /// Indices of the rows currently on screen
    pub fn visible(&self) -> Range<usize> {
        let end = (self.scroll_offset + self.window()).min(self.results.len());
        self.scroll_offset.min(end)..end
    }

    pub fn preview(&self) -> Option<&Preview> {
        self.preview.as_ref()
    }

    pub fn preview_error(&self) -> Option<&str> {
        self.preview_error.as_deref()
    }

    pub fn is_loading_preview(&self) -> bool {
        self.pending_preview.is_some()
    }

    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    pub fn is_finished(&self) -> bool {
        self.termination.is_some()
    }

    pub fn into_termination(self) -> Option<Termination> {
        self.termination
    }

    pub fn dispatch(&self) -> &D {
        &self.dispatch
    }

    pub fn dispatch_mut(&mut self) -> &mut D {
        &mut self.dispatch
    }

    // Input

    pub fn on_text_changed(&mut self, field: Field, text: impl Into<String>) {
        self.on_text_changed_at(field, text, Instant::now());
    }

    /// Store the new text for `field` and restart the debounce timer
    pub fn on_text_changed_at(&mut self, field: Field, text: impl Into<String>, now: Instant) {
        let text = text.into();
        match field {
            Field::Query => {
                if self.query == text {
                    return;
                }
                self.query = text;
            }
            Field::Filter => {
                if self.filter == text {
                    return;
                }
                let before = self.effective_filter();
                self.filter = text;
                // Edits to a disabled filter don't change the request
                if before == self.effective_filter() {
                    return;
                }
            }
        }
        self.request_changed(now);
    }

    pub fn on_filter_toggled(&mut self) {
        self.on_filter_toggled_at(Instant::now());
    }

    /// Enable or disable the filter glob. Only reruns the search when that
    /// changes the request.
    pub fn on_filter_toggled_at(&mut self, now: Instant) {
        let before = self.effective_filter();
        self.filter_enabled = !self.filter_enabled;
        if before != self.effective_filter() {
            self.request_changed(now);
        }
    }

    pub fn on_focus_toggled(&mut self) {
        self.focus = match self.focus {
            Field::Query => Field::Filter,
            Field::Filter => Field::Query,
        };
    }

    /// Fire the debounce timer once its deadline has passed
    pub fn on_tick(&mut self, now: Instant) {
        if let Some(debounce) = self.debounce.take_if(|d| now >= d.deadline) {
            self.on_debounce_elapsed(&debounce.query, debounce.filter.as_deref());
        }
    }

    /// Issue a search for the armed snapshot, unless the input moved on
    pub fn on_debounce_elapsed(&mut self, query: &str, filter: Option<&str>) {
        if self.query != query || self.effective_filter().as_deref() != filter {
            log::debug!("debounce for {query:?} superseded");
            return;
        }
        if self.query.is_empty() {
            return;
        }
        self.issue_search();
    }

    /// Switch scopes. Returns false if `scope` is unavailable (no repository
    /// for project scope).
    pub fn on_scope_changed(&mut self, scope: Scope) -> bool {
        if !self.roots.supports(scope) {
            return false;
        }
        if scope == self.scope {
            return true;
        }
        self.scope = scope;
        self.invalidate();
        self.debounce = None;
        if !self.query.is_empty() {
            self.issue_search();
        }
        true
    }

    /// Move the selection one row, clamped to the list
    pub fn on_navigate(&mut self, direction: Direction) {
        let Some(current) = self.selected else {
            return;
        };
        let last = self.results.len().saturating_sub(1);
        let next = match direction {
            Direction::Up => current.saturating_sub(1),
            Direction::Down => (current + 1).min(last),
        };
        if next != current {
            self.select(next);
        }
    }

    /// Open the selected match. Ends the session.
    pub fn on_activate(&mut self) {
        let Some(location) = self.selected.and_then(|i| self.results.location(i)) else {
            return;
        };
        self.stop();
        self.termination = Some(Termination::Open(location));
    }

    pub fn on_cancel_or_quit(&mut self) {
        self.stop();
        self.termination = Some(Termination::Quit);
    }

    // Completions

    /// Accept a search outcome if it belongs to the current generation
    pub fn on_search_completed(
        &mut self,
        generation: u64,
        result: Result<Vec<Match>, SearchError>,
    ) {
        if generation != self.generation || self.in_flight.is_none() {
            log::debug!(
                "discarding search #{generation} (current #{})",
                self.generation
            );
            return;
        }
        self.in_flight = None;
        self.searching = false;

        let root = self.root().to_path_buf();
        match result {
            Ok(matches) => {
                log::debug!("search #{generation}: {} matches", matches.len());
                self.error = None;
                self.results = ResultSet::new(root, matches);
                if self.results.is_empty() {
                    self.clear_selection();
                } else if self.selected.is_none() {
                    self.select(0);
                }
            }
            Err(e) => {
                log::debug!("search #{generation} failed: {e}");
                self.error = Some(e.to_string());
                self.results = ResultSet::empty(root);
                self.clear_selection();
            }
        }
    }

    /// Store a loaded preview if the selection still points at it
    pub fn on_preview_loaded(
        &mut self,
        request: PreviewRequest,
        result: Result<Preview, PreviewError>,
    ) {
        if self.pending_preview.as_ref() == Some(&request) {
            self.pending_preview = None;
        }
        let current = self
            .selected
            .and_then(|i| self.results.preview_request(i));
        if current.as_ref() != Some(&request) {
            log::debug!(
                "discarding preview for {}:{}",
                request.file.display(),
                request.line
            );
            return;
        }
        match result {
            Ok(preview) => {
                self.preview = Some(preview);
                self.preview_error = None;
            }
            Err(e) => {
                self.preview = None;
                self.preview_error = Some(e.to_string());
            }
        }
    }

    // Internals

    fn issue_search(&mut self) {
        self.generation += 1;
        self.cancel_in_flight();
        self.debounce = None;
        self.searching = true;
        self.error = None;

        let request = SearchRequest {
            generation: self.generation,
            query: self.query.clone(),
            filter: self.effective_filter(),
            root: self.root().to_path_buf(),
        };
        log::debug!("issuing search #{}: {:?}", self.generation, request.query);
        self.in_flight = Some(self.dispatch.search(request));
    }

    /// The request changed: drop everything derived from the old one and
    /// arm the debounce timer
    fn request_changed(&mut self, now: Instant) {
        self.invalidate();
        if self.query.is_empty() {
            self.debounce = None;
            self.error = None;
            return;
        }
        self.debounce = Some(Debounce {
            deadline: now + self.config.debounce,
            query: self.query.clone(),
            filter: self.effective_filter(),
        });
    }

    fn invalidate(&mut self) {
        self.cancel_in_flight();
        self.results = ResultSet::empty(self.root().to_path_buf());
        self.clear_selection();
    }

    fn cancel_in_flight(&mut self) {
        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        self.searching = false;
    }

    fn stop(&mut self) {
        self.cancel_in_flight();
        self.debounce = None;
    }

    fn clear_selection(&mut self) {
        self.selected = None;
        self.scroll_offset = 0;
        self.preview = None;
        self.preview_error = None;
        self.pending_preview = None;
    }

    fn select(&mut self, index: usize) {
        self.selected = Some(index);
        self.adjust_scroll();
        self.on_selection_changed(index);
    }

    /// Scroll as little as possible to keep the selection on screen
    fn adjust_scroll(&mut self) {
        let window = self.window();
        let max_offset = self.results.len().saturating_sub(window);
        if let Some(selected) = self.selected {
            if selected < self.scroll_offset {
                self.scroll_offset = selected;
            } else if selected >= self.scroll_offset + window {
                self.scroll_offset = selected + 1 - window;
            }
        }
        self.scroll_offset = self.scroll_offset.min(max_offset);
    }

    fn on_selection_changed(&mut self, index: usize) {
        let Some(request) = self.results.preview_request(index) else {
            return;
        };
        if self.pending_preview.as_ref() == Some(&request) {
            return;
        }
        // The old preview stays up until the new one arrives
        self.pending_preview = Some(request.clone());
        self.dispatch.preview(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Records what the session asked for instead of doing it
    #[derive(Default)]
    struct Recorder {
        searches: Vec<(SearchRequest, CancelToken)>,
        previews: Vec<PreviewRequest>,
    }

    impl Dispatch for Recorder {
        fn search(&mut self, request: SearchRequest) -> CancelToken {
            let token = CancelToken::new();
            self.searches.push((request, token.clone()));
            token
        }

        fn preview(&mut self, request: PreviewRequest) {
            self.previews.push(request);
        }
    }

    fn roots() -> ScopeRoots {
        ScopeRoots {
            current_dir: PathBuf::from("/repo/sub"),
            repository: Some(PathBuf::from("/repo")),
        }
    }

    fn session() -> Session<Recorder> {
        Session::new(
            Recorder::default(),
            roots(),
            Scope::Project,
            SessionConfig::default(),
        )
    }

    fn hits(n: usize) -> Vec<Match> {
        (0..n)
            .map(|i| Match {
                file: PathBuf::from(format!("src/f{}.rs", i % 3)),
                line: i + 1,
                column: 1,
                text: format!("hit {i}"),
            })
            .collect()
    }

    fn preview_for(request: &PreviewRequest) -> Preview {
        Preview {
            file: request.file.clone(),
            start_line: request.line,
            lines: vec![format!("line {}", request.line)],
            hit_line_offset: 1,
        }
    }

    /// Type `query` and let the debounce fire
    fn search(s: &mut Session<Recorder>, query: &str, t0: Instant) -> u64 {
        s.on_text_changed_at(Field::Query, query, t0);
        s.on_tick(t0 + DEBOUNCE);
        s.generation()
    }

    fn assert_selection_invariants(s: &Session<Recorder>) {
        let len = s.results().len();
        assert_eq!(s.selected().is_none(), len == 0, "selected iff non-empty");
        if let Some(sel) = s.selected() {
            assert!(sel < len);
            assert!(s.visible().contains(&sel), "selection must be visible");
        }
        assert!(s.scroll_offset() <= len.saturating_sub(s.window()));
    }

    #[test]
    fn test_debounce_collapses_typing() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_text_changed_at(Field::Query, "foo", t0);
        s.on_tick(t0 + Duration::from_millis(50));
        s.on_text_changed_at(Field::Query, "foobar", t0 + Duration::from_millis(50));
        s.on_tick(t0 + Duration::from_millis(260));
        assert!(s.dispatch().searches.is_empty(), "timer was restarted");

        s.on_tick(t0 + Duration::from_millis(300));
        let searches = &s.dispatch().searches;
        assert_eq!(searches.len(), 1);
        assert_eq!(searches[0].0.query, "foobar");
        assert_eq!(searches[0].0.root, PathBuf::from("/repo"));
        assert!(s.is_searching());
    }

    #[test]
    fn test_stale_debounce_snapshot_is_ignored() {
        let mut s = session();
        s.on_text_changed_at(Field::Query, "foobar", Instant::now());
        s.on_debounce_elapsed("foo", None);
        assert!(s.dispatch().searches.is_empty());

        s.on_debounce_elapsed("foobar", None);
        assert_eq!(s.dispatch().searches.len(), 1);
    }

    #[test]
    fn test_empty_query_never_searches() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_text_changed_at(Field::Query, "a", t0);
        s.on_text_changed_at(Field::Query, "", t0);
        assert!(!s.is_debouncing());
        s.on_tick(t0 + Duration::from_secs(5));
        s.on_debounce_elapsed("", None);

        assert!(s.dispatch().searches.is_empty());
        assert!(!s.is_searching());
        assert!(s.results().is_empty());
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn test_completion_selects_first_and_requests_preview() {
        let mut s = session();
        let generation = search(&mut s, "hit", Instant::now());
        s.on_search_completed(generation, Ok(hits(3)));

        assert!(!s.is_searching());
        assert_eq!(s.results().len(), 3);
        assert_eq!(s.selected(), Some(0));
        assert_eq!(
            s.dispatch().previews,
            vec![PreviewRequest {
                index: 0,
                file: PathBuf::from("/repo/src/f0.rs"),
                line: 1,
            }]
        );
        assert_selection_invariants(&s);
    }

    #[test]
    fn test_out_of_order_completions() {
        let mut s = session();
        let t0 = Instant::now();
        let first = search(&mut s, "foo", t0);
        let second = search(&mut s, "foob", t0 + Duration::from_secs(1));
        assert!(second > first);
        assert!(s.dispatch().searches[0].1.is_cancelled());

        s.on_search_completed(second, Ok(hits(2)));
        s.on_search_completed(first, Ok(hits(9)));
        assert_eq!(s.results().len(), 2);

        // A superseded failure can't land either
        s.on_search_completed(
            first,
            Err(SearchError::Failed {
                code: Some(2),
                stderr: String::new(),
            }),
        );
        assert_eq!(s.error(), None);
        assert_eq!(s.results().len(), 2);
    }

    #[test]
    fn test_completion_after_edit_is_discarded() {
        let mut s = session();
        let t0 = Instant::now();
        let generation = search(&mut s, "foo", t0);
        s.on_text_changed_at(Field::Query, "food", t0 + Duration::from_secs(1));
        assert!(s.dispatch().searches[0].1.is_cancelled());

        s.on_search_completed(generation, Ok(hits(4)));
        assert!(s.results().is_empty());
        assert_eq!(s.selected(), None);
    }

    #[test]
    fn test_generation_is_monotonic() {
        let mut s = session();
        let t0 = Instant::now();
        let mut last = s.generation();
        for (i, q) in ["a", "ab", "abc", "ab"].iter().enumerate() {
            let g = search(&mut s, q, t0 + Duration::from_secs(i as u64));
            assert!(g > last);
            last = g;
        }
        assert!(s.on_scope_changed(Scope::Directory));
        assert!(s.generation() > last);
    }

    #[test]
    fn test_no_matches_is_not_an_error() {
        let mut s = session();
        let generation = search(&mut s, "nonexistent_token_xyz", Instant::now());
        s.on_search_completed(generation, Ok(Vec::new()));

        assert_eq!(s.error(), None);
        assert!(s.results().is_empty());
        assert_eq!(s.selected(), None);
        assert!(s.dispatch().previews.is_empty());
    }

    #[test]
    fn test_search_error_clears_results() {
        let mut s = session();
        let t0 = Instant::now();
        let generation = search(&mut s, "ok", t0);
        s.on_search_completed(generation, Ok(hits(3)));

        let generation = search(&mut s, "(", t0 + Duration::from_secs(1));
        s.on_search_completed(
            generation,
            Err(SearchError::Failed {
                code: Some(2),
                stderr: "regex parse error".to_string(),
            }),
        );
        assert!(s.error().unwrap().contains("regex parse error"));
        assert!(s.results().is_empty());
        assert_eq!(s.selected(), None);
        assert!(s.preview().is_none());

        // The next search clears the error
        search(&mut s, "(x)", t0 + Duration::from_secs(2));
        assert_eq!(s.error(), None);
    }

    #[test]
    fn test_navigation_clamps_and_scrolls() {
        let mut s = session();
        let generation = search(&mut s, "hit", Instant::now());
        s.on_search_completed(generation, Ok(hits(8)));

        s.on_navigate(Direction::Up);
        assert_eq!(s.selected(), Some(0));
        assert_eq!(s.dispatch().previews.len(), 1, "no reload at the edge");

        for expected in 1..8 {
            s.on_navigate(Direction::Down);
            assert_eq!(s.selected(), Some(expected));
            assert_selection_invariants(&s);
        }
        assert_eq!(s.scroll_offset(), 3);
        s.on_navigate(Direction::Down);
        assert_eq!(s.selected(), Some(7), "no wraparound");

        // Scrolling back up only moves once the selection leaves the window
        for _ in 0..4 {
            s.on_navigate(Direction::Up);
        }
        assert_eq!(s.selected(), Some(3));
        assert_eq!(s.scroll_offset(), 3);
        s.on_navigate(Direction::Up);
        assert_eq!(s.scroll_offset(), 2);
        assert_selection_invariants(&s);
    }

    #[test]
    fn test_navigate_on_empty_results_is_noop() {
        let mut s = session();
        s.on_navigate(Direction::Down);
        s.on_navigate(Direction::Up);
        assert_eq!(s.selected(), None);
        assert!(s.dispatch().previews.is_empty());
    }

    #[test]
    fn test_selection_invariants_under_mixed_sequences() {
        let mut s = session();
        let t0 = Instant::now();
        let steps: [(usize, &[Direction]); 4] = [
            (10, &[Direction::Down; 12]),
            (1, &[Direction::Down, Direction::Up]),
            (0, &[Direction::Down]),
            (6, &[Direction::Down, Direction::Down, Direction::Up]),
        ];
        for (i, (count, moves)) in steps.iter().enumerate() {
            let generation = search(&mut s, &format!("q{i}"), t0 + Duration::from_secs(i as u64));
            assert_selection_invariants(&s);
            s.on_search_completed(generation, Ok(hits(*count)));
            assert_selection_invariants(&s);
            for direction in moves.iter() {
                s.on_navigate(*direction);
                assert_selection_invariants(&s);
            }
        }
    }

    #[test]
    fn test_stale_preview_is_discarded() {
        let mut s = session();
        let generation = search(&mut s, "hit", Instant::now());
        s.on_search_completed(generation, Ok(hits(10)));
        s.on_navigate(Direction::Down);
        s.on_navigate(Direction::Down);
        let at_two = s.dispatch().previews.last().unwrap().clone();
        assert_eq!(at_two.index, 2);

        for _ in 0..3 {
            s.on_navigate(Direction::Down);
        }
        let at_five = s.dispatch().previews.last().unwrap().clone();
        assert_eq!(at_five.index, 5);

        s.on_preview_loaded(at_five.clone(), Ok(preview_for(&at_five)));
        s.on_preview_loaded(at_two.clone(), Ok(preview_for(&at_two)));

        let preview = s.preview().unwrap();
        assert_eq!(preview.file, at_five.file);
        assert_eq!(preview.start_line, at_five.line);
        assert!(!s.is_loading_preview());
    }

    #[test]
    fn test_preview_error_is_per_selection() {
        let mut s = session();
        let generation = search(&mut s, "hit", Instant::now());
        s.on_search_completed(generation, Ok(hits(2)));
        let first = s.dispatch().previews[0].clone();
        s.on_preview_loaded(first.clone(), Ok(preview_for(&first)));
        assert!(s.preview().is_some());

        s.on_navigate(Direction::Down);
        let second = s.dispatch().previews[1].clone();
        s.on_preview_loaded(
            second.clone(),
            Err(PreviewError::NotFound(second.file.clone())),
        );
        assert!(s.preview().is_none(), "stale preview cleared");
        assert!(s.preview_error().unwrap().contains("not found"));

        s.on_navigate(Direction::Up);
        let again = s.dispatch().previews[2].clone();
        assert_eq!(again, first);
        s.on_preview_loaded(again.clone(), Ok(preview_for(&again)));
        assert_eq!(s.preview_error(), None);
        assert!(s.preview().is_some());
    }

    #[test]
    fn test_edit_clears_selection_and_preview() {
        let mut s = session();
        let t0 = Instant::now();
        let generation = search(&mut s, "hit", t0);
        s.on_search_completed(generation, Ok(hits(7)));
        for _ in 0..6 {
            s.on_navigate(Direction::Down);
        }
        let req = s.dispatch().previews.last().unwrap().clone();
        s.on_preview_loaded(req.clone(), Ok(preview_for(&req)));
        assert!(s.scroll_offset() > 0);

        s.on_text_changed_at(Field::Query, "hits", t0 + Duration::from_secs(1));
        assert_eq!(s.selected(), None);
        assert_eq!(s.scroll_offset(), 0);
        assert!(s.preview().is_none());
        assert!(s.results().is_empty());
        assert!(s.is_debouncing());
    }

    #[test]
    fn test_filter_changes_the_request() {
        let mut s = session();
        let t0 = Instant::now();
        s.on_text_changed_at(Field::Query, "fn", t0);
        s.on_text_changed_at(Field::Filter, "*.rs", t0);
        s.on_tick(t0 + DEBOUNCE);
        assert_eq!(s.dispatch().searches[0].0.filter.as_deref(), Some("*.rs"));

        // Disabling the filter reruns the search without the glob
        let t1 = t0 + Duration::from_secs(1);
        s.on_filter_toggled_at(t1);
        assert!(!s.filter_enabled());
        assert!(s.is_debouncing());
        s.on_tick(t1 + DEBOUNCE);
        assert_eq!(s.dispatch().searches[1].0.filter, None);

        // Editing a disabled filter doesn't touch the request
        s.on_text_changed_at(Field::Filter, "*.md", t1 + Duration::from_secs(1));
        assert!(!s.is_debouncing());
        assert_eq!(s.dispatch().searches.len(), 2);
    }

    #[test]
    fn test_scope_change_searches_immediately() {
        let mut s = session();
        let generation = search(&mut s, "hit", Instant::now());
        s.on_search_completed(generation, Ok(hits(3)));

        assert!(s.on_scope_changed(Scope::Directory));
        assert_eq!(s.scope(), Scope::Directory);
        let searches = &s.dispatch().searches;
        assert_eq!(searches.len(), 2);
        assert_eq!(searches[1].0.root, PathBuf::from("/repo/sub"));
        assert!(s.results().is_empty());
        assert!(s.is_searching());

        // Same scope again: nothing happens
        assert!(s.on_scope_changed(Scope::Directory));
        assert_eq!(s.dispatch().searches.len(), 2);

        // Results are resolved against the root they came from
        let generation = s.generation();
        s.on_search_completed(generation, Ok(hits(1)));
        assert_eq!(
            s.dispatch().previews.last().unwrap().file,
            PathBuf::from("/repo/sub/src/f0.rs")
        );
    }

    #[test]
    fn test_project_scope_requires_repository() {
        let roots = ScopeRoots {
            current_dir: PathBuf::from("/tmp/x"),
            repository: None,
        };
        let mut s = Session::new(
            Recorder::default(),
            roots,
            Scope::Project,
            SessionConfig::default(),
        );
        assert_eq!(s.scope(), Scope::Directory);
        s.on_text_changed_at(Field::Query, "x", Instant::now());
        assert!(!s.on_scope_changed(Scope::Project));
        assert_eq!(s.scope(), Scope::Directory);
        assert!(s.dispatch().searches.is_empty());
    }

    #[test]
    fn test_scope_change_with_empty_query() {
        let mut s = session();
        assert!(s.on_scope_changed(Scope::Directory));
        assert_eq!(s.scope(), Scope::Directory);
        assert!(s.dispatch().searches.is_empty());
        assert_eq!(s.generation(), 0);
    }

    #[test]
    fn test_activate_opens_selection() {
        let mut s = session();
        s.on_activate();
        assert!(!s.is_finished(), "nothing selected");

        let generation = search(&mut s, "hit", Instant::now());
        s.on_search_completed(generation, Ok(hits(3)));
        s.on_navigate(Direction::Down);
        s.on_activate();

        assert_eq!(
            s.termination(),
            Some(&Termination::Open(Location {
                file: PathBuf::from("/repo/src/f1.rs"),
                line: 2,
                column: 1,
            }))
        );
    }

    #[test]
    fn test_quit_cancels_in_flight_search() {
        let mut s = session();
        search(&mut s, "slow", Instant::now());
        s.on_cancel_or_quit();

        assert_eq!(s.termination(), Some(&Termination::Quit));
        assert!(s.dispatch().searches[0].1.is_cancelled());
        assert!(!s.is_searching());
    }

    #[test]
    fn test_focus_toggle() {
        let mut s = session();
        assert_eq!(s.focus(), Field::Query);
        s.on_focus_toggled();
        assert_eq!(s.focus(), Field::Filter);
        s.on_focus_toggled();
        assert_eq!(s.focus(), Field::Query);
    }

    #[test]
    fn test_file_count() {
        let set = ResultSet::new(PathBuf::from("/r"), hits(7));
        assert_eq!(set.len(), 7);
        assert_eq!(set.file_count(), 3);
    }
}
