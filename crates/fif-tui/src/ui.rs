//! UI rendering

use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols::border,
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};

use super::app::App;
use super::input::TextInput;
use super::session::{Dispatch, Field, Session};
use fif_search::Scope;

/// Counts at or above this are shown as "100+"
const COUNT_CAP: usize = 100;

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    let results_height = app.session.window() as u16 + 2;
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),              // Query, filter, scope
            Constraint::Length(1),              // Status
            Constraint::Length(results_height), // Result list
            Constraint::Min(3),                 // Preview
            Constraint::Length(1),              // Key hints or toast
        ])
        .split(frame.area());

    let header = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(30),
            Constraint::Percentage(20),
        ])
        .split(rows[0]);

    render_input(frame, app, Field::Query, header[0]);
    render_input(frame, app, Field::Filter, header[1]);
    render_scope_tabs(frame, app.session.scope(), header[2]);
    render_status(frame, app, rows[1]);
    render_results(frame, app, rows[2]);
    render_preview(frame, app, rows[3]);
    render_footer(frame, app, rows[4]);
}

/// Text for the status line
pub fn status_text<D: Dispatch>(session: &Session<D>) -> String {
    if session.is_searching() || session.is_debouncing() {
        return "Searching...".to_string();
    }
    if let Some(error) = session.error() {
        return format!("Error: {error}");
    }
    if session.query().is_empty() {
        return "Enter a search query...".to_string();
    }
    let results = session.results();
    if results.is_empty() {
        return "No matches found".to_string();
    }
    let files = results.file_count();
    format!(
        "{} matches in {} {}",
        capped(results.len()),
        capped(files),
        if files == 1 { "file" } else { "files" }
    )
}

fn capped(n: usize) -> String {
    if n >= COUNT_CAP {
        format!("{COUNT_CAP}+")
    } else {
        n.to_string()
    }
}

fn render_input(frame: &mut Frame, app: &App, field: Field, area: Rect) {
    let focused = app.session.focus() == field;
    let input = app.input(field);

    let title = match field {
        Field::Query => " Find in Files ".to_string(),
        Field::Filter => {
            let check = if app.session.filter_enabled() { "x" } else { " " };
            format!(" [{check}] File mask ")
        }
    };
    let border_style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(Color::Gray).add_modifier(Modifier::DIM)
    };
    let text_style = if field == Field::Filter && !app.session.filter_enabled() {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::White)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(border_style)
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let line = if input.text().is_empty() && !focused && field == Field::Filter {
        Line::from(Span::styled("*.rs", Style::default().fg(Color::DarkGray)))
    } else {
        Line::from(Span::styled(input.text(), text_style))
    };
    frame.render_widget(Paragraph::new(line), inner);

    if focused {
        place_cursor(frame, input, inner);
    }
}

fn place_cursor(frame: &mut Frame, input: &TextInput, area: Rect) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let column = (input.cursor_column() as u16).min(area.width - 1);
    frame.set_cursor_position((area.x + column, area.y));
}

fn render_scope_tabs(frame: &mut Frame, scope: Scope, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(Color::Gray).add_modifier(Modifier::DIM));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let tab = |s: Scope| {
        if s == scope {
            Span::styled(
                s.label(),
                Style::default()
                    .fg(Color::Magenta)
                    .add_modifier(Modifier::BOLD),
            )
        } else {
            Span::styled(s.label(), Style::default().fg(Color::DarkGray))
        }
    };
    let line = Line::from(vec![
        tab(Scope::Project),
        Span::styled(" | ", Style::default().fg(Color::DarkGray)),
        tab(Scope::Directory),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
    let style = if app.session.error().is_some() {
        Style::default().fg(Color::Red)
    } else if app.session.is_searching() {
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::DIM)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let line = Line::from(Span::styled(
        format!("  {}", status_text(&app.session)),
        style,
    ));
    frame.render_widget(Paragraph::new(line), area);
}

fn render_results(frame: &mut Frame, app: &App, area: Rect) {
    let selection_bg = Color::Rgb(38, 38, 38);
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(Color::Gray).add_modifier(Modifier::DIM))
        .title(" Results ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let session = &app.session;
    let results = session.results();
    let lines: Vec<Line> = session
        .visible()
        .filter_map(|i| results.get(i).map(|m| (i, m)))
        .map(|(i, m)| {
            let is_selected = session.selected() == Some(i);
            let bg = if is_selected {
                Style::default().bg(selection_bg)
            } else {
                Style::default()
            };
            let marker = if is_selected { "▌ " } else { "  " };
            Line::from(vec![
                Span::styled(marker, bg.fg(Color::LightRed)),
                Span::styled(
                    format!("{}:{}", m.file.display(), m.line),
                    bg.fg(Color::Cyan),
                ),
                Span::styled("  ", bg),
                Span::styled(m.text.trim(), bg.fg(Color::White)),
            ])
            .style(bg)
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_preview(frame: &mut Frame, app: &App, area: Rect) {
    let session = &app.session;
    let title = match session.selected_match() {
        Some(m) => format!(" {} ", m.file.display()),
        None => " Preview ".to_string(),
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_set(border::ROUNDED)
        .border_style(Style::default().fg(Color::Gray).add_modifier(Modifier::DIM))
        .title(title);
    let inner = block.inner(area);
    frame.render_widget(block, area);

    if let Some(error) = session.preview_error() {
        let para = Paragraph::new(format!("Error loading preview: {error}"))
            .style(Style::default().fg(Color::Red));
        frame.render_widget(para, inner);
        return;
    }

    let Some(preview) = session.preview() else {
        if session.is_loading_preview() {
            let loading = Paragraph::new("Loading...")
                .style(Style::default().fg(Color::DarkGray))
                .alignment(Alignment::Center);
            frame.render_widget(loading, inner);
        }
        return;
    };

    let hit = preview.hit_line();
    let last = preview.start_line + preview.lines.len().saturating_sub(1);
    let gutter = last.to_string().len();
    let lines: Vec<Line> = preview
        .numbered()
        .map(|(number, text)| {
            let (number_style, text_style) = if Some(number) == hit {
                (
                    Style::default().fg(Color::Yellow),
                    Style::default()
                        .fg(Color::White)
                        .bg(Color::Rgb(58, 48, 18))
                        .add_modifier(Modifier::BOLD),
                )
            } else {
                (
                    Style::default().fg(Color::DarkGray),
                    Style::default().fg(Color::Gray),
                )
            };
            Line::from(vec![
                Span::styled(format!("{number:>gutter$} "), number_style),
                Span::styled(text.replace('\t', "    "), text_style),
            ])
        })
        .collect();

    frame.render_widget(Paragraph::new(lines), inner);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let bracket = Style::default().fg(Color::DarkGray);

    if let Some(ref toast) = app.toast {
        let toast_style = if toast.is_error {
            Style::default().fg(Color::Red).add_modifier(Modifier::DIM)
        } else {
            Style::default().fg(Color::Blue).add_modifier(Modifier::DIM)
        };
        let spans = vec![
            Span::styled("  [", bracket),
            Span::styled(&toast.message, toast_style),
            Span::styled("]", bracket),
        ];
        frame.render_widget(Paragraph::new(Line::from(spans)), area);
        return;
    }

    let dim = Style::default().fg(Color::DarkGray);
    let mut spans = vec![Span::raw(" ")];
    for hint in [
        "↑↓ select",
        "⏎ open",
        "Tab field",
        "^T mask",
        "Alt+P/D scope",
        "Esc quit",
    ] {
        spans.extend([
            Span::styled(" [", bracket),
            Span::styled(hint, dim),
            Span::styled("]", bracket),
        ]);
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}
