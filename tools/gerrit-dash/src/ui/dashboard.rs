//! Dashboard UI rendering.

use chrono::{DateTime, Local, Utc};
use gerrit_watch::domain::{highlight, StatusClass, Tone};
use gerrit_watch::{ReviewRow, WatcherState};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame,
};

use crate::app::App;

const COLUMNS: [&str; 8] = [
    "Status", "Project", "Owner", "Topic", "Subject", "Created", "Updated", "Comment",
];

/// Render the main dashboard.
pub fn render(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(5),    // Review table
            Constraint::Length(3), // Selected row
            Constraint::Length(3), // Footer
        ])
        .split(frame.area());

    render_header(frame, app, chunks[0]);
    render_table(frame, app, chunks[1]);
    render_selection(frame, app, chunks[2]);
    render_footer(frame, app, chunks[3]);
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let (symbol, color) = match app.watcher_state {
        WatcherState::Consuming => ("●", Color::Green),
        WatcherState::Connecting => ("◐", Color::Yellow),
        WatcherState::Idle => ("○", Color::DarkGray),
        WatcherState::Dead => ("○", Color::Red),
    };

    let mut spans = vec![
        Span::raw(" Server: "),
        Span::styled(app.server.as_str(), Style::default().fg(Color::Cyan)),
        Span::raw("    Status: "),
        Span::styled(
            format!("{} {}", symbol, app.status),
            Style::default().fg(color).add_modifier(Modifier::BOLD),
        ),
        Span::raw("    Uptime: "),
        Span::styled(app.uptime_str(), Style::default().fg(Color::Cyan)),
    ];
    if let Some(failure) = &app.last_failure {
        spans.push(Span::raw("    Last error: "));
        spans.push(Span::styled(
            failure.to_string(),
            Style::default().fg(Color::Red),
        ));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(concat!(" GERRIT DASH ── v", env!("CARGO_PKG_VERSION"), " ")),
    );
    frame.render_widget(header, area);
}

fn render_table(frame: &mut Frame, app: &App, area: Rect) {
    let header = Row::new(COLUMNS.iter().map(|c| Cell::from(*c)))
        .style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));

    let rows: Vec<Row> = app.table.displayed().into_iter().map(review_row).collect();
    let empty = rows.is_empty();

    let widths = [
        Constraint::Length(10),
        Constraint::Length(16),
        Constraint::Length(12),
        Constraint::Length(14),
        Constraint::Min(30),
        Constraint::Length(16),
        Constraint::Length(16),
        Constraint::Min(20),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" REVIEWS ({}/{}) ", app.table.len(), app.table.capacity()))
        .border_style(Style::default().fg(Color::Blue));

    if empty {
        let waiting = Paragraph::new(Span::styled(
            " Waiting for review activity...",
            Style::default().fg(Color::DarkGray),
        ))
        .block(block);
        frame.render_widget(waiting, area);
        return;
    }

    let table = Table::new(rows, widths)
        .header(header)
        .block(block)
        .row_highlight_style(Style::default().add_modifier(Modifier::REVERSED));

    let mut state = TableState::default().with_selected(Some(app.selected));
    frame.render_stateful_widget(table, area, &mut state);
}

fn review_row(row: &ReviewRow) -> Row<'_> {
    Row::new(vec![
        Cell::from(Span::styled(
            row.status.label(),
            Style::default().fg(class_color(row.status.class())),
        )),
        Cell::from(row.project.as_str()),
        Cell::from(row.username.as_str()),
        Cell::from(row.topic.as_str()),
        Cell::from(highlighted(&row.subject)),
        Cell::from(format_instant(row.created_on)),
        Cell::from(format_instant(row.updated_on)),
        Cell::from(highlighted(&row.comment)),
    ])
}

fn render_selection(frame: &mut Frame, app: &App, area: Rect) {
    let line = match app.selected_row() {
        Some(row) => Line::from(vec![
            Span::raw(" "),
            Span::styled(row.url(), Style::default().fg(Color::Cyan)),
        ]),
        None => Line::from(Span::styled(" -", Style::default().fg(Color::DarkGray))),
    };
    let paragraph = Paragraph::new(line).block(Block::default().borders(Borders::ALL).title(" URL "));
    frame.render_widget(paragraph, area);
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (kind, count) in &app.counters {
        spans.push(Span::styled(kind.as_str(), Style::default().fg(Color::Gray)));
        spans.push(Span::styled(
            format!(" {}  ", count),
            Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        ));
    }
    spans.extend([
        Span::raw("│ Sort: "),
        Span::styled(app.table.sort_label(), Style::default().fg(Color::Cyan)),
        Span::raw("  │ "),
        Span::styled("[S] ", Style::default().fg(Color::Yellow)),
        Span::raw("Sort  "),
        Span::styled("[↑↓] ", Style::default().fg(Color::Yellow)),
        Span::raw("Select  "),
        Span::styled("[Q] ", Style::default().fg(Color::Yellow)),
        Span::raw("Quit"),
    ]);

    let footer = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" EVENTS ({}) ", app.total_events())),
    );
    frame.render_widget(footer, area);
}

fn class_color(class: StatusClass) -> Color {
    match class {
        StatusClass::Neutral => Color::White,
        StatusClass::Positive => Color::Green,
        StatusClass::Negative => Color::Red,
        StatusClass::Warning => Color::Yellow,
    }
}

/// Color the success/failure vocabulary inside free text.
fn highlighted(text: &str) -> Line<'_> {
    Line::from(
        highlight(text)
            .into_iter()
            .map(|fragment| match fragment.tone {
                Tone::Plain => Span::raw(fragment.text),
                Tone::Positive => Span::styled(fragment.text, Style::default().fg(Color::Green)),
                Tone::Negative => Span::styled(
                    fragment.text,
                    Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
                ),
            })
            .collect::<Vec<_>>(),
    )
}

/// Local wall-clock time, or a dash when unknown.
fn format_instant(instant: Option<DateTime<Utc>>) -> String {
    match instant {
        Some(t) => t.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string(),
        None => String::from("-"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gerrit_watch::{DashboardConfig, EventRecord};
    use ratatui::{backend::TestBackend, Terminal};
    use serde_json::json;

    use crate::app::TickReport;

    fn screen(app: &App) -> String {
        let mut terminal = Terminal::new(TestBackend::new(160, 20)).unwrap();
        terminal.draw(|frame| render(frame, app)).unwrap();
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_empty_dashboard_shows_waiting() {
        let app = App::new("bot@review.example.org:29418".into(), DashboardConfig::default());
        let text = screen(&app);
        assert!(text.contains("bot@review.example.org:29418"));
        assert!(text.contains("idle"));
        assert!(text.contains("Waiting for review activity"));
        assert!(text.contains("Sort: None"));
    }

    #[test]
    fn test_rows_and_counters_are_rendered() {
        let mut app = App::new("bot@host:29418".into(), DashboardConfig::default());
        let event = EventRecord::from_value(json!({
            "type": "patchset-created",
            "change": {"url": "https://r/1", "project": "core", "subject": "Fix flaky test"},
            "uploader": {"username": "alice"},
        }))
        .unwrap();
        app.apply_event(&event, &mut TickReport::default());

        let text = screen(&app);
        assert!(text.contains("Fix flaky test"));
        assert!(text.contains("alice"));
        assert!(text.contains("Open"));
        assert!(text.contains("https://r/1"));
        assert!(text.contains("patchset-created 1"));
    }

    #[test]
    fn test_highlighted_keeps_text_and_colors_keywords() {
        let line = highlighted("Build failed, retry succeeded");
        let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();
        assert_eq!(text, "Build failed, retry succeeded");

        let failed = line.spans.iter().find(|s| s.content == "failed").unwrap();
        assert_eq!(failed.style.fg, Some(Color::Red));
        let ok = line.spans.iter().find(|s| s.content == "succeeded").unwrap();
        assert_eq!(ok.style.fg, Some(Color::Green));
    }

    #[test]
    fn test_format_instant_handles_missing() {
        assert_eq!(format_instant(None), "-");
        assert_eq!(format_instant(DateTime::from_timestamp(0, 0)).len(), 16);
    }
}
