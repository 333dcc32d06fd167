use chrono::Local;
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use super::Theme;
use crate::app::{App, Pane};
use crate::view::{classify_diff_line, CodeFile, DiffLine, FileAction, FileMap};

pub fn render(app: &App, frame: &mut Frame, area: Rect) {
    match app.pane {
        Pane::Code => render_code(app, frame, area),
        Pane::Preview => render_preview(app, frame, area),
    }
}

fn render_code(app: &App, frame: &mut Frame, area: Rect) {
    let theme = &app.theme;
    let block = theme.panel(" Code ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let Some(file) = app.view.active() else {
        let waiting = Paragraph::new(Line::from(Span::styled(
            "waiting for code...",
            Style::default().fg(theme.dim),
        )));
        frame.render_widget(waiting, inner);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1), // Tabs
            Constraint::Length(1), // File header
            Constraint::Min(0),    // Content
        ])
        .split(inner);

    let tabs = Paragraph::new(tab_line(theme, &app.view.files, &file.filename));
    frame.render_widget(tabs, chunks[0]);
    frame.render_widget(Paragraph::new(file_header(theme, file)), chunks[1]);

    let lines = content_lines(theme, file);
    // Follow the cursor
    let scroll = u16::try_from(lines.len().saturating_sub(usize::from(chunks[2].height)))
        .unwrap_or(u16::MAX);
    let content = Paragraph::new(lines).scroll((scroll, 0));
    frame.render_widget(content, chunks[2]);
}

fn tab_line<'a>(theme: &Theme, files: &'a FileMap, active: &str) -> Line<'a> {
    let mut spans = Vec::new();
    for (i, file) in files.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled(" │ ", Style::default().fg(theme.dim)));
        }
        let style = if file.filename == active {
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(theme.dim)
        };
        spans.push(Span::styled(file.filename.as_str(), style));
        if file.typing {
            spans.push(Span::styled(" ●", Style::default().fg(theme.warning)));
        }
    }
    Line::from(spans)
}

fn file_header<'a>(theme: &Theme, file: &'a CodeFile) -> Line<'a> {
    let action_color = match file.action {
        FileAction::Write => theme.success,
        FileAction::Edit => theme.warning,
        FileAction::Delete => theme.error,
    };
    let mut spans = vec![
        Span::styled(
            format!("[{}] ", file.action.as_str()),
            Style::default().fg(action_color),
        ),
        Span::styled(file.filename.as_str(), Style::default().fg(theme.fg)),
        Span::styled(
            format!(" {}", file.language),
            Style::default().fg(theme.dim),
        ),
    ];
    if file.typing {
        spans.push(Span::styled(" typing...", Style::default().fg(theme.warning)));
    }
    spans.push(Span::styled(
        format!(" {}", file.timestamp.with_timezone(&Local).format("%H:%M:%S")),
        Style::default().fg(theme.dim),
    ));
    Line::from(spans)
}

fn content_lines<'a>(theme: &Theme, file: &'a CodeFile) -> Vec<Line<'a>> {
    let text = file.displayed();
    let diff = file.is_diff();
    let mut lines: Vec<Line> = text
        .split('\n')
        .enumerate()
        .map(|(i, line)| {
            if diff {
                let style = match classify_diff_line(line) {
                    DiffLine::Removed => Style::default().fg(theme.error),
                    DiffLine::Added => Style::default().fg(theme.success),
                    DiffLine::HunkHeader => Style::default().fg(theme.info),
                    DiffLine::Context => Style::default().fg(theme.fg),
                };
                Line::from(Span::styled(line, style))
            } else {
                Line::from(vec![
                    Span::styled(format!("{:>4} ", i + 1), Style::default().fg(theme.dim)),
                    Span::styled(line, Style::default().fg(theme.fg)),
                ])
            }
        })
        .collect();

    if file.typing {
        if let Some(last) = lines.last_mut() {
            last.push_span(Span::styled("▌", Style::default().fg(theme.accent)));
        }
    }
    lines
}

fn render_preview(app: &App, frame: &mut Frame, area: Rect) {
    let theme = &app.theme;
    let url = app
        .view
        .session
        .as_ref()
        .and_then(|s| s.preview_url.as_deref())
        .filter(|url| !url.is_empty());

    let text = match url {
        Some(url) => vec![
            Line::from(Span::styled("Live preview", Style::default().fg(theme.dim))),
            Line::from(""),
            Line::from(Span::styled(
                url,
                Style::default()
                    .fg(theme.info)
                    .add_modifier(Modifier::UNDERLINED),
            )),
            Line::from(""),
            Line::from(Span::styled(
                "Open the link in a browser to see the running app",
                Style::default().fg(theme.dim),
            )),
        ],
        None => vec![Line::from(Span::styled(
            "waiting for dev server...",
            Style::default().fg(theme.dim),
        ))],
    };

    let paragraph = Paragraph::new(text)
        .wrap(Wrap { trim: true })
        .block(theme.panel(" Preview "));
    frame.render_widget(paragraph, area);
}
