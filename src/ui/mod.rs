//! Rendering for the watch page.

mod code;
mod stream;

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

use crate::app::{App, Phase};
use crate::stream::{AgentError, Goal, Milestone};

/// Theme colors
pub struct Theme {
    pub bg: Color,
    pub fg: Color,
    pub accent: Color,
    pub dim: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,
    pub info: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            bg: Color::Rgb(30, 30, 30),
            fg: Color::Rgb(220, 220, 220),
            accent: Color::Rgb(217, 119, 87),
            dim: Color::Rgb(100, 100, 100),
            success: Color::Rgb(80, 200, 120),
            warning: Color::Rgb(255, 193, 7),
            error: Color::Rgb(220, 53, 69),
            info: Color::Rgb(97, 175, 239),
        }
    }
}

impl Theme {
    fn border(&self) -> Style {
        Style::default().fg(self.dim)
    }

    fn panel<'a>(&self, title: &'a str) -> Block<'a> {
        Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(self.border())
    }
}

pub fn render(app: &App, frame: &mut Frame) {
    match &app.phase {
        Phase::Loading => render_loading(app, frame),
        Phase::NotFound(agent_id) => render_not_found(app, frame, agent_id),
        Phase::Watching => render_watching(app, frame),
    }
}

fn render_loading(app: &App, frame: &mut Frame) {
    let area = centered_rect(50, 20, frame.area());
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            format!("Connecting to {}...", app.agent_id),
            Style::default().fg(app.theme.dim),
        )),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .block(app.theme.panel(" kulti "));
    frame.render_widget(paragraph, area);
}

fn render_not_found(app: &App, frame: &mut Frame, agent_id: &str) {
    let area = centered_rect(60, 30, frame.area());
    let text = vec![
        Line::from(""),
        Line::from(Span::styled(
            "Agent not found",
            Style::default()
                .fg(app.theme.error)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from(Span::styled(
            format!("'{}' has no stream session.", agent_id),
            Style::default().fg(app.theme.fg),
        )),
        Line::from(Span::styled(
            format!("Browse live agents at {}", app.landing_url),
            Style::default().fg(app.theme.accent),
        )),
        Line::from(""),
        Line::from(Span::styled(
            "Press q to quit",
            Style::default().fg(app.theme.dim),
        )),
    ];
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true })
        .block(app.theme.panel(" kulti "));
    frame.render_widget(paragraph, area);
}

fn render_watching(app: &App, frame: &mut Frame) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Header
            Constraint::Min(0),    // Main content
            Constraint::Length(3), // Footer/status
        ])
        .split(frame.area());

    render_header(app, frame, chunks[0]);
    render_main(app, frame, chunks[1]);
    render_footer(app, frame, chunks[2]);
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let theme = &app.theme;
    let Some(session) = app.view.session.as_ref() else {
        return;
    };

    let mut title = vec![
        Span::styled(
            format!(" {} ", session.avatar_glyph()),
            Style::default().fg(theme.accent),
        ),
        Span::styled(
            format!("{} ", session.agent_name),
            Style::default()
                .fg(theme.accent)
                .add_modifier(Modifier::BOLD),
        ),
    ];
    if session.status.is_live() {
        title.push(Span::styled(
            " ● LIVE ",
            Style::default()
                .fg(theme.bg)
                .bg(theme.error)
                .add_modifier(Modifier::BOLD),
        ));
    } else {
        title.push(Span::styled(
            session.status.as_str().to_string(),
            Style::default().fg(theme.dim),
        ));
    }
    title.push(Span::styled(
        format!(" │ {} watching │ building in public", session.viewers_count),
        Style::default().fg(theme.dim),
    ));

    let task = Line::from(Span::styled(
        format!(" {}", session.current_task.as_deref().unwrap_or("")),
        Style::default().fg(theme.fg),
    ));

    let header = Paragraph::new(vec![Line::from(title), task]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(theme.border()),
    );
    frame.render_widget(header, area);
}

fn render_main(app: &App, frame: &mut Frame, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(40), // Goal, errors, thoughts
            Constraint::Percentage(60), // Code or preview
        ])
        .split(area);

    render_sidebar(app, frame, chunks[0]);
    code::render(app, frame, chunks[1]);
}

fn render_sidebar(app: &App, frame: &mut Frame, area: Rect) {
    let goal = app
        .view
        .goal
        .as_ref()
        .map(|goal| goal_lines(app, goal, &app.view.milestones));
    let errors = app.shown_errors();
    let errors = (!errors.is_empty()).then(|| error_lines(app, errors));

    let mut constraints = Vec::new();
    if let Some(lines) = &goal {
        constraints.push(Constraint::Length(panel_height(lines.len())));
    }
    if let Some(lines) = &errors {
        constraints.push(Constraint::Length(
            panel_height(lines.len()).min(area.height / 3),
        ));
    }
    constraints.push(Constraint::Min(0));

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(area);

    let mut next = 0;
    if let Some(lines) = goal {
        let panel = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(app.theme.panel(" Goal "));
        frame.render_widget(panel, chunks[next]);
        next += 1;
    }
    if let Some(lines) = errors {
        let panel = Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(" Errors ")
                    .borders(Borders::ALL)
                    .border_style(Style::default().fg(app.theme.error)),
            );
        frame.render_widget(panel, chunks[next]);
        next += 1;
    }
    stream::render(app, frame, chunks[next]);
}

fn goal_lines<'a>(app: &App, goal: &'a Goal, milestones: &'a [Milestone]) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let mut lines = vec![Line::from(Span::styled(
        goal.title.as_str(),
        Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
    ))];
    if let Some(description) = goal.description.as_deref() {
        lines.push(Line::from(Span::styled(
            description,
            Style::default().fg(theme.dim),
        )));
    }
    for milestone in milestones {
        let (mark, color) = if milestone.completed {
            ("✓ ", theme.success)
        } else {
            ("○ ", theme.dim)
        };
        lines.push(Line::from(vec![
            Span::styled(mark, Style::default().fg(color)),
            Span::styled(milestone.label.as_str(), Style::default().fg(theme.fg)),
        ]));
    }
    lines
}

/// Bordered panel height for `lines` rows of content
fn panel_height(lines: usize) -> u16 {
    u16::try_from(lines).unwrap_or(u16::MAX).saturating_add(2)
}

fn error_lines<'a>(app: &App, errors: &'a [AgentError]) -> Vec<Line<'a>> {
    let theme = &app.theme;
    let mut lines = Vec::new();
    for (i, error) in errors.iter().enumerate() {
        let mut head = vec![
            Span::styled(format!("{} ", i + 1), Style::default().fg(theme.dim)),
            Span::styled(error.message.as_str(), Style::default().fg(theme.error)),
        ];
        if let Some(location) = error.location() {
            head.push(Span::styled(
                format!("  {}", location),
                Style::default().fg(theme.dim),
            ));
        }
        lines.push(Line::from(head));

        if let Some(strategy) = error.recovery_strategy.as_deref() {
            lines.push(Line::from(Span::styled(
                format!("  ↳ {}", strategy),
                Style::default().fg(theme.warning),
            )));
        }
        if let Some(stack) = error.stack.as_deref() {
            if app.expanded_errors[i] {
                lines.extend(stack.lines().map(|entry| {
                    Line::from(Span::styled(
                        format!("    {}", entry),
                        Style::default().fg(theme.dim),
                    ))
                }));
            }
        }
    }
    lines
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    let help_text =
        " q: Quit │ ←/→: Files │ Tab: Code/Preview │ d: Details │ 1-3: Stacks │ y: Copy file ";

    let content = if let Some(ref msg) = app.error_message {
        let style = if msg.contains("copied") {
            Style::default().fg(app.theme.success)
        } else {
            Style::default().fg(app.theme.error)
        };
        Line::from(Span::styled(format!(" {} ", msg), style))
    } else {
        Line::from(Span::styled(help_text, Style::default().fg(app.theme.dim)))
    };

    let footer = Paragraph::new(content).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(app.theme.border()),
    );
    frame.render_widget(footer, area);
}

/// Helper function to create a centered rectangle
fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

/// Rows a line of `text` takes when wrapped to `width` columns
fn wrapped_rows(text: &str, width: u16) -> usize {
    let width = usize::from(width.max(1));
    text.lines()
        .map(|line| line.chars().count().max(1).div_ceil(width))
        .sum::<usize>()
        .max(1)
}
