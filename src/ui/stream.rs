use chrono::Local;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Paragraph, Wrap},
    Frame,
};

use super::{wrapped_rows, Theme};
use crate::app::App;
use crate::view::{ThoughtBlock, ThoughtKind, ThoughtPriority};

/// Entries from the end that keep normal emphasis
const RECENT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Emphasis {
    Full,
    Normal,
    Dimmed,
}

fn emphasis(block: &ThoughtBlock, from_end: usize) -> Emphasis {
    if from_end == 0 || block.priority == ThoughtPriority::Headline {
        Emphasis::Full
    } else if from_end < RECENT {
        Emphasis::Normal
    } else {
        Emphasis::Dimmed
    }
}

fn kind_color(theme: &Theme, kind: ThoughtKind) -> Color {
    match kind {
        ThoughtKind::Reasoning => theme.info,
        ThoughtKind::Prompt => theme.accent,
        ThoughtKind::Tool => theme.warning,
        ThoughtKind::Context => Color::Rgb(198, 120, 221),
        ThoughtKind::Evaluation => Color::Rgb(86, 182, 194),
        ThoughtKind::Decision => theme.success,
        ThoughtKind::Observation => Color::Rgb(229, 192, 123),
        ThoughtKind::General => theme.fg,
    }
}

fn block_lines<'a>(theme: &Theme, block: &'a ThoughtBlock, emphasis: Emphasis) -> Vec<Line<'a>> {
    let text_style = match emphasis {
        Emphasis::Full => Style::default().fg(theme.fg).add_modifier(Modifier::BOLD),
        Emphasis::Normal => Style::default().fg(theme.fg),
        Emphasis::Dimmed => Style::default().fg(theme.dim),
    };
    let meta = &block.metadata;

    let mut head = Vec::new();
    if block.priority == ThoughtPriority::Headline {
        head.push(Span::styled("★ ", Style::default().fg(theme.warning)));
    }
    head.push(Span::styled(
        format!("[{}]", block.kind.label()),
        Style::default().fg(kind_color(theme, block.kind)),
    ));
    if block.kind != ThoughtKind::Prompt {
        if let Some(tool) = meta.tool.as_deref() {
            head.push(Span::styled(
                format!(" {}", tool),
                Style::default().fg(theme.warning),
            ));
        }
    }
    if let Some(file) = meta.short_file() {
        head.push(Span::styled(
            format!(" {}", file),
            Style::default().fg(theme.info),
        ));
    }
    head.push(Span::styled(
        format!(" {}", block.timestamp.with_timezone(&Local).format("%H:%M:%S")),
        Style::default().fg(theme.dim),
    ));

    let mut body = vec![Span::styled(block.displayed(), text_style)];
    if block.typing {
        body.push(Span::styled("▌", Style::default().fg(theme.accent)));
    }

    let mut lines = vec![Line::from(head), Line::from(body)];

    if !meta.options.is_empty() {
        lines.push(Line::from(Span::styled(
            format!("  options: {}", meta.options.join(" · ")),
            Style::default().fg(theme.dim),
        )));
    }
    if let Some(chosen) = meta.chosen.as_deref() {
        let confidence = meta
            .confidence
            .map(|c| format!(" ({:.0}%)", c * 100.0))
            .unwrap_or_default();
        lines.push(Line::from(Span::styled(
            format!("  → {}{}", chosen, confidence),
            Style::default().fg(theme.success),
        )));
    }
    lines.push(Line::from(""));
    lines
}

/// Thought stream, newest at the bottom
pub fn render(app: &App, frame: &mut Frame, area: Rect) {
    let theme = &app.theme;
    let title = if app.collapsed_details {
        " Thoughts (details hidden) "
    } else {
        " Thoughts "
    };
    let block = theme.panel(title);
    let inner = block.inner(area);

    let visible = app.view.thoughts.visible(app.collapsed_details);
    if visible.is_empty() {
        let waiting = Paragraph::new(Line::from(Span::styled(
            "waiting for thoughts...",
            Style::default().fg(theme.dim),
        )))
        .block(block);
        frame.render_widget(waiting, area);
        return;
    }

    // Keep the newest entries on screen
    let budget = usize::from(inner.height);
    let mut used = 0;
    let mut shown: Vec<Vec<Line>> = Vec::new();
    for (from_end, thought) in visible.iter().rev().enumerate() {
        let lines = block_lines(theme, thought, emphasis(thought, from_end));
        let rows: usize = lines
            .iter()
            .map(|line| wrapped_rows(&line.to_string(), inner.width))
            .sum();
        if used + rows > budget && !shown.is_empty() {
            break;
        }
        used += rows;
        shown.push(lines);
    }
    let lines: Vec<Line> = shown.into_iter().rev().flatten().collect();
    let scroll = u16::try_from(used.saturating_sub(budget)).unwrap_or(u16::MAX);

    let paragraph = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .scroll((scroll, 0))
        .block(block);
    frame.render_widget(paragraph, area);
}
