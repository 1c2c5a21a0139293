use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, List, ListItem, Paragraph, Tabs};
use ratatui::Frame;
use yuletide_core::tui_types::SessionStatus;
use yuletide_core::{Role, TranscriptEntry};

use crate::app::{App, Tab};

/// Words at the end of an unfinished line drawn bold while it streams.
const STREAMING_WORDS: usize = 3;

pub fn draw(frame: &mut Frame, app: &App) {
    let [tabs_area, main_area] =
        Layout::vertical([Constraint::Length(3), Constraint::Fill(1)]).areas(frame.area());

    draw_tabs(frame, app, tabs_area);

    match app.tab {
        Tab::Live => draw_live(frame, app, main_area),
        Tab::Personas => draw_personas(frame, app, main_area),
        Tab::Logs => draw_logs(frame, app, main_area),
    }
}

fn draw_tabs(frame: &mut Frame, app: &App, area: Rect) {
    let titles = vec!["1:Live", "2:Personas", "3:Logs"];
    let selected = match app.tab {
        Tab::Live => 0,
        Tab::Personas => 1,
        Tab::Logs => 2,
    };
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title("YULETIDE"))
        .select(selected)
        .highlight_style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD));
    frame.render_widget(tabs, area);
}

fn draw_live(frame: &mut Frame, app: &App, area: Rect) {
    let [status_area, transcript_area] =
        Layout::vertical([Constraint::Length(4), Constraint::Fill(1)]).areas(area);

    let status = app.state.status;
    let accent = app
        .session_persona()
        .map(|p| accent_color(&p.accent_color))
        .unwrap_or(Color::Blue);
    let persona_name = app
        .session_persona()
        .map(|p| p.name.as_str())
        .unwrap_or("-");

    let status_line = Line::from(vec![
        Span::styled(
            format!("[{}]", status.label()),
            Style::default()
                .fg(status_color(status))
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(persona_name, Style::default().fg(accent)),
        Span::raw("  "),
        if app.state.mic_muted {
            Span::styled("MIC MUTED", Style::default().fg(Color::Red))
        } else {
            Span::styled("MIC LIVE", Style::default().fg(Color::Green))
        },
        Span::raw(format!("  buffers:{}", app.state.scheduled_buffers)),
    ]);

    let message_line = if let Some(err) = &app.state.error {
        Line::from(Span::styled(err.as_str(), Style::default().fg(Color::Red)))
    } else if let Some(notice) = &app.state.notice {
        Line::from(Span::styled(notice.as_str(), Style::default().fg(Color::Yellow)))
    } else if status.is_engaged() {
        Line::from("Space=stop  m=mute  c=clear  q=quit")
    } else {
        Line::from("Space=start  m=mute  c=clear  q=quit")
    };

    let status_block = Paragraph::new(vec![status_line, message_line])
        .block(Block::default().borders(Borders::ALL).title("Session"));
    frame.render_widget(status_block, status_area);

    // Newest lines stay in view; long entries wrap onto extra rows
    let visible_height = transcript_area.height.saturating_sub(2) as usize;
    let inner_width = transcript_area.width.saturating_sub(2) as usize;
    let entries = &app.state.transcript;
    let mut items: Vec<ListItem> = Vec::new();
    let mut rows = 0;
    for entry in entries.iter().rev() {
        if rows >= visible_height {
            break;
        }
        let mut lines = wrap_spans(&transcript_spans(entry, persona_name, accent), inner_width);
        let room = visible_height - rows;
        if lines.len() > room {
            lines.drain(..lines.len() - room);
        }
        rows += lines.len();
        items.push(ListItem::new(Text::from(lines)));
    }
    items.reverse();

    let title = if entries.is_empty() {
        "Transcript (waiting for speech)".to_string()
    } else {
        format!("Transcript ({})", entries.len())
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, transcript_area);
}

fn transcript_spans<'a>(
    entry: &'a TranscriptEntry,
    persona_name: &'a str,
    accent: Color,
) -> Vec<Span<'a>> {
    let (label, label_style) = match entry.role {
        Role::User => ("USR", Style::default().fg(Color::Gray)),
        Role::Model => (persona_name, Style::default().fg(accent)),
    };
    let mut spans = vec![
        Span::styled(
            entry
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string(),
            Style::default().fg(Color::DarkGray),
        ),
        Span::raw(" "),
        Span::styled(label, label_style.add_modifier(Modifier::BOLD)),
        Span::raw(": "),
    ];
    if entry.is_complete {
        spans.push(Span::raw(entry.text.as_str()));
    } else {
        let (settled, streaming) = split_streaming_tail(&entry.text, STREAMING_WORDS);
        spans.push(Span::raw(settled));
        spans.push(Span::styled(
            streaming,
            Style::default().add_modifier(Modifier::BOLD),
        ));
    }
    spans
}

/// Greedy word wrap of styled spans into lines at most `width` columns wide.
///
/// Words longer than a whole line are split. Styles carry over per piece.
pub fn wrap_spans(spans: &[Span<'_>], width: usize) -> Vec<Line<'static>> {
    let width = width.max(1);
    let mut lines = Vec::new();
    let mut current: Vec<Span<'static>> = Vec::new();
    let mut used = 0;

    for span in spans {
        for word in span.content.split_inclusive(' ') {
            let mut rest = word;
            while !rest.is_empty() {
                // Trailing spaces may hang past the edge
                let visible = rest.trim_end().chars().count();
                if used > 0 && used + visible > width {
                    lines.push(Line::from(std::mem::take(&mut current)));
                    used = 0;
                }
                if visible <= width - used.min(width) {
                    current.push(Span::styled(rest.to_string(), span.style));
                    used += rest.chars().count();
                    break;
                }
                let split = rest
                    .char_indices()
                    .nth(width)
                    .map(|(i, _)| i)
                    .unwrap_or(rest.len());
                current.push(Span::styled(rest[..split].to_string(), span.style));
                lines.push(Line::from(std::mem::take(&mut current)));
                used = 0;
                rest = &rest[split..];
            }
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(Line::from(current));
    }
    lines
}

/// Split `text` before its last `words` words.
pub fn split_streaming_tail(text: &str, words: usize) -> (&str, &str) {
    if words == 0 {
        return (text, "");
    }
    let starts: Vec<usize> = text
        .char_indices()
        .filter(|&(i, c)| {
            !c.is_whitespace()
                && text[..i]
                    .chars()
                    .next_back()
                    .map_or(true, char::is_whitespace)
        })
        .map(|(i, _)| i)
        .collect();
    if starts.len() <= words {
        return ("", text);
    }
    text.split_at(starts[starts.len() - words])
}

fn draw_personas(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .personas
        .iter()
        .enumerate()
        .map(|(i, persona)| {
            let marker = if i == app.selected_persona { ">" } else { " " };
            let name_style = if i == app.selected_persona {
                Style::default()
                    .fg(accent_color(&persona.accent_color))
                    .add_modifier(Modifier::BOLD)
            } else {
                Style::default().fg(accent_color(&persona.accent_color))
            };
            let line = Line::from(vec![
                Span::raw(format!("{} ", marker)),
                Span::styled(persona.name.as_str(), name_style),
                Span::raw(format!("  voice:{}", persona.voice_name)),
                Span::styled(
                    format!("  {}", persona.description),
                    Style::default().fg(Color::DarkGray),
                ),
            ]);
            ListItem::new(line)
        })
        .collect();

    let title = if app.state.status.is_engaged() {
        "Personas (locked during session)"
    } else {
        "Personas (Up/Down=select, Space=start)"
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

fn draw_logs(frame: &mut Frame, app: &App, area: Rect) {
    let Ok(logs) = app.logs.lock() else {
        return;
    };
    let total = logs.len();

    let visible_height = area.height.saturating_sub(2) as usize; // account for borders
    let scroll = app.log_scroll.min(total.saturating_sub(visible_height));
    let end = total.saturating_sub(scroll);
    let start = end.saturating_sub(visible_height);

    let items: Vec<ListItem> = logs
        .iter()
        .skip(start)
        .take(end - start)
        .map(|s| ListItem::new(s.as_str()))
        .collect();

    let title = if app.log_auto_scroll {
        "Logs (auto-scroll)"
    } else {
        "Logs (Up/Down=scroll, G=bottom)"
    };
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    frame.render_widget(list, area);
}

fn status_color(status: SessionStatus) -> Color {
    match status {
        SessionStatus::Idle => Color::Gray,
        SessionStatus::Connecting => Color::Yellow,
        SessionStatus::Active => Color::Green,
        SessionStatus::Error => Color::Red,
    }
}

/// `#rrggbb` to a terminal colour; anything else falls back to blue.
pub fn accent_color(hex: &str) -> Color {
    let parse = |range: std::ops::Range<usize>| {
        hex.get(range).and_then(|s| u8::from_str_radix(s, 16).ok())
    };
    match (hex.len(), hex.starts_with('#')) {
        (7, true) => match (parse(1..3), parse(3..5), parse(5..7)) {
            (Some(r), Some(g), Some(b)) => Color::Rgb(r, g, b),
            _ => Color::Blue,
        },
        _ => Color::Blue,
    }
}
