use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout},
    style::{Color, Style, Modifier},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
};

use snapbridge_core::types::BotSource;
use crate::App;

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = if app.log_visible {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
            .split(f.area())
    } else {
        Layout::default()
            .constraints([Constraint::Percentage(100)])
            .split(f.area())
    };

    // -- Left panel: bot list --

    let (banner_label, banner_bg) = if app.is_running() {
        ("RUNNING (Press S to stop)", Color::Green)
    } else {
        ("STOPPED (Press S to start)", Color::Red)
    };

    let paths = app.settings.paths();
    let mut lines: Vec<Line> = vec![
        Line::from(vec![
            Span::styled(" j", Style::default().fg(Color::Yellow)),
            Span::raw("/"),
            Span::styled("k", Style::default().fg(Color::Yellow)),
            Span::raw(" to move, "),
            Span::styled("space", Style::default().fg(Color::Yellow)),
            Span::raw(" to hand over, "),
            Span::styled("r", Style::default().fg(Color::Yellow)),
            Span::raw(" to restart"),
        ]),
        Line::from(Span::styled(
            format!(" {} -> {}", paths.snapshot.display(), paths.commands.display()),
            Style::default().fg(Color::DarkGray),
        )),
        Line::from(""),
    ];

    if let Ok(entries) = app.state.lock() {
        for (i, entry) in entries.iter().enumerate() {
            let cursor = if i == app.selected { "> " } else { "  " };
            let radio = if entry.active { "(●)" } else { "( )" };
            let kind = match entry.source {
                BotSource::Builtin => "",
                BotSource::Script(_) => " lua",
            };

            let mut spans = vec![
                Span::raw(cursor),
                Span::styled(radio, Style::default().fg(banner_bg)),
                Span::raw(" "),
                Span::styled(entry.name.clone(), Style::default().fg(Color::White).add_modifier(Modifier::BOLD)),
                Span::styled(kind, Style::default().fg(Color::Magenta)),
            ];
            if !entry.description.is_empty() {
                spans.push(Span::styled(
                    format!("  {}", entry.description),
                    Style::default().fg(Color::DarkGray),
                ));
            }
            lines.push(Line::from(spans));

            // Status lines only for the writer
            if !entry.active {
                continue;
            }
            if let Some(seen) = &entry.last_seen {
                lines.push(Line::from(Span::styled(format!("      {}", seen), Style::default().fg(Color::Yellow))));
            }
            let (text, color) = match (&entry.error, entry.status.is_empty()) {
                (Some(e), _) => (format!("      err: {}", e), Color::Red),
                (None, false) => (format!("      {} (tick {})", entry.status, entry.ticks), Color::Cyan),
                (None, true) => continue,
            };
            lines.push(Line::from(Span::styled(text, Style::default().fg(color))));
        }
    }

    // Split left panel into banner (1 line) + bot list (fills space)
    let left_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(0)])
        .split(chunks[0]);

    let banner_width = left_chunks[0].width as usize;
    let pad_total = banner_width.saturating_sub(banner_label.len());
    let pad_left = pad_total / 2;
    let pad_right = pad_total - pad_left;
    let centered_banner = format!("{}{}{}", " ".repeat(pad_left), banner_label, " ".repeat(pad_right));
    let banner = Paragraph::new(Line::from(Span::styled(
        centered_banner,
        Style::default().fg(Color::Black).bg(banner_bg).add_modifier(Modifier::BOLD),
    )));
    f.render_widget(banner, left_chunks[0]);

    let bot_list = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::LEFT | Borders::RIGHT | Borders::BOTTOM)
            .border_style(Style::default().fg(Color::Cyan)),
    );
    f.render_widget(bot_list, left_chunks[1]);

    // -- Right panel: logs --
    if app.log_visible && chunks.len() > 1 {
        let visible_height = chunks[1].height.saturating_sub(2) as usize;
        let total = app.log_messages.len();
        let max_scroll = total.saturating_sub(visible_height);
        let scroll = app.log_scroll.min(max_scroll);
        let start = total.saturating_sub(visible_height + scroll);
        let end = total.saturating_sub(scroll);
        let log_lines: Vec<Line> = app.log_messages[start..end]
            .iter()
            .map(|m| parse_log_line(m))
            .collect();

        let log_panel = Paragraph::new(log_lines)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(" Logs ")
                    .border_style(Style::default().fg(Color::Yellow)),
            )
            .wrap(Wrap { trim: false });
        f.render_widget(log_panel, chunks[1]);
    }

    if let Some(dialog) = &app.confirm {
        dialog.render(f);
    }
}

/// Parse a structured log line (level\x1fprefix\x1fcolor\x1ftimestamp\x1fmessage)
/// into a colored Line for TUI rendering.
fn parse_log_line(raw: &str) -> Line<'_> {
    let parts: Vec<&str> = raw.splitn(5, '\x1f').collect();
    let [level, prefix, color_idx, timestamp, message] = parts[..] else {
        return Line::from(raw);
    };

    let line_color = match color_idx.parse::<u8>().unwrap_or(0) {
        2 => Color::LightBlue,  // COLOR_BLUE
        3 => Color::LightGreen, // COLOR_GREEN
        _ => Color::White,
    };

    let mut spans = vec![
        Span::styled(timestamp, Style::default().fg(Color::DarkGray)),
        Span::raw(" "),
    ];

    // Level tag only for warn/error
    match level {
        "ERROR" => spans.push(Span::styled("error ", Style::default().fg(Color::Red))),
        "WARN" => spans.push(Span::styled("warn ", Style::default().fg(Color::Yellow))),
        _ => {}
    }

    if !prefix.is_empty() {
        spans.push(Span::styled(prefix, Style::default().fg(line_color).add_modifier(Modifier::BOLD)));
        spans.push(Span::raw(" "));
    }
    spans.push(Span::styled(message, Style::default().fg(line_color)));

    Line::from(spans)
}
