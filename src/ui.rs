use chrono::{DateTime, Local};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph, Wrap};

use crate::state::{
    AppState, DetailPanel, FetchState, Match, MatchFilter, MatchStatus, Side, TeamStats,
};

const STATS_COLUMN: usize = 30;

pub fn draw(frame: &mut Frame, state: &AppState) {
    let banner = banner_lines(state);
    let banner_height = u16::try_from(banner.len()).unwrap_or(u16::MAX);
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(banner_height),
            Constraint::Min(3),
            Constraint::Length(6),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_lines(state)).block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    if banner_height > 0 {
        frame.render_widget(
            Paragraph::new(banner).wrap(Wrap { trim: true }),
            chunks[1],
        );
    }

    render_board(frame, chunks[2], state);

    let console = Paragraph::new(console_text(state, chunks[3].height.saturating_sub(2) as usize))
        .style(Style::default().fg(Color::DarkGray))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[3]);

    frame.render_widget(
        Paragraph::new("j/k Move | Enter Expand | Esc Collapse | f/1-4 Filter | r Refresh | x Dismiss | ? Help | q Quit"),
        chunks[4],
    );

    if state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_lines(state: &AppState) -> Vec<Line<'static>> {
    let mut spans = vec![Span::styled(
        "SCOUTLAY  ",
        Style::default().add_modifier(Modifier::BOLD),
    )];
    for (idx, filter) in MatchFilter::ALL.iter().enumerate() {
        let text = format!(" {} {} ", idx + 1, filter.label());
        let style = if *filter == state.filter {
            Style::default().fg(Color::Black).bg(Color::Cyan)
        } else {
            Style::default().fg(Color::Gray)
        };
        spans.push(Span::styled(text, style));
        spans.push(Span::raw(" "));
    }
    let updated = match state.last_refresh {
        Some(at) => format!(
            "updated {}",
            DateTime::<Local>::from(at).format("%H:%M:%S")
        ),
        None => "waiting for first update".to_string(),
    };
    spans.push(Span::styled(updated, Style::default().fg(Color::DarkGray)));
    vec![Line::from(spans)]
}

fn banner_lines(state: &AppState) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    if let Some(warning) = &state.config_warning {
        lines.push(Line::from(Span::styled(
            format!("Configuration: {warning}"),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )));
    }
    if let Some(err) = &state.error_banner {
        lines.push(Line::from(Span::styled(
            format!("Error: {err}  (x to dismiss)"),
            Style::default().fg(Color::Red),
        )));
    }
    lines
}

fn render_board(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .title(format!("Matches ({})", state.filter.label()))
        .borders(Borders::ALL);
    let inner_height = block.inner(area).height as usize;

    let filtered = state.filtered_matches();
    if filtered.is_empty() {
        let text = if state.matches.is_empty() {
            "No matches returned"
        } else {
            "No matches for this filter"
        };
        let empty = Paragraph::new(text)
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        frame.render_widget(empty, area);
        return;
    }

    let mut lines: Vec<Line<'static>> = Vec::new();
    let mut selected_line = 0;
    for (idx, m) in filtered.iter().enumerate() {
        let is_selected = idx == state.selected;
        if is_selected {
            selected_line = lines.len();
        }
        let style = if is_selected {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default().fg(status_color(&m.status))
        };
        let prefix = if is_selected { "> " } else { "  " };
        lines.push(Line::from(Span::styled(
            format!("{prefix}{}", match_row_text(m)),
            style,
        )));

        if let Some(panel) = state.detail.as_ref()
            && panel.ticket.match_id == m.id
        {
            lines.extend(detail_lines(m, panel).into_iter().map(|text| {
                Line::from(Span::raw(format!("    {text}")))
            }));
        }
    }

    let scroll = scroll_offset(selected_line, lines.len(), inner_height);
    let board = Paragraph::new(lines)
        .block(block)
        .scroll((scroll, 0));
    frame.render_widget(board, area);
}

pub fn status_label(status: &MatchStatus) -> &str {
    match status {
        MatchStatus::Live => "LIVE",
        MatchStatus::Scheduled => "SCHEDULED",
        MatchStatus::Finished => "FINISHED",
        MatchStatus::Other(raw) if raw.is_empty() => "UNKNOWN",
        MatchStatus::Other(raw) => raw,
    }
}

fn status_color(status: &MatchStatus) -> Color {
    match status {
        MatchStatus::Live => Color::Red,
        MatchStatus::Scheduled => Color::Yellow,
        MatchStatus::Finished => Color::Gray,
        MatchStatus::Other(_) => Color::White,
    }
}

pub fn match_row_text(m: &Match) -> String {
    let score = if m.status.is_scheduled() {
        " vs ".to_string()
    } else {
        format!(" {}-{} ", m.score.home, m.score.away)
    };
    let status = match &m.status {
        MatchStatus::Live => match m.live.as_ref().and_then(|l| l.minute) {
            Some(minute) => format!("LIVE {minute}'"),
            None => "LIVE".to_string(),
        },
        MatchStatus::Scheduled => match m.kickoff.as_deref() {
            Some(raw) => format!("SCHEDULED {}", format_kickoff(raw)),
            None => "SCHEDULED".to_string(),
        },
        other => status_label(other).to_string(),
    };
    let strategies = match m.strategies.len() {
        0 => String::new(),
        1 => "  [1 strategy]".to_string(),
        n => format!("  [{n} strategies]"),
    };
    let competition = m
        .competition
        .as_deref()
        .map(|c| format!("{c} | "))
        .unwrap_or_default();
    format!(
        "{competition}{}{score}{}  {status}{strategies}",
        m.home.name, m.away.name
    )
}

/// Detail panel body: live numbers, both teams' stats side by side, then the
/// suggested strategies.
pub fn detail_lines(m: &Match, panel: &DetailPanel) -> Vec<String> {
    let mut lines = Vec::new();

    if let Some(live) = m.live.as_ref() {
        let mut parts = Vec::new();
        if let Some(minute) = live.minute {
            parts.push(format!("Minute {minute}'"));
        }
        if let Some(goals) = live.goals_total {
            parts.push(format!("Goals {goals}"));
        }
        if let Some(last) = live.last_goal_minute {
            parts.push(format!("Last goal {last}'"));
        }
        if !parts.is_empty() {
            lines.push(parts.join(" | "));
        }
    }

    let home = stats_slot_lines(&panel.home_team.name, panel.slot(Side::Home));
    let away = stats_slot_lines(&panel.away_team.name, panel.slot(Side::Away));
    for row in 0..home.len().max(away.len()) {
        let left = home.get(row).map(String::as_str).unwrap_or("");
        let right = away.get(row).map(String::as_str).unwrap_or("");
        lines.push(format!("{left:<width$}{right}", width = STATS_COLUMN));
    }

    if m.strategies.is_empty() {
        lines.push("No suggested strategy.".to_string());
    } else {
        lines.push("Strategies:".to_string());
        for strategy in &m.strategies {
            let code = strategy
                .code
                .as_deref()
                .map(|c| format!(" [{c}]"))
                .unwrap_or_default();
            lines.push(format!("  {}{code} -> {}", strategy.label, strategy.reason));
        }
    }
    lines
}

pub fn stats_slot_lines(team: &str, slot: &FetchState<TeamStats>) -> Vec<String> {
    let mut lines = vec![team.to_string()];
    match slot {
        FetchState::Idle => {}
        FetchState::Loading => lines.push("loading...".to_string()),
        FetchState::Failed(err) => lines.push(format!("unavailable: {err}")),
        FetchState::Loaded(stats) => {
            lines.push(format!("GF last 5:  {}", format_avg(stats.last5)));
            lines.push(format!("GF last 10: {}", format_avg(stats.last10)));
            lines.push(format!("GF season:  {}", format_avg(stats.season)));
        }
    }
    lines
}

fn format_avg(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{v:.2}"),
        None => "-".to_string(),
    }
}

/// RFC 3339 kickoffs render in local time; anything else is shown as sent.
pub fn format_kickoff(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => dt.with_timezone(&Local).format("%d/%m %H:%M").to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

fn console_text(state: &AppState, visible: usize) -> String {
    let skip = state.logs.len().saturating_sub(visible);
    state
        .logs
        .iter()
        .skip(skip)
        .cloned()
        .collect::<Vec<_>>()
        .join("\n")
}

fn scroll_offset(selected_line: usize, total: usize, visible: usize) -> u16 {
    if visible == 0 || total <= visible {
        return 0;
    }
    // Keep a few lines of the expanded panel in view below the cursor.
    let anchor = selected_line.saturating_sub(visible / 3);
    u16::try_from(anchor.min(total - visible)).unwrap_or(u16::MAX)
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "ScoutLay Terminal - Help",
        "",
        "  j/k or ↑/↓   Move",
        "  Enter/Space  Expand / collapse match",
        "  Esc          Collapse",
        "  f / Tab      Next filter",
        "  1-4          All / Live / Upcoming / With strategy",
        "  r            Refresh now",
        "  x            Dismiss error",
        "  ?            Toggle help",
        "  q            Quit",
    ]
    .join("\n");

    let help = Paragraph::new(text).block(Block::default().title("Help").borders(Borders::ALL));
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
