use ratatui::{
  Frame,
  layout::{Alignment, Constraint, Layout, Position, Rect},
  style::{Color, Modifier, Style},
  text::{Line, Span},
  widgets::{Block, Borders, Gauge, List, ListItem, Paragraph},
};
use unicode_width::UnicodeWidthStr;

use crate::app::{App, AppMode};
use crate::catalog::VideoRecord;

// --- Helpers ---

/// Truncate a string to `max_width` display columns, appending "…" when cut.
fn truncate_str(s: &str, max_width: usize) -> String {
  if s.width() <= max_width {
    return s.to_string();
  }
  let mut out = String::new();
  let budget = max_width.saturating_sub(1);
  for c in s.chars() {
    if format!("{}{}", out, c).width() > budget {
      break;
    }
    out.push(c);
  }
  format!("{}…", out)
}

/// First visible char index of the prompt input, chosen so the cursor
/// always lands inside a window of `width` columns.
fn prompt_scroll(cursor: usize, width: usize) -> usize {
  cursor.saturating_sub(width.saturating_sub(1))
}

/// Format a duration in seconds as `m:ss`.
fn format_duration(secs: f64) -> String {
  let total = secs.round() as u64;
  format!("{}:{:02}", total / 60, total % 60)
}

// --- UI Rendering ---

pub fn ui(frame: &mut Frame, app: &mut App) {
  let input_height = if app.mode == AppMode::Upload { 3 } else { 0 };
  let [header_area, main_area, status_area, input_area, footer_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Min(3),
    Constraint::Length(1),
    Constraint::Length(input_height),
    Constraint::Length(1),
  ])
  .areas(frame.area());

  render_header(frame, header_area);
  render_main(frame, app, main_area);
  render_status(frame, app, status_area);
  if app.mode == AppMode::Upload {
    render_upload_prompt(frame, app, input_area);
  }
  render_footer(frame, app, footer_area);
}

fn render_header(frame: &mut Frame, area: Rect) {
  let left = Line::from(Span::styled(" ▶ vidshelf ", Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD)));
  frame.render_widget(left, area);

  let version = format!("v{} ", env!("CARGO_PKG_VERSION"));
  let right = Line::from(Span::styled(&version, Style::default().fg(Color::DarkGray)));
  let right_area =
    Rect { x: area.x + area.width.saturating_sub(version.len() as u16), width: version.len() as u16, ..area };
  frame.render_widget(right, right_area);
}

fn render_main(frame: &mut Frame, app: &mut App, area: Rect) {
  let [list_area, player_area] =
    Layout::horizontal([Constraint::Percentage(40), Constraint::Percentage(60)]).areas(area);
  render_catalog(frame, app, list_area);
  render_player(frame, app, player_area);
}

fn render_catalog(frame: &mut Frame, app: &mut App, area: Rect) {
  let playing_idx = app.controller.playlist.current_index();
  let width = area.width.saturating_sub(4) as usize;

  let items: Vec<ListItem> = app
    .controller
    .playlist
    .records()
    .iter()
    .enumerate()
    .map(|(i, record)| catalog_item(record, Some(i) == playing_idx, width))
    .collect();

  let count = items.len();
  let list = List::new(items)
    .block(Block::default().borders(Borders::ALL).title(format!(" Catalog ({}) ", count)))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("› ");

  frame.render_stateful_widget(list, area, &mut app.list_state);
}

fn catalog_item(record: &VideoRecord, playing: bool, width: usize) -> ListItem<'static> {
  let marker = if playing { "▶ " } else { "  " };
  let duration = record.duration.map(format_duration);
  let suffix = duration.map(|d| format!("  {}", d)).unwrap_or_default();
  let title_budget = width.saturating_sub(marker.len() + suffix.width());
  let line = Line::from(vec![
    Span::styled(marker.to_string(), Style::default().fg(Color::Cyan)),
    Span::raw(truncate_str(&record.title, title_budget)),
    Span::styled(suffix, Style::default().fg(Color::DarkGray)),
  ]);
  ListItem::new(line)
}

fn render_player(frame: &mut Frame, app: &App, area: Rect) {
  let block = Block::default().borders(Borders::ALL).title(" Now Playing ");
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let Some(record) = app.controller.playlist.current() else {
    let empty = Paragraph::new(vec![
      Line::from(""),
      Line::from(Span::styled("No Video Selected", Style::default().add_modifier(Modifier::BOLD))),
      Line::from(""),
      Line::from(Span::styled(
        "Select a video from the list to start playback",
        Style::default().fg(Color::DarkGray),
      )),
    ])
    .alignment(Alignment::Center);
    frame.render_widget(empty, inner);
    return;
  };

  let [title_area, meta_area, _, gauge_area, _, controls_area] = Layout::vertical([
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
    Constraint::Length(1),
  ])
  .areas(inner);

  let title = Paragraph::new(Span::styled(
    truncate_str(&record.title, inner.width as usize),
    Style::default().add_modifier(Modifier::BOLD),
  ));
  frame.render_widget(title, title_area);

  let mut meta_parts = Vec::new();
  if let Some(d) = record.duration {
    meta_parts.push(format_duration(d));
  }
  if let Some(ref added) = record.added_at {
    meta_parts.push(format!("added {}", added.split('T').next().unwrap_or(added)));
  }
  if record.cloudinary_id.is_some() {
    meta_parts.push("cloudinary".to_string());
  }
  let meta = Paragraph::new(Span::styled(meta_parts.join(" • "), Style::default().fg(Color::DarkGray)));
  frame.render_widget(meta, meta_area);

  let state = &app.controller.state;
  let gauge = Gauge::default()
    .gauge_style(Style::default().fg(Color::Cyan).bg(Color::Black))
    .ratio(state.played_fraction.clamp(0.0, 1.0))
    .label(format!("{:.0}%", state.played_fraction.clamp(0.0, 1.0) * 100.0));
  frame.render_widget(gauge, gauge_area);

  // Transport controls row, auto-hidden after the quiet period.
  if state.controls_visible {
    let mut parts = vec![
      if state.is_playing { "⏸ playing".to_string() } else { "▶ paused".to_string() },
      if state.is_muted { "muted".to_string() } else { format!("vol {:.0}%", state.volume * 100.0) },
      format!("loop {}", if state.loop_enabled { "on" } else { "off" }),
    ];
    if state.is_fullscreen {
      parts.push("fullscreen".to_string());
    }
    let controls = Paragraph::new(Span::styled(parts.join("  │  "), Style::default().fg(Color::Cyan)));
    frame.render_widget(controls, controls_area);
  }
}

fn render_status(frame: &mut Frame, app: &App, area: Rect) {
  let line = if let Some(ref err) = app.last_error {
    Line::from(Span::styled(format!(" ✗ {}", err), Style::default().fg(Color::Red)))
  } else if let Some(ref status) = app.status_message {
    Line::from(Span::styled(format!(" ⟳ {}", status), Style::default().fg(Color::Yellow)))
  } else if let Some(ref info) = app.info_message {
    Line::from(Span::styled(format!(" ℹ {}", info), Style::default().fg(Color::Green)))
  } else {
    Line::from("")
  };
  frame.render_widget(line, area);
}

fn render_upload_prompt(frame: &mut Frame, app: &App, area: Rect) {
  let block = Block::default().borders(Borders::ALL).title(" Upload video — path to local file ");
  let inner = block.inner(area);
  frame.render_widget(block, area);

  let width = inner.width.saturating_sub(1) as usize;
  let chars: Vec<char> = app.input.chars().collect();
  let start = prompt_scroll(app.cursor_position, width).min(chars.len());
  let visible: String = chars[start..].iter().take(width).collect();
  frame.render_widget(Paragraph::new(visible), inner);

  let cursor_x = inner.x + app.cursor_position.saturating_sub(start) as u16;
  frame.set_cursor_position(Position::new(cursor_x.min(inner.right().saturating_sub(1)), inner.y));
}

fn render_footer(frame: &mut Frame, app: &App, area: Rect) {
  let hints = match app.mode {
    AppMode::Browse => "↑/↓ browse  ⏎ play  space pause  ←/→ seek  -/= vol  m mute  f fullscreen  l loop  u upload  d delete  q quit",
    AppMode::Upload => "⏎ upload  esc cancel",
  };
  frame.render_widget(Line::from(Span::styled(format!(" {}", hints), Style::default().fg(Color::DarkGray))), area);
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncate_leaves_short_strings_alone() {
    assert_eq!(truncate_str("short", 10), "short");
    assert_eq!(truncate_str("exact", 5), "exact");
  }

  #[test]
  fn truncate_appends_ellipsis() {
    assert_eq!(truncate_str("a longer title", 8), "a longe…");
  }

  #[test]
  fn truncate_respects_wide_characters() {
    // Each CJK char is two columns wide.
    assert_eq!(truncate_str("日本語のタイトル", 7), "日本語…");
  }

  #[test]
  fn prompt_scroll_keeps_the_cursor_in_view() {
    // Short input: no scrolling.
    assert_eq!(prompt_scroll(5, 20), 0);
    // Cursor one past the window: scroll just enough.
    assert_eq!(prompt_scroll(20, 20), 1);
    // Narrow prompt: the cursor column is always < width away from the start.
    for cursor in 0..200 {
      let start = prompt_scroll(cursor, 10);
      assert!(cursor - start < 10, "cursor {} escaped window starting at {}", cursor, start);
    }
  }

  #[test]
  fn durations_format_as_minutes_and_seconds() {
    assert_eq!(format_duration(0.0), "0:00");
    assert_eq!(format_duration(93.4), "1:33");
    assert_eq!(format_duration(600.0), "10:00");
  }
}
