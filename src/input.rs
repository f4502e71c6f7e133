use anyhow::Result;
use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};

use crate::app::{App, AppMode};
use crate::constants::constants;

// --- Helpers ---

/// Convert a char index to a byte offset within the string.
pub fn char_to_byte_index(s: &str, char_idx: usize) -> usize {
  s.char_indices().nth(char_idx).map_or(s.len(), |(i, _)| i)
}

// --- Event Handling ---

pub async fn handle_key_event(app: &mut App, key: event::KeyEvent) -> Result<()> {
  if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
    app.should_quit = true;
    return Ok(());
  }

  match app.mode {
    AppMode::Browse => handle_browse_key(app, key).await,
    AppMode::Upload => handle_upload_key(app, key),
  }
  Ok(())
}

async fn handle_browse_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Char('q') => {
      app.should_quit = true;
    }
    KeyCode::Esc => {
      // Esc leaves fullscreen first, matching what a player is expected to do.
      if app.controller.state.is_fullscreen {
        if let Err(e) = app.controller.toggle_fullscreen().await {
          app.set_error(format!("Fullscreen error: {:#}", e));
        }
      } else {
        app.should_quit = true;
      }
    }
    KeyCode::Down | KeyCode::Char('j') => {
      let count = app.controller.playlist.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| (i + 1) % count);
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Up | KeyCode::Char('k') => {
      let count = app.controller.playlist.len();
      if count > 0 {
        let i = app.list_state.selected().map_or(0, |i| if i == 0 { count - 1 } else { i - 1 });
        app.list_state.select(Some(i));
      }
    }
    KeyCode::Enter => {
      if let Some(id) = app.highlighted_id() {
        app.clear_error();
        if let Err(e) = app.controller.select(&id).await {
          // NotFound is non-fatal: selection stays where it was.
          app.set_error(format!("{:#}", e));
        }
      }
    }
    KeyCode::Char(' ') => {
      if let Err(e) = app.controller.toggle_play_pause().await {
        app.set_error(format!("Pause error: {:#}", e));
      }
    }
    KeyCode::Char('m') => {
      if let Err(e) = app.controller.toggle_mute().await {
        app.set_error(format!("Mute error: {:#}", e));
      }
    }
    KeyCode::Char('f') => {
      if let Err(e) = app.controller.toggle_fullscreen().await {
        app.set_error(format!("Fullscreen error: {:#}", e));
      }
    }
    KeyCode::Char('l') => {
      let on = app.controller.toggle_loop();
      app.save_config();
      app.info_message = Some(format!("Loop mode {}.", if on { "on" } else { "off" }));
    }
    KeyCode::Left => {
      let f = (app.controller.state.played_fraction - constants().seek_step).clamp(0.0, 1.0);
      if let Err(e) = app.controller.seek(f).await {
        app.set_error(format!("Seek error: {:#}", e));
      }
    }
    KeyCode::Right => {
      let f = (app.controller.state.played_fraction + constants().seek_step).clamp(0.0, 1.0);
      if let Err(e) = app.controller.seek(f).await {
        app.set_error(format!("Seek error: {:#}", e));
      }
    }
    KeyCode::Char('-') => {
      let v = (app.controller.state.volume - constants().volume_step).clamp(0.0, 1.0);
      if let Err(e) = app.controller.set_volume(v).await {
        app.set_error(format!("Volume error: {:#}", e));
      }
    }
    KeyCode::Char('=') | KeyCode::Char('+') => {
      let v = (app.controller.state.volume + constants().volume_step).clamp(0.0, 1.0);
      if let Err(e) = app.controller.set_volume(v).await {
        app.set_error(format!("Volume error: {:#}", e));
      }
    }
    KeyCode::Char('u') => {
      if app.uploading {
        app.info_message = Some("An upload is already in progress.".to_string());
      } else {
        app.open_upload_prompt();
      }
    }
    KeyCode::Char('d') => {
      app.delete_highlighted().await;
    }
    KeyCode::Char('X') => {
      app.clear_catalog().await;
    }
    _ => {}
  }
}

fn handle_upload_key(app: &mut App, key: event::KeyEvent) {
  match key.code {
    KeyCode::Enter => {
      app.trigger_upload();
    }
    KeyCode::Esc => {
      app.cancel_upload_prompt();
    }
    KeyCode::Char(c) => {
      let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
      app.input.insert(byte_idx, c);
      app.cursor_position += 1;
    }
    KeyCode::Backspace => {
      if app.cursor_position > 0 {
        app.cursor_position -= 1;
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Delete => {
      if app.cursor_position < app.input.chars().count() {
        let byte_idx = char_to_byte_index(&app.input, app.cursor_position);
        app.input.remove(byte_idx);
      }
    }
    KeyCode::Left => {
      app.cursor_position = app.cursor_position.saturating_sub(1);
    }
    KeyCode::Right => {
      if app.cursor_position < app.input.chars().count() {
        app.cursor_position += 1;
      }
    }
    KeyCode::Home => {
      app.cursor_position = 0;
    }
    KeyCode::End => {
      app.cursor_position = app.input.chars().count();
    }
    _ => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn char_to_byte_handles_plain_ascii() {
    assert_eq!(char_to_byte_index("/tmp/clip.mp4", 0), 0);
    assert_eq!(char_to_byte_index("/tmp/clip.mp4", 5), 5);
  }

  #[test]
  fn char_to_byte_handles_multibyte_paths() {
    let s = "/tmp/vidéo.mp4"; // é is two bytes
    assert_eq!(char_to_byte_index(s, 8), 8);
    assert_eq!(char_to_byte_index(s, 9), 10); // past the é
  }

  #[test]
  fn char_to_byte_clamps_past_the_end() {
    assert_eq!(char_to_byte_index("abc", 99), 3);
    assert_eq!(char_to_byte_index("", 1), 0);
  }
}
