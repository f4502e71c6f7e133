use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::catalog::VideoRecord;
use crate::constants::constants;
use crate::media::{MediaEvent, MediaSurface};
use crate::playlist::Playlist;

/// Transient transport state. Owned by the controller, never persisted
/// (except the loop preference, which the shell mirrors into the config).
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
  pub is_playing: bool,
  /// Volume in [0, 1]. Muting does not touch this — unmuting restores it.
  pub volume: f64,
  pub is_muted: bool,
  /// Fraction of duration elapsed, in [0, 1]. Resets to 0 on every selection change.
  pub played_fraction: f64,
  pub controls_visible: bool,
  pub is_fullscreen: bool,
  pub loop_enabled: bool,
}

impl Default for PlaybackState {
  fn default() -> Self {
    Self {
      is_playing: false,
      volume: 0.8,
      is_muted: false,
      played_fraction: 0.0,
      controls_visible: true,
      is_fullscreen: false,
      loop_enabled: true,
    }
  }
}

/// Mediates between the media surface and the rest of the UI: owns all
/// transport state and the playlist cursor, and translates end/error events
/// into either a loop restart or a playlist advance.
///
/// Timer behavior (controls auto-hide, post-error advance) is expressed as
/// deadlines checked by `tick`, which the shell calls from its draw loop.
/// Both deadlines are cleared by the events that supersede them, so neither
/// can fire against stale state.
pub struct PlaybackController<S: MediaSurface> {
  surface: S,
  pub state: PlaybackState,
  pub playlist: Playlist,
  controls_deadline: Option<Instant>,
  error_advance_at: Option<Instant>,
}

impl<S: MediaSurface> PlaybackController<S> {
  pub fn new(surface: S, loop_enabled: bool) -> Self {
    Self {
      surface,
      state: PlaybackState { loop_enabled, ..Default::default() },
      playlist: Playlist::new(),
      controls_deadline: None,
      error_advance_at: None,
    }
  }

  pub fn is_loaded(&self) -> bool {
    self.surface.is_loaded()
  }

  /// Replace the playlist's working copy after any catalog mutation. If the
  /// current record changed underneath us (it was deleted and the cursor fell
  /// back elsewhere), the new item starts clean rather than inheriting the
  /// old one's progress.
  pub fn refresh(&mut self, records: Vec<VideoRecord>) {
    let before = self.playlist.current().map(|r| r.id.clone());
    self.playlist.refresh(records);
    if self.playlist.current().map(|r| r.id.clone()) != before {
      self.state.played_fraction = 0.0;
      self.state.is_playing = false;
    }
  }

  /// Select a record by id and start playing it from the beginning.
  pub async fn select(&mut self, id: &str) -> Result<()> {
    self.playlist.select(id)?;
    self.play_current().await
  }

  pub async fn toggle_play_pause(&mut self) -> Result<()> {
    if !self.surface.is_loaded() {
      // Nothing mounted yet: start the current selection, if any.
      if self.playlist.current().is_some() {
        return self.play_current().await;
      }
      return Ok(());
    }
    self.state.is_playing = !self.state.is_playing;
    self.surface.set_paused(!self.state.is_playing).await?;
    self.show_controls_transiently();
    Ok(())
  }

  /// Set the volume. The caller's input widget keeps `volume` in [0, 1];
  /// it is not re-validated here. A positive volume clears mute.
  pub async fn set_volume(&mut self, volume: f64) -> Result<()> {
    self.state.volume = volume;
    self.surface.set_volume(volume).await?;
    if volume > 0.0 && self.state.is_muted {
      self.state.is_muted = false;
      self.surface.set_muted(false).await?;
    }
    self.show_controls_transiently();
    Ok(())
  }

  pub async fn toggle_mute(&mut self) -> Result<()> {
    self.state.is_muted = !self.state.is_muted;
    self.surface.set_muted(self.state.is_muted).await?;
    self.show_controls_transiently();
    Ok(())
  }

  /// Jump to a fraction of the duration. `played_fraction` is updated
  /// optimistically rather than waiting for the next progress tick.
  pub async fn seek(&mut self, fraction: f64) -> Result<()> {
    self.state.played_fraction = fraction;
    self.surface.seek_fraction(fraction).await?;
    self.show_controls_transiently();
    Ok(())
  }

  /// Ask the host to flip fullscreen. The local flag is only updated when
  /// the host reports the change — a request can be silently refused.
  pub async fn toggle_fullscreen(&mut self) -> Result<()> {
    self.surface.set_fullscreen(!self.state.is_fullscreen).await?;
    self.show_controls_transiently();
    Ok(())
  }

  /// Flip loop mode; returns the new value so the shell can persist it.
  pub fn toggle_loop(&mut self) -> bool {
    self.state.loop_enabled = !self.state.loop_enabled;
    self.state.loop_enabled
  }

  /// Make the controls visible and (re)start the auto-hide countdown.
  pub fn show_controls_transiently(&mut self) {
    self.state.controls_visible = true;
    self.controls_deadline = Some(Instant::now() + Duration::from_secs(constants().controls_hide_secs));
  }

  pub fn on_progress_tick(&mut self, fraction: f64) {
    self.state.played_fraction = fraction.clamp(0.0, 1.0);
  }

  /// Natural end of playback: loop mode restarts the same item from 0,
  /// otherwise the playlist advances (wrapping, and restarting the sole
  /// item of a single-record catalog).
  async fn on_ended(&mut self) -> Result<()> {
    if self.state.loop_enabled {
      self.state.played_fraction = 0.0;
      self.surface.seek_fraction(0.0).await?;
      self.surface.set_paused(false).await?;
      self.state.is_playing = true;
    } else {
      self.advance_and_play().await?;
    }
    Ok(())
  }

  /// Drain surface events and apply them. Returns a user-facing notice when
  /// playback of the current item failed.
  pub async fn pump_events(&mut self) -> Result<Option<String>> {
    let mut notice = None;
    for event in self.surface.poll_events() {
      if let Some(msg) = self.handle_event(event).await? {
        notice = Some(msg);
      }
    }
    Ok(notice)
  }

  pub async fn handle_event(&mut self, event: MediaEvent) -> Result<Option<String>> {
    match event {
      MediaEvent::Progress(fraction) => {
        self.on_progress_tick(fraction);
        Ok(None)
      }
      MediaEvent::Ended => {
        self.on_ended().await?;
        Ok(None)
      }
      MediaEvent::Failed(detail) => {
        warn!(err = %detail, "playback failed, scheduling advance");
        self.state.is_playing = false;
        self.state.played_fraction = 0.0;
        // Reap the dead process; the item is never retried.
        self.surface.stop().await?;
        self.error_advance_at = Some(Instant::now() + Duration::from_millis(constants().error_advance_ms));
        Ok(Some(format!("Playback failed: {} — trying the next video…", detail)))
      }
      MediaEvent::FullscreenChanged(on) => {
        self.state.is_fullscreen = on;
        Ok(None)
      }
    }
  }

  /// Fire any elapsed deadlines. Called from the shell's draw loop.
  pub async fn tick(&mut self, now: Instant) -> Result<()> {
    if let Some(deadline) = self.controls_deadline
      && now >= deadline
    {
      self.state.controls_visible = false;
      self.controls_deadline = None;
    }
    if let Some(at) = self.error_advance_at
      && now >= at
    {
      self.error_advance_at = None;
      self.advance_and_play().await?;
    }
    Ok(())
  }

  async fn play_current(&mut self) -> Result<()> {
    let Some(record) = self.playlist.current().cloned() else { return Ok(()) };
    info!(id = %record.id, title = %record.title, "starting playback");
    self.state.played_fraction = 0.0;
    // A pending post-error advance would fire against the new selection.
    self.error_advance_at = None;
    self.surface.load(&record, self.state.volume, self.state.is_muted).await?;
    self.state.is_playing = true;
    self.show_controls_transiently();
    Ok(())
  }

  async fn advance_and_play(&mut self) -> Result<()> {
    self.playlist.advance();
    if self.playlist.is_empty() {
      self.surface.stop().await?;
      self.state.is_playing = false;
      return Ok(());
    }
    // Reload even when the index didn't move (single-item catalog): the end
    // of that item still means "restart from time 0".
    self.play_current().await
  }

  pub async fn shutdown(&mut self) -> Result<()> {
    self.surface.stop().await
  }
}
