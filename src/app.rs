use anyhow::Result;
use ratatui::widgets::ListState;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{info, warn};

use crate::catalog::{CatalogStore, VideoRecord};
use crate::config::Config;
use crate::constants::constants;
use crate::media::MpvSurface;
use crate::playback::PlaybackController;
use crate::upload::{CloudinaryUploader, UploadOutcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
  /// Browsing the catalog and driving playback.
  Browse,
  /// Typing a file path into the upload prompt.
  Upload,
}

pub struct App {
  pub mode: AppMode,
  pub controller: PlaybackController<MpvSurface>,
  pub list_state: ListState,
  /// Upload prompt text input.
  pub input: String,
  pub cursor_position: usize,
  pub last_error: Option<String>,
  pub status_message: Option<String>,
  /// Informational message — lower priority than status/error.
  pub info_message: Option<String>,
  pub should_quit: bool,
  pub uploading: bool,
  store: Box<dyn CatalogStore>,
  upload_rx: Option<oneshot::Receiver<UploadOutcome>>,
  /// Record to start playing once the upload outcome has been applied.
  pending_select: Option<String>,
  config: Config,
  /// When the last error was set — used for auto-dismiss.
  error_time: Option<Instant>,
}

impl App {
  pub fn new(mut store: Box<dyn CatalogStore>, config: Config) -> Result<Self> {
    // Seed a demo entry so a fresh install has something to play.
    if store.list().is_empty() {
      let c = constants();
      info!("empty catalog, seeding demo video");
      store.add(VideoRecord {
        id: c.demo_video_id.clone(),
        title: c.demo_video_title.clone(),
        url: c.demo_video_url.clone(),
        thumbnail: None,
        duration: None,
        cloudinary_id: None,
        added_at: None,
      })?;
    }

    let loop_enabled = config.loop_enabled.unwrap_or(true);
    let mut controller = PlaybackController::new(MpvSurface::new(), loop_enabled);
    controller.refresh(store.list());

    let mut list_state = ListState::default();
    if !controller.playlist.is_empty() {
      list_state.select(Some(0));
    }

    Ok(Self {
      mode: AppMode::Browse,
      controller,
      list_state,
      input: String::new(),
      cursor_position: 0,
      last_error: None,
      status_message: None,
      info_message: None,
      should_quit: false,
      uploading: false,
      store,
      upload_rx: None,
      pending_select: None,
      config,
      error_time: None,
    })
  }

  // --- Messages ---

  /// Set an error message with auto-dismiss tracking.
  pub fn set_error(&mut self, msg: String) {
    self.last_error = Some(msg);
    self.error_time = Some(Instant::now());
  }

  /// Clear the current error message and its expiry timer.
  pub fn clear_error(&mut self) {
    self.last_error = None;
    self.error_time = None;
  }

  /// Clear stale error messages after the configured quiet period.
  pub fn expire_error(&mut self) {
    if let Some(t) = self.error_time
      && t.elapsed() >= Duration::from_secs(constants().error_expire_secs)
    {
      self.last_error = None;
      self.error_time = None;
    }
  }

  // --- Catalog ---

  /// Pull a fresh copy of the catalog into the playlist and clamp the list
  /// selection to the new bounds.
  pub fn reload_catalog(&mut self) {
    self.controller.refresh(self.store.list());
    let len = self.controller.playlist.len();
    if len == 0 {
      self.list_state.select(None);
    } else {
      let sel = self.list_state.selected().unwrap_or(0);
      self.list_state.select(Some(sel.min(len - 1)));
    }
  }

  /// Id of the record highlighted in the list (not necessarily playing).
  pub fn highlighted_id(&self) -> Option<String> {
    let idx = self.list_state.selected()?;
    self.controller.playlist.records().get(idx).map(|r| r.id.clone())
  }

  pub async fn delete_highlighted(&mut self) {
    let Some(id) = self.highlighted_id() else { return };
    let playing = self.controller.playlist.current().map(|r| r.id.clone());
    if let Err(e) = self.store.remove(&id) {
      self.set_error(format!("Delete failed: {:#}", e));
      return;
    }
    if playing.as_deref() == Some(id.as_str()) {
      let _ = self.controller.shutdown().await;
      self.controller.state.is_playing = false;
    }
    self.reload_catalog();
    self.info_message = Some(format!("Removed '{}'.", id));
  }

  pub async fn clear_catalog(&mut self) {
    if let Err(e) = self.store.clear() {
      self.set_error(format!("Clear failed: {:#}", e));
      return;
    }
    let _ = self.controller.shutdown().await;
    self.controller.state.is_playing = false;
    self.reload_catalog();
    self.info_message = Some("Catalog cleared.".to_string());
  }

  /// Persist the current loop preference alongside the stored credentials.
  pub fn save_config(&self) {
    let config = Config {
      cloud_name: self.config.cloud_name.clone(),
      upload_preset: self.config.upload_preset.clone(),
      loop_enabled: Some(self.controller.state.loop_enabled),
    };
    config.save();
  }

  // --- Upload ---

  pub fn open_upload_prompt(&mut self) {
    self.mode = AppMode::Upload;
    self.input.clear();
    self.cursor_position = 0;
    self.info_message = None;
  }

  /// The user backed out of the dialog without picking a file.
  pub fn cancel_upload_prompt(&mut self) {
    self.mode = AppMode::Browse;
    self.handle_upload_outcome(UploadOutcome::Cancelled);
  }

  pub fn trigger_upload(&mut self) {
    let path = self.input.trim().to_string();
    if path.is_empty() {
      self.set_error("Enter the path of a video file.".to_string());
      return;
    }
    info!(path = %path, "upload triggered");
    self.clear_error();
    self.uploading = true;
    self.status_message = Some(format!("Uploading '{}'…", path));
    self.mode = AppMode::Browse;

    let uploader = CloudinaryUploader::new(&self.config);
    let (tx, rx) = oneshot::channel();
    tokio::spawn(async move {
      let _ = tx.send(uploader.upload(std::path::Path::new(&path)).await);
    });
    self.upload_rx = Some(rx);
  }

  fn handle_upload_outcome(&mut self, outcome: UploadOutcome) {
    self.uploading = false;
    self.status_message = None;
    match outcome {
      UploadOutcome::Completed(record) => {
        let id = record.id.clone();
        if let Err(e) = self.store.add(record) {
          self.set_error(format!("Upload stored nothing: {:#}", e));
          return;
        }
        self.reload_catalog();
        if let Some(pos) = self.controller.playlist.records().iter().position(|r| r.id == id) {
          self.list_state.select(Some(pos));
        }
        self.info_message = Some("Upload complete.".to_string());
        // Play the new record right away; selection failures are non-fatal.
        self.pending_select = Some(id);
      }
      UploadOutcome::Cancelled => {
        self.info_message = Some("Upload cancelled.".to_string());
      }
      UploadOutcome::Failed(msg) => {
        warn!(err = %msg, "upload failed");
        self.set_error(format!("Upload failed: {}", msg));
      }
    }
  }

  // --- Event loop hooks ---

  /// Poll the in-flight upload, if any, without blocking the draw loop.
  pub async fn check_pending(&mut self) -> Result<()> {
    if let Some(mut rx) = self.upload_rx.take() {
      match rx.try_recv() {
        Ok(outcome) => {
          self.handle_upload_outcome(outcome);
          if let Some(id) = self.pending_select.take()
            && let Err(e) = self.controller.select(&id).await
          {
            self.set_error(format!("Playback error: {:#}", e));
          }
        }
        Err(oneshot::error::TryRecvError::Empty) => {
          self.upload_rx = Some(rx);
        }
        Err(oneshot::error::TryRecvError::Closed) => {
          self.uploading = false;
          self.status_message = None;
          self.set_error("Upload task failed.".to_string());
        }
      }
    }
    Ok(())
  }

  /// Drain media events and surface any playback failure notice.
  pub async fn pump_media(&mut self) -> Result<()> {
    if let Some(notice) = self.controller.pump_events().await? {
      self.set_error(notice);
    }
    Ok(())
  }

  pub async fn tick(&mut self) -> Result<()> {
    self.controller.tick(Instant::now()).await?;
    self.expire_error();
    Ok(())
  }
}
