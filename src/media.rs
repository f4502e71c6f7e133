use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::process::Stdio;
use std::time::Duration;
use tokio::{
  io::{AsyncBufReadExt, AsyncWriteExt, BufReader as TokioBufReader},
  net::UnixStream,
  process::{Child as TokioChild, Command},
  sync::mpsc,
  task::JoinHandle,
};
use tracing::{debug, warn};

use crate::catalog::VideoRecord;

/// Notification from the hosted media element.
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
  /// Periodic progress tick, fraction of duration elapsed in [0, 1].
  Progress(f64),
  /// Natural end of playback.
  Ended,
  /// The element could not load or play the current item.
  Failed(String),
  /// The host's actual fullscreen state changed. Reported regardless of who
  /// asked for it — a request can be silently refused.
  FullscreenChanged(bool),
}

/// Capability interface over the hosted media element.
///
/// The playback controller only ever talks to this trait; host specifics
/// (mpv, a fake in tests) live behind it and are selected at the boundary.
#[async_trait]
pub trait MediaSurface {
  /// Start playing a record from the beginning, replacing whatever was
  /// loaded before. `volume` and `muted` seed the element's initial state.
  async fn load(&mut self, record: &VideoRecord, volume: f64, muted: bool) -> Result<()>;
  async fn set_paused(&mut self, paused: bool) -> Result<()>;
  /// Jump to a fraction of the duration in [0, 1].
  async fn seek_fraction(&mut self, fraction: f64) -> Result<()>;
  /// Volume in [0, 1].
  async fn set_volume(&mut self, volume: f64) -> Result<()>;
  async fn set_muted(&mut self, muted: bool) -> Result<()>;
  async fn set_fullscreen(&mut self, on: bool) -> Result<()>;
  async fn stop(&mut self) -> Result<()>;
  fn is_loaded(&self) -> bool;
  /// Drain any events delivered since the last poll.
  fn poll_events(&mut self) -> Vec<MediaEvent>;
}

// --- mpv implementation ---

/// mpv behind its JSON IPC socket.
///
/// Each `load` spawns a fresh mpv process with `--keep-open=always` so the
/// end of the file pauses on the last frame instead of exiting — a loop
/// restart is then just a seek. A monitor task observes `percent-pos`,
/// `fullscreen` and `eof-reached` and forwards them as `MediaEvent`s.
/// Replacing the process also replaces the monitor and its channel, so a
/// superseded load can never deliver events into the new selection.
pub struct MpvSurface {
  current_process: Option<TokioChild>,
  monitor_handle: Option<JoinHandle<()>>,
  event_rx: Option<mpsc::Receiver<MediaEvent>>,
  ipc_socket_path: Option<String>,
}

impl MpvSurface {
  pub fn new() -> Self {
    Self { current_process: None, monitor_handle: None, event_rx: None, ipc_socket_path: None }
  }

  /// Send a single IPC command over a short-lived connection.
  async fn send_command(&self, cmd: Value) -> Result<()> {
    let Some(ref socket_path) = self.ipc_socket_path else {
      return Ok(());
    };
    let stream = UnixStream::connect(socket_path).await.context("Failed to connect to mpv IPC socket")?;
    stream.writable().await.context("mpv IPC socket not writable")?;
    let mut line = cmd.to_string();
    line.push('\n');
    let written = stream.try_write(line.as_bytes()).context("Failed to send command to mpv")?;
    if written < line.len() {
      return Err(anyhow!("Partial write to mpv IPC socket: wrote {} of {} bytes", written, line.len()));
    }
    Ok(())
  }
}

#[async_trait]
impl MediaSurface for MpvSurface {
  async fn load(&mut self, record: &VideoRecord, volume: f64, muted: bool) -> Result<()> {
    self.stop().await.context("Failed to stop previous playback")?;

    let socket_path = std::env::temp_dir().join(format!("vidshelf-mpv-{}.sock", std::process::id()));
    let socket_path_str = socket_path.to_str().context("Temp dir path is not valid UTF-8")?.to_string();
    // Remove stale socket if it exists from a previous crash.
    let _ = std::fs::remove_file(&socket_path);

    let mut cmd = Command::new("mpv");
    cmd.args([
      "--keep-open=always",
      "--no-terminal",
      &format!("--volume={}", (volume * 100.0).round()),
      &format!("--mute={}", if muted { "yes" } else { "no" }),
      &format!("--input-ipc-server={}", socket_path_str),
      "--",
      &record.url,
    ]);
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::null());
    cmd.stderr(Stdio::null());

    let child = cmd.spawn().map_err(|e| {
      if e.kind() == std::io::ErrorKind::NotFound {
        anyhow!("mpv not found. Install it with: brew install mpv (macOS) or apt install mpv (Linux)")
      } else {
        anyhow!(e).context("Failed to spawn mpv process")
      }
    })?;

    let (tx, rx) = mpsc::channel::<MediaEvent>(64);
    self.event_rx = Some(rx);

    let monitor_socket = socket_path_str.clone();
    let monitor_handle = tokio::spawn(async move {
      if let Err(e) = monitor_mpv(&monitor_socket, &tx).await {
        debug!(err = %e, "mpv monitor ended");
        let _ = tx.send(MediaEvent::Failed(format!("{:#}", e))).await;
      }
    });

    self.current_process = Some(child);
    self.monitor_handle = Some(monitor_handle);
    self.ipc_socket_path = Some(socket_path_str);
    Ok(())
  }

  async fn set_paused(&mut self, paused: bool) -> Result<()> {
    self.send_command(json!({"command": ["set_property", "pause", paused]})).await
  }

  async fn seek_fraction(&mut self, fraction: f64) -> Result<()> {
    self.send_command(json!({"command": ["seek", fraction * 100.0, "absolute-percent"]})).await
  }

  async fn set_volume(&mut self, volume: f64) -> Result<()> {
    self.send_command(json!({"command": ["set_property", "volume", volume * 100.0]})).await
  }

  async fn set_muted(&mut self, muted: bool) -> Result<()> {
    self.send_command(json!({"command": ["set_property", "mute", muted]})).await
  }

  async fn set_fullscreen(&mut self, on: bool) -> Result<()> {
    self.send_command(json!({"command": ["set_property", "fullscreen", on]})).await
  }

  async fn stop(&mut self) -> Result<()> {
    if let Some(handle) = self.monitor_handle.take() {
      handle.abort();
      let _ = handle.await;
    }
    self.event_rx = None;

    if let Some(mut child) = self.current_process.take() {
      if let Err(e) = child.kill().await {
        warn!(err = %e, "failed to kill mpv process");
      }
      let _ = child.wait().await;
    }

    if let Some(path) = self.ipc_socket_path.take() {
      let _ = std::fs::remove_file(&path);
    }
    Ok(())
  }

  fn is_loaded(&self) -> bool {
    self.current_process.is_some()
  }

  fn poll_events(&mut self) -> Vec<MediaEvent> {
    let mut events = Vec::new();
    if let Some(rx) = &mut self.event_rx {
      while let Ok(event) = rx.try_recv() {
        events.push(event);
      }
    }
    events
  }
}

/// Observe mpv properties and translate IPC traffic into `MediaEvent`s.
/// Runs until the socket closes (mpv exited) or the task is aborted.
async fn monitor_mpv(socket_path: &str, tx: &mpsc::Sender<MediaEvent>) -> Result<()> {
  // mpv creates the socket shortly after startup; retry briefly.
  let mut stream = None;
  for _ in 0..20 {
    match UnixStream::connect(socket_path).await {
      Ok(s) => {
        stream = Some(s);
        break;
      }
      Err(_) => tokio::time::sleep(Duration::from_millis(100)).await,
    }
  }
  let stream = stream.ok_or_else(|| anyhow!("mpv did not accept an IPC connection"))?;
  let (read_half, mut write_half) = stream.into_split();

  for (id, property) in [(1, "percent-pos"), (2, "fullscreen"), (3, "eof-reached")] {
    let cmd = json!({"command": ["observe_property", id, property]});
    let mut line = cmd.to_string();
    line.push('\n');
    write_half.write_all(line.as_bytes()).await.context("Failed to send observe_property to mpv")?;
  }

  let reader = TokioBufReader::new(read_half);
  let mut lines = reader.lines();
  while let Ok(Some(line)) = lines.next_line().await {
    if let Some(event) = translate_ipc_line(&line) {
      let _ = tx.send(event).await;
    }
  }
  Ok(())
}

/// Map one line of mpv IPC output to a `MediaEvent`, if it carries one.
fn translate_ipc_line(line: &str) -> Option<MediaEvent> {
  let val: Value = serde_json::from_str(line).ok()?;
  match val.get("event").and_then(|v| v.as_str())? {
    "property-change" => match val.get("name").and_then(|v| v.as_str())? {
      // percent-pos can briefly report slightly past 100 near the end.
      "percent-pos" => {
        let pos = val.get("data").and_then(|v| v.as_f64())?;
        Some(MediaEvent::Progress((pos / 100.0).clamp(0.0, 1.0)))
      }
      "fullscreen" => {
        let on = val.get("data").and_then(|v| v.as_bool())?;
        Some(MediaEvent::FullscreenChanged(on))
      }
      "eof-reached" => {
        (val.get("data").and_then(|v| v.as_bool()) == Some(true)).then_some(MediaEvent::Ended)
      }
      _ => None,
    },
    "end-file" => match val.get("reason").and_then(|v| v.as_str()).unwrap_or_default() {
      "error" => {
        let detail = val.get("file_error").and_then(|v| v.as_str()).unwrap_or("playback failed");
        Some(MediaEvent::Failed(detail.to_string()))
      }
      // keep-open normally holds the file at its end, but cover the plain
      // eof path as well (e.g. mpv configured otherwise).
      "eof" => Some(MediaEvent::Ended),
      _ => None,
    },
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn progress_property_becomes_fraction() {
    let line = r#"{"event":"property-change","id":1,"name":"percent-pos","data":25.0}"#;
    assert_eq!(translate_ipc_line(line), Some(MediaEvent::Progress(0.25)));
  }

  #[test]
  fn progress_past_end_is_clamped() {
    let line = r#"{"event":"property-change","id":1,"name":"percent-pos","data":100.4}"#;
    assert_eq!(translate_ipc_line(line), Some(MediaEvent::Progress(1.0)));
  }

  #[test]
  fn null_progress_is_ignored() {
    // mpv reports null before the demuxer knows a duration.
    let line = r#"{"event":"property-change","id":1,"name":"percent-pos","data":null}"#;
    assert_eq!(translate_ipc_line(line), None);
  }

  #[test]
  fn fullscreen_change_is_forwarded() {
    let line = r#"{"event":"property-change","id":2,"name":"fullscreen","data":true}"#;
    assert_eq!(translate_ipc_line(line), Some(MediaEvent::FullscreenChanged(true)));
  }

  #[test]
  fn eof_reached_true_is_ended() {
    let line = r#"{"event":"property-change","id":3,"name":"eof-reached","data":true}"#;
    assert_eq!(translate_ipc_line(line), Some(MediaEvent::Ended));
    let reset = r#"{"event":"property-change","id":3,"name":"eof-reached","data":false}"#;
    assert_eq!(translate_ipc_line(reset), None);
  }

  #[test]
  fn end_file_error_carries_detail() {
    let line = r#"{"event":"end-file","reason":"error","file_error":"loading failed"}"#;
    assert_eq!(translate_ipc_line(line), Some(MediaEvent::Failed("loading failed".to_string())));
  }

  #[test]
  fn unrelated_events_are_ignored() {
    assert_eq!(translate_ipc_line(r#"{"event":"playback-restart"}"#), None);
    assert_eq!(translate_ipc_line(r#"{"request_id":1,"error":"success"}"#), None);
    assert_eq!(translate_ipc_line("not json"), None);
  }
}
