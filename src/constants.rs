//! Application constants loaded from `constants.ron` at compile time.
//!
//! The RON file is embedded via `include_str!` so it's always available —
//! no runtime file I/O. Parsed once on first access via `LazyLock`.

use serde::Deserialize;
use std::sync::LazyLock;

/// All tuneable application constants.
#[derive(Debug, Deserialize)]
pub struct Constants {
  // Demo seeding
  pub demo_video_id: String,
  pub demo_video_title: String,
  pub demo_video_url: String,

  // Transport
  pub controls_hide_secs: u64,
  pub error_advance_ms: u64,
  pub seek_step: f64,
  pub volume_step: f64,

  // Messages
  pub error_expire_secs: u64,

  // Catalog
  pub catalog_file: String,

  // Cloudinary upload
  pub upload_host: String,
  pub default_upload_title: String,
  pub max_upload_bytes: u64,
}

static CONSTANTS: LazyLock<Constants> = LazyLock::new(|| {
  // Safety: the RON file is embedded at compile time; if it's malformed this is a build-time error.
  ron::from_str(include_str!("../constants.ron")).expect("constants.ron must be valid RON (embedded at compile time)")
});

/// Returns a reference to the parsed application constants.
pub fn constants() -> &'static Constants {
  &CONSTANTS
}
