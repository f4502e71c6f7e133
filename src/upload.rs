use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::path::Path;
use tracing::info;

use crate::catalog::VideoRecord;
use crate::config::Config;
use crate::constants::constants;

/// Terminal result of one upload attempt. Failures are reported to the user
/// and never retried automatically.
#[derive(Debug)]
pub enum UploadOutcome {
  Completed(VideoRecord),
  Cancelled,
  Failed(String),
}

/// What Cloudinary returns from a successful unsigned video upload. Only the
/// fields that map onto a `VideoRecord` are kept.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
  pub public_id: String,
  pub secure_url: String,
  #[serde(default)]
  pub original_filename: Option<String>,
  #[serde(default)]
  pub thumbnail_url: Option<String>,
  #[serde(default)]
  pub duration: Option<f64>,
}

/// Map a completed upload onto a catalog record. The host identifier doubles
/// as the record id; a missing original filename falls back to the default
/// title.
pub fn record_from_response(resp: UploadResponse) -> VideoRecord {
  VideoRecord {
    id: resp.public_id.clone(),
    title: resp.original_filename.unwrap_or_else(|| constants().default_upload_title.clone()),
    url: resp.secure_url,
    thumbnail: resp.thumbnail_url,
    duration: resp.duration,
    cloudinary_id: Some(resp.public_id),
    added_at: Some(chrono::Utc::now().to_rfc3339()),
  }
}

/// Reject files over the upload limit before any bytes leave the machine.
fn check_upload_size(len: u64) -> Result<()> {
  let max = constants().max_upload_bytes;
  if len > max {
    return Err(anyhow!("File is {} MB, over the {} MB upload limit", len / 1_000_000, max / 1_000_000));
  }
  Ok(())
}

/// Unsigned uploads against the Cloudinary video endpoint.
pub struct CloudinaryUploader {
  client: Client,
  cloud_name: String,
  upload_preset: String,
}

impl CloudinaryUploader {
  pub fn new(config: &Config) -> Self {
    Self { client: Client::new(), cloud_name: config.cloud_name(), upload_preset: config.upload_preset() }
  }

  /// Upload a local file. Any error collapses into `Failed` with a
  /// user-facing message; the catalog is only touched on `Completed`.
  pub async fn upload(&self, path: &Path) -> UploadOutcome {
    match self.try_upload(path).await {
      Ok(record) => {
        info!(id = %record.id, "upload completed");
        UploadOutcome::Completed(record)
      }
      Err(e) => UploadOutcome::Failed(format!("{:#}", e)),
    }
  }

  async fn try_upload(&self, path: &Path) -> Result<VideoRecord> {
    let meta = tokio::fs::metadata(path).await.with_context(|| format!("Cannot read {:?}", path))?;
    if !meta.is_file() {
      return Err(anyhow!("{:?} is not a file", path));
    }
    check_upload_size(meta.len())?;

    let file_name =
      path.file_name().and_then(|n| n.to_str()).map(str::to_string).unwrap_or_else(|| "video".to_string());
    let bytes = tokio::fs::read(path).await.with_context(|| format!("Failed to read {:?}", path))?;

    let form = Form::new()
      .text("upload_preset", self.upload_preset.clone())
      .part("file", Part::bytes(bytes).file_name(file_name));

    let url = format!("{}/v1_1/{}/video/upload", constants().upload_host, self.cloud_name);
    let response = self.client.post(&url).multipart(form).send().await.context("Upload request failed")?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      return Err(anyhow!("Cloudinary rejected the upload ({}): {}", status, body));
    }

    let parsed: UploadResponse = response.json().await.context("Cloudinary response was not valid JSON")?;
    Ok(record_from_response(parsed))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn completed_upload_maps_onto_a_record() {
    let resp: UploadResponse = serde_json::from_str(
      r#"{
        "public_id": "v7",
        "secure_url": "https://res.example/v7.mp4",
        "original_filename": "holiday",
        "thumbnail_url": "https://res.example/v7.jpg",
        "duration": 93.4
      }"#,
    )
    .unwrap();
    let record = record_from_response(resp);
    assert_eq!(record.id, "v7");
    assert_eq!(record.title, "holiday");
    assert_eq!(record.url, "https://res.example/v7.mp4");
    assert_eq!(record.thumbnail.as_deref(), Some("https://res.example/v7.jpg"));
    assert_eq!(record.duration, Some(93.4));
    assert_eq!(record.cloudinary_id.as_deref(), Some("v7"));
    assert!(record.added_at.is_some());
  }

  #[test]
  fn oversized_files_are_rejected_before_upload() {
    let max = constants().max_upload_bytes;
    assert!(check_upload_size(max).is_ok());
    let err = check_upload_size(250_000_000).unwrap_err();
    assert!(err.to_string().contains("250 MB"));
    assert!(err.to_string().contains("upload limit"));
  }

  #[test]
  fn missing_filename_falls_back_to_default_title() {
    let resp: UploadResponse =
      serde_json::from_str(r#"{"public_id": "v9", "secure_url": "https://x/v9.mp4"}"#).unwrap();
    let record = record_from_response(resp);
    assert_eq!(record.title, constants().default_upload_title);
    assert_eq!(record.url, "https://x/v9.mp4");
    assert_eq!(record.thumbnail, None);
    assert_eq!(record.duration, None);
  }
}
