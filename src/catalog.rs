use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::warn;

/// One playable item in the catalog.
///
/// Serialized with the wire field names the persisted catalog has always
/// used (`cloudinaryId`, optionals omitted when absent) so existing files
/// round-trip losslessly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRecord {
  pub id: String,
  pub title: String,
  pub url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<String>,
  /// Duration in seconds.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub duration: Option<f64>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub cloudinary_id: Option<String>,
  /// RFC 3339 timestamp of when the record was added.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub added_at: Option<String>,
}

/// Partial update for a record. `None` fields are left untouched.
#[derive(Debug, Clone, Default)]
pub struct VideoPatch {
  pub title: Option<String>,
  pub url: Option<String>,
  pub thumbnail: Option<String>,
  pub duration: Option<f64>,
}

impl VideoPatch {
  fn apply(self, record: &mut VideoRecord) {
    if let Some(title) = self.title {
      record.title = title;
    }
    if let Some(url) = self.url {
      record.url = url;
    }
    if let Some(thumbnail) = self.thumbnail {
      record.thumbnail = Some(thumbnail);
    }
    if let Some(duration) = self.duration {
      record.duration = Some(duration);
    }
  }
}

/// Ordered catalog persistence. Insertion order is significant: it determines
/// the playlist order and the wraparound point for "next".
///
/// The player never touches the storage medium directly — it works on a copy
/// from `list()` and refreshes after every mutation.
pub trait CatalogStore {
  fn list(&self) -> Vec<VideoRecord>;
  fn add(&mut self, record: VideoRecord) -> Result<()>;
  fn update(&mut self, id: &str, patch: VideoPatch) -> Result<()>;
  fn remove(&mut self, id: &str) -> Result<()>;
  fn clear(&mut self) -> Result<()>;
}

// --- In-memory store ---

/// Volatile store, used by tests and available as a `--no-persist` backend.
#[derive(Default)]
pub struct MemoryStore {
  records: Vec<VideoRecord>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl CatalogStore for MemoryStore {
  fn list(&self) -> Vec<VideoRecord> {
    self.records.clone()
  }

  fn add(&mut self, record: VideoRecord) -> Result<()> {
    add_unique(&mut self.records, record)
  }

  fn update(&mut self, id: &str, patch: VideoPatch) -> Result<()> {
    if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
      patch.apply(record);
    }
    Ok(())
  }

  fn remove(&mut self, id: &str) -> Result<()> {
    self.records.retain(|r| r.id != id);
    Ok(())
  }

  fn clear(&mut self) -> Result<()> {
    self.records.clear();
    Ok(())
  }
}

// --- JSON file store ---

/// Durable store backed by a single JSON file in the data directory.
///
/// Every mutation rewrites the file immediately, so the catalog survives the
/// session without any explicit save step. Unparsable data is treated as an
/// empty catalog rather than an error — the old contents stay on disk until
/// the first mutation overwrites them.
pub struct JsonFileStore {
  path: PathBuf,
  records: Vec<VideoRecord>,
}

impl JsonFileStore {
  pub fn open(path: PathBuf) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent).with_context(|| format!("Failed to create catalog directory {:?}", parent))?;
    }
    let records = match std::fs::read_to_string(&path) {
      Ok(content) => match serde_json::from_str(&content) {
        Ok(records) => records,
        Err(e) => {
          warn!(path = %path.display(), err = %e, "catalog file unparsable, starting with an empty catalog");
          Vec::new()
        }
      },
      Err(_) => Vec::new(),
    };
    Ok(Self { path, records })
  }

  fn persist(&self) -> Result<()> {
    let content = serde_json::to_string_pretty(&self.records).context("Failed to serialize catalog")?;
    std::fs::write(&self.path, content).with_context(|| format!("Failed to write catalog to {:?}", self.path))
  }
}

impl CatalogStore for JsonFileStore {
  fn list(&self) -> Vec<VideoRecord> {
    self.records.clone()
  }

  fn add(&mut self, record: VideoRecord) -> Result<()> {
    add_unique(&mut self.records, record)?;
    self.persist()
  }

  fn update(&mut self, id: &str, patch: VideoPatch) -> Result<()> {
    if let Some(record) = self.records.iter_mut().find(|r| r.id == id) {
      patch.apply(record);
      self.persist()?;
    }
    Ok(())
  }

  fn remove(&mut self, id: &str) -> Result<()> {
    let before = self.records.len();
    self.records.retain(|r| r.id != id);
    if self.records.len() != before {
      self.persist()?;
    }
    Ok(())
  }

  fn clear(&mut self) -> Result<()> {
    self.records.clear();
    self.persist()
  }
}

/// Append a record, enforcing the catalog-wide id uniqueness invariant.
fn add_unique(records: &mut Vec<VideoRecord>, record: VideoRecord) -> Result<()> {
  if record.url.is_empty() {
    return Err(anyhow!("Video '{}' has an empty source URL", record.id));
  }
  if records.iter().any(|r| r.id == record.id) {
    return Err(anyhow!("Video id '{}' is already in the catalog", record.id));
  }
  records.push(record);
  Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
  use super::*;

  /// Shared across the playlist and playback test modules as well.
  pub(crate) fn record(id: &str, title: &str) -> VideoRecord {
    VideoRecord {
      id: id.to_string(),
      title: title.to_string(),
      url: format!("https://videos.example/{}.mp4", id),
      thumbnail: None,
      duration: None,
      cloudinary_id: None,
      added_at: None,
    }
  }

  // --- MemoryStore ---

  #[test]
  fn add_then_list_returns_equal_record() {
    let mut store = MemoryStore::new();
    let mut rec = record("v1", "First");
    rec.thumbnail = Some("https://videos.example/v1.jpg".to_string());
    rec.duration = Some(12.5);
    rec.cloudinary_id = Some("v1".to_string());
    store.add(rec.clone()).unwrap();
    assert_eq!(store.list(), vec![rec]);
  }

  #[test]
  fn add_rejects_duplicate_id() {
    let mut store = MemoryStore::new();
    store.add(record("v1", "First")).unwrap();
    assert!(store.add(record("v1", "Again")).is_err());
    assert_eq!(store.list().len(), 1);
  }

  #[test]
  fn add_rejects_empty_url() {
    let mut store = MemoryStore::new();
    let mut rec = record("v1", "First");
    rec.url.clear();
    assert!(store.add(rec).is_err());
  }

  #[test]
  fn remove_drops_only_that_id() {
    let mut store = MemoryStore::new();
    store.add(record("v1", "First")).unwrap();
    store.add(record("v2", "Second")).unwrap();
    store.remove("v1").unwrap();
    let ids: Vec<String> = store.list().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["v2"]);
  }

  #[test]
  fn update_changes_only_patched_fields() {
    let mut store = MemoryStore::new();
    store.add(record("v1", "First")).unwrap();
    store.update("v1", VideoPatch { title: Some("X".to_string()), ..Default::default() }).unwrap();
    let listed = store.list();
    assert_eq!(listed[0].title, "X");
    assert_eq!(listed[0].url, "https://videos.example/v1.mp4");
  }

  #[test]
  fn update_missing_id_is_a_no_op() {
    let mut store = MemoryStore::new();
    store.add(record("v1", "First")).unwrap();
    store.update("nope", VideoPatch { title: Some("X".to_string()), ..Default::default() }).unwrap();
    assert_eq!(store.list()[0].title, "First");
  }

  #[test]
  fn clear_empties_the_catalog() {
    let mut store = MemoryStore::new();
    store.add(record("v1", "First")).unwrap();
    store.clear().unwrap();
    assert!(store.list().is_empty());
  }

  // --- JsonFileStore ---

  #[test]
  fn file_store_round_trips_all_optional_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("videos.json");
    let mut rec = record("v9", "Clip");
    rec.thumbnail = Some("https://videos.example/v9.jpg".to_string());
    rec.duration = Some(42.0);
    rec.cloudinary_id = Some("v9".to_string());
    rec.added_at = Some("2026-08-29T12:00:00Z".to_string());

    let mut store = JsonFileStore::open(path.clone()).unwrap();
    store.add(rec.clone()).unwrap();
    drop(store);

    let reopened = JsonFileStore::open(path).unwrap();
    assert_eq!(reopened.list(), vec![rec]);
  }

  #[test]
  fn file_store_uses_wire_field_names() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("videos.json");
    let mut rec = record("v9", "Clip");
    rec.cloudinary_id = Some("v9".to_string());

    let mut store = JsonFileStore::open(path.clone()).unwrap();
    store.add(rec).unwrap();

    let raw = std::fs::read_to_string(&path).unwrap();
    assert!(raw.contains("\"cloudinaryId\""));
    assert!(!raw.contains("cloudinary_id"));
    // Absent optionals are omitted entirely.
    assert!(!raw.contains("thumbnail"));
  }

  #[test]
  fn file_store_treats_corrupt_data_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("videos.json");
    std::fs::write(&path, "{not json").unwrap();

    let store = JsonFileStore::open(path).unwrap();
    assert!(store.list().is_empty());
  }

  #[test]
  fn file_store_missing_file_is_empty() {
    let dir = tempfile::tempdir().unwrap();
    let store = JsonFileStore::open(dir.path().join("videos.json")).unwrap();
    assert!(store.list().is_empty());
  }
}
