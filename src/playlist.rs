use anyhow::{Result, anyhow};

use crate::catalog::VideoRecord;

/// Ordered working copy of the catalog plus the cursor of the currently
/// selected record.
///
/// The playlist only ever moves between "no selection" (empty catalog) and
/// "selected" — once a non-empty catalog is loaded there is always a current
/// item for the rest of the session.
#[derive(Default)]
pub struct Playlist {
  records: Vec<VideoRecord>,
  cursor: Option<usize>,
}

impl Playlist {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> &[VideoRecord] {
    &self.records
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }

  pub fn current(&self) -> Option<&VideoRecord> {
    self.cursor.and_then(|i| self.records.get(i))
  }

  pub fn current_index(&self) -> Option<usize> {
    self.cursor
  }

  /// Move to the next record, wrapping at the end. A single-item playlist
  /// stays put; an empty one silently keeps "no selection".
  pub fn advance(&mut self) {
    if self.records.is_empty() {
      return;
    }
    self.cursor = Some(match self.cursor {
      Some(i) => (i + 1) % self.records.len(),
      None => 0,
    });
  }

  /// Point the cursor at the record with the given id. An unknown id leaves
  /// the cursor untouched and reports the failure to the caller.
  pub fn select(&mut self, id: &str) -> Result<&VideoRecord> {
    match self.records.iter().position(|r| r.id == id) {
      Some(i) => {
        self.cursor = Some(i);
        Ok(&self.records[i])
      }
      None => Err(anyhow!("No video with id '{}' in the catalog", id)),
    }
  }

  /// Replace the working copy with a freshly loaded catalog. The selection is
  /// re-resolved by id; if the selected record is gone we fall back to the
  /// first record, or to no selection when the catalog is empty.
  pub fn refresh(&mut self, records: Vec<VideoRecord>) {
    let selected_id = self.current().map(|r| r.id.clone());
    self.records = records;
    self.cursor = match selected_id.and_then(|id| self.records.iter().position(|r| r.id == id)) {
      Some(i) => Some(i),
      None if self.records.is_empty() => None,
      None => Some(0),
    };
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::catalog::tests::record;

  fn playlist(ids: &[&str]) -> Playlist {
    let mut p = Playlist::new();
    p.refresh(ids.iter().map(|id| record(id, id)).collect());
    p
  }

  #[test]
  fn refresh_of_non_empty_catalog_selects_first() {
    let p = playlist(&["a", "b", "c"]);
    assert_eq!(p.current_index(), Some(0));
    assert_eq!(p.current().unwrap().id, "a");
  }

  #[test]
  fn advance_cycles_back_after_full_lap() {
    let mut p = playlist(&["a", "b", "c"]);
    for _ in 0..3 {
      p.advance();
    }
    assert_eq!(p.current_index(), Some(0));
  }

  #[test]
  fn advance_wraps_from_last_to_first() {
    let mut p = playlist(&["a", "b", "c"]);
    p.select("c").unwrap();
    p.advance();
    assert_eq!(p.current().unwrap().id, "a");
  }

  #[test]
  fn advance_on_single_item_is_idempotent() {
    let mut p = playlist(&["only"]);
    p.advance();
    p.advance();
    assert_eq!(p.current_index(), Some(0));
  }

  #[test]
  fn advance_on_empty_catalog_keeps_no_selection() {
    let mut p = Playlist::new();
    p.advance();
    assert_eq!(p.current_index(), None);
    assert!(p.current().is_none());
  }

  #[test]
  fn select_unknown_id_reports_and_keeps_cursor() {
    let mut p = playlist(&["a", "b"]);
    p.select("b").unwrap();
    assert!(p.select("missing").is_err());
    assert_eq!(p.current().unwrap().id, "b");
  }

  #[test]
  fn refresh_re_resolves_selection_by_id() {
    let mut p = playlist(&["a", "b", "c"]);
    p.select("b").unwrap();
    // "a" removed: "b" shifts from index 1 to index 0.
    p.refresh(vec![record("b", "b"), record("c", "c")]);
    assert_eq!(p.current_index(), Some(0));
    assert_eq!(p.current().unwrap().id, "b");
  }

  #[test]
  fn refresh_falls_back_to_first_when_selected_gone() {
    let mut p = playlist(&["a", "b"]);
    p.select("b").unwrap();
    p.refresh(vec![record("a", "a"), record("c", "c")]);
    assert_eq!(p.current().unwrap().id, "a");
  }

  #[test]
  fn refresh_to_empty_clears_selection() {
    let mut p = playlist(&["a"]);
    p.refresh(Vec::new());
    assert_eq!(p.current_index(), None);
  }
}
