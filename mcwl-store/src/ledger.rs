//! Last-refresh ledger for downloaded render artifacts.
//!
//! One ledger exists per asset kind (avatars, skins). Each entry maps a
//! player uuid to the calendar date its artifact was last fetched. An entry
//! is current for today only; yesterday's entries simply trigger a
//! redownload on the next batch, so nothing is ever evicted.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::persist;

/// uuid -> date of last successful artifact download.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetLedger {
  entries: HashMap<String, NaiveDate>,
}

impl AssetLedger {
  pub fn new() -> Self {
    Self::default()
  }

  /// True if `uuid` was refreshed on `today`.
  ///
  /// Callers must additionally verify the artifact file exists on disk
  /// before trusting a current entry.
  pub fn is_current(&self, uuid: &str, today: NaiveDate) -> bool {
    self.entries.get(uuid) == Some(&today)
  }

  /// Record a successful download of `uuid` on `date`.
  pub fn mark(&mut self, uuid: &str, date: NaiveDate) {
    self.entries.insert(uuid.to_string(), date);
  }

  pub fn last_refresh(&self, uuid: &str) -> Option<NaiveDate> {
    self.entries.get(uuid).copied()
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  /// Load from a JSON file. Missing or empty file yields an empty ledger.
  pub fn load(path: &Path) -> Result<Self> {
    persist::read_json(path)
  }

  /// Like [`AssetLedger::load`], but a corrupt file is logged and replaced
  /// by an empty ledger. Worst case every artifact is fetched once more.
  pub fn load_or_default(path: &Path) -> Self {
    Self::load(path).unwrap_or_else(|err| {
      warn!(?path, %err, "failed to load asset ledger, starting empty");
      Self::default()
    })
  }

  /// Persist the whole ledger, replacing the file atomically.
  pub fn save(&self, path: &Path) -> Result<()> {
    persist::write_json_atomic(path, self)
  }
}
