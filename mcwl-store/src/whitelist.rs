//! Owner-to-players whitelist map.
//!
//! Each chat identity owns an ordered sequence of player names. Order is
//! insertion order and is meaningful: removal without an explicit name pops
//! the most recent entry. Membership checks are case-insensitive while the
//! stored spelling is preserved.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::Result;
use crate::models::{AddOutcome, PlayerName, RemoveOutcome};
use crate::persist;

/// All registered players, keyed by the owning chat identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Whitelist {
  owners: HashMap<String, Vec<PlayerName>>,
}

impl Whitelist {
  pub fn new() -> Self {
    Self::default()
  }

  /// Append `player` to `owner`'s sequence.
  ///
  /// Rejects a case-insensitive duplicate before checking the bind limit,
  /// so re-adding an existing name never reports `LimitReached`.
  pub fn add(&mut self, owner: &str, player: PlayerName, max_bind: usize) -> AddOutcome {
    let seq = self.owners.entry(owner.to_string()).or_default();
    if seq.iter().any(|p| p.eq_ignore_ascii_case(&player)) {
      return AddOutcome::AlreadyPresent;
    }
    if seq.len() >= max_bind {
      return AddOutcome::LimitReached;
    }
    seq.push(player);
    AddOutcome::Added
  }

  /// Pop the most recently added entry for `owner`.
  pub fn remove_last(&mut self, owner: &str) -> RemoveOutcome {
    match self.owners.get_mut(owner).and_then(Vec::pop) {
      Some(name) => RemoveOutcome::Removed(name),
      None => RemoveOutcome::Empty,
    }
  }

  /// Remove the first case-insensitive match for `player` from `owner`'s
  /// sequence. Returns the stored spelling, which may differ in case from
  /// the requested one.
  pub fn remove(&mut self, owner: &str, player: &str) -> RemoveOutcome {
    let Some(seq) = self.owners.get_mut(owner) else {
      return RemoveOutcome::NotFound;
    };
    match seq.iter().position(|p| p.eq_ignore_ascii_case(player)) {
      Some(idx) => RemoveOutcome::Removed(seq.remove(idx)),
      None => RemoveOutcome::NotFound,
    }
  }

  /// Find which owner registered `player` (case-insensitive).
  ///
  /// Owners are scanned in map iteration order; with the no-duplicate
  /// invariant a name can match at most one owner anyway.
  pub fn find_owner(&self, player: &str) -> Option<&str> {
    self
      .owners
      .iter()
      .find(|(_, seq)| seq.iter().any(|p| p.eq_ignore_ascii_case(player)))
      .map(|(owner, _)| owner.as_str())
  }

  /// The owner's sequence in insertion order. Empty slice for an unknown owner.
  pub fn players(&self, owner: &str) -> &[PlayerName] {
    self.owners.get(owner).map_or(&[], Vec::as_slice)
  }

  pub fn count(&self, owner: &str) -> usize {
    self.owners.get(owner).map_or(0, Vec::len)
  }

  /// Load from a JSON file. Missing or empty file yields an empty map.
  pub fn load(path: &Path) -> Result<Self> {
    persist::read_json(path)
  }

  /// Like [`Whitelist::load`], but a corrupt file is logged and replaced by
  /// an empty map instead of failing startup.
  pub fn load_or_default(path: &Path) -> Self {
    Self::load(path).unwrap_or_else(|err| {
      warn!(?path, %err, "failed to load whitelist, starting empty");
      Self::default()
    })
  }

  /// Persist the whole map, replacing the file atomically.
  pub fn save(&self, path: &Path) -> Result<()> {
    persist::write_json_atomic(path, self)
  }
}
