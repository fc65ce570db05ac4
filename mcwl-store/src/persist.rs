//! Whole-file JSON persistence shared by the whitelist and the asset ledgers.
//!
//! Files are rewritten in full on every save. The write goes to a sibling
//! `.tmp` file first and is renamed into place, so a crash mid-save leaves
//! the previous file intact rather than a truncated one.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;

/// Read a JSON map from `path`. A missing or empty file is not an error;
/// it yields the type's default (an empty map).
pub(crate) fn read_json<T>(path: &Path) -> Result<T>
where
  T: DeserializeOwned + Default,
{
  if !path.exists() {
    return Ok(T::default());
  }
  let raw = fs::read_to_string(path)?;
  if raw.trim().is_empty() {
    return Ok(T::default());
  }
  Ok(serde_json::from_str(&raw)?)
}

/// Serialize `value` and atomically replace the file at `path`.
pub(crate) fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
  if let Some(parent) = path.parent()
    && !parent.as_os_str().is_empty()
  {
    fs::create_dir_all(parent)?;
  }
  let tmp = path.with_extension("tmp");
  fs::write(&tmp, serde_json::to_vec_pretty(value)?)?;
  fs::rename(&tmp, path)?;
  Ok(())
}
