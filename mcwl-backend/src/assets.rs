//! Disk-backed avatar and skin artifact caches.
//!
//! Each cache pairs a [`mcwl_store::AssetLedger`] with a directory of PNG
//! files named by player uuid. An artifact is fresh when its ledger entry is
//! today's date and the file exists; everything else is redownloaded from
//! the render service, at most once per calendar day per uuid.
//!
//! Batch downloads run concurrently but staggered: the i-th stale uuid
//! sleeps `i × uniform(min, max)` before its request, spreading the batch
//! over a widening window instead of bursting the render service.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{Local, NaiveDate};
use rand::Rng;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use mcwl_store::AssetLedger;

use crate::config::Config;
use crate::fetch::{FetchError, Fetcher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Avatar,
    Skin,
}

impl AssetKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            AssetKind::Avatar => "avatars",
            AssetKind::Skin => "skins",
        }
    }

    pub fn ledger_file(self) -> &'static str {
        match self {
            AssetKind::Avatar => "avatar_cache.json",
            AssetKind::Skin => "skin_cache.json",
        }
    }

    /// Render-service URL for one uuid. Avatars are head renders at a fixed
    /// pixel size with the overlay layer; skins are full-body renders.
    pub fn render_url(self, base_url: &str, uuid: &str, avatar_size: u32) -> String {
        match self {
            AssetKind::Avatar => {
                format!("{base_url}/renders/head/{uuid}?size={avatar_size}&overlay")
            }
            AssetKind::Skin => format!("{base_url}/renders/body/{uuid}"),
        }
    }
}

#[derive(Debug, Error)]
enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("render service answered {0}")]
    Status(StatusCode),

    #[error("failed to read response body: {0}")]
    Body(#[from] reqwest::Error),

    #[error("failed to write artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// One asset kind's ledger plus its artifact directory.
pub struct AssetCache {
    kind: AssetKind,
    dir: PathBuf,
    ledger_path: PathBuf,
    ledger: AssetLedger,
    render_base_url: String,
    avatar_size: u32,
    stagger_min: Duration,
    stagger_max: Duration,
}

impl AssetCache {
    /// Open the cache for `kind`, loading its ledger and creating the
    /// artifact directory if needed.
    pub fn open(kind: AssetKind, config: &Config) -> Self {
        let dir = config.data_dir.join(kind.dir_name());
        if let Err(err) = std::fs::create_dir_all(&dir) {
            error!(?dir, %err, "failed to create artifact directory");
        }
        let ledger_path = config.data_dir.join(kind.ledger_file());
        Self {
            kind,
            dir,
            ledger: AssetLedger::load_or_default(&ledger_path),
            ledger_path,
            render_base_url: config.render_base_url.clone(),
            avatar_size: config.avatar_size,
            stagger_min: config.stagger_delay_min,
            stagger_max: config.stagger_delay_max,
        }
    }

    pub fn kind(&self) -> AssetKind {
        self.kind
    }

    pub fn artifact_path(&self, uuid: &str) -> PathBuf {
        self.dir.join(format!("{uuid}.png"))
    }

    fn render_url(&self, uuid: &str) -> String {
        self.kind
            .render_url(&self.render_base_url, uuid, self.avatar_size)
    }

    /// Fresh means refreshed today AND the artifact file is still on disk.
    /// A deleted file invalidates an otherwise-current ledger entry.
    pub fn is_fresh(&self, uuid: &str, today: NaiveDate) -> bool {
        self.ledger.is_current(uuid, today) && self.artifact_path(uuid).exists()
    }

    /// Input positions of uuids that need a download today.
    pub fn stale_of<'a>(&self, uuids: &'a [String], today: NaiveDate) -> Vec<(usize, &'a str)> {
        uuids
            .iter()
            .enumerate()
            .filter(|(_, uuid)| !self.is_fresh(uuid, today))
            .map(|(i, uuid)| (i, uuid.as_str()))
            .collect()
    }

    /// Download every stale uuid in the batch, staggered by input index.
    ///
    /// Returns one flag per input uuid, in input order, true when its
    /// artifact is usable after the batch (already fresh or just fetched).
    /// A failed download only logs; the previous artifact and ledger entry
    /// stay as they were.
    pub async fn ensure_fresh(&mut self, fetcher: &Fetcher, uuids: &[String]) -> Vec<bool> {
        let today = Local::now().date_naive();
        let stale = self.stale_of(uuids, today);
        let mut available: Vec<bool> = uuids
            .iter()
            .map(|uuid| self.is_fresh(uuid, today))
            .collect();
        if stale.is_empty() {
            return available;
        }
        debug!(kind = ?self.kind, total = uuids.len(), stale = stale.len(), "refreshing artifacts");

        let mut tasks = JoinSet::new();
        for (index, uuid) in stale {
            let fetcher = fetcher.clone();
            let url = self.render_url(uuid);
            let path = self.artifact_path(uuid);
            let uuid = uuid.to_string();
            let delay = stagger_delay(index, self.stagger_min, self.stagger_max);
            tasks.spawn(async move {
                tokio::time::sleep(delay).await;
                match download(&fetcher, &url, &path).await {
                    Ok(()) => Some((index, uuid)),
                    Err(err) => {
                        warn!(%uuid, %err, "artifact download failed, keeping previous copy");
                        None
                    }
                }
            });
        }

        let mut refreshed = 0usize;
        while let Some(joined) = tasks.join_next().await {
            if let Ok(Some((index, uuid))) = joined {
                self.ledger.mark(&uuid, today);
                available[index] = true;
                refreshed += 1;
            }
        }

        if refreshed > 0
            && let Err(err) = self.ledger.save(&self.ledger_path)
        {
            // Worst case the artifacts get fetched again tomorrow.
            warn!(kind = ?self.kind, %err, "failed to persist asset ledger");
        }
        debug!(kind = ?self.kind, refreshed, "artifact refresh finished");
        available
    }
}

/// Delay before the request for the `index`-th stale uuid in a batch.
fn stagger_delay(index: usize, min: Duration, max: Duration) -> Duration {
    let min_ms = min.as_millis() as u64;
    let max_ms = max.as_millis().max(min.as_millis()) as u64;
    let per_index = rand::rng().random_range(min_ms..=max_ms);
    Duration::from_millis(index as u64 * per_index)
}

async fn download(fetcher: &Fetcher, url: &str, path: &Path) -> Result<(), DownloadError> {
    let response = fetcher.get(url).await?;
    if !response.status().is_success() {
        return Err(DownloadError::Status(response.status()));
    }
    let body = response.bytes().await?;
    // Same temp-then-rename policy as the JSON stores, so an interrupted
    // write cannot corrupt a previously good artifact.
    let tmp = path.with_extension("tmp");
    tokio::fs::write(&tmp, &body).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

/// Best-effort refresh of the fixed decorative background image.
/// Any failure is logged and swallowed; a stale background is harmless.
pub async fn refresh_background(fetcher: &Fetcher, url: &str, path: &Path) {
    match download(fetcher, url, path).await {
        Ok(()) => debug!(?path, "background image refreshed"),
        Err(err) => warn!(%err, "background image refresh failed"),
    }
}
