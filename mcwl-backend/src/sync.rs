//! Orchestration of whitelist mutations against the remote API.
//!
//! Every mutation walks the same ladder: validate the name, check local
//! state, call the remote whitelist API, and only commit locally once the
//! remote confirmed. Local-state rejections (duplicate, limit, not found)
//! never reach the network, and a failed remote call never mutates local
//! state, so the store cannot run ahead of remote truth in either
//! direction.
//!
//! All mutations are serialized through one async mutex over the store.
//! The check and the commit span the remote await, so without the lock two
//! concurrent adds for one owner could both pass the limit check.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use tokio::sync::Mutex;
use tracing::{info, warn};

use mcwl_store::{AddOutcome, PlayerName, RemoveOutcome, Whitelist};

use crate::config::Config;
use crate::fetch::Fetcher;
use crate::validation::normalize_player_input;

/// The remote answers with free text like "Player Steve added to the
/// whitelist"; the rendered name is lifted out of it when present.
static DISPLAY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Player\s+(\S+)\s+(?:added|removed)").unwrap());

/// Outcome of one whitelist mutation, for the command layer to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote confirmed the add and local state was committed.
    Added { player: String, total: usize },
    /// Remote confirmed the removal and local state was committed.
    Removed { player: String },
    /// The owner already registered this name; nothing was sent.
    AlreadyPresent { player: String },
    /// The owner is at the configured bind limit; nothing was sent.
    LimitReached { max: usize },
    /// Removal without a name, but the owner's sequence is empty.
    NothingToRemove,
    /// Removal by name, but the owner never registered it.
    NotFound { player: String },
    /// The command text did not contain a usable player name.
    InvalidInput { reason: String },
    /// The remote API rejected the bearer token (401).
    AuthFailure,
    /// Transport failure after retries, or a non-ok remote response.
    RemoteFailure,
}

#[derive(Debug, Clone, Copy)]
enum RemoteAction {
    Add,
    Remove,
}

impl RemoteAction {
    fn segment(self) -> &'static str {
        match self {
            RemoteAction::Add => "add",
            RemoteAction::Remove => "remove",
        }
    }
}

enum ApiFailure {
    Auth,
    Remote,
}

/// Drives whitelist mutations and owns the persisted store.
pub struct Coordinator {
    config: Config,
    fetcher: Fetcher,
    list_path: PathBuf,
    whitelist: Mutex<Whitelist>,
}

impl Coordinator {
    /// Load the persisted whitelist and wrap it for serialized mutation.
    pub fn open(config: Config, fetcher: Fetcher) -> Self {
        let list_path = config.list_path();
        let whitelist = Whitelist::load_or_default(&list_path);
        Self {
            config,
            fetcher,
            list_path,
            whitelist: Mutex::new(whitelist),
        }
    }

    /// Register `raw` as a player name for `owner`.
    pub async fn add_player(&self, owner: &str, raw: &str) -> SyncOutcome {
        let player = match normalize_player_input(raw) {
            Ok(player) => player,
            Err(err) => {
                return SyncOutcome::InvalidInput {
                    reason: err.to_string(),
                };
            }
        };

        // Held across the remote call to serialize check-then-commit.
        let mut whitelist = self.whitelist.lock().await;

        if whitelist
            .players(owner)
            .iter()
            .any(|p| p.eq_ignore_ascii_case(&player))
        {
            return SyncOutcome::AlreadyPresent {
                player: player.to_string(),
            };
        }
        if whitelist.count(owner) >= self.config.max_bind {
            return SyncOutcome::LimitReached {
                max: self.config.max_bind,
            };
        }

        match self.call_api(RemoteAction::Add, &player).await {
            Ok(body) => {
                let display_name = extract_display_name(&body, &player);
                let added = whitelist.add(owner, player, self.config.max_bind);
                debug_assert!(matches!(added, AddOutcome::Added));
                self.persist(&whitelist);
                info!(owner, player = %display_name, "player added to whitelist");
                SyncOutcome::Added {
                    player: display_name,
                    total: whitelist.count(owner),
                }
            }
            Err(ApiFailure::Auth) => SyncOutcome::AuthFailure,
            Err(ApiFailure::Remote) => SyncOutcome::RemoteFailure,
        }
    }

    /// Unregister a player for `owner`: the named one when `raw` is given,
    /// otherwise the most recently added.
    pub async fn remove_player(&self, owner: &str, raw: Option<&str>) -> SyncOutcome {
        let mut whitelist = self.whitelist.lock().await;

        // Resolve the stored spelling first; the remote API is called with
        // the name exactly as it was registered.
        let (target, pop_last) = match raw {
            Some(raw) => {
                let requested = match normalize_player_input(raw) {
                    Ok(requested) => requested,
                    Err(err) => {
                        return SyncOutcome::InvalidInput {
                            reason: err.to_string(),
                        };
                    }
                };
                match whitelist
                    .players(owner)
                    .iter()
                    .find(|p| p.eq_ignore_ascii_case(&requested))
                {
                    Some(stored) => (*stored, false),
                    None => {
                        return SyncOutcome::NotFound {
                            player: requested.to_string(),
                        };
                    }
                }
            }
            None => match whitelist.players(owner).last() {
                Some(last) => (*last, true),
                None => return SyncOutcome::NothingToRemove,
            },
        };

        match self.call_api(RemoteAction::Remove, &target).await {
            Ok(body) => {
                let display_name = extract_display_name(&body, &target);
                let removed = if pop_last {
                    whitelist.remove_last(owner)
                } else {
                    whitelist.remove(owner, &target)
                };
                debug_assert!(matches!(removed, RemoveOutcome::Removed(_)));
                self.persist(&whitelist);
                info!(owner, player = %display_name, "player removed from whitelist");
                SyncOutcome::Removed { player: display_name }
            }
            Err(ApiFailure::Auth) => SyncOutcome::AuthFailure,
            Err(ApiFailure::Remote) => SyncOutcome::RemoteFailure,
        }
    }

    /// The owner's registered names, in insertion order.
    pub async fn players_of(&self, owner: &str) -> Vec<PlayerName> {
        self.whitelist.lock().await.players(owner).to_vec()
    }

    /// Which owner registered `player`, if any.
    pub async fn owner_of(&self, player: &str) -> Option<String> {
        self.whitelist
            .lock()
            .await
            .find_owner(player)
            .map(str::to_string)
    }

    async fn call_api(&self, action: RemoteAction, player: &str) -> Result<String, ApiFailure> {
        let url = format!(
            "{}/whitelist/{}",
            self.config.api_base_url.trim_end_matches('/'),
            action.segment()
        );
        let request = self
            .fetcher
            .client()
            .get(&url)
            .query(&[("player", player)])
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.config.api_token);

        match self.fetcher.execute(request).await {
            Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                warn!("whitelist API rejected the bearer token");
                Err(ApiFailure::Auth)
            }
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), action = action.segment(), "whitelist API refused the request");
                Err(ApiFailure::Remote)
            }
            Ok(response) => response.text().await.map_err(|err| {
                warn!(%err, "failed to read whitelist API response");
                ApiFailure::Remote
            }),
            Err(err) => {
                warn!(%err, action = action.segment(), "whitelist API unreachable");
                Err(ApiFailure::Remote)
            }
        }
    }

    /// Save failures are logged and swallowed; in-memory state stays
    /// authoritative until the next successful save.
    fn persist(&self, whitelist: &Whitelist) {
        if let Err(err) = whitelist.save(&self.list_path) {
            warn!(path = ?self.list_path, %err, "failed to persist whitelist");
        }
    }
}

/// Best-effort extraction of the remote's rendering of the player name,
/// falling back to the name we asked for. Absence of a match is not an
/// error.
pub fn extract_display_name(body: &str, fallback: &str) -> String {
    DISPLAY_NAME_RE
        .captures(body)
        .and_then(|caps| caps.get(1))
        .map_or_else(|| fallback.to_string(), |m| m.as_str().to_string())
}
