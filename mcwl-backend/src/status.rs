//! Read-only clients for the server status services.
//!
//! Player presence comes from the public mcstatus.io lookup; tick rate and
//! per-player play statistics come from the whitelist API itself.

use reqwest::StatusCode;
use reqwest::header::ACCEPT;
use serde::Deserialize;
use thiserror::Error;

use crate::config::Config;
use crate::fetch::{FetchError, Fetcher};

#[derive(Debug, Error)]
pub enum StatusError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("status service answered {0}")]
    Status(StatusCode),

    #[error("malformed status payload: {0}")]
    Decode(#[source] reqwest::Error),

    #[error("no server address configured")]
    Unconfigured,
}

/// Subset of the mcstatus.io Java status payload we render.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerStatus {
    pub online: bool,
    #[serde(default)]
    pub players: PlayerSample,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlayerSample {
    #[serde(default)]
    pub online: u32,
    #[serde(default)]
    pub max: u32,
    #[serde(default)]
    pub list: Vec<OnlinePlayer>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OnlinePlayer {
    pub uuid: String,
    pub name_clean: String,
}

pub struct StatusClient {
    config: Config,
    fetcher: Fetcher,
}

impl StatusClient {
    pub fn new(config: Config, fetcher: Fetcher) -> Self {
        Self { config, fetcher }
    }

    /// Look up the configured server's online state and player sample.
    pub async fn java_status(&self) -> Result<ServerStatus, StatusError> {
        let address = self
            .config
            .server_address
            .as_deref()
            .ok_or(StatusError::Unconfigured)?;
        let url = format!(
            "{}/{}",
            self.config.status_base_url.trim_end_matches('/'),
            address
        );
        let response = self.fetcher.get(&url).await?;
        if !response.status().is_success() {
            return Err(StatusError::Status(response.status()));
        }
        response.json().await.map_err(StatusError::Decode)
    }

    /// Current tick rate as reported by the whitelist API, free text.
    pub async fn tps(&self) -> Result<String, StatusError> {
        self.api_text("server/tps", &[]).await
    }

    /// Play statistics for one player, free text.
    pub async fn play_stats(&self, player: &str) -> Result<String, StatusError> {
        self.api_text("server/playStats/", &[("player", player)]).await
    }

    async fn api_text(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<String, StatusError> {
        let url = format!(
            "{}/{}",
            self.config.api_base_url.trim_end_matches('/'),
            path
        );
        let request = self
            .fetcher
            .client()
            .get(&url)
            .query(query)
            .header(ACCEPT, "application/json")
            .bearer_auth(&self.config.api_token);
        let response = self.fetcher.execute(request).await?;
        if !response.status().is_success() {
            return Err(StatusError::Status(response.status()));
        }
        response.text().await.map_err(StatusError::Decode)
    }
}
