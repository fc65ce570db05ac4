use std::env::var;
use std::path::PathBuf;
use std::time::Duration;

use dotenvy::dotenv;

/// Application configuration with environment variable overrides
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the remote whitelist API
    /// Env: WHITELIST_API_URL (default: "http://127.0.0.1:6626")
    pub api_base_url: String,

    /// Bearer token for the whitelist API
    /// Env: WHITELIST_API_TOKEN (default: empty)
    pub api_token: String,

    /// Maximum player names one owner may bind
    /// Env: MAX_BIND (default: 3)
    pub max_bind: usize,

    /// Minecraft server address for status lookups, e.g. "mc.example.com:25565"
    /// Env: SERVER_ADDRESS (optional)
    pub server_address: Option<String>,

    /// Display name of the server for status output
    /// Env: SERVER_NAME (optional)
    pub server_name: Option<String>,

    /// Directory for the player list, ledgers and downloaded artifacts
    /// Env: DATA_DIR (default: "data")
    pub data_dir: PathBuf,

    /// Per-attempt HTTP timeout in seconds
    /// Env: REQUEST_TIMEOUT_SECS (default: 10)
    pub request_timeout: Duration,

    /// Retries after the first failed attempt
    /// Env: HTTP_RETRIES (default: 2)
    pub retries: u32,

    /// Base backoff delay in milliseconds
    /// Env: RETRY_BASE_DELAY_MS (default: 500)
    pub retry_base_delay: Duration,

    /// Exponential backoff multiplier
    /// Env: RETRY_BACKOFF_FACTOR (default: 2.0)
    pub backoff_factor: f64,

    /// Lower bound of the per-index stagger delay in milliseconds
    /// Env: STAGGER_DELAY_MIN_MS (default: 120)
    pub stagger_delay_min: Duration,

    /// Upper bound of the per-index stagger delay in milliseconds
    /// Env: STAGGER_DELAY_MAX_MS (default: 500)
    pub stagger_delay_max: Duration,

    /// Head render size in pixels
    /// Env: AVATAR_SIZE (default: 64)
    pub avatar_size: u32,

    /// Base URL of the avatar/skin render service
    /// Env: RENDER_BASE_URL (default: "https://crafatar.com")
    pub render_base_url: String,

    /// Base URL of the Java edition status lookup service
    /// Env: STATUS_BASE_URL (default: "https://api.mcstatus.io/v2/status/java")
    pub status_base_url: String,

    /// Decorative background image endpoint
    /// Env: BACKGROUND_URL (default: "https://t.alcy.cc/moe")
    pub background_url: String,

    /// Seconds between background image refreshes
    /// Env: BACKGROUND_REFRESH_SECS (default: 3600)
    pub background_refresh: Duration,

    /// Discord API Token
    /// Env: DISCORD_TOKEN (optional, check at runtime, if doesn't exist, panic)
    pub discord_token: Option<String>,

    /// Discord Command Prefix
    /// Env: DISCORD_COMMAND_PREFIX (default: "!")
    pub discord_command_prefix: String,
}

impl Config {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        let _ = dotenv(); //for debugging mostly
        Self {
            api_base_url: env_or_default_string("WHITELIST_API_URL", "http://127.0.0.1:6626"),
            api_token: env_or_default_string("WHITELIST_API_TOKEN", ""),
            max_bind: env_or_default("MAX_BIND", 3),
            server_address: var("SERVER_ADDRESS").ok(),
            server_name: var("SERVER_NAME").ok(),
            data_dir: PathBuf::from(env_or_default_string("DATA_DIR", "data")),
            request_timeout: Duration::from_secs(env_or_default("REQUEST_TIMEOUT_SECS", 10)),
            retries: env_or_default("HTTP_RETRIES", 2),
            retry_base_delay: Duration::from_millis(env_or_default("RETRY_BASE_DELAY_MS", 500)),
            backoff_factor: env_or_default("RETRY_BACKOFF_FACTOR", 2.0),
            stagger_delay_min: Duration::from_millis(env_or_default("STAGGER_DELAY_MIN_MS", 120)),
            stagger_delay_max: Duration::from_millis(env_or_default("STAGGER_DELAY_MAX_MS", 500)),
            avatar_size: env_or_default("AVATAR_SIZE", 64),
            render_base_url: env_or_default_string("RENDER_BASE_URL", "https://crafatar.com"),
            status_base_url: env_or_default_string(
                "STATUS_BASE_URL",
                "https://api.mcstatus.io/v2/status/java",
            ),
            background_url: env_or_default_string("BACKGROUND_URL", "https://t.alcy.cc/moe"),
            background_refresh: Duration::from_secs(env_or_default(
                "BACKGROUND_REFRESH_SECS",
                3600,
            )),
            discord_token: var("DISCORD_TOKEN")
                .expect("DISCORD_TOKEN environment variable is required")
                .into(),
            discord_command_prefix: env_or_default_string("DISCORD_COMMAND_PREFIX", "!"),
        }
    }

    /// Create configuration with all default values
    pub fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:6626".to_string(),
            api_token: String::new(),
            max_bind: 3,
            server_address: None,
            server_name: None,
            data_dir: PathBuf::from("data"),
            request_timeout: Duration::from_secs(10),
            retries: 2,
            retry_base_delay: Duration::from_millis(500),
            backoff_factor: 2.0,
            stagger_delay_min: Duration::from_millis(120),
            stagger_delay_max: Duration::from_millis(500),
            avatar_size: 64,
            render_base_url: "https://crafatar.com".to_string(),
            status_base_url: "https://api.mcstatus.io/v2/status/java".to_string(),
            background_url: "https://t.alcy.cc/moe".to_string(),
            background_refresh: Duration::from_secs(3600),
            discord_token: None,
            discord_command_prefix: "!".to_string(),
        }
    }

    /// Path of the persisted owner -> players file
    pub fn list_path(&self) -> PathBuf {
        self.data_dir.join("list.json")
    }

    /// Path of the decorative background image
    pub fn background_path(&self) -> PathBuf {
        self.data_dir.join("background.jpg")
    }
}

/// Parse environment variable or return default value
fn env_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    var(key)
        .ok()
        .and_then(|val| val.parse().ok())
        .unwrap_or(default)
}

/// Parse environment variable string or return default value
fn env_or_default_string(key: &str, default: &str) -> String {
    var(key).unwrap_or_else(|_| default.to_string())
}
