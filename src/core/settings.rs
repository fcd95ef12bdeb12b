use serde::{Deserialize, Serialize};

/// Json struct for service settings
#[derive(Serialize, Deserialize, Clone)]
pub struct Settings {
    /// Path to the sqlite database file
    pub db_file: String,

    /// Port for the HTTP/WebSocket API, defaults to 28015
    pub web_port: Option<u16>,

    /// Base URL of the external match-statistics API
    pub stats_api_url: String,

    /// API key passed to the match-statistics API
    pub stats_api_key: Option<String>,

    /// Seconds between scheduled league sync runs, defaults to 300
    pub sync_interval_seconds: Option<u64>,

    /// Discord bot token. If unset, the bot is not started.
    pub discord_token: Option<String>,

    /// Guild to register bot commands in. If unset, commands are global.
    pub discord_guild_id: Option<u64>,

    /// External account ids that get admin rights on login
    pub admin_external_ids: Option<Vec<String>>,
}

impl Settings {
    pub fn load(path: &std::path::Path) -> anyhow::Result<Settings> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }
}
