use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_CONFIG_PATH: &str = "config/client.json";
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_SOCKET_URL: &str = "http://localhost:5000";
pub const DEFAULT_SESSION_DB: &str = "data/session.db";

pub const API_URL_ENV: &str = "VITE_API_URL";
pub const SOCKET_URL_ENV: &str = "VITE_SOCKET_URL";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: String,
    pub socket_url: String,
    pub session_db: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            socket_url: DEFAULT_SOCKET_URL.to_string(),
            session_db: PathBuf::from(DEFAULT_SESSION_DB),
        }
    }
}

impl AppConfig {
    /// Applies explicit overrides (CLI flags, then environment) on top of the file values.
    pub fn with_overrides(mut self, api_url: Option<String>, socket_url: Option<String>) -> Self {
        if let Some(api_url) = api_url.filter(|url| !url.trim().is_empty()) {
            self.api_url = api_url;
        }
        if let Some(socket_url) = socket_url.filter(|url| !url.trim().is_empty()) {
            self.socket_url = socket_url;
        }
        self.api_url = self.api_url.trim_end_matches('/').to_string();
        self.socket_url = self.socket_url.trim_end_matches('/').to_string();
        self
    }
}

/// Missing or malformed files fall back to defaults.
pub fn load_config(path: &str) -> AppConfig {
    let path = Path::new(path);
    match fs::read_to_string(path) {
        Ok(content) => match serde_json::from_str::<AppConfig>(&content) {
            Ok(config) => config,
            Err(err) => {
                log::warn!("Failed to parse config file {}: {err}", path.display());
                AppConfig::default()
            }
        },
        Err(err) => {
            log::info!(
                "Config file {} not found ({err}); using defaults",
                path.display()
            );
            AppConfig::default()
        }
    }
}
