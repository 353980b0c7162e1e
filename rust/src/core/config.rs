use std::path::Path;

use serde::Deserialize;

use super::AppCore;

const DEFAULT_API_URL: &str = "http://localhost:8080";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(super) struct AppConfig {
    pub(super) api_url: Option<String>,
    pub(super) socket_url: Option<String>,
    pub(super) disable_network: Option<bool>,
}

pub(super) fn load_app_config(data_dir: &str) -> AppConfig {
    let path = Path::new(data_dir).join("huddle_config.json");
    let Ok(bytes) = std::fs::read(&path) else {
        return AppConfig::default();
    };
    serde_json::from_slice::<AppConfig>(&bytes).unwrap_or_default()
}

impl AppCore {
    pub(super) fn network_enabled(&self) -> bool {
        // Used to keep tests deterministic and offline.
        if let Some(disable) = self.config.disable_network {
            return !disable;
        }
        std::env::var("HUDDLE_DISABLE_NETWORK").ok().as_deref() != Some("1")
    }

    pub(super) fn api_url(&self) -> String {
        self.config
            .api_url
            .as_ref()
            .map(|u| u.trim_end_matches('/').to_string())
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_API_URL.to_string())
    }

    /// Explicit socket URL, or the API origin with the scheme swapped to ws.
    pub(super) fn socket_url(&self) -> String {
        if let Some(url) = self
            .config
            .socket_url
            .as_ref()
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
        {
            return url;
        }
        let api = self.api_url();
        if let Some(rest) = api.strip_prefix("https://") {
            format!("wss://{rest}")
        } else if let Some(rest) = api.strip_prefix("http://") {
            format!("ws://{rest}")
        } else {
            api
        }
    }
}
