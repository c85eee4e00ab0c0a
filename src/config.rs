// ABOUTME: Loads the runtime TOML configuration for the companion (not the user settings record).
// ABOUTME: Provides defaults for the app data location, the SC:R web API client, and the initial port.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::DynError;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub scr_api: ScrApiConfig,
    #[serde(default)]
    pub companion: CompanionConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Overrides the platform app data directory that holds settings.json.
    #[serde(default)]
    pub app_data_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrApiConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompanionConfig {
    /// Web server port to assume at startup, before SC:R reports one.
    #[serde(default)]
    pub port: Option<u16>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_cache_ttl_secs() -> u64 {
    cwal_scr::DEFAULT_TTL.as_secs()
}

fn default_request_timeout_secs() -> u64 {
    5
}

impl Default for ScrApiConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            cache_ttl_secs: default_cache_ttl_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ScrApiConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Config {
    /// Load configuration from the standard config file location.
    /// Falls back to defaults if the file doesn't exist.
    pub fn load() -> Result<Self, DynError> {
        let config_path = Self::config_file_path();
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let contents = std::fs::read_to_string(&config_path)?;
        let config = Self::load_from_str(&contents)?;
        tracing::info!("Configuration loaded from {}", config_path.display());
        Ok(config)
    }

    fn load_from_str(contents: &str) -> Result<Self, DynError> {
        Ok(toml::from_str(contents)?)
    }

    fn config_file_path() -> PathBuf {
        let xdg_config = std::env::var("XDG_CONFIG_HOME")
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "~".to_string());
                format!("{home}/.config")
            });
        Path::new(&xdg_config).join("cwal").join("config.toml")
    }

    /// App data directory override, respecting the CWAL_APP_DATA_DIR env var.
    pub fn app_data_dir(&self) -> Option<PathBuf> {
        Self::pick_app_data_dir(std::env::var("CWAL_APP_DATA_DIR").ok(), self.paths.app_data_dir.as_deref())
    }

    /// Port to start with, respecting the CWAL_SCR_PORT env var.
    pub fn initial_port(&self) -> Option<u16> {
        Self::pick_port(std::env::var("CWAL_SCR_PORT").ok(), self.companion.port)
    }

    fn pick_app_data_dir(env: Option<String>, configured: Option<&str>) -> Option<PathBuf> {
        env.filter(|v| !v.is_empty())
            .or_else(|| configured.filter(|v| !v.is_empty()).map(str::to_string))
            .map(PathBuf::from)
    }

    fn pick_port(env: Option<String>, configured: Option<u16>) -> Option<u16> {
        match env {
            Some(raw) => match raw.trim().parse() {
                Ok(port) => Some(port),
                Err(e) => {
                    tracing::warn!("Ignoring CWAL_SCR_PORT={raw:?}: {e}");
                    configured
                }
            },
            None => configured,
        }
    }
}
