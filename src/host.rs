// ABOUTME: Host collaborators the settings store depends on: directory lookup and whole-file text I/O.
// ABOUTME: SystemHost backs them with the platform directories from `dirs` and tokio::fs.

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::SettingsError;

/// Directory name used under the platform data directory.
const APP_DIR_NAME: &str = "cwal";

/// Resolves the directories settings live in and default paths derive from.
pub trait PathResolver: Send + Sync {
    fn app_data_dir(&self) -> impl Future<Output = Result<PathBuf, SettingsError>> + Send;
    fn home_dir(&self) -> impl Future<Output = Result<PathBuf, SettingsError>> + Send;
}

/// Reads and writes whole text files.
pub trait TextFiles: Send + Sync {
    /// A missing file reads as empty text.
    fn read_text(&self, path: &Path) -> impl Future<Output = Result<String, SettingsError>> + Send;
    /// Replaces the file, creating parent directories as needed.
    fn write_text(&self, path: &Path, content: &str) -> impl Future<Output = Result<(), SettingsError>> + Send;
}

/// The real machine.
#[derive(Debug, Clone, Default)]
pub struct SystemHost {
    app_data_override: Option<PathBuf>,
}

impl SystemHost {
    pub fn new(app_data_override: Option<PathBuf>) -> Self {
        Self { app_data_override }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.app_data_dir())
    }
}

fn app_data_from(data_dir: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
    data_dir
        .map(|dir| dir.join(APP_DIR_NAME))
        .ok_or_else(|| SettingsError::PathResolution {
            what: "app data directory",
            reason: "platform data directory is unknown".to_string(),
        })
}

fn home_from(home: Option<PathBuf>) -> Result<PathBuf, SettingsError> {
    home.filter(|dir| !dir.as_os_str().is_empty())
        .ok_or_else(|| SettingsError::PathResolution {
            what: "home directory",
            reason: "no home directory for the current user".to_string(),
        })
}

impl PathResolver for SystemHost {
    async fn app_data_dir(&self) -> Result<PathBuf, SettingsError> {
        match &self.app_data_override {
            Some(dir) => Ok(dir.clone()),
            None => app_data_from(dirs::data_dir()),
        }
    }

    async fn home_dir(&self) -> Result<PathBuf, SettingsError> {
        home_from(dirs::home_dir())
    }
}

impl TextFiles for SystemHost {
    async fn read_text(&self, path: &Path) -> Result<String, SettingsError> {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No settings file at {}", path.display());
                Ok(String::new())
            }
            Err(source) => Err(SettingsError::FileRead {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    async fn write_text(&self, path: &Path, content: &str) -> Result<(), SettingsError> {
        let write_error = |source| SettingsError::FileWrite {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
        }
        tokio::fs::write(path, content).await.map_err(write_error)?;
        Ok(())
    }
}
