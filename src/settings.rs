// ABOUTME: The user settings record, its partial-update form, and default path computation.
// ABOUTME: Serialized as camelCase JSON in settings.json under the app data directory.

use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// File name of the persisted record inside the app data directory.
pub const SETTINGS_FILE_NAME: &str = "settings.json";

const PRODUCT_DIR: &str = "CWAL";
const REPLAY_SUBPATH: &[&str] = &["Documents", "StarCraft", "Maps", "Replays", PRODUCT_DIR];
const MAP_SUBPATH: &[&str] = &["Documents", "StarCraft", "Maps", PRODUCT_DIR];

/// Used when the home directory cannot be determined.
pub const FALLBACK_REPLAY_PATH: &str = r"C:\Users\Documents\StarCraft\Maps\Replays\CWAL";
pub const FALLBACK_MAP_PATH: &str = r"C:\Users\Documents\StarCraft\Maps\CWAL";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub replay_download_path: String,
    pub map_download_path: String,
}

/// Any subset of settings fields. Unknown keys are ignored when parsing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay_download_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map_download_path: Option<String>,
}

impl Settings {
    /// Defaults rooted at the user's home directory.
    pub fn defaults_for_home(home: &Path) -> Self {
        Self {
            replay_download_path: join_lossy(home, REPLAY_SUBPATH),
            map_download_path: join_lossy(home, MAP_SUBPATH),
        }
    }

    /// Defaults for when no home directory is available.
    pub fn fallback_defaults() -> Self {
        Self {
            replay_download_path: FALLBACK_REPLAY_PATH.to_string(),
            map_download_path: FALLBACK_MAP_PATH.to_string(),
        }
    }

    #[cfg(test)]
    pub fn is_complete(&self) -> bool {
        !self.replay_download_path.is_empty() && !self.map_download_path.is_empty()
    }

    /// Overwrite every field the patch carries.
    pub fn merged(mut self, patch: SettingsPatch) -> Self {
        if let Some(path) = patch.replay_download_path {
            self.replay_download_path = path;
        }
        if let Some(path) = patch.map_download_path {
            self.map_download_path = path;
        }
        self
    }

    /// Parse persisted content and lay it over `defaults`.
    /// Missing, null, and blank fields keep the default value. Anything but a
    /// JSON object is rejected.
    pub fn from_json_over(defaults: Settings, content: &str) -> Result<Self, serde_json::Error> {
        let value: Value = serde_json::from_str(content)?;
        if !value.is_object() {
            return Err(serde::de::Error::custom("settings file must hold a JSON object"));
        }
        let patch: SettingsPatch = serde_json::from_value(value)?;
        Ok(defaults.merged(patch.without_blanks()))
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.replay_download_path.is_none() && self.map_download_path.is_none()
    }

    fn without_blanks(self) -> Self {
        let keep = |value: Option<String>| value.filter(|v| !v.trim().is_empty());
        Self {
            replay_download_path: keep(self.replay_download_path),
            map_download_path: keep(self.map_download_path),
        }
    }
}

fn join_lossy(base: &Path, parts: &[&str]) -> String {
    parts
        .iter()
        .fold(base.to_path_buf(), |path, part| path.join(part))
        .to_string_lossy()
        .into_owned()
}
