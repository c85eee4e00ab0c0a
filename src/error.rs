// ABOUTME: Failures the settings layer can hit while resolving, reading, parsing, or writing.
// ABOUTME: All of these are recovered inside the store; they exist for logging and tests.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not resolve {what}: {reason}")]
    PathResolution { what: &'static str, reason: String },

    #[error("failed to read settings file {}: {source}", path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {} is not valid: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode settings: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("failed to write settings file {}: {source}", path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
