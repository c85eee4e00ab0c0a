// ABOUTME: Downloads replays and maps into the folders configured in the settings record.
// ABOUTME: Streams into a .part file and renames it into place once the body is complete.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use futures_util::StreamExt;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::settings::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadKind {
    Replay,
    Map,
}

impl DownloadKind {
    /// Folder the settings record assigns to this kind of file.
    pub fn destination(self, settings: &Settings) -> PathBuf {
        match self {
            DownloadKind::Replay => PathBuf::from(&settings.replay_download_path),
            DownloadKind::Map => PathBuf::from(&settings.map_download_path),
        }
    }
}

impl FromStr for DownloadKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "replay" => Ok(DownloadKind::Replay),
            "map" => Ok(DownloadKind::Map),
            other => Err(format!("Unknown download kind: {other} (expected replay or map)")),
        }
    }
}

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid file name {0:?}")]
    InvalidFileName(String),

    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("download failed with status {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("could not write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Only a bare file name may be written, never a path that escapes the destination.
fn checked_file_name(file_name: &str) -> Result<&str, DownloadError> {
    let invalid = file_name.is_empty()
        || file_name == "."
        || file_name == ".."
        || file_name.contains(['/', '\\'])
        || file_name.contains('\0');
    if invalid {
        return Err(DownloadError::InvalidFileName(file_name.to_string()));
    }
    Ok(file_name)
}

/// Fetch `url` into `destination/file_name`, returning the final path.
/// On failure nothing is left behind in `destination`.
pub async fn download_file(
    client: &reqwest::Client,
    url: &str,
    destination: &Path,
    file_name: &str,
) -> Result<PathBuf, DownloadError> {
    let file_name = checked_file_name(file_name)?;

    tokio::fs::create_dir_all(destination)
        .await
        .map_err(io_error(destination))?;

    tracing::info!("Downloading {file_name} from {url}");
    let response = client.get(url).send().await.map_err(http_error(url))?;
    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }

    let dest_path = destination.join(file_name);
    let tmp_path = destination.join(format!("{file_name}.part"));
    match write_body(response, url, &tmp_path, &dest_path).await {
        Ok(downloaded) => {
            tracing::info!("Saved {} ({downloaded} bytes)", dest_path.display());
            Ok(dest_path)
        }
        Err(e) => {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp_path).await {
                if cleanup.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!("Failed to remove {}: {cleanup}", tmp_path.display());
                }
            }
            Err(e)
        }
    }
}

/// Stream the body into `tmp_path`, then move it to `dest_path`. Returns the byte count.
async fn write_body(
    response: reqwest::Response,
    url: &str,
    tmp_path: &Path,
    dest_path: &Path,
) -> Result<u64, DownloadError> {
    let mut file = tokio::fs::File::create(tmp_path)
        .await
        .map_err(io_error(tmp_path))?;
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(http_error(url))?;
        file.write_all(&chunk).await.map_err(io_error(tmp_path))?;
        downloaded += chunk.len() as u64;
    }

    file.flush().await.map_err(io_error(tmp_path))?;
    drop(file);
    tokio::fs::rename(tmp_path, dest_path)
        .await
        .map_err(io_error(dest_path))?;
    Ok(downloaded)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> DownloadError {
    let path = path.to_path_buf();
    move |source| DownloadError::Io { path, source }
}

fn http_error(url: &str) -> impl FnOnce(reqwest::Error) -> DownloadError {
    let url = url.to_string();
    move |source| DownloadError::Http { url, source }
}
