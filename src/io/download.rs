//! Streaming HTTP downloads.

use std::path::{Path, PathBuf};

use futures::StreamExt;
use reqwest::Client;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to download '{url}': status {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
}

/// Stream `url` into `out_path`.
pub async fn download_file(client: &Client, url: &str, out_path: &Path) -> Result<(), DownloadError> {
    tracing::info!(url, out = %out_path.display(), "downloading");

    let response = client
        .get(url)
        .header(reqwest::header::USER_AGENT, crate::USER_AGENT)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(DownloadError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let mut file = tokio::fs::File::create(out_path).await?;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        file.write_all(&chunk?).await?;
    }
    file.flush().await?;
    Ok(())
}

/// Download a GitHub release asset into `out_dir`, keeping the asset name.
///
/// Without a version the repository's latest release is used.
pub async fn download_github_release(
    client: &Client,
    repo: &str,
    asset: &str,
    version: Option<&str>,
    out_dir: &Path,
) -> Result<PathBuf, DownloadError> {
    let url = match version {
        Some(version) => {
            format!("https://github.com/{repo}/releases/download/{version}/{asset}")
        }
        None => format!("https://github.com/{repo}/releases/latest/download/{asset}"),
    };
    let out_path = out_dir.join(asset);
    download_file(client, &url, &out_path).await?;
    Ok(out_path)
}
