/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::github
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Query the GitHub releases API for direct-download
    components (GE-Proton) and unpack the release tarball into
    the Steam compatibility tools directory.

  Security / Safety Notes:
    Performs read-only HTTPS requests; no credentials are sent.
    Tarballs are unpacked by `tar` into an operator-controlled
    directory only.

  Dependencies:
    reqwest for HTTP, serde for response parsing.

  Operational Scope:
    Supplies available versions and performs installs for
    release-backed components.

  Revision History:
    2026-10-17 COD  Adapted release client from the AUR client.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Retry with exponential backoff on server errors
    - Structured response parsing with explicit error paths
    - Configurable timeouts
============================================================*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::time::sleep;
use urlencoding::encode;

use crate::command::run_checked;
use crate::config::GithubConfig;
use crate::error::{Result, SynplayError};
use crate::version::compare_versions;

/// Client for the GitHub releases API.
#[derive(Clone)]
pub struct ReleaseClient {
    client: reqwest::Client,
    base_url: String,
    max_retries: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Release {
    pub tag_name: String,
    #[serde(default)]
    pub assets: Vec<ReleaseAsset>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseAsset {
    pub name: String,
    pub browser_download_url: String,
    #[serde(default)]
    pub size: Option<u64>,
}

impl ReleaseClient {
    pub fn new(config: &GithubConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|err| SynplayError::Network(format!("Failed to build HTTP client: {err}")))?;

        Ok(Self {
            client,
            base_url: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries.max(1),
        })
    }

    /// Shared HTTP client, also used for apt repository files.
    pub fn http(&self) -> &reqwest::Client {
        &self.client
    }

    fn compose_url(&self, owner: &str, repo: &str) -> String {
        format!(
            "{}/repos/{}/{}/releases/latest",
            self.base_url,
            encode(owner),
            encode(repo)
        )
    }

    /// Latest published release; `None` when the repository has none.
    pub async fn latest_release(&self, owner: &str, repo: &str) -> Result<Option<Release>> {
        let url = self.compose_url(owner, repo);
        let mut attempt = 0;
        loop {
            let response = self
                .client
                .get(&url)
                .header("Accept", "application/vnd.github+json")
                .send()
                .await
                .map_err(|err| {
                    SynplayError::Network(format!("Release request to {url} failed: {err}"))
                })?;

            match response.status() {
                StatusCode::OK => {
                    let release = response.json::<Release>().await.map_err(|err| {
                        SynplayError::Serialization(format!(
                            "Failed to decode release from {url}: {err}"
                        ))
                    })?;
                    return Ok(Some(release));
                }
                StatusCode::NOT_FOUND => return Ok(None),
                status if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS => {
                    attempt += 1;
                    if attempt >= self.max_retries {
                        return Err(SynplayError::Network(format!(
                            "Release request {url} failed with status {status} after {attempt} attempts"
                        )));
                    }
                    let exponent = (attempt as u32).min(8);
                    sleep(Duration::from_millis(200_u64.saturating_mul(1_u64 << exponent))).await;
                }
                status => {
                    return Err(SynplayError::Network(format!(
                        "Release request {url} failed with status {status}"
                    )))
                }
            }
        }
    }

    /// Download `asset` into `scratch` and unpack it into `target`.
    pub async fn install_asset(
        &self,
        asset: &ReleaseAsset,
        scratch: &Path,
        target: &Path,
        limit: Duration,
    ) -> Result<PathBuf> {
        tokio::fs::create_dir_all(target).await.map_err(|err| {
            SynplayError::Filesystem(format!("Failed to create {}: {err}", target.display()))
        })?;

        let archive = scratch.join(&asset.name);
        let response = self
            .client
            .get(&asset.browser_download_url)
            .timeout(limit)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|err| {
                SynplayError::Network(format!("Download of {} failed: {err}", asset.name))
            })?;
        let bytes = response.bytes().await.map_err(|err| {
            SynplayError::Network(format!("Download of {} interrupted: {err}", asset.name))
        })?;
        if let Some(expected) = asset.size {
            if bytes.len() as u64 != expected {
                return Err(SynplayError::Network(format!(
                    "Download of {} truncated: {} of {expected} bytes",
                    asset.name,
                    bytes.len()
                )));
            }
        }
        tokio::fs::write(&archive, &bytes).await.map_err(|err| {
            SynplayError::Filesystem(format!("Failed to write {}: {err}", archive.display()))
        })?;

        let archive_arg = archive.to_string_lossy().into_owned();
        let target_arg = target.to_string_lossy().into_owned();
        let unpacked = run_checked(
            "tar",
            &["-xzf", archive_arg.as_str(), "-C", target_arg.as_str()],
            limit,
        )
        .await;
        let _ = tokio::fs::remove_file(&archive).await;
        unpacked?;
        Ok(target.to_path_buf())
    }
}

/// First tarball asset with the wanted suffix, skipping checksum files.
pub fn select_asset<'a>(release: &'a Release, suffix: &str) -> Option<&'a ReleaseAsset> {
    release
        .assets
        .iter()
        .find(|asset| asset.name.ends_with(suffix) && !asset.name.contains("sha512sum"))
}

/// Strip a release naming prefix so tags compare numerically
/// (`GE-Proton9-20` → `9-20`).
pub fn normalize_tag(tag: &str, prefix: &str) -> String {
    tag.strip_prefix(prefix).unwrap_or(tag).to_string()
}

/// Highest installed release under `dir` whose directory name starts with
/// `prefix`, normalized like [`normalize_tag`].
pub fn installed_release(dir: &Path, prefix: &str) -> Result<Option<String>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(SynplayError::Filesystem(format!(
                "Failed to list {}: {err}",
                dir.display()
            )))
        }
    };

    let mut best: Option<String> = None;
    for entry in entries.flatten() {
        if !entry.path().is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(prefix) {
            continue;
        }
        let version = normalize_tag(&name, prefix);
        best = match best {
            Some(current)
                if compare_versions(&current, &version) != Some(std::cmp::Ordering::Less) =>
            {
                Some(current)
            }
            _ => Some(version),
        };
    }
    Ok(best)
}
