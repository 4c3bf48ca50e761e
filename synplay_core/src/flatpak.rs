/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::flatpak
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Query and install Flatpak applications from the configured
    remote (Flathub by default).

  Security / Safety Notes:
    Adds the remote with --if-not-exists only; never removes
    or reorders existing remotes. The remote is registered
    before any query so an unknown remote is never mistaken
    for an unknown app.

  Dependencies:
    crate::command for bounded execution.

  Operational Scope:
    Backs every Flatpak component in the catalog.

  Revision History:
    2026-10-17 COD  Authored Flatpak integration.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Not-installed is a result, not an error
    - Structured parsing with clear failure modes
============================================================*/

use std::time::Duration;

use crate::command::{capture, run_checked, stdout_utf8};
use crate::config::ProbeConfig;
use crate::error::{Result, SynplayError};

/// Installed version of `app_id`; `None` when the app is absent.
pub async fn installed_version(app_id: &str, limit: Duration) -> Result<Option<String>> {
    let output = capture("flatpak", &["info", app_id], limit).await?;
    if !output.status.success() {
        return Ok(None);
    }
    let stdout = stdout_utf8("flatpak", output)?;
    // Apps without a Version key are still installed.
    Ok(Some(
        parse_version_field(&stdout).unwrap_or_else(|| "installed".to_string()),
    ))
}

/// Version advertised by the remote for `app_id`.
pub async fn remote_version(
    app_id: &str,
    config: &ProbeConfig,
    limit: Duration,
) -> Result<Option<String>> {
    let output = capture(
        "flatpak",
        &["remote-info", config.flatpak_remote.as_str(), app_id],
        limit,
    )
    .await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // A missing ref is an answer; anything else (no network, no remote) is not.
        if is_missing_ref(&stderr) {
            return Ok(None);
        }
        return Err(SynplayError::CommandFailure {
            command: format!("flatpak remote-info {} {app_id}", config.flatpak_remote),
            status: output.status.code().unwrap_or(-1),
            stderr: stderr.trim().to_string(),
        });
    }
    let stdout = stdout_utf8("flatpak", output)?;
    Ok(parse_version_field(&stdout))
}

/// Register the configured remote unless it already exists.
pub async fn add_remote(config: &ProbeConfig, limit: Duration) -> Result<()> {
    run_checked(
        "flatpak",
        &[
            "remote-add",
            "--if-not-exists",
            config.flatpak_remote.as_str(),
            config.flatpak_remote_url.as_str(),
        ],
        limit,
    )
    .await?;
    Ok(())
}

/// Install `app_id` from the configured remote.
pub async fn install(app_id: &str, config: &ProbeConfig, limit: Duration) -> Result<()> {
    run_checked(
        "flatpak",
        &[
            "install",
            "-y",
            "--noninteractive",
            config.flatpak_remote.as_str(),
            app_id,
        ],
        limit,
    )
    .await?;
    Ok(())
}

/// `remote-info` failed because the app ref does not exist, as opposed to
/// the remote itself being unknown.
fn is_missing_ref(stderr: &str) -> bool {
    let messages: Vec<String> = stderr
        .lines()
        .map(|line| {
            let line = line.trim().to_lowercase();
            line.strip_prefix("error:")
                .map(|rest| rest.trim().to_string())
                .unwrap_or(line)
        })
        .collect();

    if messages
        .iter()
        .any(|message| message.starts_with("remote ") && message.contains("not found"))
    {
        return false;
    }
    messages.iter().any(|message| {
        ["nothing matches", "no entry for", "no remote refs found"]
            .iter()
            .any(|prefix| message.starts_with(prefix))
    })
}

fn parse_version_field(stdout: &str) -> Option<String> {
    stdout.lines().find_map(|line| {
        let (key, value) = line.split_once(':')?;
        let value = value.trim();
        (key.trim() == "Version" && !value.is_empty()).then(|| value.to_string())
    })
}
