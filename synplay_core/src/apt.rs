/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::apt
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Interface with dpkg/apt utilities: installed versions via
    dpkg-query, candidate versions via apt-cache policy, source
    setup (PPAs, signed third-party repositories, the i386
    architecture), and installs via apt-get.

  Security / Safety Notes:
    Source setup and installs require root; the caller enforces
    this before the run loop starts. Repository keys land in
    /etc/apt/keyrings and are referenced by `Signed-By`.

  Dependencies:
    crate::command for bounded execution, reqwest for key and
    sources downloads.

  Operational Scope:
    Backs every apt, PPA, and repository component in the
    catalog.

  Revision History:
    2026-10-17 COD  Crafted apt integration layer.
    2026-10-17 COD  Added source setup ahead of probing.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic command invocation with explicit checks
    - Structured parsing with clear failure modes
============================================================*/

use std::path::Path;
use std::time::Duration;

use crate::command::{capture, run_checked, stdout_utf8};
use crate::error::{Result, SynplayError};

/// A signed third-party apt repository published as a deb822 `.sources`
/// file. `{distro}` and `{codename}` in `sources_url` are filled in from
/// the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AptRepository {
    pub name: &'static str,
    pub key_url: &'static str,
    pub keyring: &'static str,
    pub sources_url: &'static str,
    /// Packages from this repository pull in i386 dependencies.
    pub multiarch: bool,
}

impl AptRepository {
    pub fn sources_url_for(&self, distro: &str, codename: &str) -> String {
        self.sources_url
            .replace("{distro}", distro)
            .replace("{codename}", codename)
    }

    pub fn sources_file_for(&self, distro: &str, codename: &str) -> String {
        let url = self.sources_url_for(distro, codename);
        url.rsplit('/').next().unwrap_or(self.name).to_string()
    }
}

pub const WINEHQ: AptRepository = AptRepository {
    name: "winehq",
    key_url: "https://dl.winehq.org/wine-builds/winehq.key",
    keyring: "winehq-archive.key",
    sources_url: "https://dl.winehq.org/wine-builds/{distro}/dists/{codename}/winehq-{codename}.sources",
    multiarch: true,
};

/// Installed version of `package`, `None` when dpkg does not know it or it
/// is not in the `install ok installed` state.
pub async fn installed_version(package: &str, limit: Duration) -> Result<Option<String>> {
    let output = capture(
        "dpkg-query",
        &["-W", "-f=${Status}\t${Version}", package],
        limit,
    )
    .await?;

    // dpkg-query exits 1 for packages it has never seen.
    if !output.status.success() {
        return Ok(None);
    }
    let stdout = stdout_utf8("dpkg-query", output)?;
    Ok(parse_dpkg_status(&stdout))
}

/// Candidate version apt would install for `package`.
pub async fn candidate_version(package: &str, limit: Duration) -> Result<Option<String>> {
    let stdout = run_checked("apt-cache", &["policy", package], limit).await?;
    Ok(parse_policy_candidate(&stdout))
}

/// Install `packages` with apt-get.
pub async fn install(packages: &[&str], recommends: bool, limit: Duration) -> Result<()> {
    let mut args = vec!["install", "-y"];
    if recommends {
        args.push("--install-recommends");
    }
    args.extend_from_slice(packages);
    run_checked("apt-get", &args, limit).await?;
    Ok(())
}

/// Refresh package lists.
pub async fn update(limit: Duration) -> Result<()> {
    run_checked("apt-get", &["update"], limit).await?;
    Ok(())
}

/// Enable a Launchpad PPA. The caller refreshes package lists afterwards.
pub async fn add_ppa(ppa: &str, limit: Duration) -> Result<()> {
    if installed_version("software-properties-common", limit)
        .await?
        .is_none()
    {
        install(&["software-properties-common"], false, limit).await?;
    }
    run_checked("add-apt-repository", &["-y", ppa], limit).await?;
    Ok(())
}

/// Register the i386 foreign architecture unless it already is. Returns
/// whether anything changed, in which case package lists are stale.
pub async fn enable_i386(limit: Duration) -> Result<bool> {
    let foreign = run_checked("dpkg", &["--print-foreign-architectures"], limit).await?;
    if foreign.split_whitespace().any(|arch| arch == "i386") {
        return Ok(false);
    }
    run_checked("dpkg", &["--add-architecture", "i386"], limit).await?;
    Ok(true)
}

/// Fetch the signing key and `.sources` file of `repo` into `etc_apt`
/// (normally `/etc/apt`). The caller refreshes package lists afterwards.
pub async fn add_repository(
    client: &reqwest::Client,
    repo: &AptRepository,
    distro: &str,
    codename: &str,
    etc_apt: &Path,
    limit: Duration,
) -> Result<()> {
    let keyrings = etc_apt.join("keyrings");
    let sources = etc_apt.join("sources.list.d");
    for dir in [&keyrings, &sources] {
        tokio::fs::create_dir_all(dir).await.map_err(|err| {
            SynplayError::Filesystem(format!("Failed to create {}: {err}", dir.display()))
        })?;
    }

    let key = fetch(client, repo.key_url, limit).await?;
    write(&keyrings.join(repo.keyring), &key).await?;

    let url = repo.sources_url_for(distro, codename);
    let listing = fetch(client, &url, limit).await?;
    write(&sources.join(repo.sources_file_for(distro, codename)), &listing).await
}

/// True when any package names an `:i386` build.
pub fn needs_i386(packages: &[&str]) -> bool {
    packages.iter().any(|package| package.ends_with(":i386"))
}

async fn fetch(client: &reqwest::Client, url: &str, limit: Duration) -> Result<Vec<u8>> {
    let response = client
        .get(url)
        .timeout(limit)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|err| SynplayError::Network(format!("Fetching {url} failed: {err}")))?;
    let bytes = response
        .bytes()
        .await
        .map_err(|err| SynplayError::Network(format!("Fetching {url} interrupted: {err}")))?;
    Ok(bytes.to_vec())
}

async fn write(path: &Path, data: &[u8]) -> Result<()> {
    tokio::fs::write(path, data).await.map_err(|err| {
        SynplayError::Filesystem(format!("Failed to write {}: {err}", path.display()))
    })
}

fn parse_dpkg_status(stdout: &str) -> Option<String> {
    let (status, version) = stdout.trim().split_once('\t')?;
    let version = version.trim();
    if status.trim() == "install ok installed" && !version.is_empty() {
        Some(version.to_string())
    } else {
        None
    }
}

fn parse_policy_candidate(stdout: &str) -> Option<String> {
    stdout
        .lines()
        .filter_map(|line| line.trim().strip_prefix("Candidate:"))
        .map(str::trim)
        .find(|candidate| !candidate.is_empty())
        .filter(|candidate| *candidate != "(none)")
        .map(str::to_string)
}
