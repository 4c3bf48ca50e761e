/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::config
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Load the operator configuration (paths, probe timeouts,
    Flatpak remote, GitHub feed, fatal component list) from an
    optional TOML file layered over built-in defaults.

  Security / Safety Notes:
    Configuration is read-only; nothing here touches the system.

  Dependencies:
    serde + toml for parsing, dirs for XDG locations.

  Operational Scope:
    Built once in `main` and passed by reference to the run
    loop and backends.

  Revision History:
    2026-10-17 COD  Introduced Syn-Play configuration layer.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Explicit defaults, no ambient globals
    - Missing file is not an error; malformed file is fatal
============================================================*/

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Result, SynplayError};

const APP_DIR: &str = "syn-play";

/// Top-level configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SynplayConfig {
    pub core: CoreConfig,
    pub probe: ProbeConfig,
    pub github: GithubConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub log_dir: Option<PathBuf>,
    pub state_path: Option<PathBuf>,
    /// Where release tarballs (GE-Proton) are unpacked.
    pub compat_tools_dir: Option<PathBuf>,
    /// Components whose failure halts the whole run.
    pub fatal_components: Vec<String>,
    /// Do not refresh apt package lists before probing.
    pub skip_update: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub timeout_secs: u64,
    pub install_timeout_secs: u64,
    pub download_timeout_secs: u64,
    pub flatpak_remote: String,
    pub flatpak_remote_url: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            install_timeout_secs: 300,
            download_timeout_secs: 600,
            flatpak_remote: "flathub".into(),
            flatpak_remote_url: "https://flathub.org/repo/flathub.flatpakrepo".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_base: String,
    pub user_agent: String,
    pub max_retries: usize,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.github.com".into(),
            user_agent: "Syn-Play-Core/0.3 (linux)".into(),
            max_retries: 3,
        }
    }
}

impl SynplayConfig {
    /// Load from `path` if given, else from the default location if it
    /// exists, else fall back to defaults.
    pub fn load_from_optional_path(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(explicit) => Self::load(explicit),
            None => match default_config_path() {
                Some(candidate) if candidate.is_file() => Self::load(&candidate),
                _ => Ok(Self::default()),
            },
        }
    }

    fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| {
            SynplayError::Config(format!("Cannot read config {}: {err}", path.display()))
        })?;
        Self::parse(&raw)
            .map_err(|err| SynplayError::Config(format!("{}: {err}", path.display())))
    }

    pub fn parse(raw: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.core
            .log_dir
            .clone()
            .unwrap_or_else(|| data_dir().join("logs"))
    }

    pub fn state_path(&self) -> PathBuf {
        self.core
            .state_path
            .clone()
            .unwrap_or_else(|| data_dir().join("installation_state.json"))
    }

    /// Steam compatibility tools directory of the user owning `home`.
    pub fn compat_tools_dir(&self, home: &Path) -> PathBuf {
        self.core.compat_tools_dir.clone().unwrap_or_else(|| {
            home.join(".steam")
                .join("root")
                .join("compatibilitytools.d")
        })
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.timeout_secs.max(1))
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.install_timeout_secs.max(1))
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.probe.download_timeout_secs.max(1))
    }

    pub fn is_fatal(&self, component: &str) -> bool {
        self.core.fatal_components.iter().any(|c| c == component)
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(APP_DIR)
}
