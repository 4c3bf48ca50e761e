/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::system
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    Detect the host: distribution family, WSL, desktop
    environment, virtualization, and GPU vendor.

  Security / Safety Notes:
    Reads /etc/os-release and /proc markers; runs lspci and
    systemd-detect-virt read-only.

  Dependencies:
    tokio::process for bounded command execution.

  Operational Scope:
    Feeds the session log header, component support checks,
    and the persisted state document.

  Revision History:
    2026-10-17 COD  Authored host detection.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Detection failures degrade to Unknown, never abort
    - Parsers are pure and unit-tested
============================================================*/

use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use serde::Serialize;
use tokio::process::Command;
use tokio::time::timeout;

use crate::logger::Logger;

const DETECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Debian-derived distribution families the installer knows about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DistroFamily {
    Debian,
    Ubuntu,
    Mint,
    Kali,
    PopOs,
    Elementary,
    Zorin,
    Unknown,
}

impl DistroFamily {
    /// Families that can consume Launchpad PPAs and Ubuntu-only packages.
    pub fn is_ubuntu_family(self) -> bool {
        matches!(
            self,
            DistroFamily::Ubuntu
                | DistroFamily::Mint
                | DistroFamily::PopOs
                | DistroFamily::Elementary
                | DistroFamily::Zorin
        )
    }
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DistroFamily::Debian => "debian",
            DistroFamily::Ubuntu => "ubuntu",
            DistroFamily::Mint => "mint",
            DistroFamily::Kali => "kali",
            DistroFamily::PopOs => "popos",
            DistroFamily::Elementary => "elementary",
            DistroFamily::Zorin => "zorin",
            DistroFamily::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Virtual,
    Unknown,
}

/// Snapshot of the host taken once at start.
#[derive(Debug, Clone, Serialize)]
pub struct SystemInfo {
    pub distro_name: String,
    pub distro_version: String,
    /// Release codename used by third-party apt repositories.
    pub codename: Option<String>,
    pub family: DistroFamily,
    pub desktop: String,
    pub is_wsl: bool,
    pub virtualization: Option<String>,
    pub gpu: GpuVendor,
}

impl SystemInfo {
    /// Placeholder used when detection is skipped.
    pub fn unknown() -> Self {
        Self {
            distro_name: "Unknown".into(),
            distro_version: "Unknown".into(),
            codename: None,
            family: DistroFamily::Unknown,
            desktop: "Unknown".into(),
            is_wsl: false,
            virtualization: None,
            gpu: GpuVendor::Unknown,
        }
    }
}

/// Probe the running host.
pub async fn detect(logger: &Logger) -> SystemInfo {
    let mut info = SystemInfo::unknown();

    match std::fs::read_to_string("/etc/os-release") {
        Ok(raw) => {
            let release = OsRelease::parse(&raw);
            info.family = release.family();
            info.codename = release.codename();
            info.distro_name = release.name.unwrap_or_else(|| "Unknown".into());
            info.distro_version = release.version_id.unwrap_or_else(|| "Unknown".into());
        }
        Err(err) => logger.warn("DETECT", format!("Cannot read /etc/os-release: {err}")),
    }

    info.is_wsl = Path::new("/proc/sys/fs/binfmt_misc/WSLInterop").exists();
    info.desktop = desktop_environment(
        std::env::var("DESKTOP_SESSION").ok().as_deref(),
        std::env::var("XDG_CURRENT_DESKTOP").ok().as_deref(),
    )
    .to_string();

    info.virtualization = capture("systemd-detect-virt", &[])
        .await
        .and_then(|out| classify_virt(&out));

    info.gpu = if info.virtualization.is_some() {
        GpuVendor::Virtual
    } else {
        capture("lspci", &[])
            .await
            .map(|out| classify_gpu(&out))
            .unwrap_or(GpuVendor::Unknown)
    };

    logger.info(
        "DETECT",
        format!(
            "distro={} {} family={} desktop={} wsl={} virt={} gpu={:?}",
            info.distro_name,
            info.distro_version,
            info.family,
            info.desktop,
            info.is_wsl,
            info.virtualization.as_deref().unwrap_or("none"),
            info.gpu
        ),
    );
    info
}

async fn capture(program: &str, args: &[&str]) -> Option<String> {
    let child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .output();
    let output = timeout(DETECT_TIMEOUT, child).await.ok()?.ok()?;
    // systemd-detect-virt exits 1 on bare metal but still prints "none".
    Some(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[derive(Debug, Default)]
struct OsRelease {
    id: String,
    id_like: String,
    name: Option<String>,
    version_id: Option<String>,
    version_codename: Option<String>,
    ubuntu_codename: Option<String>,
}

impl OsRelease {
    fn parse(raw: &str) -> Self {
        let mut release = OsRelease::default();
        for line in raw.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim().trim_matches('"');
            match key.trim() {
                "ID" => release.id = value.to_lowercase(),
                "ID_LIKE" => release.id_like = value.to_lowercase(),
                "NAME" => release.name = Some(value.to_string()),
                "VERSION_ID" => release.version_id = Some(value.to_string()),
                "VERSION_CODENAME" if !value.is_empty() => {
                    release.version_codename = Some(value.to_lowercase())
                }
                "UBUNTU_CODENAME" if !value.is_empty() => {
                    release.ubuntu_codename = Some(value.to_lowercase())
                }
                _ => {}
            }
        }
        release
    }

    /// Derivatives name their Ubuntu base in `UBUNTU_CODENAME`.
    fn codename(&self) -> Option<String> {
        self.ubuntu_codename
            .clone()
            .or_else(|| self.version_codename.clone())
    }

    fn family(&self) -> DistroFamily {
        let name = self.name.as_deref().unwrap_or_default().to_lowercase();
        let hit = |needle: &str| name.contains(needle) || self.id.contains(needle);

        if hit("mint") {
            DistroFamily::Mint
        } else if hit("kali") {
            DistroFamily::Kali
        } else if hit("pop") {
            DistroFamily::PopOs
        } else if hit("elementary") {
            DistroFamily::Elementary
        } else if hit("zorin") {
            DistroFamily::Zorin
        } else if hit("ubuntu") || self.id_like.contains("ubuntu") {
            DistroFamily::Ubuntu
        } else if hit("debian") || self.id_like.contains("debian") {
            DistroFamily::Debian
        } else {
            DistroFamily::Unknown
        }
    }
}

fn desktop_environment(session: Option<&str>, current: Option<&str>) -> &'static str {
    let raw = session
        .filter(|s| !s.is_empty())
        .or(current)
        .unwrap_or_default()
        .to_lowercase();

    if raw.contains("gnome") {
        "GNOME"
    } else if raw.contains("kde") || raw.contains("plasma") {
        "KDE Plasma"
    } else if raw.contains("xfce") {
        "XFCE"
    } else if raw.contains("cinnamon") {
        "Cinnamon"
    } else if raw.contains("mate") {
        "MATE"
    } else if raw.contains("pantheon") {
        "Pantheon"
    } else if raw.contains("lxde") || raw.contains("lxqt") {
        "LXDE/LXQt"
    } else if raw.contains("i3") || raw.contains("sway") {
        "Tiling WM"
    } else {
        "Unknown"
    }
}

fn classify_virt(raw: &str) -> Option<String> {
    let kind = raw.trim().to_lowercase();
    let label = match kind.as_str() {
        "" | "none" => return None,
        "vmware" => "VMware",
        "kvm" => "KVM",
        "qemu" => "QEMU",
        "oracle" | "virtualbox" => "VirtualBox",
        "microsoft" => "Hyper-V",
        "xen" => "Xen",
        "parallels" => "Parallels",
        "bochs" => "Bochs",
        other => return Some(other.to_string()),
    };
    Some(label.to_string())
}

fn classify_gpu(lspci: &str) -> GpuVendor {
    let display: String = lspci
        .lines()
        .map(str::to_lowercase)
        .filter(|line| line.contains("vga") || line.contains("3d") || line.contains("display"))
        .collect::<Vec<_>>()
        .join(" ");

    if ["vmware", "virtualbox", "qxl", "virtio", "svga3d"]
        .iter()
        .any(|needle| display.contains(needle))
    {
        GpuVendor::Virtual
    } else if display.contains("nvidia") {
        GpuVendor::Nvidia
    } else if ["amd", "radeon", "ati "].iter().any(|n| display.contains(n)) {
        GpuVendor::Amd
    } else if display.contains("intel")
        && ["graphics", "hd", "iris", "uhd", "arc"]
            .iter()
            .any(|n| display.contains(n))
    {
        GpuVendor::Intel
    } else {
        GpuVendor::Unknown
    }
}
