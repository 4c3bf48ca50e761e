/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::component
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    The static catalog of installable components and the way
    each one is installed (apt, PPA, signed repository, driver
    autoinstall, guest tools, Flatpak, release tarball, tuning
    drop-in).

  Security / Safety Notes:
    Pure data; no I/O performed in this module.

  Dependencies:
    serde for reporting.

  Operational Scope:
    Resolved once at start from CLI selections; every probe,
    decision, and ledger entry refers back to a component id.

  Revision History:
    2026-10-17 COD  Introduced component catalog.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Immutable reference data
    - Clear data contracts between modules
============================================================*/

use std::fmt;

use serde::Serialize;

use crate::apt::{AptRepository, WINEHQ};
use crate::error::{Result, SynplayError};
use crate::system::SystemInfo;
use crate::tuning::Tuning;

/// Catalog grouping, mirrors the order the installer walks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Drivers,
    Platforms,
    Compatibility,
    Performance,
    Tools,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Category::Drivers => "Graphics Drivers",
            Category::Platforms => "Gaming Platforms",
            Category::Compatibility => "Compatibility Layers",
            Category::Performance => "Performance Tools",
            Category::Tools => "Additional Tools",
        };
        f.write_str(label)
    }
}

/// How a component is put on the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallMethod {
    /// Packages from the configured apt sources. The first package is probed.
    Apt { packages: &'static [&'static str] },
    /// Packages from a Launchpad PPA; Ubuntu family only.
    Ppa {
        ppa: &'static str,
        packages: &'static [&'static str],
    },
    /// Packages from a signed third-party repository.
    AptRepo {
        repo: &'static AptRepository,
        packages: &'static [&'static str],
    },
    /// `ubuntu-drivers autoinstall`, then the listed utilities. The first
    /// package is probed.
    DriverAutoinstall { packages: &'static [&'static str] },
    /// Guest utilities picked from the detected hypervisor.
    GuestTools,
    /// Application from the configured Flatpak remote.
    Flatpak { app_id: &'static str },
    /// Tarball attached to the latest GitHub release, unpacked into the
    /// Steam compatibility tools directory.
    GithubRelease {
        owner: &'static str,
        repo: &'static str,
        asset_suffix: &'static str,
        dir_prefix: &'static str,
    },
    /// Managed configuration drop-in.
    Tuning { tuning: Tuning },
}

impl InstallMethod {
    pub fn label(&self) -> &'static str {
        match self {
            InstallMethod::Apt { .. } => "apt",
            InstallMethod::Ppa { .. } => "ppa",
            InstallMethod::AptRepo { .. } => "repo",
            InstallMethod::DriverAutoinstall { .. } => "driver",
            InstallMethod::GuestTools => "guest",
            InstallMethod::Flatpak { .. } => "flatpak",
            InstallMethod::GithubRelease { .. } => "release",
            InstallMethod::Tuning { .. } => "tuning",
        }
    }
}

/// A named installable unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Component {
    pub id: &'static str,
    pub name: &'static str,
    pub category: Category,
    pub method: InstallMethod,
    pub ubuntu_only: bool,
}

impl Component {
    /// Reason this component cannot be installed on `host`, if any.
    pub fn unsupported_reason(&self, host: &SystemInfo) -> Option<String> {
        let needs_ubuntu = self.ubuntu_only
            || matches!(
                self.method,
                InstallMethod::Ppa { .. } | InstallMethod::DriverAutoinstall { .. }
            );
        if needs_ubuntu && !host.family.is_ubuntu_family() {
            return Some(format!(
                "{} requires an Ubuntu-family distribution (detected {})",
                self.name, host.family
            ));
        }
        if self.method == InstallMethod::GuestTools && guest_packages(host).is_none() {
            return Some(format!(
                "{} needs a detected virtual machine (detected {})",
                self.name,
                host.virtualization.as_deref().unwrap_or("bare metal")
            ));
        }
        None
    }
}

/// Guest packages for the hypervisor `host` runs under; `None` on bare
/// metal and under WSL.
pub fn guest_packages(host: &SystemInfo) -> Option<&'static [&'static str]> {
    let virt = host.virtualization.as_deref()?.to_lowercase();
    let packages: &'static [&'static str] = match virt.as_str() {
        "wsl" => return None,
        "vmware" => &[
            "open-vm-tools",
            "open-vm-tools-desktop",
            "mesa-utils",
            "mesa-utils-extra",
            "libgl1-mesa-dri",
            "libgl1-mesa-dri:i386",
        ],
        "virtualbox" => &[
            "virtualbox-guest-utils",
            "virtualbox-guest-x11",
            "virtualbox-guest-dkms",
            "mesa-utils",
        ],
        "kvm" | "qemu" => &[
            "qemu-guest-agent",
            "spice-vdagent",
            "xserver-xorg-video-qxl",
            "mesa-utils",
        ],
        "hyper-v" => &[
            "hyperv-daemons",
            "linux-tools-virtual",
            "linux-cloud-tools-virtual",
        ],
        "xen" => &["xe-guest-utilities"],
        _ => &[
            "mesa-utils",
            "mesa-utils-extra",
            "libgl1-mesa-dri",
            "libgl1-mesa-dri:i386",
            "mesa-vulkan-drivers",
            "mesa-vulkan-drivers:i386",
        ],
    };
    Some(packages)
}

const fn apt(
    id: &'static str,
    name: &'static str,
    category: Category,
    packages: &'static [&'static str],
) -> Component {
    Component {
        id,
        name,
        category,
        method: InstallMethod::Apt { packages },
        ubuntu_only: false,
    }
}

const fn flatpak(
    id: &'static str,
    name: &'static str,
    category: Category,
    app_id: &'static str,
) -> Component {
    Component {
        id,
        name,
        category,
        method: InstallMethod::Flatpak { app_id },
        ubuntu_only: false,
    }
}

/// Every component the installer knows, in processing order.
pub const CATALOG: &[Component] = &[
    Component {
        id: "nvidia",
        name: "NVIDIA driver",
        category: Category::Drivers,
        method: InstallMethod::DriverAutoinstall {
            packages: &["nvidia-settings", "nvidia-prime"],
        },
        ubuntu_only: true,
    },
    apt(
        "mesa",
        "Mesa Vulkan drivers",
        Category::Drivers,
        &[
            "mesa-vulkan-drivers",
            "mesa-vulkan-drivers:i386",
            "libvulkan1",
            "libvulkan1:i386",
            "vulkan-tools",
            "mesa-utils",
        ],
    ),
    apt(
        "intel-va",
        "Intel VA-API drivers",
        Category::Drivers,
        &["intel-media-va-driver", "i965-va-driver"],
    ),
    Component {
        id: "vm-tools",
        name: "VM guest tools",
        category: Category::Drivers,
        method: InstallMethod::GuestTools,
        ubuntu_only: false,
    },
    apt(
        "essentials",
        "Essential gaming packages",
        Category::Drivers,
        &[
            "build-essential",
            "libgl1-mesa-dri:i386",
            "mesa-vulkan-drivers:i386",
            "pavucontrol",
            "joystick",
            "jstest-gtk",
            "fonts-liberation",
            "fonts-wine",
        ],
    ),
    Component {
        id: "codecs",
        name: "Ubuntu restricted extras",
        category: Category::Drivers,
        method: InstallMethod::Apt {
            packages: &["ubuntu-restricted-extras"],
        },
        ubuntu_only: true,
    },
    apt("steam", "Steam", Category::Platforms, &["steam-installer"]),
    flatpak("lutris", "Lutris", Category::Platforms, "net.lutris.Lutris"),
    flatpak(
        "heroic",
        "Heroic Games Launcher",
        Category::Platforms,
        "com.heroicgameslauncher.hgl",
    ),
    flatpak(
        "protonup",
        "ProtonUp-Qt",
        Category::Platforms,
        "net.davidotek.pupgui2",
    ),
    flatpak("sober", "Sober (Roblox)", Category::Platforms, "org.vinegarhq.Sober"),
    apt("waydroid", "Waydroid", Category::Platforms, &["waydroid"]),
    Component {
        id: "wine",
        name: "Wine Staging",
        category: Category::Compatibility,
        method: InstallMethod::AptRepo {
            repo: &WINEHQ,
            packages: &["winehq-staging"],
        },
        ubuntu_only: false,
    },
    apt("winetricks", "Winetricks", Category::Compatibility, &["winetricks"]),
    Component {
        id: "ge-proton",
        name: "GE-Proton",
        category: Category::Compatibility,
        method: InstallMethod::GithubRelease {
            owner: "GloriousEggroll",
            repo: "proton-ge-custom",
            asset_suffix: ".tar.gz",
            dir_prefix: "GE-Proton",
        },
        ubuntu_only: false,
    },
    apt(
        "gamemode",
        "GameMode",
        Category::Performance,
        &["gamemode", "libgamemode0", "libgamemode0:i386"],
    ),
    apt(
        "mangohud",
        "MangoHud",
        Category::Performance,
        &["mangohud", "mangohud:i386"],
    ),
    apt("goverlay", "GOverlay", Category::Performance, &["goverlay"]),
    flatpak("gwe", "GreenWithEnvy", Category::Performance, "com.leinardi.gwe"),
    apt("vkbasalt", "vkBasalt", Category::Performance, &["vkbasalt"]),
    Component {
        id: "sysctl",
        name: "Gaming sysctl tuning",
        category: Category::Performance,
        method: InstallMethod::Tuning {
            tuning: Tuning::Sysctl,
        },
        ubuntu_only: false,
    },
    Component {
        id: "cpufreq-sudo",
        name: "Passwordless CPU governor control",
        category: Category::Performance,
        method: InstallMethod::Tuning {
            tuning: Tuning::CpufreqSudo,
        },
        ubuntu_only: false,
    },
    flatpak("discord", "Discord", Category::Tools, "com.discordapp.Discord"),
    Component {
        id: "obs",
        name: "OBS Studio",
        category: Category::Tools,
        method: InstallMethod::Ppa {
            ppa: "ppa:obsproject/obs-studio",
            packages: &["obs-studio"],
        },
        ubuntu_only: true,
    },
    apt("mumble", "Mumble", Category::Tools, &["mumble"]),
];

/// Components selected by `--all-platforms`.
pub const ALL_PLATFORMS: &[&str] = &["steam", "lutris", "heroic", "protonup"];

/// Look up a component by id.
pub fn find(id: &str) -> Option<&'static Component> {
    CATALOG.iter().find(|component| component.id == id)
}

/// Resolve requested ids into catalog entries, preserving request order and
/// dropping duplicates. Unknown ids are a fatal configuration error.
pub fn resolve(ids: &[String]) -> Result<Vec<&'static Component>> {
    let mut resolved: Vec<&'static Component> = Vec::new();
    let mut unknown = Vec::new();
    for id in ids {
        match find(id.trim()) {
            Some(component) if !resolved.iter().any(|c| c.id == component.id) => {
                resolved.push(component)
            }
            Some(_) => {}
            None => unknown.push(id.clone()),
        }
    }

    if unknown.is_empty() {
        Ok(resolved)
    } else {
        Err(SynplayError::Config(format!(
            "Unknown component(s): {} (see --list)",
            unknown.join(", ")
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::system::DistroFamily;

    #[test]
    fn catalog_ids_are_unique() {
        for (idx, component) in CATALOG.iter().enumerate() {
            assert!(
                CATALOG[idx + 1..].iter().all(|c| c.id != component.id),
                "duplicate id {}",
                component.id
            );
        }
    }

    #[test]
    fn all_platforms_resolve() {
        let ids: Vec<String> = ALL_PLATFORMS.iter().map(|s| s.to_string()).collect();
        let resolved = resolve(&ids).unwrap();
        assert_eq!(resolved.len(), ALL_PLATFORMS.len());
        assert!(resolved.iter().all(|c| c.category == Category::Platforms));
    }

    #[test]
    fn resolve_keeps_order_and_drops_duplicates() {
        let ids = vec!["mangohud".to_string(), "steam".into(), "mangohud".into()];
        let resolved = resolve(&ids).unwrap();
        let order: Vec<&str> = resolved.iter().map(|c| c.id).collect();
        assert_eq!(order, vec!["mangohud", "steam"]);
    }

    #[test]
    fn unknown_ids_are_config_errors() {
        let err = resolve(&["steam".into(), "half-life-3".into()]).unwrap_err();
        match err {
            SynplayError::Config(message) => assert!(message.contains("half-life-3")),
            other => panic!("unexpected error {other:?}"),
        }
    }

    fn host(family: DistroFamily, virtualization: Option<&str>) -> SystemInfo {
        SystemInfo {
            family,
            virtualization: virtualization.map(str::to_string),
            ..SystemInfo::unknown()
        }
    }

    #[test]
    fn ppa_and_driver_components_need_ubuntu_family() {
        let debian = host(DistroFamily::Debian, None);
        let pop = host(DistroFamily::PopOs, None);
        let obs = find("obs").unwrap();
        assert!(obs.unsupported_reason(&debian).is_some());
        assert!(obs.unsupported_reason(&pop).is_none());
        assert!(find("nvidia").unwrap().unsupported_reason(&debian).is_some());
        assert!(find("steam").unwrap().unsupported_reason(&debian).is_none());
        let kali = host(DistroFamily::Kali, None);
        assert!(find("codecs").unwrap().unsupported_reason(&kali).is_some());
    }

    #[test]
    fn guest_tools_follow_the_hypervisor() {
        let tools = find("vm-tools").unwrap();
        assert!(tools
            .unsupported_reason(&host(DistroFamily::Ubuntu, None))
            .is_some());
        assert!(tools
            .unsupported_reason(&host(DistroFamily::Ubuntu, Some("wsl")))
            .is_some());

        let vbox = host(DistroFamily::Debian, Some("VirtualBox"));
        assert!(tools.unsupported_reason(&vbox).is_none());
        assert_eq!(guest_packages(&vbox).unwrap()[0], "virtualbox-guest-utils");
        let kvm = host(DistroFamily::Debian, Some("KVM"));
        assert_eq!(guest_packages(&kvm).unwrap()[0], "qemu-guest-agent");
        let odd = host(DistroFamily::Debian, Some("Parallels"));
        assert!(guest_packages(&odd).unwrap().contains(&"mesa-vulkan-drivers"));
    }

    #[test]
    fn wine_comes_from_its_own_repository() {
        match find("wine").unwrap().method {
            InstallMethod::AptRepo { repo, packages } => {
                assert_eq!(repo.name, "winehq");
                assert_eq!(packages, &["winehq-staging"]);
            }
            other => panic!("unexpected method {other:?}"),
        }
    }
}
