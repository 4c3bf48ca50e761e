/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::backend
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1
  ------------------------------------------------------------
  Purpose:
    The production InstallBackend: prepares each component's
    source, then routes queries and installs to apt, Flatpak,
    the GitHub release feed, or the tuning drop-ins according
    to its install method.

  Security / Safety Notes:
    Source setup and installs modify the system and require
    root. Files unpacked under the operator's home are handed
    back to them.

  Dependencies:
    crate::{apt, flatpak, github, tuning, account}.

  Operational Scope:
    Constructed once in `main`, borrowed by the run loop.

  Revision History:
    2026-10-17 COD  Authored system backend dispatcher.
    2026-10-17 COD  Source setup moved ahead of version queries.
============================================================*/

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::account::{hand_over_ancestors, hand_over_tree, RealUser};
use crate::apt::{self, AptRepository};
use crate::command::run_checked;
use crate::component::{guest_packages, Component, InstallMethod};
use crate::config::{ProbeConfig, SynplayConfig};
use crate::error::{Result, SynplayError};
use crate::flatpak;
use crate::github::{installed_release, normalize_tag, select_asset, ReleaseClient};
use crate::probe::InstallBackend;
use crate::system::SystemInfo;
use crate::tuning::{self, Tuning};

/// One source-setup action. Steps are idempotent and remembered for the
/// rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SetupStep {
    EnableI386,
    AddPpa(&'static str),
    AddRepository(&'static AptRepository),
    Refresh,
    InstallFlatpak,
    AddFlatpakRemote,
    CompatDir,
}

/// Steps that must run before `method` can be queried or installed, in
/// order.
fn setup_plan(method: InstallMethod, host: &SystemInfo) -> Vec<SetupStep> {
    let i386 = |packages: &[&str]| {
        if apt::needs_i386(packages) {
            vec![SetupStep::EnableI386]
        } else {
            Vec::new()
        }
    };
    let mut plan = match method {
        InstallMethod::Apt { packages } => i386(packages),
        InstallMethod::Ppa { ppa, packages } => {
            let mut plan = i386(packages);
            plan.push(SetupStep::AddPpa(ppa));
            plan
        }
        InstallMethod::AptRepo { repo, packages } => {
            let mut plan = if repo.multiarch {
                vec![SetupStep::EnableI386]
            } else {
                i386(packages)
            };
            plan.push(SetupStep::AddRepository(repo));
            plan
        }
        InstallMethod::DriverAutoinstall { .. } => Vec::new(),
        InstallMethod::GuestTools => guest_packages(host).map(i386).unwrap_or_default(),
        InstallMethod::Flatpak { .. } => {
            return vec![
                SetupStep::Refresh,
                SetupStep::InstallFlatpak,
                SetupStep::AddFlatpakRemote,
            ]
        }
        InstallMethod::GithubRelease { .. } => return vec![SetupStep::CompatDir],
        InstallMethod::Tuning { .. } => return Vec::new(),
    };
    plan.push(SetupStep::Refresh);
    plan
}

/// Distribution path segment and codename third-party repositories are
/// published under for `host`.
fn repository_target(host: &SystemInfo) -> Result<(&'static str, &str)> {
    let codename = host.codename.as_deref().ok_or_else(|| {
        SynplayError::Config(format!(
            "No release codename in /etc/os-release for {}",
            host.distro_name
        ))
    })?;
    let distro = if host.family.is_ubuntu_family() {
        "ubuntu"
    } else {
        "debian"
    };
    Ok((distro, codename))
}

#[derive(Default)]
struct SetupState {
    done: HashSet<SetupStep>,
    /// Sources changed since the last `apt-get update`.
    stale: bool,
}

pub struct SystemBackend {
    probe: ProbeConfig,
    probe_timeout: Duration,
    install_timeout: Duration,
    download_timeout: Duration,
    skip_update: bool,
    releases: ReleaseClient,
    host: SystemInfo,
    owner: RealUser,
    compat_dir: PathBuf,
    scratch_dir: PathBuf,
    etc_apt: PathBuf,
    setup: RefCell<SetupState>,
}

impl SystemBackend {
    pub fn new(config: &SynplayConfig, host: &SystemInfo, owner: RealUser) -> Result<Self> {
        Ok(Self {
            probe: config.probe.clone(),
            probe_timeout: config.probe_timeout(),
            install_timeout: config.install_timeout(),
            download_timeout: config.download_timeout(),
            skip_update: config.core.skip_update,
            releases: ReleaseClient::new(&config.github, config.probe_timeout())?,
            host: host.clone(),
            compat_dir: config.compat_tools_dir(&owner.home),
            owner,
            scratch_dir: std::env::temp_dir(),
            etc_apt: PathBuf::from("/etc/apt"),
            setup: RefCell::new(SetupState::default()),
        })
    }

    async fn run_step(&self, step: SetupStep) -> Result<()> {
        let limit = self.install_timeout;
        match step {
            SetupStep::Refresh => {
                let (refreshed, stale) = {
                    let state = self.setup.borrow();
                    (state.done.contains(&step), state.stale)
                };
                if !stale && (refreshed || self.skip_update) {
                    return Ok(());
                }
                apt::update(limit).await?;
                self.setup.borrow_mut().stale = false;
            }
            _ if self.setup.borrow().done.contains(&step) => return Ok(()),
            SetupStep::EnableI386 => {
                if apt::enable_i386(limit).await? {
                    self.setup.borrow_mut().stale = true;
                }
            }
            SetupStep::AddPpa(ppa) => {
                apt::add_ppa(ppa, limit).await?;
                self.setup.borrow_mut().stale = true;
            }
            SetupStep::AddRepository(repo) => {
                let (distro, codename) = repository_target(&self.host)?;
                apt::add_repository(
                    self.releases.http(),
                    repo,
                    distro,
                    codename,
                    &self.etc_apt,
                    self.download_timeout,
                )
                .await?;
                self.setup.borrow_mut().stale = true;
            }
            SetupStep::InstallFlatpak => {
                if apt::installed_version("flatpak", self.probe_timeout)
                    .await?
                    .is_none()
                {
                    apt::install(&["flatpak"], false, limit).await?;
                }
            }
            SetupStep::AddFlatpakRemote => flatpak::add_remote(&self.probe, limit).await?,
            SetupStep::CompatDir => {
                tokio::fs::create_dir_all(&self.compat_dir)
                    .await
                    .map_err(|err| {
                        SynplayError::Filesystem(format!(
                            "Failed to create {}: {err}",
                            self.compat_dir.display()
                        ))
                    })?;
                if self.owner.needs_hand_over() {
                    hand_over_ancestors(
                        &self.compat_dir,
                        &self.owner.home,
                        self.owner.uid,
                        self.owner.gid,
                    )?;
                }
            }
        }
        self.setup.borrow_mut().done.insert(step);
        Ok(())
    }

    fn packages(&self, component: &Component) -> Result<&'static [&'static str]> {
        match component.method {
            InstallMethod::Apt { packages }
            | InstallMethod::Ppa { packages, .. }
            | InstallMethod::AptRepo { packages, .. }
            | InstallMethod::DriverAutoinstall { packages } => Ok(packages),
            InstallMethod::GuestTools => {
                guest_packages(&self.host).ok_or_else(|| SynplayError::Unsupported {
                    component: component.id.to_string(),
                    reason: "no hypervisor detected".into(),
                })
            }
            _ => Err(SynplayError::Unsupported {
                component: component.id.to_string(),
                reason: format!("{} components carry no packages", component.method.label()),
            }),
        }
    }
}

impl InstallBackend for SystemBackend {
    async fn prepare(&self, component: &Component) -> Result<()> {
        for step in setup_plan(component.method, &self.host) {
            self.run_step(step).await?;
        }
        Ok(())
    }

    async fn query_installed(&self, component: &Component) -> Result<Option<String>> {
        match component.method {
            InstallMethod::Flatpak { app_id } => {
                flatpak::installed_version(app_id, self.probe_timeout).await
            }
            InstallMethod::GithubRelease { dir_prefix, .. } => {
                installed_release(&self.compat_dir, dir_prefix)
            }
            InstallMethod::Tuning { tuning: drop_in } => {
                tuning::installed_revision(drop_in.path())
            }
            _ => {
                let packages = self.packages(component)?;
                apt::installed_version(primary(component, packages)?, self.probe_timeout).await
            }
        }
    }

    async fn query_available(&self, component: &Component) -> Result<Option<String>> {
        match component.method {
            InstallMethod::Flatpak { app_id } => {
                flatpak::remote_version(app_id, &self.probe, self.probe_timeout).await
            }
            InstallMethod::GithubRelease {
                owner,
                repo,
                dir_prefix,
                ..
            } => Ok(self
                .releases
                .latest_release(owner, repo)
                .await?
                .map(|release| normalize_tag(&release.tag_name, dir_prefix))),
            InstallMethod::Tuning { .. } => Ok(Some(tuning::REVISION.to_string())),
            _ => {
                let packages = self.packages(component)?;
                apt::candidate_version(primary(component, packages)?, self.probe_timeout).await
            }
        }
    }

    async fn install(&self, component: &Component) -> Result<()> {
        let limit = self.install_timeout;
        let outcome = match component.method {
            InstallMethod::Apt { packages } | InstallMethod::Ppa { packages, .. } => {
                apt::install(packages, false, limit).await
            }
            InstallMethod::AptRepo { packages, .. } => apt::install(packages, true, limit).await,
            InstallMethod::DriverAutoinstall { packages } => {
                self.install_driver(packages).await
            }
            InstallMethod::GuestTools => match self.packages(component) {
                Ok(packages) => apt::install(packages, false, limit).await,
                Err(err) => Err(err),
            },
            InstallMethod::Flatpak { app_id } => {
                flatpak::install(app_id, &self.probe, limit).await
            }
            InstallMethod::GithubRelease {
                owner,
                repo,
                asset_suffix,
                ..
            } => self.install_release(owner, repo, asset_suffix).await,
            InstallMethod::Tuning { tuning: drop_in } => self.apply_tuning(drop_in).await,
        };

        outcome.map_err(|err| match err {
            SynplayError::Install { .. } => err,
            other => SynplayError::Install {
                component: component.id.to_string(),
                detail: other.to_string(),
            },
        })
    }
}

impl SystemBackend {
    async fn install_driver(&self, packages: &[&str]) -> Result<()> {
        let limit = self.install_timeout;
        if apt::installed_version("ubuntu-drivers-common", self.probe_timeout)
            .await?
            .is_none()
        {
            apt::install(&["ubuntu-drivers-common"], false, limit).await?;
        }
        run_checked("ubuntu-drivers", &["autoinstall"], limit).await?;
        apt::install(packages, false, limit).await
    }

    async fn install_release(&self, owner: &str, repo: &str, suffix: &str) -> Result<()> {
        let release = self
            .releases
            .latest_release(owner, repo)
            .await?
            .ok_or_else(|| SynplayError::Network(format!("{owner}/{repo} has no releases")))?;
        let asset = select_asset(&release, suffix).ok_or_else(|| {
            SynplayError::Network(format!(
                "Release {} has no `{suffix}` asset",
                release.tag_name
            ))
        })?;
        let target = self
            .releases
            .install_asset(
                asset,
                &self.scratch_dir,
                &self.compat_dir,
                self.download_timeout,
            )
            .await?;
        if self.owner.needs_hand_over() {
            self.hand_over(&target)?;
        }
        Ok(())
    }

    fn hand_over(&self, target: &Path) -> Result<()> {
        hand_over_ancestors(target, &self.owner.home, self.owner.uid, self.owner.gid)?;
        hand_over_tree(target, self.owner.uid, self.owner.gid)
    }

    async fn apply_tuning(&self, drop_in: Tuning) -> Result<()> {
        let limit = self.install_timeout;
        match drop_in {
            Tuning::Sysctl => tuning::apply_sysctl(drop_in.path(), limit).await,
            Tuning::CpufreqSudo => {
                tuning::apply_sudoers(drop_in.path(), &self.owner.name, limit).await
            }
        }
    }
}

fn primary<'a>(component: &Component, packages: &[&'a str]) -> Result<&'a str> {
    packages.first().copied().ok_or_else(|| SynplayError::Unsupported {
        component: component.id.to_string(),
        reason: "no packages declared".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apt::WINEHQ;
    use crate::component::find;
    use crate::system::DistroFamily;

    fn plan(id: &str, host: &SystemInfo) -> Vec<SetupStep> {
        setup_plan(find(id).unwrap().method, host)
    }

    fn vm(virt: Option<&str>) -> SystemInfo {
        SystemInfo {
            virtualization: virt.map(str::to_string),
            ..SystemInfo::unknown()
        }
    }

    #[test]
    fn flatpak_apps_get_their_remote_before_any_query() {
        assert_eq!(
            plan("lutris", &SystemInfo::unknown()),
            vec![
                SetupStep::Refresh,
                SetupStep::InstallFlatpak,
                SetupStep::AddFlatpakRemote
            ]
        );
    }

    #[test]
    fn wine_repository_is_added_with_i386_enabled() {
        assert_eq!(
            plan("wine", &SystemInfo::unknown()),
            vec![
                SetupStep::EnableI386,
                SetupStep::AddRepository(&WINEHQ),
                SetupStep::Refresh
            ]
        );
    }

    #[test]
    fn i386_is_enabled_only_for_multiarch_packages() {
        let host = SystemInfo::unknown();
        assert_eq!(
            plan("mangohud", &host),
            vec![SetupStep::EnableI386, SetupStep::Refresh]
        );
        assert_eq!(plan("winetricks", &host), vec![SetupStep::Refresh]);
    }

    #[test]
    fn ppa_is_added_before_the_refresh() {
        assert_eq!(
            plan("obs", &SystemInfo::unknown()),
            vec![
                SetupStep::AddPpa("ppa:obsproject/obs-studio"),
                SetupStep::Refresh
            ]
        );
    }

    #[test]
    fn guest_tools_follow_the_hypervisor_packages() {
        assert_eq!(
            plan("vm-tools", &vm(Some("VMware"))),
            vec![SetupStep::EnableI386, SetupStep::Refresh]
        );
        assert_eq!(plan("vm-tools", &vm(Some("KVM"))), vec![SetupStep::Refresh]);
    }

    #[test]
    fn releases_and_tuning_need_no_apt_setup() {
        let host = SystemInfo::unknown();
        assert_eq!(plan("ge-proton", &host), vec![SetupStep::CompatDir]);
        assert!(plan("sysctl", &host).is_empty());
    }

    #[test]
    fn repository_target_needs_a_codename() {
        let err = repository_target(&SystemInfo::unknown()).unwrap_err();
        assert!(matches!(err, SynplayError::Config(_)));

        let mint = SystemInfo {
            family: DistroFamily::Ubuntu,
            codename: Some("noble".into()),
            ..SystemInfo::unknown()
        };
        assert_eq!(repository_target(&mint).unwrap(), ("ubuntu", "noble"));

        let debian = SystemInfo {
            family: DistroFamily::Debian,
            codename: Some("bookworm".into()),
            ..SystemInfo::unknown()
        };
        assert_eq!(repository_target(&debian).unwrap(), ("debian", "bookworm"));
    }
}
