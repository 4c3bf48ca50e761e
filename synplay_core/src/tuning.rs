/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::tuning
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    System tuning files managed as versioned components: the
    gaming sysctl drop-in and the passwordless cpufreq grant.
    Each file carries a revision marker on its first line so it
    can be probed and reconciled like a package.

  Security / Safety Notes:
    The sudoers drop-in is written 0440, validated with
    `visudo -c`, and removed again if validation fails. User
    names are checked before they reach sudoers syntax.

  Dependencies:
    crate::command for sysctl/visudo, crate::apt for the
    cpupower fallback.

  Operational Scope:
    Backs the `sysctl` and `cpufreq-sudo` catalog entries.

  Revision History:
    2026-10-17 COD  Authored tuning drop-ins.
============================================================*/

use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::time::Duration;

use crate::apt;
use crate::command::run_checked;
use crate::error::{Result, SynplayError};

/// Revision written by this build; bump when file content changes.
pub const REVISION: &str = "1";

const MARKER: &str = "# Managed by Syn-Play, revision ";

pub const SYSCTL_PATH: &str = "/etc/sysctl.d/99-gaming.conf";
pub const SUDOERS_PATH: &str = "/etc/sudoers.d/gaming-cpufreq";

const CPUFREQ_TOOLS: [&str; 2] = ["/usr/bin/cpupower", "/usr/bin/cpufreq-set"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tuning {
    /// inotify watchers and map count for large game runtimes.
    Sysctl,
    /// Let the operator switch CPU governors without a password.
    CpufreqSudo,
}

impl Tuning {
    pub fn path(self) -> &'static Path {
        match self {
            Tuning::Sysctl => Path::new(SYSCTL_PATH),
            Tuning::CpufreqSudo => Path::new(SUDOERS_PATH),
        }
    }
}

/// Revision recorded in `path`; `unmanaged` for a file without a marker,
/// `None` when the file is absent.
pub fn installed_revision(path: &Path) -> Result<Option<String>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(SynplayError::Filesystem(format!(
                "Failed to read {}: {err}",
                path.display()
            )))
        }
    };
    let revision = raw
        .lines()
        .next()
        .and_then(|line| line.strip_prefix(MARKER))
        .map(|rev| rev.trim().to_string())
        .filter(|rev| !rev.is_empty())
        .unwrap_or_else(|| "unmanaged".to_string());
    Ok(Some(revision))
}

pub fn render_sysctl() -> String {
    format!(
        "{MARKER}{REVISION}\n\
         # Gaming optimizations\n\
         fs.inotify.max_user_watches=524288\n\
         vm.max_map_count=2147483642\n"
    )
}

pub fn render_sudoers(user: &str, tools: &[&str]) -> Result<String> {
    if !valid_user_name(user) || user == "root" {
        return Err(SynplayError::Config(format!(
            "Refusing to grant cpufreq access to `{user}`"
        )));
    }
    let mut content = format!(
        "{MARKER}{REVISION}\n# Allow {user} to manage CPU frequency for gaming\n"
    );
    for tool in tools {
        content.push_str(&format!("{user} ALL=(ALL) NOPASSWD: {tool}\n"));
    }
    Ok(content)
}

/// Write the sysctl drop-in and load it.
pub async fn apply_sysctl(path: &Path, limit: Duration) -> Result<()> {
    write_file(path, &render_sysctl(), 0o644).await?;
    let target = path.to_string_lossy().into_owned();
    run_checked("sysctl", &["-p", target.as_str()], limit).await?;
    Ok(())
}

/// Write and validate the cpufreq sudoers drop-in for `user`.
pub async fn apply_sudoers(path: &Path, user: &str, limit: Duration) -> Result<()> {
    let mut tools: Vec<&str> = CPUFREQ_TOOLS
        .iter()
        .copied()
        .filter(|tool| Path::new(tool).exists())
        .collect();
    if tools.is_empty() {
        apt::install(&["linux-cpupower"], false, limit).await?;
        tools.push(CPUFREQ_TOOLS[0]);
    }

    let content = render_sudoers(user, &tools)?;
    write_file(path, &content, 0o440).await?;

    let target = path.to_string_lossy().into_owned();
    if let Err(err) = run_checked("visudo", &["-c", "-f", target.as_str()], limit).await {
        let _ = tokio::fs::remove_file(path).await;
        return Err(err);
    }
    Ok(())
}

fn valid_user_name(user: &str) -> bool {
    !user.is_empty()
        && !user.starts_with('-')
        && user
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
}

async fn write_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    let fs_error = |err: std::io::Error| {
        SynplayError::Filesystem(format!("Failed to write {}: {err}", path.display()))
    };
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(fs_error)?;
    }
    tokio::fs::write(path, content).await.map_err(fs_error)?;
    tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
        .await
        .map_err(fs_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_file_has_no_revision() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(installed_revision(&dir.path().join("99-gaming.conf")).unwrap(), None);
    }

    #[test]
    fn rendered_file_reports_current_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("99-gaming.conf");
        std::fs::write(&path, render_sysctl()).unwrap();
        assert_eq!(installed_revision(&path).unwrap().as_deref(), Some(REVISION));
    }

    #[test]
    fn hand_written_file_is_unmanaged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("99-gaming.conf");
        std::fs::write(&path, "vm.max_map_count=65530\n").unwrap();
        assert_eq!(installed_revision(&path).unwrap().as_deref(), Some("unmanaged"));
    }

    #[test]
    fn sudoers_grants_each_tool() {
        let content = render_sudoers("ana", &["/usr/bin/cpupower"]).unwrap();
        assert!(content.starts_with(MARKER));
        assert!(content.contains("ana ALL=(ALL) NOPASSWD: /usr/bin/cpupower\n"));
    }

    #[test]
    fn sudoers_rejects_unsafe_names() {
        assert!(render_sudoers("root", &["/usr/bin/cpupower"]).is_err());
        assert!(render_sudoers("ana ALL=(ALL) ALL #", &["/usr/bin/cpupower"]).is_err());
        assert!(render_sudoers("", &["/usr/bin/cpupower"]).is_err());
    }

    #[tokio::test]
    async fn drop_in_gets_requested_mode() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sudoers.d/gaming-cpufreq");
        write_file(&path, "x\n", 0o440).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o440);
    }
}
