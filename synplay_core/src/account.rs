/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::account
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Identify the operator behind `sudo` and hand files created
    on their behalf back to them.

  Security / Safety Notes:
    Ownership changes never follow symlinks and only touch
    paths below the operator's home.

  Dependencies:
    libc for passwd lookups and the effective uid.

  Operational Scope:
    Resolved once in `main`; consulted when unpacking release
    tarballs and when writing per-user grants.

  Revision History:
    2026-10-17 COD  Authored real-user lookup and hand-over.
============================================================*/

use std::ffi::{CStr, CString};
use std::os::unix::fs::lchown;
use std::path::{Path, PathBuf};

use crate::error::{Result, SynplayError};

/// The account the installer acts for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealUser {
    pub name: String,
    pub home: PathBuf,
    pub uid: u32,
    pub gid: u32,
}

impl RealUser {
    /// `SUDO_USER`, else `USER`, resolved through the passwd database.
    pub fn detect() -> Self {
        let name = ["SUDO_USER", "USER"]
            .iter()
            .filter_map(|key| std::env::var(key).ok())
            .find(|value| !value.trim().is_empty());

        if let Some(found) = name.as_deref().and_then(lookup) {
            return found;
        }

        // SAFETY: getuid/getgid have no preconditions and cannot fail.
        let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
        Self {
            name: name.unwrap_or_else(|| "root".into()),
            home: dirs::home_dir().unwrap_or_else(|| PathBuf::from("/root")),
            uid,
            gid,
        }
    }

    /// True when files written by this process must be re-owned.
    pub fn needs_hand_over(&self) -> bool {
        // SAFETY: geteuid has no preconditions and cannot fail.
        let euid = unsafe { libc::geteuid() };
        euid == 0 && self.uid != 0
    }
}

fn lookup(name: &str) -> Option<RealUser> {
    let c_name = CString::new(name).ok()?;
    // SAFETY: getpwnam returns null or a pointer to static storage that
    // stays valid until the next passwd call; every field is copied out
    // before returning.
    unsafe {
        let entry = libc::getpwnam(c_name.as_ptr());
        if entry.is_null() || (*entry).pw_dir.is_null() {
            return None;
        }
        let home = CStr::from_ptr((*entry).pw_dir).to_string_lossy().into_owned();
        Some(RealUser {
            name: name.to_string(),
            home: PathBuf::from(home),
            uid: (*entry).pw_uid,
            gid: (*entry).pw_gid,
        })
    }
}

/// Re-own `path` and everything below it.
pub fn hand_over_tree(path: &Path, uid: u32, gid: u32) -> Result<()> {
    hand_over(path, uid, gid)?;
    let metadata = std::fs::symlink_metadata(path).map_err(|err| fs_error(path, err))?;
    if !metadata.is_dir() {
        return Ok(());
    }
    let entries = std::fs::read_dir(path).map_err(|err| fs_error(path, err))?;
    for entry in entries {
        let entry = entry.map_err(|err| fs_error(path, err))?;
        hand_over_tree(&entry.path(), uid, gid)?;
    }
    Ok(())
}

/// Re-own `path` and each of its ancestors strictly below `home`.
pub fn hand_over_ancestors(path: &Path, home: &Path, uid: u32, gid: u32) -> Result<()> {
    for ancestor in path.ancestors() {
        if ancestor == home || !ancestor.starts_with(home) {
            break;
        }
        hand_over(ancestor, uid, gid)?;
    }
    Ok(())
}

fn hand_over(path: &Path, uid: u32, gid: u32) -> Result<()> {
    lchown(path, Some(uid), Some(gid)).map_err(|err| fs_error(path, err))
}

fn fs_error(path: &Path, err: std::io::Error) -> SynplayError {
    SynplayError::Filesystem(format!("Failed to re-own {}: {err}", path.display()))
}
