/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::reconcile
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Decide, per component, whether to install, upgrade, skip,
    or report it unavailable, from the probed versions and the
    operator's intent.

  Security / Safety Notes:
    Pure decision logic; no I/O.

  Dependencies:
    serde for reporting.

  Operational Scope:
    Sits between the probe and the install step of the run
    loop.

  Revision History:
    2026-10-17 COD  Authored reconciliation table.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Never upgrade without proof a newer version exists
    - Same inputs, same decision
============================================================*/

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::error::SynplayError;
use crate::probe::{Available, VersionInfo};
use crate::version::compare_versions;

/// What the operator asked for, from a flag or a prompt answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserIntent {
    ForceInstall,
    AllowUpgrade,
    SkipEntirely,
}

impl FromStr for UserIntent {
    type Err = SynplayError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "install" | "force" | "force-install" => Ok(UserIntent::ForceInstall),
            "upgrade" | "allow-upgrade" => Ok(UserIntent::AllowUpgrade),
            "skip" | "skip-entirely" => Ok(UserIntent::SkipEntirely),
            other => Err(SynplayError::Config(format!(
                "Unknown intent `{other}` (expected install, upgrade, or skip)"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Install,
    Upgrade,
    Skip,
    Unavailable,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Action::Install => "install",
            Action::Upgrade => "upgrade",
            Action::Skip => "skip",
            Action::Unavailable => "unavailable",
        })
    }
}

/// Decision for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconciliationResult {
    pub component: String,
    pub action: Action,
    pub reason: String,
    pub target_version: Option<String>,
}

impl ReconciliationResult {
    fn new(component: &str, action: Action, reason: String, target: Option<&str>) -> Self {
        Self {
            component: component.to_string(),
            action,
            reason,
            target_version: target.map(str::to_string),
        }
    }

    /// Result for a component that cannot be installed on this host at all.
    pub fn unsupported(component: &str, reason: String) -> Self {
        Self::new(component, Action::Unavailable, reason, None)
    }

    /// Whether the decision calls for the install collaborator.
    pub fn requires_install(&self) -> bool {
        matches!(self.action, Action::Install | Action::Upgrade)
    }
}

/// Map probed versions and intent to an action.
pub fn reconcile(component: &str, info: &VersionInfo, intent: UserIntent) -> ReconciliationResult {
    use ReconciliationResult as R;

    if intent == UserIntent::SkipEntirely {
        return R::new(component, Action::Skip, "declined by operator".into(), None);
    }

    let Some(installed) = info.installed.as_deref() else {
        return match &info.available {
            Available::Version(version) => R::new(
                component,
                Action::Install,
                format!("not installed; {version} available"),
                Some(version),
            ),
            Available::Absent => R::new(
                component,
                Action::Unavailable,
                "not installed and no candidate in configured sources".into(),
                None,
            ),
            Available::Unknown(reason) => R::new(
                component,
                Action::Unavailable,
                format!("not installed and source could not be queried: {reason}"),
                None,
            ),
        };
    };

    match &info.available {
        Available::Version(version) => match compare_versions(installed, version) {
            Some(Ordering::Less) => R::new(
                component,
                Action::Upgrade,
                format!("newer version available: {installed} → {version}"),
                Some(version),
            ),
            Some(Ordering::Equal) => R::new(
                component,
                Action::Skip,
                format!("already at {installed}"),
                None,
            ),
            Some(Ordering::Greater) => R::new(
                component,
                Action::Skip,
                format!("installed {installed} is newer than available {version}"),
                None,
            ),
            None if intent == UserIntent::ForceInstall => R::new(
                component,
                Action::Upgrade,
                format!("forced: {installed} → {version} (versions not comparable)"),
                Some(version),
            ),
            None => R::new(
                component,
                Action::Skip,
                format!("cannot tell whether {version} is newer than {installed}"),
                None,
            ),
        },
        Available::Absent => R::new(
            component,
            Action::Skip,
            format!("installed {installed}; no candidate in configured sources"),
            None,
        ),
        Available::Unknown(reason) => R::new(
            component,
            Action::Skip,
            format!("installed {installed}; cannot verify newer version ({reason})"),
            None,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(installed: Option<&str>, available: Available) -> VersionInfo {
        VersionInfo::new(installed.map(str::to_string), available)
    }

    fn version(v: &str) -> Available {
        Available::Version(v.to_string())
    }

    #[test]
    fn newer_available_upgrades() {
        let result = reconcile(
            "steam",
            &info(Some("1.0.0.78"), version("1.0.0.79")),
            UserIntent::AllowUpgrade,
        );
        assert_eq!(result.action, Action::Upgrade);
        assert!(result.reason.contains("newer version available"));
        assert_eq!(result.target_version.as_deref(), Some("1.0.0.79"));
    }

    #[test]
    fn every_smaller_pair_upgrades() {
        let pairs = [
            ("0.9", "1.0"),
            ("1.2.3", "1.2.4"),
            ("1.9", "1.10"),
            ("2:1.0", "3:0.1"),
            ("1.0-1", "1.0-2"),
        ];
        for (a, b) in pairs {
            let result = reconcile("x", &info(Some(a), version(b)), UserIntent::AllowUpgrade);
            assert_eq!(result.action, Action::Upgrade, "{a} -> {b}");
        }
    }

    #[test]
    fn equal_versions_skip_for_every_intent() {
        for intent in [
            UserIntent::ForceInstall,
            UserIntent::AllowUpgrade,
            UserIntent::SkipEntirely,
        ] {
            for v in ["1.0", "1.0.0.78", "1:2.3-4", "stable"] {
                let result = reconcile("x", &info(Some(v), version(v)), intent);
                assert_eq!(result.action, Action::Skip, "{v} {intent:?}");
            }
        }
    }

    #[test]
    fn older_available_skips() {
        let result = reconcile("x", &info(Some("2.0"), version("1.5")), UserIntent::ForceInstall);
        assert_eq!(result.action, Action::Skip);
    }

    #[test]
    fn absent_installed_and_unknown_available_is_unavailable() {
        let result = reconcile(
            "ge-proton",
            &info(None, Available::Unknown("timed out".into())),
            UserIntent::AllowUpgrade,
        );
        assert_eq!(result.action, Action::Unavailable);

        let result = reconcile("x", &info(None, Available::Absent), UserIntent::ForceInstall);
        assert_eq!(result.action, Action::Unavailable);
    }

    #[test]
    fn missing_component_installs() {
        for intent in [UserIntent::ForceInstall, UserIntent::AllowUpgrade] {
            let result = reconcile("x", &info(None, version("0.5.17")), intent);
            assert_eq!(result.action, Action::Install);
        }
    }

    #[test]
    fn unknown_available_never_upgrades() {
        for intent in [UserIntent::ForceInstall, UserIntent::AllowUpgrade] {
            let result = reconcile(
                "x",
                &info(Some("1.0"), Available::Unknown("offline".into())),
                intent,
            );
            assert_eq!(result.action, Action::Skip);
        }
    }

    #[test]
    fn skip_entirely_wins_over_everything() {
        let cases = [
            info(None, version("1.0")),
            info(Some("1.0"), version("2.0")),
            info(None, Available::Unknown("x".into())),
        ];
        for case in &cases {
            let result = reconcile("x", case, UserIntent::SkipEntirely);
            assert_eq!(result.action, Action::Skip);
            assert!(!result.requires_install());
        }
    }

    #[test]
    fn incomparable_versions_need_force() {
        let versions = info(Some("1.0+dfsg"), version("1.1+dfsg"));
        assert_eq!(
            reconcile("x", &versions, UserIntent::AllowUpgrade).action,
            Action::Skip
        );
        assert_eq!(
            reconcile("x", &versions, UserIntent::ForceInstall).action,
            Action::Upgrade
        );
    }

    #[test]
    fn decision_is_idempotent() {
        let versions = info(Some("1.0.0.78"), version("1.0.0.79"));
        let first = reconcile("steam", &versions, UserIntent::AllowUpgrade);
        let second = reconcile("steam", &versions, UserIntent::AllowUpgrade);
        assert_eq!(first, second);
    }

    #[test]
    fn intent_parsing_rejects_garbage() {
        assert_eq!("upgrade".parse::<UserIntent>().unwrap(), UserIntent::AllowUpgrade);
        assert_eq!("Force".parse::<UserIntent>().unwrap(), UserIntent::ForceInstall);
        assert!(matches!(
            "maybe".parse::<UserIntent>(),
            Err(SynplayError::Config(_))
        ));
    }

    #[test]
    fn tilde_versions_upgrade_only_when_forced() {
        let steam = info(Some("1:1.0.0.79~ds-2"), version("1:1.0.0.80~ds-1"));
        assert_eq!(
            reconcile("steam", &steam, UserIntent::AllowUpgrade).action,
            Action::Skip
        );
        assert_eq!(
            reconcile("steam", &steam, UserIntent::ForceInstall).action,
            Action::Upgrade
        );
    }
}
