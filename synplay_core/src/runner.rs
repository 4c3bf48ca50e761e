/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::runner
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    The run loop: for each requested component, in order,
    prepare source → probe → reconcile → install → record.

  Security / Safety Notes:
    Source setup and installs are skipped entirely in dry-run
    mode.

  Dependencies:
    crate::{probe, reconcile, ledger}.

  Operational Scope:
    Called once per invocation from `main`.

  Revision History:
    2026-10-17 COD  Authored sequential run loop.
    2026-10-17 COD  Source setup ahead of each probe.
  ------------------------------------------------------------
  SSE Principles Observed:
    - One component failing never stops the next
    - Fatal components halt only after their failure is recorded
============================================================*/

use crate::component::Component;
use crate::config::SynplayConfig;
use crate::error::{Result, SynplayError};
use crate::ledger::{LedgerEntry, Outcome, StateLedger};
use crate::logger::Logger;
use crate::probe::{probe, Available, InstallBackend, VersionInfo};
use crate::reconcile::{reconcile, Action, ReconciliationResult, UserIntent};
use crate::system::SystemInfo;

/// One component the operator asked about, with the intent they gave.
#[derive(Debug, Clone, Copy)]
pub struct Request {
    pub component: &'static Component,
    pub intent: UserIntent,
}

/// Process every request sequentially, recording each outcome.
///
/// Returns `Err(SynplayError::Fatal)` only when a component on the
/// configured fatal list fails; all other failures are recorded and the
/// loop moves on.
pub async fn run<B: InstallBackend>(
    backend: &B,
    requests: &[Request],
    config: &SynplayConfig,
    host: &SystemInfo,
    dry_run: bool,
    ledger: &mut StateLedger,
    logger: &Logger,
) -> Result<()> {
    for request in requests {
        let component = request.component;
        let entry = match decide(backend, request, config, host, dry_run, logger).await {
            Ok(decision) => settle(backend, component, &decision, dry_run, logger).await,
            Err(err) => {
                logger.error("SOURCE", format!("{}: {err}", component.id));
                LedgerEntry::new(
                    component.id,
                    Action::Unavailable,
                    Outcome::Failure,
                    Some(format!("source setup failed: {}", err.detail())),
                )
            }
        };

        let failed = entry.outcome == Outcome::Failure;
        let detail = entry.detail.clone().unwrap_or_default();
        if let Err(err) = ledger.record(entry) {
            logger.error("LEDGER", err.to_string());
        }

        if failed && config.is_fatal(component.id) {
            logger.error(
                "FATAL",
                format!("{} is on the fatal list; halting run", component.id),
            );
            return Err(SynplayError::Fatal {
                component: component.id.to_string(),
                detail,
            });
        }
    }
    Ok(())
}

/// Act on `decision` and build the ledger entry describing what happened.
async fn settle<B: InstallBackend>(
    backend: &B,
    component: &Component,
    decision: &ReconciliationResult,
    dry_run: bool,
    logger: &Logger,
) -> LedgerEntry {
    logger.info(
        "DECIDE",
        format!("{} → {} ({})", component.id, decision.action, decision.reason),
    );
    if !decision.requires_install() {
        LedgerEntry::new(
            component.id,
            decision.action,
            Outcome::Skipped,
            Some(decision.reason.clone()),
        )
    } else if dry_run {
        LedgerEntry::new(
            component.id,
            decision.action,
            Outcome::Skipped,
            Some(format!("dry run: would {}", describe(decision))),
        )
    } else {
        logger.info("INSTALL", format!("{}: {}", component.id, describe(decision)));
        match backend.install(component).await {
            Ok(()) => LedgerEntry::new(
                component.id,
                decision.action,
                Outcome::Success,
                decision.target_version.clone(),
            ),
            Err(err) => {
                logger.error("INSTALL", format!("{}: {err}", component.id));
                LedgerEntry::new(
                    component.id,
                    decision.action,
                    Outcome::Failure,
                    Some(err.detail()),
                )
            }
        }
    }
}

/// Decide what to do with one request. Source setup runs first so the
/// available version comes from the source the install will use; its
/// failure is the only error returned.
async fn decide<B: InstallBackend>(
    backend: &B,
    request: &Request,
    config: &SynplayConfig,
    host: &SystemInfo,
    dry_run: bool,
    logger: &Logger,
) -> Result<ReconciliationResult> {
    let component = request.component;
    if let Some(reason) = component.unsupported_reason(host) {
        let err = SynplayError::Unsupported {
            component: component.id.to_string(),
            reason,
        };
        logger.warn("UNSUPPORTED", err.to_string());
        return Ok(ReconciliationResult::unsupported(component.id, err.detail()));
    }

    let info = if request.intent == UserIntent::SkipEntirely {
        VersionInfo::new(None, Available::Unknown("not probed".into()))
    } else {
        if !dry_run {
            backend.prepare(component).await?;
        }
        probe(backend, component, config.probe_timeout(), logger).await
    };
    Ok(reconcile(component.id, &info, request.intent))
}

fn describe(decision: &ReconciliationResult) -> String {
    match &decision.target_version {
        Some(version) => format!("{} {version}", decision.action),
        None => decision.action.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::find;
    use crate::probe::testing::{FakeBackend, Script};
    use crate::system::DistroFamily;

    fn request(id: &str, intent: UserIntent) -> Request {
        Request {
            component: find(id).unwrap(),
            intent,
        }
    }

    fn fresh(available: &str) -> Script {
        Script {
            available: Some(available.into()),
            ..Script::default()
        }
    }

    fn ubuntu() -> SystemInfo {
        SystemInfo {
            family: DistroFamily::Ubuntu,
            ..SystemInfo::unknown()
        }
    }

    #[tokio::test]
    async fn failure_in_the_middle_does_not_stop_the_run() {
        let backend = FakeBackend::default()
            .with("steam", fresh("1.0.0.79"))
            .with(
                "lutris",
                Script {
                    install_error: Some("flatpak exited 1".into()),
                    ..fresh("0.5.17")
                },
            )
            .with("mumble", fresh("1.5"));
        let requests = [
            request("steam", UserIntent::AllowUpgrade),
            request("lutris", UserIntent::AllowUpgrade),
            request("mumble", UserIntent::AllowUpgrade),
        ];
        let mut ledger = StateLedger::in_memory();

        run(
            &backend,
            &requests,
            &SynplayConfig::default(),
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        let outcomes: Vec<(&str, Outcome)> = ledger
            .entries()
            .iter()
            .map(|e| (e.component.as_str(), e.outcome))
            .collect();
        assert_eq!(
            outcomes,
            vec![
                ("steam", Outcome::Success),
                ("lutris", Outcome::Failure),
                ("mumble", Outcome::Success),
            ]
        );
        assert_eq!(*backend.installs.borrow(), vec!["steam", "lutris", "mumble"]);
        let summary = ledger.summary();
        assert_eq!(summary.total(), 3);
        assert_eq!(summary.failures[0].detail, "flatpak exited 1");
    }

    #[tokio::test]
    async fn fatal_component_halts_after_recording() {
        let backend = FakeBackend::default()
            .with(
                "nvidia",
                Script {
                    install_error: Some("dkms build failed".into()),
                    ..fresh("550.1")
                },
            )
            .with("steam", fresh("1.0.0.79"));
        let requests = [
            request("nvidia", UserIntent::ForceInstall),
            request("steam", UserIntent::ForceInstall),
        ];
        let config = SynplayConfig::parse("[core]\nfatal_components = [\"nvidia\"]\n").unwrap();
        let mut ledger = StateLedger::in_memory();

        let err = run(
            &backend,
            &requests,
            &config,
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SynplayError::Fatal { ref component, .. } if component == "nvidia"));
        assert_eq!(ledger.entries().len(), 1);
        assert_eq!(ledger.entries()[0].outcome, Outcome::Failure);
        assert_eq!(*backend.installs.borrow(), vec!["nvidia"]);
    }

    #[tokio::test]
    async fn dry_run_never_installs() {
        let backend = FakeBackend::default().with("steam", fresh("1.0.0.79"));
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[request("steam", UserIntent::ForceInstall)],
            &SynplayConfig::default(),
            &ubuntu(),
            true,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        assert!(backend.installs.borrow().is_empty());
        let entry = &ledger.entries()[0];
        assert_eq!(entry.action, Action::Install);
        assert_eq!(entry.outcome, Outcome::Skipped);
        assert!(entry.detail.as_deref().unwrap().starts_with("dry run"));
    }

    #[tokio::test]
    async fn unsupported_components_are_recorded_unavailable() {
        let backend = FakeBackend::default().with("obs", fresh("30.0"));
        let debian = SystemInfo {
            family: DistroFamily::Debian,
            ..SystemInfo::unknown()
        };
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[request("obs", UserIntent::ForceInstall)],
            &SynplayConfig::default(),
            &debian,
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        let entry = &ledger.entries()[0];
        assert_eq!(entry.action, Action::Unavailable);
        assert_eq!(entry.outcome, Outcome::Skipped);
        assert!(backend.installs.borrow().is_empty());
    }

    #[tokio::test]
    async fn up_to_date_and_declined_components_are_skipped() {
        let backend = FakeBackend::default()
            .with(
                "mangohud",
                Script {
                    installed: Some("0.7.1".into()),
                    ..fresh("0.7.1")
                },
            )
            .with("discord", fresh("0.0.70"));
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[
                request("mangohud", UserIntent::AllowUpgrade),
                request("discord", UserIntent::SkipEntirely),
            ],
            &SynplayConfig::default(),
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        assert!(backend.installs.borrow().is_empty());
        let summary = ledger.summary();
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.total(), 2);
    }

    #[tokio::test]
    async fn upgrade_success_counts_as_upgraded() {
        let backend = FakeBackend::default().with(
            "steam",
            Script {
                installed: Some("1.0.0.78".into()),
                ..fresh("1.0.0.79")
            },
        );
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[request("steam", UserIntent::AllowUpgrade)],
            &SynplayConfig::default(),
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        assert_eq!(ledger.summary().upgraded, 1);
        assert_eq!(ledger.entries()[0].detail.as_deref(), Some("1.0.0.79"));
    }

    #[tokio::test]
    async fn source_setup_failure_is_recorded_and_run_continues() {
        let backend = FakeBackend::default()
            .with(
                "wine",
                Script {
                    prepare_error: Some("dpkg: error: cannot add architecture".into()),
                    ..fresh("9.21")
                },
            )
            .with("steam", fresh("1.0.0.79"));
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[
                request("wine", UserIntent::ForceInstall),
                request("steam", UserIntent::ForceInstall),
            ],
            &SynplayConfig::default(),
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        let wine = &ledger.entries()[0];
        assert_eq!(wine.action, Action::Unavailable);
        assert_eq!(wine.outcome, Outcome::Failure);
        assert!(wine.detail.as_deref().unwrap().starts_with("source setup failed"));
        assert_eq!(ledger.entries()[1].outcome, Outcome::Success);
        assert_eq!(*backend.installs.borrow(), vec!["steam"]);
    }

    #[tokio::test]
    async fn fatal_source_setup_failure_halts() {
        let backend = FakeBackend::default()
            .with(
                "wine",
                Script {
                    prepare_error: Some("key download failed".into()),
                    ..Script::default()
                },
            )
            .with("steam", fresh("1.0.0.79"));
        let config = SynplayConfig::parse("[core]\nfatal_components = [\"wine\"]\n").unwrap();
        let mut ledger = StateLedger::in_memory();
        let err = run(
            &backend,
            &[
                request("wine", UserIntent::ForceInstall),
                request("steam", UserIntent::ForceInstall),
            ],
            &config,
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, SynplayError::Fatal { ref component, .. } if component == "wine"));
        assert_eq!(ledger.entries().len(), 1);
        assert!(backend.installs.borrow().is_empty());
    }

    #[tokio::test]
    async fn available_version_comes_from_the_prepared_source() {
        let backend = FakeBackend::default().with(
            "obs",
            Script {
                installed: Some("29.1.3".into()),
                available: Some("29.1.3".into()),
                prepared_available: Some("30.2.3".into()),
                ..Script::default()
            },
        );
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[request("obs", UserIntent::AllowUpgrade)],
            &SynplayConfig::default(),
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        let entry = &ledger.entries()[0];
        assert_eq!(entry.action, Action::Upgrade);
        assert_eq!(entry.detail.as_deref(), Some("30.2.3"));
        assert_eq!(*backend.prepared.borrow(), vec!["obs"]);
    }

    #[tokio::test]
    async fn dry_run_and_skipped_components_leave_sources_alone() {
        let backend = FakeBackend::default()
            .with("steam", fresh("1.0.0.79"))
            .with("lutris", fresh("0.5.17"));
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[
                request("steam", UserIntent::ForceInstall),
                request("lutris", UserIntent::SkipEntirely),
            ],
            &SynplayConfig::default(),
            &ubuntu(),
            true,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        assert!(backend.prepared.borrow().is_empty());
        assert_eq!(ledger.entries().len(), 2);
    }

    #[tokio::test]
    async fn unreadable_install_state_is_left_alone() {
        let backend = FakeBackend::default().with(
            "steam",
            Script {
                installed_error: Some("dpkg-query".into()),
                ..fresh("1.0.0.79")
            },
        );
        let mut ledger = StateLedger::in_memory();
        run(
            &backend,
            &[request("steam", UserIntent::ForceInstall)],
            &SynplayConfig::default(),
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        let entry = &ledger.entries()[0];
        assert_eq!(entry.action, Action::Unavailable);
        assert_eq!(entry.outcome, Outcome::Skipped);
        assert!(backend.installs.borrow().is_empty());
    }

    #[tokio::test]
    async fn ledger_write_failures_do_not_stop_the_run() {
        // Every write to /dev/full fails with ENOSPC.
        let mut ledger = StateLedger::open(std::path::PathBuf::from("/dev/full")).unwrap();
        let backend = FakeBackend::default()
            .with("steam", fresh("1.0.0.79"))
            .with("mumble", fresh("1.5"));
        run(
            &backend,
            &[
                request("steam", UserIntent::ForceInstall),
                request("mumble", UserIntent::ForceInstall),
            ],
            &SynplayConfig::default(),
            &ubuntu(),
            false,
            &mut ledger,
            &Logger::silent(),
        )
        .await
        .unwrap();

        assert_eq!(*backend.installs.borrow(), vec!["steam", "mumble"]);
        assert_eq!(ledger.entries().len(), 2);
        assert_eq!(ledger.summary().installed, 2);
    }
}
