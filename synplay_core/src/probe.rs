/*============================================================
  Synavera Project: Syn-Play
  Module: synplay_core::probe
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Version probing: ask a backend for the installed and the
    available version of a component, with every query bounded
    by the configured timeout.

  Security / Safety Notes:
    Probing is read-only.

  Dependencies:
    tokio::time for timeouts, serde for reporting.

  Operational Scope:
    Called once per component by the run loop; the result is
    consumed by the reconciliation step and then dropped.

  Revision History:
    2026-10-17 COD  Introduced backend trait and probe step.
    2026-10-17 COD  Source setup hook; one deadline per probe.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Not-installed is a value, probe failure is Unknown
    - No probe may outlive its timeout
============================================================*/

use std::fmt;
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use tokio::time::{timeout_at, Instant};

use crate::component::Component;
use crate::error::{Result, SynplayError};
use crate::logger::Logger;

/// Package-manager and release-feed collaborator.
#[allow(async_fn_in_trait)]
pub trait InstallBackend {
    /// Make the component's source queryable and installable (enable the
    /// repository, architecture, or remote it comes from). Runs before the
    /// probe; must be idempotent.
    async fn prepare(&self, component: &Component) -> Result<()>;
    /// Installed version, `None` when the component is not installed.
    async fn query_installed(&self, component: &Component) -> Result<Option<String>>;
    /// Latest version offered by the component's source, `None` when the
    /// source has no candidate.
    async fn query_available(&self, component: &Component) -> Result<Option<String>>;
    /// Install or upgrade the component.
    async fn install(&self, component: &Component) -> Result<()>;
}

/// What the source offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "lowercase")]
pub enum Available {
    Version(String),
    Absent,
    /// The probe failed; carries the reason.
    Unknown(String),
}

impl fmt::Display for Available {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Available::Version(version) => f.write_str(version),
            Available::Absent => f.write_str("none"),
            Available::Unknown(_) => f.write_str("unknown"),
        }
    }
}

/// Result of probing one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    pub installed: Option<String>,
    pub available: Available,
}

impl VersionInfo {
    pub fn new(installed: Option<String>, available: Available) -> Self {
        Self {
            installed,
            available,
        }
    }
}

/// Probe `component`, never failing: errors and timeouts resolve to
/// `Available::Unknown`. Both queries share one deadline of `limit`.
pub async fn probe<B: InstallBackend>(
    backend: &B,
    component: &Component,
    limit: Duration,
    logger: &Logger,
) -> VersionInfo {
    let deadline = Instant::now() + limit;
    let installed = match bounded(
        deadline,
        limit,
        component,
        backend.query_installed(component),
    )
    .await
    {
        Ok(installed) => installed,
        Err(err) => {
            logger.warn(
                "PROBE",
                format!("{}: installed version unknown: {err}", component.id),
            );
            return VersionInfo::new(None, Available::Unknown(err.detail()));
        }
    };

    let available = match bounded(
        deadline,
        limit,
        component,
        backend.query_available(component),
    )
    .await
    {
        Ok(Some(version)) => Available::Version(version),
        Ok(None) => Available::Absent,
        Err(err) => {
            logger.warn(
                "PROBE",
                format!("{}: available version unknown: {err}", component.id),
            );
            Available::Unknown(err.detail())
        }
    };

    logger.debug(
        "PROBE",
        format!(
            "{} installed={} available={}",
            component.id,
            installed.as_deref().unwrap_or("none"),
            available
        ),
    );
    VersionInfo::new(installed, available)
}

async fn bounded<T, F>(
    deadline: Instant,
    limit: Duration,
    component: &Component,
    query: F,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match timeout_at(deadline, query).await {
        Ok(result) => result.map_err(|err| SynplayError::Probe {
            component: component.id.to_string(),
            detail: err.to_string(),
        }),
        Err(_) => Err(SynplayError::Probe {
            component: component.id.to_string(),
            detail: format!("timed out after {}s", limit.as_secs_f32()),
        }),
    }
}
